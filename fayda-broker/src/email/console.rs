//! Console-based email sender for development

use super::{DeliveryFailureNotice, DeveloperWelcome, EmailSender};

/// Email sender that logs to console (for development)
pub struct ConsoleEmailSender;

impl ConsoleEmailSender {
    pub fn new() -> Self {
        Self
    }

    fn print(&self, email: &str, subject: &str, body: &str) {
        println!();
        println!("========================================");
        println!("  TO: {}", email);
        println!("  SUBJECT: {}", subject);
        println!("----------------------------------------");
        println!("{}", body);
        println!("========================================");
        println!();
    }
}

impl Default for ConsoleEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailSender for ConsoleEmailSender {
    fn send_developer_welcome(&self, email: &str, welcome: &DeveloperWelcome) -> Result<(), String> {
        self.print(email, welcome.subject(), &welcome.body());
        tracing::info!(email = %email, client_id = %welcome.client_id, "Developer welcome sent");
        Ok(())
    }

    fn send_delivery_failure(&self, email: &str, notice: &DeliveryFailureNotice) -> Result<(), String> {
        self.print(email, notice.subject(), &notice.body());
        tracing::info!(email = %email, webhook_url = %notice.webhook_url, "Delivery failure notice sent");
        Ok(())
    }
}
