//! Email sending abstractions

pub mod console;
pub mod smtp;

pub use console::ConsoleEmailSender;
pub use smtp::{SmtpConfig, SmtpEmailSender};

/// Credentials handed to a newly registered developer-client
#[derive(Debug, Clone)]
pub struct DeveloperWelcome {
    pub name: String,
    pub client_id: String,
    pub secret: String,
}

impl DeveloperWelcome {
    pub fn subject(&self) -> &'static str {
        "Welcome to the Fayda Developer Portal"
    }

    pub fn body(&self) -> String {
        format!(
            "Hello {},\n\n\
             Thank you for registering as a developer. Your access information:\n\n\
             - Client ID: {}\n\
             - Secret Key: {}\n\n\
             Callbacks to your webhook are signed with this secret key (HS256).\n\
             It will not be shown again. Please store it securely.\n\n\
             Best regards,\n\
             The Fayda Integration Team",
            self.name, self.client_id, self.secret
        )
    }
}

/// Notice that callbacks to a subscriber's webhook keep failing
#[derive(Debug, Clone)]
pub struct DeliveryFailureNotice {
    pub name: String,
    pub webhook_url: String,
    pub attempts: u32,
}

impl DeliveryFailureNotice {
    pub fn subject(&self) -> &'static str {
        "Callback Delivery Failed"
    }

    pub fn body(&self) -> String {
        format!(
            "Hello {},\n\n\
             We attempted to send a callback to your URL {} but it failed after {} attempts.\n\n\
             Please check your server's availability and endpoint configuration.\n\n\
             Best regards,\n\
             The Fayda Integration Team",
            self.name, self.webhook_url, self.attempts
        )
    }
}

/// Trait for sending notification emails
pub trait EmailSender: Send + Sync {
    /// Send a new developer-client its client id and delivery secret
    fn send_developer_welcome(&self, email: &str, welcome: &DeveloperWelcome) -> Result<(), String>;

    /// Tell a subscriber its webhook could not be reached
    fn send_delivery_failure(&self, email: &str, notice: &DeliveryFailureNotice) -> Result<(), String>;
}

/// Allow using Box<dyn EmailSender> as an EmailSender
impl EmailSender for Box<dyn EmailSender> {
    fn send_developer_welcome(&self, email: &str, welcome: &DeveloperWelcome) -> Result<(), String> {
        (**self).send_developer_welcome(email, welcome)
    }

    fn send_delivery_failure(&self, email: &str, notice: &DeliveryFailureNotice) -> Result<(), String> {
        (**self).send_delivery_failure(email, notice)
    }
}
