//! Webhook delivery of verified identities
//!
//! Recording an end-user identity drops a [`DeliveryJob`] on the
//! [`DeliveryQueue`]. A worker picks it up and hands it to
//! [`DeliveryService::deliver`] on its own task, so the HTTP response that
//! recorded the identity never waits for the subscriber's webhook.

pub mod transport;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fayda_core::{CallbackPayload, CallbackToken, VERIFICATION_STATUS};
use serde::Serialize;
use tokio::sync::mpsc;

pub use transport::{ReqwestTransport, WebhookError, WebhookTransport, CLIENT_ID_HEADER};

use crate::config::DeliveryConfig;
use crate::email::{DeliveryFailureNotice, EmailSender};
use crate::store::{StoredIdentity, Subscriber, SubscriberRegistry};

/// Attempt budget and spacing
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Pause after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl From<&DeliveryConfig> for RetryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

/// A verified identity waiting to be relayed to a subscriber
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub client_id: String,
    pub identity: StoredIdentity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered,
    /// Every attempt failed and the subscriber was notified
    Escalated,
    /// Nothing to deliver to
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub client_id: String,
    pub user_id: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub outcome: DeliveryOutcome,
}

/// Build the payload a subscriber receives for a recorded identity
pub fn callback_payload(client_id: &str, identity: &StoredIdentity) -> CallbackPayload {
    let record = &identity.record;
    CallbackPayload {
        client_id: client_id.to_string(),
        user_id: identity.user_id.clone(),
        fan: record.fan.clone(),
        photo: record.image.clone(),
        name: record.name.clone(),
        first_name: identity.name_parts.first.clone(),
        middle_name: identity.name_parts.middle.clone(),
        last_name: identity.name_parts.last.clone(),
        email: identity.email.clone(),
        region: record.region.clone(),
        date_of_birth: record.dob.clone(),
        zone: record.zone.clone(),
        gender: record.sex.clone(),
        woreda: record.woreda.clone(),
        nationality: record.nationality.clone(),
        phone_number: record.phone.clone(),
        verification_status: VERIFICATION_STATUS.to_string(),
    }
}

/// Signs and posts callbacks with bounded retries
pub struct DeliveryService {
    registry: Arc<dyn SubscriberRegistry>,
    email: Arc<dyn EmailSender>,
    transport: Arc<dyn WebhookTransport>,
    policy: RetryPolicy,
    dead_letters: Mutex<Vec<DeliveryReport>>,
}

impl DeliveryService {
    pub fn new(
        registry: Arc<dyn SubscriberRegistry>,
        email: Arc<dyn EmailSender>,
        transport: Arc<dyn WebhookTransport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            email,
            transport,
            policy,
            dead_letters: Mutex::new(Vec::new()),
        }
    }

    /// Reports of deliveries that exhausted their attempts
    pub fn dead_letters(&self) -> Vec<DeliveryReport> {
        self.dead_letters.lock().unwrap().clone()
    }

    /// Relay one identity to its subscriber's webhook
    pub async fn deliver(&self, job: DeliveryJob) -> DeliveryReport {
        let client_id = job.client_id.as_str();
        let mut report = DeliveryReport {
            client_id: job.client_id.clone(),
            user_id: job.identity.user_id.clone(),
            attempts: 0,
            last_error: None,
            outcome: DeliveryOutcome::Skipped,
        };

        let subscriber = match self.registry.get_subscriber(client_id) {
            Ok(Some(subscriber)) => subscriber,
            Ok(None) => {
                tracing::warn!(client_id = %client_id, "Unknown client, callback skipped");
                return report;
            }
            Err(e) => {
                tracing::error!(client_id = %client_id, error = %e, "Subscriber lookup failed");
                report.last_error = Some(e.to_string());
                return report;
            }
        };

        let (Some(url), Some(secret)) = (subscriber.webhook_url.as_deref(), subscriber.secret.as_deref())
        else {
            tracing::warn!(client_id = %client_id, "No callback configured, skipped");
            return report;
        };

        let payload = callback_payload(client_id, &job.identity);
        let token = match CallbackToken::sign(&payload, secret) {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(client_id = %client_id, error = %e, "Failed to sign callback");
                report.last_error = Some(e.to_string());
                return report;
            }
        };

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            report.attempts = attempt;
            match self.transport.post(url, client_id, token.as_str()).await {
                Ok(()) => {
                    tracing::info!(client_id = %client_id, url = %url, attempt, "Callback delivered");
                    report.outcome = DeliveryOutcome::Delivered;
                    report.last_error = None;
                    return report;
                }
                Err(e) => {
                    tracing::warn!(client_id = %client_id, attempt, error = %e, "Callback attempt failed");
                    report.last_error = Some(e.to_string());
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        self.escalate(&subscriber, url, max_attempts).await;

        report.outcome = DeliveryOutcome::Escalated;
        self.dead_letters.lock().unwrap().push(report.clone());
        report
    }

    async fn escalate(&self, subscriber: &Subscriber, url: &str, attempts: u32) {
        let email = Arc::clone(&self.email);
        let to = subscriber.email.clone();
        let notice = DeliveryFailureNotice {
            name: subscriber.name.clone(),
            webhook_url: url.to_string(),
            attempts,
        };

        // SMTP sends block
        let sent = tokio::task::spawn_blocking(move || email.send_delivery_failure(&to, &notice)).await;

        match sent {
            Ok(Ok(())) => {
                tracing::info!(client_id = %subscriber.client_id, "Failure notification sent")
            }
            Ok(Err(e)) => {
                tracing::error!(client_id = %subscriber.client_id, error = %e, "Failed to send failure email")
            }
            Err(e) => {
                tracing::error!(client_id = %subscriber.client_id, error = %e, "Failure email task panicked")
            }
        }
    }
}

/// Outbound queue feeding the delivery worker
#[derive(Clone)]
pub struct DeliveryQueue {
    sender: mpsc::UnboundedSender<DeliveryJob>,
    service: Arc<DeliveryService>,
}

impl DeliveryQueue {
    /// Start the worker. Each job runs on its own task so one slow webhook
    /// does not hold up the others.
    pub fn start(service: Arc<DeliveryService>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<DeliveryJob>();

        let worker = Arc::clone(&service);
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let service = Arc::clone(&worker);
                tokio::spawn(async move {
                    service.deliver(job).await;
                });
            }
            tracing::debug!("Delivery queue closed");
        });

        Self { sender, service }
    }

    /// Queue a job. Never waits.
    pub fn enqueue(&self, job: DeliveryJob) {
        let client_id = job.client_id.clone();
        if self.sender.send(job).is_err() {
            tracing::error!(client_id = %client_id, "Delivery worker gone, callback dropped");
        }
    }

    pub fn service(&self) -> &Arc<DeliveryService> {
        &self.service
    }
}
