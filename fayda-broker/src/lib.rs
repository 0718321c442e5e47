//! Fayda Relay Broker
//!
//! Drives the Fayda card-order portal through its FAN / one-time-code
//! challenge on behalf of callers, reads the verified identity off the
//! result page, and relays it to subscriber webhooks as a signed token.

pub mod config;
pub mod crypto;
pub mod delivery;
pub mod driver;
pub mod email;
pub mod error;
pub mod flow;
pub mod registration;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;

pub use config::Config;
pub use delivery::{
    DeliveryJob, DeliveryOutcome, DeliveryQueue, DeliveryReport, DeliveryService, ReqwestTransport,
    RetryPolicy, WebhookError, WebhookTransport,
};
pub use driver::{AutomationError, ChallengeHandle, ChallengeOutcome, ChromiumDriver, PortalDriver};
pub use email::{ConsoleEmailSender, EmailSender, SmtpConfig, SmtpEmailSender};
pub use error::BrokerError;
pub use session::{SessionId, SessionStore};
pub use state::AppState;
pub use store::{IdentityStore, InMemoryRegistry, SubscriberRegistry};
