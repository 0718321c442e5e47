//! Shared application state

use std::sync::Arc;

use crate::config::Config;
use crate::delivery::{DeliveryQueue, DeliveryService, RetryPolicy, WebhookTransport};
use crate::driver::PortalDriver;
use crate::email::EmailSender;
use crate::error::{BrokerError, ErrorResponse};
use crate::registration::Registrar;
use crate::session::SessionStore;
use crate::store::{IdentityStore, SubscriberRegistry};

/// Relay application state
pub struct AppState<D, R, E>
where
    D: PortalDriver,
    R: SubscriberRegistry + IdentityStore,
    E: EmailSender,
{
    pub config: Config,
    pub driver: D,
    pub registry: Arc<R>,
    pub email_sender: Arc<E>,
    pub sessions: Arc<SessionStore>,
    pub registrar: Registrar,
}

impl<D, R, E> AppState<D, R, E>
where
    D: PortalDriver,
    R: SubscriberRegistry + IdentityStore + 'static,
    E: EmailSender + 'static,
{
    /// Build the state and start the delivery worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: Config,
        driver: D,
        registry: R,
        email_sender: E,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        let registry = Arc::new(registry);
        let email_sender = Arc::new(email_sender);
        let sessions = Arc::new(SessionStore::new(
            config.sessions.ttl,
            config.sessions.sweep_interval,
        ));

        let delivery = DeliveryService::new(
            registry.clone(),
            email_sender.clone(),
            transport,
            RetryPolicy::from(&config.delivery),
        );
        let registrar = Registrar::new(
            registry.clone(),
            registry.clone(),
            email_sender.clone(),
            DeliveryQueue::start(Arc::new(delivery)),
        );

        Self {
            config,
            driver,
            registry,
            email_sender,
            sessions,
            registrar,
        }
    }

    /// Error response, with internal details attached in development mode
    pub fn error(&self, error: BrokerError) -> ErrorResponse {
        if self.config.development {
            error.with_details()
        } else {
            error.into()
        }
    }
}
