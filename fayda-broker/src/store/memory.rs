//! In-memory storage implementation

use std::collections::HashMap;
use std::sync::RwLock;

use super::{IdentityStore, StoreResult, StoredIdentity, Subscriber, SubscriberRegistry};
use crate::error::BrokerError;

/// In-memory subscriber registry and identity store
pub struct InMemoryRegistry {
    subscribers: RwLock<HashMap<String, Subscriber>>,
    identities: RwLock<HashMap<String, StoredIdentity>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            identities: RwLock::new(HashMap::new()),
        }
    }

    /// All stored identities (for testing purposes)
    pub fn identities(&self) -> Vec<StoredIdentity> {
        self.identities.read().unwrap().values().cloned().collect()
    }

    /// Find a subscriber by contact email (for testing purposes)
    pub fn subscriber_by_email(&self, email: &str) -> Option<Subscriber> {
        let normalized = email.to_lowercase();
        self.subscribers
            .read()
            .unwrap()
            .values()
            .find(|s| s.email.to_lowercase() == normalized)
            .cloned()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry for InMemoryRegistry {
    fn get_subscriber(&self, client_id: &str) -> StoreResult<Option<Subscriber>> {
        Ok(self.subscribers.read().unwrap().get(client_id).cloned())
    }

    fn register_subscriber(&self, subscriber: Subscriber) -> StoreResult<()> {
        let mut subscribers = self.subscribers.write().unwrap();
        let email = subscriber.email.to_lowercase();
        let exists = subscribers.values().any(|s| {
            s.fan == subscriber.fan
                || s.email.to_lowercase() == email
                || (!s.phone.is_empty() && s.phone == subscriber.phone)
        });
        if exists {
            return Err(BrokerError::DeveloperExists);
        }
        subscribers.insert(subscriber.client_id.clone(), subscriber);
        Ok(())
    }
}

impl IdentityStore for InMemoryRegistry {
    fn record_identity(&self, identity: StoredIdentity) -> StoreResult<()> {
        self.identities
            .write()
            .unwrap()
            .insert(identity.user_id.clone(), identity);
        Ok(())
    }

    fn get_identity(&self, user_id: &str) -> StoreResult<Option<StoredIdentity>> {
        Ok(self.identities.read().unwrap().get(user_id).cloned())
    }
}
