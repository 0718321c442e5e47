//! Storage abstractions for subscriber and identity records
//!
//! Durable storage is someone else's job; these traits are the seam, and
//! [`InMemoryRegistry`] is the reference implementation.

pub mod memory;
pub mod models;

pub use memory::InMemoryRegistry;
pub use models::*;

use crate::error::BrokerError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, BrokerError>;

/// Developer-client registrations, looked up by client id
pub trait SubscriberRegistry: Send + Sync {
    /// Get a subscriber by client id
    fn get_subscriber(&self, client_id: &str) -> StoreResult<Option<Subscriber>>;

    /// Register a new subscriber.
    ///
    /// Fails with `DeveloperExists` when the FAN, email or phone number is
    /// already registered.
    fn register_subscriber(&self, subscriber: Subscriber) -> StoreResult<()>;
}

/// Verified end-user identities
pub trait IdentityStore: Send + Sync {
    /// Store a verified identity
    fn record_identity(&self, identity: StoredIdentity) -> StoreResult<()>;

    /// Get an identity by user id
    fn get_identity(&self, user_id: &str) -> StoreResult<Option<StoredIdentity>>;
}
