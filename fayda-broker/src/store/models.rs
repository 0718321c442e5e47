//! Data models for the relay's collaborator records

use chrono::{DateTime, Utc};
use fayda_core::{ExtractedIdentityRecord, NameParts};

/// A developer-client registered to receive identity callbacks
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub client_id: String,
    /// Full name of the registering developer
    pub name: String,
    /// Contact address for welcome and delivery-failure notices
    pub email: String,
    pub fan: String,
    pub phone: String,
    pub organization_name: String,
    pub system_description: String,
    pub webhook_url: Option<String>,
    /// HS256 key for callback tokens
    pub secret: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A verified end user, recorded on behalf of a subscriber
#[derive(Debug, Clone)]
pub struct StoredIdentity {
    pub user_id: String,
    /// The subscriber this identity was verified for, if any
    pub client_id: Option<String>,
    pub record: ExtractedIdentityRecord,
    pub name_parts: NameParts,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
