//! Recording verified identities
//!
//! Takes the record read off the portal plus the context the caller sent on
//! `initiate` and either registers a developer-client or stores an end-user
//! identity for the client that asked for it.

use std::sync::Arc;

use chrono::Utc;
use fayda_core::{ExtractedIdentityRecord, NameParts, Portal};
use serde::Serialize;

use crate::crypto::{generate_id, generate_secret, hash_password};
use crate::delivery::{DeliveryJob, DeliveryQueue};
use crate::email::{DeveloperWelcome, EmailSender};
use crate::error::BrokerError;
use crate::session::RequestContext;
use crate::store::{IdentityStore, StoredIdentity, Subscriber, SubscriberRegistry};

const ORGANIZATION_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=100;
const SYSTEM_DESCRIPTION_LEN: std::ops::RangeInclusive<usize> = 20..=500;
const FORBIDDEN_CHARS: [char; 4] = ['<', '>', '{', '}'];

/// Outcome of a successful registration, echoed back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct Registered {
    pub success: bool,
    pub message: &'static str,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RegisteredUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "FAN")]
    pub fan: String,
    pub name: String,
}

fn missing_fields(context: &RequestContext, record: &ExtractedIdentityRecord) -> Vec<&'static str> {
    [
        ("FAN", record.fan.as_str()),
        ("image", record.image.as_str()),
        ("email", context.email.as_str()),
        ("name", record.name.as_str()),
        ("phone", record.phone.as_str()),
        ("password", context.credential.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect()
}

fn check_text(
    value: Option<&str>,
    len: std::ops::RangeInclusive<usize>,
    code: &'static str,
    label: &str,
) -> Result<(), BrokerError> {
    let value = value.map(str::trim).unwrap_or_default();
    if !len.contains(&value.chars().count()) {
        return Err(BrokerError::validation(
            code,
            format!(
                "{} must be between {} and {} characters",
                label,
                len.start(),
                len.end()
            ),
        ));
    }
    if value.contains(&FORBIDDEN_CHARS[..]) {
        return Err(BrokerError::validation(
            code,
            format!("{} contains invalid characters", label),
        ));
    }
    Ok(())
}

/// Validate the merged context before anything is written
pub fn validate(context: &RequestContext, record: &ExtractedIdentityRecord) -> Result<(), BrokerError> {
    let missing = missing_fields(context, record);
    if !missing.is_empty() {
        return Err(BrokerError::validation(
            "MISSING_REQUIRED_FIELDS",
            format!("Missing required fields: {}", missing.join(", ")),
        ));
    }

    if context.email.trim().parse::<lettre::Address>().is_err() {
        return Err(BrokerError::validation(
            "INVALID_EMAIL",
            "Please provide a valid email address",
        ));
    }

    if let Some(webhook_url) = context.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        let parsed = url::Url::parse(webhook_url.trim());
        if !matches!(parsed, Ok(ref u) if u.scheme() == "http" || u.scheme() == "https") {
            return Err(BrokerError::validation(
                "INVALID_WEBHOOK_URL",
                "Webhook URL must be a valid http(s) URL",
            ));
        }
    }

    if context.portal == Portal::Developer {
        check_text(
            context.organization_name.as_deref(),
            ORGANIZATION_NAME_LEN,
            "INVALID_ORGANIZATION_NAME",
            "Organization name",
        )?;
        check_text(
            context.system_description.as_deref(),
            SYSTEM_DESCRIPTION_LEN,
            "INVALID_SYSTEM_DESCRIPTION",
            "System description",
        )?;
    }

    Ok(())
}

/// Writes verified identities to the collaborators
pub struct Registrar {
    subscribers: Arc<dyn SubscriberRegistry>,
    identities: Arc<dyn IdentityStore>,
    email: Arc<dyn EmailSender>,
    deliveries: DeliveryQueue,
}

impl Registrar {
    pub fn new(
        subscribers: Arc<dyn SubscriberRegistry>,
        identities: Arc<dyn IdentityStore>,
        email: Arc<dyn EmailSender>,
        deliveries: DeliveryQueue,
    ) -> Self {
        Self {
            subscribers,
            identities,
            email,
            deliveries,
        }
    }

    pub fn deliveries(&self) -> &DeliveryQueue {
        &self.deliveries
    }

    /// Record a verified identity for the portal the caller came through.
    ///
    /// The FAN recorded is always the one the caller submitted, not the
    /// one printed on the result page.
    pub async fn record(
        &self,
        context: RequestContext,
        mut record: ExtractedIdentityRecord,
    ) -> Result<Registered, BrokerError> {
        if record.fan != context.fan.as_str() {
            tracing::warn!(
                fan = %context.fan.masked(),
                page_fan_len = record.fan.len(),
                "FAN on the result page differs from the submitted FAN"
            );
            record.fan = context.fan.as_str().to_string();
        }

        validate(&context, &record)?;

        // bcrypt at cost 12 is too slow for a runtime worker
        let credential = context.credential.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&credential))
            .await
            .map_err(|e| BrokerError::Internal(format!("Hashing task failed: {}", e)))?
            .map_err(|e| BrokerError::Internal(e.to_string()))?;

        match context.portal {
            Portal::Developer => self.register_developer(context, record, password_hash).await,
            Portal::User => self.store_identity(context, record, password_hash),
        }
    }

    async fn register_developer(
        &self,
        context: RequestContext,
        record: ExtractedIdentityRecord,
        password_hash: String,
    ) -> Result<Registered, BrokerError> {
        let subscriber = Subscriber {
            client_id: generate_id(),
            name: record.name.clone(),
            email: context.email.trim().to_string(),
            fan: context.fan.as_str().to_string(),
            phone: record.phone.clone(),
            organization_name: context.organization_name.unwrap_or_default().trim().to_string(),
            system_description: context.system_description.unwrap_or_default().trim().to_string(),
            webhook_url: context
                .webhook_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            secret: Some(generate_secret()),
            password_hash,
            created_at: Utc::now(),
        };

        let welcome = DeveloperWelcome {
            name: subscriber.name.clone(),
            client_id: subscriber.client_id.clone(),
            secret: subscriber.secret.clone().unwrap_or_default(),
        };
        let email = subscriber.email.clone();
        let client_id = subscriber.client_id.clone();

        self.subscribers.register_subscriber(subscriber)?;
        tracing::info!(client_id = %client_id, "Developer registered");

        let sender = Arc::clone(&self.email);
        tokio::task::spawn_blocking(move || sender.send_developer_welcome(&email, &welcome))
            .await
            .map_err(|e| BrokerError::Internal(format!("Email task failed: {}", e)))?
            .map_err(BrokerError::Internal)?;

        Ok(Registered {
            success: true,
            message: "Developer registered successfully",
            code: "DEVELOPER_REGISTERED",
            data: None,
        })
    }

    fn store_identity(
        &self,
        context: RequestContext,
        record: ExtractedIdentityRecord,
        password_hash: String,
    ) -> Result<Registered, BrokerError> {
        let name_parts = NameParts::split(&record.name);
        let identity = StoredIdentity {
            user_id: generate_id(),
            client_id: context.client_id.clone(),
            name_parts,
            record,
            email: context.email.trim().to_string(),
            password_hash,
            created_at: Utc::now(),
        };

        let data = RegisteredUser {
            user_id: identity.user_id.clone(),
            fan: identity.record.fan.clone(),
            name: identity.name_parts.given(),
        };

        self.identities.record_identity(identity.clone())?;
        tracing::info!(user_id = %identity.user_id, "User data stored");

        match context.client_id {
            Some(client_id) => self.deliveries.enqueue(DeliveryJob {
                client_id,
                identity,
            }),
            None => tracing::debug!(user_id = %data.user_id, "No calling client, nothing to deliver"),
        }

        Ok(Registered {
            success: true,
            message: "User data stored successfully",
            code: "USER_DATA_STORED",
            data: Some(data),
        })
    }
}
