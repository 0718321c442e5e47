//! Verification state machine
//!
//! ```text
//! Initiated -> ChallengePresented -> Verifying -> Completed | Failed
//! Initiated -> Completed                        (portal granted direct access)
//! ```
//!
//! `initiate` and `verify` are the two HTTP-triggered transitions. Nothing in
//! here retries; a failed verification means the caller starts over.

use fayda_core::{ExtractedIdentityRecord, Fan, OtpCode, Portal};
use serde::Deserialize;

use crate::driver::{ChallengeOutcome, PortalDriver};
use crate::error::BrokerError;
use crate::registration::{Registered, Registrar};
use crate::session::{RequestContext, Session, SessionId, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initiated,
    ChallengePresented,
    Verifying,
    Completed,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initiated => "initiated",
            Phase::ChallengePresented => "challenge_presented",
            Phase::Verifying => "verifying",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /initiate`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitiateRequest {
    pub identifier: String,
    pub portal: String,
    pub contact_email: String,
    pub organization_name: Option<String>,
    pub system_description: Option<String>,
    #[serde(rename = "webhookURL")]
    pub webhook_url: Option<String>,
    pub credential: String,
}

/// Body of `POST /verify`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyRequest {
    pub session_id: String,
    pub code: String,
}

#[derive(Debug)]
pub enum Initiated {
    /// A one-time code is required; verify against this session
    Challenge(SessionId),
    /// No code required, the record was read straight away
    DirectAccess(ExtractedIdentityRecord),
}

/// Submit the FAN to the portal.
///
/// Input is validated before any browser is launched.
pub async fn initiate(
    driver: &dyn PortalDriver,
    sessions: &SessionStore,
    request: InitiateRequest,
    client_id: Option<String>,
) -> Result<Initiated, BrokerError> {
    let fan = Fan::parse(request.identifier.trim()).map_err(|_| BrokerError::InvalidFan)?;
    let portal: Portal = request.portal.trim().parse()?;

    tracing::info!(fan = %fan.masked(), portal = portal.as_str(), state = %Phase::Initiated, "Verification initiated");

    let context = RequestContext {
        fan,
        portal,
        email: request.contact_email,
        organization_name: request.organization_name,
        system_description: request.system_description,
        webhook_url: request.webhook_url,
        credential: request.credential,
        client_id,
    };

    match driver.open_challenge(&context.fan).await {
        Ok(ChallengeOutcome::Challenge(handle)) => {
            let session = sessions.insert(Session::new(context, handle));
            tracing::info!(
                session_id = %session.id,
                state = %Phase::ChallengePresented,
                "Challenge session stored"
            );
            Ok(Initiated::Challenge(session.id.clone()))
        }
        Ok(ChallengeOutcome::DirectAccess(record)) => {
            tracing::info!(fan = %context.fan.masked(), state = %Phase::Completed, "Direct access");
            Ok(Initiated::DirectAccess(record))
        }
        Err(e) => {
            tracing::warn!(fan = %context.fan.masked(), state = %Phase::Failed, error = %e, "Initiate failed");
            Err(e.into())
        }
    }
}

/// Resume a challenge session with the caller's code and record the result.
///
/// The session is consumed whatever happens: it is closed and removed
/// before this returns.
pub async fn verify(
    sessions: &SessionStore,
    registrar: &Registrar,
    request: VerifyRequest,
) -> Result<Registered, BrokerError> {
    let code = OtpCode::parse(request.code.trim()).map_err(|_| BrokerError::InvalidSessionOrCode)?;
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(BrokerError::InvalidSessionOrCode);
    }
    let id = SessionId(session_id.to_string());

    let session = sessions.get(&id).ok_or(BrokerError::SessionExpired)?;
    let mut guard = session.try_claim().ok_or_else(|| {
        tracing::warn!(session_id = %id, "Concurrent verify rejected");
        BrokerError::SessionBusy
    })?;

    let Some(handle) = guard.as_mut() else {
        // Consumed by a verify that finished between our lookup and claim
        return Err(BrokerError::SessionExpired);
    };

    tracing::info!(session_id = %id, state = %Phase::Verifying, "Submitting code");
    let submitted = handle.submit_code(&code).await;
    handle.close().await;

    // Remove before releasing the claim so nobody else finds it
    guard.take();
    sessions.remove(&id);
    drop(guard);

    let record = match submitted {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(session_id = %id, state = %Phase::Failed, error = %e, "Verification failed");
            return Err(e.into());
        }
    };

    match registrar.record(session.context.clone(), record).await {
        Ok(registered) => {
            tracing::info!(session_id = %id, state = %Phase::Completed, code = registered.code, "Identity verified");
            Ok(registered)
        }
        Err(e) => {
            tracing::warn!(session_id = %id, state = %Phase::Failed, error = %e, "Recording identity failed");
            Err(e)
        }
    }
}
