//! /api/v1/fayda endpoints

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use fayda_core::ExtractedIdentityRecord;
use serde::{Deserialize, Serialize};

use crate::delivery::CLIENT_ID_HEADER;
use crate::driver::PortalDriver;
use crate::email::EmailSender;
use crate::error::{BrokerError, ErrorResponse};
use crate::flow::{self, InitiateRequest, Initiated, VerifyRequest};
use crate::registration::Registered;
use crate::state::AppState;
use crate::store::{IdentityStore, StoredIdentity, SubscriberRegistry};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractedIdentityRecord>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: &'static str,
    pub result: Registered,
}

/// Body of `POST /user-data`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDataRequest {
    pub user_id: String,
    #[serde(alias = "FAN")]
    pub fan: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct UserDataResponse {
    pub success: bool,
    pub message: &'static str,
    pub code: &'static str,
    pub user: UserView,
}

/// A stored identity as handed back to its owner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub photo: String,
    pub name: String,
    pub fan: String,
    pub email: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub region: String,
    pub date_of_birth: String,
    pub zone: String,
    pub gender: String,
    pub woreda: String,
    pub nationality: String,
    pub phone_number: String,
    pub password: &'static str,
}

impl From<StoredIdentity> for UserView {
    fn from(identity: StoredIdentity) -> Self {
        let StoredIdentity {
            record,
            name_parts,
            email,
            ..
        } = identity;
        Self {
            photo: record.image,
            name: record.name,
            fan: record.fan,
            email,
            first_name: name_parts.first,
            middle_name: name_parts.middle,
            last_name: name_parts.last,
            region: record.region,
            date_of_birth: record.dob,
            zone: record.zone,
            gender: record.sex,
            woreda: record.woreda,
            nationality: record.nationality,
            phone_number: record.phone,
            password: "•••••••• (hashed)",
        }
    }
}

fn client_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// POST /api/v1/fayda/initiate
/// Submit a FAN; either a challenge session or the identity comes back
pub async fn initiate<D, R, E>(
    State(state): State<Arc<AppState<D, R, E>>>,
    headers: HeaderMap,
    payload: Result<Json<InitiateRequest>, JsonRejection>,
) -> Result<Json<InitiateResponse>, ErrorResponse>
where
    D: PortalDriver + 'static,
    R: SubscriberRegistry + IdentityStore + 'static,
    E: EmailSender + 'static,
{
    // Anything that does not parse as a request cannot carry a valid FAN
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Unreadable initiate body");
        state.error(BrokerError::InvalidFan)
    })?;

    let initiated = flow::initiate(&state.driver, &state.sessions, req, client_id(&headers))
        .await
        .map_err(|e| state.error(e))?;

    let response = match initiated {
        Initiated::Challenge(session_id) => InitiateResponse {
            success: true,
            message: "Challenge required",
            session_id: Some(session_id.0),
            data: None,
        },
        Initiated::DirectAccess(record) => InitiateResponse {
            success: true,
            message: "Direct access",
            session_id: None,
            data: Some(record),
        },
    };

    Ok(Json(response))
}

/// POST /api/v1/fayda/verify
/// Complete a challenge with the one-time code and record the identity
pub async fn verify<D, R, E>(
    State(state): State<Arc<AppState<D, R, E>>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ErrorResponse>
where
    D: PortalDriver + 'static,
    R: SubscriberRegistry + IdentityStore + 'static,
    E: EmailSender + 'static,
{
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Unreadable verify body");
        state.error(BrokerError::InvalidSessionOrCode)
    })?;

    let result = flow::verify(&state.sessions, &state.registrar, req)
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(VerifyResponse {
        success: true,
        message: "Identity verified",
        result,
    }))
}

/// POST /api/v1/fayda/user-data
/// Read back a stored identity by id; the FAN must match the stored one
pub async fn user_data<D, R, E>(
    State(state): State<Arc<AppState<D, R, E>>>,
    payload: Result<Json<UserDataRequest>, JsonRejection>,
) -> Result<Json<UserDataResponse>, ErrorResponse>
where
    D: PortalDriver + 'static,
    R: SubscriberRegistry + IdentityStore + 'static,
    E: EmailSender + 'static,
{
    let missing = || BrokerError::validation("MISSING_PARAMETERS", "Missing required parameters");

    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Unreadable user-data body");
        state.error(missing())
    })?;

    let user_id = req.user_id.trim();
    let fan = req.fan.trim();
    if user_id.is_empty() || fan.is_empty() || req.name.trim().is_empty() {
        return Err(state.error(missing()));
    }

    let identity = state
        .registry
        .get_identity(user_id)
        .map_err(|e| state.error(e))?
        .filter(|identity| identity.record.fan == fan)
        .ok_or_else(|| state.error(BrokerError::UserNotFound))?;

    tracing::info!(user_id = %identity.user_id, "User data retrieved");

    Ok(Json(UserDataResponse {
        success: true,
        message: "User data retrieved successfully",
        code: "USER_DATA_RETRIEVED",
        user: identity.into(),
    }))
}
