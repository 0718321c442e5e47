//! Broker error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::driver::AutomationError;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Invalid FAN. It must be 16 digits.")]
    InvalidFan,

    #[error("Invalid portal: {0}")]
    InvalidPortal(String),

    #[error("Invalid session ID or OTP")]
    InvalidSessionOrCode,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session is already being verified")]
    SessionBusy,

    #[error("Challenge layout mismatch: found {found} code inputs")]
    InvalidChallengeLayout { found: usize },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Automation failed: {0}")]
    Automation(String),

    #[error("Extraction incomplete: {0}")]
    ExtractionIncomplete(String),

    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("Developer already registered")]
    DeveloperExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        BrokerError::Validation {
            code,
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            BrokerError::InvalidFan => "INVALID_FAN",
            BrokerError::InvalidPortal(_) => "INVALID_PORTAL",
            BrokerError::InvalidSessionOrCode => "INVALID_REQUEST",
            BrokerError::SessionExpired => "SESSION_EXPIRED",
            BrokerError::SessionBusy => "SESSION_BUSY",
            BrokerError::InvalidChallengeLayout { .. } => "INVALID_CHALLENGE_LAYOUT",
            BrokerError::Timeout(_) => "TIMEOUT",
            BrokerError::Automation(_) => "AUTOMATION_FAILED",
            BrokerError::ExtractionIncomplete(_) => "EXTRACTION_INCOMPLETE",
            BrokerError::Validation { code, .. } => *code,
            BrokerError::DeveloperExists => "DEVELOPER_EXISTS",
            BrokerError::UserNotFound => "USER_NOT_FOUND",
            BrokerError::Internal(_) => "SERVER_ERROR",
        }
    }

    fn status_and_message(&self) -> (StatusCode, &str) {
        match self {
            BrokerError::InvalidFan => (StatusCode::BAD_REQUEST, "Invalid FAN. It must be 16 digits."),
            BrokerError::InvalidPortal(_) => {
                (StatusCode::BAD_REQUEST, "Portal must be 'developer' or 'user'")
            }
            BrokerError::InvalidSessionOrCode => (StatusCode::BAD_REQUEST, "Invalid session ID or OTP"),
            BrokerError::SessionExpired => (StatusCode::BAD_REQUEST, "Session expired"),
            BrokerError::SessionBusy => {
                (StatusCode::CONFLICT, "Session is already being verified")
            }
            BrokerError::InvalidChallengeLayout { .. } => (
                StatusCode::BAD_REQUEST,
                "The provided FAN number could not be verified",
            ),
            BrokerError::Timeout(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Request timed out"),
            BrokerError::Automation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Verification failed")
            }
            BrokerError::ExtractionIncomplete(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to extract required fields")
            }
            BrokerError::Validation { message, .. } => (StatusCode::BAD_REQUEST, message.as_str()),
            BrokerError::DeveloperExists => (StatusCode::BAD_REQUEST, "Developer already registered"),
            BrokerError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            BrokerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }

    /// Response that also carries the internal detail (development mode)
    pub fn with_details(self) -> ErrorResponse {
        ErrorResponse {
            error: self,
            details: true,
        }
    }
}

impl From<AutomationError> for BrokerError {
    fn from(err: AutomationError) -> Self {
        match err {
            AutomationError::SessionExpired => BrokerError::SessionExpired,
            AutomationError::InvalidChallengeLayout { found, .. } => {
                BrokerError::InvalidChallengeLayout { found }
            }
            AutomationError::Timeout(stage) => BrokerError::Timeout(stage.to_string()),
            AutomationError::Extraction(e) => BrokerError::ExtractionIncomplete(e.to_string()),
            other => BrokerError::Automation(other.to_string()),
        }
    }
}

impl From<fayda_core::Error> for BrokerError {
    fn from(err: fayda_core::Error) -> Self {
        match err {
            fayda_core::Error::InvalidFan => BrokerError::InvalidFan,
            fayda_core::Error::InvalidOtp => BrokerError::InvalidSessionOrCode,
            fayda_core::Error::UnknownPortal(p) => BrokerError::InvalidPortal(p),
            fayda_core::Error::Extraction(e) => BrokerError::ExtractionIncomplete(e.to_string()),
            other => BrokerError::Internal(other.to_string()),
        }
    }
}

/// An error on its way to the client
#[derive(Debug)]
pub struct ErrorResponse {
    error: BrokerError,
    details: bool,
}

impl From<BrokerError> for ErrorResponse {
    fn from(error: BrokerError) -> Self {
        Self {
            error,
            details: false,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let error = &self.error;
        let (status, message) = error.status_and_message();

        if status.is_server_error() {
            tracing::error!(code = error.code(), "{}", error);
        } else {
            tracing::debug!(code = error.code(), "{}", error);
        }

        let mut body = json!({ "success": false, "code": error.code(), "error": message });
        if self.details {
            body["details"] = json!(error.to_string());
        }
        (status, axum::Json(body)).into_response()
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}
