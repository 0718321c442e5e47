//! Error types for the Fayda relay core

use thiserror::Error;

use crate::extraction::ExtractionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid FAN: must be exactly 16 digits")]
    InvalidFan,

    #[error("Invalid OTP: must be exactly 6 digits")]
    InvalidOtp,

    #[error("Unknown portal: {0}")]
    UnknownPortal(String),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Callback token expired")]
    TokenExpired,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
