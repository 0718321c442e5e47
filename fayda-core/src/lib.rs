//! Fayda Relay Core Library
//!
//! Domain pieces shared by the relay service:
//! - Validated FAN / OTP / portal types and the extracted identity record
//! - Positional extraction of identity fields from the portal result page
//! - Signed, time-boxed callback tokens for subscriber webhooks

pub mod callback;
pub mod error;
pub mod extraction;
pub mod identity;

pub use callback::{CallbackPayload, CallbackToken, VERIFICATION_STATUS};
pub use error::Error;
pub use extraction::{ExtractionError, ExtractionLayout, PageSnapshot};
pub use identity::{ExtractedIdentityRecord, Fan, NameParts, OtpCode, Portal};

/// Result type for fayda-core operations
pub type Result<T> = std::result::Result<T, Error>;
