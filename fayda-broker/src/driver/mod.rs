//! Portal automation capability
//!
//! The verification flow only talks to these traits. The Chromium-backed
//! implementation lives in [`chromium`]; tests plug in scripted drivers.

pub mod chromium;

use async_trait::async_trait;
use fayda_core::{ExtractedIdentityRecord, ExtractionError, Fan, OtpCode};
use thiserror::Error;

pub use chromium::ChromiumDriver;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Portal did not present a challenge or grant access")]
    ChallengeNotPresented,

    #[error("Browser session is no longer connected")]
    SessionExpired,

    #[error("Expected {expected} code inputs, found {found}")]
    InvalidChallengeLayout { expected: usize, found: usize },

    #[error("Result page not reached after code submission")]
    ResultPageUnreachable,

    #[error("Timed out during {0}")]
    Timeout(&'static str),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// What the portal did with a submitted FAN
pub enum ChallengeOutcome {
    /// The portal wants a one-time code; the handle keeps the page open
    Challenge(Box<dyn ChallengeHandle>),
    /// The portal went straight to the result page
    DirectAccess(ExtractedIdentityRecord),
}

impl std::fmt::Debug for ChallengeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeOutcome::Challenge(_) => f.write_str("Challenge(..)"),
            ChallengeOutcome::DirectAccess(record) => {
                f.debug_tuple("DirectAccess").field(record).finish()
            }
        }
    }
}

/// Opens automation sessions against the portal
#[async_trait]
pub trait PortalDriver: Send + Sync {
    /// Submit a FAN and report whether the portal presented a challenge.
    ///
    /// On any error the browser has already been closed.
    async fn open_challenge(&self, fan: &Fan) -> Result<ChallengeOutcome, AutomationError>;
}

/// A live browser page parked on the portal's challenge screen
#[async_trait]
pub trait ChallengeHandle: Send {
    /// Enter the code and read the identity off the result page
    async fn submit_code(&mut self, code: &OtpCode) -> Result<ExtractedIdentityRecord, AutomationError>;

    /// Release the browser. Safe to call more than once.
    async fn close(&mut self);

    /// Whether the browser is still connected and the page still open
    fn is_live(&self) -> bool;
}
