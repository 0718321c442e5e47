//! Positional extraction of identity fields from the portal's result page
//!
//! The result page has no semantic markup: every field is a `<span>` and the
//! only thing that identifies a field is where its span sits in document
//! order. [`ExtractionLayout`] pins those positions as versioned data. When
//! the portal changes its page, ship a new layout (in code or as a JSON
//! file) rather than patching offsets in place.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ExtractedIdentityRecord;

/// Raw material read from the rendered result page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    /// `src` of the profile picture element, if the element exists
    pub image: Option<String>,
    /// Value still sitting in the FAN input, if the input exists
    pub fan_input: Option<String>,
    /// Trimmed text of every span, in document order
    pub spans: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("profile image element not found on result page")]
    MissingProfileImage,

    #[error("result page has {found} text elements, layout {layout} needs at least {expected}")]
    TooFewElements {
        layout: String,
        expected: usize,
        found: usize,
    },

    #[error("mandatory field `{0}` is empty")]
    MissingMandatoryField(&'static str),
}

/// Span offsets for each identity field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionLayout {
    pub version: String,
    /// Used only when the FAN input is gone or empty
    pub fan: usize,
    pub name: usize,
    pub region: usize,
    pub dob: usize,
    pub zone: usize,
    pub sex: usize,
    pub woreda: usize,
    pub nationality: usize,
    pub phone: usize,
}

impl ExtractionLayout {
    /// Layout of the card-order portal result page as first integrated
    pub fn v1() -> Self {
        Self {
            version: "v1".to_string(),
            fan: 2,
            name: 8,
            region: 12,
            dob: 16,
            zone: 20,
            sex: 24,
            woreda: 28,
            nationality: 32,
            phone: 33,
        }
    }

    /// Load a layout from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn offsets(&self) -> [usize; 9] {
        [
            self.fan,
            self.name,
            self.region,
            self.dob,
            self.zone,
            self.sex,
            self.woreda,
            self.nationality,
            self.phone,
        ]
    }

    /// Smallest span count this layout can read from
    pub fn min_elements(&self) -> usize {
        self.offsets().iter().copied().max().unwrap_or(0) + 1
    }

    /// Map a page snapshot to an identity record
    pub fn extract(&self, page: &PageSnapshot) -> Result<ExtractedIdentityRecord, ExtractionError> {
        let image = page
            .image
            .as_deref()
            .ok_or(ExtractionError::MissingProfileImage)?;

        let expected = self.min_elements();
        if page.spans.len() < expected {
            return Err(ExtractionError::TooFewElements {
                layout: self.version.clone(),
                expected,
                found: page.spans.len(),
            });
        }

        let span = |i: usize| page.spans[i].trim().to_string();

        let fan = match page.fan_input.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => span(self.fan),
        };

        let record = ExtractedIdentityRecord {
            image: image.to_string(),
            fan,
            name: span(self.name),
            region: span(self.region),
            dob: span(self.dob),
            zone: span(self.zone),
            sex: span(self.sex),
            woreda: span(self.woreda),
            nationality: span(self.nationality),
            phone: span(self.phone),
        };

        if record.fan.is_empty() {
            return Err(ExtractionError::MissingMandatoryField("FAN"));
        }
        if record.name.is_empty() {
            return Err(ExtractionError::MissingMandatoryField("name"));
        }

        Ok(record)
    }
}

impl Default for ExtractionLayout {
    fn default() -> Self {
        Self::v1()
    }
}

/// Extract with the default layout
pub fn extract(page: &PageSnapshot) -> Result<ExtractedIdentityRecord, ExtractionError> {
    ExtractionLayout::v1().extract(page)
}
