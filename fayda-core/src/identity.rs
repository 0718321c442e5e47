//! Identity types exchanged with the Fayda portal
//!
//! A FAN is the 16-digit number a resident submits to the portal; the OTP is
//! the 6-digit code the portal sends back as a second factor. Both are parsed
//! once at the edge so nothing downstream handles unchecked strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const FAN_LEN: usize = 16;
const OTP_LEN: usize = 6;

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// A validated 16-digit FAN
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fan(String);

impl Fan {
    pub fn parse(s: &str) -> Result<Self> {
        if is_digits(s, FAN_LEN) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidFan)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four digits, safe to put in logs
    pub fn masked(&self) -> String {
        format!("************{}", &self.0[FAN_LEN - 4..])
    }
}

impl fmt::Debug for Fan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fan").field(&self.masked()).finish()
    }
}

impl fmt::Display for Fan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fan {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Fan> for String {
    fn from(fan: Fan) -> Self {
        fan.0
    }
}

/// A validated 6-digit one-time code
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn parse(s: &str) -> Result<Self> {
        if is_digits(s, OTP_LEN) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidOtp)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The code one character at a time, in entry order
    pub fn digits(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars()
    }

    /// Number of input boxes the portal renders for the code
    pub const LEN: usize = OTP_LEN;
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// Which portal the caller registered through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    /// A developer-client registering itself as a subscriber
    Developer,
    /// An end user whose identity is relayed to a subscriber
    User,
}

impl Portal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Portal::Developer => "developer",
            Portal::User => "user",
        }
    }
}

impl FromStr for Portal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "developer" => Ok(Portal::Developer),
            "user" => Ok(Portal::User),
            other => Err(Error::UnknownPortal(other.to_string())),
        }
    }
}

/// Identity fields read off the portal's result page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedIdentityRecord {
    /// Profile photo: either a URL or a `data:image/...` URL
    pub image: String,
    #[serde(rename = "FAN")]
    pub fan: String,
    pub name: String,
    pub region: String,
    pub dob: String,
    pub zone: String,
    pub sex: String,
    pub woreda: String,
    pub nationality: String,
    pub phone: String,
}

/// A full name split the way the portal prints it: given name first,
/// family name last, anything in between is the middle name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameParts {
    pub first: String,
    pub middle: String,
    pub last: String,
}

impl NameParts {
    pub fn split(full_name: &str) -> Self {
        let parts: Vec<&str> = full_name.split_whitespace().collect();
        match parts.as_slice() {
            [] => Self::default(),
            [first] => Self {
                first: first.to_string(),
                ..Self::default()
            },
            [first, last] => Self {
                first: first.to_string(),
                middle: String::new(),
                last: last.to_string(),
            },
            [first, middle @ .., last] => Self {
                first: first.to_string(),
                middle: middle.join(" "),
                last: last.to_string(),
            },
        }
    }

    /// First and middle name, used when echoing a registration back
    pub fn given(&self) -> String {
        format!("{} {}", self.first, self.middle).trim().to_string()
    }
}
