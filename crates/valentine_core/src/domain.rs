//! crates/valentine_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Maximum number of characters accepted for a sender or recipient name.
pub const MAX_NAME_CHARS: usize = 30;

const MAX_CODE_LEN: usize = 64;

//=========================================================================================
// Validation
//=========================================================================================

/// Client-side rejection of a name, raised before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Name must not be empty")]
    Empty,
    #[error("Name is too long: {actual} characters (max {max})")]
    TooLong { max: usize, actual: usize },
}

fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let actual = trimmed.chars().count();
    if actual > MAX_NAME_CHARS {
        return Err(ValidationError::TooLong {
            max: MAX_NAME_CHARS,
            actual,
        });
    }
    Ok(trimmed.to_string())
}

//=========================================================================================
// Value Objects
//=========================================================================================

/// The short public identifier of a valentine, embedded in share URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Code(String);

impl Code {
    /// Parses a code coming from the outside world (a URL parameter, a path segment).
    ///
    /// Only URL-safe characters are accepted, so a parsed code can be placed in a
    /// query string without escaping.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_CODE_LEN
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(trimmed.to_string()))
    }

    /// Wraps generator output, which is base-36 by construction.
    pub(crate) fn from_generated(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The name of the person asking the question. Trimmed, 1 to 30 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderName(String);

impl SenderName {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        validate_name(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The optional name of the person being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientName(String);

impl RecipientName {
    /// A blank input means "no recipient" rather than an error.
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match raw {
            Some(s) if !s.trim().is_empty() => validate_name(s).map(|n| Some(Self(n))),
            _ => Ok(None),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The recipient's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reply {
    Yes,
    No,
}

impl Reply {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reply::Yes => "yes",
            Reply::No => "no",
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown reply: {0}")]
pub struct UnknownReply(pub String);

impl FromStr for Reply {
    type Err = UnknownReply;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Reply::Yes),
            "no" => Ok(Reply::No),
            _ => Err(UnknownReply(s.to_string())),
        }
    }
}

//=========================================================================================
// Records
//=========================================================================================

/// A shared valentine as stored by the remote collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ValentineRecord {
    pub id: Uuid,
    pub code: Code,
    pub sender_name: SenderName,
    pub recipient_name: Option<RecipientName>,
    /// Write-once. `None` means unanswered.
    pub reply: Option<Reply>,
    pub created_at: DateTime<Utc>,
    /// Set together with `reply`, never on its own.
    pub replied_at: Option<DateTime<Utc>>,
}

impl ValentineRecord {
    pub fn is_answered(&self) -> bool {
        self.reply.is_some()
    }
}

/// The payload used to insert a new valentine.
#[derive(Debug, Clone, PartialEq)]
pub struct NewValentine {
    pub code: Code,
    pub sender_name: SenderName,
    pub recipient_name: Option<RecipientName>,
}
