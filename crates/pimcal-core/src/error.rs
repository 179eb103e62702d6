//! Parse errors for the textual forms of core values.

use thiserror::Error;

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors produced while parsing recurrence rules, durations, zones and
/// date-time text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The recurrence rule text is malformed.
    #[error("invalid recurrence rule: {message}")]
    InvalidRule { message: String },

    /// The duration text is not a valid RFC 5545 duration.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// The time zone name is not known.
    #[error("unknown time zone: {0}")]
    UnknownZone(String),

    /// The date or date-time text is malformed.
    #[error("invalid date-time: {0}")]
    InvalidDateTime(String),
}

impl ParseError {
    /// Creates an invalid rule error.
    pub fn rule(message: impl Into<String>) -> Self {
        Self::InvalidRule {
            message: message.into(),
        }
    }
}
