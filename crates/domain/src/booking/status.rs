//! Reservation record state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of a reservation record.
///
/// State transitions:
/// ```text
/// UNCONFIRMED ──confirm──► CONFIRMED
///      │                       │
///      └────────cancel─────────┴──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Created by the saga, payment not yet settled.
    #[default]
    Unconfirmed,

    /// Paid and confirmed; carries a reference.
    Confirmed,

    /// Cancelled (terminal state).
    Cancelled,
}

impl RecordStatus {
    /// Returns true if the record can be confirmed in this state.
    pub fn can_confirm(&self) -> bool {
        matches!(self, RecordStatus::Unconfirmed)
    }

    /// Returns true if cancelling would change this state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Cancelled)
    }

    /// Returns the status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Unconfirmed => "UNCONFIRMED",
            RecordStatus::Confirmed => "CONFIRMED",
            RecordStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a string does not name a status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown record status: {0}")]
pub struct ParseStatusError(pub String);

impl std::str::FromStr for RecordStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNCONFIRMED" => Ok(RecordStatus::Unconfirmed),
            "CONFIRMED" => Ok(RecordStatus::Confirmed),
            "CANCELLED" => Ok(RecordStatus::Cancelled),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unconfirmed() {
        assert_eq!(RecordStatus::default(), RecordStatus::Unconfirmed);
    }

    #[test]
    fn test_only_unconfirmed_can_confirm() {
        assert!(RecordStatus::Unconfirmed.can_confirm());
        assert!(!RecordStatus::Confirmed.can_confirm());
        assert!(!RecordStatus::Cancelled.can_confirm());
    }

    #[test]
    fn test_can_cancel_from_non_terminal_states() {
        assert!(RecordStatus::Unconfirmed.can_cancel());
        assert!(RecordStatus::Confirmed.can_cancel());
        assert!(!RecordStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RecordStatus::Unconfirmed.is_terminal());
        assert!(!RecordStatus::Confirmed.is_terminal());
        assert!(RecordStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_serialized_form_matches_as_str() {
        for status in [
            RecordStatus::Unconfirmed,
            RecordStatus::Confirmed,
            RecordStatus::Cancelled,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().to_string()));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("confirmed".parse::<RecordStatus>(), Ok(RecordStatus::Confirmed));
        assert_eq!("CANCELLED".parse::<RecordStatus>(), Ok(RecordStatus::Cancelled));
        assert!("shipped".parse::<RecordStatus>().is_err());
    }
}
