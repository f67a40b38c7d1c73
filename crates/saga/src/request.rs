//! Typed saga input.

use common::{OwnerId, UnitId};
use serde::Serialize;
use thiserror::Error;

/// Longest accepted value for any request field.
pub const MAX_FIELD_LEN: usize = 256;

/// Reasons a reservation request is rejected before the saga starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
}

/// A validated request to reserve one seat on one unit.
///
/// Fields are trimmed and non-empty; construct through [`ReservationRequest::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationRequest {
    subject_id: UnitId,
    owner_id: OwnerId,
    #[serde(skip)]
    payment_token: String,
}

impl ReservationRequest {
    pub fn new(
        subject_id: impl AsRef<str>,
        owner_id: impl AsRef<str>,
        payment_token: impl AsRef<str>,
    ) -> Result<Self, RequestError> {
        Ok(Self {
            subject_id: UnitId::new(validated("subject_id", subject_id.as_ref())?),
            owner_id: OwnerId::new(validated("owner_id", owner_id.as_ref())?),
            payment_token: validated("payment_token", payment_token.as_ref())?.to_string(),
        })
    }

    pub fn subject_id(&self) -> &UnitId {
        &self.subject_id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn payment_token(&self) -> &str {
        &self.payment_token
    }
}

fn validated<'a>(field: &'static str, value: &'a str) -> Result<&'a str, RequestError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RequestError::Missing(field));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(RequestError::TooLong {
            field,
            max: MAX_FIELD_LEN,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_trimmed() {
        let request = ReservationRequest::new(" FL-0001 ", "c-1\n", "\ttok_visa").unwrap();
        assert_eq!(request.subject_id().as_str(), "FL-0001");
        assert_eq!(request.owner_id().as_str(), "c-1");
        assert_eq!(request.payment_token(), "tok_visa");
    }

    #[test]
    fn test_blank_field_rejected() {
        assert_eq!(
            ReservationRequest::new("FL-0001", "   ", "tok"),
            Err(RequestError::Missing("owner_id"))
        );
        assert_eq!(
            ReservationRequest::new("", "c-1", "tok"),
            Err(RequestError::Missing("subject_id"))
        );
    }

    #[test]
    fn test_overlong_field_rejected() {
        let token = "x".repeat(MAX_FIELD_LEN + 1);
        assert_eq!(
            ReservationRequest::new("FL-0001", "c-1", token),
            Err(RequestError::TooLong {
                field: "payment_token",
                max: MAX_FIELD_LEN
            })
        );
        assert!(ReservationRequest::new("FL-0001", "c-1", "x".repeat(MAX_FIELD_LEN)).is_ok());
    }

    #[test]
    fn test_token_not_serialized() {
        let request = ReservationRequest::new("FL-0001", "c-1", "tok_secret").unwrap();
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("tok_secret"));
    }
}
