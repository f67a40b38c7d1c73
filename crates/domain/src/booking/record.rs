use chrono::{DateTime, Utc};
use common::{OwnerId, RecordId, UnitId};
use serde::{Deserialize, Serialize};

use super::RecordStatus;

/// A booking: one seat on one unit, held for one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub id: RecordId,
    /// The unit the seat was taken from.
    pub subject_id: UnitId,
    pub owner_id: OwnerId,
    /// Opaque token the payment was (or will be) collected with.
    pub payment_token: String,
    pub status: RecordStatus,
    /// Set on confirm, cleared on cancel.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationRecord {
    pub(crate) fn new(
        subject_id: UnitId,
        owner_id: OwnerId,
        payment_token: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            subject_id,
            owner_id,
            payment_token: payment_token.into(),
            status: RecordStatus::Unconfirmed,
            reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == RecordStatus::Confirmed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RecordStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_unconfirmed_without_reference() {
        let record = ReservationRecord::new(UnitId::new("FL-1"), OwnerId::new("c-1"), "tok");
        assert_eq!(record.status, RecordStatus::Unconfirmed);
        assert!(record.reference.is_none());
        assert_eq!(record.created_at, record.updated_at);
        assert!(!record.is_confirmed());
    }

    #[test]
    fn test_document_uses_stored_status_names() {
        let record = ReservationRecord::new(UnitId::new("FL-1"), OwnerId::new("c-1"), "tok");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "UNCONFIRMED");
        assert_eq!(json["subject_id"], "FL-1");
        assert!(json["reference"].is_null());
    }
}
