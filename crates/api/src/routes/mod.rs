//! HTTP route handlers.

pub mod bookings;
pub mod customers;
pub mod system;
pub mod units;

use common::RecordId;

use crate::error::ApiError;

fn parse_record_id(id: &str) -> Result<RecordId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid booking id: {e}")))
}
