//! Per-customer views: bookings and loyalty.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::OwnerId;
use domain::RecordStatus;
use saga::LoyaltySummary;
use serde::Deserialize;

use super::bookings::RecordResponse;
use crate::AppState;
use crate::auth::{Caller, require_owner_or_admin};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
}

/// GET /customers/{id}/bookings?status=: self or admin.
#[tracing::instrument(skip(state, caller, query))]
pub async fn bookings(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<RecordResponse>>, ApiError> {
    let owner_id = OwnerId::new(id);
    require_owner_or_admin(&caller, &owner_id)?;

    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<RecordStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let records = state
        .saga
        .records()
        .list_by_owner(&owner_id, status)
        .await?;
    Ok(Json(records.into_iter().map(RecordResponse::from).collect()))
}

/// GET /loyalty/{customer_id}: self or admin.
#[tracing::instrument(skip(state, caller))]
pub async fn loyalty(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(customer_id): Path<String>,
) -> Result<Json<LoyaltySummary>, ApiError> {
    let owner_id = OwnerId::new(customer_id);
    require_owner_or_admin(&caller, &owner_id)?;

    Ok(Json(state.saga.loyalty().summary(&owner_id)))
}
