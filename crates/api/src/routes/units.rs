//! Inventory unit endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::UnitId;
use domain::InventoryUnit;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::auth::{Caller, require_admin};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateUnitRequest {
    pub id: String,
    pub capacity: u32,
    /// Defaults to `capacity`.
    pub available: Option<u32>,
}

#[derive(Serialize)]
pub struct UnitResponse {
    pub id: String,
    pub available: u32,
    pub capacity: u32,
    pub sold_out: bool,
}

impl From<InventoryUnit> for UnitResponse {
    fn from(unit: InventoryUnit) -> Self {
        Self {
            sold_out: unit.is_sold_out(),
            id: unit.id.to_string(),
            available: unit.available,
            capacity: unit.capacity,
        }
    }
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub id: String,
    pub available: u32,
}

/// POST /units: register a unit (admin).
#[tracing::instrument(skip(state, req), fields(unit_id = %req.id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateUnitRequest>,
) -> Result<(StatusCode, Json<UnitResponse>), ApiError> {
    require_admin(&caller)?;

    let id = UnitId::new(req.id.trim());
    let unit = match req.available {
        Some(available) => InventoryUnit::with_available(id, available, req.capacity)?,
        None => InventoryUnit::new(id, req.capacity)?,
    };
    let unit = state.saga.ledger().register(unit).await?;

    Ok((StatusCode::CREATED, Json(unit.into())))
}

/// GET /units
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UnitResponse>>, ApiError> {
    let units = state.saga.ledger().list().await?;
    Ok(Json(units.into_iter().map(UnitResponse::from).collect()))
}

/// GET /units/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UnitResponse>, ApiError> {
    let unit = state.saga.ledger().get(&UnitId::new(id)).await?;
    Ok(Json(unit.into()))
}

/// POST /units/{id}/reserve: take one seat outside of a booking (admin).
#[tracing::instrument(skip(state, caller))]
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    require_admin(&caller)?;

    let available = state.saga.ledger().reserve(&UnitId::new(id.clone())).await?;
    Ok(Json(AvailabilityResponse { id, available }))
}

/// POST /units/{id}/release: return one seat (admin).
#[tracing::instrument(skip(state, caller))]
pub async fn release(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    require_admin(&caller)?;

    let available = state.saga.ledger().release(&UnitId::new(id.clone())).await?;
    Ok(Json(AvailabilityResponse { id, available }))
}
