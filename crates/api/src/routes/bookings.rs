//! Booking endpoints: run the reservation saga, read, confirm and cancel.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use common::OwnerId;
use domain::{RecordStatus, ReservationRecord};
use saga::{
    CancellationOutcome, CompensationReport, FailureKind, ReservationRequest, ResponseClass,
    SagaError, SagaFailure, SagaOutcome, SagaStep,
};
use serde::{Deserialize, Serialize};

use super::parse_record_id;
use crate::AppState;
use crate::auth::{Caller, require_admin, require_owner_or_admin};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub subject_id: String,
    pub payment_token: String,
    /// Book on behalf of another customer (admin only).
    pub owner_id: Option<String>,
}

/// A record as exposed over HTTP. The payment token is never returned.
#[derive(Serialize)]
pub struct RecordResponse {
    pub id: String,
    pub subject_id: String,
    pub owner_id: String,
    pub status: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReservationRecord> for RecordResponse {
    fn from(record: ReservationRecord) -> Self {
        Self {
            id: record.id.to_string(),
            subject_id: record.subject_id.to_string(),
            owner_id: record.owner_id.to_string(),
            status: record.status.to_string(),
            reference: record.reference,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct BookingCreatedResponse {
    pub saga_id: String,
    pub record_id: String,
    pub reference: String,
    pub status: &'static str,
    pub amount_cents: i64,
    pub receipt_url: String,
    pub notification_sent: bool,
}

/// Body of a failed booking. Charge details appear only once payment was
/// attempted.
#[derive(Serialize)]
pub struct BookingFailedResponse {
    pub error: String,
    pub saga_id: String,
    pub failed_step: SagaStep,
    pub failure_kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_attempted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_succeeded: Option<bool>,
    pub compensations: Vec<CompensationReport>,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub id: String,
    pub status: String,
    pub reference: String,
}

#[derive(Serialize)]
pub struct CancellationResponse {
    pub record: RecordResponse,
    pub previous_status: String,
    pub already_cancelled: bool,
    pub refund_attempted: bool,
    pub compensations: Vec<CompensationReport>,
    pub notification_sent: bool,
}

impl From<CancellationOutcome> for CancellationResponse {
    fn from(outcome: CancellationOutcome) -> Self {
        Self {
            already_cancelled: outcome.was_noop(),
            refund_attempted: outcome.refund_attempted(),
            previous_status: outcome.previous.to_string(),
            notification_sent: outcome.notification.is_some(),
            compensations: outcome.compensations,
            record: outcome.record.into(),
        }
    }
}

/// POST /bookings: run the reservation saga for the caller.
///
/// 201 on success, 400 for failures before the charge was captured, 500 for
/// confirmation failures after the charge and for unexpected failures.
#[tracing::instrument(skip(state, req), fields(customer_id = %caller.customer_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Response, ApiError> {
    let owner_id = match req.owner_id.as_deref().map(str::trim) {
        Some(owner) if !owner.is_empty() => OwnerId::new(owner),
        _ => caller.customer_id.clone(),
    };
    require_owner_or_admin(&caller, &owner_id)?;

    let request = ReservationRequest::new(&req.subject_id, owner_id.as_str(), &req.payment_token)
        .map_err(SagaError::from)?;

    let outcome = state.saga.execute(request).await;
    Ok(booking_response(outcome))
}

fn booking_response(outcome: SagaOutcome) -> Response {
    let Some(failure) = outcome.failure.clone() else {
        let receipt = outcome.receipt.as_ref();
        let body = BookingCreatedResponse {
            saga_id: outcome.saga_id.to_string(),
            record_id: outcome
                .record_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            reference: outcome.reference.clone().unwrap_or_default(),
            status: RecordStatus::Confirmed.as_str(),
            amount_cents: receipt.map(|r| r.amount.cents()).unwrap_or_default(),
            receipt_url: receipt.map(|r| r.receipt_url.clone()).unwrap_or_default(),
            notification_sent: outcome.notification.is_some(),
        };
        return (StatusCode::CREATED, Json(body)).into_response();
    };

    let status = match outcome.response_class() {
        ResponseClass::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(failure_body(outcome, failure))).into_response()
}

fn failure_body(outcome: SagaOutcome, failure: SagaFailure) -> BookingFailedResponse {
    // Steps before collection say nothing about charges.
    let charge_attempted = matches!(
        failure.step,
        SagaStep::CollectPayment | SagaStep::ConfirmRecord
    );
    let report_refund = charge_attempted || failure.kind == FailureKind::Unexpected;

    let error = match failure.kind {
        FailureKind::OutOfCapacity => format!("No seats available on {}", outcome.subject_id),
        FailureKind::RecordRejected => "Booking could not be created".to_string(),
        FailureKind::StorageUnavailable => {
            "Booking could not be completed, please try again".to_string()
        }
        FailureKind::PaymentDeclined => "Payment was declined".to_string(),
        FailureKind::GatewayUnavailable => "Payment could not be processed".to_string(),
        FailureKind::ConfirmationFailed => match outcome.refund_succeeded() {
            Some(true) => "Booking could not be confirmed; your payment was refunded".to_string(),
            _ => "Booking could not be confirmed; the refund attempt failed and will be followed up"
                .to_string(),
        },
        FailureKind::Unexpected => "Unexpected failure while booking".to_string(),
    };

    BookingFailedResponse {
        error,
        saga_id: outcome.saga_id.to_string(),
        failed_step: failure.step,
        failure_kind: failure.kind,
        record_id: charge_attempted
            .then(|| outcome.record_id.map(|id| id.to_string()))
            .flatten(),
        refund_attempted: report_refund.then_some(outcome.refund_attempted),
        refund_succeeded: outcome.refund_succeeded(),
        compensations: outcome.compensations,
    }
}

/// GET /bookings/{id}: owner or admin.
#[tracing::instrument(skip(state, caller))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<RecordResponse>, ApiError> {
    let record = state.saga.records().get(parse_record_id(&id)?).await?;
    require_owner_or_admin(&caller, &record.owner_id)?;
    Ok(Json(record.into()))
}

/// POST /bookings/{id}/confirm: owner or admin. Only UNCONFIRMED records.
#[tracing::instrument(skip(state, caller))]
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let record_id = parse_record_id(&id)?;
    let record = state.saga.records().get(record_id).await?;
    require_owner_or_admin(&caller, &record.owner_id)?;

    let reference = state.saga.records().confirm(record_id).await?;
    Ok(Json(ConfirmResponse {
        id: record_id.to_string(),
        status: RecordStatus::Confirmed.to_string(),
        reference,
    }))
}

/// POST /bookings/{id}/cancel: owner or admin.
#[tracing::instrument(skip(state, caller))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CancellationResponse>, ApiError> {
    let record_id = parse_record_id(&id)?;
    let record = state.saga.records().get(record_id).await?;
    require_owner_or_admin(&caller, &record.owner_id)?;

    let outcome = state.saga.cancel(record_id).await?;
    Ok(Json(outcome.into()))
}

/// POST /bookings/{id}/force-cancel: admin. Also accepts UNCONFIRMED records
/// left behind by an interrupted booking.
#[tracing::instrument(skip(state, caller))]
pub async fn force_cancel(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CancellationResponse>, ApiError> {
    require_admin(&caller)?;

    let outcome = state.saga.force_cancel(parse_record_id(&id)?).await?;
    Ok(Json(outcome.into()))
}
