//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{LedgerError, RecordError};
use saga::SagaError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// No caller identity on the request.
    #[error("Missing caller identity")]
    Unauthorized,

    /// The caller lacks the required capability.
    #[error("{0}")]
    Forbidden(String),

    /// Inventory ledger error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Record store error.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Saga error outside of `execute` (validation, cancellation).
    #[error(transparent)]
    Saga(#[from] SagaError),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Ledger(err) => ledger_status(err),
            ApiError::Record(err) => record_status(err),
            ApiError::Saga(err) => saga_status(err),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "internal server error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::OutOfCapacity(_)
        | LedgerError::AtMaximumCapacity(_)
        | LedgerError::UnitAlreadyExists(_) => StatusCode::CONFLICT,
        LedgerError::UnitNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InvalidCapacity { .. } | LedgerError::UnitIdRequired => {
            StatusCode::BAD_REQUEST
        }
        LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn record_status(err: &RecordError) -> StatusCode {
    match err {
        RecordError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        RecordError::InvalidTransition { .. } | RecordError::AlreadyExists(_) => {
            StatusCode::CONFLICT
        }
        RecordError::InvalidReference(_) => StatusCode::BAD_REQUEST,
        RecordError::Store(_) | RecordError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SagaError::NotCancellable { .. } => StatusCode::CONFLICT,
        SagaError::Ledger(err) => ledger_status(err),
        SagaError::Record(err) => record_status(err),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{RecordId, UnitId};
    use domain::RecordStatus;
    use kv_store::StoreError;
    use saga::RequestError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (
                LedgerError::OutOfCapacity(UnitId::new("u")).into(),
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::UnitNotFound(UnitId::new("u")).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                RecordError::InvalidTransition {
                    id: RecordId::new(),
                    from: RecordStatus::Cancelled,
                    to: RecordStatus::Confirmed,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                SagaError::from(RequestError::Missing("subject_id")).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                SagaError::from(RecordError::RecordNotFound(RecordId::new())).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                RecordError::Store(StoreError::Unavailable("down".into())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{error}");
        }
    }
}
