//! HTTP API server for the reservation saga.
//!
//! Provides REST endpoints for inventory units, bookings and loyalty, with
//! structured logging (tracing) and Prometheus metrics. Handlers only map
//! requests to saga inputs and saga results to status codes.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::UnitId;
use domain::{InventoryUnit, LedgerError};
use kv_store::KvStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{InMemoryLoyaltyLedger, InMemoryNotifier, InMemoryPaymentGateway, ReservationSaga};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::{Config, SeedUnit};

/// Store shared by the ledger and the record store.
pub type SharedStore = Arc<dyn KvStore>;

/// The saga as wired by the server.
pub type Saga =
    ReservationSaga<SharedStore, InMemoryPaymentGateway, InMemoryLoyaltyLedger, InMemoryNotifier>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub saga: Saga,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route(
            "/units",
            get(routes::units::list).post(routes::units::create),
        )
        .route("/units/{id}", get(routes::units::get))
        .route("/units/{id}/reserve", post(routes::units::reserve))
        .route("/units/{id}/release", post(routes::units::release))
        .route("/bookings", post(routes::bookings::create))
        .route("/bookings/{id}", get(routes::bookings::get))
        .route("/bookings/{id}/confirm", post(routes::bookings::confirm))
        .route("/bookings/{id}/cancel", post(routes::bookings::cancel))
        .route(
            "/bookings/{id}/force-cancel",
            post(routes::bookings::force_cancel),
        )
        .route(
            "/customers/{id}/bookings",
            get(routes::customers::bookings),
        )
        .route("/loyalty/{customer_id}", get(routes::customers::loyalty))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store` with the in-memory gateway and
/// sinks.
pub fn create_state(store: SharedStore, config: &Config) -> Arc<AppState> {
    let saga = ReservationSaga::new(
        store,
        InMemoryPaymentGateway::with_price(config.payment_amount),
        InMemoryLoyaltyLedger::new(),
        InMemoryNotifier::new(),
    )
    .with_config(config.saga_config());

    Arc::new(AppState { saga })
}

/// Registers the catalog units. Units that already exist are left untouched,
/// so seeding a persistent store twice is harmless.
#[tracing::instrument(skip_all, fields(count = units.len()))]
pub async fn seed_units(state: &AppState, units: &[SeedUnit]) -> Result<usize, LedgerError> {
    let mut registered = 0;
    for seed in units {
        let unit = InventoryUnit::new(UnitId::new(seed.id.clone()), seed.capacity)?;
        match state.saga.ledger().register(unit).await {
            Ok(unit) => {
                tracing::info!(unit_id = %unit.id, capacity = unit.capacity, "unit seeded");
                registered += 1;
            }
            Err(LedgerError::UnitAlreadyExists(id)) => {
                tracing::debug!(unit_id = %id, "unit already registered");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(registered)
}
