//! REST surface over the device inventory

mod devices;
mod error;
mod metrics;

pub use error::ApiError;

use crate::device::DeviceManager;
use crate::metrics::GeocodingCallCounter;
use crate::storage::Database;
use axum::routing::{delete, get};
use axum::Router;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DeviceManager>,
    pub db: Database,
    pub counter: Arc<GeocodingCallCounter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/devices", get(devices::list).post(devices::create))
        .route(
            "/api/devices/{name}",
            get(devices::get).put(devices::update).delete(devices::delete),
        )
        .route("/api/devices/id/{id}", get(devices::get_by_id))
        .route("/api/devices/{name}/coordinates", get(devices::coordinates))
        .route(
            "/api/devices/{name}/metrics",
            get(metrics::list_readings).post(metrics::record_reading),
        )
        .route(
            "/api/metric-types",
            get(metrics::list_types).post(metrics::create_type),
        )
        .route("/api/metric-types/{id}", delete(metrics::delete_type))
        .route("/metrics", get(metrics::exposition))
        .route("/api/health", get(metrics::health))
        .with_state(state)
}
