//! Metric types, device readings, exposition and health

use super::{ApiError, AppState};
use crate::metrics::EXPOSITION_CONTENT_TYPE;
use crate::storage::{DeviceMetric, MetricType, NewDeviceMetric, NewMetricType, StoreError};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_READINGS: i64 = 100;

/// `GET /api/metric-types`
pub async fn list_types(State(state): State<AppState>) -> Result<Json<Vec<MetricType>>, ApiError> {
    Ok(Json(state.db.list_metric_types().await?))
}

/// `POST /api/metric-types`
pub async fn create_type(
    State(state): State<AppState>,
    Json(new): Json<NewMetricType>,
) -> Result<(StatusCode, Json<MetricType>), ApiError> {
    if new.name.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "metric type name is required"));
    }
    let metric_type = state.db.create_metric_type(&new).await?;
    Ok((StatusCode::CREATED, Json(metric_type)))
}

/// `DELETE /api/metric-types/{id}`; readings of that type go with it
pub async fn delete_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_metric_type(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    limit: Option<i64>,
}

async fn device_id(state: &AppState, name: &str) -> Result<i64, ApiError> {
    let loaded = state.manager.load(name).await?;
    loaded
        .device
        .id
        .ok_or_else(|| StoreError::NotFound(format!("device {name}")).into())
}

/// `GET /api/devices/{name}/metrics?limit=N`, newest first
pub async fn list_readings(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<Vec<DeviceMetric>>, ApiError> {
    let id = device_id(&state, &name).await?;
    let limit = query.limit.unwrap_or(DEFAULT_READINGS).max(1);
    Ok(Json(state.db.metrics_for_device(id, limit).await?))
}

/// `POST /api/devices/{name}/metrics`
pub async fn record_reading(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(new): Json<NewDeviceMetric>,
) -> Result<(StatusCode, Json<DeviceMetric>), ApiError> {
    let id = device_id(&state, &name).await?;
    let metric = state.db.record_metric(id, &new).await?;
    Ok((StatusCode::CREATED, Json(metric)))
}

/// `GET /metrics` in the OpenMetrics text format
pub async fn exposition(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.counter.render().map_err(|e| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("encoding metrics: {e}"))
    })?;
    Ok(([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body))
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.db.ping().await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "database": "unreachable" })),
        )
    }
}
