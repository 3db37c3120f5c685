//! Device CRUD handlers

use super::{ApiError, AppState};
use crate::device::{Device, DeviceChanges, NewDevice};
use crate::geocoding::Coordinates;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

/// `GET /api/devices`
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Device>>, ApiError> {
    Ok(Json(state.manager.list().await?))
}

/// Would be shadowed by the `/api/devices/id/{id}` route
const RESERVED_NAME: &str = "id";

fn check_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "device name is required"));
    }
    if name == RESERVED_NAME {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("device name {RESERVED_NAME:?} is reserved"),
        ));
    }
    Ok(())
}

/// `POST /api/devices`; registers and geocodes before the row exists
pub async fn create(
    State(state): State<AppState>,
    Json(new): Json<NewDevice>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    check_name(&new.name)?;
    let device = state.manager.create(new).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// `GET /api/devices/{name}`
pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Device>, ApiError> {
    Ok(Json(state.manager.load(&name).await?.device))
}

/// `GET /api/devices/id/{id}`
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Device>, ApiError> {
    Ok(Json(state.manager.load_by_id(id).await?.device))
}

/// `PUT /api/devices/{name}`
pub async fn update(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(changes): Json<DeviceChanges>,
) -> Result<Json<Device>, ApiError> {
    if let Some(new_name) = changes.name.as_deref() {
        check_name(new_name)?;
    }
    Ok(Json(state.manager.update(&name, changes).await?))
}

/// `DELETE /api/devices/{name}`
pub async fn delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.manager.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/devices/{name}/coordinates`
pub async fn coordinates(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Coordinates>, ApiError> {
    let mut loaded = state.manager.load(&name).await?;
    Ok(Json(state.manager.coordinates(&mut loaded).await?))
}
