use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Driver, DriverLocation, DriverStatus, GeoPoint};
use crate::state::AppState;

/// Operational pushes from driver devices, plus the read-back used by ops.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", get(list_drivers))
        .route("/drivers/:id/location", patch(update_location))
        .route("/drivers/:id/status", patch(update_status))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub heading: f64,
    #[serde(default)]
    pub speed: f64,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DriverStatus,
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Driver>>, AppError> {
    Ok(Json(state.store.list_drivers().await?))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    let location = DriverLocation {
        point: GeoPoint {
            lat: payload.lat,
            lng: payload.lng,
        },
        heading: payload.heading,
        speed: payload.speed,
        recorded_at: Utc::now(),
    };

    let driver = state.store.update_driver_location(id, location).await?;
    Ok(Json(driver))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.store.update_driver_status(id, payload.status).await?;
    Ok(Json(driver))
}
