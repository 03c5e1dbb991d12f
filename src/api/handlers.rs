use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{
    DeviceHeartbeat, NewDeviceHeartbeat, NewPumpRunTime, NewTemperatureReading, PumpRunTime,
    TemperatureReading,
};
use crate::storage::{RecordStore, StorageError};

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Temperatures
// ============================================================================

#[derive(Deserialize)]
pub struct TemperatureFilter {
    pub location: Option<String>,
}

pub async fn list_temperatures(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TemperatureFilter>,
) -> Result<Json<Vec<TemperatureReading>>, ApiError> {
    let location = filter.location.as_deref().filter(|l| !l.trim().is_empty());
    let readings = state.store.list_temperatures(location).await?;
    Ok(Json(readings))
}

pub async fn create_temperature(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewTemperatureReading>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(reading) = payload?;
    let stored = state.store.insert_temperature(reading).await?;

    tracing::debug!(id = stored.id, location = %stored.location, "Temperature recorded");
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn get_temperature(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<TemperatureReading>, ApiError> {
    let Path(id) = id?;
    state
        .store
        .get_temperature(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Temperature reading {} not found", id)))
}

pub async fn delete_temperature(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    if state.store.delete_temperature(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Temperature reading {} not found",
            id
        )))
    }
}

// ============================================================================
// Pump run times
// ============================================================================

pub async fn list_pump_runs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PumpRunTime>>, ApiError> {
    Ok(Json(state.store.list_pump_runs().await?))
}

pub async fn list_critical_pump_runs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PumpRunTime>>, ApiError> {
    Ok(Json(state.store.list_critical_pump_runs().await?))
}

pub async fn create_pump_run(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewPumpRunTime>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(run) = payload?;
    let stored = state.store.insert_pump_run(run).await?;

    if stored.low_current {
        tracing::info!(
            id = stored.id,
            current = stored.current,
            "Low-current pump run recorded"
        );
    }
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn get_pump_run(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<PumpRunTime>, ApiError> {
    let Path(id) = id?;
    state
        .store
        .get_pump_run(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Pump run {} not found", id)))
}

pub async fn delete_pump_run(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    if state.store.delete_pump_run(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Pump run {} not found", id)))
    }
}

// ============================================================================
// Heartbeats
// ============================================================================

pub async fn create_heartbeat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewDeviceHeartbeat>, JsonRejection>,
) -> Result<(StatusCode, Json<DeviceHeartbeat>), ApiError> {
    let Json(heartbeat) = payload?;
    let stored = state.store.insert_heartbeat(heartbeat).await?;

    tracing::debug!(device_id = %stored.device_id, pump = stored.pump, "Heartbeat recorded");
    Ok((StatusCode::CREATED, Json(stored)))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Invalid(msg) => ApiError::BadRequest(msg),
            other => {
                tracing::error!(error = %other, "Store request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
