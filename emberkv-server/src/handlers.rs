//! HTTP request handlers.

use crate::error::ApiError;
use axum::extract::{Query, State};
use axum::Json;
use emberkv_cache::{BincodeCodec, Cache};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// The cache as exposed over HTTP: string values, bincode on the wire.
pub type HttpCache = Cache<BincodeCodec<String>>;

/// Shared handler state. The cache carries its own lock, so no outer
/// synchronization is layered on top.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<HttpCache>,
}

impl AppState {
    pub fn new(cache: Arc<HttpCache>) -> Self {
        Self { cache }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetParams {
    pub key: String,
    pub value: String,
    /// TTL in whole seconds; absent or 0 means no expiration.
    #[serde(default)]
    pub ttl: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct KeyParams {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct SetResponse {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `POST /set?key=&value=&ttl=`
pub async fn set_handler(
    State(state): State<AppState>,
    Query(params): Query<SetParams>,
) -> Result<Json<SetResponse>, ApiError> {
    if params.key.is_empty() {
        return Err(ApiError::BadRequest("key must not be empty".to_string()));
    }

    let ttl = Duration::from_secs(params.ttl.unwrap_or(0));
    state.cache.set(&params.key, params.value, ttl)?;

    Ok(Json(SetResponse { key: params.key }))
}

/// `GET /get?key=`
pub async fn get_handler(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
) -> Result<Json<GetResponse>, ApiError> {
    match state.cache.get(&params.key) {
        Some(value) => Ok(Json(GetResponse {
            key: params.key,
            value,
        })),
        None => Err(ApiError::NotFound(params.key)),
    }
}

/// `DELETE /delete?key=`
///
/// Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.cache.delete(&params.key)?;
    Ok(Json(DeleteResponse { key: params.key }))
}

/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
