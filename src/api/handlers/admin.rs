use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::api_key;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::error::NodeError;
use crate::storage::models::NodeRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct UpsertUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Serialize)]
pub struct UpsertUserResponse {
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterNodeRequest {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub name: String,
    /// Wider than `u16` so out-of-range ports are a validation error
    #[serde(default)]
    pub port: i64,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NodesResponse {
    pub nodes: Vec<NodeRecord>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<JSend<UsersResponse>>, ApiError> {
    let admin = state.node.admin()?;
    let records = admin.list_users(api_key(&headers).as_deref()).await?;

    Ok(JSend::success(UsersResponse {
        users: records
            .into_iter()
            .map(|record| (record.identity, record.credential))
            .collect(),
    }))
}

pub async fn upsert_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(req): AppJson<UpsertUserRequest>,
) -> Result<Json<JSend<UpsertUserResponse>>, ApiError> {
    let admin = state.node.admin()?;
    let record = admin
        .add_or_update_user(api_key(&headers).as_deref(), &req.username, &req.uuid)
        .await?;

    Ok(JSend::success(UpsertUserResponse {
        user: record.identity,
    }))
}

pub async fn list_nodes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<JSend<NodesResponse>>, ApiError> {
    let admin = state.node.admin()?;
    let nodes = admin.list_nodes(api_key(&headers).as_deref()).await?;
    Ok(JSend::success(NodesResponse { nodes }))
}

pub async fn register_node(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(req): AppJson<RegisterNodeRequest>,
) -> Result<Json<JSend<NodeRecord>>, ApiError> {
    let admin = state.node.admin()?;
    let key = api_key(&headers);
    admin.authorize(key.as_deref())?;

    let port = u16::try_from(req.port)
        .map_err(|_| NodeError::Validation("port must be between 1 and 65535".to_string()))?;
    let record = NodeRecord {
        host: req.host,
        name: req.name,
        port,
        region: req.region.filter(|r| !r.trim().is_empty()),
    };

    let record = admin.register_node(key.as_deref(), record).await?;
    Ok(JSend::success(record))
}
