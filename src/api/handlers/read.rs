//! Local read surface, served by both roles from their own view of the state

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::cluster::rpc::NodeStatus;
use crate::storage::models::NodeRecord;
use crate::AppState;

/// Everything a subscription renderer needs for one user
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub credential: String,
    pub identity: String,
    pub nodes: Vec<NodeRecord>,
}

pub async fn lookup(
    State(state): State<Arc<AppState>>,
    Path(identity): Path<String>,
) -> Result<Json<JSend<LookupResponse>>, ApiError> {
    let view = state.node.view().await?;

    let credential = view
        .credential(&identity)
        .ok_or_else(|| ApiError::not_found("User not found"))?
        .to_string();

    Ok(JSend::success(LookupResponse {
        credential,
        identity,
        nodes: view.nodes.clone(),
    }))
}

pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<NodeStatus>>, ApiError> {
    Ok(JSend::success(state.node.status().await?))
}
