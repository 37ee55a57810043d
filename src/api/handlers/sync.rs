use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;

use super::{bearer_token, header_value};
use crate::api::response::ApiError;
use crate::cluster::rpc::{PullRequest, NODE_NAME_HEADER};
use crate::storage::models::Snapshot;
use crate::AppState;

/// Pull endpoint. The success body is the bare snapshot, not a JSend envelope.
pub async fn sync(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Snapshot>, ApiError> {
    let request = PullRequest {
        node_name: header_value(&headers, NODE_NAME_HEADER),
        token: bearer_token(&headers),
    };

    let snapshot = state.node.handle_pull(request).await?;
    Ok(Json(snapshot))
}
