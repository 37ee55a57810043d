use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::cluster::rpc::SYNC_PATH;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Admin routes -- master only, gated by the static admin key
    let admin_routes = Router::new()
        .route(
            "/api/v1/users",
            get(handlers::list_users).post(handlers::upsert_user),
        )
        .route(
            "/api/v1/nodes",
            get(handlers::list_nodes).post(handlers::register_node),
        );

    // Read routes -- any node serves these from its own view
    let read_routes = Router::new()
        .route("/api/v1/lookup/:identity", get(handlers::lookup))
        .route("/health", get(handlers::health));

    // Replication routes -- inter-node pulls, master only
    let sync_routes = Router::new().route(SYNC_PATH, get(handlers::sync));

    Router::new()
        .merge(admin_routes)
        .merge(read_routes)
        .merge(sync_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
