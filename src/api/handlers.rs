mod admin;
mod read;
mod sync;

use axum::http::{header, HeaderMap};

use crate::cluster::rpc::API_KEY_HEADER;

pub use admin::{list_nodes, list_users, register_node, upsert_user};
pub use read::{health, lookup};
pub use sync::sync;

/// A header's value as a string, if present and valid UTF-8
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// The token of an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    header_value(headers, header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer ").map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty())
}

fn api_key(headers: &HeaderMap) -> Option<String> {
    header_value(headers, API_KEY_HEADER)
}
