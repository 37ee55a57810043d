//! Shared request/response types for the master's pull endpoint

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Path of the pull endpoint on the master
pub const SYNC_PATH: &str = "/api/v1/sync";

/// Header carrying the requesting node's declared name
pub const NODE_NAME_HEADER: &str = "x-node-name";

/// Header carrying the static admin key
pub const API_KEY_HEADER: &str = "x-api-key";

/// An incoming or outgoing pull, as carried by request headers.
///
/// Both fields are optional so that a request with missing headers still
/// reaches the role check and the token check in that order.
#[derive(Debug, Clone, Default)]
pub struct PullRequest {
    /// Declared by the caller; informational only, never trusted
    pub node_name: Option<String>,
    /// Bearer inter-node token
    pub token: Option<String>,
}

impl PullRequest {
    pub fn new(token: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            node_name: Some(node_name.into()),
            token: Some(token.into()),
        }
    }
}

/// Health report served by both roles
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    /// Seconds since the cached snapshot was accepted (client only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age_seconds: Option<u64>,
    /// Wall-clock time the cached snapshot was accepted (client only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_accepted_at: Option<DateTime<Utc>>,
    /// Whether the cache is within its TTL (client only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fresh: Option<bool>,
    pub node: String,
    pub nodes: usize,
    pub role: String,
    pub status: String,
    pub users: usize,
}
