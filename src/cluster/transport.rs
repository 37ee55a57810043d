//! Outbound link from a client node to its master

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use super::rpc::{PullRequest, NODE_NAME_HEADER, SYNC_PATH};
use crate::storage::models::Snapshot;
use crate::tokens::TokenError;

/// Why a pull did not produce a snapshot
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Master denied the pull")]
    Denied,
    #[error("Unexpected response from master: {0}")]
    Decode(String),
    #[error("Master returned status {0}")]
    Status(u16),
    #[error("Pull timed out after {0:?}")]
    Timeout(Duration),
    #[error("Failed to issue inter-node token: {0}")]
    Token(#[from] TokenError),
    #[error("Failed to contact master: {0}")]
    Transport(String),
}

/// Performs one pull against the master. Timeouts are applied by the caller.
#[async_trait]
pub trait MasterLink: Send + Sync {
    async fn pull(&self, request: PullRequest) -> Result<Snapshot, SyncError>;
}

/// Pulls over HTTP from the master's sync endpoint
pub struct HttpMasterLink {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMasterLink {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl MasterLink for HttpMasterLink {
    async fn pull(&self, request: PullRequest) -> Result<Snapshot, SyncError> {
        let url = format!("{}{}", self.base_url, SYNC_PATH);

        let mut builder = self.client.get(&url);
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(name) = &request.node_name {
            builder = builder.header(NODE_NAME_HEADER, name);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<Snapshot>()
                .await
                .map_err(|e| SyncError::Decode(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(SyncError::Denied),
            status => Err(SyncError::Status(status.as_u16())),
        }
    }
}
