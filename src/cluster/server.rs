//! Master-side pull handling
//!
//! Authenticates the requesting node and returns a freshly composed snapshot
//! of both authoritative stores. This is a pure query path.

use std::sync::Arc;

use tracing::{debug, warn};

use super::rpc::PullRequest;
use crate::error::NodeError;
use crate::storage::models::Snapshot;
use crate::storage::Stores;
use crate::tokens::TokenAuthority;

pub struct ReplicationServer {
    authority: Arc<TokenAuthority>,
    stores: Arc<Stores>,
}

impl ReplicationServer {
    pub fn new(authority: Arc<TokenAuthority>, stores: Arc<Stores>) -> Self {
        Self { authority, stores }
    }

    pub async fn handle_pull(&self, request: PullRequest) -> Result<Snapshot, NodeError> {
        let claimed = request.node_name.as_deref().unwrap_or("<unnamed>");

        let Some(token) = request.token.as_deref() else {
            warn!(node = %claimed, "Rejected pull without a bearer token");
            return Err(NodeError::AuthorizationDenied);
        };

        let claims = match self.authority.verify(token) {
            Ok(claims) => claims,
            Err(_) => {
                warn!(node = %claimed, "Rejected pull with an invalid token");
                return Err(NodeError::AuthorizationDenied);
            }
        };

        if claims.node != claimed {
            warn!(
                token_node = %claims.node,
                declared_node = %claimed,
                "Declared node name does not match token"
            );
        }

        let snapshot = self.stores.snapshot().await?;
        debug!(
            node = %claims.node,
            users = snapshot.users.len(),
            nodes = snapshot.nodes.len(),
            "Served snapshot"
        );
        Ok(snapshot)
    }
}
