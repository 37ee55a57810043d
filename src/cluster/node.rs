use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::client::ReplicationClient;
use super::rpc::{NodeStatus, PullRequest};
use super::server::ReplicationServer;
use crate::admin::AdminInterface;
use crate::error::NodeError;
use crate::storage::models::{NodeRecord, Snapshot};
use crate::storage::Stores;
use crate::tokens::TokenAuthority;

/// Role of this node, fixed at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Master,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Master => f.write_str("master"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "master" => Ok(Role::Master),
            other => Err(format!(
                "unknown node role '{other}' (expected 'master' or 'client')"
            )),
        }
    }
}

/// The operation set every node serves, with role-specific bodies.
///
/// Exactly one implementation is chosen at start-up.
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    fn role(&self) -> Role;

    fn name(&self) -> &str;

    /// Credentials and topology as one consistent snapshot
    async fn view(&self) -> Result<Arc<Snapshot>, NodeError>;

    async fn list_users(&self) -> Result<BTreeMap<String, String>, NodeError> {
        Ok(self.view().await?.users.clone())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, NodeError> {
        Ok(self.view().await?.nodes.clone())
    }

    async fn handle_pull(&self, request: PullRequest) -> Result<Snapshot, NodeError>;

    fn admin(&self) -> Result<&AdminInterface, NodeError>;

    async fn status(&self) -> Result<NodeStatus, NodeError>;
}

// ============================================================================
// Master
// ============================================================================

pub struct MasterBehavior {
    admin: AdminInterface,
    name: String,
    server: ReplicationServer,
    stores: Arc<Stores>,
}

impl MasterBehavior {
    pub fn new(
        name: impl Into<String>,
        authority: Arc<TokenAuthority>,
        stores: Arc<Stores>,
        admin_key: impl Into<String>,
    ) -> Self {
        Self {
            admin: AdminInterface::new(admin_key, Arc::clone(&stores)),
            name: name.into(),
            server: ReplicationServer::new(authority, Arc::clone(&stores)),
            stores,
        }
    }
}

#[async_trait]
impl NodeBehavior for MasterBehavior {
    fn role(&self) -> Role {
        Role::Master
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn view(&self) -> Result<Arc<Snapshot>, NodeError> {
        Ok(Arc::new(self.stores.snapshot().await?))
    }

    async fn list_users(&self) -> Result<BTreeMap<String, String>, NodeError> {
        let records = self.stores.credentials.list().await?;
        Ok(records
            .into_iter()
            .map(|record| (record.identity, record.credential))
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, NodeError> {
        Ok(self.stores.topology.list().await?)
    }

    async fn handle_pull(&self, request: PullRequest) -> Result<Snapshot, NodeError> {
        self.server.handle_pull(request).await
    }

    fn admin(&self) -> Result<&AdminInterface, NodeError> {
        Ok(&self.admin)
    }

    async fn status(&self) -> Result<NodeStatus, NodeError> {
        let view = self.view().await?;
        Ok(NodeStatus {
            cache_age_seconds: None,
            cache_accepted_at: None,
            fresh: None,
            node: self.name.clone(),
            nodes: view.nodes.len(),
            role: Role::Master.to_string(),
            status: "ok".to_string(),
            users: view.users.len(),
        })
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct ClientBehavior {
    replication: Arc<ReplicationClient>,
}

impl ClientBehavior {
    pub fn new(replication: Arc<ReplicationClient>) -> Self {
        Self { replication }
    }
}

#[async_trait]
impl NodeBehavior for ClientBehavior {
    fn role(&self) -> Role {
        Role::Client
    }

    fn name(&self) -> &str {
        self.replication.node_name()
    }

    async fn view(&self) -> Result<Arc<Snapshot>, NodeError> {
        let cache = self.replication.read().await?;
        Ok(Arc::clone(&cache.snapshot))
    }

    async fn handle_pull(&self, request: PullRequest) -> Result<Snapshot, NodeError> {
        tracing::warn!(
            node = request.node_name.as_deref().unwrap_or("<unnamed>"),
            "Rejected pull: this node is not a master"
        );
        Err(NodeError::RoleMismatch {
            required: Role::Master,
        })
    }

    fn admin(&self) -> Result<&AdminInterface, NodeError> {
        Err(NodeError::RoleMismatch {
            required: Role::Master,
        })
    }

    /// Reports the cache as it is; never triggers a pull.
    async fn status(&self) -> Result<NodeStatus, NodeError> {
        let cache = self.replication.cached();
        let (users, nodes) = cache
            .as_ref()
            .map(|c| (c.snapshot.users.len(), c.snapshot.nodes.len()))
            .unwrap_or_default();

        Ok(NodeStatus {
            cache_age_seconds: cache.as_ref().map(|c| c.age().as_secs()),
            cache_accepted_at: cache.as_ref().map(|c| c.accepted_at),
            fresh: Some(cache.as_ref().is_some_and(|c| self.replication.is_fresh(c))),
            node: self.name().to_string(),
            nodes,
            role: Role::Client.to_string(),
            status: if cache.is_some() { "ok" } else { "no data" }.to_string(),
            users,
        })
    }
}
