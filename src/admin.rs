//! Admin mutations of the authoritative stores (master only).
//!
//! Every operation is gated by the static admin key, which is unrelated to
//! inter-node tokens. Mutations validate the whole record before touching a
//! store, so a rejected call never leaves a partial write behind.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::NodeError;
use crate::storage::models::{CredentialRecord, NodeRecord};
use crate::storage::Stores;

pub struct AdminInterface {
    admin_key: String,
    stores: Arc<Stores>,
}

impl AdminInterface {
    pub fn new(admin_key: impl Into<String>, stores: Arc<Stores>) -> Self {
        Self {
            admin_key: admin_key.into(),
            stores,
        }
    }

    pub fn authorize(&self, presented: Option<&str>) -> Result<(), NodeError> {
        match presented {
            Some(key) if !self.admin_key.is_empty() && key == self.admin_key => Ok(()),
            _ => {
                warn!("Rejected admin request with missing or invalid API key");
                Err(NodeError::AuthorizationDenied)
            }
        }
    }

    pub async fn add_or_update_user(
        &self,
        presented: Option<&str>,
        identity: &str,
        credential: &str,
    ) -> Result<CredentialRecord, NodeError> {
        self.authorize(presented)?;
        validate_user(identity, credential)?;

        let record = CredentialRecord::new(identity, credential);
        self.stores.credentials.upsert(&record).await?;
        info!(identity = %record.identity, "User added or updated");
        Ok(record)
    }

    pub async fn register_node(
        &self,
        presented: Option<&str>,
        record: NodeRecord,
    ) -> Result<NodeRecord, NodeError> {
        self.authorize(presented)?;
        validate_node(&record)?;

        self.stores.topology.upsert(&record).await?;
        info!(node = %record.name, host = %record.host, port = record.port, "Node registered");
        Ok(record)
    }

    pub async fn list_users(
        &self,
        presented: Option<&str>,
    ) -> Result<Vec<CredentialRecord>, NodeError> {
        self.authorize(presented)?;
        Ok(self.stores.credentials.list().await?)
    }

    pub async fn list_nodes(&self, presented: Option<&str>) -> Result<Vec<NodeRecord>, NodeError> {
        self.authorize(presented)?;
        Ok(self.stores.topology.list().await?)
    }
}

pub(crate) fn validate_user(identity: &str, credential: &str) -> Result<(), NodeError> {
    if identity.trim().is_empty() {
        return Err(NodeError::Validation("username is required".to_string()));
    }
    if credential.trim().is_empty() {
        return Err(NodeError::Validation("uuid is required".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_node(record: &NodeRecord) -> Result<(), NodeError> {
    if record.name.trim().is_empty() {
        return Err(NodeError::Validation("node name is required".to_string()));
    }
    if record.host.trim().is_empty() || record.host.chars().any(char::is_whitespace) {
        return Err(NodeError::Validation(format!(
            "invalid host for node {}",
            record.name
        )));
    }
    if record.port == 0 {
        return Err(NodeError::Validation(
            "port must be between 1 and 65535".to_string(),
        ));
    }
    Ok(())
}
