//! Authoritative credential and topology stores of a master node.
//!
//! Each store owns one key-space and a reader/writer lock over it, so two
//! admin writes to the same store never interleave while writes to different
//! stores proceed independently. Reads of both stores for a snapshot take the
//! read locks in a fixed order (credentials, then topology).

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::models::{CredentialRecord, NodeRecord, Snapshot};
use super::persistence::{Persistence, PersistenceError};

pub struct CredentialStore {
    backend: Arc<dyn Persistence>,
    lock: RwLock<()>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn Persistence>) -> Self {
        Self {
            backend,
            lock: RwLock::new(()),
        }
    }

    pub async fn list(&self) -> Result<Vec<CredentialRecord>, PersistenceError> {
        let _guard = self.lock.read().await;
        self.backend.load_credentials()
    }

    pub async fn upsert(&self, record: &CredentialRecord) -> Result<(), PersistenceError> {
        let _guard = self.lock.write().await;
        self.backend.upsert_credential(record)?;
        tracing::debug!(identity = %record.identity, "Upserted credential");
        Ok(())
    }
}

pub struct TopologyStore {
    backend: Arc<dyn Persistence>,
    lock: RwLock<()>,
}

impl TopologyStore {
    pub fn new(backend: Arc<dyn Persistence>) -> Self {
        Self {
            backend,
            lock: RwLock::new(()),
        }
    }

    pub async fn list(&self) -> Result<Vec<NodeRecord>, PersistenceError> {
        let _guard = self.lock.read().await;
        self.backend.load_nodes()
    }

    pub async fn upsert(&self, record: &NodeRecord) -> Result<(), PersistenceError> {
        let _guard = self.lock.write().await;
        self.backend.upsert_node(record)?;
        tracing::debug!(
            node = %record.name,
            host = %record.host,
            port = record.port,
            "Upserted node"
        );
        Ok(())
    }
}

/// Both authoritative stores over one backing
pub struct Stores {
    pub credentials: CredentialStore,
    pub topology: TopologyStore,
}

impl Stores {
    pub fn new(backend: Arc<dyn Persistence>) -> Self {
        Self {
            credentials: CredentialStore::new(Arc::clone(&backend)),
            topology: TopologyStore::new(backend),
        }
    }

    /// Compose a snapshot with both stores read-locked for the whole read.
    pub async fn snapshot(&self) -> Result<Snapshot, PersistenceError> {
        let _credentials_guard = self.credentials.lock.read().await;
        let _topology_guard = self.topology.lock.read().await;

        let credentials = self.credentials.backend.load_credentials()?;
        let nodes = self.topology.backend.load_nodes()?;

        Ok(Snapshot::compose(credentials, nodes, Utc::now()))
    }
}
