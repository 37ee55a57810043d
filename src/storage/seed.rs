//! Explicit bootstrap of a master's stores from a JSON seed file

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::models::{CredentialRecord, NodeRecord};
use super::persistence::PersistenceError;
use super::stores::Stores;
use crate::admin::{validate_node, validate_user};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid seed entry: {0}")]
    Invalid(String),
    #[error("Malformed seed file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to store seed data: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// identity -> credential
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct SeedStats {
    pub nodes: usize,
    pub users: usize,
}

pub async fn apply_seed_file(stores: &Stores, path: &Path) -> Result<SeedStats, SeedError> {
    let contents = std::fs::read_to_string(path)?;
    let seed: SeedData = serde_json::from_str(&contents)?;
    apply_seed(stores, seed).await
}

/// Upsert every seed entry. All entries are validated before the first write.
pub async fn apply_seed(stores: &Stores, seed: SeedData) -> Result<SeedStats, SeedError> {
    for (identity, credential) in &seed.users {
        validate_user(identity, credential).map_err(|e| SeedError::Invalid(e.to_string()))?;
    }
    for node in &seed.nodes {
        validate_node(node).map_err(|e| SeedError::Invalid(e.to_string()))?;
    }

    for (identity, credential) in &seed.users {
        stores
            .credentials
            .upsert(&CredentialRecord::new(identity.as_str(), credential.as_str()))
            .await?;
    }
    for node in &seed.nodes {
        stores.topology.upsert(node).await?;
    }

    Ok(SeedStats {
        nodes: seed.nodes.len(),
        users: seed.users.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    const SEED: &str = r#"{
        "users": {"testuser": "3b331a0b-fe16-4c0a-9e25-26ba0ac6f57b"},
        "nodes": [
            {"name": "Finland", "host": "fi.example.net", "port": 8443, "region": "EU"},
            {"name": "Bahrain", "host": "10.0.0.2", "port": 8443, "region": "ME"}
        ]
    }"#;

    #[tokio::test]
    async fn test_seed_file_applied_idempotently() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("seed.json");
        std::fs::write(&path, SEED).unwrap();

        let stores = Stores::new(Arc::new(MemoryStore::new()));
        let stats = apply_seed_file(&stores, &path).await.unwrap();
        assert_eq!(stats, SeedStats { nodes: 2, users: 1 });

        apply_seed_file(&stores, &path).await.unwrap();
        assert_eq!(stores.credentials.list().await.unwrap().len(), 1);
        assert_eq!(stores.topology.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_seed_file_fails_loudly() {
        let stores = Stores::new(Arc::new(MemoryStore::new()));
        let result = apply_seed_file(&stores, Path::new("/nonexistent/seed.json")).await;
        assert!(matches!(result, Err(SeedError::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_entry_writes_nothing() {
        let stores = Stores::new(Arc::new(MemoryStore::new()));
        let seed: SeedData = serde_json::from_str(
            r#"{"users": {"alice": "u1", "bob": ""}, "nodes": []}"#,
        )
        .unwrap();

        let result = apply_seed(&stores, seed).await;
        assert!(matches!(result, Err(SeedError::Invalid(_))));
        assert!(stores.credentials.list().await.unwrap().is_empty());
    }
}
