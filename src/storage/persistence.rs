//! Durable backing for the master's authoritative stores

use thiserror::Error;

use super::models::{CredentialRecord, NodeRecord};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Redb(#[from] redb::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Whole-collection reads and upsert-by-key writes, each atomic.
///
/// Upserts keep an existing key at its position and append new keys, so
/// `load_*` always returns records in first-insertion order.
pub trait Persistence: Send + Sync {
    fn load_credentials(&self) -> Result<Vec<CredentialRecord>, PersistenceError>;

    fn upsert_credential(&self, record: &CredentialRecord) -> Result<(), PersistenceError>;

    fn load_nodes(&self) -> Result<Vec<NodeRecord>, PersistenceError>;

    fn upsert_node(&self, record: &NodeRecord) -> Result<(), PersistenceError>;
}
