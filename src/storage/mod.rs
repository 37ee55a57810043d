pub mod db;
mod memory;
pub mod models;
mod persistence;
pub mod seed;
mod stores;
mod tables;

use std::sync::Arc;

pub use db::Database;
pub use memory::MemoryStore;
pub use persistence::{Persistence, PersistenceError};
pub use stores::{CredentialStore, Stores, TopologyStore};

use crate::config::{Config, StorageBackend};

/// Open the backing selected by configuration
pub fn open_backend(config: &Config) -> Result<Arc<dyn Persistence>, PersistenceError> {
    match config.storage.backend {
        StorageBackend::Redb => Ok(Arc::new(Database::open(&config.node.data_dir)?)),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
