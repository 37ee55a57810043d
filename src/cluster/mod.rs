pub mod client;
mod node;
pub mod rpc;
mod server;
pub mod transport;

pub use client::{CacheState, ReplicationClient, SyncSettings};
pub use node::{ClientBehavior, MasterBehavior, NodeBehavior, Role};
pub use server::ReplicationServer;
pub use transport::{HttpMasterLink, MasterLink, SyncError};

use std::sync::Arc;
use tokio::task::JoinHandle;

/// Pull once at client start-up so the first request is usually served from cache.
pub fn start_initial_sync(replication: Arc<ReplicationClient>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match replication.read().await {
            Ok(_) => tracing::info!("Initial sync complete"),
            Err(e) => tracing::warn!(error = %e, "Initial sync failed (will retry on next read)"),
        }
    })
}
