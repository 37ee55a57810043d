//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::cluster::rpc::PullRequest;
use crate::cluster::{MasterBehavior, MasterLink, NodeBehavior, ReplicationServer, SyncError};
use crate::error::NodeError;
use crate::storage::models::{CredentialRecord, NodeRecord, Snapshot};
use crate::storage::{Database, MemoryStore, Stores};
use crate::tokens::{TokenAuthority, DEFAULT_TOKEN_TTL};
use crate::AppState;

pub const ADMIN_KEY: &str = "test-admin-key";

pub const SHARED_SECRET: &str = "test-shared-secret";

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard. The caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// Wrap a node behavior in an `Arc<AppState>`.
pub fn test_state(node: Arc<dyn NodeBehavior>) -> Arc<AppState> {
    Arc::new(AppState { node })
}

pub fn test_authority() -> Arc<TokenAuthority> {
    Arc::new(TokenAuthority::new(SHARED_SECRET, DEFAULT_TOKEN_TTL))
}

/// A master over a fresh in-memory store, plus a handle on its stores.
pub fn master_behavior() -> (MasterBehavior, Arc<Stores>) {
    let stores = Arc::new(Stores::new(Arc::new(MemoryStore::new())));
    let master = MasterBehavior::new("Austria", test_authority(), Arc::clone(&stores), ADMIN_KEY);
    (master, stores)
}

/// Create a `NodeRecord` with a host derived from its name.
pub fn make_node(name: &str, port: u16) -> NodeRecord {
    NodeRecord {
        host: format!("{}.example.net", name.to_lowercase()),
        name: name.to_string(),
        port,
        region: None,
    }
}

/// In-process master serving pulls from its own stores.
///
/// Counts every pull it receives and can be made slow or unreachable.
pub struct FakeMaster {
    delay_ms: AtomicU64,
    failing: AtomicBool,
    pulls: AtomicUsize,
    server: ReplicationServer,
    pub stores: Arc<Stores>,
}

impl FakeMaster {
    pub async fn with_users(users: &[(&str, &str)]) -> Arc<Self> {
        let stores = Arc::new(Stores::new(Arc::new(MemoryStore::new())));
        for (identity, credential) in users {
            stores
                .credentials
                .upsert(&CredentialRecord::new(*identity, *credential))
                .await
                .unwrap();
        }

        Arc::new(Self {
            delay_ms: AtomicU64::new(0),
            failing: AtomicBool::new(false),
            pulls: AtomicUsize::new(0),
            server: ReplicationServer::new(test_authority(), Arc::clone(&stores)),
            stores,
        })
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl MasterLink for FakeMaster {
    async fn pull(&self, request: PullRequest) -> Result<Snapshot, SyncError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("connection refused".to_string()));
        }

        match self.server.handle_pull(request).await {
            Ok(snapshot) => Ok(snapshot),
            Err(NodeError::AuthorizationDenied) => Err(SyncError::Denied),
            Err(e) => Err(SyncError::Transport(e.to_string())),
        }
    }
}
