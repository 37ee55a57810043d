//! Client-side snapshot cache with TTL-driven, coalesced pulls.
//!
//! The cache is FRESH while the accepted snapshot is younger than the TTL and
//! STALE otherwise (or when nothing was ever accepted). A stale read runs at
//! most one pull at a time per process:
//!
//! - the reader that wins the pull lock starts the pull in a task that owns
//!   the lock, so the attempt completes even if that reader goes away;
//! - a reader that finds a pull in flight serves the cached snapshot at once,
//!   or, with nothing cached yet, waits for that pull's outcome without
//!   starting another one.
//!
//! A failed pull never replaces or clears the cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::rpc::PullRequest;
use super::transport::{MasterLink, SyncError};
use crate::config::SyncConfig;
use crate::error::NodeError;
use crate::storage::models::Snapshot;
use crate::tokens::TokenAuthority;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub cache_ttl: Duration,
    /// `None` serves stale data for as long as the master stays unreachable
    pub max_stale: Option<Duration>,
    /// Minimum gap between a failed pull and the next attempt
    pub retry_interval: Duration,
    pub timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            cache_ttl: Duration::from_secs(config.cache_ttl_seconds),
            max_stale: config.max_stale_seconds.map(Duration::from_secs),
            retry_interval: Duration::from_secs(config.retry_seconds),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

/// The most recently accepted snapshot
#[derive(Debug)]
pub struct CacheState {
    /// Wall-clock time the snapshot was accepted
    pub accepted_at: DateTime<Utc>,
    fetched_at: Instant,
    pub snapshot: Arc<Snapshot>,
}

impl CacheState {
    fn new(snapshot: Snapshot) -> Self {
        Self {
            accepted_at: Utc::now(),
            fetched_at: Instant::now(),
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Owned by whoever holds the pull lock
#[derive(Debug, Default)]
struct PullState {
    last_failure: Option<Instant>,
}

/// Everything a pull task needs, shared between readers and the task itself
struct SyncCore {
    /// Completed pull attempts, successful or not
    attempts: AtomicU64,
    authority: Arc<TokenAuthority>,
    cache: RwLock<Option<Arc<CacheState>>>,
    link: Arc<dyn MasterLink>,
    node_name: String,
    settings: SyncSettings,
}

pub struct ReplicationClient {
    core: Arc<SyncCore>,
    pull: Arc<Mutex<PullState>>,
}

impl ReplicationClient {
    pub fn new(
        node_name: impl Into<String>,
        authority: Arc<TokenAuthority>,
        link: Arc<dyn MasterLink>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            core: Arc::new(SyncCore {
                attempts: AtomicU64::new(0),
                authority,
                cache: RwLock::new(None),
                link,
                node_name: node_name.into(),
                settings,
            }),
            pull: Arc::new(Mutex::new(PullState::default())),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.core.node_name
    }

    /// The current cache, without triggering a pull
    pub fn cached(&self) -> Option<Arc<CacheState>> {
        self.core.cached()
    }

    pub fn is_fresh(&self, cache: &CacheState) -> bool {
        self.core.is_fresh(cache)
    }

    /// Serve the current snapshot, pulling first if the cache is stale
    pub async fn read(&self) -> Result<Arc<CacheState>, NodeError> {
        if let Some(cache) = self.cached() {
            if self.is_fresh(&cache) {
                return Ok(cache);
            }
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<Arc<CacheState>, NodeError> {
        let core = &self.core;
        let seen = core.attempts.load(Ordering::SeqCst);

        let pull = match Arc::clone(&self.pull).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(cache) = core.cached() {
                    if core.within_stale_limit(&cache) {
                        debug!("Pull already in flight, serving cached snapshot");
                        return Ok(cache);
                    }
                }
                Arc::clone(&self.pull).lock_owned().await
            }
        };

        // A pull may have finished between the freshness check and the lock
        if let Some(cache) = core.cached() {
            if core.is_fresh(&cache) {
                return Ok(cache);
            }
        }

        if core.attempts.load(Ordering::SeqCst) != seen {
            debug!("Pull for this staleness episode already failed");
            return core.degraded();
        }

        if let Some(failed_at) = pull.last_failure {
            if failed_at.elapsed() < core.settings.retry_interval {
                debug!("Last pull failed recently, not retrying yet");
                return core.degraded();
            }
        }

        // The task owns the pull lock, so dropping this reader does not
        // abandon the attempt that queued readers are waiting on.
        let task = tokio::spawn(Arc::clone(core).pull_and_swap(pull));
        match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Pull task did not complete");
                core.degraded()
            }
        }
    }
}

impl SyncCore {
    fn cached(&self) -> Option<Arc<CacheState>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_fresh(&self, cache: &CacheState) -> bool {
        cache.age() < self.settings.cache_ttl
    }

    fn within_stale_limit(&self, cache: &CacheState) -> bool {
        self.settings
            .max_stale
            .map_or(true, |limit| cache.age() < limit)
    }

    async fn pull_and_swap(
        self: Arc<Self>,
        mut pull: OwnedMutexGuard<PullState>,
    ) -> Result<Arc<CacheState>, NodeError> {
        let outcome = self.pull_once().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(snapshot) => {
                pull.last_failure = None;
                let cache = Arc::new(CacheState::new(snapshot));
                *self.cache.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::clone(&cache));

                info!(
                    users = cache.snapshot.users.len(),
                    nodes = cache.snapshot.nodes.len(),
                    "Accepted snapshot from master"
                );
                Ok(cache)
            }
            Err(e) => {
                pull.last_failure = Some(Instant::now());
                warn!(error = %e, "Sync from master failed");
                self.degraded()
            }
        }
    }

    /// Whatever may still be served after a pull did not happen or failed
    fn degraded(&self) -> Result<Arc<CacheState>, NodeError> {
        match self.cached() {
            None => Err(NodeError::NoData),
            Some(cache) if self.within_stale_limit(&cache) => Ok(cache),
            Some(cache) => {
                warn!(
                    age_seconds = cache.age().as_secs(),
                    "Cached snapshot exceeds the staleness limit"
                );
                Err(NodeError::SyncUnavailable)
            }
        }
    }

    async fn pull_once(&self) -> Result<Snapshot, SyncError> {
        let token = self.authority.issue(&self.node_name)?;
        let request = PullRequest::new(token, self.node_name.as_str());

        match tokio::time::timeout(self.settings.timeout, self.link.pull(request)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.settings.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::CredentialRecord;
    use crate::testutil::{test_authority, FakeMaster};

    fn settings(ttl: u64) -> SyncSettings {
        SyncSettings {
            cache_ttl: Duration::from_secs(ttl),
            max_stale: None,
            retry_interval: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    fn client(master: &Arc<FakeMaster>, settings: SyncSettings) -> Arc<ReplicationClient> {
        Arc::new(ReplicationClient::new(
            "Bahrain",
            test_authority(),
            Arc::clone(master) as Arc<dyn MasterLink>,
            settings,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_read_pulls_then_serves_from_cache() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        let client = client(&master, settings(300));
        assert!(client.cached().is_none());

        let cache = client.read().await.unwrap();
        assert_eq!(cache.snapshot.credential("alice"), Some("u1"));
        assert_eq!(cache.snapshot.users.len(), 1);
        assert_eq!(master.pulls(), 1);

        let again = client.read().await.unwrap();
        assert!(Arc::ptr_eq(&cache.snapshot, &again.snapshot));
        assert_eq!(master.pulls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_data_when_master_never_reached() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        master.set_failing(true);
        let client = client(&master, settings(300));

        assert!(matches!(client.read().await, Err(NodeError::NoData)));
        assert!(client.cached().is_none());

        master.set_failing(false);
        let cache = client.read().await.unwrap();
        assert_eq!(cache.snapshot.credential("alice"), Some("u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_read_pulls_exactly_once_and_returns_new_snapshot() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        let client = client(&master, settings(5));

        let s1 = client.read().await.unwrap();
        assert_eq!(s1.snapshot.credential("alice"), Some("u1"));

        tokio::time::advance(Duration::from_secs(6)).await;
        master
            .stores
            .credentials
            .upsert(&CredentialRecord::new("alice", "u2"))
            .await
            .unwrap();

        let s2 = client.read().await.unwrap();
        assert_eq!(s2.snapshot.credential("alice"), Some("u2"));
        assert_eq!(master.pulls(), 2);

        client.read().await.unwrap();
        assert_eq!(master.pulls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pull_keeps_previous_snapshot() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        let client = client(&master, settings(5));
        let before = client.read().await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        master.set_failing(true);

        let after = client.read().await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.snapshot.credential("alice"), Some("u1"));
        assert_eq!(master.pulls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_to_cached_snapshot() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        let client = client(&master, settings(5));
        let before = client.read().await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        master.set_delay(Duration::from_secs(60));

        let started = Instant::now();
        let after = client.read().await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_on_empty_cache_share_one_pull() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        master.set_delay(Duration::from_secs(1));
        let client = client(&master, settings(300));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move { client.read().await }));
        }
        for handle in handles {
            let cache = handle.await.unwrap().unwrap();
            assert_eq!(cache.snapshot.credential("alice"), Some("u1"));
        }

        assert_eq!(master.pulls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_stale_reads_share_one_failed_pull() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        master.set_failing(true);
        master.set_delay(Duration::from_secs(1));
        let client = client(&master, settings(300));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move { client.read().await }));
        }
        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Err(NodeError::NoData)));
        }

        assert_eq!(master.pulls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reads_during_pull_serve_cached_snapshot() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        let client = client(&master, settings(5));
        let s1 = client.read().await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        master.set_delay(Duration::from_secs(2));

        let puller = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.read().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(master.pulls(), 2);

        let started = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..9 {
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move { client.read().await }));
        }
        for handle in handles {
            let cache = handle.await.unwrap().unwrap();
            assert!(Arc::ptr_eq(&s1, &cache));
        }
        assert!(started.elapsed() < Duration::from_secs(1));

        let fresh = puller.await.unwrap().unwrap();
        assert!(!Arc::ptr_eq(&s1, &fresh));
        assert_eq!(master.pulls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_reader_does_not_cancel_shared_pull() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        master.set_delay(Duration::from_secs(2));
        let client = client(&master, settings(300));

        let first = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.read().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let waiter = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.read().await })
        };
        tokio::time::sleep(Duration::from_millis(900)).await;
        first.abort();

        let cache = waiter.await.unwrap().unwrap();
        assert_eq!(cache.snapshot.credential("alice"), Some("u1"));
        assert_eq!(master.pulls(), 1);
        assert!(client.cached().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_for_interval_after_failure() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        let client = client(
            &master,
            SyncSettings {
                retry_interval: Duration::from_secs(30),
                ..settings(5)
            },
        );
        client.read().await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        master.set_failing(true);
        client.read().await.unwrap();
        client.read().await.unwrap();
        assert_eq!(master.pulls(), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        master.set_failing(false);
        client.read().await.unwrap();
        assert_eq!(master.pulls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_limit_stops_serving_old_data() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        let client = client(
            &master,
            SyncSettings {
                max_stale: Some(Duration::from_secs(10)),
                ..settings(5)
            },
        );
        client.read().await.unwrap();
        master.set_failing(true);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(client.read().await.is_ok());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(matches!(
            client.read().await,
            Err(NodeError::SyncUnavailable)
        ));

        master.set_failing(false);
        assert!(client.read().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_data_served_indefinitely_without_limit() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        let client = client(&master, settings(5));
        client.read().await.unwrap();
        master.set_failing(true);

        tokio::time::advance(Duration::from_secs(7 * 24 * 3600)).await;
        let cache = client.read().await.unwrap();
        assert_eq!(cache.snapshot.credential("alice"), Some("u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_pull_is_a_sync_failure() {
        let master = FakeMaster::with_users(&[("alice", "u1")]).await;
        let client = Arc::new(ReplicationClient::new(
            "Bahrain",
            Arc::new(TokenAuthority::new(
                "not-the-shared-secret",
                crate::tokens::DEFAULT_TOKEN_TTL,
            )),
            Arc::clone(&master) as Arc<dyn MasterLink>,
            settings(5),
        ));

        assert!(matches!(client.read().await, Err(NodeError::NoData)));
        assert_eq!(master.pulls(), 1);
    }
}
