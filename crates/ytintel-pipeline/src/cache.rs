//! Content-addressed report cache with single-flight leases.
//!
//! Reports are JSON records in a [`ReportStore`]. Records that fail to
//! decode, disagree with their key, carry `status = failed`, or have outlived
//! their TTL are misses. Backend failures are logged and treated as misses;
//! caching is never required for a request to succeed.
//!
//! At most one [`Lease`] exists per key. Callers that lose the race get a
//! [`Waiter`] that resolves with whatever the leader publishes. A lease
//! dropped without completing publishes [`WaitOutcome::Abandoned`], so a
//! cancelled leader never strands its waiters.
//!
//! Expiry on read only covers keys that are asked for again.
//! [`ReportCache::spawn_sweeper`] purges everything else in the background.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use ytintel_core::{
    CacheKey, IntelligenceReport, ReportStatus, ReportStore, StoreError, ToolError,
};

const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);
const DEFAULT_PARTIAL_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of complete reports.
    pub ttl: Duration,
    /// Lifetime of partial reports, shorter so enrichment is retried sooner.
    pub partial_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            partial_ttl: DEFAULT_PARTIAL_TTL,
        }
    }
}

#[derive(Debug, Clone)]
enum LeaseState {
    Pending,
    Ready(Arc<IntelligenceReport>),
    Failed(ToolError),
    Abandoned,
}

type LeaseTable = Arc<Mutex<HashMap<String, watch::Sender<LeaseState>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct ReportCache {
    store: Arc<dyn ReportStore>,
    config: CacheConfig,
    leases: LeaseTable,
}

impl ReportCache {
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            leases: Arc::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Look up a fresh, usable report for `key`.
    pub async fn get(&self, key: &CacheKey) -> Option<IntelligenceReport> {
        let bytes = match self.store.load(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache unavailable, treating as miss");
                return None;
            }
        };

        let report: IntelligenceReport = match serde_json::from_slice(&bytes) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(%key, error = %e, "undecodable cache record, treating as miss");
                return None;
            }
        };

        if !record_matches_key(&report, key) {
            tracing::warn!(%key, "cache record does not match its key, treating as miss");
            return None;
        }
        if report.status == ReportStatus::Failed {
            return None;
        }
        if self.is_expired(&report) {
            tracing::debug!(%key, fetched_at = %report.fetched_at, "cache record expired");
            if let Err(e) = self.store.remove(key).await {
                tracing::warn!(%key, error = %e, "failed to remove expired cache record");
            }
            return None;
        }

        Some(report)
    }

    /// Become the single computation for `key`, or wait on the one in flight.
    pub fn acquire_lease(&self, key: &CacheKey) -> LeaseOutcome {
        let mut table = lock(&self.leases);
        if let Some(sender) = table.get(key.digest()) {
            return LeaseOutcome::Follower(Waiter {
                rx: sender.subscribe(),
            });
        }

        let (sender, _) = watch::channel(LeaseState::Pending);
        table.insert(key.digest().to_owned(), sender);
        LeaseOutcome::Leader(Lease {
            key: key.clone(),
            leases: Arc::clone(&self.leases),
            finished: false,
        })
    }

    /// Persist `report` under the lease's key, then release the lease and
    /// wake its waiters. A backend failure is logged; waiters and the caller
    /// still receive the report.
    pub async fn put(&self, lease: Lease, report: IntelligenceReport) -> Arc<IntelligenceReport> {
        match serde_json::to_vec(&report) {
            Ok(bytes) => {
                if let Err(e) = self.store.store(lease.key(), bytes).await {
                    tracing::warn!(key = %lease.key(), error = %e, "cache unavailable, report not persisted");
                }
            }
            Err(e) => {
                tracing::warn!(key = %lease.key(), error = %e, "failed to encode report for cache");
            }
        }

        let report = Arc::new(report);
        lease.complete(Arc::clone(&report));
        report
    }

    /// Delete every stored record older than the longest TTL.
    ///
    /// Returns the number of records purged; a backend failure is logged and
    /// counts as zero.
    pub async fn sweep(&self) -> u64 {
        let max_age = self.config.ttl.max(self.config.partial_ttl);
        match self.store.purge_older_than(max_age).await {
            Ok(purged) => {
                if purged > 0 {
                    tracing::info!(purged, "swept expired cache records");
                }
                purged
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache sweep failed");
                0
            }
        }
    }

    /// Run [`ReportCache::sweep`] every `every` until `shutdown` fires.
    #[must_use]
    pub fn spawn_sweeper(&self, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        let every = every.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; nothing can be stale yet.
            timer.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    _ = timer.tick() => {
                        cache.sweep().await;
                    }
                }
            }
            tracing::debug!("cache sweeper stopped");
        })
    }

    /// Check that the backing store answers.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the backend cannot be reached.
    pub async fn ping_store(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    /// Number of keys currently being computed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        lock(&self.leases).len()
    }

    fn is_expired(&self, report: &IntelligenceReport) -> bool {
        let ttl = match report.status {
            ReportStatus::Partial => self.config.partial_ttl,
            ReportStatus::Complete | ReportStatus::Failed => self.config.ttl,
        };
        // Negative ages (clock skew) convert to an error and count as fresh.
        Utc::now()
            .signed_duration_since(report.fetched_at)
            .to_std()
            .is_ok_and(|age| age > ttl)
    }
}

fn record_matches_key(report: &IntelligenceReport, key: &CacheKey) -> bool {
    report.video_id == key.video_id()
        && report.pipeline_version == key.pipeline_version()
        && report.requested_depth == key.depth()
}

pub enum LeaseOutcome {
    Leader(Lease),
    Follower(Waiter),
}

/// Exclusive right to compute one key. Releases itself on drop.
#[must_use = "dropping a lease abandons the computation"]
pub struct Lease {
    key: CacheKey,
    leases: LeaseTable,
    finished: bool,
}

impl Lease {
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Release the lease and hand `report` to every waiter without storing it.
    pub fn complete(mut self, report: Arc<IntelligenceReport>) {
        self.finish(LeaseState::Ready(report));
    }

    /// Release the lease and share `error` with every waiter.
    pub fn fail(mut self, error: ToolError) {
        self.finish(LeaseState::Failed(error));
    }

    fn finish(&mut self, state: LeaseState) {
        self.finished = true;
        let sender = lock(&self.leases).remove(self.key.digest());
        if let Some(sender) = sender {
            sender.send_replace(state);
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(key = %self.key, "lease abandoned");
            self.finish(LeaseState::Abandoned);
        }
    }
}

pub enum WaitOutcome {
    Ready(Arc<IntelligenceReport>),
    Failed(ToolError),
    /// The leader went away without a result; start over.
    Abandoned,
}

/// Handle on another caller's in-flight computation.
pub struct Waiter {
    rx: watch::Receiver<LeaseState>,
}

impl Waiter {
    pub async fn wait(mut self) -> WaitOutcome {
        loop {
            let state = self.rx.borrow_and_update().clone();
            if let Some(outcome) = settled(state) {
                return outcome;
            }
            if self.rx.changed().await.is_err() {
                let last = self.rx.borrow().clone();
                return settled(last).unwrap_or(WaitOutcome::Abandoned);
            }
        }
    }
}

fn settled(state: LeaseState) -> Option<WaitOutcome> {
    match state {
        LeaseState::Pending => None,
        LeaseState::Ready(report) => Some(WaitOutcome::Ready(report)),
        LeaseState::Failed(error) => Some(WaitOutcome::Failed(error)),
        LeaseState::Abandoned => Some(WaitOutcome::Abandoned),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use ytintel_core::{ErrorKind, FetchDepth, SignalSet};

    use super::*;
    use crate::store::MemoryStore;

    struct BrokenStore;

    #[async_trait]
    impl ReportStore for BrokenStore {
        async fn load(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError("connection refused".into()))
        }

        async fn store(&self, _key: &CacheKey, _bytes: Vec<u8>) -> Result<(), StoreError> {
            Err(StoreError("connection refused".into()))
        }

        async fn remove(&self, _key: &CacheKey) -> Result<(), StoreError> {
            Err(StoreError("connection refused".into()))
        }

        async fn purge_older_than(&self, _age: Duration) -> Result<u64, StoreError> {
            Err(StoreError("connection refused".into()))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError("connection refused".into()))
        }
    }

    fn key() -> CacheKey {
        CacheKey::new("abc123", 1, FetchDepth::Full)
    }

    fn report(status: ReportStatus, fetched_at: DateTime<Utc>) -> IntelligenceReport {
        IntelligenceReport {
            video_id: "abc123".into(),
            pipeline_version: 1,
            requested_depth: FetchDepth::Full,
            title: "Sourdough".into(),
            signals: SignalSet::neutral(),
            insight: None,
            fetched_at,
            status,
        }
    }

    fn cache_with(store: Arc<MemoryStore>) -> ReportCache {
        ReportCache::new(
            store,
            CacheConfig {
                ttl: Duration::from_secs(3_600),
                partial_ttl: Duration::from_secs(60),
            },
        )
    }

    async fn put_raw(store: &MemoryStore, key: &CacheKey, report: &IntelligenceReport) {
        store
            .store(key, serde_json::to_vec(report).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn put_then_get_hits() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        let LeaseOutcome::Leader(lease) = cache.acquire_lease(&key()) else {
            panic!("first caller must lead");
        };
        let stored = cache
            .put(lease, report(ReportStatus::Complete, Utc::now()))
            .await;

        assert_eq!(cache.get(&key()).await.as_ref(), Some(&*stored));
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn failed_records_are_misses() {
        let store = Arc::new(MemoryStore::new());
        put_raw(&store, &key(), &report(ReportStatus::Failed, Utc::now())).await;
        assert!(cache_with(store).get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn record_under_wrong_key_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let mut other = report(ReportStatus::Complete, Utc::now());
        other.pipeline_version = 2;
        put_raw(&store, &key(), &other).await;
        assert!(cache_with(store).get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn undecodable_record_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store.store(&key(), b"not json".to_vec()).await.unwrap();
        assert!(cache_with(store).get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn expired_record_is_removed() {
        let store = Arc::new(MemoryStore::new());
        let stale = report(ReportStatus::Complete, Utc::now() - ChronoDuration::hours(2));
        put_raw(&store, &key(), &stale).await;

        let cache = cache_with(Arc::clone(&store));
        assert!(cache.get(&key()).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn partial_reports_use_shorter_ttl() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(Arc::clone(&store));
        let five_minutes_ago = Utc::now() - ChronoDuration::minutes(5);

        put_raw(&store, &key(), &report(ReportStatus::Complete, five_minutes_ago)).await;
        assert!(cache.get(&key()).await.is_some());

        put_raw(&store, &key(), &report(ReportStatus::Partial, five_minutes_ago)).await;
        assert!(cache.get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn backend_failure_is_a_miss_and_put_still_wakes_waiters() {
        let cache = ReportCache::new(Arc::new(BrokenStore), CacheConfig::default());
        assert!(cache.get(&key()).await.is_none());

        let LeaseOutcome::Leader(lease) = cache.acquire_lease(&key()) else {
            panic!("first caller must lead");
        };
        let LeaseOutcome::Follower(waiter) = cache.acquire_lease(&key()) else {
            panic!("second caller must follow");
        };

        let stored = cache
            .put(lease, report(ReportStatus::Complete, Utc::now()))
            .await;
        match waiter.wait().await {
            WaitOutcome::Ready(r) => assert!(Arc::ptr_eq(&r, &stored)),
            _ => panic!("waiter should receive the report"),
        }
    }

    #[tokio::test]
    async fn follower_receives_leader_failure() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        let LeaseOutcome::Leader(lease) = cache.acquire_lease(&key()) else {
            panic!("first caller must lead");
        };
        let LeaseOutcome::Follower(waiter) = cache.acquire_lease(&key()) else {
            panic!("second caller must follow");
        };

        let waiting = tokio::spawn(waiter.wait());
        lease.fail(ToolError::new(ErrorKind::NotFound, "gone"));

        match waiting.await.unwrap() {
            WaitOutcome::Failed(err) => assert_eq!(err.kind, ErrorKind::NotFound),
            _ => panic!("waiter should receive the failure"),
        }
    }

    #[tokio::test]
    async fn dropped_lease_is_abandoned_and_key_is_free_again() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        let LeaseOutcome::Leader(lease) = cache.acquire_lease(&key()) else {
            panic!("first caller must lead");
        };
        let LeaseOutcome::Follower(waiter) = cache.acquire_lease(&key()) else {
            panic!("second caller must follow");
        };

        drop(lease);

        assert!(matches!(waiter.wait().await, WaitOutcome::Abandoned));
        assert_eq!(cache.in_flight(), 0);
        assert!(matches!(cache.acquire_lease(&key()), LeaseOutcome::Leader(_)));
    }

    #[tokio::test]
    async fn different_keys_lead_independently() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        let full = cache.acquire_lease(&key());
        let meta = cache.acquire_lease(&CacheKey::new("abc123", 1, FetchDepth::MetadataOnly));
        assert!(matches!(full, LeaseOutcome::Leader(_)));
        assert!(matches!(meta, LeaseOutcome::Leader(_)));
        assert_eq!(cache.in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_keys_that_are_never_read_again() {
        let store = Arc::new(MemoryStore::new());
        let cache = ReportCache::new(
            Arc::clone(&store) as Arc<dyn ReportStore>,
            CacheConfig {
                ttl: Duration::from_millis(1),
                partial_ttl: Duration::from_millis(1),
            },
        );
        for i in 0..200 {
            let key = CacheKey::new(&format!("vid{i}"), 1, FetchDepth::Full);
            store.store(&key, b"{}".to_vec()).await.unwrap();
        }

        let shutdown = CancellationToken::new();
        let sweeper = cache.spawn_sweeper(Duration::from_millis(5), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.is_empty().await);
        shutdown.cancel();
        sweeper.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_records_within_the_ttl() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(Arc::clone(&store));
        put_raw(&store, &key(), &report(ReportStatus::Complete, Utc::now())).await;

        tokio::time::advance(Duration::from_secs(1_800)).await;
        assert_eq!(cache.sweep().await, 0);
        tokio::time::advance(Duration::from_secs(3_600)).await;
        assert_eq!(cache.sweep().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn sweep_and_ping_report_backend_failures() {
        let cache = ReportCache::new(Arc::new(BrokenStore), CacheConfig::default());
        assert_eq!(cache.sweep().await, 0);
        assert!(cache.ping_store().await.is_err());
        assert!(cache_with(Arc::new(MemoryStore::new())).ping_store().await.is_ok());
    }
}
