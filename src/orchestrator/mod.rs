//! Job Orchestrator
//!
//! Owns the job lifecycle for one query fingerprint:
//!
//! ```text
//! submit ──claim NEW──► queue ──► retrieve ──┬─ 0 posts ──────────────► DONE []
//!                                            └─ IN_PROGRESS ─► prepare ─► partition ─► analyze ─► DONE
//!                                  (any error) ─────────────────────────────────────────────────► FAILED
//! ```
//!
//! Each status write completes before the next phase starts. A fingerprint
//! that already has an entry is never recomputed; its stored bytes are
//! returned as-is. CPU-bound stages run on the blocking pool.
//!
//! Only deterministic failures are cached as FAILED. Storage and worker
//! failures release the entry so the next submission computes again, and
//! jobs still queued at shutdown are released the same way.

mod pool;

pub use pool::{PoolError, WorkerPool};

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analysis::{analyze_clusters, AnalysisError, JoinStrategy};
use crate::cache::{load_job, store_job, CacheError, ClaimOutcome, JobCache};
use crate::config::JobsConfig;
use crate::partition::{PartitionError, Partitioner};
use crate::preprocess::prepare;
use crate::retrieval::{PostStore, RetrievalError, RetrievalQuery};
use crate::types::{ClusterResult, Fingerprint, Job, JobStatus, PostRecord, QueryParams, TransitionError};

/// Pipeline knobs taken from `[jobs]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub workers: usize,
    pub queue_depth: usize,
    pub result_limit: usize,
    pub top_posts: usize,
    pub join: JoinStrategy,
}

impl From<&JobsConfig> for PipelineSettings {
    fn from(jobs: &JobsConfig) -> Self {
        Self {
            workers: jobs.workers,
            queue_depth: jobs.queue_depth,
            result_limit: jobs.result_limit,
            top_posts: jobs.top_posts,
            join: jobs.join,
        }
    }
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// New job claimed and queued
    Accepted(Job),
    /// The fingerprint already had an entry; stored bytes verbatim
    Existing(Vec<u8>),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("job queue is full")]
    QueueFull,
    #[error("job orchestrator is shut down")]
    Closed,
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PoolError> for SubmitError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Full => Self::QueueFull,
            PoolError::Closed => Self::Closed,
        }
    }
}

/// Pipeline failure. The display text becomes the FAILED job's `reason`.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("worker task failed: {0}")]
    Worker(String),
}

impl JobError {
    /// Whether the same query could succeed on another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Retrieval(RetrievalError::InvalidWindow { .. }) => false,
            Self::Retrieval(_) | Self::Cache(_) | Self::Worker(_) => true,
            Self::Partition(_) | Self::Analysis(_) | Self::Transition(_) => false,
        }
    }
}

/// Collaborators plus settings, shared by every worker.
struct Pipeline {
    store: Arc<dyn PostStore>,
    cache: Arc<dyn JobCache>,
    partitioner: Arc<dyn Partitioner>,
    settings: PipelineSettings,
}

pub struct JobOrchestrator {
    pipeline: Arc<Pipeline>,
    pool: WorkerPool<Job>,
}

impl JobOrchestrator {
    /// Start the worker pool. Must be called inside a tokio runtime.
    pub fn start(
        store: Arc<dyn PostStore>,
        cache: Arc<dyn JobCache>,
        partitioner: Arc<dyn Partitioner>,
        settings: PipelineSettings,
        cancel: CancellationToken,
    ) -> Self {
        info!(
            store = store.backend_name(),
            cache = cache.backend_name(),
            partitioner = partitioner.name(),
            join = %settings.join,
            "Starting job orchestrator"
        );
        let pipeline = Arc::new(Pipeline {
            store,
            cache,
            partitioner,
            settings,
        });

        let worker_pipeline = Arc::clone(&pipeline);
        let pool = WorkerPool::spawn(settings.workers, settings.queue_depth, cancel, move |job| {
            let pipeline = Arc::clone(&worker_pipeline);
            async move { pipeline.process(job).await }
        });

        Self { pipeline, pool }
    }

    /// Claim-or-join. Existing entries are returned even when the queue is
    /// full; a new claim is only made once a queue slot is reserved.
    pub async fn submit(&self, query: QueryParams) -> Result<Submission, SubmitError> {
        let fingerprint = query.fingerprint();
        let cache = &self.pipeline.cache;

        if let Some(bytes) = cache.get(&fingerprint).await? {
            debug!(fingerprint = %fingerprint, "Cache hit");
            return Ok(Submission::Existing(bytes));
        }

        let permit = self.pool.try_reserve().map_err(|e| {
            warn!(fingerprint = %fingerprint, error = %e, "Rejecting submission");
            SubmitError::from(e)
        })?;

        let job = Job::new(query);
        match cache.claim(&fingerprint, job.to_bytes()?).await? {
            ClaimOutcome::Claimed => {
                info!(fingerprint = %fingerprint, k = query.k, "Job accepted");
                permit.send(job.clone());
                Ok(Submission::Accepted(job))
            }
            ClaimOutcome::Existing(bytes) => {
                debug!(fingerprint = %fingerprint, "Joined concurrent submission");
                Ok(Submission::Existing(bytes))
            }
        }
    }

    /// Current job state for a fingerprint.
    pub async fn status(&self, fingerprint: &Fingerprint) -> Result<Option<Job>, CacheError> {
        load_job(self.pipeline.cache.as_ref(), fingerprint).await
    }

    pub fn cache(&self) -> Arc<dyn JobCache> {
        Arc::clone(&self.pipeline.cache)
    }

    /// Free queue slots.
    pub fn queue_capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Stop the workers and release every job they never picked up.
    pub async fn shutdown(&self) {
        for job in self.pool.shutdown().await {
            self.pipeline.release(&job.query.fingerprint()).await;
        }
    }
}

impl Pipeline {
    async fn process(&self, mut job: Job) {
        let fingerprint = job.query.fingerprint();
        let started = Instant::now();

        match self.run(&fingerprint, &mut job).await {
            Ok(()) => info!(
                fingerprint = %fingerprint,
                clusters = job.clusters.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job done"
            ),
            Err(e) if e.is_transient() => {
                match &e {
                    JobError::Worker(_) => error!(fingerprint = %fingerprint, error = %e, "Job aborted"),
                    _ => warn!(fingerprint = %fingerprint, error = %e, "Job aborted"),
                }
                self.release(&fingerprint).await;
            }
            Err(e) => {
                match &e {
                    JobError::Analysis(_) => error!(fingerprint = %fingerprint, error = %e, "Job failed"),
                    _ => warn!(fingerprint = %fingerprint, error = %e, "Job failed"),
                }
                if let Err(te) = job.fail(e.to_string()) {
                    error!(fingerprint = %fingerprint, error = %te, "Cannot mark job failed");
                    return;
                }
                if let Err(ce) = store_job(self.cache.as_ref(), &fingerprint, &job).await {
                    error!(fingerprint = %fingerprint, error = %ce, "Cannot store failed job");
                }
            }
        }
    }

    /// Drop the claim so a later submission starts over.
    async fn release(&self, fingerprint: &Fingerprint) {
        match self.cache.remove(fingerprint).await {
            Ok(()) => info!(fingerprint = %fingerprint, "Released job claim"),
            Err(e) => error!(fingerprint = %fingerprint, error = %e, "Cannot release job claim"),
        }
    }

    async fn run(&self, fingerprint: &Fingerprint, job: &mut Job) -> Result<(), JobError> {
        let query = RetrievalQuery::from_params(&job.query, self.settings.result_limit)?;
        let posts = self.store.find_posts(&query).await?;
        debug!(fingerprint = %fingerprint, records = posts.len(), "Retrieved posts");

        if posts.is_empty() {
            job.complete(Vec::new())?;
            store_job(self.cache.as_ref(), fingerprint, job).await?;
            return Ok(());
        }

        job.transition(JobStatus::InProgress)?;
        store_job(self.cache.as_ref(), fingerprint, job).await?;

        let partitioner = Arc::clone(&self.partitioner);
        let settings = self.settings;
        let k = job.query.k;
        let clusters = tokio::task::spawn_blocking(move || compute(posts, partitioner.as_ref(), k, settings))
            .await
            .map_err(|e| JobError::Worker(e.to_string()))??;

        job.complete(clusters)?;
        store_job(self.cache.as_ref(), fingerprint, job).await?;
        Ok(())
    }
}

/// Preprocess, partition and analyze. Runs off the async runtime.
fn compute(
    posts: Vec<PostRecord>,
    partitioner: &dyn Partitioner,
    k: usize,
    settings: PipelineSettings,
) -> Result<Vec<ClusterResult>, JobError> {
    let prepared = prepare(posts);
    if prepared.is_empty() {
        return Ok(Vec::new());
    }
    if prepared.collisions() > 0 {
        warn!(
            collisions = prepared.collisions(),
            records = prepared.len(),
            "LocationKey collisions in job input"
        );
    }

    let clusters = partitioner.partition(prepared.coordinates(), k)?;
    Ok(analyze_clusters(&clusters, &prepared, settings.join, settings.top_posts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryJobCache;
    use crate::partition::{Cluster, KMeansConfig, KMeansPartitioner};
    use crate::retrieval::InMemoryPostStore;
    use crate::types::GeoPoint;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::{Notify, Semaphore};

    const START: i64 = 1_600_000_000;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            workers: 2,
            queue_depth: 8,
            result_limit: 5_000,
            top_posts: 5,
            join: JoinStrategy::RowIndex,
        }
    }

    fn query(k: usize) -> QueryParams {
        QueryParams {
            lat: 52.5,
            lng: 13.5,
            radius: 2.0,
            start: START,
            end: START + 86_400,
            k,
        }
    }

    fn post(id: usize, lat: f64, lng: f64) -> PostRecord {
        PostRecord {
            id: format!("p{id}"),
            location: GeoPoint::new(lat, lng),
            created_at: DateTime::from_timestamp(START + id as i64, 0).unwrap(),
            words: vec!["alpha".to_string(), format!("w{}", id % 3)],
            polarity: 0.1,
            retweet_count: id as u64,
            favorite_count: 0,
        }
    }

    /// Twelve posts in three separated groups.
    fn twelve_posts() -> Vec<PostRecord> {
        let mut posts = Vec::new();
        for (g, (lat, lng)) in [(52.0, 13.0), (53.0, 14.0), (52.0, 14.5)].into_iter().enumerate() {
            for i in 0..4_u32 {
                let offset = f64::from(i) * 0.001;
                posts.push(post(g * 4 + i as usize, lat + offset, lng + offset));
            }
        }
        posts
    }

    fn kmeans() -> Arc<dyn Partitioner> {
        Arc::new(KMeansPartitioner::new(KMeansConfig {
            max_iterations: 100,
            seed: Some(11),
        }))
    }

    /// Records every status written for any fingerprint.
    #[derive(Default)]
    struct RecordingCache {
        inner: InMemoryJobCache,
        statuses: Mutex<Vec<JobStatus>>,
    }

    impl RecordingCache {
        fn record(&self, bytes: &[u8]) {
            if let Ok(job) = Job::from_bytes(bytes) {
                self.statuses.lock().unwrap().push(job.status);
            }
        }

        fn statuses(&self) -> Vec<JobStatus> {
            self.statuses.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobCache for RecordingCache {
        async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, CacheError> {
            self.inner.get(fingerprint).await
        }

        async fn set(&self, fingerprint: &Fingerprint, value: Vec<u8>) -> Result<(), CacheError> {
            self.record(&value);
            self.inner.set(fingerprint, value).await
        }

        async fn claim(&self, fingerprint: &Fingerprint, value: Vec<u8>) -> Result<ClaimOutcome, CacheError> {
            let outcome = self.inner.claim(fingerprint, value.clone()).await?;
            if outcome == ClaimOutcome::Claimed {
                self.record(&value);
            }
            Ok(outcome)
        }

        async fn remove(&self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
            self.inner.remove(fingerprint).await
        }

        async fn entries(&self) -> Result<Vec<(Fingerprint, Vec<u8>)>, CacheError> {
            self.inner.entries().await
        }

        fn backend_name(&self) -> &'static str {
            "Recording"
        }
    }

    struct CountingPartitioner {
        inner: KMeansPartitioner,
        calls: AtomicUsize,
    }

    impl Partitioner for CountingPartitioner {
        fn partition(&self, coordinates: &[[f64; 2]], k: usize) -> Result<Vec<Cluster>, PartitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.partition(coordinates, k)
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    /// Store that parks every lookup until the test releases it.
    struct GatedStore {
        entered: Notify,
        gate: Semaphore,
    }

    #[async_trait]
    impl PostStore for GatedStore {
        async fn find_posts(&self, _query: &RetrievalQuery) -> Result<Vec<PostRecord>, RetrievalError> {
            self.entered.notify_one();
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| RetrievalError::Storage(e.to_string()))?;
            Ok(Vec::new())
        }

        async fn insert_posts(&self, _posts: Vec<PostRecord>) -> Result<usize, RetrievalError> {
            Ok(0)
        }

        fn backend_name(&self) -> &'static str {
            "gated"
        }
    }

    /// Store whose first `failures` lookups fail.
    struct FlakyStore {
        failures: AtomicUsize,
        inner: InMemoryPostStore,
    }

    #[async_trait]
    impl PostStore for FlakyStore {
        async fn find_posts(&self, query: &RetrievalQuery) -> Result<Vec<PostRecord>, RetrievalError> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(RetrievalError::Storage("connection reset".to_string()));
            }
            self.inner.find_posts(query).await
        }

        async fn insert_posts(&self, posts: Vec<PostRecord>) -> Result<usize, RetrievalError> {
            self.inner.insert_posts(posts).await
        }

        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    async fn wait_terminal(orchestrator: &JobOrchestrator, fingerprint: &Fingerprint) -> Job {
        for _ in 0..500 {
            if let Some(job) = orchestrator.status(fingerprint).await.unwrap() {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {fingerprint} did not finish");
    }

    #[tokio::test]
    async fn test_twelve_posts_three_clusters() {
        let cache = Arc::new(RecordingCache::default());
        let orchestrator = JobOrchestrator::start(
            Arc::new(InMemoryPostStore::with_posts(twelve_posts())),
            cache.clone(),
            kmeans(),
            settings(),
            CancellationToken::new(),
        );

        let q = query(3);
        assert!(matches!(orchestrator.submit(q).await.unwrap(), Submission::Accepted(_)));
        let job = wait_terminal(&orchestrator, &q.fingerprint()).await;

        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.clusters.len(), 3);
        assert_eq!(job.clusters.iter().map(|c| c.tweets.len()).sum::<usize>(), 12);
        assert!(job.clusters.iter().all(|c| c.tweets.len() == 4));
        assert_eq!(
            cache.statuses(),
            vec![JobStatus::New, JobStatus::InProgress, JobStatus::Done]
        );
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_records_skips_partitioner() {
        let cache = Arc::new(RecordingCache::default());
        let partitioner = Arc::new(CountingPartitioner {
            inner: KMeansPartitioner::default(),
            calls: AtomicUsize::new(0),
        });
        let orchestrator = JobOrchestrator::start(
            Arc::new(InMemoryPostStore::new()),
            cache.clone(),
            partitioner.clone(),
            settings(),
            CancellationToken::new(),
        );

        let q = query(5);
        orchestrator.submit(q).await.unwrap();
        let job = wait_terminal(&orchestrator, &q.fingerprint()).await;

        assert_eq!(job.status, JobStatus::Done);
        assert!(job.clusters.is_empty());
        assert_eq!(partitioner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.statuses(), vec![JobStatus::New, JobStatus::Done]);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_too_many_clusters_fails_job() {
        let posts = (0..4_u32)
            .map(|i| post(i as usize, 52.0 + f64::from(i) * 0.1, 13.0))
            .collect();
        let orchestrator = JobOrchestrator::start(
            Arc::new(InMemoryPostStore::with_posts(posts)),
            Arc::new(InMemoryJobCache::new()),
            kmeans(),
            settings(),
            CancellationToken::new(),
        );

        let q = query(10);
        orchestrator.submit(q).await.unwrap();
        let job = wait_terminal(&orchestrator, &q.fingerprint()).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.clusters.is_empty());
        let reason = job.reason.unwrap_or_default();
        assert!(
            reason.starts_with("insufficient points for requested partition count"),
            "unexpected reason: {reason}"
        );
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_cached_result_is_returned_verbatim() {
        let store = Arc::new(InMemoryPostStore::with_posts(twelve_posts()));
        let orchestrator = JobOrchestrator::start(
            store.clone(),
            Arc::new(InMemoryJobCache::new()),
            kmeans(),
            settings(),
            CancellationToken::new(),
        );

        let q = query(2);
        orchestrator.submit(q).await.unwrap();
        wait_terminal(&orchestrator, &q.fingerprint()).await;
        let stored = orchestrator.cache().get(&q.fingerprint()).await.unwrap().unwrap();

        match orchestrator.submit(q).await.unwrap() {
            Submission::Existing(bytes) => assert_eq!(bytes, stored),
            other => panic!("expected cache hit, got {other:?}"),
        }
        assert_eq!(store.query_count(), 1);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_claiming() {
        let store = Arc::new(GatedStore {
            entered: Notify::new(),
            gate: Semaphore::new(0),
        });
        let cache = Arc::new(InMemoryJobCache::new());
        let orchestrator = JobOrchestrator::start(
            store.clone(),
            cache.clone(),
            kmeans(),
            PipelineSettings {
                workers: 1,
                queue_depth: 1,
                ..settings()
            },
            CancellationToken::new(),
        );

        orchestrator.submit(query(1)).await.unwrap();
        store.entered.notified().await;
        orchestrator.submit(query(2)).await.unwrap();

        let rejected = query(3);
        assert!(matches!(
            orchestrator.submit(rejected).await,
            Err(SubmitError::QueueFull)
        ));
        assert!(orchestrator.status(&rejected.fingerprint()).await.unwrap().is_none());
        assert_eq!(cache.len(), 2);

        store.gate.add_permits(8);
        let first = wait_terminal(&orchestrator, &query(1).fingerprint()).await;
        assert_eq!(first.status, JobStatus::Done);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_closed() {
        let orchestrator = JobOrchestrator::start(
            Arc::new(InMemoryPostStore::new()),
            Arc::new(InMemoryJobCache::new()),
            kmeans(),
            settings(),
            CancellationToken::new(),
        );
        orchestrator.shutdown().await;
        assert!(matches!(
            orchestrator.submit(query(1)).await,
            Err(SubmitError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_queued_jobs_are_released_on_shutdown() {
        let store = Arc::new(GatedStore {
            entered: Notify::new(),
            gate: Semaphore::new(0),
        });
        let cache = Arc::new(InMemoryJobCache::new());
        let single = PipelineSettings {
            workers: 1,
            ..settings()
        };
        let cancel = CancellationToken::new();
        let orchestrator = JobOrchestrator::start(store.clone(), cache.clone(), kmeans(), single, cancel.clone());

        orchestrator.submit(query(1)).await.unwrap();
        store.entered.notified().await;
        for k in 2..=6 {
            assert!(matches!(orchestrator.submit(query(k)).await.unwrap(), Submission::Accepted(_)));
        }

        cancel.cancel();
        store.gate.add_permits(16);
        orchestrator.shutdown().await;

        let first = orchestrator.status(&query(1).fingerprint()).await.unwrap().unwrap();
        assert_eq!(first.status, JobStatus::Done);
        for k in 2..=6 {
            assert!(orchestrator.status(&query(k).fingerprint()).await.unwrap().is_none(), "k={k}");
        }

        let restarted = JobOrchestrator::start(store, cache, kmeans(), single, CancellationToken::new());
        for k in 2..=6 {
            let q = query(k);
            assert!(matches!(restarted.submit(q).await.unwrap(), Submission::Accepted(_)));
            assert_eq!(wait_terminal(&restarted, &q.fingerprint()).await.status, JobStatus::Done);
        }
        restarted.shutdown().await;
    }

    #[tokio::test]
    async fn test_transient_failure_is_not_cached() {
        let store = Arc::new(FlakyStore {
            failures: AtomicUsize::new(1),
            inner: InMemoryPostStore::with_posts(twelve_posts()),
        });
        let cache = Arc::new(RecordingCache::default());
        let orchestrator = JobOrchestrator::start(store.clone(), cache.clone(), kmeans(), settings(), CancellationToken::new());

        let q = query(3);
        assert!(matches!(orchestrator.submit(q).await.unwrap(), Submission::Accepted(_)));
        let mut released = false;
        for _ in 0..500 {
            if orchestrator.status(&q.fingerprint()).await.unwrap().is_none() {
                released = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(released, "claim was not released");
        assert!(!cache.statuses().contains(&JobStatus::Failed));

        assert!(matches!(orchestrator.submit(q).await.unwrap(), Submission::Accepted(_)));
        let job = wait_terminal(&orchestrator, &q.fingerprint()).await;
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.clusters.len(), 3);
        assert_eq!(store.inner.query_count(), 1);
        orchestrator.shutdown().await;
    }

    #[test]
    fn test_compute_without_rows_skips_partitioner() {
        let partitioner = CountingPartitioner {
            inner: KMeansPartitioner::default(),
            calls: AtomicUsize::new(0),
        };
        let clusters = compute(Vec::new(), &partitioner, 3, settings()).unwrap();
        assert!(clusters.is_empty());
        assert_eq!(partitioner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_only_deterministic_errors_are_terminal() {
        let insufficient = JobError::from(PartitionError::InsufficientPoints {
            requested: 10,
            available: 4,
        });
        assert!(!insufficient.is_transient());
        assert!(!JobError::from(RetrievalError::InvalidWindow { start: 0, end: 1 }).is_transient());
        assert!(JobError::from(RetrievalError::Storage("io".to_string())).is_transient());
        assert!(JobError::from(CacheError::Storage("io".to_string())).is_transient());
        assert!(JobError::Worker("panicked".to_string()).is_transient());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_compute_once() {
        let store = Arc::new(InMemoryPostStore::with_posts(twelve_posts()));
        let orchestrator = Arc::new(JobOrchestrator::start(
            store.clone(),
            Arc::new(InMemoryJobCache::new()),
            kmeans(),
            settings(),
            CancellationToken::new(),
        ));

        let q = query(3);
        let submissions = (0..8).map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.submit(q).await.unwrap() })
        });
        let accepted = futures::future::join_all(submissions)
            .await
            .into_iter()
            .map(|handle| handle.unwrap())
            .filter(|submission| matches!(submission, Submission::Accepted(_)))
            .count();
        assert_eq!(accepted, 1);

        assert_eq!(wait_terminal(&orchestrator, &q.fingerprint()).await.status, JobStatus::Done);
        assert_eq!(store.query_count(), 1);
        orchestrator.shutdown().await;
    }
}
