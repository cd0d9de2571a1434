//! Bounded-concurrency ingestion queue.
//!
//! Items are dispatched from the head of an ordered queue while
//! `current_processing` stays under the concurrency cap. Both the dispatch
//! decision (head removal + counter increment) and the completion
//! bookkeeping (decrement + re-dispatch) happen under a single lock
//! acquisition with no await inside the critical section, which is what
//! keeps `current_processing <= max_concurrent` true under a
//! multi-threaded runtime.
//!
//! Failed persistence retries with linear backoff and re-enters at the
//! queue *head*, ahead of freshly-added items. Cross-retry FIFO is
//! deliberately not guaranteed.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use jobscout_core::config::QueueSettings;
use jobscout_core::{JobStatus, NewJob, RawJob};
use jobscout_store::{JobStore, StoreError};

use crate::company::CompanyAggregator;
use crate::events::{ProcessOutcome, QueueEvent};
use crate::item::QueueItem;

/// Buffered events per subscriber before a slow one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tuning knobs for the ingestion queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum overlapping in-flight items.
    pub max_concurrent: usize,
    /// Total failed persistence attempts before an item is failed.
    pub retry_attempts: u32,
    /// Backoff base: attempt N waits `retry_delay * N`.
    pub retry_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl QueueConfig {
    /// Build from project config.
    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent.max(1), // minimum of 1
            retry_attempts: settings.retry_attempts,
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
        }
    }
}

/// Point-in-time queue snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStats {
    /// Items waiting in the queue (dispatched items are not counted).
    pub total_in_queue: usize,
    /// Queued items that have never been attempted.
    pub pending: usize,
    /// Items sitting out a backoff delay.
    pub retry_waiting: usize,
    /// Items dispatched and in flight.
    pub current_processing: usize,
    /// Whether a drain loop is active.
    pub is_processing: bool,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<QueueItem>,
    current_processing: usize,
    retry_waiting: usize,
    is_processing: bool,
    paused: bool,
    /// Bumped by `clear_queue`; backoff timers from an older generation
    /// drop their item instead of re-admitting it.
    generation: u64,
}

/// Ordered, bounded-concurrency ingestion queue.
///
/// Cheap to clone; clones share the same queue. Owned by whatever composes
/// the ingestion pipeline — there is no process-wide instance.
#[derive(Clone)]
pub struct IngestQueue {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn JobStore>,
    aggregator: CompanyAggregator,
    config: QueueConfig,
    state: Mutex<QueueState>,
    events: broadcast::Sender<QueueEvent>,
}

impl IngestQueue {
    pub fn new(store: Arc<dyn JobStore>, config: QueueConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let aggregator = CompanyAggregator::new(store.clone());
        Self {
            inner: Arc::new(Inner {
                store,
                aggregator,
                config,
                state: Mutex::new(QueueState::default()),
                events,
            }),
        }
    }

    /// Subscribe to queue events. Subscribe before adding jobs if you need
    /// the full event history of a batch.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    /// Append a batch of raw records to the queue tail and start the drain
    /// loop if it is idle. Returns the resulting queue size. Processing
    /// happens in background tasks; this call never waits for it.
    pub async fn add_jobs(&self, jobs: Vec<RawJob>, source: &str) -> usize {
        let count = jobs.len();
        let size = {
            let mut state = self.inner.state.lock().await;
            for job in jobs {
                state.queue.push_back(QueueItem::new(job, source));
            }
            state.queue.len()
        };
        debug!(count, source, queue_size = size, "jobs enqueued");
        self.inner.emit(QueueEvent::JobsAdded {
            count,
            source: source.to_string(),
        });
        self.inner.ensure_draining().await;
        size
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock().await;
        QueueStats {
            total_in_queue: state.queue.len(),
            pending: state
                .queue
                .iter()
                .filter(|i| i.status == JobStatus::Pending)
                .count(),
            retry_waiting: state.retry_waiting,
            current_processing: state.current_processing,
            is_processing: state.is_processing,
        }
    }

    /// Drop every queued item and cancel scheduled retries. In-flight items
    /// run to completion. Returns how many items were dropped.
    pub async fn clear_queue(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let dropped = state.queue.len() + state.retry_waiting;
        state.queue.clear();
        state.generation += 1;
        state.retry_waiting = 0;
        info!(dropped, "queue cleared");
        dropped
    }

    /// Stop dispatching new items. In-flight items are unaffected.
    pub async fn pause_processing(&self) {
        let mut state = self.inner.state.lock().await;
        state.paused = true;
        info!("queue paused");
    }

    /// Resume dispatching after a pause.
    pub async fn resume_processing(&self) {
        let drain_active = {
            let mut state = self.inner.state.lock().await;
            state.paused = false;
            state.is_processing
        };
        info!("queue resumed");
        if drain_active {
            self.inner.dispatch().await;
        } else {
            self.inner.ensure_draining().await;
        }
    }
}

impl Inner {
    fn emit(&self, event: QueueEvent) {
        // Fire-and-forget: no subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Start a drain loop unless one is already active.
    ///
    /// Returns a boxed future to break the `Send`-inference cycle formed by
    /// the mutually recursive async spawns (`ensure_draining` →
    /// `start_drain` → `dispatch` → `run_item` → `retry_or_fail` →
    /// `readmit` → `ensure_draining`); an opaque `async fn` return type here
    /// cannot be resolved inside its own defining scope.
    fn ensure_draining(self: &Arc<Self>) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let start = {
                let mut state = self.state.lock().await;
                if state.is_processing || state.queue.is_empty() {
                    false
                } else {
                    state.is_processing = true;
                    true
                }
            };
            if start {
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.start_drain().await });
            }
        })
    }

    async fn start_drain(self: Arc<Self>) {
        if let Err(e) = self.store.ready().await {
            warn!(error = %e, "persistence unreachable, drain aborted");
            {
                let mut state = self.state.lock().await;
                state.is_processing = false;
            }
            self.emit(QueueEvent::ProcessingError {
                error: e.to_string(),
            });
            return;
        }
        self.dispatch().await;
    }

    /// Dispatch queued items up to the concurrency cap.
    ///
    /// Boxed for the same reason as [`Inner::ensure_draining`]: `dispatch`
    /// and `run_item` spawn each other, so an opaque `async fn` return type
    /// here forms a `Send`-inference cycle that cannot be resolved.
    fn dispatch(self: &Arc<Self>) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut to_run = Vec::new();
            {
                let mut state = self.state.lock().await;
                while !state.paused && state.current_processing < self.config.max_concurrent {
                    let Some(mut item) = state.queue.pop_front() else {
                        break;
                    };
                    item.status = JobStatus::Processing;
                    state.current_processing += 1;
                    to_run.push(item);
                }
            }
            for item in to_run {
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.run_item(item).await });
            }
        })
    }

    async fn run_item(self: Arc<Self>, item: QueueItem) {
        self.process_item(item).await;

        let drained = {
            let mut state = self.state.lock().await;
            state.current_processing -= 1;
            if state.queue.is_empty() && state.current_processing == 0 {
                state.is_processing = false;
                true
            } else {
                false
            }
        };
        if drained {
            debug!("queue drained");
            self.emit(QueueEvent::ProcessingCompleted);
        } else {
            self.dispatch().await;
        }
    }

    async fn process_item(self: &Arc<Self>, mut item: QueueItem) {
        match self.store.find_job(&item.job.url, &item.source).await {
            Ok(Some(_)) => self.resolve_duplicate(&mut item),
            Ok(None) => {
                let new_job = NewJob::from_raw(item.job.clone(), &item.source);
                match self.store.insert_job(new_job).await {
                    Ok(record) => {
                        item.status = JobStatus::Completed;
                        info!(
                            id = %record.id,
                            url = %record.url,
                            source = %record.source,
                            "job persisted"
                        );
                        self.emit(QueueEvent::JobProcessed {
                            job: item.job.clone(),
                            source: item.source.clone(),
                            outcome: ProcessOutcome::Saved,
                        });
                        match self
                            .aggregator
                            .record_posting(&record.company, record.id)
                            .await
                        {
                            Ok(company) => self.emit(QueueEvent::CompanyProcessed {
                                company: company.name,
                                job_id: record.id,
                            }),
                            // Aggregation never blocks or fails the job path.
                            Err(e) => warn!(
                                company = %record.company,
                                error = %e,
                                "company aggregation failed"
                            ),
                        }
                    }
                    // Lost a race with a concurrent writer for the same key.
                    Err(StoreError::Conflict(_)) => self.resolve_duplicate(&mut item),
                    Err(e) => self.retry_or_fail(item, e).await,
                }
            }
            Err(e) => self.retry_or_fail(item, e).await,
        }
    }

    fn resolve_duplicate(&self, item: &mut QueueItem) {
        item.status = JobStatus::Duplicate;
        debug!(url = %item.job.url, source = %item.source, "duplicate posting skipped");
        self.emit(QueueEvent::JobProcessed {
            job: item.job.clone(),
            source: item.source.clone(),
            outcome: ProcessOutcome::Duplicate,
        });
    }

    /// Count the failure, then either schedule priority re-entry or fail
    /// the item terminally once the budget is spent.
    async fn retry_or_fail(self: &Arc<Self>, mut item: QueueItem, error: StoreError) {
        item.attempts += 1;
        if item.attempts >= self.config.retry_attempts {
            item.status = JobStatus::Failed;
            warn!(
                url = %item.job.url,
                source = %item.source,
                attempts = item.attempts,
                error = %error,
                "job failed permanently"
            );
            self.emit(QueueEvent::JobFailed {
                job: item.job.clone(),
                source: item.source.clone(),
                error: error.to_string(),
            });
            return;
        }

        item.status = JobStatus::Retry;
        let delay = self.config.retry_delay * item.attempts;
        let generation = {
            let mut state = self.state.lock().await;
            state.retry_waiting += 1;
            state.generation
        };
        warn!(
            url = %item.job.url,
            source = %item.source,
            attempts = item.attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "persistence failed, retry scheduled"
        );
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.readmit(item, generation).await;
        });
    }

    /// Re-admit a retried item at the queue head, ahead of anything added
    /// since. Retries jump the queue; that is the intended ordering
    /// contract, not an accident of list manipulation.
    async fn readmit(self: &Arc<Self>, item: QueueItem, generation: u64) {
        {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                debug!(url = %item.job.url, "retry dropped, queue was cleared");
                return;
            }
            state.retry_waiting -= 1;
            state.queue.push_front(item);
        }
        self.ensure_draining().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use jobscout_core::{CompanyRecord, JobRecord};
    use jobscout_store::MemoryStore;

    fn raw_job(url: &str) -> RawJob {
        RawJob {
            title: format!("job {url}"),
            company: "Acme".to_string(),
            location: None,
            url: url.to_string(),
            description: None,
        }
    }

    fn fast_config(max_concurrent: usize) -> QueueConfig {
        QueueConfig {
            max_concurrent,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(10),
        }
    }

    /// Store wrapper with failure injection and concurrency tracking.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_all: AtomicBool,
        ready_failing: AtomicBool,
        /// url -> remaining injected insert failures.
        fail_remaining: StdMutex<HashMap<String, u32>>,
        insert_delay: Option<Duration>,
        insert_attempts: AtomicUsize,
        concurrent: AtomicUsize,
        max_concurrent_seen: AtomicUsize,
    }

    impl FlakyStore {
        fn failing() -> Self {
            let store = Self::default();
            store.fail_all.store(true, Ordering::SeqCst);
            store
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                insert_delay: Some(delay),
                ..Self::default()
            }
        }

        fn fail_url_once(&self, url: &str) {
            self.fail_remaining
                .lock()
                .unwrap()
                .insert(url.to_string(), 1);
        }
    }

    #[async_trait]
    impl JobStore for FlakyStore {
        async fn find_job(
            &self,
            url: &str,
            source: &str,
        ) -> Result<Option<JobRecord>, StoreError> {
            self.inner.find_job(url, source).await
        }

        async fn insert_job(&self, job: NewJob) -> Result<JobRecord, StoreError> {
            self.insert_attempts.fetch_add(1, Ordering::SeqCst);
            let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent_seen.fetch_max(current, Ordering::SeqCst);
            if let Some(delay) = self.insert_delay {
                tokio::time::sleep(delay).await;
            }
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            let injected = self.fail_all.load(Ordering::SeqCst) || {
                let mut map = self.fail_remaining.lock().unwrap();
                match map.get_mut(&job.url) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        true
                    }
                    _ => false,
                }
            };
            if injected {
                return Err(StoreError::Connection("injected failure".to_string()));
            }
            self.inner.insert_job(job).await
        }

        async fn find_company(&self, name: &str) -> Result<Option<CompanyRecord>, StoreError> {
            self.inner.find_company(name).await
        }

        async fn upsert_company(
            &self,
            company: CompanyRecord,
        ) -> Result<CompanyRecord, StoreError> {
            self.inner.upsert_company(company).await
        }

        async fn ready(&self) -> Result<(), StoreError> {
            if self.ready_failing.load(Ordering::SeqCst) {
                return Err(StoreError::Connection("store down".to_string()));
            }
            Ok(())
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<QueueEvent>) -> QueueEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a queue event")
            .expect("event channel closed")
    }

    async fn collect_until_completed(
        rx: &mut broadcast::Receiver<QueueEvent>,
    ) -> Vec<QueueEvent> {
        let mut events = Vec::new();
        loop {
            let event = next_event(rx).await;
            let done = matches!(event, QueueEvent::ProcessingCompleted);
            events.push(event);
            if done {
                return events;
            }
        }
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<QueueEvent>,
        pred: impl Fn(&QueueEvent) -> bool,
    ) -> QueueEvent {
        loop {
            let event = next_event(rx).await;
            if pred(&event) {
                return event;
            }
        }
    }

    fn saved_urls(events: &[QueueEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                QueueEvent::JobProcessed {
                    job,
                    outcome: ProcessOutcome::Saved,
                    ..
                } => Some(job.url.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn drain_persists_and_triggers_company_aggregation() {
        let store = Arc::new(MemoryStore::new());
        let queue = IngestQueue::new(store.clone(), fast_config(5));
        let mut rx = queue.subscribe();

        let size = queue.add_jobs(vec![raw_job("u1")], "test").await;
        assert_eq!(size, 1);

        let events = collect_until_completed(&mut rx).await;
        assert_eq!(saved_urls(&events), vec!["u1"]);
        assert!(events.iter().any(|e| matches!(
            e,
            QueueEvent::CompanyProcessed { company, .. } if company == "Acme"
        )));

        let stats = queue.stats().await;
        assert_eq!(stats.total_in_queue, 0);
        assert_eq!(stats.current_processing, 0);
        assert!(!stats.is_processing);
        assert_eq!(store.job_count().await, 1);
        assert_eq!(store.company_count().await, 1);
    }

    #[tokio::test]
    async fn second_submission_of_same_key_is_a_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let queue = IngestQueue::new(store.clone(), fast_config(5));
        let mut rx = queue.subscribe();

        queue.add_jobs(vec![raw_job("u1")], "test").await;
        collect_until_completed(&mut rx).await;

        queue.add_jobs(vec![raw_job("u1")], "test").await;
        let events = collect_until_completed(&mut rx).await;

        assert!(saved_urls(&events).is_empty());
        assert!(events.iter().any(|e| matches!(
            e,
            QueueEvent::JobProcessed {
                outcome: ProcessOutcome::Duplicate,
                ..
            }
        )));
        assert_eq!(store.job_count().await, 1);
    }

    #[tokio::test]
    async fn concurrency_stays_under_the_cap() {
        let store = Arc::new(FlakyStore::with_delay(Duration::from_millis(10)));
        let queue = IngestQueue::new(store.clone(), fast_config(3));
        let mut rx = queue.subscribe();

        let jobs: Vec<_> = (0..20).map(|i| raw_job(&format!("u{i}"))).collect();
        queue.add_jobs(jobs, "test").await;

        let events = collect_until_completed(&mut rx).await;
        assert_eq!(saved_urls(&events).len(), 20);
        assert!(
            store.max_concurrent_seen.load(Ordering::SeqCst) <= 3,
            "observed {} overlapping inserts",
            store.max_concurrent_seen.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn always_failing_insert_fails_after_exact_retry_budget() {
        let store = Arc::new(FlakyStore::failing());
        let queue = IngestQueue::new(store.clone(), fast_config(5));
        let mut rx = queue.subscribe();

        queue.add_jobs(vec![raw_job("u1")], "test").await;
        wait_for(&mut rx, |e| matches!(e, QueueEvent::JobFailed { .. })).await;

        assert_eq!(store.insert_attempts.load(Ordering::SeqCst), 3);
        let stats = queue.stats().await;
        assert_eq!(stats.total_in_queue, 0);
        assert_eq!(stats.retry_waiting, 0);
    }

    #[tokio::test]
    async fn retried_item_jumps_the_queue() {
        let store = Arc::new(FlakyStore::with_delay(Duration::from_millis(50)));
        store.fail_url_once("a");
        let queue = IngestQueue::new(store.clone(), fast_config(1));
        let mut rx = queue.subscribe();

        queue
            .add_jobs(vec![raw_job("a"), raw_job("b"), raw_job("c")], "test")
            .await;

        // "a" fails once and re-enters at the head while "b" is in flight,
        // so it is persisted before "c" despite failing first.
        let mut saved = Vec::new();
        while saved.len() < 3 {
            if let QueueEvent::JobProcessed {
                job,
                outcome: ProcessOutcome::Saved,
                ..
            } = next_event(&mut rx).await
            {
                saved.push(job.url);
            }
        }
        assert_eq!(saved, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn paused_queue_accounts_for_every_added_item() {
        let store = Arc::new(MemoryStore::new());
        let queue = IngestQueue::new(store.clone(), fast_config(5));
        let mut rx = queue.subscribe();

        queue.pause_processing().await;
        let size = queue
            .add_jobs((0..4).map(|i| raw_job(&format!("u{i}"))).collect(), "test")
            .await;
        assert_eq!(size, 4);

        let stats = queue.stats().await;
        assert_eq!(stats.total_in_queue, 4);
        assert_eq!(stats.pending, 4);
        assert_eq!(stats.current_processing, 0);

        let size = queue
            .add_jobs(vec![raw_job("u4"), raw_job("u5")], "test")
            .await;
        assert_eq!(size, 6);

        queue.resume_processing().await;
        let events = collect_until_completed(&mut rx).await;
        assert_eq!(saved_urls(&events).len(), 6);
        assert_eq!(store.job_count().await, 6);
    }

    #[tokio::test]
    async fn clear_queue_cancels_scheduled_retries() {
        let store = Arc::new(FlakyStore::failing());
        let queue = IngestQueue::new(
            store.clone(),
            QueueConfig {
                max_concurrent: 5,
                retry_attempts: 3,
                retry_delay: Duration::from_millis(100),
            },
        );

        queue.add_jobs(vec![raw_job("u1")], "test").await;

        // Wait until the first failure has parked the item in backoff.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while queue.stats().await.retry_waiting == 0 {
            assert!(tokio::time::Instant::now() < deadline, "retry never scheduled");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let dropped = queue.clear_queue().await;
        assert_eq!(dropped, 1);

        // The backoff timer fires into a newer generation and must not
        // resurrect the item.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(store.insert_attempts.load(Ordering::SeqCst), 1);
        let stats = queue.stats().await;
        assert_eq!(stats.total_in_queue, 0);
        assert_eq!(stats.retry_waiting, 0);
    }

    #[tokio::test]
    async fn unreachable_store_surfaces_error_and_stays_reenterable() {
        let store = Arc::new(FlakyStore::default());
        store.ready_failing.store(true, Ordering::SeqCst);
        let queue = IngestQueue::new(store.clone(), fast_config(5));
        let mut rx = queue.subscribe();

        queue.add_jobs(vec![raw_job("u1")], "test").await;
        wait_for(&mut rx, |e| matches!(e, QueueEvent::ProcessingError { .. })).await;

        let stats = queue.stats().await;
        assert_eq!(stats.total_in_queue, 1, "queued item must survive the aborted drain");
        assert!(!stats.is_processing);

        // Store comes back; the next add restarts the drain and both items
        // go through.
        store.ready_failing.store(false, Ordering::SeqCst);
        queue.add_jobs(vec![raw_job("u2")], "test").await;
        let events = collect_until_completed(&mut rx).await;
        assert_eq!(saved_urls(&events).len(), 2);
    }
}
