//! Debounced persistence scheduler
//!
//! Promotions mark their owner dirty; a periodic tick writes every dirty
//! owner once the minimum delay since the previous flush has passed. Bursts
//! of edits collapse into one write carrying the latest effective state.

use crate::error::Result;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A deferred write
///
/// Implementations read the state to persist when they run, not when they
/// are scheduled.
pub trait PersistAction: Send + Sync {
    fn persist(&self) -> Result<()>;
}

impl<F> PersistAction for F
where
    F: Fn() -> Result<()> + Send + Sync,
{
    fn persist(&self) -> Result<()> {
        self()
    }
}

/// Configuration for the persistence scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minimum time between two flushes (default: 15s)
    pub min_delay: Duration,
    /// How often the background task checks for dirty owners (default: 1s)
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(15),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Result of executing one batch of writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.written == 0 && self.failed == 0
    }
}

pub type PersistBatch = Vec<(String, Arc<dyn PersistAction>)>;

/// Coalescing write scheduler
pub struct PersistenceScheduler {
    config: SchedulerConfig,
    dirty: DashMap<String, Arc<dyn PersistAction>>,
    /// `None` until the first poll records a baseline
    last_flush: Mutex<Option<Instant>>,
    /// Held while a batch runs; ticks and flushes never write concurrently
    writing: Arc<Mutex<()>>,
    running: Arc<AtomicBool>,
}

impl PersistenceScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            dirty: DashMap::new(),
            last_flush: Mutex::new(None),
            writing: Arc::new(Mutex::new(())),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SchedulerConfig::default())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Mark `key` dirty; a pending action for the same key is replaced
    pub fn schedule(&self, key: impl Into<String>, action: Arc<dyn PersistAction>) {
        let key = key.into();
        if self.dirty.insert(key.clone(), action).is_none() {
            debug!("Scheduled persistence of {}", key);
        }
    }

    pub fn pending(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.dirty.contains_key(key)
    }

    /// Take the dirty set if the debounce window has elapsed
    ///
    /// The first call only records `now` as the baseline.
    pub fn poll(&self, now: Instant) -> PersistBatch {
        let mut last_flush = self.last_flush.lock();
        let Some(last) = *last_flush else {
            *last_flush = Some(now);
            return Vec::new();
        };

        if now.saturating_duration_since(last) < self.config.min_delay || self.dirty.is_empty() {
            return Vec::new();
        }

        *last_flush = Some(now);
        self.drain()
    }

    fn drain(&self) -> PersistBatch {
        let keys: Vec<String> = self.dirty.iter().map(|e| e.key().clone()).collect();
        let mut batch: PersistBatch = keys
            .into_iter()
            .filter_map(|key| self.dirty.remove(&key))
            .collect();
        batch.sort_by(|a, b| a.0.cmp(&b.0));
        batch
    }

    /// Execute a batch; one failing write does not stop the others
    pub fn run_batch(batch: PersistBatch) -> FlushReport {
        let mut report = FlushReport::default();
        for (key, action) in batch {
            match action.persist() {
                Ok(()) => report.written += 1,
                Err(e) => {
                    error!("Failed to persist {}: {}", key, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Poll once and run any due writes off the async executor
    pub async fn tick(&self) -> FlushReport {
        let batch = self.poll(Instant::now());
        if batch.is_empty() {
            return FlushReport::default();
        }

        let count = batch.len();
        let writing = self.writing.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _writing = writing.lock();
            Self::run_batch(batch)
        });
        match task.await {
            Ok(report) => {
                if report.failed > 0 {
                    warn!(
                        "Persistence flush: {} written, {} failed",
                        report.written, report.failed
                    );
                } else {
                    debug!("Persistence flush: {} written", report.written);
                }
                report
            }
            Err(e) => {
                error!("Persistence task panicked: {}", e);
                FlushReport {
                    written: 0,
                    failed: count,
                }
            }
        }
    }

    /// Start the background flush loop
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "Persistence scheduler started (min delay: {:?}, poll: {:?})",
            self.config.min_delay, self.config.poll_interval
        );

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.config.poll_interval);

            while self.running.load(Ordering::SeqCst) {
                timer.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                self.tick().await;
            }

            info!("Persistence scheduler stopped");
        })
    }

    /// Stop the background loop after its current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Write everything dirty now, ignoring the debounce window
    ///
    /// Blocks until a batch already running in the background has finished.
    pub fn flush_all(&self) -> FlushReport {
        let _writing = self.writing.lock();
        let batch = self.drain();
        if batch.is_empty() {
            return FlushReport::default();
        }
        *self.last_flush.lock() = Some(Instant::now());

        let report = Self::run_batch(batch);
        info!(
            "Flushed pending configuration: {} written, {} failed",
            report.written, report.failed
        );
        report
    }
}

impl Default for PersistenceScheduler {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for PersistenceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceScheduler")
            .field("config", &self.config)
            .field("pending", &self.dirty.len())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StagingError;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn PersistAction>) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        let action: Arc<dyn PersistAction> = Arc::new(move || -> Result<()> {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, action)
    }

    fn scheduler(min_delay_ms: u64) -> PersistenceScheduler {
        PersistenceScheduler::new(SchedulerConfig {
            min_delay: Duration::from_millis(min_delay_ms),
            poll_interval: Duration::from_millis(5),
        })
    }

    #[test]
    fn test_first_poll_only_records_baseline() {
        let scheduler = scheduler(0);
        let (_, action) = counter();
        scheduler.schedule("general", action);

        let t0 = Instant::now();
        assert!(scheduler.poll(t0).is_empty());
        assert_eq!(scheduler.poll(t0).len(), 1);
    }

    #[test]
    fn test_debounce_window() {
        let scheduler = scheduler(15_000);
        let (_, action) = counter();
        let t0 = Instant::now();
        scheduler.poll(t0);

        scheduler.schedule("general", action);
        assert!(scheduler.poll(t0 + Duration::from_secs(5)).is_empty());
        assert_eq!(scheduler.poll(t0 + Duration::from_secs(15)).len(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_repeated_schedules_collapse() {
        let scheduler = scheduler(0);
        let (count, action) = counter();
        let t0 = Instant::now();
        scheduler.poll(t0);

        for _ in 0..10 {
            scheduler.schedule("strategies", action.clone());
        }
        let report = PersistenceScheduler::run_batch(scheduler.poll(t0));

        assert_eq!(report.written, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_write_does_not_block_others() {
        let scheduler = scheduler(0);
        let (count, ok) = counter();
        let failing: Arc<dyn PersistAction> =
            Arc::new(|| -> Result<()> { Err(StagingError::Persistence("disk full".into())) });
        scheduler.schedule("a", failing);
        scheduler.schedule("b", ok);

        let report = scheduler.flush_all();

        assert_eq!(report, FlushReport { written: 1, failed: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_empty_dirty_set_does_not_move_baseline() {
        let scheduler = scheduler(10_000);
        let (_, action) = counter();
        let t0 = Instant::now();
        scheduler.poll(t0);
        assert!(scheduler.poll(t0 + Duration::from_secs(20)).is_empty());

        scheduler.schedule("general", action);
        assert_eq!(scheduler.poll(t0 + Duration::from_secs(21)).len(), 1);
    }

    #[tokio::test]
    async fn test_background_loop_flushes() {
        let scheduler = Arc::new(scheduler(0));
        let (count, action) = counter();

        let handle = scheduler.clone().start();
        scheduler.schedule("general", action);

        for _ in 0..100 {
            if count.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        scheduler.stop();
        handle.await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_flush_waits_for_running_tick() {
        let scheduler = Arc::new(scheduler(0));
        let started = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        let action: Arc<dyn PersistAction> = {
            let (started, active, overlapped) = (started.clone(), active.clone(), overlapped.clone());
            Arc::new(move || -> Result<()> {
                started.fetch_add(1, Ordering::SeqCst);
                if active.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlapped.store(true, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(50));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        };

        let handle = scheduler.clone().start();
        scheduler.schedule("strategies", action.clone());
        for _ in 0..200 {
            if started.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(started.load(Ordering::SeqCst), 1);

        // Promoted again while the first write is still running
        scheduler.schedule("strategies", action);
        scheduler.stop();
        let flusher = scheduler.clone();
        let report = tokio::task::spawn_blocking(move || flusher.flush_all())
            .await
            .unwrap();
        handle.await.unwrap();

        assert_eq!(report, FlushReport { written: 1, failed: 0 });
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert!(!overlapped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_tick_without_runtime_work_is_empty() {
        let scheduler = scheduler(0);
        let report = tokio_test::block_on(scheduler.tick());
        assert!(report.is_empty());
    }
}
