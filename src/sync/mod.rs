//! Translation synchronizer.
//!
//! A background task that, on every tick, diffs the field catalog against the
//! translation store for each supported locale and inserts the missing rows.
//! It never overwrites or deletes rows, so passes are idempotent and can be
//! abandoned at any point.
//!
//! Lifecycle: `Stopped → Running → Stopping → Stopped`.

mod metrics;

pub use metrics::{MetricsReport, SyncMetrics};

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::i18n::{FieldCatalog, FieldDefinition, Locale};
use crate::store::{InsertOutcome, StoreError, TranslationStore};

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Stopped,
    Running,
    /// Shutdown requested, waiting for the in-flight pass
    Stopping,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Text written into newly created rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedPolicy {
    /// Seed with the field's source-locale text
    #[default]
    DefaultText,
    /// Leave the row untranslated
    Empty,
}

impl SeedPolicy {
    fn text_for(self, field: &FieldDefinition) -> &'static str {
        match self {
            Self::DefaultText => field.default_text,
            Self::Empty => "",
        }
    }
}

impl std::str::FromStr for SeedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "default_text" => Ok(Self::DefaultText),
            "empty" => Ok(Self::Empty),
            other => Err(format!("unknown seed policy '{}'", other)),
        }
    }
}

/// Timing and seeding knobs for the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Time between the starts of consecutive passes
    pub interval: Duration,
    /// Upper bound for any single store call
    pub call_timeout: Duration,
    /// How long `shutdown` waits for the in-flight pass
    pub shutdown_grace: Duration,
    pub seed_policy: SeedPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            call_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            seed_policy: SeedPolicy::DefaultText,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// The in-flight pass did not stop in time and was abandoned.
    #[error("in-flight pass abandoned after {grace:?} shutdown grace period")]
    ShutdownTimeout { grace: Duration },

    #[error("synchronizer worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone)]
pub struct PassReport {
    /// Locales the pass saw
    pub locales: usize,
    pub inserted: usize,
    /// Inserts that found the row already there
    pub already_present: usize,
    /// Locales whose batch failed; retried next pass
    pub failed_locales: Vec<Locale>,
    /// The locale list itself could not be read
    pub aborted: bool,
    /// A stop request ended the pass before every locale was visited
    pub interrupted: bool,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        !self.aborted && !self.interrupted && self.failed_locales.is_empty()
    }
}

#[derive(Debug, Default)]
struct LocaleOutcome {
    inserted: usize,
    already_present: usize,
}

/// Runs passes. Shared between the scheduled worker and `run_once`.
struct Reconciler {
    store: Arc<dyn TranslationStore>,
    catalog: Arc<FieldCatalog>,
    call_timeout: Duration,
    seed_policy: SeedPolicy,
    metrics: Arc<SyncMetrics>,
    /// Held for the duration of a pass so passes never overlap
    pass_lock: tokio::sync::Mutex<()>,
    passes: watch::Sender<u64>,
}

impl Reconciler {
    async fn run_pass(&self, stop: &watch::Receiver<bool>) -> PassReport {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();
        let mut report = PassReport::default();

        match self
            .call("list_supported_locales", self.store.list_supported_locales())
            .await
        {
            Ok(locales) => {
                report.locales = locales.len();
                for locale in &locales {
                    if *stop.borrow() {
                        info!("Stop requested, ending translation sync pass early");
                        report.interrupted = true;
                        break;
                    }

                    match self.sync_locale(locale).await {
                        Ok(outcome) => {
                            report.inserted += outcome.inserted;
                            report.already_present += outcome.already_present;
                        }
                        Err(e) => {
                            warn!(
                                locale = %locale,
                                operation = e.operation(),
                                "Translation sync failed for locale, retrying next pass: {}",
                                e
                            );
                            report.failed_locales.push(locale.clone());
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Translation sync pass aborted, could not list locales: {}", e);
                report.aborted = true;
            }
        }

        self.metrics.record_pass(&report);
        self.passes.send_modify(|n| *n += 1);

        if report.inserted > 0 || !report.is_clean() {
            info!(
                locales = report.locales,
                inserted = report.inserted,
                failed = report.failed_locales.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Translation sync pass finished"
            );
        } else {
            debug!(
                locales = report.locales,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Translation sync pass found nothing missing"
            );
        }

        report
    }

    async fn sync_locale(&self, locale: &Locale) -> Result<LocaleOutcome, StoreError> {
        let existing = self
            .call("fetch_existing", self.store.fetch_existing(locale))
            .await?;

        let mut outcome = LocaleOutcome::default();
        for field in self.catalog.missing_from(&existing) {
            let text = self.seed_policy.text_for(field);
            match self
                .call(
                    "insert_missing",
                    self.store.insert_missing(locale, field.key, text),
                )
                .await?
            {
                InsertOutcome::Inserted => outcome.inserted += 1,
                InsertOutcome::AlreadyPresent => outcome.already_present += 1,
            }
        }

        if outcome.inserted > 0 {
            debug!(locale = %locale, "Inserted {} translation rows", outcome.inserted);
        }
        Ok(outcome)
    }

    /// Count a pass whose task died before producing a report.
    fn record_crashed_pass(&self) {
        self.metrics.record_pass(&PassReport {
            aborted: true,
            ..PassReport::default()
        });
        self.passes.send_modify(|n| *n += 1);
    }

    /// Bound a store call by `call_timeout`.
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                after: self.call_timeout,
            }),
        }
    }
}

struct Worker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Keeps the translation store in step with the field catalog.
///
/// # Example
/// ```ignore
/// let sync = Synchronizer::new(store, FieldCatalog::initialize()?, SyncSettings::default());
/// sync.start();
/// // ...
/// sync.shutdown().await?;
/// ```
pub struct Synchronizer {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    shutdown_grace: Duration,
    state: watch::Sender<SyncState>,
    worker: Mutex<Option<Worker>>,
}

impl Synchronizer {
    pub fn new(
        store: Arc<dyn TranslationStore>,
        catalog: Arc<FieldCatalog>,
        settings: SyncSettings,
    ) -> Self {
        let (passes, _) = watch::channel(0);
        let (state, _) = watch::channel(SyncState::Stopped);

        Self {
            reconciler: Arc::new(Reconciler {
                store,
                catalog,
                call_timeout: settings.call_timeout,
                seed_policy: settings.seed_policy,
                metrics: Arc::new(SyncMetrics::new()),
                pass_lock: tokio::sync::Mutex::new(()),
                passes,
            }),
            interval: settings.interval,
            shutdown_grace: settings.shutdown_grace,
            state,
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn state_receiver(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Subscribe to the number of completed passes
    pub fn pass_receiver(&self) -> watch::Receiver<u64> {
        self.reconciler.passes.subscribe()
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.reconciler.metrics
    }

    /// Start the schedule: one pass now, then one every interval.
    ///
    /// Must be called from within a tokio runtime. No-op if already running;
    /// refused while a previous shutdown is still in progress.
    pub fn start(&self) {
        let mut worker = self.lock_worker();

        match self.state() {
            SyncState::Running => {
                debug!("Translation synchronizer already running");
                return;
            }
            SyncState::Stopping => {
                warn!("Translation synchronizer is stopping, start ignored");
                return;
            }
            SyncState::Stopped => {}
        }

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_schedule(
            Arc::clone(&self.reconciler),
            self.interval,
            stop_rx,
        ));

        *worker = Some(Worker { stop, handle });
        self.state.send_replace(SyncState::Running);
        info!(
            interval_secs = self.interval.as_secs(),
            fields = self.reconciler.catalog.len(),
            "Translation synchronizer started"
        );
    }

    /// Run a single pass outside the schedule.
    ///
    /// Waits for any scheduled pass in progress to finish first.
    pub async fn run_once(&self) -> PassReport {
        let (_stop, stop_rx) = watch::channel(false);
        self.reconciler.run_pass(&stop_rx).await
    }

    /// Stop the schedule and wait for the in-flight pass.
    ///
    /// The pass stops after its current locale batch. If that takes longer than
    /// the grace period the worker is aborted; the engine still ends up
    /// `Stopped` and `SyncError::ShutdownTimeout` is returned. Rows are inserted
    /// idempotently, so an abandoned pass loses no correctness.
    ///
    /// A call made while another shutdown is in progress waits for that one to
    /// reach `Stopped` before returning.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        let worker = {
            let mut guard = self.lock_worker();
            let worker = guard.take();
            if worker.is_some() {
                self.state.send_replace(SyncState::Stopping);
            }
            worker
        };

        let Some(Worker { stop, mut handle }) = worker else {
            let mut states = self.state.subscribe();
            if *states.borrow_and_update() == SyncState::Stopping {
                debug!("Translation synchronizer already stopping, waiting for it");
                // Bounded by the other caller's grace period
                let _ = states.wait_for(|s| *s == SyncState::Stopped).await;
            } else {
                debug!("Translation synchronizer not running, nothing to stop");
            }
            return Ok(());
        };

        info!("Stopping translation synchronizer");
        stop.send_replace(true);

        let result = match time::timeout(self.shutdown_grace, &mut handle).await {
            Ok(joined) => joined.map_err(SyncError::from),
            Err(_) => {
                handle.abort();
                Err(SyncError::ShutdownTimeout {
                    grace: self.shutdown_grace,
                })
            }
        };

        self.state.send_replace(SyncState::Stopped);
        match &result {
            Ok(()) => info!("Translation synchronizer stopped"),
            Err(e) => warn!("Translation synchronizer stopped uncleanly: {}", e),
        }
        result
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        // A panic while holding the lock cannot leave the Option half-written
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        if let Some(worker) = self.lock_worker().take() {
            error!("Translation synchronizer dropped while running, aborting worker");
            worker.handle.abort();
        }
    }
}

async fn run_schedule(
    reconciler: Arc<Reconciler>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Err means the sender is gone, which also means stop
            _ = stop.changed() => break,
            _ = ticker.tick() => {}
        }

        // A panicking pass must not take the schedule down with it
        let pass = PassTask::spawn(Arc::clone(&reconciler), stop.clone());
        if let Err(e) = pass.join().await {
            error!("Translation sync pass crashed, retrying next tick: {}", e);
            reconciler.record_crashed_pass();
        }
    }

    debug!("Translation sync schedule exited");
}

/// A pass running on its own task. Dropping it aborts the task, so aborting
/// the schedule also abandons the pass.
struct PassTask(JoinHandle<PassReport>);

impl PassTask {
    fn spawn(reconciler: Arc<Reconciler>, stop: watch::Receiver<bool>) -> Self {
        Self(tokio::spawn(async move { reconciler.run_pass(&stop).await }))
    }

    async fn join(mut self) -> Result<PassReport, JoinError> {
        (&mut self.0).await
    }
}

impl Drop for PassTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}
