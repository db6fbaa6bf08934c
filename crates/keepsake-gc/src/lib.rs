//! Background garbage collection for Keepsake stores.
//!
//! Session start already runs gc now and then (`gc_probability /
//! gc_divisor`). Long-running processes that keep their store in memory
//! usually want a steady sweep instead; [`GcSweeper`] provides one on a
//! tokio interval.
//!
//! # Disabled mode
//!
//! When `interval` is zero the sweeper is disabled and
//! [`GcSweeper::wait_for_sweep`] pends forever, so it can sit in a
//! `tokio::select!` without special-casing.
//!
//! # Integration
//!
//! ```ignore
//! let pool = MemoryPool::new();
//! let handle = GcSweeper::new(GcConfig::every(Duration::from_secs(60)), pool.clone()).spawn();
//! // ... serve requests with MemoryBackend::with_pool(pool.clone(), ..) ...
//! let metrics = handle.stop().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use keepsake_store::{MemoryPool, StorageBackend, StoreError};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Sweep targets
// ---------------------------------------------------------------------------

/// Something that can drop entries older than a given age.
///
/// Implementations must not block for long: the sweeper calls this from
/// its async task.
pub trait Sweep: Send + 'static {
    /// Removes every entry last written at least `max_lifetime` ago.
    /// Returns how many were removed.
    fn sweep(&self, max_lifetime: Duration) -> Result<usize, StoreError>;
}

impl Sweep for MemoryPool {
    fn sweep(&self, max_lifetime: Duration) -> Result<usize, StoreError> {
        Ok(self.purge_older_than(max_lifetime))
    }
}

/// Any backend behind a shared lock. The lock is held only for the
/// duration of the `gc` call.
impl<B: StorageBackend> Sweep for Arc<Mutex<B>> {
    fn sweep(&self, max_lifetime: Duration) -> Result<usize, StoreError> {
        self.lock().gc(max_lifetime.as_secs())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Time between sweeps. Zero disables the sweeper.
    pub interval: Duration,
    /// Entries last written at least this long ago are removed.
    pub max_lifetime: Duration,
    /// Random delay (0..max) added to the first sweep so processes
    /// started together don't sweep in lockstep.
    pub initial_jitter: Duration,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            max_lifetime: Duration::from_secs(86_400),
            initial_jitter: Duration::from_millis(500),
        }
    }
}

impl GcConfig {
    /// Shortest accepted non-zero interval.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// A config sweeping every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Sets the age after which entries are removed.
    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    /// Sets the first-sweep jitter.
    pub fn with_initial_jitter(mut self, jitter: Duration) -> Self {
        self.initial_jitter = jitter;
        self
    }

    /// Fixes out-of-range values. Called by [`GcSweeper::new`].
    ///
    /// - A non-zero `interval` below [`Self::MIN_INTERVAL`] is raised to it.
    /// - `initial_jitter` is capped at `interval`.
    pub fn validated(mut self) -> Self {
        if !self.interval.is_zero() && self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                "gc interval below minimum, raising"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.initial_jitter > self.interval {
            self.initial_jitter = self.interval;
        }
        self
    }

    /// Returns `true` if this config never sweeps.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Sweep info and metrics
// ---------------------------------------------------------------------------

/// Outcome of one sweep, returned by [`GcSweeper::wait_for_sweep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepInfo {
    /// Sweep number, starting at 1.
    pub sweep: u64,
    /// Entries removed. 0 when the sweep failed.
    pub removed: usize,
    /// `true` if the target returned an error.
    pub failed: bool,
    /// Whole intervals missed because the sweeper woke up late.
    pub intervals_skipped: u64,
}

/// Running totals across sweeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcMetrics {
    pub total_sweeps: u64,
    pub total_removed: u64,
    pub total_failures: u64,
    pub total_skipped: u64,
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

/// Periodic sweeper over one [`Sweep`] target.
pub struct GcSweeper<T: Sweep> {
    config: GcConfig,
    target: T,
    next_sweep: Option<TokioInstant>,
    sweep_count: u64,
    paused: bool,
    metrics: GcMetrics,
}

impl<T: Sweep> GcSweeper<T> {
    /// Creates a sweeper. The first sweep is due one interval (plus
    /// jitter) from now.
    pub fn new(config: GcConfig, target: T) -> Self {
        let config = config.validated();

        let next_sweep = (!config.is_disabled()).then(|| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max_us = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max_us.max(1)))
            };
            TokioInstant::now() + config.interval + jitter
        });

        if config.is_disabled() {
            debug!("gc sweeper created disabled");
        } else {
            debug!(
                interval_s = config.interval.as_secs(),
                max_lifetime_s = config.max_lifetime.as_secs(),
                "gc sweeper created"
            );
        }

        Self {
            config,
            target,
            next_sweep,
            sweep_count: 0,
            paused: false,
            metrics: GcMetrics::default(),
        }
    }

    /// Waits for the next sweep to be due, runs it and reports the result.
    ///
    /// Pends forever while disabled or paused.
    pub async fn wait_for_sweep(&mut self) -> SweepInfo {
        let next = match self.next_sweep {
            Some(next) if !self.paused => next,
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        let interval = self.config.interval;
        let late_by = now.saturating_duration_since(next);
        let intervals_skipped = (late_by.as_nanos() / interval.as_nanos().max(1)) as u64;
        if intervals_skipped > 0 {
            warn!(
                skipped = intervals_skipped,
                late_ms = late_by.as_millis() as u64,
                "gc sweeper woke late, skipping ahead"
            );
        }
        // Always schedule from now, not from the missed deadline.
        self.next_sweep = Some(now + interval);
        self.sweep_count += 1;

        let (removed, failed) = match self.target.sweep(self.config.max_lifetime) {
            Ok(removed) => (removed, false),
            Err(e) => {
                warn!(sweep = self.sweep_count, error = %e, "gc sweep failed");
                (0, true)
            }
        };

        self.metrics.total_sweeps += 1;
        self.metrics.total_removed += removed as u64;
        self.metrics.total_failures += u64::from(failed);
        self.metrics.total_skipped += intervals_skipped;

        if removed > 0 {
            debug!(sweep = self.sweep_count, removed, "gc sweep");
        } else {
            trace!(sweep = self.sweep_count, "gc sweep found nothing");
        }

        SweepInfo {
            sweep: self.sweep_count,
            removed,
            failed,
            intervals_skipped,
        }
    }

    /// Stops sweeping until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(sweep = self.sweep_count, "gc sweeper paused");
        }
    }

    /// Resumes sweeping. The next sweep is one full interval from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if !self.config.is_disabled() {
                self.next_sweep = Some(TokioInstant::now() + self.config.interval);
            }
            debug!(sweep = self.sweep_count, "gc sweeper resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_disabled(&self) -> bool {
        self.next_sweep.is_none()
    }

    /// Number of sweeps run so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    pub fn metrics(&self) -> &GcMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Runs the sweeper on its own task until [`GcHandle::stop`].
    pub fn spawn(mut self) -> GcHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = self.wait_for_sweep() => {}
                }
            }
            debug!(sweeps = self.sweep_count, "gc sweeper stopped");
            self.metrics
        });
        GcHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

/// Handle to a spawned sweeper.
#[derive(Debug)]
pub struct GcHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<GcMetrics>,
}

impl GcHandle {
    /// Stops the sweeper and returns its final metrics.
    ///
    /// A sweep already in progress completes first. If the task panicked
    /// the metrics are lost and defaults are returned.
    pub async fn stop(self) -> GcMetrics {
        let _ = self.shutdown.send(());
        match self.join.await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "gc sweeper task failed");
                GcMetrics::default()
            }
        }
    }
}
