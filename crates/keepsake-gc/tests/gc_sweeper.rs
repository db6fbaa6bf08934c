//! Integration tests for the gc sweeper.
//!
//! Uses `start_paused = true` so tokio auto-advances the clock whenever
//! every task is idle; `sleep_until` resolves immediately.
//!
//! Store entries age on the real clock, not tokio's, so tests that need
//! removals use `max_lifetime = 0` (everything is old enough).

use std::sync::Arc;
use std::time::Duration;

use keepsake_codec::SessionId;
use keepsake_gc::{GcConfig, GcMetrics, GcSweeper, Sweep};
use keepsake_store::{BackendParams, MemoryBackend, MemoryPool, RenewPolicy, StorageBackend, StoreError};
use parking_lot::Mutex;

// =========================================================================
// Helpers
// =========================================================================

fn no_jitter(interval_secs: u64) -> GcConfig {
    GcConfig::every(Duration::from_secs(interval_secs)).with_initial_jitter(Duration::ZERO)
}

fn pool_with(ids: &[&str]) -> MemoryPool {
    let pool = MemoryPool::new();
    let mut backend = MemoryBackend::with_pool(pool.clone(), RenewPolicy::Lazy, "");
    backend.open(&BackendParams::default(), "phpsessid").unwrap();
    for id in ids {
        backend.write(&SessionId::parse(id).unwrap(), b"{}").unwrap();
    }
    pool
}

struct FailingTarget;

impl Sweep for FailingTarget {
    fn sweep(&self, _: Duration) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
}

// =========================================================================
// GcConfig
// =========================================================================

#[test]
fn test_default_config_is_disabled() {
    let cfg = GcConfig::default();
    assert!(cfg.is_disabled());
    assert_eq!(cfg.max_lifetime, Duration::from_secs(86_400));
}

#[test]
fn test_validated_raises_tiny_interval() {
    let cfg = GcConfig::every(Duration::from_millis(10)).validated();
    assert_eq!(cfg.interval, GcConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_caps_jitter_at_interval() {
    let cfg = GcConfig::every(Duration::from_secs(2))
        .with_initial_jitter(Duration::from_secs(30))
        .validated();
    assert_eq!(cfg.initial_jitter, Duration::from_secs(2));
}

// =========================================================================
// Sweeping
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_sweep_fires_after_interval() {
    let mut s = GcSweeper::new(no_jitter(60), MemoryPool::new());
    let started = tokio::time::Instant::now();

    let info = s.wait_for_sweep().await;

    assert_eq!(info.sweep, 1);
    assert!(!info.failed);
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(s.sweep_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_removes_old_entries_from_pool() {
    let pool = pool_with(&["a", "b", "c"]);
    let mut s = GcSweeper::new(no_jitter(60).with_max_lifetime(Duration::ZERO), pool.clone());

    let info = s.wait_for_sweep().await;

    assert_eq!(info.removed, 3);
    assert!(pool.is_empty());
    assert_eq!(s.metrics().total_removed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_keeps_recent_entries() {
    let pool = pool_with(&["fresh"]);
    let mut s = GcSweeper::new(no_jitter(60), pool.clone());

    assert_eq!(s.wait_for_sweep().await.removed, 0);
    assert!(pool.contains_key("fresh"));
}

#[tokio::test(start_paused = true)]
async fn test_sweep_through_locked_backend() {
    let pool = pool_with(&["x"]);
    let backend = Arc::new(Mutex::new(MemoryBackend::with_pool(
        pool.clone(),
        RenewPolicy::Lazy,
        "",
    )));
    let mut s = GcSweeper::new(no_jitter(60).with_max_lifetime(Duration::ZERO), backend);

    assert_eq!(s.wait_for_sweep().await.removed, 1);
    assert!(pool.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_sweep_is_counted_not_fatal() {
    let mut s = GcSweeper::new(no_jitter(60), FailingTarget);

    let first = s.wait_for_sweep().await;
    let second = s.wait_for_sweep().await;

    assert!(first.failed && second.failed);
    assert_eq!(s.metrics().total_failures, 2);
    assert_eq!(s.metrics().total_sweeps, 2);
}

// =========================================================================
// Disabled / paused
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_disabled_sweeper_never_fires() {
    let mut s = GcSweeper::new(GcConfig::default(), MemoryPool::new());
    assert!(s.is_disabled());

    let result = tokio::time::timeout(Duration::from_secs(86_400), s.wait_for_sweep()).await;
    assert!(result.is_err(), "disabled sweeper should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_pause_prevents_sweeps() {
    let mut s = GcSweeper::new(no_jitter(60), MemoryPool::new());
    s.wait_for_sweep().await;

    s.pause();
    assert!(s.is_paused());

    let result = tokio::time::timeout(Duration::from_secs(600), s.wait_for_sweep()).await;
    assert!(result.is_err(), "paused sweeper should pend");
    assert_eq!(s.sweep_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_allows_sweeps_again() {
    let mut s = GcSweeper::new(no_jitter(60), MemoryPool::new());
    s.pause();
    s.pause();
    s.resume();
    s.resume();
    assert!(!s.is_paused());

    assert_eq!(s.wait_for_sweep().await.sweep, 1);
}

// =========================================================================
// Spawned task
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_spawned_sweeper_runs_until_stopped() {
    let handle = GcSweeper::new(no_jitter(10), MemoryPool::new()).spawn();

    tokio::time::sleep(Duration::from_secs(35)).await;
    let metrics = handle.stop().await;

    assert_eq!(metrics.total_sweeps, 3);
    assert_eq!(metrics.total_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_first_sweep_returns_empty_metrics() {
    let handle = GcSweeper::new(no_jitter(60), MemoryPool::new()).spawn();
    assert_eq!(handle.stop().await, GcMetrics::default());
}
