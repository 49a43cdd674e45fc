//! Run-wide counters shared by every worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free scan counters.
#[derive(Debug)]
pub struct ScannerStats {
    wallets_checked: AtomicU64,
    active_wallets_found: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of [`ScannerStats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub wallets_checked: u64,
    pub active_wallets_found: u64,
    pub elapsed: Duration,
    /// Addresses checked per second since the run started.
    pub rate: f64,
}

impl ScannerStats {
    pub fn new() -> Self {
        Self {
            wallets_checked: AtomicU64::new(0),
            active_wallets_found: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// One address was queried successfully.
    pub fn record_checked(&self) {
        self.wallets_checked.fetch_add(1, Ordering::Relaxed);
    }

    /// One address turned out to have funds or history.
    pub fn record_found(&self) {
        self.active_wallets_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn wallets_checked(&self) -> u64 {
        self.wallets_checked.load(Ordering::Relaxed)
    }

    pub fn active_wallets_found(&self) -> u64 {
        self.active_wallets_found.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn rate(&self) -> f64 {
        let checked = self.wallets_checked() as f64;
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 { checked / elapsed } else { 0.0 }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed = self.elapsed();
        let wallets_checked = self.wallets_checked();
        let secs = elapsed.as_secs_f64();
        StatsSnapshot {
            wallets_checked,
            active_wallets_found: self.active_wallets_found(),
            elapsed,
            rate: if secs > 0.0 { wallets_checked as f64 / secs } else { 0.0 },
        }
    }
}

impl Default for ScannerStats {
    fn default() -> Self {
        Self::new()
    }
}
