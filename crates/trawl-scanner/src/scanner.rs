//! Scan orchestration: worker tasks, the status reporter, and pool recovery.
//!
//! Each worker loops until shutdown: generate a phrase, derive index 0
//! under every scheme, query each address, and log the ones that have
//! funds or history. Shutdown is a `watch` channel checked at the top of
//! every iteration and raced against every sleep.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use trawl_core::mnemonic::mnemonic_to_seed;
use trawl_core::{AddressOracle, DerivationEngine, generate_mnemonic};
use trawl_net::{EndpointPool, EsploraClient};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::scan_log::{ScanLog, ScanRecord};
use crate::stats::{ScannerStats, StatsSnapshot};
use crate::status::{InstanceStatus, WorkerState};

/// Everything a worker needs, shared read-only between workers.
struct WorkerContext {
    config: ScanConfig,
    engine: DerivationEngine,
    oracle: Arc<dyn AddressOracle>,
    stats: Arc<ScannerStats>,
    log: Arc<ScanLog>,
}

/// A configured scanner, ready to start.
pub struct Scanner {
    config: ScanConfig,
    oracle: Arc<dyn AddressOracle>,
    pool: Option<Arc<EndpointPool>>,
}

/// Final result of a scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub stats: StatsSnapshot,
    pub log_path: PathBuf,
}

/// A running scan.
pub struct ScanHandle {
    workers: Vec<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
    stats: Arc<ScannerStats>,
    statuses: Vec<Arc<InstanceStatus>>,
    log: Arc<ScanLog>,
}

impl Scanner {
    /// Scanner over a real endpoint pool built from `config`.
    pub fn from_config(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let pool = Arc::new(EndpointPool::with_settings(
            config.endpoints.iter().cloned(),
            config.probe_timeout(),
            trawl_core::constants::FAILURE_THRESHOLD,
        )?);
        let client = EsploraClient::with_timeout(Arc::clone(&pool), config.request_timeout())?;
        Ok(Self { config, oracle: Arc::new(client), pool: Some(pool) })
    }

    /// Scanner over any oracle. Pool refresh and recovery are unavailable.
    pub fn with_oracle(config: ScanConfig, oracle: Arc<dyn AddressOracle>) -> Self {
        Self { config, oracle, pool: None }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn pool(&self) -> Option<&Arc<EndpointPool>> {
        self.pool.as_ref()
    }

    /// Spawn `instances` workers plus the reporter and return immediately.
    ///
    /// Fails if `instances` is zero or the scan log cannot be created.
    pub async fn start(
        &self,
        instances: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Result<ScanHandle, ScanError> {
        if instances == 0 {
            return Err(ScanError::Config("instances must be at least 1".into()));
        }
        let network = self.config.bitcoin_network()?;
        let log = Arc::new(ScanLog::create(&self.config.log_dir)?);
        info!(path = %log.path().display(), "scan log created");

        if let Some(pool) = &self.pool {
            if self.config.refresh_on_start {
                let results = pool.refresh().await;
                let healthy = results.iter().filter(|r| r.healthy).count();
                if healthy == 0 {
                    warn!(total = results.len(), "no endpoint answered the health probe");
                }
            }
        }

        let stats = Arc::new(ScannerStats::new());
        let ctx = Arc::new(WorkerContext {
            config: self.config.clone(),
            engine: DerivationEngine::new(network),
            oracle: Arc::clone(&self.oracle),
            stats: Arc::clone(&stats),
            log: Arc::clone(&log),
        });

        let statuses: Vec<Arc<InstanceStatus>> = (0..instances)
            .map(|id| Arc::new(InstanceStatus::new(id, self.config.error_window())))
            .collect();

        let workers = statuses
            .iter()
            .map(|status| {
                tokio::spawn(worker(Arc::clone(&ctx), Arc::clone(status), shutdown.clone()))
            })
            .collect();

        let mut background = vec![tokio::spawn(reporter(
            Arc::clone(&stats),
            statuses.clone(),
            self.config.report_interval(),
            shutdown.clone(),
        ))];
        if let (Some(pool), Some(interval)) = (&self.pool, self.config.pool_recovery_interval()) {
            background.push(tokio::spawn(pool_recovery(Arc::clone(pool), interval, shutdown.clone())));
        }

        info!(instances, word_count = self.config.word_count, "scan started");
        Ok(ScanHandle { workers, background, stats, statuses, log })
    }

    /// Start a scan and wait for it to finish.
    pub async fn run(
        &self,
        instances: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Result<ScanOutcome, ScanError> {
        let handle = self.start(instances, shutdown).await?;
        Ok(handle.join().await)
    }
}

impl ScanHandle {
    pub fn stats(&self) -> &Arc<ScannerStats> {
        &self.stats
    }

    pub fn statuses(&self) -> &[Arc<InstanceStatus>] {
        &self.statuses
    }

    pub fn log_path(&self) -> PathBuf {
        self.log.path().to_path_buf()
    }

    /// Wait for every worker to exit, then stop the background tasks.
    pub async fn join(self) -> ScanOutcome {
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!(error = %e, "scan worker panicked");
            }
        }
        for handle in self.background {
            handle.abort();
            let _ = handle.await;
        }
        let stats = self.stats.snapshot();
        info!(
            checked = stats.wallets_checked,
            found = stats.active_wallets_found,
            elapsed_secs = stats.elapsed.as_secs(),
            "scan finished"
        );
        ScanOutcome { stats, log_path: self.log.path().to_path_buf() }
    }
}

/// Sleep for `duration` unless shutdown arrives first.
///
/// Returns `true` if the caller should stop. A dropped sender counts as shutdown.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    if duration.is_zero() {
        tokio::task::yield_now().await;
        return *shutdown.borrow();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        changed = shutdown.changed() => {
            if changed.is_err() {
                return true;
            }
        }
    }
    *shutdown.borrow()
}

async fn worker(
    ctx: Arc<WorkerContext>,
    status: Arc<InstanceStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let id = status.id();
    debug!(worker = id, "worker started");

    'scan: loop {
        if *shutdown.borrow() {
            break;
        }

        let mnemonic = match generate_mnemonic(ctx.config.word_count) {
            Ok(m) => m,
            Err(e) => {
                if status.set_error(&e.to_string()) {
                    error!(worker = id, error = %e, "phrase generation failed");
                }
                if pause(ctx.config.iteration_delay(), &mut shutdown).await {
                    break;
                }
                continue;
            }
        };
        let seed = mnemonic_to_seed(&mnemonic, &ctx.config.passphrase);

        for (scheme, derived) in ctx.engine.derive_schemes(&seed, 0) {
            if *shutdown.borrow() {
                break 'scan;
            }
            let derived = match derived {
                Ok(d) => d,
                Err(e) => {
                    if status.set_error(&e.to_string()) {
                        warn!(worker = id, scheme = scheme.label(), error = %e, "derivation failed");
                    }
                    continue;
                }
            };

            status.set_active(&derived.address, scheme, ctx.oracle.active_endpoint());
            let snapshot = match ctx.oracle.fetch_balance(&derived.address).await {
                Ok(s) => s,
                Err(e) => {
                    if status.set_error(&e.to_string()) {
                        warn!(worker = id, address = %derived.address, error = %e, "balance query failed");
                    }
                    continue;
                }
            };
            ctx.stats.record_checked();

            if !snapshot.is_active() {
                continue;
            }

            status.set_success();
            ctx.stats.record_found();
            info!(
                worker = id,
                scheme = scheme.label(),
                address = %derived.address,
                balance_sats = snapshot.balance(),
                tx_count = snapshot.tx_count,
                "active wallet found"
            );
            let record = ScanRecord {
                timestamp: Local::now(),
                mnemonic: mnemonic.to_string(),
                explorer_url: ctx.config.explorer_url(&derived.address),
                balance_sats: snapshot.balance(),
                tx_count: snapshot.tx_count,
                derived,
            };
            if let Err(e) = ctx.log.append(&record) {
                error!(worker = id, path = %ctx.log.path().display(), error = %e, "scan log append failed");
            }
            if pause(ctx.config.hit_cooldown(), &mut shutdown).await {
                break 'scan;
            }
            status.set_idle();
        }

        if status.state() == WorkerState::Active {
            status.set_idle();
        }
        if pause(ctx.config.iteration_delay(), &mut shutdown).await {
            break;
        }
    }

    status.set_idle();
    debug!(worker = id, "worker stopped");
}

async fn reporter(
    stats: Arc<ScannerStats>,
    statuses: Vec<Arc<InstanceStatus>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    while !pause(interval, &mut shutdown).await {
        let snap = stats.snapshot();
        info!(
            checked = snap.wallets_checked,
            found = snap.active_wallets_found,
            rate = snap.rate,
            elapsed_secs = snap.elapsed.as_secs(),
            "scan progress"
        );
        for status in &statuses {
            let v = status.snapshot();
            debug!(
                worker = v.id,
                state = %v.state,
                address = v.current_address.as_deref().unwrap_or("-"),
                scheme = v.current_scheme.map(|s| s.label()).unwrap_or("-"),
                endpoint = v.current_endpoint.as_deref().unwrap_or("-"),
                last_error = v.last_error.as_deref().unwrap_or("-"),
                "worker status"
            );
        }
    }
}

async fn pool_recovery(pool: Arc<EndpointPool>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    while !pause(interval, &mut shutdown).await {
        if pool.is_exhausted() {
            warn!("endpoint pool exhausted, re-probing configured endpoints");
            pool.refresh().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use trawl_core::{QueryError, Transaction, WalletSnapshot};

    /// Reports every address as holding `balance` sats.
    struct FixedOracle {
        balance: u64,
        calls: AtomicU64,
    }

    #[async_trait]
    impl AddressOracle for FixedOracle {
        async fn fetch_balance(&self, address: &str) -> Result<WalletSnapshot, QueryError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(WalletSnapshot {
                address: address.to_string(),
                confirmed_funded: self.balance,
                ..WalletSnapshot::default()
            })
        }

        async fn fetch_history(&self, _: &str, _: usize) -> Result<Vec<Transaction>, QueryError> {
            Ok(Vec::new())
        }

        fn active_endpoint(&self) -> Option<String> {
            Some("mock".into())
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl AddressOracle for FailingOracle {
        async fn fetch_balance(&self, _: &str) -> Result<WalletSnapshot, QueryError> {
            Err(QueryError::NoAvailableEndpoint)
        }

        async fn fetch_history(&self, _: &str, _: usize) -> Result<Vec<Transaction>, QueryError> {
            Err(QueryError::NoAvailableEndpoint)
        }

        fn active_endpoint(&self) -> Option<String> {
            None
        }
    }

    fn test_config(dir: &std::path::Path) -> ScanConfig {
        ScanConfig {
            iteration_delay_ms: 1,
            hit_cooldown_ms: 0,
            report_interval_ms: 20,
            log_dir: dir.to_path_buf(),
            ..ScanConfig::default()
        }
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn empty_addresses_are_counted_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = Arc::new(FixedOracle { balance: 0, calls: AtomicU64::new(0) });
        let scanner = Scanner::with_oracle(test_config(dir.path()), oracle.clone());
        let (tx, rx) = watch::channel(false);

        let handle = scanner.start(2, rx).await.unwrap();
        let stats = Arc::clone(handle.stats());
        wait_for(|| stats.wallets_checked() >= 16).await;
        tx.send(true).unwrap();
        let outcome = handle.join().await;

        assert_eq!(outcome.stats.active_wallets_found, 0);
        assert_eq!(outcome.stats.wallets_checked, oracle.calls.load(Ordering::Relaxed));
        let content = std::fs::read_to_string(&outcome.log_path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn hits_are_logged_once_each() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = Arc::new(FixedOracle { balance: 1_000, calls: AtomicU64::new(0) });
        let scanner = Scanner::with_oracle(test_config(dir.path()), oracle);
        let (tx, rx) = watch::channel(false);

        let handle = scanner.start(3, rx).await.unwrap();
        assert_eq!(handle.statuses().len(), 3);
        let stats = Arc::clone(handle.stats());
        wait_for(|| stats.active_wallets_found() >= 8).await;
        tx.send(true).unwrap();
        let outcome = handle.join().await;

        let content = std::fs::read_to_string(&outcome.log_path).unwrap();
        let rows: Vec<_> = content.lines().skip(1).collect();
        assert_eq!(rows.len() as u64, outcome.stats.active_wallets_found);
        assert_eq!(outcome.stats.wallets_checked, outcome.stats.active_wallets_found);
        assert!(rows.iter().all(|r| r.contains(",0.00001000,")));
        assert!(rows.iter().all(|r| r.contains("https://mempool.space/address/")));
    }

    #[tokio::test]
    async fn failures_are_not_counted_and_mark_error() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::with_oracle(test_config(dir.path()), Arc::new(FailingOracle));
        let (tx, rx) = watch::channel(false);

        let handle = scanner.start(1, rx).await.unwrap();
        let status = Arc::clone(&handle.statuses()[0]);
        wait_for(|| status.snapshot().last_error.is_some()).await;
        let view = status.snapshot();
        assert_eq!(view.last_error.as_deref(), Some("no available endpoint"));
        tx.send(true).unwrap();
        let outcome = handle.join().await;
        assert_eq!(outcome.stats.wallets_checked, 0);
        assert_eq!(outcome.stats.active_wallets_found, 0);
    }

    #[tokio::test]
    async fn zero_instances_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::with_oracle(test_config(dir.path()), Arc::new(FailingOracle));
        let (_tx, rx) = watch::channel(false);
        assert!(matches!(scanner.start(0, rx).await, Err(ScanError::Config(_))));
    }

    #[tokio::test]
    async fn unwritable_log_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let config = ScanConfig { log_dir: blocker.join("sub"), ..test_config(dir.path()) };
        let scanner = Scanner::with_oracle(config, Arc::new(FailingOracle));
        let (_tx, rx) = watch::channel(false);
        assert!(matches!(scanner.start(1, rx).await, Err(ScanError::LogFile { .. })));
    }

    #[tokio::test]
    async fn shutdown_before_start_exits_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = Arc::new(FixedOracle { balance: 0, calls: AtomicU64::new(0) });
        let scanner = Scanner::with_oracle(test_config(dir.path()), oracle.clone());
        let (_tx, rx) = watch::channel(true);
        let outcome = scanner.run(2, rx).await.unwrap();
        assert_eq!(outcome.stats.wallets_checked, 0);
        assert_eq!(oracle.calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn shutdown_interrupts_long_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig { hit_cooldown_ms: 60_000, ..test_config(dir.path()) };
        let oracle = Arc::new(FixedOracle { balance: 1, calls: AtomicU64::new(0) });
        let scanner = Scanner::with_oracle(config, oracle);
        let (tx, rx) = watch::channel(false);

        let handle = scanner.start(1, rx).await.unwrap();
        let stats = Arc::clone(handle.stats());
        wait_for(|| stats.active_wallets_found() >= 1).await;
        tx.send(true).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("join should not wait out the cooldown");
        assert_eq!(outcome.stats.active_wallets_found, 1);
    }
}
