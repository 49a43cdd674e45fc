//! # trawl-scanner: the concurrent scanning loop.
//!
//! Workers generate random phrases, derive one address per wallet scheme,
//! ask an [`trawl_core::AddressOracle`] about each, and append every address
//! with funds or history to a per-run CSV scan log.
//!
//! # Modules
//!
//! - [`config`]: layered [`ScanConfig`] (defaults, file, `TRAWL_*` environment)
//! - [`error`]: `ScanError`
//! - [`stats`]: lock-free run counters
//! - [`status`]: per-worker state with duplicate-error suppression
//! - [`scan_log`]: append-only CSV discovery log
//! - [`scanner`]: [`Scanner`] and [`ScanHandle`]

pub mod config;
pub mod error;
pub mod scan_log;
pub mod scanner;
pub mod stats;
pub mod status;

pub use config::ScanConfig;
pub use error::ScanError;
pub use scan_log::{ScanLog, ScanRecord};
pub use scanner::{ScanHandle, ScanOutcome, Scanner};
pub use stats::{ScannerStats, StatsSnapshot};
pub use status::{InstanceStatus, StatusView, WorkerState};
