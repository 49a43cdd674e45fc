//! Protocol and operational constants. All amounts in satoshis (1 BTC = 10^8 sats).

use std::time::Duration;

pub const SATS_PER_BTC: u64 = 100_000_000;

/// Upper bound on any single amount the indexer may report.
///
/// Anything above this cannot exist on the Bitcoin network and is treated as
/// a malformed response.
pub const MAX_MONEY: u64 = 21_000_000 * SATS_PER_BTC;

/// Offset that marks a BIP-32 child index as hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Coin type for Bitcoin mainnet under BIP-44/49/84.
pub const BITCOIN_COIN_TYPE: u32 = 0;

/// Valid BIP-39 phrase lengths.
pub const MNEMONIC_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Phrase length used by the scanner unless configured otherwise.
pub const DEFAULT_WORD_COUNT: usize = 12;

// ---------------------------------------------------------------------------
// Endpoint pool and client
// ---------------------------------------------------------------------------

/// Consecutive failures after which an endpoint is evicted from the pool.
pub const FAILURE_THRESHOLD: u32 = 5;

/// Timeout for a liveness probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a balance or history request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Esplora-compatible API bases queried when nothing else is configured.
pub const DEFAULT_ENDPOINTS: [&str; 2] = ["https://mempool.space/api", "https://blockstream.info/api"];

/// Explorer link written next to each discovery. `{address}` is substituted.
pub const DEFAULT_EXPLORER_ADDRESS_URL: &str = "https://mempool.space/address/{address}";

/// Explorer link for a single transaction. `{txid}` is substituted.
pub const DEFAULT_EXPLORER_TX_URL: &str = "https://mempool.space/tx/{txid}";

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Pause between scan iterations of one worker.
pub const DEFAULT_ITERATION_DELAY: Duration = Duration::from_millis(100);

/// Pause after a hit before the worker goes back to idle.
pub const DEFAULT_HIT_COOLDOWN: Duration = Duration::from_secs(2);

/// Identical worker errors inside this window are not re-recorded.
pub const ERROR_SUPPRESSION_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Interval of the periodic status reporter.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);
