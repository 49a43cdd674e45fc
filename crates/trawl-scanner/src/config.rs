//! Scanner configuration.
//!
//! [`ScanConfig`] is layered: built-in defaults, then an optional file
//! (TOML, JSON or YAML by extension), then `TRAWL_*` environment variables
//! such as `TRAWL_INSTANCES=4` or `TRAWL_ENDPOINTS=https://a/api,https://b/api`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File};
use bitcoin::Network;
use serde::{Deserialize, Serialize};

use trawl_core::constants::{
    DEFAULT_ENDPOINTS, DEFAULT_EXPLORER_ADDRESS_URL, DEFAULT_HIT_COOLDOWN, DEFAULT_ITERATION_DELAY,
    DEFAULT_REPORT_INTERVAL, DEFAULT_WORD_COUNT, ERROR_SUPPRESSION_WINDOW, MNEMONIC_WORD_COUNTS,
    PROBE_TIMEOUT, REQUEST_TIMEOUT,
};

use crate::error::ScanError;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "TRAWL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Esplora API base URLs, in preference order before probing.
    pub endpoints: Vec<String>,
    /// Number of concurrent workers.
    pub instances: usize,
    /// Words per generated phrase.
    pub word_count: usize,
    /// BIP-39 passphrase applied to every generated phrase.
    pub passphrase: String,
    pub iteration_delay_ms: u64,
    pub hit_cooldown_ms: u64,
    pub report_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Identical worker errors inside this window are recorded once.
    pub error_window_secs: u64,
    /// Probe and sort endpoints before the first query.
    pub refresh_on_start: bool,
    /// Re-probe an exhausted pool this often. `0` disables recovery.
    pub pool_recovery_interval_secs: u64,
    /// Directory receiving the per-run CSV scan log.
    pub log_dir: PathBuf,
    /// Explorer link template; `{address}` is substituted.
    pub explorer_url_template: String,
    /// `bitcoin`, `testnet`, `signet` or `regtest`.
    pub network: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let log_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("seedtrawl");

        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            instances: 1,
            word_count: DEFAULT_WORD_COUNT,
            passphrase: String::new(),
            iteration_delay_ms: DEFAULT_ITERATION_DELAY.as_millis() as u64,
            hit_cooldown_ms: DEFAULT_HIT_COOLDOWN.as_millis() as u64,
            report_interval_ms: DEFAULT_REPORT_INTERVAL.as_millis() as u64,
            request_timeout_secs: REQUEST_TIMEOUT.as_secs(),
            probe_timeout_secs: PROBE_TIMEOUT.as_secs(),
            error_window_secs: ERROR_SUPPRESSION_WINDOW.as_secs(),
            refresh_on_start: true,
            pool_recovery_interval_secs: 0,
            log_dir,
            explorer_url_template: DEFAULT_EXPLORER_ADDRESS_URL.to_string(),
            network: "bitcoin".to_string(),
        }
    }
}

impl ScanConfig {
    /// Load defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ScanError> {
        Self::load_with_env(path, None)
    }

    /// Like [`ScanConfig::load`], reading variables from `env` instead of the
    /// process environment when it is `Some`.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ScanError> {
        let mut builder = Config::builder().add_source(Config::try_from(&ScanConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("endpoints")
                .source(env),
        );
        let cfg: ScanConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.endpoints.iter().all(|e| e.trim().is_empty()) {
            return Err(ScanError::Config("at least one endpoint is required".into()));
        }
        if self.instances == 0 {
            return Err(ScanError::Config("instances must be at least 1".into()));
        }
        if !MNEMONIC_WORD_COUNTS.contains(&self.word_count) {
            return Err(ScanError::Config(format!(
                "word_count must be one of {MNEMONIC_WORD_COUNTS:?}, got {}",
                self.word_count
            )));
        }
        if self.request_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(ScanError::Config("timeouts must be positive".into()));
        }
        if self.report_interval_ms == 0 {
            return Err(ScanError::Config("report_interval_ms must be positive".into()));
        }
        if !self.explorer_url_template.contains("{address}") {
            return Err(ScanError::Config(
                "explorer_url_template must contain {address}".into(),
            ));
        }
        self.bitcoin_network()?;
        Ok(())
    }

    pub fn bitcoin_network(&self) -> Result<Network, ScanError> {
        self.network
            .parse::<Network>()
            .map_err(|e| ScanError::Config(format!("network '{}': {e}", self.network)))
    }

    pub fn iteration_delay(&self) -> Duration {
        Duration::from_millis(self.iteration_delay_ms)
    }

    pub fn hit_cooldown(&self) -> Duration {
        Duration::from_millis(self.hit_cooldown_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn error_window(&self) -> Duration {
        Duration::from_secs(self.error_window_secs)
    }

    /// `None` when pool recovery is disabled.
    pub fn pool_recovery_interval(&self) -> Option<Duration> {
        (self.pool_recovery_interval_secs > 0)
            .then(|| Duration::from_secs(self.pool_recovery_interval_secs))
    }

    pub fn explorer_url(&self, address: &str) -> String {
        self.explorer_url_template.replace("{address}", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn default_is_valid() {
        let cfg = ScanConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.instances, 1);
        assert_eq!(cfg.word_count, 12);
        assert_eq!(cfg.iteration_delay(), Duration::from_millis(100));
        assert_eq!(cfg.hit_cooldown(), Duration::from_secs(2));
        assert_eq!(cfg.error_window(), Duration::from_secs(300));
        assert_eq!(cfg.pool_recovery_interval(), None);
        assert_eq!(cfg.bitcoin_network().unwrap(), Network::Bitcoin);
    }

    #[test]
    fn default_log_dir_ends_with_seedtrawl() {
        let cfg = ScanConfig::default();
        assert!(cfg.log_dir.ends_with("seedtrawl"), "log_dir: {:?}", cfg.log_dir);
    }

    #[test]
    fn explorer_url_substitutes_address() {
        let cfg = ScanConfig::default();
        assert_eq!(cfg.explorer_url("1abc"), "https://mempool.space/address/1abc");
    }

    #[test]
    fn load_without_sources_gives_defaults() {
        let cfg = ScanConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(cfg, ScanConfig::default());
    }

    #[test]
    fn env_overrides() {
        let cfg = ScanConfig::load_with_env(
            None,
            env(&[
                ("TRAWL_INSTANCES", "4"),
                ("TRAWL_ITERATION_DELAY_MS", "250"),
                ("TRAWL_ENDPOINTS", "http://a/api,http://b/api"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.instances, 4);
        assert_eq!(cfg.iteration_delay_ms, 250);
        assert_eq!(cfg.endpoints, vec!["http://a/api".to_string(), "http://b/api".to_string()]);
    }

    #[test]
    fn file_then_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "instances = 3\nword_count = 24\nnetwork = \"testnet\"").unwrap();
        let cfg = ScanConfig::load_with_env(Some(file.path()), env(&[("TRAWL_INSTANCES", "6")])).unwrap();
        assert_eq!(cfg.instances, 6);
        assert_eq!(cfg.word_count, 24);
        assert_eq!(cfg.bitcoin_network().unwrap(), Network::Testnet);
    }

    #[test]
    fn missing_file_is_error() {
        let err = ScanConfig::load_with_env(Some(Path::new("/nonexistent/trawl.toml")), env(&[]));
        assert!(matches!(err, Err(ScanError::Config(_))));
    }

    #[test]
    fn invalid_values_rejected() {
        let bad = [
            ScanConfig { instances: 0, ..ScanConfig::default() },
            ScanConfig { word_count: 13, ..ScanConfig::default() },
            ScanConfig { endpoints: vec![], ..ScanConfig::default() },
            ScanConfig { network: "dogecoin".into(), ..ScanConfig::default() },
            ScanConfig { explorer_url_template: "https://x/".into(), ..ScanConfig::default() },
            ScanConfig { request_timeout_secs: 0, ..ScanConfig::default() },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "accepted {cfg:?}");
        }
    }

    #[test]
    fn recovery_interval_enabled() {
        let cfg = ScanConfig { pool_recovery_interval_secs: 30, ..ScanConfig::default() };
        assert_eq!(cfg.pool_recovery_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn config_is_clone_and_debug() {
        let cfg = ScanConfig::default();
        let debug = format!("{:?}", cfg.clone());
        assert!(debug.contains("ScanConfig"));
    }
}
