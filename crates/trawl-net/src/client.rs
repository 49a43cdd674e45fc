//! Esplora HTTP client backed by the shared [`EndpointPool`].
//!
//! Every request goes to the pool's current selection. A failure is counted
//! against that endpoint exactly once, and rotation-triggering failures
//! (rate limiting, 5xx, timeouts, refused connections, unparseable bodies)
//! also move the pool off it. Errors are returned to the caller without retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use trawl_core::constants::REQUEST_TIMEOUT;
use trawl_core::types::AddressStats;
use trawl_core::{AddressOracle, BalanceSummary, QueryError, Transaction, WalletSnapshot};

use crate::pool::EndpointPool;

/// `GET /address/{addr}` response body, reduced to what we read.
#[derive(Debug, Deserialize)]
struct AddressDocument {
    chain_stats: AddressStats,
    mempool_stats: AddressStats,
}

pub struct EsploraClient {
    http: Client,
    pool: Arc<EndpointPool>,
}

impl EsploraClient {
    pub fn new(pool: Arc<EndpointPool>) -> Result<Self, QueryError> {
        Self::with_timeout(pool, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(pool: Arc<EndpointPool>, timeout: Duration) -> Result<Self, QueryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::ClientSetup(e.to_string()))?;
        Ok(Self { http, pool })
    }

    pub fn pool(&self) -> &Arc<EndpointPool> {
        &self.pool
    }

    /// Balance of `address` in both summary and raw form.
    pub async fn check_balance(
        &self,
        address: &str,
    ) -> Result<(BalanceSummary, WalletSnapshot), QueryError> {
        let snapshot = self.fetch_balance(address).await?;
        Ok((snapshot.summary(), snapshot))
    }

    /// GET `path` from the current endpoint, decode it as `T` and convert it.
    ///
    /// A conversion failure counts as a malformed body.
    async fn get_json<T, R, F>(&self, path: &str, convert: F) -> Result<R, QueryError>
    where
        T: DeserializeOwned,
        F: FnOnce(T) -> Result<R, String>,
    {
        let endpoint = self.pool.select_current().ok_or(QueryError::NoAvailableEndpoint)?;
        let host = endpoint.host;
        let url = format!("{host}{path}");
        let start = Instant::now();

        let outcome = self.request::<T>(&host, &url).await.and_then(|doc| {
            convert(doc).map_err(|reason| QueryError::Malformed { endpoint: host.clone(), reason })
        });
        match outcome {
            Ok(value) => {
                let latency = start.elapsed();
                debug!(%host, path, latency_ms = latency.as_millis() as u64, "esplora: ok");
                self.pool.record_success(&host, latency);
                Ok(value)
            }
            Err(err) => {
                debug!(%host, path, error = %err, "esplora: request failed");
                self.pool.record_failure(&host);
                if err.triggers_rotation() {
                    self.pool.rotate_away_from(&host);
                }
                Err(err)
            }
        }
    }

    async fn request<T: DeserializeOwned>(&self, host: &str, url: &str) -> Result<T, QueryError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(host, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(QueryError::HttpStatus {
                endpoint: host.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await.map_err(|e| transport_error(host, e))?;
        serde_json::from_slice(&body).map_err(|e| QueryError::Malformed {
            endpoint: host.to_string(),
            reason: e.to_string(),
        })
    }
}

fn transport_error(host: &str, e: reqwest::Error) -> QueryError {
    let endpoint = host.to_string();
    if e.is_timeout() {
        QueryError::Timeout { endpoint }
    } else if e.is_connect() {
        QueryError::Connect { endpoint, reason: e.to_string() }
    } else if e.is_decode() {
        QueryError::Malformed { endpoint, reason: e.to_string() }
    } else {
        QueryError::Transport { endpoint, reason: e.to_string() }
    }
}

/// Reject empty input and anything that would escape the URL path segment.
fn validate_address(address: &str) -> Result<&str, QueryError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(QueryError::InvalidInput("address is empty".into()));
    }
    if !address.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(QueryError::InvalidInput(format!("address '{address}' has invalid characters")));
    }
    Ok(address)
}

#[async_trait]
impl AddressOracle for EsploraClient {
    async fn fetch_balance(&self, address: &str) -> Result<WalletSnapshot, QueryError> {
        let address = validate_address(address)?;
        self.get_json(&format!("/address/{address}"), |doc: AddressDocument| {
            WalletSnapshot::from_stats(address, &doc.chain_stats, &doc.mempool_stats)
        })
        .await
    }

    async fn fetch_history(&self, address: &str, limit: usize) -> Result<Vec<Transaction>, QueryError> {
        let address = validate_address(address)?;
        self.get_json(&format!("/address/{address}/txs"), |mut txs: Vec<Transaction>| {
            txs.truncate(limit);
            Ok(txs)
        })
        .await
    }

    fn active_endpoint(&self) -> Option<String> {
        self.pool.select_current().map(|e| e.host)
    }
}
