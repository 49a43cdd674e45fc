//! Endpoint pool with health-sorted rotation and failure-based eviction.
//!
//! Endpoints accumulate consecutive failures. Once an endpoint reaches
//! [`FAILURE_THRESHOLD`] it is evicted for the remainder of the run; the
//! only way back in is [`EndpointPool::refresh`], which re-probes every
//! configured host and rebuilds the ordering from scratch.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::Client;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use trawl_core::QueryError;
use trawl_core::constants::{FAILURE_THRESHOLD, PROBE_TIMEOUT};

/// One indexer base URL and its running health record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub consecutive_failures: u32,
    pub last_latency: Option<Duration>,
    pub healthy: bool,
}

impl Endpoint {
    fn new(host: String) -> Self {
        Self { host, consecutive_failures: 0, last_latency: None, healthy: true }
    }
}

/// Outcome of a single liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub host: String,
    pub healthy: bool,
    pub latency: Duration,
}

struct PoolState {
    endpoints: Vec<Endpoint>,
    cursor: usize,
}

impl PoolState {
    fn current(&self) -> Option<&Endpoint> {
        self.endpoints.get(self.cursor)
    }

    fn position(&self, host: &str) -> Option<usize> {
        self.endpoints.iter().position(|e| e.host == host)
    }

    fn advance(&mut self) {
        if self.endpoints.is_empty() {
            self.cursor = 0;
        } else {
            self.cursor = (self.cursor + 1) % self.endpoints.len();
        }
    }
}

/// Shared, mutex-guarded endpoint list.
///
/// All mutation goes through one lock, so selection and eviction never
/// observe a half-updated cursor.
pub struct EndpointPool {
    state: Mutex<PoolState>,
    configured: Vec<String>,
    probe_client: Client,
    failure_threshold: u32,
}

impl EndpointPool {
    /// Pool over `hosts` in the given order, with default probe timeout and threshold.
    pub fn new<I, S>(hosts: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_settings(hosts, PROBE_TIMEOUT, FAILURE_THRESHOLD)
    }

    pub fn with_settings<I, S>(
        hosts: I,
        probe_timeout: Duration,
        failure_threshold: u32,
    ) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut configured: Vec<String> = Vec::new();
        for host in hosts {
            let host = normalize_host(&host.into());
            if !host.is_empty() && !configured.contains(&host) {
                configured.push(host);
            }
        }
        let probe_client = Client::builder()
            .timeout(probe_timeout)
            .build()
            .map_err(|e| QueryError::ClientSetup(e.to_string()))?;
        let endpoints = configured.iter().cloned().map(Endpoint::new).collect();
        Ok(Self {
            state: Mutex::new(PoolState { endpoints, cursor: 0 }),
            configured,
            probe_client,
            failure_threshold: failure_threshold.max(1),
        })
    }

    /// Hosts the pool was built from, including evicted ones.
    pub fn configured_hosts(&self) -> &[String] {
        &self.configured
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// The endpoint queries should go to right now.
    pub fn select_current(&self) -> Option<Endpoint> {
        self.state.lock().current().cloned()
    }

    /// Advance the cursor circularly and return the new selection.
    pub fn rotate_next(&self) -> Option<Endpoint> {
        let mut state = self.state.lock();
        state.advance();
        let next = state.current().cloned();
        if let Some(e) = &next {
            info!(host = %e.host, "endpoint_pool: rotated");
        }
        next
    }

    /// Advance only if `host` is still the current selection.
    ///
    /// Several workers failing on the same host at once move the cursor a
    /// single step instead of skipping past healthy endpoints.
    pub fn rotate_away_from(&self, host: &str) -> Option<Endpoint> {
        let mut state = self.state.lock();
        if state.current().is_some_and(|e| e.host == host) {
            state.advance();
            if let Some(e) = state.current() {
                info!(from = %host, to = %e.host, "endpoint_pool: rotated away from failing endpoint");
            }
        }
        state.current().cloned()
    }

    /// Count a failure against `host`.
    ///
    /// Returns `true` if this failure evicted the endpoint. Failures against
    /// hosts no longer in the pool are ignored.
    pub fn record_failure(&self, host: &str) -> bool {
        let mut state = self.state.lock();
        let Some(idx) = state.position(host) else {
            debug!(%host, "endpoint_pool: failure for endpoint not in pool");
            return false;
        };

        let entry = &mut state.endpoints[idx];
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        let failures = entry.consecutive_failures;
        debug!(%host, failures, "endpoint_pool: failure recorded");

        if failures < self.failure_threshold {
            return false;
        }

        state.endpoints.remove(idx);
        if idx < state.cursor {
            state.cursor -= 1;
        }
        if state.cursor >= state.endpoints.len() {
            state.cursor = 0;
        }
        warn!(
            %host,
            failures,
            remaining = state.endpoints.len(),
            "endpoint_pool: endpoint evicted"
        );
        true
    }

    /// Reset the failure streak of `host` and remember its latency.
    pub fn record_success(&self, host: &str, latency: Duration) {
        let mut state = self.state.lock();
        if let Some(idx) = state.position(host) {
            let entry = &mut state.endpoints[idx];
            entry.consecutive_failures = 0;
            entry.last_latency = Some(latency);
            entry.healthy = true;
        }
    }

    /// Probe one host: `GET {host}/blocks/tip/height`.
    ///
    /// Healthy iff the status is 200 and the body is a block height.
    pub async fn probe(&self, host: &str) -> ProbeResult {
        probe_host(self.probe_client.clone(), normalize_host(host)).await
    }

    /// Re-probe every configured host concurrently and rebuild the pool.
    ///
    /// Healthy hosts come first by ascending latency, unhealthy hosts follow
    /// in configured order. Failure counters reset and the cursor returns to
    /// the front. Returns the probe results in the new pool order.
    pub async fn refresh(&self) -> Vec<ProbeResult> {
        let mut probes = JoinSet::new();
        for (order, host) in self.configured.iter().enumerate() {
            let client = self.probe_client.clone();
            let host = host.clone();
            probes.spawn(async move { (order, probe_host(client, host).await) });
        }

        let mut results = Vec::with_capacity(self.configured.len());
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "endpoint_pool: probe task failed"),
            }
        }
        // A probe task that panicked still leaves its host in the pool as unhealthy.
        for (order, host) in self.configured.iter().enumerate() {
            if !results.iter().any(|(o, _)| *o == order) {
                results.push((
                    order,
                    ProbeResult { host: host.clone(), healthy: false, latency: Duration::ZERO },
                ));
            }
        }

        results.sort_by(|(oa, a), (ob, b)| match (a.healthy, b.healthy) {
            (true, true) => a.latency.cmp(&b.latency).then(oa.cmp(ob)),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => oa.cmp(ob),
        });
        let results: Vec<ProbeResult> = results.into_iter().map(|(_, r)| r).collect();

        let endpoints = results
            .iter()
            .map(|r| Endpoint {
                host: r.host.clone(),
                consecutive_failures: 0,
                last_latency: r.healthy.then_some(r.latency),
                healthy: r.healthy,
            })
            .collect();
        {
            let mut state = self.state.lock();
            state.endpoints = endpoints;
            state.cursor = 0;
        }

        let healthy = results.iter().filter(|r| r.healthy).count();
        info!(healthy, total = results.len(), "endpoint_pool: refreshed");
        results
    }

    /// `true` once every endpoint has been evicted.
    pub fn is_exhausted(&self) -> bool {
        self.state.lock().endpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_exhausted()
    }

    /// Copy of the current endpoint list in rotation order.
    pub fn snapshot(&self) -> Vec<Endpoint> {
        self.state.lock().endpoints.clone()
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_string()
}

async fn probe_host(client: Client, host: String) -> ProbeResult {
    let url = format!("{host}/blocks/tip/height");
    let start = Instant::now();
    let healthy = match client.get(&url).send().await {
        Ok(resp) if resp.status() == reqwest::StatusCode::OK => match resp.text().await {
            Ok(body) => body.trim().parse::<u64>().is_ok(),
            Err(_) => false,
        },
        Ok(resp) => {
            debug!(%host, status = resp.status().as_u16(), "endpoint_pool: probe rejected");
            false
        }
        Err(e) => {
            debug!(%host, error = %e, "endpoint_pool: probe failed");
            false
        }
    };
    let latency = start.elapsed();
    ProbeResult { host, healthy, latency }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "https://a.example/api";
    const B: &str = "https://b.example/api";
    const C: &str = "https://c.example/api";

    fn pool() -> EndpointPool {
        EndpointPool::new([A, B, C]).unwrap()
    }

    fn hosts(pool: &EndpointPool) -> Vec<String> {
        pool.snapshot().into_iter().map(|e| e.host).collect()
    }

    fn fail_n(pool: &EndpointPool, host: &str, n: u32) -> bool {
        (0..n).map(|_| pool.record_failure(host)).fold(false, |_, evicted| evicted)
    }

    #[test]
    fn starts_at_first_host() {
        let p = pool();
        assert_eq!(p.select_current().unwrap().host, A);
        assert_eq!(p.len(), 3);
        assert!(!p.is_exhausted());
    }

    #[test]
    fn hosts_are_normalized_and_deduplicated() {
        let p = EndpointPool::new(["https://a.example/api/", A, "  ", B]).unwrap();
        assert_eq!(hosts(&p), vec![A.to_string(), B.to_string()]);
        assert_eq!(p.configured_hosts().len(), 2);
    }

    #[test]
    fn rotate_next_wraps() {
        let p = pool();
        assert_eq!(p.rotate_next().unwrap().host, B);
        assert_eq!(p.rotate_next().unwrap().host, C);
        assert_eq!(p.rotate_next().unwrap().host, A);
    }

    #[test]
    fn rotate_away_from_only_moves_once() {
        let p = pool();
        assert_eq!(p.rotate_away_from(A).unwrap().host, B);
        // A second worker that also failed on A does not skip B.
        assert_eq!(p.rotate_away_from(A).unwrap().host, B);
        assert_eq!(p.select_current().unwrap().host, B);
    }

    #[test]
    fn eviction_at_threshold() {
        let p = pool();
        assert!(!fail_n(&p, B, FAILURE_THRESHOLD - 1));
        assert_eq!(p.len(), 3);
        assert!(p.record_failure(B));
        assert_eq!(hosts(&p), vec![A.to_string(), C.to_string()]);
        // Further failures against an evicted host are ignored.
        assert!(!p.record_failure(B));
    }

    #[test]
    fn success_resets_failure_streak() {
        let p = pool();
        fail_n(&p, A, FAILURE_THRESHOLD - 1);
        p.record_success(A, Duration::from_millis(40));
        assert!(!fail_n(&p, A, FAILURE_THRESHOLD - 1));
        let a = p.select_current().unwrap();
        assert_eq!(a.consecutive_failures, FAILURE_THRESHOLD - 1);
        assert_eq!(a.last_latency, Some(Duration::from_millis(40)));
    }

    #[test]
    fn evicting_current_selects_next_survivor() {
        let p = pool();
        p.rotate_next(); // cursor on B
        assert!(fail_n(&p, B, FAILURE_THRESHOLD));
        assert_eq!(p.select_current().unwrap().host, C);
    }

    #[test]
    fn evicting_last_current_wraps_to_front() {
        let p = pool();
        p.rotate_next();
        p.rotate_next(); // cursor on C
        assert!(fail_n(&p, C, FAILURE_THRESHOLD));
        assert_eq!(p.select_current().unwrap().host, A);
    }

    #[test]
    fn evicting_before_cursor_keeps_selection() {
        let p = pool();
        p.rotate_next();
        p.rotate_next(); // cursor on C
        assert!(fail_n(&p, A, FAILURE_THRESHOLD));
        assert_eq!(p.select_current().unwrap().host, C);
    }

    #[test]
    fn evicted_endpoint_never_selected_again() {
        let p = pool();
        fail_n(&p, A, FAILURE_THRESHOLD);
        for _ in 0..10 {
            let e = p.rotate_next().unwrap();
            assert_ne!(e.host, A);
        }
    }

    #[test]
    fn exhaustion_returns_none() {
        let p = pool();
        for h in [A, B, C] {
            fail_n(&p, h, FAILURE_THRESHOLD);
        }
        assert!(p.is_exhausted());
        assert!(p.select_current().is_none());
        assert!(p.rotate_next().is_none());
        assert!(p.rotate_away_from(A).is_none());
    }

    #[test]
    fn custom_threshold() {
        let p = EndpointPool::with_settings([A, B], PROBE_TIMEOUT, 2).unwrap();
        assert!(!p.record_failure(A));
        assert!(p.record_failure(A));
        assert_eq!(p.failure_threshold(), 2);
    }

    #[tokio::test]
    async fn refresh_restores_unreachable_hosts_as_unhealthy() {
        // Nothing listens on port 9 of the loopback interface.
        let p = EndpointPool::with_settings(
            ["http://127.0.0.1:9/api"],
            Duration::from_millis(500),
            FAILURE_THRESHOLD,
        )
        .unwrap();
        fail_n(&p, "http://127.0.0.1:9/api", FAILURE_THRESHOLD);
        assert!(p.is_exhausted());

        let results = p.refresh().await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].healthy);
        assert_eq!(p.len(), 1);
        let e = p.select_current().unwrap();
        assert!(!e.healthy);
        assert_eq!(e.consecutive_failures, 0);
    }
}
