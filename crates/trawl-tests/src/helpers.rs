//! Shared test helpers: an in-process Esplora server and wait utilities.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use trawl_core::types::AddressStats;

/// The block height the mock reports as its tip.
pub const MOCK_TIP_HEIGHT: u64 = 840_000;

/// How the mock answers every route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Healthy,
    /// Respond with this status and a plain-text body.
    Status(u16),
    /// Respond 200 with a body that is not JSON.
    Malformed,
    /// Wait this long, then answer normally.
    Delay(Duration),
}

struct MockState {
    behavior: Mutex<Behavior>,
    balances: Mutex<HashMap<String, (AddressStats, AddressStats)>>,
    default_balance: Mutex<(AddressStats, AddressStats)>,
    histories: Mutex<HashMap<String, Vec<Value>>>,
    requests: AtomicU64,
}

/// An Esplora-compatible server on `127.0.0.1:<random port>` under `/api`.
pub struct MockEsplora {
    base: String,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockEsplora {
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            behavior: Mutex::new(Behavior::Healthy),
            balances: Mutex::new(HashMap::new()),
            default_balance: Mutex::new((AddressStats::default(), AddressStats::default())),
            histories: Mutex::new(HashMap::new()),
            requests: AtomicU64::new(0),
        });
        let app = Router::new()
            .route("/api/blocks/tip/height", get(tip_height))
            .route("/api/address/:address", get(address))
            .route("/api/address/:address/txs", get(address_txs))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { base: format!("http://{addr}/api"), state, task }
    }

    /// API base URL to hand to an endpoint pool.
    pub fn base(&self) -> String {
        self.base.clone()
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.state.behavior.lock() = behavior;
    }

    /// Confirmed and mempool stats for one address.
    pub fn set_balance(&self, address: &str, chain: AddressStats, mempool: AddressStats) {
        self.state.balances.lock().insert(address.to_string(), (chain, mempool));
    }

    /// Stats for every address without an explicit entry.
    pub fn set_default_balance(&self, chain: AddressStats, mempool: AddressStats) {
        *self.state.default_balance.lock() = (chain, mempool);
    }

    /// Raw transaction documents for `/address/{address}/txs`, newest first.
    pub fn set_history(&self, address: &str, txs: Vec<Value>) {
        self.state.histories.lock().insert(address.to_string(), txs);
    }

    /// Requests served so far, probes included.
    pub fn requests(&self) -> u64 {
        self.state.requests.load(Ordering::Relaxed)
    }
}

impl Drop for MockEsplora {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// `AddressStats` with the given funded sum and transaction count.
pub fn funded(sats: u64, tx_count: u64) -> AddressStats {
    AddressStats { funded_txo_sum: sats, spent_txo_sum: 0, tx_count }
}

/// A minimal transaction document as Esplora renders it.
pub fn tx_json(txid: &str, confirmed: bool, input: u64, output: u64, fee: u64) -> Value {
    let status = if confirmed {
        json!({"confirmed": true, "block_height": MOCK_TIP_HEIGHT, "block_time": 1_713_571_767})
    } else {
        json!({"confirmed": false})
    };
    json!({
        "txid": txid,
        "status": status,
        "fee": fee,
        "size": 222,
        "weight": 561,
        "vin": [{"prevout": {"value": input}}],
        "vout": [{"value": output}],
    })
}

/// Poll `cond` every 10 ms for up to `timeout`.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Apply the configured failure behaviour, if any.
async fn intercept(state: &MockState) -> Option<Response> {
    state.requests.fetch_add(1, Ordering::Relaxed);
    let behavior = *state.behavior.lock();
    match behavior {
        Behavior::Healthy => None,
        Behavior::Delay(d) => {
            tokio::time::sleep(d).await;
            None
        }
        Behavior::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Some((status, "mock failure").into_response())
        }
        Behavior::Malformed => Some((StatusCode::OK, "<html>not json</html>").into_response()),
    }
}

async fn tip_height(State(state): State<Arc<MockState>>) -> Response {
    if let Some(resp) = intercept(&state).await {
        return resp;
    }
    MOCK_TIP_HEIGHT.to_string().into_response()
}

async fn address(State(state): State<Arc<MockState>>, Path(address): Path<String>) -> Response {
    if let Some(resp) = intercept(&state).await {
        return resp;
    }
    let default = *state.default_balance.lock();
    let (chain, mempool) = state.balances.lock().get(&address).copied().unwrap_or(default);
    axum::Json(json!({
        "address": address,
        "chain_stats": stats_json(&chain),
        "mempool_stats": stats_json(&mempool),
    }))
    .into_response()
}

async fn address_txs(State(state): State<Arc<MockState>>, Path(address): Path<String>) -> Response {
    if let Some(resp) = intercept(&state).await {
        return resp;
    }
    let txs = state.histories.lock().get(&address).cloned().unwrap_or_default();
    axum::Json(Value::Array(txs)).into_response()
}

fn stats_json(stats: &AddressStats) -> Value {
    json!({
        "funded_txo_count": stats.tx_count,
        "funded_txo_sum": stats.funded_txo_sum,
        "spent_txo_count": 0,
        "spent_txo_sum": stats.spent_txo_sum,
        "tx_count": stats.tx_count,
    })
}
