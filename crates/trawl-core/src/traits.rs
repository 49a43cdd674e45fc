//! Contracts between the scanner and the network layer.

use async_trait::async_trait;

use crate::error::QueryError;
use crate::types::{Transaction, WalletSnapshot};

/// Source of on-chain facts about an address.
///
/// Implemented by `trawl-net`'s Esplora client; tests substitute in-memory
/// oracles. Implementations handle endpoint selection and failure accounting
/// themselves and do not retry internally.
#[async_trait]
pub trait AddressOracle: Send + Sync {
    /// Confirmed and mempool funded/spent sums plus transaction count.
    async fn fetch_balance(&self, address: &str) -> Result<WalletSnapshot, QueryError>;

    /// Up to `limit` most recent transactions, newest first.
    async fn fetch_history(&self, address: &str, limit: usize) -> Result<Vec<Transaction>, QueryError>;

    /// Host a query issued now would go to, if any.
    fn active_endpoint(&self) -> Option<String>;
}
