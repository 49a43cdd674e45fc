//! Wallet snapshots, balance summaries, and indexer transaction documents.
//!
//! All amounts are satoshis. Balances are signed because an address can have
//! unconfirmed spends larger than its unconfirmed receipts.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_MONEY, SATS_PER_BTC};

/// Funded/spent totals as reported by an Esplora `chain_stats` or `mempool_stats` block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressStats {
    #[serde(default)]
    pub funded_txo_sum: u64,
    #[serde(default)]
    pub spent_txo_sum: u64,
    #[serde(default)]
    pub tx_count: u64,
}

/// Point-in-time view of one address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub address: String,
    pub confirmed_funded: u64,
    pub confirmed_spent: u64,
    pub unconfirmed_funded: u64,
    pub unconfirmed_spent: u64,
    pub tx_count: u64,
}

impl WalletSnapshot {
    /// Combine the confirmed and mempool stats of an address.
    ///
    /// Fails if any amount exceeds the total money supply.
    pub fn from_stats(
        address: impl Into<String>,
        chain: &AddressStats,
        mempool: &AddressStats,
    ) -> Result<Self, String> {
        for (name, value) in [
            ("chain funded", chain.funded_txo_sum),
            ("chain spent", chain.spent_txo_sum),
            ("mempool funded", mempool.funded_txo_sum),
            ("mempool spent", mempool.spent_txo_sum),
        ] {
            if value > MAX_MONEY {
                return Err(format!("{name} amount {value} exceeds the money supply"));
            }
        }
        let tx_count = chain
            .tx_count
            .checked_add(mempool.tx_count)
            .ok_or_else(|| "transaction count overflow".to_string())?;
        Ok(Self {
            address: address.into(),
            confirmed_funded: chain.funded_txo_sum,
            confirmed_spent: chain.spent_txo_sum,
            unconfirmed_funded: mempool.funded_txo_sum,
            unconfirmed_spent: mempool.spent_txo_sum,
            tx_count,
        })
    }

    pub fn confirmed_balance(&self) -> i64 {
        self.confirmed_funded as i64 - self.confirmed_spent as i64
    }

    pub fn unconfirmed_balance(&self) -> i64 {
        self.unconfirmed_funded as i64 - self.unconfirmed_spent as i64
    }

    /// Confirmed plus unconfirmed balance.
    pub fn balance(&self) -> i64 {
        self.confirmed_balance() + self.unconfirmed_balance()
    }

    /// An address is active if it holds funds or has ever transacted.
    pub fn is_active(&self) -> bool {
        self.balance() > 0 || self.tx_count > 0
    }

    pub fn summary(&self) -> BalanceSummary {
        BalanceSummary {
            confirmed_sats: self.confirmed_balance(),
            unconfirmed_sats: self.unconfirmed_balance(),
            total_sats: self.balance(),
        }
    }
}

/// Signed balances of one address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub confirmed_sats: i64,
    pub unconfirmed_sats: i64,
    pub total_sats: i64,
}

impl BalanceSummary {
    pub fn confirmed_btc(&self) -> String {
        format_btc(self.confirmed_sats)
    }

    pub fn unconfirmed_btc(&self) -> String {
        format_btc(self.unconfirmed_sats)
    }

    pub fn total_btc(&self) -> String {
        format_btc(self.total_sats)
    }
}

/// Render satoshis as BTC with exactly eight decimals, without going through floats.
pub fn format_btc(sats: i64) -> String {
    let sign = if sats < 0 { "-" } else { "" };
    let abs = sats.unsigned_abs();
    format!("{sign}{}.{:08}", abs / SATS_PER_BTC, abs % SATS_PER_BTC)
}

/// Confirmation status of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatus {
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// The output an input spends. Absent for coinbase inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prevout {
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(default)]
    pub prevout: Option<Prevout>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
}

/// A transaction as returned by `/address/{addr}/txs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    #[serde(default)]
    pub status: TxStatus,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub weight: u64,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

impl Transaction {
    /// Sum of all spent prevouts. Coinbase inputs contribute nothing.
    pub fn total_input(&self) -> u64 {
        self.vin
            .iter()
            .filter_map(|i| i.prevout.as_ref())
            .map(|p| p.value)
            .fold(0u64, u64::saturating_add)
    }

    pub fn total_output(&self) -> u64 {
        self.vout.iter().map(|o| o.value).fold(0u64, u64::saturating_add)
    }

    pub fn is_confirmed(&self) -> bool {
        self.status.confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(funded: u64, spent: u64, txs: u64) -> AddressStats {
        AddressStats { funded_txo_sum: funded, spent_txo_sum: spent, tx_count: txs }
    }

    #[test]
    fn five_btc_summary() {
        let snap = WalletSnapshot::from_stats("1abc", &stats(500_000_000, 0, 1), &stats(0, 0, 0)).unwrap();
        let summary = snap.summary();
        assert_eq!(summary.total_sats, 500_000_000);
        assert_eq!(summary.total_btc(), "5.00000000");
        assert_eq!(summary.unconfirmed_btc(), "0.00000000");
        assert!(snap.is_active());
    }

    #[test]
    fn negative_unconfirmed_component() {
        let snap = WalletSnapshot::from_stats("1abc", &stats(1_000, 0, 1), &stats(0, 400, 1)).unwrap();
        assert_eq!(snap.unconfirmed_balance(), -400);
        assert_eq!(snap.balance(), 600);
        assert_eq!(snap.tx_count, 2);
        assert_eq!(format_btc(snap.unconfirmed_balance()), "-0.00000400");
    }

    #[test]
    fn empty_address_is_inactive() {
        let snap = WalletSnapshot::from_stats("1abc", &stats(0, 0, 0), &stats(0, 0, 0)).unwrap();
        assert!(!snap.is_active());
        assert_eq!(snap.summary(), BalanceSummary::default());
    }

    #[test]
    fn drained_address_with_history_is_active() {
        let snap = WalletSnapshot::from_stats("1abc", &stats(5_000, 5_000, 2), &stats(0, 0, 0)).unwrap();
        assert_eq!(snap.balance(), 0);
        assert!(snap.is_active());
    }

    #[test]
    fn amounts_above_supply_rejected() {
        let err = WalletSnapshot::from_stats("1abc", &stats(MAX_MONEY + 1, 0, 1), &stats(0, 0, 0)).unwrap_err();
        assert!(err.contains("chain funded"), "got: {err}");
        assert!(WalletSnapshot::from_stats("1abc", &stats(MAX_MONEY, 0, 1), &stats(0, 0, 0)).is_ok());
    }

    #[test]
    fn format_btc_edges() {
        assert_eq!(format_btc(0), "0.00000000");
        assert_eq!(format_btc(1), "0.00000001");
        assert_eq!(format_btc(-1), "-0.00000001");
        assert_eq!(format_btc(2_100_000_000_000_000), "21000000.00000000");
        assert_eq!(format_btc(123_456_789), "1.23456789");
        assert_eq!(format_btc(i64::MIN), "-92233720368.54775808");
    }

    #[test]
    fn transaction_totals_skip_coinbase() {
        let json = r#"{
            "txid": "ab",
            "status": {"confirmed": true, "block_height": 800000, "block_time": 1690000000},
            "fee": 150, "size": 225, "weight": 900,
            "vin": [{"prevout": null}, {"prevout": {"value": 10000}}],
            "vout": [{"value": 6000}, {"value": 3850, "scriptpubkey_address": "bc1q"}]
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.total_input(), 10_000);
        assert_eq!(tx.total_output(), 9_850);
        assert!(tx.is_confirmed());
        assert_eq!(tx.status.block_height, Some(800_000));
    }

    #[test]
    fn unconfirmed_transaction_parses_without_block_fields() {
        let json = r#"{"txid": "cd", "status": {"confirmed": false}, "vin": [], "vout": []}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(!tx.is_confirmed());
        assert_eq!(tx.status.block_time, None);
        assert_eq!(tx.fee, 0);
    }
}
