//! # trawl-core: seeds, schemes and address derivation.
//!
//! Turns BIP-39 phrases into Bitcoin addresses under the legacy BIP-32,
//! BIP-44, BIP-49 and BIP-84 layouts, and defines the data types and the
//! oracle trait shared by the network and scanner crates.
//!
//! # Modules
//!
//! - [`constants`]: amounts, derivation offsets, timeouts, thresholds
//! - [`error`]: `DerivationError`, `QueryError`, `TrawlError`
//! - [`mnemonic`]: BIP-39 phrase parsing/generation and the zeroizing [`Seed`]
//! - [`scheme`]: the four wallet schemes and their derivation paths
//! - [`derivation`]: [`DerivationEngine`], seed to addresses
//! - [`types`]: wallet snapshots, balances, transactions
//! - [`traits`]: [`AddressOracle`], the seam between scanner and network

pub mod constants;
pub mod derivation;
pub mod error;
pub mod mnemonic;
pub mod scheme;
pub mod traits;
pub mod types;

pub use derivation::{AddressBook, DerivationEngine, DerivedAddress};
pub use error::{DerivationError, ErrorKind, QueryError, TrawlError};
pub use mnemonic::{Seed, generate_mnemonic, parse_phrase};
pub use scheme::{DerivationPath, PathStep, WalletScheme};
pub use traits::AddressOracle;
pub use types::{AddressStats, BalanceSummary, Transaction, WalletSnapshot, format_btc};
