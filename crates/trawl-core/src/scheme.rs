//! Wallet schemes and their BIP-32 derivation paths.

use std::fmt;
use std::str::FromStr;

use bitcoin::bip32::ChildNumber;
use serde::{Deserialize, Serialize};

use crate::constants::HARDENED_OFFSET;
use crate::error::DerivationError;

/// The four address families checked for every seed.
///
/// Ordering is the order in which schemes are derived, queried and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WalletScheme {
    /// Single-branch BIP-32 wallet, `m/0'/0/i`, P2PKH.
    LegacyBip32,
    /// `m/44'/coin'/account'/change/i`, P2PKH.
    Bip44,
    /// `m/49'/coin'/account'/change/i`, P2SH-wrapped P2WPKH.
    Bip49,
    /// `m/84'/coin'/account'/change/i`, native P2WPKH.
    Bip84,
}

impl WalletScheme {
    pub const ALL: [WalletScheme; 4] = [Self::LegacyBip32, Self::Bip44, Self::Bip49, Self::Bip84];

    /// Human-readable label used in logs and the scan log.
    pub fn label(self) -> &'static str {
        match self {
            Self::LegacyBip32 => "BIP32 (Legacy)",
            Self::Bip44 => "BIP44 (Legacy)",
            Self::Bip49 => "BIP49 (SegWit-compatible)",
            Self::Bip84 => "BIP84 (Native SegWit)",
        }
    }

    /// Short CLI name.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::LegacyBip32 => "bip32",
            Self::Bip44 => "bip44",
            Self::Bip49 => "bip49",
            Self::Bip84 => "bip84",
        }
    }

    /// BIP-43 purpose field, `None` for the single-branch legacy layout.
    pub fn purpose(self) -> Option<u32> {
        match self {
            Self::LegacyBip32 => None,
            Self::Bip44 => Some(44),
            Self::Bip49 => Some(49),
            Self::Bip84 => Some(84),
        }
    }

    /// Build the derivation path for one address.
    ///
    /// The legacy layout has no account or change level, so both are ignored.
    pub fn path(self, coin_type: u32, account: u32, change: u32, index: u32) -> DerivationPath {
        let steps = match self.purpose() {
            None => vec![PathStep::hardened(0), PathStep::normal(0), PathStep::normal(index)],
            Some(purpose) => vec![
                PathStep::hardened(purpose),
                PathStep::hardened(coin_type),
                PathStep::hardened(account),
                PathStep::normal(change),
                PathStep::normal(index),
            ],
        };
        DerivationPath { steps }
    }
}

impl fmt::Display for WalletScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WalletScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bip32" | "legacy" => Ok(Self::LegacyBip32),
            "bip44" => Ok(Self::Bip44),
            "bip49" => Ok(Self::Bip49),
            "bip84" => Ok(Self::Bip84),
            other => Err(format!("unknown wallet scheme '{other}' (expected bip32, bip44, bip49 or bip84)")),
        }
    }
}

/// One level of a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    pub index: u32,
    pub hardened: bool,
}

impl PathStep {
    pub fn hardened(index: u32) -> Self {
        Self { index, hardened: true }
    }

    pub fn normal(index: u32) -> Self {
        Self { index, hardened: false }
    }

    /// Convert to a BIP-32 child number, rejecting indices at or above 2^31.
    pub fn to_child_number(self) -> Result<ChildNumber, DerivationError> {
        if self.index >= HARDENED_OFFSET {
            return Err(DerivationError::DerivationOverflow { index: self.index });
        }
        let child = if self.hardened {
            ChildNumber::from_hardened_idx(self.index)
        } else {
            ChildNumber::from_normal_idx(self.index)
        };
        child.map_err(|e| DerivationError::DerivationFailed(e.to_string()))
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// Ordered list of path steps from the master key. Renders as `m/44'/0'/0'/0/0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivationPath {
    pub steps: Vec<PathStep>,
}

impl DerivationPath {
    pub fn to_child_numbers(&self) -> Result<Vec<ChildNumber>, DerivationError> {
        self.steps.iter().map(|s| s.to_child_number()).collect()
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for step in &self.steps {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}
