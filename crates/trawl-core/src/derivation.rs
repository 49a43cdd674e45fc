//! Deterministic seed → address derivation under the four wallet schemes.
//!
//! Key-tree arithmetic and address encoding come from the `bitcoin` crate;
//! nothing here touches curve or hash primitives directly.

use std::collections::BTreeMap;

use bip39::Mnemonic;
use bitcoin::bip32::{Xpriv, Xpub};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{Address, CompressedPublicKey, Network};
use serde::Serialize;

use crate::constants::BITCOIN_COIN_TYPE;
use crate::error::DerivationError;
use crate::mnemonic::{Seed, mnemonic_to_seed, parse_phrase};
use crate::scheme::{DerivationPath, WalletScheme};

/// One derived address together with how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedAddress {
    pub scheme: WalletScheme,
    pub path: DerivationPath,
    pub address: String,
}

/// Addresses grouped by scheme, in scheme order.
pub type AddressBook = BTreeMap<WalletScheme, Vec<DerivedAddress>>;

/// Derives addresses from seeds. Holds a reusable secp256k1 context.
pub struct DerivationEngine {
    secp: Secp256k1<All>,
    network: Network,
}

impl Default for DerivationEngine {
    fn default() -> Self {
        Self::new(Network::Bitcoin)
    }
}

impl DerivationEngine {
    pub fn new(network: Network) -> Self {
        Self { secp: Secp256k1::new(), network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// BIP-44 coin type: 0 on mainnet, 1 on every test network.
    pub fn coin_type(&self) -> u32 {
        match self.network {
            Network::Bitcoin => BITCOIN_COIN_TYPE,
            _ => 1,
        }
    }

    /// Parse and checksum-verify a phrase.
    pub fn parse_phrase(&self, phrase: &str) -> Result<Mnemonic, DerivationError> {
        parse_phrase(phrase)
    }

    /// Validate `phrase`, then stretch it with `passphrase` into a seed.
    pub fn seed_from_phrase(&self, phrase: &str, passphrase: &str) -> Result<Seed, DerivationError> {
        let mnemonic = parse_phrase(phrase)?;
        Ok(mnemonic_to_seed(&mnemonic, passphrase))
    }

    /// Derive a single address.
    pub fn derive_address(
        &self,
        seed: &Seed,
        scheme: WalletScheme,
        account: u32,
        change: u32,
        index: u32,
    ) -> Result<DerivedAddress, DerivationError> {
        let path = scheme.path(self.coin_type(), account, change, index);
        let children = path.to_child_numbers()?;

        let master = Xpriv::new_master(self.network, seed.as_bytes())
            .map_err(|e| DerivationError::DerivationFailed(e.to_string()))?;
        let child = master
            .derive_priv(&self.secp, &children)
            .map_err(|e| DerivationError::DerivationFailed(e.to_string()))?;
        let xpub = Xpub::from_priv(&self.secp, &child);
        let pubkey = CompressedPublicKey(xpub.public_key);

        let address = match scheme {
            WalletScheme::LegacyBip32 | WalletScheme::Bip44 => {
                Address::p2pkh(pubkey.pubkey_hash(), self.network)
            }
            WalletScheme::Bip49 => Address::p2shwpkh(&pubkey, self.network),
            WalletScheme::Bip84 => Address::p2wpkh(&pubkey, self.network),
        };

        Ok(DerivedAddress { scheme, path, address: address.to_string() })
    }

    /// Derive `index` under every scheme. Each scheme fails independently.
    pub fn derive_schemes(
        &self,
        seed: &Seed,
        index: u32,
    ) -> Vec<(WalletScheme, Result<DerivedAddress, DerivationError>)> {
        WalletScheme::ALL
            .iter()
            .map(|&scheme| (scheme, self.derive_address(seed, scheme, 0, 0, index)))
            .collect()
    }

    /// Validate a phrase and derive receive addresses `0..count` for every scheme.
    pub fn validate_and_derive(
        &self,
        phrase: &str,
        passphrase: &str,
        count: u32,
    ) -> Result<AddressBook, DerivationError> {
        let seed = self.seed_from_phrase(phrase, passphrase)?;
        let mut book = AddressBook::new();
        for scheme in WalletScheme::ALL {
            let addresses = (0..count)
                .map(|index| self.derive_address(&seed, scheme, 0, 0, index))
                .collect::<Result<Vec<_>, _>>()?;
            book.insert(scheme, addresses);
        }
        Ok(book)
    }
}
