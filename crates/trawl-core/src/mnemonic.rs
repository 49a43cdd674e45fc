//! BIP-39 phrase parsing, generation, and the 64-byte wallet seed.

use std::fmt;

use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::MNEMONIC_WORD_COUNTS;
use crate::error::DerivationError;

/// A 64-byte BIP-39 seed (PBKDF2-HMAC-SHA512 of phrase and passphrase).
///
/// Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 64],
}

impl Seed {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

/// Collapse runs of whitespace and lowercase the phrase.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse an English BIP-39 phrase, verifying word list, length and checksum.
pub fn parse_phrase(phrase: &str) -> Result<Mnemonic, DerivationError> {
    let normalized = normalize_phrase(phrase);
    if normalized.is_empty() {
        return Err(DerivationError::InvalidMnemonic("empty phrase".into()));
    }
    Mnemonic::parse_in(Language::English, &normalized)
        .map_err(|e| DerivationError::InvalidMnemonic(e.to_string()))
}

/// Generate a fresh phrase of `word_count` words from the OS RNG.
pub fn generate_mnemonic(word_count: usize) -> Result<Mnemonic, DerivationError> {
    if !MNEMONIC_WORD_COUNTS.contains(&word_count) {
        return Err(DerivationError::InvalidMnemonic(format!(
            "unsupported word count {word_count}"
        )));
    }
    // 11 bits per word, 1 checksum bit per 32 bits of entropy.
    let entropy_len = word_count * 4 / 3;
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut entropy[..entropy_len]);
    let result = Mnemonic::from_entropy_in(Language::English, &entropy[..entropy_len])
        .map_err(|e| DerivationError::InvalidMnemonic(e.to_string()));
    entropy.zeroize();
    result
}

/// Stretch a parsed mnemonic into its seed.
pub fn mnemonic_to_seed(mnemonic: &Mnemonic, passphrase: &str) -> Seed {
    Seed::from_bytes(mnemonic.to_seed(passphrase))
}
