//! Append-only CSV log of discoveries, one file per scan run.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rand::RngCore;

use trawl_core::{DerivedAddress, format_btc};

use crate::error::ScanError;

pub const HEADER: &str =
    "Timestamp,Seed Phrase,Wallet Type,Path,Address,Balance (BTC),Transactions,Explorer URL";

/// One discovery: an address with funds or history and the phrase that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub timestamp: DateTime<Local>,
    pub mnemonic: String,
    pub derived: DerivedAddress,
    pub balance_sats: i64,
    pub tx_count: u64,
    pub explorer_url: String,
}

impl ScanRecord {
    /// Render as a single CSV line, newline included.
    pub fn to_csv_line(&self) -> String {
        let fields = [
            Cow::Owned(self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cow::Borrowed(self.mnemonic.as_str()),
            Cow::Borrowed(self.derived.scheme.label()),
            Cow::Owned(self.derived.path.to_string()),
            Cow::Borrowed(self.derived.address.as_str()),
            Cow::Owned(format_btc(self.balance_sats)),
            Cow::Owned(self.tx_count.to_string()),
            Cow::Borrowed(self.explorer_url.as_str()),
        ];
        let mut line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
        line.push('\n');
        line
    }
}

/// Quote a field if it contains a separator, quote or line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Shared writer for one run's discoveries.
///
/// Each record is formatted in full and written with a single `write_all`
/// under the lock, so concurrent appends never interleave.
pub struct ScanLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ScanLog {
    /// Create a fresh `wallets_YYYYMMDD_HHMM_<hex>.csv` in `dir` and write the header.
    pub fn create(dir: &Path) -> Result<Self, ScanError> {
        std::fs::create_dir_all(dir).map_err(|source| ScanError::LogFile {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut suffix = [0u8; 5];
        rand::rngs::OsRng.fill_bytes(&mut suffix);
        let name = format!(
            "wallets_{}_{}.csv",
            Local::now().format("%Y%m%d_%H%M"),
            hex::encode(suffix)
        );
        Self::create_at(dir.join(name))
    }

    /// Create the log at an explicit path. Fails if the file already exists.
    pub fn create_at(path: PathBuf) -> Result<Self, ScanError> {
        let mut file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| ScanError::LogFile { path: path.clone(), source })?;
        file.write_all(format!("{HEADER}\n").as_bytes())
            .map_err(|source| ScanError::LogFile { path: path.clone(), source })?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ScanRecord) -> io::Result<()> {
        let line = record.to_csv_line();
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}
