//! Error types for seedtrawl.

use thiserror::Error;

/// Errors from phrase parsing and key derivation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    /// Phrase has an unknown word, a wrong length, or a bad checksum.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// A path component does not fit below the hardened offset.
    #[error("derivation index overflow: {index} does not fit below the hardened offset")]
    DerivationOverflow {
        /// The offending index.
        index: u32,
    },

    /// The underlying BIP-32 implementation refused the derivation.
    #[error("derivation failed: {0}")]
    DerivationFailed(String),
}

/// Coarse classification of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input. Never retried.
    InvalidInput,
    /// Timeout, refused connection, 5xx, 429 and other transport trouble.
    TransientNetwork,
    /// The endpoint answered with a body that does not parse.
    DataFormat,
    /// No endpoint left to ask.
    ResourceExhausted,
}

/// Errors from querying an address indexer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The caller passed something that cannot be queried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Every endpoint has been evicted from the pool.
    #[error("no available endpoint")]
    NoAvailableEndpoint,

    /// The endpoint answered with a non-success status.
    #[error("{endpoint} returned status {status}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// Any other transport failure (reset, TLS, truncated body).
    #[error("transport error from {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The body did not decode into the expected document.
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("http client setup: {0}")]
    ClientSetup(String),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::ClientSetup(_) => ErrorKind::InvalidInput,
            Self::NoAvailableEndpoint => ErrorKind::ResourceExhausted,
            Self::Malformed { .. } => ErrorKind::DataFormat,
            Self::HttpStatus { .. }
            | Self::Timeout { .. }
            | Self::Connect { .. }
            | Self::Transport { .. } => ErrorKind::TransientNetwork,
        }
    }

    /// Whether this failure should move the pool off the endpoint that produced it.
    ///
    /// Rate limiting, server errors, timeouts, refused connections and
    /// unparseable bodies rotate; client errors such as 404 only count.
    pub fn triggers_rotation(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout { .. } | Self::Connect { .. } | Self::Malformed { .. } => true,
            _ => false,
        }
    }

    /// The endpoint this error came from, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { endpoint, .. }
            | Self::Timeout { endpoint }
            | Self::Connect { endpoint, .. }
            | Self::Transport { endpoint, .. }
            | Self::Malformed { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }
}

/// Top-level error wrapping the per-concern enums.
#[derive(Error, Debug)]
pub enum TrawlError {
    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
