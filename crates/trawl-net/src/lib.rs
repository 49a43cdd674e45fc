//! # trawl-net: talking to Esplora indexers.
//!
//! # Modules
//!
//! - [`pool`]: ordered, health-sorted endpoint list with rotation and eviction
//! - [`client`]: [`EsploraClient`], the [`trawl_core::AddressOracle`] over HTTP

pub mod client;
pub mod pool;

pub use client::EsploraClient;
pub use pool::{Endpoint, EndpointPool, ProbeResult};
