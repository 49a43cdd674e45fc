//! Cross-crate tests for seedtrawl.
//!
//! The scanner and client are exercised end to end against an in-process
//! Esplora stand-in (see [`helpers::MockEsplora`]); no test touches the
//! public network.

pub mod helpers;
