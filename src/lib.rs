//! An asynchronous client for RESP(2)-based in-memory stores.
//!
//! Three layers are exposed: single-command issuance ([`tokio::Conn`]),
//! a buffered pipeline that coalesces many commands into one network write
//! ([`tokio::Pipeline`]), and a server-side transaction wrapper
//! (MULTI/EXEC/DISCARD, also on [`tokio::Conn`]). [`tokio::Pool`] multiplexes
//! a bounded set of connections across concurrent callers.

pub mod error;
mod opts;
pub mod protocol;

pub use opts::{Encoding, Opts};

#[cfg(feature = "tokio")]
pub mod tokio;
