//! Typed JSON-RPC client for the wallet's node interactions.
//!
//! The [`ChainRpc`] trait is the seam the transaction pipeline depends on;
//! [`HttpChainClient`] is the production implementation speaking JSON-RPC
//! 2.0 over HTTP. All numeric results are parsed into arbitrary-precision
//! integers; nothing monetary ever passes through a float.

pub mod error;
pub mod rpc;
pub mod types;

pub use error::RpcError;
pub use rpc::{ChainRpc, HttpChainClient};
pub use types::{LogEntry, Receipt};
