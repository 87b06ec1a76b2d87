//! Ethereum/EVM primitives for the token wallet.
//!
//! This crate provides:
//! - Address canonicalization and EIP-55 checksums
//! - ABI encoding for contract calls and decoding of results and revert
//!   reasons
//! - Typed calldata for the fixed token-sale contract interface
//! - Legacy (EIP-155) transaction building and signing

pub mod abi;
pub mod address;
pub mod error;
pub mod token;
pub mod transaction;

pub use error::EthError;
