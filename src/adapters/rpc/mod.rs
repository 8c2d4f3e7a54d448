//! Ethereum JSON-RPC adapter
//!
//! HTTP transport, ABI helpers for the token contract, and the chain port
//! implementations built on them.

pub mod abi;
pub mod client;
pub mod error;
pub mod provider;
pub mod types;

pub use client::{JsonRpcClient, RpcConfig};
pub use error::RpcError;
pub use provider::{RpcSigner, RpcTokenReader};
