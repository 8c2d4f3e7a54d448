//! Adapters Layer - External System Implementations
//!
//! - RPC: Ethereum JSON-RPC transport and the chain port implementations
//! - Wallet: account session over an RPC endpoint
//! - CLI: Command-line interface handlers

pub mod rpc;
pub mod wallet;
pub mod cli;

pub use rpc::{JsonRpcClient, RpcSigner, RpcTokenReader};
pub use wallet::RpcWallet;
pub use cli::CliApp;
