//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, these traits abstract:
//! - Chain reads and the signed purchase call
//! - The injected wallet session

pub mod chain;
pub mod wallet;
pub mod mocks;

pub use chain::{BlockTag, ChainError, ChainReader, ChainWriter, Settlement, TransactionReceipt, TxHash};
pub use wallet::{Session, WalletProvider};
