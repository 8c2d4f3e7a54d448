//! Chain port
//!
//! Read-only token/account queries and the signed purchase call, stated at
//! the logical level so no provider type leaks into the core.

use std::fmt;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::MintSplit;

/// Transaction hash
pub type TxHash = B256;

#[derive(Debug, Error, Clone)]
pub enum ChainError {
    /// Network-level failure, the request may not have reached the node
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    /// The node answered but the payload could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// The signer refused to sign or send
    #[error("signer rejected request: {0}")]
    Rejected(String),

    /// The transaction disappeared from the node without a receipt
    #[error("transaction {0} was dropped or replaced")]
    Dropped(TxHash),
}

impl ChainError {
    /// Safe to repeat for reads. Writes are never retried regardless.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::Transport(_))
    }
}

/// Block a read is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    /// JSON-RPC block parameter
    pub fn to_rpc(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Number(n) => format!("0x{n:x}"),
        }
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => f.write_str("latest"),
            BlockTag::Number(n) => write!(f, "#{n}"),
        }
    }
}

/// Receipt of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    /// Amounts reported by the contract's purchase event, when present
    pub minted: Option<MintSplit>,
}

/// How a submitted transaction ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Confirmed(TransactionReceipt),
    Reverted(TransactionReceipt),
}

/// Read-only token and account queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Latest block number, used to pin a batch of reads
    async fn block_number(&self) -> Result<u64, ChainError>;

    async fn token_name(&self, at: BlockTag) -> Result<String, ChainError>;

    async fn token_symbol(&self, at: BlockTag) -> Result<String, ChainError>;

    async fn token_decimals(&self, at: BlockTag) -> Result<u8, ChainError>;

    /// Total supply in token base units
    async fn total_supply(&self, at: BlockTag) -> Result<U256, ChainError>;

    /// Token balance of `owner` in base units
    async fn token_balance(&self, owner: Address, at: BlockTag) -> Result<U256, ChainError>;

    /// Native currency balance of `owner` in wei
    async fn native_balance(&self, owner: Address, at: BlockTag) -> Result<U256, ChainError>;
}

/// Signer-bound state-changing calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Account that signs
    fn sender(&self) -> Address;

    /// Submit `buyGold(profit_recipient)` carrying `value` wei.
    /// Exactly one transaction per call.
    async fn buy_gold(&self, profit_recipient: Address, value: U256) -> Result<TxHash, ChainError>;

    /// Wait until the transaction is mined (or known to be gone).
    async fn wait_for_settlement(&self, tx_hash: TxHash) -> Result<Settlement, ChainError>;
}
