//! Chain ports backed by JSON-RPC
//!
//! [`RpcTokenReader`] answers token and balance queries through `eth_call`
//! and `eth_getBalance`. [`RpcSigner`] sends `buyGold` through an endpoint
//! that manages the account and polls for its receipt.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;

use super::abi;
use super::client::JsonRpcClient;
use super::error::RpcError;
use super::types::{RpcReceipt, TransactionRequest};
use crate::ports::{
    BlockTag, ChainError, ChainReader, ChainWriter, Settlement, TransactionReceipt, TxHash,
};

/// Consecutive polls with neither receipt nor pending transaction before
/// the transaction is reported as dropped
pub const DROPPED_AFTER_MISSES: u32 = 3;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone)]
pub struct RpcTokenReader {
    client: JsonRpcClient,
    contract: Address,
}

impl RpcTokenReader {
    pub fn new(client: JsonRpcClient, contract: Address) -> Self {
        Self { client, contract }
    }

    async fn call(&self, data: Vec<u8>, at: BlockTag) -> Result<Vec<u8>, RpcError> {
        let tx = TransactionRequest::call(self.contract, data);
        let out = self.client.call(&tx, at).await?;
        if out.is_empty() {
            // Calling a non-contract address returns empty data
            return Err(RpcError::Decode(format!("empty eth_call result from {}", self.contract)));
        }
        Ok(out.to_vec())
    }

    async fn call_view(&self, signature: &str, at: BlockTag) -> Result<Vec<u8>, RpcError> {
        self.call(abi::encode_call(signature, &[]), at).await
    }
}

#[async_trait]
impl ChainReader for RpcTokenReader {
    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.client.block_number().await?)
    }

    async fn token_name(&self, at: BlockTag) -> Result<String, ChainError> {
        let out = self.call_view(abi::NAME_SIGNATURE, at).await?;
        Ok(abi::decode_string(&out)?)
    }

    async fn token_symbol(&self, at: BlockTag) -> Result<String, ChainError> {
        let out = self.call_view(abi::SYMBOL_SIGNATURE, at).await?;
        Ok(abi::decode_string(&out)?)
    }

    async fn token_decimals(&self, at: BlockTag) -> Result<u8, ChainError> {
        let out = self.call_view(abi::DECIMALS_SIGNATURE, at).await?;
        Ok(abi::decode_uint8(&out)?)
    }

    async fn total_supply(&self, at: BlockTag) -> Result<U256, ChainError> {
        let out = self.call_view(abi::TOTAL_SUPPLY_SIGNATURE, at).await?;
        Ok(abi::decode_uint256(&out)?)
    }

    async fn token_balance(&self, owner: Address, at: BlockTag) -> Result<U256, ChainError> {
        let out = self.call(abi::encode_balance_of(owner), at).await?;
        Ok(abi::decode_uint256(&out)?)
    }

    async fn native_balance(&self, owner: Address, at: BlockTag) -> Result<U256, ChainError> {
        Ok(self.client.get_balance(owner, at).await?)
    }
}

/// Signer for an account the endpoint manages (`eth_sendTransaction`)
#[derive(Debug, Clone)]
pub struct RpcSigner {
    client: JsonRpcClient,
    contract: Address,
    account: Address,
    poll_interval: Duration,
}

impl RpcSigner {
    pub fn new(client: JsonRpcClient, contract: Address, account: Address) -> Self {
        Self {
            client,
            contract,
            account,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn to_receipt(&self, raw: &RpcReceipt) -> Result<TransactionReceipt, ChainError> {
        Ok(TransactionReceipt {
            tx_hash: raw.transaction_hash,
            block_number: raw.block()?,
            gas_used: raw.gas(),
            minted: abi::decode_gold_purchased(&raw.logs, self.contract),
        })
    }
}

#[async_trait]
impl ChainWriter for RpcSigner {
    fn sender(&self) -> Address {
        self.account
    }

    async fn buy_gold(&self, profit_recipient: Address, value: U256) -> Result<TxHash, ChainError> {
        let tx = TransactionRequest::send(
            self.account,
            self.contract,
            value,
            abi::encode_buy_gold(profit_recipient),
        );

        match self.client.send_transaction(&tx).await {
            Ok(hash) => Ok(hash),
            // 4001 is the EIP-1193 user rejection code
            Err(RpcError::NodeError { code: 4001, message }) => Err(ChainError::Rejected(message)),
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until the receipt appears. Unbounded; the caller applies the
    /// confirmation timeout.
    async fn wait_for_settlement(&self, tx_hash: TxHash) -> Result<Settlement, ChainError> {
        let mut misses = 0u32;

        loop {
            if let Some(raw) = self.client.transaction_receipt(tx_hash).await? {
                if raw.block_number.is_some() {
                    let receipt = self.to_receipt(&raw)?;
                    return Ok(if raw.succeeded() {
                        Settlement::Confirmed(receipt)
                    } else {
                        Settlement::Reverted(receipt)
                    });
                }
            }

            if self.client.transaction_by_hash(tx_hash).await?.is_none() {
                misses += 1;
                tracing::debug!("{} unknown to node ({}/{})", tx_hash, misses, DROPPED_AFTER_MISSES);
                if misses >= DROPPED_AFTER_MISSES {
                    return Err(ChainError::Dropped(tx_hash));
                }
            } else {
                misses = 0;
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
