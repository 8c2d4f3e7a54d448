//! Balance & Token-State Reader
//!
//! Aggregates the token and account reads into one snapshot. Every read in a
//! batch is pinned to the same block and the batch is all-or-nothing: one
//! failed read discards the whole snapshot.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use super::chain_client::ChainClient;
use crate::domain::{format_units, TokenSnapshot, ETHER_DECIMALS};
use crate::ports::{BlockTag, ChainError};

#[derive(Debug, Error, Clone)]
pub enum ReaderError {
    #[error("chain reader unavailable")]
    ReaderUnavailable,

    #[error("{query} query failed: {source}")]
    QueryFailed {
        query: &'static str,
        #[source]
        source: ChainError,
    },

    #[error("{0} is not the connected account")]
    NotConnected(Address),

    #[error("account changed while loading snapshot for {0}; result discarded")]
    StaleAccount(Address),
}

fn query_failed(query: &'static str) -> impl FnOnce(ChainError) -> ReaderError {
    move |source| ReaderError::QueryFailed { query, source }
}

/// Tag a read future with the query name reported on failure
async fn tagged<T>(
    query: &'static str,
    read: impl Future<Output = Result<T, ChainError>>,
) -> Result<T, ReaderError> {
    read.await.map_err(query_failed(query))
}

pub struct TokenStateReader {
    client: ChainClient,
    sequence: AtomicU64,
    latest: RwLock<Option<TokenSnapshot>>,
}

impl TokenStateReader {
    pub fn new(client: ChainClient) -> Self {
        Self {
            client,
            sequence: AtomicU64::new(0),
            latest: RwLock::new(None),
        }
    }

    pub fn client(&self) -> &ChainClient {
        &self.client
    }

    /// Read token metadata and balances for `account` as one snapshot.
    pub async fn load_snapshot(&self, account: Address) -> Result<TokenSnapshot, ReaderError> {
        let reader = self.client.reader().ok_or(ReaderError::ReaderUnavailable)?;
        self.ensure_connected(account)?;

        let block_number = reader.block_number().await.map_err(query_failed("blockNumber"))?;
        let at = BlockTag::Number(block_number);

        let (name, symbol, decimals, total_supply, user_balance, native_balance) = tokio::try_join!(
            tagged("name", reader.token_name(at)),
            tagged("symbol", reader.token_symbol(at)),
            tagged("decimals", reader.token_decimals(at)),
            tagged("totalSupply", reader.total_supply(at)),
            tagged("balanceOf", reader.token_balance(account, at)),
            tagged("getBalance", reader.native_balance(account, at)),
        )?;

        if self.client.session().active_account() != Some(account) {
            tracing::debug!("Discarding snapshot for {} at block {}: account changed", account, block_number);
            self.invalidate().await;
            return Err(ReaderError::StaleAccount(account));
        }

        let snapshot = TokenSnapshot {
            account,
            name,
            symbol,
            decimals,
            total_supply: format_units(total_supply, decimals),
            user_balance: format_units(user_balance, decimals),
            native_balance: format_units(native_balance, ETHER_DECIMALS),
            block_number,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            fetched_at: Utc::now(),
        };

        tracing::debug!(
            "Snapshot #{} for {} at block {}: {} {}",
            snapshot.sequence,
            account,
            block_number,
            snapshot.user_balance,
            snapshot.symbol
        );

        let mut latest = self.latest.write().await;
        let replace = latest
            .as_ref()
            .map_or(true, |current| current.account != account || snapshot.is_newer_than(current));
        if replace {
            *latest = Some(snapshot.clone());
        }

        Ok(snapshot)
    }

    /// Native currency balance in wei
    pub async fn native_balance_wei(&self, account: Address) -> Result<U256, ReaderError> {
        let reader = self.client.reader().ok_or(ReaderError::ReaderUnavailable)?;
        self.ensure_connected(account)?;
        reader
            .native_balance(account, BlockTag::Latest)
            .await
            .map_err(query_failed("getBalance"))
    }

    /// Native currency balance as a whole-unit string
    pub async fn native_balance(&self, account: Address) -> Result<String, ReaderError> {
        let wei = self.native_balance_wei(account).await?;
        Ok(format_units(wei, ETHER_DECIMALS))
    }

    /// Last published snapshot, if it belongs to the current account
    pub async fn latest(&self) -> Option<TokenSnapshot> {
        let active = self.client.session().active_account()?;
        self.latest
            .read()
            .await
            .as_ref()
            .filter(|snapshot| snapshot.account == active)
            .cloned()
    }

    pub async fn invalidate(&self) {
        *self.latest.write().await = None;
    }

    /// Reads are only issued for the account the session is connected as
    fn ensure_connected(&self, account: Address) -> Result<(), ReaderError> {
        if self.client.session().active_account() == Some(account) {
            Ok(())
        } else {
            Err(ReaderError::NotConnected(account))
        }
    }
}
