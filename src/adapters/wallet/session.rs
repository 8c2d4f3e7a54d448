//! Wallet session over a JSON-RPC endpoint that manages accounts
//! (a local node, a dev chain, or a signer proxy).

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::adapters::rpc::{JsonRpcClient, RpcError, RpcSigner, RpcTokenReader};
use crate::adapters::rpc::provider::DEFAULT_POLL_INTERVAL;
use crate::ports::{ChainError, ChainReader, ChainWriter, Session, WalletProvider};

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("connected to chain {actual}, expected {expected}")]
    WrongChain { expected: u64, actual: u64 },

    #[error("endpoint exposes no accounts")]
    NoAccounts,

    #[error("account {0} is not managed by the endpoint")]
    AccountNotManaged(Address),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
}

pub struct RpcWallet {
    client: JsonRpcClient,
    contract: Address,
    chain_id: u64,
    account: Option<Address>,
    poll_interval: Duration,
    reader: Arc<RpcTokenReader>,
    session: watch::Sender<Session>,
}

impl RpcWallet {
    /// Disconnected wallet for `contract` on `chain_id`. `account` pins the
    /// signing account; otherwise the endpoint's first account is used.
    pub fn new(client: JsonRpcClient, contract: Address, chain_id: u64, account: Option<Address>) -> Self {
        let (session, _) = watch::channel(Session::disconnected());
        Self {
            reader: Arc::new(RpcTokenReader::new(client.clone(), contract)),
            client,
            contract,
            chain_id,
            account,
            poll_interval: DEFAULT_POLL_INTERVAL,
            session,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Check the chain, resolve the account and publish the session
    pub async fn connect(&self) -> Result<Address, WalletError> {
        let actual = self.client.chain_id().await?;
        if actual != self.chain_id {
            return Err(WalletError::WrongChain {
                expected: self.chain_id,
                actual,
            });
        }

        let accounts = self.client.accounts().await?;
        let account = resolve_account(self.account, &accounts)?;

        tracing::info!("Wallet connected: {} on chain {} via {}", account, actual, self.client.url());
        self.session.send_replace(Session::connected(account));
        Ok(account)
    }

    pub fn disconnect(&self) {
        if self.session.borrow().connected {
            tracing::info!("Wallet disconnected");
        }
        self.session.send_replace(Session::disconnected());
    }
}

fn resolve_account(configured: Option<Address>, managed: &[Address]) -> Result<Address, WalletError> {
    match configured {
        Some(account) if managed.contains(&account) => Ok(account),
        Some(account) => Err(WalletError::AccountNotManaged(account)),
        None => managed.first().copied().ok_or(WalletError::NoAccounts),
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    fn reader(&self) -> Option<Arc<dyn ChainReader>> {
        Some(self.reader.clone())
    }

    async fn signer(&self) -> Result<Arc<dyn ChainWriter>, ChainError> {
        let account = self
            .session()
            .active_account()
            .ok_or_else(|| ChainError::Rejected("wallet not connected".into()))?;

        let signer = RpcSigner::new(self.client.clone(), self.contract, account)
            .with_poll_interval(self.poll_interval);
        Ok(Arc::new(signer))
    }
}
