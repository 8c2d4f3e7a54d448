//! Wallet port
//!
//! The injected wallet/session capability. The core only reads the session;
//! account changes arrive as notifications on a watch channel.

use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use tokio::sync::watch;

use super::chain::{ChainError, ChainReader, ChainWriter};

/// Current wallet session as published by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub account: Option<Address>,
    pub connected: bool,
}

impl Session {
    pub fn connected(account: Address) -> Self {
        Self {
            account: Some(account),
            connected: true,
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// The account, only while connected
    pub fn active_account(&self) -> Option<Address> {
        if self.connected {
            self.account
        } else {
            None
        }
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Current session snapshot
    fn session(&self) -> Session;

    /// Change notifications for the session
    fn subscribe(&self) -> watch::Receiver<Session>;

    /// Read transport, `None` when no provider is reachable
    fn reader(&self) -> Option<Arc<dyn ChainReader>>;

    /// Signer for the active account. May prompt the user, so only call it
    /// when a transaction is about to be submitted.
    async fn signer(&self) -> Result<Arc<dyn ChainWriter>, ChainError>;
}
