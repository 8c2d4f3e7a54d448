//! Chain Client Adapter
//!
//! Turns an injected wallet provider into the two capabilities the core
//! needs: a read handle and, only at submission time, a signer handle.

use std::sync::Arc;

use tokio::sync::watch;

use crate::ports::{ChainReader, ChainWriter, Session, WalletProvider};

#[derive(Clone)]
pub struct ChainClient {
    provider: Arc<dyn WalletProvider>,
}

impl ChainClient {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self { provider }
    }

    pub fn session(&self) -> Session {
        self.provider.session()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.provider.subscribe()
    }

    /// Read handle, `None` means "not ready" rather than an error
    pub fn reader(&self) -> Option<Arc<dyn ChainReader>> {
        let reader = self.provider.reader();
        if reader.is_none() {
            tracing::debug!("No read transport available");
        }
        reader
    }

    /// Signer for the connected account.
    ///
    /// Requesting a signer may prompt the wallet, so this is never called
    /// speculatively. Returns `None` when the session is disconnected, the
    /// prompt is refused, or the signer is bound to a different account.
    pub async fn writer(&self) -> Option<Arc<dyn ChainWriter>> {
        let Some(account) = self.session().active_account() else {
            tracing::debug!("Signer requested without a connected account");
            return None;
        };

        match self.provider.signer().await {
            Ok(writer) if writer.sender() == account => Some(writer),
            Ok(writer) => {
                tracing::warn!(
                    "Signer bound to {} but session account is {}",
                    writer.sender(),
                    account
                );
                None
            }
            Err(e) => {
                tracing::warn!("Signer unavailable for {}: {}", account, e);
                None
            }
        }
    }
}
