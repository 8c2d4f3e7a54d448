//! Ethereum JSON-RPC Client
//!
//! HTTP client for a node or signer proxy. Reads retry transport failures
//! with exponential backoff; `eth_sendTransaction` is sent exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::error::RpcError;
use super::types::{
    parse_quantity, parse_quantity_u256, JsonRpcRequest, JsonRpcResponse, RpcReceipt,
    RpcTransaction, TransactionRequest,
};
use crate::ports::BlockTag;

/// JSON-RPC client configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Attempts for idempotent reads
    pub max_retries: u32,
    /// First backoff delay, doubled per attempt
    pub retry_delay_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    config: RpcConfig,
    http: Client,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        Self::with_config(RpcConfig {
            url: url.into(),
            ..RpcConfig::default()
        })
    }

    pub fn with_config(config: RpcConfig) -> Result<Self, RpcError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RpcError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let raw: String = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&raw)
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let raw: String = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&raw)
    }

    /// `eth_call` against `at`
    pub async fn call(&self, tx: &TransactionRequest, at: BlockTag) -> Result<Bytes, RpcError> {
        self.request("eth_call", json!([tx, at.to_rpc()])).await
    }

    pub async fn get_balance(&self, owner: Address, at: BlockTag) -> Result<U256, RpcError> {
        let raw: String = self.request("eth_getBalance", json!([owner, at.to_rpc()])).await?;
        parse_quantity_u256(&raw)
    }

    /// Accounts the endpoint can sign for
    pub async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        self.request("eth_accounts", json!([])).await
    }

    /// Broadcast a transaction signed by the endpoint. Never retried: a
    /// lost response does not mean the transaction was not sent.
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, RpcError> {
        let response = self.send_once("eth_sendTransaction", json!([tx])).await?;
        Self::handle_response("eth_sendTransaction", response).await
    }

    pub async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<RpcReceipt>, RpcError> {
        self.request_optional("eth_getTransactionReceipt", json!([tx_hash])).await
    }

    pub async fn transaction_by_hash(&self, tx_hash: B256) -> Result<Option<RpcTransaction>, RpcError> {
        self.request_optional("eth_getTransactionByHash", json!([tx_hash])).await
    }

    /// Idempotent request; a null result is an error
    async fn request<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T, RpcError> {
        self.request_optional(method, params)
            .await?
            .ok_or_else(|| RpcError::EmptyResponse(method.to_string()))
    }

    /// Idempotent request where a null result is meaningful
    async fn request_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, RpcError> {
        self.execute_with_retry(|| {
            let params = params.clone();
            async move {
                let response = self.send_once(method, params).await?;
                Self::handle_optional(method, response).await
            }
        })
        .await
    }

    async fn send_once(&self, method: &str, params: serde_json::Value) -> Result<reqwest::Response, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        tracing::debug!("RPC #{} {}", id, method);

        let response = self
            .http
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(RpcError::RateLimited),
            status if status.is_server_error() => Err(RpcError::Status(status.as_u16())),
            _ => Ok(response),
        }
    }

    async fn handle_response<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T, RpcError> {
        Self::handle_optional(method, response)
            .await?
            .ok_or_else(|| RpcError::EmptyResponse(method.to_string()))
    }

    async fn handle_optional<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<Option<T>, RpcError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() && body.is_empty() {
            return Err(RpcError::Status(status.as_u16()));
        }
        parse_body(method, &body)
    }

    /// Execute an operation with retry logic and exponential backoff
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, RpcError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, RpcError>>,
    {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = RpcError::NetworkError("No attempts made".into());
        let mut delay_ms = self.config.retry_delay_ms;

        for attempt in 0..attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    tracing::warn!("RPC attempt {}/{} failed: {}", attempt + 1, attempts, e);
                    last_error = e;

                    if attempt + 1 < attempts {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms *= 2;
                    }
                }
            }
        }

        Err(RpcError::MaxRetriesExceeded {
            attempts,
            last_error: last_error.to_string(),
        })
    }
}

/// Decode a JSON-RPC response body
pub fn parse_body<T: DeserializeOwned>(method: &str, body: &str) -> Result<Option<T>, RpcError> {
    let response: JsonRpcResponse<T> = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        tracing::debug!("{} returned error {}: {}", method, error.code, error.message);
        return Err(RpcError::NodeError {
            code: error.code,
            message: error.describe(),
        });
    }

    Ok(response.result)
}
