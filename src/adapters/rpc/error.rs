//! JSON-RPC Error Types

use thiserror::Error;

use crate::ports::ChainError;

/// Errors from talking to an Ethereum JSON-RPC endpoint
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Non-success HTTP status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Error object in the JSON-RPC response
    #[error("node error: {message} (code: {code})")]
    NodeError { code: i64, message: String },

    /// Response had neither result nor error
    #[error("empty response for {0}")]
    EmptyResponse(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(String),

    /// Malformed JSON or an undecodable value
    #[error("decode error: {0}")]
    Decode(String),

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl RpcError {
    /// Transport-level failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::HttpError(_)
            | RpcError::Timeout
            | RpcError::NetworkError(_)
            | RpcError::RateLimited => true,
            RpcError::Status(code) => *code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RpcError::Timeout
        } else if err.is_connect() {
            RpcError::NetworkError(err.to_string())
        } else if err.is_decode() {
            RpcError::Decode(err.to_string())
        } else {
            RpcError::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Decode(err.to_string())
    }
}

impl From<RpcError> for ChainError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::NodeError { code, message } => ChainError::Node { code, message },
            RpcError::Decode(msg) => ChainError::Decode(msg),
            RpcError::EmptyResponse(method) => ChainError::Decode(format!("empty response for {method}")),
            other => ChainError::Transport(other.to_string()),
        }
    }
}
