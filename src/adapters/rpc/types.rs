//! JSON-RPC Types
//!
//! Request and response shapes for the Ethereum JSON-RPC methods we call.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use super::error::RpcError;

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 response wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub id: Option<u64>,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Message with the revert payload appended when the node supplied one
    pub fn describe(&self) -> String {
        match &self.data {
            Some(serde_json::Value::String(data)) => format!("{} ({})", self.message, data),
            _ => self.message.clone(),
        }
    }
}

/// `eth_call` / `eth_sendTransaction` parameter object
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    pub data: Bytes,
}

impl TransactionRequest {
    pub fn call(to: Address, data: Vec<u8>) -> Self {
        Self {
            to,
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn send(from: Address, to: Address, value: U256, data: Vec<u8>) -> Self {
        Self {
            from: Some(from),
            to,
            value: Some(value),
            data: data.into(),
        }
    }
}

/// Subset of `eth_getTransactionReceipt`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    /// "0x1" success, "0x0" revert
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<RpcLog>,
}

impl RpcReceipt {
    pub fn succeeded(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1") | Some("0x01"))
    }

    pub fn block(&self) -> Result<u64, RpcError> {
        let raw = self
            .block_number
            .as_deref()
            .ok_or_else(|| RpcError::Decode("receipt without block number".into()))?;
        parse_quantity(raw)
    }

    pub fn gas(&self) -> u64 {
        self.gas_used.as_deref().and_then(|g| parse_quantity(g).ok()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Subset of `eth_getTransactionByHash`; only presence matters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: B256,
    #[serde(default)]
    pub block_number: Option<String>,
}

/// Parse a hex quantity ("0x1a") into a u64
pub fn parse_quantity(raw: &str) -> Result<u64, RpcError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Decode(format!("quantity without 0x prefix: {raw}")))?;
    if digits.is_empty() {
        return Err(RpcError::Decode("empty quantity".into()));
    }
    u64::from_str_radix(digits, 16).map_err(|e| RpcError::Decode(format!("bad quantity {raw}: {e}")))
}

/// Parse a hex quantity into a U256
pub fn parse_quantity_u256(raw: &str) -> Result<U256, RpcError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Decode(format!("quantity without 0x prefix: {raw}")))?;
    if digits.is_empty() {
        return Err(RpcError::Decode("empty quantity".into()));
    }
    U256::from_str_radix(digits, 16).map_err(|e| RpcError::Decode(format!("bad quantity {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1a").unwrap(), 26);
        assert_eq!(parse_quantity("0xaa36a7").unwrap(), 11_155_111);
        assert!(parse_quantity("1a").is_err());
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_parse_quantity_u256() {
        assert_eq!(
            parse_quantity_u256("0xde0b6b3a7640000").unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert!(parse_quantity_u256("12").is_err());
    }

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(7, "eth_blockNumber", serde_json::json!([]));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "eth_blockNumber");
    }

    #[test]
    fn test_transaction_request_serialization() {
        let from = Address::repeat_byte(0x11);
        let to = Address::repeat_byte(0x22);
        let tx = TransactionRequest::send(from, to, U256::from(255u64), vec![0xab, 0xcd]);
        let json = serde_json::to_value(&tx).unwrap();

        assert_eq!(json["value"], "0xff");
        assert_eq!(json["data"], "0xabcd");
        assert!(json["from"].as_str().unwrap().starts_with("0x1111"));

        let call = serde_json::to_value(TransactionRequest::call(to, vec![])).unwrap();
        assert!(call.get("from").is_none());
        assert!(call.get("value").is_none());
    }

    #[test]
    fn test_receipt_parsing() {
        let raw = serde_json::json!({
            "transactionHash": format!("0x{}", "ab".repeat(32)),
            "blockNumber": "0x10",
            "gasUsed": "0x5208",
            "status": "0x1",
            "logs": []
        });
        let receipt: RpcReceipt = serde_json::from_value(raw).unwrap();

        assert!(receipt.succeeded());
        assert_eq!(receipt.block().unwrap(), 16);
        assert_eq!(receipt.gas(), 21_000);
    }

    #[test]
    fn test_error_response_parsing() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":3,"message":"execution reverted","data":"0x08c379a0"}}"#;
        let resp: JsonRpcResponse<String> = serde_json::from_str(raw).unwrap();

        assert!(resp.result.is_none());
        let err = resp.error.unwrap();
        assert_eq!(err.code, 3);
        assert_eq!(err.describe(), "execution reverted (0x08c379a0)");
    }
}
