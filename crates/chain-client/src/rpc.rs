use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::RpcError;
use crate::types::{RawReceipt, Receipt};

/// The node operations the wallet consumes.
///
/// The transaction pipeline is generic over this trait so tests can script
/// a chain without a node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Liveness probe. Transport failures are reported as `false`, not as
    /// errors, mirroring how the UI treats an unreachable node.
    async fn is_connected(&self) -> bool;

    /// Native balance of `address` in wei.
    async fn get_balance(&self, address: &str) -> Result<U256, RpcError>;

    /// Current gas price in wei.
    async fn get_gas_price(&self) -> Result<U256, RpcError>;

    /// Next nonce for `address`, including pending transactions.
    async fn get_transaction_count(&self, address: &str) -> Result<u64, RpcError>;

    /// Deployed bytecode at `address`; empty when no contract exists there.
    async fn get_code(&self, address: &str) -> Result<Vec<u8>, RpcError>;

    /// Read-only contract call. Node-side reverts surface as
    /// [`RpcError::Node`] carrying the revert payload.
    async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, RpcError>;

    /// Broadcasts a raw signed transaction, returning its hash.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError>;

    /// Receipt for `hash`, or `None` while the transaction is pending.
    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<Receipt>, RpcError>;
}

#[async_trait]
impl<T: ChainRpc + ?Sized> ChainRpc for std::sync::Arc<T> {
    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }

    async fn get_balance(&self, address: &str) -> Result<U256, RpcError> {
        (**self).get_balance(address).await
    }

    async fn get_gas_price(&self) -> Result<U256, RpcError> {
        (**self).get_gas_price().await
    }

    async fn get_transaction_count(&self, address: &str) -> Result<u64, RpcError> {
        (**self).get_transaction_count(address).await
    }

    async fn get_code(&self, address: &str) -> Result<Vec<u8>, RpcError> {
        (**self).get_code(address).await
    }

    async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        (**self).call(to, data).await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        (**self).send_raw_transaction(raw).await
    }

    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<Receipt>, RpcError> {
        (**self).get_transaction_receipt(hash).await
    }
}

/// JSON-RPC 2.0 client over HTTP.
pub struct HttpChainClient {
    url: Url,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpChainClient {
    pub fn new(endpoint: &str) -> Result<Self, RpcError> {
        let url = Url::parse(endpoint)
            .map_err(|e| RpcError::InvalidUrl(format!("{endpoint}: {e}")))?;

        Ok(Self {
            url,
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Sends one JSON-RPC request and returns the raw `result` value
    /// (`Value::Null` when the node returns a null result).
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "json-rpc request");

        let response = self.http.post(self.url.clone()).json(&body).send().await?;
        let reply: JsonRpcReply = response.json().await?;

        if let Some(err) = reply.error {
            let data = err.data.as_ref().and_then(decode_error_data);
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
                data,
            });
        }

        Ok(reply.result)
    }
}

#[async_trait]
impl ChainRpc for HttpChainClient {
    async fn is_connected(&self) -> bool {
        matches!(
            self.request("net_listening", json!([])).await,
            Ok(Value::Bool(true))
        )
    }

    async fn get_balance(&self, address: &str) -> Result<U256, RpcError> {
        let result = self
            .request("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_quantity(&result)
    }

    async fn get_gas_price(&self) -> Result<U256, RpcError> {
        let result = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity(&result)
    }

    async fn get_transaction_count(&self, address: &str) -> Result<u64, RpcError> {
        let result = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_u64(&result)
    }

    async fn get_code(&self, address: &str) -> Result<Vec<u8>, RpcError> {
        let result = self
            .request("eth_getCode", json!([address, "latest"]))
            .await?;
        parse_bytes(&result)
    }

    async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let call = json!({
            "to": to,
            "data": format!("0x{}", hex::encode(data)),
        });
        let result = self.request("eth_call", json!([call, "latest"])).await?;
        parse_bytes(&result)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        let result = self
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;

        match result {
            Value::String(hash) => Ok(hash),
            other => Err(RpcError::InvalidResponse(format!(
                "expected transaction hash string, got {other}"
            ))),
        }
    }

    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<Receipt>, RpcError> {
        let result = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let raw: RawReceipt = serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("malformed receipt: {e}")))?;
        Ok(Some(raw.try_into()?))
    }
}

#[derive(Deserialize)]
struct JsonRpcReply {
    #[serde(default)]
    result: Value,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    data: Option<Value>,
}

/// Parses a 0x-prefixed hex quantity into a `U256`.
fn parse_quantity(value: &Value) -> Result<U256, RpcError> {
    let text = quantity_str(value)?;
    U256::from_str_radix(text, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("bad quantity {value}: {e}")))
}

/// Parses a 0x-prefixed hex quantity into a `u64` (nonces, block numbers).
fn parse_u64(value: &Value) -> Result<u64, RpcError> {
    let text = quantity_str(value)?;
    u64::from_str_radix(text, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("bad quantity {value}: {e}")))
}

/// Parses 0x-prefixed hex data into raw bytes; `"0x"` is an empty result.
fn parse_bytes(value: &Value) -> Result<Vec<u8>, RpcError> {
    let text = value
        .as_str()
        .and_then(|s| s.strip_prefix("0x"))
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected 0x data, got {value}")))?;
    hex::decode(text).map_err(|e| RpcError::InvalidResponse(format!("bad hex data: {e}")))
}

fn quantity_str(value: &Value) -> Result<&str, RpcError> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix("0x"))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected 0x quantity, got {value}")))
}

/// Extracts revert bytes from a node error's `data` field. Nodes disagree
/// on the exact shape; a bare hex string covers geth and most forks.
fn decode_error_data(data: &Value) -> Option<Vec<u8>> {
    let text = data.as_str()?.strip_prefix("0x")?;
    hex::decode(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_invalid_url() {
        assert!(matches!(
            HttpChainClient::new("not a url"),
            Err(RpcError::InvalidUrl(_))
        ));
    }

    #[test]
    fn new_accepts_http_endpoint() {
        assert!(HttpChainClient::new("http://127.0.0.1:8545").is_ok());
    }

    #[test]
    fn parse_quantity_wei_scale() {
        // 1 ETH in wei, well past u64 precision concerns.
        let value = json!("0xde0b6b3a7640000");
        assert_eq!(
            parse_quantity(&value).unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
    }

    #[test]
    fn parse_quantity_18_decimal_precision_is_exact() {
        // 123.456789012345678901 tokens in base units; a float would
        // silently round the low digits away.
        let value = U256::from_str_radix("123456789012345678901", 10).unwrap();
        let parsed = parse_quantity(&json!(format!("0x{value:x}"))).unwrap();
        assert_eq!(parsed.to_string(), "123456789012345678901");
    }

    #[test]
    fn parse_quantity_rejects_non_hex() {
        assert!(parse_quantity(&json!("123")).is_err());
        assert!(parse_quantity(&json!(123)).is_err());
        assert!(parse_quantity(&json!("0x")).is_err());
    }

    #[test]
    fn parse_u64_nonce() {
        assert_eq!(parse_u64(&json!("0x0")).unwrap(), 0);
        assert_eq!(parse_u64(&json!("0x2a")).unwrap(), 42);
    }

    #[test]
    fn parse_bytes_empty_code() {
        assert!(parse_bytes(&json!("0x")).unwrap().is_empty());
    }

    #[test]
    fn parse_bytes_contract_code() {
        assert_eq!(
            parse_bytes(&json!("0x6080deadbeef")).unwrap(),
            vec![0x60, 0x80, 0xde, 0xad, 0xbe, 0xef]
        );
    }

    #[test]
    fn parse_bytes_rejects_null() {
        assert!(parse_bytes(&Value::Null).is_err());
    }

    #[test]
    fn error_reply_carries_revert_data() {
        let reply: JsonRpcReply = serde_json::from_str(
            r#"{
                "jsonrpc": "2.0",
                "id": 1,
                "error": {
                    "code": 3,
                    "message": "execution reverted",
                    "data": "0x08c379a0"
                }
            }"#,
        )
        .unwrap();

        let err = reply.error.unwrap();
        assert_eq!(err.code, 3);
        assert_eq!(
            decode_error_data(&err.data.unwrap()).unwrap(),
            vec![0x08, 0xc3, 0x79, 0xa0]
        );
    }

    #[test]
    fn error_data_in_unknown_shape_is_dropped() {
        assert!(decode_error_data(&json!({"nested": "0x01"})).is_none());
        assert!(decode_error_data(&json!("not-hex")).is_none());
    }

    #[test]
    fn null_result_deserializes_to_null() {
        let reply: JsonRpcReply =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 1, "result": null}"#).unwrap();
        assert!(reply.result.is_null());
        assert!(reply.error.is_none());
    }
}
