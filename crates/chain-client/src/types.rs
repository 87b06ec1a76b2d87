use serde::Deserialize;

use crate::error::RpcError;

/// A confirmed transaction receipt.
#[derive(Debug, Clone)]
pub struct Receipt {
    /// 0x-prefixed transaction hash.
    pub transaction_hash: String,
    /// `true` when the transaction executed successfully, `false` when it
    /// reverted.
    pub status: bool,
    /// Logs emitted during execution.
    pub logs: Vec<LogEntry>,
}

/// A single log entry from a receipt.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// Receipt as it appears on the wire, before quantity parsing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawReceipt {
    pub transaction_hash: String,
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

impl TryFrom<RawReceipt> for Receipt {
    type Error = RpcError;

    fn try_from(raw: RawReceipt) -> Result<Self, RpcError> {
        let status = match raw.status.as_deref() {
            Some("0x1") => true,
            Some("0x0") => false,
            other => {
                return Err(RpcError::InvalidResponse(format!(
                    "unexpected receipt status {other:?}"
                )))
            }
        };

        Ok(Receipt {
            transaction_hash: raw.transaction_hash,
            status,
            logs: raw
                .logs
                .into_iter()
                .map(|log| LogEntry {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_parses_success_status() {
        let raw: RawReceipt = serde_json::from_str(
            r#"{
                "transactionHash": "0xabc",
                "status": "0x1",
                "logs": [
                    {"address": "0xdead", "topics": ["0x01"], "data": "0x"}
                ]
            }"#,
        )
        .unwrap();

        let receipt = Receipt::try_from(raw).unwrap();
        assert!(receipt.status);
        assert_eq!(receipt.transaction_hash, "0xabc");
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs[0].address, "0xdead");
    }

    #[test]
    fn receipt_parses_revert_status() {
        let raw: RawReceipt = serde_json::from_str(
            r#"{"transactionHash": "0xabc", "status": "0x0", "logs": []}"#,
        )
        .unwrap();

        let receipt = Receipt::try_from(raw).unwrap();
        assert!(!receipt.status);
        assert!(receipt.logs.is_empty());
    }

    #[test]
    fn receipt_rejects_missing_status() {
        // Pre-Byzantium receipts have no status field; the wallet does not
        // support such chains.
        let raw: RawReceipt =
            serde_json::from_str(r#"{"transactionHash": "0xabc", "logs": []}"#).unwrap();
        assert!(Receipt::try_from(raw).is_err());
    }

    #[test]
    fn receipt_tolerates_absent_logs_field() {
        let raw: RawReceipt =
            serde_json::from_str(r#"{"transactionHash": "0xabc", "status": "0x1"}"#)
                .unwrap();
        let receipt = Receipt::try_from(raw).unwrap();
        assert!(receipt.logs.is_empty());
    }
}
