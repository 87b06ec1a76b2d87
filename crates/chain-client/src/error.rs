use thiserror::Error;

/// Errors from the node RPC surface.
///
/// Transport failures (connection refused, timeouts) are distinct from
/// errors the node itself reports; the pipeline classifies both as network
/// failures, but revert data only ever arrives on the node side.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("node error (code {code}): {message}")]
    Node {
        code: i64,
        message: String,
        /// Raw revert/error payload from the node's `error.data` field,
        /// when present.
        data: Option<Vec<u8>>,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
}

impl RpcError {
    /// The node-supplied error payload, if any (used for revert reasons).
    pub fn revert_data(&self) -> Option<&[u8]> {
        match self {
            RpcError::Node { data, .. } => data.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_node_error() {
        let err = RpcError::Node {
            code: 3,
            message: "execution reverted".into(),
            data: None,
        };
        assert_eq!(err.to_string(), "node error (code 3): execution reverted");
    }

    #[test]
    fn revert_data_only_on_node_errors() {
        let err = RpcError::Node {
            code: 3,
            message: "execution reverted".into(),
            data: Some(vec![0x08, 0xc3, 0x79, 0xa0]),
        };
        assert_eq!(err.revert_data(), Some(&[0x08, 0xc3, 0x79, 0xa0][..]));

        let err = RpcError::InvalidResponse("missing result".into());
        assert!(err.revert_data().is_none());
    }
}
