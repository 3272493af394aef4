use thiserror::Error;

/// Errors from the chain RPC layer (HTTP request/response or WS pubsub).
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid RPC endpoint: {0}")]
    Endpoint(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("subscription error: {0}")]
    Subscribe(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl RpcError {
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }

    /// Upstream nodes signal throttling as HTTP 429 or an explicit
    /// "rate limit" JSON-RPC error; both surface here as message text.
    pub fn is_rate_limited(&self) -> bool {
        let msg = match self {
            Self::Transport(m) | Self::Subscribe(m) => m,
            _ => return false,
        };
        msg.contains("429") || msg.to_lowercase().contains("rate limit")
    }
}

/// Errors from the deposit store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("row decode error: {0}")]
    Decode(String),
}

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        assert!(RpcError::Transport("HTTP status 429".into()).is_rate_limited());
        assert!(RpcError::Transport("Rate Limit exceeded".into()).is_rate_limited());
        assert!(!RpcError::Transport("connection refused".into()).is_rate_limited());
        assert!(!RpcError::Decode("bad topics".into()).is_rate_limited());
    }
}
