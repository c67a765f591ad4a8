//! Gateway error taxonomy.
//!
//! Three recovery paths, decided by the synchronizer:
//! - domain rejections ([`GatewayError::Rejected`]) roll back the optimistic
//!   state and notify the user; never retried,
//! - transport failures are retried once with backoff,
//! - session failures ([`GatewayError::SessionExpired`]) trigger a
//!   transparent session reset and replay.

use thiserror::Error;

/// A business-rule rejection from the order service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionKind {
    /// Requested quantity exceeds available stock.
    InsufficientStock { available: Option<u32> },
    /// Quantity below the minimum the service accepts.
    NegativeQuantity,
    /// Order-wide item limit exceeded.
    OrderLimitExceeded,
    /// The referenced order line does not exist on the active order.
    LineNotFound,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionKind::InsufficientStock {
                available: Some(n),
            } => write!(f, "insufficient stock ({n} available)"),
            RejectionKind::InsufficientStock { available: None } => {
                write!(f, "insufficient stock")
            }
            RejectionKind::NegativeQuantity => write!(f, "quantity must be at least 1"),
            RejectionKind::OrderLimitExceeded => write!(f, "order limit exceeded"),
            RejectionKind::LineNotFound => write!(f, "order line not found"),
        }
    }
}

/// Errors returned by the order gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request was well-formed but violated a business rule.
    #[error("rejected by order service: {message}")]
    Rejected {
        kind: RejectionKind,
        message: String,
    },

    /// Network or TLS failure from the underlying HTTP client, or a non-2xx
    /// HTTP status.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The session token was invalid or expired.
    #[error("session token invalid or expired")]
    SessionExpired,

    /// The response body could not be deserialized into the expected shape.
    #[error("deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The service answered with a GraphQL-level failure outside the
    /// domain-rejection vocabulary.
    #[error("order service protocol error: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Returns `true` for failures worth one retry after backoff: network
    /// level errors (timeout, connection reset) and HTTP 5xx.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            GatewayError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }

    /// Returns `true` if recovery requires a session reset.
    #[must_use]
    pub fn is_session(&self) -> bool {
        matches!(self, GatewayError::SessionExpired)
    }
}
