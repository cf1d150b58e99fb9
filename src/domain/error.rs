use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// Bad or missing signature, malformed payload. Terminal, never retried.
    #[error("{0}")]
    Auth(String),

    /// Missing required fields; message enumerates them in schema order.
    #[error("{0}")]
    Validation(String),

    /// Unresolvable order/customer/token reference.
    #[error("{0}")]
    NotFound(String),

    /// A capture/cancel/refund precondition failed before any remote call.
    #[error("{0}")]
    StateGuard(String),

    /// The remote processor call itself failed (transport or API error), or
    /// returned a structured decline.
    #[error("{0}")]
    Gateway(String),

    /// The deferred-task scheduler rejected an enqueue.
    #[error("{0}")]
    Dispatch(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
