/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the link failed (DNS, TCP, TLS, or the upgrade handshake).
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Opening the link took longer than the configured timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// The endpoint URL could not be used to open a link.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The link was closed.
    #[error("link closed: {0}")]
    LinkClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Wraps any error as a [`TransportError::ConnectFailed`].
    pub(crate) fn connect<E>(kind: std::io::ErrorKind, err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ConnectFailed(std::io::Error::new(kind, err))
    }
}
