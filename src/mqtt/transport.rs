//! Publish seam between the streaming session and a concrete broker client

/// Errors raised by a transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid server address: {0}")]
    InvalidServer(String),

    #[error("Failed to connect: {0}")]
    ConnectError(String),

    #[error("Connection attempt timed out after {0}s")]
    ConnectTimeout(u64),

    #[error("Broker rejected connection: {0}")]
    Rejected(String),

    #[error("Failed to publish: {0}")]
    PublishError(String),

    #[error("Not connected")]
    NotConnected,
}

/// Fire-and-forget publisher
///
/// `publish` must not block; a returned error means this one message is lost and
/// nothing more. Connection loss is reported through `is_connected`.
pub trait Transport: Send + 'static {
    fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn close(self)
    where
        Self: Sized;
}
