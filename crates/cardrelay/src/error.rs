//! Top-level error type for the relay server.

use cardrelay_protocol::ProtocolError;
use cardrelay_transport::TransportError;

/// Errors surfaced by the server and connection handlers.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The transport layer failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Encoding or decoding a message failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The dispatcher task is gone and can no longer accept events.
    #[error("relay dispatcher is not running")]
    DispatcherGone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: RelayError = TransportError::SendFailed(io).into();
        assert!(matches!(err, RelayError::Transport(_)));
    }

    #[test]
    fn test_dispatcher_gone_display() {
        assert_eq!(
            RelayError::DispatcherGone.to_string(),
            "relay dispatcher is not running"
        );
    }
}
