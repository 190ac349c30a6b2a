use halink_protocol::ProtocolError;

/// Broad category of a [`ConnectionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The socket could not be opened, timed out, or went away.
    Connection,
    /// The hub rejected the credential.
    Auth,
    /// A single command failed or timed out; siblings are unaffected.
    Command,
}

/// Errors from a hub connection.
///
/// `Clone` so a single connect outcome can be handed to every caller that
/// waited on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("failed to open websocket: {0}")]
    Socket(String),

    #[error("connection timeout")]
    ConnectTimeout,

    #[error("connection closed during handshake")]
    HandshakeClosed,

    #[error("connection lost")]
    ConnectionLost,

    #[error("disconnected")]
    Disconnected,

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("{message}")]
    CommandFailed {
        code: Option<String>,
        message: String,
    },

    #[error("command timeout")]
    CommandTimeout,

    #[error("outbound queue full ({0} messages waiting)")]
    QueueFull(usize),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),
}

impl ConnectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectionError::Socket(_)
            | ConnectionError::ConnectTimeout
            | ConnectionError::HandshakeClosed
            | ConnectionError::ConnectionLost
            | ConnectionError::Disconnected
            | ConnectionError::Protocol(_) => ErrorKind::Connection,
            ConnectionError::AuthFailed(_) => ErrorKind::Auth,
            ConnectionError::CommandFailed { .. }
            | ConnectionError::CommandTimeout
            | ConnectionError::QueueFull(_)
            | ConnectionError::UnexpectedResponse(_)
            | ConnectionError::InvalidEntityId(_) => ErrorKind::Command,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        ConnectionError::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for ConnectionError {
    fn from(err: serde_json::Error) -> Self {
        ConnectionError::UnexpectedResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(ConnectionError::ConnectTimeout.to_string(), "connection timeout");
        assert_eq!(ConnectionError::ConnectionLost.to_string(), "connection lost");
        assert_eq!(ConnectionError::CommandTimeout.to_string(), "command timeout");
        assert_eq!(
            ConnectionError::AuthFailed("Invalid access token".into()).to_string(),
            "authentication failed: Invalid access token"
        );
        let err = ConnectionError::CommandFailed {
            code: Some("not_found".into()),
            message: "Service not found.".into(),
        };
        assert_eq!(err.to_string(), "Service not found.");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(ConnectionError::ConnectTimeout.kind(), ErrorKind::Connection);
        assert_eq!(ConnectionError::ConnectionLost.kind(), ErrorKind::Connection);
        assert!(ConnectionError::AuthFailed("x".into()).is_auth());
        assert_eq!(ConnectionError::CommandTimeout.kind(), ErrorKind::Command);
        assert_eq!(ConnectionError::QueueFull(3).kind(), ErrorKind::Command);
    }

    #[test]
    fn protocol_errors_convert() {
        let err: ConnectionError = ProtocolError::UnknownType("bogus".into()).into();
        assert_eq!(err, ConnectionError::Protocol("unknown message type: bogus".into()));
    }
}
