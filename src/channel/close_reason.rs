// src/channel/close_reason.rs

use std::fmt;

/// Why a channel went to `Closed`. Carried on the `Disconnected` event and
/// in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The local side called `close()`.
    LocalClose,
    /// The transport connect did not complete within the caller's budget.
    ConnectTimeout,
    /// Handshake timed out, the response was not a valid Welcome/Hello, or
    /// the identity payload was undecodable.
    HandshakeFailure,
    /// No Pong arrived within the keep-alive timeout after a Ping.
    KeepAliveTimeout,
    /// The peer closed the connection.
    PeerDisconnect,
    /// A send or other transport operation failed mid-session.
    TransportError,
    /// An unexpected failure inside the channel's own machinery.
    InternalError,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseReason::LocalClose => "local close",
            CloseReason::ConnectTimeout => "connect timeout",
            CloseReason::HandshakeFailure => "handshake failure",
            CloseReason::KeepAliveTimeout => "keep-alive timeout",
            CloseReason::PeerDisconnect => "peer disconnect",
            CloseReason::TransportError => "transport error",
            CloseReason::InternalError => "internal error",
        };
        write!(f, "{text}")
    }
}
