// src/error.rs

use crate::utils::error::BinaryDataError;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Failures of the TCP transport underneath a channel.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },

    #[error("failed to connect to {addr}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("transport is already connected to {addr}")]
    AlreadyConnected { addr: SocketAddr },

    #[error("transport is not connected")]
    NotConnected,

    #[error("socket i/o failed")]
    Io(#[from] std::io::Error),
}

/// Failures surfaced by [`ActorChannel`](crate::channel::ActorChannel)
/// operations. Asynchronous failures (timers, transport callbacks) are not
/// represented here; those convert to a close and reach the consumer as a
/// `Disconnected` event.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Send precondition: no handshaked remote actor.
    #[error("channel has no handshaked remote actor")]
    NotConnected,

    /// Send precondition: the requested destination does not match the peer.
    #[error("send addressed to \"{requested}\" but the remote actor is \"{actual}\"")]
    AddressMismatch { requested: String, actual: String },

    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The channel has been closed; a closed channel cannot be reopened.
    #[error("channel is closed")]
    Closed,

    #[error("operation not valid for this channel role: {0}")]
    InvalidOperation(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("codec failure")]
    Codec(#[from] BinaryDataError),
}

pub type ChannelResult<T> = std::result::Result<T, ChannelError>;
