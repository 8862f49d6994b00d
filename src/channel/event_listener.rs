// src/channel/event_listener.rs

use crate::channel::close_reason::CloseReason;
use crate::identity::ActorIdentity;
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;

/// Consumer-facing channel events.
///
/// Events for one channel are delivered in order on a dedicated dispatch
/// task: `on_connected` first, then zero or more `on_data_received`, then
/// exactly one `on_disconnected` per established session. A handler that
/// blocks stalls delivery for its channel only.
#[async_trait]
pub trait ChannelEventListener: Send + Sync {
    /// The handshake completed; the channel is active and `remote_actor` is
    /// the peer's asserted identity.
    async fn on_connected(&self, endpoint: SocketAddr, remote_actor: ActorIdentity);

    /// The channel closed. `remote_actor` is the last known peer identity,
    /// `None` when the session never handshaked.
    async fn on_disconnected(
        &self,
        endpoint: SocketAddr,
        remote_actor: Option<ActorIdentity>,
        reason: CloseReason,
    );

    /// An application frame arrived. `data` is the entire inbound buffer,
    /// frame header included; parse it with the same codec the channel uses.
    async fn on_data_received(
        &self,
        endpoint: SocketAddr,
        remote_actor: ActorIdentity,
        data: Bytes,
    );
}
