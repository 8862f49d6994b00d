// src/channel/listener.rs

use crate::channel::actor_channel::{ActorChannel, ChannelConfig};
use crate::channel::event_listener::ChannelEventListener;
use crate::error::{ChannelError, ChannelResult, TransportError};
use crate::identity::ActorIdentity;
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives each accepted channel before its handshake completes. The host
/// keeps the channel (or drops it to reject the connection).
#[async_trait]
pub trait ChannelAcceptHandler: Send + Sync {
    async fn on_channel_accepted(&self, channel: ActorChannel);
}

/// Acceptor side of the channel protocol: binds a TCP listener and wraps
/// every accepted connection in an acceptor-role [`ActorChannel`] that waits
/// for the peer's Hello.
pub struct ChannelListener {
    local_actor: ActorIdentity,
    bind_addr: SocketAddr,
    config: ChannelConfig,
    event_listener: Arc<dyn ChannelEventListener>,
    handler: Arc<dyn ChannelAcceptHandler>,
    local_addr: SyncMutex<Option<SocketAddr>>,
    accept_task: SyncMutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ChannelListener {
    pub fn new(
        local_actor: ActorIdentity,
        bind_addr: SocketAddr,
        event_listener: Arc<dyn ChannelEventListener>,
        handler: Arc<dyn ChannelAcceptHandler>,
    ) -> Self {
        Self::with_config(local_actor, bind_addr, event_listener, handler, ChannelConfig::default())
    }

    pub fn with_config(
        local_actor: ActorIdentity,
        bind_addr: SocketAddr,
        event_listener: Arc<dyn ChannelEventListener>,
        handler: Arc<dyn ChannelAcceptHandler>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            local_actor,
            bind_addr,
            config,
            event_listener,
            handler,
            local_addr: SyncMutex::new(None),
            accept_task: SyncMutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// The bound address, available after [`bind`](Self::bind). Useful when
    /// binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Binds the listener and starts accepting in the background.
    pub async fn bind(&self) -> ChannelResult<SocketAddr> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        if self.accept_task.lock().is_some() {
            return Err(ChannelError::InvalidOperation("listener is already bound"));
        }
        let listener = TcpListener::bind(self.bind_addr).await.map_err(TransportError::Io)?;
        let local = listener.local_addr().map_err(TransportError::Io)?;
        *self.local_addr.lock() = Some(local);
        debug!(local = %local, actor = %self.local_actor, "channel listener bound");

        let local_actor = self.local_actor.clone();
        let config = self.config;
        let event_listener = self.event_listener.clone();
        let handler = self.handler.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "inbound connection accepted");
                        let channel = ActorChannel::accepted(
                            local_actor.clone(),
                            stream,
                            peer,
                            event_listener.clone(),
                            config,
                        );
                        if let Err(e) = channel.begin() {
                            warn!(peer = %peer, error = %e, "failed to start accepted channel");
                            continue;
                        }
                        handler.on_channel_accepted(channel).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        });
        *self.accept_task.lock() = Some(task);
        Ok(local)
    }

    /// Stops accepting. Channels already handed out are unaffected.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
        debug!(actor = %self.local_actor, "channel listener closed");
    }
}

impl Drop for ChannelListener {
    fn drop(&mut self) {
        self.close();
    }
}
