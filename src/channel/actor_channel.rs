// src/channel/actor_channel.rs

use crate::channel::close_reason::CloseReason;
use crate::channel::event_listener::ChannelEventListener;
use crate::channel::keepalive::KeepAliveTracker;
use crate::error::{ChannelError, ChannelResult, TransportError};
use crate::identity::ActorIdentity;
use crate::protocol::frame::Frame;
use crate::protocol::frame_codec::FrameCodec;
use crate::protocol::identity_codec::IdentityCodec;
use crate::protocol::opcode::OpCode;
use crate::transport::tcp::TcpTransport;
use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, trace, warn};

/// Tunable timers for one channel. The handshake bound is not tunable; see
/// [`ActorChannel::HANDSHAKE_TIMEOUT`].
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    /// Period of the keep-alive ticker.
    pub keepalive_interval: Duration,
    /// Ping-to-Pong deadline; missing it closes the channel.
    pub keepalive_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            keepalive_timeout: Duration::from_secs(10),
        }
    }
}

/// Which side of the handshake this channel plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Dials out, sends Hello, waits for Welcome.
    Connector,
    /// Adopted an accepted stream, waits for Hello, replies Welcome.
    Acceptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    New = 0,
    Connecting = 1,
    Handshaking = 2,
    Active = 3,
    Closed = 4,
}

impl ChannelState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ChannelState::New,
            1 => ChannelState::Connecting,
            2 => ChannelState::Handshaking,
            3 => ChannelState::Active,
            _ => ChannelState::Closed,
        }
    }
}

/// The handshake outcome pair. Written only by the handshake path and by
/// close; send paths and the keep-alive loop read both fields under the one
/// lock so they always observe a consistent snapshot.
#[derive(Default)]
struct Session {
    remote_actor: Option<ActorIdentity>,
    handshaked: bool,
}

/// Consumer events funneled through one ordered queue per session.
enum ChannelEvent {
    Connected(ActorIdentity),
    Data(ActorIdentity, Bytes),
    Disconnected(Option<ActorIdentity>, CloseReason),
}

/// A peer-to-peer actor messaging channel over one TCP connection.
///
/// The channel frames its own control traffic (Hello/Welcome handshake,
/// Ping/Pong keep-alive) and passes application frames through untouched,
/// in both directions. Outbound sends are checked against the handshaked
/// remote identity before any bytes reach the transport.
///
/// Clones share one underlying session. A closed channel is finished;
/// construct a new one to retry.
#[derive(Clone)]
pub struct ActorChannel {
    role: ChannelRole,
    local_actor: ActorIdentity,
    endpoint: SocketAddr,
    config: ChannelConfig,
    transport: Arc<TcpTransport>,
    frame_codec: Arc<FrameCodec>,
    identity_codec: Arc<IdentityCodec>,
    listener: Arc<dyn ChannelEventListener>,
    tracker: Arc<KeepAliveTracker>,
    session: Arc<SyncMutex<Session>>,
    events: Arc<SyncMutex<Option<mpsc::UnboundedSender<ChannelEvent>>>>,
    state: Arc<AtomicU8>,
    closed: Arc<AtomicBool>,
    keepalive_gate: Arc<Mutex<()>>,
    keepalive_task: Arc<SyncMutex<Option<JoinHandle<()>>>>,
    keepalive_timeout_task: Arc<SyncMutex<Option<JoinHandle<()>>>>,
}

impl ActorChannel {
    /// Bound on both handshake directions: the connector's wait for Welcome
    /// and the acceptor's wait for Hello.
    pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
    /// Connect budget used by [`open`](Self::open).
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn connector(
        local_actor: ActorIdentity,
        endpoint: SocketAddr,
        listener: Arc<dyn ChannelEventListener>,
    ) -> Self {
        Self::connector_with_config(local_actor, endpoint, listener, ChannelConfig::default())
    }

    pub fn connector_with_config(
        local_actor: ActorIdentity,
        endpoint: SocketAddr,
        listener: Arc<dyn ChannelEventListener>,
        config: ChannelConfig,
    ) -> Self {
        let transport = Arc::new(TcpTransport::new(endpoint));
        Self::build(ChannelRole::Connector, local_actor, endpoint, transport, listener, config)
    }

    /// Wraps an accepted stream in an acceptor-role channel. Call
    /// [`begin`](Self::begin) to start its handshake wait.
    pub fn accepted(
        local_actor: ActorIdentity,
        stream: TcpStream,
        peer: SocketAddr,
        listener: Arc<dyn ChannelEventListener>,
        config: ChannelConfig,
    ) -> Self {
        let transport = Arc::new(TcpTransport::from_accepted(stream, peer));
        Self::build(ChannelRole::Acceptor, local_actor, peer, transport, listener, config)
    }

    fn build(
        role: ChannelRole,
        local_actor: ActorIdentity,
        endpoint: SocketAddr,
        transport: Arc<TcpTransport>,
        listener: Arc<dyn ChannelEventListener>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            role,
            local_actor,
            endpoint,
            config,
            transport,
            frame_codec: Arc::new(FrameCodec::new()),
            identity_codec: Arc::new(IdentityCodec::new()),
            listener,
            tracker: Arc::new(KeepAliveTracker::new(config.keepalive_interval)),
            session: Arc::new(SyncMutex::new(Session::default())),
            events: Arc::new(SyncMutex::new(None)),
            state: Arc::new(AtomicU8::new(ChannelState::New as u8)),
            closed: Arc::new(AtomicBool::new(false)),
            keepalive_gate: Arc::new(Mutex::new(())),
            keepalive_task: Arc::new(SyncMutex::new(None)),
            keepalive_timeout_task: Arc::new(SyncMutex::new(None)),
        }
    }

    // --- Properties ---

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    pub fn local_actor(&self) -> &ActorIdentity {
        &self.local_actor
    }

    /// The remote endpoint: the dialed address for a connector, the peer
    /// address for an acceptor.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.config.keepalive_interval
    }

    pub fn keepalive_timeout(&self) -> Duration {
        self.config.keepalive_timeout
    }

    pub fn state(&self) -> ChannelState {
        if self.closed.load(Ordering::SeqCst) {
            return ChannelState::Closed;
        }
        ChannelState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_handshaked(&self) -> bool {
        self.session.lock().handshaked
    }

    /// Transport-connected and handshaked.
    pub fn active(&self) -> bool {
        self.transport.is_connected() && self.is_handshaked()
    }

    /// The peer's asserted identity, `None` before handshake and after close.
    pub fn remote_actor(&self) -> Option<ActorIdentity> {
        self.session.lock().remote_actor.clone()
    }

    fn set_state(&self, state: ChannelState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    // --- Lifecycle ---

    /// Opens the channel with the default connect budget. See
    /// [`open_with_timeout`](Self::open_with_timeout).
    pub async fn open(&self) -> ChannelResult<()> {
        self.open_with_timeout(Self::DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connects the transport and schedules the handshake. Returns as soon
    /// as the transport is up; readiness is observed through the
    /// `Connected` event, not through this method. A connect timeout is
    /// logged and closes the channel without surfacing an error; any other
    /// connect failure is returned to the caller.
    pub async fn open_with_timeout(&self, timeout: Duration) -> ChannelResult<()> {
        self.claim_open()?;
        match self.transport.connect(timeout).await {
            Ok(()) => {
                self.begin_handshaking();
                let channel = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = channel.run_connector_handshake().await {
                        warn!(endpoint = %channel.endpoint, error = %e, "handshake failed");
                        channel.close_with_reason(CloseReason::HandshakeFailure).await;
                    }
                });
                Ok(())
            }
            Err(e @ TransportError::ConnectTimeout { .. }) => {
                warn!(endpoint = %self.endpoint, error = %e, "connect timed out");
                self.close_with_reason(CloseReason::ConnectTimeout).await;
                Ok(())
            }
            Err(e) => {
                self.close_with_reason(CloseReason::TransportError).await;
                Err(e.into())
            }
        }
    }

    /// Like [`open_with_timeout`](Self::open_with_timeout) but runs the
    /// handshake inline and blocks until the channel is active or failed.
    /// Every failure, connect timeout included, surfaces as an error.
    pub async fn open_and_wait(&self, timeout: Duration) -> ChannelResult<ActorIdentity> {
        self.claim_open()?;
        match self.transport.connect(timeout).await {
            Ok(()) => {
                self.begin_handshaking();
                match self.run_connector_handshake().await {
                    Ok(remote) => Ok(remote),
                    Err(e) => {
                        warn!(endpoint = %self.endpoint, error = %e, "handshake failed");
                        self.close_with_reason(CloseReason::HandshakeFailure).await;
                        Err(e)
                    }
                }
            }
            Err(e @ TransportError::ConnectTimeout { .. }) => {
                warn!(endpoint = %self.endpoint, error = %e, "connect timed out");
                self.close_with_reason(CloseReason::ConnectTimeout).await;
                Err(e.into())
            }
            Err(e) => {
                self.close_with_reason(CloseReason::TransportError).await;
                Err(e.into())
            }
        }
    }

    /// Starts the acceptor-side handshake wait. Returns immediately; the
    /// outcome arrives as a `Connected` event or a close.
    pub fn begin(&self) -> ChannelResult<()> {
        if self.role != ChannelRole::Acceptor {
            return Err(ChannelError::InvalidOperation(
                "begin() is only valid on an acceptor channel",
            ));
        }
        self.claim_state(ChannelState::New, ChannelState::Handshaking)?;
        self.start_event_pump();
        self.install_disconnect_sink();
        let channel = self.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.run_acceptor_handshake().await {
                warn!(endpoint = %channel.endpoint, error = %e, "handshake failed");
                channel.close_with_reason(CloseReason::HandshakeFailure).await;
            }
        });
        Ok(())
    }

    /// Closes the channel: disposes timers, detaches transport wiring,
    /// disconnects, and emits one `Disconnected` event if a session was
    /// established. Idempotent and callable from any task.
    pub async fn close(&self) {
        self.close_with_reason(CloseReason::LocalClose).await;
    }

    pub(crate) async fn close_with_reason(&self, reason: CloseReason) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_state(ChannelState::Closed);
        debug!(endpoint = %self.endpoint, %reason, "closing channel");
        // Timers go first; they must be released even if transport teardown
        // fails below.
        if let Some(task) = self.keepalive_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.keepalive_timeout_task.lock().take() {
            task.abort();
        }
        self.tracker.stop();
        self.transport.clear_data_sink();
        self.transport.clear_disconnect_sink();
        if self.transport.is_connected() {
            self.transport.disconnect().await;
        }
        let last_remote = self.session.lock().remote_actor.clone();
        self.emit(ChannelEvent::Disconnected(last_remote, reason));
        self.events.lock().take();
        // Cleared only after the event captured the last identity.
        let mut session = self.session.lock();
        session.remote_actor = None;
        session.handshaked = false;
    }

    fn claim_open(&self) -> ChannelResult<()> {
        if self.role != ChannelRole::Connector {
            return Err(ChannelError::InvalidOperation(
                "open() is only valid on a connector channel",
            ));
        }
        self.claim_state(ChannelState::New, ChannelState::Connecting)
    }

    /// Atomically claims a lifecycle transition so concurrent callers cannot
    /// drive the channel twice.
    fn claim_state(&self, from: ChannelState, to: ChannelState) -> ChannelResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|current| match ChannelState::from_u8(current) {
                ChannelState::Closed => ChannelError::Closed,
                _ => ChannelError::InvalidOperation("channel is already open"),
            })?;
        Ok(())
    }

    fn begin_handshaking(&self) {
        self.set_state(ChannelState::Handshaking);
        self.start_event_pump();
        self.install_disconnect_sink();
    }

    fn install_disconnect_sink(&self) {
        let channel = self.clone();
        self.transport.set_disconnect_sink(Arc::new(move || {
            channel.schedule_close(CloseReason::PeerDisconnect);
        }));
    }

    fn schedule_close(&self, reason: CloseReason) {
        let channel = self.clone();
        tokio::spawn(async move {
            channel.close_with_reason(reason).await;
        });
    }

    // --- Handshake ---

    async fn run_connector_handshake(&self) -> ChannelResult<ActorIdentity> {
        let response = self.install_handshake_sink();
        let hello = self.encode_identity_frame(OpCode::Hello)?;
        if let Err(e) = self.transport.send(&hello).await {
            self.transport.clear_data_sink();
            return Err(ChannelError::Handshake(format!("failed to send Hello: {e}")));
        }
        self.tracker.on_data_sent();
        let buffer = self.await_handshake_frame(response, "Welcome").await?;
        let remote = self.decode_handshake_identity(&buffer, OpCode::Welcome)?;
        self.activate(remote.clone())?;
        Ok(remote)
    }

    async fn run_acceptor_handshake(&self) -> ChannelResult<ActorIdentity> {
        let response = self.install_handshake_sink();
        // Sink is in place; only now may the first inbound frame flow.
        self.transport.start_reading();
        let buffer = self.await_handshake_frame(response, "Hello").await?;
        let remote = self.decode_handshake_identity(&buffer, OpCode::Hello)?;
        let welcome = self.encode_identity_frame(OpCode::Welcome)?;
        self.transport
            .send(&welcome)
            .await
            .map_err(|e| ChannelError::Handshake(format!("failed to send Welcome: {e}")))?;
        self.tracker.on_data_sent();
        self.activate(remote.clone())?;
        Ok(remote)
    }

    /// Installs a one-shot sink that captures the first inbound frame. The
    /// steady-state dispatcher must not see handshake traffic, so the
    /// inbound wiring is swapped rather than gated.
    fn install_handshake_sink(&self) -> oneshot::Receiver<Bytes> {
        let (tx, rx) = oneshot::channel();
        let slot = SyncMutex::new(Some(tx));
        self.transport.set_data_sink(Arc::new(move |buffer| {
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(buffer);
            }
        }));
        rx
    }

    async fn await_handshake_frame(
        &self,
        response: oneshot::Receiver<Bytes>,
        expected: &str,
    ) -> ChannelResult<Bytes> {
        let outcome = tokio::time::timeout(Self::HANDSHAKE_TIMEOUT, response).await;
        // The one-shot listener comes off no matter how the wait ended.
        self.transport.clear_data_sink();
        match outcome {
            Err(_) => Err(ChannelError::Handshake(format!("timed out waiting for {expected}"))),
            Ok(Err(_)) => Err(ChannelError::Handshake(format!(
                "connection lost while waiting for {expected}"
            ))),
            Ok(Ok(buffer)) => Ok(buffer),
        }
    }

    fn encode_identity_frame(&self, opcode: OpCode) -> ChannelResult<Vec<u8>> {
        let payload = Bytes::from(self.identity_codec.encode(&self.local_actor)?);
        Ok(self.frame_codec.encode_frame(&Frame::new(opcode, payload))?)
    }

    fn decode_handshake_identity(
        &self,
        buffer: &Bytes,
        expected: OpCode,
    ) -> ChannelResult<ActorIdentity> {
        let header = self
            .frame_codec
            .try_decode_header(buffer)
            .map_err(|e| ChannelError::Handshake(format!("undecodable frame header: {e}")))?;
        if header.opcode != expected {
            return Err(ChannelError::Handshake(format!(
                "expected {expected}, peer sent {}",
                header.opcode
            )));
        }
        let payload = self.frame_codec.decode_payload(buffer, &header);
        let identity = self
            .identity_codec
            .decode(&payload)
            .map_err(|e| ChannelError::Handshake(format!("undecodable identity payload: {e}")))?;
        if identity.is_empty() {
            return Err(ChannelError::Handshake("peer asserted an empty identity".into()));
        }
        Ok(identity)
    }

    /// Handshake success: records the peer, swaps the inbound wiring to the
    /// steady-state dispatcher, and starts the keep-alive machinery.
    fn activate(&self, remote: ActorIdentity) -> ChannelResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        {
            let mut session = self.session.lock();
            session.remote_actor = Some(remote.clone());
            session.handshaked = true;
        }
        let channel = self.clone();
        self.transport.set_data_sink(Arc::new(move |buffer| channel.dispatch_inbound(buffer)));
        self.tracker.start();
        self.spawn_keepalive_loop();
        self.set_state(ChannelState::Active);
        debug!(endpoint = %self.endpoint, remote = %remote, "channel active");
        self.emit(ChannelEvent::Connected(remote));
        Ok(())
    }

    // --- Inbound dispatch ---

    /// Steady-state inbound path, called once per complete frame.
    fn dispatch_inbound(&self, buffer: Bytes) {
        self.tracker.on_data_received();
        match self.frame_codec.try_decode_header(&buffer) {
            Ok(header) => match header.opcode {
                OpCode::Ping => {
                    trace!(endpoint = %self.endpoint, "ping received");
                    let channel = self.clone();
                    tokio::spawn(async move {
                        channel.send_pong().await;
                    });
                }
                OpCode::Pong => {
                    trace!(endpoint = %self.endpoint, "pong received");
                    self.disarm_keepalive_timeout();
                }
                opcode => {
                    if opcode.is_control() {
                        trace!(endpoint = %self.endpoint, %opcode, "control frame outside handshake, passing through");
                    }
                    self.emit_data(buffer);
                }
            },
            // Not a frame this codec understands; the consumer gets it whole.
            Err(_) => self.emit_data(buffer),
        }
    }

    fn emit_data(&self, buffer: Bytes) {
        let remote = self.session.lock().remote_actor.clone();
        let Some(remote) = remote else {
            trace!(endpoint = %self.endpoint, "frame received without a remote actor, dropped");
            return;
        };
        self.emit(ChannelEvent::Data(remote, buffer));
    }

    async fn send_pong(&self) {
        let frame = match self.frame_codec.encode_frame(&Frame::pong()) {
            Ok(frame) => frame,
            Err(e) => {
                error!(endpoint = %self.endpoint, error = %e, "failed to encode pong");
                self.schedule_close(CloseReason::InternalError);
                return;
            }
        };
        match self.transport.send(&frame).await {
            Ok(()) => self.tracker.on_data_sent(),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "failed to send pong");
                self.schedule_close(CloseReason::TransportError);
            }
        }
    }

    // --- Keep-alive ---

    fn spawn_keepalive_loop(&self) {
        let channel = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(channel.config.keepalive_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await; // the first tick completes immediately
            loop {
                ticker.tick().await;
                if channel.closed.load(Ordering::SeqCst) {
                    break;
                }
                channel.on_keepalive().await;
            }
        });
        if let Some(previous) = self.keepalive_task.lock().replace(task) {
            previous.abort();
        }
        // close() may have raced the spawn; make sure nothing survives it
        if self.closed.load(Ordering::SeqCst) {
            if let Some(task) = self.keepalive_task.lock().take() {
                task.abort();
            }
        }
    }

    /// One keep-alive tick. Concurrent ticks collapse: contention on the
    /// gate drops the tick instead of queueing it.
    async fn on_keepalive(&self) {
        let Ok(_gate) = self.keepalive_gate.try_lock() else {
            return;
        };
        if !self.active() {
            return;
        }
        let Some(remote) = self.remote_actor() else {
            return;
        };
        // A channel wired to itself must not ping itself.
        if remote == self.local_actor {
            return;
        }
        if !self.tracker.should_send_keepalive() {
            return;
        }
        let frame = match self.frame_codec.encode_frame(&Frame::ping()) {
            Ok(frame) => frame,
            Err(e) => {
                error!(endpoint = %self.endpoint, error = %e, "failed to encode ping");
                self.schedule_close(CloseReason::InternalError);
                return;
            }
        };
        trace!(endpoint = %self.endpoint, "sending keep-alive ping");
        if let Err(e) = self.transport.send(&frame).await {
            warn!(endpoint = %self.endpoint, error = %e, "keep-alive send failed");
            self.schedule_close(CloseReason::TransportError);
            return;
        }
        self.tracker.on_data_sent();
        self.arm_keepalive_timeout();
        self.tracker.reset();
    }

    /// Arms (or re-arms, resetting the deadline of) the Ping response
    /// timeout. A no-op once the channel is closed.
    fn arm_keepalive_timeout(&self) {
        let channel = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(channel.config.keepalive_timeout).await;
            warn!(
                endpoint = %channel.endpoint,
                timeout = ?channel.config.keepalive_timeout,
                receive_idle_ms = channel.tracker.receive_idle_ms(),
                "no pong within the keep-alive timeout"
            );
            channel.schedule_close(CloseReason::KeepAliveTimeout);
        });
        if let Some(previous) = self.keepalive_timeout_task.lock().replace(task) {
            previous.abort();
        }
        if self.closed.load(Ordering::SeqCst) {
            if let Some(task) = self.keepalive_timeout_task.lock().take() {
                task.abort();
            }
        }
    }

    fn disarm_keepalive_timeout(&self) {
        if let Some(task) = self.keepalive_timeout_task.lock().take() {
            task.abort();
        }
    }

    // --- Outbound sends ---

    /// Sends caller-framed bytes to the named actor instance. Fails with
    /// [`ChannelError::NotConnected`] before handshake and
    /// [`ChannelError::AddressMismatch`] when `(actor_type, actor_name)`
    /// does not match the peer's key.
    pub async fn send(&self, actor_type: &str, actor_name: &str, data: Bytes) -> ChannelResult<()> {
        self.check_destination(actor_type, Some(actor_name))?;
        self.send_raw(data).await
    }

    /// Sends to any instance of `actor_type`; only the type half of the
    /// peer's key is checked.
    pub async fn send_to_type(&self, actor_type: &str, data: Bytes) -> ChannelResult<()> {
        self.check_destination(actor_type, None)?;
        self.send_raw(data).await
    }

    /// Non-blocking [`send`](Self::send). Address preconditions are checked
    /// synchronously; the returned handle resolves to the transfer outcome.
    pub fn begin_send(
        &self,
        actor_type: &str,
        actor_name: &str,
        data: Bytes,
    ) -> ChannelResult<JoinHandle<ChannelResult<()>>> {
        self.check_destination(actor_type, Some(actor_name))?;
        let channel = self.clone();
        Ok(tokio::spawn(async move { channel.send_raw(data).await }))
    }

    /// Non-blocking [`send_to_type`](Self::send_to_type).
    pub fn begin_send_to_type(
        &self,
        actor_type: &str,
        data: Bytes,
    ) -> ChannelResult<JoinHandle<ChannelResult<()>>> {
        self.check_destination(actor_type, None)?;
        let channel = self.clone();
        Ok(tokio::spawn(async move { channel.send_raw(data).await }))
    }

    /// Non-blocking send that reports completion through a callback instead
    /// of the handle.
    pub fn begin_send_with<F>(
        &self,
        actor_type: &str,
        actor_name: &str,
        data: Bytes,
        on_complete: F,
    ) -> ChannelResult<JoinHandle<()>>
    where
        F: FnOnce(ChannelResult<()>) + Send + 'static,
    {
        self.check_destination(actor_type, Some(actor_name))?;
        let channel = self.clone();
        Ok(tokio::spawn(async move {
            on_complete(channel.send_raw(data).await);
        }))
    }

    async fn send_raw(&self, data: Bytes) -> ChannelResult<()> {
        if let Err(e) = self.transport.send(&data).await {
            warn!(endpoint = %self.endpoint, error = %e, "send failed");
            self.schedule_close(CloseReason::TransportError);
            return Err(e.into());
        }
        self.tracker.on_data_sent();
        Ok(())
    }

    fn check_destination(&self, actor_type: &str, actor_name: Option<&str>) -> ChannelResult<()> {
        let session = self.session.lock();
        let Some(remote) = session.remote_actor.as_ref() else {
            return Err(ChannelError::NotConnected);
        };
        match actor_name {
            Some(name) => {
                let requested = ActorIdentity::compose_key(actor_type, name);
                if requested != remote.key() {
                    return Err(ChannelError::AddressMismatch {
                        requested,
                        actual: remote.key(),
                    });
                }
            }
            None => {
                if actor_type != remote.actor_type() {
                    return Err(ChannelError::AddressMismatch {
                        requested: actor_type.to_string(),
                        actual: remote.key(),
                    });
                }
            }
        }
        Ok(())
    }

    // --- Events ---

    /// Spawns the per-session event pump. One queue keeps consumer events in
    /// arrival order; the pump ends after delivering `Disconnected`.
    fn start_event_pump(&self) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(tx);
        let listener = self.listener.clone();
        let endpoint = self.endpoint;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ChannelEvent::Connected(remote) => listener.on_connected(endpoint, remote).await,
                    ChannelEvent::Data(remote, buffer) => {
                        listener.on_data_received(endpoint, remote, buffer).await
                    }
                    ChannelEvent::Disconnected(remote, reason) => {
                        listener.on_disconnected(endpoint, remote, reason).await;
                        break;
                    }
                }
            }
        });
    }

    fn emit(&self, event: ChannelEvent) {
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(event);
        }
    }
}

impl fmt::Debug for ActorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorChannel")
            .field("role", &self.role)
            .field("local_actor", &self.local_actor)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NullListener;

    #[async_trait]
    impl ChannelEventListener for NullListener {
        async fn on_connected(&self, _: SocketAddr, _: ActorIdentity) {}
        async fn on_disconnected(&self, _: SocketAddr, _: Option<ActorIdentity>, _: CloseReason) {}
        async fn on_data_received(&self, _: SocketAddr, _: ActorIdentity, _: Bytes) {}
    }

    fn test_channel() -> ActorChannel {
        ActorChannel::connector(
            ActorIdentity::new("client", "c1"),
            "127.0.0.1:9".parse().unwrap(),
            Arc::new(NullListener),
        )
    }

    fn handshaked_channel(remote: ActorIdentity) -> ActorChannel {
        let channel = test_channel();
        let mut session = channel.session.lock();
        session.remote_actor = Some(remote);
        session.handshaked = true;
        drop(session);
        channel
    }

    #[test]
    fn fresh_channel_is_inactive() {
        let channel = test_channel();
        assert_eq!(channel.state(), ChannelState::New);
        assert!(!channel.active());
        assert!(!channel.is_handshaked());
        assert!(channel.remote_actor().is_none());
    }

    #[test]
    fn send_without_remote_is_not_connected() {
        let channel = test_channel();
        assert!(matches!(
            channel.check_destination("server", Some("s1")),
            Err(ChannelError::NotConnected)
        ));
        assert!(matches!(
            channel.check_destination("server", None),
            Err(ChannelError::NotConnected)
        ));
    }

    #[test]
    fn full_key_must_match_exactly() {
        let channel = handshaked_channel(ActorIdentity::new("server", "s1"));
        assert!(channel.check_destination("server", Some("s1")).is_ok());
        match channel.check_destination("server", Some("s2")) {
            Err(ChannelError::AddressMismatch { requested, actual }) => {
                assert_eq!(requested, "server#s2");
                assert_eq!(actual, "server#s1");
            }
            other => panic!("expected AddressMismatch, got {other:?}"),
        }
    }

    #[test]
    fn type_only_send_accepts_any_instance_name() {
        let channel = handshaked_channel(ActorIdentity::new("server", "s1"));
        assert!(channel.check_destination("server", None).is_ok());
        assert!(matches!(
            channel.check_destination("gateway", None),
            Err(ChannelError::AddressMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_terminal() {
        let channel = test_channel();
        channel.close().await;
        channel.close().await;
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(matches!(channel.open().await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn close_clears_the_session_pair() {
        let channel = handshaked_channel(ActorIdentity::new("server", "s1"));
        channel.close().await;
        assert!(!channel.is_handshaked());
        assert!(channel.remote_actor().is_none());
    }

    #[test]
    fn begin_is_rejected_on_a_connector() {
        let channel = test_channel();
        assert!(matches!(channel.begin(), Err(ChannelError::InvalidOperation(_))));
    }

    #[test]
    fn default_config_matches_protocol_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
        assert_eq!(config.keepalive_timeout, Duration::from_secs(10));
    }
}
