// src/transport/tcp.rs

use crate::error::TransportError;
use crate::protocol::frame_codec::FrameCodec;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Callback invoked with one complete inbound frame buffer (length prefix
/// included).
pub type DataSink = Arc<dyn Fn(Bytes) + Send + Sync>;
/// Callback invoked once when the peer side of the stream goes away.
pub type DisconnectSink = Arc<dyn Fn() + Send + Sync>;

struct Sinks {
    data: SyncMutex<Option<DataSink>>,
    disconnect: SyncMutex<Option<DisconnectSink>>,
}

/// TCP byte-stream transport for one peer connection.
///
/// The transport owns stream reassembly: its reader task consumes the frame
/// length prefix and delivers exactly one message-sized buffer per inbound
/// frame, so the layer above never sees a partial or coalesced frame. The
/// buffer handed to the data sink is the full frame, prefix included.
///
/// Clones share the same underlying connection.
#[derive(Clone)]
pub struct TcpTransport {
    endpoint: SocketAddr,
    connected: Arc<AtomicBool>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
    pending_reader: Arc<SyncMutex<Option<OwnedReadHalf>>>,
    reader_task: Arc<SyncMutex<Option<JoinHandle<()>>>>,
    sinks: Arc<Sinks>,
}

impl TcpTransport {
    /// An unconnected transport for the connector role; drive it with
    /// [`connect`](Self::connect).
    pub fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            connected: Arc::new(AtomicBool::new(false)),
            writer: Arc::new(Mutex::new(None)),
            pending_reader: Arc::new(SyncMutex::new(None)),
            reader_task: Arc::new(SyncMutex::new(None)),
            sinks: Arc::new(Sinks {
                data: SyncMutex::new(None),
                disconnect: SyncMutex::new(None),
            }),
        }
    }

    /// Adopts an already-accepted stream (acceptor role). The reader stays
    /// parked until [`start_reading`](Self::start_reading) so the owner can
    /// install sinks without racing the first inbound frame.
    pub fn from_accepted(stream: TcpStream, peer: SocketAddr) -> Self {
        let transport = Self::new(peer);
        transport.adopt(stream);
        transport
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connects to the configured endpoint, bounded by `timeout`. On success
    /// the reader task starts immediately.
    pub async fn connect(&self, timeout: Duration) -> Result<(), TransportError> {
        if self.is_connected() {
            return Err(TransportError::AlreadyConnected { addr: self.endpoint });
        }
        let stream = tokio::time::timeout(timeout, TcpStream::connect(self.endpoint))
            .await
            .map_err(|_| TransportError::ConnectTimeout { addr: self.endpoint, timeout })?
            .map_err(|e| TransportError::Connect { addr: self.endpoint, source: e })?;
        debug!(endpoint = %self.endpoint, "transport connected");
        self.adopt(stream);
        self.start_reading();
        Ok(())
    }

    fn adopt(&self, stream: TcpStream) {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        // The writer mutex cannot be contended before connected flips true.
        if let Ok(mut writer) = self.writer.try_lock() {
            *writer = Some(write_half);
        }
        *self.pending_reader.lock() = Some(read_half);
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Spawns the reader task over the adopted stream. A second call is a
    /// no-op.
    pub fn start_reading(&self) {
        let Some(read_half) = self.pending_reader.lock().take() else {
            return;
        };
        let connected = self.connected.clone();
        let sinks = self.sinks.clone();
        let endpoint = self.endpoint;
        let task = tokio::spawn(async move {
            Self::read_loop(read_half, endpoint, &connected, &sinks).await;
        });
        *self.reader_task.lock() = Some(task);
    }

    async fn read_loop(
        mut read_half: OwnedReadHalf,
        endpoint: SocketAddr,
        connected: &AtomicBool,
        sinks: &Sinks,
    ) {
        loop {
            let length = match read_half.read_u32().await {
                Ok(length) => length as usize,
                Err(e) => {
                    trace!(endpoint = %endpoint, error = %e, "stream ended");
                    break;
                }
            };
            if length == 0 || length > FrameCodec::MAX_FRAME_LENGTH {
                warn!(endpoint = %endpoint, length, "dropping connection over bad frame length");
                break;
            }
            let mut frame = vec![0u8; 4 + length];
            BigEndian::write_u32(&mut frame[..4], length as u32);
            if let Err(e) = read_half.read_exact(&mut frame[4..]).await {
                trace!(endpoint = %endpoint, error = %e, "stream ended mid-frame");
                break;
            }
            let sink = sinks.data.lock().clone();
            match sink {
                Some(sink) => sink(Bytes::from(frame)),
                None => trace!(endpoint = %endpoint, "no data sink installed, frame dropped"),
            }
        }
        let was_connected = connected.swap(false, Ordering::SeqCst);
        if was_connected {
            debug!(endpoint = %endpoint, "transport disconnected by peer");
            let sink = sinks.disconnect.lock().clone();
            if let Some(sink) = sink {
                sink();
            }
        }
    }

    /// Writes `bytes` to the stream. The caller is responsible for framing.
    pub async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;
        writer.write_all(bytes).await?;
        Ok(())
    }

    /// Shuts the connection down. Idempotent; does not fire the disconnect
    /// sink (local teardown is not a peer disconnect).
    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
        self.pending_reader.lock().take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
            debug!(endpoint = %self.endpoint, "transport disconnected");
        }
    }

    pub fn set_data_sink(&self, sink: DataSink) {
        *self.sinks.data.lock() = Some(sink);
    }

    pub fn clear_data_sink(&self) {
        self.sinks.data.lock().take();
    }

    pub fn set_disconnect_sink(&self, sink: DisconnectSink) {
        *self.sinks.disconnect.lock() = Some(sink);
    }

    pub fn clear_disconnect_sink(&self) {
        self.sinks.disconnect.lock().take();
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
