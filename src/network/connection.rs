//! Connection handling
//!
//! Each connection runs a worker on its own thread with a single-threaded
//! tokio runtime. The worker owns the socket and:
//! - Establishes the connection (accept or dial)
//! - Announces the local version before anything else
//! - Decodes inbound frames through the handshake gate into the inbound queue
//! - Writes queued outbound messages one frame at a time
//! - Reports the first failure as a single `Err` event and exits

use bytes::BytesMut;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::handshake::{Gate, Handshake, VersionMismatch};
use super::{NetResult, Transport};
use crate::config::NetworkConfig;
use crate::protocol::{
    CodecError, FailureKind, Frame, FrameDecoder, FrameEncoder, Message, NetFailure,
};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Network error: {0}")]
    Io(#[from] io::Error),

    #[error("Networking crashed: {0}")]
    Codec(#[from] CodecError),

    #[error("Connection closed by the remote player")]
    Closed,

    #[error("{0}")]
    VersionMismatch(#[from] VersionMismatch),

    #[error("Could not connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

impl ConnectionError {
    /// The event reported to the game for this error
    pub fn failure(&self) -> NetFailure {
        let kind = match self {
            ConnectionError::Io(_)
            | ConnectionError::Connect { .. }
            | ConnectionError::ConnectTimeout(_) => FailureKind::Transport,
            ConnectionError::Codec(_) => FailureKind::Malformed,
            ConnectionError::Closed => FailureKind::Closed,
            ConnectionError::VersionMismatch(_) => FailureKind::VersionMismatch,
        };
        NetFailure::new(kind, self.to_string())
    }
}

/// How a worker's I/O loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// The local side asked to stop
    Stopped,
    /// The peer sent a disconnect frame
    RemoteDisconnected,
}

/// Tunables passed to the worker
#[derive(Debug, Clone, Copy)]
struct WorkerSettings {
    io_poll: Duration,
    max_frame_size: usize,
}

impl From<&NetworkConfig> for WorkerSettings {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            // A zero period would make the stop ticker panic
            io_poll: Duration::from_millis(config.io_poll_ms.max(1)),
            max_frame_size: config.max_frame_size,
        }
    }
}

/// The simulation thread's handle to a connection worker
pub struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    inbound: mpsc::UnboundedReceiver<Frame>,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    failed: bool,
}

impl Connection {
    /// Start a worker thread that establishes a stream with `establish`
    /// and then services it until stopped or failed.
    ///
    /// `establish` resolves to `Ok(None)` if it was cancelled by the
    /// running flag before a peer appeared.
    pub(crate) fn spawn<F, Fut>(
        name: &str,
        config: &NetworkConfig,
        local_addr: Option<SocketAddr>,
        establish: F,
    ) -> NetResult<Self>
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut + Send + 'static,
        Fut: Future<Output = ConnectionResult<Option<(TcpStream, SocketAddr)>>>,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));
        let settings = WorkerSettings::from(config);

        let worker_running = running.clone();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("Failed to start network runtime: {}", e);
                        let failure = NetFailure::new(
                            FailureKind::Transport,
                            format!("Could not start networking: {}", e),
                        );
                        let _ = inbound_tx.send(Frame::Message(Message::Err(failure)));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let established = establish(worker_running.clone()).await;
                    let (stream, remote) = match established {
                        Ok(Some(pair)) => pair,
                        Ok(None) => {
                            tracing::debug!("Connection cancelled before a peer connected");
                            return;
                        }
                        Err(e) => {
                            tracing::error!("Connection failed: {}", e);
                            let _ = inbound_tx.send(Frame::Message(Message::Err(e.failure())));
                            return;
                        }
                    };

                    let mut worker = Worker::new(
                        stream,
                        remote,
                        settings,
                        inbound_tx,
                        outbound_rx,
                        worker_running,
                    );
                    worker.run().await;
                });
            })?;

        Ok(Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
            running,
            worker: Some(worker),
            local_addr,
            failed: false,
        })
    }

    /// Address the connection is listening on, for hosts
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Whether the worker is still meant to be running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(&mut self) {
        self.close();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Network worker panicked");
            }
        }
    }
}

impl Transport for Connection {
    fn send(&self, message: Message) {
        if self.outbound.send(message).is_err() {
            tracing::debug!("Dropping outbound message; network worker has exited");
        }
    }

    fn try_receive(&mut self) -> Option<Frame> {
        if self.failed {
            return None;
        }
        let frame = self.inbound.try_recv().ok()?;
        if matches!(frame, Frame::Message(Message::Err(_))) {
            self.failed = true;
            self.running.store(false, Ordering::SeqCst);
        }
        Some(frame)
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Owns an established stream on the worker thread
struct Worker {
    stream: TcpStream,
    remote: SocketAddr,
    encoder: FrameEncoder,
    decoder: FrameDecoder,
    handshake: Handshake,
    read_buf: BytesMut,
    write_buf: BytesMut,
    inbound: mpsc::UnboundedSender<Frame>,
    outbound: mpsc::UnboundedReceiver<Message>,
    running: Arc<AtomicBool>,
    io_poll: Duration,
}

impl Worker {
    fn new(
        stream: TcpStream,
        remote: SocketAddr,
        settings: WorkerSettings,
        inbound: mpsc::UnboundedSender<Frame>,
        outbound: mpsc::UnboundedReceiver<Message>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            stream,
            remote,
            encoder: FrameEncoder::with_max_frame_size(settings.max_frame_size),
            decoder: FrameDecoder::with_max_frame_size(settings.max_frame_size),
            handshake: Handshake::default(),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
            inbound,
            outbound,
            running,
            io_poll: settings.io_poll,
        }
    }

    async fn run(&mut self) {
        tracing::info!("Connected to {}", self.remote);
        self.deliver(Message::Connect {
            remote: self.remote,
        });

        match self.service().await {
            Ok(Exit::Stopped) => {
                tracing::info!("Closing connection to {}", self.remote);
                if let Err(e) = self.flush_and_disconnect().await {
                    tracing::debug!("Could not send disconnect: {}", e);
                }
            }
            Ok(Exit::RemoteDisconnected) => {
                tracing::info!("{} disconnected", self.remote);
            }
            Err(e) => {
                tracing::error!("Connection to {} failed: {}", self.remote, e);
                self.deliver(Message::Err(e.failure()));
            }
        }

        self.running.store(false, Ordering::SeqCst);
        let _ = self.stream.shutdown().await;
    }

    async fn service(&mut self) -> ConnectionResult<Exit> {
        self.stream.set_nodelay(true)?;

        let announcement = self.handshake.announcement();
        self.write_message(&announcement).await?;

        let mut ticker = tokio::time::interval(self.io_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Ok(Exit::Stopped);
            }

            self.read_buf.reserve(4096);
            tokio::select! {
                result = self.stream.read_buf(&mut self.read_buf) => {
                    if result? == 0 {
                        return Err(ConnectionError::Closed);
                    }
                    if let Some(exit) = self.process_frames()? {
                        return Ok(exit);
                    }
                }
                Some(message) = self.outbound.recv() => {
                    self.write_message(&message).await?;
                }
                _ = ticker.tick() => {}
            }
        }
    }

    /// Decode every complete frame in the read buffer
    fn process_frames(&mut self) -> ConnectionResult<Option<Exit>> {
        while let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
            match self.handshake.admit(frame) {
                Gate::Established => {
                    tracing::info!("Handshake complete with {}", self.remote);
                }
                Gate::Rejected(mismatch) => return Err(mismatch.into()),
                Gate::Deliver(Frame::Message(Message::Disconnect)) => {
                    self.deliver(Message::Disconnect);
                    return Ok(Some(Exit::RemoteDisconnected));
                }
                Gate::Deliver(Frame::Message(Message::Connect { .. } | Message::Err(_))) => {
                    tracing::warn!("Ignoring local-only event sent by {}", self.remote);
                }
                Gate::Deliver(frame) => {
                    let _ = self.inbound.send(frame);
                }
            }
        }
        Ok(None)
    }

    /// Write whatever the game queued before stopping, then say goodbye
    async fn flush_and_disconnect(&mut self) -> ConnectionResult<()> {
        while let Ok(message) = self.outbound.try_recv() {
            self.write_message(&message).await?;
        }
        self.write_message(&Message::Disconnect).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn write_message(&mut self, message: &Message) -> ConnectionResult<()> {
        self.write_buf.clear();
        self.encoder.encode(message, &mut self.write_buf)?;
        self.stream.write_all(&self.write_buf).await?;
        Ok(())
    }

    fn deliver(&self, message: Message) {
        let _ = self.inbound.send(Frame::Message(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{connect, listen};
    use crate::protocol::PROTOCOL_VERSION;
    use tokio::net::TcpListener;

    async fn read_frame(peer: &mut TcpStream, decoder: &mut FrameDecoder, buf: &mut BytesMut) -> Frame {
        loop {
            if let Some(frame) = decoder.decode(buf).unwrap() {
                return frame;
            }
            let n = tokio::time::timeout(Duration::from_secs(5), peer.read_buf(buf))
                .await
                .unwrap()
                .unwrap();
            assert!(n > 0, "peer closed early");
        }
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = NetworkConfig {
            io_poll_ms: 0,
            ..Default::default()
        };
        assert_eq!(WorkerSettings::from(&config).io_poll, Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_listener_survives_zero_poll_interval() {
        let config = NetworkConfig {
            port: 0,
            bind_address: "127.0.0.1".to_string(),
            io_poll_ms: 0,
            ..Default::default()
        };
        let mut conn = listen(&config).unwrap();
        let port = conn.local_addr().unwrap().port();
        let mut peer = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();
        assert!(matches!(
            read_frame(&mut peer, &mut decoder, &mut buf).await,
            Frame::Message(Message::Version { .. })
        ));
        assert!(conn.is_running());

        conn.shutdown();
        assert_eq!(
            read_frame(&mut peer, &mut decoder, &mut buf).await,
            Frame::Message(Message::Disconnect)
        );
    }

    #[tokio::test]
    async fn test_version_first_and_flush_on_stop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut conn = connect("127.0.0.1", port, &NetworkConfig::default()).unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();

        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();
        match read_frame(&mut peer, &mut decoder, &mut buf).await {
            Frame::Message(Message::Version { version, .. }) => assert_eq!(version, PROTOCOL_VERSION),
            other => panic!("expected VERSION first, got {:?}", other),
        }

        // Queued right before stopping; must still go out ahead of DISCONNECT
        conn.send(Message::Start);
        conn.shutdown();
        assert!(!conn.is_running());

        assert_eq!(read_frame(&mut peer, &mut decoder, &mut buf).await, Frame::Message(Message::Start));
        assert_eq!(
            read_frame(&mut peer, &mut decoder, &mut buf).await,
            Frame::Message(Message::Disconnect)
        );
    }
}
