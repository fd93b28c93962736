//! One websocket connection attempt.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ─► Resolving ─► Connecting ─► Handshaking ─► Open ─► Closing ─► Ended(Closed)
//!            │             │              │           │
//!            └─────────────┴──────────────┴───────────┴──────────────► Ended(reason)
//! ```
//!
//! [`ConnectionSession::run`] consumes the session, so an attempt can only
//! be run once.  Any error ends the attempt; retrying is the supervisor's
//! job.  Cancelling the token passed to [`ConnectionSession::new`] aborts
//! whatever stage is in progress.
//!
//! # Open stage
//!
//! Once the handshake succeeds, the handshake callback receives the
//! attempt's [`OutboundQueue`].  The stream is then split: a read loop hands
//! each inbound body to the read callback in arrival order, and a write loop
//! drains the queue one message at a time.  The first of (read loop ends,
//! write fails, close requested) ends the open stage.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, USER_AGENT};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::config::SessionOptions;
use crate::infrastructure::outbound_queue::{OutboundMessage, OutboundQueue};

/// Upper bound on waiting for the peer to acknowledge a close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ── State ─────────────────────────────────────────────────────────────────────

/// Stage of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet run.
    Idle,
    /// Resolving the peer's host name.
    Resolving,
    /// Opening the TCP connection.
    Connecting,
    /// Performing the websocket upgrade.
    Handshaking,
    /// Reading and writing messages.
    Open,
    /// Sending the close frame and draining.
    Closing,
    /// The attempt is over.
    Ended(EndKind),
}

impl SessionState {
    /// Returns `true` for [`SessionState::Ended`].
    pub fn is_ended(&self) -> bool {
        matches!(self, SessionState::Ended(_))
    }
}

/// Error-free summary of an [`EndReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndKind {
    /// Closed gracefully at our request.
    Closed,
    /// Cancelled from outside.
    Aborted,
    /// The peer went away.
    PeerClosed,
    /// Any other failure.
    Failed,
}

/// How an attempt ended.
#[derive(Debug)]
pub enum EndReason {
    /// Closed gracefully at our request.
    Closed,
    /// Cancelled through the session's token.
    Aborted,
    /// The peer closed the connection or reset it.
    PeerClosed,
    /// A resolve, connect, handshake, read, write, or close failure.
    Failed(SessionError),
}

impl EndReason {
    /// Returns the error-free summary.
    pub fn kind(&self) -> EndKind {
        match self {
            EndReason::Closed => EndKind::Closed,
            EndReason::Aborted => EndKind::Aborted,
            EndReason::PeerClosed => EndKind::PeerClosed,
            EndReason::Failed(_) => EndKind::Failed,
        }
    }

    /// Maps an error onto an ending, folding benign classes into their own
    /// variants.
    pub fn from_error(error: SessionError) -> Self {
        match error.class() {
            FailureClass::Aborted => {
                debug!("session aborted: {error}");
                EndReason::Aborted
            }
            FailureClass::PeerClosed => {
                debug!("session closed by peer: {error}");
                EndReason::PeerClosed
            }
            FailureClass::Other => EndReason::Failed(error),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Severity class of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The operation was cancelled.  Benign.
    Aborted,
    /// The peer ended the connection.  Benign.
    PeerClosed,
    /// A genuine failure.
    Other,
}

/// Errors that end a connection attempt.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Name resolution failed.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    /// Name resolution returned nothing.
    #[error("no endpoints found for {host}:{port}")]
    NoEndpoints { host: String, port: u16 },
    /// No resolved endpoint accepted a TCP connection.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
    /// The TCP connect phase exceeded its timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// The websocket upgrade failed.
    #[error("handshake failed: {0}")]
    Handshake(#[source] WsError),
    /// The websocket upgrade exceeded its timeout.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
    /// Reading from the open connection failed.
    #[error("read failed: {0}")]
    Read(#[source] WsError),
    /// Writing to the open connection failed.
    #[error("write failed: {0}")]
    Write(#[source] WsError),
    /// The close handshake failed.
    #[error("close failed: {0}")]
    Close(#[source] WsError),
}

impl SessionError {
    /// Stage name used in log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            SessionError::Resolve { .. } | SessionError::NoEndpoints { .. } => "resolve",
            SessionError::Connect(_) | SessionError::ConnectTimeout(_) => "connect",
            SessionError::Handshake(_) | SessionError::HandshakeTimeout(_) => "handshake",
            SessionError::Read(_) => "read",
            SessionError::Write(_) => "write",
            SessionError::Close(_) => "close",
        }
    }

    /// Classifies the error for logging.
    pub fn class(&self) -> FailureClass {
        match self {
            SessionError::Connect(e) => io_class(e),
            SessionError::Handshake(e)
            | SessionError::Read(e)
            | SessionError::Write(e)
            | SessionError::Close(e) => ws_class(e),
            _ => FailureClass::Other,
        }
    }
}

fn ws_class(error: &WsError) -> FailureClass {
    match error {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            FailureClass::PeerClosed
        }
        WsError::Io(e) => io_class(e),
        _ => FailureClass::Other,
    }
}

fn io_class(error: &io::Error) -> FailureClass {
    match error.kind() {
        io::ErrorKind::Interrupted => FailureClass::Aborted,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => FailureClass::PeerClosed,
        _ => FailureClass::Other,
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Observes and controls a running attempt from another task.
#[derive(Clone)]
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    close: CancellationToken,
    queue: Arc<OutboundQueue>,
}

impl SessionHandle {
    /// Current stage.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the attempt is open or has ended.  Returns `true` if it
    /// opened.
    pub async fn opened(&mut self) -> bool {
        matches!(
            self.state
                .wait_for(|s| *s == SessionState::Open || s.is_ended())
                .await
                .map(|s| *s),
            Ok(SessionState::Open)
        )
    }

    /// Waits until the attempt has ended and returns how.
    pub async fn ended(&mut self) -> Option<EndKind> {
        match self.state.wait_for(SessionState::is_ended).await.map(|s| *s) {
            Ok(SessionState::Ended(kind)) => Some(kind),
            _ => None,
        }
    }

    /// Requests a graceful close of an open connection.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Cancels the attempt at whatever stage it is in.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Queues `text` for sending.  Returns `false` once the attempt's queue
    /// is closed.
    pub fn send(&self, text: String) -> bool {
        self.queue.enqueue(text).is_some()
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

type HandshakeCallback = Box<dyn FnOnce(Arc<OutboundQueue>) + Send>;
type ReadCallback = Box<dyn FnMut(String) + Send>;

/// One connection attempt to the peer.
pub struct ConnectionSession {
    options: SessionOptions,
    cancel: CancellationToken,
    close: CancellationToken,
    state: watch::Sender<SessionState>,
    queue: Arc<OutboundQueue>,
    wire: mpsc::UnboundedReceiver<OutboundMessage>,
    on_handshake: Option<HandshakeCallback>,
    on_read: Option<ReadCallback>,
}

impl ConnectionSession {
    /// Creates an idle session.  Cancelling `cancel` aborts it.
    pub fn new(options: SessionOptions, cancel: CancellationToken) -> Self {
        let (queue, wire) = OutboundQueue::new(options.verbose);
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            options,
            cancel,
            close: CancellationToken::new(),
            state,
            queue,
            wire,
            on_handshake: None,
            on_read: None,
        }
    }

    /// Sets the callback invoked once when the handshake succeeds.
    pub fn register_handshake_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(Arc<OutboundQueue>) + Send + 'static,
    {
        self.on_handshake = Some(Box::new(callback));
    }

    /// Sets the callback invoked with each inbound message body.
    pub fn register_read_callback<F>(&mut self, callback: F)
    where
        F: FnMut(String) + Send + 'static,
    {
        self.on_read = Some(Box::new(callback));
    }

    /// Returns a handle for observing and controlling this attempt.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: self.state.subscribe(),
            cancel: self.cancel.clone(),
            close: self.close.clone(),
            queue: Arc::clone(&self.queue),
        }
    }

    /// Current stage.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    /// Runs the attempt against `ws://host:port{target}` until it ends.
    pub async fn run(mut self, host: &str, port: u16, target: &str) -> EndReason {
        let cancel = self.cancel.clone();
        let reason = tokio::select! {
            biased;
            _ = cancel.cancelled() => EndReason::Aborted,
            reason = self.drive(host, port, target) => reason,
        };

        self.queue.close();
        match &reason {
            EndReason::Closed => info!("WebSocket session closed"),
            EndReason::Aborted => info!("WebSocket session aborted"),
            EndReason::PeerClosed => info!("WebSocket session closed by peer"),
            EndReason::Failed(e) => error!("WebSocket {} error: {e}", e.stage()),
        }
        self.set_state(SessionState::Ended(reason.kind()));
        reason
    }

    async fn drive(&mut self, host: &str, port: u16, target: &str) -> EndReason {
        // Resolve
        self.set_state(SessionState::Resolving);
        let endpoints: Vec<SocketAddr> = match lookup_host((host, port)).await {
            Ok(addrs) => addrs.collect(),
            Err(source) => {
                return EndReason::Failed(SessionError::Resolve {
                    host: host.to_string(),
                    port,
                    source,
                })
            }
        };
        if endpoints.is_empty() {
            return EndReason::Failed(SessionError::NoEndpoints {
                host: host.to_string(),
                port,
            });
        }
        for endpoint in &endpoints {
            debug!("resolved {host}:{port} -> {endpoint}");
        }

        // Connect
        self.set_state(SessionState::Connecting);
        let connect_timeout = self.options.connect_timeout;
        let (stream, endpoint) = match timeout(connect_timeout, connect_any(&endpoints)).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => return EndReason::from_error(SessionError::Connect(e)),
            Err(_) => return EndReason::Failed(SessionError::ConnectTimeout(connect_timeout)),
        };

        // Handshake
        self.set_state(SessionState::Handshaking);
        let request = match upgrade_request(endpoint, target, &self.options.user_agent) {
            Ok(request) => request,
            Err(e) => return EndReason::Failed(SessionError::Handshake(e)),
        };
        let handshake_timeout = self.options.handshake_timeout;
        let handshake = tokio_tungstenite::client_async(request, stream);
        let ws = match timeout(handshake_timeout, handshake).await {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => return EndReason::from_error(SessionError::Handshake(e)),
            Err(_) => return EndReason::Failed(SessionError::HandshakeTimeout(handshake_timeout)),
        };
        info!("WebSocket connected to {endpoint}{target}");

        // Open
        self.set_state(SessionState::Open);
        if let Some(callback) = self.on_handshake.take() {
            callback(Arc::clone(&self.queue));
        }

        let (mut sink, mut stream) = ws.split();
        let close = self.close.clone();
        let requested_close = {
            let on_read = &mut self.on_read;
            let wire = &mut self.wire;
            let queue = &self.queue;
            tokio::select! {
                _ = close.cancelled() => None,
                reason = read_loop(&mut stream, on_read) => Some(reason),
                reason = write_loop(&mut sink, wire, queue) => Some(reason),
            }
        };
        if let Some(reason) = requested_close {
            return reason;
        }

        // Close
        self.set_state(SessionState::Closing);
        self.queue.close();
        graceful_close(&mut sink, &mut stream).await
    }
}

// ── Stages ────────────────────────────────────────────────────────────────────

async fn connect_any(endpoints: &[SocketAddr]) -> io::Result<(TcpStream, SocketAddr)> {
    let mut last_error = None;
    for &endpoint in endpoints {
        match TcpStream::connect(endpoint).await {
            Ok(stream) => {
                debug!("TCP connected to {endpoint}");
                return Ok((stream, endpoint));
            }
            Err(e) => {
                debug!("TCP connect to {endpoint} failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no endpoints")))
}

/// Builds the upgrade request.  The URI authority, and so the `Host`
/// header, is the resolved endpoint.
fn upgrade_request(
    endpoint: SocketAddr,
    target: &str,
    user_agent: &str,
) -> Result<Request, WsError> {
    let target = if target.starts_with('/') {
        target.to_string()
    } else {
        format!("/{target}")
    };
    let mut request = format!("ws://{endpoint}{target}").into_client_request()?;
    let agent = HeaderValue::from_str(user_agent).map_err(|e| WsError::HttpFormat(e.into()))?;
    request.headers_mut().insert(USER_AGENT, agent);
    Ok(request)
}

async fn read_loop<S>(stream: &mut S, on_read: &mut Option<ReadCallback>) -> EndReason
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let body = match stream.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Ok(Message::Close(frame))) => {
                debug!("peer sent close frame: {frame:?}");
                continue;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return EndReason::from_error(SessionError::Read(e)),
            None => return EndReason::PeerClosed,
        };
        if let Some(callback) = on_read.as_mut() {
            callback(body);
        }
    }
}

async fn write_loop<K>(
    sink: &mut K,
    wire: &mut mpsc::UnboundedReceiver<OutboundMessage>,
    queue: &OutboundQueue,
) -> EndReason
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(message) = wire.recv().await {
        match sink.send(Message::Text(message.payload)).await {
            Ok(()) => queue.complete_write(true),
            Err(e) => {
                queue.complete_write(false);
                return EndReason::from_error(SessionError::Write(e));
            }
        }
    }
    // The queue owns the sender, so the channel outlives the open stage.
    std::future::pending().await
}

async fn graceful_close<K, S>(sink: &mut K, stream: &mut S) -> EndReason
where
    K: Sink<Message, Error = WsError> + Unpin,
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        return match EndReason::from_error(SessionError::Close(e)) {
            EndReason::PeerClosed => EndReason::Closed,
            other => other,
        };
    }

    let drain = async {
        while let Some(message) = stream.next().await {
            if let Err(e) = message {
                return match EndReason::from_error(SessionError::Close(e)) {
                    EndReason::PeerClosed => EndReason::Closed,
                    other => other,
                };
            }
        }
        EndReason::Closed
    };
    match timeout(CLOSE_TIMEOUT, drain).await {
        Ok(reason) => reason,
        Err(_) => {
            debug!("peer did not acknowledge close within {CLOSE_TIMEOUT:?}");
            EndReason::Closed
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
