//! Native WebSocket transport.
//!
//! Moves JSON strings between the collaboration session and the relay on a
//! background thread. It knows nothing about the message contents.

use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tungstenite::{Message, connect};
use url::Url;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid WebSocket URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("send failed: transport thread has stopped")]
    SendFailed,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the transport thread.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// A text frame from the server.
    Message(String),
    Error { message: String },
}

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Check that `url` is a `ws://` or `wss://` URL.
pub fn validate_url(url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(TransportError::UnsupportedScheme(other.to_string())),
    }
}

/// WebSocket client for native platforms.
///
/// Uses a background thread for non-blocking operation.
pub struct NativeWebSocket {
    state: ConnectionState,
    events: Vec<TransportEvent>,
    /// Channel to send commands to the WebSocket thread.
    cmd_tx: Option<Sender<WsCommand>>,
    /// Channel to receive events from the WebSocket thread.
    event_rx: Option<Receiver<TransportEvent>>,
    /// Handle to the WebSocket thread.
    _thread: Option<JoinHandle<()>>,
}

impl NativeWebSocket {
    /// Create a new disconnected WebSocket client.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            events: Vec::new(),
            cmd_tx: None,
            event_rx: None,
            _thread: None,
        }
    }

    /// Connect to a WebSocket server.
    pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        if self.cmd_tx.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        let url = validate_url(url)?.to_string();

        self.state = ConnectionState::Connecting;

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<TransportEvent>();

        let handle = thread::spawn(move || run_socket(&url, &cmd_rx, &event_tx));

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);

        Ok(())
    }

    /// Disconnect from the server.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Send a text message.
    pub fn send(&self, msg: &str) -> Result<(), TransportError> {
        let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(WsCommand::Send(msg.to_string()))
            .map_err(|_| TransportError::SendFailed)
    }

    /// Poll for pending events (non-blocking).
    pub fn poll_events(&mut self) -> Vec<TransportEvent> {
        if let Some(ref rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                match &event {
                    TransportEvent::Connected => self.state = ConnectionState::Connected,
                    TransportEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    TransportEvent::Error { .. } => self.state = ConnectionState::Error,
                    TransportEvent::Message(_) => {}
                }
                self.events.push(event);
            }
        }

        // The thread is gone after a disconnect or a failed connect; allow reconnecting.
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Error
        ) {
            self.cmd_tx = None;
        }

        std::mem::take(&mut self.events)
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

type Socket = tungstenite::WebSocket<tungstenite::stream::MaybeTlsStream<std::net::TcpStream>>;

/// How long a read may block before the thread checks for outgoing frames.
const READ_POLL: Duration = Duration::from_millis(50);

/// Why the socket thread stopped.
enum Exit {
    Closed,
    Failed(String),
}

fn run_socket(url: &str, cmd_rx: &Receiver<WsCommand>, event_tx: &Sender<TransportEvent>) {
    log::info!("Connecting to relay at {url}");
    let mut socket = match connect(url) {
        Ok((socket, response)) => {
            log::info!("Relay handshake done ({})", response.status());
            socket
        }
        Err(e) => {
            log::error!("Relay connection failed: {e}");
            let _ = event_tx.send(TransportEvent::Error {
                message: format!("Connection failed: {e}"),
            });
            return;
        }
    };
    let _ = event_tx.send(TransportEvent::Connected);

    match socket.get_mut() {
        tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(READ_POLL));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => log::debug!("Relay stream is not plain TCP; reads block"),
    }

    let exit = loop {
        if let Some(exit) = flush_commands(&mut socket, cmd_rx) {
            break exit;
        }
        if let Some(exit) = read_frame(&mut socket, event_tx) {
            break exit;
        }
    };
    if let Exit::Failed(reason) = exit {
        log::warn!("Relay connection dropped: {reason}");
    }
    let _ = event_tx.send(TransportEvent::Disconnected);
}

/// Write every queued outgoing frame.
fn flush_commands(socket: &mut Socket, cmd_rx: &Receiver<WsCommand>) -> Option<Exit> {
    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(text)) => {
                if let Err(e) = socket.send(Message::text(text)) {
                    return Some(Exit::Failed(e.to_string()));
                }
            }
            Ok(WsCommand::Close) => {
                let _ = socket.close(None);
                return Some(Exit::Closed);
            }
            Err(TryRecvError::Disconnected) => return Some(Exit::Closed),
            Err(TryRecvError::Empty) => return None,
        }
    }
}

/// Read at most one frame, forwarding text to the session.
fn read_frame(socket: &mut Socket, event_tx: &Sender<TransportEvent>) -> Option<Exit> {
    match socket.read() {
        Ok(Message::Text(text)) => {
            log::trace!("Relay frame of {} bytes", text.len());
            event_tx
                .send(TransportEvent::Message(text.to_string()))
                .err()
                .map(|_| Exit::Closed)
        }
        Ok(Message::Close(_)) => Some(Exit::Closed),
        // tungstenite queues the pong itself.
        Ok(_) => None,
        Err(tungstenite::Error::Io(e))
            if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) =>
        {
            None
        }
        Err(e) => Some(Exit::Failed(e.to_string())),
    }
}

impl Default for NativeWebSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeWebSocket {
    fn drop(&mut self) {
        self.disconnect();
    }
}
