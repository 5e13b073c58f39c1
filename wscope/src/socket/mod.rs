//! Socket
//!
//! One WebSocket connection at a time, run by a worker thread. The worker
//! turns everything that happens on the connection into `FrameEvent`s,
//! batches them with an `EventBuffer` and hands them to the host on the
//! delivery channel returned by `Client::new`, interleaved with `Status`
//! updates the host's controls react to.

pub mod buffer;
pub mod close_codes;
mod connection;

pub use buffer::EventBuffer;

use crate::event::{FrameEvent, Payload};
use crate::format::FormatOptions;
use crate::settings::Settings;

use connection::{Command, Connection};

use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(v: u8) -> ReadyState {
        match v {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Ready state shared between a `Client` and the worker of its socket.
#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new() -> SharedState {
        SharedState(Arc::new(AtomicU8::new(ReadyState::Connecting as u8)))
    }

    pub(crate) fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ReadyState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Connection status updates, delivered alongside the frame events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Open { url: String, time: i64 },
    Closed { code: u16, reason: String },
    Error { error: String },
    SendSuccess { id: u64, time: i64 },
    SendError { id: u64, error: String, time: i64 },
}

#[derive(Debug, Clone)]
pub enum Delivery {
    Frames(Vec<FrameEvent>),
    Status(Status),
}

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("Cannot open socket, a socket is already open")]
    AlreadyOpen,
    #[error("Cannot close socket, no socket is open")]
    NotOpen,
    #[error("invalid socket url {0}")]
    InvalidUrl(String),
    #[error("failed to start socket worker: {0}")]
    Spawn(#[from] io::Error),
    #[error("socket worker is gone")]
    Disconnected,
}

/// Options a socket is opened with; taken from the settings at open time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SocketOptions {
    pub high_detail: bool,
    pub format: FormatOptions,
    pub max_buffer_size: usize,
    pub max_buffer_wait: Duration,
    pub close_timeout: Duration,
}

struct ActiveSocket {
    url: String,
    commands: channel::Sender<Command>,
    state: SharedState,
    worker: thread::JoinHandle<()>,
}

pub struct Client {
    options: SocketOptions,
    deliveries: channel::Sender<Delivery>,
    active: Option<ActiveSocket>,
    /// Sockets closed by the client whose worker may still be running.
    closing: Vec<ActiveSocket>,
}

impl Client {
    pub fn new(settings: &Settings) -> (Client, channel::Receiver<Delivery>) {
        let (tx, rx) = channel::unbounded();
        let client = Client {
            options: SocketOptions {
                high_detail: settings.high_detail,
                format: settings.format_options(),
                max_buffer_size: settings.socket_max_buffer_size,
                max_buffer_wait: settings.socket_buffer_wait(),
                close_timeout: settings.socket_close_timeout(),
            },
            deliveries: tx,
            active: None,
            closing: Vec::new(),
        };
        (client, rx)
    }

    /// Takes effect for the next socket opened.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.options.high_detail = settings.high_detail;
        self.options.format = settings.format_options();
        self.options.max_buffer_size = settings.socket_max_buffer_size;
        self.options.max_buffer_wait = settings.socket_buffer_wait();
        self.options.close_timeout = settings.socket_close_timeout();
    }

    pub fn set_high_detail(&mut self, high_detail: bool) {
        self.options.high_detail = high_detail;
    }

    /// State of the active socket. Without one, a socket the client closed
    /// reports at least `Closing` until its worker is done.
    pub fn ready_state(&self) -> ReadyState {
        match (&self.active, self.closing.last()) {
            (Some(socket), _) => socket.state.get(),
            (None, Some(socket)) => socket.state.get().max(ReadyState::Closing),
            (None, None) => ReadyState::Closed,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.url.as_str())
    }

    pub fn open(&mut self, url: &str) -> Result<(), SocketError> {
        self.reap();
        if let Some(socket) = &self.active {
            if socket.state.get() != ReadyState::Closed {
                return Err(SocketError::AlreadyOpen);
            }
        }
        validate_url(url)?;
        self.closing.extend(self.active.take());

        info!("Attempting to open socket url={}", url);
        let (cmd_tx, cmd_rx) = channel::unbounded();
        let state = SharedState::new();
        let connection = Connection::new(
            url.to_string(),
            self.options,
            state.clone(),
            cmd_rx,
            self.deliveries.clone(),
        );
        let worker = thread::Builder::new()
            .name(format!("socket {}", url))
            .spawn(move || connection.run())?;
        self.active = Some(ActiveSocket {
            url: url.to_string(),
            commands: cmd_tx,
            state,
            worker,
        });
        Ok(())
    }

    /// Starts the closing handshake. The socket stops being the active one
    /// right away; its worker reports `Status::Closed` when done.
    pub fn close(&mut self, code: u16, reason: &str) -> Result<(), SocketError> {
        let socket = match self.active.take() {
            Some(socket) if socket.state.get() < ReadyState::Closing => socket,
            other => {
                self.active = other;
                return Err(SocketError::NotOpen);
            }
        };
        info!("Attempting to close socket code={} reason={}", code, reason);
        let sent = socket.commands.send(Command::Close {
            code,
            reason: reason.to_string(),
        });
        self.closing.push(socket);
        sent.map_err(|_| SocketError::Disconnected)
    }

    /// Queues a message. Write failures arrive later as
    /// `Status::SendError` for the same `id`.
    pub fn send(&mut self, id: u64, message: impl Into<Payload>) -> Result<(), SocketError> {
        let socket = match &self.active {
            Some(socket) if socket.state.get() == ReadyState::Open => socket,
            _ => return Err(SocketError::NotOpen),
        };
        socket
            .commands
            .send(Command::Send {
                id,
                payload: message.into(),
            })
            .map_err(|_| SocketError::Disconnected)
    }

    /// Closes the active socket with `GOING_AWAY` and waits a little for
    /// the workers to finish their closing handshakes.
    pub fn shutdown(&mut self) {
        let closable = self
            .active
            .as_ref()
            .is_some_and(|s| s.state.get() < ReadyState::Closing);
        if closable {
            if let Err(e) = self.close(close_codes::GOING_AWAY, "Client app shutting down") {
                warn!("shutdown close failed: {}", e);
            }
        }
        self.closing.extend(self.active.take());

        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline && self.closing.iter().any(|s| !s.worker.is_finished()) {
            thread::sleep(Duration::from_millis(5));
        }
        self.reap();
        if !self.closing.is_empty() {
            warn!(
                remaining = self.closing.len(),
                "socket workers still running at shutdown"
            );
        }
    }

    fn reap(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.closing)
            .into_iter()
            .partition(|s| s.worker.is_finished());
        self.closing = running;
        for socket in done {
            if socket.worker.join().is_err() {
                warn!("socket worker for {} panicked", socket.url);
            }
        }
    }
}

fn validate_url(url: &str) -> Result<(), SocketError> {
    let parsed =
        url::Url::parse(url).map_err(|e| SocketError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        scheme => Err(SocketError::InvalidUrl(format!(
            "{}: unsupported scheme {}",
            url, scheme
        ))),
    }
}
