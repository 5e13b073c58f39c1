//! Connection worker
//!
//! Runs one socket on its own thread: opens it, then alternates between
//! draining commands from the client and reading from the socket with a
//! short timeout, until the connection is closed.

use super::buffer::EventBuffer;
use super::close_codes;
use super::{Delivery, ReadyState, SharedState, SocketOptions, Status};
use crate::event::{now_millis, FrameEvent, Payload};

use std::io;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use crossbeam::channel;
use tracing::{debug, info, trace, warn};
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::CloseFrame;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// How long a socket read waits before the worker looks at its commands.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
pub(crate) enum Command {
    Send { id: u64, payload: Payload },
    Close { code: u16, reason: String },
}

pub(crate) struct Connection {
    url: String,
    options: SocketOptions,
    state: SharedState,
    commands: channel::Receiver<Command>,
    deliveries: channel::Sender<Delivery>,
    buffer: EventBuffer,
    /// Code and reason the connection ended with, once known.
    closed_with: Option<(u16, String)>,
    /// When this side started the closing handshake.
    close_started: Option<Instant>,
    hung_up: bool,
}

impl Connection {
    pub(crate) fn new(
        url: String,
        options: SocketOptions,
        state: SharedState,
        commands: channel::Receiver<Command>,
        deliveries: channel::Sender<Delivery>,
    ) -> Connection {
        Connection {
            url,
            buffer: EventBuffer::new(options.max_buffer_size, options.max_buffer_wait),
            options,
            state,
            commands,
            deliveries,
            closed_with: None,
            close_started: None,
            hung_up: false,
        }
    }

    pub(crate) fn run(mut self) {
        match self.connect() {
            Some(mut socket) => {
                self.pump(&mut socket);
            }
            None => {
                self.closed_with = Some((close_codes::ABNORMAL, String::new()));
            }
        }
        self.finish();
    }

    fn connect(&mut self) -> Option<Socket> {
        let (socket, response) = match tungstenite::connect(self.url.as_str()) {
            Ok(ok) => ok,
            Err(tungstenite::Error::Http(response)) => {
                let status = response.status();
                let reason = status.canonical_reason().unwrap_or("");
                info!(
                    "Unexpected response url={} status={}",
                    self.url,
                    status.as_u16()
                );
                if self.options.high_detail {
                    let event = FrameEvent::unexpected_response(&self.url, status.as_u16(), reason);
                    self.emit(event);
                } else {
                    let error = format!("Unexpected server response: {}", status.as_u16());
                    self.error(error);
                }
                return None;
            }
            Err(e) => {
                self.error(e);
                return None;
            }
        };

        if self.options.high_detail {
            debug!("Received socket upgrade response {:?}", response.status());
            self.emit(FrameEvent::socket_upgrade(response.status().as_u16()));
        }
        if let Err(e) = set_read_timeout(&socket, POLL_INTERVAL) {
            warn!("failed to set socket read timeout: {}", e);
        }

        info!("Socket open url={}", self.url);
        self.state.set(ReadyState::Open);
        self.emit(FrameEvent::socket_open(&self.url));
        self.deliver(Delivery::Status(Status::Open {
            url: self.url.clone(),
            time: now_millis(),
        }));
        Some(socket)
    }

    fn pump(&mut self, socket: &mut Socket) {
        loop {
            self.drain_commands(socket);

            match socket.read() {
                Ok(Message::Text(text)) => {
                    let event = FrameEvent::message_in(Payload::Text(text), &self.options.format);
                    self.emit(event);
                }
                Ok(Message::Binary(data)) => {
                    let event = FrameEvent::message_in(Payload::Binary(data), &self.options.format);
                    self.emit(event);
                }
                Ok(Message::Ping(data)) => {
                    if self.options.high_detail {
                        trace!("Received ping");
                        self.emit(FrameEvent::ping(data));
                    }
                }
                Ok(Message::Pong(data)) => {
                    if self.options.high_detail {
                        trace!("Received pong");
                        self.emit(FrameEvent::pong(data));
                    }
                }
                Ok(Message::Close(frame)) => {
                    self.state.set(ReadyState::Closing);
                    self.close_started.get_or_insert_with(Instant::now);
                    self.closed_with = Some(match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (close_codes::NO_STATUS, String::new()),
                    });
                }
                Ok(Message::Frame(_)) => {}
                Err(tungstenite::Error::Io(e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) => {}
                Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => break,
                Err(e) => {
                    self.error(e);
                    self.closed_with = Some((close_codes::ABNORMAL, String::new()));
                    break;
                }
            }

            let now = Instant::now();
            if let Some(batch) = self.buffer.poll(now) {
                self.deliver(Delivery::Frames(batch));
            }
            if self.close_timed_out(now) {
                warn!(
                    "Peer did not finish the closing handshake in {:?} url={}",
                    self.options.close_timeout, self.url
                );
                self.closed_with
                    .get_or_insert_with(|| (close_codes::ABNORMAL, String::new()));
                break;
            }
        }
    }

    fn close_timed_out(&self, now: Instant) -> bool {
        match self.close_started {
            Some(started) => now.duration_since(started) >= self.options.close_timeout,
            None => false,
        }
    }

    fn drain_commands(&mut self, socket: &mut Socket) {
        loop {
            match self.commands.try_recv() {
                Ok(Command::Send { id, payload }) => self.send(socket, id, payload),
                Ok(Command::Close { code, reason }) => self.close(socket, code, reason),
                Err(channel::TryRecvError::Empty) => break,
                Err(channel::TryRecvError::Disconnected) => {
                    // The client is gone; nobody can close this socket anymore.
                    if !self.hung_up {
                        self.hung_up = true;
                        if self.state.get() < ReadyState::Closing {
                            self.close(socket, close_codes::GOING_AWAY, String::new());
                        }
                    }
                    break;
                }
            }
        }
    }

    fn send(&mut self, socket: &mut Socket, id: u64, payload: Payload) {
        self.emit(FrameEvent::message_out(
            id,
            payload.clone(),
            &self.options.format,
        ));
        let message = match payload {
            Payload::Text(text) => Message::Text(text),
            Payload::Binary(data) => Message::Binary(data),
        };
        let status = match socket.send(message) {
            Ok(()) => Status::SendSuccess {
                id,
                time: now_millis(),
            },
            Err(e) => {
                warn!("send of message {} failed: {}", id, e);
                Status::SendError {
                    id,
                    error: e.to_string(),
                    time: now_millis(),
                }
            }
        };
        self.deliver(Delivery::Status(status));
    }

    fn close(&mut self, socket: &mut Socket, code: u16, reason: String) {
        self.state.set(ReadyState::Closing);
        self.close_started.get_or_insert_with(Instant::now);
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        };
        if let Err(e) = socket.close(Some(frame)) {
            debug!("close handshake failed: {}", e);
        }
    }

    fn error(&mut self, error: impl std::fmt::Display) {
        info!("Socket error encountered url={} error={}", self.url, error);
        let event = FrameEvent::socket_error(&self.url, &error);
        self.emit(event);
        self.deliver(Delivery::Status(Status::Error {
            error: error.to_string(),
        }));
    }

    fn finish(&mut self) {
        let (code, reason) = self
            .closed_with
            .take()
            .unwrap_or((close_codes::NO_STATUS, String::new()));
        info!(
            "Socket closed code={} ({}) reason={}",
            code,
            close_codes::describe(code),
            reason
        );
        self.emit(FrameEvent::socket_close(&self.url, code, &reason));
        if let Some(batch) = self.buffer.flush() {
            self.deliver(Delivery::Frames(batch));
        }
        self.state.set(ReadyState::Closed);
        self.deliver(Delivery::Status(Status::Closed { code, reason }));
    }

    fn emit(&mut self, event: FrameEvent) {
        if let Some(batch) = self.buffer.push(event, Instant::now()) {
            self.deliver(Delivery::Frames(batch));
        }
    }

    fn deliver(&self, delivery: Delivery) {
        if self.deliveries.send(delivery).is_err() {
            trace!("delivery dropped, host is gone");
        }
    }
}

fn set_read_timeout(socket: &Socket, timeout: Duration) -> io::Result<()> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(timeout)),
        MaybeTlsStream::Rustls(stream) => stream.get_ref().set_read_timeout(Some(timeout)),
        _ => Ok(()),
    }
}
