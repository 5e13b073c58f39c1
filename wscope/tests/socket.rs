use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use tungstenite::Message;
use wscope::event::{FrameEvent, FrameType, Payload};
use wscope::settings::Settings;
use wscope::socket::{Client, Delivery, ReadyState, SocketError, Status};

/// Accepts one connection and echoes every data message back.
fn echo_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        loop {
            match ws.read() {
                Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                    if ws.send(msg).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
    format!("ws://{}", addr)
}

/// Completes the handshake, then never reads again, so a close frame sent
/// to it is never answered.
fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let ws = tungstenite::accept(stream).unwrap();
        thread::sleep(Duration::from_secs(20));
        drop(ws);
    });
    format!("ws://{}", addr)
}

/// Answers the handshake with a plain 404.
fn rejecting_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf);
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
    });
    format!("ws://{}", addr)
}

fn settings() -> Settings {
    Settings {
        socket_max_buffer_size: 4,
        socket_max_buffer_wait: 10,
        ..Settings::default()
    }
}

struct Collected {
    frames: Vec<FrameEvent>,
    statuses: Vec<Status>,
}

impl Collected {
    fn new() -> Collected {
        Collected {
            frames: Vec::new(),
            statuses: Vec::new(),
        }
    }

    fn kinds(&self) -> Vec<FrameType> {
        self.frames.iter().map(|f| f.kind).collect()
    }

    /// Collects deliveries until `done` holds, or fails after a few seconds.
    fn until(&mut self, rx: &Receiver<Delivery>, done: impl Fn(&Collected) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(self) {
            let left = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(left) {
                Ok(Delivery::Frames(batch)) => self.frames.extend(batch),
                Ok(Delivery::Status(status)) => self.statuses.push(status),
                Err(e) => panic!("timed out waiting for deliveries: {}", e),
            }
        }
    }

    fn has_status(&self, f: impl Fn(&Status) -> bool) -> bool {
        self.statuses.iter().any(f)
    }

    fn closed(&self) -> bool {
        self.frames.iter().any(|f| f.kind == FrameType::SocketClose)
    }
}

#[test]
fn echo_round_trip() {
    let url = echo_server();
    let (mut client, rx) = Client::new(&settings());
    let mut got = Collected::new();

    client.open(&url).unwrap();
    assert!(matches!(client.open(&url), Err(SocketError::AlreadyOpen)));
    got.until(&rx, |c| c.has_status(|s| matches!(s, Status::Open { .. })));
    assert_eq!(client.ready_state(), ReadyState::Open);

    client.send(7, "hello").unwrap();
    got.until(&rx, |c| {
        c.frames
            .iter()
            .any(|f| f.kind == FrameType::MessageIn && f.message == Some(Payload::from("hello")))
    });
    assert!(got.has_status(|s| matches!(s, Status::SendSuccess { id: 7, .. })));

    client.close(1000, "done").unwrap();
    assert!(matches!(client.close(1000, "again"), Err(SocketError::NotOpen)));
    got.until(&rx, Collected::closed);

    assert_eq!(
        got.kinds(),
        vec![
            FrameType::SocketUpgrade,
            FrameType::SocketOpen,
            FrameType::MessageOut,
            FrameType::MessageIn,
            FrameType::SocketClose,
        ]
    );
    assert_eq!(got.frames[0].code, Some(101));
    assert_eq!(got.frames[2].id, Some(7));
    let close = got.frames.last().unwrap();
    assert_eq!(close.code, Some(1000));
    assert_eq!(close.reason.as_deref(), Some("done"));
    assert_eq!(close.url.as_deref(), Some(url.as_str()));
    got.until(&rx, |c| c.has_status(|s| matches!(s, Status::Closed { code: 1000, .. })));

    client.shutdown();
}

#[test]
fn low_detail_skips_upgrade() {
    let url = echo_server();
    let (mut client, rx) = Client::new(&settings());
    client.set_high_detail(false);
    let mut got = Collected::new();

    client.open(&url).unwrap();
    got.until(&rx, |c| c.frames.iter().any(|f| f.kind == FrameType::SocketOpen));
    assert_eq!(got.kinds(), vec![FrameType::SocketOpen]);
    client.shutdown();
    got.until(&rx, Collected::closed);
    assert_eq!(got.frames.last().unwrap().code, Some(1001));
}

#[test]
fn unanswered_close_gives_up_after_timeout() {
    let url = silent_server();
    let (mut client, rx) = Client::new(&Settings {
        socket_close_timeout: 200,
        ..settings()
    });
    let mut got = Collected::new();

    client.open(&url).unwrap();
    got.until(&rx, |c| c.has_status(|s| matches!(s, Status::Open { .. })));

    let started = Instant::now();
    client.close(1000, "bye").unwrap();
    assert_eq!(client.ready_state(), ReadyState::Closing);
    got.until(&rx, |c| c.has_status(|s| matches!(s, Status::Closed { .. })));
    assert!(started.elapsed() >= Duration::from_millis(200));

    assert!(got.has_status(|s| matches!(s, Status::Closed { code: 1006, .. })));
    let close = got.frames.last().unwrap();
    assert_eq!(close.kind, FrameType::SocketClose);
    assert_eq!(close.code, Some(1006));
    assert_eq!(client.ready_state(), ReadyState::Closed);
    client.shutdown();
}

#[test]
fn refused_connection_closes_abnormally() {
    // bind then drop to get a port nobody listens on
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let (mut client, rx) = Client::new(&settings());
    let mut got = Collected::new();

    client.open(&format!("ws://127.0.0.1:{}", port)).unwrap();
    got.until(&rx, Collected::closed);
    assert_eq!(
        got.kinds(),
        vec![FrameType::SocketError, FrameType::SocketClose]
    );
    assert_eq!(got.frames[1].code, Some(1006));
    assert!(got.has_status(|s| matches!(s, Status::Error { .. })));
    got.until(&rx, |c| c.has_status(|s| matches!(s, Status::Closed { code: 1006, .. })));
    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert!(matches!(client.send(1, "late"), Err(SocketError::NotOpen)));
}

#[test]
fn rejected_handshake_is_an_unexpected_response() {
    let url = rejecting_server();
    let (mut client, rx) = Client::new(&settings());
    let mut got = Collected::new();

    client.open(&url).unwrap();
    got.until(&rx, Collected::closed);
    let response = &got.frames[0];
    assert_eq!(response.kind, FrameType::UnexpectedResponse);
    assert_eq!(response.code, Some(404));
    assert_eq!(response.summary(), format!("Unexpected response url={} status=404 Not Found", url));
}

#[test]
fn invalid_urls_are_rejected_up_front() {
    let (mut client, _rx) = Client::new(&settings());
    assert!(matches!(
        client.open("http://example.com"),
        Err(SocketError::InvalidUrl(_))
    ));
    assert_eq!(client.ready_state(), ReadyState::Closed);
}
