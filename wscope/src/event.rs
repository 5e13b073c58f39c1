//! Event
//!
//! A `FrameEvent` is one socket occurrence as delivered by the transport:
//! lifecycle changes (open, close, error, upgrade), messages in either
//! direction, and control frames. Events are immutable once built; the
//! displayed form of message payloads is computed here, at creation.

use crate::format::{self, FormatOptions};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameType {
    SocketOpen,
    SocketClose,
    SocketError,
    MessageIn,
    MessageOut,
    Ping,
    Pong,
    SocketUpgrade,
    UnexpectedResponse,
    #[serde(other)]
    Unknown,
}

impl FrameType {
    pub fn is_message(&self) -> bool {
        matches!(self, FrameType::MessageIn | FrameType::MessageOut)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameType::SocketOpen => "socket-open",
            FrameType::SocketClose => "socket-close",
            FrameType::SocketError => "socket-error",
            FrameType::MessageIn => "message-in",
            FrameType::MessageOut => "message-out",
            FrameType::Ping => "ping",
            FrameType::Pong => "pong",
            FrameType::SocketUpgrade => "socket-upgrade",
            FrameType::UnexpectedResponse => "unexpected-response",
            FrameType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(s) => s.len(),
            Payload::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Binary(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameEvent {
    #[serde(rename = "type")]
    pub kind: FrameType,
    /// Milliseconds since the epoch
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Payload>,
    #[serde(default)]
    pub is_json: bool,
    #[serde(default)]
    pub is_binary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_lengths: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_numbers: Option<Vec<String>>,
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl FrameEvent {
    pub fn new(kind: FrameType) -> FrameEvent {
        FrameEvent {
            kind,
            time: now_millis(),
            id: None,
            url: None,
            code: None,
            reason: None,
            error: None,
            message: None,
            is_json: false,
            is_binary: false,
            formatted: None,
            line_lengths: None,
            line_numbers: None,
        }
    }

    pub fn socket_open(url: &str) -> FrameEvent {
        FrameEvent {
            url: Some(url.to_string()),
            ..FrameEvent::new(FrameType::SocketOpen)
        }
    }

    pub fn socket_close(url: &str, code: u16, reason: &str) -> FrameEvent {
        FrameEvent {
            url: Some(url.to_string()),
            code: Some(code),
            reason: Some(reason.to_string()),
            ..FrameEvent::new(FrameType::SocketClose)
        }
    }

    pub fn socket_error(url: &str, error: impl fmt::Display) -> FrameEvent {
        FrameEvent {
            url: Some(url.to_string()),
            error: Some(error.to_string()),
            ..FrameEvent::new(FrameType::SocketError)
        }
    }

    pub fn socket_upgrade(status: u16) -> FrameEvent {
        FrameEvent {
            code: Some(status),
            ..FrameEvent::new(FrameType::SocketUpgrade)
        }
    }

    pub fn unexpected_response(url: &str, status: u16, reason: &str) -> FrameEvent {
        FrameEvent {
            url: Some(url.to_string()),
            code: Some(status),
            reason: Some(reason.to_string()),
            ..FrameEvent::new(FrameType::UnexpectedResponse)
        }
    }

    pub fn ping(data: Vec<u8>) -> FrameEvent {
        FrameEvent::control(FrameType::Ping, data)
    }

    pub fn pong(data: Vec<u8>) -> FrameEvent {
        FrameEvent::control(FrameType::Pong, data)
    }

    fn control(kind: FrameType, data: Vec<u8>) -> FrameEvent {
        FrameEvent {
            is_binary: true,
            message: Some(Payload::Binary(data)),
            ..FrameEvent::new(kind)
        }
    }

    pub fn message_in(payload: Payload, opts: &FormatOptions) -> FrameEvent {
        FrameEvent::message(FrameType::MessageIn, None, payload, opts)
    }

    pub fn message_out(id: u64, payload: Payload, opts: &FormatOptions) -> FrameEvent {
        FrameEvent::message(FrameType::MessageOut, Some(id), payload, opts)
    }

    fn message(
        kind: FrameType,
        id: Option<u64>,
        payload: Payload,
        opts: &FormatOptions,
    ) -> FrameEvent {
        let mut event = FrameEvent::new(kind);
        event.id = id;
        match &payload {
            Payload::Text(text) => {
                let out = format::format_text(text, opts);
                event.is_json = out.is_json;
                event.formatted = out.formatted;
                event.line_lengths = Some(out.line_lengths);
            }
            Payload::Binary(bytes) => {
                let dump = format::hex_dump(bytes);
                event.is_binary = true;
                event.line_lengths = Some(
                    dump.lines
                        .iter()
                        .map(|l| l.chars().count() as u32)
                        .collect(),
                );
                event.formatted = Some(dump.lines.join("\n"));
                event.line_numbers = Some(dump.offsets);
            }
        }
        event.message = Some(payload);
        event
    }

    /// The text shown for a message: formatted content when present,
    /// otherwise the raw text.
    pub fn display_text(&self) -> Option<&str> {
        if let Some(formatted) = &self.formatted {
            return Some(formatted);
        }
        match &self.message {
            Some(Payload::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Parses a delivery that is either one event object or an array of them.
    pub fn batch_from_json(json: &str) -> Result<Vec<FrameEvent>, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Delivery {
            Batch(Vec<FrameEvent>),
            Single(Box<FrameEvent>),
        }
        Ok(match serde_json::from_str(json)? {
            Delivery::Batch(events) => events,
            Delivery::Single(event) => vec![*event],
        })
    }

    /// One line description, used by the log view and the dump tool.
    pub fn summary(&self) -> String {
        let url = self.url.as_deref().unwrap_or("");
        match self.kind {
            FrameType::SocketOpen => format!("Socket open url={}", url),
            FrameType::SocketClose => format!(
                "Socket closed url={} code={} reason={}",
                url,
                self.code.unwrap_or_default(),
                self.reason.as_deref().unwrap_or("")
            ),
            FrameType::SocketError => format!(
                "Socket error url={} error={}",
                url,
                self.error.as_deref().unwrap_or("")
            ),
            FrameType::SocketUpgrade => {
                format!("Socket upgraded status={}", self.code.unwrap_or_default())
            }
            FrameType::UnexpectedResponse => format!(
                "Unexpected response url={} status={} {}",
                url,
                self.code.unwrap_or_default(),
                self.reason.as_deref().unwrap_or("")
            ),
            FrameType::Ping | FrameType::Pong => format!(
                "{} ({} bytes)",
                if self.kind == FrameType::Ping {
                    "Ping"
                } else {
                    "Pong"
                },
                self.message.as_ref().map(|m| m.len()).unwrap_or(0)
            ),
            FrameType::MessageIn | FrameType::MessageOut => match &self.message {
                Some(Payload::Text(text)) => text.clone(),
                Some(Payload::Binary(bytes)) => format!("<{} bytes binary>", bytes.len()),
                None => String::new(),
            },
            FrameType::Unknown => String::new(),
        }
    }
}
