//! Settings
//!
//! User settings, read from a YAML file. Unset keys take their defaults; a
//! missing file means all defaults. The host compares old and new settings
//! with `Settings::changes` and hands the new value to whoever depends on it.

use crate::format::FormatOptions;

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Font size of the log, in pixels. Accepts `12` or `"12px"`.
    #[serde(deserialize_with = "font_size")]
    pub output_font_size: u32,
    /// Minimum time between two redraws of the log, milliseconds.
    pub redraw_debounce_interval: u64,
    /// Frames rendered before and after the visible part of the log.
    pub frame_buffer_size: usize,
    pub highlight_messages: bool,
    #[serde(rename = "prettyJSON")]
    pub pretty_json: bool,
    /// Events the socket buffers before handing a batch to the log.
    pub socket_max_buffer_size: usize,
    /// Longest an event waits in the socket buffer, milliseconds.
    pub socket_max_buffer_wait: u64,
    /// How long a closing socket waits for the peer's close frame before it
    /// drops the connection, milliseconds.
    pub socket_close_timeout: u64,
    /// Also log pings, pongs, the upgrade response and rejected handshakes.
    pub high_detail: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            output_font_size: 12,
            redraw_debounce_interval: 100,
            frame_buffer_size: 10,
            highlight_messages: true,
            pretty_json: false,
            socket_max_buffer_size: 25,
            socket_max_buffer_wait: 50,
            socket_close_timeout: 30_000,
            high_detail: true,
        }
    }
}

fn font_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FontSize {
        Pixels(u32),
        Css(String),
    }
    match FontSize::deserialize(deserializer)? {
        FontSize::Pixels(px) => Ok(px),
        FontSize::Css(s) => s
            .trim()
            .trim_end_matches("px")
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid font size '{}'", s))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    OutputFontSize,
    RedrawDebounceInterval,
    FrameBufferSize,
    HighlightMessages,
    PrettyJson,
    SocketMaxBufferSize,
    SocketMaxBufferWait,
    SocketCloseTimeout,
    HighDetail,
}

impl Setting {
    pub fn key(&self) -> &'static str {
        match self {
            Setting::OutputFontSize => "outputFontSize",
            Setting::RedrawDebounceInterval => "redrawDebounceInterval",
            Setting::FrameBufferSize => "frameBufferSize",
            Setting::HighlightMessages => "highlightMessages",
            Setting::PrettyJson => "prettyJSON",
            Setting::SocketMaxBufferSize => "socketMaxBufferSize",
            Setting::SocketMaxBufferWait => "socketMaxBufferWait",
            Setting::SocketCloseTimeout => "socketCloseTimeout",
            Setting::HighDetail => "highDetail",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid settings {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

impl Settings {
    pub fn load(path: &Path) -> Result<Settings, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Settings::from_yaml(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Settings, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yaml::from_str(text)
    }

    /// Keys whose value differs between `old` and `new`.
    pub fn changes(old: &Settings, new: &Settings) -> Vec<Setting> {
        let mut changed = Vec::new();
        let mut check = |differs: bool, setting: Setting| {
            if differs {
                changed.push(setting);
            }
        };
        check(
            old.output_font_size != new.output_font_size,
            Setting::OutputFontSize,
        );
        check(
            old.redraw_debounce_interval != new.redraw_debounce_interval,
            Setting::RedrawDebounceInterval,
        );
        check(
            old.frame_buffer_size != new.frame_buffer_size,
            Setting::FrameBufferSize,
        );
        check(
            old.highlight_messages != new.highlight_messages,
            Setting::HighlightMessages,
        );
        check(old.pretty_json != new.pretty_json, Setting::PrettyJson);
        check(
            old.socket_max_buffer_size != new.socket_max_buffer_size,
            Setting::SocketMaxBufferSize,
        );
        check(
            old.socket_max_buffer_wait != new.socket_max_buffer_wait,
            Setting::SocketMaxBufferWait,
        );
        check(
            old.socket_close_timeout != new.socket_close_timeout,
            Setting::SocketCloseTimeout,
        );
        check(old.high_detail != new.high_detail, Setting::HighDetail);
        changed
    }

    pub fn redraw_debounce(&self) -> Duration {
        Duration::from_millis(self.redraw_debounce_interval)
    }

    pub fn socket_buffer_wait(&self) -> Duration {
        Duration::from_millis(self.socket_max_buffer_wait)
    }

    pub fn socket_close_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_close_timeout)
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            pretty_json: self.pretty_json,
        }
    }
}
