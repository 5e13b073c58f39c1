//! Frame
//!
//! One unit of the connection log, wrapping a single `FrameEvent`. The event
//! never changes after construction; the frame's height and renderable node
//! are derived lazily and cached. Heights are dropped by `reset()` whenever
//! the character metrics change, nodes live as long as the frame.

use super::metrics::CharMetrics;
use crate::event::{FrameEvent, FrameType, Payload};
use crate::format::{self, HEX_DUMP_WIDTH};

use std::rc::Rc;

/// Renderable representation of a frame. Built at most once per frame, so
/// the same handle is handed out every time the frame enters the window.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameNode {
    pub index: u64,
    pub time: i64,
    pub kind: FrameType,
    pub is_json: bool,
    pub is_binary: bool,
    /// Body lines, unwrapped and safe to print. Message frames carry their
    /// display text (or hex dump); other frames a single summary line.
    pub lines: Vec<String>,
    /// Offset labels of a binary dump, one per line.
    pub gutter: Option<Vec<String>>,
}

pub type NodeHandle = Rc<FrameNode>;

#[derive(Debug)]
pub struct Frame {
    index: u64,
    event: FrameEvent,
    is_json: bool,
    is_binary: bool,
    is_formatted: bool,
    height: Option<u32>,
    node: Option<NodeHandle>,
    height_computations: u64,
}

impl Frame {
    pub fn new(index: u64, event: FrameEvent) -> Frame {
        let is_binary = event.is_binary || matches!(event.message, Some(Payload::Binary(_)));
        Frame {
            index,
            is_json: event.is_json,
            is_binary,
            is_formatted: event.formatted.is_some(),
            event,
            height: None,
            node: None,
            height_computations: 0,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn time(&self) -> i64 {
        self.event.time
    }

    pub fn kind(&self) -> FrameType {
        self.event.kind
    }

    pub fn event(&self) -> &FrameEvent {
        &self.event
    }

    pub fn is_json(&self) -> bool {
        self.is_json
    }

    pub fn is_binary(&self) -> bool {
        self.is_binary
    }

    pub fn is_formatted(&self) -> bool {
        self.is_formatted
    }

    /// Height of the frame, computed on first use after construction or
    /// `reset()`.
    pub fn height(&mut self, metrics: &mut CharMetrics) -> u32 {
        if let Some(height) = self.height {
            return height;
        }
        let height = self.compute_height(metrics);
        self.height = Some(height);
        self.height_computations += 1;
        height
    }

    pub fn cached_height(&self) -> Option<u32> {
        self.height
    }

    pub fn reset(&mut self) {
        self.height = None;
    }

    pub fn height_computations(&self) -> u64 {
        self.height_computations
    }

    pub fn has_node(&self) -> bool {
        self.node.is_some()
    }

    pub fn node(&mut self) -> NodeHandle {
        if let Some(node) = &self.node {
            return node.clone();
        }
        let node = Rc::new(self.build_node());
        self.node = Some(node.clone());
        node
    }

    fn compute_height(&self, metrics: &mut CharMetrics) -> u32 {
        let layout = *metrics.layout();
        if !self.event.kind.is_message() {
            return layout.min_height;
        }
        metrics.ensure();

        let rows = if self.is_binary {
            self.hex_line_count()
        } else {
            self.wrapped_rows(metrics.columns())
        };
        let height = rows
            .saturating_mul(metrics.char_height())
            .saturating_add(layout.vertical_padding);
        height.max(layout.min_height)
    }

    fn hex_line_count(&self) -> u32 {
        if let Some(numbers) = &self.event.line_numbers {
            return numbers.len() as u32;
        }
        match &self.event.message {
            Some(payload) => payload.len().div_ceil(HEX_DUMP_WIDTH) as u32,
            None => 0,
        }
    }

    fn wrapped_rows(&self, columns: u32) -> u32 {
        let columns = columns.max(1);
        let rows = |len: u32| len.div_ceil(columns).max(1);
        match &self.event.line_lengths {
            Some(lengths) => lengths.iter().map(|&len| rows(len)).sum(),
            None => format::line_lengths(self.event.display_text().unwrap_or(""))
                .into_iter()
                .map(rows)
                .sum(),
        }
    }

    fn build_node(&self) -> FrameNode {
        let lines = match self.event.kind {
            FrameType::MessageIn | FrameType::MessageOut => match self.event.display_text() {
                Some(text) => format::display_lines(text).collect(),
                None => Vec::new(),
            },
            FrameType::Unknown => Vec::new(),
            _ => vec![format::display_line(&self.event.summary())],
        };
        FrameNode {
            index: self.index,
            time: self.event.time,
            kind: self.event.kind,
            is_json: self.is_json,
            is_binary: self.is_binary,
            lines,
            gutter: self.event.line_numbers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FrameEvent;
    use crate::format::FormatOptions;
    use crate::log::metrics::{FixedMeasure, FrameLayout, GlyphBox};

    // 20 columns of 7 wide glyphs, 14 high
    fn metrics() -> CharMetrics {
        let measure = FixedMeasure {
            glyph: GlyphBox {
                width: 7,
                height: 14,
            },
            width: 235 + 20 * 7,
        };
        CharMetrics::new(Box::new(measure), FrameLayout::default())
    }

    fn text(s: &str) -> Frame {
        Frame::new(0, FrameEvent::message_in(s.into(), &FormatOptions::default()))
    }

    #[test]
    fn lifecycle_frames_use_min_height() {
        let mut m = metrics();
        let mut f = Frame::new(0, FrameEvent::socket_open("ws://localhost"));
        assert_eq!(f.height(&mut m), 47);
        // no text to wrap, so the metrics are never measured
        assert!(!m.is_initialized());
    }

    #[test]
    fn two_short_lines() {
        let mut m = metrics();
        let mut f = text("hello\nworld");
        assert_eq!(f.height(&mut m), (2 * 14 + 10).max(47));
        assert_eq!(m.columns(), 20);
    }

    #[test]
    fn long_lines_wrap() {
        let mut m = metrics();
        // 45 chars over 20 columns -> 3 rows, plus 2 more lines of 1 row
        let mut f = text(&format!("{}\na\nb", "x".repeat(45)));
        assert_eq!(f.height(&mut m), 5 * 14 + 10);
    }

    #[test]
    fn wide_characters_count_once() {
        let mut m = metrics();
        let mut f = text(&"é".repeat(20));
        assert_eq!(f.height(&mut m), 47);
        let mut g = text(&"é".repeat(21 * 3));
        assert_eq!(g.height(&mut m), 4 * 14 + 10);
    }

    #[test]
    fn binary_uses_hex_dump_lines() {
        let mut m = metrics();
        let ev = FrameEvent::message_in(vec![1u8; 3 * 24].into(), &FormatOptions::default());
        let mut f = Frame::new(0, ev);
        assert!(f.is_binary());
        assert_eq!(f.height(&mut m), 52);

        let mut empty = Frame::new(
            1,
            FrameEvent::message_in(Vec::new().into(), &FormatOptions::default()),
        );
        assert_eq!(empty.height(&mut m), 47);
    }

    #[test]
    fn height_is_cached_until_reset() {
        let mut m = metrics();
        let mut f = text("hello");
        let first = f.height(&mut m);
        assert_eq!(f.height(&mut m), first);
        assert_eq!(f.height_computations(), 1);
        f.reset();
        assert_eq!(f.cached_height(), None);
        assert_eq!(f.height(&mut m), first);
        assert_eq!(f.height_computations(), 2);
    }

    #[test]
    fn node_is_built_once() {
        let mut f = text("hello\nworld");
        assert!(!f.has_node());
        let a = f.node();
        f.reset();
        let b = f.node();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.lines, vec!["hello", "world"]);
    }

    #[test]
    fn control_characters_match_the_height_model() {
        let mut m = metrics();
        let raw = "a\tb\x1b[2Jc\r\nd";
        let mut f = text(raw);
        assert_eq!(f.node().lines, vec!["a       b.[2Jc", "d"]);
        assert!(f
            .node()
            .lines
            .iter()
            .flat_map(|l| l.chars())
            .all(|c| !c.is_control()));

        // same height with and without precomputed line lengths
        let mut ev = FrameEvent::message_in(raw.into(), &FormatOptions::default());
        ev.line_lengths = None;
        let mut bare = Frame::new(1, ev);
        assert_eq!(bare.height(&mut m), f.height(&mut m));

        // 18 tabs expand to 144 columns: 8 rows at 20 columns
        let mut tabs = text(&"\t".repeat(18));
        assert_eq!(tabs.height(&mut m), 8 * 14 + 10);
    }

    #[test]
    fn lifecycle_summaries_are_sanitized() {
        let ev = FrameEvent::socket_close("ws://h", 1000, "bye\x1b]0;x\x07");
        let mut close = Frame::new(0, ev);
        assert_eq!(
            close.node().lines,
            vec!["Socket closed url=ws://h code=1000 reason=bye.]0;x."]
        );
    }

    #[test]
    fn node_content_by_type() {
        let mut close = Frame::new(3, FrameEvent::socket_close("ws://h", 1000, "done"));
        assert_eq!(
            close.node().lines,
            vec!["Socket closed url=ws://h code=1000 reason=done"]
        );

        let mut unknown = Frame::new(4, FrameEvent::new(FrameType::Unknown));
        assert!(unknown.node().lines.is_empty());

        let ev = FrameEvent::message_in(vec![0u8; 30].into(), &FormatOptions::default());
        let node = Frame::new(5, ev).node();
        assert_eq!(node.lines.len(), 2);
        assert_eq!(node.gutter.as_ref().map(|g| g.len()), Some(2));
    }
}
