//! Window selection
//!
//! Picks the contiguous run of frames to render for the current scroll
//! position, and sizes the spacers standing in for every frame outside it so
//! the total scrollable height stays the sum of all frame heights.

use super::frame::Frame;
use super::metrics::CharMetrics;

use tracing::warn;

/// Frame indices of the first and last rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderWindow {
    pub start_index: u64,
    pub stop_index: u64,
}

impl RenderWindow {
    pub fn contains(&self, index: u64) -> bool {
        self.start_index <= index && index <= self.stop_index
    }

    pub fn count(&self) -> usize {
        (self.stop_index - self.start_index + 1) as usize
    }
}

/// Selected frames, as inclusive positions into the frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub stop: usize,
    /// The scroll position could not be located and everything was selected.
    pub fallback: bool,
}

impl Selection {
    pub fn range(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.stop
    }

    pub fn window(&self, frames: &[Frame]) -> RenderWindow {
        RenderWindow {
            start_index: frames[self.start].index(),
            stop_index: frames[self.stop].index(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    pub viewport_height: u32,
    pub buffer_size: usize,
    pub scroll_top: u64,
    /// New frames arrived while the view was scrolled to the bottom.
    pub stick_to_bottom: bool,
}

/// Number of frames that must be rendered to fill the viewport with
/// minimum height frames, plus the buffer on each side.
pub fn needed_count(viewport_height: u32, min_height: u32, buffer_size: usize) -> usize {
    viewport_height.div_ceil(min_height.max(1)) as usize + 2 * buffer_size
}

/// Returns `None` only for an empty sequence.
pub fn select_window(
    frames: &mut [Frame],
    metrics: &mut CharMetrics,
    params: &WindowParams,
) -> Option<Selection> {
    if frames.is_empty() {
        return None;
    }
    let min_height = metrics.layout().min_height;
    let needed = needed_count(params.viewport_height, min_height, params.buffer_size).max(1);
    let len = frames.len();
    let take = |start: usize| Selection {
        start,
        stop: (start + needed).min(len) - 1,
        fallback: false,
    };

    if params.stick_to_bottom {
        return Some(take(len.saturating_sub(needed)));
    }

    if params.scroll_top <= min_height as u64 * params.buffer_size as u64 {
        return Some(take(0));
    }

    let mut top = 0u64;
    for (i, frame) in frames.iter_mut().enumerate() {
        top += frame.height(metrics) as u64;
        if top >= params.scroll_top {
            return Some(take(i.saturating_sub(params.buffer_size)));
        }
    }

    warn!(
        scroll_top = params.scroll_top,
        content_height = top,
        "could not reach the scroll position, rendering all frames"
    );
    Some(Selection {
        start: 0,
        stop: len - 1,
        fallback: true,
    })
}

/// Heights of the non-rendered frames above and below the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spacers {
    pub upper: u64,
    pub lower: u64,
}

pub fn compute_buffers(
    frames: &mut [Frame],
    metrics: &mut CharMetrics,
    window: RenderWindow,
) -> Spacers {
    let mut spacers = Spacers::default();
    for frame in frames.iter_mut() {
        if frame.index() < window.start_index {
            spacers.upper += frame.height(metrics) as u64;
        } else if frame.index() > window.stop_index {
            spacers.lower += frame.height(metrics) as u64;
        }
    }
    spacers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FrameEvent;
    use crate::format::FormatOptions;
    use crate::log::metrics::{FixedMeasure, FrameLayout, GlyphBox};

    fn metrics() -> CharMetrics {
        let measure = FixedMeasure {
            glyph: GlyphBox {
                width: 7,
                height: 14,
            },
            width: 935,
        };
        CharMetrics::new(Box::new(measure), FrameLayout::default())
    }

    // Single line text frames are 47 high with the default layout.
    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| {
                let ev = FrameEvent::message_in("line".into(), &FormatOptions::default());
                Frame::new(i as u64, ev)
            })
            .collect()
    }

    fn params(scroll_top: u64, stick_to_bottom: bool) -> WindowParams {
        WindowParams {
            viewport_height: 200,
            buffer_size: 1,
            scroll_top,
            stick_to_bottom,
        }
    }

    fn total(frames: &mut [Frame], m: &mut CharMetrics) -> u64 {
        frames.iter_mut().map(|f| f.height(m) as u64).sum()
    }

    #[test]
    fn needed_count_rounds_up() {
        assert_eq!(needed_count(200, 47, 1), 7);
        assert_eq!(needed_count(188, 47, 0), 4);
        assert_eq!(needed_count(0, 47, 10), 20);
    }

    #[test]
    fn fewer_frames_than_needed() {
        let mut m = metrics();
        let mut fs = frames(5);
        let sel = select_window(&mut fs, &mut m, &params(0, true)).unwrap();
        assert_eq!((sel.start, sel.stop), (0, 4));
        let window = sel.window(&fs);
        let spacers = compute_buffers(&mut fs, &mut m, window);
        assert_eq!(spacers, Spacers::default());
    }

    #[test]
    fn bottom_takes_last_frames() {
        let mut m = metrics();
        let mut fs = frames(30);
        let sel = select_window(&mut fs, &mut m, &params(0, true)).unwrap();
        let window = sel.window(&fs);
        assert_eq!(window.start_index, 23);
        assert_eq!(window.stop_index, 29);
        let spacers = compute_buffers(&mut fs, &mut m, window);
        assert_eq!(spacers.upper, 23 * 47);
        assert_eq!(spacers.lower, 0);
    }

    #[test]
    fn top_takes_first_frames() {
        let mut m = metrics();
        for buffer_size in 0..4 {
            let mut fs = frames(30);
            let p = WindowParams {
                buffer_size,
                ..params(0, false)
            };
            let sel = select_window(&mut fs, &mut m, &p).unwrap();
            assert_eq!(sel.start, 0);
            assert_eq!(sel.stop, needed_count(200, 47, buffer_size) - 1);
        }
    }

    #[test]
    fn middle_walks_heights() {
        let mut m = metrics();
        let mut fs = frames(100);
        // frame 10 ends at 11 * 47 = 517
        let sel = select_window(&mut fs, &mut m, &params(500, false)).unwrap();
        assert_eq!(sel.start, 9);
        assert_eq!(sel.stop, 15);
        assert!(!sel.fallback);
    }

    #[test]
    fn window_clamps_at_the_end() {
        let mut m = metrics();
        let mut fs = frames(12);
        let sel = select_window(&mut fs, &mut m, &params(47 * 11, false)).unwrap();
        assert_eq!((sel.start, sel.stop), (9, 11));
    }

    #[test]
    fn unreachable_scroll_falls_back_to_everything() {
        let mut m = metrics();
        let mut fs = frames(10);
        let sel = select_window(&mut fs, &mut m, &params(100_000, false)).unwrap();
        assert!(sel.fallback);
        assert_eq!((sel.start, sel.stop), (0, 9));
    }

    #[test]
    fn empty_has_no_window() {
        let mut m = metrics();
        assert_eq!(select_window(&mut [], &mut m, &params(0, true)), None);
    }

    #[test]
    fn spacers_conserve_height() {
        let mut m = metrics();
        let mut fs: Vec<Frame> = (0..40)
            .map(|i| {
                let text = "y".repeat(i * 13);
                Frame::new(i as u64, FrameEvent::message_in(text.into(), &FormatOptions::default()))
            })
            .collect();
        let all = total(&mut fs, &mut m);
        for scroll_top in [0, 300, 2_000, 5_000, 9_000] {
            for stick in [false, true] {
                let sel = select_window(&mut fs, &mut m, &params(scroll_top, stick)).unwrap();
                let window = sel.window(&fs);
                let spacers = compute_buffers(&mut fs, &mut m, window);
                let rendered = total(&mut fs[sel.range()], &mut m);
                assert_eq!(spacers.upper + rendered + spacers.lower, all);
            }
        }
    }
}
