//! Connection log
//!
//! Virtualized view over an unbounded stream of socket frames. Only a window
//! of frames around the scroll position has a rendered node; two spacers
//! stand in for everything above and below it so the scrollable height
//! matches the full log.
//!
//! A redraw pass merges pending frames, selects the window, sizes the
//! spacers, patches the rendered list and then moves the scroll position to
//! the bottom if the view was following new frames. Passes are gated by a
//! `RedrawScheduler` so bursts of traffic or scroll events cost at most one
//! pass per debounce interval.
//!
//! The host owns the `Viewport` and the clock and passes both in.

pub mod frame;
pub mod metrics;
pub mod reconcile;
pub mod scheduler;
pub mod store;
pub mod window;

pub use frame::{Frame, FrameNode, NodeHandle};
pub use metrics::{CharMetrics, FixedMeasure, FrameLayout, GlyphBox, Measure};
pub use reconcile::{Patch, Reconciler};
pub use scheduler::{Redraw, RedrawScheduler, SchedulerState, Trigger};
pub use store::FrameStore;
pub use window::{RenderWindow, Selection, Spacers, WindowParams};

use crate::event::FrameEvent;
use crate::settings::Settings;

use std::time::Instant;
use tracing::{debug, trace};

/// Scroll state of the element showing the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub scroll_top: u64,
    pub viewport_height: u32,
    /// Total content height, as of the last redraw.
    pub scroll_height: u64,
}

impl Viewport {
    pub fn new(viewport_height: u32) -> Viewport {
        Viewport {
            scroll_top: 0,
            viewport_height,
            scroll_height: 0,
        }
    }

    pub fn is_at_bottom(&self) -> bool {
        self.scroll_top + self.viewport_height as u64 >= self.scroll_height
    }

    pub fn max_scroll_top(&self) -> u64 {
        self.scroll_height
            .saturating_sub(self.viewport_height as u64)
    }

    pub fn scroll_by(&mut self, delta: i64) {
        let top = self.scroll_top.saturating_add_signed(delta);
        self.scroll_top = top.min(self.max_scroll_top());
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_top = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll_top();
    }
}

/// A rendered frame and where it sits in content coordinates.
#[derive(Debug, Clone)]
pub struct Placed {
    pub top: u64,
    pub height: u32,
    pub node: NodeHandle,
}

pub struct ConnectionLog {
    store: FrameStore,
    metrics: CharMetrics,
    reconciler: Reconciler,
    scheduler: RedrawScheduler,
    buffer_size: usize,
    font_size: u32,
    spacers: Spacers,
    last_patch: Patch,
}

impl ConnectionLog {
    pub fn new(measure: Box<dyn Measure>, layout: FrameLayout, settings: &Settings) -> Self {
        ConnectionLog {
            store: FrameStore::new(),
            metrics: CharMetrics::new(measure, layout),
            reconciler: Reconciler::new(),
            scheduler: RedrawScheduler::new(settings.redraw_debounce()),
            buffer_size: settings.frame_buffer_size,
            font_size: settings.output_font_size,
            spacers: Spacers::default(),
            last_patch: Patch::default(),
        }
    }

    /// Queues a delivery of frame events, single or batched, and asks for
    /// a redraw. Returns whether a redraw ran.
    pub fn on_frame_batch(
        &mut self,
        events: Vec<FrameEvent>,
        now: Instant,
        viewport: &mut Viewport,
    ) -> bool {
        let queued = self.store.append(events);
        trace!(queued, "frames queued");
        self.request_redraw(Trigger::NewFrames, now, viewport)
    }

    /// Empties the log and releases every rendered node.
    pub fn clear(&mut self, now: Instant, viewport: &mut Viewport) -> bool {
        self.store.clear();
        self.reconciler.clear();
        self.spacers = Spacers::default();
        viewport.scroll_top = 0;
        viewport.scroll_height = 0;
        debug!("connection log cleared");
        self.request_redraw(Trigger::Clear, now, viewport)
    }

    pub fn request_redraw(
        &mut self,
        trigger: Trigger,
        now: Instant,
        viewport: &mut Viewport,
    ) -> bool {
        match self.scheduler.trigger(trigger, now) {
            Some(redraw) => {
                self.run(redraw, viewport);
                true
            }
            None => false,
        }
    }

    /// Timer tick; runs the scheduled redraw once the debounce interval is
    /// over.
    pub fn poll(&mut self, now: Instant, viewport: &mut Viewport) -> bool {
        match self.scheduler.poll(now) {
            Some(redraw) => {
                self.run(redraw, viewport);
                true
            }
            None => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Re-derives whatever depends on the changed settings. A font size
    /// change re-measures and recomputes every height.
    pub fn on_config_changed(
        &mut self,
        settings: &Settings,
        now: Instant,
        viewport: &mut Viewport,
    ) {
        let mut trigger = None;
        if settings.redraw_debounce() != self.scheduler.interval() {
            self.scheduler.set_interval(settings.redraw_debounce());
        }
        if settings.frame_buffer_size != self.buffer_size {
            self.buffer_size = settings.frame_buffer_size;
            trigger = Some(Trigger::Config);
        }
        if self.font_size != settings.output_font_size {
            self.font_size = settings.output_font_size;
            trigger = Some(Trigger::FontSize);
        }
        if let Some(trigger) = trigger {
            debug!(?trigger, "settings changed");
            self.request_redraw(trigger, now, viewport);
        }
    }

    fn run(&mut self, redraw: Redraw, viewport: &mut Viewport) {
        if redraw.full_reset {
            self.metrics.recalculate();
            self.store.reset_heights();
        }
        self.redraw(viewport);
    }

    /// One complete redraw pass. Runs to completion; nothing observes the
    /// rendered list half patched.
    pub fn redraw(&mut self, viewport: &mut Viewport) {
        let started = Instant::now();
        let stick_to_bottom = self.store.has_pending() && viewport.is_at_bottom();
        let frames = self.store.merge_and_get_all();

        if frames.is_empty() {
            self.last_patch = Patch {
                inserted: 0,
                removed: self.reconciler.clear(),
            };
            self.spacers = Spacers::default();
            viewport.scroll_height = 0;
            viewport.scroll_top = 0;
            trace!("no frames to draw");
            return;
        }

        let params = WindowParams {
            viewport_height: viewport.viewport_height,
            buffer_size: self.buffer_size,
            scroll_top: viewport.scroll_top,
            stick_to_bottom,
        };
        let Some(selection) = window::select_window(frames, &mut self.metrics, &params) else {
            return;
        };
        let target = selection.window(frames);
        self.spacers = window::compute_buffers(frames, &mut self.metrics, target);
        self.last_patch = self.reconciler.reconcile(&mut frames[selection.range()]);

        let rendered: u64 = frames[selection.range()]
            .iter_mut()
            .map(|f| f.height(&mut self.metrics) as u64)
            .sum();
        viewport.scroll_height = self.spacers.upper + rendered + self.spacers.lower;
        if stick_to_bottom {
            viewport.scroll_to_bottom();
        } else {
            viewport.scroll_top = viewport.scroll_top.min(viewport.max_scroll_top());
        }

        debug!(
            start = target.start_index,
            stop = target.stop_index,
            inserted = self.last_patch.inserted,
            removed = self.last_patch.removed,
            upper = self.spacers.upper,
            lower = self.spacers.lower,
            elapsed_us = started.elapsed().as_micros() as u64,
            "redraw"
        );
    }

    /// Bounds of the rendered frames, if any are rendered.
    pub fn render_window(&self) -> Option<RenderWindow> {
        self.reconciler.rendered_window()
    }

    pub fn spacers(&self) -> Spacers {
        self.spacers
    }

    pub fn last_patch(&self) -> Patch {
        self.last_patch
    }

    pub fn rendered(&self) -> impl Iterator<Item = (u64, &NodeHandle)> + '_ {
        self.reconciler.iter()
    }

    /// Rendered frames with their position, for drawing. Uses the heights
    /// cached by the last redraw.
    pub fn placed(&self) -> Vec<Placed> {
        let min_height = self.metrics.layout().min_height;
        let mut top = self.spacers.upper;
        self.reconciler
            .iter()
            .map(|(index, node)| {
                let height = self
                    .store
                    .get(index)
                    .and_then(Frame::cached_height)
                    .unwrap_or(min_height);
                let placed = Placed {
                    top,
                    height,
                    node: node.clone(),
                };
                top += height as u64;
                placed
            })
            .collect()
    }

    pub fn frames(&self) -> &[Frame] {
        self.store.frames()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.store.pending_len()
    }

    pub fn metrics(&self) -> &CharMetrics {
        &self.metrics
    }

    pub fn scheduler(&self) -> &RedrawScheduler {
        &self.scheduler
    }
}
