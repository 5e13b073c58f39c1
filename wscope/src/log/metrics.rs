//! Character metrics
//!
//! The size of one monospace character cell and the number of text columns
//! that fit in the log. Measuring is the host's job (a `Measure`); this
//! module caches the result and derives the column count.

use tracing::{debug, warn};

/// Constants of the frame layout, in the host's length unit (pixels for a
/// graphical host, cells for a terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Height of a single line frame. Also the unit used to decide how many
    /// frames can be visible at once.
    pub min_height: u32,
    /// Space above and below the text of a frame.
    pub vertical_padding: u32,
    /// Width of the log that is not available for message text.
    pub width_padding: u32,
}

impl Default for FrameLayout {
    fn default() -> Self {
        FrameLayout {
            min_height: 47,
            vertical_padding: 10,
            width_padding: 235,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlyphBox {
    /// Inline size: the advance of one character
    pub width: u32,
    /// Block size: the line height
    pub height: u32,
}

/// Host side measurement of the log. Callers must make sure the reference
/// glyph can be measured before the first text frame is laid out.
pub trait Measure {
    fn glyph(&self) -> GlyphBox;
    fn available_width(&self) -> u32;
}

/// A `Measure` with fixed answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMeasure {
    pub glyph: GlyphBox,
    pub width: u32,
}

impl Measure for FixedMeasure {
    fn glyph(&self) -> GlyphBox {
        self.glyph
    }

    fn available_width(&self) -> u32 {
        self.width
    }
}

pub struct CharMetrics {
    measure: Box<dyn Measure>,
    layout: FrameLayout,
    char_width: u32,
    char_height: u32,
    columns: u32,
    recalculations: u64,
}

impl CharMetrics {
    /// Starts uninitialized; the first height computation that needs the
    /// metrics measures them.
    pub fn new(measure: Box<dyn Measure>, layout: FrameLayout) -> CharMetrics {
        CharMetrics {
            measure,
            layout,
            char_width: 0,
            char_height: 0,
            columns: 0,
            recalculations: 0,
        }
    }

    pub fn recalculate(&mut self) {
        let glyph = self.measure.glyph();
        if glyph.width == 0 {
            warn!("reference glyph measured with zero width");
        }
        self.char_width = glyph.width;
        self.char_height = glyph.height;
        self.columns = self
            .measure
            .available_width()
            .saturating_sub(self.layout.width_padding)
            .checked_div(glyph.width)
            .unwrap_or(0);
        self.recalculations += 1;
        debug!(
            char_width = self.char_width,
            char_height = self.char_height,
            columns = self.columns,
            "recalculated char metrics"
        );
    }

    pub fn ensure(&mut self) {
        if self.char_width == 0 {
            self.recalculate();
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.char_width != 0
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn char_width(&self) -> u32 {
        self.char_width
    }

    pub fn char_height(&self) -> u32 {
        self.char_height
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn recalculations(&self) -> u64 {
        self.recalculations
    }
}
