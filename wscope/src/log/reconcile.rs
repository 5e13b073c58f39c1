//! Reconciler
//!
//! Keeps the ordered list of rendered nodes, keyed by frame index, and
//! patches it edge by edge towards a newly selected window. Frames that stay
//! in the window keep their node handle; frames entering it reuse the node
//! their `Frame` already built, if any.

use super::frame::{Frame, NodeHandle};
use super::window::RenderWindow;

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Patch {
    pub inserted: usize,
    pub removed: usize,
}

impl Patch {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.removed == 0
    }
}

#[derive(Debug, Default)]
pub struct Reconciler {
    rendered: VecDeque<(u64, NodeHandle)>,
}

impl Reconciler {
    pub fn new() -> Reconciler {
        Reconciler::default()
    }

    pub fn rendered_window(&self) -> Option<RenderWindow> {
        match (self.rendered.front(), self.rendered.back()) {
            (Some((start, _)), Some((stop, _))) => Some(RenderWindow {
                start_index: *start,
                stop_index: *stop,
            }),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &NodeHandle)> + '_ {
        self.rendered.iter().map(|(index, node)| (*index, node))
    }

    /// Transforms the rendered list into exactly `target`, which must be a
    /// contiguous run of frames in index order.
    pub fn reconcile(&mut self, target: &mut [Frame]) -> Patch {
        let (target_start, target_stop) = match (target.first(), target.last()) {
            (Some(first), Some(last)) => (first.index(), last.index()),
            _ => {
                return Patch {
                    inserted: 0,
                    removed: self.clear(),
                }
            }
        };

        let Some(rendered) = self.rendered_window() else {
            for frame in target.iter_mut() {
                self.rendered.push_back((frame.index(), frame.node()));
            }
            return Patch {
                inserted: target.len(),
                removed: 0,
            };
        };

        let mut patch = Patch::default();

        // Top edge
        if rendered.start_index < target_start {
            while matches!(self.rendered.front(), Some((index, _)) if *index < target_start) {
                self.rendered.pop_front();
                patch.removed += 1;
            }
        } else if rendered.start_index > target_start {
            let count = target
                .iter()
                .take_while(|f| f.index() < rendered.start_index)
                .count();
            for frame in target[..count].iter_mut().rev() {
                self.rendered.push_front((frame.index(), frame.node()));
            }
            patch.inserted += count;
        }

        // Bottom edge
        if rendered.stop_index > target_stop {
            while matches!(self.rendered.back(), Some((index, _)) if *index > target_stop) {
                self.rendered.pop_back();
                patch.removed += 1;
            }
        } else if rendered.stop_index < target_stop {
            let skip = target
                .iter()
                .take_while(|f| f.index() <= rendered.stop_index)
                .count();
            for frame in target[skip..].iter_mut() {
                self.rendered.push_back((frame.index(), frame.node()));
            }
            patch.inserted += target.len() - skip;
        }

        patch
    }

    /// Releases every rendered node. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.rendered.len();
        self.rendered = VecDeque::new();
        removed
    }
}
