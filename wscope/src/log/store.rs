//! Frame store
//!
//! Append-only sequence of frames plus the pending queue of frames that
//! arrived since the last redraw. Merging is the only way frames become part
//! of the visible sequence. Indices keep counting across `clear()`.

use super::frame::Frame;
use crate::event::FrameEvent;

#[derive(Debug, Default)]
pub struct FrameStore {
    frames: Vec<Frame>,
    pending: Vec<Frame>,
    next_index: u64,
}

impl FrameStore {
    pub fn new() -> FrameStore {
        FrameStore::default()
    }

    /// Wraps each event in a frame with the next index and queues it.
    /// Returns the number of frames queued.
    pub fn append<I: IntoIterator<Item = FrameEvent>>(&mut self, events: I) -> usize {
        let before = self.pending.len();
        for event in events {
            self.pending.push(Frame::new(self.next_index, event));
            self.next_index += 1;
        }
        self.pending.len() - before
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Moves pending frames, in arrival order, to the end of the main
    /// sequence and returns the whole sequence.
    pub fn merge_and_get_all(&mut self) -> &mut [Frame] {
        self.frames.append(&mut self.pending);
        &mut self.frames
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Position in the main sequence of the frame with this index.
    pub fn position_of(&self, index: u64) -> Option<usize> {
        self.frames.binary_search_by_key(&index, Frame::index).ok()
    }

    pub fn get(&self, index: u64) -> Option<&Frame> {
        self.position_of(index).map(|pos| &self.frames[pos])
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Drops all frames, merged or pending, along with their nodes.
    pub fn clear(&mut self) {
        self.frames = Vec::new();
        self.pending = Vec::new();
    }

    pub fn reset_heights(&mut self) {
        for frame in self.frames.iter_mut().chain(self.pending.iter_mut()) {
            frame.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FrameEvent;

    fn opens(n: usize) -> Vec<FrameEvent> {
        (0..n)
            .map(|i| FrameEvent::socket_open(&format!("ws://h/{}", i)))
            .collect()
    }

    #[test]
    fn pending_until_merged() {
        let mut store = FrameStore::new();
        assert_eq!(store.append(opens(3)), 3);
        assert!(store.is_empty());
        assert_eq!(store.pending_len(), 3);

        let all = store.merge_and_get_all();
        assert_eq!(all.len(), 3);
        assert!(!store.has_pending());
    }

    #[test]
    fn indices_are_monotonic() {
        let mut store = FrameStore::new();
        store.append(opens(4));
        store.merge_and_get_all();
        store.append(opens(1));
        store.append(opens(2));
        let frames = store.merge_and_get_all();
        assert!(frames.windows(2).all(|w| w[0].index() < w[1].index()));
        assert_eq!(frames.last().map(Frame::index), Some(6));
        // arrival order is kept
        assert_eq!(frames[4].event().url.as_deref(), Some("ws://h/0"));
    }

    #[test]
    fn clear_keeps_counting() {
        let mut store = FrameStore::new();
        store.append(opens(5));
        store.merge_and_get_all();
        store.append(opens(1));
        store.clear();
        assert!(store.is_empty());
        assert!(!store.has_pending());

        store.append(opens(2));
        let frames = store.merge_and_get_all();
        assert_eq!(frames[0].index(), 6);
        assert_eq!(store.position_of(7), Some(1));
        assert_eq!(store.position_of(2), None);
    }
}
