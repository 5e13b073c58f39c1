//! Event buffer
//!
//! Groups the events of a busy connection into batches, so the log merges and
//! redraws once per batch rather than once per message. A batch is flushed
//! when it is full, or when its oldest event has waited long enough.

use crate::event::FrameEvent;

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<FrameEvent>,
    max_size: usize,
    max_wait: Duration,
    started: Option<Instant>,
}

impl EventBuffer {
    pub fn new(max_size: usize, max_wait: Duration) -> EventBuffer {
        EventBuffer {
            events: Vec::new(),
            max_size: max_size.max(1),
            max_wait,
            started: None,
        }
    }

    /// Adds an event; returns the batch if this filled it.
    pub fn push(&mut self, event: FrameEvent, now: Instant) -> Option<Vec<FrameEvent>> {
        if self.events.is_empty() {
            self.started = Some(now);
        }
        self.events.push(event);
        if self.events.len() >= self.max_size {
            self.flush()
        } else {
            None
        }
    }

    /// Returns the batch if its oldest event has waited `max_wait`.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<FrameEvent>> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    pub fn flush(&mut self) -> Option<Vec<FrameEvent>> {
        self.started = None;
        if self.events.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.events))
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.started.map(|t| t + self.max_wait)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(i: usize) -> FrameEvent {
        FrameEvent::ping(vec![i as u8])
    }

    #[test]
    fn flushes_when_full() {
        let t0 = Instant::now();
        let mut buf = EventBuffer::new(3, Duration::from_millis(50));
        assert!(buf.push(ev(0), t0).is_none());
        assert!(buf.push(ev(1), t0).is_none());
        let batch = buf.push(ev(2), t0).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(buf.is_empty());
        assert_eq!(buf.deadline(), None);
    }

    #[test]
    fn flushes_when_oldest_waited() {
        let t0 = Instant::now();
        let mut buf = EventBuffer::new(25, Duration::from_millis(50));
        buf.push(ev(0), t0);
        buf.push(ev(1), t0 + Duration::from_millis(40));
        assert_eq!(buf.deadline(), Some(t0 + Duration::from_millis(50)));
        assert!(buf.poll(t0 + Duration::from_millis(49)).is_none());
        assert_eq!(buf.poll(t0 + Duration::from_millis(50)).map(|b| b.len()), Some(2));
        assert!(buf.poll(t0 + Duration::from_millis(500)).is_none());
    }

    #[test]
    fn zero_size_delivers_every_event() {
        let mut buf = EventBuffer::new(0, Duration::from_millis(50));
        assert_eq!(buf.push(ev(0), Instant::now()).map(|b| b.len()), Some(1));
        assert!(buf.flush().is_none());
    }
}
