//! Redraw scheduler
//!
//! Leading-edge debounce for redraws. The first trigger runs a redraw right
//! away and opens a debounce interval; triggers inside the interval only
//! mark a redraw as scheduled, which then runs when the interval elapses and
//! opens a new one. No trigger is dropped: the last redraw always runs after
//! the last trigger.
//!
//! Time is passed in by the caller, which also owns the timer: it should
//! call `poll` at or after `deadline()`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    NewFrames,
    Scroll,
    Resize,
    FontSize,
    Clear,
    Config,
}

impl Trigger {
    /// Triggers that change the character metrics, invalidating all heights.
    pub fn forces_reset(&self) -> bool {
        matches!(self, Trigger::Resize | Trigger::FontSize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A redraw ran; nothing has asked for another one yet.
    Debouncing { until: Instant },
    /// A redraw ran and another was requested since.
    Scheduled { until: Instant },
}

/// Instruction to run a redraw pass now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redraw {
    /// Invalidate all cached heights (and re-measure) before redrawing.
    pub full_reset: bool,
}

#[derive(Debug)]
pub struct RedrawScheduler {
    state: SchedulerState,
    interval: Duration,
    pending_reset: bool,
    executions: u64,
}

impl RedrawScheduler {
    pub fn new(interval: Duration) -> RedrawScheduler {
        RedrawScheduler {
            state: SchedulerState::Idle,
            interval,
            pending_reset: false,
            executions: 0,
        }
    }

    pub fn trigger(&mut self, trigger: Trigger, now: Instant) -> Option<Redraw> {
        if trigger.forces_reset() {
            self.pending_reset = true;
        }
        // The timer may be late; settle the elapsed interval first. A redraw
        // run by that settles this trigger too.
        if let Some(redraw) = self.poll(now) {
            return Some(redraw);
        }
        match self.state {
            SchedulerState::Idle => Some(self.execute(now)),
            SchedulerState::Debouncing { until } => {
                self.state = SchedulerState::Scheduled { until };
                None
            }
            SchedulerState::Scheduled { .. } => None,
        }
    }

    pub fn poll(&mut self, now: Instant) -> Option<Redraw> {
        match self.state {
            SchedulerState::Debouncing { until } if now >= until => {
                self.state = SchedulerState::Idle;
                None
            }
            SchedulerState::Scheduled { until } if now >= until => Some(self.execute(now)),
            _ => None,
        }
    }

    fn execute(&mut self, now: Instant) -> Redraw {
        self.state = SchedulerState::Debouncing {
            until: now + self.interval,
        };
        self.executions += 1;
        Redraw {
            full_reset: std::mem::take(&mut self.pending_reset),
        }
    }

    /// When the current interval ends, if one is running.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Debouncing { until } | SchedulerState::Scheduled { until } => {
                Some(until)
            }
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Takes effect from the next redraw; a running interval keeps its end.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn executions(&self) -> u64 {
        self.executions
    }
}
