//! Render loop state machine.
//!
//! `Running -> Closing` happens on a close request; `Closing -> Terminated`
//! only after every GPU resource has been released. A close request is
//! observed once per iteration, before any work for that frame starts.

use std::fmt;
use std::time::Duration;

use crate::types::RunLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Closing,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    WindowClosed,
    EscapePressed,
    FrameLimit,
    DurationLimit,
    /// A per-frame error that cannot be recovered from.
    Fatal,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseReason::WindowClosed => "window closed",
            CloseReason::EscapePressed => "escape pressed",
            CloseReason::FrameLimit => "frame limit reached",
            CloseReason::DurationLimit => "duration limit reached",
            CloseReason::Fatal => "fatal frame error",
        };
        f.write_str(text)
    }
}

/// Tracks the loop state plus the first reason a close was requested.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LoopState,
    pending: Option<CloseReason>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: LoopState::Running,
            pending: None,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn reason(&self) -> Option<CloseReason> {
        self.pending
    }

    /// Records a close request. Only the first reason is kept; the state does
    /// not change until [`Lifecycle::begin_iteration`] observes it.
    pub fn request_close(&mut self, reason: CloseReason) {
        if self.pending.is_none() {
            self.pending = Some(reason);
        }
    }

    /// Called at the top of every iteration. Returns `true` when a frame should
    /// be rendered.
    pub fn begin_iteration(&mut self) -> bool {
        if self.state == LoopState::Running && self.pending.is_some() {
            self.state = LoopState::Closing;
        }
        self.state == LoopState::Running
    }

    /// Completes shutdown. Returns `false` (and changes nothing) unless the
    /// loop was closing.
    pub fn mark_terminated(&mut self) -> bool {
        if self.state != LoopState::Closing {
            return false;
        }
        self.state = LoopState::Terminated;
        true
    }
}

impl RunLimits {
    /// First limit that `frames` presented frames or `elapsed` time satisfies.
    pub fn reached(&self, frames: u64, elapsed: Duration) -> Option<CloseReason> {
        if self.frames.is_some_and(|limit| frames >= limit) {
            return Some(CloseReason::FrameLimit);
        }
        if self.duration.is_some_and(|limit| elapsed >= limit) {
            return Some(CloseReason::DurationLimit);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_observed_at_iteration_start() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.begin_iteration());

        lifecycle.request_close(CloseReason::WindowClosed);
        assert_eq!(lifecycle.state(), LoopState::Running);
        assert!(!lifecycle.begin_iteration());
        assert_eq!(lifecycle.state(), LoopState::Closing);
    }

    #[test]
    fn first_close_reason_wins() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.request_close(CloseReason::EscapePressed);
        lifecycle.request_close(CloseReason::WindowClosed);
        assert_eq!(lifecycle.reason(), Some(CloseReason::EscapePressed));
    }

    #[test]
    fn terminate_requires_closing() {
        let mut lifecycle = Lifecycle::new();
        assert!(!lifecycle.mark_terminated());
        assert_eq!(lifecycle.state(), LoopState::Running);

        lifecycle.request_close(CloseReason::FrameLimit);
        lifecycle.begin_iteration();
        assert!(lifecycle.mark_terminated());
        assert_eq!(lifecycle.state(), LoopState::Terminated);
        assert!(!lifecycle.begin_iteration());
    }

    #[test]
    fn limits_trigger_in_order() {
        let limits = RunLimits {
            frames: Some(100),
            duration: Some(Duration::from_secs(2)),
        };
        assert_eq!(limits.reached(99, Duration::from_secs(1)), None);
        assert_eq!(
            limits.reached(100, Duration::from_secs(3)),
            Some(CloseReason::FrameLimit)
        );
        assert_eq!(
            limits.reached(5, Duration::from_secs(2)),
            Some(CloseReason::DurationLimit)
        );
        assert_eq!(RunLimits::default().reached(u64::MAX, Duration::MAX), None);
    }
}
