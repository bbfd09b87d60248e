//! Frame loop lifecycle

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

/// Start/stop bookkeeping for a repeating per-frame task.
///
/// A loop runs at most once: after `stop` it can not be restarted, and only
/// the first `stop` reports that there was something to cancel.
#[derive(Debug, Clone)]
pub struct LoopLifecycle {
    state: LoopState,
    frames: u64,
}

impl LoopLifecycle {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn start(&mut self) -> bool {
        if self.state != LoopState::Idle {
            return false;
        }
        self.state = LoopState::Running;
        true
    }

    /// Count a frame; returns false once the loop should not reschedule
    pub fn frame(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.frames += 1;
        true
    }

    pub fn stop(&mut self) -> bool {
        let was_running = self.is_running();
        self.state = LoopState::Stopped;
        was_running
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for LoopLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_exactly_once() {
        let mut lifecycle = LoopLifecycle::new();
        assert!(lifecycle.start());
        assert!(!lifecycle.start());
        assert!(lifecycle.frame());
        assert!(lifecycle.frame());

        assert!(lifecycle.stop());
        assert!(!lifecycle.stop());
        assert!(!lifecycle.frame());
        assert_eq!(lifecycle.frames(), 2);
    }

    #[test]
    fn test_cannot_restart() {
        let mut lifecycle = LoopLifecycle::new();
        assert!(!lifecycle.stop());
        assert!(!lifecycle.start());
        assert_eq!(lifecycle.state(), LoopState::Stopped);
    }
}
