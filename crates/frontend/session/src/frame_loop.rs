//! Re-arming vsync scheduler.
//!
//! Each vsync callback runs at most one frame and schedules the next one only
//! if the loop is still running. Stopping clears the running flag; a frame
//! that was already armed may still fire once, after which the loop goes
//! quiet.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameLoop {
    running: bool,
    armed: bool,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start scheduling. Returns false if the loop was already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        // a pending callback from before a stop is reused, never doubled
        self.armed = true;
        true
    }

    /// Stop scheduling. Returns false if the loop was already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Consume the pending callback.
    ///
    /// Returns whether a frame should run. The loop re-arms itself only while
    /// running.
    pub fn fire(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = self.running;
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_loop_never_fires() {
        let mut l = FrameLoop::new();
        assert!(!l.fire());
        assert!(!l.is_armed());
    }

    #[test]
    fn running_loop_rearms() {
        let mut l = FrameLoop::new();
        assert!(l.start());
        for _ in 0..3 {
            assert!(l.fire());
            assert!(l.is_armed());
        }
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut l = FrameLoop::new();
        assert!(l.start());
        assert!(!l.start());
        assert!(l.stop());
        assert!(!l.stop());
    }

    #[test]
    fn stop_lets_armed_callback_drain_without_running() {
        let mut l = FrameLoop::new();
        l.start();
        l.stop();
        assert!(l.is_armed());
        assert!(!l.fire());
        assert!(!l.is_armed());
        assert!(!l.fire());
    }

    #[test]
    fn restart_while_armed_does_not_double_schedule() {
        let mut l = FrameLoop::new();
        l.start();
        l.stop();
        l.start();
        assert!(l.fire());
        assert!(l.fire());
        assert!(l.is_armed());
    }
}
