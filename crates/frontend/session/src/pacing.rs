//! Deadline-based frame pacing at the core's native refresh rate.

use std::time::{Duration, Instant};

/// How far behind the host may fall before the schedule is reset.
pub const MAX_LAG_FRAMES: u32 = 3;

const FALLBACK_FPS: f64 = 60.0;

/// Frame pacer with drift-free deadlines.
///
/// Each deadline is the previous one plus the exact frame period, so rounding
/// in `sleep` never accumulates. When the host falls more than
/// [`MAX_LAG_FRAMES`] periods behind, the schedule restarts from now instead
/// of bursting to catch up.
#[derive(Debug, Clone)]
pub struct FramePacer {
    period: Duration,
    next: Option<Instant>,
    late_frames: u64,
    resyncs: u64,
}

impl FramePacer {
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            log::warn!("core reported invalid fps {}, pacing at {}", fps, FALLBACK_FPS);
            FALLBACK_FPS
        };
        Self {
            period: Duration::from_secs_f64(1.0 / fps),
            next: None,
            late_frames: 0,
            resyncs: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn late_frames(&self) -> u64 {
        self.late_frames
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Forget the schedule, e.g. after a pause.
    pub fn reset(&mut self) {
        self.next = None;
    }

    /// How long to wait at `now` before the next frame is due, advancing the
    /// schedule by one period.
    pub fn next_wait(&mut self, now: Instant) -> Duration {
        let deadline = match self.next {
            None => now,
            Some(deadline) => deadline,
        };

        let (deadline, wait) = if deadline >= now {
            (deadline, deadline - now)
        } else {
            self.late_frames += 1;
            if now - deadline > self.period * MAX_LAG_FRAMES {
                self.resyncs += 1;
                log::debug!("frame pacer fell behind by {:?}, resyncing", now - deadline);
                (now, Duration::ZERO)
            } else {
                (deadline, Duration::ZERO)
            }
        };

        self.next = Some(deadline + self.period);
        wait
    }

    /// Block until the next frame is due.
    pub fn wait(&mut self) {
        let wait = self.next_wait(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_runs_immediately() {
        let mut p = FramePacer::new(60.0);
        assert_eq!(p.next_wait(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn deadlines_do_not_drift() {
        let mut p = FramePacer::new(50.0);
        let t0 = Instant::now();
        p.next_wait(t0);
        // host wakes up slightly late every frame
        let jitter = Duration::from_micros(300);
        let mut now = t0;
        for i in 1..=100u32 {
            now = t0 + p.period() * i + jitter;
            p.next_wait(now);
        }
        // the 101st deadline is still anchored to t0
        let expected = t0 + p.period() * 101;
        assert_eq!(p.next_wait(now), expected - now);
        assert_eq!(p.late_frames(), 100);
        assert_eq!(p.resyncs(), 0);
    }

    #[test]
    fn on_time_host_waits_the_remainder() {
        let mut p = FramePacer::new(50.0);
        let t0 = Instant::now();
        p.next_wait(t0);
        let now = t0 + Duration::from_millis(5);
        assert_eq!(p.next_wait(now), Duration::from_millis(15));
        assert_eq!(p.late_frames(), 0);
    }

    #[test]
    fn large_lag_resyncs() {
        let mut p = FramePacer::new(50.0);
        let t0 = Instant::now();
        p.next_wait(t0);
        let stalled = t0 + Duration::from_secs(1);
        assert_eq!(p.next_wait(stalled), Duration::ZERO);
        assert_eq!(p.resyncs(), 1);
        // next deadline is one period after the stall, not a burst
        assert_eq!(p.next_wait(stalled), p.period());
    }

    #[test]
    fn invalid_fps_falls_back() {
        let p = FramePacer::new(0.0);
        assert_eq!(p.period(), Duration::from_secs_f64(1.0 / 60.0));
        let p = FramePacer::new(f64::NAN);
        assert_eq!(p.period(), Duration::from_secs_f64(1.0 / 60.0));
    }
}
