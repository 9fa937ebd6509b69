// Frame pacing
//
// Fixed target rate while active, slow 5 Hz tick in standby so input
// still wakes the device promptly without burning CPU on frames.
// dt handed to scenes is capped so a long stall (gallery decode,
// wake from standby) never turns into a jump in animations.

use std::time::{Duration, Instant};

pub const DEFAULT_FPS: u32 = 30;
pub const STANDBY_INTERVAL: Duration = Duration::from_millis(200);
const MAX_DT: Duration = Duration::from_millis(100);
const STATS_WINDOW: Duration = Duration::from_secs(1);

pub struct FramePacer {
    interval: Duration,
    last: Option<Instant>,
    window_start: Option<Instant>,
    window_frames: u32,
    fps: f32,
    frame_time: Duration,
    frames: u64,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        let fps = if fps == 0 { DEFAULT_FPS } else { fps };
        Self {
            interval: Duration::from_secs(1) / fps,
            last: None,
            window_start: None,
            window_frames: 0,
            fps: 0.0,
            frame_time: Duration::ZERO,
            frames: 0,
        }
    }

    pub fn interval(&self, standby: bool) -> Duration {
        if standby {
            STANDBY_INTERVAL
        } else {
            self.interval
        }
    }

    /// Marks the start of a frame; returns the capped dt since the last.
    pub fn begin(&mut self, now: Instant) -> Duration {
        let dt = match self.last {
            Some(prev) => now.saturating_duration_since(prev).min(MAX_DT),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        self.frames += 1;

        let start = *self.window_start.get_or_insert(now);
        self.window_frames += 1;
        let span = now.saturating_duration_since(start);
        if span >= STATS_WINDOW {
            self.fps = (self.window_frames - 1) as f32 / span.as_secs_f32();
            self.window_start = Some(now);
            self.window_frames = 1;
        }
        dt
    }

    /// Records how long the frame's work took.
    pub fn end(&mut self, elapsed: Duration) {
        self.frame_time = elapsed;
    }

    /// When the next frame should start.
    pub fn deadline(&self, standby: bool) -> Option<Instant> {
        self.last.map(|t| t + self.interval(standby))
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn frame_time(&self) -> Duration {
        self.frame_time
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals() {
        let p = FramePacer::new(25);
        assert_eq!(p.interval(false), Duration::from_millis(40));
        assert_eq!(p.interval(true), STANDBY_INTERVAL);
        assert_eq!(FramePacer::new(0).interval(false), Duration::from_secs(1) / DEFAULT_FPS);
    }

    #[test]
    fn dt_is_capped() {
        let t0 = Instant::now();
        let mut p = FramePacer::new(30);
        assert_eq!(p.begin(t0), Duration::ZERO);
        assert_eq!(p.begin(t0 + Duration::from_millis(33)), Duration::from_millis(33));
        assert_eq!(p.begin(t0 + Duration::from_secs(5)), MAX_DT);
        assert_eq!(p.deadline(false), Some(t0 + Duration::from_secs(5) + p.interval(false)));
    }

    #[test]
    fn fps_over_a_window() {
        let t0 = Instant::now();
        let mut p = FramePacer::new(20);
        for i in 0..=20u64 {
            p.begin(t0 + Duration::from_millis(i * 50));
        }
        assert!((p.fps() - 20.0).abs() < 0.01, "{}", p.fps());
        assert_eq!(p.frames(), 21);
    }
}
