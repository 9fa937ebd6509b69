// Tap and swipe recognition from touch down/up pairs.
// Works on logical coordinates; thresholds are in logical pixels.

use std::time::{Duration, Instant};

pub const SWIPE_MIN_DISTANCE: u16 = 60;
pub const SWIPE_MAX_DURATION: Duration = Duration::from_millis(400);
pub const TAP_MAX_DISTANCE: u16 = 20;
pub const TAP_MAX_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Tap { x: u16, y: u16 },
    SwipeLeft,
    SwipeRight,
    SwipeUp,
    SwipeDown,
}

#[derive(Debug, Default)]
pub struct GestureDetector {
    down: Option<(u16, u16, Instant)>,
}

impl GestureDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch_down(&mut self, x: u16, y: u16, now: Instant) {
        self.down = Some((x, y, now));
    }

    /// Classifies the stroke ending at (x, y). A release without a
    /// matching press, or a slow drag, yields nothing.
    pub fn touch_up(&mut self, x: u16, y: u16, now: Instant) -> Option<Gesture> {
        let (x0, y0, t0) = self.down.take()?;
        let held = now.saturating_duration_since(t0);
        let dx = x as i32 - x0 as i32;
        let dy = y as i32 - y0 as i32;

        if held <= SWIPE_MAX_DURATION {
            if dx.abs() >= SWIPE_MIN_DISTANCE as i32 && dx.abs() >= dy.abs() {
                return Some(if dx < 0 {
                    Gesture::SwipeLeft
                } else {
                    Gesture::SwipeRight
                });
            }
            if dy.abs() >= SWIPE_MIN_DISTANCE as i32 {
                return Some(if dy < 0 {
                    Gesture::SwipeUp
                } else {
                    Gesture::SwipeDown
                });
            }
        }

        let moved = dx.abs().max(dy.abs());
        if held < TAP_MAX_DURATION && moved < TAP_MAX_DISTANCE as i32 {
            return Some(Gesture::Tap { x: x0, y: y0 });
        }
        None
    }

    pub fn cancel(&mut self) {
        self.down = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(from: (u16, u16), to: (u16, u16), ms: u64) -> Option<Gesture> {
        let t0 = Instant::now();
        let mut g = GestureDetector::new();
        g.touch_down(from.0, from.1, t0);
        g.touch_up(to.0, to.1, t0 + Duration::from_millis(ms))
    }

    #[test]
    fn fast_horizontal_strokes_are_swipes() {
        assert_eq!(stroke((300, 400), (200, 410), 150), Some(Gesture::SwipeLeft));
        assert_eq!(stroke((100, 400), (161, 400), 150), Some(Gesture::SwipeRight));
        assert_eq!(stroke((100, 400), (110, 300), 150), Some(Gesture::SwipeUp));
    }

    #[test]
    fn slow_stroke_is_nothing() {
        assert_eq!(stroke((300, 400), (100, 400), 900), None);
    }

    #[test]
    fn short_quick_touch_is_a_tap_at_the_press_point() {
        assert_eq!(
            stroke((50, 60), (55, 62), 100),
            Some(Gesture::Tap { x: 50, y: 60 })
        );
        assert_eq!(stroke((50, 60), (50, 60), 350), None);
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut g = GestureDetector::new();
        assert_eq!(g.touch_up(1, 1, Instant::now()), None);
    }
}
