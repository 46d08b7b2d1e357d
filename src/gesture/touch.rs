//! Per-pointer tracking: sampling, velocity and smoothing.

use std::time::Duration;

use web_time::Instant;

use crate::config::GestureConfig;
use crate::geometry::Point;

/// Samples older than this no longer describe the pointer's motion.
const STALE_SAMPLE: Duration = Duration::from_millis(80);

/// Samples closer together than this are merged.
const MIN_SAMPLE_SECS: f32 = 0.001;

/// Weight of the newest sample in the velocity estimate.
const VELOCITY_WEIGHT: f32 = 0.6;

#[derive(Debug, Clone)]
pub struct Touch {
    pub id: u64,
    /// Latest reported position
    pub raw: Point,
    /// Position at the last velocity sample
    pub sampled: Point,
    /// Filtered position the gesture follows
    pub smoothed: Point,
    /// Screen pixels per second
    pub velocity: Point,
    pub start: Point,
    pub down_at: Instant,
    pub last_sample: Instant,
    /// Second touch of a double tap
    pub double_tap: bool,
    /// Still eligible to become a click
    pub tap_candidate: bool,
    pub hold_fired: bool,
}

impl Touch {
    pub fn new(id: u64, position: Point, now: Instant, double_tap: bool) -> Self {
        Self {
            id,
            raw: position,
            sampled: position,
            smoothed: position,
            velocity: Point::ZERO,
            start: position,
            down_at: now,
            last_sample: now,
            double_tap,
            tap_candidate: true,
            hold_fired: false,
        }
    }

    /// Record a new raw position.
    pub fn sample(&mut self, position: Point, now: Instant, move_threshold: f32) {
        self.raw = position;
        if position.distance_squared(self.start) > move_threshold * move_threshold {
            self.tap_candidate = false;
        }
        let dt = now.saturating_duration_since(self.last_sample).as_secs_f32();
        if dt < MIN_SAMPLE_SECS {
            return;
        }
        let instant = (position - self.sampled).scaled(1.0 / dt);
        self.velocity = if dt > STALE_SAMPLE.as_secs_f32() || self.last_sample == self.down_at {
            instant
        } else {
            self.velocity.scaled(1.0 - VELOCITY_WEIGHT) + instant.scaled(VELOCITY_WEIGHT)
        };
        self.sampled = position;
        self.last_sample = now;
    }

    /// Final position on lift. Not a velocity sample: the lift event usually
    /// repeats the last move.
    pub fn lift(&mut self, position: Point, move_threshold: f32) {
        self.raw = position;
        if self.has_moved(move_threshold) {
            self.tap_candidate = false;
        }
    }

    /// Velocity to hand to a release; zero once the pointer has rested.
    pub fn release_velocity(&self, now: Instant) -> Point {
        if now.saturating_duration_since(self.last_sample) > STALE_SAMPLE {
            Point::ZERO
        } else {
            self.velocity
        }
    }

    pub fn has_moved(&self, threshold: f32) -> bool {
        self.raw.distance_squared(self.start) > threshold * threshold
    }

    /// Advance the smoothed position toward the raw one.
    ///
    /// The filter follows faster as the pointer speeds up. With `extrapolate`,
    /// the target leads the raw position by a bounded amount along the
    /// current velocity.
    pub fn smooth(&mut self, config: &GestureConfig, now: Instant, extrapolate: bool) {
        let velocity = self.release_velocity(now);
        let speed = velocity.length_squared().sqrt();
        let t = if config.fast_velocity > 0.0 {
            (speed / config.fast_velocity).min(1.0)
        } else {
            1.0
        };
        let alpha = config.smoothing_slow + (config.smoothing_fast - config.smoothing_slow) * t;
        let target = if extrapolate {
            self.raw + velocity.scaled(config.extrapolation_ms / 1000.0)
        } else {
            self.raw
        };
        self.smoothed = self.smoothed + (target - self.smoothed).scaled(alpha.clamp(0.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_velocity_from_samples() {
        let t0 = Instant::now();
        let mut touch = Touch::new(1, Point::ZERO, t0, false);
        touch.sample(Point::new(10.0, 0.0), ms(t0, 10), 8.0);
        assert!((touch.velocity.x - 1000.0).abs() < 1.0);
        assert_eq!(touch.velocity.y, 0.0);
    }

    #[test]
    fn test_moving_past_threshold_ends_tap() {
        let t0 = Instant::now();
        let mut touch = Touch::new(1, Point::ZERO, t0, false);
        touch.sample(Point::new(3.0, 3.0), ms(t0, 10), 8.0);
        assert!(touch.tap_candidate);
        touch.sample(Point::new(9.0, 0.0), ms(t0, 20), 8.0);
        assert!(!touch.tap_candidate);
        assert!(touch.has_moved(8.0));
    }

    #[test]
    fn test_release_velocity_goes_stale() {
        let t0 = Instant::now();
        let mut touch = Touch::new(1, Point::ZERO, t0, false);
        touch.sample(Point::new(20.0, 0.0), ms(t0, 10), 8.0);
        assert!(touch.release_velocity(ms(t0, 20)).x > 0.0);
        assert_eq!(touch.release_velocity(ms(t0, 500)), Point::ZERO);
    }

    #[test]
    fn test_smoothing_converges_to_raw() {
        let t0 = Instant::now();
        let config = GestureConfig::default();
        let mut touch = Touch::new(1, Point::ZERO, t0, false);
        touch.raw = Point::new(100.0, 50.0);
        for _ in 0..40 {
            touch.smooth(&config, ms(t0, 1000), false);
        }
        assert!(touch.smoothed.distance(touch.raw) < 0.01);
    }
}
