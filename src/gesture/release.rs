//! Inertial motion after the last touch lifts.

use web_time::Instant;

use super::clamp::Bounds;
use super::viewport::Viewport;
use crate::config::GestureConfig;
use crate::constants::{MAX_RELEASE_STEPS, RELEASE_TIMESTEP_SECS};
use crate::geometry::Point;

/// Momentum plus snap-back, integrated at a fixed timestep.
#[derive(Debug, Clone)]
pub struct Release {
    pub velocity: Point,
    /// Screen point kept fixed while the scale springs back
    pub focal: Point,
    last_step: Option<Instant>,
    accumulator: f32,
}

impl Release {
    pub fn new(velocity: Point, focal: Point) -> Self {
        Self {
            velocity,
            focal,
            last_step: None,
            accumulator: 0.0,
        }
    }

    /// Zero-velocity release that only returns the viewport to bounds.
    pub fn settle(focal: Point) -> Self {
        Self::new(Point::ZERO, focal)
    }

    /// Integrate up to `now`. Returns true once the motion has come to rest,
    /// in which case `target` has been snapped inside `bounds`.
    pub fn advance(
        &mut self,
        target: &mut Viewport,
        bounds: Option<&Bounds>,
        config: &GestureConfig,
        now: Instant,
    ) -> bool {
        let Some(last) = self.last_step.replace(now) else {
            return self.finish_if_settled(target, bounds, config);
        };
        self.accumulator += now.saturating_duration_since(last).as_secs_f32();

        let mut steps = 0;
        while self.accumulator >= RELEASE_TIMESTEP_SECS {
            self.accumulator -= RELEASE_TIMESTEP_SECS;
            self.step(target, bounds, config, RELEASE_TIMESTEP_SECS);
            if self.finish_if_settled(target, bounds, config) {
                return true;
            }
            steps += 1;
            if steps >= MAX_RELEASE_STEPS {
                self.accumulator = 0.0;
                break;
            }
        }
        false
    }

    fn step(&mut self, target: &mut Viewport, bounds: Option<&Bounds>, config: &GestureConfig, dt: f32) {
        let speed = self.velocity.length_squared().sqrt();
        if speed > 0.0 {
            let damped = speed * (-config.drag * dt).exp();
            let slowed = (damped - config.deceleration * dt).max(0.0);
            self.velocity = self.velocity.scaled(slowed / speed);
        }
        *target = target.pan_by(self.velocity.scaled(dt));

        let Some(bounds) = bounds else {
            return;
        };
        let pull = 1.0 - (-config.spring * dt).exp();

        let scale = bounds.clamp_scale(target.scale);
        if scale != target.scale {
            let next = target.scale + (scale - target.scale) * pull;
            *target = target.zoom_at(next, self.focal);
        }

        let (xlo, xhi) = bounds.x_range(target.scale);
        let x = target.x.clamp(xlo, xhi);
        if x != target.x {
            target.x += (x - target.x) * pull;
            self.velocity.x *= 1.0 - pull;
        }
        let (ylo, yhi) = bounds.y_range(target.scale);
        let y = target.y.clamp(ylo, yhi);
        if y != target.y {
            target.y += (y - target.y) * pull;
            self.velocity.y *= 1.0 - pull;
        }
    }

    fn finish_if_settled(
        &mut self,
        target: &mut Viewport,
        bounds: Option<&Bounds>,
        config: &GestureConfig,
    ) -> bool {
        if !self.is_settled(target, bounds, config) {
            return false;
        }
        if let Some(bounds) = bounds {
            *target = bounds.hard_clamp(*target, self.focal);
        }
        self.velocity = Point::ZERO;
        true
    }

    fn is_settled(&self, target: &Viewport, bounds: Option<&Bounds>, config: &GestureConfig) -> bool {
        let residual = bounds.map_or(0.0, |b| residual_squared(b, target));
        self.velocity.length_squared() < config.settle_epsilon && residual < config.settle_epsilon
    }
}

/// Squared screen-pixel distance between a viewport and its clamped self.
fn residual_squared(bounds: &Bounds, vp: &Viewport) -> f32 {
    let scale = bounds.clamp_scale(vp.scale);
    let scale_px = (vp.scale - scale) / scale * bounds.parent.width.max(bounds.parent.height);
    bounds.overscroll(vp).length_squared() + scale_px * scale_px
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::geometry::Size;

    fn bounds() -> Bounds {
        Bounds::new(
            Size::new(1000.0, 1000.0),
            Size::new(500.0, 500.0),
            &GestureConfig::default(),
        )
    }

    fn run(release: &mut Release, target: &mut Viewport, bounds: Option<&Bounds>) -> usize {
        let config = GestureConfig::default();
        let t0 = Instant::now();
        for frame in 0..2000 {
            let now = t0 + Duration::from_millis(16 * frame as u64);
            if release.advance(target, bounds, &config, now) {
                return frame;
            }
        }
        panic!("release never settled: {:?}", target);
    }

    #[test]
    fn test_release_coasts_and_stops() {
        let mut release = Release::new(Point::new(-800.0, 0.0), Point::ZERO);
        let mut target = Viewport::new(0.0, 0.0, 1.0);
        run(&mut release, &mut target, None);
        assert!(target.x < -50.0);
        assert_eq!(release.velocity, Point::ZERO);
    }

    #[test]
    fn test_release_returns_inside_bounds() {
        let b = bounds();
        let mut release = Release::settle(b.parent_center());
        let mut target = Viewport::new(150.0, -700.0, 1.0);
        run(&mut release, &mut target, Some(&b));
        assert!(b.contains(&target), "{:?}", target);
    }

    #[test]
    fn test_scale_springs_back() {
        let b = bounds();
        let mut release = Release::settle(b.parent_center());
        let mut target = Viewport::new(-2000.0, -2000.0, 9.0);
        run(&mut release, &mut target, Some(&b));
        assert_eq!(target.scale, b.max_scale);
        assert!(b.contains(&target));
    }

    #[test]
    fn test_velocity_into_edge_is_absorbed() {
        let b = bounds();
        let mut release = Release::new(Point::new(3000.0, 0.0), b.parent_center());
        let mut target = Viewport::new(0.0, 0.0, 1.0);
        run(&mut release, &mut target, Some(&b));
        assert_eq!(target.x, 0.0);
    }
}
