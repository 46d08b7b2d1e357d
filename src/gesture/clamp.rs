//! Viewport bounds and the elastic soft clamp.

use super::viewport::Viewport;
use crate::config::GestureConfig;
use crate::geometry::{Point, Size};

/// Soft clamp: identity inside `[lo, hi]`; outside, the value travels past
/// the bound with exponentially diminishing extra travel and never gets more
/// than `limit` beyond it. A non-positive `limit` is a hard clamp.
pub fn clamp_edge(value: f32, lo: f32, hi: f32, limit: f32) -> f32 {
    let hi = hi.max(lo);
    if limit <= 0.0 {
        return value.max(lo).min(hi);
    }
    if value < lo {
        lo - limit * (1.0 - (-(lo - value) / limit).exp())
    } else if value > hi {
        hi + limit * (1.0 - (-(value - hi) / limit).exp())
    } else {
        value
    }
}

/// Allowed offsets along one axis: content larger than the parent may not
/// leave a gap at either edge, smaller content is centred.
fn axis_range(content: f32, parent: f32, scale: f32) -> (f32, f32) {
    let extent = content * scale;
    if extent >= parent {
        (parent - extent, 0.0)
    } else {
        let centred = (parent - extent) * 0.5;
        (centred, centred)
    }
}

/// Scale and position bounds for one content size inside one parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub content: Size,
    pub parent: Size,
    pub fit_scale: f32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Bounds {
    pub fn new(content: Size, parent: Size, config: &GestureConfig) -> Self {
        let fit_scale = if content.width > 0.0 && content.height > 0.0 {
            (parent.width / content.width).min(parent.height / content.height)
        } else {
            1.0
        };
        let min_scale = fit_scale * config.min_zoom_factor;
        let max_scale = config.max_zoom.max(min_scale);
        Self {
            content,
            parent,
            fit_scale,
            min_scale,
            max_scale,
        }
    }

    pub fn x_range(&self, scale: f32) -> (f32, f32) {
        axis_range(self.content.width, self.parent.width, scale)
    }

    pub fn y_range(&self, scale: f32) -> (f32, f32) {
        axis_range(self.content.height, self.parent.height, scale)
    }

    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    pub fn parent_center(&self) -> Point {
        Point::new(self.parent.width * 0.5, self.parent.height * 0.5)
    }

    /// Whole content visible and centred.
    pub fn fit_viewport(&self) -> Viewport {
        let scale = self.clamp_scale(self.fit_scale);
        let (x, _) = self.x_range(scale);
        let (y, _) = self.y_range(scale);
        Viewport::new(x, y, scale)
    }

    /// Nearest in-bounds viewport; scale changes keep `focal` fixed.
    pub fn hard_clamp(&self, vp: Viewport, focal: Point) -> Viewport {
        let scale = self.clamp_scale(vp.scale);
        let vp = if scale != vp.scale {
            vp.zoom_at(scale, focal)
        } else {
            vp
        };
        let (xlo, xhi) = self.x_range(scale);
        let (ylo, yhi) = self.y_range(scale);
        Viewport::new(vp.x.clamp(xlo, xhi), vp.y.clamp(ylo, yhi), scale)
    }

    /// Elastic version of [`Bounds::hard_clamp`].
    pub fn soft_clamp(&self, vp: Viewport, focal: Point, config: &GestureConfig) -> Viewport {
        let scale_limit = if vp.scale < self.min_scale {
            self.min_scale
        } else {
            self.max_scale
        } * config.zoom_overscroll;
        let scale = clamp_edge(vp.scale, self.min_scale, self.max_scale, scale_limit);
        let vp = if scale != vp.scale {
            vp.zoom_at(scale, focal)
        } else {
            vp
        };
        let (xlo, xhi) = self.x_range(scale);
        let (ylo, yhi) = self.y_range(scale);
        Viewport::new(
            clamp_edge(vp.x, xlo, xhi, config.overscroll_limit),
            clamp_edge(vp.y, ylo, yhi, config.overscroll_limit),
            scale,
        )
    }

    /// How far a viewport's offset lies outside the position bounds at its
    /// own scale. Negative x means content dragged left past its right edge.
    pub fn overscroll(&self, vp: &Viewport) -> Point {
        let (xlo, xhi) = self.x_range(vp.scale);
        let (ylo, yhi) = self.y_range(vp.scale);
        Point::new(vp.x - vp.x.clamp(xlo, xhi), vp.y - vp.y.clamp(ylo, yhi))
    }

    pub fn contains(&self, vp: &Viewport) -> bool {
        self.clamp_scale(vp.scale) == vp.scale && self.overscroll(vp) == Point::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Bounds {
        Bounds::new(
            Size::new(1000.0, 2000.0),
            Size::new(500.0, 500.0),
            &GestureConfig::default(),
        )
    }

    #[test]
    fn test_clamp_edge_identity_inside() {
        assert_eq!(clamp_edge(5.0, 0.0, 10.0, 4.0), 5.0);
        assert_eq!(clamp_edge(0.0, 0.0, 10.0, 4.0), 0.0);
        assert_eq!(clamp_edge(10.0, 0.0, 10.0, 4.0), 10.0);
    }

    #[test]
    fn test_clamp_edge_never_exceeds_limit() {
        for excess in [0.5_f32, 3.0, 50.0, 1e6] {
            let above = clamp_edge(10.0 + excess, 0.0, 10.0, 4.0);
            let below = clamp_edge(-excess, 0.0, 10.0, 4.0);
            assert!(above > 10.0 && above <= 14.0, "above {}", above);
            assert!(below < 0.0 && below >= -4.0, "below {}", below);
        }
    }

    #[test]
    fn test_clamp_edge_diminishing_travel() {
        let a = clamp_edge(11.0, 0.0, 10.0, 4.0) - 10.0;
        let b = clamp_edge(12.0, 0.0, 10.0, 4.0) - clamp_edge(11.0, 0.0, 10.0, 4.0);
        assert!(b < a);
        assert!(a < 1.0);
    }

    #[test]
    fn test_clamp_edge_zero_limit_is_hard() {
        assert_eq!(clamp_edge(-3.0, 0.0, 10.0, 0.0), 0.0);
        assert_eq!(clamp_edge(30.0, 0.0, 10.0, 0.0), 10.0);
    }

    #[test]
    fn test_fit_viewport_centres_small_content() {
        let b = bounds();
        let vp = b.fit_viewport();
        assert_eq!(vp.scale, 0.25);
        assert_eq!(vp.x, (500.0 - 250.0) / 2.0);
        assert_eq!(vp.y, 0.0);
        assert!(b.contains(&vp));
    }

    #[test]
    fn test_hard_clamp_removes_gaps() {
        let b = bounds();
        let vp = b.hard_clamp(Viewport::new(100.0, 100.0, 1.0), Point::ZERO);
        assert_eq!(vp, Viewport::new(0.0, 0.0, 1.0));
        let vp = b.hard_clamp(Viewport::new(-900.0, -1800.0, 1.0), Point::ZERO);
        assert_eq!(vp, Viewport::new(-500.0, -1500.0, 1.0));
    }

    #[test]
    fn test_overscroll_sign() {
        let b = bounds();
        let over = b.overscroll(&Viewport::new(-560.0, 10.0, 1.0));
        assert_eq!(over, Point::new(-60.0, 10.0));
    }
}
