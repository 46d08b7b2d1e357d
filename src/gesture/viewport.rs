//! Pan/zoom viewport mathematics.

use crate::geometry::{Point, Rect};

/// Content-to-screen transform: `screen = content * scale + (x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, scale: f32) -> Self {
        Self { x, y, scale }
    }

    /// Identity transform (scale 1, no offset).
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    pub fn offset(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn to_screen(&self, content: Point) -> Point {
        Point::new(content.x * self.scale + self.x, content.y * self.scale + self.y)
    }

    pub fn to_content(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.x) / self.scale,
            (screen.y - self.y) / self.scale,
        )
    }

    pub fn rect_to_screen(&self, content: &Rect) -> Rect {
        content.transformed(self.offset(), self.scale)
    }

    /// Viewport at `scale` that puts `content` under `screen`.
    pub fn anchored(content: Point, screen: Point, scale: f32) -> Self {
        Self::new(
            screen.x - content.x * scale,
            screen.y - content.y * scale,
            scale,
        )
    }

    /// Change the scale keeping the content point under `screen` fixed.
    pub fn zoom_at(&self, new_scale: f32, screen: Point) -> Viewport {
        Self::anchored(self.to_content(screen), screen, new_scale)
    }

    pub fn pan_by(&self, delta: Point) -> Viewport {
        Self::new(self.x + delta.x, self.y + delta.y, self.scale)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.0001;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_screen_content_inverse() {
        let vp = Viewport::new(30.0, -12.0, 2.5);
        let p = Point::new(17.0, 41.0);
        let back = vp.to_content(vp.to_screen(p));
        assert!(approx_eq(back.x, p.x));
        assert!(approx_eq(back.y, p.y));
    }

    #[test]
    fn test_zoom_at_preserves_point_under_cursor() {
        let vp = Viewport::new(50.0, 30.0, 1.0);
        let cursor = Point::new(150.0, 120.0);
        let before = vp.to_content(cursor);
        let zoomed = vp.zoom_at(2.0, cursor);
        let after = zoomed.to_content(cursor);
        assert_eq!(zoomed.scale, 2.0);
        assert!(approx_eq(before.x, after.x));
        assert!(approx_eq(before.y, after.y));
    }

    #[test]
    fn test_zoom_at_origin_keeps_offset() {
        let vp = Viewport::identity().zoom_at(3.0, Point::ZERO);
        assert!(approx_eq(vp.x, 0.0));
        assert!(approx_eq(vp.y, 0.0));
    }

    #[test]
    fn test_pan_by() {
        let vp = Viewport::identity().pan_by(Point::new(5.0, -3.0));
        assert_eq!(vp, Viewport::new(5.0, -3.0, 1.0));
    }

    #[test]
    fn test_rect_to_screen() {
        let vp = Viewport::new(10.0, 20.0, 2.0);
        let r = vp.rect_to_screen(&Rect::new(1.0, 1.0, 4.0, 2.0));
        assert_eq!(r, Rect::new(12.0, 22.0, 8.0, 4.0));
    }
}
