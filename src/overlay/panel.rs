//! Placement of the floating annotation panel next to a selection.

use crate::config::PanelConfig;
use crate::geometry::{Point, Rect, Size};

/// Receives panel geometry in screen pixels. Implemented by the embedding UI.
pub trait PanelSink {
    fn set_position(&mut self, position: Point);
    fn set_size(&mut self, size: Size);
}

/// Screen-space box the panel is attached to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelAnchor {
    pub center: Point,
    pub half_extents: Size,
}

impl PanelAnchor {
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            center: rect.center(),
            half_extents: rect.half_extents(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOrientation {
    /// Above or below the anchor
    Vertical,
    /// Left or right of the anchor
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelSide {
    /// Below or right
    After,
    /// Above or left
    Before,
}

pub struct PanelPlacer {
    config: PanelConfig,
    vertical_side: PanelSide,
    horizontal_side: PanelSide,
    position: Option<Point>,
    size: Option<Size>,
}

impl PanelPlacer {
    pub fn new(config: PanelConfig) -> Self {
        Self {
            config,
            vertical_side: PanelSide::After,
            horizontal_side: PanelSide::After,
            position: None,
            size: None,
        }
    }

    pub fn orientation(&self, panel: Size, viewport: Size) -> PanelOrientation {
        if self.config.force_vertical
            || panel.width > viewport.width * self.config.vertical_width_fraction
        {
            PanelOrientation::Vertical
        } else {
            PanelOrientation::Horizontal
        }
    }

    pub fn side(&self, orientation: PanelOrientation) -> PanelSide {
        match orientation {
            PanelOrientation::Vertical => self.vertical_side,
            PanelOrientation::Horizontal => self.horizontal_side,
        }
    }

    /// Last emitted position and size.
    pub fn placed(&self) -> Option<(Point, Size)> {
        self.position.zip(self.size)
    }

    /// Forget the emitted state so the next placement is always written.
    pub fn reset(&mut self) {
        self.position = None;
        self.size = None;
    }

    /// Place a `panel`-sized box next to `anchor` inside `viewport` and
    /// return its top-left corner.
    pub fn place(
        &mut self,
        anchor: &PanelAnchor,
        panel: Size,
        viewport: Size,
        sink: &mut dyn PanelSink,
    ) -> Point {
        let orientation = self.orientation(panel, viewport);
        let side = self.update_side(orientation, anchor, viewport);
        let margin = self.config.margin;
        let c = anchor.center;
        let h = anchor.half_extents;

        let raw = match (orientation, side) {
            (PanelOrientation::Vertical, PanelSide::After) => {
                Point::new(c.x - panel.width * 0.5, c.y + h.height + margin)
            }
            (PanelOrientation::Vertical, PanelSide::Before) => Point::new(
                c.x - panel.width * 0.5,
                c.y - h.height - margin - panel.height,
            ),
            (PanelOrientation::Horizontal, PanelSide::After) => {
                Point::new(c.x + h.width + margin, c.y - panel.height * 0.5)
            }
            (PanelOrientation::Horizontal, PanelSide::Before) => Point::new(
                c.x - h.width - margin - panel.width,
                c.y - panel.height * 0.5,
            ),
        };

        let border = self.config.border;
        let position = Point::new(
            clamp_into(raw.x, border, viewport.width - border - panel.width),
            clamp_into(raw.y, border, viewport.height - border - panel.height),
        );

        let eps_x = self.config.epsilon * viewport.width;
        let eps_y = self.config.epsilon * viewport.height;
        if self.position.is_none_or(|old| changed(old, position, eps_x, eps_y)) {
            sink.set_position(position);
            self.position = Some(position);
        }
        let as_point = Point::new(panel.width, panel.height);
        if self
            .size
            .is_none_or(|old| changed(Point::new(old.width, old.height), as_point, eps_x, eps_y))
        {
            sink.set_size(panel);
            self.size = Some(panel);
        }
        position
    }

    fn update_side(
        &mut self,
        orientation: PanelOrientation,
        anchor: &PanelAnchor,
        viewport: Size,
    ) -> PanelSide {
        let (relative, thresholds, side) = match orientation {
            PanelOrientation::Vertical => (
                anchor.center.y / viewport.height.max(1.0),
                self.config.vertical_sides,
                &mut self.vertical_side,
            ),
            PanelOrientation::Horizontal => (
                anchor.center.x / viewport.width.max(1.0),
                self.config.horizontal_sides,
                &mut self.horizontal_side,
            ),
        };
        *side = match *side {
            PanelSide::After if relative > thresholds.on => PanelSide::Before,
            PanelSide::Before if relative < thresholds.off => PanelSide::After,
            current => current,
        };
        *side
    }
}

/// Clamp that keeps `lo` when the range is empty.
fn clamp_into(value: f32, lo: f32, hi: f32) -> f32 {
    value.min(hi).max(lo)
}

fn changed(old: Point, new: Point, eps_x: f32, eps_y: f32) -> bool {
    (old.x - new.x).abs() > eps_x || (old.y - new.y).abs() > eps_y
}
