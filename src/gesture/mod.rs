//! Pointer and touch input to a bounded, continuously updated viewport.
//!
//! The engine keeps an unbounded *target* viewport that gestures drive
//! directly, and derives the displayed viewport from it through the elastic
//! clamp. Releases integrate the target back inside the bounds.

mod clamp;
mod release;
mod touch;
mod viewport;

pub use clamp::{Bounds, clamp_edge};
pub use release::Release;
pub use touch::Touch;
pub use viewport::Viewport;

use web_time::Instant;

use crate::config::GestureConfig;
use crate::geometry::{Point, Size};

/// At most this many pointers take part in a gesture.
pub const MAX_TOUCHES: usize = 2;

/// A tap that never turned into a gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEvent {
    pub position: Point,
    pub double: bool,
}

/// The last pointer of a gesture lifted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReleaseEvent {
    /// Screen pixels per second
    pub velocity: Point,
    /// Displayed viewport at release
    pub viewport: Viewport,
    /// Target offset beyond the position bounds
    pub overscroll: Point,
}

/// Receives gesture notifications. Returning `true` consumes the event.
pub trait GestureListener {
    /// A consumed click does not arm the double tap, so a quick second tap
    /// starts afresh instead of a single-finger zoom.
    fn on_click(&mut self, _event: &ClickEvent) -> bool {
        false
    }

    /// A consumed release gets no inertia, only a settle back into bounds.
    fn on_release(&mut self, _event: &ReleaseEvent) -> bool {
        false
    }

    /// A stationary single touch was held. A consumed timeout suppresses the
    /// click that would follow.
    fn on_click_timeout(&mut self, _position: Point) -> bool {
        false
    }

    fn on_viewport_change(&mut self, _viewport: &Viewport) {}
}

impl GestureListener for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureMode {
    Idle,
    /// Pointers down, threshold not crossed yet
    Pending,
    Pan,
    SingleFingerZoom,
    Zoom,
}

/// Content point pinned under the gesture, captured whenever the set of
/// touches changes.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    content: Point,
    screen: Point,
    distance: f32,
    scale: f32,
}

pub struct GestureEngine {
    config: GestureConfig,
    bounds: Option<Bounds>,
    target: Viewport,
    viewport: Viewport,
    touches: Vec<Touch>,
    mode: GestureMode,
    anchor: Option<Anchor>,
    focal: Point,
    release: Option<Release>,
    last_tap: Option<(Instant, Point)>,
}

impl GestureEngine {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            bounds: None,
            target: Viewport::identity(),
            viewport: Viewport::identity(),
            touches: Vec::with_capacity(MAX_TOUCHES),
            mode: GestureMode::Idle,
            anchor: None,
            focal: Point::ZERO,
            release: None,
            last_tap: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    pub fn touch_count(&self) -> usize {
        self.touches.len()
    }

    pub fn has_touch(&self, id: u64) -> bool {
        self.touches.iter().any(|t| t.id == id)
    }

    pub fn is_releasing(&self) -> bool {
        self.release.is_some()
    }

    /// Nothing is moving and no pointer is down.
    pub fn is_idle(&self) -> bool {
        self.touches.is_empty() && self.release.is_none() && self.target == self.viewport
    }

    /// Derive bounds from the content and parent sizes. An out-of-bounds
    /// viewport settles back on the next update.
    pub fn set_bounds(&mut self, content: Size, parent: Size) {
        let bounds = Bounds::new(content, parent, &self.config);
        log::debug!(
            "Gesture bounds: content {}x{} in {}x{}, scale {:.3}..{:.3}",
            content.width,
            content.height,
            parent.width,
            parent.height,
            bounds.min_scale,
            bounds.max_scale
        );
        self.focal = bounds.parent_center();
        self.bounds = Some(bounds);
        self.settle_if_needed();
    }

    /// Jump to a viewport, dropping any running release.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.target = viewport;
        self.release = None;
        self.viewport = self.displayed();
        self.settle_if_needed();
    }

    /// Jump to the fit-to-parent viewport.
    pub fn reset(&mut self) {
        if let Some(bounds) = self.bounds {
            self.set_viewport(bounds.fit_viewport());
        }
    }

    pub fn pointer_down(&mut self, id: u64, position: Point, now: Instant) {
        if self.touches.len() >= MAX_TOUCHES || self.has_touch(id) {
            return;
        }
        self.release = None;

        let double_tap = self.touches.is_empty()
            && self.last_tap.is_some_and(|(at, pos)| {
                now.saturating_duration_since(at) <= self.config.double_tap_window()
                    && pos.distance(position) <= self.config.double_tap_distance
            });

        let mut touch = Touch::new(id, position, now, double_tap);
        if !self.touches.is_empty() {
            touch.tap_candidate = false;
            for other in &mut self.touches {
                other.tap_candidate = false;
            }
        }
        self.touches.push(touch);

        self.mode = match (self.mode, self.touches.len()) {
            (GestureMode::Pan | GestureMode::SingleFingerZoom, 2) => GestureMode::Zoom,
            (GestureMode::Idle, _) => GestureMode::Pending,
            (mode, _) => mode,
        };
        self.reanchor();
    }

    pub fn pointer_move(&mut self, id: u64, position: Point, now: Instant) {
        let threshold = self.config.move_threshold;
        if let Some(touch) = self.touches.iter_mut().find(|t| t.id == id) {
            touch.sample(position, now, threshold);
        }
    }

    pub fn pointer_up(
        &mut self,
        id: u64,
        position: Point,
        now: Instant,
        listener: &mut dyn GestureListener,
    ) {
        let Some(index) = self.touches.iter().position(|t| t.id == id) else {
            return;
        };
        let threshold = self.config.move_threshold;
        let mut touch = self.touches.remove(index);
        touch.lift(position, threshold);

        if !self.touches.is_empty() {
            // Lifting one finger of a pinch continues as a pan.
            if self.mode == GestureMode::Zoom {
                self.mode = GestureMode::Pan;
            }
            self.reanchor();
            return;
        }

        let mode = std::mem::replace(&mut self.mode, GestureMode::Idle);
        self.anchor = None;

        if touch.tap_candidate && mode == GestureMode::Pending {
            let event = ClickEvent {
                position,
                double: touch.double_tap,
            };
            log::debug!("Click at ({:.1}, {:.1}) double={}", position.x, position.y, event.double);
            let consumed = listener.on_click(&event);
            self.last_tap = if touch.double_tap || consumed {
                None
            } else {
                Some((now, position))
            };
            self.settle_if_needed();
            return;
        }
        self.last_tap = None;

        let velocity = match mode {
            GestureMode::Pan => touch.release_velocity(now),
            _ => Point::ZERO,
        };
        let event = ReleaseEvent {
            velocity,
            viewport: self.viewport,
            overscroll: self.overscroll(),
        };
        if listener.on_release(&event) {
            log::debug!("Release consumed");
            self.release = Some(Release::settle(self.focal));
        } else {
            self.release = Some(Release::new(velocity, self.focal));
        }
    }

    /// Drop a pointer without producing a click or inertia.
    pub fn pointer_cancel(&mut self, id: u64) {
        let Some(index) = self.touches.iter().position(|t| t.id == id) else {
            return;
        };
        self.touches.remove(index);
        if self.touches.is_empty() {
            self.mode = GestureMode::Idle;
            self.anchor = None;
            self.release = Some(Release::settle(self.focal));
        } else {
            for touch in &mut self.touches {
                touch.tap_candidate = false;
            }
            if self.mode == GestureMode::Zoom {
                self.mode = GestureMode::Pan;
            }
            self.reanchor();
        }
    }

    /// Mouse wheel zoom around the cursor. `notches` > 0 zooms in.
    pub fn wheel(&mut self, position: Point, notches: f32) {
        if !self.touches.is_empty() {
            return;
        }
        self.release = None;
        let scale = self.target.scale * self.config.wheel_zoom_step.powf(notches);
        let zoomed = self.target.zoom_at(scale, position);
        self.focal = position;
        self.target = match &self.bounds {
            Some(bounds) => bounds.hard_clamp(zoomed, position),
            None => zoomed,
        };
    }

    /// Per-frame step. Returns true when the displayed viewport changed.
    pub fn update(&mut self, now: Instant, listener: &mut dyn GestureListener) -> bool {
        self.check_hold(now, listener);

        let extrapolate = self.mode == GestureMode::Pan;
        for touch in &mut self.touches {
            touch.smooth(&self.config, now, extrapolate);
        }

        self.classify();
        self.apply_gesture();

        if let Some(release) = &mut self.release {
            if release.advance(&mut self.target, self.bounds.as_ref(), &self.config, now) {
                self.release = None;
            }
        }

        let displayed = self.displayed();
        if displayed == self.viewport {
            return false;
        }
        self.viewport = displayed;
        listener.on_viewport_change(&displayed);
        true
    }

    fn displayed(&self) -> Viewport {
        match &self.bounds {
            Some(bounds) => bounds.soft_clamp(self.target, self.focal, &self.config),
            None => self.target,
        }
    }

    /// Keeps compounding pinches finite; the displayed scale is clamped
    /// far tighter than this.
    fn limit_scale(&self, scale: f32) -> f32 {
        match &self.bounds {
            Some(bounds) => scale.clamp(bounds.min_scale * 0.25, bounds.max_scale * 4.0),
            None => scale,
        }
    }

    fn check_hold(&mut self, now: Instant, listener: &mut dyn GestureListener) {
        if self.mode != GestureMode::Pending || self.touches.len() != 1 {
            return;
        }
        let timeout = self.config.hold_timeout();
        let touch = &mut self.touches[0];
        if !touch.tap_candidate
            || touch.hold_fired
            || now.saturating_duration_since(touch.down_at) < timeout
        {
            return;
        }
        touch.hold_fired = true;
        let position = touch.raw;
        if listener.on_click_timeout(position) {
            log::debug!("Hold at ({:.1}, {:.1}) consumed", position.x, position.y);
            self.touches[0].tap_candidate = false;
        }
    }

    fn classify(&mut self) {
        if self.mode != GestureMode::Pending {
            return;
        }
        let threshold = self.config.move_threshold;
        if !self.touches.iter().any(|t| t.has_moved(threshold)) {
            return;
        }
        self.mode = match self.touches.as_slice() {
            [single] if single.double_tap => GestureMode::SingleFingerZoom,
            [_] => GestureMode::Pan,
            _ => GestureMode::Zoom,
        };
        log::trace!("Gesture classified as {:?}", self.mode);
    }

    fn apply_gesture(&mut self) {
        let Some(anchor) = self.anchor else {
            return;
        };
        match (self.mode, self.touches.as_slice()) {
            (GestureMode::Pan, [touch]) => {
                self.target = Viewport::anchored(anchor.content, touch.smoothed, anchor.scale);
                self.focal = touch.smoothed;
            }
            (GestureMode::SingleFingerZoom, [touch]) => {
                let dy = touch.smoothed.y - anchor.screen.y;
                let rate = self.config.single_finger_zoom_rate.max(1.0);
                let scale = self.limit_scale(anchor.scale * (dy / rate).exp2());
                self.target = Viewport::anchored(anchor.content, anchor.screen, scale);
                self.focal = anchor.screen;
            }
            (GestureMode::Zoom, [a, b]) => {
                let mid = a.smoothed.midpoint(b.smoothed);
                let distance = a.smoothed.distance(b.smoothed).max(1.0);
                let scale = self.limit_scale(anchor.scale * distance / anchor.distance);
                self.target = Viewport::anchored(anchor.content, mid, scale);
                self.focal = mid;
            }
            _ => {}
        }
    }

    fn reanchor(&mut self) {
        self.anchor = match self.touches.as_slice() {
            [touch] => Some(Anchor {
                content: self.target.to_content(touch.smoothed),
                screen: touch.smoothed,
                distance: 1.0,
                scale: self.target.scale,
            }),
            [a, b] => {
                let mid = a.smoothed.midpoint(b.smoothed);
                Some(Anchor {
                    content: self.target.to_content(mid),
                    screen: mid,
                    distance: a.smoothed.distance(b.smoothed).max(1.0),
                    scale: self.target.scale,
                })
            }
            _ => None,
        };
    }

    fn overscroll(&self) -> Point {
        self.bounds
            .as_ref()
            .map_or(Point::ZERO, |b| b.overscroll(&self.target))
    }

    fn settle_if_needed(&mut self) {
        if !self.touches.is_empty() || self.release.is_some() {
            return;
        }
        let out_of_bounds = self.bounds.as_ref().is_some_and(|b| !b.contains(&self.target));
        if out_of_bounds {
            self.release = Some(Release::settle(self.focal));
        }
    }
}
