//! Page strip composition and page-turn decisions.
//!
//! The current page sits at the content origin. Its neighbours are laid out
//! to the left and right with a fixed gap, so dragging past an edge of the
//! current page reveals the adjacent one.

use crate::config::PageTurnConfig;
use crate::geometry::{Rect, Size};
use crate::gesture::{Bounds, ReleaseEvent, Viewport};
use crate::render::{PlacedImage, Scene};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Previous,
    Next,
}

impl PageDirection {
    /// Page reached from `current`, if it exists.
    pub fn apply(self, current: usize, page_count: usize) -> Option<usize> {
        match self {
            PageDirection::Previous => current.checked_sub(1),
            PageDirection::Next => current.checked_add(1).filter(|&page| page < page_count),
        }
    }

    /// Content x of the neighbour in this direction, relative to the
    /// current page.
    pub fn content_offset(self, page: Size, config: &PageTurnConfig) -> f32 {
        let stride = page.width + config.page_gap;
        match self {
            PageDirection::Previous => -stride,
            PageDirection::Next => stride,
        }
    }
}

/// Screen placement of the current page and its visible neighbours.
///
/// Pages that do not intersect the `parent` rectangle are culled.
pub fn compose_scene(
    viewport: &Viewport,
    page: Size,
    page_count: usize,
    current: usize,
    parent: Size,
    config: &PageTurnConfig,
) -> Scene {
    let mut scene = Scene::new();
    if current >= page_count {
        return scene;
    }
    let screen = Rect::new(0.0, 0.0, parent.width, parent.height);

    let previous = PageDirection::Previous;
    let next = PageDirection::Next;
    let strip = [
        (previous.apply(current, page_count), previous.content_offset(page, config)),
        (Some(current), 0.0),
        (next.apply(current, page_count), next.content_offset(page, config)),
    ];
    for (index, content_x) in strip {
        let Some(index) = index else {
            continue;
        };
        let image = PlacedImage {
            x: viewport.x + content_x * viewport.scale,
            y: viewport.y,
            scale: viewport.scale,
            page: index,
            width: page.width,
            height: page.height,
            alpha: 1.0,
        };
        if image.screen_rect().intersects(&screen) {
            scene.push(image);
        }
    }
    scene
}

/// Whether a release should turn the page.
///
/// Only horizontal overscroll counts. The page turns when it exceeds
/// `overscroll_fraction` of the parent width, or when the release velocity
/// points the same way and exceeds `velocity_threshold`.
pub fn page_advance(
    release: &ReleaseEvent,
    bounds: &Bounds,
    config: &PageTurnConfig,
) -> Option<PageDirection> {
    let overscroll = release.overscroll.x;
    if overscroll == 0.0 {
        return None;
    }
    let distance = config.overscroll_fraction * bounds.parent.width;
    let direction = if overscroll < 0.0 {
        PageDirection::Next
    } else {
        PageDirection::Previous
    };
    let speed = match direction {
        PageDirection::Next => -release.velocity.x,
        PageDirection::Previous => release.velocity.x,
    };
    (overscroll.abs() >= distance || speed >= config.velocity_threshold).then_some(direction)
}
