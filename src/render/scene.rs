//! Draw list handed to the renderer.

use crate::geometry::Rect;

/// One page image placed on screen.
///
/// `width`/`height` are the image's native size in content pixels; it covers
/// `width * scale` by `height * scale` screen pixels from `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedImage {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub page: usize,
    pub width: f32,
    pub height: f32,
    pub alpha: f32,
}

impl PlacedImage {
    pub fn screen_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width * self.scale, self.height * self.scale)
    }
}

/// Ordered list of placed images; later images draw on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub images: Vec<PlacedImage>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, image: PlacedImage) {
        self.images.push(image);
    }

    /// Placement of a page, if it is in the scene.
    pub fn placed(&self, page: usize) -> Option<&PlacedImage> {
        self.images.iter().find(|image| image.page == page)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placed_lookup_and_rect() {
        let mut scene = Scene::new();
        scene.push(PlacedImage {
            x: 10.0,
            y: 20.0,
            scale: 0.5,
            page: 4,
            width: 200.0,
            height: 100.0,
            alpha: 1.0,
        });
        assert!(scene.placed(3).is_none());
        let image = scene.placed(4).unwrap();
        assert_eq!(image.screen_rect(), Rect::new(10.0, 20.0, 100.0, 50.0));
    }
}
