//! Draws a [`Scene`] from whatever tiles the cache has resident.
//!
//! Each page gets one GPU texture holding a contiguous run of resident mip
//! levels. Textures live in their own bounded LRU pool, independent of the
//! tile cache, and are rebuilt only when a page's resident range changes.

use thiserror::Error;

use super::backend::{DrawQuad, RenderBackend, TextureDesc, TextureId};
use super::scene::{PlacedImage, Scene};
use crate::cache::{BoundedPool, MipCache, MipPageView};
use crate::config::RenderConfig;
use crate::format::ContainerError;

/// Why a page texture could not be built this frame.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Gpu(#[from] mipview_gpu::GpuError),

    #[error("Tile decode failed: {0}")]
    Tile(#[from] ContainerError),
}

/// Smallest power of two at or above `v` (1 for 0).
pub fn next_power_of_two(v: u32) -> u32 {
    v.max(1).next_power_of_two()
}

/// Mip level whose resolution matches an on-screen footprint.
///
/// `round(-log2(max(w_ratio, h_ratio)))` clamped to the available levels,
/// where a ratio is on-screen size over native size.
pub fn mip_for_footprint(
    screen_width: f32,
    screen_height: f32,
    native_width: f32,
    native_height: f32,
    level_count: usize,
) -> usize {
    let max_level = level_count.saturating_sub(1);
    if native_width <= 0.0 || native_height <= 0.0 {
        return 0;
    }
    let ratio = (screen_width / native_width).max(screen_height / native_height);
    if ratio.is_nan() || ratio <= 0.0 {
        return max_level;
    }
    let level = (-ratio.log2()).round();
    if level <= 0.0 {
        0
    } else {
        (level as usize).min(max_level)
    }
}

/// Inclusive range of resident levels starting at the finest resident one.
fn resident_range(view: &MipPageView) -> Option<(usize, usize)> {
    let first = view.finest_resident()?;
    let mut last = first;
    while view.tile(last + 1).is_some() {
        last += 1;
    }
    Some((first, last))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PageTexture {
    texture: TextureId,
    /// Inclusive mip range held by the texture
    levels: (usize, usize),
    uv_scale: [f32; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub textures: usize,
    pub rebuilds: u64,
    pub uploads: u64,
    pub failed_rebuilds: u64,
    /// Quads drawn in the last frame
    pub quads: usize,
    /// Placeholder quads in the last frame
    pub placeholders: usize,
}

pub struct TiledRenderer<B: RenderBackend> {
    backend: B,
    config: RenderConfig,
    scene: Scene,
    textures: BoundedPool<usize, PageTexture>,
    stats: RendererStats,
}

impl<B: RenderBackend> TiledRenderer<B> {
    pub fn new(backend: B, config: RenderConfig) -> Self {
        Self {
            backend,
            config,
            scene: Scene::new(),
            textures: BoundedPool::new(),
            stats: RendererStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Replace the draw list.
    pub fn set_scene(&mut self, scene: Scene) {
        self.scene = scene;
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn stats(&self) -> RendererStats {
        RendererStats {
            textures: self.textures.len(),
            ..self.stats
        }
    }

    /// Mip range currently held for a page.
    pub fn texture_levels(&self, page: usize) -> Option<(usize, usize)> {
        self.textures.peek(&page).map(|t| t.levels)
    }

    /// Draw one frame. Only backend draw failures are returned; a page whose
    /// texture cannot be built is drawn as a placeholder.
    pub fn render(&mut self, cache: &mut MipCache) -> mipview_gpu::Result<()> {
        let (native_w, native_h) = cache.page_size();
        let level_count = cache.level_count();
        let images: Vec<PlacedImage> = self.scene.images.clone();

        let mut quads = Vec::with_capacity(images.len());
        let mut retired = Vec::new();
        let mut placeholders = 0;

        for image in &images {
            if image.alpha <= self.config.alpha_cull {
                continue;
            }
            let rect = image.screen_rect();
            let target = mip_for_footprint(
                rect.width,
                rect.height,
                native_w as f32,
                native_h as f32,
                level_count,
            );
            let view = cache.get_mip_page(image.page, target);
            let texture = resident_range(&view)
                .and_then(|levels| self.page_texture(image.page, levels, &view, &mut retired));

            let quad = match texture {
                Some(texture) => DrawQuad {
                    rect,
                    uv_scale: texture.uv_scale,
                    alpha: image.alpha,
                    texture: Some(texture.texture),
                },
                None => {
                    placeholders += 1;
                    DrawQuad {
                        rect,
                        uv_scale: [1.0, 1.0],
                        alpha: image.alpha,
                        texture: None,
                    }
                }
            };
            quads.push(quad);
        }

        let result = self.backend.draw(&quads);
        // Evicted textures may still be referenced by this frame's quads.
        for texture in retired {
            self.backend.destroy_texture(texture);
        }
        self.stats.quads = quads.len();
        self.stats.placeholders = placeholders;
        result
    }

    /// Texture for a page holding exactly `levels`, reusing the current one
    /// when the range is unchanged.
    fn page_texture(
        &mut self,
        page: usize,
        levels: (usize, usize),
        view: &MipPageView,
        retired: &mut Vec<TextureId>,
    ) -> Option<PageTexture> {
        if let Some(existing) = self.textures.get(&page) {
            if existing.levels == levels {
                return Some(*existing);
            }
        }
        if let Some(old) = self.textures.remove(&page) {
            retired.push(old.texture);
        }

        match self.build_texture(levels, view) {
            Ok(texture) => {
                self.stats.rebuilds += 1;
                log::debug!(
                    "Page {} texture rebuilt with levels {}..={}",
                    page,
                    levels.0,
                    levels.1
                );
                self.textures.insert(page, texture, 0);
                let slots = self.config.texture_slots.max(1);
                for (_, evicted) in self.textures.evict_to(slots) {
                    retired.push(evicted.texture);
                }
                Some(texture)
            }
            Err(e) => {
                self.stats.failed_rebuilds += 1;
                log::warn!("Page {} texture rebuild failed: {}", page, e);
                None
            }
        }
    }

    fn build_texture(&mut self, levels: (usize, usize), view: &MipPageView) -> Result<PageTexture, RenderError> {
        let (first, last) = levels;
        let top = view
            .tile(first)
            .ok_or_else(|| mipview_gpu::GpuError::texture("Resident range has no top tile"))?;
        let width = next_power_of_two(top.width);
        let height = next_power_of_two(top.height);
        let max_levels = 32 - width.max(height).leading_zeros();
        let level_count = ((last - first + 1) as u32).min(max_levels);

        let texture = self.backend.create_texture(&TextureDesc {
            width,
            height,
            levels: level_count,
        })?;

        for i in 0..level_count {
            let uploaded = view
                .tile(first + i as usize)
                .ok_or_else(|| RenderError::Gpu(mipview_gpu::GpuError::texture("Missing level")))
                .and_then(|tile| {
                    let rgba = tile.to_rgba8()?;
                    self.backend
                        .upload_level(texture, i, tile.width, tile.height, &rgba)?;
                    Ok(())
                });
            if let Err(e) = uploaded {
                self.backend.destroy_texture(texture);
                return Err(e);
            }
            self.stats.uploads += 1;
        }

        Ok(PageTexture {
            texture,
            levels: (first, first + level_count as usize - 1),
            uv_scale: [
                top.width as f32 / width as f32,
                top.height as f32 / height as f32,
            ],
        })
    }

    /// Release every GPU texture.
    pub fn dispose(&mut self) {
        let drained = self.textures.drain();
        log::debug!("Disposing {} page textures", drained.len());
        for (_, texture) in drained {
            self.backend.destroy_texture(texture.texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InlineScheduler, LevelLayout, Manifest, MemorySource};
    use crate::config::CacheConfig;
    use crate::format::{PixelFormat, Tile, encode_single};
    use crate::render::RecordingBackend;

    const PAGE_W: u32 = 100;
    const PAGE_H: u32 = 60;

    fn cache(pages: usize, broken_level: Option<usize>) -> MipCache {
        let manifest = Manifest {
            page_count: pages,
            page_width: PAGE_W,
            page_height: PAGE_H,
            levels: (0..3)
                .map(|l| LevelLayout::PerPage {
                    path: format!("{}/{{page}}", l),
                })
                .collect(),
        };
        let source = MemorySource::new();
        for info in manifest.files() {
            let (w, h) = manifest.level_size(info.level);
            let len = if broken_level == Some(info.level) {
                1
            } else {
                (w * h) as usize
            };
            let tile = Tile::new(w, h, PixelFormat::Luma8, vec![200; len]);
            source.insert(info.name.clone(), encode_single(&tile));
        }
        MipCache::new(
            manifest,
            Box::new(InlineScheduler::new(source)),
            CacheConfig::default(),
        )
    }

    fn image(page: usize, scale: f32) -> PlacedImage {
        PlacedImage {
            x: 0.0,
            y: 0.0,
            scale,
            page,
            width: PAGE_W as f32,
            height: PAGE_H as f32,
            alpha: 1.0,
        }
    }

    fn renderer(slots: usize) -> TiledRenderer<RecordingBackend> {
        TiledRenderer::new(
            RecordingBackend::new(),
            RenderConfig {
                texture_slots: slots,
                ..RenderConfig::default()
            },
        )
    }

    fn settle(renderer: &mut TiledRenderer<RecordingBackend>, cache: &mut MipCache) {
        for _ in 0..16 {
            renderer.render(cache).unwrap();
            cache.pump();
        }
        renderer.render(cache).unwrap();
    }

    #[test]
    fn test_empty_cache_draws_placeholder() {
        let mut cache = cache(1, None);
        let mut renderer = renderer(4);
        renderer.set_scene(Scene {
            images: vec![image(0, 1.0)],
        });
        renderer.render(&mut cache).unwrap();
        let frame = renderer.backend().last_frame().unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].texture, None);
        assert_eq!(renderer.stats().placeholders, 1);
    }

    #[test]
    fn test_texture_grows_to_finest_level() {
        let mut cache = cache(1, None);
        let mut renderer = renderer(4);
        renderer.set_scene(Scene {
            images: vec![image(0, 1.0)],
        });
        settle(&mut renderer, &mut cache);
        assert_eq!(renderer.texture_levels(0), Some((0, 2)));

        let frame = renderer.backend().last_frame().unwrap();
        let texture = frame[0].texture.unwrap();
        let desc = renderer.backend().textures[&texture];
        assert_eq!((desc.width, desc.height, desc.levels), (128, 64, 3));
        assert_eq!(frame[0].uv_scale, [100.0 / 128.0, 60.0 / 64.0]);

        // Coarse level arrives first, so the texture was rebuilt as finer
        // levels became resident.
        assert!(renderer.stats().rebuilds >= 2);
        assert_eq!(renderer.backend().live_textures(), 1);
    }

    #[test]
    fn test_unchanged_range_reuses_texture() {
        let mut cache = cache(1, None);
        let mut renderer = renderer(4);
        renderer.set_scene(Scene {
            images: vec![image(0, 1.0)],
        });
        settle(&mut renderer, &mut cache);
        let uploads = renderer.backend().uploads.len();
        let rebuilds = renderer.stats().rebuilds;
        renderer.render(&mut cache).unwrap();
        assert_eq!(renderer.backend().uploads.len(), uploads);
        assert_eq!(renderer.stats().rebuilds, rebuilds);
    }

    #[test]
    fn test_small_footprint_uses_coarse_range() {
        let mut cache = cache(1, None);
        let mut renderer = renderer(4);
        renderer.set_scene(Scene {
            images: vec![image(0, 0.25)],
        });
        settle(&mut renderer, &mut cache);
        assert_eq!(renderer.texture_levels(0), Some((2, 2)));
        let frame = renderer.backend().last_frame().unwrap();
        let desc = renderer.backend().textures[&frame[0].texture.unwrap()];
        assert_eq!((desc.width, desc.height), (32, 16));
    }

    #[test]
    fn test_texture_slots_are_bounded() {
        let mut cache = cache(4, None);
        let mut renderer = renderer(2);
        for page in 0..4 {
            renderer.set_scene(Scene {
                images: vec![image(page, 0.25)],
            });
            settle(&mut renderer, &mut cache);
            assert!(renderer.stats().textures <= 2);
            assert!(renderer.backend().live_textures() <= 2);
        }
        assert!(!renderer.backend().destroyed.is_empty());
    }

    #[test]
    fn test_malformed_tile_falls_back_to_placeholder() {
        let mut cache = cache(1, Some(2));
        let mut renderer = renderer(4);
        renderer.set_scene(Scene {
            images: vec![image(0, 0.25)],
        });
        settle(&mut renderer, &mut cache);
        let frame = renderer.backend().last_frame().unwrap();
        assert_eq!(frame[0].texture, None);
        assert!(renderer.stats().failed_rebuilds > 0);
        assert_eq!(renderer.backend().live_textures(), 0);
    }

    #[test]
    fn test_transparent_images_are_culled() {
        let mut cache = cache(1, None);
        let mut renderer = renderer(4);
        let mut hidden = image(0, 1.0);
        hidden.alpha = 0.0;
        renderer.set_scene(Scene {
            images: vec![hidden],
        });
        renderer.render(&mut cache).unwrap();
        assert!(renderer.backend().last_frame().unwrap().is_empty());
        assert!(cache.pump().is_empty());
    }

    #[test]
    fn test_dispose_destroys_everything() {
        let mut cache = cache(2, None);
        let mut renderer = renderer(4);
        renderer.set_scene(Scene {
            images: vec![image(0, 0.25), image(1, 0.25)],
        });
        settle(&mut renderer, &mut cache);
        assert_eq!(renderer.backend().live_textures(), 2);
        renderer.dispose();
        assert_eq!(renderer.backend().live_textures(), 0);
        assert_eq!(renderer.stats().textures, 0);
    }

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(0), 1);
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(600), 1024);
        assert_eq!(next_power_of_two(1024), 1024);
    }

    #[test]
    fn test_mip_for_footprint() {
        // Native size on screen: finest level.
        assert_eq!(mip_for_footprint(1000.0, 1500.0, 1000.0, 1500.0, 4), 0);
        // Magnified: still the finest.
        assert_eq!(mip_for_footprint(3000.0, 4500.0, 1000.0, 1500.0, 4), 0);
        // Half size.
        assert_eq!(mip_for_footprint(500.0, 750.0, 1000.0, 1500.0, 4), 1);
        // Quarter size, larger axis decides.
        assert_eq!(mip_for_footprint(250.0, 300.0, 1000.0, 1500.0, 4), 2);
        // Tiny: clamped to the coarsest level.
        assert_eq!(mip_for_footprint(2.0, 3.0, 1000.0, 1500.0, 4), 3);
        assert_eq!(mip_for_footprint(0.0, 0.0, 1000.0, 1500.0, 4), 3);
    }
}
