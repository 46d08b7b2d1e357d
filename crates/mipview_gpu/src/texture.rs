use crate::config::TextureConfig;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};

/// A power-of-two page texture holding a contiguous run of mip levels.
///
/// Level 0 of the GPU texture is the finest level that was resident when the
/// texture was built; each following level halves both dimensions.
pub struct MipTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
    pub level_count: u32,
}

impl MipTexture {
    /// Allocate an empty texture. Contents are uploaded level by level.
    pub fn new(
        ctx: &GpuContext,
        width: u32,
        height: u32,
        level_count: u32,
        config: &TextureConfig,
    ) -> Result<Self> {
        if !width.is_power_of_two() || !height.is_power_of_two() {
            return Err(GpuError::texture(format!(
                "Page textures must be power-of-two sized, got {}x{}",
                width, height
            )));
        }
        let max_dim = ctx.max_texture_dimension();
        if width > max_dim || height > max_dim {
            return Err(GpuError::texture(format!(
                "Texture {}x{} exceeds device limit {}",
                width, height, max_dim
            )));
        }
        let max_levels = 32 - width.max(height).leading_zeros();
        if level_count == 0 || level_count > max_levels {
            return Err(GpuError::texture(format!(
                "Invalid mip level count {} for {}x{}",
                level_count, width, height
            )));
        }

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Page Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Page Sampler"),
            address_mode_u: config.address_mode,
            address_mode_v: config.address_mode,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: config.mag_filter,
            min_filter: config.min_filter,
            mipmap_filter: config.mipmap_filter,
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
            width,
            height,
            level_count,
        })
    }

    /// Dimensions of one texture level.
    pub fn level_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    /// Upload RGBA8 pixels into the top-left corner of a level.
    ///
    /// The image may be smaller than the level; the remainder is padding that
    /// the UV scale keeps out of view.
    pub fn upload_level(
        &self,
        ctx: &GpuContext,
        level: u32,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<()> {
        if level >= self.level_count {
            return Err(GpuError::texture(format!(
                "Level {} out of range ({} levels)",
                level, self.level_count
            )));
        }
        let (level_w, level_h) = self.level_size(level);
        if width == 0 || height == 0 || width > level_w || height > level_h {
            return Err(GpuError::texture(format!(
                "Image {}x{} does not fit level {} ({}x{})",
                width, height, level, level_w, level_h
            )));
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(GpuError::texture(format!(
                "Invalid data size: expected {} bytes for {}x{} RGBA8, got {}",
                expected,
                width,
                height,
                rgba.len()
            )));
        }

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Single-level texture filled with one color.
    pub fn solid(ctx: &GpuContext, rgba: [u8; 4]) -> Result<Self> {
        const SIZE: u32 = 4;
        let texture = Self::new(ctx, SIZE, SIZE, 1, &TextureConfig::nearest())?;
        let pixels: Vec<u8> = rgba.iter().copied().cycle().take((SIZE * SIZE * 4) as usize).collect();
        texture.upload_level(ctx, 0, SIZE, SIZE, &pixels)?;
        Ok(texture)
    }
}
