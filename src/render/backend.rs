//! Render-thread GPU seam.
//!
//! The renderer decides what to upload and draw; a backend owns the actual
//! GPU objects. [`RecordingBackend`] keeps everything in memory so renderer
//! behaviour can be checked without a device.

use std::collections::HashMap;

use mipview_gpu::{GpuError, Result};

use crate::geometry::Rect;

pub type TextureId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub levels: u32,
}

/// One textured quad of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawQuad {
    /// Screen pixels
    pub rect: Rect,
    /// Fraction of the texture covered by the image
    pub uv_scale: [f32; 2],
    pub alpha: f32,
    /// `None` draws the placeholder
    pub texture: Option<TextureId>,
}

pub trait RenderBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId>;

    /// Upload RGBA8 pixels into the top-left of a texture level.
    fn upload_level(
        &mut self,
        texture: TextureId,
        level: u32,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<()>;

    fn destroy_texture(&mut self, texture: TextureId);

    fn draw(&mut self, quads: &[DrawQuad]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub texture: TextureId,
    pub level: u32,
    pub width: u32,
    pub height: u32,
}

/// In-memory backend that validates and records every call.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub textures: HashMap<TextureId, TextureDesc>,
    pub uploads: Vec<RecordedUpload>,
    pub destroyed: Vec<TextureId>,
    pub frames: Vec<Vec<DrawQuad>>,
    next_id: TextureId,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame(&self) -> Option<&[DrawQuad]> {
        self.frames.last().map(Vec::as_slice)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }
}

impl RenderBackend for RecordingBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        if !desc.width.is_power_of_two() || !desc.height.is_power_of_two() {
            return Err(GpuError::texture(format!(
                "Page textures must be power-of-two sized, got {}x{}",
                desc.width, desc.height
            )));
        }
        self.next_id += 1;
        self.textures.insert(self.next_id, *desc);
        Ok(self.next_id)
    }

    fn upload_level(
        &mut self,
        texture: TextureId,
        level: u32,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<()> {
        let desc = self
            .textures
            .get(&texture)
            .ok_or_else(|| GpuError::texture(format!("Unknown texture {}", texture)))?;
        let level_w = (desc.width >> level).max(1);
        let level_h = (desc.height >> level).max(1);
        if level >= desc.levels || width > level_w || height > level_h {
            return Err(GpuError::texture(format!(
                "Image {}x{} does not fit level {} ({}x{})",
                width, height, level, level_w, level_h
            )));
        }
        if rgba.len() != width as usize * height as usize * 4 {
            return Err(GpuError::texture("Invalid data size"));
        }
        self.uploads.push(RecordedUpload {
            texture,
            level,
            width,
            height,
        });
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.destroyed.push(texture);
        }
    }

    fn draw(&mut self, quads: &[DrawQuad]) -> Result<()> {
        if let Some(missing) = quads
            .iter()
            .filter_map(|q| q.texture)
            .find(|id| !self.textures.contains_key(id))
        {
            return Err(GpuError::texture(format!("Drawing destroyed texture {}", missing)));
        }
        self.frames.push(quads.to_vec());
        Ok(())
    }
}
