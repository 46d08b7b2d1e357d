//! [`RenderBackend`] over a wgpu surface.

use std::collections::HashMap;

use mipview_gpu::{
    ClearColor, GpuContext, GpuError, MipTexture, PageDraw, PageInstance, PagePipeline, Result,
    TextureConfig,
};

use super::backend::{DrawQuad, RenderBackend, TextureDesc, TextureId};

/// Placeholder fill for pages with no resident tiles.
const PLACEHOLDER_RGBA: [u8; 4] = [235, 235, 230, 255];

struct GpuPageTexture {
    texture: MipTexture,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuBackend {
    ctx: GpuContext,
    pipeline: PagePipeline,
    textures: HashMap<TextureId, GpuPageTexture>,
    placeholder: GpuPageTexture,
    texture_config: TextureConfig,
    clear: ClearColor,
    next_id: TextureId,
}

impl WgpuBackend {
    pub async fn new(ctx: GpuContext, clear: ClearColor) -> Result<Self> {
        let pipeline = PagePipeline::new(&ctx).await?;
        let placeholder_texture = MipTexture::solid(&ctx, PLACEHOLDER_RGBA)?;
        let placeholder = GpuPageTexture {
            bind_group: pipeline.create_texture_bind_group(&ctx, &placeholder_texture),
            texture: placeholder_texture,
        };
        Ok(Self {
            ctx,
            pipeline,
            textures: HashMap::new(),
            placeholder,
            texture_config: TextureConfig::default(),
            clear,
            next_id: 0,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }
}

impl RenderBackend for WgpuBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        let texture = MipTexture::new(
            &self.ctx,
            desc.width,
            desc.height,
            desc.levels,
            &self.texture_config,
        )?;
        let bind_group = self.pipeline.create_texture_bind_group(&self.ctx, &texture);
        self.next_id += 1;
        self.textures
            .insert(self.next_id, GpuPageTexture { texture, bind_group });
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
        let page = self
            .textures
            .get(&texture)
            .ok_or_else(|| GpuError::texture(format!("Unknown texture {}", texture)))?;
        page.texture.upload_level(&self.ctx, level, width, height, rgba)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(page) = self.textures.remove(&texture) {
            page.texture.texture.destroy();
        }
    }

    fn draw(&mut self, quads: &[DrawQuad]) -> Result<()> {
        let frame = match self.ctx.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                self.ctx.reconfigure();
                return Ok(());
            }
            Err(e) => return Err(GpuError::Surface(e)),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let draws: Vec<PageDraw<'_>> = quads
            .iter()
            .map(|quad| {
                let bind_group = quad
                    .texture
                    .and_then(|id| self.textures.get(&id))
                    .map_or(&self.placeholder.bind_group, |page| &page.bind_group);
                PageDraw {
                    bind_group,
                    instance: PageInstance::new(
                        [quad.rect.x, quad.rect.y, quad.rect.width, quad.rect.height],
                        quad.uv_scale,
                        quad.alpha,
                    ),
                }
            })
            .collect();

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Page Render Encoder"),
            });
        self.pipeline
            .render(&self.ctx, &mut encoder, &view, self.clear, &draws);
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
