//! Instanced page-quad pipeline.
//!
//! Every visible page is one instance of a unit quad. Pages differ in texture,
//! so the pass rebinds group 1 per instance.

use wgpu::util::DeviceExt;

use super::{BindGroupLayoutBuilder, PipelineBuilder};
use crate::bindings;
use crate::config::ClearColor;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::texture::MipTexture;
use crate::uniform::{PageInstance, QuadVertex, ScreenUniform};

/// One page to draw this frame.
pub struct PageDraw<'a> {
    pub bind_group: &'a wgpu::BindGroup,
    pub instance: PageInstance,
}

pub struct PagePipeline {
    render_pipeline: wgpu::RenderPipeline,
    quad_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    screen_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
}

impl PagePipeline {
    /// Compile the page shader and build the pipeline.
    ///
    /// Shader and link failures surface as `GpuError::ShaderCompilation`.
    pub async fn new(ctx: &GpuContext) -> Result<Self> {
        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Page Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/page.wgsl").into()),
            });

        let screen_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Screen Uniform Buffer"),
                contents: bytemuck::cast_slice(&[ScreenUniform::new(
                    ctx.width() as f32,
                    ctx.height() as f32,
                )]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let uniform_layout = BindGroupLayoutBuilder::new(&ctx.device)
            .with_label("Page Uniform Layout")
            .add_uniform_buffer(bindings::UNIFORM_SCREEN_BINDING, wgpu::ShaderStages::VERTEX)
            .build();

        let texture_layout = BindGroupLayoutBuilder::new(&ctx.device)
            .with_label("Page Texture Layout")
            .add_texture_2d(bindings::TEXTURE_BINDING, wgpu::ShaderStages::FRAGMENT)
            .add_sampler(bindings::SAMPLER_BINDING, wgpu::ShaderStages::FRAGMENT)
            .build();

        let uniform_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Page Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: bindings::UNIFORM_SCREEN_BINDING,
                resource: screen_buffer.as_entire_binding(),
            }],
        });

        let render_pipeline = PipelineBuilder::new(&ctx.device, ctx.surface_config.format)
            .with_label("Page Render Pipeline")
            .with_shader(&shader, "vs_main", "fs_main")
            .with_vertex_buffer(QuadVertex::desc())
            .with_vertex_buffer(PageInstance::desc())
            .with_bind_group_layouts(&[&uniform_layout, &texture_layout])
            .build()?;

        if let Some(error) = ctx.device.pop_error_scope().await {
            return Err(GpuError::ShaderCompilation(error.to_string()));
        }

        let quad_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Quad Vertex Buffer"),
                contents: bytemuck::cast_slice(&QuadVertex::QUAD),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Quad Index Buffer"),
                contents: bytemuck::cast_slice(&QuadVertex::INDICES),
                usage: wgpu::BufferUsages::INDEX,
            });

        log::info!("Page pipeline ready ({:?})", ctx.surface_config.format);

        Ok(Self {
            render_pipeline,
            quad_buffer,
            index_buffer,
            screen_buffer,
            uniform_bind_group,
            texture_layout,
        })
    }

    /// Bind group for one page texture.
    pub fn create_texture_bind_group(&self, ctx: &GpuContext, texture: &MipTexture) -> wgpu::BindGroup {
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Page Texture Bind Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings::TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        })
    }

    /// Draw all pages into `view` in list order (later pages on top).
    pub fn render(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        clear: ClearColor,
        pages: &[PageDraw<'_>],
    ) {
        ctx.queue.write_buffer(
            &self.screen_buffer,
            0,
            bytemuck::cast_slice(&[ScreenUniform::new(ctx.width() as f32, ctx.height() as f32)]),
        );

        let instances: Vec<PageInstance> = pages.iter().map(|p| p.instance).collect();
        let instance_buffer = (!instances.is_empty()).then(|| {
            ctx.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Page Instance Buffer"),
                    contents: bytemuck::cast_slice(&instances),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Page Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear.into()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let Some(instance_buffer) = instance_buffer.as_ref() else {
            return;
        };

        render_pass.set_pipeline(&self.render_pipeline);
        render_pass.set_bind_group(bindings::UNIFORM_GROUP, &self.uniform_bind_group, &[]);
        render_pass.set_vertex_buffer(bindings::QUAD_SLOT, self.quad_buffer.slice(..));
        render_pass.set_vertex_buffer(bindings::INSTANCE_SLOT, instance_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

        let index_count = QuadVertex::INDICES.len() as u32;
        for (i, page) in pages.iter().enumerate() {
            let i = i as u32;
            render_pass.set_bind_group(bindings::TEXTURE_GROUP, page.bind_group, &[]);
            render_pass.draw_indexed(0..index_count, 0, i..i + 1);
        }
    }
}
