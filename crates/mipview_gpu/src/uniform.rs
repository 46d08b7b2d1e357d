//! Plain-old-data types shared with the page shader.

use bytemuck::{Pod, Zeroable};

/// Surface size, used to map pixel coordinates to clip space.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ScreenUniform {
    pub size: [f32; 2],
    pub _pad: [f32; 2],
}

impl ScreenUniform {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: [width.max(1.0), height.max(1.0)],
            _pad: [0.0; 2],
        }
    }
}

/// Per-page instance data: screen rectangle, UV correction and opacity.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PageInstance {
    /// x, y, width, height in surface pixels.
    pub rect: [f32; 4],
    /// Fraction of the power-of-two texture covered by the real image.
    pub uv_scale: [f32; 2],
    pub alpha: f32,
    pub _pad: f32,
}

impl PageInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![1 => Float32x4, 2 => Float32x2, 3 => Float32];

    pub fn new(rect: [f32; 4], uv_scale: [f32; 2], alpha: f32) -> Self {
        Self {
            rect,
            uv_scale,
            alpha,
            _pad: 0.0,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PageInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Unit-quad corner; the shader scales it by the instance rectangle.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    pub corner: [f32; 2],
}

impl QuadVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub const QUAD: [QuadVertex; 4] = [
        QuadVertex { corner: [0.0, 0.0] },
        QuadVertex { corner: [1.0, 0.0] },
        QuadVertex { corner: [1.0, 1.0] },
        QuadVertex { corner: [0.0, 1.0] },
    ];

    pub const INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}
