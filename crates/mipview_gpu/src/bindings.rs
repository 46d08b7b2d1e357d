//! Shader binding constants for the page pipeline.
//!
//! These numbers must match `shaders/page.wgsl`.

/// Group 0: Uniforms
pub const UNIFORM_GROUP: u32 = 0;
/// Binding 0 in group 0: surface size
pub const UNIFORM_SCREEN_BINDING: u32 = 0;

/// Group 1: per-page texture resources
pub const TEXTURE_GROUP: u32 = 1;
/// Binding 0 in group 1: page texture
pub const TEXTURE_BINDING: u32 = 0;
/// Binding 1 in group 1: sampler
pub const SAMPLER_BINDING: u32 = 1;

/// Vertex buffer slot of the unit quad.
pub const QUAD_SLOT: u32 = 0;
/// Vertex buffer slot of the per-page instances.
pub const INSTANCE_SLOT: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_are_distinct() {
        assert_ne!(UNIFORM_GROUP, TEXTURE_GROUP);
        assert_ne!(TEXTURE_BINDING, SAMPLER_BINDING);
        assert_ne!(QUAD_SLOT, INSTANCE_SLOT);
    }
}
