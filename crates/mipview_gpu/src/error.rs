use thiserror::Error;

/// Failures of the GPU layer.
///
/// Context and pipeline errors are fatal to the renderer; texture errors only
/// affect the page whose texture was being built.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("Failed to find suitable GPU adapter")]
    AdapterNotFound,

    #[error("Failed to request adapter: {0}")]
    AdapterRequest(#[from] wgpu::RequestAdapterError),

    #[error("Failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Failed to create surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    #[error("Surface configuration error: incompatible surface")]
    SurfaceConfigError,

    #[error("Surface frame unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("Texture error: {0}")]
    Texture(String),

    #[error("Shader compilation error: {0}")]
    ShaderCompilation(String),
}

impl GpuError {
    /// Create a texture error with a message.
    pub fn texture(message: impl Into<String>) -> Self {
        Self::Texture(message.into())
    }

    /// Whether the error leaves the context unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GpuError::Texture(_) | GpuError::Surface(_))
    }
}

pub type Result<T> = std::result::Result<T, GpuError>;
