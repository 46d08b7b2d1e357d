//! Default tuning values.

/// Movement in screen pixels before a touch stops being a tap
pub const DEFAULT_MOVE_THRESHOLD: f32 = 8.0;

/// Maximum delay between two taps of a double tap
pub const DEFAULT_DOUBLE_TAP_MS: u64 = 300;

/// Maximum screen distance between two taps of a double tap
pub const DEFAULT_DOUBLE_TAP_DISTANCE: f32 = 40.0;

/// Stationary single touch duration that fires the hold timeout
pub const DEFAULT_HOLD_TIMEOUT_MS: u64 = 500;

/// Largest content-to-screen scale
pub const DEFAULT_MAX_ZOOM: f32 = 6.0;

/// Extra travel allowed past a position bound, in screen pixels
pub const DEFAULT_OVERSCROLL_LIMIT: f32 = 120.0;

/// Release integration step
pub const RELEASE_TIMESTEP_SECS: f32 = 1.0 / 120.0;

/// Upper bound on release steps per frame after a stall
pub const MAX_RELEASE_STEPS: u32 = 60;

/// Files the tile cache keeps decoded at once
pub const DEFAULT_LOADED_FILE_CAP: usize = 24;

/// GPU page textures kept by the renderer
pub const DEFAULT_TEXTURE_SLOTS: usize = 8;

/// Images at or below this alpha are not drawn
pub const DEFAULT_ALPHA_CULL: f32 = 0.004;

/// Gap between neighbouring pages in content pixels
pub const DEFAULT_PAGE_GAP: f32 = 48.0;

/// Snap radius for symbol hit testing, in page pixels
pub const DEFAULT_SNAP_DISTANCE: f32 = 24.0;

/// Request timeout for the HTTP content source
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
