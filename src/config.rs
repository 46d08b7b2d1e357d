//! Viewer configuration.
//!
//! Settings are read from a JSON file. Every section and field has a default,
//! so partial files are valid and unknown fields are ignored.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ViewerError;

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Where pages, tiles and layouts come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL all content paths are resolved against
    pub base_url: String,
    /// Path of the tile manifest
    pub manifest_path: String,
    /// Layout document path, `{page}` is replaced by the page index
    pub layout_pattern: String,
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            manifest_path: "manifest.json".to_string(),
            layout_pattern: "layout/{page}.json".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn layout_path(&self, page: usize) -> String {
        self.layout_pattern.replace("{page}", &page.to_string())
    }
}

/// Gesture recognition and release physics.
///
/// Physics constants are tuning values, not part of any contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Screen pixels a touch may travel and still count as a tap
    pub move_threshold: f32,
    pub double_tap_ms: u64,
    pub double_tap_distance: f32,
    pub hold_timeout_ms: u64,
    /// Minimum scale as a multiple of the fit-to-parent scale
    pub min_zoom_factor: f32,
    pub max_zoom: f32,
    /// Furthest the viewport may travel past a position bound
    pub overscroll_limit: f32,
    /// Furthest the scale may travel past a scale bound, as a fraction of it
    pub zoom_overscroll: f32,
    /// Smoothing coefficient for slow touches (0 = frozen, 1 = raw)
    pub smoothing_slow: f32,
    /// Smoothing coefficient for fast touches
    pub smoothing_fast: f32,
    /// Touch speed (px/s) at which smoothing reaches `smoothing_fast`
    pub fast_velocity: f32,
    /// Maximum latency extrapolation for panning touches
    pub extrapolation_ms: f32,
    /// Exponential drag rate of a release (1/s)
    pub drag: f32,
    /// Constant release deceleration (px/s²)
    pub deceleration: f32,
    /// Snap-back rate toward bounds (1/s)
    pub spring: f32,
    /// Release ends once squared speed and squared overscroll fall below this
    pub settle_epsilon: f32,
    /// Vertical drag distance that doubles the scale in single-finger zoom
    pub single_finger_zoom_rate: f32,
    /// Scale factor per wheel notch
    pub wheel_zoom_step: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            move_threshold: DEFAULT_MOVE_THRESHOLD,
            double_tap_ms: DEFAULT_DOUBLE_TAP_MS,
            double_tap_distance: DEFAULT_DOUBLE_TAP_DISTANCE,
            hold_timeout_ms: DEFAULT_HOLD_TIMEOUT_MS,
            min_zoom_factor: 1.0,
            max_zoom: DEFAULT_MAX_ZOOM,
            overscroll_limit: DEFAULT_OVERSCROLL_LIMIT,
            zoom_overscroll: 0.3,
            smoothing_slow: 0.45,
            smoothing_fast: 0.9,
            fast_velocity: 2000.0,
            extrapolation_ms: 12.0,
            drag: 2.5,
            deceleration: 900.0,
            spring: 14.0,
            settle_epsilon: 0.25,
            single_finger_zoom_rate: 100.0,
            wheel_zoom_step: 1.15,
        }
    }
}

impl GestureConfig {
    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_ms)
    }

    pub fn hold_timeout(&self) -> Duration {
        Duration::from_millis(self.hold_timeout_ms)
    }
}

/// One row of the preload table: pages within `radius` of the preload page
/// get `priority`, decaying by one per page of distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadTier {
    pub radius: usize,
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of files held decoded at once
    pub loaded_file_cap: usize,
    /// Preload tiers, checked in order; the first matching radius wins
    pub preload_tiers: Vec<PreloadTier>,
    /// Added per mip level, so coarse levels load first
    pub coarse_bias: u32,
    /// Priority of a file that a draw asked for and did not get
    pub request_priority: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            loaded_file_cap: DEFAULT_LOADED_FILE_CAP,
            preload_tiers: vec![
                PreloadTier {
                    radius: 0,
                    priority: 1000,
                },
                PreloadTier {
                    radius: 2,
                    priority: 500,
                },
                PreloadTier {
                    radius: 6,
                    priority: 100,
                },
            ],
            coarse_bias: 50,
            request_priority: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// GPU page textures kept alive
    pub texture_slots: usize,
    /// Images with alpha at or below this are skipped
    pub alpha_cull: f32,
    /// Background RGB
    pub background: [f64; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            texture_slots: DEFAULT_TEXTURE_SLOTS,
            alpha_cull: DEFAULT_ALPHA_CULL,
            background: [0.1, 0.1, 0.1],
        }
    }
}

/// Anchor positions, as fractions of the viewport along one axis, that move
/// the panel between the sides of the selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideThresholds {
    /// Beyond this the panel flips to the leading side
    pub on: f32,
    /// Below this it flips back
    pub off: f32,
}

/// Floating panel placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Space kept free at the viewport edges
    pub border: f32,
    /// Gap between the selection and the panel
    pub margin: f32,
    /// Panels wider than this fraction of the viewport stack vertically
    pub vertical_width_fraction: f32,
    /// Always stack vertically (phones)
    pub force_vertical: bool,
    /// Above or below the selection, by its vertical position
    pub vertical_sides: SideThresholds,
    /// Left or right of the selection, by its horizontal position
    pub horizontal_sides: SideThresholds,
    /// Changes below this fraction of the viewport are not emitted
    pub epsilon: f32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            border: 8.0,
            margin: 12.0,
            vertical_width_fraction: 0.4,
            force_vertical: false,
            vertical_sides: SideThresholds { on: 0.6, off: 0.4 },
            horizontal_sides: SideThresholds { on: 0.55, off: 0.45 },
            epsilon: 0.002,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Furthest a click may land from a symbol and still hit it (page pixels)
    pub snap_distance: f32,
    pub double_click_ms: u64,
    /// Screen pixels between the clicks of a double click
    pub double_click_distance: f32,
    /// Screen radius around a selection edge that starts an edge drag
    pub grab_radius: f32,
    /// Screen pixels an edge drag must travel before it stops being a tap
    pub drag_threshold: f32,
    pub panel: PanelConfig,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            snap_distance: DEFAULT_SNAP_DISTANCE,
            double_click_ms: DEFAULT_DOUBLE_TAP_MS,
            double_click_distance: DEFAULT_DOUBLE_TAP_DISTANCE,
            grab_radius: 22.0,
            drag_threshold: DEFAULT_MOVE_THRESHOLD,
            panel: PanelConfig::default(),
        }
    }
}

impl OverlayConfig {
    pub fn double_click_window(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }
}

/// Page composition and release thresholds that turn the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageTurnConfig {
    /// Horizontal release speed (px/s) that turns the page when at an edge
    pub velocity_threshold: f32,
    /// Horizontal overscroll, as a fraction of the parent width, that turns
    /// the page regardless of speed
    pub overscroll_fraction: f32,
    /// Gap between neighbouring pages (content pixels)
    pub page_gap: f32,
}

impl Default for PageTurnConfig {
    fn default() -> Self {
        Self {
            velocity_threshold: 1200.0,
            overscroll_fraction: 0.25,
            page_gap: DEFAULT_PAGE_GAP,
        }
    }
}

/// Complete viewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Version of the configuration file format
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub page_turn: PageTurnConfig,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            source: SourceConfig::default(),
            gesture: GestureConfig::default(),
            cache: CacheConfig::default(),
            render: RenderConfig::default(),
            overlay: OverlayConfig::default(),
            page_turn: PageTurnConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl ViewerConfig {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON. A version mismatch is logged, not rejected.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        if config.version != CONFIG_VERSION {
            log::warn!(
                "Config version mismatch: file is v{}, current is v{}. Missing fields use defaults.",
                config.version,
                CONFIG_VERSION
            );
        }
        Ok(config)
    }

    /// Load from a file on disk.
    pub fn load(path: &Path) -> Result<Self, ViewerError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ViewerError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
