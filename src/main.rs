use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use web_time::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use mipview::compose::PageDirection;
use mipview::config::{LogLevel, ViewerConfig};
use mipview::error::ViewerError;
use mipview::geometry::{Point, Size};
use mipview::render::WgpuBackend;
use mipview::{ContentSource, HttpSource, Viewer};
use mipview_gpu::{ClearColor, GpuContext};

/// Pointer id of the mouse; touch ids are offset past it.
const MOUSE_POINTER: u64 = 0;

/// Pixels of a precise scroll that count as one wheel notch.
const PIXELS_PER_NOTCH: f32 = 40.0;

#[derive(Parser, Debug)]
#[command(name = "mipview", version, about = "Progressive tiled page viewer")]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Content server base URL (overrides the config file)
    #[arg(long)]
    base_url: Option<String>,
    /// Page to open, zero based
    #[arg(long, default_value_t = 0)]
    page: usize,
    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<LogLevel>,
}

struct ViewerState {
    window: Arc<Window>,
    viewer: Viewer<WgpuBackend>,
    cursor: Point,
    mouse_down: bool,
}

impl ViewerState {
    fn new(window: Arc<Window>, config: ViewerConfig, page: usize) -> Result<Self, ViewerError> {
        let ctx = pollster::block_on(GpuContext::new(Arc::clone(&window)))?;
        let [r, g, b] = config.render.background;
        let backend = pollster::block_on(WgpuBackend::new(ctx, ClearColor::rgb(r, g, b)))?;

        let source: Arc<dyn ContentSource> = Arc::new(HttpSource::new(
            &config.source.base_url,
            config.source.request_timeout(),
        )?);
        let size = window.inner_size();
        let parent = Size::new(size.width as f32, size.height as f32);
        let mut viewer = Viewer::open(config, source, backend, parent)?;
        if page != 0 && !viewer.go_to_page(page) {
            log::warn!(
                "Page {} out of range ({} pages), staying on page 0",
                page,
                viewer.page_count()
            );
        }
        Ok(Self {
            window,
            viewer,
            cursor: Point::ZERO,
            mouse_down: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewer.backend_mut().resize(width, height);
        self.viewer
            .resize(Size::new(width.max(1) as f32, height.max(1) as f32));
    }

    /// Returns true when the event changed anything worth a redraw.
    fn input(&mut self, event: &WindowEvent) -> bool {
        let now = Instant::now();
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = to_point(*position);
                if self.mouse_down {
                    self.viewer.pointer_move(MOUSE_POINTER, self.cursor, now);
                }
                self.mouse_down
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                match state {
                    ElementState::Pressed => {
                        self.mouse_down = true;
                        self.viewer.pointer_down(MOUSE_POINTER, self.cursor, now);
                    }
                    ElementState::Released => {
                        self.mouse_down = false;
                        self.viewer.pointer_up(MOUSE_POINTER, self.cursor, now);
                    }
                }
                true
            }
            WindowEvent::CursorLeft { .. } if self.mouse_down => {
                self.mouse_down = false;
                self.viewer.pointer_cancel(MOUSE_POINTER);
                true
            }
            WindowEvent::Touch(touch) => {
                let id = touch.id + 1;
                let position = to_point(touch.location);
                match touch.phase {
                    TouchPhase::Started => self.viewer.pointer_down(id, position, now),
                    TouchPhase::Moved => self.viewer.pointer_move(id, position, now),
                    TouchPhase::Ended => self.viewer.pointer_up(id, position, now),
                    TouchPhase::Cancelled => self.viewer.pointer_cancel(id),
                }
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_NOTCH,
                };
                self.viewer.wheel(self.cursor, notches);
                true
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(keycode),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match keycode {
                KeyCode::ArrowLeft | KeyCode::PageUp => {
                    self.viewer.turn_page(PageDirection::Previous)
                }
                KeyCode::ArrowRight | KeyCode::PageDown => {
                    self.viewer.turn_page(PageDirection::Next)
                }
                KeyCode::Home => self.viewer.go_to_page(0),
                KeyCode::End => {
                    let last = self.viewer.page_count().saturating_sub(1);
                    self.viewer.go_to_page(last)
                }
                _ => false,
            },
            _ => false,
        }
    }
}

fn to_point(position: PhysicalPosition<f64>) -> Point {
    Point::new(position.x as f32, position.y as f32)
}

struct ViewerApp {
    config: Option<ViewerConfig>,
    start_page: usize,
    state: Option<ViewerState>,
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let Some(config) = self.config.take() else {
            return;
        };
        let attributes = WindowAttributes::default()
            .with_title("mipview")
            .with_inner_size(winit::dpi::LogicalSize::new(1024, 768));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        match ViewerState::new(Arc::clone(&window), config, self.start_page) {
            Ok(state) => {
                window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                log::error!("Failed to start viewer: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        if state.input(&event) {
            state.window.request_redraw();
            return;
        }
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => {
                state.viewer.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.resize(size.width, size.height);
                state.window.request_redraw();
            }
            WindowEvent::RedrawRequested => match state.viewer.frame(Instant::now()) {
                Ok(true) => state.window.request_redraw(),
                Ok(false) => {}
                Err(ViewerError::Gpu(e)) if e.is_fatal() => {
                    log::error!("Fatal GPU error: {}", e);
                    state.viewer.shutdown();
                    event_loop.exit();
                }
                Err(e) => {
                    log::warn!("Frame failed: {}", e);
                    state.window.request_redraw();
                }
            },
            _ => {}
        }
    }
}

fn main() {
    let args = Args::parse();

    let config_result = args.config.as_deref().map(ViewerConfig::load);
    let mut config = match config_result {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
        None => ViewerConfig::default(),
    };
    if let Some(base_url) = args.base_url {
        config.source.base_url = base_url;
    }
    let level = args.log_level.unwrap_or(config.log_level);

    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .init();
    log::info!("mipview {} starting", env!("CARGO_PKG_VERSION"));

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = ViewerApp {
        config: Some(config),
        start_page: args.page,
        state: None,
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
    }
}
