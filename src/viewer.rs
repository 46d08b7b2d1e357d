//! Viewer controller.
//!
//! Owns every engine and drives them from pointer events and a per-frame
//! [`Viewer::frame`] call: pump the tile cache, step the gestures, compose the
//! page strip, render, and keep the overlay and its panel in step with the
//! displayed viewport.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use web_time::Instant;

use crate::cache::{
    ContentSource, DecodingSource, FetchRequest, FetchScheduler, Manifest, MipCache,
    ThreadScheduler,
};
use crate::compose::{PageDirection, compose_scene, page_advance};
use crate::config::{PageTurnConfig, ViewerConfig};
use crate::error::{Result, ViewerError};
use crate::format::PageGeometry;
use crate::geometry::{Point, Size};
use crate::gesture::{Bounds, ClickEvent, GestureEngine, GestureListener, ReleaseEvent, Viewport};
use crate::overlay::{OverlayEngine, PanelPlacer, PanelSink};
use crate::render::{RenderBackend, TiledRenderer};

/// Routes gesture notifications to the overlay and the page-turn check.
struct Router<'a> {
    overlay: &'a mut OverlayEngine,
    bounds: Option<Bounds>,
    page_turn: &'a PageTurnConfig,
    current: usize,
    page_count: usize,
    now: Instant,
    turn: Option<PageDirection>,
    viewport: Option<Viewport>,
}

impl<'a> Router<'a> {
    fn new(
        overlay: &'a mut OverlayEngine,
        bounds: Option<Bounds>,
        page_turn: &'a PageTurnConfig,
        current: usize,
        page_count: usize,
        now: Instant,
    ) -> Self {
        Self {
            overlay,
            bounds,
            page_turn,
            current,
            page_count,
            now,
            turn: None,
            viewport: None,
        }
    }
}

impl GestureListener for Router<'_> {
    fn on_click(&mut self, event: &ClickEvent) -> bool {
        self.overlay.on_image_click(event.position, self.now)
    }

    fn on_release(&mut self, event: &ReleaseEvent) -> bool {
        let Some(bounds) = self.bounds.as_ref() else {
            return false;
        };
        self.turn = page_advance(event, bounds, self.page_turn)
            .filter(|direction| direction.apply(self.current, self.page_count).is_some());
        self.turn.is_some()
    }

    fn on_viewport_change(&mut self, viewport: &Viewport) {
        self.viewport = Some(*viewport);
    }
}

type ViewportCallback = Box<dyn FnMut(&Viewport)>;

pub struct Viewer<B: RenderBackend> {
    config: ViewerConfig,
    gestures: GestureEngine,
    cache: MipCache,
    renderer: TiledRenderer<B>,
    overlay: OverlayEngine,
    panel: PanelPlacer,
    panel_sink: Option<(Box<dyn PanelSink>, Size)>,
    layout_fetcher: Box<dyn FetchScheduler>,
    layouts: HashMap<usize, Arc<PageGeometry>>,
    missing_layouts: HashSet<usize>,
    current: usize,
    parent: Size,
    /// Pointer currently dragging a selection edge
    overlay_pointer: Option<u64>,
    on_viewport_change: Option<ViewportCallback>,
}

impl<B: RenderBackend> Viewer<B> {
    /// Build a viewer over an already-loaded manifest. Tiles and layouts use
    /// separate schedulers.
    pub fn new(
        config: ViewerConfig,
        manifest: Manifest,
        tile_scheduler: Box<dyn FetchScheduler>,
        layout_fetcher: Box<dyn FetchScheduler>,
        backend: B,
        parent: Size,
    ) -> Self {
        let page = Size::new(manifest.page_width as f32, manifest.page_height as f32);
        let cache = MipCache::new(manifest, tile_scheduler, config.cache.clone());
        let mut gestures = GestureEngine::new(config.gesture.clone());
        gestures.set_bounds(page, parent);
        gestures.reset();

        let mut viewer = Self {
            gestures,
            cache,
            renderer: TiledRenderer::new(backend, config.render.clone()),
            overlay: OverlayEngine::new(config.overlay.clone()),
            panel: PanelPlacer::new(config.overlay.panel.clone()),
            panel_sink: None,
            layout_fetcher,
            layouts: HashMap::new(),
            missing_layouts: HashSet::new(),
            current: 0,
            parent,
            overlay_pointer: None,
            on_viewport_change: None,
            config,
        };
        viewer.show_page(0);
        viewer
    }

    /// Fetch the manifest from `source` and start background fetch threads.
    pub fn open(
        config: ViewerConfig,
        source: Arc<dyn ContentSource>,
        backend: B,
        parent: Size,
    ) -> Result<Self> {
        let bytes = source.fetch(&config.source.manifest_path)?;
        let manifest = Manifest::from_json(&String::from_utf8_lossy(&bytes))?;
        log::info!(
            "Manifest: {} pages of {}x{}, {} levels",
            manifest.page_count,
            manifest.page_width,
            manifest.page_height,
            manifest.level_count()
        );
        let tiles = ThreadScheduler::spawn(Arc::new(DecodingSource::new(Arc::clone(&source))))?;
        let layouts = ThreadScheduler::spawn(source)?;
        Ok(Self::new(
            config,
            manifest,
            Box::new(tiles),
            Box::new(layouts),
            backend,
            parent,
        ))
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.cache.page_count()
    }

    pub fn page_size(&self) -> Size {
        let (width, height) = self.cache.page_size();
        Size::new(width as f32, height as f32)
    }

    pub fn viewport(&self) -> Viewport {
        self.gestures.viewport()
    }

    pub fn gestures(&self) -> &GestureEngine {
        &self.gestures
    }

    pub fn cache(&self) -> &MipCache {
        &self.cache
    }

    pub fn renderer(&self) -> &TiledRenderer<B> {
        &self.renderer
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.renderer.backend_mut()
    }

    pub fn overlay(&self) -> &OverlayEngine {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut OverlayEngine {
        &mut self.overlay
    }

    /// Layout of a page, once fetched.
    pub fn layout(&self, page: usize) -> Option<&Arc<PageGeometry>> {
        self.layouts.get(&page)
    }

    pub fn on_viewport_change(&mut self, callback: impl FnMut(&Viewport) + 'static) {
        self.on_viewport_change = Some(Box::new(callback));
    }

    /// Attach the annotation panel; `size` is the panel's required size.
    pub fn set_panel_sink(&mut self, sink: Box<dyn PanelSink>, size: Size) {
        self.panel.reset();
        self.panel_sink = Some((sink, size));
    }

    pub fn resize(&mut self, parent: Size) {
        self.parent = parent;
        let page = self.page_size();
        self.gestures.set_bounds(page, parent);
        self.panel.reset();
        self.sync_overlay();
    }

    pub fn pointer_down(&mut self, id: u64, position: Point, now: Instant) {
        if self.overlay_pointer.is_none()
            && self.gestures.touch_count() == 0
            && self.overlay.drag_start(position)
        {
            self.overlay_pointer = Some(id);
            return;
        }
        self.gestures.pointer_down(id, position, now);
    }

    pub fn pointer_move(&mut self, id: u64, position: Point, now: Instant) {
        if self.overlay_pointer == Some(id) {
            self.overlay.drag_move(position);
        } else {
            self.gestures.pointer_move(id, position, now);
        }
    }

    pub fn pointer_up(&mut self, id: u64, position: Point, now: Instant) {
        if self.overlay_pointer == Some(id) {
            self.overlay_pointer = None;
            self.overlay.drag_end(position);
            return;
        }
        let mut router = Router::new(
            &mut self.overlay,
            self.gestures.bounds().copied(),
            &self.config.page_turn,
            self.current,
            self.cache.page_count(),
            now,
        );
        self.gestures.pointer_up(id, position, now, &mut router);
        if let Some(direction) = router.turn {
            self.turn_page(direction);
        }
    }

    pub fn pointer_cancel(&mut self, id: u64) {
        if self.overlay_pointer == Some(id) {
            self.overlay_pointer = None;
            self.overlay.drag_cancel();
        } else {
            self.gestures.pointer_cancel(id);
        }
    }

    pub fn wheel(&mut self, position: Point, notches: f32) {
        self.gestures.wheel(position, notches);
    }

    /// Move to the neighbouring page, sliding it in from where it was drawn.
    /// Returns false at either end of the document.
    pub fn turn_page(&mut self, direction: PageDirection) -> bool {
        let Some(page) = direction.apply(self.current, self.page_count()) else {
            return false;
        };
        let viewport = self.gestures.viewport();
        let offset = direction.content_offset(self.page_size(), &self.config.page_turn);
        log::info!("Page {} -> {}", self.current, page);
        self.show_page(page);
        self.gestures.set_viewport(Viewport::new(
            viewport.x + offset * viewport.scale,
            viewport.y,
            viewport.scale,
        ));
        self.sync_overlay();
        true
    }

    /// Jump to a page, fitted to the window.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page >= self.page_count() || page == self.current {
            return false;
        }
        log::info!("Page {} -> {}", self.current, page);
        self.show_page(page);
        self.gestures.reset();
        self.sync_overlay();
        true
    }

    /// Advance one frame. Returns true while anything is still moving or
    /// loading, i.e. another frame should follow.
    pub fn frame(&mut self, now: Instant) -> Result<bool> {
        let cache_changed = !self.cache.pump().is_empty();
        self.poll_layouts();

        let mut router = Router::new(
            &mut self.overlay,
            self.gestures.bounds().copied(),
            &self.config.page_turn,
            self.current,
            self.cache.page_count(),
            now,
        );
        let moved = self.gestures.update(now, &mut router);
        if let (Some(viewport), Some(callback)) = (router.viewport, self.on_viewport_change.as_mut()) {
            callback(&viewport);
        }

        self.sync_overlay();
        self.place_panel();

        let scene = compose_scene(
            &self.gestures.viewport(),
            self.page_size(),
            self.page_count(),
            self.current,
            self.parent,
            &self.config.page_turn,
        );
        self.renderer.set_scene(scene);
        self.renderer.render(&mut self.cache)?;

        Ok(moved
            || cache_changed
            || !self.gestures.is_idle()
            || self.cache.loading_count() > 0
            || self.layout_fetcher.in_flight() > 0)
    }

    /// Release GPU textures.
    pub fn shutdown(&mut self) {
        self.renderer.dispose();
    }

    fn show_page(&mut self, page: usize) {
        self.current = page;
        self.overlay_pointer = None;
        self.cache.set_preload_page(page);
        let geometry = self
            .layouts
            .get(&page)
            .cloned()
            .unwrap_or_else(|| Arc::new(PageGeometry::default()));
        self.overlay.set_page(page, geometry);
        self.request_layout();
    }

    fn request_layout(&mut self) {
        let page = self.current;
        if self.layout_fetcher.in_flight() > 0
            || self.layouts.contains_key(&page)
            || self.missing_layouts.contains(&page)
        {
            return;
        }
        let path = self.config.source.layout_path(page);
        self.layout_fetcher.submit(FetchRequest { file: page, path });
    }

    fn poll_layouts(&mut self) {
        while let Some(outcome) = self.layout_fetcher.poll() {
            let page = outcome.file;
            let parsed = outcome.result.map_err(ViewerError::from).and_then(|bytes| {
                PageGeometry::from_json(&String::from_utf8_lossy(&bytes)).map_err(ViewerError::from)
            });
            match parsed {
                Ok(geometry) => {
                    log::debug!(
                        "Layout for page {}: {} paragraphs",
                        page,
                        geometry.paragraphs.len()
                    );
                    let geometry = Arc::new(geometry);
                    self.layouts.insert(page, Arc::clone(&geometry));
                    if page == self.current {
                        self.overlay.set_page(page, geometry);
                        self.sync_overlay();
                    }
                }
                Err(e) => {
                    log::warn!("No overlay for page {}: {}", page, e);
                    self.missing_layouts.insert(page);
                }
            }
        }
        self.request_layout();
    }

    /// Map layout coordinates of the current page onto the screen.
    fn sync_overlay(&mut self) {
        let viewport = self.gestures.viewport();
        let resolution = self.overlay.geometry().resolution;
        let factor = if resolution.width > 0.0 {
            self.page_size().width / resolution.width
        } else {
            1.0
        };
        self.overlay
            .set_viewport(Viewport::new(viewport.x, viewport.y, viewport.scale * factor));
    }

    fn place_panel(&mut self) {
        let Some((sink, size)) = self.panel_sink.as_mut() else {
            return;
        };
        match self.overlay.panel_anchor() {
            Some(anchor) => {
                self.panel.place(&anchor, *size, self.parent, sink.as_mut());
            }
            None => self.panel.reset(),
        }
    }
}
