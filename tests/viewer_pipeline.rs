//! End-to-end: tiles and layouts from an in-memory source, gestures and
//! overlay selection through the viewer, drawing into a recording backend.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use mipview::cache::{InlineScheduler, LevelLayout, Manifest, MemorySource};
use mipview::compose::PageDirection;
use mipview::config::ViewerConfig;
use mipview::format::{PixelFormat, Tile, encode_single};
use mipview::geometry::{Point, Rect, Size};
use mipview::overlay::{PanelContent, PanelSink, Selection};
use mipview::render::RecordingBackend;
use mipview::{Viewer, Viewport};
use web_time::Instant;

const PARENT: Size = Size {
    width: 400.0,
    height: 300.0,
};

fn manifest() -> Manifest {
    Manifest {
        page_count: 3,
        page_width: 200,
        page_height: 300,
        levels: (0..2)
            .map(|level| LevelLayout::PerPage {
                path: format!("tiles/{}/{{page}}.mip", level),
            })
            .collect(),
    }
}

/// Three symbols "abc" at layout y = 10, hint over "ab". Page 2 has no
/// layout document.
fn layout_json() -> String {
    serde_json::json!({
        "resolution": { "width": 200.0, "height": 300.0 },
        "paragraphs": [{
            "bbox": { "x": 10.0, "y": 10.0, "width": 60.0, "height": 20.0 },
            "symbols": [
                { "bbox": { "x": 10.0, "y": 10.0, "width": 20.0, "height": 20.0 }, "text": "a" },
                { "bbox": { "x": 30.0, "y": 10.0, "width": 20.0, "height": 20.0 }, "text": "b" },
                { "bbox": { "x": 50.0, "y": 10.0, "width": 20.0, "height": 20.0 }, "text": "c" }
            ],
            "hints": [{ "begin": 0, "end": 1, "results": ["ab!"] }]
        }],
        "clusters": []
    })
    .to_string()
}

fn source() -> Arc<MemorySource> {
    let manifest = manifest();
    let source = MemorySource::new();
    for info in manifest.files() {
        let (width, height) = manifest.level_size(info.level);
        let tile = Tile::new(
            width,
            height,
            PixelFormat::Luma8,
            vec![128; (width * height) as usize],
        );
        source.insert(info.name.clone(), encode_single(&tile));
    }
    source.insert("layout/0.json", layout_json().into_bytes());
    source.insert("layout/1.json", layout_json().into_bytes());
    Arc::new(source)
}

struct Harness {
    viewer: Viewer<RecordingBackend>,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        let source = source();
        let viewer = Viewer::new(
            ViewerConfig::default(),
            manifest(),
            Box::new(InlineScheduler::new(Arc::clone(&source))),
            Box::new(InlineScheduler::new(source)),
            RecordingBackend::new(),
            PARENT,
        );
        Self {
            viewer,
            now: Instant::now(),
        }
    }

    fn tick(&mut self) -> bool {
        self.now += Duration::from_millis(16);
        self.viewer.frame(self.now).unwrap()
    }

    /// Run frames until the viewer reports nothing left to do.
    fn settle(&mut self) {
        for _ in 0..500 {
            if !self.tick() {
                return;
            }
        }
        panic!("viewer never went idle");
    }

    fn click(&mut self, at: Point) {
        self.viewer.pointer_down(0, at, self.now);
        self.now += Duration::from_millis(40);
        self.viewer.pointer_up(0, at, self.now);
        self.tick();
    }

    /// Single-pointer drag from `from` to `to` with a frame per step.
    fn swipe(&mut self, from: Point, to: Point, steps: usize) {
        self.viewer.pointer_down(1, from, self.now);
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            let at = Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t);
            self.now += Duration::from_millis(16);
            self.viewer.pointer_move(1, at, self.now);
            self.viewer.frame(self.now).unwrap();
        }
        for _ in 0..10 {
            self.tick();
        }
        self.viewer.pointer_up(1, to, self.now);
    }
}

#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<Point>>>);

impl PanelSink for SharedSink {
    fn set_position(&mut self, position: Point) {
        self.0.borrow_mut().push(position);
    }

    fn set_size(&mut self, _size: Size) {}
}

#[test]
fn test_first_frames_load_and_draw_the_current_page() {
    let mut h = Harness::new();
    assert_eq!(h.viewer.current_page(), 0);
    assert_eq!(h.viewer.viewport(), Viewport::new(100.0, 0.0, 1.0));

    h.tick();
    let first = h.viewer.backend_mut().last_frame().unwrap().to_vec();
    assert!(first.iter().all(|q| q.texture.is_none()), "nothing resident yet");

    h.settle();
    assert_eq!(h.viewer.renderer().texture_levels(0), Some((0, 1)));
    assert!(h.viewer.layout(0).is_some());
    assert!(!h.viewer.overlay().geometry().is_empty());

    let frame = h.viewer.backend_mut().last_frame().unwrap().to_vec();
    let current = frame
        .iter()
        .find(|q| q.rect == Rect::new(100.0, 0.0, 200.0, 300.0))
        .expect("current page quad");
    assert!(current.texture.is_some());
    // The next page peeks in from the right; page 0 has no predecessor.
    assert_eq!(frame.len(), 2);
}

#[test]
fn test_click_selects_hint_range() {
    let mut h = Harness::new();
    h.settle();

    let highlights = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&highlights);
    h.viewer
        .overlay_mut()
        .on_highlight(move |rects| seen.borrow_mut().push(rects.to_vec()));

    // Symbol "a" sits at screen (110, 10) in the fitted viewport.
    h.click(Point::new(120.0, 20.0));

    assert_eq!(
        h.viewer.overlay().selection(),
        Some(Selection::Range {
            paragraph: 0,
            begin: 0,
            end: 1
        })
    );
    assert_eq!(
        h.viewer.overlay().panel_content(),
        Some(&PanelContent::Hints {
            text: "ab".to_string(),
            results: vec!["ab!".to_string()],
        })
    );
    let last = highlights.borrow().last().cloned().unwrap();
    assert_eq!(
        last,
        vec![
            Rect::new(110.0, 10.0, 20.0, 20.0),
            Rect::new(130.0, 10.0, 20.0, 20.0)
        ]
    );
}

#[test]
fn test_panel_follows_selection() {
    let mut h = Harness::new();
    let sink = SharedSink::default();
    let positions = Rc::clone(&sink.0);
    h.viewer.set_panel_sink(Box::new(sink), Size::new(100.0, 40.0));
    h.settle();
    assert!(positions.borrow().is_empty());

    h.click(Point::new(120.0, 20.0));
    let placed = *positions.borrow().last().expect("panel placed");
    assert!(placed.x >= 0.0 && placed.x + 100.0 <= PARENT.width);
    assert!(placed.y >= 0.0 && placed.y + 40.0 <= PARENT.height);
}

#[test]
fn test_click_away_clears_selection() {
    let mut h = Harness::new();
    h.settle();
    h.click(Point::new(120.0, 20.0));
    assert!(h.viewer.overlay().selection().is_some());

    h.click(Point::new(200.0, 250.0));
    assert!(h.viewer.overlay().selection().is_none());
    assert!(h.viewer.overlay().highlights().is_empty());
}

#[test]
fn test_swipe_past_edge_turns_page() {
    let mut h = Harness::new();
    h.settle();
    h.click(Point::new(120.0, 20.0));
    assert!(h.viewer.overlay().selection().is_some());

    let changes = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&changes);
    h.viewer
        .on_viewport_change(move |_| *counter.borrow_mut() += 1);

    h.swipe(Point::new(300.0, 150.0), Point::new(50.0, 150.0), 10);

    assert_eq!(h.viewer.current_page(), 1);
    assert_eq!(h.viewer.overlay().page(), Some(1));
    assert!(h.viewer.overlay().selection().is_none());
    assert!(*changes.borrow() > 0);

    h.settle();
    assert_eq!(h.viewer.viewport(), Viewport::new(100.0, 0.0, 1.0));
    assert!(h.viewer.layout(1).is_some());
    assert_eq!(h.viewer.renderer().texture_levels(1), Some((0, 1)));
}

#[test]
fn test_small_drag_does_not_turn_page() {
    let mut h = Harness::new();
    h.settle();
    h.swipe(Point::new(200.0, 150.0), Point::new(170.0, 150.0), 5);
    h.settle();
    assert_eq!(h.viewer.current_page(), 0);
    assert_eq!(h.viewer.viewport(), Viewport::new(100.0, 0.0, 1.0));
}

#[test]
fn test_swipe_right_on_first_page_stays() {
    let mut h = Harness::new();
    h.settle();
    h.swipe(Point::new(100.0, 150.0), Point::new(380.0, 150.0), 10);
    h.settle();
    assert_eq!(h.viewer.current_page(), 0);
}

#[test]
fn test_keyboard_navigation_stops_at_ends() {
    let mut h = Harness::new();
    h.settle();
    assert!(!h.viewer.turn_page(PageDirection::Previous));
    assert!(h.viewer.turn_page(PageDirection::Next));
    assert_eq!(h.viewer.current_page(), 1);

    assert!(h.viewer.go_to_page(2));
    assert!(!h.viewer.go_to_page(2));
    assert!(!h.viewer.go_to_page(3));
    assert!(!h.viewer.turn_page(PageDirection::Next));
    assert_eq!(h.viewer.current_page(), 2);
}

#[test]
fn test_page_without_layout_has_empty_overlay() {
    let mut h = Harness::new();
    h.settle();
    assert!(h.viewer.go_to_page(2));
    h.settle();

    assert!(h.viewer.layout(2).is_none());
    assert!(h.viewer.overlay().geometry().is_empty());
    assert_eq!(h.viewer.renderer().texture_levels(2), Some((0, 1)));

    h.click(Point::new(120.0, 20.0));
    assert!(h.viewer.overlay().selection().is_none());
}

#[test]
fn test_shutdown_releases_textures() {
    let mut h = Harness::new();
    h.settle();
    assert!(h.viewer.backend_mut().live_textures() > 0);
    h.viewer.shutdown();
    assert_eq!(h.viewer.backend_mut().live_textures(), 0);
}
