//! Text selection over the OCR geometry of the current page.
//!
//! Clicks select a symbol, its hint range or (on double click) its whole
//! cluster. An existing symbol selection can be resized by dragging either of
//! its edges. Every change is reported as a list of screen-space highlight
//! rectangles plus a [`PanelUpdate`] describing where the annotation panel
//! belongs and what it shows.

use std::sync::Arc;

use web_time::Instant;

use super::hit_test::{SymbolRef, nearest_in_paragraph, nearest_symbol};
use super::panel::PanelAnchor;
use crate::config::OverlayConfig;
use crate::format::{PageGeometry, Paragraph};
use crate::geometry::{Point, Rect};
use crate::gesture::Viewport;

/// Current selection. Symbol ranges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Range {
        paragraph: usize,
        begin: usize,
        end: usize,
    },
    Cluster(usize),
}

impl Selection {
    fn single(hit: SymbolRef) -> Self {
        Selection::Range {
            paragraph: hit.paragraph,
            begin: hit.symbol,
            end: hit.symbol,
        }
    }
}

/// What the annotation panel shows for the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelContent {
    /// Cluster selected by double click; the translation is requested
    Translation { cluster: usize, text: String },
    /// Selection matches a hint range
    Hints { text: String, results: Vec<String> },
    /// No hint covers the selection
    Unknown { text: String },
}

/// Where the panel goes and what it shows. `None` hides it.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelUpdate {
    pub anchor: Option<PanelAnchor>,
    pub content: Option<PanelContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Begin,
    End,
}

#[derive(Debug, Clone, Copy)]
struct EdgeDrag {
    paragraph: usize,
    edge: Edge,
    /// Boundary that stays put for the whole drag
    fixed: usize,
    start: Point,
    moved: bool,
}

type HighlightCallback = Box<dyn FnMut(&[Rect])>;
type PanelCallback = Box<dyn FnMut(&PanelUpdate)>;

pub struct OverlayEngine {
    config: OverlayConfig,
    page: Option<usize>,
    geometry: Arc<PageGeometry>,
    /// Layout coordinates to screen
    viewport: Viewport,
    selection: Option<Selection>,
    content: Option<PanelContent>,
    last_click: Option<(Instant, Point)>,
    drag: Option<EdgeDrag>,
    highlights: Vec<Rect>,
    anchor: Option<PanelAnchor>,
    on_highlight: Option<HighlightCallback>,
    on_panel: Option<PanelCallback>,
}

impl OverlayEngine {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            config,
            page: None,
            geometry: Arc::new(PageGeometry::default()),
            viewport: Viewport::identity(),
            selection: None,
            content: None,
            last_click: None,
            drag: None,
            highlights: Vec::new(),
            anchor: None,
            on_highlight: None,
            on_panel: None,
        }
    }

    pub fn on_highlight(&mut self, callback: impl FnMut(&[Rect]) + 'static) {
        self.on_highlight = Some(Box::new(callback));
    }

    pub fn on_panel(&mut self, callback: impl FnMut(&PanelUpdate) + 'static) {
        self.on_panel = Some(Box::new(callback));
    }

    pub fn page(&self) -> Option<usize> {
        self.page
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn panel_content(&self) -> Option<&PanelContent> {
        self.content.as_ref()
    }

    /// Highlight rectangles of the current selection, in screen pixels.
    pub fn highlights(&self) -> &[Rect] {
        &self.highlights
    }

    pub fn panel_anchor(&self) -> Option<PanelAnchor> {
        self.anchor
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Switch to another page's geometry. Clears the selection.
    pub fn set_page(&mut self, page: usize, geometry: Arc<PageGeometry>) {
        self.page = Some(page);
        self.geometry = geometry;
        self.last_click = None;
        self.clear();
    }

    /// Layout-to-screen transform. Highlights follow the new viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        if self.selection.is_some() {
            self.refresh();
        }
    }

    /// Drop the selection and hide the panel.
    pub fn clear(&mut self) {
        let had_any = self.selection.is_some() || self.content.is_some();
        self.selection = None;
        self.content = None;
        self.drag = None;
        if had_any {
            self.refresh();
        }
    }

    /// Handle a click on the page image. Returns true when consumed.
    pub fn on_image_click(&mut self, position: Point, now: Instant) -> bool {
        let point = self.viewport.to_content(position);
        let Some(hit) = nearest_symbol(&self.geometry, point, self.config.snap_distance) else {
            self.last_click = None;
            if self.selection.is_some() || self.content.is_some() {
                self.clear();
                return true;
            }
            return false;
        };

        let double = self.last_click.is_some_and(|(at, previous)| {
            now.saturating_duration_since(at) <= self.config.double_click_window()
                && previous.distance(position) <= self.config.double_click_distance
        });

        if double {
            self.last_click = None;
            if let Some(cluster) = self.geometry.cluster_of(hit.paragraph) {
                log::debug!("Cluster {} selected, requesting translation", cluster);
                self.selection = Some(Selection::Cluster(cluster));
                self.content = Some(PanelContent::Translation {
                    cluster,
                    text: self.geometry.clusters[cluster].translation.clone(),
                });
                self.refresh();
                return true;
            }
        } else {
            self.last_click = Some((now, position));
        }

        let paragraph = &self.geometry.paragraphs[hit.paragraph];
        let (selection, content) = match paragraph.hints.iter().find(|h| h.contains(hit.symbol)) {
            Some(hint) => (
                Selection::Range {
                    paragraph: hit.paragraph,
                    begin: hint.begin,
                    end: hint.end,
                },
                PanelContent::Hints {
                    text: paragraph.text(hint.begin, hint.end),
                    results: hint.results.clone(),
                },
            ),
            None => (
                Selection::single(hit),
                PanelContent::Unknown {
                    text: paragraph.text(hit.symbol, hit.symbol),
                },
            ),
        };
        self.selection = Some(selection);
        self.content = Some(content);
        self.refresh();
        true
    }

    /// Begin an edge drag if `position` grabs an edge of the selection.
    /// Returns true when a drag started.
    pub fn drag_start(&mut self, position: Point) -> bool {
        let Some(Selection::Range {
            paragraph,
            begin,
            end,
        }) = self.selection
        else {
            return false;
        };
        let Some(edge) = self.grabbed_edge(paragraph, begin, end, position) else {
            return false;
        };
        let fixed = match edge {
            Edge::Begin => end,
            Edge::End => begin,
        };
        log::trace!("Edge drag {:?} started, fixed at {}", edge, fixed);
        self.drag = Some(EdgeDrag {
            paragraph,
            edge,
            fixed,
            start: position,
            moved: false,
        });
        true
    }

    pub fn drag_move(&mut self, position: Point) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        if !drag.moved {
            if drag.start.distance(position) <= self.config.drag_threshold {
                return;
            }
            drag.moved = true;
        }
        let drag = *drag;
        let point = self.viewport.to_content(position);
        let Some(symbol) = nearest_in_paragraph(&self.geometry.paragraphs[drag.paragraph], point)
        else {
            return;
        };
        let (begin, end) = match drag.edge {
            Edge::Begin => (symbol.min(drag.fixed), drag.fixed),
            Edge::End => (drag.fixed, symbol.max(drag.fixed)),
        };
        let selection = Selection::Range {
            paragraph: drag.paragraph,
            begin,
            end,
        };
        if self.selection != Some(selection) {
            self.select_range(drag.paragraph, begin, end);
        }
    }

    /// Finish an edge drag. A drag that never moved collapses the selection
    /// to the symbol under the pointer.
    pub fn drag_end(&mut self, position: Point) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        if drag.moved {
            return;
        }
        let point = self.viewport.to_content(position);
        if let Some(symbol) = nearest_in_paragraph(&self.geometry.paragraphs[drag.paragraph], point)
        {
            self.select_range(drag.paragraph, symbol, symbol);
        }
    }

    /// Abandon an edge drag, keeping whatever it selected so far.
    pub fn drag_cancel(&mut self) {
        self.drag = None;
    }

    fn select_range(&mut self, paragraph: usize, begin: usize, end: usize) {
        self.selection = Some(Selection::Range {
            paragraph,
            begin,
            end,
        });
        self.content = Some(range_content(&self.geometry.paragraphs[paragraph], begin, end));
        self.refresh();
    }

    /// Edge whose grab zone lies nearest to `position`, within the grab
    /// radius. Long selections grab on their outer two symbols per edge;
    /// short ones only on the boundary symbols.
    fn grabbed_edge(
        &self,
        paragraph: usize,
        begin: usize,
        end: usize,
        position: Point,
    ) -> Option<Edge> {
        let symbols = &self.geometry.paragraphs[paragraph].symbols;
        let radius = self.config.grab_radius;
        let screen = |i: usize| self.viewport.rect_to_screen(&symbols[i].bbox);
        let zone_distance = |range: std::ops::RangeInclusive<usize>| {
            range
                .map(|i| screen(i).distance_squared_to(position))
                .fold(f32::INFINITY, f32::min)
        };

        if begin == end {
            let rect = screen(begin);
            if rect.distance_squared_to(position) > radius * radius {
                return None;
            }
            return Some(if position.x < rect.center().x {
                Edge::Begin
            } else {
                Edge::End
            });
        }

        let (begin_zone, end_zone) = if end - begin + 1 <= 3 {
            (begin..=begin, end..=end)
        } else {
            (begin..=begin + 1, end - 1..=end)
        };
        let to_begin = zone_distance(begin_zone);
        let to_end = zone_distance(end_zone);
        let limit = radius * radius;
        if to_begin.min(to_end) > limit {
            return None;
        }
        Some(if to_begin <= to_end {
            Edge::Begin
        } else {
            Edge::End
        })
    }

    fn refresh(&mut self) {
        let geometry = &self.geometry;
        let layout_rects: Vec<Rect> = match self.selection {
            None => Vec::new(),
            Some(Selection::Range {
                paragraph,
                begin,
                end,
            }) => geometry.paragraphs[paragraph].symbols[begin..=end]
                .iter()
                .map(|s| s.bbox)
                .collect(),
            Some(Selection::Cluster(cluster)) => geometry.clusters[cluster]
                .paragraphs
                .iter()
                .map(|&p| geometry.paragraphs[p].bbox)
                .collect(),
        };
        self.highlights = layout_rects
            .iter()
            .map(|r| self.viewport.rect_to_screen(r))
            .collect();

        let bounds = match self.selection {
            Some(Selection::Cluster(cluster)) => Some(geometry.clusters[cluster].bbox),
            _ => layout_rects.iter().copied().reduce(|a, b| a.union(&b)),
        };
        self.anchor = bounds.map(|b| PanelAnchor::from_rect(&self.viewport.rect_to_screen(&b)));

        if let Some(callback) = self.on_highlight.as_mut() {
            callback(&self.highlights);
        }
        if let Some(callback) = self.on_panel.as_mut() {
            callback(&PanelUpdate {
                anchor: self.anchor,
                content: self.content.clone(),
            });
        }
    }
}

/// Hint results for an exact range match, primary hints first.
fn range_content(paragraph: &Paragraph, begin: usize, end: usize) -> PanelContent {
    let text = paragraph.text(begin, end);
    match paragraph
        .hints
        .iter()
        .chain(&paragraph.alt_hints)
        .find(|h| h.begin == begin && h.end == end)
    {
        Some(hint) => PanelContent::Hints {
            text,
            results: hint.results.clone(),
        },
        None => PanelContent::Unknown { text },
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::format::{Cluster, HintRange, PageLayout, Symbol};
    use crate::geometry::Size;

    /// Paragraph 0: eight 10x10 symbols "abcdefgh" along y = 0, hint 2..=3,
    /// alternate hint 2..=5. Paragraph 1: "xy" at y = 100. Both in cluster 0.
    /// Paragraph 2: "z" at y = 200, no cluster.
    fn geometry() -> Arc<PageGeometry> {
        let row = |y: f32, text: &str| -> Vec<Symbol> {
            text.chars()
                .enumerate()
                .map(|(i, c)| Symbol {
                    bbox: Rect::new(i as f32 * 10.0, y, 10.0, 10.0),
                    text: c.to_string(),
                })
                .collect()
        };
        let paragraph = |y: f32, text: &str| Paragraph {
            bbox: Rect::new(0.0, y, text.chars().count() as f32 * 10.0, 10.0),
            symbols: row(y, text),
            hints: Vec::new(),
            alt_hints: Vec::new(),
        };
        let mut first = paragraph(0.0, "abcdefgh");
        first.hints.push(HintRange {
            begin: 2,
            end: 3,
            results: vec!["cd!".into()],
        });
        first.alt_hints.push(HintRange {
            begin: 2,
            end: 5,
            results: vec!["cdef!".into()],
        });
        Arc::new(
            PageGeometry::from_layout(PageLayout {
                resolution: Size::new(1000.0, 1000.0),
                paragraphs: vec![first, paragraph(100.0, "xy"), paragraph(200.0, "z")],
                clusters: vec![Cluster {
                    paragraphs: vec![0, 1],
                    translation: "hello".into(),
                    bbox: Rect::new(0.0, 0.0, 80.0, 110.0),
                }],
            })
            .unwrap(),
        )
    }

    fn engine() -> OverlayEngine {
        let mut engine = OverlayEngine::new(OverlayConfig {
            snap_distance: 5.0,
            grab_radius: 3.0,
            drag_threshold: 2.0,
            ..OverlayConfig::default()
        });
        engine.set_page(0, geometry());
        engine
    }

    fn range(paragraph: usize, begin: usize, end: usize) -> Option<Selection> {
        Some(Selection::Range {
            paragraph,
            begin,
            end,
        })
    }

    #[test]
    fn test_click_selects_single_symbol() {
        let mut engine = engine();
        assert!(engine.on_image_click(Point::new(5.0, 5.0), Instant::now()));
        assert_eq!(engine.selection(), range(0, 0, 0));
        assert_eq!(
            engine.panel_content(),
            Some(&PanelContent::Unknown { text: "a".into() })
        );
        assert_eq!(engine.highlights(), &[Rect::new(0.0, 0.0, 10.0, 10.0)]);
    }

    #[test]
    fn test_click_inside_hint_selects_range() {
        let mut engine = engine();
        engine.on_image_click(Point::new(35.0, 5.0), Instant::now());
        assert_eq!(engine.selection(), range(0, 2, 3));
        assert_eq!(
            engine.panel_content(),
            Some(&PanelContent::Hints {
                text: "cd".into(),
                results: vec!["cd!".into()],
            })
        );
        let anchor = engine.panel_anchor().unwrap();
        assert_eq!(anchor.center, Point::new(30.0, 5.0));
        assert_eq!(anchor.half_extents, Size::new(10.0, 5.0));
    }

    #[test]
    fn test_empty_click_clears_or_passes_through() {
        let mut engine = engine();
        assert!(!engine.on_image_click(Point::new(500.0, 500.0), Instant::now()));
        engine.on_image_click(Point::new(5.0, 5.0), Instant::now());
        assert!(engine.on_image_click(Point::new(500.0, 500.0), Instant::now()));
        assert_eq!(engine.selection(), None);
        assert!(engine.highlights().is_empty());
        assert!(engine.panel_anchor().is_none());
    }

    #[test]
    fn test_double_click_selects_cluster() {
        let mut engine = engine();
        let t0 = Instant::now();
        engine.on_image_click(Point::new(5.0, 105.0), t0);
        engine.on_image_click(Point::new(6.0, 105.0), t0 + Duration::from_millis(120));
        assert_eq!(engine.selection(), Some(Selection::Cluster(0)));
        assert_eq!(
            engine.panel_content(),
            Some(&PanelContent::Translation {
                cluster: 0,
                text: "hello".into()
            })
        );
        assert_eq!(engine.highlights().len(), 2);
        assert_eq!(engine.panel_anchor().unwrap().center, Point::new(40.0, 55.0));
    }

    #[test]
    fn test_slow_second_click_is_single() {
        let mut engine = engine();
        let t0 = Instant::now();
        engine.on_image_click(Point::new(5.0, 105.0), t0);
        engine.on_image_click(Point::new(5.0, 105.0), t0 + Duration::from_secs(2));
        assert_eq!(engine.selection(), range(1, 0, 0));
    }

    #[test]
    fn test_double_click_without_cluster_selects_symbol() {
        let mut engine = engine();
        let t0 = Instant::now();
        engine.on_image_click(Point::new(5.0, 205.0), t0);
        engine.on_image_click(Point::new(5.0, 205.0), t0 + Duration::from_millis(50));
        assert_eq!(engine.selection(), range(2, 0, 0));
    }

    #[test]
    fn test_set_page_clears_selection() {
        let mut engine = engine();
        engine.on_image_click(Point::new(5.0, 5.0), Instant::now());
        engine.set_page(1, geometry());
        assert_eq!(engine.selection(), None);
        assert_eq!(engine.page(), Some(1));
    }

    #[test]
    fn test_viewport_moves_highlights() {
        let mut engine = engine();
        engine.on_image_click(Point::new(5.0, 5.0), Instant::now());
        engine.set_viewport(Viewport::new(100.0, 50.0, 2.0));
        assert_eq!(engine.highlights(), &[Rect::new(100.0, 50.0, 20.0, 20.0)]);
        // Clicks are resolved through the same transform.
        engine.on_image_click(Point::new(125.0, 60.0), Instant::now() + Duration::from_secs(1));
        assert_eq!(engine.selection(), range(0, 1, 1));
    }

    #[test]
    fn test_callbacks_receive_every_change() {
        let mut engine = engine();
        let highlights = Rc::new(RefCell::new(Vec::new()));
        let panels = Rc::new(RefCell::new(Vec::new()));
        let h = highlights.clone();
        engine.on_highlight(move |rects| h.borrow_mut().push(rects.len()));
        let p = panels.clone();
        engine.on_panel(move |update| p.borrow_mut().push(update.anchor.is_some()));

        engine.on_image_click(Point::new(35.0, 5.0), Instant::now());
        engine.clear();
        assert_eq!(*highlights.borrow(), vec![2, 0]);
        assert_eq!(*panels.borrow(), vec![true, false]);
    }

    #[test]
    fn test_drag_grows_end_edge_and_keeps_begin() {
        let mut engine = engine();
        engine.on_image_click(Point::new(35.0, 5.0), Instant::now());
        assert_eq!(engine.selection(), range(0, 2, 3));

        assert!(engine.drag_start(Point::new(39.0, 5.0)));
        engine.drag_move(Point::new(55.0, 5.0));
        assert_eq!(engine.selection(), range(0, 2, 5));
        // Exact alternate hint match surfaces its results.
        assert_eq!(
            engine.panel_content(),
            Some(&PanelContent::Hints {
                text: "cdef".into(),
                results: vec!["cdef!".into()],
            })
        );
        engine.drag_move(Point::new(75.0, 5.0));
        assert_eq!(engine.selection(), range(0, 2, 7));
        assert_eq!(
            engine.panel_content(),
            Some(&PanelContent::Unknown {
                text: "cdefgh".into()
            })
        );
        // Moving before the fixed edge stops at it.
        engine.drag_move(Point::new(5.0, 5.0));
        assert_eq!(engine.selection(), range(0, 2, 2));
        engine.drag_end(Point::new(5.0, 5.0));
        assert_eq!(engine.selection(), range(0, 2, 2));
        assert!(!engine.is_dragging());
    }

    #[test]
    fn test_drag_begin_edge_keeps_end() {
        let mut engine = engine();
        engine.on_image_click(Point::new(35.0, 5.0), Instant::now());
        assert!(engine.drag_start(Point::new(21.0, 5.0)));
        for x in [15.0, 5.0, 65.0, 25.0] {
            engine.drag_move(Point::new(x, 5.0));
            let Some(Selection::Range { end, .. }) = engine.selection() else {
                panic!("range selection expected");
            };
            assert_eq!(end, 3);
        }
        assert_eq!(engine.selection(), range(0, 2, 3));
    }

    #[test]
    fn test_long_selection_grabs_on_outer_two_symbols() {
        let mut engine = engine();
        engine.on_image_click(Point::new(5.0, 5.0), Instant::now());
        engine.select_range(0, 0, 7);
        // Symbol 6 belongs to the end zone.
        assert!(engine.drag_start(Point::new(65.0, 5.0)));
        engine.drag_move(Point::new(35.0, 5.0));
        assert_eq!(engine.selection(), range(0, 0, 3));
        engine.drag_end(Point::new(35.0, 5.0));

        // Middle symbols grab nothing.
        assert!(!engine.drag_start(Point::new(15.0, 50.0)));
    }

    #[test]
    fn test_drag_outside_grab_zone_is_ignored() {
        let mut engine = engine();
        engine.on_image_click(Point::new(35.0, 5.0), Instant::now());
        assert!(!engine.drag_start(Point::new(35.0, 50.0)));
        assert!(!engine.is_dragging());
    }

    #[test]
    fn test_tap_on_edge_collapses_to_symbol() {
        let mut engine = engine();
        engine.on_image_click(Point::new(35.0, 5.0), Instant::now());
        assert!(engine.drag_start(Point::new(38.0, 5.0)));
        engine.drag_move(Point::new(39.0, 5.0));
        engine.drag_end(Point::new(38.0, 5.0));
        assert_eq!(engine.selection(), range(0, 3, 3));
    }

    #[test]
    fn test_cluster_selection_has_no_edges() {
        let mut engine = engine();
        let t0 = Instant::now();
        engine.on_image_click(Point::new(5.0, 5.0), t0);
        engine.on_image_click(Point::new(5.0, 5.0), t0 + Duration::from_millis(10));
        assert_eq!(engine.selection(), Some(Selection::Cluster(0)));
        assert!(!engine.drag_start(Point::new(5.0, 5.0)));
    }
}
