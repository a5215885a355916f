//! Selection set, marquee selection and resize handles.

use crate::element::ElementId;
use crate::store::DocumentStore;
use indexmap::IndexSet;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest width or height a resize can produce.
pub const MIN_ELEMENT_SIZE: f64 = 20.0;
/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 8.0;

/// Ordered set of selected element identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: IndexSet<ElementId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ElementId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: &ElementId) -> bool {
        self.ids.shift_remove(id)
    }

    /// Add `id` if absent, remove it otherwise.
    pub fn toggle(&mut self, id: ElementId) {
        if !self.ids.shift_remove(&id) {
            self.ids.insert(id);
        }
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Replace the whole selection.
    pub fn set(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.ids = ids.into_iter().collect();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementId> {
        self.ids.iter()
    }

    pub fn to_vec(&self) -> Vec<ElementId> {
        self.ids.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget identifiers the store no longer holds.
    pub fn prune(&mut self, store: &DocumentStore) {
        self.ids.retain(|id| store.contains(id));
    }
}

/// Inclusive axis-aligned overlap: rectangles that merely touch intersect.
pub fn rects_intersect(a: Rect, b: Rect) -> bool {
    !(a.x1 < b.x0 || a.x0 > b.x1 || a.y1 < b.y0 || a.y0 > b.y1)
}

/// Rubber-band selection in progress.
#[derive(Debug, Clone)]
pub struct Marquee {
    pub origin: Point,
    pub current: Point,
    /// Keep the selection that existed when the marquee started.
    pub additive: bool,
    initial: SelectionSet,
}

impl Marquee {
    pub fn new(origin: Point, additive: bool, initial: &SelectionSet) -> Self {
        Self {
            origin,
            current: origin,
            additive,
            initial: if additive { initial.clone() } else { SelectionSet::new() },
        }
    }

    /// Marquee rectangle in canvas coordinates.
    pub fn rect(&self) -> Rect {
        Rect::from_points(self.origin, self.current)
    }

    /// Selection implied by the current marquee rectangle.
    pub fn selection(&self, store: &DocumentStore) -> SelectionSet {
        let rect = self.rect();
        let mut selection = self.initial.clone();
        for element in store.iter() {
            if rects_intersect(rect, element.bounds()) {
                selection.insert(element.id.clone());
            }
        }
        selection
    }
}

/// The eight resize handles around a selected element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    Nw,
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::Nw,
        ResizeHandle::N,
        ResizeHandle::Ne,
        ResizeHandle::E,
        ResizeHandle::Se,
        ResizeHandle::S,
        ResizeHandle::Sw,
        ResizeHandle::W,
    ];

    fn moves_west(self) -> bool {
        matches!(self, ResizeHandle::Nw | ResizeHandle::W | ResizeHandle::Sw)
    }

    fn moves_east(self) -> bool {
        matches!(self, ResizeHandle::Ne | ResizeHandle::E | ResizeHandle::Se)
    }

    fn moves_north(self) -> bool {
        matches!(self, ResizeHandle::Nw | ResizeHandle::N | ResizeHandle::Ne)
    }

    fn moves_south(self) -> bool {
        matches!(self, ResizeHandle::Sw | ResizeHandle::S | ResizeHandle::Se)
    }

    /// Handle position on `bounds`.
    pub fn position(self, bounds: Rect) -> Point {
        let center = bounds.center();
        let x = if self.moves_west() {
            bounds.x0
        } else if self.moves_east() {
            bounds.x1
        } else {
            center.x
        };
        let y = if self.moves_north() {
            bounds.y0
        } else if self.moves_south() {
            bounds.y1
        } else {
            center.y
        };
        Point::new(x, y)
    }
}

/// Find the handle of `bounds` under `point`.
///
/// `tolerance` is in canvas units, so callers divide the screen tolerance
/// by the zoom. Handles overlap on thin elements; the nearest one wins.
pub fn hit_test_handles(bounds: Rect, point: Point, tolerance: f64) -> Option<ResizeHandle> {
    ResizeHandle::ALL
        .into_iter()
        .map(|handle| (handle, handle.position(bounds).distance(point)))
        .filter(|(_, distance)| *distance <= tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(handle, _)| handle)
}

/// Resize `start` by dragging `handle` by `delta` canvas units.
///
/// Each axis is clamped to [`MIN_ELEMENT_SIZE`] independently. When clamped,
/// the edge opposite the handle stays where it was. An axis the handle does
/// not move keeps its origin and is still raised to the minimum.
pub fn apply_resize(handle: ResizeHandle, start: Rect, delta: Vec2) -> Rect {
    let (x0, x1) = if handle.moves_west() {
        let width = (start.width() - delta.x).max(MIN_ELEMENT_SIZE);
        (start.x1 - width, start.x1)
    } else if handle.moves_east() {
        let width = (start.width() + delta.x).max(MIN_ELEMENT_SIZE);
        (start.x0, start.x0 + width)
    } else {
        (start.x0, start.x0 + start.width().max(MIN_ELEMENT_SIZE))
    };

    let (y0, y1) = if handle.moves_north() {
        let height = (start.height() - delta.y).max(MIN_ELEMENT_SIZE);
        (start.y1 - height, start.y1)
    } else if handle.moves_south() {
        let height = (start.height() + delta.y).max(MIN_ELEMENT_SIZE);
        (start.y0, start.y0 + height)
    } else {
        (start.y0, start.y0 + start.height().max(MIN_ELEMENT_SIZE))
    };

    Rect::new(x0, y0, x1, y1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{NewElement, ShapeType};
    use kurbo::Size;
    use proptest::prelude::*;

    fn start() -> Rect {
        Rect::new(100.0, 100.0, 250.0, 200.0)
    }

    #[test]
    fn test_rects_touching_edges_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rects_intersect(a, Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!rects_intersect(a, Rect::new(10.1, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn test_handle_delta_mapping() {
        let d = Vec2::new(10.0, 5.0);
        assert_eq!(apply_resize(ResizeHandle::Se, start(), d), Rect::new(100.0, 100.0, 260.0, 205.0));
        assert_eq!(apply_resize(ResizeHandle::Nw, start(), d), Rect::new(110.0, 105.0, 250.0, 200.0));
        assert_eq!(apply_resize(ResizeHandle::N, start(), d), Rect::new(100.0, 105.0, 250.0, 200.0));
        assert_eq!(apply_resize(ResizeHandle::E, start(), d), Rect::new(100.0, 100.0, 260.0, 200.0));
        assert_eq!(apply_resize(ResizeHandle::W, start(), d), Rect::new(110.0, 100.0, 250.0, 200.0));
        assert_eq!(apply_resize(ResizeHandle::Ne, start(), d), Rect::new(100.0, 105.0, 260.0, 200.0));
        assert_eq!(apply_resize(ResizeHandle::Sw, start(), d), Rect::new(110.0, 100.0, 250.0, 205.0));
        assert_eq!(apply_resize(ResizeHandle::S, start(), d), Rect::new(100.0, 100.0, 250.0, 205.0));
    }

    #[test]
    fn test_minimum_clamps_each_axis_and_anchors_opposite_edge() {
        let r = apply_resize(ResizeHandle::Nw, start(), Vec2::new(500.0, 0.0));
        assert_eq!(r.width(), MIN_ELEMENT_SIZE);
        assert_eq!(r.x1, 250.0);
        assert_eq!(r.height(), 100.0);
    }

    #[test]
    fn test_handle_positions_and_hit_test() {
        let bounds = start();
        assert_eq!(ResizeHandle::Nw.position(bounds), Point::new(100.0, 100.0));
        assert_eq!(ResizeHandle::S.position(bounds), Point::new(175.0, 200.0));
        assert_eq!(hit_test_handles(bounds, Point::new(252.0, 198.0), 4.0), Some(ResizeHandle::Se));
        assert_eq!(hit_test_handles(bounds, Point::new(175.0, 150.0), 4.0), None);
    }

    #[test]
    fn test_side_handle_raises_thin_axis() {
        let bar = Rect::new(0.0, 0.0, 300.0, 17.0);
        let r = apply_resize(ResizeHandle::E, bar, Vec2::new(40.0, 0.0));
        assert_eq!(r, Rect::new(0.0, 0.0, 340.0, MIN_ELEMENT_SIZE));

        let post = Rect::new(10.0, 10.0, 15.0, 110.0);
        let r = apply_resize(ResizeHandle::S, post, Vec2::new(0.0, 10.0));
        assert_eq!(r, Rect::new(10.0, 10.0, 10.0 + MIN_ELEMENT_SIZE, 120.0));
    }

    #[test]
    fn test_line_resizes_to_minimum_with_every_handle() {
        let mut store = DocumentStore::new();
        let line = store.create(NewElement::shape(ShapeType::Line, Point::ZERO)).unwrap();
        let bounds = line.bounds();
        assert!(bounds.height() < MIN_ELEMENT_SIZE);
        for handle in ResizeHandle::ALL {
            let r = apply_resize(handle, bounds, Vec2::new(5.0, 5.0));
            assert!(r.width() >= MIN_ELEMENT_SIZE, "{:?} width {}", handle, r.width());
            assert!(r.height() >= MIN_ELEMENT_SIZE, "{:?} height {}", handle, r.height());
        }
    }

    #[test]
    fn test_hit_test_prefers_nearest_handle() {
        let line = Rect::new(0.0, 0.0, 150.0, 2.0);
        assert_eq!(hit_test_handles(line, Point::new(150.0, 1.0), 8.0), Some(ResizeHandle::E));
        assert_eq!(hit_test_handles(line, Point::new(150.0, 0.0), 8.0), Some(ResizeHandle::Ne));
        assert_eq!(hit_test_handles(line, Point::new(0.0, 1.0), 8.0), Some(ResizeHandle::W));
    }

    #[test]
    fn test_marquee_replaces_or_extends() {
        let mut store = DocumentStore::new();
        let inside = store.create(NewElement::shape(ShapeType::Circle, Point::new(10.0, 10.0))).unwrap();
        let outside = store
            .create(NewElement::shape(ShapeType::Circle, Point::new(500.0, 500.0)))
            .unwrap();

        let mut prior = SelectionSet::new();
        prior.insert(outside.id.clone());

        let mut marquee = Marquee::new(Point::ZERO, false, &prior);
        marquee.current = Point::new(200.0, 200.0);
        let selection = marquee.selection(&store);
        assert!(selection.contains(&inside.id));
        assert!(!selection.contains(&outside.id));

        let mut marquee = Marquee::new(Point::ZERO, true, &prior);
        marquee.current = Point::new(200.0, 200.0);
        let selection = marquee.selection(&store);
        assert!(selection.contains(&inside.id));
        assert!(selection.contains(&outside.id));
    }

    #[test]
    fn test_selection_prune_and_toggle() {
        let mut store = DocumentStore::new();
        let a = store.create(NewElement::text(Point::ZERO)).unwrap();
        let mut selection = SelectionSet::new();
        selection.toggle(a.id.clone());
        selection.insert(ElementId::from("ghost"));
        selection.prune(&store);
        assert_eq!(selection.to_vec(), vec![a.id.clone()]);
        selection.toggle(a.id);
        assert!(selection.is_empty());
    }

    proptest! {
        #[test]
        fn prop_resize_never_below_minimum(
            w in 1.0f64..400.0,
            h in 1.0f64..400.0,
            dx in -1000.0f64..1000.0,
            dy in -1000.0f64..1000.0,
            idx in 0usize..8,
        ) {
            let start = Rect::from_origin_size(Point::new(50.0, 50.0), Size::new(w, h));
            let r = apply_resize(ResizeHandle::ALL[idx], start, Vec2::new(dx, dy));
            prop_assert!(r.width() >= MIN_ELEMENT_SIZE - 1e-9);
            prop_assert!(r.height() >= MIN_ELEMENT_SIZE - 1e-9);
        }

        #[test]
        fn prop_south_east_resize_keeps_origin(
            dx in -1000.0f64..1000.0,
            dy in -1000.0f64..1000.0,
        ) {
            let r = apply_resize(ResizeHandle::Se, start(), Vec2::new(dx, dy));
            prop_assert_eq!(r.origin(), start().origin());
        }

        #[test]
        fn prop_marquee_inside_selected_outside_not(
            x in -500.0f64..500.0,
            y in -500.0f64..500.0,
        ) {
            let mut store = DocumentStore::new();
            let element = store
                .create(NewElement::shape(ShapeType::Diamond, Point::new(x, y)))
                .unwrap();
            let bounds = element.bounds();

            let mut covering = Marquee::new(Point::new(bounds.x0 - 1.0, bounds.y0 - 1.0), false, &SelectionSet::new());
            covering.current = Point::new(bounds.x1 + 1.0, bounds.y1 + 1.0);
            prop_assert!(covering.selection(&store).contains(&element.id));

            let mut away = Marquee::new(Point::new(bounds.x1 + 5.0, bounds.y1 + 5.0), false, &SelectionSet::new());
            away.current = Point::new(bounds.x1 + 50.0, bounds.y1 + 50.0);
            prop_assert!(!away.selection(&store).contains(&element.id));
        }
    }
}
