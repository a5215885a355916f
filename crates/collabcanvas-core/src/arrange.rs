//! Alignment, distribution and grid snapping for groups of elements.

use crate::element::{Element, ElementId};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Grid size for snapping (matches the visual grid).
pub const GRID_SIZE: f64 = 20.0;

/// Snap a coordinate to the nearest grid line.
pub fn snap_to_grid(value: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round() * grid
}

pub fn snap_point(point: Point, grid: f64) -> Point {
    Point::new(snap_to_grid(point.x, grid), snap_to_grid(point.y, grid))
}

/// Edge or axis to align a selection on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    Left,
    Right,
    Top,
    Bottom,
    /// Line up horizontal centers on their average.
    CenterHorizontal,
    /// Line up vertical centers on their average.
    CenterVertical,
}

/// Axis to space a selection along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Horizontal,
    Vertical,
}

/// New positions that align `elements`. Needs at least two elements.
pub fn align(elements: &[&Element], alignment: Alignment) -> Vec<(ElementId, Point)> {
    if elements.len() < 2 {
        return Vec::new();
    }

    let count = elements.len() as f64;
    match alignment {
        Alignment::Left => {
            let left = elements.iter().map(|e| e.x).fold(f64::INFINITY, f64::min);
            moved(elements, |e| Point::new(left, e.y))
        }
        Alignment::Right => {
            let right = elements.iter().map(|e| e.x + e.width).fold(f64::NEG_INFINITY, f64::max);
            moved(elements, |e| Point::new(right - e.width, e.y))
        }
        Alignment::Top => {
            let top = elements.iter().map(|e| e.y).fold(f64::INFINITY, f64::min);
            moved(elements, |e| Point::new(e.x, top))
        }
        Alignment::Bottom => {
            let bottom = elements.iter().map(|e| e.y + e.height).fold(f64::NEG_INFINITY, f64::max);
            moved(elements, |e| Point::new(e.x, bottom - e.height))
        }
        Alignment::CenterHorizontal => {
            let center = elements.iter().map(|e| e.x + e.width / 2.0).sum::<f64>() / count;
            moved(elements, |e| Point::new(center - e.width / 2.0, e.y))
        }
        Alignment::CenterVertical => {
            let center = elements.iter().map(|e| e.y + e.height / 2.0).sum::<f64>() / count;
            moved(elements, |e| Point::new(e.x, center - e.height / 2.0))
        }
    }
}

/// New positions spacing `elements` evenly between the outermost two.
/// Needs at least three elements; the first one never moves.
pub fn distribute(elements: &[&Element], distribution: Distribution) -> Vec<(ElementId, Point)> {
    if elements.len() < 3 {
        return Vec::new();
    }

    let mut sorted: Vec<&Element> = elements.to_vec();
    let (start, extent, gap) = match distribution {
        Distribution::Horizontal => {
            sorted.sort_by(|a, b| a.x.total_cmp(&b.x));
            let first = sorted[0].x;
            let last = sorted[sorted.len() - 1];
            let total = last.x + last.width - first;
            let occupied: f64 = sorted.iter().map(|e| e.width).sum();
            (first, total, (total - occupied) / (sorted.len() - 1) as f64)
        }
        Distribution::Vertical => {
            sorted.sort_by(|a, b| a.y.total_cmp(&b.y));
            let first = sorted[0].y;
            let last = sorted[sorted.len() - 1];
            let total = last.y + last.height - first;
            let occupied: f64 = sorted.iter().map(|e| e.height).sum();
            (first, total, (total - occupied) / (sorted.len() - 1) as f64)
        }
    };
    log::debug!("Distributing {} elements over {:.1}", sorted.len(), extent);

    let mut cursor = start;
    let mut positions = Vec::with_capacity(sorted.len() - 1);
    for (index, element) in sorted.iter().enumerate() {
        let size = match distribution {
            Distribution::Horizontal => element.width,
            Distribution::Vertical => element.height,
        };
        if index > 0 {
            let target = match distribution {
                Distribution::Horizontal => Point::new(cursor, element.y),
                Distribution::Vertical => Point::new(element.x, cursor),
            };
            positions.push((element.id.clone(), target));
        }
        cursor += size + gap;
    }
    positions
}

fn moved(elements: &[&Element], target: impl Fn(&Element) -> Point) -> Vec<(ElementId, Point)> {
    elements.iter().map(|e| (e.id.clone(), target(e))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::NewElement;
    use crate::store::DocumentStore;
    use kurbo::Size;

    fn store_with(rects: &[(f64, f64, f64, f64)]) -> DocumentStore {
        let mut store = DocumentStore::new();
        for &(x, y, w, h) in rects {
            store
                .create(NewElement::text(Point::new(x, y)).with_size(Size::new(w, h)))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(29.0, GRID_SIZE), 20.0);
        assert_eq!(snap_to_grid(31.0, GRID_SIZE), 40.0);
        assert_eq!(snap_to_grid(-9.0, GRID_SIZE), 0.0);
        assert_eq!(snap_point(Point::new(11.0, 49.0), GRID_SIZE), Point::new(20.0, 40.0));
    }

    #[test]
    fn test_align_left_and_right() {
        let store = store_with(&[(10.0, 0.0, 50.0, 10.0), (40.0, 30.0, 100.0, 10.0)]);
        let elements: Vec<&Element> = store.iter().collect();

        let left = align(&elements, Alignment::Left);
        assert!(left.iter().all(|(_, p)| p.x == 10.0));

        let right = align(&elements, Alignment::Right);
        assert_eq!(right[0].1, Point::new(90.0, 0.0));
        assert_eq!(right[1].1, Point::new(40.0, 30.0));
    }

    #[test]
    fn test_align_needs_two() {
        let store = store_with(&[(10.0, 0.0, 50.0, 10.0)]);
        let elements: Vec<&Element> = store.iter().collect();
        assert!(align(&elements, Alignment::Top).is_empty());
    }

    #[test]
    fn test_align_center() {
        let store = store_with(&[(0.0, 0.0, 20.0, 10.0), (100.0, 0.0, 40.0, 10.0)]);
        let elements: Vec<&Element> = store.iter().collect();
        let centered = align(&elements, Alignment::CenterHorizontal);
        // centers 10 and 120 average to 65
        assert_eq!(centered[0].1.x, 55.0);
        assert_eq!(centered[1].1.x, 45.0);
    }

    #[test]
    fn test_distribute_horizontal() {
        let store = store_with(&[
            (0.0, 0.0, 10.0, 10.0),
            (200.0, 0.0, 10.0, 10.0),
            (30.0, 0.0, 10.0, 10.0),
        ]);
        let elements: Vec<&Element> = store.iter().collect();
        let positions = distribute(&elements, Distribution::Horizontal);
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].1.x, 100.0);
        assert_eq!(positions[1].1.x, 200.0);
    }

    #[test]
    fn test_distribute_needs_three() {
        let store = store_with(&[(0.0, 0.0, 10.0, 10.0), (50.0, 0.0, 10.0, 10.0)]);
        let elements: Vec<&Element> = store.iter().collect();
        assert!(distribute(&elements, Distribution::Vertical).is_empty());
    }
}
