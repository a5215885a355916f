//! Viewport pan/zoom transform.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 5.0;
/// Multiplier applied by a single zoom in/out step.
pub const ZOOM_STEP: f64 = 1.2;
/// Canvas-space margin kept around content by [`Viewport::zoom_to_fit`].
pub const FIT_PADDING: f64 = 50.0;

/// Viewport manages the view transform for the canvas.
///
/// Screen coordinates are `canvas * zoom + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Current translation offset (pan), in screen pixels.
    pub offset: Vec2,
    /// Current zoom level, 1.0 = 100%.
    pub zoom: f64,
    /// Size of the visible area in screen pixels.
    pub size: Size,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            size: Size::new(1280.0, 800.0),
        }
    }
}

impl Viewport {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn canvas_to_screen(&self, canvas_point: Point) -> Point {
        self.transform() * canvas_point
    }

    /// Convert a screen-space movement into canvas units.
    pub fn screen_delta_to_canvas(&self, delta: Vec2) -> Vec2 {
        delta / self.zoom
    }

    /// Canvas point at the middle of the visible area.
    pub fn center(&self) -> Point {
        self.screen_to_canvas(Point::new(self.size.width / 2.0, self.size.height / 2.0))
    }

    pub fn resize(&mut self, size: Size) {
        self.size = size;
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / ZOOM_STEP);
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    /// Reset pan and zoom.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Zoom by `factor`, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let canvas_point = self.screen_to_canvas(screen_point);
        self.zoom = new_zoom;
        let moved = self.canvas_to_screen(canvas_point);
        self.offset += screen_point - moved;
    }

    /// Frame `bounds` inside the viewport without ever zooming past 100%.
    ///
    /// `None` (an empty document) resets the view.
    pub fn zoom_to_fit(&mut self, bounds: Option<Rect>) {
        let Some(bounds) = bounds else {
            self.reset();
            return;
        };

        let content_width = bounds.width() + FIT_PADDING * 2.0;
        let content_height = bounds.height() + FIT_PADDING * 2.0;
        let scale_x = self.size.width / content_width;
        let scale_y = self.size.height / content_height;
        self.zoom = scale_x.min(scale_y).min(1.0).clamp(MIN_ZOOM, MAX_ZOOM);

        let bounds_center = bounds.center();
        self.offset = Vec2::new(
            self.size.width / 2.0 - bounds_center.x * self.zoom,
            self.size.height / 2.0 - bounds_center.y * self.zoom,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_viewport() {
        let viewport = Viewport::default();
        assert_eq!(viewport.offset, Vec2::ZERO);
        assert!((viewport.zoom - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_canvas_with_zoom_and_offset() {
        let mut viewport = Viewport::default();
        viewport.zoom = 2.0;
        viewport.offset = Vec2::new(10.0, 20.0);
        let canvas = viewport.screen_to_canvas(Point::new(110.0, 220.0));
        assert!((canvas.x - 50.0).abs() < 1e-10);
        assert!((canvas.y - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_steps_are_clamped() {
        let mut viewport = Viewport::default();
        for _ in 0..30 {
            viewport.zoom_in();
        }
        assert!((viewport.zoom - MAX_ZOOM).abs() < f64::EPSILON);
        for _ in 0..60 {
            viewport.zoom_out();
        }
        assert!((viewport.zoom - MIN_ZOOM).abs() < f64::EPSILON);
        viewport.reset_zoom();
        assert!((viewport.zoom - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_at_keeps_point_fixed() {
        let mut viewport = Viewport::default();
        viewport.offset = Vec2::new(30.0, -20.0);
        let cursor = Point::new(400.0, 300.0);
        let before = viewport.screen_to_canvas(cursor);
        viewport.zoom_at(cursor, 1.5);
        let after = viewport.screen_to_canvas(cursor);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_to_fit_never_exceeds_one() {
        let mut viewport = Viewport::new(Size::new(1000.0, 800.0));
        viewport.zoom_to_fit(Some(Rect::new(0.0, 0.0, 100.0, 100.0)));
        assert!((viewport.zoom - 1.0).abs() < f64::EPSILON);
        let center = viewport.canvas_to_screen(Point::new(50.0, 50.0));
        assert!((center.x - 500.0).abs() < 1e-9);
        assert!((center.y - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_to_fit_shrinks_large_content() {
        let mut viewport = Viewport::new(Size::new(1000.0, 800.0));
        viewport.zoom_to_fit(Some(Rect::new(0.0, 0.0, 1900.0, 300.0)));
        assert!((viewport.zoom - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_to_fit_empty_resets() {
        let mut viewport = Viewport::default();
        viewport.zoom = 3.0;
        viewport.pan(Vec2::new(5.0, 5.0));
        viewport.zoom_to_fit(None);
        assert_eq!(viewport.offset, Vec2::ZERO);
        assert!((viewport.zoom - 1.0).abs() < f64::EPSILON);
    }
}
