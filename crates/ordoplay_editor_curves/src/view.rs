// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mapping between curve space (time, value) and screen pixels.

use egui::{Pos2, Rect, Vec2};

use crate::config::Interval;

/// Affine world-to-screen transform of the curve view.
///
/// Time grows to the right from `rect.left()`, value grows upward from
/// `rect.bottom()`. `zoom` is in pixels per unit, `origin` is the world point
/// drawn at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Screen rectangle of the curve area
    pub rect: Rect,
    /// Pixels per time unit (x) and per value unit (y)
    pub zoom: Vec2,
    /// World `(time, value)` at the bottom-left corner
    pub origin: Vec2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            rect: Rect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 200.0)),
            zoom: Vec2::new(400.0, 200.0),
            origin: Vec2::ZERO,
        }
    }
}

impl ViewTransform {
    /// Create a transform
    pub fn new(rect: Rect, zoom: Vec2, origin: Vec2) -> Self {
        Self { rect, zoom, origin }
    }

    /// Convert time to screen x
    pub fn time_to_x(&self, time: f32) -> f32 {
        self.rect.left() + (time - self.origin.x) * self.zoom.x
    }

    /// Convert screen x to time
    pub fn x_to_time(&self, x: f32) -> f32 {
        (x - self.rect.left()) / self.zoom.x + self.origin.x
    }

    /// Convert value to screen y
    pub fn value_to_y(&self, value: f32) -> f32 {
        self.rect.bottom() - (value - self.origin.y) * self.zoom.y
    }

    /// Convert screen y to value
    pub fn y_to_value(&self, y: f32) -> f32 {
        (self.rect.bottom() - y) / self.zoom.y + self.origin.y
    }

    /// Project a world point to the screen
    pub fn world_to_screen(&self, time: f32, value: f32) -> Pos2 {
        Pos2::new(self.time_to_x(time), self.value_to_y(value))
    }

    /// Unproject a screen point to `(time, value)`
    pub fn screen_to_world(&self, pos: Pos2) -> (f32, f32) {
        (self.x_to_time(pos.x), self.y_to_value(pos.y))
    }

    /// Times currently visible
    pub fn visible_time_range(&self) -> Interval {
        Interval::new(self.x_to_time(self.rect.left()), self.x_to_time(self.rect.right()))
    }

    /// Values currently visible
    pub fn visible_value_range(&self) -> Interval {
        Interval::new(self.y_to_value(self.rect.bottom()), self.y_to_value(self.rect.top()))
    }

    /// Set the zoom, clamped per axis
    pub fn set_zoom(&mut self, zoom: Vec2, min: f32, max: f32) {
        self.zoom = Vec2::new(zoom.x.clamp(min, max), zoom.y.clamp(min, max));
    }

    /// Multiply the zoom while keeping the world point under `center` fixed
    pub fn zoom_about(&mut self, factor: Vec2, center: Pos2, min: f32, max: f32) {
        let (time, value) = self.screen_to_world(center);
        self.set_zoom(self.zoom * factor, min, max);
        self.origin.x = time - (center.x - self.rect.left()) / self.zoom.x;
        self.origin.y = value - (self.rect.bottom() - center.y) / self.zoom.y;
    }

    /// Scroll the view by a screen delta
    pub fn pan_pixels(&mut self, delta: Vec2) {
        self.origin.x -= delta.x / self.zoom.x;
        self.origin.y += delta.y / self.zoom.y;
    }

    /// Fit a time range to the view width, leaving `margin` pixels each side
    pub fn fit_time(&mut self, range: Interval, margin: f32) {
        let width = (self.rect.width() - 2.0 * margin).max(1.0);
        self.zoom.x = width / range.length().max(1e-3);
        self.origin.x = range.start - margin / self.zoom.x;
    }

    /// Fit a value range to the view height, leaving `margin` pixels each side
    pub fn fit_value(&mut self, range: Interval, margin: f32) {
        let height = (self.rect.height() - 2.0 * margin).max(1.0);
        self.zoom.y = height / range.length().max(1e-3);
        self.origin.y = range.start - margin / self.zoom.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewTransform {
        ViewTransform::new(
            Rect::from_min_size(Pos2::new(10.0, 20.0), Vec2::new(200.0, 100.0)),
            Vec2::new(100.0, 50.0),
            Vec2::new(-0.5, 1.0),
        )
    }

    #[test]
    fn test_world_screen_round_trip() {
        let view = view();
        let pos = view.world_to_screen(0.75, 1.5);
        let (time, value) = view.screen_to_world(pos);
        assert!((time - 0.75).abs() < 1e-5);
        assert!((value - 1.5).abs() < 1e-5);
        assert_eq!(view.time_to_x(-0.5), 10.0);
        assert_eq!(view.value_to_y(1.0), 120.0);
    }

    #[test]
    fn test_zoom_about_keeps_point_fixed() {
        let mut view = view();
        let center = Pos2::new(60.0, 70.0);
        let before = view.screen_to_world(center);
        view.zoom_about(Vec2::new(2.0, 0.5), center, 0.01, 1000.0);
        let after = view.screen_to_world(center);
        assert!((before.0 - after.0).abs() < 1e-4);
        assert!((before.1 - after.1).abs() < 1e-4);
    }

    #[test]
    fn test_fit_time() {
        let mut view = view();
        view.fit_time(Interval::new(2.0, 4.0), 10.0);
        assert!((view.time_to_x(2.0) - 20.0).abs() < 1e-4);
        assert!((view.time_to_x(4.0) - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_pan_moves_world_with_pointer() {
        let mut view = view();
        let before = view.world_to_screen(1.0, 1.0);
        view.pan_pixels(Vec2::new(15.0, -5.0));
        let after = view.world_to_screen(1.0, 1.0);
        assert!((after.x - before.x - 15.0).abs() < 1e-4);
        assert!((after.y - before.y + 5.0).abs() < 1e-4);
    }
}
