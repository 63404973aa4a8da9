// SPDX-License-Identifier: MIT OR Apache-2.0
//! egui front end for [`CurveEditor`].
//!
//! Translates egui input into editor calls and paints the editor's
//! [`RenderFrame`]. All editing behaviour lives in the editor itself.

use egui::{Color32, Pos2, Rect, Sense, Shape, Stroke, Vec2};

use crate::drag::{Modifiers, PointerButton};
use crate::editor::{CurveEditor, RenderFrame};

const KEY_SIZE: f32 = 3.0;
const HANDLE_RADIUS: f32 = 3.0;
const BACKGROUND: Color32 = Color32::from_gray(30);
const RULER_BACKGROUND: Color32 = Color32::from_gray(40);
const SELECTED_COLOR: Color32 = Color32::from_rgb(255, 200, 100);
const HANDLE_COLOR: Color32 = Color32::from_rgb(100, 200, 255);
const TIME_MARKER_COLOR: Color32 = Color32::from_rgb(255, 100, 100);

fn pointer_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        egui::PointerButton::Extra1 | egui::PointerButton::Extra2 => None,
    }
}

fn modifiers(modifiers: egui::Modifiers) -> Modifiers {
    Modifiers {
        shift: modifiers.shift,
        ctrl: modifiers.command || modifiers.ctrl,
        alt: modifiers.alt,
    }
}

impl CurveEditor {
    /// Show the curve view in the remaining space of `ui`
    pub fn ui(&mut self, ui: &mut egui::Ui) -> egui::Response {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.set_view_rect(rect);
        self.handle_input(ui, &response);

        let frame = self.render_frame();
        paint(&ui.painter_at(rect), &frame, self.config.ruler_height);
        response
    }

    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let active = response.hovered() || self.is_dragging();
        if !active {
            return;
        }

        let events = ui.input(|input| input.events.clone());
        for event in events {
            match event {
                egui::Event::PointerMoved(pos) => self.pointer_move(pos),
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    modifiers: held,
                } => {
                    let Some(button) = pointer_button(button) else {
                        continue;
                    };
                    if pressed {
                        if response.rect.contains(pos) {
                            self.pointer_down(pos, button, modifiers(held));
                        }
                    } else {
                        self.pointer_up(pos, button, modifiers(held));
                    }
                }
                egui::Event::Key {
                    key,
                    pressed: true,
                    modifiers: held,
                    ..
                } => self.handle_key(key, held),
                _ => {}
            }
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.double_click(pos);
            }
        }

        if response.hovered() {
            let (scroll, hover) = ui.input(|input| (input.smooth_scroll_delta, input.pointer.hover_pos()));
            if let Some(pos) = hover {
                self.wheel_zoom(pos, scroll.y);
            }
        }
    }

    fn handle_key(&mut self, key: egui::Key, held: egui::Modifiers) {
        let ctrl = held.command || held.ctrl;
        match key {
            egui::Key::Escape => self.cancel_drag(),
            egui::Key::Delete | egui::Key::Backspace => self.remove_selected_keys(),
            egui::Key::A if ctrl => self.select_all(),
            egui::Key::F => {
                self.fit_width();
                self.fit_height();
            }
            egui::Key::Period => {
                self.goto_key(false);
            }
            egui::Key::Comma => {
                self.goto_key(true);
            }
            _ => {}
        }
    }
}

/// Paint a frame with `painter`
pub fn paint(painter: &egui::Painter, frame: &RenderFrame, ruler_height: f32) {
    let rect = frame.rect;
    painter.rect_filled(rect, 0.0, BACKGROUND);
    let ruler = Rect::from_min_size(rect.min, Vec2::new(rect.width(), ruler_height));
    painter.rect_filled(ruler, 0.0, RULER_BACKGROUND);

    for marker in &frame.key_times {
        let color = if marker.selected {
            SELECTED_COLOR
        } else {
            Color32::from_gray(160)
        };
        let tip = Pos2::new(marker.x, ruler.bottom());
        painter.add(Shape::convex_polygon(
            vec![
                tip,
                Pos2::new(marker.x - 4.0, ruler.bottom() - 6.0),
                Pos2::new(marker.x + 4.0, ruler.bottom() - 6.0),
            ],
            color,
            Stroke::NONE,
        ));
    }

    for curve in &frame.curves {
        let [r, g, b] = curve.color;
        painter.add(Shape::line(
            curve.points.clone(),
            Stroke::new(1.5, Color32::from_rgb(r, g, b)),
        ));
    }

    for handle in &frame.handles {
        let stroke = Stroke::new(1.0, HANDLE_COLOR);
        for end in [handle.in_pos, handle.out_pos] {
            painter.line_segment([handle.key_pos, end], stroke);
            painter.circle_filled(end, HANDLE_RADIUS, HANDLE_COLOR);
        }
    }

    for key in &frame.keys {
        let active = frame.active_key == Some((key.channel, key.key));
        let fill = if key.selected || active {
            SELECTED_COLOR
        } else {
            Color32::from_gray(220)
        };
        painter.rect_filled(Rect::from_center_size(key.pos, Vec2::splat(KEY_SIZE * 2.0)), 0.0, fill);
    }

    if let Some(x) = frame.time_marker_x {
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            Stroke::new(1.0, TIME_MARKER_COLOR),
        );
    }

    if let Some(band) = frame.selection_rect {
        painter.rect_filled(band, 0.0, Color32::from_rgba_unmultiplied(100, 150, 255, 30));
        painter.rect_stroke(band, 0.0, Stroke::new(1.0, Color32::from_rgb(100, 150, 255)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_mapping() {
        assert_eq!(pointer_button(egui::PointerButton::Middle), Some(PointerButton::Middle));
        assert_eq!(pointer_button(egui::PointerButton::Extra1), None);
    }

    #[test]
    fn test_command_counts_as_ctrl() {
        let held = egui::Modifiers {
            command: true,
            ..egui::Modifiers::default()
        };
        let mapped = modifiers(held);
        assert!(mapped.ctrl);
        assert!(!mapped.shift);
    }
}
