// SPDX-License-Identifier: MIT OR Apache-2.0
//! Classify what lies under the pointer.

use egui::Pos2;

use crate::channel::ChannelId;
use crate::config::EditorConfig;
use crate::curve_set::CurveSet;
use crate::key::{Key, TangentSide};
use crate::key_times::KeyTimeSet;
use crate::view::ViewTransform;

/// Kind of element under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HitKind {
    /// Empty space
    #[default]
    Nothing,
    /// The time marker line
    TimeMarker,
    /// A curve, away from its keys
    Spline,
    /// A key
    Key,
    /// A tangent handle of a selected key
    TangentHandle(TangentSide),
}

/// Result of a hit test
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HitResult {
    /// What was hit
    pub kind: HitKind,
    /// Channel of the hit curve, key or handle
    pub channel: Option<ChannelId>,
    /// Key index; for spline hits, the key nearest the pointer
    pub key: Option<usize>,
    /// Value dimension of the hit
    pub dimension: usize,
    /// Pointer x minus key x in pixels; negative left of the key
    pub signed_distance: f32,
}

impl HitResult {
    /// Whether anything was hit
    pub fn is_hit(&self) -> bool {
        self.kind != HitKind::Nothing
    }

    /// Channel and key of the hit, if any
    pub fn key_ref(&self) -> Option<(ChannelId, usize)> {
        Some((self.channel?, self.key?))
    }
}

/// Pixel tolerances for hit testing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTester {
    /// Horizontal tolerance for keys and the time marker
    pub key_pixels: f32,
    /// Vertical tolerance for curves
    pub spline_pixels: f32,
    /// Radius for tangent handles
    pub handle_pixels: f32,
}

impl Default for HitTester {
    fn default() -> Self {
        Self {
            key_pixels: 4.0,
            spline_pixels: 4.0,
            handle_pixels: 4.0,
        }
    }
}

impl HitTester {
    /// Tolerances of an editor configuration
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            key_pixels: config.key_hit_pixels,
            spline_pixels: config.spline_hit_pixels,
            handle_pixels: config.handle_hit_pixels,
        }
    }

    /// Screen positions of a key's incoming handle, the key, and its outgoing
    /// handle in one dimension
    pub fn handle_points(view: &ViewTransform, key: &Key, dimension: usize) -> (Pos2, Pos2, Pos2) {
        let (ti, vi) = key.in_handle(dimension);
        let (to, vo) = key.out_handle(dimension);
        (
            view.world_to_screen(ti, vi),
            view.world_to_screen(key.time, key.value[dimension]),
            view.world_to_screen(to, vo),
        )
    }

    /// Find the element under `point`.
    ///
    /// Tangent handles of selected keys win over keys, keys win over curves,
    /// and the time marker only counts when nothing else was hit.
    ///
    /// A key is hit within `key_pixels` horizontally of the nearest key, but
    /// only if the point is also within `spline_pixels` vertically of that
    /// key or of the curve. A point in the key's column far above or below
    /// both is not a key hit.
    pub fn hit_test(
        &self,
        curves: &CurveSet,
        view: &ViewTransform,
        point: Pos2,
        time_marker: Option<f32>,
    ) -> HitResult {
        let (time, _) = view.screen_to_world(point);
        let mut spline_hit: Option<HitResult> = None;

        for (id, channel) in curves.iter() {
            let count = channel.key_count();
            if count == 0 {
                continue;
            }
            let curve_value = channel.evaluate(time);

            for dimension in 0..channel.dimensions() {
                for i in 0..count {
                    if !channel.is_key_selected(i, dimension) {
                        continue;
                    }
                    let Some(key) = channel.key(i) else {
                        continue;
                    };
                    let (handle_in, key_pos, handle_out) = Self::handle_points(view, &key, dimension);
                    for (side, handle) in [(TangentSide::In, handle_in), (TangentSide::Out, handle_out)] {
                        // collapsed handles would shadow the key itself
                        if handle.distance(key_pos) < self.handle_pixels {
                            continue;
                        }
                        if handle.distance(point) < self.handle_pixels {
                            return HitResult {
                                kind: HitKind::TangentHandle(side),
                                channel: Some(id),
                                key: Some(i),
                                dimension,
                                signed_distance: point.x - key_pos.x,
                            };
                        }
                    }
                }

                let nearest = (0..count)
                    .filter_map(|i| channel.key(i).map(|k| (i, k)))
                    .map(|(i, k)| (i, view.world_to_screen(k.time, k.value[dimension])))
                    .min_by(|a, b| (a.1.x - point.x).abs().total_cmp(&(b.1.x - point.x).abs()));
                let curve_y = view.value_to_y(curve_value[dimension]);
                let near_curve = (curve_y - point.y).abs() < self.spline_pixels;

                if let Some((i, key_pos)) = nearest {
                    let dx = point.x - key_pos.x;
                    let near_key = (key_pos.y - point.y).abs() < self.spline_pixels;
                    if dx.abs() < self.key_pixels && (near_key || near_curve) {
                        return HitResult {
                            kind: HitKind::Key,
                            channel: Some(id),
                            key: Some(i),
                            dimension,
                            signed_distance: dx,
                        };
                    }
                    if near_curve && spline_hit.is_none() {
                        spline_hit = Some(HitResult {
                            kind: HitKind::Spline,
                            channel: Some(id),
                            key: Some(i),
                            dimension,
                            signed_distance: dx,
                        });
                    }
                }
            }
        }

        if let Some(hit) = spline_hit {
            return hit;
        }
        if let Some(marker) = time_marker {
            if (view.time_to_x(marker) - point.x).abs() < self.key_pixels {
                return HitResult {
                    kind: HitKind::TimeMarker,
                    ..HitResult::default()
                };
            }
        }
        HitResult::default()
    }

    /// Index of the key-time entry within tolerance of screen `x`
    pub fn hit_key_time(&self, key_times: &KeyTimeSet, view: &ViewTransform, x: f32) -> Option<usize> {
        key_times
            .entries()
            .iter()
            .enumerate()
            .map(|(i, e)| (i, (view.time_to_x(e.time) - x).abs()))
            .filter(|(_, d)| *d < self.key_pixels)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::key::{scalar, CurveKind};
    use egui::{Rect, Vec2};

    fn setup() -> (CurveSet, ChannelId, ViewTransform) {
        let mut curves = CurveSet::new();
        let id = curves.add(
            Channel::new("c", CurveKind::Bezier, 1)
                .with_key(0.0, scalar(0.0))
                .with_key(0.5, scalar(0.5))
                .with_key(1.0, scalar(0.0)),
        );
        let view = ViewTransform::new(
            Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 100.0)),
            Vec2::new(200.0, 100.0),
            Vec2::ZERO,
        );
        (curves, id, view)
    }

    #[test]
    fn test_key_within_four_pixels() {
        let (curves, id, view) = setup();
        let tester = HitTester::default();
        let key_pos = view.world_to_screen(0.5, 0.5);

        let hit = tester.hit_test(&curves, &view, key_pos + Vec2::new(3.0, 0.0), None);
        assert_eq!(hit.kind, HitKind::Key);
        assert_eq!(hit.key_ref(), Some((id, 1)));
        assert_eq!(hit.signed_distance, 3.0);

        let hit = tester.hit_test(&curves, &view, key_pos + Vec2::new(-3.0, 0.0), None);
        assert!(hit.signed_distance < 0.0);
    }

    #[test]
    fn test_spline_away_from_keys() {
        let (curves, id, view) = setup();
        let tester = HitTester::default();
        let time = 0.25;
        let value = curves.get(id).map(|c| c.evaluate(time)[0]).unwrap_or_default();
        let hit = tester.hit_test(&curves, &view, view.world_to_screen(time, value), None);
        assert_eq!(hit.kind, HitKind::Spline);
        assert_eq!(hit.channel, Some(id));
    }

    #[test]
    fn test_nothing_and_time_marker() {
        let (curves, _, view) = setup();
        let tester = HitTester::default();
        let empty = Pos2::new(50.0, 5.0);
        assert_eq!(tester.hit_test(&curves, &view, empty, None).kind, HitKind::Nothing);
        assert_eq!(
            tester.hit_test(&curves, &view, empty, Some(0.25)).kind,
            HitKind::TimeMarker
        );
    }

    #[test]
    fn test_handles_only_for_selected_keys() {
        let (mut curves, id, view) = setup();
        let tester = HitTester::default();
        let key = curves.get(id).and_then(|c| c.key(0)).expect("key");
        let (_, _, out) = HitTester::handle_points(&view, &key, 0);

        assert_ne!(tester.hit_test(&curves, &view, out, None).kind, HitKind::TangentHandle(TangentSide::Out));
        curves.select_key(id, 0, None, true);
        let hit = tester.hit_test(&curves, &view, out, None);
        assert_eq!(hit.kind, HitKind::TangentHandle(TangentSide::Out));
        assert_eq!(hit.key, Some(0));
    }

    #[test]
    fn test_hit_key_time() {
        let (curves, _, view) = setup();
        let mut key_times = KeyTimeSet::new();
        key_times.refresh(&curves);
        let tester = HitTester::default();
        assert_eq!(tester.hit_key_time(&key_times, &view, 101.0), Some(1));
        assert_eq!(tester.hit_key_time(&key_times, &view, 150.0), None);
    }
}
