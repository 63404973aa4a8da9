// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer gesture state machine of the curve view.
//!
//! Every key drag works on absolute offsets: each pointer move first restores
//! the state captured when the drag began, then applies the full delta since
//! the press. On release an undo snapshot is recorded only if key data
//! actually changed.

use egui::{Pos2, Rect, Vec2};

use crate::channel::ChannelId;
use crate::config::EditorConfig;
use crate::curve_set::{CurveSet, EditConstraints, SetBackup};
use crate::editor::EditorEvent;
use crate::hit_test::{HitKind, HitTester};
use crate::key::{KeyFlags, TangentMode, TangentSide};
use crate::key_times::KeyTimeSet;
use crate::snapshot::UndoSnapshot;
use crate::view::ViewTransform;

/// Pointer button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Left button
    Primary,
    /// Right button
    Secondary,
    /// Middle button
    Middle,
}

/// Keyboard modifiers held during a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Shift
    pub shift: bool,
    /// Ctrl (Cmd on macOS)
    pub ctrl: bool,
    /// Alt
    pub alt: bool,
}

/// What a key drag does with the pointer delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDragOperation {
    /// Move in time and value
    Move,
    /// Move in value only
    MoveValue,
    /// Scale times around the time marker
    TimeScale,
    /// Scale values around the value anchor
    ValueScale,
    /// Scale amplitude around the line through the first and last selected key
    Amplitude,
}

impl KeyDragOperation {
    /// Operation selected by the modifiers held at press time
    pub fn from_modifiers(modifiers: Modifiers, amplitude_mode: bool) -> Self {
        match (modifiers.alt, modifiers.shift) {
            (true, true) => Self::ValueScale,
            (true, false) => Self::TimeScale,
            (false, true) => Self::MoveValue,
            (false, false) if amplitude_mode => Self::Amplitude,
            (false, false) => Self::Move,
        }
    }

    /// Name used for the undo entry
    pub fn description(&self) -> &'static str {
        match self {
            Self::Move | Self::MoveValue => "Spline Move",
            Self::TimeScale => "Spline Scale Time",
            Self::ValueScale => "Spline Scale Value",
            Self::Amplitude => "Spline Scale Amplitude",
        }
    }
}

/// Current gesture
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    /// No gesture
    #[default]
    Idle,
    /// Rubber-band selection
    RectSelecting {
        /// Press position
        start: Pos2,
        /// Current pointer position
        current: Pos2,
    },
    /// Dragging selected keys
    DraggingKeys {
        /// What the drag does
        operation: KeyDragOperation,
        /// Press position
        start: Pos2,
    },
    /// Dragging a tangent handle
    DraggingTangent {
        /// Channel of the key
        channel: ChannelId,
        /// Key index
        key: usize,
        /// Value dimension
        dimension: usize,
        /// Handle side
        side: TangentSide,
    },
    /// Scrolling the view
    Panning {
        /// Last pointer position
        last: Pos2,
    },
    /// Zooming the view
    Zooming {
        /// Screen point kept fixed
        anchor: Pos2,
        /// Last pointer position
        last: Pos2,
    },
    /// Moving the time marker
    ScrubbingTimeMarker {
        /// Marker time when scrubbing began
        start_time: f32,
    },
}

/// Everything a gesture may touch
pub struct DragContext<'a> {
    /// Edited curves
    pub curves: &'a mut CurveSet,
    /// View transform
    pub view: &'a mut ViewTransform,
    /// Key time strip
    pub key_times: &'a mut KeyTimeSet,
    /// Settings
    pub config: &'a EditorConfig,
    /// Time marker
    pub time_marker: &'a mut f32,
    /// Outgoing notifications
    pub events: &'a mut Vec<EditorEvent>,
    /// Plain drags scale amplitude instead of moving
    pub amplitude_mode: bool,
}

/// Drives pointer gestures over the curve view
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
    button: Option<PointerButton>,
    origin: Option<UndoSnapshot>,
    drag_base: Option<SetBackup>,
    copy_keys: bool,
    inserted_key: Option<(ChannelId, usize)>,
    grabbed_key: Option<(ChannelId, usize)>,
    active_key: Option<(ChannelId, usize)>,
    value_anchor: f32,
}

impl DragController {
    /// Create an idle controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Current gesture
    pub fn state(&self) -> DragState {
        self.state
    }

    /// Whether no gesture is running
    pub fn is_idle(&self) -> bool {
        matches!(self.state, DragState::Idle)
    }

    /// Key the gesture is centred on. Retargets to the neighbour that
    /// stopped a time move.
    pub fn active_key(&self) -> Option<(ChannelId, usize)> {
        self.active_key
    }

    /// Value kept fixed by value-scale drags
    pub fn value_anchor(&self) -> f32 {
        self.value_anchor
    }

    /// Set the value kept fixed by value-scale drags
    pub fn set_value_anchor(&mut self, anchor: f32) {
        self.value_anchor = anchor;
    }

    /// Rubber band in screen space while rect-selecting
    pub fn selection_rect(&self) -> Option<Rect> {
        match self.state {
            DragState::RectSelecting { start, current } => Some(Rect::from_two_pos(start, current)),
            _ => None,
        }
    }

    /// Handle a button press
    pub fn pointer_down(
        &mut self,
        ctx: &mut DragContext<'_>,
        pos: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
    ) {
        if !self.is_idle() {
            tracing::trace!("Ignoring press during {:?}", self.state);
            return;
        }

        match button {
            PointerButton::Middle => {
                self.button = Some(button);
                self.state = if modifiers.shift {
                    DragState::Zooming { anchor: pos, last: pos }
                } else {
                    DragState::Panning { last: pos }
                };
            }
            PointerButton::Secondary => ctx.events.push(EditorEvent::ContextMenu(pos)),
            PointerButton::Primary => self.primary_down(ctx, pos, modifiers),
        }
    }

    fn primary_down(&mut self, ctx: &mut DragContext<'_>, pos: Pos2, modifiers: Modifiers) {
        let rect = ctx.view.rect;
        let in_ruler = rect.contains(pos) && pos.y < rect.top() + ctx.config.ruler_height;
        let tester = HitTester::from_config(ctx.config);
        let hit = tester.hit_test(ctx.curves, ctx.view, pos, Some(*ctx.time_marker));

        if in_ruler || hit.kind == HitKind::TimeMarker {
            self.start_scrub(ctx, pos);
            return;
        }

        match (hit.kind, hit.key_ref()) {
            (HitKind::TangentHandle(side), Some((channel, key))) => {
                self.begin(ctx, "Spline Tangent");
                self.state = DragState::DraggingTangent {
                    channel,
                    key,
                    dimension: hit.dimension,
                    side,
                };
                self.active_key = Some((channel, key));
            }
            (HitKind::Key, Some((channel, key))) => {
                let operation = KeyDragOperation::from_modifiers(modifiers, ctx.amplitude_mode);
                self.begin(ctx, operation.description());
                if !ctx.curves.is_key_selected(channel, key, hit.dimension) {
                    if !modifiers.ctrl {
                        ctx.curves.clear_selection();
                    }
                    ctx.curves.select_key(channel, key, Some(hit.dimension), true);
                }
                self.start_key_drag(ctx, operation, pos, modifiers.ctrl);
                self.grabbed_key = Some((channel, key));
                self.active_key = self.grabbed_key;
            }
            (HitKind::Spline, _) if ctx.curves.num_selected() > 0 => {
                let operation = KeyDragOperation::from_modifiers(modifiers, ctx.amplitude_mode);
                self.begin(ctx, operation.description());
                self.start_key_drag(ctx, operation, pos, modifiers.ctrl);
            }
            _ => {
                if rect.contains(pos) {
                    self.begin(ctx, "Select Keys");
                    self.button = Some(PointerButton::Primary);
                    self.state = DragState::RectSelecting {
                        start: pos,
                        current: pos,
                    };
                }
            }
        }
    }

    fn begin(&mut self, ctx: &mut DragContext<'_>, description: &str) {
        self.origin = Some(UndoSnapshot::begin_all(description, ctx.curves, ctx.key_times));
        ctx.events.push(EditorEvent::BeforeChange);
    }

    fn start_key_drag(&mut self, ctx: &mut DragContext<'_>, operation: KeyDragOperation, pos: Pos2, copy: bool) {
        self.button = Some(PointerButton::Primary);
        self.copy_keys = copy;
        self.drag_base = Some(ctx.curves.backup_all());
        self.state = DragState::DraggingKeys { operation, start: pos };
    }

    fn start_scrub(&mut self, ctx: &mut DragContext<'_>, pos: Pos2) {
        self.button = Some(PointerButton::Primary);
        self.state = DragState::ScrubbingTimeMarker {
            start_time: *ctx.time_marker,
        };
        ctx.events.push(EditorEvent::TimeStartChange);
        self.scrub_to(ctx, pos);
    }

    fn scrub_to(&mut self, ctx: &mut DragContext<'_>, pos: Pos2) {
        let time = ctx.config.time_range.clamp(ctx.view.x_to_time(pos.x));
        let time = ctx.config.snap.time(time);
        *ctx.time_marker = time;
        ctx.events.push(EditorEvent::TimeChanged(time));
    }

    /// Handle pointer motion
    pub fn pointer_move(&mut self, ctx: &mut DragContext<'_>, pos: Pos2) {
        match self.state {
            DragState::Idle => {}
            DragState::RectSelecting { start, .. } => {
                self.state = DragState::RectSelecting { start, current: pos };
            }
            DragState::DraggingKeys { operation, start } => {
                self.apply_key_drag(ctx, operation, start, pos);
                ctx.key_times.mark_dirty();
                ctx.events.push(EditorEvent::Changed);
            }
            DragState::DraggingTangent {
                channel,
                key,
                dimension,
                side,
            } => {
                let handle = ctx.view.screen_to_world(pos);
                ctx.curves.set_tangent_handle(channel, key, dimension, side, handle);
                ctx.events.push(EditorEvent::Changed);
            }
            DragState::Panning { last } => {
                ctx.view.pan_pixels(pos - last);
                self.state = DragState::Panning { last: pos };
                ctx.events.push(EditorEvent::ViewChanged);
            }
            DragState::Zooming { anchor, last } => {
                let delta = pos - last;
                let factor = Vec2::new((1.0 + delta.x * 0.01).max(0.1), (1.0 - delta.y * 0.01).max(0.1));
                ctx.view
                    .zoom_about(factor, anchor, ctx.config.min_zoom, ctx.config.max_zoom);
                self.state = DragState::Zooming { anchor, last: pos };
                ctx.events.push(EditorEvent::ViewChanged);
            }
            DragState::ScrubbingTimeMarker { .. } => self.scrub_to(ctx, pos),
        }
    }

    fn apply_key_drag(&mut self, ctx: &mut DragContext<'_>, operation: KeyDragOperation, start: Pos2, pos: Pos2) {
        if let Some(base) = &self.drag_base {
            ctx.curves.restore(base);
        }
        let (t0, v0) = ctx.view.screen_to_world(start);
        let (t1, v1) = ctx.view.screen_to_world(pos);
        let constraints = EditConstraints::from_config(ctx.config);

        let blocker = match operation {
            KeyDragOperation::Move => {
                ctx.curves
                    .move_selected_keys(t1 - t0, v1 - v0, self.copy_keys, &constraints)
            }
            KeyDragOperation::MoveValue => {
                ctx.curves
                    .move_selected_keys(0.0, v1 - v0, self.copy_keys, &constraints)
            }
            KeyDragOperation::TimeScale => {
                ctx.curves
                    .time_scale_keys(*ctx.time_marker, t0, t1, &constraints)
            }
            KeyDragOperation::ValueScale => {
                ctx.curves
                    .value_scale_keys(self.value_anchor, v0, v1, &constraints);
                None
            }
            KeyDragOperation::Amplitude => {
                ctx.curves.scale_amplitude_keys(t0, v0, v1 - v0);
                None
            }
        };
        self.active_key = blocker.or(self.grabbed_key);
    }

    /// Handle a button release
    pub fn pointer_up(
        &mut self,
        ctx: &mut DragContext<'_>,
        pos: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
    ) {
        if self.button != Some(button) {
            return;
        }
        let state = std::mem::take(&mut self.state);
        self.button = None;

        match state {
            DragState::Idle | DragState::Panning { .. } | DragState::Zooming { .. } => {}
            DragState::RectSelecting { start, .. } => {
                if !modifiers.ctrl && !modifiers.alt {
                    ctx.curves.clear_selection();
                }
                ctx.curves
                    .select_rectangle(ctx.view, Rect::from_two_pos(start, pos), !modifiers.alt);
                self.finish(ctx);
            }
            DragState::DraggingKeys { .. } | DragState::DraggingTangent { .. } => {
                if self.inserted_key.is_some() {
                    let safe = ctx.view.rect.expand(ctx.config.insert_cancel_margin);
                    if !safe.contains(pos) {
                        tracing::debug!("Insert released outside the view, discarding key");
                        self.restore_origin(ctx);
                        return;
                    }
                }
                self.finish(ctx);
            }
            DragState::ScrubbingTimeMarker { .. } => ctx.events.push(EditorEvent::TimeEndChange),
        }
    }

    /// Handle a double click
    pub fn double_click(&mut self, ctx: &mut DragContext<'_>, pos: Pos2) {
        if !self.is_idle() {
            return;
        }
        let tester = HitTester::from_config(ctx.config);
        let hit = tester.hit_test(ctx.curves, ctx.view, pos, None);
        let Some(channel) = hit.channel else {
            return;
        };

        match hit.kind {
            HitKind::Spline => {
                self.begin(ctx, "Spline Insert Key");
                let constraints = EditConstraints::from_config(ctx.config);
                let time = constraints.time(ctx.view.x_to_time(pos.x));
                let Some(property) = ctx.curves.get_mut(channel) else {
                    self.reset();
                    return;
                };
                let before = property.key_count();
                let value = property.evaluate(time);
                let index = property.insert_key(time, value);
                if property.key_count() > before {
                    let mode = ctx.config.default_tangent_mode;
                    property.set_key_flags(index, KeyFlags::with_mode(mode));
                }
                ctx.curves.clear_selection();
                ctx.curves.select_key(channel, index, Some(hit.dimension), true);

                self.inserted_key = Some((channel, index));
                self.start_key_drag(ctx, KeyDragOperation::Move, pos, false);
                self.grabbed_key = Some((channel, index));
                self.active_key = self.grabbed_key;
                ctx.key_times.mark_dirty();
                ctx.events.push(EditorEvent::Changed);
            }
            HitKind::Key => {
                let Some(key) = hit.key else {
                    return;
                };
                self.begin(ctx, "Remove Spline Key");
                if let Some(property) = ctx.curves.get_mut(channel) {
                    property.remove_key(key);
                }
                self.finish(ctx);
            }
            HitKind::TangentHandle(side) => {
                let Some(key) = hit.key else {
                    return;
                };
                self.begin(ctx, "Reset Tangent");
                if let Some(property) = ctx.curves.get_mut(channel) {
                    if let Some(mut flags) = property.key_flags(key) {
                        flags.set_mode(side, TangentMode::Auto);
                        property.set_key_flags(key, flags);
                    }
                }
                self.finish(ctx);
            }
            HitKind::Nothing | HitKind::TimeMarker => {}
        }
    }

    /// Abort the gesture, restoring the state from before it began. No undo
    /// entry is recorded.
    pub fn cancel(&mut self, ctx: &mut DragContext<'_>) {
        match std::mem::take(&mut self.state) {
            DragState::Idle => {}
            DragState::ScrubbingTimeMarker { start_time } => {
                *ctx.time_marker = start_time;
                ctx.events.push(EditorEvent::TimeChanged(start_time));
                ctx.events.push(EditorEvent::TimeEndChange);
            }
            DragState::Panning { .. } | DragState::Zooming { .. } => {}
            DragState::RectSelecting { .. }
            | DragState::DraggingKeys { .. }
            | DragState::DraggingTangent { .. } => self.restore_origin(ctx),
        }
        self.reset();
    }

    fn restore_origin(&mut self, ctx: &mut DragContext<'_>) {
        if let Some(origin) = self.origin.take() {
            ctx.curves.restore(origin.backup());
            ctx.key_times.mark_dirty();
            ctx.events.push(EditorEvent::Changed);
        }
        self.reset();
    }

    fn finish(&mut self, ctx: &mut DragContext<'_>) {
        let origin = self.origin.take();
        self.reset();
        let Some(mut snapshot) = origin else {
            return;
        };
        ctx.key_times.mark_dirty();

        if snapshot.is_key_data_changed(ctx.curves) {
            snapshot.commit(ctx.curves);
            ctx.events.push(EditorEvent::Changed);
            ctx.events.push(EditorEvent::UndoRecorded(snapshot));
        } else if ctx.config.record_selection_undo && snapshot.is_selection_changed(ctx.curves) {
            snapshot.commit(ctx.curves);
            ctx.events.push(EditorEvent::UndoRecorded(snapshot));
        }
    }

    fn reset(&mut self) {
        self.state = DragState::Idle;
        self.button = None;
        self.origin = None;
        self.drag_base = None;
        self.copy_keys = false;
        self.inserted_key = None;
        self.grabbed_key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::config::Interval;
    use crate::key::{scalar, CurveKind, MIN_TIME_EPSILON};

    struct Fixture {
        curves: CurveSet,
        view: ViewTransform,
        key_times: KeyTimeSet,
        config: EditorConfig,
        marker: f32,
        events: Vec<EditorEvent>,
        id: ChannelId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut curves = CurveSet::new();
            let id = curves.add(
                Channel::new("c", CurveKind::Bezier, 1)
                    .with_key(0.0, scalar(0.0))
                    .with_key(1.0, scalar(1.0))
                    .with_key(2.0, scalar(0.0)),
            );
            let config = EditorConfig {
                time_range: Interval::new(0.0, 10.0),
                ..EditorConfig::default()
            };
            let view = ViewTransform::new(
                Rect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 200.0)),
                Vec2::new(100.0, 50.0),
                Vec2::new(0.0, -1.0),
            );
            Self {
                curves,
                view,
                key_times: KeyTimeSet::new(),
                config,
                marker: 0.0,
                events: Vec::new(),
                id,
            }
        }

        fn ctx(&mut self) -> DragContext<'_> {
            DragContext {
                curves: &mut self.curves,
                view: &mut self.view,
                key_times: &mut self.key_times,
                config: &self.config,
                time_marker: &mut self.marker,
                events: &mut self.events,
                amplitude_mode: false,
            }
        }

        fn key_pos(&self, index: usize) -> Pos2 {
            let key = self.curves.get(self.id).and_then(|c| c.key(index)).expect("key");
            self.view.world_to_screen(key.time, key.value[0])
        }

        fn times(&self) -> Vec<f32> {
            let channel = self.curves.get(self.id).expect("channel");
            (0..channel.key_count()).filter_map(|i| channel.key_time(i)).collect()
        }

        fn undo_count(&self) -> usize {
            self.events
                .iter()
                .filter(|e| matches!(e, EditorEvent::UndoRecorded(_)))
                .count()
        }
    }

    #[test]
    fn test_drag_past_neighbour_stops_and_retargets() {
        let mut f = Fixture::new();
        let mut drag = DragController::new();
        let start = f.key_pos(1);
        let end = start + Vec2::new(150.0, 0.0);

        drag.pointer_down(&mut f.ctx(), start, PointerButton::Primary, Modifiers::default());
        drag.pointer_move(&mut f.ctx(), start + Vec2::new(50.0, 0.0));
        drag.pointer_move(&mut f.ctx(), end);
        assert_eq!(drag.active_key(), Some((f.id, 2)));
        drag.pointer_up(&mut f.ctx(), end, PointerButton::Primary, Modifiers::default());

        let times = f.times();
        assert_eq!(times.len(), 3);
        assert!(times[1] < 2.0);
        assert!(times[1] >= 2.0 - MIN_TIME_EPSILON - 1e-5);
        assert!(f.curves.is_key_selected(f.id, 1, 0));
        assert_eq!(f.undo_count(), 1);
        assert!(drag.is_idle());
    }

    #[test]
    fn test_retarget_reverts_when_pointer_returns() {
        let mut f = Fixture::new();
        let mut drag = DragController::new();
        let start = f.key_pos(1);
        drag.pointer_down(&mut f.ctx(), start, PointerButton::Primary, Modifiers::default());
        drag.pointer_move(&mut f.ctx(), start + Vec2::new(150.0, 0.0));
        assert_eq!(drag.active_key(), Some((f.id, 2)));

        drag.pointer_move(&mut f.ctx(), start + Vec2::new(20.0, 0.0));
        assert_eq!(drag.active_key(), Some((f.id, 1)));
        assert!((f.times()[1] - 1.2).abs() < 1e-4);
        assert_eq!(f.times()[2], 2.0);
    }

    #[test]
    fn test_moves_are_absolute() {
        let mut f = Fixture::new();
        let mut drag = DragController::new();
        let start = f.key_pos(1);
        drag.pointer_down(&mut f.ctx(), start, PointerButton::Primary, Modifiers::default());
        for dx in [10.0, 30.0, 20.0] {
            drag.pointer_move(&mut f.ctx(), start + Vec2::new(dx, 0.0));
        }
        assert!((f.times()[1] - 1.2).abs() < 1e-4);
    }

    #[test]
    fn test_cancel_restores_without_undo() {
        let mut f = Fixture::new();
        let before = f.curves.backup_all();
        let mut drag = DragController::new();
        let start = f.key_pos(1);
        drag.pointer_down(&mut f.ctx(), start, PointerButton::Primary, Modifiers::default());
        drag.pointer_move(&mut f.ctx(), start + Vec2::new(40.0, -20.0));
        drag.cancel(&mut f.ctx());
        assert_eq!(f.curves.backup_all(), before);
        assert_eq!(f.undo_count(), 0);
        assert!(drag.is_idle());
    }

    #[test]
    fn test_click_select_records_no_undo() {
        let mut f = Fixture::new();
        let mut drag = DragController::new();
        let pos = f.key_pos(0);
        drag.pointer_down(&mut f.ctx(), pos, PointerButton::Primary, Modifiers::default());
        drag.pointer_up(&mut f.ctx(), pos, PointerButton::Primary, Modifiers::default());
        assert!(f.curves.is_key_selected(f.id, 0, 0));
        assert_eq!(f.undo_count(), 0);

        f.config.record_selection_undo = true;
        let pos = f.key_pos(2);
        drag.pointer_down(&mut f.ctx(), pos, PointerButton::Primary, Modifiers::default());
        drag.pointer_up(&mut f.ctx(), pos, PointerButton::Primary, Modifiers::default());
        assert_eq!(f.undo_count(), 1);
    }

    #[test]
    fn test_press_during_drag_is_ignored() {
        let mut f = Fixture::new();
        let mut drag = DragController::new();
        let start = f.key_pos(1);
        drag.pointer_down(&mut f.ctx(), start, PointerButton::Primary, Modifiers::default());
        let state = drag.state();
        drag.pointer_down(&mut f.ctx(), Pos2::new(5.0, 5.0), PointerButton::Middle, Modifiers::default());
        assert_eq!(drag.state(), state);
        // release of a button that did not start the gesture changes nothing
        drag.pointer_up(&mut f.ctx(), start, PointerButton::Middle, Modifiers::default());
        assert_eq!(drag.state(), state);
    }

    #[test]
    fn test_insert_released_outside_is_discarded() {
        let mut f = Fixture::new();
        let before = f.curves.backup_all();
        let mut drag = DragController::new();
        let time = 0.5;
        let value = f.curves.get(f.id).map(|c| c.evaluate(time)[0]).unwrap_or_default();
        let pos = f.view.world_to_screen(time, value);

        drag.double_click(&mut f.ctx(), pos);
        assert_eq!(f.times().len(), 4);
        let far = Pos2::new(2000.0, 2000.0);
        drag.pointer_move(&mut f.ctx(), far);
        drag.pointer_up(&mut f.ctx(), far, PointerButton::Primary, Modifiers::default());

        assert_eq!(f.curves.backup_all(), before);
        assert_eq!(f.undo_count(), 0);
    }

    #[test]
    fn test_insert_released_inside_records_undo() {
        let mut f = Fixture::new();
        let mut drag = DragController::new();
        let time = 0.5;
        let value = f.curves.get(f.id).map(|c| c.evaluate(time)[0]).unwrap_or_default();
        let pos = f.view.world_to_screen(time, value);

        drag.double_click(&mut f.ctx(), pos);
        drag.pointer_up(&mut f.ctx(), pos, PointerButton::Primary, Modifiers::default());
        assert_eq!(f.times().len(), 4);
        assert_eq!(f.undo_count(), 1);
    }

    #[test]
    fn test_double_click_key_removes_it() {
        let mut f = Fixture::new();
        let mut drag = DragController::new();
        let pos = f.key_pos(1);
        drag.double_click(&mut f.ctx(), pos);
        assert_eq!(f.times(), vec![0.0, 2.0]);
        assert_eq!(f.undo_count(), 1);
    }

    #[test]
    fn test_rect_select_and_pan() {
        let mut f = Fixture::new();
        let mut drag = DragController::new();
        let start = Pos2::new(60.0, 20.0);
        let end = Pos2::new(105.0, 160.0);

        drag.pointer_down(&mut f.ctx(), start, PointerButton::Primary, Modifiers::default());
        assert!(matches!(drag.state(), DragState::RectSelecting { .. }));
        drag.pointer_move(&mut f.ctx(), end);
        assert!(drag.selection_rect().is_some());
        drag.pointer_up(&mut f.ctx(), end, PointerButton::Primary, Modifiers::default());
        assert_eq!(f.curves.num_selected(), 1);

        let origin = f.view.origin;
        drag.pointer_down(&mut f.ctx(), Pos2::new(100.0, 100.0), PointerButton::Middle, Modifiers::default());
        drag.pointer_move(&mut f.ctx(), Pos2::new(150.0, 100.0));
        drag.pointer_up(&mut f.ctx(), Pos2::new(150.0, 100.0), PointerButton::Middle, Modifiers::default());
        assert!((f.view.origin.x - (origin.x - 0.5)).abs() < 1e-5);
        assert!(f.events.contains(&EditorEvent::ViewChanged));
    }

    #[test]
    fn test_scrub_time_marker_in_ruler() {
        let mut f = Fixture::new();
        let mut drag = DragController::new();
        drag.pointer_down(&mut f.ctx(), Pos2::new(150.0, 4.0), PointerButton::Primary, Modifiers::default());
        assert!((f.marker - 1.5).abs() < 1e-5);
        drag.pointer_move(&mut f.ctx(), Pos2::new(250.0, 4.0));
        drag.pointer_up(&mut f.ctx(), Pos2::new(250.0, 4.0), PointerButton::Primary, Modifiers::default());
        assert!((f.marker - 2.5).abs() < 1e-5);
        assert_eq!(f.events.first(), Some(&EditorEvent::TimeStartChange));
        assert_eq!(f.events.last(), Some(&EditorEvent::TimeEndChange));
    }
}
