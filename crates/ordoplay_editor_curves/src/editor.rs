// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curve editor session.
//!
//! [`CurveEditor`] owns everything one curve view needs: the channels, the
//! view transform, the key-time cache, the time marker and the gesture state.
//! Collaborators talk to it through method calls and drain its outgoing
//! [`EditorEvent`]s with [`CurveEditor::take_events`]. Undo entries are handed
//! out as [`UndoSnapshot`]s; the host's undo stack decides when to apply them.

use egui::{Pos2, Rect, Vec2};

use crate::channel::{Channel, ChannelId};
use crate::clipboard::KeyClipboard;
use crate::config::{EditorConfig, Interval};
use crate::curve_set::{CurveSet, EditConstraints};
use crate::drag::{DragContext, DragController, DragState, Modifiers, PointerButton};
use crate::error::{ClipboardError, Result};
use crate::hit_test::{HitKind, HitTester};
use crate::key::{CurveKind, KeyFlags, KeyValue, TangentMode, TangentSide};
use crate::key_times::KeyTimeSet;
use crate::snapshot::UndoSnapshot;
use crate::view::ViewTransform;

/// Pixels kept free around the keys by the fit commands
const FIT_MARGIN: f32 = 10.0;

/// Notification for collaborators of the editor
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Curve data is about to change
    BeforeChange,
    /// Curve data or selection changed
    Changed,
    /// Time marker scrubbing started
    TimeStartChange,
    /// Time marker moved
    TimeChanged(f32),
    /// Time marker scrubbing ended
    TimeEndChange,
    /// Zoom or scroll changed
    ViewChanged,
    /// Context menu requested at a screen position
    ContextMenu(Pos2),
    /// An undoable edit finished
    UndoRecorded(UndoSnapshot),
}

/// Sampled curve of one channel dimension in screen space
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePolyline {
    /// Channel
    pub channel: ChannelId,
    /// Value dimension
    pub dimension: usize,
    /// Curve colour
    pub color: [u8; 3],
    /// Screen points, left to right
    pub points: Vec<Pos2>,
}

/// Key marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyMarker {
    /// Channel
    pub channel: ChannelId,
    /// Key index
    pub key: usize,
    /// Value dimension
    pub dimension: usize,
    /// Screen position
    pub pos: Pos2,
    /// Whether this dimension of the key is selected
    pub selected: bool,
}

/// Tangent handles of a selected key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleMarker {
    /// Channel
    pub channel: ChannelId,
    /// Key index
    pub key: usize,
    /// Value dimension
    pub dimension: usize,
    /// Key position
    pub key_pos: Pos2,
    /// Incoming handle position
    pub in_pos: Pos2,
    /// Outgoing handle position
    pub out_pos: Pos2,
}

/// Shared key time on the timeline strip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyTimeMarker {
    /// Screen x
    pub x: f32,
    /// Number of channels with a key at this time
    pub count: usize,
    /// Whether the time is selected
    pub selected: bool,
}

/// Everything the renderer draws for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    /// View rectangle
    pub rect: Rect,
    /// Curve polylines
    pub curves: Vec<CurvePolyline>,
    /// Key markers
    pub keys: Vec<KeyMarker>,
    /// Tangent handles of selected keys
    pub handles: Vec<HandleMarker>,
    /// Key-time markers
    pub key_times: Vec<KeyTimeMarker>,
    /// Key the current gesture is centred on
    pub active_key: Option<(ChannelId, usize)>,
    /// Time marker x, if inside the view
    pub time_marker_x: Option<f32>,
    /// Rubber band while rect-selecting
    pub selection_rect: Option<Rect>,
}

/// Curve editor session
#[derive(Debug)]
pub struct CurveEditor {
    /// Edited channels
    pub curves: CurveSet,
    /// View transform
    pub view: ViewTransform,
    /// Settings
    pub config: EditorConfig,
    key_times: KeyTimeSet,
    drag: DragController,
    time_marker: f32,
    amplitude_mode: bool,
    events: Vec<EditorEvent>,
}

impl Default for CurveEditor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl CurveEditor {
    /// Create an editor with no channels
    pub fn new(config: EditorConfig) -> Self {
        Self::with_curves(CurveSet::new(), config)
    }

    /// Create an editor over existing channels
    pub fn with_curves(curves: CurveSet, config: EditorConfig) -> Self {
        let key_times = KeyTimeSet::new()
            .with_threshold(config.key_time_threshold)
            .with_time_range(config.time_range)
            .with_snap(config.snap);
        Self {
            curves,
            view: ViewTransform::default(),
            config,
            key_times,
            drag: DragController::new(),
            time_marker: 0.0,
            amplitude_mode: false,
            events: Vec::new(),
        }
    }

    /// Add an empty editor-owned channel using the configured key epsilon
    pub fn add_channel(&mut self, name: impl Into<String>, kind: CurveKind, dimensions: usize) -> ChannelId {
        let channel = Channel::new(name, kind, dimensions).with_min_time_epsilon(self.config.min_time_epsilon);
        let id = self.curves.add(channel);
        self.key_times.mark_dirty();
        id
    }

    /// Shared key times of the channels
    pub fn key_times(&mut self) -> &KeyTimeSet {
        self.key_times.refresh(&self.curves);
        &self.key_times
    }

    /// Select or deselect a shared key time
    pub fn select_key_time(&mut self, index: usize, selected: bool) {
        self.key_times.refresh(&self.curves);
        self.key_times.select(index, selected);
    }

    /// Current gesture
    pub fn drag_state(&self) -> DragState {
        self.drag.state()
    }

    /// Whether a gesture is running
    pub fn is_dragging(&self) -> bool {
        !self.drag.is_idle()
    }

    /// Time marker position
    pub fn time_marker(&self) -> f32 {
        self.time_marker
    }

    /// Move the time marker from outside (playback)
    pub fn set_time_marker(&mut self, time: f32) {
        self.time_marker = time;
    }

    /// Whether plain key drags scale amplitude
    pub fn amplitude_mode(&self) -> bool {
        self.amplitude_mode
    }

    /// Make plain key drags scale amplitude instead of moving
    pub fn set_amplitude_mode(&mut self, enabled: bool) {
        self.amplitude_mode = enabled;
    }

    /// Value kept fixed by value-scale drags
    pub fn set_value_anchor(&mut self, anchor: f32) {
        self.drag.set_value_anchor(anchor);
    }

    /// Set the screen rectangle of the curve area
    pub fn set_view_rect(&mut self, rect: Rect) {
        if self.view.rect != rect {
            self.view.rect = rect;
            self.events.push(EditorEvent::ViewChanged);
        }
    }

    /// Drain the pending notifications
    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    fn with_drag<R>(&mut self, f: impl FnOnce(&mut DragController, &mut DragContext<'_>) -> R) -> R {
        let mut ctx = DragContext {
            curves: &mut self.curves,
            view: &mut self.view,
            key_times: &mut self.key_times,
            config: &self.config,
            time_marker: &mut self.time_marker,
            events: &mut self.events,
            amplitude_mode: self.amplitude_mode,
        };
        f(&mut self.drag, &mut ctx)
    }

    // ----- pointer input -----

    /// Button pressed
    pub fn pointer_down(&mut self, pos: Pos2, button: PointerButton, modifiers: Modifiers) {
        self.with_drag(|drag, ctx| drag.pointer_down(ctx, pos, button, modifiers));
    }

    /// Pointer moved
    pub fn pointer_move(&mut self, pos: Pos2) {
        self.with_drag(|drag, ctx| drag.pointer_move(ctx, pos));
    }

    /// Button released
    pub fn pointer_up(&mut self, pos: Pos2, button: PointerButton, modifiers: Modifiers) {
        self.with_drag(|drag, ctx| drag.pointer_up(ctx, pos, button, modifiers));
    }

    /// Double click
    pub fn double_click(&mut self, pos: Pos2) {
        self.with_drag(|drag, ctx| drag.double_click(ctx, pos));
    }

    /// Abort the running gesture (Escape)
    pub fn cancel_drag(&mut self) {
        self.with_drag(|drag, ctx| drag.cancel(ctx));
    }

    /// Zoom both axes about `pos`. Positive `delta` zooms in.
    pub fn wheel_zoom(&mut self, pos: Pos2, delta: f32) {
        if delta == 0.0 {
            return;
        }
        let factor = (delta * 0.002).exp();
        self.view
            .zoom_about(Vec2::splat(factor), pos, self.config.min_zoom, self.config.max_zoom);
        self.events.push(EditorEvent::ViewChanged);
    }

    // ----- commands -----

    /// Run `edit` as one undoable step.
    ///
    /// An undo entry is recorded only if key data changed, or for selection
    /// changes when `record_selection_undo` is set. Ignored while a gesture is
    /// running.
    fn transaction<R>(&mut self, description: &str, edit: impl FnOnce(&mut Self) -> R) -> Option<R> {
        if !self.drag.is_idle() {
            tracing::trace!("Ignoring '{}' during {:?}", description, self.drag.state());
            return None;
        }
        let mut snapshot = UndoSnapshot::begin_all(description, &self.curves, &self.key_times);
        self.events.push(EditorEvent::BeforeChange);
        let result = edit(self);
        self.key_times.mark_dirty();

        if snapshot.is_key_data_changed(&self.curves) {
            snapshot.commit(&self.curves);
            self.events.push(EditorEvent::Changed);
            self.events.push(EditorEvent::UndoRecorded(snapshot));
        } else if snapshot.is_selection_changed(&self.curves) {
            self.events.push(EditorEvent::Changed);
            if self.config.record_selection_undo {
                snapshot.commit(&self.curves);
                self.events.push(EditorEvent::UndoRecorded(snapshot));
            }
        }
        Some(result)
    }

    /// Insert a key on the curve under `pos`, holding the curve's value
    pub fn insert_key_at(&mut self, pos: Pos2) -> Option<(ChannelId, usize)> {
        let hit = HitTester::from_config(&self.config).hit_test(&self.curves, &self.view, pos, None);
        if hit.kind != HitKind::Spline {
            return None;
        }
        let channel = hit.channel?;
        let time = EditConstraints::from_config(&self.config).time(self.view.x_to_time(pos.x));
        let mode = self.config.default_tangent_mode;
        self.transaction("Spline Insert Key", |editor| {
            let property = editor.curves.get_mut(channel)?;
            let before = property.key_count();
            let value = property.evaluate(time);
            let index = property.insert_key(time, value);
            if property.key_count() > before {
                property.set_key_flags(index, KeyFlags::with_mode(mode));
            }
            Some((channel, index))
        })
        .flatten()
    }

    /// Remove one key
    pub fn remove_key(&mut self, channel: ChannelId, key: usize) {
        self.transaction("Remove Spline Key", |editor| {
            if let Some(property) = editor.curves.get_mut(channel) {
                property.remove_key(key);
            }
        });
    }

    /// Delete the selected keys
    pub fn remove_selected_keys(&mut self) {
        self.transaction("Delete Spline Keys", |editor| editor.curves.remove_selected_keys());
    }

    /// Delete every key at a selected shared time
    pub fn remove_selected_key_times(&mut self) -> usize {
        self.key_times.refresh(&self.curves);
        self.transaction("Delete Key Times", |editor| {
            editor.key_times.remove_selected_times(&mut editor.curves)
        })
        .unwrap_or(0)
    }

    /// Delete every key that is not selected
    pub fn remove_all_keys_but_selected(&mut self) {
        self.transaction("Remove All Keys But Selected", |editor| {
            editor.curves.remove_all_keys_but_selected()
        });
    }

    /// Copy the selected keys `time_offset` later. The copies become the
    /// selection.
    pub fn duplicate_selected_keys(&mut self, time_offset: f32) -> usize {
        let constraints = EditConstraints::from_config(&self.config);
        self.transaction("Duplicate Spline Keys", |editor| {
            editor.curves.duplicate_selected_keys(time_offset, &constraints)
        })
        .unwrap_or(0)
    }

    /// Select every key
    pub fn select_all(&mut self) {
        self.transaction("Select All Keys", |editor| editor.curves.select_all());
    }

    /// Deselect every key
    pub fn clear_selection(&mut self) {
        self.transaction("Clear Key Selection", |editor| editor.curves.clear_selection());
    }

    /// Set the tangent mode of the selected keys on one side, or both with
    /// `None`
    pub fn set_tangent_mode(&mut self, side: Option<TangentSide>, mode: TangentMode) {
        self.transaction("Set Tangent Mode", |editor| {
            editor.curves.set_selected_tangent_mode(side, mode)
        });
    }

    /// Break or unify the tangents of the selected keys
    pub fn set_tangents_broken(&mut self, broken: bool) {
        let description = if broken { "Break Tangents" } else { "Unify Tangents" };
        self.transaction(description, |editor| {
            editor.curves.modify_selected_key_flags(|flags| flags.broken = broken)
        });
    }

    /// Cycle the tangent mode of the key side under `pos`. Left of the key
    /// is the incoming side.
    pub fn cycle_slope(&mut self, pos: Pos2) {
        let hit = HitTester::from_config(&self.config).hit_test(&self.curves, &self.view, pos, None);
        let (HitKind::Key, Some((channel, key))) = (hit.kind, hit.key_ref()) else {
            return;
        };
        let side = if hit.signed_distance < 0.0 {
            TangentSide::In
        } else {
            TangentSide::Out
        };
        self.transaction("Cycle Slope", |editor| editor.curves.cycle_tangent_mode(channel, key, side));
    }

    /// Set every key at the time marker to zero
    pub fn zero_all(&mut self) {
        let (time, threshold) = (self.time_marker, self.config.key_time_threshold);
        self.transaction("Zero All Keys", |editor| editor.curves.zero_all(time, threshold));
    }

    /// Key every channel at the time marker
    pub fn key_all(&mut self) {
        let (time, threshold) = (self.time_marker, self.config.key_time_threshold);
        let mode = self.config.default_tangent_mode;
        self.transaction("Key All", |editor| editor.curves.key_all(time, threshold, mode));
    }

    /// Move the time marker to the next key, or the previous one
    pub fn goto_key(&mut self, previous: bool) -> Option<f32> {
        let time = self.curves.next_key_time(self.time_marker, previous)?;
        self.time_marker = time;
        self.events.push(EditorEvent::TimeStartChange);
        self.events.push(EditorEvent::TimeChanged(time));
        self.events.push(EditorEvent::TimeEndChange);
        Some(time)
    }

    /// Encode the selected keys as clipboard text
    pub fn copy_keys(&self) -> std::result::Result<Option<String>, ClipboardError> {
        KeyClipboard::copy_selected(&self.curves)
            .map(|clipboard| clipboard.to_ron())
            .transpose()
    }

    /// Paste clipboard text at the time marker into the channels that carry a
    /// selection. Returns the number of keys inserted.
    pub fn paste_keys(&mut self, text: &str) -> std::result::Result<usize, ClipboardError> {
        let clipboard = KeyClipboard::from_ron(text)?;
        let at = self.time_marker;
        self.transaction("Paste Keys", |editor| clipboard.paste(&mut editor.curves, at))
            .unwrap_or(Ok(0))
    }

    /// Fit the time span of the keys to the view width
    pub fn fit_width(&mut self) {
        let range = self.curves.time_bounds().unwrap_or(self.config.time_range);
        let range = if range.length() <= f32::EPSILON {
            Interval::new(range.start - 0.5, range.end + 0.5)
        } else {
            range
        };
        self.view.fit_time(range, FIT_MARGIN);
        self.events.push(EditorEvent::ViewChanged);
    }

    /// Fit the values of the visible curve span to the view height
    pub fn fit_height(&mut self) {
        let samples = (self.view.rect.width() / self.config.curve_sample_step).max(1.0) as usize;
        let range = self
            .curves
            .value_bounds(self.view.visible_time_range(), samples)
            .unwrap_or(self.config.default_value_range);
        let range = if range.length() <= f32::EPSILON {
            Interval::new(range.start - 0.5, range.end + 0.5)
        } else {
            range
        };
        self.view.fit_value(range, FIT_MARGIN);
        self.events.push(EditorEvent::ViewChanged);
    }

    // ----- key time strip -----

    /// Start dragging the selected shared key times
    pub fn begin_key_time_edit(&mut self) {
        self.key_times.begin_editing(&self.curves);
        self.events.push(EditorEvent::BeforeChange);
    }

    /// Move the selected shared key times to `time * scale + offset`,
    /// measured from the state at [`begin_key_time_edit`](Self::begin_key_time_edit)
    pub fn move_key_times(&mut self, scale: f32, offset: f32, copy: bool) {
        let indices = self.key_times.selected_indices();
        self.key_times.set_snap(self.config.snap);
        self.key_times
            .move_times(&mut self.curves, &indices, scale, offset, copy);
        self.events.push(EditorEvent::Changed);
    }

    /// Finish a key time drag, recording undo if anything moved
    pub fn end_key_time_edit(&mut self) {
        if let Some(snapshot) = self.key_times.end_editing(&self.curves) {
            tracing::debug!("Key time edit recorded");
            self.events.push(EditorEvent::Changed);
            self.events.push(EditorEvent::UndoRecorded(snapshot));
        }
    }

    /// Abort a key time drag
    pub fn cancel_key_time_edit(&mut self) {
        self.key_times.cancel_editing(&mut self.curves);
        self.events.push(EditorEvent::Changed);
    }

    // ----- undo -----

    /// Apply the undo side of a snapshot handed out earlier
    pub fn undo(&mut self, snapshot: &mut UndoSnapshot) -> Result<()> {
        tracing::debug!("Undo '{}'", snapshot.description());
        let result = snapshot.undo(&mut self.curves, &mut self.key_times);
        self.key_times.mark_dirty();
        self.events.push(EditorEvent::Changed);
        result
    }

    /// Apply the redo side of a snapshot handed out earlier
    pub fn redo(&mut self, snapshot: &mut UndoSnapshot) -> Result<()> {
        tracing::debug!("Redo '{}'", snapshot.description());
        let result = snapshot.redo(&mut self.curves, &mut self.key_times);
        self.key_times.mark_dirty();
        self.events.push(EditorEvent::Changed);
        result
    }

    // ----- rendering -----

    /// Geometry to draw for the current state
    pub fn render_frame(&mut self) -> RenderFrame {
        self.key_times.refresh(&self.curves);
        let view = &self.view;
        let rect = view.rect;
        let step = self.config.curve_sample_step.max(0.5);
        let mut frame = RenderFrame {
            rect,
            active_key: self.drag.active_key(),
            selection_rect: self.drag.selection_rect(),
            curves: Vec::new(),
            keys: Vec::new(),
            handles: Vec::new(),
            key_times: Vec::new(),
            time_marker_x: None,
        };

        for (id, channel) in self.curves.iter() {
            if channel.key_count() == 0 {
                continue;
            }
            let mut samples: Vec<(f32, KeyValue)> = Vec::new();
            let mut x = rect.left();
            while x <= rect.right() {
                samples.push((x, channel.evaluate(view.x_to_time(x))));
                x += step;
            }
            for dimension in 0..channel.dimensions() {
                frame.curves.push(CurvePolyline {
                    channel: id,
                    dimension,
                    color: channel.color(),
                    points: samples
                        .iter()
                        .map(|(x, value)| Pos2::new(*x, view.value_to_y(value[dimension])))
                        .collect(),
                });
            }

            for i in 0..channel.key_count() {
                let Some(key) = channel.key(i) else {
                    continue;
                };
                for dimension in 0..channel.dimensions() {
                    let selected = key.flags.selected.contains(dimension);
                    let (in_pos, key_pos, out_pos) = HitTester::handle_points(view, &key, dimension);
                    frame.keys.push(KeyMarker {
                        channel: id,
                        key: i,
                        dimension,
                        pos: key_pos,
                        selected,
                    });
                    if selected {
                        frame.handles.push(HandleMarker {
                            channel: id,
                            key: i,
                            dimension,
                            key_pos,
                            in_pos,
                            out_pos,
                        });
                    }
                }
            }
        }

        frame.key_times = self
            .key_times
            .entries()
            .iter()
            .map(|entry| KeyTimeMarker {
                x: view.time_to_x(entry.time),
                count: entry.count,
                selected: entry.selected,
            })
            .collect();

        let marker_x = view.time_to_x(self.time_marker);
        frame.time_marker_x = (marker_x >= rect.left() && marker_x <= rect.right()).then_some(marker_x);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::scalar;

    fn editor() -> (CurveEditor, ChannelId) {
        let mut curves = CurveSet::new();
        let id = curves.add(
            Channel::new("c", CurveKind::Tcb, 1)
                .with_key(0.0, scalar(0.0))
                .with_key(1.0, scalar(1.0))
                .with_key(2.0, scalar(0.5)),
        );
        let config = EditorConfig {
            time_range: Interval::new(0.0, 10.0),
            ..EditorConfig::default()
        };
        let mut editor = CurveEditor::with_curves(curves, config);
        editor.view = ViewTransform::new(
            Rect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 200.0)),
            Vec2::new(100.0, 50.0),
            Vec2::new(0.0, -1.0),
        );
        (editor, id)
    }

    fn undo_entries(events: &[EditorEvent]) -> Vec<UndoSnapshot> {
        events
            .iter()
            .filter_map(|e| match e {
                EditorEvent::UndoRecorded(snapshot) => Some(snapshot.clone()),
                _ => None,
            })
            .collect()
    }

    fn key_count(editor: &CurveEditor, id: ChannelId) -> usize {
        editor.curves.get(id).map_or(0, |c| c.key_count())
    }

    #[test]
    fn test_delete_records_undo_and_undo_restores() {
        let (mut editor, id) = editor();
        let before = editor.curves.backup_all();
        editor.curves.select_key(id, 1, None, true);
        editor.take_events();

        editor.remove_selected_keys();
        assert_eq!(key_count(&editor, id), 2);
        let mut entries = undo_entries(&editor.take_events());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description(), "Delete Spline Keys");

        assert!(editor.undo(&mut entries[0]).is_ok());
        assert_eq!(key_count(&editor, id), 3);
        assert!(editor.curves.is_key_selected(id, 1, 0));
        assert!(editor.redo(&mut entries[0]).is_ok());
        assert_eq!(key_count(&editor, id), 2);
        assert!(editor.undo(&mut entries[0]).is_ok());
        // the selection made before the transaction is part of its undo state
        editor.curves.clear_selection();
        assert_eq!(editor.curves.backup_all(), before);
    }

    #[test]
    fn test_selection_only_command_records_no_undo() {
        let (mut editor, _) = editor();
        editor.select_all();
        let events = editor.take_events();
        assert!(undo_entries(&events).is_empty());
        assert!(events.contains(&EditorEvent::Changed));
        assert_eq!(editor.curves.num_selected(), 3);

        editor.config.record_selection_undo = true;
        editor.clear_selection();
        assert_eq!(undo_entries(&editor.take_events()).len(), 1);
    }

    #[test]
    fn test_no_op_command_records_nothing() {
        let (mut editor, _) = editor();
        editor.take_events();
        editor.remove_selected_keys();
        let events = editor.take_events();
        assert_eq!(events, vec![EditorEvent::BeforeChange]);
    }

    #[test]
    fn test_commands_ignored_during_drag() {
        let (mut editor, id) = editor();
        let pos = editor.view.world_to_screen(1.0, 1.0);
        editor.pointer_down(pos, PointerButton::Primary, Modifiers::default());
        assert!(editor.is_dragging());
        editor.remove_selected_keys();
        assert_eq!(key_count(&editor, id), 3);
        editor.cancel_drag();
        assert!(!editor.is_dragging());
    }

    #[test]
    fn test_goto_key_and_key_all() {
        let (mut editor, id) = editor();
        editor.set_time_marker(0.4);
        assert_eq!(editor.goto_key(false), Some(1.0));
        assert_eq!(editor.goto_key(true), Some(0.0));
        assert_eq!(editor.goto_key(true), None);

        editor.set_time_marker(1.5);
        editor.key_all();
        assert_eq!(key_count(&editor, id), 4);
        editor.zero_all();
        let index = editor.curves.get(id).and_then(|c| c.find_key(1.5, 0.01));
        let value = index.and_then(|i| editor.curves.get(id).and_then(|c| c.key_value(i)));
        assert_eq!(value, Some(scalar(0.0)));
        assert_eq!(undo_entries(&editor.take_events()).len(), 2);
    }

    #[test]
    fn test_cycle_slope_uses_side_of_pointer() {
        let (mut editor, id) = editor();
        let key_pos = editor.view.world_to_screen(1.0, 1.0);
        editor.cycle_slope(key_pos + Vec2::new(-2.0, 0.0));
        let flags = editor.curves.get(id).and_then(|c| c.key_flags(1)).expect("flags");
        assert_eq!(flags.in_mode, TangentMode::Zero);
        assert_eq!(flags.out_mode, TangentMode::Auto);

        editor.cycle_slope(key_pos + Vec2::new(2.0, 0.0));
        let flags = editor.curves.get(id).and_then(|c| c.key_flags(1)).expect("flags");
        assert_eq!(flags.out_mode, TangentMode::Zero);
    }

    #[test]
    fn test_copy_paste_at_marker() {
        let (mut editor, id) = editor();
        editor.curves.select_key(id, 0, None, true);
        editor.curves.select_key(id, 1, None, true);
        let text = editor.copy_keys().expect("encode").expect("selection");

        editor.set_time_marker(5.0);
        let pasted = editor.paste_keys(&text).expect("paste");
        assert_eq!(pasted, 2);
        let times: Vec<f32> = editor
            .curves
            .get(id)
            .map(|c| (0..c.key_count()).filter_map(|i| c.key_time(i)).collect())
            .unwrap_or_default();
        assert_eq!(times, vec![0.0, 1.0, 2.0, 5.0, 6.0]);
        assert!(editor.paste_keys("not ron").is_err());
    }

    #[test]
    fn test_fit_width_covers_keys() {
        let (mut editor, _) = editor();
        editor.fit_width();
        let visible = editor.view.visible_time_range();
        assert!(visible.start < 0.0 && visible.end > 2.0);
        editor.fit_height();
        let values = editor.view.visible_value_range();
        assert!(values.start <= 0.0 && values.end >= 1.0);
    }

    #[test]
    fn test_wheel_zoom_keeps_point_under_pointer() {
        let (mut editor, _) = editor();
        let pos = Pos2::new(120.0, 80.0);
        let before = editor.view.screen_to_world(pos);
        editor.wheel_zoom(pos, 120.0);
        let after = editor.view.screen_to_world(pos);
        assert!((before.0 - after.0).abs() < 1e-4);
        assert!((before.1 - after.1).abs() < 1e-4);
        assert!(editor.view.zoom.x > 100.0);
    }

    #[test]
    fn test_key_time_strip_edit() {
        let (mut editor, id) = editor();
        editor.select_key_time(1, true);
        editor.begin_key_time_edit();
        editor.move_key_times(1.0, 0.3, false);
        editor.move_key_times(1.0, 0.5, false);
        editor.end_key_time_edit();
        let time = editor.curves.get(id).and_then(|c| c.key_time(1));
        assert_eq!(time, Some(1.5));
        assert_eq!(undo_entries(&editor.take_events()).len(), 1);
    }

    #[test]
    fn test_add_channel_uses_configured_epsilon() {
        let mut editor = CurveEditor::new(EditorConfig {
            min_time_epsilon: 0.1,
            ..EditorConfig::default()
        });
        let id = editor.add_channel("x", CurveKind::Bezier, 1);
        if let Some(channel) = editor.curves.get_mut(id) {
            channel.insert_key(1.0, scalar(1.0));
            channel.insert_key(1.05, scalar(2.0));
        }
        assert_eq!(key_count(&editor, id), 1);
        assert_eq!(editor.key_times().time_count(), 1);
    }

    #[test]
    fn test_render_frame_contents() {
        let (mut editor, id) = editor();
        editor.curves.select_key(id, 1, None, true);
        editor.set_time_marker(1.0);
        let frame = editor.render_frame();
        assert_eq!(frame.curves.len(), 1);
        assert!(frame.curves[0].points.len() > 100);
        assert_eq!(frame.keys.len(), 3);
        assert_eq!(frame.keys.iter().filter(|k| k.selected).count(), 1);
        assert_eq!(frame.handles.len(), 1);
        assert_eq!(frame.key_times.len(), 3);
        assert_eq!(frame.time_marker_x, Some(100.0));
        assert!(frame.selection_rect.is_none());
    }
}
