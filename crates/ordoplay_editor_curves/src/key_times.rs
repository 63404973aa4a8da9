// SPDX-License-Identifier: MIT OR Apache-2.0
//! Merged key times of several channels, edited as a single timeline strip.
//!
//! Keys of different channels within [`KeyTimeSet::threshold`] of each other
//! share one entry. Entries are derived from the channels and rebuilt when
//! marked dirty; only their selection is kept across rebuilds, matched by
//! time.

use crate::channel::ChannelId;
use crate::config::{Interval, SnapSettings};
use crate::curve_set::{insert_key_copy, CurveSet, SetBackup};
use crate::key::Key;
use crate::snapshot::UndoSnapshot;

/// Default grouping distance of key times
pub const KEY_TIME_THRESHOLD: f32 = 0.015;

/// One merged key time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyTime {
    /// Current time
    pub time: f32,
    /// Time when editing began
    pub old_time: f32,
    /// Number of channels with a key at this time
    pub count: usize,
    /// Selected in the strip
    pub selected: bool,
}

/// Key times of a group of channels
#[derive(Debug, Clone)]
pub struct KeyTimeSet {
    group: Option<Vec<ChannelId>>,
    entries: Vec<KeyTime>,
    pending_selection: Option<Vec<f32>>,
    channel_count: usize,
    threshold: f32,
    time_range: Option<Interval>,
    snap: SnapSettings,
    dirty: bool,
    editing: Option<(SetBackup, Vec<f32>)>,
}

impl Default for KeyTimeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyTimeSet {
    /// Key times of every channel of the curve set
    pub fn new() -> Self {
        Self {
            group: None,
            entries: Vec::new(),
            pending_selection: None,
            channel_count: 0,
            threshold: KEY_TIME_THRESHOLD,
            time_range: None,
            snap: SnapSettings::default(),
            dirty: true,
            editing: None,
        }
    }

    /// Key times of a fixed group of channels
    pub fn for_group(ids: Vec<ChannelId>) -> Self {
        Self {
            group: Some(ids),
            ..Self::new()
        }
    }

    /// Set the grouping distance
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Clamp moved times into a range
    pub fn with_time_range(mut self, range: Interval) -> Self {
        self.time_range = Some(range);
        self
    }

    /// Snap moved times to the time grid
    pub fn with_snap(mut self, snap: SnapSettings) -> Self {
        self.snap = snap;
        self
    }

    /// Replace the snap settings
    pub fn set_snap(&mut self, snap: SnapSettings) {
        self.snap = snap;
    }

    /// Grouping distance
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Request a rebuild on the next [`refresh`](Self::refresh)
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether a rebuild is pending
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a batch edit is in progress
    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    fn channel_ids(&self, curves: &CurveSet) -> Vec<ChannelId> {
        match &self.group {
            Some(ids) => ids.iter().copied().filter(|id| curves.contains(*id)).collect(),
            None => curves.ids().collect(),
        }
    }

    /// Rebuild if dirty. Entries stay frozen during a batch edit.
    pub fn refresh(&mut self, curves: &CurveSet) {
        if self.dirty && self.editing.is_none() {
            self.rebuild(curves);
        }
    }

    /// Recompute the merged key times from the channels
    pub fn rebuild(&mut self, curves: &CurveSet) {
        let selected = self
            .pending_selection
            .take()
            .unwrap_or_else(|| self.selected_times());
        let ids = self.channel_ids(curves);

        let mut times: Vec<f32> = ids
            .iter()
            .filter_map(|id| curves.get(*id))
            .flat_map(|c| (0..c.key_count()).filter_map(move |i| c.key_time(i)))
            .collect();
        times.sort_by(f32::total_cmp);

        let threshold = self.threshold;
        let mut entries: Vec<KeyTime> = Vec::new();
        for time in times {
            if entries.last().is_some_and(|e| (time - e.time).abs() <= threshold) {
                continue;
            }
            entries.push(KeyTime {
                time,
                old_time: time,
                count: 0,
                selected: false,
            });
        }
        for entry in &mut entries {
            entry.count = ids
                .iter()
                .filter(|id| {
                    curves
                        .get(**id)
                        .is_some_and(|c| c.find_key(entry.time, threshold).is_some())
                })
                .count();
            entry.selected = selected.iter().any(|s| (s - entry.time).abs() <= threshold);
        }

        self.channel_count = ids.len();
        self.entries = entries;
        self.dirty = false;
    }

    /// Merged key times, in ascending order
    pub fn entries(&self) -> &[KeyTime] {
        &self.entries
    }

    /// Number of merged key times
    pub fn time_count(&self) -> usize {
        self.entries.len()
    }

    /// Time of an entry
    pub fn time(&self, index: usize) -> Option<f32> {
        self.entries.get(index).map(|e| e.time)
    }

    /// Number of channels with a key at an entry
    pub fn count(&self, index: usize) -> usize {
        self.entries.get(index).map_or(0, |e| e.count)
    }

    /// Number of channels in the group at the last rebuild
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Index of the entry within the threshold of `time`
    pub fn find_time(&self, time: f32) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| (e.time - time).abs() <= self.threshold)
    }

    /// Whether an entry is selected
    pub fn is_selected(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|e| e.selected)
    }

    /// Select or deselect an entry
    pub fn select(&mut self, index: usize, selected: bool) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.selected = selected;
        }
    }

    /// Deselect every entry
    pub fn clear_selection(&mut self) {
        for entry in &mut self.entries {
            entry.selected = false;
        }
        self.pending_selection = None;
    }

    /// Indices of selected entries
    pub fn selected_indices(&self) -> Vec<usize> {
        (0..self.entries.len()).filter(|&i| self.entries[i].selected).collect()
    }

    /// Times of selected entries
    pub fn selected_times(&self) -> Vec<f32> {
        if let Some(pending) = &self.pending_selection {
            return pending.clone();
        }
        self.entries
            .iter()
            .filter(|e| e.selected)
            .map(|e| e.time)
            .collect()
    }

    /// Replace the selection with the entries at the given times
    pub fn set_selected_times(&mut self, times: &[f32]) {
        let threshold = self.threshold;
        for entry in &mut self.entries {
            entry.selected = times.iter().any(|t| (t - entry.time).abs() <= threshold);
        }
        self.pending_selection = Some(times.to_vec());
        self.dirty = true;
    }

    /// Start a batch edit: capture the channels so that every
    /// [`move_times`](Self::move_times) applies to the original state
    pub fn begin_editing(&mut self, curves: &CurveSet) {
        self.refresh(curves);
        let backup = curves.backup(self.channel_ids(curves));
        for entry in &mut self.entries {
            entry.old_time = entry.time;
        }
        self.editing = Some((backup, self.selected_times()));
    }

    /// Move entries to `time * scale + offset`, snapped and clamped.
    ///
    /// Every key of the group within the threshold of a moved entry moves
    /// with it. A moved key replaces an unmoved key it lands on. With `copy`
    /// the original keys stay behind unselected. During a batch edit the move is applied to the
    /// state captured by [`begin_editing`](Self::begin_editing).
    pub fn move_times(
        &mut self,
        curves: &mut CurveSet,
        indices: &[usize],
        scale: f32,
        offset: f32,
        copy: bool,
    ) {
        if let Some((backup, _)) = &self.editing {
            curves.restore(backup);
            for entry in &mut self.entries {
                entry.time = entry.old_time;
            }
        }

        let threshold = self.threshold;
        let range = self.time_range;
        let snap = self.snap;
        let moves: Vec<(usize, f32, f32)> = indices
            .iter()
            .filter_map(|&i| self.entries.get(i).map(|e| (i, e.time)))
            .map(|(i, old)| {
                let new = snap.time(old * scale + offset);
                (i, old, range.map_or(new, |r| r.clamp(new)))
            })
            .collect();
        if moves.is_empty() {
            return;
        }

        for id in self.channel_ids(curves) {
            let Some(channel) = curves.get_mut(id) else {
                continue;
            };
            let epsilon = channel.min_time_epsilon();
            let mut moved: Vec<(usize, Key, f32)> = Vec::new();
            for i in 0..channel.key_count() {
                let (Some(time), Some(key)) = (channel.key_time(i), channel.key(i)) else {
                    continue;
                };
                let Some(&(_, old, new)) = moves.iter().find(|(_, old, _)| (time - old).abs() <= threshold) else {
                    continue;
                };
                if (new - old).abs() < epsilon {
                    continue;
                }
                if copy || !channel.is_protected_key(i) {
                    moved.push((i, key, new));
                }
            }
            if moved.is_empty() {
                continue;
            }

            for (i, _, _) in moved.iter().rev() {
                if copy {
                    channel.select_key(*i, None, false);
                } else {
                    channel.remove_key(*i);
                }
            }
            for (_, mut key, new) in moved {
                if let Some(existing) = channel.find_key(new, epsilon) {
                    if channel.is_protected_key(existing) {
                        tracing::debug!("Key at {} on {:?} is pinned, dropping moved key", new, id);
                        continue;
                    }
                    channel.remove_key(existing);
                }
                key.time = new;
                insert_key_copy(channel, &key, true);
            }
        }

        for (i, _, new) in &moves {
            if let Some(entry) = self.entries.get_mut(*i) {
                entry.time = *new;
            }
        }
        if self.editing.is_none() {
            self.pending_selection = Some(self.selected_times());
            self.dirty = true;
        }
    }

    /// Finish a batch edit. Returns an undo snapshot if any key changed.
    pub fn end_editing(&mut self, curves: &CurveSet) -> Option<UndoSnapshot> {
        let (backup, selection) = self.editing.take()?;
        let moved_selection = self.selected_times();
        self.pending_selection = Some(moved_selection);
        self.dirty = true;

        let mut snapshot = UndoSnapshot::from_backup("Batch key move", backup, selection);
        if !snapshot.is_data_changed(curves) {
            return None;
        }
        snapshot.commit(curves);
        Some(snapshot)
    }

    /// Abort a batch edit, restoring the captured state
    pub fn cancel_editing(&mut self, curves: &mut CurveSet) {
        let Some((backup, selection)) = self.editing.take() else {
            return;
        };
        curves.restore(&backup);
        self.pending_selection = Some(selection);
        self.dirty = true;
    }

    /// Remove every key at a selected time. Returns the number of keys removed.
    pub fn remove_selected_times(&mut self, curves: &mut CurveSet) -> usize {
        let selected = self.selected_times();
        if selected.is_empty() {
            return 0;
        }
        let threshold = self.threshold;
        let mut removed = 0;
        for id in self.channel_ids(curves) {
            let Some(channel) = curves.get_mut(id) else {
                continue;
            };
            for i in (0..channel.key_count()).rev() {
                let at_selected = channel
                    .key_time(i)
                    .is_some_and(|t| selected.iter().any(|s| (t - s).abs() <= threshold));
                if at_selected {
                    let before = channel.key_count();
                    channel.remove_key(i);
                    removed += before - channel.key_count();
                }
            }
        }
        self.clear_selection();
        self.dirty = true;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::key::{scalar, CurveKind};

    fn key_times_of(curves: &CurveSet, id: ChannelId) -> Vec<f32> {
        let channel = curves.get(id).expect("channel");
        (0..channel.key_count())
            .filter_map(|i| channel.key_time(i))
            .collect()
    }

    fn two_channels() -> (CurveSet, ChannelId, ChannelId) {
        let mut curves = CurveSet::new();
        let a = curves.add(Channel::new("a", CurveKind::Tcb, 1).with_key(2.0, scalar(1.0)));
        let b = curves.add(
            Channel::new("b", CurveKind::Bezier, 1)
                .with_key(2.0, scalar(5.0))
                .with_key(3.0, scalar(6.0)),
        );
        (curves, a, b)
    }

    #[test]
    fn test_merges_close_times() {
        let mut curves = CurveSet::new();
        curves.add(Channel::new("a", CurveKind::Tcb, 1).with_key(1.0, scalar(0.0)));
        curves.add(Channel::new("b", CurveKind::Tcb, 1).with_key(1.01, scalar(0.0)));
        curves.add(Channel::new("c", CurveKind::Tcb, 1).with_key(1.5, scalar(0.0)));
        let mut key_times = KeyTimeSet::new();
        key_times.refresh(&curves);
        assert_eq!(key_times.time_count(), 2);
        assert_eq!(key_times.count(0), 2);
        assert_eq!(key_times.count(1), 1);
        assert_eq!(key_times.channel_count(), 3);
    }

    #[test]
    fn test_moved_key_replaces_key_it_lands_on() {
        let (mut curves, a, b) = two_channels();
        let mut key_times = KeyTimeSet::new();
        key_times.refresh(&curves);
        key_times.select(0, true);

        key_times.move_times(&mut curves, &[0], 1.0, 1.0, false);

        assert_eq!(key_times_of(&curves, a), vec![3.0]);
        assert_eq!(key_times_of(&curves, b), vec![3.0]);
        // the moved key's value survives
        assert_eq!(curves.get(b).and_then(|c| c.key_value(0)), Some(scalar(5.0)));

        key_times.refresh(&curves);
        assert_eq!(key_times.time_count(), 1);
        assert_eq!(key_times.time(0), Some(3.0));
        assert_eq!(key_times.count(0), 2);
        assert!(key_times.is_selected(0));
    }

    #[test]
    fn test_batch_edit_is_absolute_and_undoable() {
        let (mut curves, a, b) = two_channels();
        let before = curves.backup_all();
        let mut key_times = KeyTimeSet::new();
        key_times.refresh(&curves);

        key_times.begin_editing(&curves);
        key_times.move_times(&mut curves, &[1], 1.0, 0.5, false);
        key_times.move_times(&mut curves, &[1], 1.0, 1.0, false);
        assert_eq!(key_times_of(&curves, b), vec![2.0, 4.0]);
        assert_eq!(key_times_of(&curves, a), vec![2.0]);

        let mut snapshot = key_times.end_editing(&curves).expect("snapshot");
        assert_eq!(snapshot.description(), "Batch key move");
        assert!(snapshot.undo(&mut curves, &mut key_times).is_ok());
        assert_eq!(curves.backup_all(), before);
    }

    #[test]
    fn test_copy_keeps_originals() {
        let (mut curves, a, _) = two_channels();
        let mut key_times = KeyTimeSet::new();
        key_times.refresh(&curves);
        key_times.select(0, true);
        curves.select_key(a, 0, None, true);
        key_times.move_times(&mut curves, &[0], 1.0, -1.0, true);
        assert_eq!(key_times_of(&curves, a), vec![1.0, 2.0]);
        // the copy left behind is unselected, the moved key keeps the selection
        assert!(curves.is_key_selected(a, 0, 0));
        assert!(!curves.is_key_selected(a, 1, 0));

        key_times.refresh(&curves);
        assert_eq!(key_times.time(0), Some(1.0));
        assert!(key_times.is_selected(0));
        assert!(!key_times.is_selected(1));
    }

    #[test]
    fn test_moved_times_snap_to_grid() {
        let (mut curves, a, b) = two_channels();
        let snap = SnapSettings {
            snap_time: true,
            time_grid: 1.0,
            ..SnapSettings::default()
        };
        let mut key_times = KeyTimeSet::new().with_snap(snap);
        key_times.refresh(&curves);
        key_times.move_times(&mut curves, &[0], 1.0, 0.437, false);
        let moved = key_times_of(&curves, a);
        assert!((moved[0] - 2.4).abs() < 1e-5, "{moved:?}");
        assert!((key_times_of(&curves, b)[0] - 2.4).abs() < 1e-5);
    }

    #[test]
    fn test_group_limits_channels() {
        let (mut curves, a, b) = two_channels();
        let mut key_times = KeyTimeSet::for_group(vec![a]);
        key_times.refresh(&curves);
        assert_eq!(key_times.time_count(), 1);
        key_times.move_times(&mut curves, &[0], 1.0, 0.5, false);
        assert_eq!(key_times_of(&curves, a), vec![2.5]);
        assert_eq!(key_times_of(&curves, b), vec![2.0, 3.0]);
    }

    #[test]
    fn test_remove_selected_times() {
        let (mut curves, a, b) = two_channels();
        let mut key_times = KeyTimeSet::new();
        key_times.refresh(&curves);
        key_times.select(0, true);
        assert_eq!(key_times.remove_selected_times(&mut curves), 2);
        assert!(key_times_of(&curves, a).is_empty());
        assert_eq!(key_times_of(&curves, b), vec![3.0]);
    }

    #[test]
    fn test_cancel_editing_restores() {
        let (mut curves, _, _) = two_channels();
        let before = curves.backup_all();
        let mut key_times = KeyTimeSet::new();
        key_times.begin_editing(&curves);
        key_times.move_times(&mut curves, &[0, 1], 2.0, 0.0, false);
        key_times.cancel_editing(&mut curves);
        assert_eq!(curves.backup_all(), before);
        assert!(!key_times.is_editing());
    }
}
