// SPDX-License-Identifier: MIT OR Apache-2.0
//! The ordered set of channels shown by one editor, plus selection and
//! multi-key edit operations.
//!
//! Edits that move keys in time never reorder keys: a dragged key stops just
//! short of the first unselected neighbour instead of jumping over it.

use std::collections::HashSet;

use egui::Rect;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelBackup, ChannelId, SplineProperty};
use crate::config::{EditorConfig, Interval, SnapSettings};
use crate::key::{Key, KeyFlags, KeyValue, TangentMode, TangentSide, MAX_DIMENSIONS};
use crate::tangent::TangentSolver;
use crate::view::ViewTransform;

/// A spline property owned by a curve set
pub type DynProperty = dyn SplineProperty;

/// One selected (channel, key, dimension) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectedKey {
    /// Channel
    pub channel: ChannelId,
    /// Key index
    pub key: usize,
    /// Value dimension
    pub dimension: usize,
}

/// Snapshot of the current key selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Selected triples
    pub keys: HashSet<SelectedKey>,
}

impl Selection {
    /// Number of selected triples
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check if a triple is selected
    pub fn contains(&self, channel: ChannelId, key: usize, dimension: usize) -> bool {
        self.keys.contains(&SelectedKey {
            channel,
            key,
            dimension,
        })
    }
}

/// Snapping, bounds and thresholds applied to key edits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditConstraints {
    /// Grid snapping
    pub snap: SnapSettings,
    /// Times keys are clamped to
    pub time_range: Option<Interval>,
    /// Scale gestures are ignored while start and anchor are this close
    pub min_scale_distance: f32,
}

impl Default for EditConstraints {
    fn default() -> Self {
        Self {
            snap: SnapSettings::default(),
            time_range: None,
            min_scale_distance: 0.1,
        }
    }
}

impl EditConstraints {
    /// Constraints of an editor configuration
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            snap: config.snap,
            time_range: Some(config.time_range),
            min_scale_distance: config.min_scale_distance,
        }
    }

    /// Snap then clamp a time
    pub fn time(&self, time: f32) -> f32 {
        let time = self.snap.time(time);
        self.time_range.map_or(time, |range| range.clamp(time))
    }

    /// Snap a value
    pub fn value(&self, value: f32) -> f32 {
        self.snap.value(value)
    }
}

/// Backup of several channels at once
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetBackup {
    entries: Vec<(ChannelId, ChannelBackup)>,
}

impl SetBackup {
    /// Backup of one channel
    pub fn get(&self, id: ChannelId) -> Option<&ChannelBackup> {
        self.entries.iter().find(|(c, _)| *c == id).map(|(_, b)| b)
    }

    /// Channels in this backup
    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Channel backups
    pub fn entries(&self) -> &[(ChannelId, ChannelBackup)] {
        &self.entries
    }

    /// Add a channel backup
    pub fn push(&mut self, id: ChannelId, backup: ChannelBackup) {
        self.entries.push((id, backup));
    }

    /// Number of captured channels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no channel was captured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate heap size in bytes
    pub fn memory_size(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, b)| b.key_count() * std::mem::size_of::<Key>())
            .sum()
    }
}

/// Ordered collection of channels edited together
#[derive(Debug, Default)]
pub struct CurveSet {
    channels: IndexMap<ChannelId, Box<DynProperty>>,
}

impl CurveSet {
    /// Create an empty curve set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property and return its new ID
    pub fn add<P: SplineProperty + 'static>(&mut self, property: P) -> ChannelId {
        self.add_boxed(Box::new(property))
    }

    /// Add a boxed property and return its new ID
    pub fn add_boxed(&mut self, property: Box<DynProperty>) -> ChannelId {
        let id = ChannelId::new();
        self.insert(id, property);
        id
    }

    /// Add or replace a property under a known ID
    pub fn insert(&mut self, id: ChannelId, property: Box<DynProperty>) {
        tracing::debug!("Adding channel '{}' ({:?})", property.name(), id);
        self.channels.insert(id, property);
    }

    /// Remove a property, keeping the order of the others
    pub fn remove(&mut self, id: ChannelId) -> Option<Box<DynProperty>> {
        self.channels.shift_remove(&id)
    }

    /// Get a property
    pub fn get(&self, id: ChannelId) -> Option<&DynProperty> {
        self.channels.get(&id).map(|c| &**c)
    }

    /// Get a property mutably
    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut DynProperty> {
        self.channels.get_mut(&id).map(|c| &mut **c)
    }

    /// Check if a channel exists
    pub fn contains(&self, id: ChannelId) -> bool {
        self.channels.contains_key(&id)
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether there are no channels
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel IDs in display order
    pub fn ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.keys().copied()
    }

    /// Channels in display order
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &DynProperty)> + '_ {
        self.channels.iter().map(|(id, c)| (*id, &**c))
    }

    /// Channels in display order, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ChannelId, &mut DynProperty)> + '_ {
        self.channels.iter_mut().map(|(id, c)| (*id, &mut **c))
    }

    // ----- backup -----

    /// Back up the given channels; unknown IDs are skipped
    pub fn backup(&self, ids: impl IntoIterator<Item = ChannelId>) -> SetBackup {
        let mut backup = SetBackup::default();
        for id in ids {
            if let Some(channel) = self.get(id) {
                backup.push(id, channel.backup());
            }
        }
        backup
    }

    /// Back up every channel
    pub fn backup_all(&self) -> SetBackup {
        self.backup(self.ids().collect::<Vec<_>>())
    }

    /// Restore every channel of a backup that still exists
    pub fn restore(&mut self, backup: &SetBackup) {
        for (id, channel_backup) in backup.entries() {
            match self.get_mut(*id) {
                Some(channel) => channel.restore(channel_backup),
                None => tracing::warn!("Cannot restore removed channel {:?}", id),
            }
        }
    }

    // ----- selection -----

    /// Select or deselect a key in one dimension, or all with `None`
    pub fn select_key(&mut self, id: ChannelId, key: usize, dimension: Option<usize>, select: bool) {
        if let Some(channel) = self.get_mut(id) {
            channel.select_key(key, dimension, select);
        }
    }

    /// Check if a key is selected in a dimension
    pub fn is_key_selected(&self, id: ChannelId, key: usize, dimension: usize) -> bool {
        self.get(id)
            .is_some_and(|c| c.is_key_selected(key, dimension))
    }

    /// Deselect every key
    pub fn clear_selection(&mut self) {
        for (_, channel) in self.iter_mut() {
            for i in 0..channel.key_count() {
                if channel.is_key_selected_any(i) {
                    channel.select_key(i, None, false);
                }
            }
        }
    }

    /// Select every key in every dimension
    pub fn select_all(&mut self) {
        for (_, channel) in self.iter_mut() {
            for i in 0..channel.key_count() {
                channel.select_key(i, None, true);
            }
        }
    }

    /// Number of keys selected in at least one dimension
    pub fn num_selected(&self) -> usize {
        self.iter()
            .map(|(_, c)| (0..c.key_count()).filter(|&i| c.is_key_selected_any(i)).count())
            .sum()
    }

    /// Current selection as a set of triples
    pub fn selection(&self) -> Selection {
        let mut selection = Selection::default();
        for (id, channel) in self.iter() {
            for key in 0..channel.key_count() {
                for dimension in 0..channel.dimensions() {
                    if channel.is_key_selected(key, dimension) {
                        selection.keys.insert(SelectedKey {
                            channel: id,
                            key,
                            dimension,
                        });
                    }
                }
            }
        }
        selection
    }

    /// Select (or deselect) every key dimension whose screen position lies
    /// inside `rect`, edges included
    pub fn select_rectangle(&mut self, view: &ViewTransform, rect: Rect, select: bool) {
        for (_, channel) in self.iter_mut() {
            for i in 0..channel.key_count() {
                let Some(key) = channel.key(i) else {
                    continue;
                };
                for d in 0..channel.dimensions() {
                    let pos = view.world_to_screen(key.time, key.value[d]);
                    if rect.contains(pos) {
                        channel.select_key(i, Some(d), select);
                    }
                }
            }
        }
    }

    // ----- edits -----

    /// Move selected keys by a time and value offset.
    ///
    /// Times are snapped and clamped, and never pass an unselected key. With
    /// `copy`, unselected copies of the moved keys stay at the old positions.
    /// Returns the first unselected key that stopped a move, if any.
    pub fn move_selected_keys(
        &mut self,
        time_offset: f32,
        value_offset: f32,
        copy: bool,
        constraints: &EditConstraints,
    ) -> Option<(ChannelId, usize)> {
        let mut blocker = None;
        for (id, channel) in self.iter_mut() {
            let selected = selected_indices(channel);
            if selected.is_empty() {
                continue;
            }
            let copies: Vec<Key> = if copy {
                selected.iter().filter_map(|&i| channel.key(i)).collect()
            } else {
                Vec::new()
            };

            if time_offset != 0.0 {
                let targets: Vec<Option<f32>> = (0..channel.key_count())
                    .map(|i| {
                        let movable = channel.is_key_selected_any(i) && !channel.is_protected_key(i);
                        movable
                            .then(|| channel.key_time(i))
                            .flatten()
                            .map(|t| constraints.time(t + time_offset))
                    })
                    .collect();
                if let Some(stop) = retime_keys(channel, &targets) {
                    blocker.get_or_insert((id, stop));
                }
            }

            if value_offset != 0.0 {
                let values = map_selected_values(channel, &selected, |_, v| {
                    constraints.value(v + value_offset)
                });
                write_key_values(channel, &values);
            }

            for key in copies {
                insert_key_copy(channel, &key, false);
            }
        }
        blocker
    }

    /// Scale selected key times around `anchor` so that `start_time` maps to
    /// `end_time`. Ignored while `start_time` is too close to the anchor.
    pub fn time_scale_keys(
        &mut self,
        anchor: f32,
        start_time: f32,
        end_time: f32,
        constraints: &EditConstraints,
    ) -> Option<(ChannelId, usize)> {
        let distance = start_time - anchor;
        if distance.abs() <= constraints.min_scale_distance {
            return None;
        }
        let scale = ((end_time - anchor) / distance).max(0.0);

        let mut blocker = None;
        for (id, channel) in self.iter_mut() {
            let targets: Vec<Option<f32>> = (0..channel.key_count())
                .map(|i| {
                    let movable = channel.is_key_selected_any(i) && !channel.is_protected_key(i);
                    movable
                        .then(|| channel.key_time(i))
                        .flatten()
                        .map(|t| constraints.time(anchor + (t - anchor) * scale))
                })
                .collect();
            if targets.iter().all(Option::is_none) {
                continue;
            }
            if let Some(stop) = retime_keys(channel, &targets) {
                blocker.get_or_insert((id, stop));
            }
        }
        blocker
    }

    /// Scale selected key values around `anchor` so that `start_value` maps
    /// to `end_value`. Ignored while `start_value` is too close to the anchor.
    pub fn value_scale_keys(
        &mut self,
        anchor: f32,
        start_value: f32,
        end_value: f32,
        constraints: &EditConstraints,
    ) {
        let distance = start_value - anchor;
        if distance.abs() <= constraints.min_scale_distance {
            return;
        }
        let scale = (end_value - anchor) / distance;
        for (_, channel) in self.iter_mut() {
            let selected = selected_indices(channel);
            let values = map_selected_values(channel, &selected, |_, v| {
                constraints.value(anchor + (v - anchor) * scale)
            });
            write_key_values(channel, &values);
        }
    }

    /// Scale the distance of selected keys from the line through the first
    /// and last selected key of each channel. The factor is chosen so that a
    /// point at `(time, start_value)` would move by `offset`.
    pub fn scale_amplitude_keys(&mut self, time: f32, start_value: f32, offset: f32) {
        for (_, channel) in self.iter_mut() {
            let selected = selected_indices(channel);
            let (Some(&first), Some(&last)) = (selected.first(), selected.last()) else {
                continue;
            };
            let (Some(first_key), Some(last_key)) = (channel.key(first), channel.key(last)) else {
                continue;
            };
            let length = (last_key.time - first_key.time).max(0.01);

            let mut lines = [(0.0, 0.0, 1.0); MAX_DIMENSIONS];
            for (d, line) in lines.iter_mut().enumerate().take(channel.dimensions()) {
                let slope = (last_key.value[d] - first_key.value[d]) / length;
                let intercept = first_key.value[d] - slope * first_key.time;
                let centre_offset = start_value - (slope * time + intercept);
                let scale = if centre_offset.abs() > 0.001 {
                    (offset + centre_offset) / centre_offset
                } else {
                    1.0
                };
                *line = (slope, intercept, scale);
            }
            let values = map_selected_values(channel, &selected, |(key_time, d), v| {
                let (slope, intercept, scale) = lines[d];
                let centre = key_time * slope + intercept;
                centre + (v - centre) * scale
            });
            write_key_values(channel, &values);
        }
    }

    /// Insert a copy of every selected key shifted by `time_offset`. The
    /// copies become the selection. Returns the number of keys inserted.
    pub fn duplicate_selected_keys(&mut self, time_offset: f32, constraints: &EditConstraints) -> usize {
        let mut inserted = 0;
        for (_, channel) in self.iter_mut() {
            let keys: Vec<Key> = selected_indices(channel)
                .into_iter()
                .filter_map(|i| channel.key(i))
                .collect();
            if keys.is_empty() {
                continue;
            }
            for i in 0..channel.key_count() {
                if channel.is_key_selected_any(i) {
                    channel.select_key(i, None, false);
                }
            }
            for mut key in keys {
                key.time = constraints.time(key.time + time_offset);
                if insert_key_copy(channel, &key, true).is_some() {
                    inserted += 1;
                }
            }
        }
        inserted
    }

    /// Remove every selected key. Pinned end keys survive.
    pub fn remove_selected_keys(&mut self) {
        for (id, channel) in self.iter_mut() {
            let selected = selected_indices(channel);
            for &i in selected.iter().rev() {
                channel.remove_key(i);
            }
            if !selected.is_empty() {
                tracing::debug!("Removed {} key(s) from {:?}", selected.len(), id);
            }
        }
    }

    /// Remove every key that is not selected
    pub fn remove_all_keys_but_selected(&mut self) {
        for (_, channel) in self.iter_mut() {
            for i in (0..channel.key_count()).rev() {
                if !channel.is_key_selected_any(i) {
                    channel.remove_key(i);
                }
            }
        }
    }

    /// Set the tangent mode of selected keys on one side, or both with `None`
    pub fn set_selected_tangent_mode(&mut self, side: Option<TangentSide>, mode: TangentMode) {
        for (_, channel) in self.iter_mut() {
            for i in selected_indices(channel) {
                let Some(mut flags) = channel.key_flags(i) else {
                    continue;
                };
                match side {
                    Some(side) => {
                        flags.set_mode(side, mode);
                        flags.broken = true;
                    }
                    None => {
                        flags.in_mode = mode;
                        flags.out_mode = mode;
                        flags.broken = false;
                    }
                }
                channel.set_key_flags(i, flags);
            }
        }
    }

    /// Apply `modify` to the flags of every selected key
    pub fn modify_selected_key_flags(&mut self, modify: impl Fn(&mut KeyFlags)) {
        for (_, channel) in self.iter_mut() {
            for i in selected_indices(channel) {
                if let Some(mut flags) = channel.key_flags(i) {
                    modify(&mut flags);
                    channel.set_key_flags(i, flags);
                }
            }
        }
    }

    /// Advance the tangent mode of one side of a key to the next preset
    pub fn cycle_tangent_mode(&mut self, id: ChannelId, key: usize, side: TangentSide) {
        let Some(channel) = self.get_mut(id) else {
            return;
        };
        if let Some(mut flags) = channel.key_flags(key) {
            flags.set_mode(side, flags.mode(side).cycled());
            channel.set_key_flags(key, flags);
        }
    }

    /// Place one tangent handle of a key at a world position. The key's
    /// modes become `Custom`; unless the key is broken the opposite handle
    /// keeps the same slope.
    pub fn set_tangent_handle(
        &mut self,
        id: ChannelId,
        key: usize,
        dimension: usize,
        side: TangentSide,
        handle: (f32, f32),
    ) {
        let Some(channel) = self.get_mut(id) else {
            return;
        };
        let Some(current) = channel.key(key) else {
            return;
        };
        let neighbor_time = match side {
            TangentSide::In => key.checked_sub(1).and_then(|i| channel.key_time(i)),
            TangentSide::Out => channel.key_time(key + 1),
        };

        let mut flags = current.flags;
        flags.set_mode(side, TangentMode::Custom);
        if !flags.broken {
            flags.set_mode(side.opposite(), TangentMode::Custom);
        }
        channel.set_key_flags(key, flags);

        let moved = TangentSolver::tangent_from_handle(
            channel.curve_kind(),
            side,
            &current,
            handle,
            dimension,
            neighbor_time,
            current.tangent(side),
        );
        let other = if flags.broken {
            current.tangent(side.opposite())
        } else {
            TangentSolver::mirror(&moved, &current.tangent(side.opposite()), dimension)
        };
        match side {
            TangentSide::In => channel.set_key_tangents(key, moved, other),
            TangentSide::Out => channel.set_key_tangents(key, other, moved),
        }
    }

    /// Set every key at `time` to zero. Returns whether any key changed.
    pub fn zero_all(&mut self, time: f32, threshold: f32) -> bool {
        let mut changed = false;
        for (_, channel) in self.iter_mut() {
            if let Some(i) = channel.find_key(time, threshold) {
                channel.set_key_value(i, [0.0; MAX_DIMENSIONS]);
                changed = true;
            }
        }
        changed
    }

    /// Key every channel that has no key at `time`, holding its current
    /// value. Returns whether any key was inserted.
    pub fn key_all(&mut self, time: f32, threshold: f32, mode: TangentMode) -> bool {
        let mut changed = false;
        for (_, channel) in self.iter_mut() {
            if channel.find_key(time, threshold).is_some() {
                continue;
            }
            let value = channel.evaluate(time);
            let index = channel.insert_key(time, value);
            if let Some(flags) = channel.key_flags(index) {
                channel.set_key_flags(
                    index,
                    KeyFlags {
                        in_mode: mode,
                        out_mode: mode,
                        ..flags
                    },
                );
            }
            changed = true;
        }
        changed
    }

    /// Nearest key time strictly after (or before, with `previous`) `time`
    pub fn next_key_time(&self, time: f32, previous: bool) -> Option<f32> {
        self.iter()
            .flat_map(|(_, c)| (0..c.key_count()).filter_map(move |i| c.key_time(i)))
            .filter(|&t| if previous { t < time } else { t > time })
            .min_by(|a, b| (a - time).abs().total_cmp(&(b - time).abs()))
    }

    /// Time span covered by all keys
    pub fn time_bounds(&self) -> Option<Interval> {
        let mut bounds: Option<Interval> = None;
        for (_, channel) in self.iter() {
            for i in 0..channel.key_count() {
                if let Some(t) = channel.key_time(i) {
                    bounds = Some(bounds.map_or(Interval::new(t, t), |b| {
                        Interval::new(b.start.min(t), b.end.max(t))
                    }));
                }
            }
        }
        bounds
    }

    /// Value span covered by the curves within `times`, sampled `samples`
    /// times plus every key
    pub fn value_bounds(&self, times: Interval, samples: usize) -> Option<Interval> {
        let mut bounds: Option<Interval> = None;
        let mut include = |v: f32| {
            bounds = Some(bounds.map_or(Interval::new(v, v), |b| {
                Interval::new(b.start.min(v), b.end.max(v))
            }));
        };
        for (_, channel) in self.iter() {
            if channel.key_count() == 0 {
                continue;
            }
            let samples = samples.max(1);
            for s in 0..=samples {
                let t = times.start + times.length() * s as f32 / samples as f32;
                let value = channel.evaluate(t);
                for d in 0..channel.dimensions() {
                    include(value[d]);
                }
            }
            for i in 0..channel.key_count() {
                if let (Some(t), Some(value)) = (channel.key_time(i), channel.key_value(i)) {
                    if times.contains(t) {
                        for d in 0..channel.dimensions() {
                            include(value[d]);
                        }
                    }
                }
            }
        }
        bounds
    }
}

/// Indices of keys selected in any dimension
pub(crate) fn selected_indices(channel: &DynProperty) -> Vec<usize> {
    (0..channel.key_count())
        .filter(|&i| channel.is_key_selected_any(i))
        .collect()
}

/// New values of the given keys, computed from the values before any write.
/// `map` receives the key time and dimension of every selected dimension.
fn map_selected_values(
    channel: &DynProperty,
    indices: &[usize],
    map: impl Fn((f32, usize), f32) -> f32,
) -> Vec<(usize, KeyValue)> {
    indices
        .iter()
        .filter_map(|&i| {
            let key = channel.key(i)?;
            let mut value = key.value;
            for d in 0..channel.dimensions() {
                if channel.is_key_selected(i, d) {
                    value[d] = map((key.time, d), value[d]);
                }
            }
            Some((i, value))
        })
        .collect()
}

/// Write precomputed key values. Locked end keys mirror each other, so both
/// ends are written from values read before the first write.
fn write_key_values(channel: &mut DynProperty, values: &[(usize, KeyValue)]) {
    for &(i, value) in values {
        channel.set_key_value(i, value);
    }
}

/// Insert a full copy of a key. Returns its index, or `None` when a key
/// already existed at that time.
pub(crate) fn insert_key_copy(channel: &mut DynProperty, key: &Key, keep_selection: bool) -> Option<usize> {
    let before = channel.key_count();
    let index = channel.insert_key(key.time, key.value);
    if channel.key_count() == before {
        return None;
    }
    let flags = if keep_selection { key.flags } else { key.flags.unselected() };
    channel.set_key_flags(index, flags);
    channel.set_key_tcb(index, key.tcb);
    channel.set_key_tangents(index, key.in_tangent, key.out_tangent);
    Some(index)
}

/// Move keys to new times without reordering them.
///
/// `targets[i]` is the requested time of key `i`, `None` for keys that stay.
/// Returns the first fixed key that stopped a move.
pub(crate) fn retime_keys(channel: &mut DynProperty, targets: &[Option<f32>]) -> Option<usize> {
    let times: Vec<f32> = (0..channel.key_count())
        .filter_map(|i| channel.key_time(i))
        .collect();
    let (finals, blocker) = resolve_key_times(&times, targets, channel.min_time_epsilon());

    // Rightward moves last-to-first, then leftward moves first-to-last, so no
    // key is ever clamped against a neighbour that has yet to move.
    for i in (0..finals.len()).rev() {
        if finals[i] > times[i] {
            channel.set_key_time(i, finals[i]);
        }
    }
    for i in 0..finals.len() {
        if finals[i] < times[i] {
            channel.set_key_time(i, finals[i]);
        }
    }
    blocker
}

/// Clamp requested key times so keys keep their order, `epsilon` apart.
/// Returns the final time of every key and the first fixed key that limited
/// a move.
pub(crate) fn resolve_key_times(
    times: &[f32],
    targets: &[Option<f32>],
    epsilon: f32,
) -> (Vec<f32>, Option<usize>) {
    let target = |i: usize| targets.get(i).copied().flatten();
    let count = times.len();

    let mut next_fixed = vec![None; count];
    let mut movers_until_fixed = vec![0usize; count];
    let mut upcoming = None;
    let mut movers = 0;
    for i in (0..count).rev() {
        next_fixed[i] = upcoming;
        movers_until_fixed[i] = movers;
        if target(i).is_some() {
            movers += 1;
        } else {
            upcoming = Some(i);
            movers = 0;
        }
    }

    let mut finals = times.to_vec();
    let mut blocker = None;
    let mut prev_final: Option<f32> = None;
    let mut prev_fixed = false;
    for i in 0..count {
        let Some(requested) = target(i) else {
            prev_final = Some(times[i]);
            prev_fixed = true;
            continue;
        };
        let lower = prev_final.map_or(f32::NEG_INFINITY, |t| t + epsilon);
        let upper = next_fixed[i].map_or(f32::INFINITY, |j: usize| {
            times[j] - epsilon * (movers_until_fixed[i] + 1) as f32
        });

        let mut time = requested;
        if time > upper {
            time = upper;
            blocker = blocker.or(next_fixed[i]);
        }
        if time < lower {
            time = lower;
            if prev_fixed && blocker.is_none() {
                blocker = Some(i - 1);
            }
        }
        finals[i] = time;
        prev_final = Some(time);
        prev_fixed = false;
    }
    (finals, blocker)
}
