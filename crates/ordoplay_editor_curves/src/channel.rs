// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe channels and the property interface the editor edits through.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::{
    masked, CurveKind, Key, KeyFlags, KeyValue, Tangent, TcbParams, MAX_DIMENSIONS,
    MIN_TIME_EPSILON,
};
use crate::tangent::{Interpolation, TangentSolver};

/// Unique identifier for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub Uuid);

impl ChannelId {
    /// Create a new random channel ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque copy of every key of a channel
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelBackup {
    keys: Vec<Key>,
}

impl ChannelBackup {
    /// Wrap a list of keys
    pub fn new(keys: Vec<Key>) -> Self {
        Self { keys }
    }

    /// Keys captured in this backup
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Number of captured keys
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

/// An animatable property as seen by the curve editor.
///
/// Keys are addressed by index in ascending time order. Mutations keep the
/// keys strictly ordered and at least [`min_time_epsilon`](Self::min_time_epsilon)
/// apart; implementations recompute derived tangents after every change.
pub trait SplineProperty: fmt::Debug {
    /// Curve model of this property
    fn curve_kind(&self) -> CurveKind;

    /// Number of value components, 1 to 4
    fn dimensions(&self) -> usize;

    /// Whether the first and last keys are pinned and share their value
    fn lock_first_last_equal(&self) -> bool {
        false
    }

    /// Display name
    fn name(&self) -> &str {
        ""
    }

    /// Curve colour
    fn color(&self) -> [u8; 3] {
        [128, 255, 128]
    }

    /// Keys closer than this are the same key
    fn min_time_epsilon(&self) -> f32 {
        MIN_TIME_EPSILON
    }

    /// Number of keys
    fn key_count(&self) -> usize;

    /// Time of a key
    fn key_time(&self, index: usize) -> Option<f32>;

    /// Value of a key
    fn key_value(&self, index: usize) -> Option<KeyValue>;

    /// Incoming and outgoing tangents of a key
    fn key_tangents(&self, index: usize) -> Option<(Tangent, Tangent)>;

    /// Flags of a key
    fn key_flags(&self, index: usize) -> Option<KeyFlags>;

    /// TCB parameters of a key
    fn key_tcb(&self, index: usize) -> Option<TcbParams>;

    /// Insert a key at `time`, or return the index of the key already within
    /// epsilon of it.
    fn insert_key(&mut self, time: f32, value: KeyValue) -> usize;

    /// Remove a key. A no-op for the pinned first and last keys.
    fn remove_key(&mut self, index: usize);

    /// Move a key in time, clamped between its neighbours
    fn set_key_time(&mut self, index: usize, time: f32);

    /// Set the value of a key
    fn set_key_value(&mut self, index: usize, value: KeyValue);

    /// Set both tangents of a key
    fn set_key_tangents(&mut self, index: usize, in_tangent: Tangent, out_tangent: Tangent);

    /// Set the flags of a key
    fn set_key_flags(&mut self, index: usize, flags: KeyFlags);

    /// Set the TCB parameters of a key
    fn set_key_tcb(&mut self, index: usize, tcb: TcbParams);

    /// Recompute every derived tangent
    fn update(&mut self);

    /// Copy all keys
    fn backup(&self) -> ChannelBackup;

    /// Replace all keys with a backup
    fn restore(&mut self, backup: &ChannelBackup);

    /// Value of the curve at `time`
    fn evaluate(&self, time: f32) -> KeyValue;

    /// Index of the key within `epsilon` of `time`
    fn find_key(&self, time: f32, epsilon: f32) -> Option<usize> {
        (0..self.key_count()).find(|&i| {
            self.key_time(i)
                .is_some_and(|t| (t - time).abs() < epsilon)
        })
    }

    /// Full data of a key
    fn key(&self, index: usize) -> Option<Key> {
        let (in_tangent, out_tangent) = self.key_tangents(index)?;
        Some(Key {
            time: self.key_time(index)?,
            value: self.key_value(index)?,
            in_tangent,
            out_tangent,
            flags: self.key_flags(index)?,
            tcb: self.key_tcb(index)?,
        })
    }

    /// Whether a dimension of a key is selected
    fn is_key_selected(&self, index: usize, dimension: usize) -> bool {
        self.key_flags(index)
            .is_some_and(|f| f.selected.contains(dimension))
    }

    /// Whether any dimension of a key is selected
    fn is_key_selected_any(&self, index: usize) -> bool {
        self.key_flags(index).is_some_and(|f| !f.selected.is_empty())
    }

    /// Select or deselect a key in one dimension, or every dimension with `None`
    fn select_key(&mut self, index: usize, dimension: Option<usize>, select: bool) {
        let Some(mut flags) = self.key_flags(index) else {
            return;
        };
        match dimension {
            Some(d) => flags.selected.set(d, select),
            None => {
                for d in 0..self.dimensions() {
                    flags.selected.set(d, select);
                }
            }
        }
        self.set_key_flags(index, flags);
    }

    /// Whether `index` is a pinned first or last key
    fn is_protected_key(&self, index: usize) -> bool {
        let count = self.key_count();
        self.lock_first_last_equal() && count > 1 && (index == 0 || index + 1 == count)
    }
}

/// A keyframe channel owned by the editor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Display name
    pub name: String,
    /// Curve colour
    pub color: [u8; 3],
    kind: CurveKind,
    dimensions: usize,
    lock_first_last_equal: bool,
    min_time_epsilon: f32,
    keys: Vec<Key>,
}

impl Channel {
    /// Create an empty channel
    pub fn new(name: impl Into<String>, kind: CurveKind, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            color: [128, 255, 128],
            kind,
            dimensions: dimensions.clamp(1, MAX_DIMENSIONS),
            lock_first_last_equal: false,
            min_time_epsilon: MIN_TIME_EPSILON,
            keys: Vec::new(),
        }
    }

    /// Pin the first and last keys and keep their values equal
    pub fn with_locked_ends(mut self, lock: bool) -> Self {
        self.lock_first_last_equal = lock;
        self
    }

    /// Set the curve colour
    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    /// Set the time epsilon used for key identity
    pub fn with_min_time_epsilon(mut self, epsilon: f32) -> Self {
        self.min_time_epsilon = epsilon.max(f32::EPSILON);
        self
    }

    /// Add a key and return the channel, for building test and demo data
    pub fn with_key(mut self, time: f32, value: KeyValue) -> Self {
        self.insert_key(time, value);
        self
    }

    /// All keys in time order
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn recompute_key(&mut self, index: usize) {
        let Some(key) = self.keys.get(index) else {
            return;
        };
        let prev = index.checked_sub(1).and_then(|i| self.keys.get(i));
        let next = self.keys.get(index + 1);
        let (tin, tout) = TangentSolver::solve(self.kind, prev, key, next, self.dimensions);
        let key = &mut self.keys[index];
        key.in_tangent = tin;
        key.out_tangent = tout;
    }

    fn recompute_around(&mut self, index: usize) {
        if self.keys.is_empty() {
            return;
        }
        let last = self.keys.len() - 1;
        for i in index.saturating_sub(1)..=(index + 1).min(last) {
            self.recompute_key(i);
        }
    }
}

impl SplineProperty for Channel {
    fn curve_kind(&self) -> CurveKind {
        self.kind
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn lock_first_last_equal(&self) -> bool {
        self.lock_first_last_equal
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn color(&self) -> [u8; 3] {
        self.color
    }

    fn min_time_epsilon(&self) -> f32 {
        self.min_time_epsilon
    }

    fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn key_time(&self, index: usize) -> Option<f32> {
        self.keys.get(index).map(|k| k.time)
    }

    fn key_value(&self, index: usize) -> Option<KeyValue> {
        self.keys.get(index).map(|k| k.value)
    }

    fn key_tangents(&self, index: usize) -> Option<(Tangent, Tangent)> {
        self.keys.get(index).map(|k| (k.in_tangent, k.out_tangent))
    }

    fn key_flags(&self, index: usize) -> Option<KeyFlags> {
        self.keys.get(index).map(|k| k.flags)
    }

    fn key_tcb(&self, index: usize) -> Option<TcbParams> {
        self.keys.get(index).map(|k| k.tcb)
    }

    fn key(&self, index: usize) -> Option<Key> {
        self.keys.get(index).copied()
    }

    fn insert_key(&mut self, time: f32, value: KeyValue) -> usize {
        if let Some(existing) = self.find_key(time, self.min_time_epsilon) {
            return existing;
        }
        let index = self.keys.partition_point(|k| k.time < time);
        self.keys
            .insert(index, Key::new(time, masked(value, self.dimensions)));
        self.recompute_around(index);
        index
    }

    fn remove_key(&mut self, index: usize) {
        if index >= self.keys.len() || self.is_protected_key(index) {
            return;
        }
        self.keys.remove(index);
        if !self.keys.is_empty() {
            self.recompute_around(index.min(self.keys.len() - 1));
        }
    }

    fn set_key_time(&mut self, index: usize, time: f32) {
        if index >= self.keys.len() || self.is_protected_key(index) {
            return;
        }
        let eps = self.min_time_epsilon;
        let lower = index
            .checked_sub(1)
            .map_or(f32::NEG_INFINITY, |i| self.keys[i].time + eps);
        let upper = self
            .keys
            .get(index + 1)
            .map_or(f32::INFINITY, |k| k.time - eps);
        if lower > upper {
            return;
        }
        self.keys[index].time = time.clamp(lower, upper);
        self.recompute_around(index);
    }

    fn set_key_value(&mut self, index: usize, value: KeyValue) {
        if index >= self.keys.len() {
            return;
        }
        let value = masked(value, self.dimensions);
        self.keys[index].value = value;
        self.recompute_around(index);

        if self.is_protected_key(index) {
            let other = if index == 0 { self.keys.len() - 1 } else { 0 };
            self.keys[other].value = value;
            self.recompute_around(other);
        }
    }

    fn set_key_tangents(&mut self, index: usize, in_tangent: Tangent, out_tangent: Tangent) {
        let Some(key) = self.keys.get_mut(index) else {
            return;
        };
        key.in_tangent = Tangent::new(in_tangent.dt, masked(in_tangent.dv, self.dimensions));
        key.out_tangent = Tangent::new(out_tangent.dt, masked(out_tangent.dv, self.dimensions));
        self.recompute_key(index);
    }

    fn set_key_flags(&mut self, index: usize, flags: KeyFlags) {
        let Some(key) = self.keys.get_mut(index) else {
            return;
        };
        key.flags = flags;
        self.recompute_key(index);
    }

    fn set_key_tcb(&mut self, index: usize, tcb: TcbParams) {
        let Some(key) = self.keys.get_mut(index) else {
            return;
        };
        key.tcb = tcb.clamped();
        self.recompute_around(index);
    }

    fn update(&mut self) {
        for i in 0..self.keys.len() {
            self.recompute_key(i);
        }
    }

    fn backup(&self) -> ChannelBackup {
        ChannelBackup::new(self.keys.clone())
    }

    fn restore(&mut self, backup: &ChannelBackup) {
        self.keys = backup.keys().to_vec();
    }

    fn evaluate(&self, time: f32) -> KeyValue {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return [0.0; MAX_DIMENSIONS];
        };
        if time.is_nan() || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }
        let next = self.keys.partition_point(|k| k.time <= time);
        match (next.checked_sub(1).and_then(|i| self.keys.get(i)), self.keys.get(next)) {
            (Some(a), Some(b)) => Interpolation::segment(self.kind, a, b, time, self.dimensions),
            _ => first.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{scalar, TangentMode};

    fn three_keys(kind: CurveKind) -> Channel {
        Channel::new("test", kind, 1)
            .with_key(0.0, scalar(0.0))
            .with_key(1.0, scalar(1.0))
            .with_key(2.0, scalar(0.0))
    }

    #[test]
    fn test_insert_keeps_order_and_merges() {
        let mut channel = three_keys(CurveKind::Bezier);
        let index = channel.insert_key(0.5, scalar(3.0));
        assert_eq!(index, 1);
        assert_eq!(channel.key_count(), 4);

        let again = channel.insert_key(0.5004, scalar(9.0));
        assert_eq!(again, 1);
        assert_eq!(channel.key_count(), 4);
        assert_eq!(channel.key_value(1), Some(scalar(3.0)));

        let times: Vec<f32> = channel.keys().iter().map(|k| k.time).collect();
        assert!(times.windows(2).all(|w| w[1] - w[0] >= MIN_TIME_EPSILON));
    }

    #[test]
    fn test_set_key_time_clamps_between_neighbours() {
        let mut channel = three_keys(CurveKind::Tcb);
        channel.set_key_time(1, 5.0);
        let time = channel.key_time(1).unwrap_or_default();
        assert!(time < 2.0);
        assert!((time - (2.0 - MIN_TIME_EPSILON)).abs() < 1e-6);
    }

    #[test]
    fn test_locked_ends() {
        let mut channel = three_keys(CurveKind::Bezier).with_locked_ends(true);
        channel.remove_key(0);
        channel.remove_key(2);
        assert_eq!(channel.key_count(), 3);

        channel.set_key_time(0, -1.0);
        assert_eq!(channel.key_time(0), Some(0.0));

        channel.set_key_value(2, scalar(4.0));
        assert_eq!(channel.key_value(0), Some(scalar(4.0)));

        channel.remove_key(1);
        assert_eq!(channel.key_count(), 2);
    }

    #[test]
    fn test_evaluate_passes_through_keys() {
        for kind in [CurveKind::Tcb, CurveKind::Bezier] {
            let channel = three_keys(kind);
            assert!((channel.evaluate(1.0)[0] - 1.0).abs() < 1e-5);
            assert_eq!(channel.evaluate(-3.0)[0], 0.0);
            assert_eq!(channel.evaluate(9.0)[0], 0.0);
        }
    }

    #[test]
    fn test_evaluate_non_finite_time() {
        let channel = three_keys(CurveKind::Bezier).with_key(3.0, scalar(5.0));
        assert_eq!(channel.evaluate(f32::NAN), scalar(0.0));
        assert_eq!(channel.evaluate(f32::INFINITY), scalar(5.0));
        assert_eq!(channel.evaluate(f32::NEG_INFINITY), scalar(0.0));
    }

    #[test]
    fn test_bezier_handles_stay_within_segments() {
        let mut channel = three_keys(CurveKind::Bezier);
        let mut flags = channel.key_flags(1).unwrap_or_default();
        flags.in_mode = TangentMode::Custom;
        flags.out_mode = TangentMode::Custom;
        channel.set_key_flags(1, flags);
        channel.set_key_tangents(1, Tangent::new(4.0, scalar(1.0)), Tangent::new(4.0, scalar(1.0)));

        channel.set_key_time(2, 1.5);
        let (tin, tout) = channel.key_tangents(1).unwrap_or_default();
        assert!(tin.dt <= 1.0);
        assert!(tout.dt <= 0.5 + 1e-6);
    }

    #[test]
    fn test_backup_restore_round_trip() {
        let mut channel = three_keys(CurveKind::Tcb);
        let backup = channel.backup();
        channel.remove_key(1);
        channel.insert_key(3.0, scalar(1.0));
        channel.restore(&backup);
        assert_eq!(channel.backup(), backup);
    }

    #[test]
    fn test_tcb_tension_one_gives_flat_key() {
        let mut channel = three_keys(CurveKind::Tcb);
        channel.set_key_tcb(1, TcbParams::new(1.0, 0.0, 0.0));
        let (tin, tout) = channel.key_tangents(1).unwrap_or_default();
        assert_eq!(tin.dv[0], 0.0);
        assert_eq!(tout.dv[0], 0.0);
    }

    #[test]
    fn test_select_key_by_dimension() {
        let mut channel = Channel::new("color", CurveKind::Bezier, 3).with_key(0.0, [1.0, 2.0, 3.0, 0.0]);
        channel.select_key(0, Some(1), true);
        assert!(channel.is_key_selected(0, 1));
        assert!(!channel.is_key_selected(0, 0));
        channel.select_key(0, None, true);
        assert!(channel.is_key_selected(0, 2));
        assert!(!channel.is_key_selected(0, 3));
    }
}
