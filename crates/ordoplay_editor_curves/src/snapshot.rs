// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo snapshots of curve edits.
//!
//! A snapshot holds the state of the touched channels before an edit. The
//! after-edit state is captured lazily on the first undo, so a snapshot costs
//! one backup until it is actually used. Before restoring, each channel's
//! live key count is compared with the count the snapshot expects; a channel
//! that diverged is left alone and reported, the others are still restored.

use crate::channel::{ChannelBackup, ChannelId};
use crate::curve_set::{CurveSet, DynProperty, SetBackup};
use crate::error::{ChannelRestoreError, Result, SnapshotError};
use crate::key::Key;
use crate::key_times::KeyTimeSet;

/// Before/after state of one undoable curve edit
#[derive(Debug, Clone, PartialEq)]
pub struct UndoSnapshot {
    description: String,
    undo: SetBackup,
    redo: Option<SetBackup>,
    committed_counts: Option<Vec<(ChannelId, usize)>>,
    undo_key_times: Vec<f32>,
    redo_key_times: Option<Vec<f32>>,
}

impl UndoSnapshot {
    /// Capture the given channels before an edit
    pub fn begin(
        description: impl Into<String>,
        curves: &CurveSet,
        ids: impl IntoIterator<Item = ChannelId>,
        key_times: &KeyTimeSet,
    ) -> Self {
        Self::from_backup(description, curves.backup(ids), key_times.selected_times())
    }

    /// Capture every channel before an edit
    pub fn begin_all(description: impl Into<String>, curves: &CurveSet, key_times: &KeyTimeSet) -> Self {
        Self::from_backup(description, curves.backup_all(), key_times.selected_times())
    }

    /// Wrap a backup taken earlier
    pub fn from_backup(
        description: impl Into<String>,
        backup: SetBackup,
        key_time_selection: Vec<f32>,
    ) -> Self {
        Self {
            description: description.into(),
            undo: backup,
            redo: None,
            committed_counts: None,
            undo_key_times: key_time_selection,
            redo_key_times: None,
        }
    }

    /// Record the key counts after the edit. Undo checks them against the
    /// live channels.
    pub fn commit(&mut self, curves: &CurveSet) {
        let counts = self
            .undo
            .channel_ids()
            .filter_map(|id| curves.get(id).map(|c| (id, c.key_count())))
            .collect();
        self.committed_counts = Some(counts);
        tracing::debug!("Committed '{}' ({} channel(s))", self.description, self.undo.len());
    }

    /// Whether [`commit`](Self::commit) was called
    pub fn is_committed(&self) -> bool {
        self.committed_counts.is_some()
    }

    /// Human-readable name of the edit
    pub fn description(&self) -> &str {
        &self.description
    }

    /// State before the edit
    pub fn backup(&self) -> &SetBackup {
        &self.undo
    }

    /// Channels touched by the edit
    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.undo.channel_ids()
    }

    /// Whether the after-edit state has been captured
    pub fn has_redo(&self) -> bool {
        self.redo.is_some()
    }

    /// Approximate heap size in bytes
    pub fn memory_size(&self) -> usize {
        self.undo.memory_size() + self.redo.as_ref().map_or(0, SetBackup::memory_size)
    }

    /// Whether any captured channel differs from its live state
    pub fn is_data_changed(&self, curves: &CurveSet) -> bool {
        self.undo
            .entries()
            .iter()
            .any(|(id, backup)| curves.get(*id).map_or(true, |c| c.backup() != *backup))
    }

    /// Whether any captured channel differs from its live state in anything
    /// but key selection
    pub fn is_key_data_changed(&self, curves: &CurveSet) -> bool {
        self.undo.entries().iter().any(|(id, backup)| {
            let Some(channel) = curves.get(*id) else {
                return true;
            };
            let live = channel.backup();
            live.key_count() != backup.key_count()
                || live
                    .keys()
                    .iter()
                    .zip(backup.keys())
                    .any(|(a, b)| a.flags.unselected() != b.flags.unselected() || !same_key_data(a, b))
        })
    }

    /// Whether the key selection of any captured channel differs from its
    /// live state
    pub fn is_selection_changed(&self, curves: &CurveSet) -> bool {
        self.undo.entries().iter().any(|(id, backup)| {
            let Some(channel) = curves.get(*id) else {
                return false;
            };
            if channel.key_count() != backup.key_count() {
                return true;
            }
            backup
                .keys()
                .iter()
                .enumerate()
                .any(|(i, key)| channel.key_flags(i).map(|f| f.selected) != Some(key.flags.selected))
        })
    }

    fn committed_count(&self, id: ChannelId) -> Option<usize> {
        self.committed_counts
            .as_ref()?
            .iter()
            .find(|(c, _)| *c == id)
            .map(|(_, n)| *n)
    }

    /// Put the captured channels back to their state before the edit.
    ///
    /// The first call also captures the after-edit state for [`redo`](Self::redo).
    pub fn undo(&mut self, curves: &mut CurveSet, key_times: &mut KeyTimeSet) -> Result<()> {
        let capture_redo = self.redo.is_none();
        let mut redo = SetBackup::default();
        let mut failures = Vec::new();

        for (id, backup) in self.undo.entries() {
            let expected = match &self.redo {
                Some(after) => after.get(*id).map(ChannelBackup::key_count),
                None => self.committed_count(*id),
            };
            match live_channel(curves, *id, expected) {
                Ok(channel) => {
                    if capture_redo {
                        redo.push(*id, channel.backup());
                    }
                    channel.restore(backup);
                }
                Err(err) => {
                    tracing::warn!("Undo of '{}' skipped a channel: {}", self.description, err);
                    failures.push(err);
                }
            }
        }

        if capture_redo {
            self.redo = Some(redo);
            self.redo_key_times = Some(key_times.selected_times());
        }
        key_times.set_selected_times(&self.undo_key_times);
        finish(failures)
    }

    /// Re-apply the edit after an [`undo`](Self::undo). Does nothing if the
    /// snapshot was never undone.
    pub fn redo(&mut self, curves: &mut CurveSet, key_times: &mut KeyTimeSet) -> Result<()> {
        let Some(after) = &self.redo else {
            return Ok(());
        };
        let mut failures = Vec::new();

        for (id, backup) in after.entries() {
            let expected = self.undo.get(*id).map(ChannelBackup::key_count);
            match live_channel(curves, *id, expected) {
                Ok(channel) => channel.restore(backup),
                Err(err) => {
                    tracing::warn!("Redo of '{}' skipped a channel: {}", self.description, err);
                    failures.push(err);
                }
            }
        }

        if let Some(selection) = &self.redo_key_times {
            key_times.set_selected_times(selection);
        }
        finish(failures)
    }
}

fn live_channel(
    curves: &mut CurveSet,
    id: ChannelId,
    expected: Option<usize>,
) -> std::result::Result<&mut DynProperty, ChannelRestoreError> {
    let channel = curves
        .get_mut(id)
        .ok_or(ChannelRestoreError::ChannelMissing(id))?;
    if let Some(expected) = expected {
        let live = channel.key_count();
        if live != expected {
            return Err(ChannelRestoreError::KeyCountDiverged {
                channel: id,
                live,
                expected,
            });
        }
    }
    Ok(channel)
}

fn same_key_data(a: &Key, b: &Key) -> bool {
    a.time == b.time
        && a.value == b.value
        && a.in_tangent == b.in_tangent
        && a.out_tangent == b.out_tangent
        && a.tcb == b.tcb
}

fn finish(failures: Vec<ChannelRestoreError>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(SnapshotError::Partial(failures))
    }
}
