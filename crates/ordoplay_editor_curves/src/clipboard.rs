// SPDX-License-Identifier: MIT OR Apache-2.0
//! Copy and paste of selected keys as RON text.

use serde::{Deserialize, Serialize};

use crate::curve_set::{insert_key_copy, CurveSet};
use crate::error::ClipboardError;
use crate::key::{DimensionMask, Key};

/// Keys copied from one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardChannel {
    /// Value dimensions of the source channel
    pub dimensions: usize,
    /// Copied keys, times relative to the clipboard start
    pub keys: Vec<Key>,
}

/// Selected keys of several channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyClipboard {
    /// Earliest copied key time
    pub start: f32,
    /// Latest copied key time
    pub end: f32,
    /// One entry per channel that had a selection, in set order
    pub channels: Vec<ClipboardChannel>,
}

impl KeyClipboard {
    /// Copy the selected keys of every channel. `None` if nothing is selected.
    pub fn copy_selected(curves: &CurveSet) -> Option<Self> {
        let mut channels = Vec::new();
        let mut span: Option<(f32, f32)> = None;
        for (_, channel) in curves.iter() {
            let keys: Vec<Key> = (0..channel.key_count())
                .filter(|&i| channel.is_key_selected_any(i))
                .filter_map(|i| channel.key(i))
                .collect();
            if keys.is_empty() {
                continue;
            }
            for key in &keys {
                span = Some(span.map_or((key.time, key.time), |(s, e)| (s.min(key.time), e.max(key.time))));
            }
            channels.push(ClipboardChannel {
                dimensions: channel.dimensions(),
                keys,
            });
        }

        let (start, end) = span?;
        for channel in &mut channels {
            for key in &mut channel.keys {
                key.time -= start;
                key.flags = key.flags.unselected();
            }
        }
        Some(Self { start, end, channels })
    }

    /// Length of the copied time span
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    /// Number of copied keys
    pub fn key_count(&self) -> usize {
        self.channels.iter().map(|c| c.keys.len()).sum()
    }

    /// Encode as RON text
    pub fn to_ron(&self) -> Result<String, ClipboardError> {
        Ok(ron::ser::to_string(self)?)
    }

    /// Decode RON text
    pub fn from_ron(text: &str) -> Result<Self, ClipboardError> {
        Ok(ron::from_str(text)?)
    }

    /// Paste into the channels that carry a selected key, in set order.
    ///
    /// Keys of each target inside `[at, at + duration]` are replaced by the
    /// copied keys shifted to `at`. The pasted keys become the selection.
    /// Nothing is changed unless every clipboard channel fits its target.
    /// Returns the number of keys inserted.
    pub fn paste(&self, curves: &mut CurveSet, at: f32) -> Result<usize, ClipboardError> {
        let targets: Vec<_> = curves
            .iter()
            .filter(|(_, c)| (0..c.key_count()).any(|i| c.is_key_selected_any(i)))
            .map(|(id, c)| (id, c.dimensions()))
            .collect();
        if targets.len() != self.channels.len() {
            return Err(ClipboardError::ChannelCountMismatch {
                copied: self.channels.len(),
                targets: targets.len(),
            });
        }
        if let Some((source, (_, target))) = self
            .channels
            .iter()
            .zip(&targets)
            .find(|(source, (_, target))| source.dimensions != *target)
        {
            return Err(ClipboardError::DimensionMismatch {
                source_dimensions: source.dimensions,
                target_dimensions: *target,
            });
        }

        curves.clear_selection();
        let end = at + self.duration();
        let mut inserted = 0;
        for (source, (id, dimensions)) in self.channels.iter().zip(targets) {
            let Some(channel) = curves.get_mut(id) else {
                continue;
            };
            let epsilon = channel.min_time_epsilon();
            for i in (0..channel.key_count()).rev() {
                let inside = channel
                    .key_time(i)
                    .is_some_and(|t| t >= at - epsilon && t <= end + epsilon);
                if inside {
                    channel.remove_key(i);
                }
            }
            for key in &source.keys {
                let mut key = *key;
                key.time += at;
                key.flags.selected = DimensionMask::all(dimensions);
                if insert_key_copy(channel, &key, true).is_some() {
                    inserted += 1;
                }
            }
        }
        tracing::debug!("Pasted {} key(s) at {}", inserted, at);
        Ok(inserted)
    }
}
