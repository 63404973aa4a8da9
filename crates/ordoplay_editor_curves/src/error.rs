// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the curve editor.

use thiserror::Error;

use crate::channel::ChannelId;

/// Failure to apply one channel of an undo snapshot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelRestoreError {
    /// The channel was removed after the snapshot was taken
    #[error("Channel {0:?} no longer exists")]
    ChannelMissing(ChannelId),

    /// The live key count does not match the state the snapshot expects
    #[error("Channel {channel:?} has {live} keys, snapshot expects {expected}")]
    KeyCountDiverged {
        /// Channel that diverged
        channel: ChannelId,
        /// Key count found on the live channel
        live: usize,
        /// Key count the snapshot expected
        expected: usize,
    },
}

/// Snapshot errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    /// Some channels could not be restored; the others were
    #[error("{} channel(s) could not be restored", .0.len())]
    Partial(Vec<ChannelRestoreError>),
}

/// Clipboard errors
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Serialization error
    #[error("Failed to encode clipboard: {0}")]
    Encode(#[from] ron::Error),

    /// Deserialization error
    #[error("Failed to decode clipboard: {0}")]
    Decode(#[from] ron::error::SpannedError),

    /// Clipboard channel does not fit the target channel
    #[error("Clipboard channel has {source_dimensions} dimension(s), target has {target_dimensions}")]
    DimensionMismatch {
        /// Dimensions of the copied channel
        source_dimensions: usize,
        /// Dimensions of the paste target
        target_dimensions: usize,
    },

    /// Number of copied channels differs from the number of targets
    #[error("Clipboard holds {copied} channel(s) but {targets} are selected")]
    ChannelCountMismatch {
        /// Copied channels
        copied: usize,
        /// Target channels
        targets: usize,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Serialization error
    #[error("Failed to encode config: {0}")]
    Encode(#[from] ron::Error),

    /// Deserialization error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// A value is outside its valid domain
    #[error("Invalid config value `{field}`: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Result type for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;
