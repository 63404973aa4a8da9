// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe curve editing engine for `OrdoPlay` Editor.
//!
//! This crate provides interactive editing of animation curves:
//! - TCB and Bezier key channels behind a host property trait
//! - Multi-key selection, move, scale and duplication
//! - Tangent handle editing and tangent presets
//! - Shared key times for synchronized multi-channel edits
//! - Undo snapshots of channel state
//! - Key clipboard
//!
//! ## Architecture
//!
//! The engine is platform agnostic:
//! - [`CurveSet`] holds the channels and the key edit operations
//! - [`DragController`] turns pointer gestures into edits
//! - [`CurveEditor`] is the session object collaborators talk to
//! - [`ui`] adapts the editor to egui

pub mod channel;
pub mod clipboard;
pub mod config;
pub mod curve_set;
pub mod drag;
pub mod editor;
pub mod error;
pub mod hit_test;
pub mod key;
pub mod key_times;
pub mod snapshot;
pub mod tangent;
pub mod ui;
pub mod view;

pub use channel::{Channel, ChannelBackup, ChannelId, SplineProperty};
pub use clipboard::{ClipboardChannel, KeyClipboard};
pub use config::{EditorConfig, Interval, SnapSettings};
pub use curve_set::{CurveSet, DynProperty, EditConstraints, SelectedKey, Selection, SetBackup};
pub use drag::{DragController, DragState, KeyDragOperation, Modifiers, PointerButton};
pub use editor::{CurveEditor, EditorEvent, RenderFrame};
pub use error::{ChannelRestoreError, ClipboardError, ConfigError, SnapshotError};
pub use hit_test::{HitKind, HitResult, HitTester};
pub use key::{
    CurveKind, DimensionMask, Key, KeyFlags, KeyValue, Tangent, TangentMode, TangentSide, TcbParams,
};
pub use key_times::{KeyTime, KeyTimeSet};
pub use snapshot::UndoSnapshot;
pub use tangent::{Interpolation, TangentSolver};
pub use view::ViewTransform;
