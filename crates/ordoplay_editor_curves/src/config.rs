// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor configuration, loadable from RON.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::key::{TangentMode, MIN_TIME_EPSILON};

/// Closed range of floats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Lower bound
    pub start: f32,
    /// Upper bound
    pub end: f32,
}

impl Interval {
    /// Create an interval, ordering the bounds
    pub fn new(start: f32, end: f32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Clamp a value into the interval
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.start, self.end)
    }

    /// Length of the interval
    pub fn length(&self) -> f32 {
        self.end - self.start
    }

    /// Whether the value lies inside
    pub fn contains(&self, value: f32) -> bool {
        value >= self.start && value <= self.end
    }
}

/// Grid snapping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapSettings {
    /// Snap key times
    pub snap_time: bool,
    /// Snap key values
    pub snap_value: bool,
    /// Horizontal grid spacing; times snap to a tenth of it
    pub time_grid: f32,
    /// Vertical grid spacing; values snap to a tenth of it
    pub value_grid: f32,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            snap_time: false,
            snap_value: false,
            time_grid: 1.0,
            value_grid: 1.0,
        }
    }
}

impl SnapSettings {
    /// Snap a time to the time grid if enabled
    pub fn time(&self, time: f32) -> f32 {
        if self.snap_time {
            snap_to(time, self.time_grid / 10.0)
        } else {
            time
        }
    }

    /// Snap a value to the value grid if enabled
    pub fn value(&self, value: f32) -> f32 {
        if self.snap_value {
            snap_to(value, self.value_grid / 10.0)
        } else {
            value
        }
    }
}

fn snap_to(x: f32, step: f32) -> f32 {
    if step <= f32::EPSILON {
        return x;
    }
    (x / step + 0.5).floor() * step
}

/// Curve editor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Keys closer than this in time are the same key
    pub min_time_epsilon: f32,
    /// Keys of different channels closer than this share a key-time marker
    pub key_time_threshold: f32,
    /// Scale gestures do nothing while the drag start is this close to the anchor
    pub min_scale_distance: f32,
    /// Pixel tolerance for hitting a key
    pub key_hit_pixels: f32,
    /// Pixel tolerance for hitting a curve
    pub spline_hit_pixels: f32,
    /// Pixel tolerance for hitting a tangent handle
    pub handle_hit_pixels: f32,
    /// Height of the time ruler strip at the top of the view
    pub ruler_height: f32,
    /// Times keys can be dragged into
    pub time_range: Interval,
    /// Value range shown when fitting an empty curve set
    pub default_value_range: Interval,
    /// Grid snapping
    pub snap: SnapSettings,
    /// Tangent mode of keys inserted by double-click
    pub default_tangent_mode: TangentMode,
    /// Record undo entries for gestures that only change the selection
    pub record_selection_undo: bool,
    /// Releasing an insert gesture this far outside the view cancels it
    pub insert_cancel_margin: f32,
    /// Horizontal pixel step between curve samples
    pub curve_sample_step: f32,
    /// Smallest zoom (pixels per unit)
    pub min_zoom: f32,
    /// Largest zoom (pixels per unit)
    pub max_zoom: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_time_epsilon: MIN_TIME_EPSILON,
            key_time_threshold: 0.015,
            min_scale_distance: 0.1,
            key_hit_pixels: 4.0,
            spline_hit_pixels: 4.0,
            handle_hit_pixels: 4.0,
            ruler_height: 16.0,
            time_range: Interval::new(0.0, 1.0),
            default_value_range: Interval::new(0.0, 1.0),
            snap: SnapSettings::default(),
            default_tangent_mode: TangentMode::Auto,
            record_selection_undo: false,
            insert_cancel_margin: 100.0,
            curve_sample_step: 2.0,
            min_zoom: 0.01,
            max_zoom: 100_000.0,
        }
    }
}

impl EditorConfig {
    /// Parse a config from RON. Missing fields take their defaults.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this config to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Check that every value lies in its domain
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("min_time_epsilon", self.min_time_epsilon),
            ("key_time_threshold", self.key_time_threshold),
            ("key_hit_pixels", self.key_hit_pixels),
            ("spline_hit_pixels", self.spline_hit_pixels),
            ("handle_hit_pixels", self.handle_hit_pixels),
            ("curve_sample_step", self.curve_sample_step),
            ("min_zoom", self.min_zoom),
        ];
        for (field, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        if self.max_zoom < self.min_zoom {
            return Err(ConfigError::Invalid {
                field: "max_zoom",
                reason: format!("{} is below min_zoom {}", self.max_zoom, self.min_zoom),
            });
        }
        if self.time_range.start > self.time_range.end {
            return Err(ConfigError::Invalid {
                field: "time_range",
                reason: "start is after end".to_string(),
            });
        }
        Ok(())
    }
}
