// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions for editable curves.

use serde::{Deserialize, Serialize};

/// Maximum number of value dimensions a channel can animate
pub const MAX_DIMENSIONS: usize = 4;

/// Keys closer than this in time are the same key
pub const MIN_TIME_EPSILON: f32 = 0.001;

/// Value stored in a key. Only the first `dimensions` entries of the owning
/// channel are meaningful, the rest stay zero.
pub type KeyValue = [f32; MAX_DIMENSIONS];

/// Build a key value from a single scalar
pub fn scalar(value: f32) -> KeyValue {
    [value, 0.0, 0.0, 0.0]
}

/// Build a key value from up to four components
pub fn key_value(components: &[f32]) -> KeyValue {
    let mut value = [0.0; MAX_DIMENSIONS];
    for (slot, component) in value.iter_mut().zip(components) {
        *slot = *component;
    }
    value
}

/// Zero every component at or beyond `dimensions`
pub(crate) fn masked(mut value: KeyValue, dimensions: usize) -> KeyValue {
    for slot in value.iter_mut().skip(dimensions) {
        *slot = 0.0;
    }
    value
}

/// Curve model of a channel, fixed when the channel is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveKind {
    /// Kochanek-Bartels (tension/continuity/bias) spline
    #[default]
    Tcb,
    /// Cubic Bezier with explicit tangent handles
    Bezier,
}

/// Tangent handle, stored as an offset from its key.
///
/// The incoming handle sits at `(time - dt, value - dv)`, the outgoing one at
/// `(time + dt, value + dv)`. For TCB channels `dv` is a third of the Hermite
/// derivative and `dt` a third of the adjacent segment.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tangent {
    /// Time span of the handle, never negative
    pub dt: f32,
    /// Value offset of the handle per dimension
    pub dv: KeyValue,
}

impl Tangent {
    /// Flat handle of zero length
    pub const ZERO: Tangent = Tangent {
        dt: 0.0,
        dv: [0.0; MAX_DIMENSIONS],
    };

    /// Create a tangent handle
    pub fn new(dt: f32, dv: KeyValue) -> Self {
        Self { dt: dt.max(0.0), dv }
    }

    /// Slope of the handle in one dimension, zero for vertical handles
    pub fn slope(&self, dimension: usize) -> f32 {
        if self.dt > f32::EPSILON {
            self.dv[dimension] / self.dt
        } else {
            0.0
        }
    }
}

/// How one side of a key's tangent is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TangentMode {
    /// Computed from the neighbouring keys
    #[default]
    Auto,
    /// User-edited handle, kept as is
    Custom,
    /// Flat
    Zero,
    /// Hold the value until the next key
    Step,
    /// Points straight at the neighbouring key
    Linear,
}

impl TangentMode {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Custom => "Custom",
            Self::Zero => "Zero",
            Self::Step => "Step",
            Self::Linear => "Linear",
        }
    }

    /// Next preset in the "cycle slope" order
    pub fn cycled(self) -> Self {
        match self {
            Self::Auto => Self::Zero,
            Self::Zero => Self::Linear,
            Self::Linear => Self::Step,
            Self::Step | Self::Custom => Self::Auto,
        }
    }
}

/// Side of a key's tangent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TangentSide {
    /// Incoming (left) handle
    In,
    /// Outgoing (right) handle
    Out,
}

impl TangentSide {
    /// The opposite side
    pub fn opposite(self) -> Self {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
        }
    }
}

/// Bitmask of selected value dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DimensionMask(pub u8);

impl DimensionMask {
    /// Nothing selected
    pub const NONE: DimensionMask = DimensionMask(0);

    /// Every dimension below `dimensions`
    pub fn all(dimensions: usize) -> Self {
        let dimensions = dimensions.min(MAX_DIMENSIONS);
        Self(((1u16 << dimensions) - 1) as u8)
    }

    /// Whether a dimension is in the mask
    pub fn contains(&self, dimension: usize) -> bool {
        dimension < MAX_DIMENSIONS && self.0 & (1 << dimension) != 0
    }

    /// Add or remove a dimension
    pub fn set(&mut self, dimension: usize, selected: bool) {
        if dimension >= MAX_DIMENSIONS {
            return;
        }
        if selected {
            self.0 |= 1 << dimension;
        } else {
            self.0 &= !(1 << dimension);
        }
    }

    /// Whether no dimension is selected
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Per-key tangent and selection flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyFlags {
    /// Incoming tangent mode
    pub in_mode: TangentMode,
    /// Outgoing tangent mode
    pub out_mode: TangentMode,
    /// Whether the two sides are edited independently (otherwise unified)
    pub broken: bool,
    /// Selected dimensions of this key
    pub selected: DimensionMask,
}

impl KeyFlags {
    /// Flags with the same mode on both sides
    pub fn with_mode(mode: TangentMode) -> Self {
        Self {
            in_mode: mode,
            out_mode: mode,
            ..Self::default()
        }
    }

    /// Mode of one side
    pub fn mode(&self, side: TangentSide) -> TangentMode {
        match side {
            TangentSide::In => self.in_mode,
            TangentSide::Out => self.out_mode,
        }
    }

    /// Set the mode of one side
    pub fn set_mode(&mut self, side: TangentSide, mode: TangentMode) {
        match side {
            TangentSide::In => self.in_mode = mode,
            TangentSide::Out => self.out_mode = mode,
        }
    }

    /// Copy of these flags with the selection cleared
    pub fn unselected(mut self) -> Self {
        self.selected = DimensionMask::NONE;
        self
    }
}

/// Kochanek-Bartels shape parameters of a key
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TcbParams {
    /// Tension in `[-1, 1]`; 1 flattens the curve at the key
    pub tension: f32,
    /// Continuity in `[-1, 1]`
    pub continuity: f32,
    /// Bias in `[-1, 1]`
    pub bias: f32,
    /// Ease into the key, `[0, 1]`
    pub ease_to: f32,
    /// Ease out of the key, `[0, 1]`
    pub ease_from: f32,
}

impl TcbParams {
    /// Create clamped tension/continuity/bias parameters without easing
    pub fn new(tension: f32, continuity: f32, bias: f32) -> Self {
        Self {
            tension,
            continuity,
            bias,
            ease_to: 0.0,
            ease_from: 0.0,
        }
        .clamped()
    }

    /// Set ease-to and ease-from
    pub fn with_ease(mut self, ease_to: f32, ease_from: f32) -> Self {
        self.ease_to = ease_to;
        self.ease_from = ease_from;
        self.clamped()
    }

    /// Copy with every parameter clamped into its domain
    pub fn clamped(self) -> Self {
        Self {
            tension: self.tension.clamp(-1.0, 1.0),
            continuity: self.continuity.clamp(-1.0, 1.0),
            bias: self.bias.clamp(-1.0, 1.0),
            ease_to: self.ease_to.clamp(0.0, 1.0),
            ease_from: self.ease_from.clamp(0.0, 1.0),
        }
    }
}

/// A key on a channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Key {
    /// Time in seconds (or normalized time for particle curves)
    pub time: f32,
    /// Value at this key
    pub value: KeyValue,
    /// Incoming tangent handle
    pub in_tangent: Tangent,
    /// Outgoing tangent handle
    pub out_tangent: Tangent,
    /// Tangent modes and selection
    pub flags: KeyFlags,
    /// Shape parameters used by TCB channels
    pub tcb: TcbParams,
}

impl Key {
    /// Create a new key with automatic tangents
    pub fn new(time: f32, value: KeyValue) -> Self {
        Self {
            time,
            value,
            ..Self::default()
        }
    }

    /// Set flags
    pub fn with_flags(mut self, flags: KeyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set TCB parameters
    pub fn with_tcb(mut self, tcb: TcbParams) -> Self {
        self.tcb = tcb.clamped();
        self
    }

    /// World position `(time, value)` of the incoming handle in one dimension
    pub fn in_handle(&self, dimension: usize) -> (f32, f32) {
        (
            self.time - self.in_tangent.dt,
            self.value[dimension] - self.in_tangent.dv[dimension],
        )
    }

    /// World position `(time, value)` of the outgoing handle in one dimension
    pub fn out_handle(&self, dimension: usize) -> (f32, f32) {
        (
            self.time + self.out_tangent.dt,
            self.value[dimension] + self.out_tangent.dv[dimension],
        )
    }

    /// Tangent of one side
    pub fn tangent(&self, side: TangentSide) -> Tangent {
        match side {
            TangentSide::In => self.in_tangent,
            TangentSide::Out => self.out_tangent,
        }
    }

    /// Whether any dimension of this key is selected
    pub fn is_selected(&self) -> bool {
        !self.flags.selected.is_empty()
    }
}
