// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tangent computation and segment interpolation.
//!
//! Both curve models share the same key data. A key's tangents are derived
//! from its neighbours according to the per-side [`TangentMode`]; the solver
//! is dispatched once per channel on its [`CurveKind`].

use crate::key::{CurveKind, Key, KeyValue, Tangent, TangentMode, TangentSide, MAX_DIMENSIONS};

/// Interpolation helpers
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Cubic bezier interpolation
    pub fn bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        p0 * mt3 + 3.0 * p1 * mt2 * t + 3.0 * p2 * mt * t2 + p3 * t3
    }

    /// Hermite interpolation with derivatives in segment parameter units
    pub fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }

    /// Ease a segment parameter. `ease_from` slows the start of the segment,
    /// `ease_to` the end. Constant velocity in between.
    pub fn ease(u: f32, ease_from: f32, ease_to: f32) -> f32 {
        let (mut a, mut b) = (ease_from, ease_to);
        let sum = a + b;
        if u <= 0.0 || u >= 1.0 || sum <= 0.0 {
            return u.clamp(0.0, 1.0);
        }
        if sum > 1.0 {
            a /= sum;
            b /= sum;
        }
        let k = 1.0 / (2.0 - a - b);
        if u < a {
            (k / a) * u * u
        } else if u < 1.0 - b {
            k * (2.0 * u - a)
        } else {
            let v = 1.0 - u;
            1.0 - (k / b) * v * v
        }
    }

    /// Find the bezier parameter whose x coordinate equals `x`.
    /// Control points must satisfy `x0 <= x1, x2 <= x3`.
    pub fn bezier_parameter(x0: f32, x1: f32, x2: f32, x3: f32, x: f32) -> f32 {
        if x <= x0 {
            return 0.0;
        }
        if x >= x3 {
            return 1.0;
        }
        let (mut lo, mut hi) = (0.0_f32, 1.0_f32);
        for _ in 0..32 {
            let mid = 0.5 * (lo + hi);
            if Self::bezier(x0, x1, x2, x3, mid) < x {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    /// Evaluate the segment between two adjacent keys at `time`
    pub fn segment(kind: CurveKind, a: &Key, b: &Key, time: f32, dimensions: usize) -> KeyValue {
        if a.flags.out_mode == TangentMode::Step {
            return a.value;
        }
        if b.flags.in_mode == TangentMode::Step {
            return if time >= b.time { b.value } else { a.value };
        }

        let span = b.time - a.time;
        let mut out = [0.0; MAX_DIMENSIONS];
        if span <= f32::EPSILON {
            return b.value;
        }

        match kind {
            CurveKind::Tcb => {
                let u = Self::ease((time - a.time) / span, a.tcb.ease_from, b.tcb.ease_to);
                for d in 0..dimensions {
                    out[d] = Self::hermite(
                        a.value[d],
                        3.0 * a.out_tangent.dv[d],
                        b.value[d],
                        3.0 * b.in_tangent.dv[d],
                        u,
                    );
                }
            }
            CurveKind::Bezier => {
                let u = Self::bezier_parameter(
                    a.time,
                    a.time + a.out_tangent.dt,
                    b.time - b.in_tangent.dt,
                    b.time,
                    time,
                );
                for d in 0..dimensions {
                    out[d] = Self::bezier(
                        a.value[d],
                        a.value[d] + a.out_tangent.dv[d],
                        b.value[d] - b.in_tangent.dv[d],
                        b.value[d],
                        u,
                    );
                }
            }
        }
        out
    }
}

/// Computes key tangents from neighbouring keys
pub struct TangentSolver;

impl TangentSolver {
    /// Solve both tangents of `key` for its current modes.
    ///
    /// `Custom` sides keep the stored handle (clamped for Bezier), the other
    /// modes are recomputed. A side with no neighbour mirrors the span of the
    /// opposite side so its handle stays visible.
    pub fn solve(
        kind: CurveKind,
        prev: Option<&Key>,
        key: &Key,
        next: Option<&Key>,
        dimensions: usize,
    ) -> (Tangent, Tangent) {
        let (auto_in, auto_out) = match kind {
            CurveKind::Tcb => Self::tcb(prev, key, next, dimensions),
            CurveKind::Bezier => Self::bezier_auto(prev, key, next, dimensions),
        };
        let seg_in = prev.map(|p| key.time - p.time);
        let seg_out = next.map(|n| n.time - key.time);

        let mut tin = Self::apply_mode(kind, TangentSide::In, key, prev, auto_in, seg_in, dimensions);
        let mut tout = Self::apply_mode(kind, TangentSide::Out, key, next, auto_out, seg_out, dimensions);

        if prev.is_none() && key.flags.in_mode != TangentMode::Custom {
            tin.dt = tout.dt;
        }
        if next.is_none() && key.flags.out_mode != TangentMode::Custom {
            tout.dt = tin.dt;
        }
        (tin, tout)
    }

    /// Kochanek-Bartels tangents of a key, stored as handles at a third of
    /// each adjacent segment. Missing neighbours contribute a zero difference.
    pub fn tcb(
        prev: Option<&Key>,
        key: &Key,
        next: Option<&Key>,
        dimensions: usize,
    ) -> (Tangent, Tangent) {
        let tcb = key.tcb;
        let (t, c, b) = (tcb.tension, tcb.continuity, tcb.bias);

        let out_prev = (1.0 - t) * (1.0 + c) * (1.0 + b) * 0.5;
        let out_next = (1.0 - t) * (1.0 - c) * (1.0 - b) * 0.5;
        let in_prev = (1.0 - t) * (1.0 - c) * (1.0 + b) * 0.5;
        let in_next = (1.0 - t) * (1.0 + c) * (1.0 - b) * 0.5;

        let seg_in = prev.map(|p| key.time - p.time);
        let seg_out = next.map(|n| n.time - key.time);
        let (adjust_in, adjust_out) = match (seg_in, seg_out) {
            (Some(a), Some(b)) if a + b > f32::EPSILON => (2.0 * a / (a + b), 2.0 * b / (a + b)),
            _ => (1.0, 1.0),
        };

        let mut dv_in = [0.0; MAX_DIMENSIONS];
        let mut dv_out = [0.0; MAX_DIMENSIONS];
        for d in 0..dimensions {
            let g1 = prev.map_or(0.0, |p| key.value[d] - p.value[d]);
            let g2 = next.map_or(0.0, |n| n.value[d] - key.value[d]);
            dv_in[d] = (in_prev * g1 + in_next * g2) * adjust_in / 3.0;
            dv_out[d] = (out_prev * g1 + out_next * g2) * adjust_out / 3.0;
        }

        let dt_in = seg_in.or(seg_out).unwrap_or(0.0) / 3.0;
        let dt_out = seg_out.or(seg_in).unwrap_or(0.0) / 3.0;
        (Tangent::new(dt_in, dv_in), Tangent::new(dt_out, dv_out))
    }

    /// Smooth Bezier tangents: the slope through both neighbours, with each
    /// handle a third of its segment long.
    pub fn bezier_auto(
        prev: Option<&Key>,
        key: &Key,
        next: Option<&Key>,
        dimensions: usize,
    ) -> (Tangent, Tangent) {
        let seg_in = prev.map(|p| key.time - p.time);
        let seg_out = next.map(|n| n.time - key.time);
        let dt_in = seg_in.or(seg_out).unwrap_or(0.0) / 3.0;
        let dt_out = seg_out.or(seg_in).unwrap_or(0.0) / 3.0;

        let mut dv_in = [0.0; MAX_DIMENSIONS];
        let mut dv_out = [0.0; MAX_DIMENSIONS];
        for d in 0..dimensions {
            let slope = match (prev, next) {
                (Some(p), Some(n)) => {
                    let span = n.time - p.time;
                    if span > f32::EPSILON {
                        (n.value[d] - p.value[d]) / span
                    } else {
                        0.0
                    }
                }
                (None, Some(n)) => Self::slope_between(key, n, d),
                (Some(p), None) => Self::slope_between(p, key, d),
                (None, None) => 0.0,
            };
            dv_in[d] = slope * dt_in;
            dv_out[d] = slope * dt_out;
        }
        (Tangent::new(dt_in, dv_in), Tangent::new(dt_out, dv_out))
    }

    fn slope_between(a: &Key, b: &Key, dimension: usize) -> f32 {
        let span = b.time - a.time;
        if span > f32::EPSILON {
            (b.value[dimension] - a.value[dimension]) / span
        } else {
            0.0
        }
    }

    fn apply_mode(
        kind: CurveKind,
        side: TangentSide,
        key: &Key,
        neighbor: Option<&Key>,
        auto: Tangent,
        segment: Option<f32>,
        dimensions: usize,
    ) -> Tangent {
        let third = segment.map_or(auto.dt, |s| s / 3.0);
        match key.flags.mode(side) {
            TangentMode::Auto => auto,
            TangentMode::Custom => {
                let stored = key.tangent(side);
                match kind {
                    CurveKind::Bezier => {
                        let dt = match segment {
                            Some(s) => stored.dt.clamp(0.0, s.max(0.0)),
                            None => stored.dt.max(0.0),
                        };
                        Tangent { dt, dv: stored.dv }
                    }
                    CurveKind::Tcb => Tangent::new(third, stored.dv),
                }
            }
            TangentMode::Zero => Tangent::new(third, [0.0; MAX_DIMENSIONS]),
            TangentMode::Linear => {
                let mut dv = [0.0; MAX_DIMENSIONS];
                if let Some(n) = neighbor {
                    for d in 0..dimensions {
                        dv[d] = match side {
                            TangentSide::In => (key.value[d] - n.value[d]) / 3.0,
                            TangentSide::Out => (n.value[d] - key.value[d]) / 3.0,
                        };
                    }
                }
                Tangent::new(third, dv)
            }
            TangentMode::Step => Tangent::ZERO,
        }
    }

    /// Convert a dragged handle position into a tangent for one side.
    ///
    /// The handle's time span is clamped to `[0, distance to neighbour]`.
    /// For TCB channels the span stays at `current.dt` and only the slope
    /// is taken from the handle.
    #[allow(clippy::too_many_arguments)]
    pub fn tangent_from_handle(
        kind: CurveKind,
        side: TangentSide,
        key: &Key,
        handle: (f32, f32),
        dimension: usize,
        neighbor_time: Option<f32>,
        current: Tangent,
    ) -> Tangent {
        let (handle_time, handle_value) = handle;
        let (mut dt, dv) = match side {
            TangentSide::In => (key.time - handle_time, key.value[dimension] - handle_value),
            TangentSide::Out => (handle_time - key.time, handle_value - key.value[dimension]),
        };
        dt = dt.max(0.0);
        if let Some(limit) = neighbor_time.map(|n| (n - key.time).abs()) {
            dt = dt.min(limit);
        }

        let mut tangent = current;
        match kind {
            CurveKind::Bezier => {
                tangent.dt = dt;
                tangent.dv[dimension] = dv;
            }
            CurveKind::Tcb => {
                tangent.dv[dimension] = if dt > f32::EPSILON && current.dt > f32::EPSILON {
                    dv / dt * current.dt
                } else {
                    dv
                };
            }
        }
        tangent
    }

    /// Make `target` continue the slope of `source` in one dimension, keeping
    /// `target`'s length. Used for unified (non-broken) keys.
    pub fn mirror(source: &Tangent, target: &Tangent, dimension: usize) -> Tangent {
        let mut mirrored = *target;
        mirrored.dv[dimension] = if source.dt > f32::EPSILON {
            source.dv[dimension] / source.dt * target.dt
        } else {
            source.dv[dimension]
        };
        mirrored
    }
}
