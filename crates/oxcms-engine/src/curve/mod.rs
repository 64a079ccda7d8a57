//! Tone curves
//!
//! A [`ToneCurve`] is a single-channel transfer function. It is either a
//! list of segments covering the real line (parametric or sampled pieces,
//! with ±1e22 sentinels at the ends) or a bare 16-bit table. Segmented
//! curves also carry a 16-bit table sampled from the segments, used for
//! fast lookup and for the shape predicates (linear, monotonic,
//! descending).
//!
//! ```
//! use oxcms_engine::{Context, ToneCurve};
//!
//! let ctx = Context::new();
//! let gamma = ToneCurve::build_gamma(&ctx, 2.2)?;
//! assert!((gamma.eval_float(0.5) - 0.2176).abs() < 1e-4);
//!
//! let inverse = gamma.reverse(&ctx)?;
//! assert!((inverse.eval_float(0.2176) - 0.5).abs() < 1e-3);
//! # Ok::<(), oxcms_engine::Error>(())
//! ```

mod ops;
pub mod parametric;
mod smooth;

pub use parametric::{
    CurveFamily, CurveRegistry, MAX_PARAMS, MINUS_INF, PLUS_INF, ParametricFn, default_eval,
};

use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::math::fixed::{quantize_val, quick_saturate_word};
use crate::math::interpolation::{InterpFlags, InterpParams};

/// Largest table a curve may hold
pub const MAX_TABLE_ENTRIES: usize = 65530;

/// Number of nodes sampled from segmented curves
pub const DEFAULT_TABLE_ENTRIES: usize = 4096;

/// One piece of a segmented curve, defined on `(x0, x1]`
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSegment {
    pub x0: f32,
    pub x1: f32,
    /// 0 for sampled, otherwise a parametric type (negative for inverse)
    pub kind: i32,
    pub params: [f64; MAX_PARAMS],
    /// Samples equally spaced over the segment, for `kind == 0`
    pub sampled: Vec<f32>,
}

impl CurveSegment {
    pub fn parametric(x0: f32, x1: f32, kind: i32, params: &[f64]) -> Self {
        let mut p = [0.0; MAX_PARAMS];
        for (dst, src) in p.iter_mut().zip(params) {
            *dst = *src;
        }
        Self {
            x0,
            x1,
            kind,
            params: p,
            sampled: Vec::new(),
        }
    }

    pub fn sampled(x0: f32, x1: f32, samples: Vec<f32>) -> Self {
        Self {
            x0,
            x1,
            kind: 0,
            params: [0.0; MAX_PARAMS],
            sampled: samples,
        }
    }
}

#[derive(Debug, Clone)]
enum SegmentEval {
    Parametric(ParametricFn),
    Sampled(InterpParams),
}

/// Single-channel transfer function
#[derive(Debug, Clone)]
pub struct ToneCurve {
    segments: Vec<CurveSegment>,
    evals: Vec<SegmentEval>,
    table16: Vec<u16>,
    interp: InterpParams,
}

fn entries_by_gamma(gamma: f64) -> usize {
    if (gamma - 1.0).abs() < 0.001 {
        2
    } else {
        DEFAULT_TABLE_ENTRIES
    }
}

impl ToneCurve {
    fn allocate(
        ctx: &Context,
        n_entries: usize,
        segments: Vec<CurveSegment>,
        values: Option<&[u16]>,
    ) -> Result<Self> {
        if n_entries == 0 && segments.is_empty() {
            return Err(ctx.report(
                ErrorKind::Internal,
                "Couldn't create tone curve of zero segments and no table",
            ));
        }
        if n_entries > MAX_TABLE_ENTRIES {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("Couldn't create tone curve of more than {MAX_TABLE_ENTRIES} entries"),
            ));
        }
        if n_entries < 2 {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("Tone curve table needs at least 2 entries, got {n_entries}"),
            ));
        }

        let mut evals = Vec::with_capacity(segments.len());
        for seg in &segments {
            if seg.kind == 0 {
                let n = seg.sampled.len() as u32;
                evals.push(SegmentEval::Sampled(InterpParams::uniform(
                    ctx,
                    n,
                    1,
                    1,
                    InterpFlags::default(),
                )?));
            } else {
                let (eval, _) = ctx.curves().lookup(seg.kind).ok_or_else(|| {
                    ctx.report(
                        ErrorKind::UnknownExtension,
                        format!("Invalid parametric curve type {}", seg.kind),
                    )
                })?;
                evals.push(SegmentEval::Parametric(eval));
            }
        }

        let interp = InterpParams::uniform(ctx, n_entries as u32, 1, 1, InterpFlags::default())?;
        let table16 = match values {
            Some(v) => v.to_vec(),
            None => vec![0; n_entries],
        };

        Ok(Self {
            segments,
            evals,
            table16,
            interp,
        })
    }

    /// Build a table-only curve from 16-bit samples
    pub fn build_tabulated_16(ctx: &Context, values: &[u16]) -> Result<Self> {
        Self::allocate(ctx, values.len(), Vec::new(), Some(values))
    }

    /// Build a curve sampled in float over `[0, 1]`
    ///
    /// Inputs below 0 and above 1 hold the first and last sample.
    pub fn build_tabulated_float(ctx: &Context, values: &[f32]) -> Result<Self> {
        let (first, last) = match (values.first(), values.last()) {
            (Some(f), Some(l)) => (*f as f64, *l as f64),
            _ => {
                return Err(ctx.report(
                    ErrorKind::Range,
                    "Couldn't create a tabulated curve from an empty table",
                ));
            }
        };

        let segments = vec![
            CurveSegment::parametric(MINUS_INF as f32, 0.0, 6, &[1.0, 0.0, 0.0, first]),
            CurveSegment::sampled(0.0, 1.0, values.to_vec()),
            CurveSegment::parametric(1.0, PLUS_INF as f32, 6, &[1.0, 0.0, 0.0, last]),
        ];
        Self::build_segmented(ctx, segments)
    }

    /// Build a curve from ascending, touching segments
    pub fn build_segmented(ctx: &Context, segments: Vec<CurveSegment>) -> Result<Self> {
        let n_entries = match segments.as_slice() {
            [only] if only.kind == 1 => entries_by_gamma(only.params[0]),
            _ => DEFAULT_TABLE_ENTRIES,
        };

        let mut curve = Self::allocate(ctx, n_entries, segments, None)?;
        let last = (n_entries - 1) as f64;
        for i in 0..n_entries {
            let v = curve.eval_segmented(i as f64 / last);
            curve.table16[i] = quick_saturate_word(v * 65535.0);
        }
        Ok(curve)
    }

    /// Build a single-segment parametric curve spanning the reals
    pub fn build_parametric(ctx: &Context, kind: i32, params: &[f64]) -> Result<Self> {
        let Some((_, count)) = ctx.curves().lookup(kind) else {
            return Err(ctx.report(
                ErrorKind::UnknownExtension,
                format!("Invalid parametric curve type {kind}"),
            ));
        };
        if params.len() < count {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("Parametric curve type {kind} needs {count} parameters, got {}", params.len()),
            ));
        }

        let segment =
            CurveSegment::parametric(MINUS_INF as f32, PLUS_INF as f32, kind, &params[..count]);
        Self::build_segmented(ctx, vec![segment])
    }

    /// Pure power law `y = x^gamma`
    pub fn build_gamma(ctx: &Context, gamma: f64) -> Result<Self> {
        Self::build_parametric(ctx, 1, &[gamma])
    }

    fn eval_segmented(&self, r: f64) -> f64 {
        for (seg, eval) in self.segments.iter().zip(&self.evals).rev() {
            if r > seg.x0 as f64 && r <= seg.x1 as f64 {
                let out = match eval {
                    SegmentEval::Sampled(interp) => {
                        let r1 = ((r - seg.x0 as f64) / (seg.x1 as f64 - seg.x0 as f64)) as f32;
                        let mut out = [0f32];
                        interp.eval_float(&seg.sampled, &[r1], &mut out);
                        out[0] as f64
                    }
                    SegmentEval::Parametric(f) => f(seg.kind, &seg.params, r),
                };
                if out == f64::INFINITY {
                    return PLUS_INF;
                }
                if out == f64::NEG_INFINITY {
                    return MINUS_INF;
                }
                return out;
            }
        }
        MINUS_INF
    }

    /// Evaluate at a float input
    ///
    /// Out-of-domain inputs on a segmented curve give [`MINUS_INF`].
    pub fn eval_float(&self, v: f32) -> f32 {
        if self.segments.is_empty() {
            let w = quick_saturate_word(v as f64 * 65535.0);
            return (self.eval_16(w) as f64 / 65535.0) as f32;
        }
        self.eval_segmented(v as f64) as f32
    }

    /// Evaluate through the 16-bit table
    pub fn eval_16(&self, v: u16) -> u16 {
        let mut out = [0u16];
        self.interp.eval_16(&self.table16, &[v], &mut out);
        out[0]
    }

    pub fn segments(&self) -> &[CurveSegment] {
        &self.segments
    }

    pub fn table16(&self) -> &[u16] {
        &self.table16
    }

    pub fn table_len(&self) -> usize {
        self.table16.len()
    }

    /// Parametric type of a single-segment curve, 0 otherwise
    pub fn parametric_type(&self) -> i32 {
        match self.segments.as_slice() {
            [only] => only.kind,
            _ => 0,
        }
    }

    /// Parameters of a single-segment curve
    pub fn params(&self) -> Option<&[f64; MAX_PARAMS]> {
        match self.segments.as_slice() {
            [only] => Some(&only.params),
            _ => None,
        }
    }

    pub fn is_multisegment(&self) -> bool {
        self.segments.len() > 1
    }

    /// Whether the table stays within 15 codes of the identity ramp
    pub fn is_linear(&self) -> bool {
        let n = self.table16.len() as u32;
        self.table16.iter().enumerate().all(|(i, &v)| {
            let diff = (v as i32 - quantize_val(i as f64, n) as i32).abs();
            diff <= 0x0f
        })
    }

    /// Monotonic in its overall direction, allowing 2 codes of ripple
    pub fn is_monotonic(&self) -> bool {
        let t = &self.table16;
        if t.len() < 2 {
            return true;
        }

        if self.is_descending() {
            let mut last = t[0] as i32;
            for &v in &t[1..] {
                if v as i32 - last > 2 {
                    return false;
                }
                last = v as i32;
            }
        } else {
            let mut last = t[t.len() - 1] as i32;
            for &v in t[..t.len() - 1].iter().rev() {
                if v as i32 - last > 2 {
                    return false;
                }
                last = v as i32;
            }
        }
        true
    }

    pub fn is_descending(&self) -> bool {
        match (self.table16.first(), self.table16.last()) {
            (Some(first), Some(last)) => first > last,
            _ => false,
        }
    }

    pub(crate) fn interp(&self) -> &InterpParams {
        &self.interp
    }

    pub(crate) fn table16_mut(&mut self) -> &mut [u16] {
        &mut self.table16
    }
}
