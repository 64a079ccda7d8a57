//! Stage pipelines
//!
//! A [`Pipeline`] is an ordered chain of [`Stage`]s. Every stage reads the
//! previous stage's output, so adjacent channel counts must agree; the
//! insertion methods check this before touching the chain.
//!
//! # Evaluation
//!
//! Evaluation never fails. [`Pipeline::eval_float`] threads a vector through
//! two stack buffers sized to [`MAX_STAGE_CHANNELS`]; [`Pipeline::eval_16`]
//! does the same after converting the 16-bit input, and saturates the
//! result back. A built pipeline is immutable and can be shared between
//! threads for evaluation.

mod batch;
pub mod clut;
pub mod named;
mod optimize;
pub mod stage;

pub use clut::{Clut, ClutTable, SampleMode, slice_space_16, slice_space_float};
pub use named::{NamedColor, NamedColorList};
pub use stage::{Stage, StageKind};

use std::fmt;
use std::sync::Arc;

use crate::color::Signature;
use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::math::fixed::{float_to_word, word_to_float};
use crate::math::interpolation::MAX_STAGE_CHANNELS;
use crate::math::matrix::{Matrix3x3, euclidean_distance};

/// Channel limit for a whole pipeline
pub const MAX_CHANNELS: usize = 16;

/// Finite-difference step of the reverse evaluator
const JACOBIAN_EPSILON: f32 = 0.001;

/// Iteration cap of the reverse evaluator
const INVERSION_MAX_ITERATIONS: usize = 30;

/// Residual below which the reverse evaluator stops
const INVERSION_TOLERANCE: f64 = 1e-10;

/// Closed-form replacement for the 16-bit evaluation
pub type Eval16Fn = Arc<dyn Fn(&[u16], &mut [u16]) + Send + Sync>;

/// Closed-form replacement for the float evaluation
pub type EvalFloatFn = Arc<dyn Fn(&[f32], &mut [f32]) + Send + Sync>;

/// Where a stage is inserted or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLoc {
    AtBegin,
    AtEnd,
}

/// Ordered chain of stages
#[derive(Clone)]
pub struct Pipeline {
    ctx: Context,
    stages: Vec<Stage>,
    input_channels: usize,
    output_channels: usize,
    eval_16_fn: Option<Eval16Fn>,
    eval_float_fn: Option<EvalFloatFn>,
    save_as_8_bits: bool,
}

impl Pipeline {
    /// Empty pipeline; 0 channels means "taken from the first stage"
    pub fn new(ctx: &Context, input_channels: usize, output_channels: usize) -> Result<Self> {
        if input_channels >= MAX_CHANNELS || output_channels >= MAX_CHANNELS {
            return Err(ctx.report(
                ErrorKind::Range,
                format!(
                    "Cannot allocate pipeline with {input_channels}→{output_channels} channels (max={})",
                    MAX_CHANNELS - 1
                ),
            ));
        }
        Ok(Self {
            ctx: ctx.clone(),
            stages: Vec::new(),
            input_channels,
            output_channels,
            eval_16_fn: None,
            eval_float_fn: None,
            save_as_8_bits: false,
        })
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn first_stage(&self) -> Option<&Stage> {
        self.stages.first()
    }

    pub fn last_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn stages_mut(&mut self) -> &mut Vec<Stage> {
        &mut self.stages
    }

    pub fn save_as_8_bits(&self) -> bool {
        self.save_as_8_bits
    }

    /// Hint that an 8-bit table encoding is acceptable when serialized
    pub fn set_save_as_8_bits(&mut self, on: bool) {
        self.save_as_8_bits = on;
    }

    /// Refresh the declared channels from the end stages
    fn bless(&mut self) {
        if let (Some(first), Some(last)) = (self.stages.first(), self.stages.last()) {
            self.input_channels = first.input_channels();
            self.output_channels = last.output_channels();
        }
        // Structural changes invalidate a closed-form evaluator
        self.eval_16_fn = None;
        self.eval_float_fn = None;
    }

    fn mismatch(&self, out: usize, inp: usize) -> crate::Error {
        self.ctx.report(
            ErrorKind::Internal,
            format!("Stage channel mismatch: {out} outputs feeding {inp} inputs"),
        )
    }

    /// Insert a stage, leaving the pipeline untouched on mismatch
    pub fn insert_stage(&mut self, loc: StageLoc, stage: Stage) -> Result<()> {
        if stage.input_channels() >= MAX_CHANNELS || stage.output_channels() >= MAX_CHANNELS {
            return Err(self.ctx.report(
                ErrorKind::Range,
                format!(
                    "Stage with {}→{} channels exceeds pipeline limit (max={})",
                    stage.input_channels(),
                    stage.output_channels(),
                    MAX_CHANNELS - 1
                ),
            ));
        }
        match loc {
            StageLoc::AtBegin => {
                if let Some(first) = self.stages.first() {
                    if stage.output_channels() != first.input_channels() {
                        return Err(self.mismatch(stage.output_channels(), first.input_channels()));
                    }
                }
                self.stages.insert(0, stage);
            }
            StageLoc::AtEnd => {
                if let Some(last) = self.stages.last() {
                    if last.output_channels() != stage.input_channels() {
                        return Err(self.mismatch(last.output_channels(), stage.input_channels()));
                    }
                }
                self.stages.push(stage);
            }
        }
        self.bless();
        Ok(())
    }

    /// Remove a stage from either end
    pub fn unlink_stage(&mut self, loc: StageLoc) -> Option<Stage> {
        let stage = match loc {
            StageLoc::AtBegin if !self.stages.is_empty() => Some(self.stages.remove(0)),
            StageLoc::AtBegin => None,
            StageLoc::AtEnd => self.stages.pop(),
        };
        if stage.is_some() {
            self.bless();
        }
        stage
    }

    /// Append all of `other`'s stages
    pub fn cat(&mut self, other: Pipeline) -> Result<()> {
        if self.stages.is_empty() && other.stages.is_empty() {
            self.input_channels = other.input_channels;
            self.output_channels = other.output_channels;
        }
        if let (Some(last), Some(first)) = (self.stages.last(), other.stages.first()) {
            if last.output_channels() != first.input_channels() {
                return Err(self.mismatch(last.output_channels(), first.input_channels()));
            }
        }
        self.stages.extend(other.stages);
        self.bless();
        Ok(())
    }

    /// Install closed-form evaluators replacing the stage walk
    pub fn set_optimization_parameters(
        &mut self,
        eval_16: Option<Eval16Fn>,
        eval_float: Option<EvalFloatFn>,
    ) {
        self.eval_16_fn = eval_16;
        self.eval_float_fn = eval_float;
    }

    /// The stages, when their types match `types` exactly
    pub fn check_and_retrieve_stages(&self, types: &[Signature]) -> Option<Vec<&Stage>> {
        if self.stages.len() != types.len() {
            return None;
        }
        self.stages
            .iter()
            .zip(types)
            .all(|(stage, &ty)| stage.stage_type() == ty)
            .then(|| self.stages.iter().collect())
    }

    /// Evaluate one vector in the normalized float domain
    pub fn eval_float(&self, input: &[f32], output: &mut [f32]) {
        if let Some(f) = &self.eval_float_fn {
            f(input, output);
            return;
        }

        let mut a = [0f32; MAX_STAGE_CHANNELS];
        let mut b = [0f32; MAX_STAGE_CHANNELS];
        a[..self.input_channels].copy_from_slice(&input[..self.input_channels]);

        let (mut src, mut dst) = (&mut a, &mut b);
        for stage in &self.stages {
            stage.eval(&src[..], &mut dst[..]);
            std::mem::swap(&mut src, &mut dst);
        }
        output[..self.output_channels].copy_from_slice(&src[..self.output_channels]);
    }

    /// Evaluate one 16-bit vector
    pub fn eval_16(&self, input: &[u16], output: &mut [u16]) {
        if let Some(f) = &self.eval_16_fn {
            f(input, output);
            return;
        }

        let mut fin = [0f32; MAX_STAGE_CHANNELS];
        let mut fout = [0f32; MAX_STAGE_CHANNELS];
        for (dst, &src) in fin.iter_mut().zip(&input[..self.input_channels]) {
            *dst = word_to_float(src);
        }
        self.eval_float(&fin, &mut fout);
        for (dst, &src) in output[..self.output_channels].iter_mut().zip(&fout) {
            *dst = float_to_word(src);
        }
    }

    /// Solve `eval(x) == target` for 3 unknowns by Newton-Raphson
    ///
    /// Works on 3→3 and 4→3 pipelines; for the latter the fourth input is
    /// held at `target[3]`. The search starts from `hint` (0.3 on each axis
    /// when absent) and keeps the best point seen in `result`. An error is
    /// returned when the channel layout is unsupported or the Jacobian
    /// becomes singular, in which case `result` holds the best point so far.
    pub fn eval_reverse_float(
        &self,
        target: &[f32],
        result: &mut [f32],
        hint: Option<&[f32]>,
    ) -> Result<()> {
        let n_in = self.input_channels;
        if (n_in != 3 && n_in != 4) || self.output_channels != 3 {
            return Err(self.ctx.report(
                ErrorKind::Internal,
                format!(
                    "Reverse evaluation needs a 3→3 or 4→3 pipeline, got {n_in}→{}",
                    self.output_channels
                ),
            ));
        }

        let mut x = [0.3f32; 4];
        if let Some(h) = hint {
            x[..3].copy_from_slice(&h[..3]);
        }
        x[3] = if n_in == 4 { target[3] } else { 0.0 };

        let mut fx = [0f32; 3];
        let mut fxd = [0f32; 3];
        let mut last_error = f64::MAX;

        for _ in 0..INVERSION_MAX_ITERATIONS {
            self.eval_float(&x, &mut fx);
            let error = euclidean_distance(&fx, target, 3);
            if error >= last_error {
                break;
            }
            last_error = error;
            result[..n_in].copy_from_slice(&x[..n_in]);
            if error < INVERSION_TOLERANCE {
                break;
            }

            let mut jacobian = Matrix3x3::zero();
            for j in 0..3 {
                let mut xd = x;
                let delta = if 1.0 - xd[j] < JACOBIAN_EPSILON {
                    -JACOBIAN_EPSILON
                } else {
                    JACOBIAN_EPSILON
                };
                xd[j] += delta;
                self.eval_float(&xd, &mut fxd);
                for row in 0..3 {
                    jacobian.m[row][j] = ((fxd[row] - fx[row]) / delta) as f64;
                }
            }

            let residual = [
                (fx[0] - target[0]) as f64,
                (fx[1] - target[1]) as f64,
                (fx[2] - target[2]) as f64,
            ];
            let Some(step) = jacobian.solve(residual) else {
                return Err(self
                    .ctx
                    .report(ErrorKind::NotSuitable, "Singular Jacobian in reverse evaluation"));
            };

            for j in 0..3 {
                x[j] = (x[j] - step[j] as f32).clamp(0.0, 1.0);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("input_channels", &self.input_channels)
            .field("output_channels", &self.output_channels)
            .field("stages", &self.stages.iter().map(Stage::implements).collect::<Vec<_>>())
            .field("optimized", &(self.eval_16_fn.is_some() || self.eval_float_fn.is_some()))
            .finish()
    }
}
