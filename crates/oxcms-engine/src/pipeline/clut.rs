//! Color lookup tables and grid sampling
//!
//! Grid nodes are visited in row-major order with input 0 outermost. Each
//! node's coordinate is its quantized 16-bit code, so a sampler that writes
//! a function of its input reproduces that function exactly at the nodes.

use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::math::fixed::{float_to_word, quantize_val, quick_saturate_word, word_to_float};
use crate::math::interpolation::{
    InterpFlags, InterpParams, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS, cube_size,
};
use crate::pipeline::stage::{Stage, StageKind};

/// Table storage
#[derive(Debug, Clone, PartialEq)]
pub enum ClutTable {
    U16(Vec<u16>),
    Float(Vec<f32>),
}

/// Whether a sampling pass writes its results back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleMode {
    #[default]
    Write,
    /// Visit nodes without modifying the table
    Inspect,
}

/// N-input, M-output lookup table
#[derive(Debug, Clone)]
pub struct Clut {
    params: InterpParams,
    table: ClutTable,
}

impl Clut {
    fn checked_params(ctx: &Context, grid: &[u32], n_in: usize, n_out: usize) -> Result<InterpParams> {
        if n_in == 0 || n_in > MAX_INPUT_DIMENSIONS {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("Too many input channels ({n_in} channels, max={MAX_INPUT_DIMENSIONS})"),
            ));
        }
        InterpParams::new(ctx, grid, n_in, n_out, InterpFlags::default())
    }

    fn check_len(ctx: &Context, expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("CLUT table needs {expected} entries, got {actual}"),
            ));
        }
        Ok(())
    }

    /// 16-bit table, zero-filled when `table` is None
    pub fn new_16(
        ctx: &Context,
        grid: &[u32],
        n_in: usize,
        n_out: usize,
        table: Option<&[u16]>,
    ) -> Result<Self> {
        let params = Self::checked_params(ctx, grid, n_in, n_out)?;
        let values = match table {
            Some(t) => {
                Self::check_len(ctx, params.table_len(), t.len())?;
                t.to_vec()
            }
            None => vec![0; params.table_len()],
        };
        Ok(Self {
            params,
            table: ClutTable::U16(values),
        })
    }

    /// Float table, zero-filled when `table` is None
    pub fn new_float(
        ctx: &Context,
        grid: &[u32],
        n_in: usize,
        n_out: usize,
        table: Option<&[f32]>,
    ) -> Result<Self> {
        let params = Self::checked_params(ctx, grid, n_in, n_out)?;
        let values = match table {
            Some(t) => {
                Self::check_len(ctx, params.table_len(), t.len())?;
                t.to_vec()
            }
            None => vec![0.0; params.table_len()],
        };
        Ok(Self {
            params,
            table: ClutTable::Float(values),
        })
    }

    pub fn params(&self) -> &InterpParams {
        &self.params
    }

    pub fn grid_points(&self) -> &[u32] {
        self.params.n_samples()
    }

    pub fn table(&self) -> &ClutTable {
        &self.table
    }

    pub fn is_float(&self) -> bool {
        matches!(self.table, ClutTable::Float(_))
    }

    /// Evaluate in the normalized float domain
    pub fn eval_float(&self, input: &[f32], output: &mut [f32]) {
        match &self.table {
            ClutTable::Float(t) => self.params.eval_float(t, input, output),
            ClutTable::U16(t) => {
                let n_in = self.params.n_inputs();
                let n_out = self.params.n_outputs();
                let mut in16 = [0u16; MAX_INPUT_DIMENSIONS];
                let mut out16 = [0u16; MAX_STAGE_CHANNELS];
                for (dst, &src) in in16.iter_mut().zip(&input[..n_in]) {
                    *dst = float_to_word(src);
                }
                self.params.eval_16(t, &in16[..n_in], &mut out16);
                for (dst, &src) in output[..n_out].iter_mut().zip(&out16[..n_out]) {
                    *dst = word_to_float(src);
                }
            }
        }
    }
}

/// Row-major decomposition of node `i`, as 16-bit codes
fn node_codes(i: u32, grid: &[u32], codes: &mut [u16]) {
    let mut rest = i;
    for t in (0..grid.len()).rev() {
        let colorant = rest % grid[t];
        rest /= grid[t];
        codes[t] = quantize_val(colorant as f64, grid[t]);
    }
}

fn total_nodes(ctx: &Context, grid: &[u32], n_in: usize, n_out: usize) -> Result<u32> {
    if n_in == 0 || n_in > MAX_INPUT_DIMENSIONS || n_out >= MAX_STAGE_CHANNELS || grid.len() < n_in {
        return Err(ctx.report(
            ErrorKind::Range,
            format!("Cannot sample a {n_in}→{n_out} grid"),
        ));
    }
    cube_size(&grid[..n_in])
        .ok_or_else(|| ctx.report(ErrorKind::Range, format!("Invalid sampling grid {grid:?}")))
}

impl Stage {
    /// 16-bit CLUT with the same node count on every input
    pub fn clut_16(
        ctx: &Context,
        grid_points: u32,
        n_in: usize,
        n_out: usize,
        table: Option<&[u16]>,
    ) -> Result<Self> {
        let grid = vec![grid_points; n_in.min(MAX_INPUT_DIMENSIONS)];
        Self::clut_16_granular(ctx, &grid, n_in, n_out, table)
    }

    /// 16-bit CLUT with per-input node counts
    pub fn clut_16_granular(
        ctx: &Context,
        grid: &[u32],
        n_in: usize,
        n_out: usize,
        table: Option<&[u16]>,
    ) -> Result<Self> {
        let clut = Clut::new_16(ctx, grid, n_in, n_out, table)?;
        Ok(Self::from_parts(StageKind::Clut(clut), n_in, n_out))
    }

    /// Float CLUT with the same node count on every input
    pub fn clut_float(
        ctx: &Context,
        grid_points: u32,
        n_in: usize,
        n_out: usize,
        table: Option<&[f32]>,
    ) -> Result<Self> {
        let grid = vec![grid_points; n_in.min(MAX_INPUT_DIMENSIONS)];
        Self::clut_float_granular(ctx, &grid, n_in, n_out, table)
    }

    /// Float CLUT with per-input node counts
    pub fn clut_float_granular(
        ctx: &Context,
        grid: &[u32],
        n_in: usize,
        n_out: usize,
        table: Option<&[f32]>,
    ) -> Result<Self> {
        let clut = Clut::new_float(ctx, grid, n_in, n_out, table)?;
        Ok(Self::from_parts(StageKind::Clut(clut), n_in, n_out))
    }

    /// Run `sampler` over every node of a 16-bit CLUT
    ///
    /// The sampler sees the node's current outputs and, in
    /// [`SampleMode::Write`], its outputs replace them.
    pub fn sample_clut_16<F>(&mut self, ctx: &Context, mut sampler: F, mode: SampleMode) -> Result<()>
    where
        F: FnMut(&[u16], &mut [u16]) -> Result<()>,
    {
        let (n_in, n_out) = (self.input_channels(), self.output_channels());
        let StageKind::Clut(clut) = self.kind_mut() else {
            return Err(ctx.report(ErrorKind::Internal, "Sampling a stage that is not a CLUT"));
        };
        let grid: Vec<u32> = clut.params.n_samples().to_vec();
        let ClutTable::U16(table) = &mut clut.table else {
            return Err(ctx.report(ErrorKind::Internal, "16-bit sampler on a float CLUT"));
        };
        let nodes = total_nodes(ctx, &grid, n_in, n_out)?;

        let mut input = [0u16; MAX_INPUT_DIMENSIONS];
        let mut output = [0u16; MAX_STAGE_CHANNELS];
        let mut index = 0usize;
        for i in 0..nodes {
            node_codes(i, &grid, &mut input[..n_in]);
            output[..n_out].copy_from_slice(&table[index..index + n_out]);

            sampler(&input[..n_in], &mut output[..n_out])?;

            if mode == SampleMode::Write {
                table[index..index + n_out].copy_from_slice(&output[..n_out]);
            }
            index += n_out;
        }
        Ok(())
    }

    /// Run `sampler` over every node of a float CLUT
    pub fn sample_clut_float<F>(
        &mut self,
        ctx: &Context,
        mut sampler: F,
        mode: SampleMode,
    ) -> Result<()>
    where
        F: FnMut(&[f32], &mut [f32]) -> Result<()>,
    {
        let (n_in, n_out) = (self.input_channels(), self.output_channels());
        let StageKind::Clut(clut) = self.kind_mut() else {
            return Err(ctx.report(ErrorKind::Internal, "Sampling a stage that is not a CLUT"));
        };
        let grid: Vec<u32> = clut.params.n_samples().to_vec();
        let ClutTable::Float(table) = &mut clut.table else {
            return Err(ctx.report(ErrorKind::Internal, "Float sampler on a 16-bit CLUT"));
        };
        let nodes = total_nodes(ctx, &grid, n_in, n_out)?;

        let mut codes = [0u16; MAX_INPUT_DIMENSIONS];
        let mut input = [0f32; MAX_INPUT_DIMENSIONS];
        let mut output = [0f32; MAX_STAGE_CHANNELS];
        let mut index = 0usize;
        for i in 0..nodes {
            node_codes(i, &grid, &mut codes[..n_in]);
            for (dst, &c) in input.iter_mut().zip(&codes[..n_in]) {
                *dst = word_to_float(c);
            }
            output[..n_out].copy_from_slice(&table[index..index + n_out]);

            sampler(&input[..n_in], &mut output[..n_out])?;

            if mode == SampleMode::Write {
                table[index..index + n_out].copy_from_slice(&output[..n_out]);
            }
            index += n_out;
        }
        Ok(())
    }
}

/// Visit every node of a grid without a backing table
pub fn slice_space_16<F>(ctx: &Context, grid: &[u32], mut sampler: F) -> Result<()>
where
    F: FnMut(&[u16]) -> Result<()>,
{
    let n_in = grid.len();
    let nodes = total_nodes(ctx, grid, n_in, 1)?;
    let mut input = [0u16; MAX_INPUT_DIMENSIONS];
    for i in 0..nodes {
        node_codes(i, grid, &mut input[..n_in]);
        sampler(&input[..n_in])?;
    }
    Ok(())
}

/// Float variant of [`slice_space_16`]
pub fn slice_space_float<F>(ctx: &Context, grid: &[u32], mut sampler: F) -> Result<()>
where
    F: FnMut(&[f32]) -> Result<()>,
{
    let n_in = grid.len();
    let nodes = total_nodes(ctx, grid, n_in, 1)?;
    let mut codes = [0u16; MAX_INPUT_DIMENSIONS];
    let mut input = [0f32; MAX_INPUT_DIMENSIONS];
    for i in 0..nodes {
        node_codes(i, grid, &mut codes[..n_in]);
        for (dst, &c) in input.iter_mut().zip(&codes[..n_in]) {
            *dst = word_to_float(c);
        }
        sampler(&input[..n_in])?;
    }
    Ok(())
}
