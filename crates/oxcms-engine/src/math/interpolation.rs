//! Grid interpolation for lookup tables
//!
//! An [`InterpParams`] describes an N-input, M-output hyper-rectangular grid
//! with `n_samples[d]` nodes along dimension `d`, outputs interleaved per node
//! and input 0 varying slowest. The table itself is borrowed at evaluation
//! time, so one description serves any table of the right length.
//!
//! Algorithms:
//! - 1 input: linear between adjacent nodes
//! - 3 inputs: tetrahedral (6-way split of the unit cube), unless trilinear
//!   is requested
//! - otherwise: multilinear, recursing one dimension at a time
//!
//! The 16-bit path works in 16.16 fixed point; the float path clamps inputs
//! to `[0, 1]`.

use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::math::fixed::{
    fixed_rest_to_int, fixed_to_int, fixed_to_word, linear_interp_16, to_fixed_domain,
};

/// Maximum number of table inputs
pub const MAX_INPUT_DIMENSIONS: usize = 15;

/// Maximum number of channels flowing between stages
pub const MAX_STAGE_CHANNELS: usize = 128;

/// Interpolation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpFlags {
    /// Use trilinear instead of tetrahedral for 3-input tables
    pub trilinear: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Linear1D,
    Tetrahedral,
    Multilinear,
}

/// Precomputed grid description
#[derive(Debug, Clone, PartialEq)]
pub struct InterpParams {
    n_inputs: usize,
    n_outputs: usize,
    n_samples: [u32; MAX_INPUT_DIMENSIONS],
    domain: [u32; MAX_INPUT_DIMENSIONS],
    strides: [usize; MAX_INPUT_DIMENSIONS],
    table_len: usize,
    method: Method,
}

/// Total node count, or None on a degenerate dimension or overflow
pub fn cube_size(n_samples: &[u32]) -> Option<u32> {
    let mut rv: u32 = 1;
    for &dim in n_samples.iter().rev() {
        if dim <= 1 {
            return None;
        }
        rv = rv.checked_mul(dim)?;
        if rv > u32::MAX / dim {
            return None;
        }
    }
    if rv > u32::MAX / 15 {
        return None;
    }
    Some(rv)
}

#[inline]
fn fclamp(v: f32) -> f32 {
    if v < 1.0e-9 || v.is_nan() {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}

impl InterpParams {
    /// Describe a grid with the same node count on every input
    pub fn uniform(
        ctx: &Context,
        n_samples: u32,
        n_inputs: usize,
        n_outputs: usize,
        flags: InterpFlags,
    ) -> Result<Self> {
        let dims = [n_samples; MAX_INPUT_DIMENSIONS];
        Self::new(ctx, &dims[..n_inputs.min(MAX_INPUT_DIMENSIONS)], n_inputs, n_outputs, flags)
    }

    /// Describe a grid with per-dimension node counts
    pub fn new(
        ctx: &Context,
        n_samples: &[u32],
        n_inputs: usize,
        n_outputs: usize,
        flags: InterpFlags,
    ) -> Result<Self> {
        if n_inputs == 0 || n_inputs > MAX_INPUT_DIMENSIONS {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("Too many input channels ({n_inputs} channels, max={MAX_INPUT_DIMENSIONS})"),
            ));
        }
        if n_outputs == 0 || n_outputs >= MAX_STAGE_CHANNELS {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("Too many output channels ({n_outputs} channels, max={MAX_STAGE_CHANNELS})"),
            ));
        }
        if n_samples.len() < n_inputs {
            return Err(ctx.report(
                ErrorKind::Internal,
                format!("{} grid sizes given for {n_inputs} inputs", n_samples.len()),
            ));
        }

        let n_samples = &n_samples[..n_inputs];
        let nodes = cube_size(n_samples).ok_or_else(|| {
            ctx.report(
                ErrorKind::Range,
                format!("Invalid grid {n_samples:?}: degenerate dimension or too many nodes"),
            )
        })?;
        let table_len = (nodes as usize).checked_mul(n_outputs).ok_or_else(|| {
            ctx.report(ErrorKind::Range, "Lookup table size overflows")
        })?;

        let mut samples = [0u32; MAX_INPUT_DIMENSIONS];
        let mut domain = [0u32; MAX_INPUT_DIMENSIONS];
        let mut strides = [0usize; MAX_INPUT_DIMENSIONS];
        let mut stride = n_outputs;
        for d in (0..n_inputs).rev() {
            samples[d] = n_samples[d];
            domain[d] = n_samples[d] - 1;
            strides[d] = stride;
            stride *= n_samples[d] as usize;
        }

        let method = match n_inputs {
            1 if n_outputs == 1 => Method::Linear1D,
            3 if !flags.trilinear => Method::Tetrahedral,
            _ => Method::Multilinear,
        };

        Ok(Self {
            n_inputs,
            n_outputs,
            n_samples: samples,
            domain,
            strides,
            table_len,
            method,
        })
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Node counts per input dimension
    pub fn n_samples(&self) -> &[u32] {
        &self.n_samples[..self.n_inputs]
    }

    /// Number of table entries this grid addresses
    pub fn table_len(&self) -> usize {
        self.table_len
    }

    /// Table offset of the first output of a node
    pub fn node_offset(&self, node: &[usize]) -> usize {
        node.iter()
            .zip(&self.strides[..self.n_inputs])
            .map(|(i, s)| i * s)
            .sum()
    }

    /// Interpolate 16-bit inputs over a 16-bit table
    pub fn eval_16(&self, table: &[u16], input: &[u16], output: &mut [u16]) {
        match self.method {
            Method::Linear1D => output[0] = self.linear_1d_16(table, input[0]),
            Method::Tetrahedral => self.tetrahedral_16(table, input, output),
            Method::Multilinear => self.multilinear_16(table, 0, 0, input, output),
        }
    }

    /// Interpolate normalized float inputs over a float table
    pub fn eval_float(&self, table: &[f32], input: &[f32], output: &mut [f32]) {
        match self.method {
            Method::Linear1D => output[0] = self.linear_1d_float(table, input[0]),
            Method::Tetrahedral => self.tetrahedral_float(table, input, output),
            Method::Multilinear => self.multilinear_float(table, 0, 0, input, output),
        }
    }

    fn linear_1d_16(&self, table: &[u16], v: u16) -> u16 {
        let domain = self.domain[0] as usize;
        if v == 0xFFFF {
            return table[domain];
        }
        let fx = to_fixed_domain(v as i64 * domain as i64);
        let cell0 = fixed_to_int(fx);
        let rest = fixed_rest_to_int(fx);
        linear_interp_16(rest, table[cell0] as i64, table[cell0 + 1] as i64)
    }

    fn linear_1d_float(&self, table: &[f32], v: f32) -> f32 {
        let v = fclamp(v);
        let domain = self.domain[0] as usize;
        if v == 1.0 {
            return table[domain];
        }
        let val2 = v * domain as f32;
        let cell0 = val2.floor() as usize;
        let cell1 = (val2.ceil() as usize).min(domain);
        let rest = val2 - cell0 as f32;
        let y0 = table[cell0];
        let y1 = table[cell1];
        y0 + (y1 - y0) * rest
    }

    fn multilinear_16(&self, table: &[u16], base: usize, dim: usize, input: &[u16], out: &mut [u16]) {
        let v = input[dim];
        let fk = to_fixed_domain(v as i64 * self.domain[dim] as i64);
        let k0 = fixed_to_int(fk);
        let rk = fixed_rest_to_int(fk);

        let k0_off = base + k0 * self.strides[dim];
        let k1_off = if v == 0xFFFF {
            k0_off
        } else {
            k0_off + self.strides[dim]
        };

        if dim + 1 == self.n_inputs {
            for o in 0..self.n_outputs {
                out[o] = linear_interp_16(rk, table[k0_off + o] as i64, table[k1_off + o] as i64);
            }
            return;
        }

        let mut t1 = [0u16; MAX_STAGE_CHANNELS];
        let mut t2 = [0u16; MAX_STAGE_CHANNELS];
        self.multilinear_16(table, k0_off, dim + 1, input, &mut t1);
        self.multilinear_16(table, k1_off, dim + 1, input, &mut t2);
        for o in 0..self.n_outputs {
            out[o] = linear_interp_16(rk, t1[o] as i64, t2[o] as i64);
        }
    }

    fn multilinear_float(&self, table: &[f32], base: usize, dim: usize, input: &[f32], out: &mut [f32]) {
        let v = fclamp(input[dim]);
        let pk = v * self.domain[dim] as f32;
        let k0 = (pk.floor() as usize).min(self.domain[dim] as usize);
        let rest = pk - k0 as f32;

        let k0_off = base + k0 * self.strides[dim];
        let k1_off = if v >= 1.0 {
            k0_off
        } else {
            k0_off + self.strides[dim]
        };

        if dim + 1 == self.n_inputs {
            for o in 0..self.n_outputs {
                let y0 = table[k0_off + o];
                let y1 = table[k1_off + o];
                out[o] = y0 + (y1 - y0) * rest;
            }
            return;
        }

        let mut t1 = [0f32; MAX_STAGE_CHANNELS];
        let mut t2 = [0f32; MAX_STAGE_CHANNELS];
        self.multilinear_float(table, k0_off, dim + 1, input, &mut t1);
        self.multilinear_float(table, k1_off, dim + 1, input, &mut t2);
        for o in 0..self.n_outputs {
            out[o] = t1[o] + (t2[o] - t1[o]) * rest;
        }
    }

    fn tetrahedral_float(&self, table: &[f32], input: &[f32], out: &mut [f32]) {
        let (sx, sy, sz) = (self.strides[0], self.strides[1], self.strides[2]);

        let vx = fclamp(input[0]);
        let vy = fclamp(input[1]);
        let vz = fclamp(input[2]);

        let px = vx * self.domain[0] as f32;
        let py = vy * self.domain[1] as f32;
        let pz = vz * self.domain[2] as f32;

        let x0 = (px.floor() as usize).min(self.domain[0] as usize);
        let y0 = (py.floor() as usize).min(self.domain[1] as usize);
        let z0 = (pz.floor() as usize).min(self.domain[2] as usize);
        let rx = px - x0 as f32;
        let ry = py - y0 as f32;
        let rz = pz - z0 as f32;

        let xa = sx * x0;
        let xb = xa + if vx >= 1.0 { 0 } else { sx };
        let ya = sy * y0;
        let yb = ya + if vy >= 1.0 { 0 } else { sy };
        let za = sz * z0;
        let zb = za + if vz >= 1.0 { 0 } else { sz };

        for o in 0..self.n_outputs {
            let d = |x: usize, y: usize, z: usize| table[x + y + z + o];
            let c0 = d(xa, ya, za);
            let (c1, c2, c3) = if rx >= ry && ry >= rz {
                (d(xb, ya, za) - c0, d(xb, yb, za) - d(xb, ya, za), d(xb, yb, zb) - d(xb, yb, za))
            } else if rx >= rz && rz >= ry {
                (d(xb, ya, za) - c0, d(xb, yb, zb) - d(xb, ya, zb), d(xb, ya, zb) - d(xb, ya, za))
            } else if rz >= rx && rx >= ry {
                (d(xb, ya, zb) - d(xa, ya, zb), d(xb, yb, zb) - d(xb, ya, zb), d(xa, ya, zb) - c0)
            } else if ry >= rx && rx >= rz {
                (d(xb, yb, za) - d(xa, yb, za), d(xa, yb, za) - c0, d(xb, yb, zb) - d(xb, yb, za))
            } else if ry >= rz && rz >= rx {
                (d(xb, yb, zb) - d(xa, yb, zb), d(xa, yb, za) - c0, d(xa, yb, zb) - d(xa, yb, za))
            } else if rz >= ry && ry >= rx {
                (d(xb, yb, zb) - d(xa, yb, zb), d(xa, yb, zb) - d(xa, ya, zb), d(xa, ya, zb) - c0)
            } else {
                (0.0, 0.0, 0.0)
            };
            out[o] = c0 + c1 * rx + c2 * ry + c3 * rz;
        }
    }

    fn tetrahedral_16(&self, table: &[u16], input: &[u16], out: &mut [u16]) {
        let (sx, sy, sz) = (self.strides[0], self.strides[1], self.strides[2]);

        let fx = to_fixed_domain(input[0] as i64 * self.domain[0] as i64);
        let fy = to_fixed_domain(input[1] as i64 * self.domain[1] as i64);
        let fz = to_fixed_domain(input[2] as i64 * self.domain[2] as i64);

        let rx = fixed_rest_to_int(fx);
        let ry = fixed_rest_to_int(fy);
        let rz = fixed_rest_to_int(fz);

        let xa = sx * fixed_to_int(fx);
        let xb = xa + if input[0] == 0xFFFF { 0 } else { sx };
        let ya = sy * fixed_to_int(fy);
        let yb = ya + if input[1] == 0xFFFF { 0 } else { sy };
        let za = sz * fixed_to_int(fz);
        let zb = za + if input[2] == 0xFFFF { 0 } else { sz };

        for o in 0..self.n_outputs {
            let d = |x: usize, y: usize, z: usize| table[x + y + z + o] as i64;
            let c0 = d(xa, ya, za);
            let (c1, c2, c3) = if rx >= ry && ry >= rz {
                (d(xb, ya, za) - c0, d(xb, yb, za) - d(xb, ya, za), d(xb, yb, zb) - d(xb, yb, za))
            } else if rx >= rz && rz >= ry {
                (d(xb, ya, za) - c0, d(xb, yb, zb) - d(xb, ya, zb), d(xb, ya, zb) - d(xb, ya, za))
            } else if rz >= rx && rx >= ry {
                (d(xb, ya, zb) - d(xa, ya, zb), d(xb, yb, zb) - d(xb, ya, zb), d(xa, ya, zb) - c0)
            } else if ry >= rx && rx >= rz {
                (d(xb, yb, za) - d(xa, yb, za), d(xa, yb, za) - c0, d(xb, yb, zb) - d(xb, yb, za))
            } else if ry >= rz && rz >= rx {
                (d(xb, yb, zb) - d(xa, yb, zb), d(xa, yb, za) - c0, d(xa, yb, zb) - d(xa, yb, za))
            } else if rz >= ry && ry >= rx {
                (d(xb, yb, zb) - d(xa, yb, zb), d(xa, yb, zb) - d(xa, ya, zb), d(xa, ya, zb) - c0)
            } else {
                (0, 0, 0)
            };
            let rest = c1 * rx + c2 * ry + c3 * rz;
            out[o] = fixed_to_word((c0 << 16) + to_fixed_domain(rest));
        }
    }
}

/// Linear interpolation between two values
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fixed::quantize_val;

    fn ctx() -> Context {
        Context::new()
    }

    #[test]
    fn test_rejects_degenerate_domain() {
        let err = InterpParams::new(&ctx(), &[2, 1, 2], 3, 1, InterpFlags::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(cube_size(&[255; 15]).is_none());
        assert!(InterpParams::uniform(&ctx(), 255, 15, 3, InterpFlags::default()).is_err());
        assert_eq!(cube_size(&[17, 17, 17, 17]), Some(83521));
    }

    #[test]
    fn test_rejects_too_many_channels() {
        assert!(InterpParams::uniform(&ctx(), 2, 16, 1, InterpFlags::default()).is_err());
        assert!(InterpParams::uniform(&ctx(), 2, 3, MAX_STAGE_CHANNELS, InterpFlags::default()).is_err());
    }

    #[test]
    fn test_irregular_grid_strides() {
        let p = InterpParams::new(&ctx(), &[2, 3, 4], 3, 2, InterpFlags::default()).unwrap();
        assert_eq!(p.table_len(), 2 * 3 * 4 * 2);
        assert_eq!(p.node_offset(&[1, 0, 0]), 24);
        assert_eq!(p.node_offset(&[0, 1, 0]), 8);
        assert_eq!(p.node_offset(&[0, 0, 1]), 2);
    }

    #[test]
    fn test_linear_1d() {
        let p = InterpParams::uniform(&ctx(), 3, 1, 1, InterpFlags::default()).unwrap();
        let table16 = [0u16, 10000, 65535];
        let mut out = [0u16];
        p.eval_16(&table16, &[0], &mut out);
        assert_eq!(out[0], 0);
        p.eval_16(&table16, &[0xFFFF], &mut out);
        assert_eq!(out[0], 65535);
        p.eval_16(&table16, &[quantize_val(1.0, 3)], &mut out);
        assert_eq!(out[0], 10000);

        let tablef = [0.0f32, 0.25, 1.0];
        let mut outf = [0f32];
        p.eval_float(&tablef, &[0.25], &mut outf);
        assert!((outf[0] - 0.125).abs() < 1e-6);
        p.eval_float(&tablef, &[2.0], &mut outf);
        assert_eq!(outf[0], 1.0);
        p.eval_float(&tablef, &[f32::NAN], &mut outf);
        assert_eq!(outf[0], 0.0);
    }

    #[test]
    fn test_1d_multiple_outputs() {
        let p = InterpParams::uniform(&ctx(), 2, 1, 2, InterpFlags::default()).unwrap();
        let table = [0.0f32, 1.0, 1.0, 0.0];
        let mut out = [0f32; 2];
        p.eval_float(&table, &[0.25], &mut out);
        assert!((out[0] - 0.25).abs() < 1e-6);
        assert!((out[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_16_bit_tetrahedral_tracks_float() {
        use rand::prelude::*;
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let p = InterpParams::uniform(&ctx(), 9, 3, 3, InterpFlags::default()).unwrap();
        let table16: Vec<u16> = (0..p.table_len()).map(|_| rng.r#gen()).collect();
        let tablef: Vec<f32> = table16.iter().map(|&v| v as f32 / 65535.0).collect();

        let mut worst = 0i32;
        for _ in 0..500 {
            let input: [u16; 3] = [rng.r#gen(), rng.r#gen(), rng.r#gen()];
            let mut out16 = [0u16; 3];
            p.eval_16(&table16, &input, &mut out16);

            let inf = input.map(|v| v as f32 / 65535.0);
            let mut outf = [0f32; 3];
            p.eval_float(&tablef, &inf, &mut outf);
            for c in 0..3 {
                let expected = (outf[c] * 65535.0).round() as i32;
                worst = worst.max((out16[c] as i32 - expected).abs());
            }
        }
        assert!(worst <= 3, "16-bit path drifted {worst} codes from float");
    }

    fn corner_cube() -> Vec<f32> {
        // 2x2x2, 1 output, 1.0 only at (1,1,1)
        let mut t = vec![0f32; 8];
        t[7] = 1.0;
        t
    }

    #[test]
    fn test_tetrahedral_diagonal() {
        let p = InterpParams::uniform(&ctx(), 2, 3, 1, InterpFlags::default()).unwrap();
        let mut out = [0f32];
        p.eval_float(&corner_cube(), &[0.5, 0.5, 0.5], &mut out);
        assert!((out[0] - 0.5).abs() < 1e-6, "got {}", out[0]);
    }

    #[test]
    fn test_trilinear_diagonal() {
        let flags = InterpFlags { trilinear: true };
        let p = InterpParams::uniform(&ctx(), 2, 3, 1, flags).unwrap();
        let mut out = [0f32];
        p.eval_float(&corner_cube(), &[0.5, 0.5, 0.5], &mut out);
        assert!((out[0] - 0.125).abs() < 1e-6, "got {}", out[0]);
    }

    #[test]
    fn test_tetrahedral_16_diagonal() {
        let p = InterpParams::uniform(&ctx(), 2, 3, 1, InterpFlags::default()).unwrap();
        let mut table = [0u16; 8];
        table[7] = 0xFFFF;
        let mut out = [0u16];
        p.eval_16(&table, &[0x7FFF, 0x7FFF, 0x7FFF], &mut out);
        assert_eq!(out[0], 0x7FFF);
        p.eval_16(&table, &[0xFFFF, 0xFFFF, 0xFFFF], &mut out);
        assert_eq!(out[0], 0xFFFF);
    }

    #[test]
    fn test_nodes_are_exact_float() {
        let n = 5u32;
        let p = InterpParams::uniform(&ctx(), n, 3, 3, InterpFlags::default()).unwrap();
        let mut table = vec![0f32; p.table_len()];
        for i in 0..n as usize {
            for j in 0..n as usize {
                for k in 0..n as usize {
                    let off = p.node_offset(&[i, j, k]);
                    table[off] = (i * i) as f32 / 16.0;
                    table[off + 1] = (j as f32 / 4.0).sqrt();
                    table[off + 2] = ((i + j + k) % 3) as f32;
                }
            }
        }
        let mut out = [0f32; 3];
        for i in 0..n as usize {
            for j in 0..n as usize {
                for k in 0..n as usize {
                    let input = [i as f32 / 4.0, j as f32 / 4.0, k as f32 / 4.0];
                    p.eval_float(&table, &input, &mut out);
                    let off = p.node_offset(&[i, j, k]);
                    assert_eq!(&out[..], &table[off..off + 3], "node ({i},{j},{k})");
                }
            }
        }
    }

    #[test]
    fn test_multilinear_4d_16() {
        let p = InterpParams::uniform(&ctx(), 2, 4, 1, InterpFlags::default()).unwrap();
        // f = sum of inputs, scaled
        let mut table = vec![0u16; 16];
        for (i, v) in table.iter_mut().enumerate() {
            *v = (i.count_ones() as u16) * 16383;
        }
        let mut out = [0u16];
        p.eval_16(&table, &[0, 0, 0, 0], &mut out);
        assert_eq!(out[0], 0);
        p.eval_16(&table, &[0xFFFF; 4], &mut out);
        assert_eq!(out[0], 4 * 16383);
        p.eval_16(&table, &[0x8000, 0, 0, 0], &mut out);
        assert!((out[0] as i32 - 8192).abs() <= 2, "got {}", out[0]);
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(1.0, 3.0, 0.5), 2.0);
    }
}
