//! Buffer evaluation loops
//!
//! Interleaved pixel buffers evaluated pixel by pixel, compiled for several
//! CPU feature levels with runtime dispatch.

use std::borrow::Cow;

use multiversion::multiversion;

use super::Pipeline;
use crate::error::{Error, ErrorKind, Result};

#[multiversion(targets("x86_64+avx2", "x86_64+sse4.1", "aarch64+neon",))]
fn eval_float_rows(lut: &Pipeline, src: &[f32], dst: &mut [f32], n_in: usize, n_out: usize) {
    for (pixel_in, pixel_out) in src.chunks_exact(n_in).zip(dst.chunks_exact_mut(n_out)) {
        lut.eval_float(pixel_in, pixel_out);
    }
}

#[multiversion(targets("x86_64+avx2", "x86_64+sse4.1", "aarch64+neon",))]
fn eval_16_rows(lut: &Pipeline, src: &[u16], dst: &mut [u16], n_in: usize, n_out: usize) {
    for (pixel_in, pixel_out) in src.chunks_exact(n_in).zip(dst.chunks_exact_mut(n_out)) {
        lut.eval_16(pixel_in, pixel_out);
    }
}

impl Pipeline {
    /// Pixel count of `src`, checking both buffer lengths
    fn batch_pixels(&self, src_len: usize, dst_len: usize) -> Result<usize> {
        let (n_in, n_out) = (self.input_channels(), self.output_channels());
        if n_in == 0 || n_out == 0 {
            return Err(self.context().report(
                ErrorKind::Internal,
                "Batch evaluation of a pipeline with undetermined channels",
            ));
        }
        let pixels = src_len / n_in;
        if pixels * n_in != src_len {
            return Err(Error::BufferSize {
                expected: (pixels + 1) * n_in,
                actual: src_len,
            });
        }
        if dst_len != pixels * n_out {
            return Err(Error::BufferSize {
                expected: pixels * n_out,
                actual: dst_len,
            });
        }
        Ok(pixels)
    }

    /// Evaluate an interleaved float buffer
    pub fn eval_float_batch(&self, src: &[f32], dst: &mut [f32]) -> Result<()> {
        self.batch_pixels(src.len(), dst.len())?;
        eval_float_rows(self, src, dst, self.input_channels(), self.output_channels());
        Ok(())
    }

    /// Evaluate an interleaved 16-bit buffer
    pub fn eval_16_batch(&self, src: &[u16], dst: &mut [u16]) -> Result<()> {
        self.batch_pixels(src.len(), dst.len())?;
        eval_16_rows(self, src, dst, self.input_channels(), self.output_channels());
        Ok(())
    }

    /// Evaluate native-endian 16-bit samples stored in byte buffers
    pub fn eval_16_bytes(&self, src: &[u8], dst: &mut [u8]) -> Result<()> {
        if src.len() % 2 != 0 {
            return Err(Error::BufferSize {
                expected: src.len() + 1,
                actual: src.len(),
            });
        }
        if dst.len() % 2 != 0 {
            return Err(Error::BufferSize {
                expected: dst.len() + 1,
                actual: dst.len(),
            });
        }

        let words: Cow<'_, [u16]> = match bytemuck::try_cast_slice(src) {
            Ok(aligned) => Cow::Borrowed(aligned),
            Err(_) => Cow::Owned(bytemuck::pod_collect_to_vec(src)),
        };

        match bytemuck::try_cast_slice_mut::<u8, u16>(dst) {
            Ok(out) => self.eval_16_batch(&words, out),
            Err(_) => {
                let mut out = vec![0u16; dst.len() / 2];
                self.eval_16_batch(&words, &mut out)?;
                dst.copy_from_slice(bytemuck::cast_slice(&out[..]));
                Ok(())
            }
        }
    }
}
