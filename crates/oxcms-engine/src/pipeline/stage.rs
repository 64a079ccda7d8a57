//! Pipeline stages
//!
//! A [`Stage`] maps a float vector in the normalized `[0, 1]` domain to
//! another. Storage precision (16-bit CLUT tables, curve tables) only
//! matters inside the stage.

use std::sync::Arc;

use crate::color::{Lab, MAX_ENCODEABLE_XYZ, Signature, Xyz};
use crate::context::Context;
use crate::curve::ToneCurve;
use crate::error::{ErrorKind, Result};
use crate::math::fixed::{float_to_word, word_to_float};
use crate::math::interpolation::MAX_STAGE_CHANNELS;
use crate::pipeline::clut::Clut;
use crate::pipeline::named::NamedColorList;

/// Stage payload
#[derive(Debug, Clone)]
pub enum StageKind {
    /// Pass-through
    Identity,
    /// Negative values clamp to zero
    ClipNegatives,
    /// One curve per channel
    Curves(Vec<ToneCurve>),
    /// `rows × cols` row-major coefficients plus optional per-row offset
    Matrix {
        coefficients: Vec<f64>,
        offset: Option<Vec<f64>>,
    },
    /// Multidimensional lookup table
    Clut(Clut),
    /// Normalized XYZ to normalized Lab
    XyzToLab,
    /// Normalized Lab to normalized XYZ
    LabToXyz,
    /// Color index to PCS (`use_pcs`) or device colorants
    NamedColor {
        list: Arc<NamedColorList>,
        use_pcs: bool,
    },
}

/// One step of a pipeline
#[derive(Debug, Clone)]
pub struct Stage {
    kind: StageKind,
    implements: Signature,
    input_channels: usize,
    output_channels: usize,
}

fn check_channels(ctx: &Context, what: &str, n: usize) -> Result<()> {
    if n == 0 || n >= MAX_STAGE_CHANNELS {
        return Err(ctx.report(
            ErrorKind::Range,
            format!("{what}: {n} channels out of range (max={})", MAX_STAGE_CHANNELS - 1),
        ));
    }
    Ok(())
}

impl Stage {
    pub(crate) fn from_parts(kind: StageKind, input_channels: usize, output_channels: usize) -> Self {
        let implements = Self::type_of(&kind);
        Self {
            kind,
            implements,
            input_channels,
            output_channels,
        }
    }

    fn type_of(kind: &StageKind) -> Signature {
        match kind {
            StageKind::Identity => Signature::IDENTITY,
            StageKind::ClipNegatives => Signature::CLIP_NEGATIVES,
            StageKind::Curves(_) => Signature::CURVE_SET,
            StageKind::Matrix { .. } => Signature::MATRIX,
            StageKind::Clut(_) => Signature::CLUT,
            StageKind::XyzToLab => Signature::XYZ_TO_LAB,
            StageKind::LabToXyz => Signature::LAB_TO_XYZ,
            StageKind::NamedColor { .. } => Signature::NAMED_COLOR,
        }
    }

    /// Pass-through of `n` channels
    pub fn identity(ctx: &Context, n: usize) -> Result<Self> {
        check_channels(ctx, "Identity", n)?;
        Ok(Self::from_parts(StageKind::Identity, n, n))
    }

    /// Clamp negatives to zero on `n` channels
    pub fn clip_negatives(ctx: &Context, n: usize) -> Result<Self> {
        check_channels(ctx, "Clip negatives", n)?;
        Ok(Self::from_parts(StageKind::ClipNegatives, n, n))
    }

    /// One curve per channel
    pub fn tone_curves(ctx: &Context, curves: Vec<ToneCurve>) -> Result<Self> {
        let n = curves.len();
        check_channels(ctx, "Curve set", n)?;
        Ok(Self::from_parts(StageKind::Curves(curves), n, n))
    }

    /// `n` unity-gamma curves
    pub fn identity_curves(ctx: &Context, n: usize) -> Result<Self> {
        check_channels(ctx, "Curve set", n)?;
        let linear = ToneCurve::build_gamma(ctx, 1.0)?;
        Self::tone_curves(ctx, vec![linear; n])
    }

    /// Matrix stage, `rows` outputs by `cols` inputs
    pub fn matrix(
        ctx: &Context,
        rows: usize,
        cols: usize,
        coefficients: &[f64],
        offset: Option<&[f64]>,
    ) -> Result<Self> {
        check_channels(ctx, "Matrix rows", rows)?;
        check_channels(ctx, "Matrix columns", cols)?;
        if coefficients.len() != rows * cols {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("Matrix {rows}x{cols} needs {} coefficients, got {}", rows * cols, coefficients.len()),
            ));
        }
        if let Some(off) = offset {
            if off.len() != rows {
                return Err(ctx.report(
                    ErrorKind::Range,
                    format!("Matrix offset needs {rows} entries, got {}", off.len()),
                ));
            }
        }
        Ok(Self::from_parts(
            StageKind::Matrix {
                coefficients: coefficients.to_vec(),
                offset: offset.map(<[f64]>::to_vec),
            },
            cols,
            rows,
        ))
    }

    fn fixed_matrix(diag: [f64; 3], offset: Option<[f64; 3]>, implements: Signature) -> Self {
        let coefficients = vec![
            diag[0], 0.0, 0.0, //
            0.0, diag[1], 0.0, //
            0.0, 0.0, diag[2],
        ];
        let mut stage = Self::from_parts(
            StageKind::Matrix {
                coefficients,
                offset: offset.map(|o| o.to_vec()),
            },
            3,
            3,
        );
        stage.implements = implements;
        stage
    }

    /// Normalized XYZ to normalized Lab
    pub fn xyz_to_lab() -> Self {
        Self::from_parts(StageKind::XyzToLab, 3, 3)
    }

    /// Normalized Lab to normalized XYZ
    pub fn lab_to_xyz() -> Self {
        Self::from_parts(StageKind::LabToXyz, 3, 3)
    }

    /// Rescale 16-bit Lab v2 encoding to v4
    pub fn lab_v2_to_v4() -> Self {
        let k = 65535.0 / 65280.0;
        Self::fixed_matrix([k, k, k], None, Signature::LAB_V2_TO_V4)
    }

    /// Rescale 16-bit Lab v4 encoding to v2
    pub fn lab_v4_to_v2() -> Self {
        let k = 65280.0 / 65535.0;
        Self::fixed_matrix([k, k, k], None, Signature::LAB_V4_TO_V2)
    }

    /// Float Lab (L in 0..100) to the normalized encoding
    pub fn normalize_from_lab_float() -> Self {
        Self::fixed_matrix(
            [1.0 / 100.0, 1.0 / 255.0, 1.0 / 255.0],
            Some([0.0, 128.0 / 255.0, 128.0 / 255.0]),
            Signature::LAB_TO_FLOAT_PCS,
        )
    }

    /// Normalized Lab to float Lab (L in 0..100)
    pub fn normalize_to_lab_float() -> Self {
        Self::fixed_matrix(
            [100.0, 255.0, 255.0],
            Some([0.0, -128.0, -128.0]),
            Signature::FLOAT_PCS_TO_LAB,
        )
    }

    /// Float XYZ to the normalized encoding
    pub fn normalize_from_xyz_float() -> Self {
        let k = 32768.0 / 65535.0;
        Self::fixed_matrix([k, k, k], None, Signature::XYZ_TO_FLOAT_PCS)
    }

    /// Normalized XYZ to float XYZ
    pub fn normalize_to_xyz_float() -> Self {
        let k = 65535.0 / 32768.0;
        Self::fixed_matrix([k, k, k], None, Signature::FLOAT_PCS_TO_XYZ)
    }

    /// Named color lookup, 1 input
    pub fn named_color(list: Arc<NamedColorList>, use_pcs: bool) -> Self {
        let outputs = if use_pcs { 3 } else { list.colorant_count() };
        Self::from_parts(StageKind::NamedColor { list, use_pcs }, 1, outputs)
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut StageKind {
        &mut self.kind
    }

    /// Signature of the storage type
    pub fn stage_type(&self) -> Signature {
        Self::type_of(&self.kind)
    }

    /// Signature of what the stage computes
    pub fn implements(&self) -> Signature {
        self.implements
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn curves(&self) -> Option<&[ToneCurve]> {
        match &self.kind {
            StageKind::Curves(c) => Some(c),
            _ => None,
        }
    }

    pub fn clut(&self) -> Option<&Clut> {
        match &self.kind {
            StageKind::Clut(c) => Some(c),
            _ => None,
        }
    }

    /// Coefficients and offset of a matrix stage
    pub fn matrix_data(&self) -> Option<(&[f64], Option<&[f64]>)> {
        match &self.kind {
            StageKind::Matrix {
                coefficients,
                offset,
            } => Some((coefficients, offset.as_deref())),
            _ => None,
        }
    }

    /// Evaluate one vector
    pub fn eval(&self, input: &[f32], output: &mut [f32]) {
        match &self.kind {
            StageKind::Identity => {
                output[..self.input_channels].copy_from_slice(&input[..self.input_channels]);
            }
            StageKind::ClipNegatives => {
                for (o, &i) in output.iter_mut().zip(&input[..self.input_channels]) {
                    *o = if i < 0.0 { 0.0 } else { i };
                }
            }
            StageKind::Curves(curves) => {
                for (i, curve) in curves.iter().enumerate() {
                    output[i] = curve.eval_float(input[i]);
                }
            }
            StageKind::Matrix {
                coefficients,
                offset,
            } => {
                let cols = self.input_channels;
                for i in 0..self.output_channels {
                    let row = &coefficients[i * cols..(i + 1) * cols];
                    let mut tmp: f64 = row
                        .iter()
                        .zip(&input[..cols])
                        .map(|(c, &v)| v as f64 * c)
                        .sum();
                    if let Some(off) = offset {
                        tmp += off[i];
                    }
                    output[i] = tmp as f32;
                }
            }
            StageKind::Clut(clut) => clut.eval_float(input, output),
            StageKind::XyzToLab => {
                let lab = Lab::from_xyz(Xyz::from_normalized(input));
                output[..3].copy_from_slice(&lab.to_normalized());
            }
            StageKind::LabToXyz => {
                let xyz = Lab::from_normalized(input).to_xyz();
                output[0] = (xyz.x / MAX_ENCODEABLE_XYZ) as f32;
                output[1] = (xyz.y / MAX_ENCODEABLE_XYZ) as f32;
                output[2] = (xyz.z / MAX_ENCODEABLE_XYZ) as f32;
            }
            StageKind::NamedColor { list, use_pcs } => {
                let index = float_to_word(input[0]) as usize;
                let out = &mut output[..self.output_channels];
                match list.info(index) {
                    Some(color) if *use_pcs => {
                        for (o, &v) in out.iter_mut().zip(&color.pcs) {
                            *o = word_to_float(v);
                        }
                    }
                    Some(color) => {
                        for (o, &v) in out.iter_mut().zip(&color.device) {
                            *o = word_to_float(v);
                        }
                    }
                    None => {
                        tracing::warn!(index, count = list.count(), "named color out of range");
                        out.fill(0.0);
                    }
                }
            }
        }
    }

    /// Whether evaluation is a no-op
    pub fn is_identity(&self) -> bool {
        matches!(self.kind, StageKind::Identity)
    }
}
