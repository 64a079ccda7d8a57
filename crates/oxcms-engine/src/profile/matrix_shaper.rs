//! Matrix-shaper profiles
//!
//! The most common profile shape (sRGB, Display P3, gray displays): one
//! transfer curve per channel followed by a colorant matrix into D50 XYZ.
//!
//! # Pipelines
//!
//! Input: TRC decode → colorant matrix → [XYZ to Lab]
//!
//! Output: [Lab to XYZ] → inverse colorant matrix → TRC encode

use crate::color::{D50, MAX_ENCODEABLE_XYZ, XyY};
use crate::context::{Context, RenderIntent};
use crate::curve::ToneCurve;
use crate::error::{ErrorKind, Result};
use crate::math::adapt_to_d50;
use crate::math::matrix::Matrix3x3;
use crate::pipeline::{Pipeline, Stage, StageLoc};

use super::{ColorSpace, Profile, ProfileClass};

/// RGB profile defined by primaries, white point and transfer curves
#[derive(Debug, Clone)]
pub struct MatrixShaperProfile {
    /// Device RGB to D50 XYZ, primaries as columns
    colorants: Matrix3x3,
    curves: [ToneCurve; 3],
    pcs: ColorSpace,
    class: ProfileClass,
    version: f64,
}

impl MatrixShaperProfile {
    /// Build from chromaticities, adapting the primaries to D50
    ///
    /// Fails when the primaries are degenerate or the white point can't be
    /// adapted.
    pub fn new(ctx: &Context, white: XyY, primaries: [XyY; 3], curves: [ToneCurve; 3]) -> Result<Self> {
        let singular = || ctx.report(ErrorKind::Range, "Primaries don't span a color space");

        let chromaticities = Matrix3x3::new([
            [primaries[0].x, primaries[1].x, primaries[2].x],
            [primaries[0].y, primaries[1].y, primaries[2].y],
            [
                1.0 - primaries[0].x - primaries[0].y,
                1.0 - primaries[1].x - primaries[1].y,
                1.0 - primaries[2].x - primaries[2].y,
            ],
        ]);

        let white_xyz = XyY::new(white.x, white.y, 1.0).to_xyz();
        let scale = chromaticities
            .solve(white_xyz.to_array())
            .ok_or_else(singular)?;
        let unadapted = chromaticities.multiply(&Matrix3x3::diagonal(scale[0], scale[1], scale[2]));

        let bradford = adapt_to_d50(white_xyz).ok_or_else(|| {
            ctx.report(
                ErrorKind::Range,
                format!("White point ({}, {}) can't be adapted to D50", white.x, white.y),
            )
        })?;

        Ok(Self::from_matrix(bradford.multiply(&unadapted), curves))
    }

    /// Build from an already D50-relative colorant matrix
    pub fn from_matrix(colorants: Matrix3x3, curves: [ToneCurve; 3]) -> Self {
        Self {
            colorants,
            curves,
            pcs: ColorSpace::Xyz,
            class: ProfileClass::Display,
            version: 4.3,
        }
    }

    /// IEC 61966-2-1 sRGB
    pub fn srgb(ctx: &Context) -> Result<Self> {
        let params = [2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045];
        let trc = ToneCurve::build_parametric(ctx, 4, &params)?;
        Self::new(
            ctx,
            XyY::new(0.3127, 0.3290, 1.0),
            [
                XyY::new(0.64, 0.33, 1.0),
                XyY::new(0.30, 0.60, 1.0),
                XyY::new(0.15, 0.06, 1.0),
            ],
            [trc.clone(), trc.clone(), trc],
        )
    }

    pub fn with_pcs(mut self, pcs: ColorSpace) -> Self {
        self.pcs = pcs;
        self
    }

    pub fn with_class(mut self, class: ProfileClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_version(mut self, version: f64) -> Self {
        self.version = version;
        self
    }

    pub fn colorants(&self) -> &Matrix3x3 {
        &self.colorants
    }
}

impl Profile for MatrixShaperProfile {
    fn color_space(&self) -> ColorSpace {
        ColorSpace::Rgb
    }

    fn pcs(&self) -> ColorSpace {
        self.pcs
    }

    fn profile_class(&self) -> ProfileClass {
        self.class
    }

    fn version(&self) -> f64 {
        self.version
    }

    fn is_matrix_shaper(&self) -> bool {
        true
    }

    fn read_input_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        let to_pcs = self.colorants.scale(1.0 / MAX_ENCODEABLE_XYZ);

        let mut lut = Pipeline::new(ctx, 3, 3)?;
        lut.insert_stage(StageLoc::AtEnd, Stage::tone_curves(ctx, self.curves.to_vec())?)?;
        lut.insert_stage(StageLoc::AtEnd, Stage::matrix(ctx, 3, 3, &to_pcs.to_row_vec(), None)?)?;
        if self.pcs == ColorSpace::Lab {
            lut.insert_stage(StageLoc::AtEnd, Stage::xyz_to_lab())?;
        }
        Ok(lut)
    }

    fn read_output_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        let inverse = self
            .colorants
            .inverse()
            .ok_or_else(|| ctx.report(ErrorKind::NotSuitable, "Colorant matrix is singular"))?;
        let from_pcs = inverse.scale(MAX_ENCODEABLE_XYZ);

        let reversed = self
            .curves
            .iter()
            .map(|c| c.reverse(ctx))
            .collect::<Result<Vec<_>>>()?;

        let mut lut = Pipeline::new(ctx, 3, 3)?;
        if self.pcs == ColorSpace::Lab {
            lut.insert_stage(StageLoc::AtEnd, Stage::lab_to_xyz())?;
        }
        lut.insert_stage(StageLoc::AtEnd, Stage::matrix(ctx, 3, 3, &from_pcs.to_row_vec(), None)?)?;
        lut.insert_stage(StageLoc::AtEnd, Stage::tone_curves(ctx, reversed)?)?;
        Ok(lut)
    }
}

/// Single-channel profile: one TRC against Y or L*
#[derive(Debug, Clone)]
pub struct GrayProfile {
    trc: ToneCurve,
    pcs: ColorSpace,
    class: ProfileClass,
    version: f64,
}

impl GrayProfile {
    pub fn new(trc: ToneCurve) -> Self {
        Self {
            trc,
            pcs: ColorSpace::Xyz,
            class: ProfileClass::Display,
            version: 4.3,
        }
    }

    pub fn with_pcs(mut self, pcs: ColorSpace) -> Self {
        self.pcs = pcs;
        self
    }

    pub fn with_class(mut self, class: ProfileClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_version(mut self, version: f64) -> Self {
        self.version = version;
        self
    }
}

impl Profile for GrayProfile {
    fn color_space(&self) -> ColorSpace {
        ColorSpace::Gray
    }

    fn pcs(&self) -> ColorSpace {
        self.pcs
    }

    fn profile_class(&self) -> ProfileClass {
        self.class
    }

    fn version(&self) -> f64 {
        self.version
    }

    fn is_matrix_shaper(&self) -> bool {
        true
    }

    fn read_input_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        let mut lut = Pipeline::new(ctx, 1, 3)?;
        if self.pcs == ColorSpace::Lab {
            // Gray drives L*, a* and b* sit at the neutral axis
            let neutral = ToneCurve::build_tabulated_16(ctx, &[0x8080, 0x8080])?;
            lut.insert_stage(StageLoc::AtEnd, Stage::matrix(ctx, 3, 1, &[1.0, 1.0, 1.0], None)?)?;
            lut.insert_stage(
                StageLoc::AtEnd,
                Stage::tone_curves(ctx, vec![self.trc.clone(), neutral.clone(), neutral])?,
            )?;
        } else {
            let d50 = D50.xyz.to_array().map(|v| v / MAX_ENCODEABLE_XYZ);
            lut.insert_stage(StageLoc::AtEnd, Stage::tone_curves(ctx, vec![self.trc.clone()])?)?;
            lut.insert_stage(StageLoc::AtEnd, Stage::matrix(ctx, 3, 1, &d50, None)?)?;
        }
        Ok(lut)
    }

    fn read_output_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        let pick = if self.pcs == ColorSpace::Lab {
            [1.0, 0.0, 0.0]
        } else {
            [0.0, MAX_ENCODEABLE_XYZ * D50.xyz.y, 0.0]
        };

        let mut lut = Pipeline::new(ctx, 3, 1)?;
        lut.insert_stage(StageLoc::AtEnd, Stage::matrix(ctx, 1, 3, &pick, None)?)?;
        lut.insert_stage(StageLoc::AtEnd, Stage::tone_curves(ctx, vec![self.trc.reverse(ctx)?])?)?;
        Ok(lut)
    }
}
