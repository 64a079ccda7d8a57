//! In-memory profiles shared by the integration tests
//!
//! The printers are linear ink models: every table is a single matrix
//! stage, so the exact answer of any chain through them is known.

use oxcms_engine::math::Matrix3x3;
use oxcms_engine::profile::{DeviceLinkProfile, LutProfile};
use oxcms_engine::{ColorSpace, Context, Pipeline, ProfileClass, Stage, StageLoc};

const AB_OFFSET: f64 = 128.0 / 255.0;

/// Rows L, a, b over columns C, M, Y, K in the normalized Lab encoding
pub const INK_MODEL: [[f64; 4]; 3] = [
    [-0.25, -0.25, -0.2, -0.3],
    [0.2, -0.15, 0.05, 0.0],
    [-0.1, 0.05, -0.2, 0.0],
];

/// Darkness of full K alone, as `1 - L*/100`
pub const K_DARKNESS: f64 = 0.3;

fn single_stage(ctx: &Context, n_in: usize, n_out: usize, coeffs: &[f64], offset: &[f64]) -> anyhow::Result<Pipeline> {
    let mut lut = Pipeline::new(ctx, n_in, n_out)?;
    lut.insert_stage(StageLoc::AtEnd, Stage::matrix(ctx, n_out, n_in, coeffs, Some(offset))?)?;
    Ok(lut)
}

/// Linear CMYK printer whose separation never uses black ink
///
/// The total area coverage is declared at 300%.
pub fn cmyk_printer(ctx: &Context) -> anyhow::Result<LutProfile> {
    let offset = [1.0, AB_OFFSET, AB_OFFSET];
    let coeffs: Vec<f64> = INK_MODEL.iter().flatten().copied().collect();
    let a2b = single_stage(ctx, 4, 3, &coeffs, &offset)?;

    let cmy = Matrix3x3 {
        m: [
            [INK_MODEL[0][0], INK_MODEL[0][1], INK_MODEL[0][2]],
            [INK_MODEL[1][0], INK_MODEL[1][1], INK_MODEL[1][2]],
            [INK_MODEL[2][0], INK_MODEL[2][1], INK_MODEL[2][2]],
        ],
    };
    let inv = cmy
        .inverse()
        .ok_or_else(|| anyhow::anyhow!("ink model is singular"))?;
    let shift = inv.multiply_vec(offset);
    let mut rows = inv.to_row_vec();
    rows.extend([0.0; 3]);
    let b2a = single_stage(ctx, 3, 4, &rows, &[-shift[0], -shift[1], -shift[2], 0.0])?;

    Ok(LutProfile::new(ColorSpace::Cmyk, ColorSpace::Lab, ProfileClass::Output)
        .with_all(a2b, b2a)
        .with_tac(300.0))
}

/// CMYK device link replacing every channel `v` with `1 - v`
pub fn inverting_cmyk_link(ctx: &Context) -> anyhow::Result<DeviceLinkProfile> {
    let mut m = vec![0.0; 16];
    for i in 0..4 {
        m[i * 4 + i] = -1.0;
    }
    let lut = single_stage(ctx, 4, 4, &m, &[1.0; 4])?;
    Ok(DeviceLinkProfile::new(ctx, ColorSpace::Cmyk, ColorSpace::Cmyk, lut)?)
}

/// Gray printer printing L* from `floor` to 100
///
/// Values the printer can't reach clip to no ink.
pub fn gray_printer(ctx: &Context, floor: f64) -> anyhow::Result<LutProfile> {
    let k = (100.0 - floor) / 100.0;
    let f = floor / 100.0;
    let a2b = single_stage(ctx, 1, 3, &[k, 0.0, 0.0], &[f, AB_OFFSET, AB_OFFSET])?;

    let mut b2a = single_stage(ctx, 3, 1, &[1.0 / k, 0.0, 0.0], &[-f / k])?;
    b2a.insert_stage(StageLoc::AtEnd, Stage::clip_negatives(ctx, 1)?)?;

    Ok(LutProfile::new(ColorSpace::Gray, ColorSpace::Lab, ProfileClass::Output)
        .with_all(a2b, b2a)
        .with_version(2.1))
}
