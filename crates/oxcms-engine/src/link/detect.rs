//! Black point and total area coverage detection
//!
//! Black points are estimated by running device black, or a Lab ramp,
//! through transforms built from the profile itself. Failures never abort
//! the caller: an undetectable black point is zero.

use crate::color::{Lab, PERCEPTUAL_BLACK, Xyz};
use crate::context::{Context, RenderIntent, TransformFlags};
use crate::error::Result;
use crate::math::fixed::word_to_float;
use crate::pipeline::{Pipeline, slice_space_16};
use crate::profile::{ColorSpace, Direction, LabIdentityProfile, Profile, ProfileClass};

use super::link;

const ZERO: Xyz = Xyz::new(0.0, 0.0, 0.0);

/// Lab grid swept by [`detect_tac`]: few L* steps, many a*/b* steps
const TAC_GRID: [u32; 3] = [6, 74, 74];

fn is_detectable(profile: &dyn Profile, intent: RenderIntent) -> bool {
    let class = profile.profile_class();
    if matches!(
        class,
        ProfileClass::DeviceLink | ProfileClass::Abstract | ProfileClass::NamedColor
    ) {
        return false;
    }
    matches!(
        intent,
        RenderIntent::Perceptual | RenderIntent::RelativeColorimetric | RenderIntent::Saturation
    )
}

/// v4 perceptual and saturation tables have a fixed black
fn v4_black(ctx: &Context, profile: &dyn Profile, intent: RenderIntent) -> Option<Xyz> {
    if profile.version() < 4.0
        || !matches!(intent, RenderIntent::Perceptual | RenderIntent::Saturation)
    {
        return None;
    }
    if profile.is_matrix_shaper() {
        // Matrix shapers share one table for every intent
        return Some(black_as_darker_colorant(
            ctx,
            profile,
            RenderIntent::RelativeColorimetric,
        ));
    }
    Some(PERCEPTUAL_BLACK)
}

/// Darkest device code of a color space, in 16 bits
fn device_black(space: ColorSpace) -> Option<&'static [u16]> {
    match space {
        ColorSpace::Gray => Some(&[0]),
        ColorSpace::Rgb => Some(&[0, 0, 0]),
        ColorSpace::Lab => Some(&[0, 0x8080, 0x8080]),
        ColorSpace::Cmyk => Some(&[0xFFFF; 4]),
        ColorSpace::Cmy => Some(&[0xFFFF; 3]),
        _ => None,
    }
}

/// Neutral, L* ≤ 50 version of a Lab color, as XYZ
fn clip_to_neutral(lab: Lab) -> Xyz {
    Lab::new(lab.l.min(50.0), 0.0, 0.0).to_xyz()
}

/// Neutral version of a darkest colorant; L* outside `0..=50` is no black
fn darker_colorant_to_neutral(lab: Lab) -> Xyz {
    let l = if (0.0..=50.0).contains(&lab.l) { lab.l } else { 0.0 };
    Lab::new(l, 0.0, 0.0).to_xyz()
}

fn black_as_darker_colorant(ctx: &Context, profile: &dyn Profile, intent: RenderIntent) -> Xyz {
    if !profile.is_intent_supported(intent, Direction::Input) {
        return ZERO;
    }
    let Some(black) = device_black(profile.color_space()) else {
        return ZERO;
    };

    // A v2 Lab target keeps this from recursing into v4 black detection
    let lab = LabIdentityProfile::v2();
    let chain: [&dyn Profile; 2] = [profile, &lab];
    let lut = match link(ctx, &chain, &[intent; 2], &[false; 2], &[-1.0; 2], TransformFlags::new()) {
        Ok(lut) => lut,
        Err(err) => {
            tracing::debug!(%err, "darker colorant transform failed, black point is zero");
            return ZERO;
        }
    };

    let input: Vec<f32> = black.iter().map(|&w| word_to_float(w)).collect();
    let mut out = [0f32; 3];
    lut.eval_float(&input, &mut out);
    darker_colorant_to_neutral(Lab::from_normalized(&out))
}

/// Lab → profile → profile → Lab, for seeing what a profile does to a color
fn round_trip(ctx: &Context, profile: &dyn Profile, intent: RenderIntent) -> Result<Pipeline> {
    let lab = LabIdentityProfile::v4();
    let chain: [&dyn Profile; 4] = [&lab, profile, profile, &lab];
    link(ctx, &chain, &[intent; 4], &[false; 4], &[1.0; 4], TransformFlags::new())
}

fn eval_lab(lut: &Pipeline, lab: Lab) -> Lab {
    let mut out = [0f32; 3];
    lut.eval_float(&lab.to_normalized(), &mut out);
    Lab::from_normalized(&out)
}

fn black_using_perceptual_black(ctx: &Context, profile: &dyn Profile) -> Xyz {
    if !profile.is_intent_supported(RenderIntent::Perceptual, Direction::Input) {
        return ZERO;
    }
    match round_trip(ctx, profile, RenderIntent::Perceptual) {
        Ok(lut) => clip_to_neutral(eval_lab(&lut, Lab::new(0.0, 0.0, 0.0))),
        Err(err) => {
            tracing::debug!(%err, "perceptual round trip failed, black point is zero");
            ZERO
        }
    }
}

/// Black point of `profile` used as the source of a link
///
/// Device links, abstract and named color profiles, and intents other
/// than perceptual, relative colorimetric and saturation give zero.
pub fn detect_black_point(ctx: &Context, profile: &dyn Profile, intent: RenderIntent) -> Xyz {
    if !is_detectable(profile, intent) {
        return ZERO;
    }
    if let Some(black) = v4_black(ctx, profile, intent) {
        return black;
    }

    // v2 CMYK printers: discount ink limiting
    if intent == RenderIntent::RelativeColorimetric
        && profile.profile_class() == ProfileClass::Output
        && profile.color_space() == ColorSpace::Cmyk
    {
        return black_using_perceptual_black(ctx, profile);
    }

    black_as_darker_colorant(ctx, profile, intent)
}

/// Root of the least squares quadratic through the shadow points
///
/// The result is an L* clamped to `[0, 50]`; 0 when there is no usable fit.
fn root_of_least_squares_quadratic(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 4 {
        return 0.0;
    }

    let n = x.len() as f64;
    let (mut sx, mut sx2, mut sx3, mut sx4) = (0.0, 0.0, 0.0, 0.0);
    let (mut sy, mut syx, mut syx2) = (0.0, 0.0, 0.0);
    for (&xn, &yn) in x.iter().zip(y) {
        let xn2 = xn * xn;
        sx += xn;
        sx2 += xn2;
        sx3 += xn2 * xn;
        sx4 += xn2 * xn2;
        sy += yn;
        syx += yn * xn;
        syx2 += yn * xn2;
    }

    let eq = crate::math::Matrix3x3::new([[n, sx, sx2], [sx, sx2, sx3], [sx2, sx3, sx4]]);
    let Some([c, b, a]) = eq.solve([sy, syx, syx2]) else {
        return 0.0;
    };

    if a.abs() < 1e-10 {
        if b.abs() < 1e-10 {
            return 0.0;
        }
        return (-c / b).clamp(0.0, 50.0);
    }

    let d = b * b - 4.0 * a * c;
    if d <= 0.0 {
        return 0.0;
    }
    ((-b + d.sqrt()) / (2.0 * a)).clamp(0.0, 50.0)
}

/// Black point of `profile` used as the destination of a link
///
/// Table based Gray, RGB and CMYK profiles get the round trip estimate:
/// an L* ramp is sent through the profile and back, and the black point is
/// where a quadratic fitted to the shadow end of the returned ramp meets
/// the axis. Everything else falls back to [`detect_black_point`].
pub fn detect_destination_black_point(ctx: &Context, profile: &dyn Profile, intent: RenderIntent) -> Xyz {
    if !is_detectable(profile, intent) {
        return ZERO;
    }
    if let Some(black) = v4_black(ctx, profile, intent) {
        return black;
    }

    let space = profile.color_space();
    if !profile.is_clut(intent, Direction::Output)
        || !matches!(space, ColorSpace::Gray | ColorSpace::Rgb | ColorSpace::Cmyk)
    {
        return detect_black_point(ctx, profile, intent);
    }

    let initial = if intent == RenderIntent::RelativeColorimetric {
        Lab::from_xyz(detect_black_point(ctx, profile, intent))
    } else {
        Lab::new(0.0, 0.0, 0.0)
    };

    let lut = match round_trip(ctx, profile, intent) {
        Ok(lut) => lut,
        Err(err) => {
            tracing::debug!(%err, "destination round trip failed, black point is zero");
            return ZERO;
        }
    };

    let a = initial.a.clamp(-50.0, 50.0);
    let b = initial.b.clamp(-50.0, 50.0);
    let mut in_ramp = [0f64; 256];
    let mut out_ramp = [0f64; 256];
    for l in 0..256 {
        in_ramp[l] = l as f64 * 100.0 / 255.0;
        out_ramp[l] = eval_lab(&lut, Lab::new(in_ramp[l], a, b)).l;
    }

    for l in (1..255).rev() {
        out_ramp[l] = out_ramp[l].min(out_ramp[l + 1]);
    }

    if !(out_ramp[0] < out_ramp[255]) {
        return ZERO;
    }

    let (min_l, max_l) = (out_ramp[0], out_ramp[255]);

    if intent == RenderIntent::RelativeColorimetric {
        let straight = in_ramp
            .iter()
            .zip(&out_ramp)
            .all(|(&i, &o)| i <= min_l + 0.2 * (max_l - min_l) || (i - o).abs() < 4.0);
        if straight {
            return initial.to_xyz();
        }
    }

    let (lo, hi) = if intent == RenderIntent::RelativeColorimetric {
        (0.1, 0.5)
    } else {
        (0.03, 0.25)
    };

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (&i, &o) in in_ramp.iter().zip(&out_ramp) {
        let ff = (o - min_l) / (max_l - min_l);
        if ff >= lo && ff < hi {
            x.push(i);
            y.push(ff);
        }
    }

    if x.len() < 3 {
        return ZERO;
    }

    let l = root_of_least_squares_quadratic(&x, &y).max(0.0);
    tracing::trace!(l, points = x.len(), "destination black point from shadow fit");
    Lab::new(l, initial.a, initial.b).to_xyz()
}

/// Highest total ink in percent an output profile lays down
///
/// Returns the profile's own hint when it has one, 0 for profiles that
/// are not output profiles or can't be linked.
pub fn detect_tac(ctx: &Context, profile: &dyn Profile) -> f64 {
    if let Some(tac) = profile.tac_hint() {
        return tac;
    }
    if profile.profile_class() != ProfileClass::Output {
        return 0.0;
    }

    let lab = LabIdentityProfile::v4();
    let chain: [&dyn Profile; 2] = [&lab, profile];
    let lut = match link(
        ctx,
        &chain,
        &[RenderIntent::Perceptual; 2],
        &[false; 2],
        &[1.0; 2],
        TransformFlags::new(),
    ) {
        Ok(lut) => lut,
        Err(err) => {
            tracing::debug!(%err, "TAC transform failed");
            return 0.0;
        }
    };

    let n_out = lut.output_channels();
    let mut max_tac = 0.0f64;
    let mut input = [0f32; 3];
    let mut inks = vec![0f32; n_out];
    let swept = slice_space_16(ctx, &TAC_GRID, |lab| {
        for (dst, &w) in input.iter_mut().zip(lab) {
            *dst = word_to_float(w);
        }
        lut.eval_float(&input, &mut inks);
        let sum: f64 = inks.iter().map(|&v| v as f64 * 100.0).sum();
        max_tac = max_tac.max(sum);
        Ok(())
    });
    if swept.is_err() {
        return 0.0;
    }
    tracing::debug!(max_tac, "total area coverage");
    max_tac
}
