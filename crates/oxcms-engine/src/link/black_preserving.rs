//! Black-preserving intents for CMYK to CMYK chains
//!
//! Both intents sample the whole chain into one 4→4 CLUT. K-only keeps
//! inputs made of black ink alone as black ink alone, mapped through a K
//! tone curve. K-plane also keeps the black channel of every other color,
//! solving for the CMY that reproduce the colorimetric Lab under that K.

use crate::color::{Lab, delta_e};
use crate::context::{Context, RenderIntent, TransformFlags};
use crate::curve::ToneCurve;
use crate::error::{ErrorKind, Result};
use crate::math::fixed::{float_to_word, quick_saturate_word, word_to_float};
use crate::pipeline::{Pipeline, SampleMode, Stage, StageLoc};
use crate::profile::{ColorSpace, LabIdentityProfile, Profile, ProfileClass};

use super::default_intents::default_icc_intents;
use super::{check_chain, link};

/// Samples in the K tone curve
const K_TONE_POINTS: usize = 4096;

fn unit_inks(cmyk: &[u16]) -> [f32; 4] {
    let mut out = [0f32; 4];
    for (dst, &v) in out.iter_mut().zip(cmyk) {
        *dst = word_to_float(v);
    }
    out
}

fn is_cmyk_link(profile: &dyn Profile) -> bool {
    profile.color_space() == ColorSpace::Cmyk && profile.profile_class() == ProfileClass::DeviceLink
}

/// Whether the chain goes CMYK in and CMYK or printer out
fn is_preservable(profiles: &[&dyn Profile]) -> bool {
    let (first, last) = (profiles[0], profiles[profiles.len() - 1]);
    first.color_space() == ColorSpace::Cmyk
        && (last.color_space() == ColorSpace::Cmyk || last.profile_class() == ProfileClass::Output)
}

/// Profiles taking part in black preservation
///
/// Trailing CMYK device links are left out and appended afterwards, but at
/// least two profiles are kept.
fn preserved_count(profiles: &[&dyn Profile]) -> usize {
    let mut last = profiles.len() - 1;
    while last > 1 && is_cmyk_link(profiles[last]) {
        last -= 1;
    }
    last + 1
}

/// Wrap the sampled CLUT and append the trimmed device links
fn finish(
    ctx: &Context,
    clut: Stage,
    profiles: &[&dyn Profile],
    intents: &[RenderIntent],
    keep: usize,
) -> Result<Pipeline> {
    let mut result = Pipeline::new(ctx, 4, 4)?;
    result.insert_stage(StageLoc::AtBegin, clut)?;
    for (profile, &intent) in profiles.iter().zip(intents).skip(keep) {
        result.cat(profile.read_devicelink_lut(ctx, intent)?)?;
    }
    Ok(result)
}

/// Preserve black-only inputs as black-only outputs
///
/// Any input with C = M = Y = 0 leaves with C = M = Y = 0 and K mapped by
/// the K tone curve; every other color follows the colorimetric chain.
/// Chains that don't start in CMYK, or don't end in CMYK or a printer,
/// fall back to the ICC intents.
pub fn black_preserving_k_only_intents(
    ctx: &Context,
    profiles: &[&dyn Profile],
    intents: &[RenderIntent],
    bpc: &[bool],
    adaptation: &[f64],
    flags: TransformFlags,
) -> Result<Pipeline> {
    check_chain(ctx, profiles, intents, bpc, adaptation)?;
    let icc_intents: Vec<RenderIntent> = intents.iter().map(RenderIntent::base_icc_intent).collect();

    if !is_preservable(profiles) {
        return default_icc_intents(ctx, profiles, &icc_intents, bpc, adaptation, flags);
    }

    let keep = preserved_count(profiles);
    let (p, i, b, a) = (
        &profiles[..keep],
        &icc_intents[..keep],
        &bpc[..keep],
        &adaptation[..keep],
    );
    let cmyk2cmyk = default_icc_intents(ctx, p, i, b, a, flags)?;
    let k_tone = build_k_tone_curve(ctx, K_TONE_POINTS, p, i, b, a, flags)?;

    let mut clut = Stage::clut_16(ctx, flags.grid_points_for(ColorSpace::Cmyk), 4, 4, None)?;
    clut.sample_clut_16(
        ctx,
        |input, output| {
            if input[..3] == [0, 0, 0] {
                output[..3].fill(0);
                output[3] = k_tone.eval_16(input[3]);
            } else {
                cmyk2cmyk.eval_16(input, output);
            }
            Ok(())
        },
        SampleMode::Write,
    )?;

    finish(ctx, clut, profiles, &icc_intents, keep)
}

/// Preserve the K plane of every color
///
/// Black-only inputs behave as in [`black_preserving_k_only_intents`].
/// Other colors take the colorimetric result, then swap its K for the K
/// tone curve output and search the last profile for the CMY that keep the
/// colorimetric Lab. The CMY are scaled down when the ink sum exceeds the
/// last profile's total area coverage.
pub fn black_preserving_k_plane_intents(
    ctx: &Context,
    profiles: &[&dyn Profile],
    intents: &[RenderIntent],
    bpc: &[bool],
    adaptation: &[f64],
    flags: TransformFlags,
) -> Result<Pipeline> {
    check_chain(ctx, profiles, intents, bpc, adaptation)?;
    let icc_intents: Vec<RenderIntent> = intents.iter().map(RenderIntent::base_icc_intent).collect();

    if !is_preservable(profiles) {
        return default_icc_intents(ctx, profiles, &icc_intents, bpc, adaptation, flags);
    }

    let keep = preserved_count(profiles);
    let last = profiles[keep - 1];

    let max_tac = super::detect_tac(ctx, last) / 100.0;
    if max_tac <= 0.0 {
        return Err(ctx.report(
            ErrorKind::NotSuitable,
            "Couldn't find the total area coverage of the last profile",
        ));
    }

    let lab = LabIdentityProfile::v4();
    let proof: [&dyn Profile; 2] = [last, &lab];
    let cmyk2lab = link(
        ctx,
        &proof,
        &[RenderIntent::RelativeColorimetric; 2],
        &[false; 2],
        &[1.0; 2],
        TransformFlags::new(),
    )?;

    let (p, i, b, a) = (
        &profiles[..keep],
        &icc_intents[..keep],
        &bpc[..keep],
        &adaptation[..keep],
    );
    let cmyk2cmyk = default_icc_intents(ctx, p, i, b, a, flags)?;
    let k_tone = build_k_tone_curve(ctx, K_TONE_POINTS, p, i, b, a, flags)?;
    let k_tolerance = ctx.k_tolerance() as f32;

    let lab_of = |cmyk: &[u16]| {
        let inks = unit_inks(cmyk);
        let mut out = [0f32; 3];
        cmyk2lab.eval_float(&inks, &mut out);
        Lab::from_normalized(&out)
    };

    let mut max_error = 0.0f64;
    let mut clut = Stage::clut_16(ctx, flags.grid_points_for(ColorSpace::Cmyk), 4, 4, None)?;
    clut.sample_clut_16(
        ctx,
        |input, output| {
            let inf = unit_inks(input);
            let k = k_tone.eval_float(inf[3]);

            if input[..3] == [0, 0, 0] {
                output[..3].fill(0);
                output[3] = float_to_word(k);
                return Ok(());
            }

            let mut outf = [0f32; 4];
            cmyk2cmyk.eval_float(&inf, &mut outf);
            for (dst, &v) in output.iter_mut().zip(&outf) {
                *dst = float_to_word(v);
            }

            if (outf[3] - k).abs() < k_tolerance {
                return Ok(());
            }

            let colorimetric = lab_of(&*output);

            let mut lab_k = [0f32; 4];
            cmyk2lab.eval_float(&outf, &mut lab_k[..3]);
            lab_k[3] = k;

            let hint = outf;
            if cmyk2lab.eval_reverse_float(&lab_k, &mut outf, Some(&hint)).is_err() {
                return Ok(());
            }
            outf[3] = k;

            let sum_cmy = (outf[0] + outf[1] + outf[2]) as f64;
            let sum_cmyk = sum_cmy + outf[3] as f64;
            let ratio = if sum_cmyk > max_tac {
                (1.0 - (sum_cmyk - max_tac) / sum_cmy).max(0.0)
            } else {
                1.0
            };

            for c in 0..3 {
                output[c] = quick_saturate_word(outf[c] as f64 * ratio * 65535.0);
            }
            output[3] = float_to_word(outf[3]);

            let error = delta_e(colorimetric, lab_of(&*output));
            max_error = max_error.max(error);
            Ok(())
        },
        SampleMode::Write,
    )?;
    tracing::debug!(max_error, "K plane preservation");

    finish(ctx, clut, profiles, &icc_intents, keep)
}

/// Darkness `1 - L*/100` produced by K ink alone through a chain to Lab
///
/// The chain is closed with the v4 Lab identity under relative
/// colorimetric, and sampled at `n_points` evenly spaced K values with
/// C = M = Y = 0.
pub fn compute_k_to_lstar(
    ctx: &Context,
    n_points: usize,
    profiles: &[&dyn Profile],
    intents: &[RenderIntent],
    bpc: &[bool],
    adaptation: &[f64],
    flags: TransformFlags,
) -> Result<ToneCurve> {
    if profiles.len() >= super::MAX_PROFILES {
        return Err(ctx.report(ErrorKind::Range, "Too many profiles to close with a Lab identity"));
    }
    if n_points < 2 {
        return Err(ctx.report(ErrorKind::Range, format!("Couldn't sample K at {n_points} points")));
    }

    let lab = LabIdentityProfile::v4();
    let mut chain: Vec<&dyn Profile> = Vec::with_capacity(profiles.len() + 1);
    for &p in profiles {
        chain.push(p);
    }
    chain.push(&lab);

    let mut chain_intents = intents.to_vec();
    chain_intents.push(RenderIntent::RelativeColorimetric);
    let mut chain_bpc = bpc.to_vec();
    chain_bpc.push(false);
    let mut chain_adaptation = adaptation.to_vec();
    chain_adaptation.push(1.0);

    let to_lab = link(ctx, &chain, &chain_intents, &chain_bpc, &chain_adaptation, flags)?;
    if to_lab.input_channels() != 4 {
        return Err(ctx.report(
            ErrorKind::ColorspaceCheck,
            format!("K to L* needs CMYK input, the chain takes {} channels", to_lab.input_channels()),
        ));
    }

    let last = (n_points - 1) as f32;
    let mut out = [0f32; 3];
    let samples: Vec<f32> = (0..n_points)
        .map(|i| {
            to_lab.eval_float(&[0.0, 0.0, 0.0, i as f32 / last], &mut out);
            let lab = Lab::from_normalized(&out);
            (1.0 - lab.l / 100.0) as f32
        })
        .collect();

    ToneCurve::build_tabulated_float(ctx, &samples)
}

/// Curve carrying the input K to the output K that prints the same L*
///
/// The chain must start in CMYK and end in a CMYK printer profile. The
/// K to L* curve of every profile but the last is joined with the inverse
/// of the last profile's own K to L* curve.
pub fn build_k_tone_curve(
    ctx: &Context,
    n_points: usize,
    profiles: &[&dyn Profile],
    intents: &[RenderIntent],
    bpc: &[bool],
    adaptation: &[f64],
    flags: TransformFlags,
) -> Result<ToneCurve> {
    check_chain(ctx, profiles, intents, bpc, adaptation)?;
    let n = profiles.len();
    let (first, last) = (profiles[0], profiles[n - 1]);

    if n < 2 || first.color_space() != ColorSpace::Cmyk || last.color_space() != ColorSpace::Cmyk {
        return Err(ctx.report(
            ErrorKind::NotSuitable,
            "The K tone curve needs a chain of at least two CMYK profiles",
        ));
    }
    if last.profile_class() != ProfileClass::Output {
        return Err(ctx.report(
            ErrorKind::NotSuitable,
            format!("The K tone curve ends in a printer profile, not {:?}", last.profile_class()),
        ));
    }

    let k_in = compute_k_to_lstar(
        ctx,
        n_points,
        &profiles[..n - 1],
        &intents[..n - 1],
        &bpc[..n - 1],
        &adaptation[..n - 1],
        flags,
    )?;
    let k_out = compute_k_to_lstar(
        ctx,
        n_points,
        &profiles[n - 1..],
        &intents[n - 1..],
        &bpc[n - 1..],
        &adaptation[n - 1..],
        flags,
    )?;

    let k_tone = k_in.join(ctx, &k_out, n_points)?;
    if !k_tone.is_monotonic() {
        return Err(ctx.report(ErrorKind::NotSuitable, "The K tone curve is not monotonic"));
    }
    Ok(k_tone)
}
