//! Rendering intent composition
//!
//! Profile chains linked end to end: ICC intents against lcms2, black
//! point compensation between printers, black-preserving CMYK links and
//! caller-registered intents.

use std::slice;

use engine_tests::fixtures::{K_DARKNESS, cmyk_printer, gray_printer, inverting_cmyk_link};
use engine_tests::{DeltaEStats, TestPattern, generate_float, random_cmyk};
use lcms2::{Intent, PixelFormat};
use oxcms_engine::link::{IntentsList, build_k_tone_curve, detect_black_point, detect_destination_black_point, link};
use oxcms_engine::profile::{LabIdentityProfile, MatrixShaperProfile, XyzIdentityProfile};
use oxcms_engine::{
    Context, ErrorKind, Lab, Pipeline, Profile, RenderIntent, Stage, StageLoc, TransformFlags, Xyz,
};
use rayon::prelude::*;

const EPSILON: f32 = 2e-3;

fn link_all(ctx: &Context, chain: &[&dyn Profile], intent: RenderIntent, bpc: bool) -> oxcms_engine::Result<Pipeline> {
    let n = chain.len();
    link(
        ctx,
        chain,
        &vec![intent; n],
        &vec![bpc; n],
        &vec![1.0; n],
        TransformFlags::new(),
    )
}

fn eval(lut: &Pipeline, input: &[f32]) -> Vec<f32> {
    let mut out = vec![0f32; lut.output_channels()];
    lut.eval_float(input, &mut out);
    out
}

// ============================================================================
// ICC Intents
// ============================================================================

#[test]
fn test_srgb_to_xyz_matches_lcms2() {
    let ctx = Context::new();
    let srgb = MatrixShaperProfile::srgb(&ctx).unwrap();
    let chain: [&dyn Profile; 2] = [&srgb, &XyzIdentityProfile];
    let ours = link_all(&ctx, &chain, RenderIntent::RelativeColorimetric, false).unwrap();

    let theirs = lcms2::Transform::<[f32; 3], [f32; 3]>::new(
        &lcms2::Profile::new_srgb(),
        PixelFormat::RGB_FLT,
        &lcms2::Profile::new_xyz(),
        PixelFormat::XYZ_FLT,
        Intent::RelativeColorimetric,
    )
    .expect("lcms2 transform");

    let samples = generate_float(TestPattern::Grid(9), 3);
    let mut worst = (0.0f32, [0f32; 3]);
    for rgb in samples.chunks_exact(3) {
        let input = [rgb[0], rgb[1], rgb[2]];
        let mut expected = [0f32; 3];
        theirs.transform_pixels(slice::from_ref(&input), slice::from_mut(&mut expected));

        let actual = Xyz::from_normalized(&eval(&ours, rgb)).to_array();
        for c in 0..3 {
            let err = (actual[c] as f32 - expected[c]).abs();
            if err > worst.0 {
                worst = (err, input);
            }
        }
    }
    assert!(worst.0 < EPSILON, "max XYZ error {} at RGB {:?}", worst.0, worst.1);
}

#[test]
fn test_srgb_round_trip_through_lab() {
    let ctx = Context::new();
    let srgb = MatrixShaperProfile::srgb(&ctx).unwrap();
    let lab = LabIdentityProfile::v4();
    let chain: [&dyn Profile; 4] = [&srgb, &lab, &lab, &srgb];
    let lut = link_all(&ctx, &chain, RenderIntent::Perceptual, false).unwrap();

    let samples = generate_float(TestPattern::Random { seed: 5, count: 200 }, 3);
    let mut out = vec![0f32; samples.len()];
    lut.eval_float_batch(&samples, &mut out).unwrap();
    let err = engine_tests::max_float_difference(&samples, &out);
    assert!(err < EPSILON, "round trip error {err}");
}

#[test]
fn test_colorspace_mismatch_reported() {
    let ctx = Context::new();
    let gray = gray_printer(&ctx, 10.0).unwrap();
    let printer = cmyk_printer(&ctx).unwrap();
    let link = inverting_cmyk_link(&ctx).unwrap();
    let chain: [&dyn Profile; 3] = [&gray, &printer, &link];
    // Gray printer lands in Lab, the CMYK printer leaves CMYK, then the link reads CMYK
    assert!(link_all(&ctx, &chain, RenderIntent::Perceptual, false).is_ok());

    let chain: [&dyn Profile; 2] = [&link, &gray];
    let err = link_all(&ctx, &chain, RenderIntent::Perceptual, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ColorspaceCheck, "{err}");
}

// ============================================================================
// Black Point Compensation
// ============================================================================

#[test]
fn test_black_points_of_gray_printers() {
    let ctx = Context::new();
    let shallow = gray_printer(&ctx, 20.0).unwrap();
    let deep = gray_printer(&ctx, 10.0).unwrap();

    let src = Lab::from_xyz(detect_black_point(&ctx, &shallow, RenderIntent::RelativeColorimetric));
    let dst = Lab::from_xyz(detect_destination_black_point(&ctx, &deep, RenderIntent::RelativeColorimetric));
    assert!((src.l - 20.0).abs() < 0.1, "source black {src:?}");
    assert!((dst.l - 10.0).abs() < 0.1, "destination black {dst:?}");
}

#[test]
fn test_bpc_maps_black_to_black() {
    let ctx = Context::new();
    let shallow = gray_printer(&ctx, 20.0).unwrap();
    let deep = gray_printer(&ctx, 10.0).unwrap();
    let chain: [&dyn Profile; 2] = [&shallow, &deep];

    let plain = link_all(&ctx, &chain, RenderIntent::RelativeColorimetric, false).unwrap();
    let compensated = link_all(&ctx, &chain, RenderIntent::RelativeColorimetric, true).unwrap();

    // Without BPC the shallow black lands a ninth of the way up the deep printer
    let black = eval(&plain, &[0.0])[0];
    assert!((black - 1.0 / 9.0).abs() < EPSILON, "plain black {black}");

    let black = eval(&compensated, &[0.0])[0];
    assert!(black.abs() < EPSILON, "compensated black {black}");
    let white = eval(&compensated, &[1.0])[0];
    assert!((white - 1.0).abs() < EPSILON, "compensated white {white}");

    let mut last = -1.0;
    for g in generate_float(TestPattern::Ramp(33), 1) {
        let v = eval(&compensated, &[g])[0];
        assert!(v >= last, "BPC ramp not monotonic at {g}");
        last = v;
    }
}

#[test]
fn test_bpc_flag_on_transform_flags() {
    let ctx = Context::new();
    let shallow = gray_printer(&ctx, 20.0).unwrap();
    let deep = gray_printer(&ctx, 10.0).unwrap();
    let chain: [&dyn Profile; 2] = [&shallow, &deep];
    let lut = link(
        &ctx,
        &chain,
        &[RenderIntent::RelativeColorimetric; 2],
        &[false; 2],
        &[1.0; 2],
        TransformFlags::new().with_bpc(),
    )
    .unwrap();
    assert!(eval(&lut, &[0.0])[0].abs() < EPSILON);
}

#[test]
fn test_absolute_ignores_bpc() {
    let ctx = Context::new();
    let shallow = gray_printer(&ctx, 20.0).unwrap();
    let deep = gray_printer(&ctx, 10.0).unwrap();
    let chain: [&dyn Profile; 2] = [&shallow, &deep];
    let lut = link_all(&ctx, &chain, RenderIntent::AbsoluteColorimetric, true).unwrap();
    let black = eval(&lut, &[0.0])[0];
    assert!((black - 1.0 / 9.0).abs() < EPSILON, "absolute black {black}");
}

// ============================================================================
// Black Preservation
// ============================================================================

fn cmyk_chain(ctx: &Context, intent: RenderIntent) -> Pipeline {
    let printer = cmyk_printer(ctx).unwrap();
    let chain: [&dyn Profile; 2] = [&printer, &printer];
    link_all(ctx, &chain, intent, false).unwrap()
}

#[test]
fn test_k_tone_between_printers_is_identity() {
    let ctx = Context::new();
    let printer = cmyk_printer(&ctx).unwrap();
    let chain: [&dyn Profile; 2] = [&printer, &printer];
    let curve = build_k_tone_curve(
        &ctx,
        256,
        &chain,
        &[RenderIntent::RelativeColorimetric; 2],
        &[false; 2],
        &[1.0; 2],
        TransformFlags::new(),
    )
    .unwrap();
    for k in generate_float(TestPattern::Ramp(17), 1) {
        let out = curve.eval_float(k);
        assert!((out - k).abs() < 5e-3, "K {k} maps to {out}");
    }
}

#[test]
fn test_black_only_input_stays_black() {
    let ctx = Context::new();
    let colorimetric = cmyk_chain(&ctx, RenderIntent::RelativeColorimetric);
    let k_only = cmyk_chain(&ctx, RenderIntent::PreserveKOnlyRelativeColorimetric);
    let k_plane = cmyk_chain(&ctx, RenderIntent::PreserveKPlaneRelativeColorimetric);

    for k in [0.25f32, 0.5, 0.75, 1.0] {
        let input = [0.0, 0.0, 0.0, k];

        // The printer separates without black, so plain colorimetry rebuilds K from CMY
        let out = eval(&colorimetric, &input);
        assert!(out[3] < EPSILON, "colorimetric K {}", out[3]);

        for (name, lut) in [("K-only", &k_only), ("K-plane", &k_plane)] {
            let out = eval(lut, &input);
            assert!(out[..3].iter().all(|v| v.abs() < 5e-3), "{name} CMY {out:?} for K {k}");
            assert!((out[3] - k).abs() < 5e-3, "{name} K {} for {k}", out[3]);
        }
    }
}

#[test]
fn test_k_plane_keeps_black_and_color() {
    let ctx = Context::new();
    let printer = cmyk_printer(&ctx).unwrap();
    let lab = LabIdentityProfile::v4();
    let proof: [&dyn Profile; 2] = [&printer, &lab];
    let to_lab = link_all(&ctx, &proof, RenderIntent::RelativeColorimetric, false).unwrap();
    let k_plane = cmyk_chain(&ctx, RenderIntent::PreserveKPlaneRelativeColorimetric);

    // Inks well inside the gamut and the 300% limit
    let samples = random_cmyk(9, 100, 1.2);
    let mut pairs = Vec::new();
    for px in samples.chunks_exact(4) {
        let px: Vec<f32> = px.iter().map(|v| v * 0.6 + 0.1).collect();
        let out = eval(&k_plane, &px);
        assert!((out[3] - px[3]).abs() < 5e-3, "K moved from {} to {}", px[3], out[3]);

        let before = Lab::from_normalized(&eval(&to_lab, &px));
        let after = Lab::from_normalized(&eval(&to_lab, &out));
        pairs.push((before, after));
    }
    let stats = DeltaEStats::from_pairs(pairs);
    assert!(stats.max < 2.0, "K-plane colorimetric error {stats:?}");
}

#[test]
fn test_k_plane_tolerance_comes_from_context() {
    let input = [0.3, 0.3, 0.3, 0.05];

    let strict = cmyk_chain(&Context::new(), RenderIntent::PreserveKPlaneRelativeColorimetric);
    let out = eval(&strict, &input);
    assert!((out[3] - 0.05).abs() < 5e-3, "strict K {}", out[3]);

    // A 10% tolerance accepts the black-free colorimetric separation
    let loose = Context::new().with_k_tolerance(0.1);
    let lut = cmyk_chain(&loose, RenderIntent::PreserveKPlaneRelativeColorimetric);
    let out = eval(&lut, &input);
    assert!(out[3] < 1e-3, "loose K {}", out[3]);
}

#[test]
fn test_full_black_darkness() {
    let ctx = Context::new();
    let printer = cmyk_printer(&ctx).unwrap();
    let lab = LabIdentityProfile::v4();
    let proof: [&dyn Profile; 2] = [&printer, &lab];
    let lut = link_all(&ctx, &proof, RenderIntent::RelativeColorimetric, false).unwrap();
    let l = Lab::from_normalized(&eval(&lut, &[0.0, 0.0, 0.0, 1.0])).l;
    assert!((1.0 - l / 100.0 - K_DARKNESS).abs() < 1e-3, "L* of full K = {l}");
}

#[test]
fn test_black_preserving_link_is_shareable() {
    let ctx = Context::new();
    let lut = cmyk_chain(&ctx, RenderIntent::PreserveKPlaneRelativeColorimetric);

    let samples = random_cmyk(21, 4096, 2.5);
    let mut serial = vec![0f32; samples.len()];
    lut.eval_float_batch(&samples, &mut serial).unwrap();

    let mut parallel = vec![0f32; samples.len()];
    parallel
        .par_chunks_mut(4 * 64)
        .zip(samples.par_chunks(4 * 64))
        .try_for_each(|(dst, src)| lut.eval_float_batch(src, dst))
        .unwrap();
    assert_eq!(serial, parallel);
}

// ============================================================================
// Custom Intents
// ============================================================================

/// Intent that ignores the profiles and swaps red and blue
fn swap_red_blue(
    ctx: &Context,
    _profiles: &[&dyn Profile],
    _intents: &[RenderIntent],
    _bpc: &[bool],
    _adaptation: &[f64],
    _flags: TransformFlags,
) -> oxcms_engine::Result<Pipeline> {
    let mut lut = Pipeline::new(ctx, 3, 3)?;
    let m = [0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0];
    lut.insert_stage(StageLoc::AtEnd, Stage::matrix(ctx, 3, 3, &m, None)?)?;
    Ok(lut)
}

#[test]
fn test_registered_intent_links() {
    let mut intents = IntentsList::new();
    intents.register(0x1000, "Swap red and blue", swap_red_blue);
    let ctx = Context::new().with_intents(intents);

    let srgb = MatrixShaperProfile::srgb(&ctx).unwrap();
    let chain: [&dyn Profile; 2] = [&srgb, &srgb];
    let lut = link_all(&ctx, &chain, RenderIntent::Custom(0x1000), false).unwrap();
    let out = eval(&lut, &[0.1, 0.2, 0.9]);
    assert_eq!(out, vec![0.9, 0.2, 0.1]);

    // Built-in intents still work on the same context
    let lut = link_all(&ctx, &chain, RenderIntent::Perceptual, false).unwrap();
    let out = eval(&lut, &[0.1, 0.2, 0.9]);
    assert!((out[0] - 0.1).abs() < EPSILON, "out = {out:?}");
}
