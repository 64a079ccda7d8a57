//! Pipeline construction and evaluation
//!
//! Channel bookkeeping, CLUT sampling, batch entry points and concurrent
//! evaluation of one shared pipeline.

use std::sync::Arc;

use engine_tests::{TestPattern, generate_16, generate_float, max_code_difference, max_float_difference};
use oxcms_engine::link::link;
use oxcms_engine::math::quantize_val;
use oxcms_engine::pipeline::SampleMode;
use oxcms_engine::profile::{LabIdentityProfile, MatrixShaperProfile};
use oxcms_engine::{
    Context, Error, ErrorKind, NamedColorList, Pipeline, Profile, RenderIntent, Stage, StageLoc, ToneCurve,
    TransformFlags,
};
use rayon::prelude::*;

const EPSILON: f32 = 1e-5;

fn srgb_to_lab(ctx: &Context) -> Pipeline {
    let srgb = MatrixShaperProfile::srgb(ctx).expect("sRGB profile");
    let lab = LabIdentityProfile::v4();
    let chain: [&dyn Profile; 2] = [&srgb, &lab];
    link(
        ctx,
        &chain,
        &[RenderIntent::Perceptual; 2],
        &[false; 2],
        &[1.0; 2],
        TransformFlags::new(),
    )
    .expect("sRGB to Lab link")
}

/// 3→3 16-bit CLUT holding a smooth non-linear function
fn sampled_clut(ctx: &Context, grid: u32) -> Pipeline {
    let mut stage = Stage::clut_16(ctx, grid, 3, 3, None).expect("CLUT stage");
    stage
        .sample_clut_16(
            ctx,
            |input, output| {
                output[0] = ((input[0] as u32 * input[1] as u32) >> 16) as u16;
                output[1] = input[2] / 2 + input[1] / 4;
                output[2] = 65535 - input[0];
                Ok(())
            },
            SampleMode::Write,
        )
        .expect("sampling");
    let mut lut = Pipeline::new(ctx, 3, 3).expect("pipeline");
    lut.insert_stage(StageLoc::AtEnd, stage).expect("insert");
    lut
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_mismatched_stage_leaves_pipeline_unchanged() {
    let ctx = Context::new();
    let mut lut = Pipeline::new(&ctx, 3, 3).unwrap();
    lut.insert_stage(StageLoc::AtEnd, Stage::identity(&ctx, 3).unwrap()).unwrap();

    let err = lut.insert_stage(StageLoc::AtEnd, Stage::identity(&ctx, 4).unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal, "{err}");
    let err = lut
        .insert_stage(StageLoc::AtBegin, Stage::clip_negatives(&ctx, 1).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal, "{err}");

    assert_eq!(lut.stage_count(), 1);
    assert_eq!((lut.input_channels(), lut.output_channels()), (3, 3));
}

#[test]
fn test_cat_and_unlink() {
    let ctx = Context::new();
    let mut first = Pipeline::new(&ctx, 3, 3).unwrap();
    first.insert_stage(StageLoc::AtEnd, Stage::xyz_to_lab()).unwrap();
    let mut second = Pipeline::new(&ctx, 3, 3).unwrap();
    second.insert_stage(StageLoc::AtEnd, Stage::lab_to_xyz()).unwrap();

    first.cat(second).unwrap();
    assert_eq!(first.stage_count(), 2);

    let mut out = [0f32; 3];
    first.eval_float(&[0.3, 0.4, 0.2], &mut out);
    assert!(max_float_difference(&[0.3, 0.4, 0.2], &out) < 1e-4, "out = {out:?}");

    let last = first.unlink_stage(StageLoc::AtEnd).expect("a stage");
    assert_eq!(last.implements(), Stage::lab_to_xyz().implements());
    assert_eq!(first.stage_count(), 1);
}

#[test]
fn test_named_color_pipeline() {
    let ctx = Context::new();
    let mut list = NamedColorList::new(&ctx, 4, "PANTONE ", " C").unwrap();
    list.append("Warm Red", [30000, 50000, 45000], &[0, 50000, 60000, 0]);
    list.append("Reflex Blue", [10000, 40000, 10000], &[65535, 50000, 0, 2000]);

    let list = Arc::new(list);
    let mut lut = Pipeline::new(&ctx, 1, 4).unwrap();
    lut.insert_stage(StageLoc::AtEnd, Stage::named_color(list.clone(), false))
        .unwrap();

    let mut out = [0u16; 4];
    lut.eval_16(&[1], &mut out);
    assert_eq!(out, [65535, 50000, 0, 2000]);
    assert_eq!(list.index("Reflex Blue"), Some(1));
}

// ============================================================================
// CLUT Sampling
// ============================================================================

#[test]
fn test_clut_nodes_are_exact() {
    let ctx = Context::new();
    let grid = 9u32;
    let lut = sampled_clut(&ctx, grid);

    let mut mismatches = 0;
    let mut out = [0u16; 3];
    for r in 0..grid {
        for g in 0..grid {
            for b in 0..grid {
                let node = [
                    quantize_val(r as f64, grid),
                    quantize_val(g as f64, grid),
                    quantize_val(b as f64, grid),
                ];
                let expected = [
                    ((node[0] as u32 * node[1] as u32) >> 16) as u16,
                    node[2] / 2 + node[1] / 4,
                    65535 - node[0],
                ];
                lut.eval_16(&node, &mut out);
                if out != expected {
                    mismatches += 1;
                }
            }
        }
    }
    assert_eq!(mismatches, 0, "nodes off their stored value");
}

#[test]
fn test_inspect_mode_keeps_table() {
    let ctx = Context::new();
    let mut stage = Stage::clut_16(&ctx, 5, 2, 1, None).unwrap();
    stage
        .sample_clut_16(
            &ctx,
            |input, output| {
                output[0] = input[0];
                Ok(())
            },
            SampleMode::Write,
        )
        .unwrap();

    let mut seen = Vec::new();
    stage
        .sample_clut_16(
            &ctx,
            |input, output| {
                seen.push((input[0], output[0]));
                output[0] = 1234;
                Ok(())
            },
            SampleMode::Inspect,
        )
        .unwrap();

    assert_eq!(seen.len(), 25);
    assert!(seen.iter().all(|(i, o)| i == o), "sampler sees the stored value");

    let mut lut = Pipeline::new(&ctx, 2, 1).unwrap();
    lut.insert_stage(StageLoc::AtEnd, stage).unwrap();
    let mut out = [0u16];
    lut.eval_16(&[65535, 0], &mut out);
    assert_eq!(out[0], 65535, "inspect mode must not write");
}

#[test]
fn test_sampler_error_aborts() {
    let ctx = Context::new();
    let mut stage = Stage::clut_16(&ctx, 3, 3, 3, None).unwrap();
    let mut calls = 0;
    let err = stage
        .sample_clut_16(
            &ctx,
            |_, _| {
                calls += 1;
                if calls == 5 {
                    Err(Error::new(ErrorKind::Internal, "stop"))
                } else {
                    Ok(())
                }
            },
            SampleMode::Write,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(calls, 5);
}

// ============================================================================
// Batch and Concurrent Evaluation
// ============================================================================

#[test]
fn test_batch_matches_single_pixels() {
    let ctx = Context::new();
    let lut = srgb_to_lab(&ctx);

    let src = generate_16(TestPattern::Random { seed: 11, count: 500 }, 3);
    let mut batch = vec![0u16; src.len()];
    lut.eval_16_batch(&src, &mut batch).unwrap();

    let mut single = vec![0u16; src.len()];
    for (s, d) in src.chunks_exact(3).zip(single.chunks_exact_mut(3)) {
        lut.eval_16(s, d);
    }
    assert_eq!(max_code_difference(&single, &batch), 0);

    let srcf = generate_float(TestPattern::Grid(7), 3);
    let mut batchf = vec![0f32; srcf.len()];
    lut.eval_float_batch(&srcf, &mut batchf).unwrap();
    let mut singlef = vec![0f32; srcf.len()];
    for (s, d) in srcf.chunks_exact(3).zip(singlef.chunks_exact_mut(3)) {
        lut.eval_float(s, d);
    }
    assert_eq!(max_float_difference(&singlef, &batchf), 0.0);
}

#[test]
fn test_byte_buffers() {
    let ctx = Context::new();
    let lut = srgb_to_lab(&ctx);

    let words = generate_16(TestPattern::Ramp(16), 3);
    let src: Vec<u8> = words.iter().flat_map(|w| w.to_ne_bytes()).collect();
    let mut dst = vec![0u8; src.len()];
    lut.eval_16_bytes(&src, &mut dst).unwrap();

    let mut expected = vec![0u16; words.len()];
    lut.eval_16_batch(&words, &mut expected).unwrap();
    let actual: Vec<u16> = dst
        .chunks_exact(2)
        .map(|b| u16::from_ne_bytes([b[0], b[1]]))
        .collect();
    assert_eq!(actual, expected);

    let err = lut.eval_16_bytes(&src[1..], &mut dst[1..]).unwrap_err();
    assert!(matches!(err, Error::BufferSize { .. }), "{err}");
}

#[test]
fn test_mismatched_batch_buffers() {
    let ctx = Context::new();
    let lut = srgb_to_lab(&ctx);
    let src = vec![0u16; 9];
    let mut dst = vec![0u16; 6];
    let err = lut.eval_16_batch(&src, &mut dst).unwrap_err();
    assert_eq!(err, Error::BufferSize { expected: 9, actual: 6 });
}

#[test]
fn test_concurrent_evaluation_of_one_pipeline() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Pipeline>();
    assert_send_sync::<ToneCurve>();

    let ctx = Context::new();
    let lut = srgb_to_lab(&ctx);

    let src = generate_16(TestPattern::Random { seed: 42, count: 20_000 }, 3);
    let mut serial = vec![0u16; src.len()];
    lut.eval_16_batch(&src, &mut serial).unwrap();

    let chunk = 3 * 257;
    let mut parallel = vec![0u16; src.len()];
    parallel
        .par_chunks_mut(chunk)
        .zip(src.par_chunks(chunk))
        .try_for_each(|(dst, src)| lut.eval_16_batch(src, dst))
        .unwrap();

    assert_eq!(max_code_difference(&serial, &parallel), 0);
}

// ============================================================================
// Optimization
// ============================================================================

#[test]
fn test_optimize_keeps_results() {
    let ctx = Context::new();
    let lut = srgb_to_lab(&ctx);
    let mut optimized = lut.clone();
    optimized.optimize();
    assert!(optimized.stage_count() <= lut.stage_count());

    let src = generate_float(TestPattern::Random { seed: 3, count: 300 }, 3);
    let mut a = vec![0f32; src.len()];
    let mut b = vec![0f32; src.len()];
    lut.eval_float_batch(&src, &mut a).unwrap();
    optimized.eval_float_batch(&src, &mut b).unwrap();
    let diff = max_float_difference(&a, &b);
    assert!(diff < EPSILON, "optimizer moved results by {diff}");
}

#[test]
fn test_inverse_pair_collapses() {
    let ctx = Context::new();
    let mut lut = Pipeline::new(&ctx, 3, 3).unwrap();
    lut.insert_stage(StageLoc::AtEnd, Stage::lab_to_xyz()).unwrap();
    lut.insert_stage(StageLoc::AtEnd, Stage::xyz_to_lab()).unwrap();
    lut.insert_stage(StageLoc::AtEnd, Stage::identity(&ctx, 3).unwrap()).unwrap();

    assert!(lut.optimize());
    assert!(lut.is_empty(), "{} stages left", lut.stage_count());

    let mut out = [0f32; 3];
    lut.eval_float(&[0.25, 0.5, 0.75], &mut out);
    assert_eq!(out, [0.25, 0.5, 0.75]);
}
