//! Stage-merging pre-optimization
//!
//! Rewrites a pipeline into a shorter one with the same float semantics:
//! identity stages go away, conversion stages that cancel their neighbor
//! go away, and chains of 3x3 matrices collapse into one.

use super::{Pipeline, Stage, StageKind};
use crate::color::Signature;
use crate::math::matrix::Matrix3x3;

/// Coefficient tolerance for treating a product matrix as identity
const IDENTITY_TOLERANCE: f64 = 1e-5;

/// Adjacent `implements` pairs that undo each other
const INVERSE_PAIRS: [(Signature, Signature); 6] = [
    (Signature::LAB_TO_XYZ, Signature::XYZ_TO_LAB),
    (Signature::XYZ_TO_LAB, Signature::LAB_TO_XYZ),
    (Signature::LAB_V4_TO_V2, Signature::LAB_V2_TO_V4),
    (Signature::LAB_V2_TO_V4, Signature::LAB_V4_TO_V2),
    (Signature::LAB_TO_FLOAT_PCS, Signature::FLOAT_PCS_TO_LAB),
    (Signature::XYZ_TO_FLOAT_PCS, Signature::FLOAT_PCS_TO_XYZ),
];

fn remove_identities(stages: &mut Vec<Stage>) -> bool {
    let before = stages.len();
    stages.retain(|s| s.implements() != Signature::IDENTITY);
    stages.len() != before
}

fn remove_inverse_pairs(stages: &mut Vec<Stage>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 1 < stages.len() {
        let pair = (stages[i].implements(), stages[i + 1].implements());
        if INVERSE_PAIRS.contains(&pair) {
            stages.drain(i..i + 2);
            changed = true;
            // The stages now meeting at `i - 1` may cancel too
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }
    changed
}

/// Plain 3x3 matrix stage as (matrix, offset)
fn as_matrix3(stage: &Stage) -> Option<(Matrix3x3, [f64; 3])> {
    if stage.implements() != Signature::MATRIX
        || stage.input_channels() != 3
        || stage.output_channels() != 3
    {
        return None;
    }
    let (coefficients, offset) = stage.matrix_data()?;
    let m = Matrix3x3::from_row_slice(coefficients)?;
    let off = match offset {
        Some(o) => [o[0], o[1], o[2]],
        None => [0.0; 3],
    };
    Some((m, off))
}

fn multiply_matrices(stages: &mut Vec<Stage>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 1 < stages.len() {
        let (Some((m1, o1)), Some((m2, o2))) = (as_matrix3(&stages[i]), as_matrix3(&stages[i + 1]))
        else {
            i += 1;
            continue;
        };

        // m2 (m1 x + o1) + o2
        let m = m2.multiply(&m1);
        let mo = m2.multiply_vec(o1);
        let off = [mo[0] + o2[0], mo[1] + o2[1], mo[2] + o2[2]];
        let has_offset = off.iter().any(|v| v.abs() > IDENTITY_TOLERANCE);

        stages.drain(i..i + 2);
        changed = true;

        if m.is_identity(IDENTITY_TOLERANCE) && !has_offset {
            continue;
        }
        let merged = StageKind::Matrix {
            coefficients: m.to_row_vec(),
            offset: has_offset.then(|| off.to_vec()),
        };
        stages.insert(i, Stage::from_parts(merged, 3, 3));
    }
    changed
}

impl Pipeline {
    /// Drop and merge stages without changing the float result
    ///
    /// Returns whether the chain changed.
    pub fn optimize(&mut self) -> bool {
        let mut changed = false;
        loop {
            let mut pass = remove_identities(self.stages_mut());
            pass |= remove_inverse_pairs(self.stages_mut());
            pass |= multiply_matrices(self.stages_mut());
            if !pass {
                break;
            }
            changed = true;
        }
        if changed {
            tracing::trace!(stages = self.stage_count(), "pipeline pre-optimized");
            self.bless();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::pipeline::StageLoc;

    const EPSILON: f32 = 1e-5;

    fn eval(lut: &Pipeline, input: [f32; 3]) -> [f32; 3] {
        let mut out = [0f32; 3];
        lut.eval_float(&input, &mut out);
        out
    }

    #[test]
    fn test_removes_identity_and_inverse_pairs() {
        let ctx = Context::new();
        let mut lut = Pipeline::new(&ctx, 3, 3).unwrap();
        for stage in [
            Stage::identity(&ctx, 3).unwrap(),
            Stage::lab_to_xyz(),
            Stage::xyz_to_lab(),
            Stage::lab_v2_to_v4(),
            Stage::lab_v4_to_v2(),
        ] {
            lut.insert_stage(StageLoc::AtEnd, stage).unwrap();
        }
        assert!(lut.optimize());
        assert!(lut.is_empty());
        assert_eq!(eval(&lut, [0.5, 0.25, 0.75]), [0.5, 0.25, 0.75]);
    }

    #[test]
    fn test_nested_pairs_cancel() {
        let ctx = Context::new();
        let mut lut = Pipeline::new(&ctx, 3, 3).unwrap();
        for stage in [
            Stage::normalize_from_lab_float(),
            Stage::lab_to_xyz(),
            Stage::xyz_to_lab(),
            Stage::normalize_to_lab_float(),
        ] {
            lut.insert_stage(StageLoc::AtEnd, stage).unwrap();
        }
        lut.optimize();
        assert_eq!(lut.stage_count(), 0);
    }

    #[test]
    fn test_multiplies_matrices() {
        let ctx = Context::new();
        let mut lut = Pipeline::new(&ctx, 3, 3).unwrap();
        let a = [0.6, 0.3, 0.1, 0.2, 0.7, 0.1, 0.1, 0.1, 0.8];
        let b = [1.2, -0.1, 0.0, 0.0, 1.0, 0.1, 0.05, 0.0, 0.9];
        lut.insert_stage(StageLoc::AtEnd, Stage::matrix(&ctx, 3, 3, &a, Some(&[0.1, 0.0, 0.0])).unwrap())
            .unwrap();
        lut.insert_stage(StageLoc::AtEnd, Stage::matrix(&ctx, 3, 3, &b, None).unwrap())
            .unwrap();

        let input = [0.3, 0.6, 0.9];
        let before = eval(&lut, input);
        assert!(lut.optimize());
        assert_eq!(lut.stage_count(), 1);
        let after = eval(&lut, input);
        for c in 0..3 {
            assert!((before[c] - after[c]).abs() < EPSILON, "channel {c}");
        }
    }

    #[test]
    fn test_inverse_matrices_vanish() {
        let ctx = Context::new();
        let mut lut = Pipeline::new(&ctx, 3, 3).unwrap();
        let m = Matrix3x3::new([[0.6, 0.3, 0.1], [0.2, 0.7, 0.1], [0.1, 0.1, 0.8]]);
        let inv = m.inverse().unwrap();
        lut.insert_stage(StageLoc::AtEnd, Stage::matrix(&ctx, 3, 3, &m.to_row_vec(), None).unwrap())
            .unwrap();
        lut.insert_stage(StageLoc::AtEnd, Stage::matrix(&ctx, 3, 3, &inv.to_row_vec(), None).unwrap())
            .unwrap();
        lut.optimize();
        assert!(lut.is_empty());
    }

    #[test]
    fn test_leaves_curves_alone() {
        let ctx = Context::new();
        let mut lut = Pipeline::new(&ctx, 3, 3).unwrap();
        lut.insert_stage(StageLoc::AtEnd, Stage::identity_curves(&ctx, 3).unwrap())
            .unwrap();
        assert!(!lut.optimize());
        assert_eq!(lut.stage_count(), 1);
    }
}
