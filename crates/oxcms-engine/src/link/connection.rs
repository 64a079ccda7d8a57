//! PCS connection between two adjacent profiles
//!
//! Where one profile's output meets the next one's input in XYZ or Lab,
//! the link may need an affine map in XYZ: white point scaling for the
//! absolute colorimetric intent or black point compensation. The map
//! lands in the pipeline as a matrix stage, framed by Lab⇄XYZ stages when
//! the two sides disagree on the PCS.

use crate::color::{D50, MAX_ENCODEABLE_XYZ, Xyz};
use crate::context::{Context, RenderIntent};
use crate::error::{ErrorKind, Result};
use crate::math::matrix::Matrix3x3;
use crate::math::{chad_to_temp, temp_to_chad};
use crate::pipeline::{Pipeline, Stage, StageLoc};
use crate::profile::{ColorSpace, Profile};

use super::detect::{detect_black_point, detect_destination_black_point};

/// Affine map `y = matrix · x + offset` in XYZ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    pub matrix: Matrix3x3,
    pub offset: [f64; 3],
}

impl Connection {
    pub const fn identity() -> Self {
        Self {
            matrix: Matrix3x3::identity(),
            offset: [0.0; 3],
        }
    }

    pub fn apply(&self, xyz: Xyz) -> Xyz {
        let v = self.matrix.multiply_vec(xyz.to_array());
        Xyz::new(v[0] + self.offset[0], v[1] + self.offset[1], v[2] + self.offset[2])
    }

    /// Total deviation from the identity map
    pub fn deviation(&self) -> f64 {
        let identity = Matrix3x3::identity();
        let mut diff = 0.0;
        for (row, id_row) in self.matrix.m.iter().zip(&identity.m) {
            for (v, id) in row.iter().zip(id_row) {
                diff += (v - id).abs();
            }
        }
        diff + self.offset.iter().map(|o| o.abs()).sum::<f64>()
    }

    /// Whether the map is close enough to identity to skip its stage
    pub fn is_empty(&self, ctx: &Context) -> bool {
        self.deviation() < ctx.empty_layer_tolerance()
    }

    fn stage(&self, ctx: &Context) -> Result<Stage> {
        Stage::matrix(ctx, 3, 3, &self.matrix.to_row_vec(), Some(&self.offset[..]))
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::identity()
    }
}

/// Affine map taking `black_in` to `black_out` and keeping D50 fixed
pub fn black_point_compensation(black_in: Xyz, black_out: Xyz) -> Connection {
    let d50 = D50.xyz.to_array();
    let bin = black_in.to_array();
    let bout = black_out.to_array();

    let mut scale = [0.0; 3];
    let mut offset = [0.0; 3];
    for c in 0..3 {
        let t = bin[c] - d50[c];
        scale[c] = (bout[c] - d50[c]) / t;
        offset[c] = -d50[c] * (bout[c] - bin[c]) / t;
    }

    Connection {
        matrix: Matrix3x3::diagonal(scale[0], scale[1], scale[2]),
        offset,
    }
}

/// White point rescaling for the absolute colorimetric intent
///
/// `adaptation` is the observer's adaptation state: 1 keeps the chromatic
/// adaptation (plain white ratio scaling), 0 undoes the input adaptation
/// and applies the output one, values in between blend the two white
/// temperatures. Returns None when a CHAD can't be inverted or a
/// temperature can't be found.
pub fn absolute_intent_matrix(
    adaptation: f64,
    white_in: Xyz,
    chad_in: &Matrix3x3,
    white_out: Xyz,
    chad_out: &Matrix3x3,
) -> Option<Matrix3x3> {
    let scale = Matrix3x3::diagonal(
        white_in.x / white_out.x,
        white_in.y / white_out.y,
        white_in.z / white_out.z,
    );

    if adaptation >= 1.0 {
        return Some(scale);
    }

    let undo_in = chad_in.inverse()?;
    if adaptation <= 0.0 {
        return Some(chad_out.multiply(&scale).multiply(&undo_in));
    }

    let temp_src = chad_to_temp(chad_in)?;
    let temp_dst = chad_to_temp(chad_out)?;
    if scale.is_identity(1e-10) && (temp_src - temp_dst).abs() < 0.01 {
        return Some(Matrix3x3::identity());
    }

    let temp = (1.0 - adaptation) * temp_dst + adaptation * temp_src;
    let mixed = temp_to_chad(temp)?;
    Some(undo_in.multiply(&scale).multiply(&mixed))
}

/// Connection entering profile `i` from profile `i - 1`
///
/// The offset is returned in the normalized XYZ encoding of the pipeline.
pub(crate) fn compute_conversion(
    ctx: &Context,
    i: usize,
    profiles: &[&dyn Profile],
    intent: RenderIntent,
    bpc: bool,
    adaptation: f64,
) -> Result<Connection> {
    let (prev, next) = (profiles[i - 1], profiles[i]);

    let mut conn = if intent == RenderIntent::AbsoluteColorimetric {
        let matrix = absolute_intent_matrix(
            adaptation,
            prev.media_white_point(),
            &prev.chad(),
            next.media_white_point(),
            &next.chad(),
        )
        .ok_or_else(|| {
            ctx.report(
                ErrorKind::NotSuitable,
                "Couldn't compute the absolute colorimetric white point scaling",
            )
        })?;
        Connection {
            matrix,
            offset: [0.0; 3],
        }
    } else if bpc {
        let black_in = detect_black_point(ctx, prev, intent);
        let black_out = detect_destination_black_point(ctx, next, intent);
        if black_in != black_out {
            let conn = black_point_compensation(black_in, black_out);
            tracing::debug!(
                ?black_in,
                ?black_out,
                scale = ?[conn.matrix.m[0][0], conn.matrix.m[1][1], conn.matrix.m[2][2]],
                offset = ?conn.offset,
                "black point compensation"
            );
            conn
        } else {
            Connection::identity()
        }
    } else {
        Connection::identity()
    };

    for o in &mut conn.offset {
        *o /= MAX_ENCODEABLE_XYZ;
    }
    Ok(conn)
}

/// Append the stages that carry `from` data into a profile expecting `to`
pub(crate) fn add_conversion(
    ctx: &Context,
    lut: &mut Pipeline,
    from: ColorSpace,
    to: ColorSpace,
    conn: &Connection,
) -> Result<()> {
    let empty = conn.is_empty(ctx);
    match (from, to) {
        (ColorSpace::Xyz, ColorSpace::Xyz) => {
            if !empty {
                lut.insert_stage(StageLoc::AtEnd, conn.stage(ctx)?)?;
            }
        }
        (ColorSpace::Xyz, ColorSpace::Lab) => {
            if !empty {
                lut.insert_stage(StageLoc::AtEnd, conn.stage(ctx)?)?;
            }
            lut.insert_stage(StageLoc::AtEnd, Stage::xyz_to_lab())?;
        }
        (ColorSpace::Lab, ColorSpace::Xyz) => {
            lut.insert_stage(StageLoc::AtEnd, Stage::lab_to_xyz())?;
            if !empty {
                lut.insert_stage(StageLoc::AtEnd, conn.stage(ctx)?)?;
            }
        }
        (ColorSpace::Lab, ColorSpace::Lab) => {
            if !empty {
                lut.insert_stage(StageLoc::AtEnd, Stage::lab_to_xyz())?;
                lut.insert_stage(StageLoc::AtEnd, conn.stage(ctx)?)?;
                lut.insert_stage(StageLoc::AtEnd, Stage::xyz_to_lab())?;
            }
        }
        (from, to) if from.is_pcs() || to.is_pcs() || !from.is_compatible(to) => {
            return Err(ctx.report(
                ErrorKind::ColorspaceCheck,
                format!("Can't connect {from:?} data to a {to:?} profile"),
            ));
        }
        _ => {}
    }

    if !empty && from.is_pcs() {
        tracing::trace!(?from, ?to, deviation = conn.deviation(), "connection stage inserted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{D65, PERCEPTUAL_BLACK};
    use crate::math::adapt_to_d50;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_bpc_fixes_black_and_white() {
        let black_in = Xyz::new(0.0, 0.0, 0.0);
        let black_out = PERCEPTUAL_BLACK;
        let conn = black_point_compensation(black_in, black_out);

        assert!(conn.apply(black_in).approx_eq(&black_out, EPSILON));
        assert!(conn.apply(D50.xyz).approx_eq(&D50.xyz, EPSILON));
    }

    #[test]
    fn test_empty_layer() {
        let ctx = Context::new();
        assert!(Connection::identity().is_empty(&ctx));

        let mut nearly = Connection::identity();
        nearly.offset = [0.0005, 0.0005, 0.0005];
        assert!(nearly.is_empty(&ctx));
        nearly.offset = [0.001, 0.001, 0.0];
        assert!(!nearly.is_empty(&ctx), "deviation of exactly 2e-3 is not empty");
    }

    #[test]
    fn test_absolute_full_adaptation_is_white_ratio() {
        let white_in = Xyz::new(0.95, 1.0, 0.8);
        let chad = Matrix3x3::identity();
        let m = absolute_intent_matrix(1.0, white_in, &chad, D50.xyz, &chad).unwrap();
        let mapped = Xyz::from_array(m.multiply_vec(D50.xyz.to_array()));
        assert!(mapped.approx_eq(&white_in, EPSILON), "mapped = {mapped:?}");
    }

    #[test]
    fn test_absolute_no_adaptation_undoes_chad() {
        let chad_in = adapt_to_d50(D65.xyz).unwrap();
        let chad_out = Matrix3x3::identity();
        let m = absolute_intent_matrix(0.0, D50.xyz, &chad_in, D50.xyz, &chad_out).unwrap();
        // D50 in the PCS came from D65 on the device
        let mapped = Xyz::from_array(m.multiply_vec(D50.xyz.to_array()));
        assert!(mapped.approx_eq(&D65.xyz, 1e-3), "mapped = {mapped:?}");
    }

    #[test]
    fn test_absolute_partial_same_white_is_identity() {
        let chad = adapt_to_d50(D65.xyz).unwrap();
        let m = absolute_intent_matrix(0.5, D50.xyz, &chad, D50.xyz, &chad).unwrap();
        assert!(m.is_identity(EPSILON));
    }

    #[test]
    fn test_absolute_partial_blends_from_input_side() {
        let chad_in = adapt_to_d50(D65.xyz).unwrap();
        let chad_out = Matrix3x3::identity();
        let m = absolute_intent_matrix(0.5, D50.xyz, &chad_in, D50.xyz, &chad_out).unwrap();

        let temp = 0.5 * chad_to_temp(&chad_out).unwrap() + 0.5 * chad_to_temp(&chad_in).unwrap();
        let expected = chad_in.inverse().unwrap().multiply(&temp_to_chad(temp).unwrap());
        assert!(m.approx_eq(&expected, 1e-9), "m = {m:?}");
        assert!((m.m[0][2] - 0.0432).abs() < 5e-3, "m[0][2] = {}", m.m[0][2]);
        assert!((m.m[2][0] - 0.0024).abs() < 5e-3, "m[2][0] = {}", m.m[2][0]);
    }

    #[test]
    fn test_add_conversion_stages() {
        let ctx = Context::new();
        let conn = black_point_compensation(Xyz::new(0.0, 0.0, 0.0), PERCEPTUAL_BLACK);

        let mut lut = Pipeline::new(&ctx, 3, 3).unwrap();
        add_conversion(&ctx, &mut lut, ColorSpace::Lab, ColorSpace::Lab, &Connection::identity()).unwrap();
        assert!(lut.is_empty());

        add_conversion(&ctx, &mut lut, ColorSpace::Lab, ColorSpace::Lab, &conn).unwrap();
        assert_eq!(lut.stage_count(), 3);

        let mut lut = Pipeline::new(&ctx, 3, 3).unwrap();
        add_conversion(&ctx, &mut lut, ColorSpace::Xyz, ColorSpace::Lab, &Connection::identity()).unwrap();
        assert_eq!(lut.stage_count(), 1);

        let mut lut = Pipeline::new(&ctx, 4, 4).unwrap();
        add_conversion(&ctx, &mut lut, ColorSpace::Cmyk, ColorSpace::Color(4), &conn).unwrap();
        assert!(lut.is_empty());
        let err = add_conversion(&ctx, &mut lut, ColorSpace::Cmyk, ColorSpace::Rgb, &conn).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ColorspaceCheck);
    }
}
