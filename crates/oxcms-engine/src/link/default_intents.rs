//! The ICC intents: perceptual, relative, saturation and absolute colorimetric

use crate::context::{Context, RenderIntent, TransformFlags};
use crate::error::{ErrorKind, Result};
use crate::pipeline::{Pipeline, Stage, StageLoc};
use crate::profile::{ColorSpace, Profile, ProfileClass};

use super::check_chain;
use super::connection::{Connection, add_conversion, compute_conversion};

/// Chain each profile's table for its intent, joined through the PCS
///
/// A profile is read device to PCS when it starts the chain or when the
/// data reaching it is device data, otherwise PCS to device. Device links,
/// abstract profiles and a lone named color profile contribute their whole
/// table.
pub fn default_icc_intents(
    ctx: &Context,
    profiles: &[&dyn Profile],
    intents: &[RenderIntent],
    bpc: &[bool],
    adaptation: &[f64],
    flags: TransformFlags,
) -> Result<Pipeline> {
    check_chain(ctx, profiles, intents, bpc, adaptation)?;

    let n_in = profiles[0].color_space().channels();
    let mut result = Pipeline::new(ctx, 0, 0)?;
    let mut current = profiles[0].color_space();

    for (i, &profile) in profiles.iter().enumerate() {
        let class = profile.profile_class();
        let is_link = class.is_link_like();
        let is_input = if i == 0 && !is_link {
            true
        } else {
            !current.is_pcs()
        };
        let intent = intents[i];

        let (space_in, space_out) = if is_input || is_link {
            (profile.color_space(), profile.pcs())
        } else {
            (profile.pcs(), profile.color_space())
        };

        if !current.is_compatible(space_in) {
            return Err(ctx.report(
                ErrorKind::ColorspaceCheck,
                format!("Profile {i} expects {space_in:?} but the chain carries {current:?}"),
            ));
        }

        let lut = if is_link || (class == ProfileClass::NamedColor && profiles.len() == 1) {
            let lut = profile.read_devicelink_lut(ctx, intent)?;
            let conn = if class == ProfileClass::Abstract && i > 0 {
                compute_conversion(ctx, i, profiles, intent, bpc[i], adaptation[i])?
            } else {
                Connection::identity()
            };
            add_conversion(ctx, &mut result, current, space_in, &conn)?;
            lut
        } else if is_input {
            profile.read_input_lut(ctx, intent)?
        } else {
            let lut = profile.read_output_lut(ctx, intent)?;
            let conn = compute_conversion(ctx, i, profiles, intent, bpc[i], adaptation[i])?;
            add_conversion(ctx, &mut result, current, space_in, &conn)?;
            lut
        };

        result.cat(lut)?;
        current = space_out;
    }

    if flags.no_negatives && matches!(current, ColorSpace::Gray | ColorSpace::Rgb | ColorSpace::Cmyk) {
        result.insert_stage(StageLoc::AtEnd, Stage::clip_negatives(ctx, current.channels())?)?;
    }

    if result.is_empty() {
        return Pipeline::new(ctx, n_in, current.channels());
    }
    Ok(result)
}
