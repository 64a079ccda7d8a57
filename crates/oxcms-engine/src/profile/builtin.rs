//! Built-in in-memory profiles

use std::sync::Arc;

use crate::color::{D50, Xyz};
use crate::context::{Context, RenderIntent};
use crate::error::{ErrorKind, Result};
use crate::math::matrix::Matrix3x3;
use crate::pipeline::{NamedColorList, Pipeline, Stage, StageLoc};

use super::{ColorSpace, Direction, Profile, ProfileClass, intent_slot};

/// Abstract Lab to Lab identity, in v2 or v4 flavor
///
/// The v2 flavor runs its identity in the legacy 16-bit encoding, which
/// makes it a faithful stand-in for old Lab profiles during detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabIdentityProfile {
    version: f64,
}

impl LabIdentityProfile {
    pub fn v2() -> Self {
        Self { version: 2.1 }
    }

    pub fn v4() -> Self {
        Self { version: 4.3 }
    }

    fn lut(&self, ctx: &Context) -> Result<Pipeline> {
        let mut lut = Pipeline::new(ctx, 3, 3)?;
        if self.version < 4.0 {
            lut.insert_stage(StageLoc::AtEnd, Stage::lab_v4_to_v2())?;
            lut.insert_stage(StageLoc::AtEnd, Stage::identity_curves(ctx, 3)?)?;
            lut.insert_stage(StageLoc::AtEnd, Stage::lab_v2_to_v4())?;
        } else {
            lut.insert_stage(StageLoc::AtEnd, Stage::identity_curves(ctx, 3)?)?;
        }
        Ok(lut)
    }
}

impl Profile for LabIdentityProfile {
    fn color_space(&self) -> ColorSpace {
        ColorSpace::Lab
    }

    fn pcs(&self) -> ColorSpace {
        ColorSpace::Lab
    }

    fn profile_class(&self) -> ProfileClass {
        ProfileClass::Abstract
    }

    fn version(&self) -> f64 {
        self.version
    }

    fn is_clut(&self, intent: RenderIntent, _direction: Direction) -> bool {
        intent == RenderIntent::Perceptual
    }

    fn read_input_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        self.lut(ctx)
    }

    fn read_output_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        self.lut(ctx)
    }

    fn read_devicelink_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        self.lut(ctx)
    }
}

/// Abstract XYZ to XYZ identity
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct XyzIdentityProfile;

impl XyzIdentityProfile {
    fn lut(&self, ctx: &Context) -> Result<Pipeline> {
        let mut lut = Pipeline::new(ctx, 3, 3)?;
        lut.insert_stage(StageLoc::AtEnd, Stage::identity_curves(ctx, 3)?)?;
        Ok(lut)
    }
}

impl Profile for XyzIdentityProfile {
    fn color_space(&self) -> ColorSpace {
        ColorSpace::Xyz
    }

    fn pcs(&self) -> ColorSpace {
        ColorSpace::Xyz
    }

    fn profile_class(&self) -> ProfileClass {
        ProfileClass::Abstract
    }

    fn is_clut(&self, intent: RenderIntent, _direction: Direction) -> bool {
        intent == RenderIntent::Perceptual
    }

    fn read_input_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        self.lut(ctx)
    }

    fn read_output_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        self.lut(ctx)
    }

    fn read_devicelink_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        self.lut(ctx)
    }
}

/// Device profile driven by per-intent tables
///
/// Tables are indexed perceptual, relative colorimetric, saturation.
/// Absolute colorimetric reads the relative table, and a missing table
/// falls back to the perceptual one.
#[derive(Debug, Clone)]
pub struct LutProfile {
    color_space: ColorSpace,
    pcs: ColorSpace,
    class: ProfileClass,
    version: f64,
    a2b: [Option<Pipeline>; 3],
    b2a: [Option<Pipeline>; 3],
    media_white: Xyz,
    chad: Matrix3x3,
    tac: Option<f64>,
}

impl LutProfile {
    pub fn new(color_space: ColorSpace, pcs: ColorSpace, class: ProfileClass) -> Self {
        Self {
            color_space,
            pcs,
            class,
            version: 4.3,
            a2b: [None, None, None],
            b2a: [None, None, None],
            media_white: D50.xyz,
            chad: Matrix3x3::identity(),
            tac: None,
        }
    }

    fn store(tables: &mut [Option<Pipeline>; 3], intent: RenderIntent, lut: Pipeline) {
        match intent_slot(intent.base_icc_intent()) {
            Some(slot) => tables[slot] = Some(lut),
            None => tracing::warn!(intent = intent.to_icc(), "no table slot for intent, table dropped"),
        }
    }

    /// Device to PCS table for `intent`
    pub fn with_a2b(mut self, intent: RenderIntent, lut: Pipeline) -> Self {
        Self::store(&mut self.a2b, intent, lut);
        self
    }

    /// PCS to device table for `intent`
    pub fn with_b2a(mut self, intent: RenderIntent, lut: Pipeline) -> Self {
        Self::store(&mut self.b2a, intent, lut);
        self
    }

    /// Same pair of tables for every intent
    pub fn with_all(mut self, a2b: Pipeline, b2a: Pipeline) -> Self {
        self.a2b = [Some(a2b.clone()), Some(a2b.clone()), Some(a2b)];
        self.b2a = [Some(b2a.clone()), Some(b2a.clone()), Some(b2a)];
        self
    }

    pub fn with_version(mut self, version: f64) -> Self {
        self.version = version;
        self
    }

    pub fn with_media_white(mut self, white: Xyz) -> Self {
        self.media_white = white;
        self
    }

    pub fn with_chad(mut self, chad: Matrix3x3) -> Self {
        self.chad = chad;
        self
    }

    /// Known total area coverage, in percent
    pub fn with_tac(mut self, tac: f64) -> Self {
        self.tac = Some(tac);
        self
    }

    fn read(&self, ctx: &Context, tables: &[Option<Pipeline>; 3], intent: RenderIntent, what: &str) -> Result<Pipeline> {
        let Some(slot) = intent_slot(intent) else {
            return Err(ctx.report(
                ErrorKind::NotSuitable,
                format!("Intent {} has no {what} table", intent.to_icc()),
            ));
        };
        tables[slot]
            .as_ref()
            .or(tables[0].as_ref())
            .cloned()
            .ok_or_else(|| ctx.report(ErrorKind::NotSuitable, format!("Profile has no {what} table")))
    }
}

impl Profile for LutProfile {
    fn color_space(&self) -> ColorSpace {
        self.color_space
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

    fn media_white_point(&self) -> Xyz {
        self.media_white
    }

    fn chad(&self) -> Matrix3x3 {
        self.chad
    }

    fn is_clut(&self, intent: RenderIntent, direction: Direction) -> bool {
        let tables = match direction {
            Direction::Input => &self.a2b,
            Direction::Output => &self.b2a,
        };
        intent_slot(intent).is_some_and(|slot| tables[slot].is_some())
    }

    fn read_input_lut(&self, ctx: &Context, intent: RenderIntent) -> Result<Pipeline> {
        self.read(ctx, &self.a2b, intent, "device to PCS")
    }

    fn read_output_lut(&self, ctx: &Context, intent: RenderIntent) -> Result<Pipeline> {
        self.read(ctx, &self.b2a, intent, "PCS to device")
    }

    fn tac_hint(&self) -> Option<f64> {
        self.tac
    }
}

/// One pipeline spanning the whole conversion
///
/// Also covers abstract profiles, which are Lab or XYZ on both sides.
#[derive(Debug, Clone)]
pub struct DeviceLinkProfile {
    lut: Pipeline,
    color_space: ColorSpace,
    output_space: ColorSpace,
    class: ProfileClass,
    version: f64,
}

impl DeviceLinkProfile {
    pub fn new(ctx: &Context, color_space: ColorSpace, output_space: ColorSpace, lut: Pipeline) -> Result<Self> {
        if lut.input_channels() != color_space.channels()
            || lut.output_channels() != output_space.channels()
        {
            return Err(ctx.report(
                ErrorKind::ColorspaceCheck,
                format!(
                    "{}->{} table doesn't fit {color_space:?} to {output_space:?}",
                    lut.input_channels(),
                    lut.output_channels()
                ),
            ));
        }
        Ok(Self {
            lut,
            color_space,
            output_space,
            class: ProfileClass::DeviceLink,
            version: 4.3,
        })
    }

    /// Same table, flagged as an abstract profile
    pub fn into_abstract(mut self) -> Self {
        self.class = ProfileClass::Abstract;
        self
    }

    pub fn with_version(mut self, version: f64) -> Self {
        self.version = version;
        self
    }

    fn not_directional(&self, ctx: &Context) -> crate::error::Error {
        ctx.report(
            ErrorKind::NotSuitable,
            "Device link tables can't be read in one direction",
        )
    }
}

impl Profile for DeviceLinkProfile {
    fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    fn pcs(&self) -> ColorSpace {
        self.output_space
    }

    fn profile_class(&self) -> ProfileClass {
        self.class
    }

    fn version(&self) -> f64 {
        self.version
    }

    fn is_clut(&self, _intent: RenderIntent, _direction: Direction) -> bool {
        true
    }

    fn read_input_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        Err(self.not_directional(ctx))
    }

    fn read_output_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        Err(self.not_directional(ctx))
    }

    fn read_devicelink_lut(&self, _ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        Ok(self.lut.clone())
    }
}

/// Spot colors addressed by index
///
/// As a device link it maps an index to device colorants, as an input
/// profile it maps an index to Lab.
#[derive(Debug, Clone)]
pub struct NamedColorProfile {
    list: Arc<NamedColorList>,
    device_space: ColorSpace,
}

impl NamedColorProfile {
    pub fn new(ctx: &Context, list: Arc<NamedColorList>, device_space: ColorSpace) -> Result<Self> {
        if list.colorant_count() != device_space.channels() {
            return Err(ctx.report(
                ErrorKind::ColorspaceCheck,
                format!(
                    "{} colorants don't fit {device_space:?}",
                    list.colorant_count()
                ),
            ));
        }
        Ok(Self { list, device_space })
    }

    fn index_lut(&self, ctx: &Context, use_pcs: bool) -> Result<Pipeline> {
        let stage = Stage::named_color(Arc::clone(&self.list), use_pcs);
        let mut lut = Pipeline::new(ctx, 1, stage.output_channels())?;
        lut.insert_stage(StageLoc::AtEnd, stage)?;
        Ok(lut)
    }
}

impl Profile for NamedColorProfile {
    fn color_space(&self) -> ColorSpace {
        self.device_space
    }

    fn pcs(&self) -> ColorSpace {
        ColorSpace::Lab
    }

    fn profile_class(&self) -> ProfileClass {
        ProfileClass::NamedColor
    }

    fn read_input_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        self.index_lut(ctx, true)
    }

    fn read_output_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        Err(ctx.report(
            ErrorKind::NotSuitable,
            "Named color profiles can't be used as output",
        ))
    }

    fn read_devicelink_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        self.index_lut(ctx, false)
    }

    fn named_color_list(&self) -> Option<Arc<NamedColorList>> {
        Some(Arc::clone(&self.list))
    }
}
