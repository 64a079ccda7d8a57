//! Profiles as seen by the linker
//!
//! The engine never parses ICC data. A [`Profile`] hands the linker
//! already-decoded pipelines plus the few header facts linking depends on.
//! Pipelines returned by a profile work in the normalized encoding: device
//! values in `[0, 1]`, Lab as `(L/100, (a+128)/255, (b+128)/255)` and XYZ
//! divided by [`MAX_ENCODEABLE_XYZ`](crate::color::MAX_ENCODEABLE_XYZ).
//!
//! The in-memory profiles in this module cover the common cases for callers
//! without a parser: matrix-shaper RGB, gray, Lab and XYZ identities, LUT
//! based devices, device links and named color sets.

mod builtin;
mod matrix_shaper;

pub use builtin::{
    DeviceLinkProfile, LabIdentityProfile, LutProfile, NamedColorProfile, XyzIdentityProfile,
};
pub use matrix_shaper::{GrayProfile, MatrixShaperProfile};

use std::sync::Arc;

use crate::color::{D50, Signature, Xyz};
use crate::context::{Context, RenderIntent};
use crate::error::{ErrorKind, Result};
use crate::math::matrix::Matrix3x3;
use crate::pipeline::{NamedColorList, Pipeline};

/// Data color space of a profile side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Grayscale
    Gray,
    /// RGB color space
    Rgb,
    /// CMY (without K)
    Cmy,
    /// CMYK color space
    Cmyk,
    /// CIELAB
    Lab,
    /// CIEXYZ
    Xyz,
    /// Generic n-colorant space (`2CLR` .. `FCLR`)
    Color(u8),
}

impl ColorSpace {
    /// Number of channels for this color space
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb | Self::Cmy | Self::Lab | Self::Xyz => 3,
            Self::Cmyk => 4,
            Self::Color(n) => *n as usize,
        }
    }

    /// XYZ or Lab
    pub fn is_pcs(&self) -> bool {
        matches!(self, Self::Lab | Self::Xyz)
    }

    /// Whether a stage producing `self` can feed one expecting `other`
    ///
    /// Four-colorant data is interchangeable with CMYK, and XYZ with Lab
    /// since the linker inserts the conversion.
    pub fn is_compatible(&self, other: ColorSpace) -> bool {
        match (*self, other) {
            (a, b) if a == b => true,
            (Self::Color(4), Self::Cmyk) | (Self::Cmyk, Self::Color(4)) => true,
            (Self::Xyz, Self::Lab) | (Self::Lab, Self::Xyz) => true,
            _ => false,
        }
    }

    pub fn signature(&self) -> Signature {
        match self {
            Self::Gray => Signature::GRAY_DATA,
            Self::Rgb => Signature::RGB_DATA,
            Self::Cmy => Signature::CMY_DATA,
            Self::Cmyk => Signature::CMYK_DATA,
            Self::Lab => Signature::LAB_DATA,
            Self::Xyz => Signature::XYZ_DATA,
            Self::Color(n) => {
                let digit = if *n < 10 { b'0' + n } else { b'A' + n - 10 };
                Signature::from_bytes([digit, b'C', b'L', b'R'])
            }
        }
    }

    pub fn from_signature(sig: Signature) -> Option<Self> {
        let space = match sig {
            Signature::GRAY_DATA => Self::Gray,
            Signature::RGB_DATA => Self::Rgb,
            Signature::CMY_DATA => Self::Cmy,
            Signature::CMYK_DATA => Self::Cmyk,
            Signature::LAB_DATA => Self::Lab,
            Signature::XYZ_DATA => Self::Xyz,
            _ => {
                let [digit, c, l, r] = sig.to_bytes();
                if &[c, l, r] != b"CLR" {
                    return None;
                }
                let n = match digit {
                    b'2'..=b'9' => digit - b'0',
                    b'A'..=b'F' => digit - b'A' + 10,
                    _ => return None,
                };
                Self::Color(n)
            }
        };
        Some(space)
    }
}

/// ICC Profile Class (Device Class)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileClass {
    /// Input device (scanner, camera)
    Input,
    /// Display device (monitor)
    Display,
    /// Output device (printer)
    Output,
    /// Device link
    DeviceLink,
    /// Color space conversion
    ColorSpace,
    /// Abstract profile
    Abstract,
    /// Named color profile
    NamedColor,
}

impl ProfileClass {
    pub fn signature(&self) -> Signature {
        match self {
            Self::Input => Signature::from_bytes(*b"scnr"),
            Self::Display => Signature::from_bytes(*b"mntr"),
            Self::Output => Signature::from_bytes(*b"prtr"),
            Self::DeviceLink => Signature::from_bytes(*b"link"),
            Self::ColorSpace => Signature::from_bytes(*b"spac"),
            Self::Abstract => Signature::from_bytes(*b"abst"),
            Self::NamedColor => Signature::from_bytes(*b"nmcl"),
        }
    }

    /// Device links and abstract profiles are read as a single LUT
    pub fn is_link_like(&self) -> bool {
        matches!(self, Self::DeviceLink | Self::Abstract)
    }
}

/// Direction a profile is used in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to PCS
    Input,
    /// PCS to device
    Output,
}

/// Table index for an ICC intent; absolute colorimetric reads the relative table
pub(crate) fn intent_slot(intent: RenderIntent) -> Option<usize> {
    match intent {
        RenderIntent::Perceptual => Some(0),
        RenderIntent::RelativeColorimetric | RenderIntent::AbsoluteColorimetric => Some(1),
        RenderIntent::Saturation => Some(2),
        _ => None,
    }
}

/// Header facts and decoded transforms of one profile
pub trait Profile: Send + Sync {
    /// Device side color space
    fn color_space(&self) -> ColorSpace;

    /// Connection side color space
    fn pcs(&self) -> ColorSpace;

    fn profile_class(&self) -> ProfileClass;

    /// Version as major.minor, e.g. `4.3`
    fn version(&self) -> f64 {
        4.3
    }

    /// Media white point, relative to D50
    fn media_white_point(&self) -> Xyz {
        D50.xyz
    }

    /// Adaptation from the actual illuminant to D50
    fn chad(&self) -> Matrix3x3 {
        Matrix3x3::identity()
    }

    fn is_matrix_shaper(&self) -> bool {
        false
    }

    /// Whether a table exists for exactly this intent and direction
    fn is_clut(&self, _intent: RenderIntent, _direction: Direction) -> bool {
        false
    }

    fn is_intent_supported(&self, intent: RenderIntent, direction: Direction) -> bool {
        self.is_clut(intent, direction) || self.is_matrix_shaper()
    }

    /// Device to PCS pipeline
    fn read_input_lut(&self, ctx: &Context, intent: RenderIntent) -> Result<Pipeline>;

    /// PCS to device pipeline
    fn read_output_lut(&self, ctx: &Context, intent: RenderIntent) -> Result<Pipeline>;

    /// Whole-profile pipeline of a device link, abstract or named color profile
    fn read_devicelink_lut(&self, ctx: &Context, _intent: RenderIntent) -> Result<Pipeline> {
        Err(ctx.report(
            ErrorKind::NotSuitable,
            format!("{:?} profile has no device link table", self.profile_class()),
        ))
    }

    fn named_color_list(&self) -> Option<Arc<NamedColorList>> {
        None
    }

    /// Known total area coverage in percent, skips estimation when set
    fn tac_hint(&self) -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility() {
        assert!(ColorSpace::Cmyk.is_compatible(ColorSpace::Color(4)));
        assert!(ColorSpace::Lab.is_compatible(ColorSpace::Xyz));
        assert!(!ColorSpace::Rgb.is_compatible(ColorSpace::Cmy));
        assert!(!ColorSpace::Color(3).is_compatible(ColorSpace::Cmyk));
    }

    #[test]
    fn test_signatures() {
        for space in [
            ColorSpace::Gray,
            ColorSpace::Rgb,
            ColorSpace::Cmyk,
            ColorSpace::Lab,
            ColorSpace::Color(4),
            ColorSpace::Color(12),
        ] {
            assert_eq!(ColorSpace::from_signature(space.signature()), Some(space));
        }
        assert_eq!(ColorSpace::Color(12).signature().to_string(), "CCLR");
        assert_eq!(ColorSpace::from_signature(Signature::CLUT), None);
    }

    #[test]
    fn test_intent_slots() {
        assert_eq!(intent_slot(RenderIntent::AbsoluteColorimetric), Some(1));
        assert_eq!(intent_slot(RenderIntent::PreserveKOnlyPerceptual), None);
    }
}
