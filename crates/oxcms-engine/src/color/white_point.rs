//! Reference white points and perceptual black
//!
//! D50 is the PCS illuminant; every connection stage maps to or from it.

use crate::color::Xyz;

/// A white point definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhitePoint {
    pub name: &'static str,
    /// Y normalized to 1.0
    pub xyz: Xyz,
}

impl WhitePoint {
    pub const fn new(name: &'static str, x: f64, y: f64, z: f64) -> Self {
        Self {
            name,
            xyz: Xyz::new(x, y, z),
        }
    }
}

/// ICC PCS illuminant
pub const D50: WhitePoint = WhitePoint::new("D50", 0.9642, 1.0, 0.8249);

/// Noon daylight
pub const D65: WhitePoint = WhitePoint::new("D65", 0.9505, 1.0, 1.0890);

/// Incandescent
pub const A: WhitePoint = WhitePoint::new("A", 1.0985, 1.0, 0.3558);

/// Black point of the v4 perceptual reference medium
pub const PERCEPTUAL_BLACK: Xyz = Xyz::new(0.00336, 0.0034731, 0.00287);
