//! CIE XYZ and xyY coordinates, and the pipeline's normalized XYZ encoding
//!
//! Inside a pipeline XYZ travels divided by [`MAX_ENCODEABLE_XYZ`], so the
//! largest value a 1.15 fixed-point PCS can carry maps to 1.0.

use std::ops::Sub;

/// Largest XYZ component representable in the 16-bit PCS encoding
pub const MAX_ENCODEABLE_XYZ: f64 = 1.0 + 32767.0 / 32768.0;

/// CIE 1931 XYZ tristimulus values
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Xyz {
    pub x: f64,
    /// Luminance
    pub y: f64,
    pub z: f64,
}

impl Xyz {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn from_array(arr: [f64; 3]) -> Self {
        Self {
            x: arr[0],
            y: arr[1],
            z: arr[2],
        }
    }

    #[inline]
    pub const fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Chromaticity plus luminance
    pub fn to_xyy(&self) -> XyY {
        let sum = self.x + self.y + self.z;
        if sum == 0.0 {
            return XyY::new(0.0, 0.0, 0.0);
        }
        XyY::new(self.x / sum, self.y / sum, self.y)
    }

    /// Decode from the pipeline's normalized float encoding
    pub fn from_normalized(v: &[f32]) -> Self {
        Self::new(
            v[0] as f64 * MAX_ENCODEABLE_XYZ,
            v[1] as f64 * MAX_ENCODEABLE_XYZ,
            v[2] as f64 * MAX_ENCODEABLE_XYZ,
        )
    }

    /// Encode to the pipeline's normalized float encoding
    pub fn to_normalized(&self) -> [f32; 3] {
        [
            (self.x / MAX_ENCODEABLE_XYZ) as f32,
            (self.y / MAX_ENCODEABLE_XYZ) as f32,
            (self.z / MAX_ENCODEABLE_XYZ) as f32,
        ]
    }

    /// Component-wise comparison
    #[inline]
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() < epsilon
            && (self.y - other.y).abs() < epsilon
            && (self.z - other.z).abs() < epsilon
    }
}

impl From<[f64; 3]> for Xyz {
    fn from(arr: [f64; 3]) -> Self {
        Self::from_array(arr)
    }
}

impl Sub for Xyz {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Chromaticity (x, y) and luminance Y
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XyY {
    pub x: f64,
    pub y: f64,
    pub big_y: f64,
}

impl XyY {
    #[inline]
    pub const fn new(x: f64, y: f64, big_y: f64) -> Self {
        Self { x, y, big_y }
    }

    pub fn to_xyz(&self) -> Xyz {
        if self.y == 0.0 {
            return Xyz::new(0.0, 0.0, 0.0);
        }
        Xyz::new(
            (self.x / self.y) * self.big_y,
            self.big_y,
            ((1.0 - self.x - self.y) / self.y) * self.big_y,
        )
    }
}
