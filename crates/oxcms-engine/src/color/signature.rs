//! Four-byte signatures
//!
//! Stage kinds and colorspaces are identified by big-endian ASCII codes.

use std::fmt;

/// Opaque 4-byte identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Signature(pub u32);

impl Signature {
    /// Create from 4 ASCII characters
    pub const fn from_bytes(b: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(b))
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    // Stage types
    pub const CURVE_SET: Self = Self::from_bytes(*b"cvst");
    pub const MATRIX: Self = Self::from_bytes(*b"matf");
    pub const CLUT: Self = Self::from_bytes(*b"clut");
    pub const XYZ_TO_LAB: Self = Self::from_bytes(*b"l2x ");
    pub const LAB_TO_XYZ: Self = Self::from_bytes(*b"x2l ");
    pub const NAMED_COLOR: Self = Self::from_bytes(*b"ncl ");
    pub const LAB_V2_TO_V4: Self = Self::from_bytes(*b"2 4 ");
    pub const LAB_V4_TO_V2: Self = Self::from_bytes(*b"4 2 ");
    pub const IDENTITY: Self = Self::from_bytes(*b"idn ");
    pub const LAB_TO_FLOAT_PCS: Self = Self::from_bytes(*b"d2l ");
    pub const FLOAT_PCS_TO_LAB: Self = Self::from_bytes(*b"l2d ");
    pub const XYZ_TO_FLOAT_PCS: Self = Self::from_bytes(*b"d2x ");
    pub const FLOAT_PCS_TO_XYZ: Self = Self::from_bytes(*b"x2d ");
    pub const CLIP_NEGATIVES: Self = Self::from_bytes(*b"clp ");

    // Colorspaces
    pub const XYZ_DATA: Self = Self::from_bytes(*b"XYZ ");
    pub const LAB_DATA: Self = Self::from_bytes(*b"Lab ");
    pub const RGB_DATA: Self = Self::from_bytes(*b"RGB ");
    pub const GRAY_DATA: Self = Self::from_bytes(*b"GRAY");
    pub const CMYK_DATA: Self = Self::from_bytes(*b"CMYK");
    pub const CMY_DATA: Self = Self::from_bytes(*b"CMY ");
    pub const COLOR4_DATA: Self = Self::from_bytes(*b"4CLR");
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        f.write_str(&String::from_utf8_lossy(&bytes))
    }
}
