//! Fixed-point encodings and 16-bit quantization
//!
//! Every conversion from a continuous value to a 16-bit code goes through
//! [`quick_saturate_word`], so that round-tripping a table's own node values
//! reproduces them exactly.

/// s15Fixed16Number - signed 16.16 fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct S15Fixed16(pub i32);

impl S15Fixed16 {
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Nearest representable value
    pub fn from_f64(val: f64) -> Self {
        Self((val * 65536.0 + 0.5).floor() as i32)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 65536.0
    }

    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(i32::from_be_bytes(bytes))
    }

    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

/// u8Fixed8Number - unsigned 8.8 fixed point, used for gamma values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct U8Fixed8(pub u16);

impl U8Fixed8 {
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Rounds through 16.16 and keeps the middle 16 bits
    pub fn from_f64(val: f64) -> Self {
        let fixed32 = S15Fixed16::from_f64(val).0;
        Self(((fixed32 >> 8) & 0xFFFF) as u16)
    }

    pub fn to_f64(self) -> f64 {
        let msb = (self.0 >> 8) as f64;
        let lsb = (self.0 & 0xFF) as f64;
        msb + lsb / 256.0
    }
}

/// Round to the nearest 16-bit code, clamping to `[0, 65535]`
#[inline]
pub fn quick_saturate_word(d: f64) -> u16 {
    let d = d + 0.5;
    if d <= 0.0 {
        return 0;
    }
    if d >= 65535.0 {
        return 0xFFFF;
    }
    d.floor() as u16
}

/// Floor to an integer
#[inline]
pub fn quick_floor(val: f64) -> i32 {
    val.floor() as i32
}

/// The 16-bit code of node `i` on a grid of `max_samples` nodes
#[inline]
pub fn quantize_val(i: f64, max_samples: u32) -> u16 {
    let x = (i * 65535.0) / (max_samples.saturating_sub(1).max(1)) as f64;
    quick_saturate_word(x)
}

/// Map `[0, 0xFFFF]` onto `[0, 0x10000]` in 16.16 fixed point
#[inline]
pub fn to_fixed_domain(a: i64) -> i64 {
    a + ((a + 0x7FFF) / 0xFFFF)
}

/// Inverse of [`to_fixed_domain`]
#[inline]
pub fn from_fixed_domain(a: i64) -> i64 {
    a - ((a + 0x7FFF) >> 16)
}

/// Integer part of a 16.16 value
#[inline]
pub fn fixed_to_int(x: i64) -> usize {
    (x >> 16) as usize
}

/// Fractional part of a 16.16 value
#[inline]
pub fn fixed_rest_to_int(x: i64) -> i64 {
    x & 0xFFFF
}

/// Round a 16.16 value to the nearest 16-bit code, saturating
#[inline]
pub fn fixed_to_word(x: i64) -> u16 {
    ((x + 0x8000) >> 16).clamp(0, 0xFFFF) as u16
}

/// Blend two 16-bit codes by a 16.16 fraction
#[inline]
pub fn linear_interp_16(a: i64, l: i64, h: i64) -> u16 {
    let dif = (h - l) * a + 0x8000;
    ((dif >> 16) + l).clamp(0, 0xFFFF) as u16
}

/// Convert a 16-bit code to the normalized float domain
#[inline]
pub fn word_to_float(w: u16) -> f32 {
    (w as f64 / 65535.0) as f32
}

/// Convert a normalized float to a 16-bit code
#[inline]
pub fn float_to_word(f: f32) -> u16 {
    quick_saturate_word(f as f64 * 65535.0)
}

/// Hue angle in degrees, normalized to `[0, 360)`
pub fn atan2deg(a: f64, b: f64) -> f64 {
    let mut h = if a == 0.0 && b == 0.0 {
        0.0
    } else {
        a.atan2(b)
    };
    h *= 180.0 / std::f64::consts::PI;
    while h > 360.0 {
        h -= 360.0;
    }
    while h < 0.0 {
        h += 360.0;
    }
    h
}

#[inline]
pub fn deg_to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}
