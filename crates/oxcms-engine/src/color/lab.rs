//! CIELAB and LCh coordinates, with the PCS encodings used by stages
//!
//! Float pipelines carry Lab as `L/100, (a+128)/255, (b+128)/255`. The
//! 16-bit v4 encoding spans the full word range, v2 stops at 0xFF00 for L.

use crate::color::{D50, WhitePoint, Xyz};
use crate::math::fixed::{atan2deg, deg_to_rad, quick_saturate_word};

/// CIELAB color coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lab {
    /// Lightness (0 to 100)
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    #[inline]
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    #[inline]
    pub const fn to_array(&self) -> [f64; 3] {
        [self.l, self.a, self.b]
    }

    /// Convert from XYZ relative to D50
    pub fn from_xyz(xyz: Xyz) -> Self {
        Self::from_xyz_with_white(xyz, &D50)
    }

    pub fn from_xyz_with_white(xyz: Xyz, white: &WhitePoint) -> Self {
        let fx = lab_f(xyz.x / white.xyz.x);
        let fy = lab_f(xyz.y / white.xyz.y);
        let fz = lab_f(xyz.z / white.xyz.z);

        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }

    /// Convert to XYZ relative to D50
    pub fn to_xyz(&self) -> Xyz {
        self.to_xyz_with_white(&D50)
    }

    pub fn to_xyz_with_white(&self, white: &WhitePoint) -> Xyz {
        let fy = (self.l + 16.0) / 116.0;
        let fx = fy + 0.002 * self.a;
        let fz = fy - 0.005 * self.b;

        Xyz::new(
            lab_f_inv(fx) * white.xyz.x,
            lab_f_inv(fy) * white.xyz.y,
            lab_f_inv(fz) * white.xyz.z,
        )
    }

    /// Decode from the pipeline's normalized float encoding
    pub fn from_normalized(v: &[f32]) -> Self {
        Self::new(
            v[0] as f64 * 100.0,
            v[1] as f64 * 255.0 - 128.0,
            v[2] as f64 * 255.0 - 128.0,
        )
    }

    /// Encode to the pipeline's normalized float encoding
    pub fn to_normalized(&self) -> [f32; 3] {
        [
            (self.l / 100.0) as f32,
            ((self.a + 128.0) / 255.0) as f32,
            ((self.b + 128.0) / 255.0) as f32,
        ]
    }

    /// 16-bit v4 encoding, clamped to the representable range
    pub fn to_encoded_v4(&self) -> [u16; 3] {
        let l = self.l.clamp(0.0, 100.0);
        let a = self.a.clamp(-128.0, 127.0);
        let b = self.b.clamp(-128.0, 127.0);
        [
            quick_saturate_word(l * 655.35),
            quick_saturate_word((a + 128.0) * 257.0),
            quick_saturate_word((b + 128.0) * 257.0),
        ]
    }

    pub fn from_encoded_v4(w: [u16; 3]) -> Self {
        Self::new(
            w[0] as f64 / 655.35,
            w[1] as f64 / 257.0 - 128.0,
            w[2] as f64 / 257.0 - 128.0,
        )
    }

    /// 16-bit v2 encoding: L tops out at 0xFF00
    pub fn to_encoded_v2(&self) -> [u16; 3] {
        let max_l = 0xFFFF as f64 * 100.0 / 0xFF00 as f64;
        let max_ab = 0xFFFF as f64 / 256.0 - 128.0;
        let l = self.l.clamp(0.0, max_l);
        let a = self.a.clamp(-128.0, max_ab);
        let b = self.b.clamp(-128.0, max_ab);
        [
            quick_saturate_word(l * 652.8),
            quick_saturate_word((a + 128.0) * 256.0),
            quick_saturate_word((b + 128.0) * 256.0),
        ]
    }

    pub fn from_encoded_v2(w: [u16; 3]) -> Self {
        Self::new(
            w[0] as f64 / 652.8,
            w[1] as f64 / 256.0 - 128.0,
            w[2] as f64 / 256.0 - 128.0,
        )
    }

    pub fn to_lch(&self) -> LCh {
        LCh {
            l: self.l,
            c: (self.a * self.a + self.b * self.b).sqrt(),
            h: atan2deg(self.b, self.a),
        }
    }

    #[inline]
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.l - other.l).abs() < epsilon
            && (self.a - other.a).abs() < epsilon
            && (self.b - other.b).abs() < epsilon
    }
}

/// Cylindrical Lab: lightness, chroma, hue in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LCh {
    pub l: f64,
    pub c: f64,
    pub h: f64,
}

impl LCh {
    pub fn to_lab(&self) -> Lab {
        let h = deg_to_rad(self.h);
        Lab::new(self.l, self.c * h.cos(), self.c * h.sin())
    }
}

#[inline]
fn lab_f(t: f64) -> f64 {
    const LIMIT: f64 = (24.0 / 116.0) * (24.0 / 116.0) * (24.0 / 116.0);

    if t <= LIMIT {
        (841.0 / 108.0) * t + (16.0 / 116.0)
    } else {
        t.cbrt()
    }
}

#[inline]
fn lab_f_inv(t: f64) -> f64 {
    const LIMIT: f64 = 24.0 / 116.0;

    if t <= LIMIT {
        (108.0 / 841.0) * (t - (16.0 / 116.0))
    } else {
        t * t * t
    }
}

/// CIE76 color difference: Euclidean distance in Lab
pub fn delta_e(lab1: Lab, lab2: Lab) -> f64 {
    let dl = lab1.l - lab2.l;
    let da = lab1.a - lab2.a;
    let db = lab1.b - lab2.b;
    (dl * dl + da * da + db * db).sqrt()
}

/// CIEDE2000 color difference
pub fn delta_e_2000(lab1: Lab, lab2: Lab) -> f64 {
    let c1 = (lab1.a * lab1.a + lab1.b * lab1.b).sqrt();
    let c2 = (lab2.a * lab2.a + lab2.b * lab2.b).sqrt();
    let c_bar_7 = ((c1 + c2) / 2.0).powi(7);
    let g = 0.5 * (1.0 - (c_bar_7 / (c_bar_7 + 25.0_f64.powi(7))).sqrt());

    let a1p = lab1.a * (1.0 + g);
    let a2p = lab2.a * (1.0 + g);
    let c1p = (a1p * a1p + lab1.b * lab1.b).sqrt();
    let c2p = (a2p * a2p + lab2.b * lab2.b).sqrt();
    let h1p = atan2deg(lab1.b, a1p);
    let h2p = atan2deg(lab2.b, a2p);

    let dl = lab2.l - lab1.l;
    let dc = c2p - c1p;
    let dh = if c1p * c2p == 0.0 {
        0.0
    } else {
        let diff = h2p - h1p;
        if diff.abs() <= 180.0 {
            diff
        } else if diff > 180.0 {
            diff - 360.0
        } else {
            diff + 360.0
        }
    };
    let d_big_h = 2.0 * (c1p * c2p).sqrt() * deg_to_rad(dh / 2.0).sin();

    let l_bar = (lab1.l + lab2.l) / 2.0;
    let c_bar_p = (c1p + c2p) / 2.0;
    let h_bar = if c1p * c2p == 0.0 {
        h1p + h2p
    } else if (h1p - h2p).abs() <= 180.0 {
        (h1p + h2p) / 2.0
    } else if h1p + h2p < 360.0 {
        (h1p + h2p + 360.0) / 2.0
    } else {
        (h1p + h2p - 360.0) / 2.0
    };

    let t = 1.0 - 0.17 * deg_to_rad(h_bar - 30.0).cos()
        + 0.24 * deg_to_rad(2.0 * h_bar).cos()
        + 0.32 * deg_to_rad(3.0 * h_bar + 6.0).cos()
        - 0.20 * deg_to_rad(4.0 * h_bar - 63.0).cos();

    let d_theta = 30.0 * (-((h_bar - 275.0) / 25.0).powi(2)).exp();
    let c_bar_p_7 = c_bar_p.powi(7);
    let r_c = 2.0 * (c_bar_p_7 / (c_bar_p_7 + 25.0_f64.powi(7))).sqrt();
    let s_l = 1.0 + (0.015 * (l_bar - 50.0).powi(2)) / (20.0 + (l_bar - 50.0).powi(2)).sqrt();
    let s_c = 1.0 + 0.045 * c_bar_p;
    let s_h = 1.0 + 0.015 * c_bar_p * t;
    let r_t = -deg_to_rad(2.0 * d_theta).sin() * r_c;

    let tl = dl / s_l;
    let tc = dc / s_c;
    let th = d_big_h / s_h;
    (tl * tl + tc * tc + th * th + r_t * tc * th).sqrt()
}
