//! Chromatic adaptation and correlated color temperature
//!
//! Adaptation matrices scale cone responses by the ratio of the two white
//! points. Temperature conversions follow the CIE daylight locus (forward)
//! and Robertson's isotemperature lines (backward); together they let the
//! absolute colorimetric connection blend between two adaptation states.
//!
//! References:
//! - ICC.1:2022 Annex E
//! - Wyszecki & Stiles, Color Science, 2nd ed.

use crate::color::{D50, XyY, Xyz};
use crate::math::{MATRIX_DET_TOLERANCE, Matrix3x3};

/// Chromatic adaptation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaticAdaptationMethod {
    /// Bradford adaptation (ICC default)
    #[default]
    Bradford,
    VonKries,
    /// Plain XYZ scaling
    XyzScaling,
}

/// Bradford matrix: XYZ → LMS (cone response)
const BRADFORD_XYZ_TO_LMS: Matrix3x3 = Matrix3x3::new([
    [0.8951, 0.2664, -0.1614],
    [-0.7502, 1.7135, 0.0367],
    [0.0389, -0.0685, 1.0296],
]);

const VON_KRIES_XYZ_TO_LMS: Matrix3x3 = Matrix3x3::new([
    [0.40024, 0.70760, -0.08081],
    [-0.22630, 1.16532, 0.04570],
    [0.0, 0.0, 0.91822],
]);

impl ChromaticAdaptationMethod {
    fn cone_matrix(self) -> Matrix3x3 {
        match self {
            Self::Bradford => BRADFORD_XYZ_TO_LMS,
            Self::VonKries => VON_KRIES_XYZ_TO_LMS,
            Self::XyzScaling => Matrix3x3::identity(),
        }
    }
}

/// Matrix taking colors seen under `from` to colors seen under `to`.
///
/// Returns None when the cone matrix is singular or a white point has a
/// vanishing cone response.
pub fn adaptation_matrix(
    from: Xyz,
    to: Xyz,
    method: ChromaticAdaptationMethod,
) -> Option<Matrix3x3> {
    let cone = method.cone_matrix();
    let cone_inv = cone.inverse()?;

    let src = cone.multiply_vec(from.to_array());
    let dst = cone.multiply_vec(to.to_array());

    if src.iter().any(|v| v.abs() < MATRIX_DET_TOLERANCE)
        || dst.iter().any(|v| v.abs() < MATRIX_DET_TOLERANCE)
    {
        return None;
    }

    let scale = Matrix3x3::diagonal(dst[0] / src[0], dst[1] / src[1], dst[2] / src[2]);
    Some(cone_inv.multiply(&scale.multiply(&cone)))
}

/// Bradford matrix from `white` to the D50 PCS illuminant
pub fn adapt_to_d50(white: Xyz) -> Option<Matrix3x3> {
    adaptation_matrix(white, D50.xyz, ChromaticAdaptationMethod::Bradford)
}

/// Chromaticity of the CIE daylight illuminant at `temp_k` (4000 K to 25000 K)
pub fn white_point_from_temp(temp_k: f64) -> Option<XyY> {
    let t = temp_k;
    let t2 = t * t;
    let t3 = t2 * t;

    let x = if (4000.0..=7000.0).contains(&t) {
        -4.6070 * (1e9 / t3) + 2.9678 * (1e6 / t2) + 0.09911 * (1e3 / t) + 0.244063
    } else if t > 7000.0 && t <= 25000.0 {
        -2.0064 * (1e9 / t3) + 1.9018 * (1e6 / t2) + 0.24748 * (1e3 / t) + 0.237040
    } else {
        return None;
    };

    let y = -3.000 * (x * x) + 2.870 * x - 0.275;
    Some(XyY::new(x, y, 1.0))
}

/// Robertson isotemperature table: (mirek, u, v, slope)
const ISOTEMPERATURE: [(f64, f64, f64, f64); 31] = [
    (0.0, 0.18006, 0.26352, -0.24341),
    (10.0, 0.18066, 0.26589, -0.25479),
    (20.0, 0.18133, 0.26846, -0.26876),
    (30.0, 0.18208, 0.27119, -0.28539),
    (40.0, 0.18293, 0.27407, -0.30470),
    (50.0, 0.18388, 0.27709, -0.32675),
    (60.0, 0.18494, 0.28021, -0.35156),
    (70.0, 0.18611, 0.28342, -0.37915),
    (80.0, 0.18740, 0.28668, -0.40955),
    (90.0, 0.18880, 0.28997, -0.44278),
    (100.0, 0.19032, 0.29326, -0.47888),
    (125.0, 0.19462, 0.30141, -0.58204),
    (150.0, 0.19962, 0.30921, -0.70471),
    (175.0, 0.20525, 0.31647, -0.84901),
    (200.0, 0.21142, 0.32312, -1.0182),
    (225.0, 0.21807, 0.32909, -1.2168),
    (250.0, 0.22511, 0.33439, -1.4512),
    (275.0, 0.23247, 0.33904, -1.7298),
    (300.0, 0.24010, 0.34308, -2.0637),
    (325.0, 0.24702, 0.34655, -2.4681),
    (350.0, 0.25591, 0.34951, -2.9641),
    (375.0, 0.26400, 0.35200, -3.5814),
    (400.0, 0.27218, 0.35407, -4.3633),
    (425.0, 0.28039, 0.35577, -5.3762),
    (450.0, 0.28863, 0.35714, -6.7262),
    (475.0, 0.29685, 0.35823, -8.5955),
    (500.0, 0.30505, 0.35907, -11.324),
    (525.0, 0.31320, 0.35968, -15.628),
    (550.0, 0.32129, 0.36011, -23.325),
    (575.0, 0.32931, 0.36038, -40.770),
    (600.0, 0.33724, 0.36051, -116.45),
];

/// Correlated color temperature of a chromaticity, in kelvin
pub fn temp_from_white_point(white: XyY) -> Option<f64> {
    let (xs, ys) = (white.x, white.y);
    let denom = -xs + 6.0 * ys + 1.5;
    let us = (2.0 * xs) / denom;
    let vs = (3.0 * ys) / denom;

    let mut di = 0.0;
    let mut mi = 0.0;
    for (j, &(mj, uj, vj, tj)) in ISOTEMPERATURE.iter().enumerate() {
        let dj = ((vs - vj) - tj * (us - uj)) / (1.0 + tj * tj).sqrt();
        if j != 0 && di / dj < 0.0 {
            return Some(1_000_000.0 / (mi + (di / (di - dj)) * (mj - mi)));
        }
        di = dj;
        mi = mj;
    }
    None
}

/// Temperature of the white point a CHAD maps onto D50
pub fn chad_to_temp(chad: &Matrix3x3) -> Option<f64> {
    let inv = chad.inverse()?;
    let white = Xyz::from_array(inv.multiply_vec(D50.xyz.to_array()));
    temp_from_white_point(white.to_xyy())
}

/// Bradford CHAD from the daylight white at `temp_k` to D50
pub fn temp_to_chad(temp_k: f64) -> Option<Matrix3x3> {
    let white = white_point_from_temp(temp_k)?.to_xyz();
    adapt_to_d50(white)
}
