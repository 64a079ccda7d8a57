//! Parametric curve families
//!
//! Each family is a pure function `(type, params, x) -> y`. A positive type
//! evaluates the forward formula, the negated type its inverse. Where an
//! inverse is undefined (a near-zero coefficient) the result is 0.
//!
//! | Type | Formula                                   | Params |
//! |------|-------------------------------------------|--------|
//! | 1    | `Y = X^g`                                 | 1      |
//! | 2    | `Y = (aX + b)^g`, 0 below `-b/a`          | 3      |
//! | 3    | `Y = (aX + b)^g + c`, `c` below `-b/a`    | 4      |
//! | 4    | `Y = (aX + b)^g` above `d`, `cX` below    | 5      |
//! | 5    | `Y = (aX + b)^g + e` above `d`, `cX + f`  | 7      |
//! | 6    | `Y = (aX + b)^g + c`                      | 4      |
//! | 7    | `Y = a log10(b X^g + c) + d`              | 5      |
//! | 8    | `Y = a b^(cX + d) + e`                    | 5      |
//! | 108  | `Y = (1 - (1 - X)^(1/g))^(1/g)`           | 1      |
//! | 109  | normalized logistic sigmoid of slope `k`  | 1      |

use crate::math::MATRIX_DET_TOLERANCE;

/// Out-of-domain marker returned by segmented evaluation
pub const MINUS_INF: f64 = -1e22;

/// Saturated marker for an unbounded inverse
pub const PLUS_INF: f64 = 1e22;

/// Evaluator shared by every type of a family
pub type ParametricFn = fn(i32, &[f64], f64) -> f64;

/// Maximum number of parameters a segment stores
pub const MAX_PARAMS: usize = 10;

/// A set of parametric types sharing one evaluator
#[derive(Debug, Clone)]
pub struct CurveFamily {
    /// Positive type codes handled by `eval`
    pub types: Vec<i32>,
    /// Parameter count per entry of `types`
    pub param_counts: Vec<usize>,
    pub eval: ParametricFn,
}

impl CurveFamily {
    fn param_count_of(&self, curve_type: i32) -> Option<usize> {
        let wanted = curve_type.abs();
        self.types
            .iter()
            .position(|&t| t == wanted)
            .and_then(|i| self.param_counts.get(i).copied())
    }
}

const BUILTIN_TYPES: [i32; 10] = [1, 2, 3, 4, 5, 6, 7, 8, 108, 109];
const BUILTIN_COUNTS: [usize; 10] = [1, 3, 4, 5, 7, 4, 5, 5, 1, 1];

/// Curve families visible to curve builders
///
/// Caller-registered families are searched first, most recent first, and
/// lookup falls back to the built-in set.
#[derive(Debug, Clone, Default)]
pub struct CurveRegistry {
    custom: Vec<CurveFamily>,
}

impl CurveRegistry {
    /// Registry holding only the built-in families
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a family; its types shadow built-ins with the same code
    pub fn register(&mut self, family: CurveFamily) {
        self.custom.push(family);
    }

    /// Resolve a (possibly negative) type to its evaluator and parameter count
    pub fn lookup(&self, curve_type: i32) -> Option<(ParametricFn, usize)> {
        for family in self.custom.iter().rev() {
            if let Some(count) = family.param_count_of(curve_type) {
                return Some((family.eval, count));
            }
        }
        let wanted = curve_type.abs();
        BUILTIN_TYPES
            .iter()
            .position(|&t| t == wanted)
            .map(|i| (default_eval as ParametricFn, BUILTIN_COUNTS[i]))
    }

    /// Number of distinct type codes known
    pub fn len(&self) -> usize {
        let custom: usize = self.custom.iter().map(|f| f.types.len()).sum();
        custom + BUILTIN_TYPES.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[inline]
fn near_zero(v: f64) -> bool {
    v.abs() < MATRIX_DET_TOLERANCE
}

fn sigmoid_base(k: f64, t: f64) -> f64 {
    (1.0 / (1.0 + (-k * t).exp())) - 0.5
}

fn inverted_sigmoid_base(k: f64, t: f64) -> f64 {
    -((1.0 / (t + 0.5)) - 1.0).ln() / k
}

fn sigmoid(k: f64, t: f64) -> f64 {
    let correction = 0.5 / sigmoid_base(k, 1.0);
    correction * sigmoid_base(k, 2.0 * t - 1.0) + 0.5
}

fn inverse_sigmoid(k: f64, t: f64) -> f64 {
    let correction = 0.5 / sigmoid_base(k, 1.0);
    (inverted_sigmoid_base(k, (t - 0.5) / correction) + 1.0) / 2.0
}

/// Evaluator of the built-in families
pub fn default_eval(curve_type: i32, p: &[f64], r: f64) -> f64 {
    let param = |i: usize| p.get(i).copied().unwrap_or(0.0);
    let (g, a, b, c, d, e, f) = (
        param(0),
        param(1),
        param(2),
        param(3),
        param(4),
        param(5),
        param(6),
    );

    match curve_type {
        1 => {
            if r < 0.0 {
                if near_zero(g - 1.0) { r } else { 0.0 }
            } else {
                r.powf(g)
            }
        }
        -1 => {
            if r < 0.0 {
                if near_zero(g - 1.0) { r } else { 0.0 }
            } else if near_zero(g) {
                PLUS_INF
            } else {
                r.powf(1.0 / g)
            }
        }

        2 => {
            if near_zero(a) {
                return 0.0;
            }
            let disc = -b / a;
            if r >= disc {
                let base = a * r + b;
                if base > 0.0 { base.powf(g) } else { 0.0 }
            } else {
                0.0
            }
        }
        -2 => {
            if near_zero(g) || near_zero(a) || r < 0.0 {
                return 0.0;
            }
            ((r.powf(1.0 / g) - b) / a).max(0.0)
        }

        3 => {
            if near_zero(a) {
                return 0.0;
            }
            let disc = (-b / a).max(0.0);
            if r >= disc {
                let base = a * r + b;
                if base > 0.0 { base.powf(g) + c } else { 0.0 }
            } else {
                c
            }
        }
        -3 => {
            if near_zero(g) || near_zero(a) {
                return 0.0;
            }
            if r >= c {
                let base = r - c;
                if base > 0.0 {
                    (base.powf(1.0 / g) - b) / a
                } else {
                    0.0
                }
            } else {
                -b / a
            }
        }

        4 => {
            if r >= d {
                let base = a * r + b;
                if base > 0.0 { base.powf(g) } else { 0.0 }
            } else {
                r * c
            }
        }
        -4 => {
            let base = a * d + b;
            let disc = if base < 0.0 { 0.0 } else { base.powf(g) };
            if r >= disc {
                if near_zero(g) || near_zero(a) {
                    0.0
                } else {
                    (r.powf(1.0 / g) - b) / a
                }
            } else if near_zero(c) {
                0.0
            } else {
                r / c
            }
        }

        5 => {
            if r >= d {
                let base = a * r + b;
                if base > 0.0 { base.powf(g) + e } else { e }
            } else {
                r * c + f
            }
        }
        -5 => {
            let disc = c * d + f;
            if r >= disc {
                let base = r - e;
                if base < 0.0 || near_zero(g) || near_zero(a) {
                    0.0
                } else {
                    (base.powf(1.0 / g) - b) / a
                }
            } else if near_zero(c) {
                0.0
            } else {
                (r - f) / c
            }
        }

        6 => {
            let base = a * r + b;
            // Unity gamma is a plain affine map and stays unclamped
            if g == 1.0 {
                base + c
            } else if base < 0.0 {
                c
            } else {
                base.powf(g) + c
            }
        }
        -6 => {
            if near_zero(g) || near_zero(a) {
                return 0.0;
            }
            let base = r - c;
            if base < 0.0 {
                0.0
            } else {
                (base.powf(1.0 / g) - b) / a
            }
        }

        // Params: g, a, b, c, d
        7 => {
            let base = b * r.powf(g) + c;
            if base <= 0.0 { d } else { a * base.log10() + d }
        }
        -7 => {
            if near_zero(g) || near_zero(a) || near_zero(b) {
                return 0.0;
            }
            ((10f64.powf((r - d) / a) - c) / b).powf(1.0 / g)
        }

        // Params: a, b, c, d, e (stored in the g..d slots)
        8 => g * a.powf(b * r + c) + d,
        -8 => {
            if near_zero(g) || near_zero(b) {
                return 0.0;
            }
            let disc = r - d;
            if disc < 0.0 {
                0.0
            } else {
                ((disc / g).ln() / a.ln() - c) / b
            }
        }

        108 => {
            if near_zero(g) {
                0.0
            } else {
                (1.0 - (1.0 - r).powf(1.0 / g)).powf(1.0 / g)
            }
        }
        -108 => 1.0 - (1.0 - r.powf(g)).powf(g),

        109 => sigmoid(g, r),
        -109 => inverse_sigmoid(g, r),

        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-4;

    fn roundtrip(curve_type: i32, params: &[f64], lo: f64, hi: f64) {
        for i in 1..100 {
            let x = lo + (hi - lo) * i as f64 / 100.0;
            let y = default_eval(curve_type, params, x);
            let back = default_eval(-curve_type, params, y);
            assert!(
                (back - x).abs() < EPSILON,
                "type {curve_type}: x={x} → y={y} → {back}"
            );
        }
    }

    #[test]
    fn test_gamma() {
        assert!((default_eval(1, &[2.2], 0.5) - 0.2176).abs() < 1e-4);
        assert_eq!(default_eval(1, &[1.0], -0.25), -0.25);
        assert_eq!(default_eval(1, &[2.2], -0.25), 0.0);
        assert_eq!(default_eval(-1, &[0.0], 0.5), PLUS_INF);
        roundtrip(1, &[2.2], 0.0, 1.0);
    }

    #[test]
    fn test_cie122_and_iec61966_3() {
        let p = [2.4, 1.0 / 1.055, 0.055 / 1.055];
        roundtrip(2, &p, 0.0, 1.0);
        let p3 = [2.4, 0.9, 0.1, 0.05];
        roundtrip(3, &p3, 0.0, 1.0);
        assert_eq!(default_eval(2, &[2.0, 0.0, 0.5], 0.5), 0.0);
    }

    #[test]
    fn test_srgb_family() {
        let srgb = [2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045];
        assert!((default_eval(4, &srgb, 0.5) - 0.214041).abs() < 1e-5);
        roundtrip(4, &srgb, 0.0, 1.0);

        let p5 = [2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045, 0.01, 0.0];
        roundtrip(5, &p5, 0.0, 1.0);
    }

    #[test]
    fn test_type_6_unity_gamma_unclamped() {
        assert!((default_eval(6, &[1.0, 2.0, -1.0, 0.0], 0.25) + 0.5).abs() < 1e-12);
        assert_eq!(default_eval(6, &[2.0, 2.0, -1.0, 0.1], 0.25), 0.1);
        roundtrip(6, &[1.8, 0.9, 0.1, 0.0], 0.0, 1.0);
    }

    #[test]
    fn test_log_and_exp_families() {
        roundtrip(7, &[1.5, 0.5, 2.0, 1.0, 0.1], 0.0, 1.0);
        roundtrip(8, &[0.5, 2.0, 1.5, 0.1, 0.05], 0.0, 1.0);
    }

    #[test]
    fn test_s_shaped_and_sigmoid() {
        roundtrip(108, &[1.6], 0.0, 1.0);
        roundtrip(109, &[5.0], 0.0, 1.0);
        assert!((default_eval(109, &[5.0], 0.5) - 0.5).abs() < 1e-12);
        assert!((default_eval(109, &[5.0], 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inverse_is_zero() {
        assert_eq!(default_eval(-2, &[2.0, 0.0, 0.1], 0.5), 0.0);
        assert_eq!(default_eval(-6, &[0.0, 1.0, 0.0, 0.0], 0.5), 0.0);
        assert_eq!(default_eval(-7, &[1.0, 0.0, 1.0, 0.0, 0.0], 0.5), 0.0);
    }

    #[test]
    fn test_registry_lookup() {
        let reg = CurveRegistry::new();
        assert_eq!(reg.lookup(4).map(|(_, n)| n), Some(5));
        assert_eq!(reg.lookup(-109).map(|(_, n)| n), Some(1));
        assert!(reg.lookup(42).is_none());
        assert_eq!(reg.len(), 10);
    }

    #[test]
    fn test_registry_custom_family() {
        fn linear(curve_type: i32, p: &[f64], x: f64) -> f64 {
            if curve_type > 0 { p[0] * x } else { x / p[0] }
        }
        let mut reg = CurveRegistry::new();
        reg.register(CurveFamily {
            types: vec![500],
            param_counts: vec![1],
            eval: linear,
        });
        let (eval, count) = reg.lookup(-500).unwrap();
        assert_eq!(count, 1);
        assert_eq!(eval(-500, &[2.0], 1.0), 0.5);
        assert_eq!(reg.len(), 11);
    }
}
