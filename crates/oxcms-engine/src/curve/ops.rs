//! Curve inversion, composition and gamma estimation

use super::{DEFAULT_TABLE_ENTRIES, ToneCurve};
use crate::context::Context;
use crate::error::Result;
use crate::math::fixed::quick_saturate_word;

/// Number of points sampled by [`ToneCurve::estimate_gamma`]
const GAMMA_PROBE_POINTS: usize = 4097;

/// Index of the table interval bracketing `y`, scanning from the end the
/// table rises toward
fn get_interval(y: f64, table: &[u16]) -> Option<usize> {
    let domain = table.len().checked_sub(1)?;
    if domain < 1 {
        return None;
    }

    let contains = |i: usize| {
        let y0 = table[i] as f64;
        let y1 = table[i + 1] as f64;
        if y0 <= y1 {
            y >= y0 && y <= y1
        } else {
            y >= y1 && y <= y0
        }
    };

    if table[0] < table[domain] {
        (0..domain).rev().find(|&i| contains(i))
    } else {
        (0..domain).find(|&i| contains(i))
    }
}

impl ToneCurve {
    /// Inverse curve with the default 4096 samples
    pub fn reverse(&self, ctx: &Context) -> Result<ToneCurve> {
        self.reverse_ex(ctx, DEFAULT_TABLE_ENTRIES)
    }

    /// Inverse curve
    ///
    /// Single-segment curves of a known family invert analytically;
    /// anything else is inverted numerically into `n_samples` table
    /// entries.
    pub fn reverse_ex(&self, ctx: &Context, n_samples: usize) -> Result<ToneCurve> {
        if let [only] = self.segments.as_slice() {
            if only.kind > 0 && ctx.curves().lookup(only.kind).is_some() {
                return ToneCurve::build_parametric(ctx, -only.kind, &only.params);
            }
        }

        let ascending = !self.is_descending();
        let n_in = self.table16.len();
        let last_out = n_samples.saturating_sub(1).max(1) as f64;

        let mut out = vec![0u16; n_samples];
        let (mut a, mut b) = (0.0f64, 0.0f64);
        for (i, slot) in out.iter_mut().enumerate() {
            let y = i as f64 * 65535.0 / last_out;

            if let Some(j) = get_interval(y, &self.table16) {
                let x1 = self.table16[j] as f64;
                let x2 = self.table16[j + 1] as f64;
                let y1 = (j as f64 * 65535.0) / (n_in - 1) as f64;
                let y2 = ((j + 1) as f64 * 65535.0) / (n_in - 1) as f64;

                if x1 == x2 {
                    *slot = quick_saturate_word(if ascending { y2 } else { y1 });
                    continue;
                }
                a = (y2 - y1) / (x2 - x1);
                b = y2 - a * x2;
            }
            *slot = quick_saturate_word(a * y + b);
        }

        ToneCurve::build_tabulated_16(ctx, &out)
    }

    /// Compose `self` with the inverse of `y`, sampled at `n_points`
    pub fn join(&self, ctx: &Context, y: &ToneCurve, n_points: usize) -> Result<ToneCurve> {
        let inverse_y = y.reverse(ctx)?;
        let last = n_points.saturating_sub(1).max(1) as f32;

        let samples: Vec<f32> = (0..n_points)
            .map(|i| {
                let t = i as f32 / last;
                inverse_y.eval_float(self.eval_float(t))
            })
            .collect();

        ToneCurve::build_tabulated_float(ctx, &samples)
    }

    /// Best single exponent approximating the curve
    ///
    /// Returns -1 when too few samples qualify or the per-sample exponents
    /// spread more than `precision`.
    pub fn estimate_gamma(&self, precision: f64) -> f64 {
        let mut sum = 0.0;
        let mut sum2 = 0.0;
        let mut n = 0.0;

        let last = (GAMMA_PROBE_POINTS - 1) as f64;
        for i in 1..GAMMA_PROBE_POINTS - 1 {
            let x = i as f64 / last;
            let y = self.eval_float(x as f32) as f64;

            // The low end is often a linear toe
            if y > 0.0 && y < 1.0 && x > 0.07 {
                let gamma = y.ln() / x.ln();
                sum += gamma;
                sum2 += gamma * gamma;
                n += 1.0;
            }
        }

        if n <= 1.0 {
            return -1.0;
        }

        let std = ((n * sum2 - sum * sum) / (n * (n - 1.0))).sqrt();
        if std > precision {
            return -1.0;
        }
        sum / n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ctx() -> Context {
        Context::new()
    }

    #[test]
    fn test_reverse_is_analytic_for_parametric() {
        let ctx = ctx();
        let curve = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
        let inverse = curve.reverse(&ctx).unwrap();
        assert_eq!(inverse.parametric_type(), -1);
        assert!((inverse.eval_float(0.2176) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_reverse_table() {
        let ctx = ctx();
        let values: Vec<u16> = (0..256)
            .map(|i| quick_saturate_word((i as f64 / 255.0).powf(1.8) * 65535.0))
            .collect();
        let curve = ToneCurve::build_tabulated_16(&ctx, &values).unwrap();
        let inverse = curve.reverse(&ctx).unwrap();
        assert_eq!(inverse.table_len(), DEFAULT_TABLE_ENTRIES);

        for x in [0.1f32, 0.3, 0.5, 0.8] {
            let y = curve.eval_float(x);
            let back = inverse.eval_float(y);
            assert!((back - x).abs() < 2e-3, "{x} → {y} → {back}");
        }
    }

    #[test]
    fn test_reverse_descending_table() {
        let ctx = ctx();
        let curve = ToneCurve::build_tabulated_16(&ctx, &[0xFFFF, 0x8000, 0]).unwrap();
        let inverse = curve.reverse_ex(&ctx, 3).unwrap();
        assert_eq!(inverse.table16(), &[0xFFFF, 0x8000, 0]);
    }

    #[test]
    fn test_reverse_prefers_topmost_interval() {
        let ctx = ctx();
        let curve = ToneCurve::build_tabulated_16(&ctx, &[0, 0, 0xFFFF]).unwrap();
        let inverse = curve.reverse_ex(&ctx, 2).unwrap();
        // y = 0 is bracketed by both intervals; the upper one wins
        assert_eq!(inverse.table16()[0], 0x8000);
        assert_eq!(inverse.table16()[1], 0xFFFF);
    }

    #[test]
    fn test_reverse_rejects_single_sample() {
        let ctx = ctx();
        let curve = ToneCurve::build_tabulated_16(&ctx, &[0, 0xFFFF]).unwrap();
        let err = curve.reverse_ex(&ctx, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_join_with_self_is_identity() {
        let ctx = ctx();
        let curve = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
        let joined = curve.join(&ctx, &curve, 256).unwrap();
        for x in [0.1f32, 0.4, 0.7, 1.0] {
            assert!((joined.eval_float(x) - x).abs() < 1e-3, "x={x}");
        }
    }

    #[test]
    fn test_join_composes() {
        let ctx = ctx();
        let g22 = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
        let g11 = ToneCurve::build_gamma(&ctx, 1.1).unwrap();
        // x^2.2 then y^(1/1.1) = x^2
        let joined = g22.join(&ctx, &g11, 1024).unwrap();
        assert!((joined.eval_float(0.5) - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_estimate_gamma() {
        let ctx = ctx();
        let curve = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
        assert!((curve.estimate_gamma(0.01) - 2.2).abs() < 1e-3);

        let srgb = ToneCurve::build_parametric(
            &ctx,
            4,
            &[2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045],
        )
        .unwrap();
        assert_eq!(srgb.estimate_gamma(0.01), -1.0);
        let loose = srgb.estimate_gamma(1.0);
        assert!(loose > 2.0 && loose < 2.4, "sRGB approx gamma {loose}");
    }
}
