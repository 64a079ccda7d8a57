//! Whittaker smoothing of a curve's 16-bit table
//!
//! Solves the pentadiagonal system of a second-difference penalized least
//! squares fit (Eilers, "A perfect smoother", Anal. Chem. 2003).

use super::ToneCurve;
use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::math::fixed::quick_saturate_word;

/// Largest table the smoother accepts
pub const MAX_NODES_IN_CURVE: usize = 4097;

/// Arrays are 1-based: `w`, `y` and `z` hold `m + 1` entries, `z` gets two
/// extra for the back substitution.
fn smooth2(w: &[f32], y: &[f32], z: &mut [f32], lambda: f32, m: usize) {
    let mut c = vec![0f32; m + 1];
    let mut d = vec![0f32; m + 1];
    let mut e = vec![0f32; m + 1];

    d[1] = w[1] + lambda;
    c[1] = -2.0 * lambda / d[1];
    e[1] = lambda / d[1];
    z[1] = w[1] * y[1];
    d[2] = w[2] + 5.0 * lambda - d[1] * c[1] * c[1];
    c[2] = (-4.0 * lambda - d[1] * c[1] * e[1]) / d[2];
    e[2] = lambda / d[2];
    z[2] = w[2] * y[2] - c[1] * z[1];

    for i in 3..m - 1 {
        let (i1, i2) = (i - 1, i - 2);
        d[i] = w[i] + 6.0 * lambda - c[i1] * c[i1] * d[i1] - e[i2] * e[i2] * d[i2];
        c[i] = (-4.0 * lambda - d[i1] * c[i1] * e[i1]) / d[i];
        e[i] = lambda / d[i];
        z[i] = w[i] * y[i] - c[i1] * z[i1] - e[i2] * z[i2];
    }

    let (i1, i2) = (m - 2, m - 3);
    d[m - 1] = w[m - 1] + 5.0 * lambda - c[i1] * c[i1] * d[i1] - e[i2] * e[i2] * d[i2];
    c[m - 1] = (-2.0 * lambda - d[i1] * c[i1] * e[i1]) / d[m - 1];
    z[m - 1] = w[m - 1] * y[m - 1] - c[i1] * z[i1] - e[i2] * z[i2];

    let (i1, i2) = (m - 1, m - 2);
    d[m] = w[m] + lambda - c[i1] * c[i1] * d[i1] - e[i2] * e[i2] * d[i2];
    z[m] = (w[m] * y[m] - c[i1] * z[i1] - e[i2] * z[i2]) / d[m];
    z[m - 1] = z[m - 1] / d[m - 1] - c[m - 1] * z[m];

    for i in (1..=m - 2).rev() {
        z[i] = z[i] / d[i] - c[i] * z[i + 1] - e[i] * z[i + 2];
    }
}

impl ToneCurve {
    /// Smooth the 16-bit table in place
    ///
    /// Linear curves are left untouched. The result is rejected, and the
    /// table kept, when it is non-monotonic or more than a third of it sits
    /// at zero or at full scale. A negative `lambda` smooths with `|lambda|`
    /// and skips those checks.
    pub fn smooth(&mut self, ctx: &Context, lambda: f64) -> Result<()> {
        if self.is_linear() {
            return Ok(());
        }

        let n = self.table16.len();
        if n > MAX_NODES_IN_CURVE {
            return Err(ctx.report(
                ErrorKind::Range,
                format!("Too many points to smooth ({n}, max={MAX_NODES_IN_CURVE})"),
            ));
        }
        if n < 4 {
            return Err(ctx.report(ErrorKind::Range, format!("Too few points to smooth ({n})")));
        }

        let check = lambda >= 0.0;
        let lambda = lambda.abs() as f32;

        let mut w = vec![0f32; n + 1];
        let mut y = vec![0f32; n + 1];
        let mut z = vec![0f32; n + 2];
        for (i, &v) in self.table16.iter().enumerate() {
            y[i + 1] = v as f32;
            w[i + 1] = 1.0;
        }

        smooth2(&w, &y, &mut z, lambda, n);

        if check {
            let mut zeros = 0;
            let mut poles = 0;
            for i in (2..=n).rev() {
                if z[i] == 0.0 {
                    zeros += 1;
                }
                if z[i] >= 65535.0 {
                    poles += 1;
                }
                if z[i] < z[i - 1] {
                    return Err(ctx.report(ErrorKind::Range, "Smoothed curve is non-monotonic"));
                }
            }
            if zeros > n / 3 {
                return Err(ctx.report(ErrorKind::Range, "Smoothed curve degenerated, mostly zeros"));
            }
            if poles > n / 3 {
                return Err(ctx.report(ErrorKind::Range, "Smoothed curve degenerated, mostly poles"));
            }
        } else {
            tracing::trace!(n, lambda, "smoothing without shape checks");
        }

        for (dst, &v) in self.table16_mut().iter_mut().zip(&z[1..=n]) {
            *dst = quick_saturate_word(v as f64);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectingSink;
    use std::sync::Arc;

    #[test]
    fn test_linear_is_noop() {
        let ctx = Context::new();
        let mut curve = ToneCurve::build_gamma(&ctx, 1.0).unwrap();
        let before = curve.table16().to_vec();
        curve.smooth(&ctx, 1.0).unwrap();
        assert_eq!(curve.table16(), before.as_slice());
    }

    #[test]
    fn test_too_many_points() {
        let sink = Arc::new(CollectingSink::new());
        let ctx = Context::new().with_sink(sink.clone());
        let values: Vec<u16> = (0..5000u32).map(|i| ((i * i) / 382) as u16).collect();
        let mut curve = ToneCurve::build_tabulated_16(&ctx, &values).unwrap();
        let err = curve.smooth(&ctx, 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(curve.table16(), values.as_slice());
        assert!(sink.contains(ErrorKind::Range));
    }

    #[test]
    fn test_smooths_gamma_table() {
        let ctx = Context::new();
        let values: Vec<u16> = (0..256)
            .map(|i| quick_saturate_word((i as f64 / 255.0).powf(2.2) * 65535.0))
            .collect();
        let mut curve = ToneCurve::build_tabulated_16(&ctx, &values).unwrap();
        curve.smooth(&ctx, 1.0).unwrap();
        assert!(curve.is_monotonic());
        for (a, b) in curve.table16().iter().zip(&values) {
            assert!((*a as i32 - *b as i32).abs() <= 4, "{a} vs {b}");
        }
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let ctx = Context::new();
        let values = [0u16, 30000, 10000, 40000, 20000, 65535];
        let mut curve = ToneCurve::build_tabulated_16(&ctx, &values).unwrap();
        assert!(curve.smooth(&ctx, 0.01).is_err());
        assert_eq!(curve.table16(), &values);

        // Negative lambda skips the checks
        curve.smooth(&ctx, -0.01).unwrap();
        assert_ne!(curve.table16(), &values);
    }
}
