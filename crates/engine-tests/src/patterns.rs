//! Test pattern generation
//!
//! Device samples for any channel count, interleaved, in both the 16-bit
//! and the float encodings the pipelines evaluate.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Test pattern types
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// Neutral ramp: every channel equal, `n` steps from 0 to full
    Ramp(usize),
    /// Every node of a regular grid with `n` points per channel
    Grid(usize),
    /// Corners of the unit hypercube
    Corners,
    /// `count` uniformly random pixels from `seed`
    Random { seed: u64, count: usize },
    /// Single-channel ramps: each channel alone, others at zero
    Primaries(usize),
}

/// Generate a pattern as interleaved 16-bit samples
pub fn generate_16(pattern: TestPattern, channels: usize) -> Vec<u16> {
    generate_float(pattern, channels)
        .into_iter()
        .map(|v| (v as f64 * 65535.0).round() as u16)
        .collect()
}

/// Generate a pattern as interleaved samples in `[0, 1]`
pub fn generate_float(pattern: TestPattern, channels: usize) -> Vec<f32> {
    match pattern {
        TestPattern::Ramp(n) => {
            let last = n.saturating_sub(1).max(1) as f32;
            (0..n)
                .flat_map(|i| std::iter::repeat_n(i as f32 / last, channels))
                .collect()
        }
        TestPattern::Grid(n) => {
            let last = n.saturating_sub(1).max(1) as f32;
            let total = n.pow(channels as u32);
            let mut data = Vec::with_capacity(total * channels);
            for index in 0..total {
                let mut rest = index;
                let mut pixel = vec![0f32; channels];
                for c in (0..channels).rev() {
                    pixel[c] = (rest % n) as f32 / last;
                    rest /= n;
                }
                data.extend(pixel);
            }
            data
        }
        TestPattern::Corners => generate_float(TestPattern::Grid(2), channels),
        TestPattern::Random { seed, count } => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..count * channels).map(|_| rng.r#gen::<f32>()).collect()
        }
        TestPattern::Primaries(n) => {
            let last = n.saturating_sub(1).max(1) as f32;
            let mut data = Vec::with_capacity(n * channels * channels);
            for c in 0..channels {
                for i in 0..n {
                    for k in 0..channels {
                        data.push(if k == c { i as f32 / last } else { 0.0 });
                    }
                }
            }
            data
        }
    }
}

/// Random CMYK pixels keeping total ink at or below `max_ink`
pub fn random_cmyk(seed: u64, count: usize, max_ink: f32) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(count * 4);
    for _ in 0..count {
        let mut pixel: [f32; 4] = rng.r#gen();
        let sum: f32 = pixel.iter().sum();
        if sum > max_ink {
            for v in &mut pixel {
                *v *= max_ink / sum;
            }
        }
        data.extend(pixel);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_layout() {
        let grid = generate_float(TestPattern::Grid(3), 2);
        assert_eq!(grid.len(), 9 * 2);
        assert_eq!(&grid[..4], &[0.0, 0.0, 0.0, 0.5]);
        assert_eq!(&grid[16..], &[1.0, 1.0]);
    }

    #[test]
    fn test_random_is_seeded() {
        let a = generate_16(TestPattern::Random { seed: 7, count: 10 }, 3);
        let b = generate_16(TestPattern::Random { seed: 7, count: 10 }, 3);
        let c = generate_16(TestPattern::Random { seed: 8, count: 10 }, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cmyk_ink_limit() {
        let data = random_cmyk(1, 50, 2.5);
        for px in data.chunks_exact(4) {
            assert!(px.iter().sum::<f32>() <= 2.5 + 1e-5, "{px:?}");
        }
    }

    #[test]
    fn test_primaries() {
        let data = generate_16(TestPattern::Primaries(2), 3);
        assert_eq!(data.len(), 2 * 3 * 3);
        assert_eq!(&data[3..6], &[65535, 0, 0]);
        assert_eq!(&data[15..], &[0, 0, 65535]);
    }
}
