//! Accuracy measurement using perceptual color difference metrics
//!
//! Uses CIEDE2000 (deltaE2000) as the primary metric for colorimetric
//! results and the largest code difference for device results.

use oxcms_engine::Lab;
use oxcms_engine::color::delta_e_2000;
use serde::Serialize;

/// Statistics from a deltaE comparison
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeltaEStats {
    /// Mean deltaE across all samples
    pub mean: f64,
    /// Maximum deltaE
    pub max: f64,
    /// 95th percentile deltaE
    pub p95: f64,
    /// Number of samples
    pub count: usize,
}

impl DeltaEStats {
    /// Statistics over pairs of expected and actual colors
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Lab, Lab)>) -> Self {
        let mut values: Vec<f64> = pairs.into_iter().map(|(a, b)| delta_e_2000(a, b)).collect();
        Self::from_values(&mut values)
    }

    /// Statistics over precomputed differences
    pub fn from_values(values: &mut [f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let p95_index = ((count as f64 * 0.95) as usize).min(count - 1);

        Self {
            mean,
            max: values[count - 1],
            p95: values[p95_index],
            count,
        }
    }

    /// Check if all differences are imperceptible (deltaE < 1.0)
    pub fn is_excellent(&self) -> bool {
        self.max < 1.0
    }

    /// Check if differences are acceptable (deltaE < 3.5)
    pub fn is_acceptable(&self) -> bool {
        self.max < 3.5
    }
}

/// Largest per-channel difference between two 16-bit buffers
pub fn max_code_difference(expected: &[u16], actual: &[u16]) -> u16 {
    expected
        .iter()
        .zip(actual)
        .map(|(&e, &a)| e.abs_diff(a))
        .max()
        .unwrap_or(0)
}

/// Largest per-channel difference between two float buffers
pub fn max_float_difference(expected: &[f32], actual: &[f32]) -> f32 {
    expected
        .iter()
        .zip(actual)
        .map(|(e, a)| (e - a).abs())
        .fold(0.0, f32::max)
}

/// One named measurement, serializable for CI artifacts
#[derive(Debug, Clone, Serialize)]
pub struct AccuracyReport {
    pub name: String,
    pub delta_e: Option<DeltaEStats>,
    pub max_code_difference: Option<u16>,
    pub max_float_difference: Option<f32>,
    pub notes: Vec<String>,
}

impl AccuracyReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delta_e: None,
            max_code_difference: None,
            max_float_difference: None,
            notes: Vec::new(),
        }
    }

    pub fn with_delta_e(mut self, stats: DeltaEStats) -> Self {
        self.delta_e = Some(stats);
        self
    }

    pub fn with_codes(mut self, expected: &[u16], actual: &[u16]) -> Self {
        self.max_code_difference = Some(max_code_difference(expected, actual));
        self
    }

    pub fn with_floats(mut self, expected: &[f32], actual: &[f32]) -> Self {
        self.max_float_difference = Some(max_float_difference(expected, actual));
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
