//! Numeric foundations for the pipeline engine
//!
//! This module provides:
//! - Fixed-point encodings and 16-bit quantization
//! - 3x3 matrix operations
//! - Chromatic adaptation and color temperature
//! - Grid interpolation for lookup tables

pub mod chromatic_adaptation;
pub mod fixed;
pub mod interpolation;
pub mod matrix;

pub use chromatic_adaptation::{
    ChromaticAdaptationMethod, adapt_to_d50, adaptation_matrix, chad_to_temp, temp_from_white_point,
    temp_to_chad, white_point_from_temp,
};
pub use fixed::{
    S15Fixed16, U8Fixed8, fixed_to_word, float_to_word, quantize_val, quick_saturate_word, word_to_float,
};
pub use interpolation::{
    InterpFlags, InterpParams, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS, lerp,
};
pub use matrix::{MATRIX_DET_TOLERANCE, Matrix3x3, Vec3};
