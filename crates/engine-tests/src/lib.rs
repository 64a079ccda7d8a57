//! # engine-tests
//!
//! Integration and parity testing for oxcms-engine.
//!
//! This crate provides:
//! - Parity tests comparing tone curves against lcms2
//! - Pipeline invariants, including concurrent evaluation of one pipeline
//! - Rendering intent composition checks on in-memory profiles
//! - Accuracy statistics that serialize to JSON for CI artifacts
//!
//! ## Test Categories
//!
//! 1. **Curves**: parametric families, tabulated curves, reversal, joining
//! 2. **Pipelines**: channel counts, CLUT nodes, batch and threaded evaluation
//! 3. **Composer**: ICC intents, BPC, absolute colorimetric, black preservation
//! 4. **Properties**: the engine's documented guarantees, one test each

pub mod accuracy;
pub mod fixtures;
pub mod patterns;

pub use accuracy::{AccuracyReport, DeltaEStats, max_code_difference, max_float_difference};
pub use patterns::{TestPattern, generate_16, generate_float, random_cmyk};
