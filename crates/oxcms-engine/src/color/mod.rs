//! Colorimetric value types
//!
//! This module provides:
//! - CIE XYZ / xyY and the normalized XYZ pipeline encoding
//! - CIELAB / LCh and the Lab PCS encodings
//! - White point definitions
//! - Four-byte signatures

pub mod lab;
pub mod signature;
pub mod white_point;
pub mod xyz;

pub use lab::{LCh, Lab, delta_e, delta_e_2000};
pub use signature::Signature;
pub use white_point::{D50, D65, PERCEPTUAL_BLACK, WhitePoint};
pub use xyz::{MAX_ENCODEABLE_XYZ, XyY, Xyz};
