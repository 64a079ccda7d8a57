//! # oxcms-engine - color pipeline construction and evaluation
//!
//! The engine behind a color management system: everything between
//! parsed profiles and pixels.
//!
//! ## Layers
//!
//! - [`math`]: fixed-point helpers, 3x3 matrices, chromatic adaptation and
//!   multidimensional interpolation
//! - [`curve`]: parametric, segmented and tabulated tone curves with
//!   reversal, joining and smoothing
//! - [`pipeline`]: stages (curves, matrices, CLUTs, PCS conversions, named
//!   colors) chained into pipelines with 16-bit and float evaluation
//! - [`link`]: rendering intents that turn a chain of profiles into one
//!   pipeline, with black point compensation, absolute colorimetric
//!   scaling and black-preserving CMYK intents
//! - [`profile`]: what the linker needs from a profile, plus built-in
//!   matrix-shaper, gray, Lab, XYZ and table driven profiles
//!
//! ## Quick Start
//!
//! ```
//! use oxcms_engine::link::link;
//! use oxcms_engine::profile::{LabIdentityProfile, MatrixShaperProfile, Profile};
//! use oxcms_engine::{Context, RenderIntent, TransformFlags};
//!
//! let ctx = Context::new();
//! let srgb = MatrixShaperProfile::srgb(&ctx)?;
//! let lab = LabIdentityProfile::v4();
//! let chain: [&dyn Profile; 2] = [&srgb, &lab];
//!
//! let lut = link(
//!     &ctx,
//!     &chain,
//!     &[RenderIntent::Perceptual; 2],
//!     &[false; 2],
//!     &[1.0; 2],
//!     TransformFlags::new(),
//! )?;
//!
//! // Lab comes out in the normalized PCS encoding, L* / 100 first
//! let mut out = [0u16; 3];
//! lut.eval_16(&[65535, 65535, 65535], &mut out);
//! assert!(out[0] > 65000);
//! # Ok::<(), oxcms_engine::Error>(())
//! ```

pub mod color;
pub mod context;
pub mod curve;
pub mod error;
pub mod link;
pub mod math;
pub mod pipeline;
pub mod profile;

pub use color::{D50, D65, Lab, Signature, Xyz};
pub use context::{Context, RenderIntent, TransformFlags};
pub use curve::{CurveRegistry, CurveSegment, ToneCurve};
pub use error::{CollectingSink, Error, ErrorKind, ErrorSink, Result, TracingSink};
pub use link::{IntentsList, link};
pub use math::Matrix3x3;
pub use pipeline::{NamedColorList, Pipeline, Stage, StageLoc};
pub use profile::{ColorSpace, Profile, ProfileClass};

/// Version of oxcms-engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
