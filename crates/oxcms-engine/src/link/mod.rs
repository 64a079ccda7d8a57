//! Rendering-intent linking
//!
//! [`link`] turns an ordered list of profiles into one [`Pipeline`]. The
//! handler is chosen by the first intent's code: the four ICC intents share
//! [`default_icc_intents`], the black-preserving intents rebuild CMYK to
//! CMYK chains as a single sampled CLUT, and callers may register handlers
//! for their own codes through [`IntentsList`].
//!
//! ```
//! use oxcms_engine::link::link;
//! use oxcms_engine::profile::{MatrixShaperProfile, Profile};
//! use oxcms_engine::{Context, RenderIntent, TransformFlags};
//!
//! let ctx = Context::new();
//! let srgb = MatrixShaperProfile::srgb(&ctx)?;
//! let chain: [&dyn Profile; 2] = [&srgb, &srgb];
//! let lut = link(
//!     &ctx,
//!     &chain,
//!     &[RenderIntent::RelativeColorimetric; 2],
//!     &[false; 2],
//!     &[1.0; 2],
//!     TransformFlags::new(),
//! )?;
//!
//! let mut out = [0f32; 3];
//! lut.eval_float(&[0.25, 0.5, 0.75], &mut out);
//! assert!((out[1] - 0.5).abs() < 1e-3);
//! # Ok::<(), oxcms_engine::Error>(())
//! ```

mod black_preserving;
mod connection;
mod default_intents;
mod detect;

pub use black_preserving::{
    black_preserving_k_only_intents, black_preserving_k_plane_intents, build_k_tone_curve,
    compute_k_to_lstar,
};
pub use connection::{Connection, absolute_intent_matrix, black_point_compensation};
pub use default_intents::default_icc_intents;
pub use detect::{detect_black_point, detect_destination_black_point, detect_tac};

use std::fmt;

use crate::context::{Context, RenderIntent, TransformFlags};
use crate::error::{ErrorKind, Result};
use crate::pipeline::Pipeline;
use crate::profile::Profile;

/// Longest profile chain a link accepts
pub const MAX_PROFILES: usize = 255;

/// Intent handler: profiles, per-link intents, BPC flags and adaptation states
pub type IntentFn = fn(
    &Context,
    &[&dyn Profile],
    &[RenderIntent],
    &[bool],
    &[f64],
    TransformFlags,
) -> Result<Pipeline>;

/// A caller-registered intent
#[derive(Clone)]
pub struct IntentEntry {
    pub code: u32,
    pub description: String,
    pub link: IntentFn,
}

impl fmt::Debug for IntentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentEntry")
            .field("code", &self.code)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

const BUILTIN_INTENTS: [(u32, &str, IntentFn); 10] = [
    (0, "Perceptual", default_icc_intents),
    (1, "Relative colorimetric", default_icc_intents),
    (2, "Saturation", default_icc_intents),
    (3, "Absolute colorimetric", default_icc_intents),
    (10, "Perceptual preserving black ink", black_preserving_k_only_intents),
    (11, "Relative colorimetric preserving black ink", black_preserving_k_only_intents),
    (12, "Saturation preserving black ink", black_preserving_k_only_intents),
    (13, "Perceptual preserving black plane", black_preserving_k_plane_intents),
    (14, "Relative colorimetric preserving black plane", black_preserving_k_plane_intents),
    (15, "Saturation preserving black plane", black_preserving_k_plane_intents),
];

/// Intent handlers by code
///
/// Registered handlers are searched before the built-in ones, newest
/// first, so a registration may override a built-in code.
#[derive(Debug, Clone, Default)]
pub struct IntentsList {
    custom: Vec<IntentEntry>,
}

impl IntentsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, code: u32, description: impl Into<String>, link: IntentFn) {
        self.custom.insert(
            0,
            IntentEntry {
                code,
                description: description.into(),
                link,
            },
        );
    }

    /// Handler and description for `code`
    pub fn lookup(&self, code: u32) -> Option<(IntentFn, &str)> {
        if let Some(entry) = self.custom.iter().find(|e| e.code == code) {
            return Some((entry.link, entry.description.as_str()));
        }
        BUILTIN_INTENTS
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, description, link)| (*link, *description))
    }

    /// Registered entries, built-ins excluded
    pub fn entries(&self) -> &[IntentEntry] {
        &self.custom
    }

    /// Number of codes served, built-ins included
    pub fn len(&self) -> usize {
        self.custom.len() + BUILTIN_INTENTS.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Codes and descriptions of every intent `ctx` can link, registered ones first
pub fn supported_intents(ctx: &Context) -> Vec<(u32, String)> {
    ctx.intents()
        .entries()
        .iter()
        .map(|e| (e.code, e.description.clone()))
        .chain(
            BUILTIN_INTENTS
                .iter()
                .map(|(code, description, _)| (*code, description.to_string())),
        )
        .collect()
}

pub(crate) fn check_chain(
    ctx: &Context,
    profiles: &[&dyn Profile],
    intents: &[RenderIntent],
    bpc: &[bool],
    adaptation: &[f64],
) -> Result<()> {
    let n = profiles.len();
    if n == 0 || n > MAX_PROFILES {
        return Err(ctx.report(
            ErrorKind::Range,
            format!("Couldn't link {n} profiles (1..={MAX_PROFILES})"),
        ));
    }
    if intents.len() != n || bpc.len() != n || adaptation.len() != n {
        return Err(ctx.report(
            ErrorKind::Range,
            format!(
                "{n} profiles need as many intents, BPC flags and adaptation states, got {}, {} and {}",
                intents.len(),
                bpc.len(),
                adaptation.len()
            ),
        ));
    }
    Ok(())
}

/// Link a profile chain into one pipeline
///
/// Per link, absolute colorimetric turns BPC off, and perceptual or
/// saturation on a v4 profile turns it on. Negative adaptation states take
/// the context default, others clamp to `[0, 1]`.
pub fn link(
    ctx: &Context,
    profiles: &[&dyn Profile],
    intents: &[RenderIntent],
    bpc: &[bool],
    adaptation: &[f64],
    flags: TransformFlags,
) -> Result<Pipeline> {
    check_chain(ctx, profiles, intents, bpc, adaptation)?;

    let mut link_bpc = Vec::with_capacity(profiles.len());
    let mut link_adaptation = Vec::with_capacity(profiles.len());
    for (i, profile) in profiles.iter().enumerate() {
        let on = match intents[i] {
            RenderIntent::AbsoluteColorimetric => false,
            RenderIntent::Perceptual | RenderIntent::Saturation if profile.version() >= 4.0 => true,
            _ => bpc[i] || flags.black_point_compensation,
        };
        link_bpc.push(on);

        let state = adaptation[i];
        link_adaptation.push(if state < 0.0 {
            ctx.adaptation_state()
        } else {
            state.clamp(0.0, 1.0)
        });
    }

    let code = intents[0].to_icc();
    let Some((handler, description)) = ctx.intents().lookup(code) else {
        return Err(ctx.report(
            ErrorKind::UnknownExtension,
            format!("Unsupported intent '{code}'"),
        ));
    };
    tracing::debug!(intent = code, description, profiles = profiles.len(), "linking profiles");

    handler(ctx, profiles, intents, &link_bpc, &link_adaptation, flags)
}
