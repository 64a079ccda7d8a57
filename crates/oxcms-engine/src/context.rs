//! Engine context and link options
//!
//! The [`Context`] carries everything construction code needs besides its
//! direct inputs: the parametric curve registry, the intent handlers, the
//! error sink and a few tunable thresholds. It is cheap to clone and is
//! shared by reference, never through global state.

use std::fmt;
use std::sync::Arc;

use crate::curve::CurveRegistry;
use crate::error::{Error, ErrorKind, ErrorSink, TracingSink};
use crate::link::IntentsList;
use crate::profile::ColorSpace;

/// Aggregate deviation from identity below which a connection matrix is skipped
pub const DEFAULT_EMPTY_LAYER_TOLERANCE: f64 = 2e-3;

/// K difference, in normalized units, treated as "already preserved"
pub const DEFAULT_K_TOLERANCE: f64 = 3.0 / 65535.0;

/// Rendering intent for a link in a profile chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderIntent {
    /// Perceptual - best for photos, maintains relative appearance
    #[default]
    Perceptual,
    /// Relative colorimetric - preserves in-gamut colors exactly
    RelativeColorimetric,
    /// Saturation - maintains saturation, good for business graphics
    Saturation,
    /// Absolute colorimetric - preserves white point
    AbsoluteColorimetric,
    /// Perceptual, keeping black-only input on the K channel
    PreserveKOnlyPerceptual,
    PreserveKOnlyRelativeColorimetric,
    PreserveKOnlySaturation,
    /// Perceptual, preserving the whole K plane
    PreserveKPlanePerceptual,
    PreserveKPlaneRelativeColorimetric,
    PreserveKPlaneSaturation,
    /// Intent code served by a caller-registered handler
    Custom(u32),
}

impl RenderIntent {
    /// Convert from an intent code
    pub fn from_icc(value: u32) -> Self {
        match value {
            0 => Self::Perceptual,
            1 => Self::RelativeColorimetric,
            2 => Self::Saturation,
            3 => Self::AbsoluteColorimetric,
            10 => Self::PreserveKOnlyPerceptual,
            11 => Self::PreserveKOnlyRelativeColorimetric,
            12 => Self::PreserveKOnlySaturation,
            13 => Self::PreserveKPlanePerceptual,
            14 => Self::PreserveKPlaneRelativeColorimetric,
            15 => Self::PreserveKPlaneSaturation,
            other => Self::Custom(other),
        }
    }

    /// Convert to an intent code
    pub fn to_icc(&self) -> u32 {
        match self {
            Self::Perceptual => 0,
            Self::RelativeColorimetric => 1,
            Self::Saturation => 2,
            Self::AbsoluteColorimetric => 3,
            Self::PreserveKOnlyPerceptual => 10,
            Self::PreserveKOnlyRelativeColorimetric => 11,
            Self::PreserveKOnlySaturation => 12,
            Self::PreserveKPlanePerceptual => 13,
            Self::PreserveKPlaneRelativeColorimetric => 14,
            Self::PreserveKPlaneSaturation => 15,
            Self::Custom(code) => *code,
        }
    }

    /// The plain ICC intent a black-preserving intent is built on.
    ///
    /// ICC intents and custom codes map to themselves.
    pub fn base_icc_intent(&self) -> Self {
        match self {
            Self::PreserveKOnlyPerceptual | Self::PreserveKPlanePerceptual => Self::Perceptual,
            Self::PreserveKOnlyRelativeColorimetric | Self::PreserveKPlaneRelativeColorimetric => {
                Self::RelativeColorimetric
            }
            Self::PreserveKOnlySaturation | Self::PreserveKPlaneSaturation => Self::Saturation,
            other => *other,
        }
    }
}

/// Options applied to a whole link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformFlags {
    /// Use black point compensation on every link
    pub black_point_compensation: bool,
    /// Append a clip stage when the output is Gray, RGB or CMYK
    pub no_negatives: bool,
    /// Favour larger CLUTs when a link has to be resampled
    pub high_res_precalc: bool,
    /// Favour smaller CLUTs when a link has to be resampled
    pub low_res_precalc: bool,
    /// Explicit grid size for resampled CLUTs, overrides the precalc hints
    pub grid_points: Option<u32>,
}

impl TransformFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable black point compensation
    pub fn with_bpc(mut self) -> Self {
        self.black_point_compensation = true;
        self
    }

    /// Clip negative output values
    pub fn with_no_negatives(mut self) -> Self {
        self.no_negatives = true;
        self
    }

    pub fn with_high_res(mut self) -> Self {
        self.high_res_precalc = true;
        self
    }

    pub fn with_low_res(mut self) -> Self {
        self.low_res_precalc = true;
        self
    }

    /// Force a grid size for resampled CLUTs
    pub fn with_grid_points(mut self, n: u32) -> Self {
        self.grid_points = Some(n);
        self
    }

    /// Grid size for a CLUT sampled over `space`
    pub fn grid_points_for(&self, space: ColorSpace) -> u32 {
        if let Some(n) = self.grid_points {
            return n;
        }

        let channels = space.channels();
        if self.high_res_precalc {
            return match channels {
                c if c > 4 => 7,
                4 => 23,
                _ => 49,
            };
        }
        if self.low_res_precalc {
            return match channels {
                c if c > 4 => 6,
                1 => 33,
                _ => 17,
            };
        }
        match channels {
            c if c > 4 => 7,
            4 => 17,
            _ => 33,
        }
    }
}

/// Shared construction context
#[derive(Clone)]
pub struct Context {
    curves: Arc<CurveRegistry>,
    intents: Arc<IntentsList>,
    sink: Arc<dyn ErrorSink>,
    adaptation_state: f64,
    empty_layer_tolerance: f64,
    k_tolerance: f64,
}

impl Context {
    /// Built-in curve families and intents, errors go to `tracing`
    pub fn new() -> Self {
        Self {
            curves: Arc::new(CurveRegistry::default()),
            intents: Arc::new(IntentsList::default()),
            sink: Arc::new(TracingSink),
            adaptation_state: 1.0,
            empty_layer_tolerance: DEFAULT_EMPTY_LAYER_TOLERANCE,
            k_tolerance: DEFAULT_K_TOLERANCE,
        }
    }

    /// Use a registry with extra curve families
    pub fn with_registry(mut self, registry: CurveRegistry) -> Self {
        self.curves = Arc::new(registry);
        self
    }

    /// Use a list with extra intent handlers
    pub fn with_intents(mut self, intents: IntentsList) -> Self {
        self.intents = Arc::new(intents);
        self
    }

    /// Route error reports to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Default adaptation state for links that do not specify one (clamped to 0..1)
    pub fn with_adaptation_state(mut self, state: f64) -> Self {
        self.adaptation_state = state.clamp(0.0, 1.0);
        self
    }

    pub fn with_empty_layer_tolerance(mut self, tolerance: f64) -> Self {
        self.empty_layer_tolerance = tolerance;
        self
    }

    pub fn with_k_tolerance(mut self, tolerance: f64) -> Self {
        self.k_tolerance = tolerance;
        self
    }

    pub fn curves(&self) -> &CurveRegistry {
        &self.curves
    }

    pub fn intents(&self) -> &IntentsList {
        &self.intents
    }

    pub fn adaptation_state(&self) -> f64 {
        self.adaptation_state
    }

    pub fn empty_layer_tolerance(&self) -> f64 {
        self.empty_layer_tolerance
    }

    pub fn k_tolerance(&self) -> f64 {
        self.k_tolerance
    }

    /// Log through the sink and hand back the matching error
    pub fn report(&self, kind: ErrorKind, message: impl Into<String>) -> Error {
        let message = message.into();
        self.sink.log_error(kind, &message);
        Error::new(kind, message)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("curve_families", &self.curves.len())
            .field("intents", &self.intents.len())
            .field("adaptation_state", &self.adaptation_state)
            .field("empty_layer_tolerance", &self.empty_layer_tolerance)
            .field("k_tolerance", &self.k_tolerance)
            .finish()
    }
}
