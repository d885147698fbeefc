use thiserror::Error;

/// Errors raised by the halftoning core.
///
/// Every variant is local to a single image or channel computation. Shared radius tables are
/// only published once fully built, so an error never leaves a half-built table behind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HalftoneError {
    /// A numeric parameter is out of its valid range.
    #[error("invalid {name}: {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// The resampler name does not match any known kernel.
    #[error("unknown resampler: {0:?}")]
    UnknownResampler(String),

    /// The blur name does not match any known blur kind.
    #[error("unknown blur kind: {0:?}")]
    UnknownBlurKind(String),

    /// The color mode name does not match gray, rgb or cmyk.
    #[error("unknown color mode: {0:?}")]
    UnknownColorMode(String),

    /// The root finder ran out of iterations while inverting the occupancy function.
    #[error("radius solve for occupancy {target} did not converge within {iterations} iterations")]
    NonConvergence { target: f64, iterations: usize },

    /// A multi-band image or settings list has the wrong number of channels for its mode.
    #[error("expected {expected} channels, got {actual}")]
    ChannelCount { expected: usize, actual: usize },

    /// Bands of a multi-band image, or a raster and its backing buffer, disagree in size.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// The image encoder rejected the raster or failed to write it.
    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// Result type for halftoning operations
pub type Result<T> = std::result::Result<T, HalftoneError>;

/// Checks that `value` is finite and strictly positive.
pub(crate) fn positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(HalftoneError::InvalidParameter {
            name,
            value,
            reason: "must be a positive finite number",
        })
    }
}
