//! Error types for the correlation engine.

use thiserror::Error;

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, XcorrError>;

/// Errors that can abort a correlation call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XcorrError {
    /// Zero-padding mode name not recognised
    #[error("type '{0}' of zero padding not implemented")]
    UnsupportedZeroPadding(String),

    /// Lag window does not fit into the transform
    #[error("lag window of {sample_to_save} samples exceeds half the transform length {fft_len}")]
    LagWindowTooLong { sample_to_save: usize, fft_len: usize },

    /// Preprocessing stage name not recognised
    #[error("unknown preprocessing stage '{0}'")]
    UnknownStage(String),

    /// Preprocessing stage received an unusable argument
    #[error("invalid argument for stage '{stage}': {reason}")]
    InvalidStageArgument { stage: String, reason: String },

    #[error("unknown pairing policy '{0}'")]
    UnknownPairingPolicy(String),

    /// Combination references a missing channel or is repeated
    #[error("invalid combination ({first}, {second}): {reason}")]
    InvalidCombination {
        first: usize,
        second: usize,
        reason: String,
    },

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("sampling rate mismatch: channel {index} has {found} Hz, expected {expected} Hz")]
    SamplingRateMismatch {
        index: usize,
        expected: f64,
        found: f64,
    },

    /// Raised on healthy workers when another worker failed before a collective
    #[error("{failed} worker(s) in the group failed; aborting call")]
    PeerFailed { failed: usize },

    /// Underlying transform error from realfft
    #[error("FFT error: {0}")]
    Fft(String),

    #[error("worker group error: {0}")]
    Group(String),
}

impl From<realfft::FftError> for XcorrError {
    fn from(err: realfft::FftError) -> Self {
        XcorrError::Fft(err.to_string())
    }
}

impl XcorrError {
    pub(crate) fn stage_arg(stage: &str, reason: impl Into<String>) -> Self {
        XcorrError::InvalidStageArgument {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }
}
