use crate::combine::{validate_combinations, Combination};
use crate::error::{Result, XcorrError};
use crate::geo::DEFAULT_REFERENCE_EPOCH;
use crate::preprocess::{FdStage, TdStage, ZeroPadding};

/// Parameters of one correlation call.
///
/// Fixed for the whole call and identical on every worker of the group.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationConfig {
    /// Shared sampling rate of all channels (Hz)
    pub sampling_rate: f64,
    /// One-sided lag window kept around zero lag (s)
    pub length_to_save: f64,
    /// Pairs to correlate; one output column per entry
    pub combinations: Vec<Combination>,
    /// Start time of each channel (Unix seconds)
    pub start_times: Vec<f64>,
    pub td_stages: Vec<TdStage>,
    pub fd_stages: Vec<FdStage>,
    pub zero_padding: ZeroPadding,
    pub normalize_correlation: bool,
    /// Ignore start-time offsets entirely
    pub center_correlation: bool,
    /// Anchor of the output start times (Unix seconds)
    pub reference_epoch: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 100.0,
            length_to_save: 10.0,
            combinations: Vec::new(),
            start_times: Vec::new(),
            td_stages: Vec::new(),
            fd_stages: Vec::new(),
            zero_padding: ZeroPadding::default(),
            normalize_correlation: true,
            center_correlation: false,
            reference_epoch: DEFAULT_REFERENCE_EPOCH,
        }
    }
}

impl CorrelationConfig {
    pub fn new(sampling_rate: f64, length_to_save: f64) -> Self {
        Self {
            sampling_rate,
            length_to_save,
            ..Self::default()
        }
    }

    pub fn with_combinations(mut self, combinations: Vec<Combination>) -> Self {
        self.combinations = combinations;
        self
    }

    pub fn with_start_times(mut self, start_times: Vec<f64>) -> Self {
        self.start_times = start_times;
        self
    }

    pub fn with_td_stages(mut self, stages: Vec<TdStage>) -> Self {
        self.td_stages = stages;
        self
    }

    pub fn with_fd_stages(mut self, stages: Vec<FdStage>) -> Self {
        self.fd_stages = stages;
        self
    }

    pub fn with_zero_padding(mut self, zero_padding: ZeroPadding) -> Self {
        self.zero_padding = zero_padding;
        self
    }

    pub fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize_correlation = normalize;
        self
    }

    pub fn with_centering(mut self, center: bool) -> Self {
        self.center_correlation = center;
        self
    }

    pub fn with_reference_epoch(mut self, epoch: f64) -> Self {
        self.reference_epoch = epoch;
        self
    }

    /// Samples kept on each side of zero lag.
    pub fn sample_to_save(&self) -> usize {
        (self.length_to_save * self.sampling_rate).ceil() as usize
    }

    /// Check the configuration against a channel matrix with `n_channels`
    /// columns.
    pub fn validate(&self, n_channels: usize) -> Result<()> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(XcorrError::InvalidConfig(format!(
                "sampling rate must be positive, got {}",
                self.sampling_rate
            )));
        }
        if !(self.length_to_save.is_finite() && self.length_to_save >= 0.0) {
            return Err(XcorrError::InvalidConfig(format!(
                "length to save must be non-negative, got {}",
                self.length_to_save
            )));
        }
        if !self.reference_epoch.is_finite() {
            return Err(XcorrError::InvalidConfig("reference epoch must be finite".into()));
        }
        if self.start_times.len() != n_channels {
            return Err(XcorrError::ShapeMismatch {
                expected: format!("{n_channels} start times"),
                actual: format!("{}", self.start_times.len()),
            });
        }
        validate_combinations(&self.combinations, n_channels)
    }
}
