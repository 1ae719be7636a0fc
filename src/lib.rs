//! Distributed ambient-noise cross-correlation of seismic channels.
//!
//! A group of cooperating workers runs [`Engine::correlate`] on the same
//! channel matrix. Each worker preprocesses and transforms the channels it
//! owns, the spectra are sum-reduced, each worker correlates the pairs it
//! owns and the correlation matrix is sum-reduced again, so every worker ends
//! with the full result.

pub mod combine;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod geo;
pub mod group;
pub mod matrix;
pub mod partition;
pub mod preprocess;
pub mod reduce;
pub mod rotate;
pub mod trace;
pub mod utils;
pub mod window;
pub mod xcf;

pub use combine::{enumerate_combinations, Combination, PairingPolicy};
pub use config::CorrelationConfig;
pub use engine::{Correlation, Engine, TraceOptions};
pub use error::{Result, XcorrError};
pub use group::{SoloGroup, ThreadGroup, WorkerGroup};
pub use matrix::Matrix;
pub use preprocess::{FdStage, TdStage, ZeroPadding};
pub use rotate::rotate_correlations;
pub use trace::{ChannelInfo, CorrelationSet, CorrelationTrace, Subdivision, Trace};
pub use utils::FftCache;
