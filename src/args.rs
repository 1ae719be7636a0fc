use clap::Parser;
use noise_xcorr::{FdStage, PairingPolicy, TdStage, ZeroPadding};

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

pub const DEFAULT_SAMPLES: usize = 6000;
pub const DEFAULT_SAMPLING_HZ: f64 = 20.0;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Distributed ambient-noise cross-correlation on a synthetic station network",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  noise-xcorr --stations 3 --workers 2\n  noise-xcorr --stations 4 --delay 0.35 --td demean,taper:cosine:0.05,bandpass:0.2:5 --fd whiten --workers 4\n  noise-xcorr --stations 2 --rotate --length-to-save 20 --td demean,signbit\n  noise-xcorr --stations 3 --pairing between-components --epoch 2024-01-01T00:00:00Z --center\n  noise-xcorr --stations 3 --samples 12000 --corr-len 200 --corr-inc 100 --workers 3\n"
)]
pub struct Args {
    /// Number of synthetic stations (each with one or three components)
    #[arg(long, default_value_t = 3)]
    pub stations: usize,

    /// Samples per channel
    #[arg(long, default_value_t = DEFAULT_SAMPLES)]
    pub samples: usize,

    /// Sampling rate (Hz)
    #[arg(long, default_value_t = DEFAULT_SAMPLING_HZ)]
    pub sampling: f64,

    /// One-sided lag window kept around zero lag (seconds)
    #[arg(long = "length-to-save", default_value_t = 10.0)]
    pub length_to_save: f64,

    /// Number of cooperating workers
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Propagation delay added per station index (seconds)
    #[arg(long, allow_hyphen_values = true, default_value_t = 0.25)]
    pub delay: f64,

    /// Time-domain stages, comma separated (e.g. demean,taper:cosine:0.05,bandpass:0.1:5:4:zerophase)
    #[arg(long)]
    pub td: Option<String>,

    /// Frequency-domain stages, comma separated (whiten, fdsignbit, fdtaper:f1:f2:f3:f4)
    #[arg(long)]
    pub fd: Option<String>,

    /// Zero padding policy
    #[arg(long = "zero-padding", default_value = "avoid-wrap-power-two")]
    pub zero_padding: String,

    /// Pairing policy
    #[arg(long, default_value = "between-stations")]
    pub pairing: String,

    /// Split the read into windows of this length (seconds); needs --corr-inc
    #[arg(long = "corr-len", requires = "corr_inc")]
    pub corr_len: Option<f64>,

    /// Advance between consecutive windows (seconds)
    #[arg(long = "corr-inc", requires = "corr_len")]
    pub corr_inc: Option<f64>,

    /// Also correlate each channel with itself
    #[arg(long = "self-pairs")]
    pub self_pairs: bool,

    /// Keep raw correlation amplitudes
    #[arg(long = "no-normalize")]
    pub no_normalize: bool,

    /// Ignore start-time offsets between channels
    #[arg(long)]
    pub center: bool,

    /// Use three components per station and rotate ENZ correlations to RTZ
    #[arg(long)]
    pub rotate: bool,

    /// Reference epoch of the output start times (ISO datetime or MJD)
    #[arg(long = "epoch")]
    pub epoch: Option<String>,

    /// Seed of the synthetic noise
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Emit per-stage and per-collective debug events
    #[arg(long)]
    pub debug: bool,
}

fn split_list(list: Option<&str>) -> impl Iterator<Item = &str> {
    list.into_iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn parse_td_stages(list: Option<&str>) -> Result<Vec<TdStage>, DynError> {
    Ok(split_list(list).map(str::parse).collect::<Result<Vec<TdStage>, _>>()?)
}

pub fn parse_fd_stages(list: Option<&str>) -> Result<Vec<FdStage>, DynError> {
    Ok(split_list(list).map(str::parse).collect::<Result<Vec<FdStage>, _>>()?)
}

pub fn parse_zero_padding(value: &str) -> Result<ZeroPadding, DynError> {
    Ok(value.parse()?)
}

pub fn parse_pairing(value: &str) -> Result<PairingPolicy, DynError> {
    Ok(value.parse()?)
}
