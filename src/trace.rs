//! Channel metadata, input traces and the correlation set handed to callers.

use crate::error::{Result, XcorrError};
use crate::geo::{azimuths, Coordinates};
use crate::partition::owned_range;

/// Identity of one recorded channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelInfo {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub coordinates: Option<Coordinates>,
}

impl ChannelInfo {
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            channel: channel.to_string(),
            coordinates: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Component code: last character of the channel code.
    pub fn component(&self) -> Option<char> {
        self.channel.chars().last()
    }

    pub fn id(&self) -> String {
        format!("{}.{}.{}.{}", self.network, self.station, self.location, self.channel)
    }

    pub fn same_station(&self, other: &ChannelInfo) -> bool {
        self.network == other.network && self.station == other.station
    }
}

/// One channel's samples as delivered by the waveform source.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pub info: ChannelInfo,
    pub data: Vec<f64>,
    /// Seconds since 1970-01-01T00:00:00Z
    pub start_time: f64,
    pub sampling_rate: f64,
}

impl Trace {
    pub fn new(info: ChannelInfo, data: Vec<f64>, start_time: f64, sampling_rate: f64) -> Self {
        Self {
            info,
            data,
            start_time,
            sampling_rate,
        }
    }

    /// Time of the last sample.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.data.len().saturating_sub(1) as f64 / self.sampling_rate
    }

    /// Samples between `start` and `end`, both inclusive and snapped to the
    /// nearest sample. Bounds outside the trace are ignored, no padding.
    pub fn trimmed(&self, start: f64, end: f64) -> Trace {
        let fs = self.sampling_rate;
        let npts = self.data.len();
        let first = (((start - self.start_time) * fs).round().max(0.0) as usize).min(npts);
        let cut = ((self.end_time() - end) * fs).round().max(0.0) as usize;
        let last = npts.saturating_sub(cut).max(first);
        Trace {
            info: self.info.clone(),
            data: self.data[first..last].to_vec(),
            start_time: self.start_time + first as f64 / fs,
            sampling_rate: fs,
        }
    }
}

/// Split of a long read into overlapping correlation windows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Subdivision {
    /// Window length (s)
    pub corr_len: f64,
    /// Window advance (s)
    pub corr_inc: f64,
}

impl Subdivision {
    pub fn new(corr_len: f64, corr_inc: f64) -> Result<Self> {
        if !(corr_len.is_finite() && corr_len > 0.0) {
            return Err(XcorrError::InvalidConfig(format!(
                "subdivision length must be positive, got {corr_len}"
            )));
        }
        if !(corr_inc.is_finite() && corr_inc > 0.0) {
            return Err(XcorrError::InvalidConfig(format!(
                "subdivision increment must be positive, got {corr_inc}"
            )));
        }
        Ok(Self { corr_len, corr_inc })
    }

    /// Number of windows needed to cover `read_len` seconds.
    pub fn count(&self, read_len: f64) -> usize {
        (((read_len - self.corr_len) / self.corr_inc).ceil() + 1.0).max(1.0) as usize
    }

    /// Start and end of window `k` relative to absolute time `origin`.
    pub fn window(&self, origin: f64, k: usize) -> (f64, f64) {
        let start = origin + k as f64 * self.corr_inc;
        (start, start + self.corr_len)
    }

    /// Traces trimmed to window `k`; traces left without samples are dropped.
    pub fn split(&self, traces: &[Trace], origin: f64, k: usize) -> Vec<Trace> {
        let (start, end) = self.window(origin, k);
        traces
            .iter()
            .map(|t| t.trimmed(start, end))
            .filter(|t| !t.data.is_empty())
            .collect()
    }
}

/// Metadata of a correlation trace, combined from its two channels.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationStats {
    pub network: String,
    pub station: String,
    pub location: String,
    /// Combined channel code, e.g. `HHE-HHZ`
    pub channel: String,
    pub start_time: f64,
    pub sampling_rate: f64,
    pub npts: usize,
    /// Azimuth from the first to the second station (degrees)
    pub az: Option<f64>,
    /// Back-azimuth from the second to the first station (degrees)
    pub baz: Option<f64>,
    pub dist_km: Option<f64>,
    pub first: ChannelInfo,
    pub second: ChannelInfo,
}

/// Combine the metadata of two channels into correlation metadata.
///
/// Codes are joined with `-`. Geometry is filled in when both channels carry
/// coordinates. Time fields are left for the caller.
pub fn combine_stats(first: &ChannelInfo, second: &ChannelInfo) -> CorrelationStats {
    let geometry = match (&first.coordinates, &second.coordinates) {
        (Some(a), Some(b)) => Some(azimuths(a, b)),
        _ => None,
    };
    CorrelationStats {
        network: format!("{}-{}", first.network, second.network),
        station: format!("{}-{}", first.station, second.station),
        location: format!("{}-{}", first.location, second.location),
        channel: format!("{}-{}", first.channel, second.channel),
        start_time: 0.0,
        sampling_rate: 0.0,
        npts: 0,
        dist_km: geometry.map(|g| g.0),
        az: geometry.map(|g| g.1),
        baz: geometry.map(|g| g.2),
        first: first.clone(),
        second: second.clone(),
    }
}

impl CorrelationStats {
    pub fn id(&self) -> String {
        format!("{}.{}.{}.{}", self.network, self.station, self.location, self.channel)
    }

    /// Component letters of the two channels.
    pub fn components(&self) -> Option<(char, char)> {
        let (left, right) = self.channel.split_once('-')?;
        Some((left.chars().last()?, right.chars().last()?))
    }

    /// Channel code with the two component letters replaced.
    pub fn channel_with_components(&self, first: char, second: char) -> Option<String> {
        let (left, right) = self.channel.split_once('-')?;
        let swap = |code: &str, c: char| -> Option<String> {
            let mut chars: Vec<char> = code.chars().collect();
            *chars.last_mut()? = c;
            Some(chars.into_iter().collect())
        };
        Some(format!("{}-{}", swap(left, first)?, swap(right, second)?))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationTrace {
    pub stats: CorrelationStats,
    pub data: Vec<f64>,
}

/// Ordered set of correlation traces, one per combination.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrelationSet {
    pub traces: Vec<CorrelationTrace>,
}

impl CorrelationSet {
    pub fn new(traces: Vec<CorrelationTrace>) -> Self {
        Self { traces }
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CorrelationTrace> {
        self.traces.iter()
    }

    /// Traces a writer on `rank` is responsible for persisting.
    pub fn owned_traces(&self, size: usize, rank: usize) -> &[CorrelationTrace] {
        &self.traces[owned_range(self.traces.len(), size, rank)]
    }
}
