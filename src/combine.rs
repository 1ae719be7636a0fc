//! Enumeration of channel pairs to correlate.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, XcorrError};
use crate::trace::ChannelInfo;

/// Index pair `(i, j)` into the channel list. Output column order follows
/// the order of the combination list.
pub type Combination = (usize, usize);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PairingPolicy {
    /// Every pair of channels on different stations.
    #[default]
    BetweenStations,
    /// Pairs on different stations whose component codes also differ.
    BetweenComponents,
}

impl FromStr for PairingPolicy {
    type Err = XcorrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "betweenStations" | "between-stations" => Ok(Self::BetweenStations),
            "betweenComponents" | "between-components" => Ok(Self::BetweenComponents),
            other => Err(XcorrError::UnknownPairingPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for PairingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BetweenStations => write!(f, "betweenStations"),
            Self::BetweenComponents => write!(f, "betweenComponents"),
        }
    }
}

/// All `(i, j)` with `i < j` admitted by `policy`, in lexicographic order.
pub fn enumerate_combinations(channels: &[ChannelInfo], policy: PairingPolicy) -> Vec<Combination> {
    let mut combinations = Vec::new();
    for (i, first) in channels.iter().enumerate() {
        for (j, second) in channels.iter().enumerate().skip(i + 1) {
            if first.same_station(second) {
                continue;
            }
            if policy == PairingPolicy::BetweenComponents && first.component() == second.component() {
                continue;
            }
            combinations.push((i, j));
        }
    }
    combinations
}

/// Insert the autocorrelation pair `(i, i)` ahead of the cross pairs that
/// start at `i`, for every channel index `0..n_channels`.
pub fn with_self_pairs(combinations: &[Combination], n_channels: usize) -> Vec<Combination> {
    let mut out = Vec::with_capacity(combinations.len() + n_channels);
    let mut next_self = 0;
    for &(i, j) in combinations {
        while next_self <= i && next_self < n_channels {
            out.push((next_self, next_self));
            next_self += 1;
        }
        if i != j {
            out.push((i, j));
        }
    }
    while next_self < n_channels {
        out.push((next_self, next_self));
        next_self += 1;
    }
    out
}

/// Reject out-of-range indices and repeated pairs.
pub fn validate_combinations(combinations: &[Combination], n_channels: usize) -> Result<()> {
    let mut seen = HashSet::with_capacity(combinations.len());
    for &(i, j) in combinations {
        if i >= n_channels || j >= n_channels {
            return Err(XcorrError::InvalidCombination {
                first: i,
                second: j,
                reason: format!("index out of range for {n_channels} channels"),
            });
        }
        if !seen.insert((i, j)) {
            return Err(XcorrError::InvalidCombination {
                first: i,
                second: j,
                reason: "duplicate pair".to_string(),
            });
        }
    }
    Ok(())
}
