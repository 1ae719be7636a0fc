//! Rotation of the ENZ correlation tensor of a station pair into RTZ.

use tracing::{debug, warn};

use crate::trace::{CorrelationSet, CorrelationTrace};

const ENZ: [char; 3] = ['E', 'N', 'Z'];

fn slot(components: (char, char)) -> Option<usize> {
    let first = ENZ.iter().position(|&c| c == components.0)?;
    let second = ENZ.iter().position(|&c| c == components.1)?;
    Some(first * 3 + second)
}

/// Rotate every station pair with all nine ENZ combinations present.
///
/// Pairs are grouped by combined network and station codes in order of
/// first appearance. Incomplete pairs, pairs without azimuths and traces of
/// other components are dropped.
pub fn rotate_correlations(set: &CorrelationSet) -> CorrelationSet {
    let mut groups: Vec<((&str, &str), [Option<&CorrelationTrace>; 9])> = Vec::new();
    for trace in set.iter() {
        let Some(idx) = trace.stats.components().and_then(slot) else {
            debug!(channel = %trace.stats.channel, "not an ENZ combination, skipped");
            continue;
        };
        let key = (trace.stats.network.as_str(), trace.stats.station.as_str());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, tensor)) => tensor[idx] = Some(trace),
            None => {
                let mut tensor = [None; 9];
                tensor[idx] = Some(trace);
                groups.push((key, tensor));
            }
        }
    }

    let mut out = Vec::new();
    for ((network, station), tensor) in groups {
        let present = tensor.iter().filter(|t| t.is_some()).count();
        if present < 9 {
            debug!(network, station, present, "incomplete ENZ tensor, pair dropped");
            continue;
        }
        let traces: Vec<&CorrelationTrace> = tensor.iter().flatten().copied().collect();
        match rotate_tensor(&traces) {
            Some(rotated) => out.extend(rotated),
            None => warn!(network, station, "cannot rotate pair without azimuths or equal lengths"),
        }
    }
    CorrelationSet::new(out)
}

/// Rotate one tensor ordered EE, EN, EZ, NE, NN, NZ, ZE, ZN, ZZ into
/// RR, RT, RZ, TR, TT, TZ, ZR, ZT, ZZ. Metadata is taken from EE.
pub fn rotate_tensor(tensor: &[&CorrelationTrace]) -> Option<Vec<CorrelationTrace>> {
    if tensor.len() != 9 {
        return None;
    }
    let reference = tensor[0];
    let (az, baz) = (reference.stats.az?, reference.stats.baz?);
    let npts = reference.data.len();
    if tensor.iter().any(|t| t.data.len() != npts) {
        return None;
    }

    // The coordinate system is rotated, not the vectors, hence the signs.
    let phi1 = -(90.0 - az).to_radians();
    let phi2 = -(90.0 - baz + 180.0).to_radians();
    let (s1, c1) = phi1.sin_cos();
    let (s2, c2) = phi2.sin_cos();

    let [ee, en, ez, ne, nn, nz, ze, zn, zz] = [0, 1, 2, 3, 4, 5, 6, 7, 8].map(|k| tensor[k].data.as_slice());
    let combine = |terms: &[(f64, &[f64])]| -> Vec<f64> {
        (0..npts)
            .map(|k| terms.iter().map(|(w, d)| w * d[k]).sum())
            .collect()
    };

    let rotated = [
        ('R', 'R', combine(&[(c1 * c2, ee), (-c1 * s2, en), (-s1 * c2, ne), (s1 * s2, nn)])),
        ('R', 'T', combine(&[(c1 * s2, ee), (c1 * c2, en), (-s1 * s2, ne), (-s1 * c2, nn)])),
        ('R', 'Z', combine(&[(c1, ez), (-s1, nz)])),
        ('T', 'R', combine(&[(s1 * c2, ee), (-s1 * s2, en), (c1 * c2, ne), (-c1 * s2, nn)])),
        ('T', 'T', combine(&[(s1 * s2, ee), (s1 * c2, en), (c1 * s2, ne), (c1 * c2, nn)])),
        ('T', 'Z', combine(&[(s1, ez), (c1, nz)])),
        ('Z', 'R', combine(&[(c2, ze), (-s2, zn)])),
        ('Z', 'T', combine(&[(s2, ze), (c2, zn)])),
        ('Z', 'Z', zz.to_vec()),
    ];

    rotated
        .into_iter()
        .map(|(first, second, data)| {
            let mut stats = reference.stats.clone();
            stats.channel = reference.stats.channel_with_components(first, second)?;
            Some(CorrelationTrace { stats, data })
        })
        .collect()
}
