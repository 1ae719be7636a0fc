use crate::error::{Result, XcorrError};

/// Mean Earth radius used for great-circle distances (km).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// MJD of the Unix epoch (1970-01-01T00:00:00Z).
const UNIX_EPOCH_MJD: f64 = 40587.0;

/// Default reference epoch for correlation start times, 1971-01-01T00:00:00Z.
pub const DEFAULT_REFERENCE_EPOCH: f64 = 31_536_000.0;

/// Station position in geographic coordinates (degrees, metres).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }
}

/// Bearing of `to` seen from `from`, clockwise from north in [0, 360).
fn bearing_deg(from: &Coordinates, to: &Coordinates) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let dlambda = (to.longitude - from.longitude).to_radians();
    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    let deg = y.atan2(x).to_degrees();
    deg.rem_euclid(360.0)
}

/// Great-circle distance (km), azimuth (first → second) and back-azimuth
/// (second → first) in degrees. Spherical Earth.
pub fn azimuths(first: &Coordinates, second: &Coordinates) -> (f64, f64, f64) {
    let phi1 = first.latitude.to_radians();
    let phi2 = second.latitude.to_radians();
    let dphi = phi2 - phi1;
    let dlambda = (second.longitude - first.longitude).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let dist_km = 2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin();
    (dist_km, bearing_deg(first, second), bearing_deg(second, first))
}

// Parse an ISO 8601-like string and calculate MJD.
// Example: 2024-02-12T15:52:00Z
fn parse_iso_epoch_to_mjd(epoch_str: &str) -> Result<f64> {
    let invalid = || XcorrError::InvalidConfig(format!("invalid epoch '{epoch_str}'"));
    let normalized = epoch_str.replace('z', "Z");
    let parts: Vec<&str> = normalized.split(&['-', 'T', ':', 'Z'][..]).collect();
    if parts.len() < 6 {
        return Err(invalid());
    }
    let year = parts[0].parse::<i32>().map_err(|_| invalid())?;
    let month = parts[1].parse::<u32>().map_err(|_| invalid())?;
    let day = parts[2].parse::<u32>().map_err(|_| invalid())?;
    let hour = parts[3].parse::<u32>().map_err(|_| invalid())?;
    let minute = parts[4].parse::<u32>().map_err(|_| invalid())?;
    let second = parts[5].parse::<f64>().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 {
        return Err(invalid());
    }

    // Formula from https://en.wikipedia.org/wiki/Julian_day#Julian_day_number_calculation
    let (y, m) = if month <= 2 {
        (year - 1, month + 12)
    } else {
        (year, month)
    };

    let a = y / 100;
    let b = 2 - a + (a / 4);

    let jd_int = (365.25 * (y + 4716) as f64).floor() as i32
        + (30.6001 * (m + 1) as f64).floor() as i32
        + day as i32
        + b
        - 1524;

    let frac_day = (hour as f64 / 24.0) + (minute as f64 / 1440.0) + (second / 86400.0);

    // Julian day starts at noon; shift by -0.5 so 00:00 UTC maps correctly.
    let julian_day = jd_int as f64 - 0.5 + frac_day;

    Ok(julian_day - 2400000.5)
}

// Parse epoch to MJD.
// Supports:
// - ISO datetime (e.g. 1971-01-01T00:00:00Z)
// - MJD numeric (e.g. 40952.0)
pub fn parse_epoch_to_mjd(epoch_str: &str) -> Result<f64> {
    let raw = epoch_str.trim();
    if raw.is_empty() {
        return Err(XcorrError::InvalidConfig("empty epoch".into()));
    }
    if raw.contains('-') || raw.contains('T') || raw.contains(':') || raw.contains('Z') || raw.contains('z') {
        return parse_iso_epoch_to_mjd(raw);
    }
    let numeric = raw
        .parse::<f64>()
        .map_err(|_| XcorrError::InvalidConfig(format!("invalid epoch '{raw}'")))?;
    if (15000.0..100000.0).contains(&numeric) {
        return Ok(numeric);
    }
    Err(XcorrError::InvalidConfig(format!(
        "unsupported epoch '{raw}'; use an ISO datetime or an MJD"
    )))
}

pub fn mjd_to_unix_seconds(mjd: f64) -> f64 {
    (mjd - UNIX_EPOCH_MJD) * 86400.0
}

/// Epoch string to seconds since 1970-01-01T00:00:00Z.
pub fn epoch_to_unix_seconds(epoch: &str) -> Result<f64> {
    Ok(mjd_to_unix_seconds(parse_epoch_to_mjd(epoch)?))
}
