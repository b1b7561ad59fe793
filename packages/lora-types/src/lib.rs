//! # lora-types
//!
//! Shared vocabulary for the LoRa TDOA geolocation suite.
//!
//! These types are used by:
//! - `packages/geoloc-engine`: the multilateration core
//! - `backend-rust`: the SQLite row loader, the location HTTP service and the
//!   `geoloc-cli` experiment runner
//!
//! ## Conventions
//!
//! - Latitudes/longitudes are decimal degrees on a spherical Earth of radius
//!   [`EARTH_RADIUS_M`]
//! - Arrival times are integer ticks; the tick unit is the burst's [`TimeBase`]
//! - An absent coordinate is `None`, never `0.0` — zero only ever means zero

use serde::{Deserialize, Serialize};

// ── Physical constants ────────────────────────────────────────────────────────

/// Speed of light through air, metres per second.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Earth radius, metres (spherical model).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ── Time base ─────────────────────────────────────────────────────────────────

/// Tick unit of a burst's arrival timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeBase {
    #[default]
    Nanoseconds,
    Microseconds,
}

impl TimeBase {
    /// Ticks per second for this base.
    pub fn ticks_per_second(&self) -> f64 {
        match self {
            Self::Nanoseconds => 1e9,
            Self::Microseconds => 1e6,
        }
    }
}

// ── Device / base-station identifiers ─────────────────────────────────────────

/// Length of an EUI-64 in hex characters.
pub const EUI_HEX_LEN: usize = 16;

/// A token is a usable EUI when it starts with 16 hex characters.
pub fn is_valid_eui(token: &str) -> bool {
    let mut chars = token.chars();
    (0..EUI_HEX_LEN).all(|_| chars.next().is_some_and(|c| c.is_ascii_hexdigit()))
}

/// Split a comma-separated EUI list, keeping only valid entries.
pub fn validate_euis(comma_separated: &str) -> Vec<String> {
    comma_separated
        .split(',')
        .map(str::trim)
        .filter(|t| is_valid_eui(t))
        .map(str::to_owned)
        .collect()
}

// ── Observation records ───────────────────────────────────────────────────────

/// One base station's record of one burst.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uplink {
    /// Receiving base-station EUI (16 hex chars)
    pub bstn_eui: String,
    /// Arrival time in ticks (unit per the transaction's `TimeBase`)
    pub time: i64,
    /// Received signal strength, dBm. Carried through, unused by the solver.
    pub rssi: f64,
    /// Signal-to-noise ratio, dB. Carried through, unused by the solver.
    pub snr: f64,
    /// Base-station latitude, decimal degrees
    pub bstn_lat: f64,
    /// Base-station longitude, decimal degrees
    pub bstn_lng: f64,
}

impl Uplink {
    pub fn new(
        bstn_eui: impl Into<String>,
        time: i64,
        rssi: f64,
        snr: f64,
        bstn_lat: f64,
        bstn_lng: f64,
    ) -> Self {
        Self {
            bstn_eui: bstn_eui.into(),
            time,
            rssi,
            snr,
            bstn_lat,
            bstn_lng,
        }
    }

    /// Base-station coordinates as a `(lat, lng)` pair.
    pub fn location(&self) -> (f64, f64) {
        (self.bstn_lat, self.bstn_lng)
    }
}

/// One row of the persistent `Geo` observation table, pre-sorted by
/// `(seq_no, time)`. Coordinates stored as zero come back as `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoRow {
    pub dev_eui: String,
    pub bstn_eui: String,
    pub seq_no: i64,
    pub time: i64,
    pub bstn_lat: Option<f64>,
    pub bstn_lng: Option<f64>,
    /// Surveyed device latitude (ground truth), when known
    pub dev_lat: Option<f64>,
    /// Surveyed device longitude (ground truth), when known
    pub dev_lng: Option<f64>,
}

impl GeoRow {
    /// Base-station position, only when both coordinates are present.
    pub fn bstn_location(&self) -> Option<(f64, f64)> {
        Some((self.bstn_lat?, self.bstn_lng?))
    }

    /// Ground-truth device position, only when both coordinates are present.
    pub fn dev_location(&self) -> Option<(f64, f64)> {
        Some((self.dev_lat?, self.dev_lng?))
    }
}

// ── Location estimates ────────────────────────────────────────────────────────

/// One computed device fix, with ground truth attached when known.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    /// Calculated latitude, decimal degrees
    pub lat: f64,
    /// Calculated longitude, decimal degrees
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_lng: Option<f64>,
}

impl Estimate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            act_lat: None,
            act_lng: None,
        }
    }

    pub fn with_actual(lat: f64, lng: f64, act_lat: f64, act_lng: f64) -> Self {
        Self {
            lat,
            lng,
            act_lat: Some(act_lat),
            act_lng: Some(act_lng),
        }
    }

    /// Great-circle error against ground truth, when ground truth is known.
    pub fn error_m(&self) -> Option<f64> {
        let (act_lat, act_lng) = (self.act_lat?, self.act_lng?);
        Some(great_circle_distance_m(self.lat, self.lng, act_lat, act_lng))
    }
}

// ── Great-circle distance ─────────────────────────────────────────────────────

/// Distance between two coordinates in metres along the great circle.
///
/// The arccos argument is clamped to [-1, 1]: rounding can push the dot
/// product a few ulps past 1 for near-identical points, and the distance of a
/// point to itself must be exactly zero.
pub fn great_circle_distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lng1) = (lat1.to_radians(), lng1.to_radians());
    let (lat2, lng2) = (lat2.to_radians(), lng2.to_radians());

    let cos_angle = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (lng2 - lng1).cos();
    cos_angle.clamp(-1.0, 1.0).acos() * EARTH_RADIUS_M
}
