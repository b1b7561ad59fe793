//! transaction.rs — one transmission heard by three or more base stations.
//!
//! A `Transaction` owns its uplinks and knows the centroid of its receivers;
//! `project()` turns it into an immutable [`ProjectedBurst`] that carries
//! everything an estimator needs. Uplinks are never mutated, so bursts can be
//! solved concurrently without sharing state.

use lora_types::{TimeBase, Uplink};

use crate::error::GeolocationError;
use crate::projection::Projection;

/// Minimum receiver count for a solvable TDOA burst.
pub const MIN_UPLINKS: usize = 3;

/// One device transmission with its receiving base stations.
#[derive(Debug, Clone)]
pub struct Transaction {
    dev_eui: String,
    seq_no: i64,
    datarate: i32,
    time_base: TimeBase,
    center_lat: f64,
    center_lng: f64,
    uplinks: Vec<Uplink>,
}

impl Transaction {
    /// Build a transaction, validating the receiver count and computing the
    /// receiver centroid.
    pub fn new(
        dev_eui: impl Into<String>,
        seq_no: i64,
        datarate: i32,
        time_base: TimeBase,
        uplinks: Vec<Uplink>,
    ) -> Result<Self, GeolocationError> {
        if uplinks.len() < MIN_UPLINKS {
            return Err(GeolocationError::InsufficientReceivers(uplinks.len()));
        }

        let n = uplinks.len() as f64;
        let center_lat = uplinks.iter().map(|u| u.bstn_lat).sum::<f64>() / n;
        let center_lng = uplinks.iter().map(|u| u.bstn_lng).sum::<f64>() / n;

        Ok(Self {
            dev_eui: dev_eui.into(),
            seq_no,
            datarate,
            time_base,
            center_lat,
            center_lng,
            uplinks,
        })
    }

    pub fn dev_eui(&self) -> &str {
        &self.dev_eui
    }

    pub fn seq_no(&self) -> i64 {
        self.seq_no
    }

    pub fn datarate(&self) -> i32 {
        self.datarate
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn uplinks(&self) -> &[Uplink] {
        &self.uplinks
    }

    /// Receiver centroid as `(lat, lng)` degrees — the projection centre.
    pub fn center(&self) -> (f64, f64) {
        (self.center_lat, self.center_lng)
    }

    /// Project every receiver into the burst-local planar frame.
    pub fn project(&self) -> ProjectedBurst {
        let projection = Projection::new(self.center_lat, self.center_lng);
        let receivers = self
            .uplinks
            .iter()
            .map(|u| {
                let (x, y) = projection.forward(u.bstn_lat, u.bstn_lng);
                ProjectedReceiver { x, y, time: u.time }
            })
            .collect();

        ProjectedBurst {
            projection,
            time_base: self.time_base,
            receivers,
        }
    }
}

/// One receiver in the burst-local frame.
#[derive(Debug, Clone, Copy)]
pub struct ProjectedReceiver {
    /// Easting from the frame centre, metres
    pub x: f64,
    /// Northing from the frame centre, metres
    pub y: f64,
    /// Arrival time in ticks
    pub time: i64,
}

/// A burst after projection: the planar receiver set, the frame it lives in,
/// and the tick unit of its timestamps. Owned per burst, read-only to the
/// estimators.
#[derive(Debug, Clone)]
pub struct ProjectedBurst {
    projection: Projection,
    time_base: TimeBase,
    receivers: Vec<ProjectedReceiver>,
}

impl ProjectedBurst {
    pub fn receivers(&self) -> &[ProjectedReceiver] {
        &self.receivers
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Map a solved planar position back to `(lat, lng)` degrees.
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        self.projection.inverse(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn uplink(time: i64, lat: f64, lng: f64) -> Uplink {
        Uplink::new("FF250C00010001A8", time, 0.0, 0.0, lat, lng)
    }

    #[test]
    fn two_uplinks_are_not_enough() {
        let err = Transaction::new(
            "00000000FFFFFFFF",
            1,
            0,
            TimeBase::Nanoseconds,
            vec![uplink(0, 43.0, -70.0), uplink(1, 43.1, -70.1)],
        )
        .unwrap_err();
        assert!(matches!(err, GeolocationError::InsufficientReceivers(2)));
    }

    #[test]
    fn centre_is_the_receiver_centroid() {
        let tx = Transaction::new(
            "00000000FFFFFFFF",
            1,
            0,
            TimeBase::Nanoseconds,
            vec![
                uplink(0, 43.0, -70.0),
                uplink(1, 43.2, -70.4),
                uplink(2, 43.1, -70.2),
            ],
        )
        .unwrap();
        let (lat, lng) = tx.center();
        assert_approx_eq!(f64, lat, 43.1, epsilon = 1e-12);
        assert_approx_eq!(f64, lng, -70.2, epsilon = 1e-12);
    }

    #[test]
    fn projection_keeps_every_receiver_and_times() {
        let tx = Transaction::new(
            "00000000FFFFFFFF",
            7,
            0,
            TimeBase::Nanoseconds,
            vec![
                uplink(10, 43.0, -70.0),
                uplink(20, 43.2, -70.4),
                uplink(30, 43.1, -70.2),
            ],
        )
        .unwrap();
        let burst = tx.project();
        assert_eq!(burst.receivers().len(), 3);
        assert_eq!(burst.receivers()[2].time, 30);

        // receivers sit where the frame says they should
        let (x, y) = burst.projection().forward(43.0, -70.0);
        assert_eq!(burst.receivers()[0].x, x);
        assert_eq!(burst.receivers()[0].y, y);

        // the centroid itself unprojects to the centre
        let (lat, lng) = burst.unproject(0.0, 0.0);
        let (clat, clng) = tx.center();
        assert_approx_eq!(f64, lat, clat, epsilon = 1e-9);
        assert_approx_eq!(f64, lng, clng, epsilon = 1e-9);
    }
}
