//! aggregator.rs — reduces many per-burst fixes for one stationary device to
//! a single reported position.
//!
//! Every fix starts at full weight; the farthest-from-the-mean fix is
//! repeatedly downgraded to a small, increasing weight until only a core
//! sample keeps full weight. Outliers therefore still participate, but
//! barely. A device whose ground truth drifts between fixes is reported as
//! moving and not aggregated.

use std::fmt;

use lora_types::{great_circle_distance_m, Estimate};
use serde::Serialize;
use tracing::debug;

/// Fixes kept at full weight when trimming stops.
pub const MIN_SAMPLE_SIZE: usize = 10;

/// Ground-truth drift (degrees, either axis) beyond which the device counts
/// as moving.
pub const MOVEMENT_TOLERANCE_DEG: f64 = 1e-4;

/// A trimmed weighted-centroid fix. `weights` is index-aligned with the
/// input estimates; downgraded outliers carry the lowest values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedFix {
    pub lat: f64,
    pub lng: f64,
    pub weights: Vec<f64>,
}

/// What aggregation concluded about a device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum AggregateOutcome {
    /// Ground truth drifted between fixes; no single position exists
    Moving,
    /// The weighted centroid over all fixes
    Fix(WeightedFix),
}

/// Reduce a device's fixes. `None` when there is nothing to aggregate.
pub fn aggregate(estimates: &[Estimate]) -> Option<AggregateOutcome> {
    if estimates.is_empty() {
        return None;
    }
    if device_moved(estimates) {
        debug!("ground truth drifted across fixes, device is moving");
        return Some(AggregateOutcome::Moving);
    }

    let n = estimates.len();
    let full_weight = n as f64;
    let mut weights = vec![full_weight; n];
    let mut current = 1.0f64;
    let stop = n.saturating_sub(MIN_SAMPLE_SIZE) as f64;

    loop {
        let (lat, lng) = weighted_mean(estimates, &weights);
        if current >= stop {
            return Some(AggregateOutcome::Fix(WeightedFix { lat, lng, weights }));
        }

        // the farthest full-weight fix gets the current (low) weight
        let mut worst: Option<(usize, f64)> = None;
        for (i, est) in estimates.iter().enumerate() {
            if weights[i] != full_weight {
                continue;
            }
            let dist = great_circle_distance_m(lat, lng, est.lat, est.lng);
            if worst.is_none_or(|(_, d)| dist > d) {
                worst = Some((i, dist));
            }
        }
        let Some((idx, _)) = worst else {
            return Some(AggregateOutcome::Fix(WeightedFix { lat, lng, weights }));
        };
        weights[idx] = current;
        current += 1.0;
    }
}

/// True when any fix's ground truth sits more than
/// [`MOVEMENT_TOLERANCE_DEG`] from the first known one. Fixes without ground
/// truth cannot contradict stationarity and are ignored.
fn device_moved(estimates: &[Estimate]) -> bool {
    let mut reference: Option<(f64, f64)> = None;
    for est in estimates {
        let (Some(lat), Some(lng)) = (est.act_lat, est.act_lng) else {
            continue;
        };
        match reference {
            None => reference = Some((lat, lng)),
            Some((ref_lat, ref_lng)) => {
                if (lat - ref_lat).abs() > MOVEMENT_TOLERANCE_DEG
                    || (lng - ref_lng).abs() > MOVEMENT_TOLERANCE_DEG
                {
                    return true;
                }
            }
        }
    }
    false
}

fn weighted_mean(estimates: &[Estimate], weights: &[f64]) -> (f64, f64) {
    let total: f64 = weights.iter().sum();
    let lat = estimates
        .iter()
        .zip(weights)
        .map(|(e, w)| w * e.lat)
        .sum::<f64>()
        / total;
    let lng = estimates
        .iter()
        .zip(weights)
        .map(|(e, w)| w * e.lng)
        .sum::<f64>()
        / total;
    (lat, lng)
}

// ── Error classification ──────────────────────────────────────────────────────

/// Great-circle error distribution of a fix list against ground truth.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBands {
    pub total: u32,
    pub within_50m: u32,
    pub from_50_to_100m: u32,
    pub from_100_to_200m: u32,
    pub from_200_to_500m: u32,
    pub beyond_500m: u32,
}

impl ErrorBands {
    /// Classify every fix that carries ground truth.
    pub fn classify(estimates: &[Estimate]) -> Self {
        let mut bands = Self::default();
        for est in estimates {
            let Some(error) = est.error_m() else { continue };
            bands.total += 1;
            if error <= 50.0 {
                bands.within_50m += 1;
            } else if error <= 100.0 {
                bands.from_50_to_100m += 1;
            } else if error <= 200.0 {
                bands.from_100_to_200m += 1;
            } else if error <= 500.0 {
                bands.from_200_to_500m += 1;
            } else {
                bands.beyond_500m += 1;
            }
        }
        bands
    }

    fn percent(&self, count: u32) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(count) / f64::from(self.total) * 100.0
        }
    }
}

impl fmt::Display for ErrorBands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total number of locations: {}", self.total)?;
        writeln!(
            f,
            "{:.2}% of location estimates were within 50 meters of the actual device location.",
            self.percent(self.within_50m)
        )?;
        writeln!(
            f,
            "{:.2}% were between 50 and 100 meters of the actual device location.",
            self.percent(self.from_50_to_100m)
        )?;
        writeln!(
            f,
            "{:.2}% were between 100 and 200 meters of the actual device location.",
            self.percent(self.from_100_to_200m)
        )?;
        writeln!(
            f,
            "{:.2}% were between 200 and 500 meters of the actual device location.",
            self.percent(self.from_200_to_500m)
        )?;
        write!(
            f,
            "{:.2}% were further than 500 meters of the actual device location.",
            self.percent(self.beyond_500m)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn identical_fixes_aggregate_to_themselves() {
        let fixes = vec![Estimate::with_actual(43.054, -70.782, 43.054, -70.782); 20];
        let Some(AggregateOutcome::Fix(fix)) = aggregate(&fixes) else {
            panic!("expected a fix");
        };
        assert_approx_eq!(f64, fix.lat, 43.054, ulps = 4);
        assert_approx_eq!(f64, fix.lng, -70.782, ulps = 4);
    }

    #[test]
    fn small_samples_are_not_trimmed() {
        let fixes: Vec<Estimate> = (0..8)
            .map(|i| Estimate::new(43.0 + f64::from(i) * 1e-5, -70.8))
            .collect();
        let Some(AggregateOutcome::Fix(fix)) = aggregate(&fixes) else {
            panic!("expected a fix");
        };
        // every weight untouched: the result is the plain mean
        assert!(fix.weights.iter().all(|&w| w == 8.0));
        let mean = fixes.iter().map(|e| e.lat).sum::<f64>() / 8.0;
        assert_approx_eq!(f64, fix.lat, mean, ulps = 4);
    }

    #[test]
    fn ground_truth_drift_flags_movement() {
        let mut fixes = vec![Estimate::with_actual(43.054, -70.782, 43.054, -70.782); 10];
        fixes.push(Estimate::with_actual(43.054, -70.782, 43.0543, -70.782));
        assert!(matches!(
            aggregate(&fixes),
            Some(AggregateOutcome::Moving)
        ));
    }

    #[test]
    fn drift_below_tolerance_is_still_stationary() {
        let mut fixes = vec![Estimate::with_actual(43.054, -70.782, 43.054, -70.782); 10];
        fixes.push(Estimate::with_actual(
            43.054,
            -70.782,
            43.054 + 0.5e-4,
            -70.782,
        ));
        assert!(matches!(
            aggregate(&fixes),
            Some(AggregateOutcome::Fix(_))
        ));
    }

    #[test]
    fn nothing_to_aggregate() {
        assert!(aggregate(&[]).is_none());
    }

    #[test]
    fn error_bands_split_on_the_documented_boundaries() {
        let truth = (43.054150, -70.781951);
        // ~0.000449 degrees of latitude ≈ 50 m
        let offsets_deg = [0.0, 0.0006, 0.0015, 0.003, 0.02];
        let fixes: Vec<Estimate> = offsets_deg
            .iter()
            .map(|d| Estimate::with_actual(truth.0 + d, truth.1, truth.0, truth.1))
            .collect();
        let bands = ErrorBands::classify(&fixes);
        assert_eq!(bands.total, 5);
        assert_eq!(bands.within_50m, 1);
        assert_eq!(bands.from_50_to_100m, 1);
        assert_eq!(bands.from_100_to_200m, 1);
        assert_eq!(bands.from_200_to_500m, 1);
        assert_eq!(bands.beyond_500m, 1);

        // fixes without ground truth never classify
        assert_eq!(ErrorBands::classify(&[Estimate::new(43.0, -70.0)]).total, 0);
    }
}
