//! driver.rs — walks one device's observation rows and solves each burst.
//!
//! Rows arrive pre-sorted by `(seq_no, time)`. The walk groups contiguous
//! rows of one sequence number into a transaction, filtering duplicates and
//! stale stragglers, then projects, solves and unprojects. A burst that
//! produces no fix is counted and skipped; the walk never aborts.

use lora_types::{Estimate, GeoRow, TimeBase, Uplink};
use serde::Serialize;
use tracing::{debug, info};

use crate::solver::Algorithm;
use crate::transaction::{Transaction, MIN_UPLINKS};

/// Arrival-time spread treated as one coherent burst: 0.2 ms of wall time.
const STALENESS_WINDOW_S: f64 = 2e-4;

/// How one device's rows are grouped and solved.
#[derive(Debug, Clone)]
pub struct LocateConfig {
    pub algorithm: Algorithm,
    pub time_base: TimeBase,
    /// Rows farther than this (in ticks) from the previous row of the same
    /// sequence are dropped as stale.
    pub staleness_ticks: i64,
}

impl LocateConfig {
    pub fn new(algorithm: Algorithm, time_base: TimeBase) -> Self {
        Self {
            algorithm,
            time_base,
            staleness_ticks: default_staleness_ticks(time_base),
        }
    }
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self::new(Algorithm::default(), TimeBase::default())
    }
}

/// 200 000 ticks at nanoseconds, 200 at microseconds — the same 0.2 ms
/// either way.
pub fn default_staleness_ticks(time_base: TimeBase) -> i64 {
    (STALENESS_WINDOW_S * time_base.ticks_per_second()) as i64
}

/// Outcome of one device walk.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocateReport {
    /// One entry per successfully solved burst, in stream order
    pub estimates: Vec<Estimate>,
    /// Sequence groups seen, whether or not they were solvable
    pub total_bursts: u32,
    /// Groups discarded for holding fewer than three usable observations
    pub skipped_bursts: u32,
    /// Groups whose estimator produced no fix
    pub failed_bursts: u32,
    /// Rows dropped for exceeding the staleness window
    pub stale_rows: u32,
    /// Rows dropped because their base station was already in the group
    pub duplicate_rows: u32,
    /// Rows dropped for missing receiver or ground-truth coordinates
    pub invalid_rows: u32,
}

/// Group `rows` (pre-sorted by `(seq_no, time)`) into bursts and solve each
/// with the configured estimator.
pub fn locate_device(dev_eui: &str, rows: &[GeoRow], config: &LocateConfig) -> LocateReport {
    let mut report = LocateReport::default();

    let mut pending: Vec<Uplink> = Vec::new();
    let mut pending_truth: Option<(f64, f64)> = None;
    let mut last_seq: Option<i64> = None;
    let mut last_time: Option<i64> = None;

    for row in rows {
        let Some((bstn_lat, bstn_lng)) = row.bstn_location() else {
            report.invalid_rows += 1;
            continue;
        };
        let Some(truth) = row.dev_location() else {
            report.invalid_rows += 1;
            continue;
        };

        match last_seq {
            Some(seq) if seq != row.seq_no => {
                // sequence rolled over: the accumulated group is complete
                flush_group(dev_eui, seq, &mut pending, pending_truth, config, &mut report);
                pending_truth = None;
                last_seq = Some(row.seq_no);
            }
            Some(_) => {
                if let Some(last) = last_time {
                    if (row.time - last).abs() > config.staleness_ticks {
                        report.stale_rows += 1;
                        last_time = Some(row.time);
                        continue;
                    }
                }
            }
            None => last_seq = Some(row.seq_no),
        }

        // one observation per base station; first sighting wins
        if pending
            .iter()
            .any(|u| u.bstn_lat == bstn_lat && u.bstn_lng == bstn_lng)
        {
            report.duplicate_rows += 1;
            continue;
        }

        if pending.is_empty() {
            pending_truth = Some(truth);
        }
        pending.push(Uplink::new(
            row.bstn_eui.clone(),
            row.time,
            0.0,
            0.0,
            bstn_lat,
            bstn_lng,
        ));
        last_time = Some(row.time);
    }

    // the stream ended mid-group; the trailing group still counts
    if let Some(seq) = last_seq {
        flush_group(dev_eui, seq, &mut pending, pending_truth, config, &mut report);
    }

    info!(
        "{dev_eui}: {} bursts, {} skipped, {} failed, {} located",
        report.total_bursts,
        report.skipped_bursts,
        report.failed_bursts,
        report.estimates.len()
    );

    report
}

fn flush_group(
    dev_eui: &str,
    seq_no: i64,
    pending: &mut Vec<Uplink>,
    truth: Option<(f64, f64)>,
    config: &LocateConfig,
    report: &mut LocateReport,
) {
    if pending.is_empty() {
        return;
    }
    report.total_bursts += 1;

    if pending.len() < MIN_UPLINKS {
        debug!(
            "{dev_eui} seq {seq_no}: only {} usable uplinks, skipped",
            pending.len()
        );
        pending.clear();
        report.skipped_bursts += 1;
        return;
    }

    let uplinks = std::mem::take(pending);
    let Ok(tx) = Transaction::new(dev_eui, seq_no, 0, config.time_base, uplinks) else {
        report.skipped_bursts += 1;
        return;
    };

    let burst = tx.project();
    match config.algorithm.solve(&burst) {
        Ok((x, y)) => {
            let (lat, lng) = burst.unproject(x, y);
            debug!("{dev_eui} seq {seq_no}: fix at ({lat:.6}, {lng:.6})");
            let estimate = match truth {
                Some((act_lat, act_lng)) => Estimate::with_actual(lat, lng, act_lat, act_lng),
                None => Estimate::new(lat, lng),
            };
            report.estimates.push(estimate);
        }
        Err(failure) => {
            debug!("{dev_eui} seq {seq_no}: no fix ({failure})");
            report.failed_bursts += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(seq_no: i64, time: i64, bstn: (f64, f64)) -> GeoRow {
        GeoRow {
            dev_eui: "00000000FFFFFFFF".into(),
            bstn_eui: "FF250C00010001A8".into(),
            seq_no,
            time,
            bstn_lat: Some(bstn.0),
            bstn_lng: Some(bstn.1),
            dev_lat: Some(43.054150),
            dev_lng: Some(-70.781951),
        }
    }

    fn centroid_config() -> LocateConfig {
        LocateConfig::new(Algorithm::Centroid, TimeBase::Nanoseconds)
    }

    #[test]
    fn staleness_scales_with_the_time_base() {
        assert_eq!(default_staleness_ticks(TimeBase::Nanoseconds), 200_000);
        assert_eq!(default_staleness_ticks(TimeBase::Microseconds), 200);
    }

    #[test]
    fn groups_split_on_sequence_change() {
        let mut rows = Vec::new();
        for seq in [5, 6] {
            rows.push(row(seq, 0, (43.03, -70.72)));
            rows.push(row(seq, 1_000, (43.11, -70.94)));
            rows.push(row(seq, 2_000, (43.12, -70.74)));
        }
        let report = locate_device("00000000FFFFFFFF", &rows, &centroid_config());
        assert_eq!(report.total_bursts, 2);
        assert_eq!(report.estimates.len(), 2);
        assert_eq!(report.skipped_bursts, 0);
        assert_eq!(report.estimates[0].act_lat, Some(43.054150));
    }

    #[test]
    fn underpopulated_groups_are_skipped() {
        let rows = vec![
            row(5, 0, (43.03, -70.72)),
            row(5, 1_000, (43.11, -70.94)),
            row(6, 0, (43.03, -70.72)),
            row(6, 1_000, (43.11, -70.94)),
            row(6, 2_000, (43.12, -70.74)),
        ];
        let report = locate_device("00000000FFFFFFFF", &rows, &centroid_config());
        assert_eq!(report.total_bursts, 2);
        assert_eq!(report.skipped_bursts, 1);
        assert_eq!(report.estimates.len(), 1);
    }

    #[test]
    fn duplicate_base_stations_keep_first_sighting() {
        let rows = vec![
            row(5, 0, (43.03, -70.72)),
            row(5, 500, (43.03, -70.72)),
            row(5, 1_000, (43.11, -70.94)),
            row(5, 2_000, (43.12, -70.74)),
        ];
        let report = locate_device("00000000FFFFFFFF", &rows, &centroid_config());
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(report.estimates.len(), 1);
    }

    #[test]
    fn rows_without_coordinates_are_invalid() {
        let mut bad = row(5, 500, (43.05, -70.80));
        bad.bstn_lng = None;
        let mut no_truth = row(5, 700, (43.06, -70.81));
        no_truth.dev_lat = None;
        let rows = vec![
            row(5, 0, (43.03, -70.72)),
            bad,
            no_truth,
            row(5, 1_000, (43.11, -70.94)),
            row(5, 2_000, (43.12, -70.74)),
        ];
        let report = locate_device("00000000FFFFFFFF", &rows, &centroid_config());
        assert_eq!(report.invalid_rows, 2);
        assert_eq!(report.estimates.len(), 1);
    }

    #[test]
    fn empty_stream_reports_nothing() {
        let report = locate_device("00000000FFFFFFFF", &[], &centroid_config());
        assert_eq!(report.total_bursts, 0);
        assert!(report.estimates.is_empty());
    }
}
