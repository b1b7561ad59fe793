//! solver — the interchangeable TDOA estimators.
//!
//! Every estimator consumes a [`ProjectedBurst`] (receivers already in the
//! planar frame, arrival times in ticks) and produces a planar `(x, y)` fix
//! or a [`SolveFailure`]. The caller unprojects back to geographic
//! coordinates.
//!
//! Selector strings are part of the external API and match the historical
//! identifiers; anything else fails fast with `UnknownAlgorithm`.

mod friedlander;
mod schau_robinson;
mod schmidt;
mod taylor;

use std::fmt;
use std::str::FromStr;

use lora_types::{TimeBase, SPEED_OF_LIGHT};
use serde::Serialize;

use crate::error::{GeolocationError, SolveFailure};
use crate::transaction::ProjectedBurst;

/// Closed set of estimator selectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Algorithm {
    /// Gauss–Newton refinement of the range-difference model (default)
    #[default]
    TaylorSeries,
    /// Accepted selector; produces no fix
    SmithAndAbel,
    /// Closed-form characteristic equations, needs 4 receivers
    Schmidt,
    /// Weighted least squares, 4 receivers
    Friedlander,
    /// Weighted least squares, 3 receivers
    Friedlander3,
    /// Quadratic in the source distance, 4 receivers
    SchauAndRobinson,
    /// Quadratic in the source distance, 3 receivers
    SchauAndRobinson3,
    /// Mean of receiver positions, baseline only
    Centroid,
}

impl Algorithm {
    pub const ALL: [Algorithm; 8] = [
        Algorithm::TaylorSeries,
        Algorithm::SmithAndAbel,
        Algorithm::Schmidt,
        Algorithm::Friedlander,
        Algorithm::Friedlander3,
        Algorithm::SchauAndRobinson,
        Algorithm::SchauAndRobinson3,
        Algorithm::Centroid,
    ];

    /// The wire-facing selector string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::TaylorSeries => "taylorSeries",
            Algorithm::SmithAndAbel => "smithAndAbel",
            Algorithm::Schmidt => "schmidt",
            Algorithm::Friedlander => "friedlander",
            Algorithm::Friedlander3 => "friedlander3",
            Algorithm::SchauAndRobinson => "schauAndRobinson",
            Algorithm::SchauAndRobinson3 => "schauAndRobinson3",
            Algorithm::Centroid => "centroid",
        }
    }

    /// Run this estimator over a projected burst.
    pub fn solve(&self, burst: &ProjectedBurst) -> Result<(f64, f64), SolveFailure> {
        match self {
            Algorithm::TaylorSeries => taylor::solve(burst),
            Algorithm::SmithAndAbel => smith_and_abel(burst),
            Algorithm::Schmidt => schmidt::solve(burst),
            Algorithm::Friedlander => friedlander::solve(burst, 4),
            Algorithm::Friedlander3 => friedlander::solve(burst, 3),
            Algorithm::SchauAndRobinson => schau_robinson::solve(burst, 4),
            Algorithm::SchauAndRobinson3 => schau_robinson::solve(burst, 3),
            Algorithm::Centroid => centroid(burst),
        }
    }
}

impl FromStr for Algorithm {
    type Err = GeolocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .iter()
            .find(|a| a.as_str() == s)
            .copied()
            .ok_or_else(|| GeolocationError::UnknownAlgorithm(s.to_owned()))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Range difference in metres implied by the arrival-time difference
/// `t_j − t_i`: how much farther the source is from receiver j than from
/// receiver i.
pub(crate) fn range_difference(t_i: i64, t_j: i64, time_base: TimeBase) -> f64 {
    SPEED_OF_LIGHT * ((t_j - t_i) as f64 / time_base.ticks_per_second())
}

/// Mean of the projected receiver positions. A deliberately crude baseline:
/// ignores timing entirely, but always answers.
fn centroid(burst: &ProjectedBurst) -> Result<(f64, f64), SolveFailure> {
    let rx = burst.receivers();
    let n = rx.len() as f64;
    let x = rx.iter().map(|r| r.x).sum::<f64>() / n;
    let y = rx.iter().map(|r| r.y).sum::<f64>() / n;
    Ok((x, y))
}

/// Smith & Abel spherical interpolation.
///
/// The selector is accepted for API compatibility, but the estimator has
/// never produced a position here — bursts routed to it count as failed.
/// TODO: finish the derivation (solve the interpolation error terms for the
/// source vector instead of only forming them).
fn smith_and_abel(_burst: &ProjectedBurst) -> Result<(f64, f64), SolveFailure> {
    Err(SolveFailure::NoFix)
}
