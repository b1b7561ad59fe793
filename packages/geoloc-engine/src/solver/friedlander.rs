//! friedlander.rs — weighted least squares over range differences.
//!
//! With receiver 1 as reference, each remaining receiver contributes one
//! linearised equation `u = S·p + m·r₁` in the source position p and its
//! unknown distance r₁ to the reference. Scaling by D = diag(1/m_i1) and
//! multiplying by (I − Z) — Z the circular row shift — annihilates the r₁
//! term; the source position then comes out of the 2×2 normal equations.
//!
//! With only three receivers the annihilator leaves a single independent
//! equation, so the normal matrix is rank-deficient by construction and the
//! three-receiver variant reports `Singular`.

use crate::error::SolveFailure;
use crate::linalg::solve2;
use crate::transaction::ProjectedBurst;

use super::range_difference;

/// Time differences whose implied range falls under this are degenerate — the
/// diagonal weighting divides by them.
const MIN_RANGE_DIFF_M: f64 = 1e-9;

pub(super) fn solve(burst: &ProjectedBurst, n: usize) -> Result<(f64, f64), SolveFailure> {
    let rx = burst.receivers();
    if rx.len() < n {
        return Err(SolveFailure::InsufficientReceivers);
    }
    let tb = burst.time_base();
    let rows = n - 1;

    // m_i1: range differences against the reference receiver
    let m: Vec<f64> = (1..n)
        .map(|i| range_difference(rx[0].time, rx[i].time, tb))
        .collect();
    if m.iter().any(|v| v.abs() < MIN_RANGE_DIFF_M) {
        return Err(SolveFailure::Singular);
    }

    // S: coordinate differences to the reference
    let s: Vec<[f64; 2]> = (1..n)
        .map(|i| [rx[i].x - rx[0].x, rx[i].y - rx[0].y])
        .collect();

    // M = (I − Z)·D
    let mut mw = vec![vec![0.0f64; rows]; rows];
    for i in 0..rows {
        for j in 0..rows {
            let mut v = if i == j { 1.0 } else { 0.0 };
            if (i + 1) % rows == j {
                v -= 1.0;
            }
            mw[i][j] = v / m[j];
        }
    }

    // u_i = ½(R_i² − R_1² − m_i1²)
    let r_sq: Vec<f64> = (0..n).map(|i| rx[i].x * rx[i].x + rx[i].y * rx[i].y).collect();
    let u: Vec<f64> = (0..rows)
        .map(|i| 0.5 * (r_sq[i + 1] - r_sq[0] - m[i] * m[i]))
        .collect();

    // W = MᵀM, then the normal equations (SᵀWS)·p = SᵀWu
    let mut w = vec![vec![0.0f64; rows]; rows];
    for i in 0..rows {
        for j in 0..rows {
            w[i][j] = (0..rows).map(|k| mw[k][i] * mw[k][j]).sum();
        }
    }

    let mut stw = [[0.0f64; 3]; 2]; // 2 × rows, rows ≤ 3
    for a in 0..2 {
        for j in 0..rows {
            stw[a][j] = (0..rows).map(|k| s[k][a] * w[k][j]).sum();
        }
    }

    let mut normal = [[0.0f64; 2]; 2];
    let mut rhs = [0.0f64; 2];
    for a in 0..2 {
        for b in 0..2 {
            normal[a][b] = (0..rows).map(|k| stw[a][k] * s[k][b]).sum();
        }
        rhs[a] = (0..rows).map(|k| stw[a][k] * u[k]).sum();
    }

    solve2(&normal, rhs)
        .map(|[x, y]| (x, y))
        .ok_or(SolveFailure::Singular)
}

#[cfg(test)]
mod tests {
    use lora_types::{TimeBase, Uplink};

    use crate::error::SolveFailure;
    use crate::solver::Algorithm;
    use crate::transaction::Transaction;

    #[test]
    fn three_receiver_variant_is_rank_deficient() {
        // healthy geometry and timing — the failure is structural, not data
        let tx = Transaction::new(
            "00000000FFFFFFFF",
            0,
            0,
            TimeBase::Nanoseconds,
            vec![
                Uplink::new("FF250C00010001A8", 17_795, 0.0, 0.0, 43.037270, -70.720497),
                Uplink::new("FF250C00010001A7", 49_534, 0.0, 0.0, 43.118840, -70.941940),
                Uplink::new("FF250C00010001A9", 29_563, 0.0, 0.0, 43.128362, -70.742126),
            ],
        )
        .unwrap();
        assert_eq!(
            Algorithm::Friedlander3.solve(&tx.project()),
            Err(SolveFailure::Singular)
        );
    }

    #[test]
    fn equal_arrival_times_are_degenerate() {
        let tx = Transaction::new(
            "00000000FFFFFFFF",
            0,
            0,
            TimeBase::Nanoseconds,
            vec![
                Uplink::new("FF250C00010001A8", 1_000, 0.0, 0.0, 43.03, -70.72),
                Uplink::new("FF250C00010001A7", 1_000, 0.0, 0.0, 43.11, -70.94),
                Uplink::new("FF250C00010001A9", 1_000, 0.0, 0.0, 43.12, -70.74),
                Uplink::new("FF250C00010001AA", 1_000, 0.0, 0.0, 42.95, -70.89),
            ],
        )
        .unwrap();
        assert_eq!(
            Algorithm::Friedlander.solve(&tx.project()),
            Err(SolveFailure::Singular)
        );
    }
}
