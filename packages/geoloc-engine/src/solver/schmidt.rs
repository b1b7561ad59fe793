//! schmidt.rs — closed-form solve of two characteristic equations.
//!
//! Each triple of receivers {1, 2, k} yields one linear characteristic
//! equation `A_k x + B_k y = D_k` in the source position; receivers
//! {1, 2, 3} and {1, 2, 4} together give a 2×2 system solved directly.
//! Needs four receivers.

use crate::error::SolveFailure;
use crate::linalg::solve2;
use crate::transaction::ProjectedBurst;

use super::range_difference;

pub(super) fn solve(burst: &ProjectedBurst) -> Result<(f64, f64), SolveFailure> {
    let rx = burst.receivers();
    if rx.len() < 4 {
        return Err(SolveFailure::InsufficientReceivers);
    }
    let tb = burst.time_base();

    let (x1, y1) = (rx[0].x, rx[0].y);
    let (x2, y2) = (rx[1].x, rx[1].y);
    let (x3, y3) = (rx[2].x, rx[2].y);
    let (x4, y4) = (rx[3].x, rx[3].y);

    let m21 = range_difference(rx[0].time, rx[1].time, tb);
    let m32 = range_difference(rx[1].time, rx[2].time, tb);
    let m13 = range_difference(rx[2].time, rx[0].time, tb);
    let m42 = range_difference(rx[1].time, rx[3].time, tb);
    let m14 = range_difference(rx[3].time, rx[0].time, tb);

    let r1_sq = x1 * x1 + y1 * y1;
    let r2_sq = x2 * x2 + y2 * y2;
    let r3_sq = x3 * x3 + y3 * y3;
    let r4_sq = x4 * x4 + y4 * y4;

    // characteristic equation from receivers {1, 2, 3}
    let a3 = x1 * m32 + x2 * m13 + x3 * (-m32 - m13);
    let b3 = y1 * m32 + y2 * m13 + y3 * (-m32 - m13);
    let d3 = 0.5 * (m21 * m32 * m13 + r1_sq * m32 + r2_sq * m13 + r3_sq * (-m32 - m13));

    // and from receivers {1, 2, 4}
    let a4 = x1 * m42 + x2 * m14 + x4 * (-m42 - m14);
    let b4 = y1 * m42 + y2 * m14 + y4 * (-m42 - m14);
    let d4 = 0.5 * (m21 * m42 * m14 + r1_sq * m42 + r2_sq * m14 + r4_sq * (-m42 - m14));

    solve2(&[[a3, b3], [a4, b4]], [d3, d4])
        .map(|[x, y]| (x, y))
        .ok_or(SolveFailure::Singular)
}
