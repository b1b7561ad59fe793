//! schau_robinson.rs — closed-form solve via a quadratic in the source
//! distance.
//!
//! One receiver is translated to the local origin; writing every other
//! receiver's range equation against the unknown source-to-origin distance
//! R_s gives `M·p = (T − 2 R_s d) / 2` plus the constraint |p| = R_s, which
//! collapses to a quadratic in R_s. The 4-receiver variant uses the
//! pseudo-inverse of the 3×2 receiver matrix; with 3 receivers the matrix is
//! square and the pseudo-inverse is the exact inverse.

use crate::error::SolveFailure;
use crate::linalg::{dot, invert2, SINGULAR_EPS};
use crate::transaction::ProjectedBurst;

use super::range_difference;

pub(super) fn solve(burst: &ProjectedBurst, n: usize) -> Result<(f64, f64), SolveFailure> {
    let rx = burst.receivers();
    if rx.len() < n {
        return Err(SolveFailure::InsufficientReceivers);
    }
    let tb = burst.time_base();
    let rows = n - 1;

    // translate so the last-used receiver sits at the origin
    let reference = &rx[n - 1];
    let (x_ref, y_ref, t_ref) = (reference.x, reference.y, reference.time);

    let pts: Vec<[f64; 2]> = (0..rows)
        .map(|i| [rx[i].x - x_ref, rx[i].y - y_ref])
        .collect();

    // d_i: range differences against the origin receiver
    let d: Vec<f64> = (0..rows)
        .map(|i| range_difference(t_ref, rx[i].time, tb))
        .collect();
    let t_vec: Vec<f64> = (0..rows)
        .map(|i| pts[i][0] * pts[i][0] + pts[i][1] * pts[i][1] - d[i] * d[i])
        .collect();

    // M⁺ = (MᵀM)⁻¹Mᵀ — the exact inverse when M is square
    let mut mtm = [[0.0f64; 2]; 2];
    for a in 0..2 {
        for b in 0..2 {
            mtm[a][b] = (0..rows).map(|k| pts[k][a] * pts[k][b]).sum();
        }
    }
    let inv = invert2(&mtm).ok_or(SolveFailure::Singular)?;

    let mut pinv = [[0.0f64; 3]; 2]; // 2 × rows, rows ≤ 3
    for a in 0..2 {
        for j in 0..rows {
            pinv[a][j] = inv[a][0] * pts[j][0] + inv[a][1] * pts[j][1];
        }
    }

    // quadratic a·R_s² + b·R_s + c = 0 from |p| = R_s
    let md = [
        dot(&pinv[0][..rows], &d),
        dot(&pinv[1][..rows], &d),
    ];
    let mt = [
        dot(&pinv[0][..rows], &t_vec),
        dot(&pinv[1][..rows], &t_vec),
    ];
    let a = 4.0 - 4.0 * dot(&md, &md);
    let b = 4.0 * dot(&md, &mt);
    let c = -dot(&mt, &mt);

    if a.abs() < SINGULAR_EPS {
        return Err(SolveFailure::Singular);
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return Err(SolveFailure::NoRealSolution);
    }

    let sqrt_disc = discriminant.sqrt();
    let roots = [(-b + sqrt_disc) / (2.0 * a), (-b - sqrt_disc) / (2.0 * a)];

    // R_s is a distance: only a positive root is physical. When both roots
    // are positive, keep the one whose reconstructed geometry reproduces the
    // observed range differences best.
    let mut best: Option<(f64, (f64, f64))> = None;
    for r_s in roots {
        if !(r_s > 0.0) {
            continue;
        }
        let p = position_for(&pinv, rows, &t_vec, &d, r_s);
        let residual = tdoa_residual(&pts, &d, p);
        if best.as_ref().is_none_or(|(r, _)| residual < *r) {
            best = Some((residual, p));
        }
    }

    let (_, (px, py)) = best.ok_or(SolveFailure::NoRealSolution)?;
    Ok((px + x_ref, py + y_ref))
}

/// p = ½ M⁺ (T − 2 R_s d), in the translated frame.
fn position_for(
    pinv: &[[f64; 3]; 2],
    rows: usize,
    t_vec: &[f64],
    d: &[f64],
    r_s: f64,
) -> (f64, f64) {
    let mut p = [0.0f64; 2];
    for (a, p_a) in p.iter_mut().enumerate() {
        *p_a = 0.5
            * (0..rows)
                .map(|k| pinv[a][k] * (t_vec[k] - 2.0 * r_s * d[k]))
                .sum::<f64>();
    }
    (p[0], p[1])
}

/// How far the candidate's implied range differences sit from the observed
/// ones, summed over receivers.
fn tdoa_residual(pts: &[[f64; 2]], d: &[f64], (px, py): (f64, f64)) -> f64 {
    let r_ref = px.hypot(py);
    pts.iter()
        .zip(d)
        .map(|(p, d_i)| {
            let r_i = (px - p[0]).hypot(py - p[1]);
            ((r_i - r_ref) - d_i).abs()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use lora_types::{TimeBase, Uplink};

    use crate::error::SolveFailure;
    use crate::solver::Algorithm;
    use crate::transaction::Transaction;

    #[test]
    fn collinear_receivers_are_singular() {
        let tx = Transaction::new(
            "00000000FFFFFFFF",
            0,
            0,
            TimeBase::Nanoseconds,
            vec![
                Uplink::new("FF250C00010001A7", 1_000, 0.0, 0.0, 43.00, -70.8),
                Uplink::new("FF250C00010001A8", 1_000, 0.0, 0.0, 43.05, -70.8),
                Uplink::new("FF250C00010001A9", 1_000, 0.0, 0.0, 43.10, -70.8),
            ],
        )
        .unwrap();
        assert_eq!(
            Algorithm::SchauAndRobinson3.solve(&tx.project()),
            Err(SolveFailure::Singular)
        );
    }
}
