//! taylor.rs — Gauss–Newton refinement of the range-difference model.
//!
//! Linearise the TDOA residuals around the current estimate, solve the 2×2
//! normal equations for a correction, repeat until the step shrinks below the
//! convergence threshold. When the normal matrix degenerates (or the iterate
//! runs off to non-finite territory) the estimate restarts from a widening
//! grid of seeds around the reference receiver.

use tracing::{debug, trace};

use crate::error::SolveFailure;
use crate::linalg::solve2;
use crate::transaction::ProjectedBurst;

use super::range_difference;

/// Iteration budget for the Gauss–Newton loop.
const MAX_ITERATIONS: u32 = 50;
/// Converged when both step components are below this, metres.
const CONVERGENCE_M: f64 = 10.0;
/// Spacing of the fallback seed grid, metres.
const RESEED_STEP_M: f64 = 5_000.0;
/// Alternating ± sweeps per axis; 25 × 25 fallback positions in total.
const RESEED_SWEEPS: u32 = 25;
/// Ranges are floored here so a seed sitting on a receiver cannot divide by
/// zero.
const MIN_RANGE_M: f64 = 1e-3;

pub(super) fn solve(burst: &ProjectedBurst) -> Result<(f64, f64), SolveFailure> {
    let rx = burst.receivers();
    let tb = burst.time_base();
    let (x1, y1) = (rx[0].x, rx[0].y);

    // initial estimate: offset from the reference receiver
    let mut x0 = x1 - 1_000.0;
    let mut y0 = y1 + 1_000.0;

    let mut iterations = 0u32;
    let mut spiral = SeedSpiral::new();

    loop {
        if iterations > MAX_ITERATIONS {
            debug!("taylor: no convergence after {iterations} iterations");
            return Err(SolveFailure::NoConvergence);
        }

        // ranges from the current estimate to every receiver
        let r: Vec<f64> = rx
            .iter()
            .map(|p| ((p.x - x0).powi(2) + (p.y - y0).powi(2)).sqrt().max(MIN_RANGE_M))
            .collect();

        // residuals h_i and Jacobian rows g_i against the reference receiver,
        // accumulated straight into the normal equations GᵀG δ = Gᵀh
        let mut gtg = [[0.0f64; 2]; 2];
        let mut gth = [0.0f64; 2];
        for i in 1..rx.len() {
            let h = range_difference(rx[0].time, rx[i].time, tb) - (r[i] - r[0]);
            let gx = (x1 - x0) / r[0] - (rx[i].x - x0) / r[i];
            let gy = (y1 - y0) / r[0] - (rx[i].y - y0) / r[i];

            gtg[0][0] += gx * gx;
            gtg[0][1] += gx * gy;
            gtg[1][0] += gy * gx;
            gtg[1][1] += gy * gy;
            gth[0] += gx * h;
            gth[1] += gy * h;
        }

        match solve2(&gtg, gth) {
            Some([dx, dy]) => {
                x0 += dx;
                y0 += dy;
                trace!("taylor: step ({dx:.1}, {dy:.1}) -> ({x0:.1}, {y0:.1})");

                if dx.abs() < CONVERGENCE_M && dy.abs() < CONVERGENCE_M {
                    return Ok((x0, y0));
                }
                iterations += 1;
            }
            None => {
                // degenerate normal matrix — restart from the next seed
                let Some((sx, sy)) = spiral.next_offset() else {
                    debug!("taylor: seed grid exhausted");
                    return Err(SolveFailure::NoConvergence);
                };
                x0 = x1 + sx;
                y0 = y1 + sy;
            }
        }
    }
}

/// Fallback seed positions around the reference receiver: alternating
/// ±[`RESEED_STEP_M`] sweeps along x, then shifted along y the same way.
struct SeedSpiral {
    i: u32,
    j: u32,
    inc_x: f64,
    inc_y: f64,
    used: u32,
}

impl SeedSpiral {
    fn new() -> Self {
        Self {
            i: 0,
            j: 1,
            inc_x: 0.0,
            inc_y: 0.0,
            used: 0,
        }
    }

    fn next_offset(&mut self) -> Option<(f64, f64)> {
        self.used += 1;
        if self.used > RESEED_SWEEPS * RESEED_SWEEPS {
            return None;
        }

        if self.i % 2 == 0 {
            self.inc_x -= RESEED_STEP_M * f64::from(self.i);
        } else {
            self.inc_x += RESEED_STEP_M * f64::from(self.i);
        }
        self.i += 1;

        if self.i > RESEED_SWEEPS {
            if self.j % 2 == 0 {
                self.inc_y -= RESEED_STEP_M * f64::from(self.j);
            } else {
                self.inc_y += RESEED_STEP_M * f64::from(self.j);
            }
            self.i = 0;
            self.inc_x = 0.0;
            self.j += 1;
            if self.j > RESEED_SWEEPS {
                return None;
            }
        }

        Some((self.inc_x, self.inc_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_seed_is_the_reference_receiver() {
        let mut spiral = SeedSpiral::new();
        assert_eq!(spiral.next_offset(), Some((0.0, 0.0)));
        // then the sweep widens along x
        assert_eq!(spiral.next_offset(), Some((RESEED_STEP_M, 0.0)));
        assert_eq!(spiral.next_offset(), Some((-RESEED_STEP_M, 0.0)));
    }

    #[test]
    fn seed_grid_is_bounded() {
        let mut spiral = SeedSpiral::new();
        let mut n = 0;
        while spiral.next_offset().is_some() {
            n += 1;
            assert!(n <= RESEED_SWEEPS * RESEED_SWEEPS, "spiral never ends");
        }
        assert!(n >= 500, "only {n} seeds produced");
    }
}
