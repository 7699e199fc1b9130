//! Smoothed, normalized radial Gaussian basis functions

use super::{RadialContraction, Shell};
use itertools::izip;
use std::f64::consts::PI;

/// Γ(l + 3/2) / √π for l = 0..=7, i.e. (2l+1)!! / 2^(l+1)
const GAMMA_HALF: [f64; 8] = [
    1.0 / 2.0,
    3.0 / 4.0,
    15.0 / 8.0,
    105.0 / 16.0,
    945.0 / 32.0,
    10395.0 / 64.0,
    135135.0 / 128.0,
    2027025.0 / 256.0,
];

/// Evaluate one contracted radial function on a radius array.
///
/// Each primitive `exp(-α r²)` carries the closed-form normalization
/// `(2α)^(l/2+3/4) √2 / √Γ(l+3/2)`; the contracted sum is multiplied by
/// `r^l` and by the smooth cutoff envelope
/// `1 − (½(1 − cos(π r / r_o)))^8`, which is 1 at r = 0 and 0 at r = r_o.
/// Values at and beyond the cutoff are clamped to exactly zero; the envelope
/// alone is not guaranteed to vanish bit-exactly at the boundary.
pub fn radial(r: &[f64], l: usize, contraction: &RadialContraction) -> Vec<f64> {
    let r_o = contraction.r_o_max();
    let gamma = GAMMA_HALF[l] * PI.sqrt();
    let norm: f64 = contraction
        .alpha
        .iter()
        .map(|&a| (2.0 * a).powf(l as f64 / 2.0 + 0.75) * 2.0_f64.sqrt() / gamma.sqrt())
        .sum();

    r.iter()
        .map(|&ri| {
            if ri >= r_o {
                return 0.0;
            }
            let fc = 1.0 - (0.5 * (1.0 - (PI * ri / r_o).cos())).powi(8);
            let f: f64 = izip!(&contraction.alpha, &contraction.coeff)
                .map(|(&a, &c)| c * (-a * ri * ri).exp())
                .sum();
            f * ri.powi(l as i32) * fc * norm
        })
        .collect()
}

/// Evaluate every radial function of a list of shells on a radius array,
/// returning one array per radial function per shell.
pub fn radials(r: &[f64], shells: &[Shell]) -> Vec<Vec<Vec<f64>>> {
    shells
        .iter()
        .map(|shell| {
            shell
                .radials
                .iter()
                .map(|contraction| radial(r, shell.l, contraction))
                .collect()
        })
        .collect()
}
