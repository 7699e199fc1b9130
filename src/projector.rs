//! Density projection onto atom-centered basis functions
//!
//! The forward pass contracts a real-space density against radial × angular
//! basis functions inside each atom's grid window; the adjoint pass
//! distributes a coefficient-space gradient back onto the grid through the
//! same factors. Per-atom work is independent and runs in parallel; the
//! adjoint accumulates per-atom grid contributions with a fold/reduce so
//! overlapping windows never lose updates.

use crate::basis::{angulars_real, radial, BasisSet, SpeciesBasis};
use crate::config::ProjectionConfig;
use crate::grid::{Grid, GridWindow};
use color_eyre::eyre::{ensure, eyre, Result};
use nalgebra::{DMatrix, DVector, Vector3};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Window and angular grids for one atom, reusable across passes at a fixed
/// geometry
struct AtomGrids {
    window: GridWindow,
    /// One matrix per distinct angular momentum in the species basis
    angulars: Vec<(usize, DMatrix<f64>)>,
}

type CacheKey = (String, [u64; 3]);

/// Projects densities onto per-species basis coefficients and gradients back
/// onto the grid.
pub struct Projector {
    basis: BasisSet,
    grid: Grid,
    // Memoization hint only; correctness never depends on a hit
    cache: Option<Mutex<HashMap<CacheKey, Arc<AtomGrids>>>>,
}

impl Projector {
    pub fn new(basis: BasisSet, grid: Grid, use_memory: bool) -> Self {
        Self {
            basis,
            grid,
            cache: use_memory.then(|| Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &ProjectionConfig, grid: Grid) -> Result<Self> {
        let basis = BasisSet::from_config(config)?;
        Ok(Self::new(basis, grid, config.is_memory_enabled()))
    }

    pub fn basis(&self) -> &BasisSet {
        &self.basis
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Calculate the basis representation of a real-space density.
    ///
    /// Returns one `[atoms of that species, n_coeff]` matrix per species,
    /// with atom rows in the order atoms appear in `positions`.
    pub fn get_basis_rep(
        &self,
        density: &[f64],
        positions: &[Vector3<f64>],
        species: &[String],
    ) -> Result<HashMap<String, DMatrix<f64>>> {
        self.check_geometry(positions, species)?;
        ensure!(
            density.len() == self.grid.len(),
            "density has {} points but the grid has {}",
            density.len(),
            self.grid.len()
        );

        let rows: Vec<DVector<f64>> = positions
            .par_iter()
            .zip(species.par_iter())
            .map(|(pos, sym)| {
                let basis = self.basis.require(sym)?;
                let grids = self.atom_grids(sym, pos, basis);
                Ok(self.project_atom(density, &grids, basis))
            })
            .collect::<Result<_>>()?;

        debug!(atoms = positions.len(), "projected density onto basis");
        Ok(group_by_species(rows, species))
    }

    /// Reconstruct a grid-shaped potential from a coefficient-space gradient
    /// (adjoint of `get_basis_rep`).
    ///
    /// Overlapping atom windows accumulate additively.
    pub fn get_potential(
        &self,
        gradients: &HashMap<String, DMatrix<f64>>,
        positions: &[Vector3<f64>],
        species: &[String],
    ) -> Result<DVector<f64>> {
        self.check_geometry(positions, species)?;
        self.check_gradients(gradients, species)?;

        // Pair every atom with its row inside its species' gradient matrix
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let atoms: Vec<(usize, &Vector3<f64>, &String)> = positions
            .iter()
            .zip(species.iter())
            .map(|(pos, sym)| {
                let row = seen.entry(sym.as_str()).or_insert(0);
                let this = *row;
                *row += 1;
                (this, pos, sym)
            })
            .collect();

        let n = self.grid.len();
        let potential = atoms
            .par_iter()
            .fold(
                || DVector::<f64>::zeros(n),
                |mut acc, (row, pos, sym)| {
                    // Geometry and gradients were validated up front
                    let basis = self.basis.require(sym).expect("species checked");
                    let grads = &gradients[sym.as_str()];
                    let grids = self.atom_grids(sym, pos, basis);
                    self.accumulate_atom(&mut acc, grads.row(*row).transpose(), &grids, basis);
                    acc
                },
            )
            .reduce(|| DVector::<f64>::zeros(n), |a, b| a + b);

        debug!(atoms = positions.len(), "reconstructed potential from gradient");
        Ok(potential)
    }

    fn check_geometry(&self, positions: &[Vector3<f64>], species: &[String]) -> Result<()> {
        ensure!(
            positions.len() == species.len(),
            "{} positions but {} species labels",
            positions.len(),
            species.len()
        );
        for sym in species {
            self.basis.require(sym)?;
        }
        Ok(())
    }

    fn check_gradients(
        &self,
        gradients: &HashMap<String, DMatrix<f64>>,
        species: &[String],
    ) -> Result<()> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for sym in species {
            *counts.entry(sym.as_str()).or_insert(0) += 1;
        }
        for (sym, count) in counts {
            let grads = gradients
                .get(sym)
                .ok_or_else(|| eyre!("no gradient supplied for species {}", sym))?;
            let n_coeff = self.basis.require(sym)?.n_coeff();
            ensure!(
                grads.nrows() == count && grads.ncols() == n_coeff,
                "gradient for {} has shape [{}, {}], expected [{}, {}]",
                sym,
                grads.nrows(),
                grads.ncols(),
                count,
                n_coeff
            );
        }
        Ok(())
    }

    /// Window and angular grids for one atom, from the cache when enabled
    fn atom_grids(&self, sym: &str, pos: &Vector3<f64>, basis: &SpeciesBasis) -> Arc<AtomGrids> {
        let key = || {
            (
                sym.to_string(),
                [pos.x.to_bits(), pos.y.to_bits(), pos.z.to_bits()],
            )
        };
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().unwrap().get(&key()) {
                return Arc::clone(hit);
            }
        }

        let window = self.grid.box_around(pos, basis.r_o_max());
        let mut ls: Vec<usize> = basis.shells.iter().map(|s| s.l).collect();
        ls.dedup();
        let angulars = ls
            .into_iter()
            .map(|l| (l, angulars_real(l, &window.theta, &window.phi)))
            .collect();
        let grids = Arc::new(AtomGrids { window, angulars });

        if let Some(cache) = &self.cache {
            cache.lock().unwrap().insert(key(), Arc::clone(&grids));
        }
        grids
    }

    /// Forward contraction for one atom: c[n, m] = Σ_p ρ[p] Y[m, p] R[n, p] w[p]
    fn project_atom(
        &self,
        density: &[f64],
        grids: &AtomGrids,
        basis: &SpeciesBasis,
    ) -> DVector<f64> {
        let window = &grids.window;
        let mut coeff = Vec::with_capacity(basis.n_coeff());

        for shell in &basis.shells {
            let ang = angular_for(grids, shell.l);
            let r_o_shell = shell.r_o_max();
            let inside: Vec<usize> = (0..window.len())
                .filter(|&p| window.r[p] < r_o_shell)
                .collect();
            let r_inside: Vec<f64> = inside.iter().map(|&p| window.r[p]).collect();

            for contraction in &shell.radials {
                let rad = radial(&r_inside, shell.l, contraction);
                for m in 0..(2 * shell.l + 1) {
                    let mut c = 0.0;
                    for (slot, &p) in inside.iter().enumerate() {
                        let index = window.indices[p];
                        c += density[index]
                            * ang[(m, p)]
                            * rad[slot]
                            * self.grid.weight(index);
                    }
                    coeff.push(c);
                }
            }
        }
        DVector::from_vec(coeff)
    }

    /// Adjoint of `project_atom`: V[p] += g[n, m] Y[m, p] R[n, p] w[p]
    fn accumulate_atom(
        &self,
        potential: &mut DVector<f64>,
        gradient: DVector<f64>,
        grids: &AtomGrids,
        basis: &SpeciesBasis,
    ) {
        let window = &grids.window;
        let mut col = 0;

        for shell in &basis.shells {
            let ang = angular_for(grids, shell.l);
            let r_o_shell = shell.r_o_max();
            let inside: Vec<usize> = (0..window.len())
                .filter(|&p| window.r[p] < r_o_shell)
                .collect();
            let r_inside: Vec<f64> = inside.iter().map(|&p| window.r[p]).collect();

            for contraction in &shell.radials {
                let rad = radial(&r_inside, shell.l, contraction);
                for m in 0..(2 * shell.l + 1) {
                    let g = gradient[col];
                    col += 1;
                    if g == 0.0 {
                        continue;
                    }
                    for (slot, &p) in inside.iter().enumerate() {
                        let index = window.indices[p];
                        potential[index] +=
                            g * ang[(m, p)] * rad[slot] * self.grid.weight(index);
                    }
                }
            }
        }
    }
}

fn angular_for(grids: &AtomGrids, l: usize) -> &DMatrix<f64> {
    &grids
        .angulars
        .iter()
        .find(|(al, _)| *al == l)
        .expect("angular grid built for every shell l")
        .1
}

/// Stack per-atom coefficient rows into one matrix per species, preserving
/// input atom order
fn group_by_species(
    rows: Vec<DVector<f64>>,
    species: &[String],
) -> HashMap<String, DMatrix<f64>> {
    let mut grouped: HashMap<String, Vec<DVector<f64>>> = HashMap::new();
    for (row, sym) in rows.into_iter().zip(species.iter()) {
        grouped.entry(sym.clone()).or_default().push(row);
    }
    grouped
        .into_iter()
        .map(|(sym, rows)| {
            let ncols = rows[0].len();
            let matrix = DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]);
            (sym, matrix)
        })
        .collect()
}
