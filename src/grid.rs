//! Real-space grids and per-atom windows
//!
//! A grid is either a uniform mesh spanning a simulation cell (scalar volume
//! element) or an unstructured point cloud with per-point quadrature weights.
//! `box_around` selects the points within an atom's cutoff and converts their
//! offsets to spherical coordinates for the basis evaluators.

use color_eyre::eyre::{ensure, Result};
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

#[derive(Debug, Clone)]
enum VolumeWeight {
    Scalar(f64),
    PerPoint(Vec<f64>),
}

/// A fixed set of real-space quadrature points
#[derive(Debug, Clone)]
pub struct Grid {
    points: Vec<Vector3<f64>>,
    weight: VolumeWeight,
    // Present only for uniform meshes; enables the bounding-box scan
    shape: Option<[usize; 3]>,
    cell: Option<Matrix3<f64>>,
}

/// The subset of grid points within one atom's cutoff radius.
///
/// Linear indices are monotonic in grid scan order; `r`, `theta`, `phi` hold
/// the spherical coordinates of each point's offset from the atom.
#[derive(Debug, Clone, Default)]
pub struct GridWindow {
    pub indices: Vec<usize>,
    pub r: Vec<f64>,
    pub theta: Vec<f64>,
    pub phi: Vec<f64>,
}

impl GridWindow {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn push(&mut self, index: usize, offset: Vector3<f64>) {
        let r = offset.norm();
        self.indices.push(index);
        self.r.push(r);
        self.theta.push(if r > 0.0 { (offset.z / r).acos() } else { 0.0 });
        self.phi.push(offset.y.atan2(offset.x));
    }
}

impl Grid {
    /// Uniform mesh over a simulation cell. `cell` rows are the cell vectors;
    /// point `(i, j, k)` sits at `i/nx·a + j/ny·b + k/nz·c`, scanned k-fastest.
    pub fn uniform(cell: Matrix3<f64>, shape: [usize; 3]) -> Result<Self> {
        let [nx, ny, nz] = shape;
        ensure!(nx > 0 && ny > 0 && nz > 0, "grid shape must be nonzero: {:?}", shape);
        let volume = cell.determinant().abs();
        ensure!(volume > 0.0, "simulation cell is singular");

        let n_points = nx * ny * nz;
        let a = cell.row(0).transpose();
        let b = cell.row(1).transpose();
        let c = cell.row(2).transpose();

        let mut points = Vec::with_capacity(n_points);
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    points.push(
                        a * (i as f64 / nx as f64)
                            + b * (j as f64 / ny as f64)
                            + c * (k as f64 / nz as f64),
                    );
                }
            }
        }

        debug!(n_points, volume, "built uniform grid");
        Ok(Self {
            points,
            weight: VolumeWeight::Scalar(volume / n_points as f64),
            shape: Some(shape),
            cell: Some(cell),
        })
    }

    /// Unstructured point cloud with per-point quadrature weights
    pub fn unstructured(coords: Vec<Vector3<f64>>, weights: Vec<f64>) -> Result<Self> {
        ensure!(!coords.is_empty(), "grid has no points");
        ensure!(
            coords.len() == weights.len(),
            "coords/weights length mismatch: {} vs {}",
            coords.len(),
            weights.len()
        );
        Ok(Self {
            points: coords,
            weight: VolumeWeight::PerPoint(weights),
            shape: None,
            cell: None,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Quadrature weight of one grid point
    pub fn weight(&self, index: usize) -> f64 {
        match &self.weight {
            VolumeWeight::Scalar(w) => *w,
            VolumeWeight::PerPoint(w) => w[index],
        }
    }

    /// Select every grid point strictly within `r_o` of `pos`.
    ///
    /// An empty window is valid: a cutoff that reaches no grid point simply
    /// contributes nothing downstream.
    pub fn box_around(&self, pos: &Vector3<f64>, r_o: f64) -> GridWindow {
        match (&self.shape, &self.cell) {
            (Some(shape), Some(cell)) => self.box_around_uniform(pos, r_o, *shape, cell),
            _ => self.box_around_scan(pos, r_o),
        }
    }

    fn box_around_scan(&self, pos: &Vector3<f64>, r_o: f64) -> GridWindow {
        let mut window = GridWindow::default();
        for (index, point) in self.points.iter().enumerate() {
            let offset = point - pos;
            if offset.norm() < r_o {
                window.push(index, offset);
            }
        }
        window
    }

    fn box_around_uniform(
        &self,
        pos: &Vector3<f64>,
        r_o: f64,
        shape: [usize; 3],
        cell: &Matrix3<f64>,
    ) -> GridWindow {
        let [nx, ny, nz] = shape;
        let volume = cell.determinant().abs();
        let a = cell.row(0).transpose();
        let b = cell.row(1).transpose();
        let c = cell.row(2).transpose();

        // Slab heights per index step bound how far the cutoff sphere can
        // reach along each axis, also for non-orthogonal cells
        let heights = [
            volume / b.cross(&c).norm() / nx as f64,
            volume / c.cross(&a).norm() / ny as f64,
            volume / a.cross(&b).norm() / nz as f64,
        ];

        // Fractional coordinates of the atom position
        let frac = cell.transpose().try_inverse().map(|inv| inv * pos);
        let Some(frac) = frac else {
            return self.box_around_scan(pos, r_o);
        };

        let mut ranges = [(0usize, 0usize); 3];
        for (axis, &n) in [nx, ny, nz].iter().enumerate() {
            let center = frac[axis] * n as f64;
            let steps = (r_o / heights[axis]).ceil() + 1.0;
            let lo = (center - steps).floor().max(0.0) as usize;
            let hi = ((center + steps).ceil() as isize).min(n as isize - 1);
            if hi < lo as isize {
                return GridWindow::default();
            }
            ranges[axis] = (lo, hi as usize);
        }

        let mut window = GridWindow::default();
        for i in ranges[0].0..=ranges[0].1 {
            for j in ranges[1].0..=ranges[1].1 {
                for k in ranges[2].0..=ranges[2].1 {
                    let index = (i * ny + j) * nz + k;
                    let offset = self.points[index] - pos;
                    if offset.norm() < r_o {
                        window.push(index, offset);
                    }
                }
            }
        }
        window
    }
}
