//! End-to-end tests through the public API
//!
//! These build a projector from YAML configuration, run the forward and
//! adjoint passes on a small uniform grid and check the padding index map
//! against the projection output shapes.

use approx::assert_relative_eq;
use gridproj::{
    AoLabel, BasisPadder, BasisSet, GapPolicy, Grid, ProjectionConfig, Projector,
};
use nalgebra::{DMatrix, Matrix3, Vector3};
use std::collections::HashMap;

const WATER_CONFIG: &str = r#"
species:
  O:
    shells:
      - { l: 0, alpha: [1.2], coeff: [1.0], r_o: [2.5] }
      - { l: 1, alpha: [0.8], coeff: [1.0], r_o: [2.5] }
  H:
    shells:
      - { l: 0, alpha: [0.6], coeff: [1.0], r_o: [2.0] }
use_memory: true
"#;

fn water_projector() -> Projector {
    let config: ProjectionConfig = serde_yml::from_str(WATER_CONFIG).unwrap();
    let config = config.with_defaults();
    let grid = Grid::uniform(Matrix3::identity() * 10.0, [20, 20, 20]).unwrap();
    Projector::from_config(&config, grid).unwrap()
}

fn water_geometry() -> (Vec<Vector3<f64>>, Vec<String>) {
    let positions = vec![
        Vector3::new(5.0, 5.0, 5.0),
        Vector3::new(6.4, 5.0, 6.1),
        Vector3::new(3.6, 5.0, 6.1),
    ];
    let species = vec!["O".to_string(), "H".to_string(), "H".to_string()];
    (positions, species)
}

fn gaussian_density(grid: &Grid, center: Vector3<f64>) -> Vec<f64> {
    // A smooth blob centered on the oxygen, nothing physical about it
    let n = grid.len();
    let window = grid.box_around(&center, 1e9);
    let mut density = vec![0.0; n];
    for (slot, &index) in window.indices.iter().enumerate() {
        density[index] = (-0.5 * window.r[slot] * window.r[slot]).exp();
    }
    density
}

#[test]
fn test_forward_projection_from_yaml_config() {
    let projector = water_projector();
    let (positions, species) = water_geometry();
    let density = gaussian_density(projector.grid(), positions[0]);

    let rep = projector
        .get_basis_rep(&density, &positions, &species)
        .unwrap();

    // O: one s radial + one p radial -> 1 + 3 coefficients; H: one s radial
    assert_eq!((rep["O"].nrows(), rep["O"].ncols()), (1, 4));
    assert_eq!((rep["H"].nrows(), rep["H"].ncols()), (2, 1));

    // The blob is centered on the oxygen, so its s coefficient dominates
    assert!(rep["O"][(0, 0)] > 0.0);
    assert!(rep["O"][(0, 0)] > rep["H"][(0, 0)]);

    // Mirror-symmetric H atoms see the same density
    assert_relative_eq!(rep["H"][(0, 0)], rep["H"][(1, 0)], epsilon = 1e-10);
}

#[test]
fn test_adjoint_matches_forward_inner_product() {
    // <get_potential(g), rho> == <g, get_basis_rep(rho)> for any g and rho
    let projector = water_projector();
    let (positions, species) = water_geometry();
    let density = gaussian_density(projector.grid(), positions[0]);

    let rep = projector
        .get_basis_rep(&density, &positions, &species)
        .unwrap();

    let mut gradients = HashMap::new();
    gradients.insert(
        "O".to_string(),
        DMatrix::from_row_slice(1, 4, &[0.3, -1.1, 0.7, 0.2]),
    );
    gradients.insert(
        "H".to_string(),
        DMatrix::from_row_slice(2, 1, &[0.9, -0.4]),
    );
    let potential = projector
        .get_potential(&gradients, &positions, &species)
        .unwrap();

    let lhs: f64 = (0..density.len())
        .map(|p| potential[p] * density[p])
        .sum();
    let rhs = (gradients["O"].row(0) * rep["O"].row(0).transpose())[(0, 0)]
        + (gradients["H"].row(0) * rep["H"].row(0).transpose())[(0, 0)]
        + (gradients["H"].row(1) * rep["H"].row(1).transpose())[(0, 0)];
    assert_relative_eq!(lhs, rhs, epsilon = 1e-8 * rhs.abs().max(1.0));
}

#[test]
fn test_repeated_runs_identical_with_cache() {
    let projector = water_projector();
    let (positions, species) = water_geometry();
    let density = gaussian_density(projector.grid(), positions[0]);

    let first = projector
        .get_basis_rep(&density, &positions, &species)
        .unwrap();
    let second = projector
        .get_basis_rep(&density, &positions, &species)
        .unwrap();
    assert_eq!(first["O"], second["O"]);
    assert_eq!(first["H"], second["H"]);
}

#[test]
fn test_padding_round_trip_on_projection_sized_vector() {
    // Orbital labels matching the configured water basis
    let labels: Vec<AoLabel> = [
        "0 O 1s", "0 O 2px", "0 O 2py", "0 O 2pz", "1 H 1s", "2 H 1s",
    ]
    .iter()
    .map(|s| s.parse().unwrap())
    .collect();
    let padder = BasisPadder::new(&labels, GapPolicy::AllowSparse).unwrap();
    assert_eq!(padder.n_ao(), 6);

    let coeff: Vec<f64> = (0..6).map(|i| (i as f64 + 1.0) * 0.7).collect();
    let padded = padder.pad_basis(&coeff).unwrap();
    let back = padder.unpad_basis(&padded).unwrap();
    assert_eq!(back, coeff);

    // Padded O block spans the dense 2-by-(1+1)^2 rectangle
    assert_eq!(padded["O"].ncols(), 8);
    assert_eq!(padded["H"].ncols(), 1);
}

#[test]
fn test_spec_agnostic_toggle_selects_stacked_layout() {
    let yaml = r#"
species:
  O:
    shells:
      - { l: 0, alpha: [1.0], coeff: [1.0], r_o: [2.0] }
  N:
    shells:
      - { l: 0, alpha: [0.9], coeff: [1.0], r_o: [2.0] }
spec_agnostic: true
"#;
    let config: ProjectionConfig = serde_yml::from_str(yaml).unwrap();
    let config = config.with_defaults();
    assert!(config.is_spec_agnostic());

    let labels: Vec<AoLabel> = ["0 O 1s", "1 N 1s"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    let padder = BasisPadder::new(&labels, config.gap_policy()).unwrap();

    let coeff = vec![0.25, 0.75];
    let padded = if config.is_spec_agnostic() {
        padder.pad_agnostic(&coeff).unwrap()
    } else {
        padder.pad_basis(&coeff).unwrap()
    };
    let x = &padded["X"];
    assert_eq!((x.nrows(), x.ncols()), (2, 1));

    let split = padder.split_agnostic(x).unwrap();
    assert_eq!(padder.unpad_basis(&split).unwrap(), coeff);
}

#[test]
fn test_basis_set_reports_configured_species() {
    let config: ProjectionConfig = serde_yml::from_str(WATER_CONFIG).unwrap();
    let basis = BasisSet::from_config(&config.with_defaults()).unwrap();
    let mut symbols: Vec<&str> = basis.species_symbols().collect();
    symbols.sort_unstable();
    assert_eq!(symbols, vec!["H", "O"]);
    assert_eq!(basis.require("O").unwrap().n_coeff(), 4);
    assert!(basis.require("C").is_err());
}
