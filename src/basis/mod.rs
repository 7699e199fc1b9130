//! Basis descriptors and basis-function evaluation
//!
//! A species basis is a list of shells; each shell carries one angular
//! momentum and one or more contracted radial Gaussians with smooth outer
//! cutoffs. Descriptors are validated once at construction and immutable
//! afterwards.

mod angular;
mod parser;
mod radial;

pub use angular::angulars_real;
pub use parser::parse_nwchem;
pub use radial::{radial, radials};

use crate::config::{ProjectionConfig, ShellConfig, SpeciesConfig};
use color_eyre::eyre::{bail, ensure, eyre, Result};
use periodic_table_on_an_enum::Element;
use std::collections::HashMap;
use tracing::{debug, info};

/// Highest angular momentum with a letter code (s, p, d, f, g, h, i, j)
pub const L_MAX: usize = 7;

const L_LETTERS: [char; 8] = ['s', 'p', 'd', 'f', 'g', 'h', 'i', 'j'];

/// Letter code for an angular momentum, `l = 0..=7`
pub fn l_to_letter(l: usize) -> Option<char> {
    L_LETTERS.get(l).copied()
}

/// Angular momentum for a letter code
pub fn letter_to_l(letter: char) -> Option<usize> {
    L_LETTERS.iter().position(|&c| c == letter)
}

/// One contracted radial Gaussian: exponents, contraction coefficients and a
/// per-primitive outer cutoff radius.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialContraction {
    pub alpha: Vec<f64>,
    pub coeff: Vec<f64>,
    pub r_o: Vec<f64>,
}

impl RadialContraction {
    pub fn new(alpha: Vec<f64>, coeff: Vec<f64>, r_o: Vec<f64>) -> Result<Self> {
        ensure!(!alpha.is_empty(), "radial contraction has no exponents");
        ensure!(
            alpha.len() == coeff.len() && alpha.len() == r_o.len(),
            "mismatched contraction arrays: {} exponents, {} coefficients, {} cutoffs",
            alpha.len(),
            coeff.len(),
            r_o.len()
        );
        for &a in &alpha {
            ensure!(a > 0.0, "exponent must be positive, got {}", a);
        }
        for &r in &r_o {
            ensure!(r > 0.0, "cutoff radius must be positive, got {}", r);
        }
        Ok(Self { alpha, coeff, r_o })
    }

    /// Outer cutoff of this contraction (maximum over primitives)
    pub fn r_o_max(&self) -> f64 {
        self.r_o.iter().cloned().fold(0.0, f64::max)
    }
}

/// A group of radial functions sharing one angular momentum
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    pub l: usize,
    pub radials: Vec<RadialContraction>,
}

impl Shell {
    pub fn new(l: usize, radials: Vec<RadialContraction>) -> Result<Self> {
        ensure!(l <= L_MAX, "angular momentum {} beyond supported range", l);
        ensure!(!radials.is_empty(), "shell with l={} has no radial functions", l);
        Ok(Self { l, radials })
    }

    /// Number of scalar coefficients this shell produces per atom
    pub fn n_coeff(&self) -> usize {
        self.radials.len() * (2 * self.l + 1)
    }

    pub fn r_o_max(&self) -> f64 {
        self.radials.iter().map(|c| c.r_o_max()).fold(0.0, f64::max)
    }
}

/// All shells configured for one species, in projection order
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesBasis {
    pub shells: Vec<Shell>,
}

impl SpeciesBasis {
    pub fn new(shells: Vec<Shell>) -> Result<Self> {
        ensure!(!shells.is_empty(), "species basis has no shells");
        Ok(Self { shells })
    }

    /// Total number of scalar coefficients per atom
    pub fn n_coeff(&self) -> usize {
        self.shells.iter().map(Shell::n_coeff).sum()
    }

    /// Maximum cutoff over all shells; defines the atom's grid window
    pub fn r_o_max(&self) -> f64 {
        self.shells.iter().map(Shell::r_o_max).fold(0.0, f64::max)
    }
}

/// Per-species basis descriptors, built once per run from configuration
#[derive(Debug, Clone)]
pub struct BasisSet {
    species: HashMap<String, SpeciesBasis>,
}

impl BasisSet {
    /// Build descriptors from a projection configuration.
    ///
    /// Each species entry must carry either NWChem basis text or an inline
    /// shell list; unknown element symbols are rejected.
    pub fn from_config(config: &ProjectionConfig) -> Result<Self> {
        let mut species = HashMap::new();
        for (sym, spec_config) in &config.species {
            let basis = Self::species_from_config(sym, spec_config)?;
            debug!(
                species = sym.as_str(),
                shells = basis.shells.len(),
                n_coeff = basis.n_coeff(),
                "configured species basis"
            );
            species.insert(sym.clone(), basis);
        }
        ensure!(!species.is_empty(), "configuration declares no species");
        info!(n_species = species.len(), "basis set ready");
        Ok(Self { species })
    }

    fn species_from_config(sym: &str, config: &SpeciesConfig) -> Result<SpeciesBasis> {
        Element::from_symbol(sym)
            .ok_or_else(|| eyre!("unknown element symbol: {}", sym))?;
        let sigma = config.sigma.unwrap_or(2.0);

        if let Some(text) = &config.basis {
            let (parsed_sym, shells) = parse_nwchem(text, sigma)?;
            ensure!(
                parsed_sym == sym,
                "basis text declares element {} but is configured for {}",
                parsed_sym,
                sym
            );
            return SpeciesBasis::new(shells);
        }

        if let Some(shell_configs) = &config.shells {
            let shells = shells_from_inline(shell_configs)?;
            return SpeciesBasis::new(shells);
        }

        bail!("species {} declares neither basis text nor inline shells", sym)
    }

    pub fn get(&self, sym: &str) -> Option<&SpeciesBasis> {
        self.species.get(sym)
    }

    /// Look up a species basis, failing fast when none is configured
    pub fn require(&self, sym: &str) -> Result<&SpeciesBasis> {
        self.species
            .get(sym)
            .ok_or_else(|| eyre!("no basis configured for species {}", sym))
    }

    pub fn species_symbols(&self) -> impl Iterator<Item = &str> {
        self.species.keys().map(String::as_str)
    }
}

fn shells_from_inline(configs: &[ShellConfig]) -> Result<Vec<Shell>> {
    // Group inline declarations by angular momentum, preserving order within
    // each group.
    let mut by_l: Vec<(usize, Vec<RadialContraction>)> = Vec::new();
    for sc in configs {
        let contraction =
            RadialContraction::new(sc.alpha.clone(), sc.coeff.clone(), sc.r_o.clone())?;
        match by_l.iter_mut().find(|(l, _)| *l == sc.l) {
            Some((_, group)) => group.push(contraction),
            None => by_l.push((sc.l, vec![contraction])),
        }
    }
    by_l.sort_by_key(|(l, _)| *l);
    by_l
        .into_iter()
        .map(|(l, radials)| Shell::new(l, radials))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectionConfig;

    fn single_shell_config() -> ProjectionConfig {
        let yaml = r#"
species:
  O:
    shells:
      - { l: 0, alpha: [1.0], coeff: [1.0], r_o: [2.0] }
"#;
        serde_yml::from_str::<ProjectionConfig>(yaml)
            .unwrap()
            .with_defaults()
    }

    #[test]
    fn test_letter_codes_round_trip() {
        for l in 0..=L_MAX {
            let letter = l_to_letter(l).unwrap();
            assert_eq!(letter_to_l(letter), Some(l));
        }
        assert_eq!(l_to_letter(8), None);
        assert_eq!(letter_to_l('k'), None);
    }

    #[test]
    fn test_contraction_rejects_mismatched_lengths() {
        let result = RadialContraction::new(vec![1.0, 2.0], vec![1.0], vec![2.0, 2.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_contraction_rejects_empty_exponents() {
        let result = RadialContraction::new(vec![], vec![], vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_contraction_rejects_nonpositive_exponent() {
        let result = RadialContraction::new(vec![0.0], vec![1.0], vec![2.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_basis_set_from_config() {
        let basis = BasisSet::from_config(&single_shell_config()).unwrap();
        let o = basis.require("O").unwrap();
        assert_eq!(o.shells.len(), 1);
        assert_eq!(o.n_coeff(), 1);
        assert_eq!(o.r_o_max(), 2.0);
        assert!(basis.require("H").is_err());
    }

    #[test]
    fn test_unknown_element_rejected() {
        let yaml = r#"
species:
  Xx:
    shells:
      - { l: 0, alpha: [1.0], coeff: [1.0], r_o: [2.0] }
"#;
        let config: ProjectionConfig = serde_yml::from_str::<ProjectionConfig>(yaml)
            .unwrap()
            .with_defaults();
        assert!(BasisSet::from_config(&config).is_err());
    }

    #[test]
    fn test_inline_shells_grouped_by_l() {
        let yaml = r#"
species:
  O:
    shells:
      - { l: 1, alpha: [0.5], coeff: [1.0], r_o: [3.0] }
      - { l: 0, alpha: [1.0], coeff: [1.0], r_o: [2.0] }
      - { l: 0, alpha: [0.3], coeff: [1.0], r_o: [4.0] }
"#;
        let config = serde_yml::from_str::<ProjectionConfig>(yaml)
            .unwrap()
            .with_defaults();
        let basis = BasisSet::from_config(&config).unwrap();
        let o = basis.require("O").unwrap();
        assert_eq!(o.shells.len(), 2);
        assert_eq!(o.shells[0].l, 0);
        assert_eq!(o.shells[0].radials.len(), 2);
        assert_eq!(o.shells[1].l, 1);
        // 2 s radials + 1 p radial: 2*1 + 1*3
        assert_eq!(o.n_coeff(), 5);
        assert_eq!(o.r_o_max(), 4.0);
    }
}
