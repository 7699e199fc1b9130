//! Configuration structures for density projection
//!
//! This module handles the basis declaration and projection options, with
//! defaults applied explicitly rather than inferred at use sites.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration for a projection run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectionConfig {
    /// Per-species basis instructions, keyed by chemical symbol
    pub species: HashMap<String, SpeciesConfig>,
    /// Cache angular grids across repeated calls at the same geometry
    pub use_memory: Option<bool>,
    /// Combine all species under a single synthetic label "X"
    pub spec_agnostic: Option<bool>,
    /// How to treat (n, l) combinations absent from the orbital label list
    pub gap_policy: Option<GapPolicy>,
}

/// Basis instructions for one species
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeciesConfig {
    /// Basis set text in NWChem format (as distributed by basis set exchanges)
    pub basis: Option<String>,
    /// Inline shell list, used when no basis text is given
    pub shells: Option<Vec<ShellConfig>>,
    /// Cutoff scale for radii derived from exponents
    pub sigma: Option<f64>,
}

/// One shell of the inline basis declaration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShellConfig {
    pub l: usize,
    pub alpha: Vec<f64>,
    pub coeff: Vec<f64>,
    pub r_o: Vec<f64>,
}

/// Policy for index-map slots whose (n, l) combination never appears in the
/// external orbital labels.
///
/// `AllowSparse` keeps the slot masked off and permanently zero; `Error`
/// rejects the geometry so that a sparse basis cannot be confused with a
/// mislabeled one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    AllowSparse,
    Error,
}

impl Default for GapPolicy {
    fn default() -> Self {
        GapPolicy::AllowSparse
    }
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        SpeciesConfig {
            basis: None,
            shells: None,
            sigma: Some(2.0),
        }
    }
}

impl SpeciesConfig {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        if self.sigma.is_none() {
            self.sigma = Self::default().sigma;
        }
        self
    }
}

impl ProjectionConfig {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        if self.use_memory.is_none() {
            self.use_memory = Some(false);
        }
        if self.spec_agnostic.is_none() {
            self.spec_agnostic = Some(false);
        }
        if self.gap_policy.is_none() {
            self.gap_policy = Some(GapPolicy::default());
        }
        self.species = self
            .species
            .drain()
            .map(|(sym, spec)| (sym, spec.with_defaults()))
            .collect();
        self
    }

    /// Check if the angular-grid cache is enabled
    pub fn is_memory_enabled(&self) -> bool {
        self.use_memory.unwrap_or(false)
    }

    /// Check if species-agnostic mode is enabled
    pub fn is_spec_agnostic(&self) -> bool {
        self.spec_agnostic.unwrap_or(false)
    }

    /// Get the gap policy for index-map construction
    pub fn gap_policy(&self) -> GapPolicy {
        self.gap_policy.unwrap_or_default()
    }
}
