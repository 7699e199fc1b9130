//! Exact, invertible padding between a flat atomic-orbital ordering and
//! dense per-species coefficient arrays
//!
//! External electronic-structure codes emit coefficients in their own flat
//! orbital order, one entry per labeled orbital. Learning on those vectors
//! needs a fixed-size layout per species instead: every atom of a species maps
//! to the same `max_n · (max_l+1)²` slot rectangle, with slots that no orbital
//! populates held at zero. `BasisPadder` builds that index map once from the
//! label list and then converts in both directions without any floating-point
//! arithmetic, so `unpad(pad(v)) == v` holds bit-exactly.

use crate::basis::{l_to_letter, letter_to_l};
use crate::config::GapPolicy;
use color_eyre::eyre::{ensure, eyre, Result};
use nalgebra::DMatrix;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;
use tracing::debug;

/// One parsed atomic-orbital label, e.g. `"0 O 2px"`: atom index, species
/// symbol, principal number and angular momentum. The m designation after the
/// letter is carried implicitly by label order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AoLabel {
    pub atom: usize,
    pub species: String,
    pub n: usize,
    pub l: usize,
}

impl FromStr for AoLabel {
    type Err = color_eyre::eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        ensure!(tokens.len() >= 3, "orbital label needs atom, species and orbital: {:?}", s);
        let atom = tokens[0]
            .parse::<usize>()
            .map_err(|_| eyre!("bad atom index in orbital label: {:?}", s))?;
        let species = tokens[1].to_string();
        ensure!(!species.is_empty(), "empty species in orbital label: {:?}", s);

        let orbital = tokens[2];
        let digits: String = orbital.chars().take_while(char::is_ascii_digit).collect();
        let n = digits
            .parse::<usize>()
            .map_err(|_| eyre!("orbital {:?} has no principal number", orbital))?;
        ensure!(n >= 1, "principal number must be at least 1: {:?}", orbital);
        let letter = orbital
            .chars()
            .nth(digits.len())
            .ok_or_else(|| eyre!("orbital {:?} has no shell letter", orbital))?;
        let l = letter_to_l(letter.to_ascii_lowercase())
            .ok_or_else(|| eyre!("unknown shell letter {:?} in orbital {:?}", letter, orbital))?;
        Ok(AoLabel { atom, species, n, l })
    }
}

/// Dense slot layout shared by every atom of one species
struct SpeciesLayout {
    max_n: usize,
    max_l: usize,
    /// Populated slots out of `max_n · (max_l+1)²`, identical across atoms
    mask: Vec<bool>,
    /// Per atom, the flat orbital index feeding each populated slot, in slot
    /// order
    source: Vec<Vec<usize>>,
}

impl SpeciesLayout {
    fn width(&self) -> usize {
        self.max_n * (self.max_l + 1) * (self.max_l + 1)
    }

    fn n_atoms(&self) -> usize {
        self.source.len()
    }
}

/// Index map between a flat orbital ordering and dense per-species arrays
pub struct BasisPadder {
    species_order: Vec<String>,
    layouts: HashMap<String, SpeciesLayout>,
    n_ao: usize,
}

/// Slot of the (n, l, m) triple inside one atom's rectangle
fn slot(n: usize, l: usize, m: usize, max_l: usize) -> usize {
    (n - 1) * (max_l + 1) * (max_l + 1) + l * l + m
}

impl BasisPadder {
    /// Build the index map from the orbital label list.
    ///
    /// Every atom of a species must populate the same slots, every (n, l)
    /// group must carry its full 2l+1 m-components, and under
    /// `GapPolicy::Error` the principal numbers of each shell letter must be
    /// contiguous.
    pub fn new(labels: &[AoLabel], gap_policy: GapPolicy) -> Result<Self> {
        ensure!(!labels.is_empty(), "orbital label list is empty");

        // Group flat indices per atom and per (n, l), preserving label order
        let mut atom_order: Vec<usize> = Vec::new();
        let mut atom_species: HashMap<usize, &str> = HashMap::new();
        let mut groups: HashMap<(usize, usize, usize), Vec<usize>> = HashMap::new();
        for (index, label) in labels.iter().enumerate() {
            match atom_species.get(&label.atom) {
                Some(sym) => ensure!(
                    *sym == label.species,
                    "atom {} labeled both {} and {}",
                    label.atom,
                    sym,
                    label.species
                ),
                None => {
                    atom_species.insert(label.atom, &label.species);
                    atom_order.push(label.atom);
                }
            }
            groups
                .entry((label.atom, label.n, label.l))
                .or_default()
                .push(index);
        }

        let mut species_order: Vec<String> = Vec::new();
        let mut species_atoms: HashMap<&str, Vec<usize>> = HashMap::new();
        for &atom in &atom_order {
            let sym = atom_species[&atom];
            if !species_atoms.contains_key(sym) {
                species_order.push(sym.to_string());
            }
            species_atoms.entry(sym).or_default().push(atom);
        }

        let mut layouts = HashMap::new();
        for sym in &species_order {
            let atoms = &species_atoms[sym.as_str()];
            let layout = Self::species_layout(sym, atoms, &groups, gap_policy)?;
            debug!(
                species = sym.as_str(),
                atoms = layout.n_atoms(),
                width = layout.width(),
                "built padding layout"
            );
            layouts.insert(sym.clone(), layout);
        }

        Ok(Self {
            species_order,
            layouts,
            n_ao: labels.len(),
        })
    }

    fn species_layout(
        sym: &str,
        atoms: &[usize],
        groups: &HashMap<(usize, usize, usize), Vec<usize>>,
        gap_policy: GapPolicy,
    ) -> Result<SpeciesLayout> {
        let mut max_n = 0;
        let mut max_l = 0;
        for (&(atom, n, l), _) in groups {
            if atoms.contains(&atom) {
                max_n = max_n.max(n);
                max_l = max_l.max(l);
            }
        }

        let width = max_n * (max_l + 1) * (max_l + 1);
        let mut mask: Option<Vec<bool>> = None;
        let mut source = Vec::with_capacity(atoms.len());
        let mut n_per_l: HashMap<usize, Vec<usize>> = HashMap::new();

        for &atom in atoms {
            let mut slots: Vec<Option<usize>> = vec![None; width];
            for (&(ga, n, l), indices) in groups {
                if ga != atom {
                    continue;
                }
                ensure!(
                    indices.len() == 2 * l + 1,
                    "atom {} ({}) lists {} components for n={} {}, expected {}",
                    atom,
                    sym,
                    indices.len(),
                    n,
                    l_to_letter(l).unwrap_or('?'),
                    2 * l + 1
                );
                for (m, &index) in indices.iter().enumerate() {
                    slots[slot(n, l, m, max_l)] = Some(index);
                }
                n_per_l.entry(l).or_default().push(n);
            }

            let atom_mask: Vec<bool> = slots.iter().map(Option::is_some).collect();
            match &mask {
                Some(first) => ensure!(
                    *first == atom_mask,
                    "atoms of species {} populate different orbital slots",
                    sym
                ),
                None => mask = Some(atom_mask),
            }
            source.push(slots.into_iter().flatten().collect());
        }

        if gap_policy == GapPolicy::Error {
            for (l, mut ns) in n_per_l {
                ns.sort_unstable();
                ns.dedup();
                for pair in ns.windows(2) {
                    ensure!(
                        pair[1] == pair[0] + 1,
                        "species {} skips n={} for shell {}",
                        sym,
                        pair[0] + 1,
                        l_to_letter(l).unwrap_or('?')
                    );
                }
            }
        }

        let mask = mask.ok_or_else(|| eyre!("species {} has no atoms", sym))?;
        Ok(SpeciesLayout { max_n, max_l, mask, source })
    }

    /// Total number of orbitals in the flat ordering
    pub fn n_ao(&self) -> usize {
        self.n_ao
    }

    /// Species in first-appearance order of the label list
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.species_order.iter().map(String::as_str)
    }

    /// Spread a flat coefficient vector into one dense `[atoms, slots]` matrix
    /// per species. Unpopulated slots are zero.
    pub fn pad_basis(&self, coeff: &[f64]) -> Result<HashMap<String, DMatrix<f64>>> {
        ensure!(
            coeff.len() == self.n_ao,
            "coefficient vector has {} entries, label list has {}",
            coeff.len(),
            self.n_ao
        );
        let mut padded = HashMap::new();
        for (sym, layout) in &self.layouts {
            let mut matrix = DMatrix::zeros(layout.n_atoms(), layout.width());
            for (row, sources) in layout.source.iter().enumerate() {
                let populated = layout.mask.iter().enumerate().filter(|(_, &p)| p);
                for ((column, _), &index) in populated.zip(sources) {
                    matrix[(row, column)] = coeff[index];
                }
            }
            padded.insert(sym.clone(), matrix);
        }
        Ok(padded)
    }

    /// Gather dense per-species matrices back into the flat coefficient
    /// vector. Exact inverse of `pad_basis`: only populated slots are read, so
    /// whatever sits in masked-off slots is ignored.
    pub fn unpad_basis(&self, padded: &HashMap<String, DMatrix<f64>>) -> Result<Vec<f64>> {
        let mut coeff = vec![0.0; self.n_ao];
        for (sym, layout) in &self.layouts {
            let matrix = padded
                .get(sym)
                .ok_or_else(|| eyre!("no padded block for species {}", sym))?;
            ensure!(
                matrix.nrows() == layout.n_atoms() && matrix.ncols() == layout.width(),
                "padded block for {} has shape [{}, {}], expected [{}, {}]",
                sym,
                matrix.nrows(),
                matrix.ncols(),
                layout.n_atoms(),
                layout.width()
            );
            for (row, sources) in layout.source.iter().enumerate() {
                let populated = layout.mask.iter().enumerate().filter(|(_, &p)| p);
                for ((column, _), &index) in populated.zip(sources) {
                    coeff[index] = matrix[(row, column)];
                }
            }
        }
        Ok(coeff)
    }

    /// Species-agnostic padding: stack every species' dense block under the
    /// single label "X", rows in species first-appearance order.
    ///
    /// All species must share one slot width.
    pub fn pad_agnostic(&self, coeff: &[f64]) -> Result<HashMap<String, DMatrix<f64>>> {
        let per_species = self.pad_basis(coeff)?;
        let width = self.agnostic_width()?;
        let n_rows: usize = self.layouts.values().map(SpeciesLayout::n_atoms).sum();

        let mut stacked = DMatrix::zeros(n_rows, width);
        let mut row = 0;
        for sym in &self.species_order {
            let block = &per_species[sym];
            stacked.rows_mut(row, block.nrows()).copy_from(block);
            row += block.nrows();
        }
        let mut out = HashMap::new();
        out.insert("X".to_string(), stacked);
        Ok(out)
    }

    /// Split a species-agnostic stack back into per-species blocks using the
    /// recorded row partition.
    pub fn split_agnostic(
        &self,
        stacked: &DMatrix<f64>,
    ) -> Result<HashMap<String, DMatrix<f64>>> {
        let width = self.agnostic_width()?;
        let n_rows: usize = self.layouts.values().map(SpeciesLayout::n_atoms).sum();
        ensure!(
            stacked.nrows() == n_rows && stacked.ncols() == width,
            "stacked block has shape [{}, {}], expected [{}, {}]",
            stacked.nrows(),
            stacked.ncols(),
            n_rows,
            width
        );

        let mut out = HashMap::new();
        let mut row = 0;
        for sym in &self.species_order {
            let n_atoms = self.layouts[sym].n_atoms();
            out.insert(sym.clone(), stacked.rows(row, n_atoms).into_owned());
            row += n_atoms;
        }
        Ok(out)
    }

    fn agnostic_width(&self) -> Result<usize> {
        let mut widths = self.species_order.iter().map(|sym| self.layouts[sym].width());
        let width = widths.next().expect("at least one species");
        for w in widths {
            ensure!(
                w == width,
                "species-agnostic mode needs equal slot widths, got {} and {}",
                width,
                w
            );
        }
        Ok(width)
    }

    /// Human-readable layout overview, one line per species
    pub fn basis_summary(&self) -> String {
        let mut out = String::new();
        for sym in &self.species_order {
            let layout = &self.layouts[sym];
            let populated = layout.mask.iter().filter(|&&p| p).count();
            let _ = writeln!(
                out,
                "{}: {} atoms, max_n {}, max_l {}, {} of {} slots populated",
                sym,
                layout.n_atoms(),
                layout.max_n,
                layout.max_l,
                populated,
                layout.width()
            );
        }
        out
    }
}
