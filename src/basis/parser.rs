//! NWChem-format basis text parsing
//!
//! The text format is owned by the external quantum-chemistry collaborator
//! (basis set exchanges distribute it); this module only reads it. Each
//! primitive block becomes one contracted radial function; outer cutoff radii
//! are derived from the exponents as `α^(-1/2) · σ · (1 + l/5)`.
//!
//! Example block:
//! ```text
//! O    S
//!       0.1307093214E+03       0.1543289673E+00
//!       0.2380886605E+02       0.5353281423E+00
//!       0.6443608313E+01       0.4446345422E+00
//! O    SP
//!       0.5033151319E+01      -0.9996722919E-01       0.1559162750E+00
//!       0.1169596125E+01       0.3995128261E+00       0.6076837186E+00
//! END
//! ```

use super::{letter_to_l, RadialContraction, Shell};
use color_eyre::eyre::{bail, ensure, eyre, Result, WrapErr};
use periodic_table_on_an_enum::Element;
use tracing::debug;

/// Parse NWChem basis text into shells grouped by angular momentum.
///
/// Returns the element symbol the text declares and the shell list sorted by
/// `l`, with contractions in block order within each shell.
pub fn parse_nwchem(input: &str, sigma: f64) -> Result<(String, Vec<Shell>)> {
    ensure!(sigma > 0.0, "cutoff scale sigma must be positive, got {}", sigma);

    let mut symbol: Option<String> = None;
    let mut blocks: Vec<(usize, Vec<f64>, Vec<f64>)> = Vec::new();
    let mut open: Vec<usize> = Vec::new(); // l per coefficient column of the current block

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("BASIS") {
            continue;
        }
        if line.eq_ignore_ascii_case("END") {
            break;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() >= 2 && tokens[0].chars().all(char::is_alphabetic) {
            // Header line: element symbol and shell type
            let element = Element::from_symbol(tokens[0])
                .ok_or_else(|| eyre!("unknown element in basis text: {}", tokens[0]))?;
            match &symbol {
                Some(sym) => ensure!(
                    sym == element.get_symbol(),
                    "basis text mixes elements {} and {}",
                    sym,
                    element.get_symbol()
                ),
                None => symbol = Some(element.get_symbol().to_string()),
            }

            open = shell_type_to_ls(tokens[1])?;
            for &l in &open {
                blocks.push((l, Vec::new(), Vec::new()));
            }
            continue;
        }

        // Primitive row: exponent followed by one coefficient per open column
        ensure!(
            !open.is_empty(),
            "primitive row before any shell header: {:?}",
            line
        );
        let numbers: Vec<f64> = tokens
            .iter()
            .map(|t| {
                t.parse::<f64>()
                    .wrap_err_with(|| format!("malformed number in basis text: {}", t))
            })
            .collect::<Result<_>>()?;
        ensure!(
            numbers.len() == open.len() + 1,
            "expected {} coefficients after exponent, got {}",
            open.len(),
            numbers.len().saturating_sub(1)
        );
        let alpha = numbers[0];
        ensure!(alpha > 0.0, "exponent must be positive, got {}", alpha);

        let base = blocks.len() - open.len();
        for (col, &coeff) in numbers[1..].iter().enumerate() {
            let (_, alphas, coeffs) = &mut blocks[base + col];
            alphas.push(alpha);
            coeffs.push(coeff);
        }
    }

    let symbol = symbol.ok_or_else(|| eyre!("basis text declares no element"))?;

    // One contraction per block, grouped per l in block order
    let mut by_l: Vec<(usize, Vec<RadialContraction>)> = Vec::new();
    for (l, alphas, coeffs) in blocks {
        ensure!(!alphas.is_empty(), "shell block with l={} has no primitives", l);
        let r_o: Vec<f64> = alphas
            .iter()
            .map(|a| a.powf(-0.5) * sigma * (1.0 + l as f64 / 5.0))
            .collect();
        let contraction = RadialContraction::new(alphas, coeffs, r_o)?;
        match by_l.iter_mut().find(|(bl, _)| *bl == l) {
            Some((_, group)) => group.push(contraction),
            None => by_l.push((l, vec![contraction])),
        }
    }
    by_l.sort_by_key(|(l, _)| *l);

    let shells: Vec<Shell> = by_l
        .into_iter()
        .map(|(l, radials)| Shell::new(l, radials))
        .collect::<Result<_>>()?;
    ensure!(!shells.is_empty(), "basis text for {} has no shells", symbol);

    debug!(
        species = symbol.as_str(),
        shells = shells.len(),
        "parsed NWChem basis text"
    );
    Ok((symbol, shells))
}

/// Expand a shell-type code into its angular momenta, e.g. "SP" -> [0, 1]
fn shell_type_to_ls(code: &str) -> Result<Vec<usize>> {
    if code.eq_ignore_ascii_case("SP") {
        return Ok(vec![0, 1]);
    }
    let lower = code.to_ascii_lowercase();
    let mut chars = lower.chars();
    match (chars.next().and_then(letter_to_l), chars.next()) {
        (Some(l), None) => Ok(vec![l]),
        _ => bail!("unsupported shell type: {}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const STO3G_O: &str = r#"
# STO-3G for oxygen
BASIS "ao basis" SPHERICAL PRINT
O    S
      0.1307093214E+03       0.1543289673E+00
      0.2380886605E+02       0.5353281423E+00
      0.6443608313E+01       0.4446345422E+00
O    SP
      0.5033151319E+01      -0.9996722919E-01       0.1559162750E+00
      0.1169596125E+01       0.3995128261E+00       0.6076837186E+00
      0.3803889600E+00       0.7001154689E+00       0.3919573931E+00
END
"#;

    #[test]
    fn test_parse_sto3g_oxygen() {
        let (symbol, shells) = parse_nwchem(STO3G_O, 2.0).unwrap();
        assert_eq!(symbol, "O");
        assert_eq!(shells.len(), 2);

        // Two s contractions (from the S block and the SP block), one p
        assert_eq!(shells[0].l, 0);
        assert_eq!(shells[0].radials.len(), 2);
        assert_eq!(shells[1].l, 1);
        assert_eq!(shells[1].radials.len(), 1);

        assert_eq!(shells[0].radials[0].alpha.len(), 3);
        assert_relative_eq!(shells[0].radials[0].alpha[0], 130.7093214, epsilon = 1e-6);
        assert_relative_eq!(shells[1].radials[0].coeff[0], 0.1559162750, epsilon = 1e-10);
    }

    #[test]
    fn test_cutoff_scaling_with_l() {
        let (_, shells) = parse_nwchem(STO3G_O, 2.0).unwrap();
        let alpha = shells[1].radials[0].alpha[0];
        let expected = alpha.powf(-0.5) * 2.0 * 1.2; // l = 1
        assert_relative_eq!(shells[1].radials[0].r_o[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_mixed_elements() {
        let text = "O S\n 1.0 1.0\nH S\n 0.5 1.0\nEND";
        assert!(parse_nwchem(text, 2.0).is_err());
    }

    #[test]
    fn test_rejects_empty_text() {
        assert!(parse_nwchem("# only a comment\n", 2.0).is_err());
    }

    #[test]
    fn test_rejects_bad_coefficient_count() {
        let text = "O SP\n 1.0 1.0\nEND";
        assert!(parse_nwchem(text, 2.0).is_err());
    }
}
