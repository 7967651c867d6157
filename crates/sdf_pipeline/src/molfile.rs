//! Minimal V2000 molfile reader and a permutation-invariant summary.
//!
//! Only what the built-in tests need: element symbols from the atom block
//! and (atom, atom, order) triples from the bond block.

use std::collections::BTreeMap;

use thiserror::Error;

const HEADER_LINES: usize = 3;
/// Largest count a three-column V2000 field can hold.
const MAX_COUNT: usize = 999;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MolfileError {
    #[error("molfile ends before the counts line")]
    MissingCountsLine,

    #[error("V3000 molfiles are not supported")]
    V3000,

    #[error("malformed counts line: '{0}'")]
    BadCountsLine(String),

    #[error("molfile ends inside the {block} block (expected {expected} lines)")]
    Truncated { block: &'static str, expected: usize },

    #[error("malformed atom line {line}: '{text}'")]
    BadAtomLine { line: usize, text: String },

    #[error("malformed bond line {line}: '{text}'")]
    BadBondLine { line: usize, text: String },

    #[error("bond {bond} references atom {atom}, but there are {atoms} atoms")]
    AtomOutOfRange {
        bond: usize,
        atom: usize,
        atoms: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    /// 0-based atom indices
    pub first: usize,
    pub second: usize,
    pub order: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Molecule {
    pub atoms: Vec<String>,
    pub bonds: Vec<Bond>,
}

/// Parse the connection table of a V2000 molfile.
pub fn parse(text: &str) -> Result<Molecule, MolfileError> {
    let mut lines = text.lines().skip(HEADER_LINES);
    let counts = lines.next().ok_or(MolfileError::MissingCountsLine)?;
    if counts.contains("V3000") {
        return Err(MolfileError::V3000);
    }
    let (atom_count, bond_count) = parse_counts(counts)?;

    let mut atoms = Vec::new();
    for i in 0..atom_count {
        let line = lines.next().ok_or(MolfileError::Truncated {
            block: "atom",
            expected: atom_count,
        })?;
        let symbol = line
            .split_whitespace()
            .nth(3)
            .filter(|s| s.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
            .ok_or_else(|| MolfileError::BadAtomLine {
                line: HEADER_LINES + 2 + i,
                text: line.to_string(),
            })?;
        atoms.push(symbol.to_string());
    }

    let mut bonds = Vec::new();
    for i in 0..bond_count {
        let line = lines.next().ok_or(MolfileError::Truncated {
            block: "bond",
            expected: bond_count,
        })?;
        let line_no = HEADER_LINES + 2 + atom_count + i;
        let (first, second, order) = parse_bond(line).ok_or_else(|| MolfileError::BadBondLine {
            line: line_no,
            text: line.to_string(),
        })?;
        for atom in [first, second] {
            if atom == 0 || atom > atom_count {
                return Err(MolfileError::AtomOutOfRange {
                    bond: i + 1,
                    atom,
                    atoms: atom_count,
                });
            }
        }
        bonds.push(Bond {
            first: first - 1,
            second: second - 1,
            order,
        });
    }

    Ok(Molecule { atoms, bonds })
}

/// `aaabbb...`: fixed three-column fields, whitespace split as a fallback.
/// Either count above 999 is rejected.
fn parse_counts(line: &str) -> Result<(usize, usize), MolfileError> {
    let fixed = (
        fixed_field(line, 0).and_then(|s| s.parse().ok()),
        fixed_field(line, 1).and_then(|s| s.parse().ok()),
    );
    let counts = match fixed {
        (Some(atoms), Some(bonds)) => Some((atoms, bonds)),
        _ => {
            let mut fields = line.split_whitespace().map(str::parse::<usize>);
            match (fields.next(), fields.next()) {
                (Some(Ok(atoms)), Some(Ok(bonds))) => Some((atoms, bonds)),
                _ => None,
            }
        }
    };
    counts
        .filter(|&(atoms, bonds)| atoms <= MAX_COUNT && bonds <= MAX_COUNT)
        .ok_or_else(|| MolfileError::BadCountsLine(line.to_string()))
}

/// `111222tttsss...`: indices above 99 run into each other, so fixed columns first.
fn parse_bond(line: &str) -> Option<(usize, usize, u8)> {
    let fixed = (
        fixed_field(line, 0).and_then(|s| s.parse().ok()),
        fixed_field(line, 1).and_then(|s| s.parse().ok()),
        fixed_field(line, 2).and_then(|s| s.parse().ok()),
    );
    if let (Some(a), Some(b), Some(order)) = fixed {
        return Some((a, b, order));
    }
    let mut fields = line.split_whitespace();
    let a = fields.next()?.parse().ok()?;
    let b = fields.next()?.parse().ok()?;
    let order = fields.next()?.parse().ok()?;
    Some((a, b, order))
}

fn fixed_field(line: &str, index: usize) -> Option<&str> {
    let start = index * 3;
    line.get(start..start + 3).map(str::trim).filter(|s| !s.is_empty())
}

impl Molecule {
    /// Hill-system formula: C, then H, then the rest alphabetically.
    /// Without carbon every element is alphabetical.
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for atom in &self.atoms {
            *counts.entry(atom.as_str()).or_insert(0) += 1;
        }

        let mut formula = String::new();
        let mut push = |symbol: &str, count: usize| {
            formula.push_str(symbol);
            if count > 1 {
                formula.push_str(&count.to_string());
            }
        };

        if let Some(carbon) = counts.remove("C") {
            push("C", carbon);
            if let Some(hydrogen) = counts.remove("H") {
                push("H", hydrogen);
            }
        }
        for (symbol, count) in counts {
            push(symbol, count);
        }
        formula
    }

    /// Summary that depends only on the graph, never on atom numbering.
    ///
    /// ```text
    /// formula C2H6O
    /// bonds C-C:1 x1, C-O:1 x1
    /// degrees C/4 x2, O/2 x1
    /// ```
    pub fn canonical_summary(&self) -> String {
        let mut bonds: BTreeMap<String, usize> = BTreeMap::new();
        let mut degree = vec![0usize; self.atoms.len()];
        for bond in &self.bonds {
            let (a, b) = (&self.atoms[bond.first], &self.atoms[bond.second]);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            *bonds.entry(format!("{}-{}:{}", lo, hi, bond.order)).or_insert(0) += 1;
            degree[bond.first] += usize::from(bond.order);
            degree[bond.second] += usize::from(bond.order);
        }

        let mut degrees: BTreeMap<String, usize> = BTreeMap::new();
        for (atom, d) in self.atoms.iter().zip(&degree) {
            *degrees.entry(format!("{}/{}", atom, d)).or_insert(0) += 1;
        }

        format!(
            "formula {}\nbonds {}\ndegrees {}",
            self.formula(),
            histogram(&bonds),
            histogram(&degrees)
        )
    }

    /// Same molecule with atom `i` renumbered to `n - 1 - i`.
    pub fn reversed(&self) -> Molecule {
        let n = self.atoms.len();
        let remap = |i: usize| n - 1 - i;
        Molecule {
            atoms: self.atoms.iter().rev().cloned().collect(),
            bonds: self
                .bonds
                .iter()
                .map(|b| Bond {
                    first: remap(b.first),
                    second: remap(b.second),
                    order: b.order,
                })
                .collect(),
        }
    }
}

fn histogram(entries: &BTreeMap<String, usize>) -> String {
    entries
        .iter()
        .map(|(key, count)| format!("{} x{}", key, count))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Ethanol with explicit hydrogens on the oxygen only.
    pub(crate) const ETHANOL: &str = "\
ethanol
  sdf-pipeline

  4  3  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.0000    1.2000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    3.0000    1.2000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
  3  4  1  0
M  END
> <Mcule_ID>
MCULE-0001

";

    fn with_counts_line(counts: &str) -> String {
        format!("title\n  prog\n\n{}\nM  END\n", counts)
    }

    #[test]
    fn test_oversized_counts_are_rejected() {
        for counts in ["1 99999999999999", "1 1000", "1000 1", "5 18446744073709551615"] {
            assert_eq!(
                parse(&with_counts_line(counts)),
                Err(MolfileError::BadCountsLine(counts.to_string())),
                "{}",
                counts
            );
        }
    }

    #[test]
    fn test_garbage_counts_line_is_rejected() {
        for counts in ["", "abc def", "  x  3", "-1 2"] {
            assert!(matches!(
                parse(&with_counts_line(counts)),
                Err(MolfileError::BadCountsLine(_))
            ));
        }
    }

    #[test]
    fn test_counts_larger_than_the_body_are_truncation_errors() {
        assert_eq!(
            parse("title\n  prog\n\n999999\n"),
            Err(MolfileError::Truncated {
                block: "atom",
                expected: 999
            })
        );
    }

    #[test]
    fn test_parse_ethanol() {
        let mol = parse(ETHANOL).unwrap();
        assert_eq!(mol.atoms, vec!["C", "C", "O", "H"]);
        assert_eq!(mol.bonds.len(), 3);
        assert_eq!(mol.bonds[2], Bond { first: 2, second: 3, order: 1 });
    }

    #[test]
    fn test_hill_formula() {
        let mol = parse(ETHANOL).unwrap();
        assert_eq!(mol.formula(), "C2HO");

        let no_carbon = Molecule {
            atoms: vec!["O".into(), "H".into(), "H".into()],
            bonds: vec![],
        };
        assert_eq!(no_carbon.formula(), "H2O");
    }

    #[test]
    fn test_summary_is_invariant_under_reversal() {
        let mol = parse(ETHANOL).unwrap();
        let summary = mol.canonical_summary();
        assert_eq!(summary, mol.reversed().canonical_summary());
        assert_eq!(
            summary,
            "formula C2HO\nbonds C-C:1 x1, C-O:1 x1, H-O:1 x1\ndegrees C/1 x1, C/2 x1, H/1 x1, O/2 x1"
        );
    }

    #[test]
    fn test_wide_bond_indices_use_fixed_columns() {
        assert_eq!(parse_bond("100101  2  0"), Some((100, 101, 2)));
        assert_eq!(parse_bond("  1  2  1  0"), Some((1, 2, 1)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("a\nb\n"), Err(MolfileError::MissingCountsLine));
        assert_eq!(
            parse("a\nb\nc\n  0  0  0     0  0            999 V3000\n"),
            Err(MolfileError::V3000)
        );
        assert!(matches!(
            parse("a\nb\nc\n  2  0  0  0  0  0  0  0  0  0999 V2000\n    0.0 0.0 0.0 C\n"),
            Err(MolfileError::Truncated { block: "atom", .. })
        ));
        assert!(matches!(
            parse("a\nb\nc\n  1  1  0  0  0  0  0  0  0  0999 V2000\n    0.0 0.0 0.0 C\n  1  2  1\n"),
            Err(MolfileError::AtomOutOfRange { atom: 2, .. })
        ));
    }
}
