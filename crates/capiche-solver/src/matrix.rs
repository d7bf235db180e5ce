//! Capacitance matrix returned by the field solver.
//!
//! FasterCap prints the Maxwell capacitance matrix one row per line, each
//! row labelled `g<group>_<conductor>` followed by the row values in F/m,
//! in list-file conductor order. It may print several matrices while
//! refining; only the last complete one counts.

use capiche_core::units::to_af_per_um;

use crate::error::{Error, Result};

/// Square Maxwell capacitance matrix in raw solver units.
///
/// Diagonal entries are total self-capacitance; off-diagonal entries are
/// the negated mutual couplings.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacitanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl CapacitanceMatrix {
    /// Build from rows; every row must have one value per row.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(Error::MatrixParse("empty matrix".to_string()));
        }
        let mut values = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(Error::MatrixParse(format!(
                    "row {} has {} entries, expected {}",
                    i + 1,
                    row.len(),
                    size
                )));
            }
            values.extend(row);
        }
        Ok(Self { size, values })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Raw entry as printed by the solver.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    /// Entry averaged with its transpose.
    pub fn symmetric(&self, i: usize, j: usize) -> f64 {
        0.5 * (self.get(i, j) + self.get(j, i))
    }

    /// Mutual coupling between two conductors (positive), raw units.
    pub fn coupling(&self, i: usize, j: usize) -> f64 {
        -self.symmetric(i, j)
    }

    /// Symmetrised entry in aF/um.
    pub fn af_per_um(&self, i: usize, j: usize) -> f64 {
        to_af_per_um(self.symmetric(i, j))
    }

    /// Off-diagonal pairs whose relative asymmetry exceeds `tolerance`.
    pub fn reciprocity_violations(&self, tolerance: f64) -> Vec<(usize, usize, f64)> {
        let mut violations = Vec::new();
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                let (a, b) = (self.get(i, j), self.get(j, i));
                let scale = a.abs().max(b.abs());
                if scale == 0.0 {
                    continue;
                }
                let asymmetry = (a - b).abs() / scale;
                if asymmetry > tolerance {
                    violations.push((i, j, asymmetry));
                }
            }
        }
        violations
    }

    /// Parse the last complete matrix printed in solver output.
    pub fn parse(output: &str) -> Result<Self> {
        let mut last_complete: Option<Vec<Vec<f64>>> = None;
        let mut current: Vec<Vec<f64>> = Vec::new();

        for line in output.lines() {
            let mut tokens = line.split_whitespace();
            let Some(label) = tokens.next() else {
                continue;
            };
            if !is_row_label(label) {
                // anything else between rows breaks the block
                current.clear();
                continue;
            }

            let values: std::result::Result<Vec<f64>, _> = tokens.map(str::parse::<f64>).collect();
            let values = match values {
                Ok(values) if !values.is_empty() => values,
                _ => {
                    current.clear();
                    continue;
                }
            };

            if current.first().map_or(false, |row| row.len() != values.len()) {
                current.clear();
            }
            current.push(values);
            if current.len() == current[0].len() {
                last_complete = Some(std::mem::take(&mut current));
            }
        }

        match last_complete {
            Some(rows) => Self::from_rows(rows),
            None => Err(Error::MatrixParse("no complete capacitance matrix in solver output".to_string())),
        }
    }
}

/// Row labels look like `g<group>_<conductor name>`.
fn is_row_label(label: &str) -> bool {
    label
        .strip_prefix('g')
        .and_then(|rest| rest.split_once('_'))
        .map_or(false, |(group, _)| !group.is_empty() && group.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
Running FasterCap version 6.0.7
Iteration number #0 ***************************

Capacitance matrix is:
Demo evaluation version
Dimension 2 x 2
g1_wire  1.1e-10 -1.0e-10
g2_reference  -1.0e-10 1.2e-10

Iteration number #1 ***************************

Capacitance matrix is:
Dimension 2 x 2
g1_wire  1.0663e-10 -9.8e-11
g2_reference  -9.9e-11 1.4e-10
Weighted Frobenius norm of the difference between capacitance (auto option): 0.0012
";

    #[test]
    fn test_parse_last_matrix() {
        let m = CapacitanceMatrix::parse(OUTPUT).unwrap();
        assert_eq!(m.size(), 2);
        assert_eq!(m.get(0, 0), 1.0663e-10);
        assert_eq!(m.get(0, 1), -9.8e-11);
        assert!((m.coupling(0, 1) - 9.85e-11).abs() < 1e-20);
        assert!((m.af_per_um(0, 0) - 106.63).abs() < 1e-9);
    }

    #[test]
    fn test_parse_ignores_truncated_block() {
        let truncated = format!("{}g1_wire  1.2e-10 -9.0e-11\n", OUTPUT);
        let m = CapacitanceMatrix::parse(&truncated).unwrap();
        assert_eq!(m.get(0, 0), 1.0663e-10);
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(CapacitanceMatrix::parse(""), Err(Error::MatrixParse(_))));
        assert!(matches!(
            CapacitanceMatrix::parse("g1_wire 1e-10 -1e-10\n"),
            Err(Error::MatrixParse(_))
        ));
        assert!(matches!(
            CapacitanceMatrix::parse("g1_wire 1e-10 nan?\ng2_ref -1e-10 1e-10\n"),
            Err(Error::MatrixParse(_))
        ));
    }

    #[test]
    fn test_single_conductor() {
        let m = CapacitanceMatrix::parse("g1_wire  4.1826e-11\n").unwrap();
        assert!(!is_row_label("gx_wire"));
        assert!(!is_row_label("g_wire"));
        assert_eq!(m.size(), 1);
        assert!(m.reciprocity_violations(0.01).is_empty());
    }

    #[test]
    fn test_reciprocity() {
        let m = CapacitanceMatrix::from_rows(vec![
            vec![1.0e-10, -5.0e-11, -1.0e-12],
            vec![-5.0e-11, 1.0e-10, -2.0e-12],
            vec![-1.0e-12, -3.0e-12, 1.0e-10],
        ])
        .unwrap();
        let violations = m.reciprocity_violations(0.05);
        assert_eq!(violations.len(), 1);
        assert_eq!((violations[0].0, violations[0].1), (1, 2));
        assert!((m.symmetric(1, 2) + 2.5e-12).abs() < 1e-24);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(CapacitanceMatrix::from_rows(vec![vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(CapacitanceMatrix::from_rows(Vec::new()).is_err());
    }
}
