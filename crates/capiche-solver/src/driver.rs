//! Field-solver seam.
//!
//! The sweep only needs "geometry in, capacitance matrix out"; the
//! [`FieldSolver`] trait is that boundary, so sweeps can run against
//! FasterCap or against a scripted solver in tests.

use capiche_geometry::GeometryInstance;

use crate::error::{Error, Result};
use crate::fastercap::{FasterCapConfig, run_fastercap, write_list_file};
use crate::matrix::CapacitanceMatrix;

/// Something that turns a compiled geometry into a capacitance matrix.
pub trait FieldSolver {
    /// Solve one geometry at the requested relative tolerance.
    ///
    /// The returned matrix has one row per conductor, in the order of
    /// [`GeometryInstance::conductors`].
    fn solve(&self, geometry: &GeometryInstance, tolerance: f64) -> Result<CapacitanceMatrix>;
}

impl<S: FieldSolver + ?Sized> FieldSolver for &S {
    fn solve(&self, geometry: &GeometryInstance, tolerance: f64) -> Result<CapacitanceMatrix> {
        (**self).solve(geometry, tolerance)
    }
}

/// FasterCap-backed solver.
#[derive(Debug, Clone, Default)]
pub struct FasterCap {
    config: FasterCapConfig,
}

impl FasterCap {
    pub fn new(config: FasterCapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FasterCapConfig {
        &self.config
    }
}

impl FieldSolver for FasterCap {
    fn solve(&self, geometry: &GeometryInstance, tolerance: f64) -> Result<CapacitanceMatrix> {
        let list = write_list_file(geometry);
        let output = run_fastercap(&list, tolerance, &self.config)?;
        let matrix = CapacitanceMatrix::parse(&output.stdout)?;
        check_matrix(geometry, &matrix, self.config.reciprocity_tolerance)?;
        Ok(matrix)
    }
}

/// Check matrix dimensions against the geometry and report asymmetry.
pub fn check_matrix(geometry: &GeometryInstance, matrix: &CapacitanceMatrix, reciprocity: f64) -> Result<()> {
    let expected = geometry.conductors().len();
    if matrix.size() != expected {
        return Err(Error::MatrixParse(format!(
            "expected a {0}x{0} matrix for {1}, got {2}x{2}",
            expected,
            geometry.topology(),
            matrix.size()
        )));
    }

    for (i, j, asymmetry) in matrix.reciprocity_violations(reciprocity) {
        log::warn!(
            "{}: C[{}][{}] and C[{}][{}] differ by {:.1}%",
            geometry.topology(),
            i,
            j,
            j,
            i,
            asymmetry * 100.0
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capiche_core::StackModel;
    use capiche_geometry::{GeometryCompiler, TestTopology};

    const SKY130: &str = include_str!("../../../stacks/sky130A.json");

    #[test]
    fn test_check_matrix_dimension() {
        let stack = StackModel::load(SKY130).unwrap();
        let geometry = GeometryCompiler::new(&stack)
            .compile(&TestTopology::SingleWire {
                metal: "m1".into(),
                reference: "subs".into(),
                width: 0.14,
            })
            .unwrap();

        let good = CapacitanceMatrix::from_rows(vec![vec![1e-10, -1e-10], vec![-1e-10, 1e-10]]).unwrap();
        assert!(check_matrix(&geometry, &good, 0.05).is_ok());

        let bad = CapacitanceMatrix::from_rows(vec![vec![1e-10]]).unwrap();
        assert!(matches!(check_matrix(&geometry, &bad, 0.05), Err(Error::MatrixParse(_))));
    }

    #[test]
    fn test_check_matrix_tolerates_asymmetry() {
        let stack = StackModel::load(SKY130).unwrap();
        let geometry = GeometryCompiler::new(&stack)
            .compile(&TestTopology::SingleWire {
                metal: "m1".into(),
                reference: "subs".into(),
                width: 0.14,
            })
            .unwrap();

        let skewed = CapacitanceMatrix::from_rows(vec![vec![1.1e-10, -1.0e-10], vec![-1.5e-10, 2.3e-10]]).unwrap();
        assert_eq!(skewed.reciprocity_violations(0.05).len(), 1);
        assert!(check_matrix(&geometry, &skewed, 0.05).is_ok());
    }
}
