//! Resumable sweeps over one test topology.
//!
//! A sweep walks the Cartesian product of widths (and second widths and
//! separations, where the topology has them). Every point whose row is
//! already cached is skipped without touching the solver; every solved
//! point is appended to the cache before the next one starts.

use capiche_core::{ResultRow, RowKey, StackModel};
use capiche_geometry::{GeometryCompiler, GeometryConfig, TestTopology};
use capiche_solver::{CapacitanceMatrix, FieldSolver};

use crate::cache::ResultCache;
use crate::error::{Error, Result};

/// Parameter axes of a sweep.
///
/// An empty `widths2` or `seps` keeps the template's value. Axes the
/// topology does not have are ignored.
#[derive(Debug, Clone, Default)]
pub struct SweepAxes {
    pub widths: Vec<f64>,
    pub widths2: Vec<f64>,
    pub seps: Vec<f64>,
}

impl SweepAxes {
    pub fn widths(widths: Vec<f64>) -> Self {
        Self {
            widths,
            ..Self::default()
        }
    }

    pub fn with_widths2(mut self, widths2: Vec<f64>) -> Self {
        self.widths2 = widths2;
        self
    }

    pub fn with_seps(mut self, seps: Vec<f64>) -> Self {
        self.seps = seps;
        self
    }

    /// Every topology in the product, in sweep order.
    pub fn points(&self, template: &TestTopology) -> Vec<TestTopology> {
        let widths2: Vec<Option<f64>> = match template {
            TestTopology::TwoDissimilarWires { .. } if !self.widths2.is_empty() => {
                self.widths2.iter().copied().map(Some).collect()
            }
            _ => vec![None],
        };
        let seps: Vec<Option<f64>> = if template.has_sep() && !self.seps.is_empty() {
            self.seps.iter().copied().map(Some).collect()
        } else {
            vec![None]
        };

        let mut points = Vec::with_capacity(self.widths.len() * widths2.len() * seps.len());
        for &width in &self.widths {
            for &width2 in &widths2 {
                for &sep in &seps {
                    points.push(template.with_dimensions(width, width2, sep));
                }
            }
        }
        points
    }
}

/// A sweep point that produced no row.
#[derive(Debug, Clone)]
pub struct SkippedPoint {
    /// The point, as a human-readable topology description.
    pub point: String,
    pub reason: String,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Points solved and appended in this run.
    pub solved: usize,
    /// Points found in the cache.
    pub cached: usize,
    pub skipped: Vec<SkippedPoint>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.solved + self.cached + self.skipped.len()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: SweepReport) {
        self.solved += other.solved;
        self.cached += other.cached;
        self.skipped.extend(other.skipped);
    }
}

/// Drives geometry compilation and the field solver over sweep axes.
pub struct SweepOrchestrator<'a> {
    compiler: GeometryCompiler<'a>,
    solver: &'a dyn FieldSolver,
    tolerance: f64,
}

impl<'a> SweepOrchestrator<'a> {
    pub fn new(stack: &'a StackModel, solver: &'a dyn FieldSolver) -> Self {
        Self {
            compiler: GeometryCompiler::new(stack),
            solver,
            tolerance: 0.01,
        }
    }

    pub fn with_geometry_config(mut self, config: GeometryConfig) -> Self {
        self.compiler = GeometryCompiler::with_config(self.compiler.stack(), config);
        self
    }

    /// Solver tolerance for subsequent sweeps.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Run every point of `axes` over `template`, skipping cached rows.
    ///
    /// Incompatible combinations and solver failures are logged and
    /// recorded in the report; the sweep carries on with the next point.
    /// Cache write failures and stack errors abort the sweep.
    pub fn run_sweep(
        &self,
        template: &TestTopology,
        axes: &SweepAxes,
        cache: &mut dyn ResultCache,
    ) -> Result<SweepReport> {
        let expected = template.table_kind();
        if cache.kind() != expected {
            return Err(Error::TableMismatch {
                expected,
                found: cache.kind(),
            });
        }

        let mut report = SweepReport::default();
        for topology in axes.points(template) {
            let (first, second) = topology.row_names();
            let key = RowKey::new(first, second, &topology.params());
            if cache.contains(&key) {
                log::debug!("cached: {}", key);
                report.cached += 1;
                continue;
            }

            let geometry = match self.compiler.compile(&topology) {
                Ok(geometry) => geometry,
                Err(capiche_geometry::Error::Stack(e @ capiche_core::Error::InvalidStack(_))) => {
                    return Err(e.into());
                }
                Err(e) => {
                    log::warn!("skipping {}: {}", topology, e);
                    report.skipped.push(SkippedPoint {
                        point: topology.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            log::info!("solving {}", topology);
            let matrix = match self.solver.solve(&geometry, self.tolerance) {
                Ok(matrix) => matrix,
                Err(e) => {
                    log::warn!("solver failed for {}: {}", topology, e);
                    report.skipped.push(SkippedPoint {
                        point: topology.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let row = ResultRow::new(first, second, topology.params(), row_values(&topology, &matrix));
            cache.append(row)?;
            report.solved += 1;
        }

        log::debug!(
            "{}: {} solved, {} cached, {} skipped",
            template,
            report.solved,
            report.cached,
            report.skipped.len()
        );
        Ok(report)
    }
}

/// Table values for a solved topology, in column order.
///
/// Uses the symmetrised matrix; conductor indices follow the compiler's
/// ordering for each topology.
pub fn row_values(topology: &TestTopology, matrix: &CapacitanceMatrix) -> Vec<f64> {
    let c = |i, j| matrix.symmetric(i, j);
    match topology {
        TestTopology::SingleWire { .. } => vec![c(0, 0)],
        TestTopology::WireUnderConductor { .. } => vec![matrix.coupling(0, 1)],
        TestTopology::WireOverShield { .. } | TestTopology::TwoDissimilarWires { .. } => {
            vec![c(0, 0) + c(0, 1), c(1, 1) + c(0, 1), matrix.coupling(0, 1)]
        }
        TestTopology::TwoParallelWires { .. } => {
            let coupling = matrix.coupling(0, 1);
            vec![(c(0, 0) + c(1, 1)) / 2.0 - coupling, coupling]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> CapacitanceMatrix {
        CapacitanceMatrix::from_rows(vec![
            vec![5.0e-11, -2.0e-11, -3.0e-11],
            vec![-2.0e-11, 6.0e-11, -4.0e-11],
            vec![-3.0e-11, -4.0e-11, 7.0e-11],
        ])
        .unwrap()
    }

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-22)
    }

    #[test]
    fn test_row_values() {
        let m = matrix();
        let shield = TestTopology::WireOverShield {
            metal: "m2".into(),
            shield: "m1".into(),
            width: 0.14,
            sep: -1.0,
        };
        assert!(close(&row_values(&shield, &m), &[3.0e-11, 4.0e-11, 2.0e-11]));

        let pair = TestTopology::TwoParallelWires {
            metal: "m1".into(),
            reference: "subs".into(),
            width: 0.14,
            sep: 0.14,
        };
        assert!(close(&row_values(&pair, &m), &[3.5e-11, 2.0e-11]));

        let under = TestTopology::WireUnderConductor {
            metal: "m1".into(),
            upper: "m2".into(),
            width: 0.14,
        };
        assert!(close(&row_values(&under, &m), &[2.0e-11]));
    }

    #[test]
    fn test_axes_product() {
        let template = TestTopology::TwoParallelWires {
            metal: "m1".into(),
            reference: "subs".into(),
            width: 0.14,
            sep: 0.14,
        };
        let axes = SweepAxes::widths(vec![0.14, 1.4]).with_seps(vec![0.14, 0.39, 0.64]);
        let points = axes.points(&template);
        assert_eq!(points.len(), 6);
        assert_eq!(points[1].params(), vec![0.14, 0.39]);
        assert_eq!(points[3].params(), vec![1.4, 0.14]);

        // single wires have no separation axis
        let single = TestTopology::SingleWire {
            metal: "m1".into(),
            reference: "subs".into(),
            width: 0.14,
        };
        assert_eq!(axes.points(&single).len(), 2);
    }

    #[test]
    fn test_axes_dissimilar() {
        let template = TestTopology::TwoDissimilarWires {
            metal1: "m1".into(),
            metal2: "m2".into(),
            width1: 0.14,
            width2: 0.14,
            sep: 0.5,
        };
        let axes = SweepAxes::widths(vec![0.14])
            .with_widths2(vec![0.14, 0.28])
            .with_seps(vec![0.5, 1.0]);
        let points = axes.points(&template);
        assert_eq!(points.len(), 4);
        assert_eq!(points[3].params(), vec![0.14, 0.28, 1.0]);
    }

    #[test]
    fn test_report_merge() {
        let mut a = SweepReport {
            solved: 2,
            cached: 1,
            skipped: Vec::new(),
        };
        a.merge(SweepReport {
            solved: 1,
            cached: 0,
            skipped: vec![SkippedPoint {
                point: "p".into(),
                reason: "r".into(),
            }],
        });
        assert_eq!(a.total(), 5);
    }
}
