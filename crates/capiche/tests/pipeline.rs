//! End-to-end extraction against a synthetic field solver.
//!
//! The solver stand-in returns matrices built from known model curves, so
//! the fitted coefficients can be checked against the curves' parameters.

use std::cell::Cell;
use std::f64::consts::FRAC_2_PI;

use capiche::prelude::*;
use capiche::{JobKind, ResultRow, SolverError, StackError, write_areacap_results};

const SKY130: &str = include_str!("../../../stacks/sky130A.json");

const FRINGE: f64 = 40.0;
const SIDEWALL_B: f64 = 65.5;
const SIDEWALL_C: f64 = 0.157;
const SHIELD_E: f64 = 0.8;
const SHIELD_F: f64 = 0.1;
const PARTIAL_G: f64 = 1.5;
const PARTIAL_H: f64 = 0.05;

struct SyntheticSolver<'a> {
    stack: &'a StackModel,
    calls: Cell<usize>,
}

impl<'a> SyntheticSolver<'a> {
    fn new(stack: &'a StackModel) -> Self {
        Self {
            stack,
            calls: Cell::new(0),
        }
    }

    fn area(&self, metal: &str, conductor: &str) -> f64 {
        self.stack.area_capacitance(metal, conductor).unwrap()
    }
}

fn matrix(rows: Vec<Vec<f64>>) -> capiche_solver::Result<CapacitanceMatrix> {
    CapacitanceMatrix::from_rows(rows.into_iter().map(|r| r.into_iter().map(|v| v * 1e-12).collect()).collect())
}

impl FieldSolver for SyntheticSolver<'_> {
    fn solve(&self, geometry: &GeometryInstance, _tolerance: f64) -> capiche_solver::Result<CapacitanceMatrix> {
        self.calls.set(self.calls.get() + 1);
        match geometry.topology() {
            TestTopology::SingleWire {
                metal,
                reference,
                width,
            } => {
                let total = if metal == "poly" && reference == "subs" && (width - 0.15).abs() < 1e-9 {
                    106.63
                } else {
                    self.area(metal, reference) * width + 2.0 * FRINGE
                };
                matrix(vec![vec![total, -total], vec![-total, total + 10.0]])
            }
            TestTopology::WireUnderConductor { metal, upper, width } => {
                let coupling = self.area(metal, upper) * width + 2.0 * FRINGE;
                matrix(vec![
                    vec![coupling + 5.0, -coupling, -5.0],
                    vec![-coupling, coupling + 50.0, -50.0],
                    vec![-5.0, -50.0, 55.0],
                ])
            }
            TestTopology::TwoParallelWires {
                metal,
                reference,
                width,
                sep,
            } => {
                let coupling = SIDEWALL_B / (sep + SIDEWALL_C);
                let shielded = FRINGE * (SHIELD_E * (sep + SHIELD_F)).tanh();
                let ground = self.area(metal, reference) * width + FRINGE + shielded;
                let total = ground + coupling;
                matrix(vec![
                    vec![total, -coupling, -ground],
                    vec![-coupling, total, -ground],
                    vec![-ground, -ground, 2.0 * ground],
                ])
            }
            TestTopology::WireOverShield {
                metal,
                shield,
                width,
                sep,
            } => {
                let partial = FRINGE * FRAC_2_PI * (PARTIAL_G * (-sep + PARTIAL_H)).atan();
                let coupling = self.area(metal, shield) * width + FRINGE + partial;
                matrix(vec![
                    vec![coupling + 1.0, -coupling, -1.0],
                    vec![-coupling, coupling + 30.0, -30.0],
                    vec![-1.0, -30.0, 31.0],
                ])
            }
            TestTopology::TwoDissimilarWires { .. } => {
                Err(SolverError::SolverInvocation("not modelled".to_string()))
            }
        }
    }
}

#[test]
fn test_areacap_and_fringecap_scenario() {
    let stack = StackModel::load(SKY130).unwrap();
    let solver = SyntheticSolver::new(&stack);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("poly_subs.txt");

    let template = TestTopology::SingleWire {
        metal: "poly".into(),
        reference: "subs".into(),
        width: 0.15,
    };
    let orchestrator = SweepOrchestrator::new(&stack, &solver).with_tolerance(0.001);
    let mut table = ResultTable::open(&path, TableKind::SingleWire).unwrap();
    orchestrator
        .run_sweep(&template, &SweepAxes::widths(vec![0.15]), &mut table)
        .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "poly subs 0.1500 1.0663e-10\n");

    let fitter = CoefficientFitter::new(&stack);
    let area = fitter.areacap("poly", "subs").unwrap();
    assert!((area - 105.86).abs() < 0.01);
    let d = fitter.fringecap("poly", "subs", table.rows(), 0.15).unwrap();
    assert!((d - 45.38).abs() < 0.01);
}

#[test]
fn test_full_extraction() {
    let stack = StackModel::load(SKY130).unwrap();
    let solver = SyntheticSolver::new(&stack);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path();

    write_areacap_results(&stack, output).unwrap();

    let jobs: Vec<_> = plan_sweeps(&stack, output, &PlanConfig::default())
        .into_iter()
        .filter(|j| j.template.row_names().0 == "m2")
        .collect();
    assert!(jobs.iter().any(|j| j.kind == JobKind::FringePartial));

    let mut orchestrator = SweepOrchestrator::new(&stack, &solver);
    let report = run_jobs(&mut orchestrator, &jobs).unwrap();
    assert!(report.solved > 0);
    assert!(solver.calls.get() >= report.solved);

    let table = CoefficientFitter::new(&stack).fit_all(output);

    let fringe = table.get(CoefficientKind::FringeCap, "m2", "subs").unwrap();
    assert!((fringe.values[0] - FRINGE).abs() < 0.01);
    let upward = table.get(CoefficientKind::FringeCap, "m2", "m4").unwrap();
    assert!((upward.values[0] - FRINGE).abs() < 0.01);

    let sidewall = table.get(CoefficientKind::Sidewall, "m2", "m2").unwrap();
    assert!((sidewall.values[0] - SIDEWALL_B).abs() < 0.1, "{:?}", sidewall);
    assert!((sidewall.values[1] - SIDEWALL_C).abs() < 0.01, "{:?}", sidewall);

    let shield = table.get(CoefficientKind::FringeShield, "m2", "m1").unwrap();
    assert!((shield.values[0] - SHIELD_E).abs() < 0.02, "{:?}", shield);
    assert!((shield.values[1] - SHIELD_F).abs() < 0.02, "{:?}", shield);

    let partial = table.get(CoefficientKind::FringePartial, "m2", "li").unwrap();
    assert!((partial.values[0] - PARTIAL_G).abs() < 0.02, "{:?}", partial);
    assert!((partial.values[1] - PARTIAL_H).abs() < 0.02, "{:?}", partial);

    // other metals were not swept and are reported as omitted
    assert!(table.get(CoefficientKind::Sidewall, "m1", "m1").is_none());
    assert!(table.omissions().any(|o| o.kind == CoefficientKind::Sidewall && o.metal == "m1"));

    // a second run is served entirely from the tables
    let before = solver.calls.get();
    let rerun = run_jobs(&mut orchestrator, &jobs).unwrap();
    assert_eq!(rerun.solved, 0);
    assert_eq!(solver.calls.get(), before);

    let path = output.join("coefficients.txt");
    table.write(&path).unwrap();
    let loaded = CoefficientTable::load(&path).unwrap();
    assert_eq!(
        loaded.get(CoefficientKind::Sidewall, "m2", "m2").map(|r| r.values.len()),
        Some(2)
    );
}

#[test]
fn test_dangling_reference_stops_before_geometry() {
    let broken = SKY130.replace("\"below\": \"nild2\"", "\"below\": \"nild9\"");
    assert_ne!(broken, SKY130);
    let result = StackModel::load(&broken);
    assert!(matches!(result, Err(StackError::InvalidStack(_))));
}

#[test]
fn test_rows_keep_raw_solver_units() {
    let stack = StackModel::load(SKY130).unwrap();
    let solver = SyntheticSolver::new(&stack);
    let orchestrator = SweepOrchestrator::new(&stack, &solver);
    let mut cache = capiche::MemoryCache::new(TableKind::TwoParallelWires);
    let template = TestTopology::TwoParallelWires {
        metal: "m1".into(),
        reference: "subs".into(),
        width: 0.14,
        sep: 0.3,
    };
    orchestrator
        .run_sweep(&template, &SweepAxes::widths(vec![0.14]), &mut cache)
        .unwrap();

    let row: &ResultRow = &capiche::ResultCache::rows(&cache)[0];
    let coupling = row.value(TableKind::TwoParallelWires, "Ccoup").unwrap();
    assert!((coupling - SIDEWALL_B / (0.3 + SIDEWALL_C) * 1e-12).abs() < 1e-20);
}
