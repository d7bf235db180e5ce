//! Resumability of sweeps against on-disk result tables.

use std::cell::Cell;

use capiche_core::{ResultTable, RowKey, StackModel, TableKind};
use capiche_geometry::{GeometryInstance, TestTopology};
use capiche_solver::{CapacitanceMatrix, Error as SolverError, FieldSolver};
use capiche_sweep::{
    MemoryCache, PlanConfig, ResultCache, SweepAxes, SweepOrchestrator, plan_sweeps, run_jobs,
};

const SKY130: &str = include_str!("../../../stacks/sky130A.json");

/// Solver stand-in that counts invocations and returns a diagonally
/// dominant matrix of the right size.
#[derive(Default)]
struct CountingSolver {
    calls: Cell<usize>,
    fail_on: Option<usize>,
}

impl FieldSolver for CountingSolver {
    fn solve(&self, geometry: &GeometryInstance, _tolerance: f64) -> capiche_solver::Result<CapacitanceMatrix> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.fail_on == Some(call) {
            return Err(SolverError::SolverInvocation("scripted failure".to_string()));
        }

        let n = geometry.conductors().len();
        let rows = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| if i == j { 1.0e-10 } else { -1.0e-11 })
                    .collect()
            })
            .collect();
        CapacitanceMatrix::from_rows(rows)
    }
}

fn sidewall_template() -> TestTopology {
    TestTopology::TwoParallelWires {
        metal: "m1".into(),
        reference: "subs".into(),
        width: 0.14,
        sep: 0.14,
    }
}

fn axes() -> SweepAxes {
    SweepAxes::widths(vec![0.14]).with_seps(vec![0.14, 0.39, 0.64, 0.89])
}

#[test]
fn test_rerun_issues_no_solves() {
    let stack = StackModel::load(SKY130).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sidewall").join("m1_m1.txt");

    let solver = CountingSolver::default();
    let orchestrator = SweepOrchestrator::new(&stack, &solver);

    let mut table = ResultTable::open(&path, TableKind::TwoParallelWires).unwrap();
    let first = orchestrator.run_sweep(&sidewall_template(), &axes(), &mut table).unwrap();
    assert_eq!(first.solved, 4);
    assert_eq!(solver.calls.get(), 4);

    // a fresh process sees the same table on disk
    let mut table = ResultTable::open(&path, TableKind::TwoParallelWires).unwrap();
    let second = orchestrator.run_sweep(&sidewall_template(), &axes(), &mut table).unwrap();
    assert_eq!(second.solved, 0);
    assert_eq!(second.cached, 4);
    assert_eq!(solver.calls.get(), 4);
}

#[test]
fn test_deleted_row_is_resolved_once() {
    let stack = StackModel::load(SKY130).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m1_m1.txt");

    let solver = CountingSolver::default();
    let orchestrator = SweepOrchestrator::new(&stack, &solver);
    let mut table = ResultTable::open(&path, TableKind::TwoParallelWires).unwrap();
    orchestrator.run_sweep(&sidewall_template(), &axes(), &mut table).unwrap();

    // drop the third row from the file
    let text = std::fs::read_to_string(&path).unwrap();
    let kept: Vec<&str> = text.lines().enumerate().filter(|(i, _)| *i != 2).map(|(_, l)| l).collect();
    std::fs::write(&path, kept.join("\n") + "\n").unwrap();

    let mut table = ResultTable::open(&path, TableKind::TwoParallelWires).unwrap();
    assert!(!table.contains(&RowKey::new("m1", "subs", &[0.14, 0.64])));
    let report = orchestrator.run_sweep(&sidewall_template(), &axes(), &mut table).unwrap();
    assert_eq!(report.solved, 1);
    assert_eq!(report.cached, 3);
    assert_eq!(solver.calls.get(), 5);
}

#[test]
fn test_interrupted_write_is_recovered() {
    let stack = StackModel::load(SKY130).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m1_m1.txt");

    let solver = CountingSolver::default();
    let orchestrator = SweepOrchestrator::new(&stack, &solver);
    let mut table = ResultTable::open(&path, TableKind::TwoParallelWires).unwrap();
    orchestrator.run_sweep(&sidewall_template(), &axes(), &mut table).unwrap();

    // a crash mid-append leaves half a line behind
    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<&str> = text.lines().collect();
    let last = lines.pop().unwrap();
    let truncated = format!("{}\n{}", lines.join("\n"), &last[..last.len() / 2]);
    std::fs::write(&path, truncated).unwrap();

    let mut table = ResultTable::open(&path, TableKind::TwoParallelWires).unwrap();
    let report = orchestrator.run_sweep(&sidewall_template(), &axes(), &mut table).unwrap();
    assert_eq!(report.solved, 1);

    let table = ResultTable::read(&path, TableKind::TwoParallelWires).unwrap();
    assert_eq!(table.len(), 4);
}

#[test]
fn test_failed_point_is_skipped() {
    let stack = StackModel::load(SKY130).unwrap();
    let solver = CountingSolver {
        calls: Cell::new(0),
        fail_on: Some(1),
    };
    let orchestrator = SweepOrchestrator::new(&stack, &solver);
    let mut cache = MemoryCache::new(TableKind::TwoParallelWires);

    let report = orchestrator.run_sweep(&sidewall_template(), &axes(), &mut cache).unwrap();
    assert_eq!(report.solved, 3);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("scripted failure"));
    assert_eq!(cache.rows().len(), 3);

    // the failed point is retried on the next run
    let report = orchestrator.run_sweep(&sidewall_template(), &axes(), &mut cache).unwrap();
    assert_eq!(report.solved, 1);
    assert_eq!(report.cached, 3);
}

#[test]
fn test_incompatible_point_is_skipped() {
    let stack = StackModel::load(SKY130).unwrap();
    let solver = CountingSolver::default();
    let orchestrator = SweepOrchestrator::new(&stack, &solver);
    let mut cache = MemoryCache::new(TableKind::WireUnderConductor);

    // nothing sits above m5
    let template = TestTopology::WireUnderConductor {
        metal: "m5".into(),
        upper: "m4".into(),
        width: 1.6,
    };
    let report = orchestrator
        .run_sweep(&template, &SweepAxes::widths(vec![1.6]), &mut cache)
        .unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(solver.calls.get(), 0);
}

#[test]
fn test_wrong_table_kind() {
    let stack = StackModel::load(SKY130).unwrap();
    let solver = CountingSolver::default();
    let orchestrator = SweepOrchestrator::new(&stack, &solver);
    let mut cache = MemoryCache::new(TableKind::SingleWire);

    let result = orchestrator.run_sweep(&sidewall_template(), &axes(), &mut cache);
    assert!(matches!(result, Err(capiche_sweep::Error::TableMismatch { .. })));
}

#[test]
fn test_plan_resumes() {
    let stack = StackModel::load(SKY130).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = PlanConfig::default()
        .with_sidewall(false)
        .with_shield(false)
        .with_partial(false);
    let jobs: Vec<_> = plan_sweeps(&stack, dir.path(), &config)
        .into_iter()
        .filter(|j| j.template.row_names().0 == "m1")
        .collect();

    let solver = CountingSolver::default();
    let mut orchestrator = SweepOrchestrator::new(&stack, &solver);
    let first = run_jobs(&mut orchestrator, &jobs).unwrap();
    assert_eq!(first.solved, 2 * jobs.len());

    let second = run_jobs(&mut orchestrator, &jobs).unwrap();
    assert_eq!(second.solved, 0);
    assert_eq!(second.cached, first.solved);
    assert!(dir.path().join("analysis/fringe/m1_subs.txt").exists());
}
