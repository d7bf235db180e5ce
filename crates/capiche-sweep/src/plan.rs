//! Sweep planning for coefficient extraction.
//!
//! Given a stack, decides which sweeps every coefficient needs and where
//! their result tables live:
//!
//! ```text
//! <output>/analysis/areacap/results.txt
//! <output>/analysis/fringe/<metal>_<conductor>.txt
//! <output>/analysis/sidewall/<metal>_<metal>.txt
//! <output>/analysis/fringeshield/<metal>_<conductor>.txt
//! <output>/analysis/fringepartial/<metal>_<conductor>.txt
//! ```
//!
//! Existing tables are caches, so running a plan twice only solves the
//! points the first run did not finish.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use capiche_core::units::{arange, format_significant};
use capiche_core::{analysis_table_path, ResultTable, StackModel, ANALYSIS_DIR};
use capiche_geometry::TestTopology;

use crate::error::Result;
use crate::orchestrator::{SweepAxes, SweepOrchestrator, SweepReport};

/// Sweep step for separations, in microns.
pub const SEP_STEP: f64 = 0.25;

/// Largest sidewall separation swept.
pub const SIDEWALL_MAX_SEP: f64 = 20.0;

/// Largest fringe-shield separation swept.
pub const SHIELD_MAX_SEP: f64 = 10.0;

/// Farthest a partial shield reaches past the wire's edge.
pub const PARTIAL_MAX_OVERLAP: f64 = 15.0;

/// Multiple of the minimum width used for wide-wire sweeps.
pub const WIDE_MULTIPLE: f64 = 10.0;

/// What a planned sweep measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Fringe,
    Sidewall,
    FringeShield,
    FringePartial,
}

impl JobKind {
    /// Directory name under `analysis/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            JobKind::Fringe => "fringe",
            JobKind::Sidewall => "sidewall",
            JobKind::FringeShield => "fringeshield",
            JobKind::FringePartial => "fringepartial",
        }
    }

    /// Solver tolerance the sweep runs at unless overridden.
    pub fn default_tolerance(self) -> f64 {
        match self {
            JobKind::Sidewall => 0.008,
            JobKind::Fringe | JobKind::FringeShield | JobKind::FringePartial => 0.001,
        }
    }
}

/// One sweep to run: a topology template, its axes and its table.
#[derive(Debug, Clone)]
pub struct SweepJob {
    pub kind: JobKind,
    pub template: TestTopology,
    pub axes: SweepAxes,
    pub tolerance: f64,
    pub path: PathBuf,
}

/// Which sweeps to plan.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    pub sidewall: bool,
    pub shield: bool,
    pub partial: bool,
    /// Overrides every job's tolerance.
    pub tolerance: Option<f64>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            sidewall: true,
            shield: true,
            partial: true,
            tolerance: None,
        }
    }
}

impl PlanConfig {
    pub fn with_sidewall(mut self, enabled: bool) -> Self {
        self.sidewall = enabled;
        self
    }

    pub fn with_shield(mut self, enabled: bool) -> Self {
        self.shield = enabled;
        self
    }

    pub fn with_partial(mut self, enabled: bool) -> Self {
        self.partial = enabled;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Option<f64>) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Root of all sweep tables under an output directory.
pub fn analysis_dir(output: &Path) -> PathBuf {
    output.join(ANALYSIS_DIR)
}

/// Table path for one sweep.
pub fn table_path(output: &Path, kind: JobKind, metal: &str, conductor: &str) -> PathBuf {
    analysis_table_path(output, kind.dir_name(), metal, conductor)
}

/// Path of the area capacitance results.
pub fn areacap_path(output: &Path) -> PathBuf {
    analysis_dir(output).join("areacap").join("results.txt")
}

/// Plan every sweep the coefficient fit needs.
///
/// Metals without `limits` cannot be dimensioned and are left out with a
/// warning.
pub fn plan_sweeps(stack: &StackModel, output: &Path, config: &PlanConfig) -> Vec<SweepJob> {
    let mut jobs = Vec::new();
    let diffusions = stack.diffusions();

    for metal in stack.metals() {
        let Some(limits) = stack.limits(metal) else {
            log::warn!("{} has no width/space limits; not swept", metal);
            continue;
        };
        let (width, space) = (limits.width, limits.space);
        let wide = WIDE_MULTIPLE * width;
        let lower = stack.lower_metals(metal);

        let mut push = |kind: JobKind, conductor: &str, template: TestTopology, axes: SweepAxes| {
            jobs.push(SweepJob {
                kind,
                template,
                axes,
                tolerance: config.tolerance.unwrap_or(kind.default_tolerance()),
                path: table_path(output, kind, metal, conductor),
            });
        };

        // fringe: single wires down to every diffusion and lower metal, up to
        // every higher metal
        for &conductor in diffusions.iter().chain(&lower) {
            if stack.is_gate_pair(metal, conductor) {
                continue;
            }
            let template = TestTopology::SingleWire {
                metal: metal.to_string(),
                reference: conductor.to_string(),
                width,
            };
            push(JobKind::Fringe, conductor, template, SweepAxes::widths(vec![width, wide]));
        }
        for upper in stack.upper_metals(metal) {
            let template = TestTopology::WireUnderConductor {
                metal: metal.to_string(),
                upper: upper.to_string(),
                width,
            };
            push(JobKind::Fringe, upper, template, SweepAxes::widths(vec![width, wide]));
        }

        if config.sidewall {
            if let Some(substrate) = stack.first_diffusion() {
                let template = TestTopology::TwoParallelWires {
                    metal: metal.to_string(),
                    reference: substrate.to_string(),
                    width,
                    sep: space,
                };
                let axes = SweepAxes::widths(vec![width]).with_seps(arange(space, SIDEWALL_MAX_SEP, SEP_STEP));
                push(JobKind::Sidewall, metal, template, axes);
            }
        }

        if config.shield {
            for &conductor in lower.iter().chain(&diffusions) {
                if stack.is_gate_pair(metal, conductor) {
                    continue;
                }
                let template = TestTopology::TwoParallelWires {
                    metal: metal.to_string(),
                    reference: conductor.to_string(),
                    width: wide,
                    sep: space,
                };
                let axes = SweepAxes::widths(vec![wide]).with_seps(arange(space, SHIELD_MAX_SEP, SEP_STEP));
                push(JobKind::FringeShield, conductor, template, axes);
            }
        }

        if config.partial {
            for &conductor in &lower {
                let template = TestTopology::WireOverShield {
                    metal: metal.to_string(),
                    shield: conductor.to_string(),
                    width,
                    sep: 0.0,
                };
                let axes = SweepAxes::widths(vec![width]).with_seps(arange(0.0, -PARTIAL_MAX_OVERLAP, -SEP_STEP));
                push(JobKind::FringePartial, conductor, template, axes);
            }
        }
    }

    jobs
}

/// Run planned jobs in order, each against its own result table.
pub fn run_jobs(orchestrator: &mut SweepOrchestrator<'_>, jobs: &[SweepJob]) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    for (index, job) in jobs.iter().enumerate() {
        log::info!(
            "[{}/{}] {} sweep: {} ({} points)",
            index + 1,
            jobs.len(),
            job.kind.dir_name(),
            job.template,
            job.axes.points(&job.template).len()
        );
        let mut table = ResultTable::open(&job.path, job.template.table_kind())?;
        orchestrator.set_tolerance(job.tolerance);
        report.merge(orchestrator.run_sweep(&job.template, &job.axes, &mut table)?);
    }
    Ok(report)
}

/// Area capacitance of every metal over every conductor beneath it, as
/// `(metal, conductor, aF/um^2)`.
pub fn area_capacitances(stack: &StackModel) -> Result<Vec<(String, String, f64)>> {
    let mut results = Vec::new();
    for metal in stack.metals() {
        for conductor in stack.diffusions().into_iter().chain(stack.lower_metals(metal)) {
            if stack.is_gate_pair(metal, conductor) {
                continue;
            }
            let value = stack.area_capacitance(metal, conductor)?;
            if let Some(published) = stack.published_platecap(metal, conductor) {
                log::debug!(
                    "areacap {} over {}: {:.3} (published {:.3})",
                    metal,
                    conductor,
                    value,
                    published
                );
            }
            results.push((metal.to_string(), conductor.to_string(), value));
        }
    }
    Ok(results)
}

/// Write area capacitances to `analysis/areacap/results.txt`.
///
/// An existing file is left alone. Returns the path either way.
pub fn write_areacap_results(stack: &StackModel, output: &Path) -> Result<PathBuf> {
    let path = areacap_path(output);
    if path.exists() {
        log::debug!("{} exists; keeping it", path.display());
        return Ok(path);
    }

    let mut text = String::new();
    for (metal, conductor, value) in area_capacitances(stack)? {
        let _ = writeln!(text, "{} {} {}", metal, conductor, format_significant(value, 5));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, text)?;
    log::info!("wrote {}", path.display());
    Ok(path)
}
