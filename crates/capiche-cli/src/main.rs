//! Capiche command-line interface.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use capiche::solver::is_fastercap_available;
use capiche::{
    CoefficientFitter, FasterCap, FasterCapConfig, PlanConfig, StackModel, SweepOrchestrator, SweepReport,
    plan_sweeps, run_jobs, write_areacap_results,
};
use clap::Parser;

/// Name of the fitted coefficient file inside the output directory.
const COEFFICIENT_FILE: &str = "coefficients.txt";

#[derive(Parser)]
#[command(name = "capiche")]
#[command(about = "Extract parasitic capacitance coefficients for a metal stack", long_about = None)]
#[command(version)]
struct Cli {
    /// Stack description (JSON)
    #[arg(value_name = "STACK")]
    stack: PathBuf,

    /// Output directory for sweep tables and coefficients
    #[arg(value_name = "OUTPUT", default_value = "capiche_out")]
    output: PathBuf,

    /// FasterCap executable
    #[arg(long, env = "FASTERCAP_EXEC", default_value = "FasterCap")]
    solver: String,

    /// Solver tolerance for every sweep (default: per sweep kind)
    #[arg(long)]
    tolerance: Option<f64>,

    /// Timeout for one solver run, in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Skip sidewall sweeps
    #[arg(long)]
    no_sidewall: bool,

    /// Skip fringe-shield sweeps
    #[arg(long)]
    no_shield: bool,

    /// Skip partial-fringe sweeps
    #[arg(long)]
    no_partial: bool,

    /// Fit from existing tables without running the solver
    #[arg(long)]
    fit_only: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Some(tolerance) = cli.tolerance {
        if !(tolerance > 0.0 && tolerance < 1.0) {
            bail!("tolerance must lie in (0, 1), got {}", tolerance);
        }
    }

    let stack = StackModel::load_file(&cli.stack)
        .with_context(|| format!("Failed to load stack description: {}", cli.stack.display()))?;
    log::info!("process {}: {} metals", stack.process(), stack.metals().len());

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create output directory: {}", cli.output.display()))?;
    write_areacap_results(&stack, &cli.output).context("Failed to write area capacitances")?;

    if !cli.fit_only {
        let report = run_sweeps(&stack, &cli)?;
        print_report(&report);
    }

    let table = CoefficientFitter::new(&stack).fit_all(&cli.output);
    let path = cli.output.join(COEFFICIENT_FILE);
    table
        .write(&path)
        .with_context(|| format!("Failed to write coefficients: {}", path.display()))?;

    println!("{}", table.summary());
    println!("Coefficients written to {}", path.display());

    Ok(())
}

fn run_sweeps(stack: &StackModel, cli: &Cli) -> Result<SweepReport> {
    let config = FasterCapConfig::default()
        .with_executable(cli.solver.as_str())
        .with_timeout_secs(cli.timeout);
    if !is_fastercap_available(&config) {
        bail!(
            "FasterCap not found at '{}'; set --solver or FASTERCAP_EXEC, or use --fit-only",
            config.executable
        );
    }

    let plan = PlanConfig::default()
        .with_sidewall(!cli.no_sidewall)
        .with_shield(!cli.no_shield)
        .with_partial(!cli.no_partial)
        .with_tolerance(cli.tolerance);
    let jobs = plan_sweeps(stack, Path::new(&cli.output), &plan);
    log::info!("{} sweeps planned", jobs.len());

    let solver = FasterCap::new(config);
    let mut orchestrator = SweepOrchestrator::new(stack, &solver);
    run_jobs(&mut orchestrator, &jobs).context("Sweep failed")
}

fn print_report(report: &SweepReport) {
    println!("Sweep points: {}", report.total());
    println!("  solved:  {}", report.solved);
    println!("  cached:  {}", report.cached);
    println!("  skipped: {}", report.skipped.len());
    for skipped in &report.skipped {
        println!("    {}: {}", skipped.point, skipped.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "capiche",
            "stack.json",
            "out",
            "--tolerance",
            "0.005",
            "--no-partial",
            "--fit-only",
        ]);
        assert_eq!(cli.stack, PathBuf::from("stack.json"));
        assert_eq!(cli.output, PathBuf::from("out"));
        assert_eq!(cli.tolerance, Some(0.005));
        assert_eq!(cli.timeout, 30);
        assert!(cli.no_partial && !cli.no_shield && !cli.no_sidewall);
        assert!(cli.fit_only);
    }
}
