//! Coefficient extraction from sweep tables.
//!
//! Area capacitance comes straight from the stack. Fringe capacitance is
//! algebraic: half of what a single wire has beyond its plate term. The
//! remaining three models are fitted by Levenberg-Marquardt to fractions
//! normalised by that fringe value.

use std::path::Path;

use capiche_core::units::to_af_per_um;
use capiche_core::{analysis_table_path, ResultRow, ResultTable, StackModel, TableKind};
use nalgebra::dvector;

use crate::coefficients::{CoefficientRecord, CoefficientTable};
use crate::error::{Error, Result};
use crate::levenberg::{FitCriteria, solve_levenberg_marquardt};
use crate::model::{CoefficientKind, CurveModel};

/// Fitting configuration.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub criteria: FitCriteria,
    /// Largest accepted RMS residual relative to the largest data value.
    pub residual_threshold: f64,
    /// Rows within this many microns of a requested width match it.
    pub width_tolerance: f64,
    /// Fewest distinct sweep points a regression accepts.
    pub min_points: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            criteria: FitCriteria::default(),
            residual_threshold: 0.05,
            width_tolerance: 0.01,
            min_points: 3,
        }
    }
}

impl FitConfig {
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.criteria.max_iterations = iterations;
        self
    }

    pub fn with_residual_threshold(mut self, threshold: f64) -> Self {
        self.residual_threshold = threshold;
        self
    }

    pub fn with_width_tolerance(mut self, tolerance: f64) -> Self {
        self.width_tolerance = tolerance;
        self
    }

    pub fn with_min_points(mut self, points: usize) -> Self {
        self.min_points = points;
        self
    }
}

/// Derives coefficients for one stack.
pub struct CoefficientFitter<'a> {
    stack: &'a StackModel,
    config: FitConfig,
}

impl<'a> CoefficientFitter<'a> {
    pub fn new(stack: &'a StackModel) -> Self {
        Self::with_config(stack, FitConfig::default())
    }

    pub fn with_config(stack: &'a StackModel, config: FitConfig) -> Self {
        Self { stack, config }
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Plate capacitance between a metal and any other conductor, aF/um^2.
    pub fn areacap(&self, metal: &str, conductor: &str) -> Result<f64> {
        Ok(self.stack.area_capacitance(metal, conductor)?)
    }

    /// Fringe capacitance `D = (C - A w) / 2` at `width`, aF/um.
    ///
    /// `rows` is a single-wire or wire-under-conductor table for the pair.
    pub fn fringecap(&self, metal: &str, conductor: &str, rows: &[ResultRow], width: f64) -> Result<f64> {
        let total = rows
            .iter()
            .filter(|r| r.params.first().map_or(false, |w| (w - width).abs() < self.config.width_tolerance))
            .find_map(|r| r.values.first().copied())
            .ok_or_else(|| Error::InsufficientData {
                pair: pair(metal, conductor),
                found: 0,
                required: 1,
            })?;
        let total = to_af_per_um(total);
        let plate = self.areacap(metal, conductor)? * width;
        Ok((total - plate) / 2.0)
    }

    /// Fit `Ccoup = B / (sep + C)` to a two-wire sweep; returns `(B, C)`.
    ///
    /// Non-positive couplings are solver noise and are dropped.
    pub fn fit_sidewall(&self, metal: &str, rows: &[ResultRow]) -> Result<(f64, f64)> {
        let kind = TableKind::TwoParallelWires;
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for row in rows {
            let (Some(coupling), Some(&sep)) = (row.value(kind, "Ccoup"), row.params.get(1)) else {
                continue;
            };
            let y = to_af_per_um(coupling);
            if y > 0.0 {
                xs.push(sep);
                ys.push(y);
            }
        }
        self.require_points(&pair(metal, metal), &xs)?;

        let c0 = rows.first().and_then(|r| r.params.first()).copied().unwrap_or(0.0);
        let b0 = ys[0] * (xs[0] + c0);
        self.regress(CurveModel::Sidewall, &pair(metal, metal), &xs, &ys, (b0, c0))
    }

    /// Fit the fringe-shield fraction `tanh(E (sep + F))`; returns `(E, F)`.
    ///
    /// `rows` is a two-wire sweep over `conductor`; `fringe_rows` the
    /// single-wire table giving D at each row's width.
    pub fn fit_fringeshield(
        &self,
        metal: &str,
        conductor: &str,
        rows: &[ResultRow],
        fringe_rows: &[ResultRow],
    ) -> Result<(f64, f64)> {
        let kind = TableKind::TwoParallelWires;
        let name = pair(metal, conductor);
        let area = self.areacap(metal, conductor)?;

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for row in rows {
            let (Some(cmsub), &[width, sep]) = (row.value(kind, "Cmsub"), row.params.as_slice()) else {
                continue;
            };
            let fringe = self
                .fringecap(metal, conductor, fringe_rows, width)
                .map_err(|_| Error::MissingReference {
                    kind: "fringecap",
                    pair: name.clone(),
                })?;
            if fringe <= 0.0 {
                return Err(Error::MissingReference {
                    kind: "fringecap",
                    pair: name,
                });
            }
            xs.push(sep);
            ys.push((to_af_per_um(cmsub) - area * width - fringe) / fringe);
        }
        self.require_points(&name, &xs)?;
        self.regress(CurveModel::FringeShield, &name, &xs, &ys, (1.0, 0.0))
    }

    /// Fit the partial-fringe fraction `(2/pi) atan(G (dist + H))`, with
    /// `dist = -sep`; returns `(G, H)`.
    ///
    /// `rows` is a wire-over-shield sweep; `fringe_rows` the single-wire
    /// table of the metal over the shield layer.
    pub fn fit_fringepartial(
        &self,
        metal: &str,
        shield: &str,
        rows: &[ResultRow],
        fringe_rows: &[ResultRow],
    ) -> Result<(f64, f64)> {
        let kind = TableKind::WireOverShield;
        let name = pair(metal, shield);
        let area = self.areacap(metal, shield)?;

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for row in rows {
            let (Some(coupling), &[width, sep]) = (row.value(kind, "Ccoup"), row.params.as_slice()) else {
                continue;
            };
            let fringe = self
                .fringecap(metal, shield, fringe_rows, width)
                .map_err(|_| Error::MissingReference {
                    kind: "fringecap",
                    pair: name.clone(),
                })?;
            if fringe <= 0.0 {
                return Err(Error::MissingReference {
                    kind: "fringecap",
                    pair: name,
                });
            }
            xs.push(-sep);
            ys.push((to_af_per_um(coupling) - area * width - fringe) / fringe);
        }
        self.require_points(&name, &xs)?;
        self.regress(CurveModel::FringePartial, &name, &xs, &ys, (1.0, 0.0))
    }

    /// Fit every coefficient from the sweep tables under `output`.
    ///
    /// Tables are looked up as `analysis/<kind>/<metal>_<conductor>.txt`.
    /// Every pair that cannot be derived is recorded as an omission and
    /// the remaining pairs carry on.
    pub fn fit_all(&self, output: &Path) -> CoefficientTable {
        let mut table = CoefficientTable::new();
        let stack = self.stack;
        let diffusions = stack.diffusions();

        for metal in stack.metals() {
            let below: Vec<&str> = diffusions
                .iter()
                .copied()
                .filter(|d| !stack.is_gate_pair(metal, d))
                .collect();
            let others: Vec<&str> = stack.metals().into_iter().filter(|m| *m != metal).collect();
            let lower = stack.lower_metals(metal);

            for &conductor in below.iter().chain(&others) {
                match self.areacap(metal, conductor) {
                    Ok(value) => table.push(record(CoefficientKind::AreaCap, metal, conductor, vec![value])),
                    Err(e) => omit(&mut table, CoefficientKind::AreaCap, metal, Some(conductor), &e),
                }
            }

            let Some(limits) = stack.limits(metal) else {
                log::warn!("{} has no width/space limits; only area capacitance reported", metal);
                continue;
            };
            let width = limits.width;

            for &conductor in below.iter().chain(&others) {
                let result = read_rows(output, "fringe", metal, conductor, single_wire_kind(stack, metal, conductor))
                    .and_then(|rows| self.fringecap(metal, conductor, &rows, width));
                match result {
                    Ok(value) => table.push(record(CoefficientKind::FringeCap, metal, conductor, vec![value])),
                    Err(e) => omit(&mut table, CoefficientKind::FringeCap, metal, Some(conductor), &e),
                }
            }

            let result = read_rows(output, "sidewall", metal, metal, TableKind::TwoParallelWires)
                .and_then(|rows| self.fit_sidewall(metal, &rows));
            match result {
                Ok((b, c)) => table.push(CoefficientRecord::new(CoefficientKind::Sidewall, metal, None, vec![b, c])),
                Err(e) => omit(&mut table, CoefficientKind::Sidewall, metal, None, &e),
            }

            for &conductor in below.iter().chain(&lower) {
                let result = read_rows(output, "fringeshield", metal, conductor, TableKind::TwoParallelWires)
                    .and_then(|rows| {
                        let fringe = read_rows(output, "fringe", metal, conductor, TableKind::SingleWire)?;
                        self.fit_fringeshield(metal, conductor, &rows, &fringe)
                    });
                match result {
                    Ok((e, f)) => table.push(record(CoefficientKind::FringeShield, metal, conductor, vec![e, f])),
                    Err(err) => omit(&mut table, CoefficientKind::FringeShield, metal, Some(conductor), &err),
                }
            }

            for &shield in &lower {
                let result = read_rows(output, "fringepartial", metal, shield, TableKind::WireOverShield)
                    .and_then(|rows| {
                        let fringe = read_rows(output, "fringe", metal, shield, TableKind::SingleWire)?;
                        self.fit_fringepartial(metal, shield, &rows, &fringe)
                    });
                match result {
                    Ok((g, h)) => table.push(record(CoefficientKind::FringePartial, metal, shield, vec![g, h])),
                    Err(err) => omit(&mut table, CoefficientKind::FringePartial, metal, Some(shield), &err),
                }
            }
        }

        table
    }

    fn require_points(&self, pair: &str, xs: &[f64]) -> Result<()> {
        let mut distinct: Vec<f64> = Vec::new();
        for &x in xs {
            if !distinct.iter().any(|d| (d - x).abs() < 1e-9) {
                distinct.push(x);
            }
        }
        // at least one point is needed to seed the regression
        let required = self.config.min_points.max(1);
        if distinct.len() < required {
            return Err(Error::InsufficientData {
                pair: pair.to_string(),
                found: distinct.len(),
                required,
            });
        }
        Ok(())
    }

    fn regress(&self, model: CurveModel, pair: &str, xs: &[f64], ys: &[f64], initial: (f64, f64)) -> Result<(f64, f64)> {
        let result = solve_levenberg_marquardt(
            &model,
            xs,
            ys,
            &dvector![initial.0, initial.1],
            &self.config.criteria,
        )?;
        let residual = result.normalized_rms(ys);
        log::debug!(
            "{:?} {}: {} iterations, normalised residual {:.3e}",
            model,
            pair,
            result.iterations,
            residual
        );

        if !result.converged || !residual.is_finite() || residual > self.config.residual_threshold {
            return Err(Error::FitDidNotConverge {
                pair: pair.to_string(),
                iterations: result.iterations,
                residual,
            });
        }
        Ok((result.params[0], result.params[1]))
    }
}

fn pair(metal: &str, conductor: &str) -> String {
    format!("{}/{}", metal, conductor)
}

fn record(kind: CoefficientKind, metal: &str, conductor: &str, values: Vec<f64>) -> CoefficientRecord {
    CoefficientRecord::new(kind, metal, Some(conductor), values)
}

fn omit(table: &mut CoefficientTable, kind: CoefficientKind, metal: &str, conductor: Option<&str>, error: &Error) {
    log::warn!("{} {} {}: {}", kind, metal, conductor.unwrap_or(metal), error);
    table.omit(kind, metal, conductor, error.to_string());
}

/// Fringe tables against higher metals hold wire-under-conductor rows.
fn single_wire_kind(stack: &StackModel, metal: &str, conductor: &str) -> TableKind {
    if stack.upper_metals(metal).contains(&conductor) {
        TableKind::WireUnderConductor
    } else {
        TableKind::SingleWire
    }
}

fn read_rows(output: &Path, group: &str, metal: &str, conductor: &str, kind: TableKind) -> Result<Vec<ResultRow>> {
    let path = analysis_table_path(output, group, metal, conductor);
    let table = ResultTable::read(&path, kind)?;
    Ok(table.rows().to_vec())
}
