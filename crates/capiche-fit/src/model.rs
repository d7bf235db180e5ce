//! The five capacitance models and the three fitted curve forms.

use std::f64::consts::FRAC_2_PI;
use std::fmt;

use nalgebra::{DVector, dvector};

use crate::levenberg::ModelFunction;

/// Which coefficient a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoefficientKind {
    /// Plate capacitance per area, aF/um^2.
    AreaCap,
    /// Single-edge fringe capacitance D, aF/um.
    FringeCap,
    /// Sidewall coupling `B / (sep + C)`: B in aF/um, C in um.
    Sidewall,
    /// Fringe shielding fraction `tanh(E (sep + F))`: E in 1/um, F in um.
    FringeShield,
    /// Partial fringe fraction `(2/pi) atan(G (dist + H))`: G in 1/um, H in um.
    FringePartial,
}

impl CoefficientKind {
    pub const ALL: [CoefficientKind; 5] = [
        CoefficientKind::AreaCap,
        CoefficientKind::FringeCap,
        CoefficientKind::Sidewall,
        CoefficientKind::FringeShield,
        CoefficientKind::FringePartial,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CoefficientKind::AreaCap => "areacap",
            CoefficientKind::FringeCap => "fringecap",
            CoefficientKind::Sidewall => "sidewall",
            CoefficientKind::FringeShield => "fringeshield",
            CoefficientKind::FringePartial => "fringepartial",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Number of values a record of this kind carries.
    pub fn value_count(self) -> usize {
        match self {
            CoefficientKind::AreaCap | CoefficientKind::FringeCap => 1,
            _ => 2,
        }
    }

    /// Records of this kind name a conductor after the metal.
    pub fn has_conductor(self) -> bool {
        self != CoefficientKind::Sidewall
    }
}

impl fmt::Display for CoefficientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Curve forms fitted by regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveModel {
    /// `B / (x + C)`
    Sidewall,
    /// `tanh(E (x + F))`
    FringeShield,
    /// `(2/pi) atan(G (x + H))`
    FringePartial,
}

impl CurveModel {
    /// Evaluate with explicit parameters.
    pub fn evaluate(self, x: f64, a: f64, b: f64) -> f64 {
        match self {
            CurveModel::Sidewall => a / (x + b),
            CurveModel::FringeShield => (a * (x + b)).tanh(),
            CurveModel::FringePartial => FRAC_2_PI * (a * (x + b)).atan(),
        }
    }
}

impl ModelFunction for CurveModel {
    fn parameter_count(&self) -> usize {
        2
    }

    fn value(&self, x: f64, p: &DVector<f64>) -> f64 {
        self.evaluate(x, p[0], p[1])
    }

    fn gradient(&self, x: f64, p: &DVector<f64>) -> DVector<f64> {
        let (a, b) = (p[0], p[1]);
        match self {
            CurveModel::Sidewall => {
                let d = x + b;
                dvector![1.0 / d, -a / (d * d)]
            }
            CurveModel::FringeShield => {
                let t = (a * (x + b)).tanh();
                let sech2 = 1.0 - t * t;
                dvector![(x + b) * sech2, a * sech2]
            }
            CurveModel::FringePartial => {
                let u = a * (x + b);
                let s = FRAC_2_PI / (1.0 + u * u);
                dvector![(x + b) * s, a * s]
            }
        }
    }
}
