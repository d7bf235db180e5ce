//! Layer records of a process stack description.

use serde::{Deserialize, Serialize};

/// One element of a metal/dielectric stackup.
///
/// All lengths are in microns, measured from the substrate surface at y = 0.
/// Every variant except the chain terminators (`Diffusion`, `FieldOxide`)
/// names the layer directly beneath it, so following those names always
/// walks down to the substrate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    /// Diffusion or substrate region usable as a ground plane.
    Diffusion {
        /// Height of the diffusion surface.
        height: f64,
        /// Dielectric covering the diffusion.
        above: String,
    },
    /// Bottom dielectric of the stack.
    FieldOxide { k: f64 },
    /// Planar dielectric; its thickness is set by the metals around it.
    Dielectric { k: f64, below: String },
    /// Dielectric grown conformally around the layer `on`.
    Conformal {
        k: f64,
        /// Thickness over the top of the wrapped layer.
        thickness: f64,
        /// Lateral thickness on the sidewalls.
        sidewall: f64,
        /// Thickness where the wrapped metal is absent.
        field_thickness: f64,
        on: String,
    },
    /// Dielectric around the layer `on` that does not extend into the field.
    Sidewall {
        k: f64,
        thickness: f64,
        sidewall: f64,
        on: String,
    },
    /// Routing conductor.
    Metal {
        /// Height of the metal base.
        height: f64,
        thickness: f64,
        /// Dielectric the metal sits on.
        below: String,
        /// Dielectric planarized over the metal.
        above: String,
    },
}

impl Layer {
    /// Short name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Layer::Diffusion { .. } => "diffusion",
            Layer::FieldOxide { .. } => "field_oxide",
            Layer::Dielectric { .. } => "dielectric",
            Layer::Conformal { .. } => "conformal",
            Layer::Sidewall { .. } => "sidewall",
            Layer::Metal { .. } => "metal",
        }
    }

    /// Dielectric constant, or `None` for conductors.
    pub fn k(&self) -> Option<f64> {
        match self {
            Layer::FieldOxide { k }
            | Layer::Dielectric { k, .. }
            | Layer::Conformal { k, .. }
            | Layer::Sidewall { k, .. } => Some(*k),
            Layer::Diffusion { .. } | Layer::Metal { .. } => None,
        }
    }

    pub fn is_dielectric(&self) -> bool {
        self.k().is_some()
    }

    pub fn is_conductor(&self) -> bool {
        matches!(self, Layer::Diffusion { .. } | Layer::Metal { .. })
    }

    /// True for dielectrics that wrap another layer.
    pub fn is_wrap(&self) -> bool {
        matches!(self, Layer::Conformal { .. } | Layer::Sidewall { .. })
    }

    /// The layer directly beneath this one in the reference chain.
    pub fn beneath(&self) -> Option<&str> {
        match self {
            Layer::Dielectric { below, .. } | Layer::Metal { below, .. } => Some(below),
            Layer::Conformal { on, .. } | Layer::Sidewall { on, .. } => Some(on),
            Layer::Diffusion { .. } | Layer::FieldOxide { .. } => None,
        }
    }

    /// For wrapping dielectrics, the layer they are grown on.
    pub fn wraps(&self) -> Option<&str> {
        match self {
            Layer::Conformal { on, .. } | Layer::Sidewall { on, .. } => Some(on),
            _ => None,
        }
    }

    /// Every layer name this record refers to, with the field it came from.
    pub fn references(&self) -> Vec<(&'static str, &str)> {
        match self {
            Layer::Diffusion { above, .. } => vec![("above", above)],
            Layer::FieldOxide { .. } => Vec::new(),
            Layer::Dielectric { below, .. } => vec![("below", below)],
            Layer::Conformal { on, .. } | Layer::Sidewall { on, .. } => vec![("on", on)],
            Layer::Metal { below, above, .. } => vec![("below", below), ("above", above)],
        }
    }

    /// Numeric fields with their names, for range checks.
    pub(crate) fn dimensions(&self) -> Vec<(&'static str, f64)> {
        match self {
            Layer::Diffusion { height, .. } => vec![("height", *height)],
            Layer::FieldOxide { k } | Layer::Dielectric { k, .. } => vec![("k", *k)],
            Layer::Conformal {
                k,
                thickness,
                sidewall,
                field_thickness,
                ..
            } => vec![
                ("k", *k),
                ("thickness", *thickness),
                ("sidewall", *sidewall),
                ("field_thickness", *field_thickness),
            ],
            Layer::Sidewall {
                k,
                thickness,
                sidewall,
                ..
            } => vec![("k", *k), ("thickness", *thickness), ("sidewall", *sidewall)],
            Layer::Metal {
                height, thickness, ..
            } => vec![("height", *height), ("thickness", *thickness)],
        }
    }
}

/// Minimum drawn width and spacing of a metal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub width: f64,
    pub space: f64,
}
