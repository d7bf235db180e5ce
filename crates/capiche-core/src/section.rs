//! Bottom-to-top cross-section of a stack over a reference conductor.
//!
//! A cross-section is what both the area-capacitance arithmetic and the
//! geometry compiler work from: planar dielectric strata spanning the whole
//! window, plus the metals drawn as wires together with the dielectrics that
//! wrap them.

use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::stack::{StackModel, AIR};

/// Heights closer than this are treated as coincident.
pub const LEVEL_EPSILON: f64 = 1e-9;

/// A planar dielectric layer spanning the extraction window.
#[derive(Debug, Clone, PartialEq)]
pub struct Stratum {
    pub name: String,
    pub k: f64,
    pub bottom: f64,
    /// `f64::INFINITY` for the air stratum.
    pub top: f64,
}

impl Stratum {
    pub fn thickness(&self) -> f64 {
        self.top - self.bottom
    }
}

/// One dielectric grown around a drawn wire.
///
/// Dimensions are cumulative over the wrap chain, so `over_top` and
/// `offset` describe the outer boundary of this wrap.
#[derive(Debug, Clone, PartialEq)]
pub struct Wrap {
    pub name: String,
    pub k: f64,
    /// Height of the wrap's top surface over the wire.
    pub over_top: f64,
    /// Lateral distance from the wire edge to the wrap's outer sidewall.
    pub offset: f64,
    /// Height of the wrap's surface away from the wire.
    pub field_top: f64,
}

/// A metal present as a wire in the cross-section.
#[derive(Debug, Clone, PartialEq)]
pub struct WireLevel {
    pub name: String,
    pub base: f64,
    pub top: f64,
    /// Innermost first.
    pub wraps: Vec<Wrap>,
    /// Number of strata lying entirely beneath this wire.
    pub strata_below: usize,
}

impl WireLevel {
    pub fn thickness(&self) -> f64 {
        self.top - self.base
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossSection {
    pub reference: String,
    /// Top surface of the reference conductor.
    pub reference_top: f64,
    /// Bottom to top, ending with the unbounded air stratum.
    pub strata: Vec<Stratum>,
    /// Drawn metals, bottom to top.
    pub wires: Vec<WireLevel>,
}

impl CrossSection {
    pub(crate) fn build(stack: &StackModel, reference: &str, drawn: &[&str]) -> Result<Self> {
        let reference_top = stack.conductor_top(reference)?;
        for name in drawn {
            if !stack.is_metal(name) {
                return Err(Error::UnresolvedLayer(format!("{} is not a metal", name)));
            }
        }

        let mut strata = Vec::new();
        let mut wires = Vec::new();
        let mut level = reference_top;

        // A metal reference plane keeps its over-metal dielectrics.
        if stack.is_metal(reference) {
            for (name, layer) in stack.wrap_chain(reference) {
                let thickness = match layer {
                    Layer::Conformal { thickness, .. } | Layer::Sidewall { thickness, .. } => *thickness,
                    _ => 0.0,
                };
                strata.push(stratum(stack, name, level, level + thickness)?);
                level += thickness;
            }
        }

        while let Some(metal) = next_metal(stack, reference, level) {
            let Some(Layer::Metal {
                height,
                thickness,
                below,
                ..
            }) = stack.layer(metal)
            else {
                break;
            };

            strata.push(stratum(stack, below, level, *height)?);
            level = *height;

            let chain = stack.wrap_chain(metal);
            if drawn.contains(&metal) {
                let top = height + thickness;
                let mut over_top = top;
                let mut offset = 0.0;
                let mut field_top = *height;
                let mut wraps = Vec::with_capacity(chain.len());
                for (name, layer) in &chain {
                    match layer {
                        Layer::Conformal {
                            k,
                            thickness,
                            sidewall,
                            field_thickness,
                            ..
                        } => {
                            over_top += thickness;
                            offset += sidewall;
                            field_top += field_thickness;
                            wraps.push(wrap(name, *k, over_top, offset, field_top));
                        }
                        Layer::Sidewall {
                            k,
                            thickness,
                            sidewall,
                            ..
                        } => {
                            over_top += thickness;
                            offset += sidewall;
                            wraps.push(wrap(name, *k, over_top, offset, field_top));
                        }
                        _ => {}
                    }
                }
                wires.push(WireLevel {
                    name: metal.to_string(),
                    base: *height,
                    top,
                    wraps,
                    strata_below: strata.len(),
                });
            }

            // Field parts of conformal dielectrics are planar wherever the
            // metal is absent.
            for (name, layer) in &chain {
                if let Layer::Conformal {
                    field_thickness, ..
                } = layer
                {
                    strata.push(stratum(stack, name, level, level + field_thickness)?);
                    level += field_thickness;
                }
            }
        }

        for name in drawn {
            if !wires.iter().any(|w| w.name == *name) {
                return Err(Error::UnresolvedLayer(format!(
                    "{} does not lie above {}",
                    name, reference
                )));
            }
        }

        strata.push(stratum(stack, AIR, level, f64::INFINITY)?);

        Ok(Self {
            reference: reference.to_string(),
            reference_top,
            strata,
            wires,
        })
    }

    pub fn wire(&self, name: &str) -> Option<&WireLevel> {
        self.wires.iter().find(|w| w.name == name)
    }

    /// Highest finite height in the cross-section.
    pub fn finite_top(&self) -> f64 {
        let strata = self
            .strata
            .iter()
            .flat_map(|s| [s.bottom, s.top])
            .filter(|y| y.is_finite());
        let wires = self
            .wires
            .iter()
            .flat_map(|w| std::iter::once(w.top).chain(w.wraps.iter().map(|wr| wr.over_top)));
        strata.chain(wires).fold(self.reference_top, f64::max)
    }
}

/// Lowest metal whose base lies strictly above `level`; ties go to the
/// metal listed first.
fn next_metal<'a>(stack: &'a StackModel, reference: &str, level: f64) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for (name, layer) in stack.layers() {
        if name == reference {
            continue;
        }
        if let Layer::Metal { height, .. } = layer {
            if *height > level + LEVEL_EPSILON && best.map_or(true, |(_, h)| *height < h) {
                best = Some((name, *height));
            }
        }
    }
    best.map(|(name, _)| name)
}

fn stratum(stack: &StackModel, name: &str, bottom: f64, top: f64) -> Result<Stratum> {
    Ok(Stratum {
        name: name.to_string(),
        k: stack.permittivity(name)?,
        bottom,
        top,
    })
}

fn wrap(name: &str, k: f64, over_top: f64, offset: f64, field_top: f64) -> Wrap {
    Wrap {
        name: name.to_string(),
        k,
        over_top,
        offset,
        field_top,
    }
}
