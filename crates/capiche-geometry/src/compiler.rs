//! Compile a test topology over a stack into boundary-element panels.
//!
//! The cross-section is painted onto a non-uniform grid: planar strata
//! first, then the reference conductor, then the dielectrics wrapping each
//! wire (outermost first), then the wires themselves. Every grid edge whose
//! two sides differ becomes a panel, and collinear runs of identical panels
//! are merged.

use capiche_core::section::LEVEL_EPSILON;
use capiche_core::{CrossSection, Layer, StackModel};

use crate::error::{Error, Result};
use crate::panel::{GeometryInstance, Panel, PanelKind, Point, Window};
use crate::topology::TestTopology;

/// Tunables for geometry compilation.
#[derive(Debug, Clone)]
pub struct GeometryConfig {
    /// Half-width of the window as a multiple of the largest feature.
    pub window_multiple: f64,
    /// Depth of a diffusion reference conductor below its surface.
    pub substrate_depth: f64,
    /// Air modelled above the highest finite boundary.
    pub air_margin: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            window_multiple: 20.0,
            substrate_depth: 1.0,
            air_margin: 1.0,
        }
    }
}

impl GeometryConfig {
    pub fn with_window_multiple(mut self, multiple: f64) -> Self {
        self.window_multiple = multiple;
        self
    }

    pub fn with_substrate_depth(mut self, depth: f64) -> Self {
        self.substrate_depth = depth;
        self
    }

    pub fn with_air_margin(mut self, margin: f64) -> Self {
        self.air_margin = margin;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Material {
    Dielectric(f64),
    Conductor(usize),
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    material: Material,
}

impl Shape {
    fn contains(&self, x: f64, y: f64) -> bool {
        x > self.x0 && x < self.x1 && y > self.y0 && y < self.y1
    }
}

/// A wire placed laterally; `span` of `None` means it covers the window.
struct Placement {
    metal: String,
    span: Option<(f64, f64)>,
    conductor: usize,
}

/// Turns topologies into geometry instances for one stack.
pub struct GeometryCompiler<'a> {
    stack: &'a StackModel,
    config: GeometryConfig,
}

impl<'a> GeometryCompiler<'a> {
    pub fn new(stack: &'a StackModel) -> Self {
        Self::with_config(stack, GeometryConfig::default())
    }

    pub fn with_config(stack: &'a StackModel, config: GeometryConfig) -> Self {
        Self { stack, config }
    }

    pub fn stack(&self) -> &'a StackModel {
        self.stack
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    /// Build the panel set for one fully dimensioned topology.
    pub fn compile(&self, topology: &TestTopology) -> Result<GeometryInstance> {
        check_dimensions(topology)?;

        let (reference, conductors, placements) = self.arrange(topology)?;
        let drawn: Vec<&str> = placements.iter().map(|p| p.metal.as_str()).collect();
        let section = self.stack.cross_section(&reference.0, &drawn)?;

        let ref_index = reference.1;
        let (ref_bottom, ref_top) = if self.stack.is_metal(&reference.0) {
            (self.stack.resolve_height(&reference.0)?, self.stack.conductor_top(&reference.0)?)
        } else {
            let h = self.stack.resolve_height(&reference.0)?;
            (h - self.config.substrate_depth, h)
        };

        let y_min = ref_bottom;
        let y_max = section.finite_top() + self.config.air_margin;

        let mut lateral = topology.largest_feature();
        for p in &placements {
            if let (Some((x0, x1)), Some(wire)) = (p.span, section.wire(&p.metal)) {
                let offset = wire.wraps.last().map_or(0.0, |w| w.offset);
                for x in [x0, x1].into_iter().filter(|x| x.is_finite()) {
                    lateral = lateral.max(x.abs() + offset);
                }
            }
        }
        let half = self.config.window_multiple * lateral.max(y_max - y_min);
        let window = Window {
            x_min: -half,
            x_max: half,
            y_min,
            y_max,
        };

        let shapes = paint(&section, &placements, ref_index, (ref_bottom, ref_top), window);
        let panels = extract_panels(&shapes, window).map_err(|(a, b)| {
            Error::InvalidParameter(format!(
                "{}: conductors {} and {} touch",
                topology, conductors[a], conductors[b]
            ))
        })?;

        for (index, label) in conductors.iter().enumerate() {
            if !panels.iter().any(|p| p.conductor() == Some(index)) {
                return Err(Error::IncompatibleTopology(format!(
                    "{}: conductor {} is buried",
                    topology, label
                )));
            }
        }

        log::debug!("compiled {}: {} panels", topology, panels.len());
        Ok(GeometryInstance::new(topology.clone(), conductors, panels, window))
    }

    /// Reference conductor, conductor labels and wire placements.
    fn arrange(&self, topology: &TestTopology) -> Result<((String, usize), Vec<String>, Vec<Placement>)> {
        let centred = |width: f64| Some((-0.5 * width, 0.5 * width));

        match topology {
            TestTopology::SingleWire {
                metal,
                reference,
                width,
            } => {
                self.require_metal(metal)?;
                self.require_conductor(reference)?;
                self.require_above(reference, metal)?;
                Ok((
                    (reference.clone(), 1),
                    labels(&["wire", "reference"]),
                    vec![place(metal, centred(*width), 0)],
                ))
            }
            TestTopology::WireUnderConductor { metal, upper, width } => {
                self.require_metal(metal)?;
                self.require_metal(upper)?;
                let substrate = self.substrate()?;
                self.require_above(&substrate, metal)?;
                self.require_above(metal, upper)?;
                Ok((
                    (substrate, 2),
                    labels(&["wire", "upper", "substrate"]),
                    vec![place(metal, centred(*width), 0), place(upper, None, 1)],
                ))
            }
            TestTopology::WireOverShield {
                metal,
                shield,
                width,
                sep,
            } => {
                self.require_metal(metal)?;
                self.require_metal(shield)?;
                let substrate = self.substrate()?;
                self.require_above(&substrate, shield)?;
                self.require_above(shield, metal)?;
                // Shield edge measured from the wire's right edge.
                let edge = 0.5 * width - sep;
                Ok((
                    (substrate, 2),
                    labels(&["wire", "shield", "substrate"]),
                    vec![
                        place(shield, Some((f64::NEG_INFINITY, edge)), 1),
                        place(metal, centred(*width), 0),
                    ],
                ))
            }
            TestTopology::TwoParallelWires {
                metal,
                reference,
                width,
                sep,
            } => {
                self.require_metal(metal)?;
                self.require_conductor(reference)?;
                self.require_above(reference, metal)?;
                let half = 0.5 * sep;
                Ok((
                    (reference.clone(), 2),
                    labels(&["left", "right", "reference"]),
                    vec![
                        place(metal, Some((-half - width, -half)), 0),
                        place(metal, Some((half, half + width)), 1),
                    ],
                ))
            }
            TestTopology::TwoDissimilarWires {
                metal1,
                metal2,
                width1,
                width2,
                sep,
            } => {
                self.require_metal(metal1)?;
                self.require_metal(metal2)?;
                if metal1 == metal2 {
                    return Err(Error::IncompatibleTopology(format!(
                        "{}: both wires are {}",
                        topology, metal1
                    )));
                }
                let substrate = self.substrate()?;
                self.require_above(&substrate, metal1)?;
                self.require_above(&substrate, metal2)?;
                let half = 0.5 * sep;
                Ok((
                    (substrate, 2),
                    labels(&["wire1", "wire2", "substrate"]),
                    vec![
                        place(metal1, Some((-half - width1, -half)), 0),
                        place(metal2, Some((half, half + width2)), 1),
                    ],
                ))
            }
        }
    }

    fn substrate(&self) -> Result<String> {
        self.stack
            .first_diffusion()
            .map(str::to_string)
            .ok_or_else(|| Error::IncompatibleTopology("stack has no diffusion to use as substrate".into()))
    }

    fn require_metal(&self, name: &str) -> Result<()> {
        match self.stack.layer(name) {
            None => Err(capiche_core::Error::UnresolvedLayer(name.to_string()).into()),
            Some(Layer::Metal { .. }) => Ok(()),
            Some(other) => Err(Error::IncompatibleTopology(format!(
                "{} is a {}, not a metal",
                name,
                other.kind_name()
            ))),
        }
    }

    fn require_conductor(&self, name: &str) -> Result<()> {
        match self.stack.layer(name) {
            None => Err(capiche_core::Error::UnresolvedLayer(name.to_string()).into()),
            Some(layer) if layer.is_conductor() => Ok(()),
            Some(other) => Err(Error::IncompatibleTopology(format!(
                "{} is a {}, not a conductor",
                name,
                other.kind_name()
            ))),
        }
    }

    fn require_above(&self, lower: &str, upper: &str) -> Result<()> {
        if lower == upper {
            return Err(Error::IncompatibleTopology(format!("{} cannot face itself", lower)));
        }
        let top = self.stack.conductor_top(lower)?;
        let base = self.stack.resolve_height(upper)?;
        if base <= top + LEVEL_EPSILON {
            return Err(Error::IncompatibleTopology(format!(
                "{} does not lie above {}",
                upper, lower
            )));
        }
        Ok(())
    }
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn place(metal: &str, span: Option<(f64, f64)>, conductor: usize) -> Placement {
    Placement {
        metal: metal.to_string(),
        span,
        conductor,
    }
}

fn check_dimensions(topology: &TestTopology) -> Result<()> {
    let positive = |name: &str, v: f64| {
        if v.is_finite() && v > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!("{}: {} must be positive", topology, name)))
        }
    };
    match topology {
        TestTopology::SingleWire { width, .. } | TestTopology::WireUnderConductor { width, .. } => {
            positive("width", *width)
        }
        TestTopology::TwoParallelWires { width, sep, .. } => {
            positive("width", *width)?;
            positive("sep", *sep)
        }
        TestTopology::WireOverShield { width, sep, .. } => {
            positive("width", *width)?;
            if sep.is_finite() {
                Ok(())
            } else {
                Err(Error::InvalidParameter(format!("{}: sep must be finite", topology)))
            }
        }
        TestTopology::TwoDissimilarWires {
            width1, width2, sep, ..
        } => {
            positive("width1", *width1)?;
            positive("width2", *width2)?;
            if sep.is_finite() {
                Ok(())
            } else {
                Err(Error::InvalidParameter(format!("{}: sep must be finite", topology)))
            }
        }
    }
}

/// Shapes in paint order; later shapes cover earlier ones.
fn paint(
    section: &CrossSection,
    placements: &[Placement],
    ref_index: usize,
    (ref_bottom, ref_top): (f64, f64),
    window: Window,
) -> Vec<Shape> {
    let clip_x = |x: f64| x.clamp(window.x_min, window.x_max);
    let mut shapes = Vec::new();

    for stratum in &section.strata {
        let top = stratum.top.min(window.y_max);
        if top - stratum.bottom > LEVEL_EPSILON {
            shapes.push(Shape {
                x0: window.x_min,
                x1: window.x_max,
                y0: stratum.bottom,
                y1: top,
                material: Material::Dielectric(stratum.k),
            });
        }
    }

    shapes.push(Shape {
        x0: window.x_min,
        x1: window.x_max,
        y0: ref_bottom,
        y1: ref_top,
        material: Material::Conductor(ref_index),
    });

    let mut conductors = Vec::new();
    for p in placements {
        let Some(wire) = section.wire(&p.metal) else {
            continue;
        };
        let (x0, x1) = p.span.unwrap_or((window.x_min, window.x_max));
        for wrap in wire.wraps.iter().rev() {
            shapes.push(Shape {
                x0: clip_x(x0 - wrap.offset),
                x1: clip_x(x1 + wrap.offset),
                y0: wire.base,
                y1: wrap.over_top,
                material: Material::Dielectric(wrap.k),
            });
        }
        conductors.push(Shape {
            x0: clip_x(x0),
            x1: clip_x(x1),
            y0: wire.base,
            y1: wire.top,
            material: Material::Conductor(p.conductor),
        });
    }
    shapes.extend(conductors);
    shapes
}

/// Sorted grid coordinates with near-duplicates removed.
fn grid_lines(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|b, a| (*b - *a).abs() < LEVEL_EPSILON);
    values
}

type Slot = Option<(PanelKind, bool)>;

/// Classify the edge between two cells. `left` lies to the left of the
/// canonical edge direction; the flag asks for the reverse direction.
fn classify(
    left: Option<Material>,
    right: Option<Material>,
    ambient: impl FnOnce() -> f64,
) -> std::result::Result<Slot, (usize, usize)> {
    use Material::{Conductor, Dielectric};
    Ok(match (left, right) {
        (Some(Dielectric(a)), Some(Dielectric(b))) if a != b => {
            Some((PanelKind::Interface { outer: a, inner: b }, false))
        }
        (Some(Dielectric(k)), Some(Conductor(c))) => Some((
            PanelKind::Conductor {
                conductor: c,
                permittivity: k,
            },
            false,
        )),
        (Some(Conductor(c)), Some(Dielectric(k))) => Some((
            PanelKind::Conductor {
                conductor: c,
                permittivity: k,
            },
            true,
        )),
        (None, Some(Conductor(c))) => Some((
            PanelKind::Conductor {
                conductor: c,
                permittivity: ambient(),
            },
            false,
        )),
        (Some(Conductor(c)), None) => Some((
            PanelKind::Conductor {
                conductor: c,
                permittivity: ambient(),
            },
            true,
        )),
        (Some(Conductor(a)), Some(Conductor(b))) if a != b => return Err((a, b)),
        _ => None,
    })
}

struct Grid {
    xs: Vec<f64>,
    ys: Vec<f64>,
    cells: Vec<Option<Material>>,
}

impl Grid {
    fn nx(&self) -> usize {
        self.xs.len() - 1
    }

    fn ny(&self) -> usize {
        self.ys.len() - 1
    }

    fn cell(&self, i: isize, j: isize) -> Option<Material> {
        if i < 0 || j < 0 || i as usize >= self.nx() || j as usize >= self.ny() {
            return None;
        }
        self.cells[j as usize * self.nx() + i as usize]
    }

    /// Permittivity used for a conductor face on the window boundary: the
    /// nearest dielectric in the same column.
    fn ambient(&self, i: isize, j: isize) -> f64 {
        let column = |j: isize| match self.cell(i, j) {
            Some(Material::Dielectric(k)) => Some(k),
            _ => None,
        };
        (j..self.ny() as isize)
            .find_map(column)
            .or_else(|| (0..j).rev().find_map(column))
            .unwrap_or(1.0)
    }
}

fn extract_panels(shapes: &[Shape], window: Window) -> std::result::Result<Vec<Panel>, (usize, usize)> {
    let xs = grid_lines(shapes.iter().flat_map(|s| [s.x0, s.x1]).collect());
    let ys = grid_lines(
        shapes
            .iter()
            .flat_map(|s| [s.y0, s.y1])
            .map(|y| y.clamp(window.y_min, window.y_max))
            .collect(),
    );
    if xs.len() < 2 || ys.len() < 2 {
        return Ok(Vec::new());
    }

    let mut cells = Vec::with_capacity((xs.len() - 1) * (ys.len() - 1));
    for j in 0..ys.len() - 1 {
        let yc = 0.5 * (ys[j] + ys[j + 1]);
        for i in 0..xs.len() - 1 {
            let xc = 0.5 * (xs[i] + xs[i + 1]);
            cells.push(shapes.iter().rev().find(|s| s.contains(xc, yc)).map(|s| s.material));
        }
    }
    let grid = Grid { xs, ys, cells };
    let (nx, ny) = (grid.nx() as isize, grid.ny() as isize);

    let mut panels = Vec::new();

    // Vertical grid lines, canonical direction upward.
    for i in 0..=nx {
        let x = grid.xs[i as usize];
        let mut run: Option<(usize, (PanelKind, bool))> = None;
        for j in 0..=ny {
            let slot = if j < ny {
                let left = grid.cell(i - 1, j);
                let right = grid.cell(i, j);
                let inside = if left.is_some() { i - 1 } else { i };
                classify(left, right, || grid.ambient(inside, j))?
            } else {
                None
            };
            if run.map(|(_, s)| Some(s)) != Some(slot) {
                if let Some((start, (kind, reversed))) = run.take() {
                    let a = Point::new(x, grid.ys[start]);
                    let b = Point::new(x, grid.ys[j as usize]);
                    panels.push(oriented(a, b, kind, reversed));
                }
                run = slot.map(|s| (j as usize, s));
            }
        }
    }

    // Horizontal grid lines, canonical direction leftward.
    for j in 0..=ny {
        let y = grid.ys[j as usize];
        let mut run: Option<(usize, (PanelKind, bool))> = None;
        for i in 0..=nx {
            let slot = if i < nx {
                let below = grid.cell(i, j - 1);
                let above = grid.cell(i, j);
                let inside = if above.is_some() { j } else { j - 1 };
                classify(below, above, || grid.ambient(i, inside))?
            } else {
                None
            };
            if run.map(|(_, s)| Some(s)) != Some(slot) {
                if let Some((start, (kind, reversed))) = run.take() {
                    let a = Point::new(grid.xs[i as usize], y);
                    let b = Point::new(grid.xs[start], y);
                    panels.push(oriented(a, b, kind, reversed));
                }
                run = slot.map(|s| (i as usize, s));
            }
        }
    }

    panels.sort_by_key(|p| p.conductor().unwrap_or(usize::MAX));
    Ok(panels)
}

fn oriented(a: Point, b: Point, kind: PanelKind, reversed: bool) -> Panel {
    let (start, end) = if reversed { (b, a) } else { (a, b) };
    Panel { start, end, kind }
}
