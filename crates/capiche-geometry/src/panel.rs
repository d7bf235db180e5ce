//! Boundary-element panels and the compiled geometry instance.

use crate::topology::TestTopology;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelKind {
    /// Surface of conductor `conductor`, facing a dielectric of relative
    /// permittivity `permittivity`.
    Conductor { conductor: usize, permittivity: f64 },
    /// Boundary between two dielectrics; `outer` lies to the left of the
    /// panel direction.
    Interface { outer: f64, inner: f64 },
}

/// A straight boundary segment.
///
/// Orientation is significant: the dielectric side of a conductor panel
/// and the `outer` side of an interface panel are on the left when walking
/// from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Panel {
    pub start: Point,
    pub end: Point,
    pub kind: PanelKind,
}

impl Panel {
    pub fn length(&self) -> f64 {
        (self.end.x - self.start.x).hypot(self.end.y - self.start.y)
    }

    pub fn midpoint(&self) -> Point {
        Point::new(
            0.5 * (self.start.x + self.end.x),
            0.5 * (self.start.y + self.end.y),
        )
    }

    /// Unit normal pointing to the left of the panel direction.
    pub fn left_normal(&self) -> Point {
        let length = self.length();
        if length == 0.0 {
            return Point::new(0.0, 0.0);
        }
        Point::new(
            -(self.end.y - self.start.y) / length,
            (self.end.x - self.start.x) / length,
        )
    }

    /// A point at distance `d` off the panel midpoint on its left side.
    pub fn left_point(&self, d: f64) -> Point {
        let m = self.midpoint();
        let n = self.left_normal();
        Point::new(m.x + d * n.x, m.y + d * n.y)
    }

    pub fn conductor(&self) -> Option<usize> {
        match self.kind {
            PanelKind::Conductor { conductor, .. } => Some(conductor),
            PanelKind::Interface { .. } => None,
        }
    }
}

/// Extent of the modelled region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// A compiled boundary-element problem for one sweep point.
///
/// Conductor indices follow the order of [`GeometryInstance::conductors`],
/// which is also the row/column order of the solver's capacitance matrix.
#[derive(Debug, Clone)]
pub struct GeometryInstance {
    topology: TestTopology,
    conductors: Vec<String>,
    panels: Vec<Panel>,
    window: Window,
}

impl GeometryInstance {
    pub(crate) fn new(topology: TestTopology, conductors: Vec<String>, panels: Vec<Panel>, window: Window) -> Self {
        Self {
            topology,
            conductors,
            panels,
            window,
        }
    }

    pub fn topology(&self) -> &TestTopology {
        &self.topology
    }

    /// Conductor labels in matrix order.
    pub fn conductors(&self) -> &[String] {
        &self.conductors
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Panels belonging to one conductor.
    pub fn conductor_panels(&self, index: usize) -> impl Iterator<Item = &Panel> {
        self.panels.iter().filter(move |p| p.conductor() == Some(index))
    }

    pub fn interface_panels(&self) -> impl Iterator<Item = &Panel> {
        self.panels
            .iter()
            .filter(|p| matches!(p.kind, PanelKind::Interface { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_normal() {
        let panel = Panel {
            start: Point::new(0.0, 0.0),
            end: Point::new(2.0, 0.0),
            kind: PanelKind::Interface {
                outer: 1.0,
                inner: 3.9,
            },
        };
        assert_eq!(panel.length(), 2.0);
        let n = panel.left_normal();
        assert!((n.x - 0.0).abs() < 1e-12 && (n.y - 1.0).abs() < 1e-12);
        let p = panel.left_point(0.1);
        assert!((p.x - 1.0).abs() < 1e-12 && (p.y - 0.1).abs() < 1e-12);
        assert_eq!(panel.conductor(), None);
    }
}
