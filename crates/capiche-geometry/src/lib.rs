//! Geometry compiler for capiche.
//!
//! Translates a [`TestTopology`] over a [`capiche_core::StackModel`] into a
//! [`GeometryInstance`]: the conductor and dielectric-interface panels of a
//! 2D boundary-element problem.

pub mod compiler;
pub mod error;
pub mod panel;
pub mod topology;

pub use compiler::{GeometryCompiler, GeometryConfig};
pub use error::{Error, Result};
pub use panel::{GeometryInstance, Panel, PanelKind, Point, Window};
pub use topology::TestTopology;
