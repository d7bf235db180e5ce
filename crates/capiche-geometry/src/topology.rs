//! Test topologies: the conductor arrangements swept to extract each
//! capacitance model.

use std::fmt;

use capiche_core::units::format_length;
use capiche_core::TableKind;

/// One test structure, fully dimensioned.
///
/// Widths and separations are in microns. Separations between wires are
/// edge to edge. For `WireOverShield`, `sep` places the shield's right edge
/// relative to the wire's right edge: positive values inset the shield under
/// the wire, negative values extend it past the wire by `|sep|`. The shield
/// always covers everything to the left.
#[derive(Debug, Clone, PartialEq)]
pub enum TestTopology {
    /// Wire centred at x = 0 over a reference conductor.
    SingleWire {
        metal: String,
        reference: String,
        width: f64,
    },
    /// Wire over the substrate under a plane of a higher metal.
    WireUnderConductor {
        metal: String,
        upper: String,
        width: f64,
    },
    /// Wire over the substrate with a lower-metal shield between them.
    WireOverShield {
        metal: String,
        shield: String,
        width: f64,
        sep: f64,
    },
    /// Two equal wires placed symmetrically about x = 0 over a reference.
    TwoParallelWires {
        metal: String,
        reference: String,
        width: f64,
        sep: f64,
    },
    /// Wires on two metals over the substrate; wire 1 left, wire 2 right.
    TwoDissimilarWires {
        metal1: String,
        metal2: String,
        width1: f64,
        width2: f64,
        sep: f64,
    },
}

impl TestTopology {
    pub fn table_kind(&self) -> TableKind {
        match self {
            TestTopology::SingleWire { .. } => TableKind::SingleWire,
            TestTopology::WireUnderConductor { .. } => TableKind::WireUnderConductor,
            TestTopology::WireOverShield { .. } => TableKind::WireOverShield,
            TestTopology::TwoParallelWires { .. } => TableKind::TwoParallelWires,
            TestTopology::TwoDissimilarWires { .. } => TableKind::TwoDissimilarWires,
        }
    }

    /// The two layer names leading a result row.
    pub fn row_names(&self) -> (&str, &str) {
        match self {
            TestTopology::SingleWire { metal, reference, .. }
            | TestTopology::TwoParallelWires { metal, reference, .. } => (metal, reference),
            TestTopology::WireUnderConductor { metal, upper, .. } => (metal, upper),
            TestTopology::WireOverShield { metal, shield, .. } => (metal, shield),
            TestTopology::TwoDissimilarWires { metal1, metal2, .. } => (metal1, metal2),
        }
    }

    /// Sweep parameters in result-table column order.
    pub fn params(&self) -> Vec<f64> {
        match self {
            TestTopology::SingleWire { width, .. } | TestTopology::WireUnderConductor { width, .. } => {
                vec![*width]
            }
            TestTopology::WireOverShield { width, sep, .. }
            | TestTopology::TwoParallelWires { width, sep, .. } => vec![*width, *sep],
            TestTopology::TwoDissimilarWires {
                width1, width2, sep, ..
            } => vec![*width1, *width2, *sep],
        }
    }

    /// True if the topology takes a separation parameter.
    pub fn has_sep(&self) -> bool {
        !matches!(
            self,
            TestTopology::SingleWire { .. } | TestTopology::WireUnderConductor { .. }
        )
    }

    /// A copy with new dimensions. Parameters the topology does not have
    /// are ignored.
    pub fn with_dimensions(&self, width: f64, width2: Option<f64>, sep: Option<f64>) -> Self {
        let mut next = self.clone();
        match &mut next {
            TestTopology::SingleWire { width: w, .. } | TestTopology::WireUnderConductor { width: w, .. } => {
                *w = width;
            }
            TestTopology::WireOverShield { width: w, sep: s, .. }
            | TestTopology::TwoParallelWires { width: w, sep: s, .. } => {
                *w = width;
                if let Some(sep) = sep {
                    *s = sep;
                }
            }
            TestTopology::TwoDissimilarWires {
                width1, width2: w2, sep: s, ..
            } => {
                *width1 = width;
                if let Some(width2) = width2 {
                    *w2 = width2;
                }
                if let Some(sep) = sep {
                    *s = sep;
                }
            }
        }
        next
    }

    /// Widest lateral dimension of the structure itself.
    pub fn largest_feature(&self) -> f64 {
        self.params().into_iter().map(f64::abs).fold(0.0, f64::max)
    }
}

impl fmt::Display for TestTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestTopology::SingleWire { metal, reference, width } => {
                write!(f, "{} wire over {}, width {}", metal, reference, format_length(*width))
            }
            TestTopology::WireUnderConductor { metal, upper, width } => {
                write!(f, "{} wire under {}, width {}", metal, upper, format_length(*width))
            }
            TestTopology::WireOverShield {
                metal,
                shield,
                width,
                sep,
            } => write!(
                f,
                "{} wire over {} shield, width {} sep {}",
                metal,
                shield,
                format_length(*width),
                format_length(*sep)
            ),
            TestTopology::TwoParallelWires {
                metal,
                reference,
                width,
                sep,
            } => write!(
                f,
                "two {} wires over {}, width {} sep {}",
                metal,
                reference,
                format_length(*width),
                format_length(*sep)
            ),
            TestTopology::TwoDissimilarWires {
                metal1,
                metal2,
                width1,
                width2,
                sep,
            } => write!(
                f,
                "{} and {} wires, widths {} {} sep {}",
                metal1,
                metal2,
                format_length(*width1),
                format_length(*width2),
                format_length(*sep)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_follow_table_columns() {
        let t = TestTopology::TwoDissimilarWires {
            metal1: "m1".into(),
            metal2: "m2".into(),
            width1: 0.14,
            width2: 0.28,
            sep: 0.5,
        };
        assert_eq!(t.params().len(), t.table_kind().parameter_count());
        assert_eq!(t.row_names(), ("m1", "m2"));
        assert_eq!(t.largest_feature(), 0.5);
    }

    #[test]
    fn test_with_dimensions() {
        let template = TestTopology::WireOverShield {
            metal: "m2".into(),
            shield: "m1".into(),
            width: 0.0,
            sep: 0.0,
        };
        let t = template.with_dimensions(0.14, None, Some(-1.5));
        assert_eq!(t.params(), vec![0.14, -1.5]);
        assert!(t.has_sep());
        assert_eq!(t.to_string(), "m2 wire over m1 shield, width 0.1400 sep -1.5000");

        let single = TestTopology::SingleWire {
            metal: "m1".into(),
            reference: "subs".into(),
            width: 0.14,
        };
        assert_eq!(single.with_dimensions(1.4, Some(2.0), Some(3.0)).params(), vec![1.4]);
        assert!(!single.has_sep());
    }
}
