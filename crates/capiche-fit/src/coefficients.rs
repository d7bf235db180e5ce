//! Coefficient tables: the fitter's output.
//!
//! One record per line:
//!
//! ```text
//! areacap <metal> <conductor> <aF/um^2>
//! fringecap <metal> <conductor> <aF/um>
//! sidewall <metal> <B aF/um> <C um>
//! fringeshield <metal> <conductor> <E> <F um>
//! fringepartial <metal> <conductor> <G> <H um>
//! ```
//!
//! Pairs that could not be fitted are written as `# ... omitted: <reason>`
//! comment lines, never as made-up values.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::CoefficientKind;

/// One fitted (or computed) model.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientRecord {
    pub kind: CoefficientKind,
    pub metal: String,
    /// `None` for sidewall records, which pair a metal with itself.
    pub conductor: Option<String>,
    pub values: Vec<f64>,
}

impl CoefficientRecord {
    pub fn new(kind: CoefficientKind, metal: &str, conductor: Option<&str>, values: Vec<f64>) -> Self {
        Self {
            kind,
            metal: metal.to_string(),
            conductor: conductor.map(str::to_string),
            values,
        }
    }

    pub fn to_line(&self) -> String {
        let mut line = format!("{} {}", self.kind, self.metal);
        if let Some(conductor) = &self.conductor {
            line.push(' ');
            line.push_str(conductor);
        }
        for v in &self.values {
            let _ = write!(line, " {:.3}", v);
        }
        line
    }

    fn parse(line: &str) -> std::result::Result<Self, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let kind = tokens
            .first()
            .and_then(|t| CoefficientKind::from_name(t))
            .ok_or_else(|| format!("unknown record type in '{}'", line))?;

        let names = if kind.has_conductor() { 2 } else { 1 };
        let expected = 1 + names + kind.value_count();
        if tokens.len() != expected {
            return Err(format!("{} expects {} fields, found {}", kind, expected, tokens.len()));
        }

        let values = tokens[1 + names..]
            .iter()
            .map(|t| t.parse::<f64>().map_err(|_| format!("invalid number '{}'", t)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            kind,
            metal: tokens[1].to_string(),
            conductor: if kind.has_conductor() {
                Some(tokens[2].to_string())
            } else {
                None
            },
            values,
        })
    }
}

/// A pair that produced no record.
#[derive(Debug, Clone, PartialEq)]
pub struct Omission {
    pub kind: CoefficientKind,
    pub metal: String,
    pub conductor: Option<String>,
    pub reason: String,
}

impl Omission {
    pub fn to_line(&self) -> String {
        let conductor = self.conductor.as_deref().unwrap_or(&self.metal);
        format!("# {} {} {} omitted: {}", self.kind, self.metal, conductor, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Record(CoefficientRecord),
    Omitted(Omission),
}

/// Coefficient records in output order, with omissions in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoefficientTable {
    entries: Vec<Entry>,
}

impl CoefficientTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: CoefficientRecord) {
        self.entries.push(Entry::Record(record));
    }

    pub fn omit(&mut self, kind: CoefficientKind, metal: &str, conductor: Option<&str>, reason: impl Into<String>) {
        self.entries.push(Entry::Omitted(Omission {
            kind,
            metal: metal.to_string(),
            conductor: conductor.map(str::to_string),
            reason: reason.into(),
        }));
    }

    pub fn records(&self) -> impl Iterator<Item = &CoefficientRecord> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Record(r) => Some(r),
            Entry::Omitted(_) => None,
        })
    }

    pub fn omissions(&self) -> impl Iterator<Item = &Omission> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Omitted(o) => Some(o),
            Entry::Record(_) => None,
        })
    }

    /// Look up a record. Sidewall records ignore `conductor`.
    pub fn get(&self, kind: CoefficientKind, metal: &str, conductor: &str) -> Option<&CoefficientRecord> {
        self.records().find(|r| {
            r.kind == kind
                && r.metal == metal
                && (!kind.has_conductor() || r.conductor.as_deref() == Some(conductor))
        })
    }

    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            let line = match entry {
                Entry::Record(r) => r.to_line(),
                Entry::Omitted(o) => o.to_line(),
            };
            text.push_str(&line);
            text.push('\n');
        }
        text
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Parse a coefficient file. Comment and blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut table = Self::new();
        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let record = CoefficientRecord::parse(trimmed).map_err(|message| Error::Coefficients {
                line: index + 1,
                message,
            })?;
            table.push(record);
        }
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Human-readable per-metal report.
    pub fn summary(&self) -> String {
        let mut metals: Vec<&str> = Vec::new();
        for entry in &self.entries {
            let metal = match entry {
                Entry::Record(r) => r.metal.as_str(),
                Entry::Omitted(o) => o.metal.as_str(),
            };
            if !metals.contains(&metal) {
                metals.push(metal);
            }
        }

        let mut out = String::new();
        for metal in metals {
            let _ = writeln!(out, "\n{}:", metal);
            for kind in CoefficientKind::ALL {
                let records: Vec<&CoefficientRecord> =
                    self.records().filter(|r| r.metal == metal && r.kind == kind).collect();
                let omitted: Vec<&Omission> =
                    self.omissions().filter(|o| o.metal == metal && o.kind == kind).collect();
                if records.is_empty() && omitted.is_empty() {
                    continue;
                }

                let _ = writeln!(out, "\n  {}:", heading(kind));
                for r in records {
                    match (kind, r.conductor.as_deref()) {
                        (CoefficientKind::Sidewall, _) => {
                            let _ = writeln!(out, "    multiplier = {:.3}", r.values[0]);
                            let _ = writeln!(out, "    offset     = {:.3}", r.values[1]);
                        }
                        (CoefficientKind::AreaCap | CoefficientKind::FringeCap, Some(c)) => {
                            let _ = writeln!(out, "    {} = {:.3}", c, r.values[0]);
                        }
                        (_, conductor) => {
                            let _ = writeln!(out, "    {}:", conductor.unwrap_or(metal));
                            let _ = writeln!(out, "      multiplier = {:.3}", r.values[0]);
                            let _ = writeln!(out, "      offset     = {:.3}", r.values[1]);
                        }
                    }
                }
                for o in omitted {
                    let _ = writeln!(
                        out,
                        "    {} omitted: {}",
                        o.conductor.as_deref().unwrap_or(metal),
                        o.reason
                    );
                }
            }
        }
        out
    }
}

fn heading(kind: CoefficientKind) -> &'static str {
    match kind {
        CoefficientKind::AreaCap => "areacap (aF/um^2) to",
        CoefficientKind::FringeCap => "fringecap (aF/um) to",
        CoefficientKind::Sidewall => "sidewall cap",
        CoefficientKind::FringeShield => "fringe shielding to",
        CoefficientKind::FringePartial => "partial fringe to",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CoefficientTable {
        let mut t = CoefficientTable::new();
        t.push(CoefficientRecord::new(CoefficientKind::AreaCap, "m1", Some("subs"), vec![25.9]));
        t.push(CoefficientRecord::new(CoefficientKind::FringeCap, "m1", Some("subs"), vec![44.2]));
        t.push(CoefficientRecord::new(CoefficientKind::Sidewall, "m1", None, vec![65.52, 0.157]));
        t.omit(CoefficientKind::FringeShield, "m1", Some("li"), "3 distinct sweep points, at least 4 needed");
        t.push(CoefficientRecord::new(CoefficientKind::FringePartial, "m2", Some("m1"), vec![0.412, -0.05]));
        t
    }

    #[test]
    fn test_lines() {
        let text = table().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "areacap m1 subs 25.900");
        assert_eq!(lines[2], "sidewall m1 65.520 0.157");
        assert_eq!(lines[3], "# fringeshield m1 li omitted: 3 distinct sweep points, at least 4 needed");
        assert_eq!(lines[4], "fringepartial m2 m1 0.412 -0.050");
    }

    #[test]
    fn test_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coefficients.txt");
        let original = table();
        original.write(&path).unwrap();

        let loaded = CoefficientTable::load(&path).unwrap();
        assert_eq!(loaded.records().count(), 4);
        assert_eq!(loaded.omissions().count(), 0);
        let sidewall = loaded.get(CoefficientKind::Sidewall, "m1", "anything").unwrap();
        assert_eq!(sidewall.values, vec![65.52, 0.157]);
        assert!(loaded.get(CoefficientKind::FringeShield, "m1", "li").is_none());
    }

    #[test]
    fn test_parse_errors() {
        let err = CoefficientTable::parse("areacap m1 subs 1.0\nsidewall m1 1.0\n").unwrap_err();
        assert!(matches!(err, Error::Coefficients { line: 2, .. }));
        assert!(CoefficientTable::parse("platecap m1 subs 1.0\n").is_err());
        assert!(CoefficientTable::parse("fringecap m1 subs x\n").is_err());
    }

    #[test]
    fn test_summary() {
        let summary = table().summary();
        assert!(summary.contains("m1:"));
        assert!(summary.contains("    subs = 25.900"));
        assert!(summary.contains("multiplier = 65.520"));
        assert!(summary.contains("li omitted"));
        assert!(summary.contains("m2:"));
    }
}
