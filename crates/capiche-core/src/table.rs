//! Sweep result tables.
//!
//! A table is plain whitespace-delimited text, one row per line. Each row
//! starts with two layer names, then the sweep parameters, then the raw
//! solver capacitances. Tables are only ever appended to, and a row is
//! identified by its names and parameters formatted to four decimals.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::units::{format_length, format_significant};

/// Directory under an output root holding every sweep table.
pub const ANALYSIS_DIR: &str = "analysis";

/// Path of the `<metal>_<conductor>.txt` table in one analysis group.
pub fn analysis_table_path(output: &Path, group: &str, metal: &str, conductor: &str) -> PathBuf {
    output
        .join(ANALYSIS_DIR)
        .join(group)
        .join(format!("{}_{}.txt", metal, conductor))
}

/// Column layout of a result table, one per test topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    SingleWire,
    WireUnderConductor,
    WireOverShield,
    TwoParallelWires,
    TwoDissimilarWires,
}

impl TableKind {
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            TableKind::SingleWire | TableKind::WireUnderConductor => {
                &["metal", "conductor", "width", "Ccoup"]
            }
            TableKind::WireOverShield => {
                &["metal", "conductor", "width", "sep", "Cmsub", "Ccsub", "Ccoup"]
            }
            TableKind::TwoParallelWires => &["metal", "conductor", "width", "sep", "Cmsub", "Ccoup"],
            TableKind::TwoDissimilarWires => {
                &["metal1", "metal2", "width1", "width2", "sep", "Cm1sub", "Cm2sub", "Ccoup"]
            }
        }
    }

    /// Number of sweep parameter columns following the two names.
    pub fn parameter_count(self) -> usize {
        match self {
            TableKind::SingleWire | TableKind::WireUnderConductor => 1,
            TableKind::WireOverShield | TableKind::TwoParallelWires => 2,
            TableKind::TwoDissimilarWires => 3,
        }
    }

    pub fn value_count(self) -> usize {
        self.columns().len() - 2 - self.parameter_count()
    }

    /// Index of a value column by header name.
    pub fn value_index(self, column: &str) -> Option<usize> {
        self.columns()
            .iter()
            .skip(2 + self.parameter_count())
            .position(|c| *c == column)
    }
}

/// Cache key of a row: names plus parameters at table precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(first: &str, second: &str, params: &[f64]) -> Self {
        let mut key = format!("{} {}", first, second);
        for p in params {
            key.push(' ');
            key.push_str(&format_length(*p));
        }
        RowKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sweep data point.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Wire metal (first metal for dissimilar wires).
    pub metal: String,
    /// Reference conductor (second metal for dissimilar wires).
    pub conductor: String,
    pub params: Vec<f64>,
    /// Raw solver capacitances, in table column order.
    pub values: Vec<f64>,
}

impl ResultRow {
    pub fn new(metal: impl Into<String>, conductor: impl Into<String>, params: Vec<f64>, values: Vec<f64>) -> Self {
        Self {
            metal: metal.into(),
            conductor: conductor.into(),
            params,
            values,
        }
    }

    pub fn key(&self) -> RowKey {
        RowKey::new(&self.metal, &self.conductor, &self.params)
    }

    pub fn to_line(&self) -> String {
        let mut line = self.key().0;
        for v in &self.values {
            line.push(' ');
            line.push_str(&format_significant(*v, 5));
        }
        line
    }

    /// Parse one table line of the given kind.
    pub fn parse(kind: TableKind, line: &str) -> std::result::Result<Self, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let expected = kind.columns().len();
        if tokens.len() != expected {
            return Err(format!("expected {} columns, found {}", expected, tokens.len()));
        }

        let mut numbers = Vec::with_capacity(expected - 2);
        for (column, token) in kind.columns()[2..].iter().zip(&tokens[2..]) {
            let value: f64 = token
                .parse()
                .map_err(|_| format!("{}: `{}` is not a number", column, token))?;
            numbers.push(value);
        }
        let values = numbers.split_off(kind.parameter_count());

        Ok(Self::new(tokens[0], tokens[1], numbers, values))
    }

    /// A value by column name.
    pub fn value(&self, kind: TableKind, column: &str) -> Option<f64> {
        kind.value_index(column).and_then(|i| self.values.get(i).copied())
    }
}

/// A result table on disk together with the rows read from it.
#[derive(Debug)]
pub struct ResultTable {
    kind: TableKind,
    path: PathBuf,
    rows: Vec<ResultRow>,
    keys: HashSet<RowKey>,
    // length of the intact prefix when the file ends mid-line
    torn_at: Option<u64>,
}

impl ResultTable {
    /// Open a table, reading any rows already present.
    ///
    /// A missing file is an empty table. Malformed lines are skipped with a
    /// warning so a table truncated by an interrupted run stays usable. An
    /// unterminated last line is never trusted, even if it parses; it is cut
    /// off before the next append.
    pub fn open(path: impl AsRef<Path>, kind: TableKind) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut table = Self {
            kind,
            path,
            rows: Vec::new(),
            keys: HashSet::new(),
            torn_at: None,
        };

        let text = match std::fs::read_to_string(&table.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(table),
            Err(e) => return Err(e.into()),
        };
        let intact = match text.rfind('\n') {
            Some(end) => &text[..=end],
            None => "",
        };
        if intact.len() < text.len() {
            log::warn!(
                "{}: dropping unterminated last line {:?}",
                table.path.display(),
                text[intact.len()..].trim()
            );
            table.torn_at = Some(intact.len() as u64);
        }

        for (index, line) in intact.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match ResultRow::parse(kind, trimmed) {
                Ok(row) => table.insert(row),
                Err(message) => {
                    let err = Error::Table {
                        path: table.path.clone(),
                        line: index + 1,
                        message,
                    };
                    log::warn!("skipping malformed row: {}", err);
                }
            }
        }
        log::debug!("{}: {} cached rows", table.path.display(), table.rows.len());
        Ok(table)
    }

    /// Read a table that must exist.
    pub fn read(path: impl AsRef<Path>, kind: TableKind) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        Self::open(path, kind)
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.keys.contains(key)
    }

    /// Append one row and flush it to disk before returning.
    pub fn append(&mut self, row: ResultRow) -> Result<()> {
        if row.params.len() != self.kind.parameter_count() || row.values.len() != self.kind.value_count() {
            return Err(Error::Table {
                path: self.path.clone(),
                line: self.rows.len() + 1,
                message: format!(
                    "row {} does not match the {:?} layout",
                    row.key(),
                    self.kind
                ),
            });
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if let Some(len) = self.torn_at.take() {
            OpenOptions::new().write(true).open(&self.path)?.set_len(len)?;
        }
        let mut file: File = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", row.to_line())?;
        file.flush()?;

        self.insert(row);
        Ok(())
    }

    fn insert(&mut self, row: ResultRow) {
        if self.keys.insert(row.key()) {
            self.rows.push(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns() {
        assert_eq!(TableKind::SingleWire.value_count(), 1);
        assert_eq!(TableKind::WireOverShield.value_count(), 3);
        assert_eq!(TableKind::TwoParallelWires.value_count(), 2);
        assert_eq!(TableKind::TwoDissimilarWires.parameter_count(), 3);
        assert_eq!(TableKind::TwoDissimilarWires.value_count(), 3);
        assert_eq!(TableKind::WireOverShield.value_index("Ccoup"), Some(2));
        assert_eq!(TableKind::TwoParallelWires.value_index("Cmsub"), Some(0));
        assert_eq!(TableKind::SingleWire.value_index("width"), None);
    }

    #[test]
    fn test_row_line() {
        let row = ResultRow::new("m1", "subs", vec![0.14], vec![4.1826e-11]);
        assert_eq!(row.to_line(), "m1 subs 0.1400 4.1826e-11");

        let parsed = ResultRow::parse(TableKind::SingleWire, &row.to_line()).unwrap();
        assert_eq!(parsed.key(), row.key());
        assert!((parsed.values[0] - 4.1826e-11).abs() < 1e-20);
    }

    #[test]
    fn test_key_precision() {
        let a = RowKey::new("m1", "m1", &[0.14, 0.39]);
        let b = RowKey::new("m1", "m1", &[0.14000000001, 0.3899999999]);
        assert_eq!(a, b);
        assert_ne!(a, RowKey::new("m1", "m1", &[0.14, 0.64]));
    }

    #[test]
    fn test_parse_rejects_bad_rows() {
        assert!(ResultRow::parse(TableKind::SingleWire, "m1 subs 0.14").is_err());
        assert!(ResultRow::parse(TableKind::SingleWire, "m1 subs 0.14 abc").is_err());
        let row = ResultRow::parse(TableKind::TwoParallelWires, "m1 m1 0.14 0.39 1e-11 2e-11").unwrap();
        assert_eq!(row.params, vec![0.14, 0.39]);
        assert_eq!(row.value(TableKind::TwoParallelWires, "Ccoup"), Some(2e-11));
    }

    #[test]
    fn test_open_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = ResultTable::open(dir.path().join("none.txt"), TableKind::SingleWire).unwrap();
        assert!(table.is_empty());
        assert!(ResultTable::read(dir.path().join("none.txt"), TableKind::SingleWire).is_err());
    }

    #[test]
    fn test_append_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fringe").join("m1_subs.txt");

        let mut table = ResultTable::open(&path, TableKind::SingleWire).unwrap();
        table
            .append(ResultRow::new("m1", "subs", vec![0.14], vec![4.1e-11]))
            .unwrap();
        table
            .append(ResultRow::new("m1", "subs", vec![1.4], vec![9.3e-11]))
            .unwrap();
        assert_eq!(table.len(), 2);

        let reopened = ResultTable::open(&path, TableKind::SingleWire).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains(&RowKey::new("m1", "subs", &[1.4])));
        assert!(!reopened.contains(&RowKey::new("m1", "subs", &[2.8])));
    }

    #[test]
    fn test_append_rejects_wrong_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = ResultTable::open(dir.path().join("t.txt"), TableKind::TwoParallelWires).unwrap();
        let result = table.append(ResultRow::new("m1", "m1", vec![0.14], vec![1e-11]));
        assert!(matches!(result, Err(Error::Table { .. })));
    }

    #[test]
    fn test_truncated_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m1_m1.txt");
        std::fs::write(&path, "m1 m1 0.1400 0.1400 3.1e-11 1.4e-10\nm1 m1 0.1400 0.3900 3.").unwrap();

        let mut table = ResultTable::open(&path, TableKind::TwoParallelWires).unwrap();
        assert_eq!(table.len(), 1);
        table
            .append(ResultRow::new("m1", "m1", vec![0.14, 0.39], vec![3.2e-11, 8.5e-11]))
            .unwrap();

        let reopened = ResultTable::open(&path, TableKind::TwoParallelWires).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains(&RowKey::new("m1", "m1", &[0.14, 0.39])));
    }

    #[test]
    fn test_torn_row_with_every_column_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m1_subs.txt");
        // 4.1826e-11 cut short by an interrupted write
        std::fs::write(&path, "m1 subs 1.4000 9.3e-11\nm1 subs 0.1400 4.1826e-1").unwrap();

        let key = RowKey::new("m1", "subs", &[0.14]);
        let mut table = ResultTable::open(&path, TableKind::SingleWire).unwrap();
        assert_eq!(table.len(), 1);
        assert!(!table.contains(&key));

        table
            .append(ResultRow::new("m1", "subs", vec![0.14], vec![4.1826e-11]))
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "m1 subs 1.4000 9.3e-11\nm1 subs 0.1400 4.1826e-11\n"
        );

        let reopened = ResultTable::open(&path, TableKind::SingleWire).unwrap();
        assert_eq!(reopened.len(), 2);
        let row = reopened.rows().iter().find(|r| r.key() == key).unwrap();
        assert_eq!(row.values, vec![4.1826e-11]);
    }

    #[test]
    fn test_torn_only_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m1_subs.txt");
        std::fs::write(&path, "m1 subs 0.1400 4.18").unwrap();

        let mut table = ResultTable::open(&path, TableKind::SingleWire).unwrap();
        assert!(table.is_empty());
        table
            .append(ResultRow::new("m1", "subs", vec![0.14], vec![4.1826e-11]))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "m1 subs 0.1400 4.1826e-11\n");
    }
}
