//! Result caches.
//!
//! A cache answers one question before each solver call: has this exact
//! parameter tuple been solved already? Rows go in one at a time and are
//! never rewritten.

use std::collections::HashSet;

use capiche_core::{ResultRow, ResultTable, RowKey, TableKind};

use crate::error::Result;

/// Append-only store of solved sweep points.
pub trait ResultCache {
    /// Column layout of the rows this cache holds.
    fn kind(&self) -> TableKind;

    fn contains(&self, key: &RowKey) -> bool;

    /// Store one row durably before returning.
    fn append(&mut self, row: ResultRow) -> Result<()>;

    fn rows(&self) -> &[ResultRow];
}

impl ResultCache for ResultTable {
    fn kind(&self) -> TableKind {
        ResultTable::kind(self)
    }

    fn contains(&self, key: &RowKey) -> bool {
        ResultTable::contains(self, key)
    }

    fn append(&mut self, row: ResultRow) -> Result<()> {
        ResultTable::append(self, row)?;
        Ok(())
    }

    fn rows(&self) -> &[ResultRow] {
        ResultTable::rows(self)
    }
}

/// Cache kept in memory only.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    kind: TableKind,
    rows: Vec<ResultRow>,
    keys: HashSet<RowKey>,
}

impl MemoryCache {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Drop the row with this key, if present.
    pub fn remove(&mut self, key: &RowKey) -> Option<ResultRow> {
        if !self.keys.remove(key) {
            return None;
        }
        let index = self.rows.iter().position(|r| r.key() == *key)?;
        Some(self.rows.remove(index))
    }
}

impl ResultCache for MemoryCache {
    fn kind(&self) -> TableKind {
        self.kind
    }

    fn contains(&self, key: &RowKey) -> bool {
        self.keys.contains(key)
    }

    fn append(&mut self, row: ResultRow) -> Result<()> {
        if self.keys.insert(row.key()) {
            self.rows.push(row);
        }
        Ok(())
    }

    fn rows(&self) -> &[ResultRow] {
        &self.rows
    }
}
