//! The Master Table: an ordered, column-typed copy of the register.
//!
//! Rows carry an explicit `RowKey`. Keys are handed out 0..n in load order,
//! so on a fresh load a row's key equals its position. Unlike a position,
//! a key survives deletions and appends elsewhere in the table, which is
//! what lets captured Views be translated safely at save time.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::value::{ColumnKind, Value};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(pub u64);

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Column kinds plus columns to synthesize when the source lacks them.
/// Columns not named here load as text.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    kinds: BTreeMap<String, ColumnKind>,
    fill_missing: Vec<(String, String)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, column: impl Into<String>, kind: ColumnKind) -> Self {
        self.kinds.insert(column.into(), kind);
        self
    }

    pub fn with_fill(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fill_missing.push((column.into(), value.into()));
        self
    }

    pub fn kind_of(&self, column: &str) -> ColumnKind {
        self.get(column).unwrap_or_default()
    }

    /// The configured kind, if the column is named at all.
    pub fn get(&self, column: &str) -> Option<ColumnKind> {
        self.kinds.get(column).copied()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: RowKey,
    pub cells: Vec<Value>,
    /// Fields past the last header, written back verbatim
    pub overflow: Vec<String>,
}

/// A record with no content at all, kept in place for write-back.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Spacer {
    /// Row the spacer follows; `None` before the first row
    after: Option<RowKey>,
    fields: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
    spacers: Vec<Spacer>,
    schema: Schema,
    next_key: u64,
    /// key -> position, rebuilt whenever rows are removed
    index: FxHashMap<RowKey, usize>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.rows == other.rows && self.spacers == other.spacers
    }
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Build a table from raw string records, coercing every cell.
    ///
    /// Short records are padded with the column default. Fields past the
    /// header are kept on the row as overflow. Records with every field empty
    /// are spacers: they hold their place in the output but are not rows.
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<String>>, schema: &Schema) -> Self {
        let columns: Vec<Column> = headers
            .into_iter()
            .map(|name| {
                let kind = schema.kind_of(&name);
                Column { name, kind }
            })
            .collect();

        let mut table = Table { schema: schema.clone(), ..Table::new(columns) };
        for mut record in records {
            if record.iter().all(|f| f.is_empty()) {
                let after = table.rows.last().map(|r| r.key);
                table.spacers.push(Spacer { after, fields: record });
                continue;
            }
            let overflow = record.split_off(record.len().min(table.columns.len()));
            let cells = table
                .columns
                .iter()
                .enumerate()
                .map(|(i, col)| match record.get(i) {
                    Some(raw) => Value::coerce(col.kind, raw),
                    None => Value::default_for(col.kind),
                })
                .collect();
            table.push_row(cells);
            if let Some(row) = table.rows.last_mut() {
                row.overflow = overflow;
            }
        }

        for (column, value) in &schema.fill_missing {
            table.fill_missing(column, value);
        }
        table
    }

    // -- Shape -------------------------------------------------------------

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Kinds the table was loaded with. Columns created later should use them.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Rows carrying fields past the last header.
    pub fn ragged_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| !r.overflow.is_empty())
    }

    pub fn spacer_count(&self) -> usize {
        self.spacers.len()
    }

    /// Return the column's index, appending it (filled with the kind's
    /// default) if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str, kind: ColumnKind) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(Column {
            name: name.to_string(),
            kind,
        });
        let default = Value::default_for(kind);
        for row in &mut self.rows {
            row.cells.push(default.clone());
        }
        self.columns.len() - 1
    }

    /// Create `name` as a text column holding `value` everywhere. No-op when
    /// the column already exists.
    pub fn fill_missing(&mut self, name: &str, value: &str) {
        if self.column_index(name).is_some() {
            return;
        }
        let idx = self.ensure_column(name, ColumnKind::Text);
        for row in &mut self.rows {
            row.cells[idx] = Value::Text(value.to_string());
        }
    }

    // -- Rows --------------------------------------------------------------

    pub fn position_of(&self, key: RowKey) -> Option<usize> {
        self.index.get(&key).copied()
    }

    pub fn contains_key(&self, key: RowKey) -> bool {
        self.index.contains_key(&key)
    }

    pub fn key_at(&self, position: usize) -> Option<RowKey> {
        self.rows.get(position).map(|r| r.key)
    }

    pub fn get(&self, key: RowKey, col: usize) -> Option<&Value> {
        let pos = self.position_of(key)?;
        self.rows[pos].cells.get(col)
    }

    /// Cell text at a position, empty for a missing column.
    pub fn text_at(&self, position: usize, column: &str) -> String {
        self.column_index(column)
            .and_then(|c| self.rows.get(position)?.cells.get(c))
            .map(|v| v.to_cell_string())
            .unwrap_or_default()
    }

    /// Overwrite one cell. Returns false if the key or column is unknown.
    pub fn set(&mut self, key: RowKey, col: usize, value: Value) -> bool {
        let Some(pos) = self.position_of(key) else {
            return false;
        };
        match self.rows[pos].cells.get_mut(col) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Append a row under a fresh key, padding or truncating to the column count.
    pub fn push_row(&mut self, mut cells: Vec<Value>) -> RowKey {
        cells.truncate(self.columns.len());
        for col in &self.columns[cells.len()..] {
            cells.push(Value::default_for(col.kind));
        }
        let key = RowKey(self.next_key);
        self.next_key += 1;
        self.index.insert(key, self.rows.len());
        self.rows.push(Row { key, cells, overflow: Vec::new() });
        key
    }

    /// Delete every row whose key is in `keys`. Returns how many were removed.
    pub fn remove_keys(&mut self, keys: &BTreeSet<RowKey>) -> usize {
        self.reanchor_spacers(keys);
        let before = self.rows.len();
        self.rows.retain(|r| !keys.contains(&r.key));
        self.rebuild_index();
        before - self.rows.len()
    }

    /// Spacers following a removed row move up to the nearest surviving row.
    fn reanchor_spacers(&mut self, removed: &BTreeSet<RowKey>) {
        if self.spacers.is_empty() {
            return;
        }
        let mut moved: FxHashMap<RowKey, Option<RowKey>> = FxHashMap::default();
        let mut last_kept = None;
        for row in &self.rows {
            if removed.contains(&row.key) {
                moved.insert(row.key, last_kept);
            } else {
                last_kept = Some(row.key);
            }
        }
        for spacer in &mut self.spacers {
            if let Some(to) = spacer.after.and_then(|k| moved.get(&k)) {
                spacer.after = *to;
            }
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(pos, row)| (row.key, pos))
            .collect();
    }

    /// Sorted distinct non-empty values of a column.
    pub fn unique_values(&self, column: &str) -> Vec<String> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        let set: BTreeSet<String> = self
            .rows
            .iter()
            .map(|r| r.cells[idx].to_cell_string())
            .filter(|s| !s.trim().is_empty())
            .collect();
        set.into_iter().collect()
    }

    /// Headers and canonical cell strings, ready for write-back. Spacers
    /// and overflow fields come back where they were read.
    pub fn to_records(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let spacers_after = |anchor: Option<RowKey>| {
            self.spacers
                .iter()
                .filter(move |s| s.after == anchor)
                .map(|s| s.fields.clone())
        };

        let mut records = Vec::with_capacity(self.rows.len() + self.spacers.len());
        records.extend(spacers_after(None));
        for row in &self.rows {
            let mut record: Vec<String> = row.cells.iter().map(Value::to_cell_string).collect();
            record.extend(row.overflow.iter().cloned());
            records.push(record);
            records.extend(spacers_after(Some(row.key)));
        }
        (self.headers(), records)
    }
}
