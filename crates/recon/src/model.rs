use std::collections::{BTreeMap, BTreeSet};

use keros_engine::Table;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Column name -> value, as the grid reports it.
pub type CellChanges = BTreeMap<String, serde_json::Value>;

/// What one grid reports for one View. Positions are grid positions, not
/// master positions. Accepts the grid widget's own field names as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditDelta {
    #[serde(default, alias = "edited_rows")]
    pub modified: BTreeMap<usize, CellChanges>,
    #[serde(default, alias = "added_rows")]
    pub appended: Vec<CellChanges>,
    #[serde(default, alias = "deleted_rows")]
    pub removed: BTreeSet<usize>,
}

impl EditDelta {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.appended.is_empty() && self.removed.is_empty()
    }

    pub fn modify(mut self, position: usize, column: &str, value: serde_json::Value) -> Self {
        self.modified
            .entry(position)
            .or_default()
            .insert(column.to_string(), value);
        self
    }

    pub fn append(mut self, row: CellChanges) -> Self {
        self.appended.push(row);
        self
    }

    pub fn remove(mut self, position: usize) -> Self {
        self.removed.insert(position);
        self
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub modified_cells: usize,
    pub appended_rows: usize,
    pub removed_rows: usize,
    /// Cells written by more than one View; the later View won.
    pub overlapping_writes: usize,
    /// Edits dropped because the same save also removed the row.
    pub skipped_on_removed: usize,
    pub created_columns: Vec<String>,
}

impl ReconSummary {
    pub fn is_noop(&self) -> bool {
        self.modified_cells == 0 && self.appended_rows == 0 && self.removed_rows == 0
    }
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub table: Table,
    pub summary: ReconSummary,
}
