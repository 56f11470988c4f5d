use std::collections::{BTreeSet, HashMap};

use keros_engine::{ColumnKind, RowKey, Table, Value, View};

use crate::error::ReconError;
use crate::model::{CellChanges, EditDelta, ReconSummary, Reconciled};

/// A modified entry after its grid position was translated to a master key.
struct ResolvedEdit<'a> {
    view: usize,
    key: RowKey,
    changes: &'a CellChanges,
}

/// Fold per-View edit deltas back into one copy of `master`.
///
/// Every grid position is translated through its View's captured keys before
/// the working copy is touched, so a stale View aborts the whole save with no
/// partial result. Deletions are deferred until all edits are applied; appended
/// rows go last, in View order.
pub fn reconcile(master: &Table, views: &[View], deltas: &[EditDelta]) -> Result<Reconciled, ReconError> {
    if views.len() != deltas.len() {
        return Err(ReconError::ViewDeltaMismatch {
            views: views.len(),
            deltas: deltas.len(),
        });
    }

    // Phase 1: resolve positions. No mutation.
    let mut edits = Vec::new();
    let mut removals: BTreeSet<RowKey> = BTreeSet::new();
    let mut appends: Vec<(&View, &CellChanges)> = Vec::new();

    for (vi, (view, delta)) in views.iter().zip(deltas).enumerate() {
        if delta.is_empty() {
            continue;
        }
        for (&position, changes) in &delta.modified {
            let key = resolve(master, view, position)?;
            edits.push(ResolvedEdit { view: vi, key, changes });
        }
        for &position in &delta.removed {
            removals.insert(resolve(master, view, position)?);
        }
        appends.extend(delta.appended.iter().map(|row| (view, row)));
    }

    // Phase 2: apply to the working copy.
    let mut work = master.clone();
    let mut summary = ReconSummary::default();
    let mut written: HashMap<(RowKey, usize), usize> = HashMap::new();

    for edit in &edits {
        if removals.contains(&edit.key) {
            summary.skipped_on_removed += edit.changes.len();
            continue;
        }
        for (column, raw) in edit.changes {
            let col = column_for(&mut work, column, Some(raw), &mut summary);
            let kind = work.columns()[col].kind;
            work.set(edit.key, col, Value::from_json(kind, raw));
            summary.modified_cells += 1;

            if let Some(prev) = written.insert((edit.key, col), edit.view) {
                if prev != edit.view {
                    summary.overlapping_writes += 1;
                    log::warn!(
                        "record {} column '{}' edited in views '{}' and '{}'; keeping '{}'",
                        edit.key,
                        column,
                        views[prev].name,
                        views[edit.view].name,
                        views[edit.view].name,
                    );
                }
            }
        }
    }

    summary.removed_rows = work.remove_keys(&removals);

    for (view, row) in appends {
        append_row(&mut work, view, row, &mut summary);
        summary.appended_rows += 1;
    }

    log::debug!(
        "reconciled {} view(s): {} cells modified, {} rows removed, {} rows appended",
        views.len(),
        summary.modified_cells,
        summary.removed_rows,
        summary.appended_rows,
    );

    Ok(Reconciled { table: work, summary })
}

fn resolve(master: &Table, view: &View, position: usize) -> Result<RowKey, ReconError> {
    let key = view.key_at(position).ok_or_else(|| ReconError::StaleViewReference {
        view: view.name.clone(),
        position,
        len: view.len(),
    })?;
    if !master.contains_key(key) {
        return Err(ReconError::StaleRowKey {
            view: view.name.clone(),
            position,
            key,
        });
    }
    Ok(key)
}

/// Index of `name`, creating the column when the file lacks it.
/// The table's schema decides the kind; failing that, a JSON boolean creates
/// a flag column and anything else creates text.
fn column_for(work: &mut Table, name: &str, sample: Option<&serde_json::Value>, summary: &mut ReconSummary) -> usize {
    if let Some(idx) = work.column_index(name) {
        return idx;
    }
    let kind = match work.schema().get(name) {
        Some(kind) => kind,
        None if sample.is_some_and(|v| v.is_boolean()) => ColumnKind::Bool,
        None => ColumnKind::Text,
    };
    log::info!("creating missing column '{name}' as {kind:?}");
    summary.created_columns.push(name.to_string());
    work.ensure_column(name, kind)
}

/// Build a new row: column defaults, then the View's filter values, then
/// whatever the grid supplied.
fn append_row(work: &mut Table, view: &View, row: &CellChanges, summary: &mut ReconSummary) {
    let defaults = view.defaults();

    for (column, _) in &defaults {
        column_for(work, column, None, summary);
    }
    for (column, raw) in row {
        column_for(work, column, Some(raw), summary);
    }

    let mut cells: Vec<Value> = work
        .columns()
        .iter()
        .map(|c| Value::default_for(c.kind))
        .collect();

    for (column, value) in &defaults {
        if let Some(idx) = work.column_index(column) {
            cells[idx] = Value::coerce(work.columns()[idx].kind, value);
        }
    }
    for (column, raw) in row {
        if let Some(idx) = work.column_index(column) {
            cells[idx] = Value::from_json(work.columns()[idx].kind, raw);
        }
    }

    let key = work.push_row(cells);
    log::debug!("appended record {key} via view '{}'", view.name);
}
