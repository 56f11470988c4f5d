//! Views: filtered projections of the Master Table bound to one grid.
//!
//! A View maps between two spaces:
//! - grid space (position 0..len in the rendered, possibly sorted grid)
//! - key space (the `RowKey` of the master row shown at that position)
//!
//! The key list is captured once at render time. Grids report edits in grid
//! space, and the capture is the only thing allowed to translate them.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::table::{RowKey, Table};

pub const ALL_AREAS: &str = "All Areas";
pub const ALL_TRENCHES: &str = "All";

// =============================================================================
// Row filters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Trimmed, ASCII case-insensitive
    Eq,
    NotEq,
    Contains,
    /// Cell text exactly as stored
    Exact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParseError {
    pub expr: String,
    pub reason: &'static str,
}

impl std::fmt::Display for FilterParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid filter {:?}: {}", self.expr, self.reason)
    }
}

impl std::error::Error for FilterParseError {}

impl RowFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self { column: column.into(), op: FilterOp::Eq, value: value.into() }
    }

    pub fn contains(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self { column: column.into(), op: FilterOp::Contains, value: value.into() }
    }

    pub fn exact(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self { column: column.into(), op: FilterOp::Exact, value: value.into() }
    }

    /// Parse `Column=value`, `Column==value`, `Column!=value` or `Column~value`.
    pub fn parse(expr: &str) -> Result<Self, FilterParseError> {
        let err = |reason| FilterParseError { expr: expr.to_string(), reason };

        let (column, op, raw) = if let Some(pos) = expr.find("!=") {
            (&expr[..pos], FilterOp::NotEq, &expr[pos + 2..])
        } else if let Some(pos) = expr.find("==") {
            (&expr[..pos], FilterOp::Exact, &expr[pos + 2..])
        } else if let Some(pos) = expr.find('~') {
            (&expr[..pos], FilterOp::Contains, &expr[pos + 1..])
        } else if let Some(pos) = expr.find('=') {
            (&expr[..pos], FilterOp::Eq, &expr[pos + 1..])
        } else {
            return Err(err("expected 'Column=value', 'Column==value', 'Column!=value' or 'Column~value'"));
        };

        let column = column.trim();
        if column.is_empty() {
            return Err(err("empty column name"));
        }

        let value = raw.trim();
        let value = if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            &value[1..value.len() - 1]
        } else {
            value
        };

        Ok(Self { column: column.to_string(), op, value: value.to_string() })
    }

    /// Whether the row at `position` passes this filter.
    pub fn matches(&self, table: &Table, position: usize) -> bool {
        let Some(col) = table.column_index(&self.column) else {
            return self.op == FilterOp::NotEq;
        };
        let raw = table.rows()[position].cells[col].display();
        let cell = raw.trim();
        match self.op {
            FilterOp::Exact => raw == self.value.as_str(),
            FilterOp::Eq => cell.eq_ignore_ascii_case(self.value.trim()),
            FilterOp::NotEq => !cell.eq_ignore_ascii_case(self.value.trim()),
            FilterOp::Contains => cell.to_lowercase().contains(&self.value.to_lowercase()),
        }
    }
}

impl std::fmt::Display for RowFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.op {
            FilterOp::Eq => "=",
            FilterOp::NotEq => "!=",
            FilterOp::Contains => "~",
            FilterOp::Exact => "==",
        };
        write!(f, "{}{}{}", self.column, op, self.value)
    }
}

/// Boolean mask over master positions: true where every filter passes.
pub fn filter_mask(table: &Table, filters: &[RowFilter]) -> Vec<bool> {
    (0..table.len())
        .map(|pos| filters.iter().all(|f| f.matches(table, pos)))
        .collect()
}

// =============================================================================
// View
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub filters: Vec<RowFilter>,
    /// Grid position -> master key, captured at render time
    row_keys: Vec<RowKey>,
}

impl View {
    /// Apply `filters` to `table` and capture the surviving keys in master order.
    pub fn render(name: impl Into<String>, table: &Table, filters: Vec<RowFilter>) -> Self {
        let mask = filter_mask(table, &filters);
        let row_keys = table
            .rows()
            .iter()
            .zip(mask)
            .filter_map(|(row, keep)| keep.then_some(row.key))
            .collect();
        Self { name: name.into(), filters, row_keys }
    }

    /// Rebuild a View from a previously captured key list.
    pub fn from_parts(name: impl Into<String>, filters: Vec<RowFilter>, row_keys: Vec<RowKey>) -> Self {
        Self { name: name.into(), filters, row_keys }
    }

    /// Re-sort the capture by a column, as a grid header click would.
    /// Stable; leading numbers compare numerically, so trench "2" sorts before "10".
    pub fn sorted_by(mut self, table: &Table, column: &str, descending: bool) -> Self {
        let Some(col) = table.column_index(column) else {
            return self;
        };
        let sort_key = |key: &RowKey| {
            let text = table
                .get(*key, col)
                .map(|v| v.to_cell_string())
                .unwrap_or_default();
            (leading_number(&text), text.to_lowercase())
        };
        self.row_keys.sort_by(|a, b| {
            let ord = compare_keys(&sort_key(a), &sort_key(b));
            if descending { ord.reverse() } else { ord }
        });
        self
    }

    pub fn len(&self) -> usize {
        self.row_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_keys.is_empty()
    }

    pub fn row_keys(&self) -> &[RowKey] {
        &self.row_keys
    }

    /// Translate a grid position to a master key.
    pub fn key_at(&self, position: usize) -> Option<RowKey> {
        self.row_keys.get(position).copied()
    }

    /// Column values implied by the View's equality filters. New rows added
    /// through this View inherit them.
    pub fn defaults(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .filter(|f| matches!(f.op, FilterOp::Eq | FilterOp::Exact))
            .map(|f| (f.column.clone(), f.value.clone()))
            .collect()
    }

    /// Master positions of the captured rows, in grid order. Keys that no
    /// longer exist are skipped.
    pub fn positions<'a>(&'a self, table: &'a Table) -> impl Iterator<Item = usize> + 'a {
        self.row_keys.iter().filter_map(|k| table.position_of(*k))
    }
}

fn leading_number(s: &str) -> Option<OrderedFloat<f64>> {
    let s = s.trim();
    let end = s
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*c == '.' && *i > 0))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    s[..end].trim_end_matches('.').parse::<f64>().ok().map(OrderedFloat)
}

fn compare_keys(
    a: &(Option<OrderedFloat<f64>>, String),
    b: &(Option<OrderedFloat<f64>>, String),
) -> Ordering {
    match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.1.cmp(&b.1)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    }
}

// =============================================================================
// Tabs
// =============================================================================

/// `All Areas` followed by every distinct area, sorted.
pub fn area_tabs(table: &Table, area_col: &str) -> Vec<String> {
    std::iter::once(ALL_AREAS.to_string())
        .chain(table.unique_values(area_col))
        .collect()
}

/// `All` followed by the distinct trenches visible in `view`.
pub fn trench_options(table: &Table, view: &View, trench_col: &str) -> Vec<String> {
    let Some(col) = table.column_index(trench_col) else {
        return vec![ALL_TRENCHES.to_string()];
    };
    let mut trenches: Vec<String> = view
        .positions(table)
        .map(|pos| table.rows()[pos].cells[col].to_cell_string())
        .filter(|t| !t.trim().is_empty())
        .collect();
    trenches.sort();
    trenches.dedup();
    std::iter::once(ALL_TRENCHES.to_string()).chain(trenches).collect()
}

/// Filters for an area tab plus an optional trench selection. Matching is
/// exact, so each tab holds the rows `area_tabs` listed it for.
pub fn tab_filters(area_col: &str, tab: &str, trench_col: &str, trench: Option<&str>) -> Vec<RowFilter> {
    let mut filters = Vec::new();
    if tab != ALL_AREAS {
        filters.push(RowFilter::exact(area_col, tab));
    }
    if let Some(t) = trench.filter(|t| *t != ALL_TRENCHES) {
        filters.push(RowFilter::exact(trench_col, t));
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Schema;
    use crate::value::Value;

    fn table() -> Table {
        let rows = [
            ["Kavos", "10", "Pot deposit"],
            ["SDS", "2", "Wall collapse"],
            ["Kavos", "2", "Floor"],
            ["Dhaskalio", "A1", "pot sherds"],
        ];
        Table::from_records(
            vec!["Area".into(), "Trench".into(), "Name".into()],
            rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
            &Schema::new(),
        )
    }

    #[test]
    fn parse_operators() {
        let f = RowFilter::parse("Area=Kavos").unwrap();
        assert_eq!(f, RowFilter::eq("Area", "Kavos"));

        let f = RowFilter::parse("Name ~ 'pot'").unwrap();
        assert_eq!(f.op, FilterOp::Contains);
        assert_eq!(f.value, "pot");

        let f = RowFilter::parse("Area!=SDS").unwrap();
        assert_eq!(f.op, FilterOp::NotEq);
        assert_eq!(f.to_string(), "Area!=SDS");

        let f = RowFilter::parse("Area==Kavos").unwrap();
        assert_eq!(f, RowFilter::exact("Area", "Kavos"));
        assert_eq!(f.to_string(), "Area==Kavos");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(RowFilter::parse("Kavos").is_err());
        assert!(RowFilter::parse("=Kavos").is_err());
    }

    #[test]
    fn render_captures_master_order() {
        let t = table();
        let v = View::render("Kavos", &t, vec![RowFilter::eq("Area", "kavos")]);
        assert_eq!(v.row_keys(), &[RowKey(0), RowKey(2)]);
        assert_eq!(v.key_at(1), Some(RowKey(2)));
        assert_eq!(v.key_at(2), None);
    }

    #[test]
    fn contains_is_case_insensitive() {
        let t = table();
        let v = View::render("search", &t, vec![RowFilter::contains("Name", "POT")]);
        assert_eq!(v.row_keys(), &[RowKey(0), RowKey(3)]);
    }

    #[test]
    fn filter_on_missing_column() {
        let t = table();
        assert!(View::render("x", &t, vec![RowFilter::eq("Nope", "1")]).is_empty());
        let all = View::render("x", &t, vec![RowFilter::parse("Nope!=1").unwrap()]);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn sort_is_numeric_aware() {
        let t = table();
        let v = View::render("all", &t, Vec::new()).sorted_by(&t, "Trench", false);
        assert_eq!(v.row_keys(), &[RowKey(1), RowKey(2), RowKey(0), RowKey(3)]);

        let v = v.sorted_by(&t, "Trench", true);
        assert_eq!(v.key_at(0), Some(RowKey(3)));
    }

    #[test]
    fn tabs_and_trench_options() {
        let t = table();
        assert_eq!(area_tabs(&t, "Area"), vec![ALL_AREAS, "Dhaskalio", "Kavos", "SDS"]);

        let kavos = View::render("Kavos", &t, tab_filters("Area", "Kavos", "Trench", None));
        assert_eq!(trench_options(&t, &kavos, "Trench"), vec!["All", "10", "2"]);
    }

    #[test]
    fn tabs_match_area_exactly() {
        let mut t = table();
        t.push_row(vec![Value::Text("KAVOS".into()), Value::Text("3".into())]);
        t.push_row(vec![Value::Text("Kavos ".into()), Value::Text("4".into())]);

        let tabs = area_tabs(&t, "Area");
        assert_eq!(tabs, vec![ALL_AREAS, "Dhaskalio", "KAVOS", "Kavos", "Kavos ", "SDS"]);
        for tab in &tabs[1..] {
            let v = View::render(tab.clone(), &t, tab_filters("Area", tab, "Trench", None));
            assert!(v.positions(&t).all(|p| t.text_at(p, "Area") == *tab), "tab {tab:?}");
        }

        let kavos = View::render("Kavos", &t, tab_filters("Area", "Kavos", "Trench", None));
        assert_eq!(kavos.row_keys(), &[RowKey(0), RowKey(2)]);

        // --where stays forgiving
        let loose = View::render("w", &t, vec![RowFilter::parse("Area=kavos").unwrap()]);
        assert_eq!(loose.len(), 4);
    }

    #[test]
    fn tab_filters_skip_all() {
        assert!(tab_filters("Area", ALL_AREAS, "Trench", Some(ALL_TRENCHES)).is_empty());
        let f = tab_filters("Area", "SDS", "Trench", Some("2"));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn defaults_come_from_equality_filters() {
        let v = View::from_parts(
            "Kavos",
            vec![RowFilter::eq("Area", "Kavos"), RowFilter::contains("Name", "pot")],
            Vec::new(),
        );
        assert_eq!(v.defaults(), vec![("Area".to_string(), "Kavos".to_string())]);
    }
}
