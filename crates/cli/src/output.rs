// Text and JSON rendering of register rows

use keros_engine::{Table, View};
use serde_json::{Map, Value as Json};
use unicode_width::UnicodeWidthStr;

use crate::register::{StatsReport, TabInfo};

const MAX_CELL_WIDTH: usize = 40;

/// Grid rows as an aligned text table. The first column is the grid position
/// deltas refer to.
pub fn grid_text(table: &Table, view: &View) -> String {
    let headers = table.headers();
    let mut lines: Vec<Vec<String>> = Vec::with_capacity(view.len() + 1);

    let mut header = vec!["#".to_string()];
    header.extend(headers.iter().cloned());
    lines.push(header);

    for (grid_pos, pos) in view.positions(table).enumerate() {
        let mut line = vec![grid_pos.to_string()];
        line.extend(table.rows()[pos].cells.iter().map(|c| clip(&c.display())));
        lines.push(line);
    }

    let columns = headers.len() + 1;
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            lines
                .iter()
                .filter_map(|l| l.get(i))
                .map(|s| UnicodeWidthStr::width(s.as_str()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for line in &lines {
        let mut rendered = String::new();
        for (i, cell) in line.iter().enumerate() {
            if i > 0 {
                rendered.push_str("  ");
            }
            rendered.push_str(cell);
            let pad = widths[i].saturating_sub(UnicodeWidthStr::width(cell.as_str()));
            rendered.extend(std::iter::repeat(' ').take(pad));
        }
        out.push_str(rendered.trim_end());
        out.push('\n');
    }
    out
}

fn clip(s: &str) -> String {
    let single_line = s.replace(['\r', '\n'], " ");
    if UnicodeWidthStr::width(single_line.as_str()) <= MAX_CELL_WIDTH {
        return single_line;
    }
    let mut clipped = String::new();
    let mut width = 0;
    for ch in single_line.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + w > MAX_CELL_WIDTH - 1 {
            break;
        }
        clipped.push(ch);
        width += w;
    }
    clipped.push('…');
    clipped
}

/// Grid rows as JSON objects: `position`, `key`, then every column.
pub fn grid_json(table: &Table, view: &View) -> Json {
    let columns = table.columns();
    let rows = view
        .positions(table)
        .enumerate()
        .map(|(grid_pos, pos)| {
            let row = &table.rows()[pos];
            let mut obj = Map::new();
            obj.insert("position".into(), Json::from(grid_pos));
            obj.insert("key".into(), Json::from(row.key.0));
            for (col, cell) in columns.iter().zip(&row.cells) {
                obj.insert(col.name.clone(), cell.to_json());
            }
            Json::Object(obj)
        })
        .collect();
    Json::Array(rows)
}

pub fn stats_text(report: &StatsReport) -> String {
    let mut out = String::new();
    for year in &report.years {
        out.push_str(&format!("{}\n", year.year));
        if year.counts.is_empty() {
            out.push_str("  (no entries)\n");
        }
        let width = year
            .counts
            .iter()
            .map(|c| UnicodeWidthStr::width(c.area_trench.as_str()))
            .max()
            .unwrap_or(0);
        for c in &year.counts {
            let pad = width - UnicodeWidthStr::width(c.area_trench.as_str());
            out.push_str(&format!("  {}{}  {}\n", c.area_trench, " ".repeat(pad), c.count));
        }
    }
    out.push_str("Totals\n");
    for t in &report.totals {
        let area = if t.area.is_empty() { "(blank)" } else { t.area.as_str() };
        out.push_str(&format!("  {area}: {}\n", t.total));
    }
    out
}

pub fn tabs_text(tabs: &[TabInfo]) -> String {
    tabs.iter()
        .map(|t| format!("{} ({}): {}\n", t.tab, t.rows, t.trenches.join(", ")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keros_engine::{RowFilter, Schema};

    fn table() -> Table {
        Table::from_records(
            vec!["Area".into(), "Name".into()],
            vec![
                vec!["Kavos".into(), "L1".into()],
                vec!["Dhaskalio".into(), "Κέρος".into()],
            ],
            &Schema::new(),
        )
    }

    #[test]
    fn grid_text_aligns_columns() {
        let t = table();
        let v = View::render("All Areas", &t, Vec::new());
        assert_eq!(
            grid_text(&t, &v),
            "#  Area       Name\n0  Kavos      L1\n1  Dhaskalio  Κέρος\n"
        );
    }

    #[test]
    fn grid_positions_are_view_relative() {
        let t = table();
        let v = View::render("Dhaskalio", &t, vec![RowFilter::eq("Area", "Dhaskalio")]);
        let json = grid_json(&t, &v);
        assert_eq!(json[0]["position"], 0);
        assert_eq!(json[0]["key"], 1);
        assert_eq!(json[0]["Name"], "Κέρος");
    }

    #[test]
    fn long_cells_are_clipped() {
        let long = "x".repeat(100);
        let c = clip(&long);
        assert_eq!(UnicodeWidthStr::width(c.as_str()), MAX_CELL_WIDTH);
        assert!(c.ends_with('…'));
        assert_eq!(clip("a\nb"), "a b");
    }
}
