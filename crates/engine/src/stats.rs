use std::collections::BTreeMap;

use serde::Serialize;

use crate::table::Table;
use crate::view::View;

/// Rows per `Area | Trench` for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrenchCount {
    pub area_trench: String,
    pub area: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaTotal {
    pub area: String,
    pub total: usize,
}

/// Which columns the counts are read from.
#[derive(Debug, Clone, Copy)]
pub struct StatColumns<'a> {
    pub date: &'a str,
    pub area: &'a str,
    pub trench: &'a str,
}

/// Count the View's rows whose date text contains `year`, grouped by
/// `(Area | Trench, Area)`. Sorted by area, then label.
pub fn trench_counts(table: &Table, view: &View, cols: StatColumns<'_>, year: &str) -> Vec<TrenchCount> {
    let mut groups: BTreeMap<(String, String), usize> = BTreeMap::new();

    for pos in view.positions(table) {
        if !table.text_at(pos, cols.date).contains(year) {
            continue;
        }
        let area = table.text_at(pos, cols.area);
        let label = format!("{} | {}", area, table.text_at(pos, cols.trench));
        *groups.entry((area, label)).or_insert(0) += 1;
    }

    groups
        .into_iter()
        .map(|((area, area_trench), count)| TrenchCount { area_trench, area, count })
        .collect()
}

/// Row count per area across the whole View.
pub fn area_totals(table: &Table, view: &View, area_col: &str) -> Vec<AreaTotal> {
    let mut totals: BTreeMap<String, usize> = BTreeMap::new();
    for pos in view.positions(table) {
        *totals.entry(table.text_at(pos, area_col)).or_insert(0) += 1;
    }
    totals
        .into_iter()
        .map(|(area, total)| AreaTotal { area, total })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Schema;
    use crate::view::RowFilter;

    const COLS: StatColumns<'static> = StatColumns { date: "Date", area: "Area", trench: "Trench" };

    fn table() -> Table {
        let rows = [
            ["01.07.2025", "Kavos", "1"],
            ["02.07.2025", "Kavos", "1"],
            ["02.07.2025", "Kavos", "3"],
            ["10.06.2026", "Kavos", "1"],
            ["11.06.2026", "SDS", "B"],
            ["", "SDS", "B"],
        ];
        Table::from_records(
            vec!["Date".into(), "Area".into(), "Trench".into()],
            rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
            &Schema::new(),
        )
    }

    #[test]
    fn counts_per_year() {
        let t = table();
        let all = View::render("all", &t, Vec::new());

        let y25 = trench_counts(&t, &all, COLS, "2025");
        assert_eq!(
            y25,
            vec![
                TrenchCount { area_trench: "Kavos | 1".into(), area: "Kavos".into(), count: 2 },
                TrenchCount { area_trench: "Kavos | 3".into(), area: "Kavos".into(), count: 1 },
            ]
        );

        let y26 = trench_counts(&t, &all, COLS, "2026");
        assert_eq!(y26.len(), 2);
        assert_eq!(y26[1].area_trench, "SDS | B");

        assert!(trench_counts(&t, &all, COLS, "2016").is_empty());
    }

    #[test]
    fn counts_respect_the_view() {
        let t = table();
        let sds = View::render("SDS", &t, vec![RowFilter::eq("Area", "SDS")]);
        let y26 = trench_counts(&t, &sds, COLS, "2026");
        assert_eq!(y26.len(), 1);
        assert_eq!(y26[0].count, 1);
    }

    #[test]
    fn totals_per_area() {
        let t = table();
        let all = View::render("all", &t, Vec::new());
        assert_eq!(
            area_totals(&t, &all, "Area"),
            vec![
                AreaTotal { area: "Kavos".into(), total: 4 },
                AreaTotal { area: "SDS".into(), total: 2 },
            ]
        );
    }
}
