//! Register operations behind the `keros` subcommands.
//!
//! Each operation loads the configured dataset through its store, works on
//! the in-memory table, and (for writes) goes through `reconcile` so that a
//! one-row `add` follows the same path as a full grid save.

use chrono::Utc;
use keros_config::{DatasetConfig, RegisterConfig};
use keros_engine::stats::{self, AreaTotal, TrenchCount};
use keros_engine::view::{self, ALL_AREAS};
use keros_engine::{RowFilter, RowKey, Table, View};
use keros_io::{CachedStore, CsvStore, Snapshot, Store, StoreError, Version};
use keros_recon::{reconcile, CellChanges, EditDelta, ReconSummary};
use serde::Serialize;
use serde_json::json;

use crate::error::CliError;
use crate::session::Session;

pub struct Register {
    config: RegisterConfig,
    dataset: String,
    stat_years: Vec<String>,
    store: CachedStore<CsvStore>,
}

/// Row selection for `show` and `stats`.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub area: Option<String>,
    pub trench: Option<String>,
    /// Substring of the layer name
    pub search: Option<String>,
    /// Raw `--where` expressions
    pub wheres: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewLayer {
    pub area: String,
    pub trench: String,
    pub name: String,
    pub date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Saved {
    pub version: Version,
    pub summary: ReconSummary,
}

#[derive(Debug, Serialize)]
pub struct Added {
    pub key: RowKey,
    pub version: Version,
}

#[derive(Debug, Serialize)]
pub struct YearCounts {
    pub year: String,
    pub counts: Vec<TrenchCount>,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub years: Vec<YearCounts>,
    pub totals: Vec<AreaTotal>,
}

#[derive(Debug, Serialize)]
pub struct TabInfo {
    pub tab: String,
    pub rows: usize,
    pub trenches: Vec<String>,
}

impl Register {
    pub fn open(config: RegisterConfig, dataset: Option<&str>) -> Result<Self, CliError> {
        let name = dataset.unwrap_or(config.default_dataset()).to_string();
        let ds: &DatasetConfig = config.dataset(&name)?;

        let csv = CsvStore::new(config.dataset_path(ds), config.schema(ds)).read_only(ds.read_only);
        let store = CachedStore::new(csv, ds.cache_ttl());
        let stat_years = ds.stat_years.clone();
        log::debug!("dataset '{name}' at {}", store.target());

        Ok(Self { config, dataset: name, stat_years, store })
    }

    pub fn config(&self) -> &RegisterConfig {
        &self.config
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn load(&self) -> Result<Snapshot, CliError> {
        Ok(self.store.load()?)
    }

    // -- render / save -----------------------------------------------------

    /// One View per tab; every area tab when `tabs` is empty.
    pub fn render(&self, table: &Table, tabs: &[String], trench: Option<&str>) -> Result<Vec<View>, CliError> {
        let cols = &self.config.columns;
        let known = view::area_tabs(table, &cols.area);

        let tabs: Vec<String> = if tabs.is_empty() { known.clone() } else { tabs.to_vec() };
        let mut views = Vec::with_capacity(tabs.len());
        for tab in tabs {
            if !known.contains(&tab) && !self.config.areas.contains(&tab) {
                return Err(CliError::args(format!("unknown tab '{tab}'"))
                    .with_hint(format!("tabs: {}", known.join(", "))));
            }
            let filters = view::tab_filters(&cols.area, &tab, &cols.trench, trench);
            views.push(View::render(tab, table, filters));
        }
        Ok(views)
    }

    /// Fold a session's deltas into the register and write it back.
    pub fn save(&self, session: &Session) -> Result<Saved, CliError> {
        if session.dataset != self.dataset {
            return Err(CliError::args(format!(
                "session was rendered from dataset '{}', not '{}'",
                session.dataset, self.dataset
            )));
        }
        session.check_live(Utc::now())?;

        let snap = self.load()?;
        if snap.version != session.base_version {
            return Err(StoreError::VersionConflict {
                target: self.store.target(),
                expected: session.base_version.clone(),
                found: snap.version,
            }
            .into());
        }

        let (views, deltas) = session.split();
        let out = reconcile(&snap.table, &views, &deltas)?;
        if out.summary.overlapping_writes > 0 {
            log::warn!("{} cell(s) were edited in more than one tab", out.summary.overlapping_writes);
        }
        let version = self.store.save(&out.table, &session.base_version)?;
        Ok(Saved { version, summary: out.summary })
    }

    // -- add ---------------------------------------------------------------

    pub fn add(&self, entry: &NewLayer) -> Result<Added, CliError> {
        let area = entry.area.trim();
        let trench = entry.trench.trim();
        let name = entry.name.trim();
        if area.is_empty() || trench.is_empty() || name.is_empty() {
            return Err(CliError::args("area, trench and name are all required"));
        }
        if !self.config.areas.is_empty() && !self.config.areas.iter().any(|a| a == area) {
            return Err(CliError::args(format!("unknown area '{area}'"))
                .with_hint(format!("configured areas: {}", self.config.areas.join(", "))));
        }

        let date = match &entry.date {
            Some(raw) => self.config.parse_date(raw).ok_or_else(|| {
                CliError::args(format!("invalid date '{raw}'"))
                    .with_hint(format!("expected format {}", self.config.date_format))
            })?,
            None => chrono::Local::now().date_naive(),
        };

        let cols = &self.config.columns;
        let mut row = CellChanges::new();
        // A new layer starts with every progress flag unset
        for flag in &cols.flags {
            row.insert(flag.clone(), json!(false));
        }
        row.insert(cols.date.clone(), json!(self.config.format_date(date)));
        row.insert(cols.trench.clone(), json!(trench));
        row.insert(cols.name.clone(), json!(name));
        if let Some(notes) = &entry.notes {
            row.insert(cols.notes.clone(), json!(notes));
        }

        let snap = self.load()?;
        // The area tab supplies the Area value
        let tab = View::render(area, &snap.table, vec![RowFilter::exact(&cols.area, area)]);
        let out = reconcile(&snap.table, &[tab], &[EditDelta::default().append(row)])?;

        let key = out
            .table
            .len()
            .checked_sub(1)
            .and_then(|last| out.table.key_at(last))
            .ok_or_else(|| CliError::general("appended row is missing from the result"))?;
        let version = self.store.save(&out.table, &snap.version)?;
        log::info!("added {key} ({area} | {trench} | {name})");
        Ok(Added { key, version })
    }

    // -- read-only views ---------------------------------------------------

    pub fn filters(&self, query: &Query) -> Result<Vec<RowFilter>, CliError> {
        let cols = &self.config.columns;
        let tab = query.area.as_deref().unwrap_or(ALL_AREAS);
        let mut filters = view::tab_filters(&cols.area, tab, &cols.trench, query.trench.as_deref());

        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            filters.push(RowFilter::contains(&cols.name, search.trim()));
        }
        for expr in &query.wheres {
            let filter = RowFilter::parse(expr).map_err(|e| {
                CliError::args(e.to_string())
                    .with_hint("syntax: 'Column=value', 'Column==exact', 'Column!=value', 'Column~substring'")
            })?;
            filters.push(filter);
        }
        Ok(filters)
    }

    pub fn stats(&self, table: &Table, view: &View) -> StatsReport {
        let cols = self.config.stat_columns();
        let years = self
            .stat_years
            .iter()
            .map(|year| YearCounts {
                year: year.clone(),
                counts: stats::trench_counts(table, view, cols, year),
            })
            .collect();
        StatsReport {
            years,
            totals: stats::area_totals(table, view, &self.config.columns.area),
        }
    }

    pub fn tabs(&self, table: &Table) -> Vec<TabInfo> {
        let cols = &self.config.columns;
        view::area_tabs(table, &cols.area)
            .into_iter()
            .map(|tab| {
                let filters = view::tab_filters(&cols.area, &tab, &cols.trench, None);
                let v = View::render(tab.clone(), table, filters);
                TabInfo {
                    trenches: view::trench_options(table, &v, &cols.trench),
                    rows: v.len(),
                    tab,
                }
            })
            .collect()
    }
}
