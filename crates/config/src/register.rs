// Register configuration
// Loaded from keros.toml: --config, then $KEROS_CONFIG, then ~/.config/keros/keros.toml

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use keros_engine::stats::StatColumns;
use keros_engine::{ColumnKind, Schema};
use serde::Deserialize;

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "KEROS_CONFIG";
const CONFIG_FILE: &str = "keros.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// strftime pattern the Date column is written in
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Known excavation areas, in tab order
    #[serde(default)]
    pub areas: Vec<String>,
    #[serde(default)]
    pub columns: ColumnNames,
    pub datasets: BTreeMap<String, DatasetConfig>,
    /// Directory the config was loaded from; dataset paths resolve against it
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

fn default_name() -> String {
    "Photogrammetry Register".into()
}

fn default_date_format() -> String {
    "%d.%m.%Y".into()
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub date: String,
    pub area: String,
    pub trench: String,
    pub name: String,
    pub notes: String,
    /// Boolean progress columns
    pub flags: Vec<String>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            date: "Date".into(),
            area: "Area".into(),
            trench: "Trench".into(),
            name: "Name".into(),
            notes: "Notes".into(),
            flags: vec!["Complete".into(), "Model Cropped".into(), "GIS uploaded".into()],
        }
    }
}

impl ColumnNames {
    fn core(&self) -> [(&'static str, &str); 5] {
        [
            ("date", &self.date),
            ("area", &self.area),
            ("trench", &self.trench),
            ("name", &self.name),
            ("notes", &self.notes),
        ]
    }
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub file: PathBuf,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Years the statistics view reports on
    #[serde(default)]
    pub stat_years: Vec<String>,
    /// Columns older exports lack, synthesized on load with a fixed value
    #[serde(default)]
    pub fill_missing: BTreeMap<String, String>,
}

fn default_cache_ttl() -> u64 {
    600
}

impl DatasetConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RegisterConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: RegisterConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml(&input)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datasets.is_empty() {
            return Err(ConfigError::Validation("at least one dataset is required".into()));
        }

        for (field, name) in self.columns.core() {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(format!("columns.{field} must not be empty")));
            }
        }

        let core: BTreeSet<&str> = self.columns.core().into_iter().map(|(_, n)| n).collect();
        if core.len() != 5 {
            return Err(ConfigError::Validation("core column names must be distinct".into()));
        }

        let mut seen = BTreeSet::new();
        for flag in &self.columns.flags {
            if flag.trim().is_empty() {
                return Err(ConfigError::Validation("flag column names must not be empty".into()));
            }
            if core.contains(flag.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "flag column '{flag}' is also a core column"
                )));
            }
            if !seen.insert(flag.as_str()) {
                return Err(ConfigError::Validation(format!("flag column '{flag}' listed twice")));
            }
        }

        // Must render a full date and read it back
        let today = chrono::Local::now().date_naive();
        let mut rendered = String::new();
        if write!(rendered, "{}", today.format(&self.date_format)).is_err()
            || NaiveDate::parse_from_str(&rendered, &self.date_format).ok() != Some(today)
        {
            return Err(ConfigError::Validation(format!(
                "date_format '{}' does not describe a full date",
                self.date_format
            )));
        }

        let mut areas = BTreeSet::new();
        for area in &self.areas {
            if area.trim().is_empty() || !areas.insert(area.as_str()) {
                return Err(ConfigError::Validation(format!("invalid or duplicate area '{area}'")));
            }
        }

        for (name, dataset) in &self.datasets {
            if dataset.file.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!("datasets.{name}.file must not be empty")));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl RegisterConfig {
    /// `current` when configured, else the first dataset by name.
    pub fn default_dataset(&self) -> &str {
        if self.datasets.contains_key("current") {
            return "current";
        }
        self.datasets.keys().next().map(String::as_str).unwrap_or("current")
    }

    pub fn dataset(&self, name: &str) -> Result<&DatasetConfig, ConfigError> {
        self.datasets.get(name).ok_or_else(|| ConfigError::UnknownDataset {
            name: name.to_string(),
            known: self.datasets.keys().cloned().collect(),
        })
    }

    pub fn dataset_path(&self, dataset: &DatasetConfig) -> PathBuf {
        match &self.base_dir {
            Some(dir) if dataset.file.is_relative() => dir.join(&dataset.file),
            _ => dataset.file.clone(),
        }
    }

    /// Column kinds and fills for loading `dataset`.
    pub fn schema(&self, dataset: &DatasetConfig) -> Schema {
        let mut schema = Schema::new().with_kind(self.columns.date.clone(), ColumnKind::Date);
        for flag in &self.columns.flags {
            schema = schema.with_kind(flag.clone(), ColumnKind::Bool);
        }
        for (column, value) in &dataset.fill_missing {
            schema = schema.with_fill(column.clone(), value.clone());
        }
        schema
    }

    pub fn stat_columns(&self) -> StatColumns<'_> {
        StatColumns {
            date: &self.columns.date,
            area: &self.columns.area,
            trench: &self.columns.trench,
        }
    }

    pub fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw.trim(), &self.date_format).ok()
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        // validate() guarantees the format renders
        let _ = write!(out, "{}", date.format(&self.date_format));
        out
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Find the config file: explicit path, then `$KEROS_CONFIG`, then the user
/// config directory.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    resolve_location(
        explicit,
        std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        dirs::config_dir(),
    )
}

fn resolve_location(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    // An explicit path is used as given, so the read error names it
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let mut searched = Vec::new();
    let candidates = from_env
        .into_iter()
        .chain(config_dir.map(|d| d.join("keros").join(CONFIG_FILE)));
    for path in candidates {
        if path.is_file() {
            return Ok(path);
        }
        searched.push(path);
    }
    Err(ConfigError::NotFound { searched })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KEROS: &str = r#"
name = "Keros Photogrammetry"
areas = ["Dhaskalio", "Kavos", "Polygon2", "SDS", "Konakia"]

[columns]
flags = ["Complete", "Model Cropped", "GIS uploaded"]

[datasets.current]
file = "register-2026.csv"
stat_years = ["2025", "2026"]

[datasets.legacy]
file = "legacy-2016-2018.csv"
read_only = true
cache_ttl_secs = 3600
stat_years = ["2016", "2017", "2018"]
fill_missing = { Area = "Unknown", Trench = "Unknown" }
"#;

    #[test]
    fn parse_register() {
        let config = RegisterConfig::from_toml(KEROS).unwrap();
        assert_eq!(config.name, "Keros Photogrammetry");
        assert_eq!(config.date_format, "%d.%m.%Y");
        assert_eq!(config.areas.len(), 5);
        assert_eq!(config.columns.area, "Area");
        assert_eq!(config.default_dataset(), "current");

        let current = config.dataset("current").unwrap();
        assert!(!current.read_only);
        assert_eq!(current.cache_ttl(), Duration::from_secs(600));

        let legacy = config.dataset("legacy").unwrap();
        assert!(legacy.read_only);
        assert_eq!(legacy.fill_missing["Area"], "Unknown");
    }

    #[test]
    fn schema_marks_flags_and_dates() {
        let config = RegisterConfig::from_toml(KEROS).unwrap();
        let schema = config.schema(config.dataset("current").unwrap());
        assert_eq!(schema.kind_of("Complete"), ColumnKind::Bool);
        assert_eq!(schema.kind_of("GIS uploaded"), ColumnKind::Bool);
        assert_eq!(schema.kind_of("Date"), ColumnKind::Date);
        assert_eq!(schema.kind_of("Notes"), ColumnKind::Text);
    }

    #[test]
    fn legacy_schema_fills_missing_columns() {
        let config = RegisterConfig::from_toml(KEROS).unwrap();
        let schema = config.schema(config.dataset("legacy").unwrap());
        let t = keros_engine::Table::from_records(
            vec!["Date".into(), "Name".into()],
            vec![vec!["03.08.2017".into(), "K17-1".into()]],
            &schema,
        );
        assert_eq!(t.text_at(0, "Area"), "Unknown");
        assert_eq!(t.text_at(0, "Trench"), "Unknown");
    }

    #[test]
    fn unknown_dataset_lists_known() {
        let config = RegisterConfig::from_toml(KEROS).unwrap();
        let err = config.dataset("2019").unwrap_err();
        assert_eq!(err.to_string(), "unknown dataset '2019' (configured: current, legacy)");
    }

    #[test]
    fn dates_follow_the_format() {
        let config = RegisterConfig::from_toml(KEROS).unwrap();
        let d = config.parse_date("01.07.2025").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(config.format_date(d), "01.07.2025");
        assert!(config.parse_date("2025-07-01").is_none());
        assert!(config.parse_date("32.07.2025").is_none());
    }

    #[test]
    fn reject_no_datasets() {
        let err = RegisterConfig::from_toml("datasets = {}").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn reject_flag_shadowing_core_column() {
        let input = r#"
[columns]
flags = ["Complete", "Area"]

[datasets.current]
file = "r.csv"
"#;
        let err = RegisterConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("'Area' is also a core column"));
    }

    #[test]
    fn reject_partial_date_format() {
        let input = r#"
date_format = "%m.%Y"

[datasets.current]
file = "r.csv"
"#;
        let err = RegisterConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn reject_malformed_toml() {
        let err = RegisterConfig::from_toml("datasets = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn dataset_paths_resolve_next_to_the_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keros.toml");
        fs::write(&path, KEROS).unwrap();

        let config = RegisterConfig::load(&path).unwrap();
        let current = config.dataset("current").unwrap();
        assert_eq!(config.dataset_path(current), dir.path().join("register-2026.csv"));
    }

    #[test]
    fn location_order() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join("from-env.toml");
        fs::write(&env_file, KEROS).unwrap();
        let home = dir.path().join("home");
        fs::create_dir_all(home.join("keros")).unwrap();
        fs::write(home.join("keros").join(CONFIG_FILE), KEROS).unwrap();

        let explicit = Path::new("/elsewhere/keros.toml");
        assert_eq!(
            resolve_location(Some(explicit), Some(env_file.clone()), Some(home.clone())).unwrap(),
            explicit
        );
        assert_eq!(
            resolve_location(None, Some(env_file.clone()), Some(home.clone())).unwrap(),
            env_file
        );
        assert_eq!(
            resolve_location(None, None, Some(home.clone())).unwrap(),
            home.join("keros").join(CONFIG_FILE)
        );

        let missing = dir.path().join("nowhere");
        let err = resolve_location(None, Some(missing.join("a.toml")), Some(missing)).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { searched } if searched.len() == 2));
    }
}
