// keros CLI - render, edit and save the photogrammetry register

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Duration;
use clap::{Parser, Subcommand};
use keros_cli::exit_codes::EXIT_SUCCESS;
use keros_cli::output;
use keros_cli::session::DEFAULT_TTL_HOURS;
use keros_cli::{CliError, NewLayer, Query, Register, Session};
use keros_config::RegisterConfig;
use keros_engine::View;

#[derive(Parser)]
#[command(name = "keros")]
#[command(about = "Photogrammetry register: tabbed views, edits and write-back")]
#[command(version)]
struct Cli {
    /// Config file (default: $KEROS_CONFIG, then ~/.config/keros/keros.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render tab views and start an edit session
    #[command(after_help = "\
Examples:
  keros render current
  keros render current --tab Kavos --tab SDS --out kavos.json
  keros render current --tab Kavos --trench 3

Fill in each view's \"delta\" in the session file, then run `keros save`.
Positions in a delta are the row numbers printed in the # column.")]
    Render {
        /// Dataset name from keros.toml (default: current)
        dataset: Option<String>,

        /// Area tab to render; repeat for several (default: every tab)
        #[arg(long = "tab")]
        tabs: Vec<String>,

        /// Restrict every tab to one trench
        #[arg(long)]
        trench: Option<String>,

        /// Sort rows by this column, as a grid header click would
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,

        /// Session file to write
        #[arg(long, short = 'o', default_value = "keros-session.json")]
        out: PathBuf,

        /// Hours until the session expires
        #[arg(long, default_value_t = DEFAULT_TTL_HOURS)]
        ttl_hours: i64,

        /// Print rows as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Apply an edited session to the register
    #[command(after_help = "\
Examples:
  keros save keros-session.json
  keros save kavos.json --json

Exit codes:
  5  a view is stale or the session expired: render again
  6  someone else saved first: render again and redo the edits
  7  the write failed; the register is unchanged and the save can be retried
  8  the dataset is read-only")]
    Save {
        /// Session file written by `keros render`
        session: PathBuf,

        /// Keep the session file after a successful save
        #[arg(long)]
        keep: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a new photogrammetry layer
    #[command(after_help = "\
Examples:
  keros add current --area Kavos --trench 3 --name L12
  keros add current --area SDS --trench B --name B-7 --date 04.07.2026 --notes \"north baulk\"")]
    Add {
        dataset: Option<String>,

        #[arg(long)]
        area: String,

        #[arg(long)]
        trench: String,

        /// Layer name
        #[arg(long)]
        name: String,

        /// Capture date in the configured format (default: today)
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List register rows
    #[command(after_help = "\
Examples:
  keros show current --area Kavos
  keros show legacy --search K17
  keros show current --where 'Complete=FALSE' --where 'Trench!=1'
  keros show current --where 'Notes~baulk' --json")]
    Show {
        dataset: Option<String>,

        #[command(flatten)]
        query: QueryArgs,

        /// Filter: 'Column=value', 'Column==exact', 'Column!=value' or 'Column~substring'
        #[arg(long = "where", value_name = "EXPR")]
        wheres: Vec<String>,

        #[arg(long)]
        sort: Option<String>,

        #[arg(long, requires = "sort")]
        desc: bool,

        #[arg(long)]
        json: bool,
    },

    /// Layer counts per trench for each configured year
    #[command(after_help = "\
Examples:
  keros stats current
  keros stats legacy --area Kavos --json")]
    Stats {
        dataset: Option<String>,

        #[command(flatten)]
        query: QueryArgs,

        #[arg(long)]
        json: bool,
    },

    /// Area tabs and the trenches in each
    Tabs {
        dataset: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Config file commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Parse and validate the config file
    Validate,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Area tab
    #[arg(long)]
    area: Option<String>,

    #[arg(long)]
    trench: Option<String>,

    /// Layer name contains
    #[arg(long)]
    search: Option<String>,
}

impl QueryArgs {
    fn into_query(self, wheres: Vec<String>) -> Query {
        Query { area: self.area, trench: self.trench, search: self.search, wheres }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let config = cli.config;
    let result = match cli.command {
        Commands::Render { dataset, tabs, trench, sort, desc, out, ttl_hours, json } => {
            cmd_render(config, dataset, tabs, trench, sort, desc, out, ttl_hours, json)
        }
        Commands::Save { session, keep, json } => cmd_save(config, session, keep, json),
        Commands::Add { dataset, area, trench, name, date, notes } => {
            cmd_add(config, dataset, NewLayer { area, trench, name, date, notes })
        }
        Commands::Show { dataset, query, wheres, sort, desc, json } => {
            cmd_show(config, dataset, query.into_query(wheres), sort, desc, json)
        }
        Commands::Stats { dataset, query, json } => {
            cmd_stats(config, dataset, query.into_query(Vec::new()), json)
        }
        Commands::Tabs { dataset, json } => cmd_tabs(config, dataset, json),
        Commands::Config(ConfigCommands::Validate) => cmd_config_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, RegisterConfig), CliError> {
    let path = keros_config::locate(explicit)?;
    let config = RegisterConfig::load(&path)?;
    log::debug!("config {}", path.display());
    Ok((path, config))
}

fn open_register(config: Option<PathBuf>, dataset: Option<String>) -> Result<Register, CliError> {
    let (_, config) = load_config(config.as_deref())?;
    Register::open(config, dataset.as_deref())
}

fn sorted(view: View, table: &keros_engine::Table, sort: Option<&str>, desc: bool) -> Result<View, CliError> {
    match sort {
        Some(column) if table.column_index(column).is_none() => {
            Err(CliError::args(format!("no column named '{column}'"))
                .with_hint(format!("columns: {}", table.headers().join(", "))))
        }
        Some(column) => Ok(view.sorted_by(table, column, desc)),
        None => Ok(view),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), CliError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("JSON output: {e}")))?;
    println!("{out}");
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_render(
    config: Option<PathBuf>,
    dataset: Option<String>,
    tabs: Vec<String>,
    trench: Option<String>,
    sort: Option<String>,
    desc: bool,
    out: PathBuf,
    ttl_hours: i64,
    json: bool,
) -> Result<(), CliError> {
    let ttl = Duration::try_hours(ttl_hours)
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| CliError::args(format!("invalid --ttl-hours {ttl_hours}")))?;
    let register = open_register(config, dataset)?;
    let snap = register.load()?;

    let views = register
        .render(&snap.table, &tabs, trench.as_deref())?
        .into_iter()
        .map(|v| sorted(v, &snap.table, sort.as_deref(), desc))
        .collect::<Result<Vec<_>, _>>()?;

    let session = Session::new(register.dataset(), snap.version.clone(), views, ttl);
    session.save(&out)?;

    if json {
        let tabs: Vec<serde_json::Value> = session
            .views
            .iter()
            .map(|sv| {
                serde_json::json!({
                    "tab": sv.view.name,
                    "rows": output::grid_json(&snap.table, &sv.view),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "session": out.display().to_string(),
            "id": session.id,
            "expires_at": session.expires_at,
            "tabs": tabs,
        }))?;
    } else {
        for sv in &session.views {
            println!("== {} ({} rows) ==", sv.view.name, sv.view.len());
            print!("{}", output::grid_text(&snap.table, &sv.view));
            println!();
        }
        eprintln!(
            "session {} written to {} (expires {})",
            session.id,
            out.display(),
            session.expires_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}

fn cmd_save(config: Option<PathBuf>, path: PathBuf, keep: bool, json: bool) -> Result<(), CliError> {
    let session = Session::load(&path)?;
    let register = open_register(config, Some(session.dataset.clone()))?;
    let saved = register.save(&session)?;

    if !keep {
        if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("could not remove {}: {e}", path.display());
        }
    }

    if json {
        return print_json(&saved);
    }
    let s = &saved.summary;
    println!(
        "saved {}: {} cell(s) changed, {} row(s) added, {} row(s) removed",
        register.dataset(),
        s.modified_cells,
        s.appended_rows,
        s.removed_rows
    );
    if !s.created_columns.is_empty() {
        println!("new columns: {}", s.created_columns.join(", "));
    }
    if s.overlapping_writes > 0 {
        println!("{} cell(s) edited in more than one tab; the last tab won", s.overlapping_writes);
    }
    if s.skipped_on_removed > 0 {
        println!("{} edit(s) dropped on removed rows", s.skipped_on_removed);
    }
    Ok(())
}

fn cmd_add(config: Option<PathBuf>, dataset: Option<String>, entry: NewLayer) -> Result<(), CliError> {
    let register = open_register(config, dataset)?;
    let added = register.add(&entry)?;
    println!("added {} to {}", added.key, register.dataset());
    Ok(())
}

fn cmd_show(
    config: Option<PathBuf>,
    dataset: Option<String>,
    query: Query,
    sort: Option<String>,
    desc: bool,
    json: bool,
) -> Result<(), CliError> {
    let register = open_register(config, dataset)?;
    let filters = register.filters(&query)?;
    let snap = register.load()?;

    let view = View::render("show", &snap.table, filters);
    let view = sorted(view, &snap.table, sort.as_deref(), desc)?;

    if json {
        print_json(&output::grid_json(&snap.table, &view))
    } else {
        print!("{}", output::grid_text(&snap.table, &view));
        eprintln!("{} of {} rows", view.len(), snap.table.len());
        Ok(())
    }
}

fn cmd_stats(config: Option<PathBuf>, dataset: Option<String>, query: Query, json: bool) -> Result<(), CliError> {
    let register = open_register(config, dataset)?;
    let filters = register.filters(&query)?;
    let snap = register.load()?;

    let view = View::render("stats", &snap.table, filters);
    let report = register.stats(&snap.table, &view);

    if json {
        print_json(&report)
    } else {
        print!("{}", output::stats_text(&report));
        Ok(())
    }
}

fn cmd_tabs(config: Option<PathBuf>, dataset: Option<String>, json: bool) -> Result<(), CliError> {
    let register = open_register(config, dataset)?;
    let snap = register.load()?;
    let tabs = register.tabs(&snap.table);

    if json {
        print_json(&tabs)
    } else {
        print!("{}", output::tabs_text(&tabs));
        Ok(())
    }
}

fn cmd_config_validate(config: Option<PathBuf>) -> Result<(), CliError> {
    let (path, config) = load_config(config.as_deref())?;
    println!(
        "ok: {} ({}, {} dataset(s): {})",
        path.display(),
        config.name,
        config.datasets.len(),
        config.datasets.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}
