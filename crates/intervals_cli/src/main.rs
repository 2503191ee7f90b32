//! Command-line front end for the interval engine.
//!
//! # Responsibility
//! - Drive the registry against a SQLite file from the terminal.
//! - Keep output line-oriented so it can be piped.
//!
//! # Invariants
//! - Every invocation runs one catch-up tick before its command.
//! - Registry warnings go to stderr; command results go to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use intervals_core::db::open_db;
use intervals_core::{
    compose_start, default_log_level, init_logging, Clock, EngineConfig, FrequencyRule,
    IntervalEntity, IntervalPatch, IntervalRegistry, LogNotificationBackend, NewInterval,
    SqliteIntervalStore, StatusChange, SystemClock, ThreadedNotificationScheduler,
};
use log::info;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "intervals", about = "Track recurring intervals", version)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = "intervals.sqlite3")]
    db: PathBuf,
    /// JSON engine config (grace period, completion delay, tick cadence).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for rolling log files. Logging stays off when omitted.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    /// Log at debug level.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new interval.
    Add(AddArgs),
    /// List every interval in creation order.
    List(ListArgs),
    /// Edit an existing interval.
    Edit(EditArgs),
    /// Mark an interval completed now.
    Complete(IdArgs),
    /// Delete an interval and its reminder.
    Remove(IdArgs),
    /// List intervals whose due date has passed.
    Overdue(ListArgs),
    /// Run one evaluation pass and print status changes.
    Tick,
    /// Tick on the configured cadence until interrupted.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Display name.
    name: String,
    /// Frequency label: daily, weekly, monthly, 3d, 2w, "every 6 months".
    #[arg(long)]
    every: String,
    /// Start date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Time of day (HH:MM). Omit for a date-only interval.
    #[arg(long, value_parser = parse_time)]
    time: Option<NaiveTime>,
}

#[derive(Debug, Args)]
struct EditArgs {
    id: Uuid,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    every: Option<String>,
    /// New start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,
    /// New time of day (HH:MM); requires --start.
    #[arg(long, value_parser = parse_time, requires = "start")]
    time: Option<NaiveTime>,
    /// Drop the time of day and track whole days.
    #[arg(long, conflicts_with = "time")]
    date_only: bool,
}

#[derive(Debug, Args)]
struct IdArgs {
    id: Uuid,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Emit JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct WatchArgs {
    /// Stop after this many ticks.
    #[arg(long)]
    iterations: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_dir.as_deref(), cli.verbose)?;
    let config = load_config(cli.config.as_deref())?;
    let mut registry = open_registry(&cli.db, &config)?;

    let now = registry.clock().now();
    print_changes(&registry.tick(now));

    let result = match cli.command {
        Commands::Add(args) => handle_add(&mut registry, args),
        Commands::List(args) => handle_list(&registry, args),
        Commands::Edit(args) => handle_edit(&mut registry, args),
        Commands::Complete(args) => handle_complete(&mut registry, args),
        Commands::Remove(args) => handle_remove(&mut registry, args),
        Commands::Overdue(args) => handle_overdue(&registry, args),
        Commands::Tick => Ok(()),
        Commands::Watch(args) => handle_watch(&mut registry, &config, args),
    };
    report_warnings(&mut registry);
    result
}

fn setup_logging(log_dir: Option<&Path>, verbose: bool) -> Result<()> {
    let Some(log_dir) = log_dir else {
        return Ok(());
    };
    let absolute = if log_dir.is_absolute() {
        log_dir.to_path_buf()
    } else {
        std::env::current_dir()
            .context("failed to resolve current directory")?
            .join(log_dir)
    };
    let level = if verbose {
        "debug"
    } else {
        default_log_level().as_str()
    };
    let dir = absolute
        .to_str()
        .with_context(|| format!("log dir {} is not valid UTF-8", absolute.display()))?;
    init_logging(level, dir).context("failed to initialize logging")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn open_registry(db: &Path, config: &EngineConfig) -> Result<IntervalRegistry> {
    let conn = open_db(db).with_context(|| format!("failed to open {}", db.display()))?;
    let notifier = ThreadedNotificationScheduler::spawn(LogNotificationBackend)
        .context("failed to start notification worker")?;
    let registry = IntervalRegistry::load(
        Box::new(SqliteIntervalStore::new(conn)),
        Box::new(notifier),
        Arc::new(SystemClock),
        config.state_machine(),
    );
    info!(
        "event=cli_open module=cli status=ok count={}",
        registry.len()
    );
    Ok(registry)
}

fn handle_add(registry: &mut IntervalRegistry, args: AddArgs) -> Result<()> {
    let AddArgs {
        name,
        every,
        start,
        time,
    } = args;
    let name = non_empty_name(name)?;
    let frequency = parse_frequency(&every)?;
    let date = start.unwrap_or_else(|| Local::now().date_naive());

    let id = registry.add(NewInterval {
        name,
        start_date: compose_start(date, time),
        frequency,
        include_time: time.is_some(),
    });
    println!("{id}");
    Ok(())
}

fn handle_list(registry: &IntervalRegistry, args: ListArgs) -> Result<()> {
    print_intervals(&registry.get_all(), args.json)
}

fn handle_overdue(registry: &IntervalRegistry, args: ListArgs) -> Result<()> {
    let now = registry.clock().now();
    print_intervals(&registry.overdue_intervals(now), args.json)
}

fn handle_edit(registry: &mut IntervalRegistry, args: EditArgs) -> Result<()> {
    let EditArgs {
        id,
        name,
        every,
        start,
        time,
        date_only,
    } = args;

    let include_time = if date_only {
        Some(false)
    } else if start.is_some() {
        Some(time.is_some())
    } else {
        None
    };
    let patch = IntervalPatch {
        name: name.map(non_empty_name).transpose()?,
        start_date: start.map(|date| compose_start(date, time)),
        frequency: every.as_deref().map(parse_frequency).transpose()?,
        include_time,
    };
    if patch.is_empty() {
        bail!("nothing to edit; pass at least one of --name, --every, --start, --date-only");
    }

    report_applied(registry.update(id, patch), id, "updated");
    Ok(())
}

fn handle_complete(registry: &mut IntervalRegistry, args: IdArgs) -> Result<()> {
    report_applied(registry.complete(args.id), args.id, "completed");
    Ok(())
}

fn handle_remove(registry: &mut IntervalRegistry, args: IdArgs) -> Result<()> {
    report_applied(registry.remove(args.id), args.id, "removed");
    Ok(())
}

fn handle_watch(
    registry: &mut IntervalRegistry,
    config: &EngineConfig,
    args: WatchArgs,
) -> Result<()> {
    let mut remaining = args.iterations;
    loop {
        if remaining == Some(0) {
            return Ok(());
        }
        thread::sleep(config.tick_interval());
        let now = registry.clock().now();
        print_changes(&registry.tick(now));
        report_warnings(registry);
        remaining = remaining.map(|count| count - 1);
    }
}

fn print_intervals(intervals: &[&IntervalEntity], json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(intervals).context("failed to serialize intervals")?;
        println!("{rendered}");
        return Ok(());
    }
    if intervals.is_empty() {
        println!("No intervals.");
        return Ok(());
    }
    for interval in intervals {
        println!(
            "{}  {:<10}  {:<19}  {:<16}  {}",
            interval.id,
            interval.status.as_str(),
            interval.due_label(),
            interval.frequency.to_string(),
            interval.name
        );
    }
    Ok(())
}

fn print_changes(changes: &[StatusChange]) {
    for change in changes {
        println!(
            "{}  {} -> {}",
            change.id,
            change.from.as_str(),
            change.to.as_str()
        );
    }
}

fn report_applied(applied: bool, id: Uuid, verb: &str) {
    if applied {
        println!("{verb} {id}");
    } else {
        eprintln!("no interval with id {id}; nothing changed");
    }
}

fn report_warnings(registry: &mut IntervalRegistry) {
    for warning in registry.take_warnings() {
        eprintln!("warning: {warning}");
    }
}

fn non_empty_name(name: String) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("name must not be empty");
    }
    Ok(trimmed.to_string())
}

fn parse_frequency(label: &str) -> Result<FrequencyRule> {
    FrequencyRule::parse(label).with_context(|| format!("invalid frequency `{label}`"))
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| format!("expected HH:MM, got `{raw}`"))
}
