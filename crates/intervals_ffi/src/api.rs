//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level interval operations to Dart via FRB.
//! - Own the process-wide registry and its collaborators.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every mutating call drains registry warnings into its response.
//! - Times cross the boundary as local epoch milliseconds.

use chrono::{Local, NaiveDateTime, TimeZone};
use intervals_core::db::open_db;
use intervals_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, Clock, EngineConfig,
    FrequencyRule, IntervalEntity, IntervalId, IntervalPatch, IntervalRegistry,
    LogNotificationBackend, NewInterval, SqliteIntervalStore, StatusChange, SystemClock,
    ThreadedNotificationScheduler,
};
use log::info;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

const DB_FILE_NAME: &str = "intervals.sqlite3";
const DB_PATH_ENV: &str = "INTERVALS_DB_PATH";
const CONFIG_PATH_ENV: &str = "INTERVALS_CONFIG_PATH";

static REGISTRY: Mutex<Option<IntervalRegistry>> = Mutex::new(None);

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One interval as shown by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalItem {
    pub interval_id: String,
    pub name: String,
    /// Compact frequency label (`1d`, `2w`, `3m`).
    pub frequency: String,
    /// Human-readable frequency (`every 2 weeks`).
    pub frequency_display: String,
    pub include_time: bool,
    pub next_due_epoch_ms: i64,
    pub last_completed_epoch_ms: Option<i64>,
    /// `normal|overdue|completing`.
    pub status: String,
    /// Formatted due date for display.
    pub due_label: String,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalListResponse {
    pub ok: bool,
    pub items: Vec<IntervalItem>,
    /// Human-readable response message for diagnostics.
    pub message: String,
}

/// Action response envelope for add/update/remove/complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalActionResponse {
    /// Whether the call was accepted.
    pub ok: bool,
    /// Whether an interval was actually touched; unknown ids leave it `false`.
    pub applied: bool,
    pub interval_id: Option<String>,
    pub message: String,
    /// Degradation warnings raised while handling the call.
    pub warnings: Vec<String>,
}

impl IntervalActionResponse {
    fn applied(message: impl Into<String>, interval_id: IntervalId, warnings: Vec<String>) -> Self {
        Self {
            ok: true,
            applied: true,
            interval_id: Some(interval_id.to_string()),
            message: message.into(),
            warnings,
        }
    }

    fn skipped(warnings: Vec<String>) -> Self {
        Self {
            ok: true,
            applied: false,
            interval_id: None,
            message: "No matching interval; nothing changed.".to_string(),
            warnings,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            applied: false,
            interval_id: None,
            message: message.into(),
            warnings: Vec::new(),
        }
    }
}

/// Status transition reported by a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalStatusChangeItem {
    pub interval_id: String,
    pub from: String,
    pub to: String,
}

/// Tick response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTickResponse {
    pub ok: bool,
    pub changes: Vec<IntervalStatusChangeItem>,
    pub message: String,
    pub warnings: Vec<String>,
}

/// Creates an interval.
///
/// Input semantics:
/// - `start_epoch_ms`: local start moment; truncated to midnight when
///   `include_time` is false.
/// - `frequency`: label such as `daily`, `2w`, `every 3 months`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn interval_add(
    name: String,
    start_epoch_ms: i64,
    frequency: String,
    include_time: bool,
) -> IntervalActionResponse {
    let draft = match build_new_interval(name, start_epoch_ms, &frequency, include_time) {
        Ok(draft) => draft,
        Err(err) => return IntervalActionResponse::failure(format!("interval_add failed: {err}")),
    };
    match with_registry(|registry| {
        let id = registry.add(draft);
        (id, drain_warnings(registry))
    }) {
        Ok((id, warnings)) => IntervalActionResponse::applied("Interval created.", id, warnings),
        Err(err) => IntervalActionResponse::failure(format!("interval_add failed: {err}")),
    }
}

/// Edits an interval; `None` fields stay unchanged.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Unknown ids are a successful no-op (`applied=false`).
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn interval_update(
    interval_id: String,
    name: Option<String>,
    start_epoch_ms: Option<i64>,
    frequency: Option<String>,
    include_time: Option<bool>,
) -> IntervalActionResponse {
    let parsed = parse_interval_id(&interval_id).and_then(|id| {
        build_patch(name, start_epoch_ms, frequency.as_deref(), include_time)
            .map(|patch| (id, patch))
    });
    let (id, patch) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => {
            return IntervalActionResponse::failure(format!("interval_update failed: {err}"))
        }
    };
    run_action("interval_update", "Interval updated.", id, |registry| {
        registry.update(id, patch)
    })
}

/// Removes an interval with its reminder.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Unknown ids are a successful no-op (`applied=false`).
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn interval_remove(interval_id: String) -> IntervalActionResponse {
    let id = match parse_interval_id(&interval_id) {
        Ok(id) => id,
        Err(err) => {
            return IntervalActionResponse::failure(format!("interval_remove failed: {err}"))
        }
    };
    run_action("interval_remove", "Interval removed.", id, |registry| {
        registry.remove(id)
    })
}

/// Marks an interval completed now.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Unknown ids are a successful no-op (`applied=false`).
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn interval_complete(interval_id: String) -> IntervalActionResponse {
    let id = match parse_interval_id(&interval_id) {
        Ok(id) => id,
        Err(err) => {
            return IntervalActionResponse::failure(format!("interval_complete failed: {err}"))
        }
    };
    run_action("interval_complete", "Interval completed.", id, |registry| {
        registry.complete(id)
    })
}

/// Runs one evaluation pass at the current local time.
///
/// # FFI contract
/// - Sync call; the host drives it on its own timer.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn interval_tick() -> IntervalTickResponse {
    match with_registry(|registry| {
        let now = registry.clock().now();
        let changes = registry.tick(now);
        (changes, drain_warnings(registry))
    }) {
        Ok((changes, warnings)) => IntervalTickResponse {
            ok: true,
            message: format!("{} status change(s).", changes.len()),
            changes: changes.into_iter().map(to_change_item).collect(),
            warnings,
        },
        Err(err) => IntervalTickResponse {
            ok: false,
            changes: Vec::new(),
            message: format!("interval_tick failed: {err}"),
            warnings: Vec::new(),
        },
    }
}

/// Lists every interval in insertion order.
///
/// # FFI contract
/// - Sync call, in-memory read.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn intervals_list() -> IntervalListResponse {
    list_response("intervals_list", |registry| {
        registry.get_all().into_iter().map(to_item).collect()
    })
}

/// Lists intervals whose due date has passed, whatever their status.
///
/// # FFI contract
/// - Sync call, in-memory read.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn intervals_overdue() -> IntervalListResponse {
    list_response("intervals_overdue", |registry| {
        let now = registry.clock().now();
        registry
            .overdue_intervals(now)
            .into_iter()
            .map(to_item)
            .collect()
    })
}

fn run_action(
    operation: &str,
    message: &str,
    id: IntervalId,
    action: impl FnOnce(&mut IntervalRegistry) -> bool,
) -> IntervalActionResponse {
    match with_registry(|registry| {
        let applied = action(registry);
        (applied, drain_warnings(registry))
    }) {
        Ok((true, warnings)) => IntervalActionResponse::applied(message, id, warnings),
        Ok((false, warnings)) => IntervalActionResponse::skipped(warnings),
        Err(err) => IntervalActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn list_response(
    operation: &str,
    collect: impl FnOnce(&mut IntervalRegistry) -> Vec<IntervalItem>,
) -> IntervalListResponse {
    match with_registry(collect) {
        Ok(items) => IntervalListResponse {
            ok: true,
            message: if items.is_empty() {
                "No intervals.".to_string()
            } else {
                format!("Found {} interval(s).", items.len())
            },
            items,
        },
        Err(err) => IntervalListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("{operation} failed: {err}"),
        },
    }
}

fn with_registry<T>(f: impl FnOnce(&mut IntervalRegistry) -> T) -> Result<T, String> {
    let mut guard = lock_registry();
    if guard.is_none() {
        *guard = Some(build_registry()?);
    }
    match guard.as_mut() {
        Some(registry) => Ok(f(registry)),
        None => Err("interval registry unavailable".to_string()),
    }
}

fn lock_registry() -> MutexGuard<'static, Option<IntervalRegistry>> {
    // Registry state stays consistent between calls; a panicked caller does
    // not invalidate it.
    REGISTRY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn build_registry() -> Result<IntervalRegistry, String> {
    let config = resolve_config()?;
    let db_path = resolve_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("interval DB open failed: {err}"))?;
    let notifier = ThreadedNotificationScheduler::spawn(LogNotificationBackend)
        .map_err(|err| format!("notification worker start failed: {err}"))?;
    let registry = IntervalRegistry::load(
        Box::new(SqliteIntervalStore::new(conn)),
        Box::new(notifier),
        Arc::new(SystemClock),
        config.state_machine(),
    );
    info!(
        "event=ffi_registry_init module=ffi status=ok count={}",
        registry.len()
    );
    Ok(registry)
}

fn resolve_db_path() -> PathBuf {
    env_path(DB_PATH_ENV).unwrap_or_else(|| std::env::temp_dir().join(DB_FILE_NAME))
}

fn resolve_config() -> Result<EngineConfig, String> {
    match env_path(CONFIG_PATH_ENV) {
        Some(path) => {
            EngineConfig::load(&path).map_err(|err| format!("engine config load failed: {err}"))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

fn drain_warnings(registry: &mut IntervalRegistry) -> Vec<String> {
    registry
        .take_warnings()
        .into_iter()
        .map(|warning| warning.to_string())
        .collect()
}

fn parse_interval_id(raw: &str) -> Result<IntervalId, String> {
    IntervalId::parse_str(raw.trim()).map_err(|_| format!("invalid interval id `{}`", raw.trim()))
}

fn build_new_interval(
    name: String,
    start_epoch_ms: i64,
    frequency: &str,
    include_time: bool,
) -> Result<NewInterval, String> {
    Ok(NewInterval {
        name: normalize_name(name)?,
        start_date: local_from_epoch_ms(start_epoch_ms)?,
        frequency: FrequencyRule::parse(frequency).map_err(|err| err.to_string())?,
        include_time,
    })
}

fn build_patch(
    name: Option<String>,
    start_epoch_ms: Option<i64>,
    frequency: Option<&str>,
    include_time: Option<bool>,
) -> Result<IntervalPatch, String> {
    Ok(IntervalPatch {
        name: name.map(normalize_name).transpose()?,
        start_date: start_epoch_ms.map(local_from_epoch_ms).transpose()?,
        frequency: frequency
            .map(|label| FrequencyRule::parse(label).map_err(|err| err.to_string()))
            .transpose()?,
        include_time,
    })
}

fn normalize_name(name: String) -> Result<String, String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("name must not be empty".to_string());
    }
    Ok(trimmed.to_string())
}

fn local_from_epoch_ms(value: i64) -> Result<NaiveDateTime, String> {
    Local
        .timestamp_millis_opt(value)
        .single()
        .map(|moment| moment.naive_local())
        .ok_or_else(|| format!("epoch ms out of range: {value}"))
}

fn epoch_ms_from_local(value: NaiveDateTime) -> i64 {
    // Wall-clock times skipped by a DST gap fall back to UTC interpretation.
    Local
        .from_local_datetime(&value)
        .earliest()
        .map(|moment| moment.timestamp_millis())
        .unwrap_or_else(|| value.and_utc().timestamp_millis())
}

fn to_item(entity: &IntervalEntity) -> IntervalItem {
    IntervalItem {
        interval_id: entity.id.to_string(),
        name: entity.name.clone(),
        frequency: entity.frequency.as_label(),
        frequency_display: entity.frequency.to_string(),
        include_time: entity.include_time,
        next_due_epoch_ms: epoch_ms_from_local(entity.next_due),
        last_completed_epoch_ms: entity.last_completed.map(epoch_ms_from_local),
        status: entity.status.as_str().to_string(),
        due_label: entity.due_label(),
    }
}

fn to_change_item(change: StatusChange) -> IntervalStatusChangeItem {
    IntervalStatusChangeItem {
        interval_id: change.id.to_string(),
        from: change.from.as_str().to_string(),
        to: change.to.as_str().to_string(),
    }
}
