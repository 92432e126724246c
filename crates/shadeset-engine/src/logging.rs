//! Centralized timestamped logging
//!
//! All logs should go through `logi!`, `logw!`, or `loge!` so they include:
//!   <timestamp> [TAG][thread] message
//!
//! Info goes to stdout, warnings and errors to stderr. `init` can add an
//! append-only file sink that receives every line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use time::format_description::FormatItem;
use time::macros::format_description;

static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();
static RUN_ID: OnceLock<String> = OnceLock::new();
static INFO_TO_STDERR: AtomicBool = AtomicBool::new(false);

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

/// Initialize logging. Call once at startup.
///
/// Returns the generated run id.
pub fn init(log_file: Option<PathBuf>) -> String {
    let rid = RUN_ID
        .get_or_init(|| {
            let now = time::OffsetDateTime::now_utc().unix_timestamp_nanos() as u64;
            format!("{:08x}", now ^ (std::process::id() as u64))
        })
        .clone();

    let sink = LOG_FILE.get_or_init(|| Mutex::new(None));

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => {
                if let Ok(mut guard) = sink.lock() {
                    *guard = Some(f);
                }
            }
            Err(e) => {
                // The macros route through log_line, which would race the sink we failed to open.
                eprintln!(
                    "{} [LOG][{}] failed to open log file {}: {e}",
                    log_timestamp(),
                    log_thread_name(),
                    path.display()
                );
            }
        }
    }

    rid
}

/// Send info lines to stderr too, keeping stdout for command output (e.g. JSON).
pub fn info_to_stderr(on: bool) {
    INFO_TO_STDERR.store(on, Ordering::Relaxed);
}

/// Current run id (empty if init() wasn't called).
pub fn run_id() -> &'static str {
    RUN_ID.get().map(|s| s.as_str()).unwrap_or("")
}

// Local time is used when available; it falls back to UTC.
pub fn log_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| "<time-format-error>".to_string())
}

pub fn log_thread_name() -> String {
    std::thread::current().name().unwrap_or("main").to_string()
}

#[doc(hidden)]
pub fn log_line(level: &str, tag: &str, msg: &str) {
    let line = format!("{} [{}][{}] {}", log_timestamp(), tag, log_thread_name(), msg);

    if level == "INFO" && !INFO_TO_STDERR.load(Ordering::Relaxed) {
        println!("{line}");
    } else {
        eprintln!("{line}");
    }

    if let Some(m) = LOG_FILE.get() {
        if let Ok(mut guard) = m.lock() {
            if let Some(f) = guard.as_mut() {
                let _ = writeln!(f, "{line}");
                let _ = f.flush();
            }
        }
    }
}

/// Info log: printed to stdout
#[macro_export]
macro_rules! logi {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("INFO", $tag, &msg);
    }};
}

/// Warning log: printed to stderr
#[macro_export]
macro_rules! logw {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("WARN", $tag, &msg);
    }};
}

/// Error log: printed to stderr
#[macro_export]
macro_rules! loge {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("ERROR", $tag, &msg);
    }};
}
