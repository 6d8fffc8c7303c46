//! Log file discovery and loading.
//!
//! Accepts either a single log file or a directory of `.txt` logs. Each file
//! is parsed on its own and the tables are concatenated in path order, so
//! weeks from different files never interleave.

use std::path::{Path, PathBuf};

use sleeplog_core::models::Table;
use sleeplog_core::{Result, SleepLogError};
use tracing::{debug, info, warn};

use crate::assemble::concat_tables;
use crate::classify::{split_lines, RawLine};
use crate::diagnostics::AnomalySink;
use crate::parser::LogParser;

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.txt` files recursively under `dir`, sorted by path.
pub fn find_log_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Data path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("txt"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Read a file as text, replacing invalid UTF-8 rather than failing.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| SleepLogError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read a log file into numbered lines.
pub fn read_log_lines(path: &Path) -> Result<Vec<RawLine>> {
    Ok(split_lines(&read_text(path)?))
}

/// Parse the log file or directory at `path`.
///
/// Fails only when the path is missing, a directory holds no logs, or a file
/// cannot be read. Parsing itself never fails.
pub fn load_logs(path: &Path, parser: &LogParser, sink: &mut dyn AnomalySink) -> Result<Table> {
    if !path.exists() {
        return Err(SleepLogError::DataPathNotFound(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        let files = find_log_files(path);
        if files.is_empty() {
            return Err(SleepLogError::NoLogFiles(path.to_path_buf()));
        }
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut tables = Vec::with_capacity(files.len());
    for file in &files {
        let lines = read_log_lines(file)?;
        let table = parser.parse_with_anomalies(&lines, sink);
        debug!(
            "Parsed {} ({} lines) into {} rows",
            file.display(),
            lines.len(),
            table.len()
        );
        tables.push(table);
    }

    let table = if tables.len() == 1 {
        tables.pop().unwrap_or_default()
    } else {
        concat_tables(tables, parser.metrics())
    };
    info!(
        "Loaded {} rows over {} weeks from {} file(s)",
        table.len(),
        table.week_count(),
        files.len()
    );
    Ok(table)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
