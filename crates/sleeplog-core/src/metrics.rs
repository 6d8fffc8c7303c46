//! The recognized-metric table.
//!
//! Maps canonical metric identifiers to the phrases that identify their
//! question wording and to the value kind their answers are normalized as.
//! Both the text-log parser and the spreadsheet importer read this table, so
//! an alternate wording set is just another [`MetricTable`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SleepLogError};
use crate::models::ValueKind;

/// The four timing metrics that lead every table, in column order.
pub const PRIORITY_METRICS: [&str; 4] = [
    "wind_down_start_time",
    "bed_time",
    "wake_up_time",
    "get_out_of_bed_time",
];

/// One recognized metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Canonical identifier, used as the column name.
    pub id: String,
    /// Every phrase must occur in the normalized question text for a match.
    pub phrases: Vec<String>,
    pub kind: ValueKind,
    /// Statistics treat NA as zero for this metric (e.g. drink counts).
    #[serde(default)]
    pub missing_as_zero: bool,
    /// Target time of day used for offset statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_time: Option<NaiveTime>,
}

impl MetricSpec {
    pub fn new(id: &str, phrases: &[&str], kind: ValueKind) -> Self {
        Self {
            id: id.to_string(),
            phrases: phrases.iter().map(|p| p.to_string()).collect(),
            kind,
            missing_as_zero: false,
            expected_time: None,
        }
    }

    fn zero_when_missing(mut self) -> Self {
        self.missing_as_zero = true;
        self
    }

    fn expecting(mut self, hour: u32, minute: u32) -> Self {
        self.expected_time = NaiveTime::from_hms_opt(hour, minute, 0);
        self
    }

    /// Whether `normalized` (already passed through [`normalize_question`])
    /// contains every phrase of this metric.
    pub fn matches(&self, normalized: &str) -> bool {
        self.phrases.iter().all(|p| {
            let phrase = normalize_question(p);
            !phrase.is_empty() && normalized.contains(&phrase)
        })
    }
}

/// Ordered metric table plus the settings that travel with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTable {
    /// Checked in order; the first matching spec wins.
    pub metrics: Vec<MetricSpec>,
    /// Metrics that always lead the column order.
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
    /// Times before this belong to the following night.
    #[serde(default = "default_evening_start")]
    pub evening_start: NaiveTime,
}

fn default_priority() -> Vec<String> {
    PRIORITY_METRICS.iter().map(|s| s.to_string()).collect()
}

fn default_evening_start() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for MetricTable {
    fn default() -> Self {
        use ValueKind::*;
        let metrics = vec![
            MetricSpec::new("wind_down_start_time", &["time", "wind", "down"], Time)
                .expecting(2, 50),
            MetricSpec::new("bed_time", &["time", "into bed"], Time).expecting(4, 0),
            MetricSpec::new("fall_asleep_minutes", &["fall asleep"], Decimal),
            MetricSpec::new("night_wake_ups", &["how many times", "wake up"], Count),
            MetricSpec::new("awake_minutes", &["awakenings"], Decimal),
            MetricSpec::new("out_of_bed_minutes", &["how long", "out of bed"], Decimal),
            MetricSpec::new("wake_up_time", &["what time", "wake up"], Time).expecting(11, 30),
            MetricSpec::new("get_out_of_bed_time", &["what time", "out of bed"], Time)
                .expecting(11, 35),
            MetricSpec::new("sleep_hours", &["hours of sleep"], Duration),
            MetricSpec::new("bed_hours", &["hours", "in bed"], Duration),
            MetricSpec::new("sleep_quality", &["quality"], Decimal),
            MetricSpec::new("naps", &["naps"], Count),
            MetricSpec::new("mood", &["mood"], Decimal),
            MetricSpec::new("fatigue", &["fatigue"], Decimal),
            MetricSpec::new("alcohol_drinks", &["alcohol", "drinks"], Decimal).zero_when_missing(),
            MetricSpec::new("second_wind", &["second wind"], Time),
        ];
        Self {
            metrics,
            priority: default_priority(),
            evening_start: default_evening_start(),
        }
    }
}

impl MetricTable {
    /// Default location of a user-supplied table: `~/.sleeplog/metrics.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sleeplog")
            .join("metrics.json")
    }

    /// Load and validate a table from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SleepLogError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let table: MetricTable = serde_json::from_str(&content)?;
        table.validate()?;
        debug!(
            "Loaded {} metrics from {}",
            table.metrics.len(),
            path.display()
        );
        Ok(table)
    }

    /// Load `path` when given, else the default path when it exists, else the
    /// built-in table.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load_from(p);
        }
        let fallback = Self::default_path();
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        Ok(Self::default())
    }

    /// Reject tables the matcher cannot use unambiguously.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.metrics {
            if spec.id.trim().is_empty() {
                return Err(SleepLogError::InvalidMetricTable(
                    "metric with empty id".to_string(),
                ));
            }
            if !seen.insert(spec.id.as_str()) {
                return Err(SleepLogError::InvalidMetricTable(format!(
                    "duplicate id {}",
                    spec.id
                )));
            }
            if spec.phrases.is_empty()
                || spec
                    .phrases
                    .iter()
                    .any(|p| normalize_question(p).is_empty())
            {
                return Err(SleepLogError::InvalidMetricTable(format!(
                    "metric {} needs at least one non-empty phrase",
                    spec.id
                )));
            }
        }
        let mut seen_priority = HashSet::new();
        for id in &self.priority {
            if !seen_priority.insert(id.as_str()) {
                return Err(SleepLogError::InvalidMetricTable(format!(
                    "duplicate priority id {}",
                    id
                )));
            }
            if !seen.contains(id.as_str()) {
                warn!("Priority metric {} is not defined in the metric table", id);
            }
        }
        Ok(())
    }

    /// Find the metric whose phrases all occur in `question`.
    pub fn match_question(&self, question: &str) -> Option<&MetricSpec> {
        let normalized = normalize_question(question);
        if normalized.is_empty() {
            return None;
        }
        self.metrics.iter().find(|spec| spec.matches(&normalized))
    }

    pub fn get(&self, id: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.id == id)
    }

    /// Position of `id` in the priority list.
    pub fn priority_rank(&self, id: &str) -> Option<usize> {
        self.priority.iter().position(|p| p == id)
    }
}

/// Lowercase `text`, turn punctuation into spaces and collapse whitespace.
///
/// `"In TOTAL, how many hours?"` becomes `"in total how many hours"`.
pub fn normalize_question(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Column identifier for a question that has no metric: its normalized
/// wording with words joined by `_`.
pub fn question_slug(text: &str) -> String {
    normalize_question(text).replace(' ', "_")
}
