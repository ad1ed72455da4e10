//! WC-013: Append-only JSONL run journal.
//!
//! One line per event: `{"ts": ..., "run_id": ..., "event": "...", ...}`.
//! A journal that cannot be written is logged and otherwise ignored; it never
//! changes the outcome of a run.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        recipe: String,
        url: String,
        webchef_version: String,
    },
    TaskStarted {
        task: String,
    },
    StepCompleted {
        task: String,
        step: usize,
        namespace: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        registered: Option<String>,
    },
    StepSkipped {
        task: String,
        step: usize,
    },
    StepFailed {
        task: String,
        step: usize,
        kind: String,
        error: String,
        ignored: bool,
    },
    RunCompleted {
        result_code: i32,
        tasks_completed: u32,
        total_seconds: f64,
    },
}

/// A journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: String,
    pub run_id: String,
    #[serde(flatten)]
    pub event: RunEvent,
}

/// Current time as RFC 3339 (UTC, second precision).
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn generate_run_id() -> String {
    format!("r-{}", uuid::Uuid::new_v4())
}

/// Append one event to the journal at `path`, creating parent directories.
pub fn append_event(path: &Path, run_id: &str, event: RunEvent) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create journal dir {}: {}", parent.display(), e))?;
    }

    let entry = JournalEntry {
        ts: now_rfc3339(),
        run_id: run_id.to_string(),
        event,
    };
    let json = serde_json::to_string(&entry).map_err(|e| format!("JSON serialize error: {}", e))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("cannot open journal {}: {}", path.display(), e))?;

    writeln!(file, "{}", json).map_err(|e| format!("write error: {}", e))
}

/// Read every entry of a journal file.
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| format!("{}:{}: {}", path.display(), i + 1, e))
        })
        .collect()
}

/// The journal of one run.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
    run_id: String,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>, run_id: &str) -> Self {
        Self {
            path: path.into(),
            run_id: run_id.to_string(),
        }
    }

    /// Append an event; failures are logged, never returned.
    pub fn record(&self, event: RunEvent) {
        if let Err(e) = append_event(&self.path, &self.run_id, event) {
            tracing::warn!(journal = %self.path.display(), "journal write failed: {}", e);
        }
    }
}
