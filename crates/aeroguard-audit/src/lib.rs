//! `aeroguard-audit` – append-only structured audit trail.
//!
//! Guardrail outcomes, safe-fail triggers, reflections, and weather fetches
//! are recorded as self-contained JSON objects, one per line, in an
//! append-only NDJSON file. Each record is fully serialized before a single
//! locked write, so a partially written record cannot occur; the sink is the
//! only shared resource in the system and serializes all writes through a
//! mutex. Write failures are logged locally and never fail the request.
//!
//! # Example
//!
//! ```no_run
//! use aeroguard_audit::{AuditCategory, AuditSink, AuditTrace};
//!
//! let sink = AuditSink::open("logs/audit.jsonl");
//! let mut trace = AuditTrace::new(AuditCategory::GuardrailPass);
//! trace.set_context("airport", "KDEN");
//! trace.log_result(Some(6.43), Some(7.66));
//! trace.emit(&sink);
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Record types
// ─────────────────────────────────────────────────────────────────────────────

/// What kind of outcome a record documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    GuardrailPass,
    GuardrailFail,
    Reflection,
    SafeFail,
    Fetch,
}

/// One timestamped step inside a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEventEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub ts: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// A self-contained audit record: one JSON object per NDJSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// `<unix-ms>-<8 hex chars>`; unique enough to quote in user-facing text.
    pub trace_id: String,
    pub category: AuditCategory,
    pub context: serde_json::Map<String, serde_json::Value>,
    pub events: Vec<AuditEventEntry>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Trace builder
// ─────────────────────────────────────────────────────────────────────────────

/// Collects context and step events for one record before emission.
#[derive(Debug, Clone)]
pub struct AuditTrace {
    record: AuditRecord,
}

impl AuditTrace {
    pub fn new(category: AuditCategory) -> Self {
        let trace_id = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        Self {
            record: AuditRecord {
                trace_id,
                category,
                context: serde_json::Map::new(),
                events: Vec::new(),
            },
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.record.trace_id
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.record.context.insert(key.into(), value);
    }

    /// Append an arbitrary event.
    pub fn log_event(&mut self, kind: impl Into<String>, payload: serde_json::Value) {
        self.record.events.push(AuditEventEntry {
            kind: kind.into(),
            ts: Utc::now(),
            payload,
        });
    }

    /// Raw inputs the decision was made from.
    pub fn log_input(&mut self, raw_metar: Option<&str>, wind: Option<&str>) {
        self.log_event(
            "input",
            serde_json::json!({ "raw_metar": raw_metar, "wind": wind }),
        );
    }

    /// Parsed numbers derived from the inputs.
    pub fn log_transformation(&mut self, wind_direction: Option<f64>, wind_speed: Option<f64>) {
        self.log_event(
            "transformation",
            serde_json::json!({
                "wind_direction_deg": wind_direction,
                "wind_speed_kt": wind_speed,
            }),
        );
    }

    /// The trigonometric step applied, e.g. `10 × sin(40°)`.
    pub fn log_operation(&mut self, function: &str, angle_deg: Option<f64>, expression: &str) {
        self.log_event(
            "operation",
            serde_json::json!({
                "function": function,
                "angle_deg": angle_deg,
                "expression": expression,
            }),
        );
    }

    /// Final numbers handed to the caller.
    pub fn log_result(&mut self, crosswind_kt: Option<f64>, headwind_kt: Option<f64>) {
        self.log_event(
            "result",
            serde_json::json!({
                "crosswind_kt": crosswind_kt,
                "headwind_kt": headwind_kt,
            }),
        );
    }

    pub fn into_record(self) -> AuditRecord {
        self.record
    }

    /// Write this trace to `sink`, consuming nothing; the trace can keep
    /// accumulating events and be emitted again if needed.
    pub fn emit(&self, sink: &AuditSink) {
        sink.append(&self.record);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sink
// ─────────────────────────────────────────────────────────────────────────────

struct SinkInner {
    path: Option<PathBuf>,
    file: Mutex<Option<File>>,
}

/// Append-only NDJSON writer. Clone freely; all clones share the same file
/// handle and write lock.
#[derive(Clone)]
pub struct AuditSink {
    inner: Arc<SinkInner>,
}

impl AuditSink {
    /// Open (or create) the audit log at `path`. The file handle is opened
    /// lazily on first append so that a missing parent directory at startup
    /// does not abort the process.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                path: Some(path.as_ref().to_path_buf()),
                file: Mutex::new(None),
            }),
        }
    }

    /// A sink that drops every record. Used in tests and when auditing is
    /// turned off.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(SinkInner {
                path: None,
                file: Mutex::new(None),
            }),
        }
    }

    /// Append one record as a single NDJSON line.
    ///
    /// The record is serialized in full before the lock is taken and written
    /// with one call, so concurrent appenders cannot interleave within a
    /// line. Failures are logged via `tracing` and swallowed: a broken audit
    /// disk must not fail the user request.
    pub fn append(&self, record: &AuditRecord) {
        let Some(path) = &self.inner.path else {
            return;
        };
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "audit record serialization failed");
                return;
            }
        };

        let mut guard = match self.inner.file.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_none() {
            match open_append(path) {
                Ok(file) => *guard = Some(file),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "audit sink open failed");
                    return;
                }
            }
        }
        if let Some(file) = guard.as_mut() {
            let write = file
                .write_all(line.as_bytes())
                .and_then(|_| file.write_all(b"\n"))
                .and_then(|_| file.flush());
            if let Err(e) = write {
                tracing::warn!(path = %path.display(), error = %e, "audit write failed");
                // Drop the handle so the next append retries the open.
                *guard = None;
            }
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).expect("every line is complete JSON"))
            .collect()
    }

    #[test]
    fn trace_id_has_expected_shape() {
        let trace = AuditTrace::new(AuditCategory::SafeFail);
        let (millis, hex) = trace.trace_id().split_once('-').expect("dash separator");
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn trace_ids_are_unique() {
        let a = AuditTrace::new(AuditCategory::Fetch);
        let b = AuditTrace::new(AuditCategory::Fetch);
        assert_ne!(a.trace_id(), b.trace_id());
    }

    #[test]
    fn append_writes_one_line_per_record() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("audit.jsonl");
        let sink = AuditSink::open(&path);

        for i in 0..3 {
            let mut trace = AuditTrace::new(AuditCategory::GuardrailPass);
            trace.set_context("loop", i);
            trace.emit(&sink);
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert_eq!(line["category"], "guardrail_pass");
            assert!(line["trace_id"].is_string());
        }
    }

    #[test]
    fn records_are_self_contained() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("audit.jsonl");
        let sink = AuditSink::open(&path);

        let mut trace = AuditTrace::new(AuditCategory::SafeFail);
        trace.set_context("airport", "KDEN");
        trace.set_context("runway_heading", 260);
        trace.log_input(Some("METAR KDEN ..."), Some("220 @ 10"));
        trace.log_transformation(Some(220.0), Some(10.0));
        trace.log_operation("sin", Some(40.0), "10 × sin(40°)");
        trace.log_result(Some(6.43), Some(7.66));
        trace.emit(&sink);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        let rec = &lines[0];
        assert_eq!(rec["category"], "safe_fail");
        assert_eq!(rec["context"]["airport"], "KDEN");
        assert_eq!(rec["events"].as_array().unwrap().len(), 4);
        assert_eq!(rec["events"][0]["type"], "input");
        assert_eq!(rec["events"][3]["payload"]["crosswind_kt"], 6.43);
    }

    #[test]
    fn append_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join("logs").join("audit.jsonl");
        let sink = AuditSink::open(&path);
        AuditTrace::new(AuditCategory::Fetch).emit(&sink);
        assert_eq!(read_lines(&path).len(), 1);
    }

    #[test]
    fn disabled_sink_swallows_records() {
        let sink = AuditSink::disabled();
        AuditTrace::new(AuditCategory::GuardrailFail).emit(&sink);
        // Nothing to assert beyond "did not panic / did not write anywhere".
    }

    #[test]
    fn appends_across_clones_share_the_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("audit.jsonl");
        let sink = AuditSink::open(&path);
        let clone = sink.clone();

        AuditTrace::new(AuditCategory::Fetch).emit(&sink);
        AuditTrace::new(AuditCategory::Fetch).emit(&clone);

        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn concurrent_appends_never_interleave() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("audit.jsonl");
        let sink = AuditSink::open(&path);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let mut trace = AuditTrace::new(AuditCategory::Fetch);
                        trace.set_context("writer", i);
                        trace.set_context("seq", j);
                        trace.emit(&sink);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("writer thread");
        }

        // Every line parses: no torn records.
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 200);
    }
}
