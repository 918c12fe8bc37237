//! Capture-log sources.
//!
//! The resolver makes no assumption about where records come from; anything
//! implementing [`CaptureSource`] can feed it.

use std::path::{Path, PathBuf};

use rigpose_types::{CaptureRecord, RigError};
use serde_json::Value;
use tracing::debug;

/// A provider of the ordered capture-log records.
pub trait CaptureSource: Send + Sync {
    /// Human-readable description for logs, e.g. the file path.
    fn describe(&self) -> String;

    /// Load every record in log order.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CaptureLog`] if the log cannot be read, or
    /// [`RigError::UnparseableRecord`] for the first entry that does not match
    /// the record shape.
    fn load(&self) -> Result<Vec<CaptureRecord>, RigError>;
}

/// Reads a JSON array of records from disk on every [`load`](CaptureSource::load).
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureSource for JsonFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<CaptureRecord>, RigError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            RigError::CaptureLog(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let records = parse_capture_log(&raw)?;
        debug!(path = %self.path.display(), records = records.len(), "capture log loaded");
        Ok(records)
    }
}

/// Parse a capture log document (a JSON array of records).
///
/// Each entry is decoded separately so the error names the offending index.
pub fn parse_capture_log(raw: &str) -> Result<Vec<CaptureRecord>, RigError> {
    let entries: Vec<Value> = serde_json::from_str(raw)
        .map_err(|e| RigError::CaptureLog(format!("capture log is not a JSON array: {e}")))?;

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(entry).map_err(|e| RigError::UnparseableRecord {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Records already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<CaptureRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<CaptureRecord>) -> Self {
        Self { records }
    }
}

impl CaptureSource for InMemorySource {
    fn describe(&self) -> String {
        format!("in-memory ({} records)", self.records.len())
    }

    fn load(&self) -> Result<Vec<CaptureRecord>, RigError> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_RECORDS: &str = r#"[
        {"id": 4, "camera": {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]], "position": [1,2,3]}},
        {"id": 2, "camera": {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]], "position": [4,5,6]},
         "light":  {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]], "position": [7,8,9], "servo_angles": [1,2,3]}}
    ]"#;

    #[test]
    fn parse_keeps_log_order() {
        let records = parse_capture_log(TWO_RECORDS).unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.frame_id).collect();
        assert_eq!(ids, vec![4, 2]);
        assert!(records[0].light.is_none());
        assert_eq!(records[1].light.as_ref().unwrap().position, [7.0, 8.0, 9.0]);
    }

    #[test]
    fn parse_names_bad_index() {
        let raw = r#"[
            {"id": 0, "camera": {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]], "position": [0,0,0]}},
            {"id": 1}
        ]"#;
        let err = parse_capture_log(raw).unwrap_err();
        assert!(matches!(err, RigError::UnparseableRecord { index: 1, .. }), "{err}");
    }

    #[test]
    fn parse_rejects_non_array() {
        let err = parse_capture_log(r#"{"id": 0}"#).unwrap_err();
        assert!(matches!(err, RigError::CaptureLog(_)));
    }

    #[test]
    fn json_file_source_reads_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("capture_log.json");
        std::fs::write(&path, TWO_RECORDS).unwrap();

        let source = JsonFileSource::new(&path);
        assert_eq!(source.path(), path.as_path());
        assert_eq!(source.load().unwrap().len(), 2);
    }

    #[test]
    fn json_file_source_missing_file_is_capture_log_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let source = JsonFileSource::new(dir.path().join("nope.json"));
        let err = source.load().unwrap_err();
        assert!(matches!(err, RigError::CaptureLog(_)));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn in_memory_source_returns_records() {
        let records = parse_capture_log(TWO_RECORDS).unwrap();
        let source = InMemorySource::new(records.clone());
        assert_eq!(source.load().unwrap(), records);
        assert!(source.describe().contains("2 records"));
    }
}
