//! Append-only log of served predictions.
//!
//! Each successful forecast can be recorded as one JSON line. The core never
//! reads the log back.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Model name stamped on forecast records.
pub const DEFAULT_MODEL_NAME: &str = "ensemble_v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub features_json: serde_json::Value,
    pub output_json: serde_json::Value,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Record `features` and `output`, stamped now.
    pub fn new<F: Serialize, O: Serialize>(features: &F, output: &O) -> Result<Self> {
        Ok(Self {
            features_json: serde_json::to_value(features)?,
            output_json: serde_json::to_value(output)?,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            created_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }
}

/// A JSON Lines file opened for appending.
#[derive(Debug)]
pub struct PredictionLog {
    path: PathBuf,
    file: File,
}

impl PredictionLog {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &PredictionRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Forecast;
    use tempfile::TempDir;

    #[test]
    fn test_append_writes_one_line_per_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs/predictions.jsonl");

        let mut log = PredictionLog::open(&path).unwrap();
        let features = serde_json::json!({"humidity": 80});
        let record = PredictionRecord::new(&features, &Forecast::default()).unwrap();
        log.append(&record).unwrap();
        log.append(&record.clone().with_model_name("rf_only")).unwrap();
        drop(log);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: PredictionRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(first.features_json["humidity"], 80);
        assert!(first.output_json["temp_c_pred"].is_null());
    }

    #[test]
    fn test_reopen_appends() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("p.jsonl");
        let record = PredictionRecord::new(&1, &2).unwrap();
        PredictionLog::open(&path).unwrap().append(&record).unwrap();
        PredictionLog::open(&path).unwrap().append(&record).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
