//! Metadata sinks for completed runs.
//!
//! Every successful sync hands its record to the configured sink. Records
//! are always logged; with `[metadata] path` set they are also appended to a
//! JSON-lines file, one object per run:
//!
//! ```json
//! {"recorded_at":"2024-05-01T12:00:00Z","bedrock_rag":{"knowledge_base_id":"...", ...}}
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use kb_sync_core::cloud::MetadataSink;
use kb_sync_core::error::SinkError;

use crate::config::MetadataConfig;

/// Appends each record to a JSON-lines file.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetadataSink for JsonlSink {
    fn record(&self, key: &str, value: &serde_json::Value) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut line = serde_json::Map::new();
        line.insert(
            "recorded_at".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
        line.insert(key.to_string(), value.clone());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&line)?)?;
        Ok(())
    }
}

/// Emits each record as a structured log event.
pub struct LogSink;

impl MetadataSink for LogSink {
    fn record(&self, key: &str, value: &serde_json::Value) -> Result<(), SinkError> {
        info!(key, record = %value, "run metadata recorded");
        Ok(())
    }
}

/// Forwards each record to every inner sink in order, stopping at the
/// first failure.
pub struct FanoutSink {
    sinks: Vec<Box<dyn MetadataSink>>,
}

impl MetadataSink for FanoutSink {
    fn record(&self, key: &str, value: &serde_json::Value) -> Result<(), SinkError> {
        for sink in &self.sinks {
            sink.record(key, value)?;
        }
        Ok(())
    }
}

/// The sink described by `[metadata]`.
pub fn build_sink(config: &MetadataConfig) -> FanoutSink {
    let mut sinks: Vec<Box<dyn MetadataSink>> = vec![Box::new(LogSink)];
    if let Some(ref path) = config.path {
        sinks.push(Box::new(JsonlSink::new(path)));
    }
    FanoutSink { sinks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn jsonl_sink_appends_one_line_per_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("runs").join("kbsync.jsonl");
        let sink = JsonlSink::new(&path);

        sink.record("bedrock_rag", &json!({"ingestion_job_status": "COMPLETE"}))
            .unwrap();
        sink.record("bedrock_rag", &json!({"ingestion_job_status": "COMPLETE"}))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["bedrock_rag"]["ingestion_job_status"], "COMPLETE");
        assert!(first["recorded_at"].as_str().is_some());
    }

    #[test]
    fn fanout_writes_file_when_configured() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("meta.jsonl");
        let sink = build_sink(&MetadataConfig {
            path: Some(path.clone()),
        });
        sink.record("bedrock_rag", &json!({"max_tokens": 512})).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("\"max_tokens\":512"));
    }
}
