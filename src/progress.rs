//! Ingestion progress reporting.
//!
//! While `kbsync sync` polls an ingestion job, each observed status is
//! reported on **stderr** so stdout stays parseable for scripts. Human mode
//! prints one line per poll:
//!
//! ```text
//! ingest 8QWVWHTHT3  IN_PROGRESS  40s  scanned 1,234  indexed 1,200  failed 0
//! ```
//!
//! JSON mode prints one object per line with the same fields.

use std::io::Write;
use std::time::Duration;

use clap::ValueEnum;

use kb_sync_core::cloud::{IngestionProgress, NoProgress};
use kb_sync_core::models::IngestionJob;

/// Human-friendly progress on stderr.
pub struct StderrProgress;

impl IngestionProgress for StderrProgress {
    fn report(&self, job: &IngestionJob, elapsed: Duration) {
        let mut line = format!(
            "ingest {}  {}  {}s",
            job.id,
            job.status,
            elapsed.as_secs()
        );
        if let Some(ref stats) = job.statistics {
            line.push_str(&format!(
                "  scanned {}  indexed {}  failed {}",
                format_number(stats.documents_scanned),
                format_number(stats.new_documents_indexed + stats.modified_documents_indexed),
                format_number(stats.documents_failed)
            ));
        }
        line.push('\n');
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestionProgress for JsonProgress {
    fn report(&self, job: &IngestionJob, elapsed: Duration) {
        let obj = serde_json::json!({
            "event": "progress",
            "job": job.id,
            "status": job.status.as_str(),
            "elapsed_secs": elapsed.as_secs(),
            "statistics": job.statistics,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestionProgress> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
