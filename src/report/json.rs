// JSON sink - one JSON document per specification plus a run summary

use super::{ConfigError, ReportSink, SinkOptions};
use crate::state::Snapshot;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const DEFAULT_OUTPUT_DIR: &str = "build/spec-reports";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone, Serialize)]
struct SummaryEntry {
    spec: String,
    file: String,
    features: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
    failures: usize,
    duration_ms: u64,
}

/// JSON sink
pub struct JsonSink {
    output_dir: PathBuf,
    pretty: bool,
    /// File names handed out so far, `summary.json` included
    claimed: Mutex<HashSet<String>>,
    summary: Mutex<Vec<SummaryEntry>>,
}

impl JsonSink {
    pub fn new(output_dir: PathBuf, pretty: bool) -> Self {
        Self {
            output_dir,
            pretty,
            claimed: Mutex::new(HashSet::from([SUMMARY_FILE.to_string()])),
            summary: Mutex::new(Vec::new()),
        }
    }

    /// Options: `output_dir` (default `build/spec-reports`), `pretty`
    /// (default true)
    pub fn from_options(options: &SinkOptions) -> Result<Box<dyn ReportSink>, ConfigError> {
        let output_dir = options
            .get_path("output_dir")
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let pretty = options.get_bool("pretty", true)?;

        fs::create_dir_all(&output_dir).map_err(|e| ConfigError::Creation {
            sink: options.sink().to_string(),
            reason: format!("cannot create {}: {}", output_dir.display(), e),
        })?;

        Ok(Box::new(Self::new(output_dir, pretty)))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reserve a report file name for `spec` that no earlier report used
    fn claim_file_name(&self, spec: &str) -> String {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        let name = unique_file_name(spec, &claimed);
        if name != report_file_name(spec) {
            warn!("Report name for {} already taken, writing {}", spec, name);
        }
        claimed.insert(name.clone());
        name
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create JSON report file: {}", path.display()))?;
        if self.pretty {
            serde_json::to_writer_pretty(file, value)
        } else {
            serde_json::to_writer(file, value)
        }
        .with_context(|| format!("Failed to serialize report to {}", path.display()))
    }
}

/// File name for a specification report
pub fn report_file_name(spec: &str) -> String {
    let stem: String = spec
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.json", stem)
}

/// `report_file_name`, suffixed `-2`, `-3`, ... until it is not in `taken`
pub fn unique_file_name(spec: &str, taken: &HashSet<String>) -> String {
    let name = report_file_name(spec);
    if !taken.contains(&name) {
        return name;
    }
    let stem = name.trim_end_matches(".json");
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}.json", stem, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

impl ReportSink for JsonSink {
    fn create_report_for(&self, snapshot: &Snapshot) -> Result<()> {
        let file_name = self.claim_file_name(snapshot.spec_id().as_str());
        self.write_json(&self.output_dir.join(&file_name), snapshot)?;

        let (passed, failed, skipped) = snapshot.feature_tally();
        self.summary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SummaryEntry {
                spec: snapshot.spec_id().to_string(),
                file: file_name,
                features: snapshot.feature_count(),
                passed,
                failed,
                skipped,
                failures: snapshot.failure_count(),
                duration_ms: snapshot.total_time_ms(),
            });
        Ok(())
    }

    fn done(&self) -> Result<()> {
        let summary = self.summary.lock().unwrap_or_else(|e| e.into_inner());
        self.write_json(&self.output_dir.join(SUMMARY_FILE), &*summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_file_name_sanitizes() {
        assert_eq!(report_file_name("com.acme.MathSpec"), "com.acme.MathSpec.json");
        assert_eq!(report_file_name("a spec/with:odd*chars"), "a_spec_with_odd_chars.json");
    }

    #[test]
    fn test_unique_file_name_appends_counter() {
        let taken: HashSet<String> = ["a_b.json", "a_b-2.json"].map(String::from).into();

        assert_eq!(unique_file_name("a b", &taken), "a_b-3.json");
        assert_eq!(unique_file_name("other", &taken), "other.json");
    }

    #[test]
    fn test_claimed_names_never_repeat() {
        let sink = JsonSink::new(PathBuf::from("unused"), false);

        assert_eq!(sink.claim_file_name("a b"), "a_b.json");
        assert_eq!(sink.claim_file_name("a_b"), "a_b-2.json");
        assert_eq!(sink.claim_file_name("summary"), "summary-2.json");
    }
}
