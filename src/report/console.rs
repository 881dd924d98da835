// Console sink - per-specification summary lines and a closing tally

use super::{ConfigError, ReportSink, SinkOptions};
use crate::state::{RunStatus, Snapshot};
use anyhow::{Context, Result};
use std::io::{self, Write};
use std::sync::Mutex;

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    specs: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
    duration_ms: u64,
}

/// Console sink
pub struct ConsoleSink {
    verbose: bool,
    out: Mutex<Box<dyn Write + Send>>,
    tally: Mutex<Tally>,
}

impl ConsoleSink {
    pub fn new(verbose: bool) -> Self {
        Self::with_writer(verbose, Box::new(io::stdout()))
    }

    pub fn with_writer(verbose: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            verbose,
            out: Mutex::new(out),
            tally: Mutex::new(Tally::default()),
        }
    }

    /// Options: `verbose` (default false) lists every feature and iteration
    pub fn from_options(options: &SinkOptions) -> Result<Box<dyn ReportSink>, ConfigError> {
        Ok(Box::new(Self::new(options.get_bool("verbose", false)?)))
    }

    fn render(&self, snapshot: &Snapshot) -> String {
        let (passed, failed, skipped) = snapshot.feature_tally();
        let icon = if snapshot.is_skipped() {
            "🔍"
        } else if snapshot.has_failures() {
            "❌"
        } else {
            "✅"
        };

        let mut text = format!(
            "{} {} ({} passed, {} failed, {} skipped in {}ms)\n",
            icon,
            snapshot.spec_id(),
            passed,
            failed,
            skipped,
            snapshot.total_time_ms()
        );

        if let Some(problem) = snapshot.init_error() {
            text.push_str(&format!("   • setup spec: {}\n", problem.exception));
        }

        for run in snapshot.features() {
            let show = self.verbose || run.status() == RunStatus::Fail;
            if !show {
                continue;
            }
            let marker = match run.status() {
                RunStatus::Pass => "PASS",
                RunStatus::Fail => "FAIL",
                RunStatus::Skip => "SKIP",
            };
            text.push_str(&format!(
                "   • {} {} ({}ms)\n",
                marker,
                run.id(),
                run.total_time_ms()
            ));
            for iteration in run.iterations() {
                if self.verbose {
                    text.push_str(&format!(
                        "      - {} {}ms\n",
                        iteration.id,
                        iteration.elapsed_ms.unwrap_or(0)
                    ));
                }
                for problem in &iteration.problems {
                    text.push_str(&format!("      Error: {}\n", problem.exception));
                }
            }
        }

        if let Some(problem) = snapshot.cleanup_error() {
            text.push_str(&format!("   • cleanup spec: {}\n", problem.exception));
        }

        text
    }

    fn write(&self, text: &str) -> Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .context("Failed to write console report")
    }
}

impl ReportSink for ConsoleSink {
    fn create_report_for(&self, snapshot: &Snapshot) -> Result<()> {
        {
            let (passed, failed, skipped) = snapshot.feature_tally();
            let mut tally = self.tally.lock().unwrap_or_else(|e| e.into_inner());
            tally.specs += 1;
            tally.passed += passed;
            tally.failed += failed;
            tally.skipped += skipped;
            tally.duration_ms += snapshot.total_time_ms();
        }
        self.write(&self.render(snapshot))
    }

    fn done(&self) -> Result<()> {
        let tally = *self.tally.lock().unwrap_or_else(|e| e.into_inner());
        let rule = "═".repeat(80);
        let status = if tally.failed > 0 {
            format!("❌ FAILED ({} failed, {} passed)", tally.failed, tally.passed)
        } else {
            format!("✅ PASSED ({} passed)", tally.passed)
        };
        let text = format!(
            "{rule}\n{}\n   • Specifications: {}\n   • Features: {} passed, {} failed, {} skipped\n   • Duration: {}ms\n{rule}\n",
            status,
            tally.specs,
            tally.passed,
            tally.failed,
            tally.skipped,
            tally.duration_ms
        );
        self.write(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpecInfo;
    use chrono::Utc;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_summary_and_tally() {
        let buffer = SharedBuffer::default();
        let sink = ConsoleSink::with_writer(false, Box::new(buffer.clone()));
        let snapshot = Snapshot::new(Arc::new(SpecInfo::new("CalcSpec")), Utc::now());

        sink.create_report_for(&snapshot).unwrap();
        sink.done().unwrap();

        let text = buffer.text();
        assert!(text.contains("✅ CalcSpec (0 passed, 0 failed, 0 skipped in 0ms)"));
        assert!(text.contains("Specifications: 1"));
        assert!(text.contains("PASSED"));
    }
}
