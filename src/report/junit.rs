// JUnit sink - writes all specifications into one JUnit XML file

use super::{ConfigError, ReportSink, SinkOptions, escape_xml};
use crate::state::{Problem, RunStatus, Snapshot};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

pub const DEFAULT_OUTPUT: &str = "build/spec-reports/junit.xml";

#[derive(Debug, Default)]
struct Totals {
    tests: usize,
    failures: usize,
    errors: usize,
    skipped: usize,
    time_ms: u64,
}

/// JUnit sink
pub struct JunitSink {
    output_path: PathBuf,
    suite_name: String,
    suites: Mutex<(Vec<String>, Totals)>,
}

impl JunitSink {
    pub fn new(output_path: PathBuf, suite_name: impl Into<String>) -> Self {
        Self {
            output_path,
            suite_name: suite_name.into(),
            suites: Mutex::new((Vec::new(), Totals::default())),
        }
    }

    /// Options: `output` (default `build/spec-reports/junit.xml`),
    /// `suite_name` (default `specreport`)
    pub fn from_options(options: &SinkOptions) -> Result<Box<dyn ReportSink>, ConfigError> {
        let output_path = options
            .get_path("output")
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        if output_path.as_os_str().is_empty() {
            return Err(options.invalid("output", "path is empty"));
        }
        let suite_name = options.get("suite_name").unwrap_or("specreport");
        Ok(Box::new(Self::new(output_path, suite_name)))
    }
}

fn failure_element(tag: &str, problem: &Problem) -> String {
    let message = escape_xml(&problem.exception.message);
    let body = escape_xml(problem.exception.trace.as_deref().unwrap_or(&problem.exception.message));
    format!(
        "      <{tag} message=\"{}\" type=\"{}\">{}</{tag}>\n",
        message,
        escape_xml(&problem.exception.kind),
        body
    )
}

fn spec_level_case(xml: &mut String, spec: &str, name: &str, problem: &Problem) {
    xml.push_str(&format!(
        "    <testcase name=\"{}\" classname=\"{}\" time=\"0.000\">\n",
        name, spec
    ));
    xml.push_str(&failure_element("error", problem));
    xml.push_str("    </testcase>\n");
}

/// Render one `<testsuite>` element and count what it contains
fn render_suite(snapshot: &Snapshot, totals: &mut Totals) -> String {
    let spec = escape_xml(snapshot.spec_id().as_str());
    let mut cases = String::new();
    let (mut tests, mut failures, mut errors, mut skipped) = (0, 0, 0, 0);

    if let Some(problem) = snapshot.init_error() {
        spec_level_case(&mut cases, &spec, "setupSpec", problem);
        tests += 1;
        errors += 1;
    }

    for run in snapshot.features() {
        tests += 1;
        cases.push_str(&format!(
            "    <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\">\n",
            escape_xml(run.id().as_str()),
            spec,
            run.total_time_ms() as f64 / 1000.0
        ));
        match run.status() {
            RunStatus::Skip => {
                skipped += 1;
                cases.push_str("      <skipped />\n");
            }
            RunStatus::Fail => {
                failures += 1;
                for problem in run.iterations().iter().flat_map(|i| i.problems.iter()) {
                    cases.push_str(&failure_element("failure", problem));
                }
            }
            RunStatus::Pass => {}
        }
        cases.push_str("    </testcase>\n");
    }

    if let Some(problem) = snapshot.cleanup_error() {
        spec_level_case(&mut cases, &spec, "cleanupSpec", problem);
        tests += 1;
        errors += 1;
    }

    totals.tests += tests;
    totals.failures += failures;
    totals.errors += errors;
    totals.skipped += skipped;
    totals.time_ms += snapshot.total_time_ms();

    format!(
        "  <testsuite name=\"{}\" timestamp=\"{}\" time=\"{:.3}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\">\n{}  </testsuite>\n",
        spec,
        snapshot.start_time().format("%Y-%m-%dT%H:%M:%S"),
        snapshot.total_time_ms() as f64 / 1000.0,
        tests,
        failures,
        errors,
        skipped,
        cases
    )
}

impl ReportSink for JunitSink {
    fn create_report_for(&self, snapshot: &Snapshot) -> Result<()> {
        let mut guard = self.suites.lock().unwrap_or_else(|e| e.into_inner());
        let (suites, totals) = &mut *guard;
        let suite = render_suite(snapshot, totals);
        suites.push(suite);
        Ok(())
    }

    fn done(&self) -> Result<()> {
        let guard = self.suites.lock().unwrap_or_else(|e| e.into_inner());
        let (suites, totals) = &*guard;

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuites name=\"{}\" time=\"{:.3}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\">\n",
            escape_xml(&self.suite_name),
            totals.time_ms as f64 / 1000.0,
            totals.tests,
            totals.failures,
            totals.errors,
            totals.skipped
        ));
        for suite in suites {
            xml.push_str(suite);
        }
        xml.push_str("</testsuites>\n");

        if let Some(parent) = self.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut file = File::create(&self.output_path).with_context(|| {
            format!(
                "Failed to create JUnit report file: {}",
                self.output_path.display()
            )
        })?;
        file.write_all(xml.as_bytes())
            .context("Failed to write JUnit XML content")?;

        Ok(())
    }
}
