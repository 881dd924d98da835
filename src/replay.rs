// Replay of recorded lifecycle events
//
// A recording is JSON lines, one event per line:
//   {"at_ms": 0, "event": "before_spec", "spec": {"id": "MathSpec", "features": [...]}}
//   {"at_ms": 12, "event": "before_iteration", "iteration": {"id": "...", "feature": {...}}}
// `at_ms` is an offset from the start of the recording. Blank lines and lines
// starting with `#` are ignored.

use crate::listener::RunListener;
use crate::model::{ErrorInfo, FeatureInfo, IterationInfo, SpecInfo};
use crate::time::ManualClock;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::error;

/// One lifecycle callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    BeforeSpec { spec: SpecInfo },
    AfterSpec { spec: SpecInfo },
    BeforeFeature { feature: FeatureInfo },
    AfterFeature { feature: FeatureInfo },
    BeforeIteration { iteration: IterationInfo },
    AfterIteration { iteration: IterationInfo },
    Error { error: ErrorInfo },
    SpecSkipped { spec: SpecInfo },
    FeatureSkipped { feature: FeatureInfo },
}

impl LifecycleEvent {
    /// Invoke the matching hook on `listener`
    pub fn dispatch(&self, listener: &dyn RunListener) -> Result<()> {
        match self {
            LifecycleEvent::BeforeSpec { spec } => listener.before_spec(spec),
            LifecycleEvent::AfterSpec { spec } => return listener.after_spec(spec),
            LifecycleEvent::BeforeFeature { feature } => listener.before_feature(feature),
            LifecycleEvent::AfterFeature { feature } => listener.after_feature(feature),
            LifecycleEvent::BeforeIteration { iteration } => listener.before_iteration(iteration),
            LifecycleEvent::AfterIteration { iteration } => listener.after_iteration(iteration),
            LifecycleEvent::Error { error } => listener.error(error),
            LifecycleEvent::SpecSkipped { spec } => return listener.spec_skipped(spec),
            LifecycleEvent::FeatureSkipped { feature } => listener.feature_skipped(feature),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayRecord {
    #[serde(default)]
    pub at_ms: Option<u64>,
    #[serde(flatten)]
    pub event: LifecycleEvent,
}

/// Outcome of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub sink_failures: usize,
}

/// Parse a JSON-lines recording
pub fn parse_records(input: &str) -> Result<Vec<ReplayRecord>> {
    let mut records = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(line)
            .with_context(|| format!("Invalid event on line {}", index + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Feed `records` to `listener`, moving `clock` to each record's offset
/// first. Sink failures are logged and counted, never fatal.
pub fn replay(
    records: &[ReplayRecord],
    listener: &dyn RunListener,
    clock: &ManualClock,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    for record in records {
        if let Some(at) = record.at_ms {
            clock.set_ms(at);
        }
        if let Err(e) = record.event.dispatch(listener) {
            error!("Report sink failed: {:#}", e);
            summary.sink_failures += 1;
        }
        summary.events += 1;
    }
    summary
}
