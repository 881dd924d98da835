#![allow(dead_code)]

use specreport::ReportSink;
use specreport::model::{ExceptionInfo, FeatureInfo, IterationInfo, SpecInfo};
use specreport::state::Snapshot;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Sink that keeps every snapshot it receives
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub snapshots: Arc<Mutex<Vec<Snapshot>>>,
    pub done_calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn boxed(&self) -> Box<dyn ReportSink> {
        Box::new(self.clone())
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn only(&self) -> Snapshot {
        let snapshots = self.snapshots();
        assert_eq!(snapshots.len(), 1, "expected exactly one snapshot");
        snapshots.into_iter().next().unwrap()
    }

    pub fn done_calls(&self) -> usize {
        self.done_calls.load(Ordering::SeqCst)
    }
}

impl ReportSink for RecordingSink {
    fn create_report_for(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        if self.fail {
            anyhow::bail!("recording sink configured to fail");
        }
        Ok(())
    }

    fn done(&self) -> anyhow::Result<()> {
        self.done_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn feature(name: &str, spec: &str) -> FeatureInfo {
    FeatureInfo::new(name, spec)
}

pub fn iteration(feature: &FeatureInfo, index: usize) -> IterationInfo {
    IterationInfo::new(format!("{}[{}]", feature.id, index).as_str(), feature.clone())
}

pub fn spec_with(name: &str, features: &[&str]) -> SpecInfo {
    features
        .iter()
        .fold(SpecInfo::new(name), |spec, f| spec.with_feature(feature(f, name)))
}

pub fn assertion(message: &str) -> ExceptionInfo {
    ExceptionInfo::new("AssertionError", message)
}
