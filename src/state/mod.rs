// State module - per-specification run records
// A Snapshot is built up while the specification runs and handed to the
// report sink once it finishes.

pub mod feature;
pub mod problem;

pub use feature::{FeatureRun, IterationRun, StopOutcome};
pub use problem::Problem;

use crate::model::{FeatureId, SpecId, SpecInfo};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Outcome of a feature or iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Pass,
    Fail,
    Skip,
}

fn serialize_spec_id<S: Serializer>(
    spec: &Arc<SpecInfo>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    spec.id.serialize(serializer)
}

/// Report-ready state of one specification run
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    #[serde(serialize_with = "serialize_spec_id")]
    spec: Arc<SpecInfo>,
    start_time: DateTime<Utc>,
    total_time_ms: u64,
    skipped: bool,
    init_error: Option<Problem>,
    cleanup_error: Option<Problem>,
    features: Vec<FeatureRun>,
}

impl Snapshot {
    /// Create an empty snapshot for a specification that just started
    pub fn new(spec: Arc<SpecInfo>, start_time: DateTime<Utc>) -> Self {
        Self {
            spec,
            start_time,
            total_time_ms: 0,
            skipped: false,
            init_error: None,
            cleanup_error: None,
            features: Vec::new(),
        }
    }

    pub fn spec(&self) -> &SpecInfo {
        &self.spec
    }

    pub fn spec_id(&self) -> &SpecId {
        &self.spec.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Total elapsed time, zero until the snapshot is finalized
    pub fn total_time_ms(&self) -> u64 {
        self.total_time_ms
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn init_error(&self) -> Option<&Problem> {
        self.init_error.as_ref()
    }

    pub fn cleanup_error(&self) -> Option<&Problem> {
        self.cleanup_error.as_ref()
    }

    /// Feature runs in discovery order
    pub fn features(&self) -> &[FeatureRun] {
        &self.features
    }

    pub fn feature_run(&self, id: &FeatureId) -> Option<&FeatureRun> {
        self.features.iter().find(|f| f.id() == id)
    }

    pub(crate) fn feature_run_mut(&mut self, id: &FeatureId) -> Option<&mut FeatureRun> {
        self.features.iter_mut().find(|f| f.id() == id)
    }

    /// Append a feature run. Returns `false` and keeps the existing run if
    /// the feature was already declared.
    pub(crate) fn add_feature(&mut self, run: FeatureRun) -> bool {
        if self.feature_run(run.id()).is_some() {
            return false;
        }
        self.features.push(run);
        true
    }

    /// Store the initialization error, returning the one it replaced
    pub(crate) fn set_init_error(&mut self, problem: Problem) -> Option<Problem> {
        self.init_error.replace(problem)
    }

    /// Store the cleanup error, returning the one it replaced
    pub(crate) fn set_cleanup_error(&mut self, problem: Problem) -> Option<Problem> {
        self.cleanup_error.replace(problem)
    }

    pub(crate) fn mark_skipped(&mut self) {
        self.skipped = true;
    }

    pub(crate) fn finalize(&mut self, total_time_ms: u64) {
        self.total_time_ms = total_time_ms;
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn iteration_count(&self) -> usize {
        self.features.iter().map(|f| f.iterations().len()).sum()
    }

    /// Failures across all iterations plus the spec-level slots
    pub fn failure_count(&self) -> usize {
        let slots =
            usize::from(self.init_error.is_some()) + usize::from(self.cleanup_error.is_some());
        self.features.iter().map(FeatureRun::failure_count).sum::<usize>() + slots
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Count features by status: (passed, failed, skipped)
    pub fn feature_tally(&self) -> (usize, usize, usize) {
        self.features
            .iter()
            .fold((0, 0, 0), |(pass, fail, skip), f| match f.status() {
                RunStatus::Pass => (pass + 1, fail, skip),
                RunStatus::Fail => (pass, fail + 1, skip),
                RunStatus::Skip => (pass, fail, skip + 1),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExceptionInfo, FeatureInfo, IterationId, Phase};
    use std::time::Instant;

    fn snapshot() -> Snapshot {
        Snapshot::new(Arc::new(SpecInfo::new("S")), Utc::now())
    }

    #[test]
    fn test_duplicate_feature_is_rejected() {
        let mut snap = snapshot();
        assert!(snap.add_feature(FeatureRun::new(FeatureInfo::new("F", "S"))));
        assert!(!snap.add_feature(FeatureRun::new(FeatureInfo::new("F", "S"))));
        assert_eq!(snap.feature_count(), 1);
    }

    #[test]
    fn test_setup_slot_overwrite_returns_previous() {
        let mut snap = snapshot();
        let first = Problem::spec_level(Phase::SetupSpec, ExceptionInfo::new("E", "first"));
        let second = Problem::spec_level(Phase::SetupSpec, ExceptionInfo::new("E", "second"));

        assert!(snap.set_init_error(first).is_none());
        let replaced = snap.set_init_error(second).unwrap();

        assert_eq!(replaced.message(), "first");
        assert_eq!(snap.init_error().unwrap().message(), "second");
        assert_eq!(snap.failure_count(), 1);
    }

    #[test]
    fn test_feature_tally() {
        let mut snap = snapshot();
        snap.add_feature(FeatureRun::new(FeatureInfo::new("ok", "S")));
        snap.add_feature(FeatureRun::new(FeatureInfo::new("skip", "S").skipped()));
        snap.add_feature(FeatureRun::new(FeatureInfo::new("bad", "S")));
        let bad = snap.feature_run_mut(&FeatureId::new("bad")).unwrap();
        let iteration = IterationId::new("bad[0]");
        bad.start_iteration(&iteration, Instant::now());
        bad.add_problem(
            &iteration,
            Problem::in_iteration(
                FeatureId::new("bad"),
                iteration.clone(),
                ExceptionInfo::new("E", "x"),
            ),
        );

        assert_eq!(snap.feature_tally(), (1, 1, 1));
        assert!(snap.has_failures());
        assert_eq!(snap.iteration_count(), 1);
    }

    #[test]
    fn test_snapshot_serializes_spec_as_id() {
        let snap = snapshot();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["spec"], "S");
        assert_eq!(json["total_time_ms"], 0);
        assert!(json["features"].as_array().unwrap().is_empty());
    }
}
