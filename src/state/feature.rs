// Per-feature and per-iteration run records

use super::{Problem, RunStatus};
use crate::model::{FeatureId, FeatureInfo, IterationId};
use crate::time::elapsed_ms;
use serde::Serialize;
use std::time::Instant;

/// Timing and failures of one iteration
#[derive(Debug, Clone, Serialize)]
pub struct IterationRun {
    pub id: IterationId,
    /// `None` until the iteration stops
    pub elapsed_ms: Option<u64>,
    pub problems: Vec<Problem>,
    #[serde(skip)]
    started_at: Option<Instant>,
}

impl IterationRun {
    fn new(id: IterationId) -> Self {
        Self {
            id,
            elapsed_ms: None,
            problems: Vec::new(),
            started_at: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.problems.is_empty() {
            RunStatus::Pass
        } else {
            RunStatus::Fail
        }
    }
}

/// Result of stopping an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Measured(u64),
    /// No start instant was recorded; elapsed time was set to zero
    MissingStart,
}

/// Everything recorded for one feature within a specification run
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRun {
    feature: FeatureInfo,
    skipped: bool,
    iterations: Vec<IterationRun>,
    /// Set by `after_feature`
    #[serde(skip)]
    completed: bool,
}

impl FeatureRun {
    pub fn new(feature: FeatureInfo) -> Self {
        let skipped = feature.skipped;
        Self {
            feature,
            skipped,
            iterations: Vec::new(),
            completed: false,
        }
    }

    pub(crate) fn mark_skipped(&mut self) {
        self.skipped = true;
    }

    pub(crate) fn complete(&mut self) {
        self.completed = true;
    }

    /// Declared and still waiting for `after_feature`
    pub fn is_open(&self) -> bool {
        !self.completed
    }

    pub fn feature(&self) -> &FeatureInfo {
        &self.feature
    }

    pub fn id(&self) -> &FeatureId {
        &self.feature.id
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Iterations in the order they were first seen
    pub fn iterations(&self) -> &[IterationRun] {
        &self.iterations
    }

    pub fn iteration(&self, id: &IterationId) -> Option<&IterationRun> {
        self.iterations.iter().find(|i| &i.id == id)
    }

    /// Recorded elapsed time of an iteration
    pub fn time_of(&self, id: &IterationId) -> Option<u64> {
        self.iteration(id).and_then(|i| i.elapsed_ms)
    }

    /// Failures recorded for an iteration, in arrival order
    pub fn problems_of(&self, id: &IterationId) -> Option<&[Problem]> {
        self.iteration(id).map(|i| i.problems.as_slice())
    }

    /// Iterations that have a recorded elapsed time
    pub fn timed_iterations(&self) -> usize {
        self.iterations.iter().filter(|i| i.elapsed_ms.is_some()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.iterations.iter().map(|i| i.problems.len()).sum()
    }

    pub fn total_time_ms(&self) -> u64 {
        self.iterations.iter().filter_map(|i| i.elapsed_ms).sum()
    }

    pub fn status(&self) -> RunStatus {
        if self.skipped {
            RunStatus::Skip
        } else if self.failure_count() > 0 {
            RunStatus::Fail
        } else {
            RunStatus::Pass
        }
    }

    fn iteration_mut(&mut self, id: &IterationId) -> &mut IterationRun {
        let index = match self.iterations.iter().position(|i| &i.id == id) {
            Some(index) => index,
            None => {
                self.iterations.push(IterationRun::new(id.clone()));
                self.iterations.len() - 1
            }
        };
        &mut self.iterations[index]
    }

    /// Start (or restart) an iteration with an empty failure list
    pub(crate) fn start_iteration(&mut self, id: &IterationId, at: Instant) {
        let run = self.iteration_mut(id);
        run.problems.clear();
        run.elapsed_ms = None;
        run.started_at = Some(at);
    }

    pub(crate) fn stop_iteration(&mut self, id: &IterationId, at: Instant) -> StopOutcome {
        let run = self.iteration_mut(id);
        match run.started_at.take() {
            Some(start) => {
                let elapsed = elapsed_ms(start, at);
                run.elapsed_ms = Some(elapsed);
                StopOutcome::Measured(elapsed)
            }
            None => {
                run.elapsed_ms = Some(0);
                StopOutcome::MissingStart
            }
        }
    }

    pub(crate) fn add_problem(&mut self, id: &IterationId, problem: Problem) {
        self.iteration_mut(id).problems.push(problem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExceptionInfo;
    use std::time::Duration;

    fn problem(msg: &str) -> Problem {
        Problem::in_iteration(
            FeatureId::new("F"),
            IterationId::new("I"),
            ExceptionInfo::new("AssertionError", msg),
        )
    }

    #[test]
    fn test_start_stop_records_elapsed() {
        let mut run = FeatureRun::new(FeatureInfo::new("F", "S"));
        let id = IterationId::new("I");
        let t0 = Instant::now();

        run.start_iteration(&id, t0);
        let outcome = run.stop_iteration(&id, t0 + Duration::from_millis(42));

        assert_eq!(outcome, StopOutcome::Measured(42));
        assert_eq!(run.time_of(&id), Some(42));
        assert_eq!(run.timed_iterations(), 1);
    }

    #[test]
    fn test_stop_without_start_records_zero() {
        let mut run = FeatureRun::new(FeatureInfo::new("F", "S"));
        let id = IterationId::new("I");

        let outcome = run.stop_iteration(&id, Instant::now());

        assert_eq!(outcome, StopOutcome::MissingStart);
        assert_eq!(run.time_of(&id), Some(0));
    }

    #[test]
    fn test_problems_keep_arrival_order() {
        let mut run = FeatureRun::new(FeatureInfo::new("F", "S"));
        let id = IterationId::new("I");
        run.start_iteration(&id, Instant::now());

        run.add_problem(&id, problem("first"));
        run.add_problem(&id, problem("second"));

        let messages: Vec<&str> = run
            .problems_of(&id)
            .unwrap()
            .iter()
            .map(Problem::message)
            .collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(run.status(), RunStatus::Fail);
    }

    #[test]
    fn test_restart_clears_failures() {
        let mut run = FeatureRun::new(FeatureInfo::new("F", "S"));
        let id = IterationId::new("I");
        run.add_problem(&id, problem("stale"));

        run.start_iteration(&id, Instant::now());

        assert_eq!(run.problems_of(&id).map(<[Problem]>::len), Some(0));
        assert_eq!(run.iterations().len(), 1);
    }

    #[test]
    fn test_skipped_feature_status() {
        let run = FeatureRun::new(FeatureInfo::new("F", "S").skipped());
        assert!(run.is_skipped());
        assert_eq!(run.status(), RunStatus::Skip);
    }
}
