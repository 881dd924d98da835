// Attributed failure records

use crate::model::{ExceptionInfo, FeatureId, IterationId, Phase};
use serde::Serialize;

/// One observed failure, tied to the phase it happened in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub phase: Phase,
    pub exception: ExceptionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<FeatureId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<IterationId>,
}

impl Problem {
    /// Failure of a specification-level method
    pub fn spec_level(phase: Phase, exception: ExceptionInfo) -> Self {
        Self {
            phase,
            exception,
            feature: None,
            iteration: None,
        }
    }

    /// Failure inside one iteration of a feature
    pub fn in_iteration(
        feature: FeatureId,
        iteration: IterationId,
        exception: ExceptionInfo,
    ) -> Self {
        Self {
            phase: Phase::Iteration,
            exception,
            feature: Some(feature),
            iteration: Some(iteration),
        }
    }

    pub fn message(&self) -> &str {
        &self.exception.message
    }
}
