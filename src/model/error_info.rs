// Error notifications raised by the host engine

use super::{FeatureInfo, IterationInfo, SpecId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase a failure originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Shared field initialization, runs once before `SetupSpec`
    SharedInitializer,
    SetupSpec,
    /// Per-iteration setup, body, cleanup and data providers
    Iteration,
    CleanupSpec,
    /// Failure raised before the specification could be instantiated
    PreInstantiation,
}

impl Phase {
    /// Phases whose failures land in a snapshot's initialization-error slot
    pub fn is_spec_setup(self) -> bool {
        matches!(self, Phase::SharedInitializer | Phase::SetupSpec)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::SharedInitializer => "shared initializer",
            Phase::SetupSpec => "setup spec",
            Phase::Iteration => "iteration",
            Phase::CleanupSpec => "cleanup spec",
            Phase::PreInstantiation => "pre-instantiation",
        };
        f.write_str(name)
    }
}

/// The failure payload itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Exception or error type name, e.g. `AssertionError`
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

impl fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Payload of an `error` callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Specification declaring the failing method, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<SpecId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<FeatureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<IterationInfo>,
    pub phase: Phase,
    pub exception: ExceptionInfo,
}

impl ErrorInfo {
    pub fn new(phase: Phase, exception: ExceptionInfo) -> Self {
        Self {
            spec: None,
            feature: None,
            iteration: None,
            phase,
            exception,
        }
    }

    /// Error raised by a specification-level method (setup or cleanup spec)
    pub fn in_spec(spec: impl Into<SpecId>, phase: Phase, exception: ExceptionInfo) -> Self {
        Self {
            spec: Some(spec.into()),
            ..Self::new(phase, exception)
        }
    }

    /// Error raised while running one iteration
    pub fn in_iteration(iteration: &IterationInfo, exception: ExceptionInfo) -> Self {
        Self {
            spec: Some(iteration.feature.spec.clone()),
            feature: Some(iteration.feature.clone()),
            iteration: Some(iteration.clone()),
            phase: Phase::Iteration,
            exception,
        }
    }

    /// The feature the error belongs to, falling back to the iteration's
    pub fn feature(&self) -> Option<&FeatureInfo> {
        self.feature
            .as_ref()
            .or_else(|| self.iteration.as_ref().map(|i| &i.feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_setup_phases() {
        assert!(Phase::SetupSpec.is_spec_setup());
        assert!(Phase::SharedInitializer.is_spec_setup());
        assert!(!Phase::CleanupSpec.is_spec_setup());
        assert!(!Phase::Iteration.is_spec_setup());
    }

    #[test]
    fn test_feature_falls_back_to_iteration() {
        let feature = FeatureInfo::new("F", "S");
        let iteration = IterationInfo::new("F[0]", feature.clone());
        let mut info = ErrorInfo::in_iteration(&iteration, ExceptionInfo::new("Boom", "x"));
        info.feature = None;

        assert_eq!(info.feature(), Some(&feature));
    }

    #[test]
    fn test_phase_deserializes_snake_case() {
        let phase: Phase = serde_json::from_str("\"cleanup_spec\"").unwrap();
        assert_eq!(phase, Phase::CleanupSpec);
    }
}
