use crate::model::{FeatureId, SpecId};

/// Failures inside the aggregator. None of these reach the host engine;
/// they are logged where they are raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("specification {0} is already running")]
    AlreadyRunning(SpecId),

    #[error("no running specification owns feature {0}")]
    FeatureUnresolved(FeatureId),

    #[error("feature {feature} was never declared in specification {spec}")]
    FeatureRunMissing { spec: SpecId, feature: FeatureId },

    #[error("snapshot for {0} was already handed to the report sink")]
    AlreadyFinalized(SpecId),
}
