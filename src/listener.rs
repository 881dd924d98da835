// Lifecycle callbacks invoked by the host engine

use crate::model::{ErrorInfo, FeatureInfo, IterationInfo, SpecInfo};
use anyhow::Result;

/// Lifecycle hooks.
///
/// Per specification the engine calls `before_spec`, then any interleaving
/// of the feature, iteration and error hooks, then `after_spec`. Different
/// specifications may run on different threads at the same time, and
/// `error` may arrive from a thread other than the one running the
/// specification.
///
/// Only `after_spec` and `spec_skipped` return errors, and only those raised
/// by the report sink.
pub trait RunListener: Send + Sync {
    fn before_spec(&self, _spec: &SpecInfo) {}

    fn before_feature(&self, _feature: &FeatureInfo) {}

    fn before_iteration(&self, _iteration: &IterationInfo) {}

    fn after_iteration(&self, _iteration: &IterationInfo) {}

    fn after_feature(&self, _feature: &FeatureInfo) {}

    fn after_spec(&self, _spec: &SpecInfo) -> Result<()> {
        Ok(())
    }

    fn error(&self, _error: &ErrorInfo) {}

    fn spec_skipped(&self, _spec: &SpecInfo) -> Result<()> {
        Ok(())
    }

    fn feature_skipped(&self, _feature: &FeatureInfo) {}
}
