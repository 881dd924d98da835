// Error attribution - decides where an error notification is recorded

use super::registry::{LiveSpec, SpecRegistry};
use super::resolver::FeatureResolver;
use super::TrackerError;
use crate::model::ErrorInfo;
use crate::state::Problem;
use std::sync::Arc;
use tracing::warn;

/// Where an error notification ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// No running specification matched; the error was only logged
    PreInstantiation,
    /// Stored in the initialization-error slot
    SetupSlot { replaced: bool },
    /// Appended to an iteration's failure list
    Iteration,
    /// Stored in the cleanup-error slot
    CleanupSlot { replaced: bool },
}

pub struct ErrorAttributor<'a> {
    registry: &'a SpecRegistry,
    resolver: &'a FeatureResolver,
}

impl<'a> ErrorAttributor<'a> {
    pub fn new(registry: &'a SpecRegistry, resolver: &'a FeatureResolver) -> Self {
        Self { registry, resolver }
    }

    fn locate(&self, error: &ErrorInfo) -> Option<Arc<LiveSpec>> {
        if let Some(feature) = error.feature() {
            return self.resolver.resolve(self.registry, feature);
        }
        let spec = error.spec.as_ref()?;
        self.resolver.resolve_spec(self.registry, spec)
    }

    /// Record `error` in the owning snapshot.
    ///
    /// Rules, first match wins: no owner found, spec setup phase, iteration
    /// present, otherwise cleanup.
    pub fn attribute(&self, error: &ErrorInfo) -> Result<Attribution, TrackerError> {
        let Some(live) = self.locate(error) else {
            return Ok(Attribution::PreInstantiation);
        };
        let spec_id = live.spec().id.clone();

        if error.phase.is_spec_setup() {
            let problem = Problem::spec_level(error.phase, error.exception.clone());
            let previous = live.with_snapshot(|snap| snap.set_init_error(problem))?;
            if let Some(previous) = &previous {
                warn!(
                    "Replacing setup error of {} ({}) with {}",
                    spec_id, previous.exception, error.exception
                );
            }
            return Ok(Attribution::SetupSlot {
                replaced: previous.is_some(),
            });
        }

        if let Some(iteration) = &error.iteration {
            let feature_id = iteration.feature.id.clone();
            let problem = Problem::in_iteration(
                feature_id.clone(),
                iteration.id.clone(),
                error.exception.clone(),
            );
            live.with_snapshot(|snap| match snap.feature_run_mut(&feature_id) {
                Some(run) => {
                    run.add_problem(&iteration.id, problem);
                    Ok(())
                }
                None => Err(TrackerError::FeatureRunMissing {
                    spec: spec_id.clone(),
                    feature: feature_id.clone(),
                }),
            })??;
            return Ok(Attribution::Iteration);
        }

        let problem = Problem::spec_level(error.phase, error.exception.clone());
        let previous = live.with_snapshot(|snap| snap.set_cleanup_error(problem))?;
        if let Some(previous) = &previous {
            warn!(
                "Replacing cleanup error of {} ({}) with {}",
                spec_id, previous.exception, error.exception
            );
        }
        Ok(Attribution::CleanupSlot {
            replaced: previous.is_some(),
        })
    }
}
