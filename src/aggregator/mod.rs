// Aggregator module - turns lifecycle callbacks into snapshots

pub mod attribution;
pub mod error;
pub mod registry;
pub mod resolver;

pub use attribution::{Attribution, ErrorAttributor};
pub use error::TrackerError;
pub use registry::{LiveSpec, SpecRegistry};
pub use resolver::FeatureResolver;

use crate::listener::RunListener;
use crate::model::{ErrorInfo, FeatureInfo, IterationInfo, SpecInfo};
use crate::report::ReportSink;
use crate::state::{FeatureRun, StopOutcome};
use crate::time::{Clock, SystemClock, elapsed_ms};
use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

/// Collects lifecycle events per specification and hands each finished
/// snapshot to the report sink exactly once.
pub struct ReportAggregator {
    registry: SpecRegistry,
    resolver: FeatureResolver,
    sink: Box<dyn ReportSink>,
    clock: Arc<dyn Clock>,
    finished: AtomicBool,
}

impl ReportAggregator {
    pub fn new(sink: Box<dyn ReportSink>) -> Self {
        Self::with_clock(sink, Arc::new(SystemClock))
    }

    pub fn with_clock(sink: Box<dyn ReportSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: SpecRegistry::new(),
            resolver: FeatureResolver::new(),
            sink,
            clock,
            finished: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &SpecRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &FeatureResolver {
        &self.resolver
    }

    /// Tell the sink the whole run is over. Only the first call reaches it.
    pub fn done(&self) -> Result<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            debug!("Report sink already finished");
            return Ok(());
        }
        self.sink.done()
    }

    /// Register a run for `spec`; `None` if the identity is still running
    fn start_spec(&self, spec: &SpecInfo) -> Option<Arc<LiveSpec>> {
        let started = self.registry.begin(
            Arc::new(spec.clone()),
            self.clock.wall(),
            self.clock.now(),
        );
        match started {
            Ok(live) => {
                debug!("Specification {} started", spec.id);
                Some(live)
            }
            Err(e) => {
                error!("{}; keeping the existing run", e);
                None
            }
        }
    }

    fn declare_feature(&self, feature: &FeatureInfo) {
        match self.resolver.resolve_for_declaration(&self.registry, feature) {
            Some(live) => self.declare_in(&live, feature, false),
            None => warn!(
                "{}; dropping feature start",
                TrackerError::FeatureUnresolved(feature.id.clone())
            ),
        }
    }

    fn declare_in(&self, live: &LiveSpec, feature: &FeatureInfo, skipped: bool) {
        let mut run = FeatureRun::new(feature.clone());
        if skipped {
            run.mark_skipped();
        }

        match live.with_snapshot(|snap| snap.add_feature(run)) {
            Ok(true) => debug!("Feature {} declared in {}", feature.id, live.spec().id),
            Ok(false) => warn!(
                "Feature {} declared twice in {}, keeping the first run",
                feature.id,
                live.spec().id
            ),
            Err(e) => warn!("{}; dropping feature start of {}", e, feature.id),
        }
    }

    /// Close `feature` in `live` so later events of a shared inherited
    /// feature move on to the next run that still has it open
    fn complete_in(&self, live: &Arc<LiveSpec>, feature: &FeatureInfo) {
        let completed =
            live.with_snapshot(|snap| snap.feature_run_mut(&feature.id).map(FeatureRun::complete));
        match completed {
            Ok(Some(())) => debug!("Feature {} finished in {}", feature.id, live.spec().id),
            Ok(None) => warn!(
                "{}; ignoring feature end",
                TrackerError::FeatureRunMissing {
                    spec: live.spec().id.clone(),
                    feature: feature.id.clone(),
                }
            ),
            Err(e) => debug!("{}; ignoring feature end of {}", e, feature.id),
        }
        self.resolver.evict(&feature.id, live);
    }

    /// Resolve the iteration's feature run and apply `f` to it
    fn with_feature_run<R>(
        &self,
        iteration: &IterationInfo,
        f: impl FnOnce(&mut FeatureRun) -> R,
    ) -> Result<R, TrackerError> {
        let feature = &iteration.feature;
        let live = self
            .resolver
            .resolve(&self.registry, feature)
            .ok_or_else(|| TrackerError::FeatureUnresolved(feature.id.clone()))?;

        live.with_snapshot(|snap| match snap.feature_run_mut(&feature.id) {
            Some(run) => Ok(f(run)),
            None => Err(TrackerError::FeatureRunMissing {
                spec: live.spec().id.clone(),
                feature: feature.id.clone(),
            }),
        })?
    }

    fn attribute(&self, error: &ErrorInfo) -> Result<Attribution, TrackerError> {
        ErrorAttributor::new(&self.registry, &self.resolver).attribute(error)
    }
}

impl RunListener for ReportAggregator {
    fn before_spec(&self, spec: &SpecInfo) {
        self.start_spec(spec);
    }

    fn before_feature(&self, feature: &FeatureInfo) {
        self.declare_feature(feature);
    }

    fn before_iteration(&self, iteration: &IterationInfo) {
        let now = self.clock.now();
        let started =
            self.with_feature_run(iteration, |run| run.start_iteration(&iteration.id, now));
        if let Err(e) = started {
            warn!("{}; dropping start of iteration {}", e, iteration.id);
        }
    }

    fn after_iteration(&self, iteration: &IterationInfo) {
        let now = self.clock.now();
        match self.with_feature_run(iteration, |run| run.stop_iteration(&iteration.id, now)) {
            Ok(StopOutcome::Measured(ms)) => {
                debug!("Iteration {} finished in {}ms", iteration.id, ms)
            }
            Ok(StopOutcome::MissingStart) => warn!(
                "Iteration {} stopped without being started, recording 0ms",
                iteration.id
            ),
            Err(e) => warn!("{}; dropping end of iteration {}", e, iteration.id),
        }
    }

    fn after_feature(&self, feature: &FeatureInfo) {
        match self.resolver.resolve(&self.registry, feature) {
            Some(live) => self.complete_in(&live, feature),
            None => debug!("Feature {} finished outside any running specification", feature.id),
        }
    }

    fn after_spec(&self, spec: &SpecInfo) -> Result<()> {
        let Some(live) = self.registry.end(&spec.id) else {
            debug!("Specification {} already finalized", spec.id);
            return Ok(());
        };
        let Some(mut snapshot) = live.take() else {
            debug!("Snapshot of {} already handed off", spec.id);
            return Ok(());
        };

        snapshot.finalize(elapsed_ms(live.started_at(), self.clock.now()));
        debug!(
            "Specification {} finished in {}ms with {} features",
            spec.id,
            snapshot.total_time_ms(),
            snapshot.feature_count()
        );
        self.sink.create_report_for(&snapshot)
    }

    fn error(&self, error: &ErrorInfo) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.attribute(error)));
        match outcome {
            Ok(Ok(Attribution::PreInstantiation)) => warn!(
                "Error before any specification was running ({} phase): {}",
                error.phase, error.exception
            ),
            Ok(Ok(attribution)) => debug!("Recorded {} as {:?}", error.exception, attribution),
            Ok(Err(e)) => error!("Failed to record {}: {}", error.exception, e),
            Err(_) => error!("Recording {} panicked; error dropped", error.exception),
        }
    }

    fn spec_skipped(&self, spec: &SpecInfo) -> Result<()> {
        let Some(live) = self.start_spec(spec) else {
            warn!("Skip of {} ignored, it is already running", spec.id);
            return Ok(());
        };
        if let Err(e) = live.with_snapshot(|snap| snap.mark_skipped()) {
            warn!("{}; cannot mark {} skipped", e, spec.id);
        }
        for feature in &spec.features {
            self.declare_in(&live, feature, true);
            self.complete_in(&live, feature);
        }
        self.after_spec(spec)
    }

    fn feature_skipped(&self, feature: &FeatureInfo) {
        debug!("Feature {} skipped", feature.id);
    }
}
