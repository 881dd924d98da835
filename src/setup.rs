// Wiring configuration to an aggregator

use crate::aggregator::ReportAggregator;
use crate::config::ReportConfig;
use crate::report::SinkCatalog;
use crate::time::Clock;
use std::sync::Arc;
use tracing::{info, warn};

/// Build an aggregator for the configured sinks.
///
/// Returns `None` when reporting is disabled or no sink could be created;
/// the caller must then not register any listener.
pub fn attach(
    config: &ReportConfig,
    catalog: &SinkCatalog,
    clock: Arc<dyn Clock>,
) -> Option<ReportAggregator> {
    if !config.enabled {
        info!("Reporting disabled, no reports will be produced");
        return None;
    }

    let Some(sink) = catalog.build(&config.sinks, |name| config.options_for(name)) else {
        warn!("No usable report sink configured, no reports will be produced");
        return None;
    };

    Some(ReportAggregator::with_clock(sink, clock))
}
