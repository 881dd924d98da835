use crate::cli::ReplayArgs;
use crate::config::ReportConfig;
use crate::replay::{parse_records, replay};
use crate::report::SinkCatalog;
use crate::setup;
use crate::time::{Clock, ManualClock};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

/// Replay a recording through the configured sinks
pub fn handle_replay(
    args: &ReplayArgs,
    report: &ReportConfig,
    catalog: &SinkCatalog,
) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read recording: {}", args.file.display()))?;
    let records = parse_records(&content)
        .with_context(|| format!("Failed to parse recording: {}", args.file.display()))?;

    let clock = Arc::new(ManualClock::new());
    let shared: Arc<dyn Clock> = clock.clone();
    let Some(aggregator) = setup::attach(report, catalog, shared) else {
        info!("Parsed {} events, nothing to report", records.len());
        return Ok(());
    };

    let summary = replay(&records, &aggregator, &clock);
    let finished = aggregator.done();
    if let Err(e) = &finished {
        error!("Report sink failed to finish: {:#}", e);
    }
    info!(
        "Replayed {} events, {} report failures",
        summary.events, summary.sink_failures
    );

    if args.strict {
        if summary.sink_failures > 0 {
            anyhow::bail!("{} report(s) could not be created", summary.sink_failures);
        }
        finished?;
    }
    Ok(())
}
