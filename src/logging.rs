// Log output for the specreport binary
//
// One line per event: `[glyph] LEVEL [HH:MM:SS.mmm] module: message`.
// Glyphs are only drawn when stderr is a terminal, so redirected logs stay
// plain text. The crate prefix is dropped from targets.

use chrono::Local;
use std::io::IsTerminal;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const CRATE_PREFIX: &str = "specreport::";

/// Glyph and fixed-width label for a level
fn level_label(level: &Level) -> (&'static str, &'static str) {
    match *level {
        Level::TRACE => ("🔬", "TRACE"),
        Level::DEBUG => ("🐛", "DEBUG"),
        Level::INFO => ("ℹ️ ", "INFO "),
        Level::WARN => ("⚠️ ", "WARN "),
        Level::ERROR => ("❌", "ERROR"),
    }
}

/// `specreport::aggregator::resolver` becomes `aggregator::resolver`
fn short_target(target: &str) -> &str {
    match target.strip_prefix(CRATE_PREFIX) {
        Some(rest) if !rest.is_empty() => rest,
        _ => target,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EventFormatter {
    glyphs: bool,
}

impl EventFormatter {
    pub fn new(glyphs: bool) -> Self {
        Self { glyphs }
    }

    /// Glyphs on when stderr is attached to a terminal
    pub fn for_stderr() -> Self {
        Self::new(std::io::stderr().is_terminal())
    }
}

impl<S, N> FormatEvent<S, N> for EventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let (glyph, label) = level_label(metadata.level());
        if self.glyphs {
            write!(writer, "{} ", glyph)?;
        }
        write!(
            writer,
            "{} [{}] {}: ",
            label,
            Local::now().format("%H:%M:%S%.3f"),
            short_target(metadata.target())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let filter = if verbose {
        "specreport=debug,warn"
    } else {
        "specreport=warn,error"
    };

    let _ = tracing_subscriber::fmt()
        .event_format(EventFormatter::for_stderr())
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .try_init();
}
