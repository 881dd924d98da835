// Report module - sinks that consume finished snapshots

pub mod catalog;
pub mod console;
pub mod json;
pub mod junit;
pub mod multi;

pub use catalog::{ConfigError, SinkCatalog, SinkFactory, SinkOptions};
pub use console::ConsoleSink;
pub use json::JsonSink;
pub use junit::JunitSink;
pub use multi::MultiSink;

use crate::state::Snapshot;
use anyhow::Result;

/// Consumer of finished snapshots
pub trait ReportSink: Send + Sync {
    /// Called once per finished specification run
    fn create_report_for(&self, snapshot: &Snapshot) -> Result<()>;

    /// Called once when the whole run is over
    fn done(&self) -> Result<()>;
}

/// Escape text for XML attributes and bodies
pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
