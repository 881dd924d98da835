pub mod aggregator;
pub mod cli;
pub mod commands;
pub mod config;
pub mod listener;
pub mod logging;
pub mod model;
pub mod replay;
pub mod report;
pub mod setup;
pub mod state;
pub mod time;

pub use aggregator::ReportAggregator;
pub use listener::RunListener;
pub use report::ReportSink;
pub use state::Snapshot;
