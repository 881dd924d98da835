// Sink catalog - maps configured sink names to constructors

use super::{ConsoleSink, JsonSink, JunitSink, MultiSink, ReportSink};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Problems with the report configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no report sink is configured")]
    NoSinksNamed,

    #[error("unknown report sink '{0}'")]
    UnknownSink(String),

    #[error("invalid value for {sink}.{key}: {reason}")]
    InvalidOption {
        sink: String,
        key: String,
        reason: String,
    },

    #[error("report sink '{sink}' could not be created: {reason}")]
    Creation { sink: String, reason: String },
}

/// Key/value options for one sink
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkOptions {
    sink: String,
    values: BTreeMap<String, String>,
}

impl SinkOptions {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn sink(&self) -> &str {
        &self.sink
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                other => Err(self.invalid(key, format!("expected a boolean, got '{}'", other))),
            },
        }
    }

    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidOption {
            sink: self.sink.clone(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Constructor registered under a sink name
pub type SinkFactory = fn(&SinkOptions) -> Result<Box<dyn ReportSink>, ConfigError>;

/// Registered sink constructors
pub struct SinkCatalog {
    factories: BTreeMap<String, SinkFactory>,
}

impl Default for SinkCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkCatalog {
    /// Catalog with the built-in sinks registered
    pub fn new() -> Self {
        let mut catalog = Self::empty();
        catalog.register_defaults();
        catalog
    }

    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    fn register_defaults(&mut self) {
        self.register("console", ConsoleSink::from_options);
        self.register("json", JsonSink::from_options);
        self.register("junit", JunitSink::from_options);
    }

    pub fn register(&mut self, name: &str, factory: SinkFactory) {
        self.factories.insert(name.to_ascii_lowercase(), factory);
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build one sink by name
    pub fn create(
        &self,
        name: &str,
        options: &SinkOptions,
    ) -> Result<Box<dyn ReportSink>, ConfigError> {
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::UnknownSink(name.to_string()))?;
        factory(options)
    }

    /// Build every sink named in a comma-separated list.
    ///
    /// Sinks that cannot be built are logged and skipped. Returns `None` when
    /// nothing is left, a single sink as is, several wrapped in a
    /// `MultiSink`.
    pub fn build(
        &self,
        names: &str,
        options_for: impl Fn(&str) -> SinkOptions,
    ) -> Option<Box<dyn ReportSink>> {
        let names = parse_sink_names(names);
        if names.is_empty() {
            warn!("{}", ConfigError::NoSinksNamed);
            return None;
        }

        let mut sinks = Vec::new();
        for name in names {
            match self.create(&name, &options_for(&name)) {
                Ok(sink) => {
                    info!("Report sink '{}' enabled", name);
                    sinks.push(sink);
                }
                Err(e) => warn!("{}; skipping it", e),
            }
        }

        match sinks.len() {
            0 => None,
            1 => sinks.pop(),
            _ => Some(Box::new(MultiSink::new(sinks))),
        }
    }
}

/// Split a comma-separated sink list, dropping blanks and repeats
pub fn parse_sink_names(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let name = name.to_ascii_lowercase();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
