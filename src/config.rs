// Configuration file handling

use crate::report::SinkOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Turn report generation on or off
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Comma-separated sink names, e.g. "console, json"
    #[serde(default = "default_sinks")]
    pub sinks: String,

    /// Per-sink key/value options, keyed by sink name
    #[serde(default)]
    pub options: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sinks: default_sinks(),
            options: BTreeMap::new(),
        }
    }
}

// Default values
pub const ENV_SPECREPORT_SINKS: &str = "SPECREPORT_SINKS";

fn default_enabled() -> bool {
    true
}

pub fn default_sinks() -> String {
    String::from("console")
}

fn property_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ReportConfig {
    /// Options for one sink as a flat property bag
    pub fn options_for(&self, sink: &str) -> SinkOptions {
        let mut options = SinkOptions::new(sink);
        if let Some(values) = self.options.get(sink) {
            for (key, value) in values {
                options = options.with(key.clone(), property_value(value));
            }
        }
        options
    }

    /// Replace the sink list from `SPECREPORT_SINKS` when it is set
    pub fn apply_env(&mut self) {
        if let Ok(sinks) = std::env::var(ENV_SPECREPORT_SINKS)
            && !sinks.trim().is_empty()
        {
            self.sinks = sinks;
        }
    }
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Option<Self> {
        // Check locations in order:
        // 1. .specreportrc (current directory)
        // 2. ~/.specreportrc (home directory)
        // 3. .specreportrc.toml (current directory)
        // 4. ~/.specreportrc.toml (home directory)

        let cwd = std::env::current_dir().ok()?;
        let home = dirs::home_dir()?;

        let paths = [
            cwd.join(".specreportrc"),
            home.join(".specreportrc"),
            cwd.join(".specreportrc.toml"),
            home.join(".specreportrc.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        None
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Option<Self> {
        toml::from_str(content).ok()
    }

    /// Generate default configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[report]
enabled = true
sinks = "console, junit"

[report.options.junit]
output = "out/junit.xml"

[report.options.console]
verbose = true
"#;

        let config = Config::parse(toml).expect("Failed to parse config");
        assert!(config.report.enabled);
        assert_eq!(config.report.sinks, "console, junit");

        let junit = config.report.options_for("junit");
        assert_eq!(junit.get("output"), Some("out/junit.xml"));
        let console = config.report.options_for("console");
        assert_eq!(console.get_bool("verbose", false), Ok(true));
    }

    #[test]
    fn test_options_for_unknown_sink_is_empty() {
        let config = Config::default();
        let options = config.report.options_for("json");
        assert_eq!(options.sink(), "json");
        assert_eq!(options.get("output_dir"), None);
    }
}
