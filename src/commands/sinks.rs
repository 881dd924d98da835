use crate::report::SinkCatalog;
use anyhow::Result;

/// Print the sink names that can appear in the `sinks` setting
pub fn handle_sinks(catalog: &SinkCatalog) -> Result<()> {
    println!("Available report sinks:");
    for name in catalog.names() {
        println!("  • {}", name);
    }
    Ok(())
}
