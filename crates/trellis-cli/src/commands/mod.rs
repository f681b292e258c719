//! CLI command implementations

pub mod check;
pub mod compile;
pub mod completions;
pub mod describe;
pub mod query;

use anyhow::Context;

/// Read a JSON filter given inline or as `@path`
pub fn read_filter(arg: &str) -> anyhow::Result<serde_json::Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter file {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("Filter is not valid JSON")
}
