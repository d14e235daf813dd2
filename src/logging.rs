//! Tracing subscriber setup shared by the binaries

use crate::config::LoggingConfig;
use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG` plus the configured level for this library and `target`.
pub fn env_filter(config: &LoggingConfig, target: &str) -> Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env()
        .add_directive(format!("stroke_risk={}", config.level).parse()?);
    if target != "stroke_risk" {
        filter = filter.add_directive(format!("{}={}", target, config.level).parse()?);
    }
    Ok(filter)
}

/// Install the global subscriber. Output goes to stderr so stdout stays
/// free for machine-readable results.
pub fn init(config: &LoggingConfig, target: &str) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config, target)?)
        .with_writer(std::io::stderr);

    match config.format.as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.init(),
        other => bail!("Unknown log format '{}', expected json or pretty", other),
    }

    Ok(())
}
