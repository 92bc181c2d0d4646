//! Tracing subscriber setup
//!
//! Filter precedence: `RUST_LOG`, then `-v` flags, then `logging.level`.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// Filter directive used when `RUST_LOG` is unset
pub fn default_directive(verbose: u8, config_level: &str) -> String {
    match verbose {
        0 => config_level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

pub fn init(verbose: u8, format: LogFormat, config_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, config_level)));

    let result = match format {
        LogFormat::Human => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_current_span(true)
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
