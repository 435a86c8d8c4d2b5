use anyhow::Result;
use tracing_subscriber::EnvFilter;
use volley_config::{LogFormat, LoggingConfig};

/// Build the filter for a config: base level first, then per-target directives
pub fn build_filter(config: &LoggingConfig, level_override: Option<&str>) -> EnvFilter {
    let level = level_override
        .map(str::to_string)
        .unwrap_or_else(|| config.level.to_string());

    let spec = std::iter::once(level)
        .chain(config.directives.iter().cloned())
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::try_new(&spec)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize logging from configuration
///
/// `level_override` (usually `--log-level`) replaces the configured level.
pub fn init_tracing(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let env_filter = build_filter(config, level_override);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_config::LogLevel;

    #[test]
    fn test_filter_includes_directives() {
        let config = LoggingConfig {
            level: LogLevel::Info,
            directives: vec!["hyper=warn".to_string(), "volley_core=trace".to_string()],
            ..Default::default()
        };

        let filter = build_filter(&config, None).to_string();
        assert!(filter.contains("info"));
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("volley_core=trace"));
    }

    #[test]
    fn test_override_replaces_level() {
        let config = LoggingConfig::default();
        let filter = build_filter(&config, Some("debug")).to_string();
        assert!(filter.contains("debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig::default();
        assert!(init_tracing(&config, None).is_ok());
        assert!(init_tracing(&config, Some("trace")).is_ok());
        assert!(init_simple_tracing("info").is_ok());
    }
}
