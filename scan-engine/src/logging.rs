use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration for an embedding scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Whether to include file and line number information
    pub include_file_info: bool,

    /// Whether to enable colored output on stdout
    pub enable_colors: bool,

    /// Log file path; when unset logs go only to stdout
    pub log_file: Option<String>,

    /// Module-specific log levels
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = BTreeMap::new();
        module_levels.insert("scan_engine".to_string(), "info".to_string());
        module_levels.insert("reqwest".to_string(), "warn".to_string());
        module_levels.insert("rustls".to_string(), "warn".to_string());
        module_levels.insert("tokio".to_string(), "warn".to_string());

        Self {
            level: "info".to_string(),
            include_file_info: false,
            enable_colors: true,
            log_file: None,
            module_levels,
        }
    }
}

/// Initialize logging based on the provided configuration.
///
/// Calling this when a global subscriber is already installed is not an error.
pub fn init_logging(config: &LoggingConfig) -> EngineResult<()> {
    if !levels::is_valid_level(&config.level) {
        return Err(EngineError::configuration(
            "logging",
            &format!("invalid log level '{}'", config.level),
        ));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in &config.module_levels {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(directive.parse().map_err(|e| {
            EngineError::configuration("logging", &format!("invalid log directive: {}", e))
        })?);
    }

    let file_layer = match &config.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(create_file_appender(path)?),
        ),
        None => None,
    };

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(config.include_file_info)
                .with_line_number(config.include_file_info)
                .with_ansi(config.enable_colors),
        )
        .with(file_layer)
        .try_init();

    match result {
        Ok(_) => tracing::info!("Logging initialized with level: {}", config.level),
        Err(_) => tracing::debug!("Logging already initialized, skipping"),
    }

    Ok(())
}

fn create_file_appender(log_file: &str) -> EngineResult<tracing_appender::rolling::RollingFileAppender> {
    let log_path = Path::new(log_file);
    let directory = log_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let filename = log_path
        .file_name()
        .ok_or_else(|| EngineError::configuration("logging", "invalid log file name"))?;

    std::fs::create_dir_all(directory).map_err(|e| {
        EngineError::configuration("logging", &format!("failed to create log directory: {}", e))
    })?;

    Ok(tracing_appender::rolling::never(directory, filename))
}

/// Log level utilities
pub mod levels {
    /// Check if a log level string is valid
    pub fn is_valid_level(level: &str) -> bool {
        matches!(
            level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        )
    }
}
