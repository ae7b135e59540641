//! Logging initialization for client binaries.
//!
//! Thin wrapper over the `observability` package: structured JSONL goes to
//! the log file under the client's base directory, with an optional compact
//! copy on stderr.

use crate::{CoreError, CoreResult, Paths};
use observability::LogConfig;
use tracing::Level;

/// Initialize the logging system.
///
/// * `level` - default level when `RUST_LOG` is unset
/// * `paths` - decides where the JSONL file lives
/// * `also_stderr` - mirror events to stderr (verbose CLI runs)
///
/// ```ignore
/// init_logging(parse_level(&config.log_level)?, &paths, false);
/// tracing::info!("client started");
/// ```
pub fn init_logging(level: Level, paths: &Paths, also_stderr: bool) {
    observability::init_with_config(LogConfig {
        service_name: "medipulse-cli".into(),
        level,
        log_path: paths.log_file(),
        also_stderr,
    });
}

/// Parse a configured log level. Unknown names are a configuration error.
pub fn parse_level(level: &str) -> CoreResult<Level> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(CoreError::Config(format!(
            "unknown log level '{}' (expected trace, debug, info, warn or error)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_all_variants() {
        assert_eq!(parse_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_level("warn").unwrap(), Level::WARN);
        assert_eq!(parse_level("warning").unwrap(), Level::WARN);
        assert_eq!(parse_level("error").unwrap(), Level::ERROR);
    }

    #[test]
    fn parse_level_case_insensitive() {
        assert_eq!(parse_level("Debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level(" WARNING ").unwrap(), Level::WARN);
    }

    #[test]
    fn parse_level_rejects_unknown_names() {
        assert!(matches!(parse_level(""), Err(CoreError::Config(_))));
        assert!(matches!(parse_level("verbose"), Err(CoreError::Config(_))));
    }
}
