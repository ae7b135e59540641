//! # Observability
//!
//! Structured logging for the MediPulse client.
//!
//! A binary calls [`init_with_config`] once at startup and uses the
//! `tracing` macros everywhere else; library crates never install a
//! subscriber. Every event is appended as one JSON object to the configured
//! log file, so it can be followed with `tail -f client.jsonl | jq`.
//!
//! Two things shape each line:
//!
//! - fields recorded on enclosing spans (the `request_id`, `method` and
//!   `path` of an API call) are copied onto every event inside them
//! - any field whose name or value looks like a credential is written as
//!   `[REDACTED]`; tokens, `Authorization` headers and passwords never reach
//!   the file

mod json_layer;
mod log_file;
mod redact;

use std::io;
use std::path::PathBuf;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use json_layer::JsonLayer;
use log_file::LogFile;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Written into every line as `service`.
    pub service_name: String,
    /// Default level; `RUST_LOG` takes precedence when set.
    pub level: Level,
    /// JSONL file to append to.
    pub log_path: PathBuf,
    /// Mirror events to stderr in compact form.
    pub also_stderr: bool,
}

/// Install the global subscriber.
///
/// Falls back to stderr-only output when the log file cannot be opened.
/// Later calls are ignored.
pub fn init_with_config(config: LogConfig) {
    match LogFile::open(&config.log_path) {
        Ok(file) => {
            let json = JsonLayer::new(config.service_name.clone(), file)
                .with_filter(env_filter(config.level));
            let stderr = config.also_stderr.then(|| stderr_layer(config.level));
            let installed = tracing_subscriber::registry()
                .with(json)
                .with(stderr)
                .try_init()
                .is_ok();
            if installed {
                tracing::debug!(log_path = %config.log_path.display(), "Logging initialized");
            }
        }
        Err(e) => {
            eprintln!(
                "observability: cannot open {} ({}), logging to stderr",
                config.log_path.display(),
                e
            );
            let _ = tracing_subscriber::registry()
                .with(stderr_layer(config.level))
                .try_init();
        }
    }
}

/// `RUST_LOG` if set, otherwise `level` for every target.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

fn stderr_layer<S>(level: Level) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_writer(io::stderr)
        .with_filter(env_filter(level))
}
