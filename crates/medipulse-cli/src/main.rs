//! MediPulse command-line client.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use medipulse_auth::{ApiClient, RefreshError, TokenStore};
use medipulse_config_and_utils::{init_logging, parse_level, Config, Paths};
use medipulse_storage::create_session_vault;
use tracing::debug;

/// MediPulse command-line interface.
#[derive(Parser, Debug)]
#[command(name = "medipulse")]
#[command(about = "Command-line client for the MediPulse API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, session storage and logs. Defaults to ~/.medipulse
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// API base URL, overriding config and MEDIPULSE_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MEDIPULSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "MEDIPULSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session
    Logout,
    /// Show the stored session
    Status,
    /// Send an authenticated request and print the response body
    Request {
        /// HTTP method (GET, POST, PUT, DELETE, ...)
        method: String,
        /// Path relative to the API base URL, e.g. appointments/42
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
        /// Query parameter as key=value; repeatable
        #[arg(long = "query", short = 'q')]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match &cli.base_dir {
        Some(base) => Paths::with_base_dir(base.clone()),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    let mut config = Config::load(&paths)?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;

    init_logging(parse_level(&config.log_level)?, &paths, cli.verbose);
    debug!(api_url = %config.api_url, base_dir = %paths.base_dir().display(), "Starting");

    let tokens = TokenStore::with_vault(create_session_vault(&paths)?)?;
    let client = ApiClient::new(&config, tokens)?;
    client.set_unauthenticated_handler(Box::new(|error: &RefreshError| {
        eprintln!(
            "Your session has ended ({}). Run `medipulse login` to sign in again.",
            error
        );
    }));

    match cli.command {
        Commands::Login { email, password } => commands::login(&client, &email, &password).await,
        Commands::Register {
            name,
            email,
            password,
        } => commands::register(&client, &name, &email, &password).await,
        Commands::Logout => commands::logout(&client).await,
        Commands::Status => commands::status(&client, &config),
        Commands::Request {
            method,
            path,
            data,
            query,
        } => commands::request(&client, &method, &path, data.as_deref(), &query).await,
    }
}
