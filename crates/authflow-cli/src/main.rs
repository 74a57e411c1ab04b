//! Authflow - terminal front end for the authentication orchestration engine.
//!
//! Reads `login`, `register` and `logout` commands from the terminal, feeds
//! them to the engine as triggers and prints every notification it publishes.

mod app;
mod config;
mod console;
mod credentials;

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use authflow_core::{
    CredentialClient, HttpClientConfig, HttpCredentialClient, MemoryCredentialClient, Supervisor,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, OutputMode};
use config::Config;
use console::{Console, HELP};
use credentials::CredentialStore;

// ============================================================================
// Constants
// ============================================================================

/// Credential call latency of the `--simulate` backend, long enough to type
/// `logout` while a login is still in flight
const SIMULATED_AUTH_LATENCY_MS: u64 = 3000;

/// Logout latency of the `--simulate` backend
const SIMULATED_LOGOUT_LATENCY_MS: u64 = 300;

/// Rolling log file name inside `log_dir`
const LOG_FILE_NAME: &str = "authflow.log";

const USAGE: &str = "\
Usage: authflow [--simulate] [--json]

Options:
  --simulate  Use an in-memory credential service instead of service_url
  --json      Print notifications as JSON lines
  --help      Show this help";

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    simulate: bool,
    json: bool,
    help: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = Self::default();
        for arg in args {
            match arg.as_str() {
                "--simulate" => options.simulate = true,
                "--json" => options.json = true,
                "--help" | "-h" => options.help = true,
                other => bail!("Unknown argument '{}'\n\n{}", other, USAGE),
            }
        }
        Ok(options)
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr unless a log directory is configured. The returned guard
/// flushes the file writer and must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

fn credential_client(config: &Config, simulate: bool) -> Result<Arc<dyn CredentialClient>> {
    if simulate {
        eprintln!("Using the simulated credential service; accounts last until exit.");
        return Ok(Arc::new(
            MemoryCredentialClient::new()
                .with_auth_latency(Duration::from_millis(SIMULATED_AUTH_LATENCY_MS))
                .with_logout_latency(Duration::from_millis(SIMULATED_LOGOUT_LATENCY_MS)),
        ));
    }

    let Some(url) = config.service_url.as_deref() else {
        bail!("No credential service configured. Set AUTHFLOW_SERVICE_URL or run with --simulate.");
    };
    let client = HttpCredentialClient::new(&HttpClientConfig::new(url))?;
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = Options::parse(&args)?;
    if options.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?.with_env_overrides();
    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(simulate = options.simulate, "Authflow starting");

    let client = credential_client(&config, options.simulate)?;
    let (notify_tx, mut notifications) = mpsc::unbounded_channel();
    let (supervisor, triggers) = Supervisor::start(&config.engine, client, Arc::new(notify_tx));

    let last_username = Arc::new(Mutex::new(config.last_username.clone()));
    let (input_tx, mut inputs) = mpsc::unbounded_channel();
    let service_url = if options.simulate {
        None
    } else {
        config.service_url.as_deref()
    };
    let credentials = CredentialStore::for_service(service_url);
    Console::new(last_username.clone(), credentials.clone()).spawn(input_tx)?;

    let output = if options.json {
        OutputMode::Json
    } else {
        println!("{}", HELP);
        OutputMode::Text
    };
    let mut app = App::new(config, triggers, output, last_username, credentials);
    let result = app.run(&mut inputs, &mut notifications).await;

    // Let queued work finish and show what it published
    supervisor.shutdown().await;
    while let Ok(notification) = notifications.try_recv() {
        app.handle_notification(notification)?;
    }

    info!("Authflow shutting down");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags() {
        let options = Options::parse(&args(&["--simulate", "--json"])).unwrap();
        assert!(options.simulate);
        assert!(options.json);
        assert!(!options.help);

        assert_eq!(Options::parse(&[]).unwrap(), Options::default());
    }

    #[test]
    fn test_unknown_argument_shows_usage() {
        let err = Options::parse(&args(&["--verbose"])).unwrap_err();
        assert!(err.to_string().contains("Usage: authflow"));
    }

    #[test]
    fn test_missing_service_url_is_an_error() {
        let err = credential_client(&Config::default(), false).err().unwrap();
        assert!(err.to_string().contains("AUTHFLOW_SERVICE_URL"));
    }
}
