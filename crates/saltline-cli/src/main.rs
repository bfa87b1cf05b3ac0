//! saltline - run salt functions through a remote salt-api.
//!
//! Resolves connection settings from ~/.saltlinerc, the environment and the
//! command line, logs in, sends one command and prints the result as JSON.

mod cli;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use saltline_core::auth::KERBEROS_EAUTH;
use saltline_core::{Client, ClientKind, Config, Credentials};

use cli::Args;

/// Initialize the tracing subscriber for logging.
///
/// RUST_LOG takes precedence; otherwise each -v raises the level from warn.
/// The returned guard flushes the log file on drop.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

/// Ask for a value on the terminal
fn prompt_line(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Layer file, environment and flags, then prompt for whatever is missing
fn resolve_credentials(args: &Args) -> Result<Credentials> {
    let mut config = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .merge(args.config_overrides());

    if !args.auth.non_interactive {
        if config.user.is_none() {
            config.user = Some(prompt_line("Username: ")?);
        }
        if config.password.is_none() && config.eauth() != KERBEROS_EAUTH {
            config.password =
                Some(rpassword::prompt_password("Password: ").context("Failed to read password")?);
        }
    }

    Ok(config.credentials()?)
}

async fn run(args: Args) -> Result<Value> {
    let credentials = resolve_credentials(&args)?;
    debug!(url = %credentials.url(), user = credentials.username(), "Resolved credentials");

    let mut client = Client::new(credentials, &args.http_options())?;

    if let Some(ref raw) = args.json {
        let body: Value = serde_json::from_str(raw).context("--json is not valid JSON")?;
        let body = match body {
            Value::Array(_) => body,
            Value::Object(_) => Value::Array(vec![body]),
            _ => bail!("--json must be a lowstate object or a list of them"),
        };
        let response = client.call_raw(&body).await?;
        return Ok(response.into_result()?);
    }

    let request = args.lowstate()?;
    info!(client = %request.client, fun = %request.fun, "Running command");

    let result = match args.client {
        ClientKind::Local => client.local(request).await?,
        ClientKind::LocalAsync => serde_json::to_value(client.local_async(request).await?)?,
        ClientKind::LocalBatch => Value::Array(client.local_batch(request).await?),
        ClientKind::Runner => client.runner(request).await?,
        ClientKind::Wheel => client.wheel(request).await?,
    };
    Ok(result)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let _guard = match init_tracing(args.verbose, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
