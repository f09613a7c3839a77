//! why-worker: single-shot AI enrichment for policy findings.
//!
//! Reads one request document, writes one response document, exits 0. All
//! diagnostics go to stderr so stdout carries nothing but the response.
use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod config;
mod error;
mod output;
mod prompt;
mod provider;
mod schema;
mod worker;

use cli::{Invocation, WorkerArgs};
use config::{WorkerConfig, LOG_ENV};
use error::WorkerError;
use provider::HttpProviderFactory;
use schema::RequestIds;
use worker::{Processed, Worker};

fn main() -> Result<()> {
    let (args, flag_error) = match cli::parse_from(std::env::args_os()) {
        Invocation::Run(args) => (args, None),
        Invocation::RunWithDefaults(err) => (WorkerArgs::default(), Some(err)),
        Invocation::Informational(err) => {
            eprint!("{err}");
            (WorkerArgs::default(), None)
        }
    };
    init_tracing(args.verbose);
    if let Some(err) = flag_error {
        tracing::warn!(
            kind = ?err.kind(),
            "ignoring unusable flags: {}",
            first_line(&err.to_string())
        );
    }

    let config = WorkerConfig::from_env().with_timeout(args.timeout());
    let factory = HttpProviderFactory;
    let worker = Worker::new(&config, &factory);

    let processed = match read_request(args.input.as_deref()) {
        Ok(input) => worker.process(&input),
        Err(err) => worker::degraded(
            RequestIds::default(),
            &WorkerError::Decode(format!("{err:#}")),
        ),
    };
    tracing::info!(
        outcome = processed.outcome.as_str(),
        request_id = %processed.response.request_id,
        "request finished"
    );
    write_response(&processed)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time();
    // A second initialization is harmless; keep the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

fn read_request(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read request from {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("read request from stdin")?;
            Ok(input)
        }
    }
}

fn write_response(processed: &Processed) -> Result<()> {
    let text = schema::encode(&processed.response).context("serialize response")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").context("write response to stdout")?;
    stdout.flush().context("flush stdout")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}
