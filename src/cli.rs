//! Command-line flags for the worker.
//!
//! Flags are operator conveniences. The host contract is stdin in, stdout
//! out, so a bad flag never prevents a response: it is reported on stderr and
//! the defaults apply.
use crate::config::DEFAULT_TIMEOUT;
use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "why-worker",
    version,
    about = "Enrich policy findings for a Kubernetes resource with AI-written guidance",
    after_help = "Reads one WorkerRequest JSON document from stdin and writes one WorkerResponse JSON document to stdout.\n\nEnvironment:\n  WHY_AI_PROVIDER         openai | gemini | claude (default: openai)\n  WHY_AI_API_KEY          OpenAI credential\n  WHY_GEMINI_API_KEY      Gemini credential\n  WHY_CLAUDE_API_KEY      Claude credential\n  WHY_WORKER_LOG          stderr log filter (default: info)"
)]
pub struct WorkerArgs {
    /// Read the request from a file instead of stdin
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Timeout for the backend HTTP call, in seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Log at debug level unless WHY_WORKER_LOG is set
    #[arg(long)]
    pub verbose: bool,
}

impl Default for WorkerArgs {
    fn default() -> Self {
        Self {
            input: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            verbose: false,
        }
    }
}

impl WorkerArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What to do after looking at argv.
#[derive(Debug)]
pub enum Invocation {
    Run(WorkerArgs),
    /// Flags were unusable; run with defaults and report the problem.
    RunWithDefaults(clap::Error),
    /// `--help` or `--version` was requested. The text goes to stderr and the
    /// request is still answered with defaults.
    Informational(clap::Error),
}

pub fn parse_from<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match WorkerArgs::try_parse_from(args) {
        Ok(args) => Invocation::Run(args),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Invocation::Informational(err),
            _ => Invocation::RunWithDefaults(err),
        },
    }
}
