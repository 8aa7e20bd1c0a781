//! Command-line boundary
//!
//! Turns an argument list into output lines and an exit status. Streams and
//! the backend are injected so the whole flow can run in-process.

use std::ffi::OsString;
use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::{debug, info};

use crate::backend::SchemaBackend;
use crate::cli::Cli;
use crate::config::{Config, ConfigManager};
use crate::libxml2::LibXml2Backend;
use crate::logging;
use crate::output::{Output, Stream};
use crate::validator::ValidationEngine;

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status as u8)
    }
}

/// Run with the libxml2 backend
pub fn run<I, T, O, E>(args: I, stdout: O, stderr: E) -> ExitStatus
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    O: Write,
    E: Write,
{
    run_with(args, LibXml2Backend::new, stdout, stderr)
}

/// Run with a backend built by `make_backend`. The backend is only built
/// once both paths are known.
pub fn run_with<I, T, B, F, O, E>(args: I, make_backend: F, stdout: O, stderr: E) -> ExitStatus
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    B: SchemaBackend,
    F: FnOnce() -> B,
    O: Write,
    E: Write,
{
    let mut output = Output::new(stdout, stderr);
    execute(args, make_backend, &mut output).unwrap_or(ExitStatus::Failure)
}

fn execute<I, T, B, F, O, E>(
    args: I,
    make_backend: F,
    output: &mut Output<O, E>,
) -> io::Result<ExitStatus>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    B: SchemaBackend,
    F: FnOnce() -> B,
    O: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => return report_parse_error(&err, output),
    };

    let Some(invocation) = cli.invocation() else {
        output.usage()?;
        return Ok(ExitStatus::Failure);
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            output.error(format!("Configuration error: {:#}", e))?;
            return Ok(ExitStatus::Failure);
        }
    };

    logging::init(config.verbosity());
    if !cli.ignored.is_empty() {
        debug!(count = cli.ignored.len(), "ignoring extra arguments");
    }
    info!(
        schema = %invocation.schema_path.display(),
        document = %invocation.document_path.display(),
        secure_processing = config.security.secure_processing,
        "validating"
    );

    let mut engine = ValidationEngine::new(make_backend(), config.security);
    let report = engine.run(&invocation);
    output.verdict(&report.verdict, &invocation.document_path)?;

    Ok(if report.is_valid() {
        ExitStatus::Success
    } else {
        ExitStatus::Failure
    })
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    ConfigManager::load_config(cli).with_context(|| match &cli.config {
        Some(path) => format!("failed to load {}", path.display()),
        None => "failed to load configuration".to_string(),
    })
}

fn report_parse_error<O: Write, E: Write>(
    err: &clap::Error,
    output: &mut Output<O, E>,
) -> io::Result<ExitStatus> {
    let rendered = err.render().to_string();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            output.raw(Stream::Stdout, &rendered)?;
            Ok(ExitStatus::Success)
        }
        _ => {
            output.raw(Stream::Stderr, &rendered)?;
            output.usage()?;
            Ok(ExitStatus::Failure)
        }
    }
}
