use clap::Parser;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::validator::Invocation;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show errors
    Quiet,
    /// Show warnings, including unsupported hardening
    #[default]
    Normal,
    /// Show pipeline steps
    Verbose,
}

/// Validate an XML document against an XSD schema
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-xsd")]
#[command(about = "Validate an XML document against an XSD schema")]
#[command(version)]
#[command(override_usage = "validate-xsd [OPTIONS] [--] <schema.xsd> <document.xml>")]
pub struct Cli {
    /// XSD schema to compile
    #[arg(value_name = "SCHEMA")]
    pub schema: Option<PathBuf>,

    /// XML document to validate
    #[arg(value_name = "DOCUMENT")]
    pub document: Option<PathBuf>,

    /// Extra positional arguments are accepted and ignored
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub ignored: Vec<OsString>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Protocols external DTDs may be loaded over (comma-separated, or 'all')
    #[arg(long = "allow-external-dtd", value_name = "PROTOCOLS", action = clap::ArgAction::Append)]
    pub allow_external_dtd: Vec<String>,

    /// Protocols external schemas may be loaded over (comma-separated, or 'all')
    #[arg(long = "allow-external-schema", value_name = "PROTOCOLS", action = clap::ArgAction::Append)]
    pub allow_external_schema: Vec<String>,

    /// Disable the strict parser mode
    #[arg(long = "no-secure-processing")]
    pub no_secure_processing: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl Cli {
    /// Schema and document paths, if both were given
    pub fn invocation(&self) -> Option<Invocation> {
        match (&self.schema, &self.document) {
            (Some(schema), Some(document)) => Some(Invocation::new(schema, document)),
            _ => None,
        }
    }
}
