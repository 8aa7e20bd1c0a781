//! # validate-xsd Library
//!
//! Validates a single XML document against an XSD schema with a hardened
//! libxml2 backend: strict parser mode on, and no external DTDs or schemas
//! resolved unless the access policy allows their protocol.

pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod libxml2;
pub mod logging;
pub mod output;
pub mod policy;
pub mod validator;

pub use app::{ExitStatus, run, run_with};
pub use backend::{Feature, SchemaBackend, UnsupportedFeature};
pub use cli::{Cli, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use error::{LibXml2Error, ValidationError};
pub use libxml2::{BlockedResource, Diagnostic, LibXml2Backend, LibXml2Wrapper, ValidationResult};
pub use output::{Output, USAGE};
pub use policy::{AccessList, AccessProperty, ExternalAccess, SecurityPolicy, Stage};
pub use validator::{
    Invocation, ValidationEngine, ValidationOutcome, ValidationReport, Verdict, validate,
};
