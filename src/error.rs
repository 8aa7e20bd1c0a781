use std::path::PathBuf;

use thiserror::Error;

use crate::libxml2::{Diagnostic, summarize};

/// Failure while compiling a schema or validating a document against it.
///
/// Every variant collapses to an INVALID verdict; the `Display` text is the
/// message reported after `is INVALID:`.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema parsing error: {path} - {details}")]
    SchemaParsing { path: PathBuf, details: String },

    #[error("Document parsing error: {details}")]
    DocumentParsing { path: PathBuf, details: String },

    #[error("{details}")]
    ValidationFailed { path: PathBuf, details: String },

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },
}

impl ValidationError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ValidationError::Io {
            path: path.into(),
            source,
        }
    }
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Document parsing failed: {}", summarize(.diagnostics))]
    DocumentParseFailed { diagnostics: Vec<Diagnostic> },

    #[error("Schema parsing failed: {}", summarize(.diagnostics))]
    SchemaParseFailed { diagnostics: Vec<Diagnostic> },

    #[error("Schema parser context creation failed")]
    ParserContextCreationFailed,

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Path cannot be passed to libxml2: {path}")]
    InvalidPath { path: PathBuf },

    #[error("Input too large for libxml2: {size} bytes")]
    InputTooLarge { size: usize },

    #[error("Validation of {file} failed with internal error code {code}")]
    ValidationFailed {
        code: i32,
        file: PathBuf,
        diagnostics: Vec<Diagnostic>,
    },
}

impl From<LibXml2Error> for ValidationError {
    fn from(err: LibXml2Error) -> Self {
        ValidationError::LibXml2Internal {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
