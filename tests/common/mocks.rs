use std::path::{Path, PathBuf};

use validate_xsd::error::Result;
use validate_xsd::{
    AccessList, AccessProperty, SchemaBackend, Stage, UnsupportedFeature, ValidationError,
};

/// Call made against a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SecureProcessing,
    Restrict(Stage, AccessProperty, AccessList),
    Compile(PathBuf),
    Validate(PathBuf),
}

/// Backend that records every call and answers from canned results
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    pub compile_error: Option<String>,
    pub validate_error: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            compile_error: None,
            validate_error: None,
        }
    }

    pub fn failing_compile(message: &str) -> Self {
        Self {
            compile_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn failing_validate(message: &str) -> Self {
        Self {
            validate_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }
}

impl SchemaBackend for RecordingBackend {
    type Schema = PathBuf;

    fn name(&self) -> &'static str {
        "recording"
    }

    fn compile(&mut self, schema_path: &Path) -> Result<PathBuf> {
        self.calls.push(Call::Compile(schema_path.to_path_buf()));
        match &self.compile_error {
            Some(details) => Err(ValidationError::SchemaParsing {
                path: schema_path.to_path_buf(),
                details: details.clone(),
            }),
            None => Ok(schema_path.to_path_buf()),
        }
    }

    fn validate(&mut self, _schema: &PathBuf, document_path: &Path) -> Result<()> {
        self.calls.push(Call::Validate(document_path.to_path_buf()));
        match &self.validate_error {
            Some(details) => Err(ValidationError::ValidationFailed {
                path: document_path.to_path_buf(),
                details: details.clone(),
            }),
            None => Ok(()),
        }
    }

    fn enable_secure_processing(&mut self) -> std::result::Result<(), UnsupportedFeature> {
        self.calls.push(Call::SecureProcessing);
        Ok(())
    }

    fn restrict_access(
        &mut self,
        stage: Stage,
        property: AccessProperty,
        allowed: &AccessList,
    ) -> std::result::Result<(), UnsupportedFeature> {
        self.calls.push(Call::Restrict(stage, property, allowed.clone()));
        Ok(())
    }
}

/// Backend implementing only compile and validate; every hardening knob is
/// left unsupported.
pub struct BareBackend {
    pub valid: bool,
}

impl SchemaBackend for BareBackend {
    type Schema = ();

    fn compile(&mut self, _schema_path: &Path) -> Result<()> {
        Ok(())
    }

    fn validate(&mut self, _schema: &(), document_path: &Path) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                path: document_path.to_path_buf(),
                details: "element 'root' is not allowed".to_string(),
            })
        }
    }
}
