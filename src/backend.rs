//! Schema validation backend interface
//!
//! The validator only needs two things from an XML Schema implementation:
//! compile a schema, and validate a document against the compiled schema.
//! Hardening knobs are optional; a backend that leaves them at their
//! provided implementation reports them as unsupported, and the pipeline
//! carries on with reduced hardening.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::error::Result;
use crate::policy::{AccessList, AccessProperty, Stage};

/// Hardening feature a backend may or may not implement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    SecureProcessing,
    AccessRestriction {
        stage: Stage,
        property: AccessProperty,
    },
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::SecureProcessing => write!(f, "secure processing"),
            Feature::AccessRestriction { stage, property } => {
                write!(f, "{} restriction on the {}", property, stage)
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{backend} does not support {feature}")]
pub struct UnsupportedFeature {
    pub backend: &'static str,
    pub feature: Feature,
}

impl UnsupportedFeature {
    pub fn new(backend: &'static str, feature: Feature) -> Self {
        Self { backend, feature }
    }
}

/// An XML Schema implementation
#[cfg_attr(test, mockall::automock(type Schema = ();))]
pub trait SchemaBackend {
    /// Compiled schema, owned by the run that produced it
    type Schema;

    /// Short name used in diagnostics
    fn name(&self) -> &'static str {
        "schema backend"
    }

    /// Compile the XSD at `schema_path`
    fn compile(&mut self, schema_path: &Path) -> Result<Self::Schema>;

    /// Validate the document at `document_path` against `schema`
    fn validate(&mut self, schema: &Self::Schema, document_path: &Path) -> Result<()>;

    /// Switch to the strictest built-in processing mode
    fn enable_secure_processing(&mut self) -> std::result::Result<(), UnsupportedFeature> {
        Err(UnsupportedFeature::new(self.name(), Feature::SecureProcessing))
    }

    /// Limit which external resources `stage` may resolve
    fn restrict_access(
        &mut self,
        stage: Stage,
        property: AccessProperty,
        allowed: &AccessList,
    ) -> std::result::Result<(), UnsupportedFeature> {
        let _ = allowed;
        Err(UnsupportedFeature::new(
            self.name(),
            Feature::AccessRestriction { stage, property },
        ))
    }
}

impl<B: SchemaBackend + ?Sized> SchemaBackend for &mut B {
    type Schema = B::Schema;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn compile(&mut self, schema_path: &Path) -> Result<Self::Schema> {
        (**self).compile(schema_path)
    }

    fn validate(&mut self, schema: &Self::Schema, document_path: &Path) -> Result<()> {
        (**self).validate(schema, document_path)
    }

    fn enable_secure_processing(&mut self) -> std::result::Result<(), UnsupportedFeature> {
        (**self).enable_secure_processing()
    }

    fn restrict_access(
        &mut self,
        stage: Stage,
        property: AccessProperty,
        allowed: &AccessList,
    ) -> std::result::Result<(), UnsupportedFeature> {
        (**self).restrict_access(stage, property, allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalBackend;

    impl SchemaBackend for MinimalBackend {
        type Schema = ();

        fn name(&self) -> &'static str {
            "minimal"
        }

        fn compile(&mut self, _schema_path: &Path) -> Result<()> {
            Ok(())
        }

        fn validate(&mut self, _schema: &(), _document_path: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_knobs_default_to_unsupported() {
        let mut backend = MinimalBackend;

        let err = backend.enable_secure_processing().unwrap_err();
        assert_eq!(err.to_string(), "minimal does not support secure processing");

        let err = backend
            .restrict_access(Stage::Validator, AccessProperty::ExternalDtd, &AccessList::None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "minimal does not support external DTD access restriction on the validator"
        );
    }

    fn compile_with<B: SchemaBackend>(mut backend: B) -> (&'static str, bool) {
        let compiled = backend.compile(Path::new("a.xsd")).is_ok();
        (backend.name(), compiled)
    }

    #[test]
    fn test_mut_ref_forwards() {
        let mut backend = MinimalBackend;
        assert_eq!(compile_with(&mut backend), ("minimal", true));
    }
}
