//! Validation pipeline
//!
//! One run checks that both inputs exist, hardens the backend, compiles the
//! schema, hardens the validator and validates the document. Every failure
//! past the existence checks collapses into [`ValidationOutcome::Invalid`].

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::backend::{SchemaBackend, UnsupportedFeature};
use crate::policy::{AccessProperty, SecurityPolicy, Stage};

/// The two inputs of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub schema_path: PathBuf,
    pub document_path: PathBuf,
}

impl Invocation {
    pub fn new(schema_path: impl Into<PathBuf>, document_path: impl Into<PathBuf>) -> Self {
        Self {
            schema_path: schema_path.into(),
            document_path: document_path.into(),
        }
    }
}

/// Result of validating the document against the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    /// Schema compile error, document parse error or schema violation
    Invalid(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    SchemaNotFound(PathBuf),
    DocumentNotFound(PathBuf),
    Completed(ValidationOutcome),
}

/// Verdict plus the hardening knobs the backend could not apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub verdict: Verdict,
    pub warnings: Vec<UnsupportedFeature>,
}

impl ValidationReport {
    fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.verdict, Verdict::Completed(ValidationOutcome::Valid))
    }
}

/// Runs the validation pipeline against a backend
pub struct ValidationEngine<B> {
    backend: B,
    policy: SecurityPolicy,
}

impl<B: SchemaBackend> ValidationEngine<B> {
    pub fn new(backend: B, policy: SecurityPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn run(&mut self, invocation: &Invocation) -> ValidationReport {
        if !invocation.schema_path.exists() {
            return ValidationReport::new(Verdict::SchemaNotFound(invocation.schema_path.clone()));
        }
        if !invocation.document_path.exists() {
            return ValidationReport::new(Verdict::DocumentNotFound(
                invocation.document_path.clone(),
            ));
        }

        let mut warnings = Vec::new();
        let outcome = self.compile_and_validate(invocation, &mut warnings);

        ValidationReport {
            verdict: Verdict::Completed(outcome),
            warnings,
        }
    }

    fn compile_and_validate(
        &mut self,
        invocation: &Invocation,
        warnings: &mut Vec<UnsupportedFeature>,
    ) -> ValidationOutcome {
        if self.policy.secure_processing {
            tolerate(self.backend.enable_secure_processing(), warnings);
        }
        self.restrict(Stage::Compiler, warnings);

        let schema = match self.backend.compile(&invocation.schema_path) {
            Ok(schema) => schema,
            Err(e) => {
                debug!(schema = %invocation.schema_path.display(), error = %e, "schema compilation failed");
                return ValidationOutcome::Invalid(e.to_string());
            }
        };

        self.restrict(Stage::Validator, warnings);

        match self.backend.validate(&schema, &invocation.document_path) {
            Ok(()) => ValidationOutcome::Valid,
            Err(e) => ValidationOutcome::Invalid(e.to_string()),
        }
    }

    fn restrict(&mut self, stage: Stage, warnings: &mut Vec<UnsupportedFeature>) {
        for property in AccessProperty::ALL {
            let allowed = self.policy.access.list(property);
            debug!(%stage, %property, %allowed, "restricting external access");
            tolerate(self.backend.restrict_access(stage, property, allowed), warnings);
        }
    }
}

/// Unsupported hardening is logged and remembered, never fatal
fn tolerate(
    result: std::result::Result<(), UnsupportedFeature>,
    warnings: &mut Vec<UnsupportedFeature>,
) {
    if let Err(unsupported) = result {
        warn!("{}; continuing without it", unsupported);
        warnings.push(unsupported);
    }
}

/// Convenience for a single run
pub fn validate<B: SchemaBackend>(
    backend: B,
    policy: SecurityPolicy,
    schema_path: &Path,
    document_path: &Path,
) -> ValidationReport {
    ValidationEngine::new(backend, policy).run(&Invocation::new(schema_path, document_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Feature, MockSchemaBackend};
    use crate::error::ValidationError;
    use std::fs;
    use tempfile::TempDir;

    fn inputs() -> (TempDir, Invocation) {
        let dir = TempDir::new().unwrap();
        let schema = dir.path().join("schema.xsd");
        let document = dir.path().join("doc.xml");
        fs::write(&schema, "<xs:schema/>").unwrap();
        fs::write(&document, "<root/>").unwrap();
        (dir, Invocation::new(schema, document))
    }

    fn supporting_mock() -> MockSchemaBackend {
        let mut mock = MockSchemaBackend::new();
        mock.expect_enable_secure_processing().returning(|| Ok(()));
        mock.expect_restrict_access().returning(|_, _, _| Ok(()));
        mock
    }

    #[test]
    fn test_missing_schema_never_compiles() {
        let dir = TempDir::new().unwrap();
        let invocation = Invocation::new(dir.path().join("nope.xsd"), dir.path().join("doc.xml"));

        // No expectations: any backend call would panic.
        let mut engine = ValidationEngine::new(MockSchemaBackend::new(), SecurityPolicy::default());
        let report = engine.run(&invocation);

        assert_eq!(report.verdict, Verdict::SchemaNotFound(invocation.schema_path));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_document_never_compiles() {
        let (dir, invocation) = inputs();
        let invocation = Invocation::new(invocation.schema_path, dir.path().join("missing.xml"));

        let mut engine = ValidationEngine::new(MockSchemaBackend::new(), SecurityPolicy::default());
        let report = engine.run(&invocation);

        assert_eq!(report.verdict, Verdict::DocumentNotFound(invocation.document_path));
    }

    #[test]
    fn test_valid_run_hardens_both_stages() {
        let (_dir, invocation) = inputs();

        let mut mock = MockSchemaBackend::new();
        mock.expect_enable_secure_processing()
            .times(1)
            .returning(|| Ok(()));
        for stage in [Stage::Compiler, Stage::Validator] {
            for property in AccessProperty::ALL {
                mock.expect_restrict_access()
                    .withf(move |s, p, allowed| *s == stage && *p == property && allowed.is_none())
                    .times(1)
                    .returning(|_, _, _| Ok(()));
            }
        }
        let schema_path = invocation.schema_path.clone();
        mock.expect_compile()
            .withf(move |path| path.as_os_str() == schema_path.as_os_str())
            .times(1)
            .returning(|_| Ok(()));
        let document_path = invocation.document_path.clone();
        mock.expect_validate()
            .withf(move |_, path| path.as_os_str() == document_path.as_os_str())
            .times(1)
            .returning(|_, _| Ok(()));

        let report = ValidationEngine::new(mock, SecurityPolicy::default()).run(&invocation);
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_compile_failure_is_invalid_and_skips_validation() {
        let (_dir, invocation) = inputs();

        let mut mock = supporting_mock();
        mock.expect_compile().returning(|path| {
            Err(ValidationError::SchemaParsing {
                path: path.to_path_buf(),
                details: "not a schema".to_string(),
            })
        });
        mock.expect_validate().never();

        let report = ValidationEngine::new(mock, SecurityPolicy::default()).run(&invocation);
        match report.verdict {
            Verdict::Completed(ValidationOutcome::Invalid(message)) => {
                assert!(message.contains("not a schema"));
            }
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_failure_message_is_preserved() {
        let (_dir, invocation) = inputs();

        let mut mock = supporting_mock();
        mock.expect_compile().returning(|_| Ok(()));
        mock.expect_validate().returning(|_, path| {
            Err(ValidationError::ValidationFailed {
                path: path.to_path_buf(),
                details: "Element 'root': Missing child element(s).".to_string(),
            })
        });

        let report = ValidationEngine::new(mock, SecurityPolicy::default()).run(&invocation);
        assert_eq!(
            report.verdict,
            Verdict::Completed(ValidationOutcome::Invalid(
                "Element 'root': Missing child element(s).".to_string()
            ))
        );
    }

    #[test]
    fn test_unsupported_knobs_warn_and_continue() {
        let (_dir, invocation) = inputs();

        let mut mock = MockSchemaBackend::new();
        mock.expect_enable_secure_processing()
            .returning(|| Err(UnsupportedFeature::new("mock", Feature::SecureProcessing)));
        mock.expect_restrict_access().returning(|stage, property, _| {
            Err(UnsupportedFeature::new(
                "mock",
                Feature::AccessRestriction { stage, property },
            ))
        });
        mock.expect_compile().returning(|_| Ok(()));
        mock.expect_validate().returning(|_, _| Ok(()));

        let report = ValidationEngine::new(mock, SecurityPolicy::default()).run(&invocation);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 5);
        assert_eq!(report.warnings[0].feature, Feature::SecureProcessing);
    }

    #[test]
    fn test_secure_processing_can_be_disabled() {
        let (_dir, invocation) = inputs();

        let mut mock = MockSchemaBackend::new();
        mock.expect_enable_secure_processing().never();
        mock.expect_restrict_access().returning(|_, _, _| Ok(()));
        mock.expect_compile().returning(|_| Ok(()));
        mock.expect_validate().returning(|_, _| Ok(()));

        let policy = SecurityPolicy {
            secure_processing: false,
            ..SecurityPolicy::default()
        };
        let report = ValidationEngine::new(mock, policy).run(&invocation);
        assert!(report.is_valid());
    }
}
