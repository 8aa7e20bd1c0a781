//! LibXML2 FFI Wrapper Module
//!
//! This module provides a safe wrapper around the libxml2 calls needed for
//! XML Schema validation, plus the [`LibXml2Backend`] that plugs libxml2 into
//! the [`SchemaBackend`] interface.
//!
//! ## Why direct FFI
//!
//! The Rust ecosystem has no mature XSD validator: `roxmltree`, `quick-xml` and
//! `xml-rs` parse but do not validate, and the `libxml` crate still needs the
//! system libxml2 while hiding the knobs we need here (parser options, the
//! external entity loader). So we talk to libxml2 directly and wrap every
//! resource in an RAII type.
//!
//! ## External access control
//!
//! Both inputs are read into memory by Rust and handed to libxml2 as buffers,
//! so the only files or URLs libxml2 ever opens on its own are *external*
//! ones: included/imported schemas, external DTD subsets, external entities.
//! All of those go through libxml2's process-wide external entity loader. We
//! replace that loader once with [`policy_entity_loader`], which checks the
//! [`ExternalAccess`] active on the calling thread before delegating to the
//! default loader. A denied load returns NULL, which libxml2 reports as a
//! local load failure; the URL is recorded so callers can report it.
//!
//! Loads are classified by what libxml2 is doing when it asks. While a schema
//! is being assembled (`xmlSchemaParse`) or a document is being validated,
//! a load is a schema load unless it looks like a DTD. Any load made while
//! parsing an input document is a DTD or external entity load.

use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString};
use std::fmt;
use std::path::Path;
use std::ptr::{self, NonNull};
use std::sync::{Once, OnceLock};

use libc::{c_char, c_int, c_void};
use tracing::debug;

use crate::backend::{SchemaBackend, UnsupportedFeature};
use crate::error::{LibXml2Error, LibXml2Result, Result, ValidationError};
use crate::policy::{AccessList, AccessProperty, ExternalAccess, Stage, protocol_of};

/// Global initialization flag for libxml2
///
/// libxml2's initialization functions are NOT thread-safe, so the parser
/// initialization and the entity loader swap happen exactly once.
static LIBXML2_INIT: Once = Once::new();

/// Loader that was installed before ours
static DEFAULT_LOADER: OnceLock<XmlExternalEntityLoader> = OnceLock::new();

thread_local! {
    /// Policy consulted by the entity loader; `None` means unrestricted
    static ACTIVE_ACCESS: RefCell<Option<ExternalAccess>> = const { RefCell::new(None) };

    /// Loads refused since the current scope was entered
    static BLOCKED: RefCell<Vec<BlockedResource>> = const { RefCell::new(Vec::new()) };

    /// Set while libxml2 runs schema machinery rather than parsing an input
    static SCHEMA_PHASE: Cell<bool> = const { Cell::new(false) };
}

/// Parser option: substitute entities
pub const XML_PARSE_NOENT: c_int = 1 << 1;
/// Parser option: forbid network access
pub const XML_PARSE_NONET: c_int = 1 << 11;

/// Options every parse starts from. The schema validator refuses
/// entity-reference nodes, so entities are always substituted; external ones
/// still have to get past [`policy_entity_loader`]. `XML_PARSE_DTDLOAD` is
/// never set.
pub const BASE_PARSE_OPTIONS: c_int = XML_PARSE_NOENT;

/// Options added under secure processing. `XML_PARSE_HUGE` is never set, so
/// libxml2's size and entity amplification limits stay on.
pub const SECURE_PARSE_OPTIONS: c_int = XML_PARSE_NONET;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserInput {
    _private: [u8; 0],
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *const xmlError)>;

pub type XmlExternalEntityLoader = Option<
    unsafe extern "C" fn(
        url: *const c_char,
        id: *const c_char,
        context: *mut XmlParserCtxt,
    ) -> *mut XmlParserInput,
>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    // Document parsing
    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);

    // Schema parsing
    pub fn xmlSchemaNewDocParserCtxt(doc: *mut XmlDoc) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *mut XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation
    pub fn xmlSchemaNewValidCtxt(schema: *mut XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;

    // Error and resource hooks
    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);
    pub fn xmlSetExternalEntityLoader(f: XmlExternalEntityLoader);
    pub fn xmlGetExternalEntityLoader() -> XmlExternalEntityLoader;
}

/// Severity of a libxml2 diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Warning,
    Error,
    Fatal,
}

impl DiagnosticLevel {
    fn from_raw(level: c_int) -> Self {
        match level {
            3 => DiagnosticLevel::Fatal,
            2 => DiagnosticLevel::Error,
            _ => DiagnosticLevel::Warning,
        }
    }
}

/// One message reported by libxml2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub line: i32,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Pick the single message that describes a failure: the first error,
/// otherwise the first warning.
pub fn summarize(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .find(|d| d.level >= DiagnosticLevel::Error)
        .or_else(|| diagnostics.first())
        .map(|d| d.message.clone())
        .unwrap_or_else(|| "no diagnostics reported by libxml2".to_string())
}

/// Callback for libxml2 to report errors (structured)
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *const xmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }

    let diagnostics = unsafe { &mut *(user_data as *mut Vec<Diagnostic>) };
    let error = unsafe { &*error };
    if error.message.is_null() {
        return;
    }

    let c_str = unsafe { CStr::from_ptr(error.message) };
    diagnostics.push(Diagnostic {
        level: DiagnosticLevel::from_raw(error.level),
        message: c_str.to_string_lossy().trim().to_string(),
        line: error.line,
    });
}

/// Collects diagnostics reported on this thread while alive.
///
/// Installs itself as the thread's structured error handler and can also be
/// handed to context-specific handlers. The buffer is boxed so its address
/// stays stable while libxml2 holds it.
struct ErrorCapture {
    diagnostics: Box<Vec<Diagnostic>>,
}

impl ErrorCapture {
    fn install() -> Self {
        let mut capture = ErrorCapture {
            diagnostics: Box::new(Vec::new()),
        };
        let user_data = capture.user_data();
        unsafe {
            xmlSetStructuredErrorFunc(user_data, Some(structured_error_callback));
        }
        capture
    }

    fn user_data(&mut self) -> *mut c_void {
        &mut *self.diagnostics as *mut Vec<Diagnostic> as *mut c_void
    }

    fn finish(mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics)
    }
}

impl Drop for ErrorCapture {
    fn drop(&mut self) {
        unsafe {
            xmlSetStructuredErrorFunc(ptr::null_mut(), None);
        }
    }
}

/// External resource the loader refused to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedResource {
    pub url: String,
    pub property: AccessProperty,
}

impl fmt::Display for BlockedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to read '{}' because '{}' access is not allowed by the {} policy",
            self.url,
            protocol_of(&self.url),
            self.property
        )
    }
}

/// Decide which access property governs a load. Outside the schema phase
/// everything is a DTD or external entity load; inside it, only resources
/// with a public identifier or a DTD extension are.
pub fn classify_resource(url: &str, has_public_id: bool, schema_phase: bool) -> AccessProperty {
    let lower = url.to_ascii_lowercase();
    let dtd_like =
        has_public_id || [".dtd", ".ent", ".mod"].iter().any(|ext| lower.ends_with(ext));
    if schema_phase && !dtd_like {
        AccessProperty::ExternalSchema
    } else {
        AccessProperty::ExternalDtd
    }
}

/// Marks loads on this thread as schema loads until dropped
struct SchemaPhase {
    previous: bool,
}

impl SchemaPhase {
    fn enter() -> Self {
        let previous = SCHEMA_PHASE.with(|phase| phase.replace(true));
        SchemaPhase { previous }
    }
}

impl Drop for SchemaPhase {
    fn drop(&mut self) {
        let _ = SCHEMA_PHASE.try_with(|phase| phase.set(self.previous));
    }
}

/// Process-wide entity loader enforcing the thread's active policy
unsafe extern "C" fn policy_entity_loader(
    url: *const c_char,
    id: *const c_char,
    context: *mut XmlParserCtxt,
) -> *mut XmlParserInput {
    let location = if url.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(url) }.to_string_lossy().into_owned()
    };
    let schema_phase = SCHEMA_PHASE.try_with(Cell::get).unwrap_or(false);
    let property = classify_resource(&location, !id.is_null(), schema_phase);

    let permitted = ACTIVE_ACCESS
        .try_with(|active| {
            active
                .borrow()
                .as_ref()
                .is_none_or(|access| access.permits(property, &location))
        })
        .unwrap_or(false);

    if !permitted {
        debug!(url = %location, ?property, "blocked external resource");
        let _ = BLOCKED.try_with(|blocked| {
            blocked.borrow_mut().push(BlockedResource {
                url: location,
                property,
            })
        });
        return ptr::null_mut();
    }

    match DEFAULT_LOADER.get().copied().flatten() {
        Some(default_loader) => unsafe { default_loader(url, id, context) },
        None => ptr::null_mut(),
    }
}

/// Makes `access` the policy of this thread until dropped
struct AccessScope {
    previous: Option<ExternalAccess>,
}

impl AccessScope {
    fn enter(access: Option<ExternalAccess>) -> Self {
        BLOCKED.with(|blocked| blocked.borrow_mut().clear());
        let previous = ACTIVE_ACCESS.with(|active| active.replace(access));
        AccessScope { previous }
    }

    /// Leave the scope, returning what was blocked inside it
    fn finish(self) -> Vec<BlockedResource> {
        BLOCKED.with(|blocked| std::mem::take(&mut *blocked.borrow_mut()))
    }
}

impl Drop for AccessScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = ACTIVE_ACCESS.try_with(|active| active.replace(previous));
    }
}

/// Owned libxml2 document
#[derive(Debug)]
pub struct XmlDocPtr {
    ptr: NonNull<XmlDoc>,
}

impl XmlDocPtr {
    fn from_raw(ptr: *mut XmlDoc) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| XmlDocPtr { ptr })
    }

    pub(crate) fn as_ptr(&self) -> *mut XmlDoc {
        self.ptr.as_ptr()
    }
}

impl Drop for XmlDocPtr {
    fn drop(&mut self) {
        unsafe {
            xmlFreeDoc(self.ptr.as_ptr());
        }
    }
}

/// Compiled schema with proper resource management
///
/// The schema was compiled from a document we parsed ourselves; libxml2 does
/// not take ownership of that document, so it is kept alive next to the
/// schema and freed after it.
#[derive(Debug)]
pub struct XmlSchemaPtr {
    ptr: NonNull<XmlSchema>,
    _source: XmlDocPtr,
}

impl XmlSchemaPtr {
    pub(crate) fn as_ptr(&self) -> *mut XmlSchema {
        self.ptr.as_ptr()
    }
}

impl Drop for XmlSchemaPtr {
    fn drop(&mut self) {
        unsafe {
            xmlSchemaFree(self.ptr.as_ptr());
        }
    }
}

/// Validation result from libxml2
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Validation succeeded (return code 0)
    Valid,
    /// Validation failed with errors (return code > 0)
    Invalid { errors: Vec<Diagnostic> },
    /// Internal error occurred (return code < 0)
    InternalError { code: i32, errors: Vec<Diagnostic> },
}

impl ValidationResult {
    /// Create ValidationResult from libxml2 return code and captured errors
    pub fn from_code(code: c_int, errors: Vec<Diagnostic>) -> Self {
        match code {
            0 => ValidationResult::Valid,
            n if n > 0 => ValidationResult::Invalid { errors },
            n => ValidationResult::InternalError { code: n, errors },
        }
    }
}

fn path_to_cstring(path: &Path) -> LibXml2Result<CString> {
    path.to_str()
        .and_then(|s| CString::new(s).ok())
        .ok_or_else(|| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })
}

/// Safe access to the libxml2 calls used for schema validation
pub struct LibXml2Wrapper {
    _private: (),
}

impl LibXml2Wrapper {
    /// Initialize libxml2 (once per process) and install the policy-aware
    /// entity loader.
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
            let _ = DEFAULT_LOADER.set(xmlGetExternalEntityLoader());
            xmlSetExternalEntityLoader(Some(policy_entity_loader));
        });

        LibXml2Wrapper { _private: () }
    }

    /// Parse an XML document from memory. `base_url` is recorded as the
    /// document URL so relative references resolve against it.
    pub fn parse_document(
        &self,
        content: &[u8],
        base_url: &Path,
        options: c_int,
    ) -> LibXml2Result<XmlDocPtr> {
        let size = c_int::try_from(content.len()).map_err(|_| LibXml2Error::InputTooLarge {
            size: content.len(),
        })?;
        let c_url = path_to_cstring(base_url)?;

        let capture = ErrorCapture::install();
        let doc = unsafe {
            xmlReadMemory(
                content.as_ptr() as *const c_char,
                size,
                c_url.as_ptr(),
                ptr::null(),
                options,
            )
        };
        let diagnostics = capture.finish();

        XmlDocPtr::from_raw(doc).ok_or(LibXml2Error::DocumentParseFailed { diagnostics })
    }

    /// Compile an XML schema from memory
    pub fn parse_schema(
        &self,
        content: &[u8],
        base_url: &Path,
        options: c_int,
    ) -> LibXml2Result<XmlSchemaPtr> {
        let doc = self.parse_document(content, base_url, options)?;

        unsafe {
            let parser_ctxt = xmlSchemaNewDocParserCtxt(doc.as_ptr());
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::ParserContextCreationFailed);
            }

            let mut capture = ErrorCapture::install();
            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(structured_error_callback),
                capture.user_data(),
            );

            let schema = {
                let _phase = SchemaPhase::enter();
                xmlSchemaParse(parser_ctxt)
            };

            // Always free the parser context
            xmlSchemaFreeParserCtxt(parser_ctxt);
            let diagnostics = capture.finish();

            match NonNull::new(schema) {
                Some(ptr) => Ok(XmlSchemaPtr { ptr, _source: doc }),
                None => Err(LibXml2Error::SchemaParseFailed { diagnostics }),
            }
        }
    }

    /// Validate an in-memory document against a compiled schema
    pub fn validate_document(
        &self,
        schema: &XmlSchemaPtr,
        content: &[u8],
        base_url: &Path,
        options: c_int,
    ) -> LibXml2Result<ValidationResult> {
        let doc = self.parse_document(content, base_url, options)?;

        unsafe {
            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            let mut capture = ErrorCapture::install();
            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(structured_error_callback),
                capture.user_data(),
            );

            let result_code = {
                let _phase = SchemaPhase::enter();
                xmlSchemaValidateDoc(valid_ctxt, doc.as_ptr())
            };

            // Always free the validation context
            xmlSchemaFreeValidCtxt(valid_ctxt);
            let diagnostics = capture.finish();

            match ValidationResult::from_code(result_code, diagnostics) {
                ValidationResult::InternalError { code, errors } => {
                    Err(LibXml2Error::ValidationFailed {
                        code,
                        file: base_url.to_path_buf(),
                        diagnostics: errors,
                    })
                }
                result => Ok(result),
            }
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}

/// [`SchemaBackend`] backed by libxml2
pub struct LibXml2Backend {
    wrapper: LibXml2Wrapper,
    parse_options: c_int,
    compiler_access: Option<ExternalAccess>,
    validator_access: Option<ExternalAccess>,
    blocked: Vec<BlockedResource>,
}

impl LibXml2Backend {
    pub fn new() -> Self {
        Self {
            wrapper: LibXml2Wrapper::new(),
            parse_options: BASE_PARSE_OPTIONS,
            compiler_access: None,
            validator_access: None,
            blocked: Vec::new(),
        }
    }

    /// Parser options currently applied to both inputs
    pub fn parse_options(&self) -> c_int {
        self.parse_options
    }

    /// Every external resource refused so far, compile and validate alike
    pub fn blocked_resources(&self) -> &[BlockedResource] {
        &self.blocked
    }

    /// Prefer the blocked-resource explanation: libxml2's own message for a
    /// refused load is a generic I/O failure.
    fn failure_details(&mut self, blocked: Vec<BlockedResource>, diagnostics: &[Diagnostic]) -> String {
        let details = match blocked.first() {
            Some(resource) => resource.to_string(),
            None => summarize(diagnostics),
        };
        self.blocked.extend(blocked);
        details
    }
}

impl Default for LibXml2Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBackend for LibXml2Backend {
    type Schema = XmlSchemaPtr;

    fn name(&self) -> &'static str {
        "libxml2"
    }

    fn compile(&mut self, schema_path: &Path) -> Result<XmlSchemaPtr> {
        let content =
            std::fs::read(schema_path).map_err(|e| ValidationError::io(schema_path, e))?;
        debug!(schema = %schema_path.display(), bytes = content.len(), "compiling schema");

        let scope = AccessScope::enter(self.compiler_access.clone());
        let result = self
            .wrapper
            .parse_schema(&content, schema_path, self.parse_options);
        let blocked = scope.finish();

        // A refused include or import fails the compile even when libxml2
        // only warns and carries on without it.
        match result {
            Ok(schema) if blocked.is_empty() => Ok(schema),
            Ok(_) => Err(ValidationError::SchemaParsing {
                path: schema_path.to_path_buf(),
                details: self.failure_details(blocked, &[]),
            }),
            Err(
                LibXml2Error::DocumentParseFailed { diagnostics }
                | LibXml2Error::SchemaParseFailed { diagnostics },
            ) => Err(ValidationError::SchemaParsing {
                path: schema_path.to_path_buf(),
                details: self.failure_details(blocked, &diagnostics),
            }),
            Err(other) => {
                self.blocked.extend(blocked);
                Err(other.into())
            }
        }
    }

    fn validate(&mut self, schema: &XmlSchemaPtr, document_path: &Path) -> Result<()> {
        let content =
            std::fs::read(document_path).map_err(|e| ValidationError::io(document_path, e))?;
        debug!(document = %document_path.display(), bytes = content.len(), "validating document");

        let scope = AccessScope::enter(self.validator_access.clone());
        let result =
            self.wrapper
                .validate_document(schema, &content, document_path, self.parse_options);
        let blocked = scope.finish();

        // An external entity libxml2 could not load leaves an empty
        // expansion behind, so a refused load fails the run on its own.
        match result {
            Ok(ValidationResult::Valid) if blocked.is_empty() => Ok(()),
            Ok(ValidationResult::Valid) => Err(ValidationError::ValidationFailed {
                path: document_path.to_path_buf(),
                details: self.failure_details(blocked, &[]),
            }),
            Ok(
                ValidationResult::Invalid { errors }
                | ValidationResult::InternalError { errors, .. },
            ) => Err(ValidationError::ValidationFailed {
                path: document_path.to_path_buf(),
                details: self.failure_details(blocked, &errors),
            }),
            Err(LibXml2Error::DocumentParseFailed { diagnostics }) => {
                Err(ValidationError::DocumentParsing {
                    path: document_path.to_path_buf(),
                    details: self.failure_details(blocked, &diagnostics),
                })
            }
            Err(LibXml2Error::ValidationFailed { diagnostics, .. })
                if !diagnostics.is_empty() || !blocked.is_empty() =>
            {
                Err(ValidationError::ValidationFailed {
                    path: document_path.to_path_buf(),
                    details: self.failure_details(blocked, &diagnostics),
                })
            }
            Err(other) => {
                self.blocked.extend(blocked);
                Err(other.into())
            }
        }
    }

    fn enable_secure_processing(&mut self) -> std::result::Result<(), UnsupportedFeature> {
        self.parse_options |= SECURE_PARSE_OPTIONS;
        Ok(())
    }

    fn restrict_access(
        &mut self,
        stage: Stage,
        property: AccessProperty,
        allowed: &AccessList,
    ) -> std::result::Result<(), UnsupportedFeature> {
        let access = match stage {
            Stage::Compiler => &mut self.compiler_access,
            Stage::Validator => &mut self.validator_access,
        };
        access
            .get_or_insert_with(ExternalAccess::unrestricted)
            .set(property, allowed.clone());
        Ok(())
    }
}
