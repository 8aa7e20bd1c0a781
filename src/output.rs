//! Verdict Output
//!
//! Line-oriented text for humans. VALID and usage go to stdout; INVALID and
//! missing-file messages go to stderr. The exit code carries the outcome for
//! machines.

use std::fmt::Display;
use std::io::{self, Write};
use std::path::Path;

use crate::validator::{ValidationOutcome, Verdict};

pub const USAGE: &str = "Usage: validate-xsd <schema.xsd> <document.xml>";

/// Where a line is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Render the verdict line for `document_path`
pub fn format_verdict(verdict: &Verdict, document_path: &Path) -> (Stream, String) {
    match verdict {
        Verdict::SchemaNotFound(path) => (
            Stream::Stderr,
            format!("Schema file not found: {}", path.display()),
        ),
        Verdict::DocumentNotFound(path) => (
            Stream::Stderr,
            format!("XML file not found: {}", path.display()),
        ),
        Verdict::Completed(ValidationOutcome::Valid) => (
            Stream::Stdout,
            format!("{} is VALID", document_path.display()),
        ),
        Verdict::Completed(ValidationOutcome::Invalid(message)) => (
            Stream::Stderr,
            format!("{} is INVALID: {}", document_path.display(), message),
        ),
    }
}

/// Output writer over a pair of streams
pub struct Output<O, E> {
    stdout: O,
    stderr: E,
}

impl<O: Write, E: Write> Output<O, E> {
    pub fn new(stdout: O, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub fn usage(&mut self) -> io::Result<()> {
        self.line(Stream::Stdout, USAGE)
    }

    pub fn verdict(&mut self, verdict: &Verdict, document_path: &Path) -> io::Result<()> {
        let (stream, line) = format_verdict(verdict, document_path);
        self.line(stream, line)
    }

    pub fn error(&mut self, message: impl Display) -> io::Result<()> {
        self.line(Stream::Stderr, message)
    }

    /// Write text that already carries its own line breaks
    pub fn raw(&mut self, stream: Stream, text: &str) -> io::Result<()> {
        match stream {
            Stream::Stdout => self.stdout.write_all(text.as_bytes())?,
            Stream::Stderr => self.stderr.write_all(text.as_bytes())?,
        }
        self.flush(stream)
    }

    pub fn line(&mut self, stream: Stream, text: impl Display) -> io::Result<()> {
        match stream {
            Stream::Stdout => writeln!(self.stdout, "{}", text)?,
            Stream::Stderr => writeln!(self.stderr, "{}", text)?,
        }
        self.flush(stream)
    }

    fn flush(&mut self, stream: Stream) -> io::Result<()> {
        match stream {
            Stream::Stdout => self.stdout.flush(),
            Stream::Stderr => self.stderr.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_verdicts() {
        let doc = Path::new("in/doc.xml");

        assert_eq!(
            format_verdict(&Verdict::Completed(ValidationOutcome::Valid), doc),
            (Stream::Stdout, "in/doc.xml is VALID".to_string())
        );
        assert_eq!(
            format_verdict(
                &Verdict::Completed(ValidationOutcome::Invalid("bad element".to_string())),
                doc
            ),
            (Stream::Stderr, "in/doc.xml is INVALID: bad element".to_string())
        );
        assert_eq!(
            format_verdict(&Verdict::SchemaNotFound(PathBuf::from("s.xsd")), doc),
            (Stream::Stderr, "Schema file not found: s.xsd".to_string())
        );
        assert_eq!(
            format_verdict(&Verdict::DocumentNotFound(doc.to_path_buf()), doc),
            (Stream::Stderr, "XML file not found: in/doc.xml".to_string())
        );
    }

    #[test]
    fn test_output_routes_streams() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        {
            let mut output = Output::new(&mut stdout, &mut stderr);
            output.usage().unwrap();
            output
                .verdict(
                    &Verdict::Completed(ValidationOutcome::Invalid("nope".to_string())),
                    Path::new("d.xml"),
                )
                .unwrap();
        }

        assert_eq!(String::from_utf8(stdout).unwrap(), format!("{}\n", USAGE));
        assert_eq!(String::from_utf8(stderr).unwrap(), "d.xml is INVALID: nope\n");
    }
}
