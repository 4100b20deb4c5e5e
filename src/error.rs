//! Error types for the Pascal compiler

use std::fmt;

use indexmap::IndexSet;
use thiserror::Error;

/// Source location (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<logos::Span> for Span {
    fn from(span: logos::Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

/// Fatal compiler error
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Syntax error at token '{value}' (kind: {kind}) on line {line}")]
    UnexpectedToken {
        value: String,
        kind: &'static str,
        line: usize,
        span: Span,
    },

    #[error("Syntax error at end of input")]
    UnexpectedEof { span: Span },

    #[error("Semantic errors:\n{0}")]
    Semantic(Diagnostics),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub fn unexpected(
        value: impl Into<String>,
        kind: &'static str,
        line: usize,
        span: impl Into<Span>,
    ) -> Self {
        Self::UnexpectedToken {
            value: value.into(),
            kind,
            line,
            span: span.into(),
        }
    }

    pub fn eof(span: impl Into<Span>) -> Self {
        Self::UnexpectedEof { span: span.into() }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::UnexpectedToken { .. } | Self::UnexpectedEof { .. })
    }

    /// Semantic diagnostics carried by this error, if any
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::Semantic(diagnostics) => Some(diagnostics),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Whether a diagnostic blocks code generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("Error"),
            Severity::Warning => f.write_str("Warning"),
        }
    }
}

/// A recorded semantic or lexical message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            line,
            message: message.into(),
        }
    }

    pub fn warning(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            line,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "Line {}: ", line)?;
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Diagnostics in detection order, deduplicated by rendered text
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: IndexSet<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic; returns false if an identical one was already present
    pub fn push(&mut self, diagnostic: Diagnostic) -> bool {
        self.entries.insert(diagnostic)
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        for diagnostic in iter {
            self.push(diagnostic);
        }
    }
}
