use crate::language::{span::Span, typecheck::TypeError};
use std::{fmt, path::PathBuf};
use tracing::{error, info, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Checker,
    Import,
    UntypedDeclaration,
    UnresolvedType,
    CallCycle,
    DuplicateDeclaration,
    UnsupportedShape,
}

impl DiagnosticKind {
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::Checker => "checker",
            DiagnosticKind::Import => "import",
            DiagnosticKind::UntypedDeclaration => "untyped-declaration",
            DiagnosticKind::UnresolvedType => "unresolved-type",
            DiagnosticKind::CallCycle => "call-cycle",
            DiagnosticKind::DuplicateDeclaration => "duplicate-declaration",
            DiagnosticKind::UnsupportedShape => "unsupported-shape",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub span: Span,
}

/// Recoverable problem found while analyzing a unit.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, path: impl Into<PathBuf>, span: Span) -> Self {
        self.location = Some(Location {
            path: path.into(),
            span,
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location.path.display())?;
        }
        write!(f, "[{}] {}", self.kind.code(), self.message)
    }
}

/// Collected diagnostics; every push is also logged.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        let kind = diagnostic.kind.code();
        match diagnostic.severity {
            Severity::Info => info!(kind, "{}", diagnostic),
            Severity::Warning => warn!(kind, "{}", diagnostic),
            Severity::Error => error!(kind, "{}", diagnostic),
        }
        self.items.push(diagnostic);
    }

    pub fn report(&mut self, severity: Severity, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::new(severity, kind, message));
    }

    /// Checker errors become warnings: none of them stops the pipeline.
    pub fn push_type_error(&mut self, err: &TypeError) {
        self.push(
            Diagnostic::new(Severity::Warning, DiagnosticKind::Checker, err.display_message())
                .at(err.path.clone(), err.span),
        );
    }

    /// Unused locals are only traced.
    pub fn suppress_unused(&self, err: &TypeError) {
        trace!(target: "gofront::unused", path = %err.path.display(), "{}", err.message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
