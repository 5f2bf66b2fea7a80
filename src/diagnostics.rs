use crate::{
    analysis::{
        diagnostic::{Diagnostic as AnalysisDiagnostic, Severity},
        Analysis,
    },
    error::Error as FatalError,
    language::{ast::File, errors::SyntaxError},
    project::FileErrors,
};
use miette::{Diagnostic, LabeledSpan, NamedSource, Report, SourceCode, SourceSpan};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource, err: SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: err.label,
        }
    }
}

/// One diagnostic per error; each owns a copy of its file's source.
pub fn syntax_diagnostics(file: &FileErrors) -> impl Iterator<Item = SyntaxDiagnostic> + '_ {
    file.errors.iter().map(|err| {
        let src = NamedSource::new(file.path.display().to_string(), file.source.clone());
        SyntaxDiagnostic::from_error(src, err.clone())
    })
}

pub fn emit_syntax_errors(errors: &[FileErrors]) {
    for file in errors {
        for diagnostic in syntax_diagnostics(file) {
            eprintln!("{:?}", Report::new(diagnostic));
        }
    }
}

/// An analysis diagnostic attached to the file it points into.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Rendered {
    src: Option<NamedSource>,
    span: Option<SourceSpan>,
    code: &'static str,
    severity: miette::Severity,
    message: String,
}

impl Rendered {
    pub fn new(diagnostic: &AnalysisDiagnostic, files: &[File]) -> Self {
        let located = diagnostic.location.as_ref().and_then(|location| {
            let file = files.iter().find(|file| file.path == location.path)?;
            let src = NamedSource::new(file.path.display().to_string(), file.source.clone());
            let span: SourceSpan = (location.span.start, location.span.len()).into();
            Some((src, span))
        });
        let (src, span) = match located {
            Some((src, span)) => (Some(src), Some(span)),
            None => (None, None),
        };
        Self {
            src,
            span,
            code: diagnostic.kind.code(),
            severity: match diagnostic.severity {
                Severity::Info => miette::Severity::Advice,
                Severity::Warning => miette::Severity::Warning,
                Severity::Error => miette::Severity::Error,
            },
            message: diagnostic.message.clone(),
        }
    }
}

impl Diagnostic for Rendered {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(self.severity)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.src.as_ref().map(|src| src as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            None, span,
        ))))
    }
}

/// Prints every diagnostic at or above `min` to stderr.
pub fn emit_diagnostics(analysis: &Analysis, min: Severity) {
    for diagnostic in analysis.diagnostics.iter() {
        if diagnostic.severity < min {
            continue;
        }
        let rendered = Rendered::new(diagnostic, &analysis.unit.files);
        eprintln!("{:?}", Report::new(rendered));
    }
}

/// Prints a fatal error. Syntax errors get one report per error.
pub fn emit_error(error: FatalError) {
    match error {
        FatalError::Syntax(files) => emit_syntax_errors(&files),
        other => eprintln!("{:?}", Report::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::diagnostic::DiagnosticKind,
        language::{ast::NodeIds, parser::parse_file, span::Span},
    };
    use std::path::PathBuf;

    #[test]
    fn located_diagnostics_carry_their_source() {
        let mut ids = NodeIds::default();
        let file = parse_file(PathBuf::from("main.go"), "package main\n\nvar x Missing\n", &mut ids)
            .expect("parse");
        let diagnostic = AnalysisDiagnostic::new(
            Severity::Warning,
            DiagnosticKind::UntypedDeclaration,
            "x has no type",
        )
        .at("main.go", Span::new(18, 19));
        let rendered = Rendered::new(&diagnostic, std::slice::from_ref(&file));
        assert!(rendered.source_code().is_some());
        assert_eq!(rendered.span, Some((18, 1).into()));
        assert_eq!(rendered.severity(), Some(miette::Severity::Warning));
        assert_eq!(rendered.code, "untyped-declaration");
    }

    #[test]
    fn syntax_errors_render_with_their_file() {
        let mut ids = NodeIds::default();
        let source = "package main\n\nfunc main( {\n";
        let errors = parse_file(PathBuf::from("broken.go"), source, &mut ids)
            .expect_err("syntax error")
            .errors;
        let file = FileErrors {
            path: PathBuf::from("broken.go"),
            source: source.to_string(),
            errors,
        };
        let diagnostics: Vec<_> = syntax_diagnostics(&file).collect();
        assert_eq!(diagnostics.len(), file.errors.len());
        let first = &diagnostics[0];
        assert!(first.source_code().is_some());
        assert_eq!(first.labels().map(|labels| labels.count()), Some(1));
        let rendered = format!("{:?}", Report::new(syntax_diagnostics(&file).next().expect("one")));
        assert!(rendered.contains("broken.go"), "{rendered}");
    }

    #[test]
    fn unlocated_diagnostics_have_no_labels() {
        let diagnostic =
            AnalysisDiagnostic::new(Severity::Info, DiagnosticKind::CallCycle, "a -> b -> a");
        let rendered = Rendered::new(&diagnostic, &[]);
        assert!(rendered.labels().is_none());
        assert_eq!(rendered.severity(), Some(miette::Severity::Advice));
        assert_eq!(rendered.to_string(), "a -> b -> a");
    }
}
