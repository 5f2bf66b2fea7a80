use crate::project::FileErrors;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that stop the analysis of a unit.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("failed to access {}: {error}", path.display())]
    #[diagnostic(code(gofront::io))]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("{} is not a directory", .0.display())]
    #[diagnostic(code(gofront::input))]
    NotADirectory(PathBuf),
    #[error("no Go source files in {}", .0.display())]
    #[diagnostic(code(gofront::input), help("a package directory needs at least one .go file"))]
    NoSources(PathBuf),
    #[error("syntax errors in {} file(s)", .0.len())]
    #[diagnostic(code(gofront::syntax))]
    Syntax(Vec<FileErrors>),
    #[error("found packages {first} and {second} in {}", dir.display())]
    #[diagnostic(code(gofront::input), help("one directory holds exactly one package"))]
    MixedPackages {
        dir: PathBuf,
        first: String,
        second: String,
    },
    #[error("invalid configuration {}: {message}", path.display())]
    #[diagnostic(code(gofront::config))]
    Config { path: PathBuf, message: String },
    #[error("cgo preprocessing failed: {message}")]
    #[diagnostic(code(gofront::cgo), help("{output}"))]
    Preprocess {
        message: String,
        /// Combined stdout and stderr of the tool, when it ran.
        output: String,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            error,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
