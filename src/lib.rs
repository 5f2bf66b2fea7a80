#![allow(clippy::collapsible_if)]

pub mod analysis;
pub mod diagnostics;
pub mod error;
pub mod language;
pub mod project;

pub use analysis::{Analysis, AnalysisOptions};
pub use error::{Error, Result};
