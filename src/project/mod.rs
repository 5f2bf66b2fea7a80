pub mod config;
mod package;

pub use config::{CgoMode, Config};
pub use package::{source_paths, FileErrors, ImportDecl, PackageUnit};

#[cfg(test)]
mod tests;
