use crate::error::{Error, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

pub const CONFIG_FILE: &str = "gofront.toml";

/// Import paths that are referenced but never expanded.
pub const DEFAULT_INTRINSICS: &[&str] = &[
    "runtime",
    "sync/atomic",
    "runtime/cgo",
    "syscall",
    "syscall/js",
    "internal/race",
    "unsafe",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub package: PackageSection,
    pub imports: ImportsSection,
    pub cgo: CgoSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageSection {
    /// Name the renderer emits instead of the package clause name.
    pub rename: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportsSection {
    /// Replaces [`DEFAULT_INTRINSICS`] when set.
    pub intrinsic: Option<Vec<String>>,
    pub packages: BTreeMap<String, PackageManifest>,
}

/// Member declarations of one importable package, written in Go syntax.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageManifest {
    /// Package clause name; defaults to the last path segment.
    pub name: Option<String>,
    /// `func(...)`, `type T`, `var T` or `const T` by member name.
    pub members: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CgoMode {
    /// Keep the sources and type `C.*` symbols with placeholders.
    #[default]
    Fake,
    /// Run `go tool cgo` and analyze its output.
    Preprocess,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CgoSection {
    pub mode: CgoMode,
    /// Go toolchain binary.
    pub go: String,
    /// Output directory for preprocessing, relative to the package.
    pub objdir: PathBuf,
}

impl Default for CgoSection {
    fn default() -> Self {
        Self {
            mode: CgoMode::Fake,
            go: "go".into(),
            objdir: PathBuf::from("_obj"),
        }
    }
}

impl Config {
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|error| Error::Config {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|error| Error::io(path, error))?;
        Self::parse(path, &content)
    }

    /// Loads `gofront.toml` from `dir`, or the defaults when there is none.
    pub fn find(dir: &Path) -> Result<Self> {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn intrinsic_paths(&self) -> Vec<String> {
        match &self.imports.intrinsic {
            Some(paths) => paths.clone(),
            None => DEFAULT_INTRINSICS.iter().map(|path| path.to_string()).collect(),
        }
    }

    pub fn is_intrinsic(&self, path: &str) -> bool {
        match &self.imports.intrinsic {
            Some(paths) => paths.iter().any(|p| p == path),
            None => DEFAULT_INTRINSICS.contains(&path),
        }
    }

    /// Absolute objdir for a package directory.
    pub fn objdir(&self, package_dir: &Path) -> PathBuf {
        if self.cgo.objdir.is_absolute() {
            self.cgo.objdir.clone()
        } else {
            package_dir.join(&self.cgo.objdir)
        }
    }
}
