use crate::{
    error::{Error, Result},
    language::{
        ast::{File, NodeIds},
        errors::SyntaxError,
        parser::parse_file,
    },
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub path: String,
    pub alias: Option<String>,
}

#[derive(Debug)]
pub struct FileErrors {
    pub path: PathBuf,
    pub source: String,
    pub errors: Vec<SyntaxError>,
}

/// One directory of Go sources, analyzed as a whole.
#[derive(Debug)]
pub struct PackageUnit {
    /// Name from the package clause.
    pub name: String,
    pub dir: PathBuf,
    /// Deduplicated, in first-seen order.
    pub imports: Vec<ImportDecl>,
    pub files: Vec<File>,
    pub rename: Option<String>,
    pub ids: NodeIds,
    /// Files that import `"C"`.
    pub cgo_files: Vec<PathBuf>,
}

impl PackageUnit {
    /// Loads every non-test `.go` file of `dir`. Any syntax error is fatal.
    pub fn load(dir: &Path, rename: Option<String>) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::NotADirectory(dir.to_path_buf()));
        }
        let paths = source_paths(dir)?;
        if paths.is_empty() {
            return Err(Error::NoSources(dir.to_path_buf()));
        }

        let mut ids = NodeIds::default();
        let mut files = Vec::new();
        let mut file_errors = Vec::new();
        for path in paths {
            let source = fs::read_to_string(&path).map_err(|error| Error::io(&path, error))?;
            match parse_file(path.clone(), &source, &mut ids) {
                Ok(file) => {
                    if file.package.name.ends_with("_test") {
                        debug!(path = %path.display(), "skipping external test package file");
                        continue;
                    }
                    files.push(file);
                }
                Err(errs) => file_errors.push(FileErrors {
                    path,
                    source,
                    errors: errs.errors,
                }),
            }
        }
        if !file_errors.is_empty() {
            return Err(Error::Syntax(file_errors));
        }
        let Some(first) = files.first() else {
            return Err(Error::NoSources(dir.to_path_buf()));
        };

        let name = first.package.name.clone();
        if let Some(other) = files.iter().find(|file| file.package.name != name) {
            return Err(Error::MixedPackages {
                dir: dir.to_path_buf(),
                first: name,
                second: other.package.name.clone(),
            });
        }

        let mut imports: Vec<ImportDecl> = Vec::new();
        for file in &files {
            for import in &file.imports {
                let decl = ImportDecl {
                    path: import.path.clone(),
                    alias: import.name.as_ref().map(|ident| ident.name.clone()),
                };
                if !imports.contains(&decl) {
                    imports.push(decl);
                }
            }
        }
        let cgo_files = files
            .iter()
            .filter(|file| file.imports_c())
            .map(|file| file.path.clone())
            .collect();

        info!(package = %name, files = files.len(), "loaded package unit");
        Ok(Self {
            name,
            dir: dir.to_path_buf(),
            imports,
            files,
            rename,
            ids,
            cgo_files,
        })
    }

    /// Name the renderer should use for the package.
    pub fn emit_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }

    pub fn has_cgo(&self) -> bool {
        !self.cgo_files.is_empty()
    }

    pub fn cgo_sources(&self) -> impl Iterator<Item = &File> {
        self.files.iter().filter(|file| file.imports_c())
    }
}

/// `.go` files of `dir`, sorted, without `_test.go` files.
pub fn source_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|error| Error::io(dir, error))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|error| Error::io(dir, error))?;
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !path.is_file() || !file_name.ends_with(".go") || file_name.ends_with("_test.go") {
            continue;
        }
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}
