use crate::{
    error::{Error, Result},
    language::ast::File,
    project::{source_paths, Config, PackageUnit},
};
use std::{fs, path::PathBuf, process::Command};
use tracing::{debug, info};

const GOTYPES: &str = "_cgo_gotypes.go";
const GOTYPES_RENAMED: &str = "cxuse_cgo_gotypes.go";

/// C preamble of the unit: the comment group above each `import "C"`,
/// without `#cgo` directives, in file order.
pub fn preamble(files: &[File]) -> String {
    let mut out = Vec::new();
    for file in files {
        for import in file.imports.iter().filter(|import| import.path == "C") {
            let Some(doc) = &import.doc else {
                continue;
            };
            for line in doc.lines() {
                if line.trim_start().starts_with("#cgo ") {
                    continue;
                }
                out.push(line.strip_prefix(' ').unwrap_or(line).to_string());
            }
        }
    }
    let mut text = out.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

/// Runs `go tool cgo` over the cgo files of `unit` and lays out a
/// loadable package in the object directory, which is returned.
pub fn run_cgo(unit: &PackageUnit, config: &Config) -> Result<PathBuf> {
    let objdir = config.objdir(&unit.dir);
    fs::create_dir_all(&objdir).map_err(|error| Error::io(&objdir, error))?;

    let go = &config.cgo.go;
    info!(go = %go, objdir = %objdir.display(), files = unit.cgo_files.len(), "running cgo");
    let output = Command::new(go)
        .arg("tool")
        .arg("cgo")
        .arg("-objdir")
        .arg(&objdir)
        .args(&unit.cgo_files)
        .current_dir(&unit.dir)
        .output()
        .map_err(|error| Error::Preprocess {
            message: format!("failed to run {go}: {error}"),
            output: String::new(),
        })?;
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    if !output.status.success() {
        return Err(Error::Preprocess {
            message: format!("{go} tool cgo exited with {}", output.status),
            output: combined,
        });
    }
    debug!(output = %combined, "cgo finished");

    for path in source_paths(&unit.dir)? {
        if unit.cgo_files.contains(&path) {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = objdir.join(name);
        fs::copy(&path, &target).map_err(|error| Error::io(&target, error))?;
    }

    let gotypes = objdir.join(GOTYPES);
    if gotypes.exists() {
        let renamed = objdir.join(GOTYPES_RENAMED);
        fs::rename(&gotypes, &renamed).map_err(|error| Error::io(&gotypes, error))?;
    }
    Ok(objdir)
}
