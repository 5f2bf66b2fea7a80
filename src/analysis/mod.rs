//! The analysis pipeline. One [`Analysis`] holds everything learned
//! about a unit; passes run in a fixed order and hand their results to
//! the next through it.

pub mod callgraph;
pub mod cgo;
pub mod cursor;
pub mod desugar;
pub mod diagnostic;
pub mod importer;

use crate::{
    error::Result,
    language::typecheck::{check_package, codes, TypeInfo},
    project::{CgoMode, Config, PackageUnit},
};
use callgraph::{CallGraph, DeclIndex};
use cgo::{CleanReport, ReconcileReport};
use cursor::CursorIndex;
use desugar::Worklists;
use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
use importer::{dependency_paths, IntrinsicAware, ManifestImporter};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

#[derive(Clone, Debug, Default)]
pub struct AnalysisOptions {
    /// Emission name; wins over the configuration.
    pub rename: Option<String>,
    /// Configuration file; defaults to `gofront.toml` in the package.
    pub config: Option<PathBuf>,
}

#[derive(Debug)]
pub struct Analysis {
    pub unit: PackageUnit,
    pub config: Config,
    pub info: TypeInfo,
    pub cursor: CursorIndex,
    pub decls: DeclIndex,
    pub graph: CallGraph,
    pub worklists: Worklists,
    /// C preamble of the cgo files.
    pub preamble: String,
    /// Local import name to import path.
    pub import_aliases: BTreeMap<String, String>,
    /// Imports that still need expanding.
    pub dependencies: Vec<String>,
    pub diagnostics: Diagnostics,
    pub reconcile: ReconcileReport,
    pub clean: CleanReport,
}

impl Analysis {
    /// Loads the package in `dir` and runs every pass over it.
    pub fn run(dir: &Path, options: &AnalysisOptions) -> Result<Self> {
        let config = match &options.config {
            Some(path) => Config::load(path)?,
            None => Config::find(dir)?,
        };
        let rename = options
            .rename
            .clone()
            .or_else(|| config.package.rename.clone());
        let unit = PackageUnit::load(dir, rename.clone())?;

        if config.cgo.mode == CgoMode::Preprocess && unit.has_cgo() {
            let preamble = cgo::preamble(&unit.files);
            let objdir = cgo::run_cgo(&unit, &config)?;
            let unit = PackageUnit::load(&objdir, rename)?;
            return Ok(Self::analyze(unit, config, preamble));
        }
        Ok(Self::from_unit(unit, config))
    }

    /// Runs every pass over an already loaded unit.
    pub fn from_unit(unit: PackageUnit, config: Config) -> Self {
        let preamble = cgo::preamble(&unit.files);
        Self::analyze(unit, config, preamble)
    }

    fn analyze(mut unit: PackageUnit, config: Config, preamble: String) -> Self {
        info!(package = %unit.name, files = unit.files.len(), "analyzing package");
        let mut diagnostics = Diagnostics::default();
        let import_aliases = import_aliases(&unit);
        let dependencies = dependency_paths(&unit, &config);

        let mut importer = IntrinsicAware::new(
            ManifestImporter::from_config(&config),
            config.intrinsic_paths(),
        );
        let checked = check_package(&unit.files, &mut importer);
        for err in &checked.errors {
            if err.code.as_deref() == Some(codes::IMPORT) {
                diagnostics.push(
                    Diagnostic::new(Severity::Warning, DiagnosticKind::Import, err.message.clone())
                        .at(err.path.clone(), err.span),
                );
            } else {
                diagnostics.push_type_error(err);
            }
        }
        for err in &checked.unused {
            diagnostics.suppress_unused(err);
        }
        debug!(
            types = checked.info.types.len(),
            objects = checked.info.objects.len(),
            errors = checked.errors.len(),
            failed_imports = checked.import_errors.len(),
            "type check done"
        );
        let mut info = checked.info;

        let mut cursor = CursorIndex::build(&unit.files);
        let reconcile = cgo::reconcile(&unit.files, &mut info, &cursor, &mut diagnostics);
        let clean = cgo::clean(&mut unit.files, &mut info, &mut unit.ids);
        cursor.rebuild(&unit.files);

        let mut decls = DeclIndex::discover(&unit.files, &mut diagnostics);
        let graph = CallGraph::build(&unit.files, &info, &decls);
        let order = graph.emission_order(&decls, &mut diagnostics);
        debug!(order = ?order, "emission order");
        decls.reorder(order);

        let mut worklists = Worklists {
            temps: desugar::hoist_temps(&mut unit.files, &mut info, &mut unit.ids),
            ..Worklists::default()
        };
        cursor.rebuild(&unit.files);
        worklists.multi_returns = desugar::name_results(&mut unit.files, &mut info, &mut unit.ids);
        cursor.rebuild(&unit.files);

        let hoisted = worklists.hoisted_defs();
        worklists.kv_pairs = desugar::index_assignments(&unit.files);
        let goroutines = desugar::harvest_goroutines(&unit.files, &info, &hoisted);
        worklists.goroutines = goroutines.goroutines;
        worklists.closure_args = goroutines.closure_args;
        worklists.chan_ops = desugar::harvest_chan_ops(&unit.files, &info);
        worklists.closures = desugar::harvest_closures(&unit.files, &info, &decls, &hoisted);
        let defers = desugar::harvest_defers(&unit.files, &decls);
        worklists.defers = defers.defers;
        worklists.defer_hosts = defers.defer_hosts;
        worklists.globals = desugar::classify_globals(&unit.files);

        info!(
            package = %unit.emit_name(),
            funcs = decls.order.len(),
            diagnostics = diagnostics.len(),
            "analysis finished"
        );
        Self {
            unit,
            config,
            info,
            cursor,
            decls,
            graph,
            worklists,
            preamble,
            import_aliases,
            dependencies,
            diagnostics,
            reconcile,
            clean,
        }
    }

    /// Function and method names, callees first.
    pub fn emission_order(&self) -> &[String] {
        &self.decls.order
    }
}

fn import_aliases(unit: &PackageUnit) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    for file in &unit.files {
        for import in &file.imports {
            let name = import.local_name();
            if name == "_" || name == "." {
                continue;
            }
            aliases.entry(name).or_insert_with(|| import.path.clone());
        }
    }
    aliases
}

#[cfg(test)]
mod tests;
