//! Removes the helper declarations `go tool cgo` writes into its output
//! and undoes its renames, so only user code reaches the later passes.

use crate::language::{
    ast::{Decl, Expr, File, GenDecl, GenKind, Ident, NodeIds, Spec, Stmt, ValueSpec},
    typecheck::TypeInfo,
    types::Type,
    visit::{walk_expr_mut, walk_file_mut, VisitMut},
};
use tracing::{debug, trace};

pub const HELPER_FUNCS: &[&str] = &[
    "_cgo_runtime_cgocallback",
    "_cgoCheckResult",
    "_cgoCheckPointer",
    "_Cgo_use",
    "_cgo_runtime_cgocall",
    "_Cgo_ptr",
    "_cgo_cmalloc",
    "runtime_throw",
    "_cgo_runtime_gostringn",
    "_cgo_runtime_gostring",
];

const HELPER_VALUE_PREFIXES: &[&str] = &["__cgofn__cgo_", "_cgo_", "_Ciconst_", "_Cfpvar_"];
const ICONST_PREFIX: &str = "_Ciconst_";
const FPVAR_FP_PREFIX: &str = "_Cfpvar_fp_";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed_funcs: usize,
    pub removed_specs: usize,
    pub removed_decls: usize,
    pub unwrapped_ptrs: usize,
    pub renamed_idents: usize,
}

impl CleanReport {
    pub fn is_empty(&self) -> bool {
        *self == CleanReport::default()
    }
}

pub fn clean(files: &mut [File], info: &mut TypeInfo, ids: &mut NodeIds) -> CleanReport {
    let mut cleaner = Cleaner {
        info,
        ids,
        report: CleanReport::default(),
    };
    for file in files.iter_mut() {
        cleaner.visit_file_mut(file);
    }
    let report = cleaner.report;
    debug!(?report, "cgo artifacts cleaned");
    report
}

struct Cleaner<'u> {
    info: &'u mut TypeInfo,
    ids: &'u mut NodeIds,
    report: CleanReport,
}

impl Cleaner<'_> {
    fn is_helper_func(decl: &Decl) -> bool {
        matches!(decl, Decl::Func(func) if func.recv.is_none() && HELPER_FUNCS.contains(&func.name.name.as_str()))
    }

    fn is_helper_spec(&self, spec: &ValueSpec) -> bool {
        let Some(first) = spec.names.first() else {
            return false;
        };
        if first.is_blank() {
            return true;
        }
        if HELPER_VALUE_PREFIXES
            .iter()
            .any(|prefix| first.name.starts_with(prefix))
        {
            return true;
        }
        let Some(ty) = &spec.ty else {
            return false;
        };
        match self.info.type_of(ty.id()) {
            Some(Type::Named { pkg, name }) => pkg == "syscall" && name == "Errno",
            _ => ty.spelling() == "syscall.Errno",
        }
    }

    /// Drops helper specs from a `var`/`const` declaration. Returns true
    /// when the declaration had specs and none are left.
    fn clean_gen_decl(&mut self, decl: &mut GenDecl) -> bool {
        if decl.kind == GenKind::Type || decl.specs.is_empty() {
            return false;
        }
        let before = decl.specs.len();
        let mut kept = Vec::with_capacity(before);
        for spec in std::mem::take(&mut decl.specs) {
            match &spec {
                Spec::Value(value) if self.is_helper_spec(value) => {
                    trace!(name = %value.names[0].name, "removed cgo helper spec");
                }
                _ => kept.push(spec),
            }
        }
        self.report.removed_specs += before - kept.len();
        decl.specs = kept;
        decl.specs.is_empty()
    }

    fn rename(&mut self, ident: &mut Ident, name: String) {
        let fresh = self.ids.fresh();
        self.info.rebind(ident.id, fresh);
        trace!(from = %ident.name, to = %name, "renamed cgo identifier");
        ident.id = fresh;
        ident.name = name;
    }

    /// `_Cgo_ptr(x)` becomes `x`.
    fn unwrap_ptr(&mut self, expr: &mut Expr) {
        let Expr::Call { id, func, args, .. } = expr else {
            return;
        };
        if args.len() != 1 || func.as_ident().map(|func| func.name.as_str()) != Some("_Cgo_ptr") {
            return;
        }
        let call = *id;
        let Some(mut inner) = args.pop() else {
            return;
        };
        if let Expr::Ident(ident) = &mut inner {
            if let Some(stripped) = ident.name.strip_prefix(FPVAR_FP_PREFIX).map(str::to_string) {
                self.rename(ident, stripped);
            }
        }
        if let Some(ty) = self.info.types.remove(&call) {
            if !self.info.is_resolved(inner.id()) {
                self.info.record_type(inner.id(), ty);
            }
        }
        *expr = inner;
        self.report.unwrapped_ptrs += 1;
    }
}

impl VisitMut for Cleaner<'_> {
    fn visit_file_mut(&mut self, file: &mut File) {
        let before = file.decls.len();
        file.decls.retain(|decl| !Self::is_helper_func(decl));
        self.report.removed_funcs += before - file.decls.len();

        let mut kept = Vec::with_capacity(file.decls.len());
        for mut decl in std::mem::take(&mut file.decls) {
            let emptied = match &mut decl {
                Decl::Gen(gen) => self.clean_gen_decl(gen),
                Decl::Func(_) => false,
            };
            if emptied {
                self.report.removed_decls += 1;
            } else {
                kept.push(decl);
            }
        }
        file.decls = kept;
        walk_file_mut(self, file);
    }

    fn visit_stmts_mut(&mut self, stmts: &mut Vec<Stmt>) {
        let mut kept = Vec::with_capacity(stmts.len());
        for mut stmt in std::mem::take(stmts) {
            if let Stmt::Decl(decl) = &mut stmt {
                if self.clean_gen_decl(decl) {
                    self.report.removed_decls += 1;
                    continue;
                }
            }
            kept.push(stmt);
        }
        *stmts = kept;
        for stmt in stmts.iter_mut() {
            self.visit_stmt_mut(stmt);
        }
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
        self.unwrap_ptr(expr);
    }

    fn visit_ident_mut(&mut self, ident: &mut Ident) {
        if let Some(stripped) = ident.name.strip_prefix(ICONST_PREFIX).map(str::to_string) {
            if !stripped.is_empty() {
                self.rename(ident, stripped);
                self.report.renamed_idents += 1;
            }
        }
    }
}
