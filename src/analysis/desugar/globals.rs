use crate::language::ast::{Decl, File, GenKind, NodeId, Spec};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalKind {
    Var,
    Const,
}

/// Package-level `var` or `const` spec, emitted as static storage.
#[derive(Clone, Debug)]
pub struct Global {
    pub spec: NodeId,
    pub kind: GlobalKind,
    pub names: Vec<String>,
}

pub fn classify_globals(files: &[File]) -> Vec<Global> {
    let mut globals = Vec::new();
    for file in files {
        for decl in &file.decls {
            let Decl::Gen(gen) = decl else {
                continue;
            };
            let kind = match gen.kind {
                GenKind::Var => GlobalKind::Var,
                GenKind::Const => GlobalKind::Const,
                GenKind::Type => continue,
            };
            for spec in &gen.specs {
                let Spec::Value(spec) = spec else {
                    continue;
                };
                globals.push(Global {
                    spec: spec.id,
                    kind,
                    names: spec.names.iter().map(|name| name.name.clone()).collect(),
                });
            }
        }
    }
    debug!(globals = globals.len(), "globals classified");
    globals
}
