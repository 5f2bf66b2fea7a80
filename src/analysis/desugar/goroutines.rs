use crate::{
    analysis::desugar::closures::{captures_of, Capture},
    language::{
        ast::{Expr, File, NodeId, Stmt},
        typecheck::{SelectionKind, TypeInfo},
        visit::{walk_files, Node, Visitor},
    },
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GoTarget {
    /// `go func(...) {...}(...)`; holds the literal.
    Literal(NodeId),
    /// A named function or method, by qualified name.
    Named(String),
    Other,
}

#[derive(Clone, Debug)]
pub struct Goroutine {
    pub stmt: NodeId,
    pub call: NodeId,
    pub target: GoTarget,
    /// The launch must pack its inputs into an argument structure.
    pub needs_args: bool,
}

/// Inputs of a goroutine launch: captured variables and call arguments.
#[derive(Clone, Debug, Default)]
pub struct ArgStruct {
    pub captures: Vec<Capture>,
    pub args: Vec<NodeId>,
}

#[derive(Clone, Debug, Default)]
pub struct GoroutineWork {
    pub goroutines: Vec<Goroutine>,
    /// Keyed by the `go` statement.
    pub closure_args: BTreeMap<NodeId, ArgStruct>,
}

pub fn harvest_goroutines(
    files: &[File],
    info: &TypeInfo,
    hoisted: &HashMap<NodeId, NodeId>,
) -> GoroutineWork {
    let mut harvester = Harvester {
        info,
        hoisted,
        work: GoroutineWork::default(),
    };
    walk_files(&mut harvester, files);
    let work = harvester.work;
    debug!(
        goroutines = work.goroutines.len(),
        arg_structs = work.closure_args.len(),
        "goroutines harvested"
    );
    work
}

struct Harvester<'i> {
    info: &'i TypeInfo,
    hoisted: &'i HashMap<NodeId, NodeId>,
    work: GoroutineWork,
}

impl Harvester<'_> {
    fn named_target(&self, callee: &Expr) -> Option<String> {
        match callee {
            Expr::Ident(ident) => Some(ident.name.clone()),
            Expr::Selector { id, base, sel, .. } => {
                let selection = self.info.selections.get(id);
                match selection {
                    Some(selection)
                        if matches!(
                            selection.kind,
                            SelectionKind::Method | SelectionKind::MethodExpr
                        ) =>
                    {
                        let declaring = selection.declaring.clone().or_else(|| {
                            selection.recv.named_base().map(|(_, name)| name.to_string())
                        })?;
                        Some(format!("{declaring}_{}", sel.name))
                    }
                    _ => base.as_ident().map(|pkg| format!("{}.{}", pkg.name, sel.name)),
                }
            }
            _ => None,
        }
    }
}

impl<'a> Visitor<'a> for Harvester<'_> {
    fn enter(&mut self, node: Node<'a>) -> bool {
        let Node::Stmt(Stmt::Go(go)) = node else {
            return true;
        };
        let Expr::Call { id, func, args, .. } = &go.call else {
            debug!(stmt = go.id.0, "go statement without a call skipped");
            return true;
        };
        let arg_ids: Vec<NodeId> = args.iter().map(Expr::id).collect();
        let callee = func.unparen();
        let (target, needs_args) = match callee {
            Expr::FuncLit { id: lit, .. } => {
                let captures = captures_of(callee, self.info, self.hoisted);
                let needs_args = !captures.is_empty() || !arg_ids.is_empty();
                if needs_args {
                    self.work.closure_args.insert(
                        go.id,
                        ArgStruct {
                            captures,
                            args: arg_ids,
                        },
                    );
                }
                (GoTarget::Literal(*lit), needs_args)
            }
            other => match self.named_target(other) {
                Some(name) => {
                    let needs_args = !arg_ids.is_empty();
                    if needs_args {
                        self.work.closure_args.insert(
                            go.id,
                            ArgStruct {
                                captures: Vec::new(),
                                args: arg_ids,
                            },
                        );
                    }
                    (GoTarget::Named(name), needs_args)
                }
                None => {
                    debug!(stmt = go.id.0, "go statement with an unsupported callee");
                    (GoTarget::Other, false)
                }
            },
        };
        self.work.goroutines.push(Goroutine {
            stmt: go.id,
            call: *id,
            target,
            needs_args,
        });
        true
    }
}
