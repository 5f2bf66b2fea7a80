use crate::{
    analysis::callgraph::DeclIndex,
    language::{
        ast::{Decl, Expr, File, NodeId, Stmt},
        visit::{walk_files, Node, Visitor},
    },
};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct Deferred {
    pub stmt: NodeId,
    pub call: NodeId,
    /// Function declaration or literal the statement belongs to.
    pub host: NodeId,
}

/// Function that runs deferred calls.
#[derive(Clone, Debug)]
pub struct DeferHost {
    pub func: NodeId,
    /// Qualified name; `None` for function literals.
    pub name: Option<String>,
    pub defers: usize,
    /// No results: the deferred calls run from a wrapper on exit.
    pub needs_exit_wrapper: bool,
}

#[derive(Clone, Debug, Default)]
pub struct DeferWork {
    pub defers: Vec<Deferred>,
    pub defer_hosts: BTreeMap<NodeId, DeferHost>,
}

pub fn harvest_defers(files: &[File], decls: &DeclIndex) -> DeferWork {
    let mut harvester = Harvester {
        decls,
        hosts: Vec::new(),
        work: DeferWork::default(),
    };
    walk_files(&mut harvester, files);
    let work = harvester.work;
    debug!(
        defers = work.defers.len(),
        hosts = work.defer_hosts.len(),
        "deferred calls harvested"
    );
    work
}

struct Frame {
    id: NodeId,
    name: Option<String>,
    results: usize,
}

struct Harvester<'i> {
    decls: &'i DeclIndex,
    hosts: Vec<Frame>,
    work: DeferWork,
}

impl<'a> Visitor<'a> for Harvester<'_> {
    fn enter(&mut self, node: Node<'a>) -> bool {
        match node {
            Node::Decl(Decl::Func(func)) => self.hosts.push(Frame {
                id: func.id,
                name: Some(
                    self.decls
                        .name_of(func.id)
                        .map(str::to_string)
                        .unwrap_or_else(|| func.qualified_name()),
                ),
                results: func.ty.result_count(),
            }),
            Node::Expr(Expr::FuncLit { id, ty, .. }) => self.hosts.push(Frame {
                id: *id,
                name: None,
                results: ty.result_count(),
            }),
            Node::Stmt(Stmt::Defer(defer)) => {
                let Some(frame) = self.hosts.last() else {
                    debug!(stmt = defer.id.0, "defer outside a function skipped");
                    return true;
                };
                self.work.defers.push(Deferred {
                    stmt: defer.id,
                    call: defer.call.id(),
                    host: frame.id,
                });
                let host = self
                    .work
                    .defer_hosts
                    .entry(frame.id)
                    .or_insert_with(|| DeferHost {
                        func: frame.id,
                        name: frame.name.clone(),
                        defers: 0,
                        needs_exit_wrapper: frame.results == 0,
                    });
                host.defers += 1;
            }
            _ => {}
        }
        true
    }

    fn leave(&mut self, node: Node<'a>) {
        if matches!(node, Node::Decl(Decl::Func(_)) | Node::Expr(Expr::FuncLit { .. })) {
            self.hosts.pop();
        }
    }
}
