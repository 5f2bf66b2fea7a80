use crate::{
    analysis::callgraph::DeclIndex,
    language::{
        ast::{Decl, Expr, File, NodeId},
        typecheck::{ObjId, TypeInfo},
        types::Type,
        visit::{walk, walk_files, Node, Visitor},
    },
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Local variable of an enclosing function referenced inside a literal.
#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    pub name: String,
    pub obj: ObjId,
    pub ty: Type,
}

#[derive(Clone, Debug)]
pub struct Closure {
    pub lit: NodeId,
    /// Qualified name of the declaration the literal appears in; `None`
    /// for package-level initializers.
    pub enclosing: Option<String>,
    /// Innermost literal around this one.
    pub outer: Option<NodeId>,
    pub captures: Vec<Capture>,
}

/// Captured variables of the function literal `lit`, in order of first
/// reference. `hoisted` maps definitions that live outside the tree
/// (hoisted temporaries) to the statement they are emitted before.
pub fn captures_of(lit: &Expr, info: &TypeInfo, hoisted: &HashMap<NodeId, NodeId>) -> Vec<Capture> {
    let mut scan = Scan::default();
    walk(&mut scan, Node::Expr(lit));

    let mut seen = HashSet::new();
    let mut captures = Vec::new();
    for reference in scan.refs {
        let Some(obj) = info.uses.get(&reference).copied() else {
            continue;
        };
        let object = info.object(obj);
        if !object.is_local_var() {
            continue;
        }
        let defined_inside = match object.def {
            Some(def) => {
                scan.inside.contains(&def)
                    || hoisted
                        .get(&def)
                        .is_some_and(|stmt| scan.inside.contains(stmt))
            }
            None => true,
        };
        if !defined_inside && seen.insert(obj) {
            captures.push(Capture {
                name: object.name.clone(),
                obj,
                ty: object.ty.clone(),
            });
        }
    }
    captures
}

#[derive(Default)]
struct Scan {
    inside: HashSet<NodeId>,
    refs: Vec<NodeId>,
}

impl<'a> Visitor<'a> for Scan {
    fn enter(&mut self, node: Node<'a>) -> bool {
        self.inside.insert(node.id());
        if let Node::Expr(Expr::Ident(ident)) = node {
            self.refs.push(ident.id);
        }
        true
    }
}

pub fn harvest_closures(
    files: &[File],
    info: &TypeInfo,
    decls: &DeclIndex,
    hoisted: &HashMap<NodeId, NodeId>,
) -> Vec<Closure> {
    let mut harvester = Harvester {
        info,
        decls,
        hoisted,
        funcs: Vec::new(),
        lits: Vec::new(),
        closures: Vec::new(),
    };
    walk_files(&mut harvester, files);
    debug!(closures = harvester.closures.len(), "closures harvested");
    harvester.closures
}

struct Harvester<'i> {
    info: &'i TypeInfo,
    decls: &'i DeclIndex,
    hoisted: &'i HashMap<NodeId, NodeId>,
    funcs: Vec<String>,
    lits: Vec<NodeId>,
    closures: Vec<Closure>,
}

impl<'a> Visitor<'a> for Harvester<'_> {
    fn enter(&mut self, node: Node<'a>) -> bool {
        match node {
            Node::Decl(Decl::Func(func)) => {
                let name = self
                    .decls
                    .name_of(func.id)
                    .map(str::to_string)
                    .unwrap_or_else(|| func.qualified_name());
                self.funcs.push(name);
            }
            Node::Expr(lit @ Expr::FuncLit { id, .. }) => {
                self.closures.push(Closure {
                    lit: *id,
                    enclosing: self.funcs.last().cloned(),
                    outer: self.lits.last().copied(),
                    captures: captures_of(lit, self.info, self.hoisted),
                });
                self.lits.push(*id);
            }
            _ => {}
        }
        true
    }

    fn leave(&mut self, node: Node<'a>) {
        match node {
            Node::Decl(Decl::Func(_)) => {
                self.funcs.pop();
            }
            Node::Expr(Expr::FuncLit { .. }) => {
                self.lits.pop();
            }
            _ => {}
        }
    }
}
