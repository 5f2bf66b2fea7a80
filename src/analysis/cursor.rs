//! Parent index over the tree.
//!
//! The AST has no parent links; passes that need "the call around this
//! selector" or "the statement containing this expression" look them up
//! here. The index is purged and rebuilt after every structural rewrite.

use crate::language::{
    ast::{Expr, File, NodeId},
    visit::Node,
};
use std::collections::HashMap;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Import,
    Decl,
    Spec,
    Field,
    FuncType,
    Block,
    Stmt,
    CaseClause,
    CommClause,
    Expr(ExprKind),
    Type,
    Ident,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprKind {
    Ident,
    BasicLit,
    CompositeLit,
    FuncLit,
    Paren,
    Selector,
    Index,
    Slice,
    TypeAssert,
    Call,
    Star,
    Unary,
    Binary,
    KeyValue,
    Type,
}

impl ExprKind {
    pub fn of(expr: &Expr) -> Self {
        match expr {
            Expr::Ident(_) => ExprKind::Ident,
            Expr::BasicLit { .. } => ExprKind::BasicLit,
            Expr::CompositeLit { .. } => ExprKind::CompositeLit,
            Expr::FuncLit { .. } => ExprKind::FuncLit,
            Expr::Paren { .. } => ExprKind::Paren,
            Expr::Selector { .. } => ExprKind::Selector,
            Expr::Index { .. } => ExprKind::Index,
            Expr::Slice { .. } => ExprKind::Slice,
            Expr::TypeAssert { .. } => ExprKind::TypeAssert,
            Expr::Call { .. } => ExprKind::Call,
            Expr::Star { .. } => ExprKind::Star,
            Expr::Unary { .. } => ExprKind::Unary,
            Expr::Binary { .. } => ExprKind::Binary,
            Expr::KeyValue { .. } => ExprKind::KeyValue,
            Expr::Type(_) => ExprKind::Type,
        }
    }
}

impl NodeKind {
    pub fn of(node: Node<'_>) -> Self {
        match node {
            Node::File(_) => NodeKind::File,
            Node::Import(_) => NodeKind::Import,
            Node::Decl(_) => NodeKind::Decl,
            Node::Spec(_) => NodeKind::Spec,
            Node::Field(_) => NodeKind::Field,
            Node::FuncType(_) => NodeKind::FuncType,
            Node::Block(_) => NodeKind::Block,
            Node::Stmt(_) => NodeKind::Stmt,
            Node::CaseClause(_) => NodeKind::CaseClause,
            Node::CommClause(_) => NodeKind::CommClause,
            Node::Expr(expr) => NodeKind::Expr(ExprKind::of(expr)),
            Node::Type(_) => NodeKind::Type,
            Node::Ident(_) => NodeKind::Ident,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub parent: Option<NodeId>,
    /// Position among the parent's children.
    pub index: usize,
    pub kind: NodeKind,
}

#[derive(Clone, Debug, Default)]
pub struct CursorIndex {
    entries: HashMap<NodeId, Entry>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl CursorIndex {
    pub fn build(files: &[File]) -> Self {
        let mut index = Self::default();
        index.rebuild(files);
        index
    }

    /// Drops every entry and indexes `files` again.
    pub fn rebuild(&mut self, files: &[File]) {
        self.entries.clear();
        self.children.clear();
        for (idx, file) in files.iter().enumerate() {
            self.index_node(Node::File(file), None, idx);
        }
        trace!(nodes = self.entries.len(), "cursor index rebuilt");
    }

    fn index_node(&mut self, node: Node<'_>, parent: Option<NodeId>, index: usize) {
        let id = node.id();
        self.entries.insert(
            id,
            Entry {
                parent,
                index,
                kind: NodeKind::of(node),
            },
        );
        let children = node.children();
        self.children
            .insert(id, children.iter().map(|child| child.id()).collect());
        for (idx, child) in children.into_iter().enumerate() {
            self.index_node(child, Some(id), idx);
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries.get(&id).and_then(|entry| entry.parent)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.entries.get(&id).map(|entry| entry.kind)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let entry = self.entries.get(&id)?;
        let siblings = self.children(entry.parent?);
        siblings.get(entry.index + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let entry = self.entries.get(&id)?;
        let siblings = self.children(entry.parent?);
        entry.index.checked_sub(1).and_then(|idx| siblings.get(idx).copied())
    }

    /// Parents of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Nearest ancestor that is a statement.
    pub fn enclosing_stmt(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|ancestor| self.kind(*ancestor) == Some(NodeKind::Stmt))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
