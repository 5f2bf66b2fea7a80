//! Placeholder types for symbols of the `C` pseudo-package.
//!
//! The checker leaves `C.<sym>` unresolved. Seeding gives every such
//! selector (and the call around it, and every `C.<type>` spelling) a
//! `<sym>__ctype` placeholder; propagation pushes those through
//! assignments and declarations until nothing changes; verification
//! reports whatever is still untyped.

use crate::{
    analysis::{
        cursor::{CursorIndex, ExprKind, NodeKind},
        diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity},
    },
    language::{
        ast::{
            AssignOp, BinaryOp, Decl, Expr, File, GenKind, Ident, LitKind, NodeId, Spec, Stmt,
            TypeExpr, UnaryOp,
        },
        span::Span,
        typecheck::{ObjKind, TypeInfo},
        types::{BasicKind, Type},
        visit::{walk_files, Node, Visitor},
    },
};
use std::{collections::HashSet, path::PathBuf};
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub seeded: usize,
    pub propagated: usize,
    pub rounds: usize,
    pub untyped_decls: usize,
    pub unresolved: usize,
}

pub fn reconcile(
    files: &[File],
    info: &mut TypeInfo,
    cursor: &CursorIndex,
    diagnostics: &mut Diagnostics,
) -> ReconcileReport {
    let seeded = seed(files, info, cursor);
    let propagation = propagate(files, info);
    let untyped_decls = report_untyped_decls(files, info, diagnostics);
    let unresolved = verify(files, info, diagnostics);
    let report = ReconcileReport {
        seeded,
        propagated: propagation.changed,
        rounds: propagation.rounds,
        untyped_decls,
        unresolved,
    };
    debug!(?report, "cgo reconciliation done");
    report
}

// ---- seed --------------------------------------------------------------

/// Writes placeholders for `C` selectors, their calls and `C` type
/// spellings. Returns how many entries were written.
pub fn seed(files: &[File], info: &mut TypeInfo, cursor: &CursorIndex) -> usize {
    let mut seeds = Seeds {
        info,
        cursor,
        found: Vec::new(),
        seen: HashSet::new(),
    };
    walk_files(&mut seeds, files);
    let found = seeds.found;

    let mut count = 0;
    for (id, ty, is_type) in found {
        if info.is_resolved(id) {
            continue;
        }
        trace!(id = id.0, %ty, "seeded placeholder");
        info.record_type(id, ty);
        if is_type {
            info.type_exprs.insert(id);
        }
        count += 1;
    }
    count
}

struct Seeds<'i> {
    info: &'i TypeInfo,
    cursor: &'i CursorIndex,
    found: Vec<(NodeId, Type, bool)>,
    seen: HashSet<NodeId>,
}

impl Seeds<'_> {
    fn push(&mut self, id: NodeId, ty: Type, is_type: bool) {
        if !self.info.is_resolved(id) && self.seen.insert(id) {
            self.found.push((id, ty, is_type));
        }
    }

    fn is_c_selector(&self, id: NodeId) -> bool {
        self.info
            .selections
            .get(&id)
            .is_some_and(|selection| selection.pkg.as_deref() == Some("C"))
    }
}

impl<'a> Visitor<'a> for Seeds<'_> {
    fn enter(&mut self, node: Node<'a>) -> bool {
        match node {
            Node::Expr(Expr::Selector { id, sel, .. }) if self.is_c_selector(*id) => {
                let ty = Type::foreign(&sel.name);
                self.push(*id, ty.clone(), false);
                let callee_of_call = self.cursor.get(*id).is_some_and(|entry| {
                    entry.index == 0
                        && entry.parent.and_then(|parent| self.cursor.kind(parent))
                            == Some(NodeKind::Expr(ExprKind::Call))
                });
                if callee_of_call {
                    if let Some(call) = self.cursor.parent(*id) {
                        self.push(call, ty, false);
                    }
                }
            }
            Node::Expr(Expr::CompositeLit { id, ty: Some(ty), .. }) => {
                if let Some(foreign) = foreign_type_of(ty, self.info) {
                    self.push(ty.id(), foreign.clone(), true);
                    self.push(*id, foreign, false);
                }
            }
            Node::Expr(Expr::Type(ty)) | Node::Type(ty) => {
                if let Some(foreign) = foreign_type_of(ty, self.info) {
                    self.push(ty.id(), foreign, true);
                }
            }
            _ => {}
        }
        true
    }
}

fn is_c_package(pkg: &Ident, info: &TypeInfo) -> bool {
    match info.uses.get(&pkg.id) {
        Some(obj) => matches!(&info.object(*obj).kind, ObjKind::PkgName(path) if path == "C"),
        None => pkg.name == "C",
    }
}

/// Type of a type expression that spells a `C` type somewhere inside.
/// `None` when no `C` part is involved or the shape is unsupported.
fn foreign_type_of(ty: &TypeExpr, info: &TypeInfo) -> Option<Type> {
    let known = |ty: &TypeExpr| {
        foreign_type_of(ty, info).or_else(|| info.type_of(ty.id()).filter(|t| !t.is_invalid()).cloned())
    };
    match ty {
        TypeExpr::Qualified { pkg, name, .. } if is_c_package(pkg, info) => {
            Some(Type::foreign(&name.name))
        }
        TypeExpr::Pointer { elem, .. } => foreign_type_of(elem, info).map(Type::pointer),
        TypeExpr::Slice { elem, .. } | TypeExpr::Ellipsis { elem, .. } => {
            foreign_type_of(elem, info).map(Type::slice)
        }
        TypeExpr::Array { len, elem, .. } => {
            let elem = foreign_type_of(elem, info)?;
            let len = match len.as_deref() {
                Some(Expr::BasicLit {
                    kind: LitKind::Int,
                    value,
                    ..
                }) => value.parse::<u64>().ok(),
                _ => None,
            };
            Some(Type::Array(len, Box::new(elem)))
        }
        TypeExpr::Chan { dir, elem, .. } => {
            foreign_type_of(elem, info).map(|elem| Type::Chan(*dir, Box::new(elem)))
        }
        TypeExpr::Map { key, value, .. } => {
            if foreign_type_of(key, info).is_none() && foreign_type_of(value, info).is_none() {
                return None;
            }
            Some(Type::Map(Box::new(known(key)?), Box::new(known(value)?)))
        }
        _ => None,
    }
}

// ---- propagate ---------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum Source {
    Same(NodeId),
    TupleItem(NodeId, usize),
    AddrOf(NodeId),
    Deref(NodeId),
    Binary(BinaryOp, NodeId, NodeId),
}

#[derive(Clone, Copy, Debug)]
struct Link {
    target: NodeId,
    source: Source,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Propagation {
    pub changed: usize,
    pub rounds: usize,
}

/// Copies known types into unresolved assignment targets, declared names
/// and simple derived expressions until a round changes nothing.
pub fn propagate(files: &[File], info: &mut TypeInfo) -> Propagation {
    let mut collector = LinkCollector { links: Vec::new() };
    walk_files(&mut collector, files);
    let links = collector.links;

    let mut result = Propagation::default();
    loop {
        let changed = propagate_round(&links, info);
        if changed == 0 {
            break;
        }
        result.changed += changed;
        result.rounds += 1;
    }
    trace!(links = links.len(), ?result, "propagation reached a fixed point");
    result
}

fn propagate_round(links: &[Link], info: &mut TypeInfo) -> usize {
    let mut changed = 0;
    for link in links {
        if info.is_resolved(link.target) {
            continue;
        }
        let Some(ty) = source_type(link.source, info) else {
            continue;
        };
        info.record_type(link.target, ty.clone());
        changed += 1;

        let Some(obj) = info.object_of(link.target) else {
            continue;
        };
        if info.object(obj).ty.is_invalid() {
            info.object_mut(obj).ty = ty.clone();
        }
        for use_id in info.uses_of(obj) {
            if !info.is_resolved(use_id) {
                info.record_type(use_id, ty.clone());
                changed += 1;
            }
        }
    }
    changed
}

fn source_type(source: Source, info: &TypeInfo) -> Option<Type> {
    let resolved = |id: NodeId| {
        info.type_of(id)
            .filter(|ty| !ty.is_invalid() && !matches!(ty, Type::Tuple(_)))
            .map(Type::default_type)
    };
    match source {
        Source::Same(id) => resolved(id),
        Source::TupleItem(id, idx) => match info.type_of(id)? {
            Type::Tuple(items) => items.get(idx).filter(|ty| !ty.is_invalid()).cloned(),
            _ => None,
        },
        Source::AddrOf(id) => resolved(id).map(Type::pointer),
        Source::Deref(id) => resolved(id).and_then(|ty| ty.pointer_elem().cloned()),
        Source::Binary(op, left, right) => {
            let (left, right) = (resolved(left), resolved(right));
            if left.is_none() && right.is_none() {
                return None;
            }
            match op {
                _ if op.is_comparison() => Some(Type::Basic(BasicKind::Bool)),
                BinaryOp::LogAnd | BinaryOp::LogOr => Some(Type::Basic(BasicKind::Bool)),
                _ if op.is_shift() => left,
                _ => left.or(right),
            }
        }
    }
}

struct LinkCollector {
    links: Vec<Link>,
}

impl LinkCollector {
    fn pair(&mut self, targets: &[NodeId], sources: &[NodeId]) {
        if targets.len() == sources.len() {
            for (target, source) in targets.iter().zip(sources) {
                self.links.push(Link {
                    target: *target,
                    source: Source::Same(*source),
                });
            }
        } else if let [source] = sources {
            for (idx, target) in targets.iter().enumerate() {
                self.links.push(Link {
                    target: *target,
                    source: Source::TupleItem(*source, idx),
                });
            }
        }
    }
}

impl<'a> Visitor<'a> for LinkCollector {
    fn enter(&mut self, node: Node<'a>) -> bool {
        match node {
            Node::Stmt(Stmt::Assign(assign))
                if matches!(assign.op, AssignOp::Assign | AssignOp::Define) =>
            {
                let lhs: Vec<NodeId> = assign.lhs.iter().map(Expr::id).collect();
                let rhs: Vec<NodeId> = assign.rhs.iter().map(Expr::id).collect();
                self.pair(&lhs, &rhs);
            }
            Node::Spec(Spec::Value(spec)) => {
                let names: Vec<NodeId> = spec.names.iter().map(|name| name.id).collect();
                match &spec.ty {
                    Some(ty) => {
                        for name in names {
                            self.links.push(Link {
                                target: name,
                                source: Source::Same(ty.id()),
                            });
                        }
                    }
                    None => {
                        let values: Vec<NodeId> = spec.values.iter().map(Expr::id).collect();
                        self.pair(&names, &values);
                    }
                }
            }
            Node::FuncType(func) => {
                for field in func.params.iter().chain(&func.results) {
                    for name in &field.names {
                        self.links.push(Link {
                            target: name.id,
                            source: Source::Same(field.ty.id()),
                        });
                    }
                }
            }
            Node::Expr(expr) => {
                let source = match expr {
                    Expr::Paren { expr: inner, .. } => Some(Source::Same(inner.id())),
                    Expr::Unary {
                        op: UnaryOp::Addr,
                        expr: inner,
                        ..
                    } => Some(Source::AddrOf(inner.id())),
                    Expr::Unary {
                        op: UnaryOp::Neg | UnaryOp::Pos | UnaryOp::BitNot,
                        expr: inner,
                        ..
                    } => Some(Source::Same(inner.id())),
                    Expr::Star { expr: inner, .. } => Some(Source::Deref(inner.id())),
                    Expr::Binary {
                        op, left, right, ..
                    } => Some(Source::Binary(*op, left.id(), right.id())),
                    _ => None,
                };
                if let Some(source) = source {
                    self.links.push(Link {
                        target: expr.id(),
                        source,
                    });
                }
            }
            _ => {}
        }
        true
    }
}

// ---- reports -----------------------------------------------------------

/// `var` specs without an initializer whose names still have no type.
fn report_untyped_decls(files: &[File], info: &TypeInfo, diagnostics: &mut Diagnostics) -> usize {
    let mut count = 0;
    let mut finder = UntypedDecls {
        info,
        path: PathBuf::new(),
        in_var: false,
        found: Vec::new(),
    };
    walk_files(&mut finder, files);
    for (path, span, name) in finder.found {
        diagnostics.push(
            Diagnostic::new(
                Severity::Warning,
                DiagnosticKind::UntypedDeclaration,
                format!("untyped declaration of {name}"),
            )
            .at(path, span),
        );
        count += 1;
    }
    count
}

struct UntypedDecls<'i> {
    info: &'i TypeInfo,
    path: PathBuf,
    in_var: bool,
    found: Vec<(PathBuf, Span, String)>,
}

impl<'a> Visitor<'a> for UntypedDecls<'_> {
    fn enter(&mut self, node: Node<'a>) -> bool {
        match node {
            Node::File(file) => self.path = file.path.clone(),
            Node::Decl(Decl::Gen(decl)) => self.in_var = decl.kind == GenKind::Var,
            Node::Stmt(Stmt::Decl(decl)) => self.in_var = decl.kind == GenKind::Var,
            Node::Spec(Spec::Value(spec)) if self.in_var && spec.values.is_empty() => {
                for name in spec.names.iter().filter(|name| !name.is_blank()) {
                    let typed = self.info.is_resolved(name.id)
                        || self
                            .info
                            .object_of(name.id)
                            .is_some_and(|obj| !self.info.object(obj).ty.is_invalid());
                    if !typed {
                        self.found.push((self.path.clone(), spec.span, name.name.clone()));
                    }
                }
            }
            _ => {}
        }
        true
    }
}

/// Reports value expressions that are neither concrete nor placeholders.
pub fn verify(files: &[File], info: &TypeInfo, diagnostics: &mut Diagnostics) -> usize {
    let mut finder = Unresolved {
        info,
        path: PathBuf::new(),
        found: Vec::new(),
    };
    walk_files(&mut finder, files);
    let count = finder.found.len();
    for (path, span, label) in finder.found {
        diagnostics.push(
            Diagnostic::new(
                Severity::Warning,
                DiagnosticKind::UnresolvedType,
                format!("unresolved type for {label}"),
            )
            .at(path, span),
        );
    }
    count
}

struct Unresolved<'i> {
    info: &'i TypeInfo,
    path: PathBuf,
    found: Vec<(PathBuf, Span, String)>,
}

impl Unresolved<'_> {
    fn skipped(&self, expr: &Expr) -> bool {
        let id = expr.id();
        match expr {
            Expr::KeyValue { .. } | Expr::Type(_) => true,
            Expr::Ident(ident) if ident.is_blank() => true,
            _ => self.info.type_exprs.contains(&id) || self.info.opaque.contains(&id),
        }
    }
}

impl<'a> Visitor<'a> for Unresolved<'_> {
    fn enter(&mut self, node: Node<'a>) -> bool {
        match node {
            Node::File(file) => self.path = file.path.clone(),
            Node::Expr(expr) if !self.skipped(expr) && !self.info.is_resolved(expr.id()) => {
                self.found
                    .push((self.path.clone(), expr.span(), describe(expr)));
            }
            _ => {}
        }
        true
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(ident) => format!("`{}`", ident.name),
        Expr::Selector { sel, .. } => format!("selector `.{}`", sel.name),
        Expr::Call { .. } => "call".into(),
        Expr::CompositeLit { .. } => "composite literal".into(),
        other => format!("{:?} expression", ExprKind::of(other)).to_lowercase(),
    }
}
