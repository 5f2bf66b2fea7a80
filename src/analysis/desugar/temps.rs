use crate::language::{
    ast::{Decl, Expr, File, Ident, NodeId, NodeIds, Stmt, UnaryOp},
    typecheck::{ObjKind, Object, ScopeLevel, TypeInfo},
    types::Type,
    visit::{walk_decl_mut, walk_expr_mut, walk_stmt_mut, VisitMut},
};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// `_tmp<n> := &T{...}`, to be emitted before `stmt`.
#[derive(Clone, Debug)]
pub struct TempVar {
    pub name: String,
    /// Defining identifier; it is not part of the tree.
    pub ident: Ident,
    /// The hoisted `&T{...}` expression.
    pub value: Expr,
    pub ty: Type,
    /// Nearest enclosing statement. Sites in a loop header are keyed to
    /// the loop itself, so they are hoisted before the loop and evaluated
    /// once.
    pub stmt: NodeId,
}

/// Replaces every `&T{...}` inside a function with a fresh temporary.
pub fn hoist_temps(
    files: &mut [File],
    info: &mut TypeInfo,
    ids: &mut NodeIds,
) -> BTreeMap<NodeId, Vec<TempVar>> {
    let mut hoister = Hoister {
        info,
        ids,
        stmts: Vec::new(),
        depth: 0,
        next: 0,
        temps: BTreeMap::new(),
    };
    for file in files.iter_mut() {
        hoister.visit_file_mut(file);
    }
    debug!(temps = hoister.next, stmts = hoister.temps.len(), "hoisted temporaries");
    hoister.temps
}

struct Hoister<'u> {
    info: &'u mut TypeInfo,
    ids: &'u mut NodeIds,
    stmts: Vec<NodeId>,
    /// Function bodies entered, literals included.
    depth: usize,
    next: usize,
    temps: BTreeMap<NodeId, Vec<TempVar>>,
}

impl Hoister<'_> {
    fn hoist(&mut self, expr: &mut Expr) {
        let (lit, span) = match &*expr {
            Expr::Unary {
                op: UnaryOp::Addr,
                expr: operand,
                span,
                ..
            } => match operand.unparen() {
                Expr::CompositeLit { id, .. } => (*id, *span),
                _ => return,
            },
            _ => return,
        };
        let stmt = match self.stmts.last() {
            Some(stmt) if self.depth > 0 => *stmt,
            _ => {
                debug!(?span, "address of composite literal outside a function left in place");
                return;
            }
        };

        let ty = self
            .info
            .type_of(expr.id())
            .filter(|ty| !ty.is_invalid())
            .cloned()
            .or_else(|| self.info.type_of(lit).cloned().map(Type::pointer))
            .unwrap_or(Type::Invalid);
        let name = format!("_tmp{}", self.next);
        self.next += 1;

        let def = self.ids.ident(name.clone(), span);
        let reference = self.ids.ident(name.clone(), span);
        let obj = self.info.add_object(Object {
            name: name.clone(),
            kind: ObjKind::Var,
            ty: ty.clone(),
            level: ScopeLevel::Local,
            def: Some(def.id),
            pkg: None,
            value: None,
        });
        self.info.defs.insert(def.id, obj);
        self.info.uses.insert(reference.id, obj);
        if !ty.is_invalid() {
            self.info.record_type(def.id, ty.clone());
            self.info.record_type(reference.id, ty.clone());
        }

        let value = std::mem::replace(expr, Expr::Ident(reference));
        trace!(name = %name, stmt = stmt.0, "hoisted composite literal");
        self.temps.entry(stmt).or_default().push(TempVar {
            name,
            ident: def,
            value,
            ty,
            stmt,
        });
    }
}

impl VisitMut for Hoister<'_> {
    fn visit_decl_mut(&mut self, decl: &mut Decl) {
        let is_func = matches!(decl, Decl::Func(_));
        if is_func {
            self.depth += 1;
        }
        walk_decl_mut(self, decl);
        if is_func {
            self.depth -= 1;
        }
    }

    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        self.stmts.push(stmt.id());
        walk_stmt_mut(self, stmt);
        self.stmts.pop();
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        let is_lit = matches!(expr, Expr::FuncLit { .. });
        if is_lit {
            self.depth += 1;
        }
        walk_expr_mut(self, expr);
        if is_lit {
            self.depth -= 1;
        }
        self.hoist(expr);
    }
}
