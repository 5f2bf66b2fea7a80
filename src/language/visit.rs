//! Tree traversal.
//!
//! `Visitor` is a read-only walk with enter/leave hooks; returning `false`
//! from `enter` skips the node's children (its `leave` still runs).
//! `VisitMut` is a rewriting walk in the style of `syn::visit_mut`: every
//! hook defaults to the matching `walk_*_mut` function.

use crate::language::ast::*;

#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    File(&'a File),
    Import(&'a ImportSpec),
    Decl(&'a Decl),
    Spec(&'a Spec),
    Field(&'a Field),
    FuncType(&'a FuncType),
    Block(&'a Block),
    Stmt(&'a Stmt),
    CaseClause(&'a CaseClause),
    CommClause(&'a CommClause),
    Expr(&'a Expr),
    Type(&'a TypeExpr),
    Ident(&'a Ident),
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        match self {
            Node::File(file) => file.id,
            Node::Import(import) => import.id,
            Node::Decl(decl) => decl.id(),
            Node::Spec(spec) => spec.id(),
            Node::Field(field) => field.id,
            Node::FuncType(func) => func.id,
            Node::Block(block) => block.id,
            Node::Stmt(stmt) => stmt.id(),
            Node::CaseClause(clause) => clause.id,
            Node::CommClause(clause) => clause.id,
            Node::Expr(expr) => expr.id(),
            Node::Type(ty) => ty.id(),
            Node::Ident(ident) => ident.id,
        }
    }

    /// Direct children in source order.
    pub fn children(self) -> Vec<Node<'a>> {
        let mut out = Vec::new();
        match self {
            Node::File(file) => {
                out.extend(file.imports.iter().map(Node::Import));
                out.extend(file.decls.iter().map(Node::Decl));
            }
            Node::Import(import) => out.extend(import.name.iter().map(Node::Ident)),
            Node::Decl(Decl::Gen(decl)) => out.extend(decl.specs.iter().map(Node::Spec)),
            Node::Decl(Decl::Func(func)) => {
                out.extend(func.recv.iter().map(Node::Field));
                out.push(Node::Ident(&func.name));
                out.push(Node::FuncType(&func.ty));
                out.extend(func.body.iter().map(Node::Block));
            }
            Node::Spec(Spec::Value(spec)) => {
                out.extend(spec.names.iter().map(Node::Ident));
                out.extend(spec.ty.iter().map(Node::Type));
                out.extend(spec.values.iter().map(Node::Expr));
            }
            Node::Spec(Spec::Type(spec)) => {
                out.push(Node::Ident(&spec.name));
                out.push(Node::Type(&spec.ty));
            }
            Node::Field(field) => {
                out.extend(field.names.iter().map(Node::Ident));
                out.push(Node::Type(&field.ty));
            }
            Node::FuncType(func) => {
                out.extend(func.params.iter().map(Node::Field));
                out.extend(func.results.iter().map(Node::Field));
            }
            Node::Block(block) => out.extend(block.stmts.iter().map(Node::Stmt)),
            Node::Stmt(stmt) => stmt_children(stmt, &mut out),
            Node::CaseClause(clause) => {
                out.extend(clause.list.iter().map(Node::Expr));
                out.extend(clause.body.iter().map(Node::Stmt));
            }
            Node::CommClause(clause) => {
                out.extend(clause.comm.iter().map(|stmt| Node::Stmt(stmt)));
                out.extend(clause.body.iter().map(Node::Stmt));
            }
            Node::Expr(expr) => expr_children(expr, &mut out),
            Node::Type(ty) => type_children(ty, &mut out),
            Node::Ident(_) => {}
        }
        out
    }
}

fn stmt_children<'a>(stmt: &'a Stmt, out: &mut Vec<Node<'a>>) {
    match stmt {
        Stmt::Decl(decl) => out.extend(decl.specs.iter().map(Node::Spec)),
        Stmt::Empty(_) => {}
        Stmt::Labeled(labeled) => {
            out.push(Node::Ident(&labeled.label));
            out.push(Node::Stmt(&labeled.stmt));
        }
        Stmt::Expr(stmt) => out.push(Node::Expr(&stmt.expr)),
        Stmt::Send(send) => {
            out.push(Node::Expr(&send.chan));
            out.push(Node::Expr(&send.value));
        }
        Stmt::IncDec(stmt) => out.push(Node::Expr(&stmt.expr)),
        Stmt::Assign(assign) => {
            out.extend(assign.lhs.iter().map(Node::Expr));
            out.extend(assign.rhs.iter().map(Node::Expr));
        }
        Stmt::Go(stmt) => out.push(Node::Expr(&stmt.call)),
        Stmt::Defer(stmt) => out.push(Node::Expr(&stmt.call)),
        Stmt::Return(ret) => out.extend(ret.results.iter().map(Node::Expr)),
        Stmt::Branch(branch) => out.extend(branch.label.iter().map(Node::Ident)),
        Stmt::Block(block) => out.extend(block.stmts.iter().map(Node::Stmt)),
        Stmt::If(stmt) => {
            out.extend(stmt.init.iter().map(|init| Node::Stmt(init)));
            out.push(Node::Expr(&stmt.cond));
            out.push(Node::Block(&stmt.then));
            out.extend(stmt.els.iter().map(|els| Node::Stmt(els)));
        }
        Stmt::Switch(stmt) => {
            out.extend(stmt.init.iter().map(|init| Node::Stmt(init)));
            out.extend(stmt.tag.iter().map(Node::Expr));
            out.extend(stmt.clauses.iter().map(Node::CaseClause));
        }
        Stmt::TypeSwitch(stmt) => {
            out.extend(stmt.init.iter().map(|init| Node::Stmt(init)));
            out.extend(stmt.binding.iter().map(Node::Ident));
            out.push(Node::Expr(&stmt.subject));
            out.extend(stmt.clauses.iter().map(Node::CaseClause));
        }
        Stmt::Select(stmt) => out.extend(stmt.clauses.iter().map(Node::CommClause)),
        Stmt::For(stmt) => {
            out.extend(stmt.init.iter().map(|init| Node::Stmt(init)));
            out.extend(stmt.cond.iter().map(Node::Expr));
            out.extend(stmt.post.iter().map(|post| Node::Stmt(post)));
            out.push(Node::Block(&stmt.body));
        }
        Stmt::Range(stmt) => {
            out.extend(stmt.key.iter().map(Node::Expr));
            out.extend(stmt.value.iter().map(Node::Expr));
            out.push(Node::Expr(&stmt.expr));
            out.push(Node::Block(&stmt.body));
        }
    }
}

fn expr_children<'a>(expr: &'a Expr, out: &mut Vec<Node<'a>>) {
    match expr {
        Expr::Ident(_) | Expr::BasicLit { .. } => {}
        Expr::CompositeLit { ty, elts, .. } => {
            out.extend(ty.iter().map(Node::Type));
            out.extend(elts.iter().map(Node::Expr));
        }
        Expr::FuncLit { ty, body, .. } => {
            out.push(Node::FuncType(ty));
            out.push(Node::Block(body));
        }
        Expr::Paren { expr, .. } | Expr::Star { expr, .. } | Expr::Unary { expr, .. } => {
            out.push(Node::Expr(expr))
        }
        Expr::Selector { base, sel, .. } => {
            out.push(Node::Expr(base));
            out.push(Node::Ident(sel));
        }
        Expr::Index { base, index, .. } => {
            out.push(Node::Expr(base));
            out.push(Node::Expr(index));
        }
        Expr::Slice {
            base,
            low,
            high,
            max,
            ..
        } => {
            out.push(Node::Expr(base));
            for part in [low, high, max].into_iter().flatten() {
                out.push(Node::Expr(part));
            }
        }
        Expr::TypeAssert { base, ty, .. } => {
            out.push(Node::Expr(base));
            out.extend(ty.iter().map(Node::Type));
        }
        Expr::Call { func, args, .. } => {
            out.push(Node::Expr(func));
            out.extend(args.iter().map(Node::Expr));
        }
        Expr::Binary { left, right, .. } => {
            out.push(Node::Expr(left));
            out.push(Node::Expr(right));
        }
        Expr::KeyValue { key, value, .. } => {
            out.push(Node::Expr(key));
            out.push(Node::Expr(value));
        }
        Expr::Type(ty) => type_children(ty, out),
    }
}

fn type_children<'a>(ty: &'a TypeExpr, out: &mut Vec<Node<'a>>) {
    match ty {
        TypeExpr::Name { .. } => {}
        TypeExpr::Qualified { pkg, name, .. } => {
            out.push(Node::Ident(pkg));
            out.push(Node::Ident(name));
        }
        TypeExpr::Pointer { elem, .. }
        | TypeExpr::Slice { elem, .. }
        | TypeExpr::Chan { elem, .. }
        | TypeExpr::Ellipsis { elem, .. } => out.push(Node::Type(elem)),
        TypeExpr::Array { len, elem, .. } => {
            out.extend(len.iter().map(|len| Node::Expr(len)));
            out.push(Node::Type(elem));
        }
        TypeExpr::Map { key, value, .. } => {
            out.push(Node::Type(key));
            out.push(Node::Type(value));
        }
        TypeExpr::Func(func) => {
            out.extend(func.params.iter().map(Node::Field));
            out.extend(func.results.iter().map(Node::Field));
        }
        TypeExpr::Struct { fields, .. } => out.extend(fields.iter().map(Node::Field)),
        TypeExpr::Interface { methods, .. } => out.extend(methods.iter().map(Node::Field)),
    }
}

pub trait Visitor<'a> {
    fn enter(&mut self, _node: Node<'a>) -> bool {
        true
    }

    fn leave(&mut self, _node: Node<'a>) {}
}

pub fn walk<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, node: Node<'a>) {
    if visitor.enter(node) {
        for child in node.children() {
            walk(visitor, child);
        }
    }
    visitor.leave(node);
}

pub fn walk_files<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, files: &'a [File]) {
    for file in files {
        walk(visitor, Node::File(file));
    }
}

pub trait VisitMut {
    fn visit_file_mut(&mut self, file: &mut File) {
        walk_file_mut(self, file);
    }

    fn visit_decl_mut(&mut self, decl: &mut Decl) {
        walk_decl_mut(self, decl);
    }

    fn visit_spec_mut(&mut self, spec: &mut Spec) {
        walk_spec_mut(self, spec);
    }

    fn visit_field_mut(&mut self, field: &mut Field) {
        walk_field_mut(self, field);
    }

    fn visit_func_type_mut(&mut self, func: &mut FuncType) {
        walk_func_type_mut(self, func);
    }

    fn visit_block_mut(&mut self, block: &mut Block) {
        self.visit_stmts_mut(&mut block.stmts);
    }

    fn visit_stmts_mut(&mut self, stmts: &mut Vec<Stmt>) {
        for stmt in stmts.iter_mut() {
            self.visit_stmt_mut(stmt);
        }
    }

    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
    }

    fn visit_type_mut(&mut self, ty: &mut TypeExpr) {
        walk_type_mut(self, ty);
    }

    fn visit_ident_mut(&mut self, _ident: &mut Ident) {}
}

pub fn walk_file_mut<V: VisitMut + ?Sized>(v: &mut V, file: &mut File) {
    for decl in &mut file.decls {
        v.visit_decl_mut(decl);
    }
}

pub fn walk_decl_mut<V: VisitMut + ?Sized>(v: &mut V, decl: &mut Decl) {
    match decl {
        Decl::Gen(decl) => {
            for spec in &mut decl.specs {
                v.visit_spec_mut(spec);
            }
        }
        Decl::Func(func) => {
            if let Some(recv) = &mut func.recv {
                v.visit_field_mut(recv);
            }
            v.visit_ident_mut(&mut func.name);
            v.visit_func_type_mut(&mut func.ty);
            if let Some(body) = &mut func.body {
                v.visit_block_mut(body);
            }
        }
    }
}

pub fn walk_spec_mut<V: VisitMut + ?Sized>(v: &mut V, spec: &mut Spec) {
    match spec {
        Spec::Value(spec) => {
            for name in &mut spec.names {
                v.visit_ident_mut(name);
            }
            if let Some(ty) = &mut spec.ty {
                v.visit_type_mut(ty);
            }
            for value in &mut spec.values {
                v.visit_expr_mut(value);
            }
        }
        Spec::Type(spec) => {
            v.visit_ident_mut(&mut spec.name);
            v.visit_type_mut(&mut spec.ty);
        }
    }
}

pub fn walk_field_mut<V: VisitMut + ?Sized>(v: &mut V, field: &mut Field) {
    for name in &mut field.names {
        v.visit_ident_mut(name);
    }
    v.visit_type_mut(&mut field.ty);
}

pub fn walk_func_type_mut<V: VisitMut + ?Sized>(v: &mut V, func: &mut FuncType) {
    for field in func.params.iter_mut().chain(func.results.iter_mut()) {
        v.visit_field_mut(field);
    }
}

pub fn walk_stmt_mut<V: VisitMut + ?Sized>(v: &mut V, stmt: &mut Stmt) {
    match stmt {
        Stmt::Decl(decl) => {
            for spec in &mut decl.specs {
                v.visit_spec_mut(spec);
            }
        }
        Stmt::Empty(_) => {}
        Stmt::Labeled(labeled) => {
            v.visit_ident_mut(&mut labeled.label);
            v.visit_stmt_mut(&mut labeled.stmt);
        }
        Stmt::Expr(stmt) => v.visit_expr_mut(&mut stmt.expr),
        Stmt::Send(send) => {
            v.visit_expr_mut(&mut send.chan);
            v.visit_expr_mut(&mut send.value);
        }
        Stmt::IncDec(stmt) => v.visit_expr_mut(&mut stmt.expr),
        Stmt::Assign(assign) => {
            for expr in assign.lhs.iter_mut().chain(assign.rhs.iter_mut()) {
                v.visit_expr_mut(expr);
            }
        }
        Stmt::Go(stmt) => v.visit_expr_mut(&mut stmt.call),
        Stmt::Defer(stmt) => v.visit_expr_mut(&mut stmt.call),
        Stmt::Return(ret) => {
            for expr in &mut ret.results {
                v.visit_expr_mut(expr);
            }
        }
        Stmt::Branch(branch) => {
            if let Some(label) = &mut branch.label {
                v.visit_ident_mut(label);
            }
        }
        Stmt::Block(block) => v.visit_block_mut(block),
        Stmt::If(stmt) => {
            if let Some(init) = &mut stmt.init {
                v.visit_stmt_mut(init);
            }
            v.visit_expr_mut(&mut stmt.cond);
            v.visit_block_mut(&mut stmt.then);
            if let Some(els) = &mut stmt.els {
                v.visit_stmt_mut(els);
            }
        }
        Stmt::Switch(stmt) => {
            if let Some(init) = &mut stmt.init {
                v.visit_stmt_mut(init);
            }
            if let Some(tag) = &mut stmt.tag {
                v.visit_expr_mut(tag);
            }
            for clause in &mut stmt.clauses {
                walk_case_clause_mut(v, clause);
            }
        }
        Stmt::TypeSwitch(stmt) => {
            if let Some(init) = &mut stmt.init {
                v.visit_stmt_mut(init);
            }
            if let Some(binding) = &mut stmt.binding {
                v.visit_ident_mut(binding);
            }
            v.visit_expr_mut(&mut stmt.subject);
            for clause in &mut stmt.clauses {
                walk_case_clause_mut(v, clause);
            }
        }
        Stmt::Select(stmt) => {
            for clause in &mut stmt.clauses {
                if let Some(comm) = &mut clause.comm {
                    v.visit_stmt_mut(comm);
                }
                v.visit_stmts_mut(&mut clause.body);
            }
        }
        Stmt::For(stmt) => {
            if let Some(init) = &mut stmt.init {
                v.visit_stmt_mut(init);
            }
            if let Some(cond) = &mut stmt.cond {
                v.visit_expr_mut(cond);
            }
            if let Some(post) = &mut stmt.post {
                v.visit_stmt_mut(post);
            }
            v.visit_block_mut(&mut stmt.body);
        }
        Stmt::Range(stmt) => {
            if let Some(key) = &mut stmt.key {
                v.visit_expr_mut(key);
            }
            if let Some(value) = &mut stmt.value {
                v.visit_expr_mut(value);
            }
            v.visit_expr_mut(&mut stmt.expr);
            v.visit_block_mut(&mut stmt.body);
        }
    }
}

fn walk_case_clause_mut<V: VisitMut + ?Sized>(v: &mut V, clause: &mut CaseClause) {
    for expr in &mut clause.list {
        v.visit_expr_mut(expr);
    }
    v.visit_stmts_mut(&mut clause.body);
}

pub fn walk_expr_mut<V: VisitMut + ?Sized>(v: &mut V, expr: &mut Expr) {
    match expr {
        Expr::Ident(ident) => v.visit_ident_mut(ident),
        Expr::BasicLit { .. } => {}
        Expr::CompositeLit { ty, elts, .. } => {
            if let Some(ty) = ty {
                v.visit_type_mut(ty);
            }
            for elt in elts {
                v.visit_expr_mut(elt);
            }
        }
        Expr::FuncLit { ty, body, .. } => {
            v.visit_func_type_mut(ty);
            v.visit_block_mut(body);
        }
        Expr::Paren { expr, .. } | Expr::Star { expr, .. } | Expr::Unary { expr, .. } => {
            v.visit_expr_mut(expr)
        }
        Expr::Selector { base, sel, .. } => {
            v.visit_expr_mut(base);
            v.visit_ident_mut(sel);
        }
        Expr::Index { base, index, .. } => {
            v.visit_expr_mut(base);
            v.visit_expr_mut(index);
        }
        Expr::Slice {
            base,
            low,
            high,
            max,
            ..
        } => {
            v.visit_expr_mut(base);
            for part in [low, high, max].into_iter().flatten() {
                v.visit_expr_mut(part);
            }
        }
        Expr::TypeAssert { base, ty, .. } => {
            v.visit_expr_mut(base);
            if let Some(ty) = ty {
                v.visit_type_mut(ty);
            }
        }
        Expr::Call { func, args, .. } => {
            v.visit_expr_mut(func);
            for arg in args {
                v.visit_expr_mut(arg);
            }
        }
        Expr::Binary { left, right, .. } => {
            v.visit_expr_mut(left);
            v.visit_expr_mut(right);
        }
        Expr::KeyValue { key, value, .. } => {
            v.visit_expr_mut(key);
            v.visit_expr_mut(value);
        }
        Expr::Type(ty) => v.visit_type_mut(ty),
    }
}

pub fn walk_type_mut<V: VisitMut + ?Sized>(v: &mut V, ty: &mut TypeExpr) {
    match ty {
        TypeExpr::Name { name } => v.visit_ident_mut(name),
        TypeExpr::Qualified { pkg, name, .. } => {
            v.visit_ident_mut(pkg);
            v.visit_ident_mut(name);
        }
        TypeExpr::Pointer { elem, .. }
        | TypeExpr::Slice { elem, .. }
        | TypeExpr::Chan { elem, .. }
        | TypeExpr::Ellipsis { elem, .. } => v.visit_type_mut(elem),
        TypeExpr::Array { len, elem, .. } => {
            if let Some(len) = len {
                v.visit_expr_mut(len);
            }
            v.visit_type_mut(elem);
        }
        TypeExpr::Map { key, value, .. } => {
            v.visit_type_mut(key);
            v.visit_type_mut(value);
        }
        TypeExpr::Func(func) => v.visit_func_type_mut(func),
        TypeExpr::Struct { fields, .. } => {
            for field in fields {
                v.visit_field_mut(field);
            }
        }
        TypeExpr::Interface { methods, .. } => {
            for field in methods {
                v.visit_field_mut(field);
            }
        }
    }
}
