use super::checker::{Checker, Mode, Operand};
use super::*;
use crate::language::{
    ast::*,
    types::{BasicKind, InterfaceMethod, StructField},
};
use std::collections::VecDeque;

/// Field or method found by selector lookup.
pub(super) struct Found {
    pub(super) kind: SelectionKind,
    pub(super) ty: Type,
    pub(super) declaring: Option<String>,
    pub(super) obj: Option<ObjId>,
}

const MAX_EMBED_DEPTH: usize = 8;

impl<'a> Checker<'a> {
    // ---- type expressions ---------------------------------------------

    pub(super) fn resolve_type(&mut self, expr: &'a TypeExpr) -> Type {
        let ty = self.resolve_type_inner(expr);
        self.record(expr.id(), &ty);
        self.info.type_exprs.insert(expr.id());
        ty
    }

    fn resolve_type_inner(&mut self, expr: &'a TypeExpr) -> Type {
        match expr {
            TypeExpr::Name { name } => {
                let Some(obj) = self.lookup(&name.name) else {
                    self.error(name.span, codes::UNDEFINED, format!("undefined: {}", name.name));
                    return Type::Invalid;
                };
                self.info.uses.insert(name.id, obj);
                let (is_type, ty) = {
                    let object = self.info.object(obj);
                    (object.kind == ObjKind::TypeName, object.ty.clone())
                };
                if !is_type {
                    self.error(name.span, codes::INVALID_OP, format!("{} is not a type", name.name));
                    return Type::Invalid;
                }
                if ty.is_invalid() {
                    if let Some((file, spec)) = self.alias_specs.get(&obj).copied() {
                        let saved = std::mem::replace(&mut self.current_file, file);
                        let ty = self.resolve_alias(obj, spec);
                        self.current_file = saved;
                        return ty;
                    }
                }
                ty
            }
            TypeExpr::Qualified { pkg, name, .. } => {
                let Some(obj) = self.lookup(&pkg.name) else {
                    self.error(pkg.span, codes::UNDEFINED, format!("undefined: {}", pkg.name));
                    return Type::Invalid;
                };
                self.info.uses.insert(pkg.id, obj);
                self.info.opaque.insert(pkg.id);
                let ObjKind::PkgName(path) = self.info.object(obj).kind.clone() else {
                    self.error(pkg.span, codes::INVALID_OP, format!("{} is not a package", pkg.name));
                    return Type::Invalid;
                };
                if path == "C" {
                    return Type::Invalid;
                }
                let Some(package) = self.packages.get(&path).cloned() else {
                    return Type::Invalid;
                };
                if package.opaque {
                    self.info.opaque.insert(expr.id());
                    return Type::Invalid;
                }
                match package.members.get(&name.name) {
                    Some(member) if member.kind == ObjKind::TypeName => {
                        let member_obj = self.member_object(&path, &name.name, member);
                        self.info.uses.insert(name.id, member_obj);
                        member.ty.clone()
                    }
                    Some(_) => {
                        self.error(name.span, codes::INVALID_OP, format!("{}.{} is not a type", pkg.name, name.name));
                        Type::Invalid
                    }
                    None => {
                        self.error(name.span, codes::UNDEFINED, format!("undefined: {}.{}", pkg.name, name.name));
                        Type::Invalid
                    }
                }
            }
            TypeExpr::Pointer { elem, .. } => {
                let elem = self.resolve_type(elem);
                if elem.is_invalid() {
                    Type::Invalid
                } else {
                    Type::pointer(elem)
                }
            }
            TypeExpr::Slice { elem, .. } => wrap(self.resolve_type(elem), Type::slice),
            TypeExpr::Ellipsis { elem, .. } => wrap(self.resolve_type(elem), Type::slice),
            TypeExpr::Array { len, elem, .. } => {
                let len = match len {
                    Some(len) => {
                        let operand = self.expr(len, None);
                        self.convert_untyped(len, &Type::Basic(BasicKind::Int));
                        match operand.value {
                            Some(value) if value >= 0 => Some(value as u64),
                            _ => {
                                if !operand.ty.is_invalid() {
                                    self.error(len.span(), codes::INVALID_OP, "array length must be a non-negative integer constant");
                                }
                                None
                            }
                        }
                    }
                    None => None,
                };
                wrap(self.resolve_type(elem), |elem| Type::Array(len, Box::new(elem)))
            }
            TypeExpr::Map { key, value, .. } => {
                let key = self.resolve_type(key);
                let value = self.resolve_type(value);
                if key.is_invalid() || value.is_invalid() {
                    Type::Invalid
                } else {
                    Type::Map(Box::new(key), Box::new(value))
                }
            }
            TypeExpr::Chan { dir, elem, .. } => {
                let dir = *dir;
                wrap(self.resolve_type(elem), |elem| Type::Chan(dir, Box::new(elem)))
            }
            TypeExpr::Func(func) => Type::Func(self.signature(func)),
            TypeExpr::Struct { fields, .. } => {
                let mut out = Vec::new();
                for field in fields {
                    let ty = self.resolve_type(&field.ty);
                    if field.names.is_empty() {
                        let name = embedded_name(&field.ty).unwrap_or_default();
                        out.push(StructField {
                            name,
                            ty,
                            embedded: true,
                        });
                    } else {
                        for name in &field.names {
                            self.record(name.id, &ty);
                            out.push(StructField {
                                name: name.name.clone(),
                                ty: ty.clone(),
                                embedded: false,
                            });
                        }
                    }
                }
                Type::Struct(out)
            }
            TypeExpr::Interface { methods, .. } => {
                let mut out = Vec::new();
                for field in methods {
                    match (&field.ty, field.names.first()) {
                        (TypeExpr::Func(func), Some(name)) => {
                            let sig = self.signature(func);
                            self.record(field.ty.id(), &Type::Func(sig.clone()));
                            out.push(InterfaceMethod {
                                name: name.name.clone(),
                                sig,
                            });
                        }
                        (embedded, _) => {
                            let ty = self.resolve_type(embedded);
                            match self.underlying(&ty) {
                                Type::Interface(methods) => out.extend(methods),
                                Type::Invalid => {}
                                other => self.error(
                                    embedded.span(),
                                    codes::INVALID_OP,
                                    format!("cannot embed non-interface type {other}"),
                                ),
                            }
                        }
                    }
                }
                Type::Interface(out)
            }
        }
    }

    pub(super) fn signature(&mut self, func: &'a FuncType) -> Signature {
        let params = self.field_list(&func.params);
        let results = self.field_list(&func.results);
        self.info.type_exprs.insert(func.id);
        let sig = Signature {
            params,
            results,
            variadic: func.is_variadic(),
        };
        self.record(func.id, &Type::Func(sig.clone()));
        sig
    }

    fn field_list(&mut self, fields: &'a [Field]) -> Vec<Type> {
        let mut out = Vec::new();
        for field in fields {
            let ty = self.resolve_type(&field.ty);
            for name in &field.names {
                self.record(name.id, &ty);
            }
            for _ in 0..field.names.len().max(1) {
                out.push(ty.clone());
            }
        }
        out
    }

    // ---- type relations ------------------------------------------------

    pub(super) fn named_info(&self, pkg: &str, name: &str) -> Option<&NamedInfo> {
        if pkg.is_empty() {
            self.info.named.get(name)
        } else {
            self.packages.get(pkg).and_then(|package| package.types.get(name))
        }
    }

    pub(super) fn underlying(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        for _ in 0..16 {
            match &current {
                Type::Named { pkg, name } => match self.named_info(pkg, name) {
                    Some(info) => current = info.underlying.clone(),
                    None => return Type::Invalid,
                },
                Type::Foreign(foreign) => {
                    return foreign
                        .underlying
                        .as_deref()
                        .cloned()
                        .unwrap_or(current.clone());
                }
                _ => return current,
            }
        }
        Type::Invalid
    }

    pub(super) fn is_interface(&self, ty: &Type) -> bool {
        matches!(self.underlying(ty), Type::Interface(_))
    }

    /// Breadth-first search through embedded fields.
    pub(super) fn lookup_field_or_method(&self, ty: &Type, name: &str) -> Option<Found> {
        let start = match ty {
            Type::Pointer(elem) => elem.as_ref().clone(),
            other => other.clone(),
        };
        let mut queue = VecDeque::from([(start, 0usize)]);
        while let Some((current, depth)) = queue.pop_front() {
            if depth > MAX_EMBED_DEPTH {
                break;
            }
            let declaring = match &current {
                Type::Named { name, .. } => Some(name.clone()),
                _ => None,
            };
            if let Type::Named { pkg, name: type_name } = &current {
                if let Some(method) = self
                    .named_info(pkg, type_name)
                    .and_then(|info| info.methods.methods.get(name))
                {
                    return Some(Found {
                        kind: SelectionKind::Method,
                        ty: Type::Func(method.sig.clone()),
                        declaring,
                        obj: method.obj,
                    });
                }
            }
            match self.underlying(&current) {
                Type::Struct(fields) => {
                    for field in &fields {
                        if field.name == name {
                            return Some(Found {
                                kind: SelectionKind::Field,
                                ty: field.ty.clone(),
                                declaring,
                                obj: None,
                            });
                        }
                    }
                    for field in fields.into_iter().filter(|field| field.embedded) {
                        let inner = match field.ty {
                            Type::Pointer(elem) => *elem,
                            other => other,
                        };
                        queue.push_back((inner, depth + 1));
                    }
                }
                Type::Interface(methods) => {
                    if let Some(method) = methods.into_iter().find(|method| method.name == name) {
                        return Some(Found {
                            kind: SelectionKind::Method,
                            ty: Type::Func(method.sig),
                            declaring,
                            obj: None,
                        });
                    }
                }
                _ => {}
            }
        }
        None
    }

    pub(super) fn assignable(&self, from: &Type, to: &Type) -> bool {
        if from == to || !from.is_concrete() || !to.is_concrete() {
            return true;
        }
        let to_under = self.underlying(to);
        if matches!(to_under, Type::Interface(_)) {
            return true;
        }
        if let Type::Basic(kind) = from {
            if kind.is_untyped() {
                return untyped_fits(*kind, &to_under);
            }
        }
        let from_named = matches!(from, Type::Named { .. });
        let to_named = matches!(to, Type::Named { .. });
        if !(from_named && to_named) && self.underlying(from) == to_under {
            return true;
        }
        // Bidirectional channel to directional channel.
        if let (Type::Chan(ChanDir::Both, a), Type::Chan(_, b)) = (self.underlying(from), &to_under) {
            return a.as_ref() == b.as_ref();
        }
        false
    }

    pub(super) fn check_assignable(&mut self, operand: &Operand, target: &Type, span: Span, context: &str) {
        if operand.mode == Mode::Invalid || self.assignable(&operand.ty, target) {
            return;
        }
        self.error(
            span,
            codes::MISMATCH,
            format!("cannot use value of type {} as {target} value in {context}", operand.ty),
        );
    }

    /// Gives untyped constant expressions their final type.
    pub(super) fn convert_untyped(&mut self, expr: &Expr, target: &Type) {
        let Some(current) = self.info.types.get(&expr.id()).cloned() else {
            return;
        };
        let Type::Basic(kind) = current else {
            return;
        };
        if !kind.is_untyped() {
            return;
        }
        let final_ty = if kind == BasicKind::UntypedNil {
            if target.is_untyped() {
                return;
            }
            target.clone()
        } else if target.is_untyped() {
            match target.as_basic() {
                Some(other) if other != BasicKind::UntypedNil => {
                    Type::Basic(Type::join_untyped(kind, other))
                }
                _ => current.default_type(),
            }
        } else if !target.is_concrete() || self.is_interface(target) {
            current.default_type()
        } else {
            target.clone()
        };
        self.info.types.insert(expr.id(), final_ty.clone());
        match expr {
            Expr::Paren { expr: inner, .. } => self.convert_untyped(inner, &final_ty),
            Expr::Unary { op, expr: inner, .. } if *op != UnaryOp::Not || final_ty.as_basic().is_some_and(|k| k.is_boolean()) => {
                self.convert_untyped(inner, &final_ty)
            }
            Expr::Binary { op, left, right, .. } => {
                if op.is_comparison() {
                    return;
                }
                self.convert_untyped(left, &final_ty);
                if !op.is_shift() {
                    self.convert_untyped(right, &final_ty);
                }
            }
            _ => {}
        }
    }

    pub(super) fn check_binary_operands(&mut self, op: BinaryOp, left: &Operand, right: &Operand, span: Span) {
        if !left.ty.is_concrete() || !right.ty.is_concrete() {
            return;
        }
        if left.ty.is_untyped() || right.ty.is_untyped() {
            let (typed, untyped) = if left.ty.is_untyped() { (&right.ty, &left.ty) } else { (&left.ty, &right.ty) };
            if !typed.is_untyped() && !self.assignable(untyped, typed) {
                self.error(
                    span,
                    codes::MISMATCH,
                    format!("invalid operation: mismatched types {} and {}", left.ty, right.ty),
                );
            }
            return;
        }
        if left.ty != right.ty {
            self.error(
                span,
                codes::MISMATCH,
                format!("invalid operation: mismatched types {} and {}", left.ty, right.ty),
            );
            return;
        }
        let under = self.underlying(&left.ty);
        let ok = match (&under, op) {
            (Type::Basic(kind), BinaryOp::Add) => kind.is_numeric() || kind.is_string(),
            (Type::Basic(kind), BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div) => kind.is_numeric(),
            (Type::Basic(kind), BinaryOp::Rem | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::AndNot) => {
                kind.is_integer()
            }
            _ => true,
        };
        if !ok {
            self.error(
                span,
                codes::INVALID_OP,
                format!("invalid operation: operator not defined on {}", left.ty),
            );
        }
    }
}

fn wrap(elem: Type, make: impl FnOnce(Type) -> Type) -> Type {
    if elem.is_invalid() {
        Type::Invalid
    } else {
        make(elem)
    }
}

fn embedded_name(ty: &TypeExpr) -> Option<String> {
    match ty {
        TypeExpr::Name { name } => Some(name.name.clone()),
        TypeExpr::Qualified { name, .. } => Some(name.name.clone()),
        TypeExpr::Pointer { elem, .. } => embedded_name(elem),
        _ => None,
    }
}

fn untyped_fits(kind: BasicKind, target: &Type) -> bool {
    match target {
        Type::Basic(target) => match kind {
            BasicKind::UntypedBool => target.is_boolean(),
            BasicKind::UntypedString => target.is_string(),
            BasicKind::UntypedInt | BasicKind::UntypedRune => target.is_numeric(),
            BasicKind::UntypedFloat | BasicKind::UntypedComplex => {
                target.is_numeric() && !target.is_integer()
            }
            BasicKind::UntypedNil => *target == BasicKind::UnsafePointer,
            _ => false,
        },
        Type::Pointer(_) | Type::Slice(_) | Type::Map(..) | Type::Chan(..) | Type::Func(_) | Type::Interface(_) => {
            kind == BasicKind::UntypedNil
        }
        Type::Foreign(_) | Type::Invalid => true,
        _ => false,
    }
}

/// Value of an integer literal in any Go radix.
pub(super) fn parse_int_literal(text: &str) -> Option<i128> {
    let clean: String = text.chars().filter(|ch| *ch != '_').collect();
    let lower = clean.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i128::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        i128::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}
