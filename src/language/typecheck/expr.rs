use super::checker::{Checker, Mode, Operand};
use super::lookup::parse_int_literal;
use super::*;
use crate::language::{ast::*, types::BasicKind};

impl<'a> Checker<'a> {
    /// Checks an expression and records its type. `hint` supplies the type
    /// of elided composite literals.
    pub(super) fn expr(&mut self, expr: &'a Expr, hint: Option<&Type>) -> Operand {
        let operand = self.expr_inner(expr, hint);
        match &operand.mode {
            Mode::Invalid => {}
            Mode::Builtin(_) | Mode::Package(_) => {
                self.info.opaque.insert(expr.id());
            }
            Mode::NoValue => self.record(expr.id(), &Type::Tuple(Vec::new())),
            Mode::TypeExpr => {
                self.record(expr.id(), &operand.ty);
                self.info.type_exprs.insert(expr.id());
            }
            _ => self.record(expr.id(), &operand.ty),
        }
        operand
    }

    fn expr_inner(&mut self, expr: &'a Expr, hint: Option<&Type>) -> Operand {
        match expr {
            Expr::Ident(ident) => self.ident(ident),
            Expr::BasicLit { kind, value, .. } => {
                let (basic, folded) = match kind {
                    LitKind::Int => (BasicKind::UntypedInt, parse_int_literal(value)),
                    LitKind::Float => (BasicKind::UntypedFloat, None),
                    LitKind::Imag => (BasicKind::UntypedComplex, None),
                    LitKind::Char => (
                        BasicKind::UntypedRune,
                        value.chars().next().map(|ch| ch as i128),
                    ),
                    LitKind::String => (BasicKind::UntypedString, None),
                };
                Operand::constant(Type::Basic(basic), folded)
            }
            Expr::CompositeLit { ty, elts, span, .. } => self.composite_lit(ty.as_ref(), elts, hint, *span),
            Expr::FuncLit { ty, body, .. } => {
                let sig = self.signature(ty);
                self.check_func_body(ty, body);
                Operand::value(Type::Func(sig))
            }
            Expr::Paren { expr: inner, .. } => self.expr(inner, hint),
            Expr::Selector { base, sel, id, span } => self.selector(*id, base, sel, *span),
            Expr::Index { base, index, span, .. } => self.index(base, index, *span),
            Expr::Slice {
                base,
                low,
                high,
                max,
                span,
                ..
            } => {
                let operand = self.expr(base, None);
                for part in [low, high, max].into_iter().flatten() {
                    self.expr(part, None);
                    self.convert_untyped(part, &Type::Basic(BasicKind::Int));
                }
                match self.underlying(&operand.ty) {
                    Type::Basic(kind) if kind.is_string() => {
                        Operand::value(operand.ty.default_type())
                    }
                    Type::Slice(_) => Operand::value(operand.ty.clone()),
                    Type::Array(_, elem) => Operand::value(Type::Slice(elem)),
                    Type::Pointer(inner) => match self.underlying(&inner) {
                        Type::Array(_, elem) => Operand::value(Type::Slice(elem)),
                        _ => self.invalid_op(*span, format!("cannot slice {}", operand.ty)),
                    },
                    Type::Invalid | Type::Foreign(_) => Operand::invalid(),
                    other => self.invalid_op(*span, format!("cannot slice value of type {other}")),
                }
            }
            Expr::TypeAssert { base, ty, span, .. } => {
                let operand = self.expr(base, None);
                if !operand.ty.is_invalid() && !operand.ty.is_placeholder() && !self.is_interface(&operand.ty) {
                    self.error(
                        base.span(),
                        codes::INVALID_OP,
                        format!("invalid operation: {} is not an interface", operand.ty),
                    );
                }
                match ty {
                    Some(ty) => Operand::value(self.resolve_type(ty)),
                    None => self.invalid_op(*span, "use of .(type) outside type switch"),
                }
            }
            Expr::Call {
                func,
                args,
                ellipsis,
                span,
                id,
            } => self.call(*id, func, args, *ellipsis, *span),
            Expr::Star { expr: inner, span, .. } => {
                let operand = self.expr(inner, None);
                match operand.mode {
                    Mode::TypeExpr => Operand::type_expr(Type::pointer(operand.ty)),
                    Mode::Invalid => Operand::invalid(),
                    _ => match self.underlying(&operand.ty) {
                        Type::Pointer(elem) => Operand::variable(*elem),
                        Type::Invalid | Type::Foreign(_) => Operand::invalid(),
                        other => self.invalid_op(*span, format!("invalid indirect of value of type {other}")),
                    },
                }
            }
            Expr::Unary { op, expr: inner, span, .. } => self.unary(*op, inner, hint, *span),
            Expr::Binary {
                op,
                left,
                right,
                span,
                ..
            } => self.binary(*op, left, right, *span),
            Expr::KeyValue { span, .. } => self.invalid_op(*span, "unexpected key:value expression"),
            Expr::Type(ty) => Operand::type_expr(self.resolve_type(ty)),
        }
    }

    fn invalid_op(&mut self, span: Span, message: impl Into<String>) -> Operand {
        self.error(span, codes::INVALID_OP, message);
        Operand::invalid()
    }

    fn ident(&mut self, ident: &'a Ident) -> Operand {
        if ident.is_blank() {
            return self.invalid_op(ident.span, "cannot use _ as value");
        }
        let Some(obj) = self.lookup(&ident.name) else {
            self.error(ident.span, codes::UNDEFINED, format!("undefined: {}", ident.name));
            return Operand::invalid();
        };
        self.info.uses.insert(ident.id, obj);
        if !self.assign_lhs {
            self.used.insert(obj);
        }
        let kind = self.info.object(obj).kind.clone();
        match kind {
            ObjKind::Var => {
                self.ensure_resolved(obj, ident.span);
                Operand::variable(self.info.object(obj).ty.clone())
            }
            ObjKind::Const => {
                if ident.name == "iota" && self.info.object(obj).level == ScopeLevel::Universe {
                    return match self.iota {
                        Some(value) => Operand::constant(Type::Basic(BasicKind::UntypedInt), Some(value)),
                        None => self.invalid_op(ident.span, "cannot use iota outside constant declaration"),
                    };
                }
                self.ensure_resolved(obj, ident.span);
                let object = self.info.object(obj);
                Operand::constant(object.ty.clone(), object.value)
            }
            ObjKind::TypeName => {
                let ty = self.resolve_type_name_object(obj);
                Operand::type_expr(ty)
            }
            ObjKind::Func => Operand::value(self.info.object(obj).ty.clone()),
            ObjKind::PkgName(path) => {
                self.info.opaque.insert(ident.id);
                Operand {
                    mode: Mode::Package(path),
                    ty: Type::Invalid,
                    value: None,
                }
            }
            ObjKind::Builtin(builtin) => Operand {
                mode: Mode::Builtin(builtin),
                ty: Type::Invalid,
                value: None,
            },
            ObjKind::Nil => Operand::value(Type::Basic(BasicKind::UntypedNil)),
        }
    }

    fn resolve_type_name_object(&mut self, obj: ObjId) -> Type {
        let ty = self.info.object(obj).ty.clone();
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

    fn selector(&mut self, id: NodeId, base: &'a Expr, sel: &'a Ident, span: Span) -> Operand {
        if let Expr::Ident(pkg_ident) = base {
            let pkg_path = self.lookup(&pkg_ident.name).and_then(|obj| match &self.info.object(obj).kind {
                ObjKind::PkgName(path) => Some((obj, path.clone())),
                _ => None,
            });
            if let Some((obj, path)) = pkg_path {
                self.info.uses.insert(pkg_ident.id, obj);
                self.info.opaque.insert(pkg_ident.id);
                return self.package_member(id, &path, pkg_ident, sel);
            }
        }

        let operand = self.expr(base, None);
        if operand.mode == Mode::Invalid || operand.ty.is_invalid() || operand.ty.is_placeholder() {
            return Operand::invalid();
        }

        if operand.mode == Mode::TypeExpr {
            let Some(found) = self.lookup_field_or_method(&operand.ty, &sel.name) else {
                return self.invalid_op(span, format!("{}.{} undefined", operand.ty, sel.name));
            };
            let Type::Func(mut sig) = found.ty else {
                return self.invalid_op(span, format!("{}.{} is not a method", operand.ty, sel.name));
            };
            sig.params.insert(0, operand.ty.clone());
            self.info.selections.insert(
                id,
                Selection {
                    kind: SelectionKind::MethodExpr,
                    recv: operand.ty.clone(),
                    declaring: found.declaring,
                    pkg: None,
                },
            );
            if let Some(obj) = found.obj {
                self.info.uses.insert(sel.id, obj);
            }
            return Operand::value(Type::Func(sig));
        }

        let Some(found) = self.lookup_field_or_method(&operand.ty, &sel.name) else {
            return self.invalid_op(
                span,
                format!(
                    "{}.{} undefined (type {} has no field or method {})",
                    expr_label(base),
                    sel.name,
                    operand.ty,
                    sel.name
                ),
            );
        };
        self.info.selections.insert(
            id,
            Selection {
                kind: found.kind,
                recv: operand.ty.clone(),
                declaring: found.declaring,
                pkg: None,
            },
        );
        if let Some(obj) = found.obj {
            self.info.uses.insert(sel.id, obj);
        }
        self.record(sel.id, &found.ty);
        match found.kind {
            SelectionKind::Field => Operand::variable(found.ty),
            _ => Operand::value(found.ty),
        }
    }

    fn package_member(&mut self, id: NodeId, path: &str, pkg: &Ident, sel: &Ident) -> Operand {
        self.info.selections.insert(
            id,
            Selection {
                kind: SelectionKind::PackageMember,
                recv: Type::Invalid,
                declaring: None,
                pkg: Some(path.to_string()),
            },
        );
        if path == "C" {
            return Operand::value(Type::Invalid);
        }
        let (opaque, member) = match self.packages.get(path) {
            Some(package) => (package.opaque, package.members.get(&sel.name).cloned()),
            None => return Operand::invalid(),
        };
        if opaque {
            self.info.opaque.insert(id);
            return Operand::value(Type::Invalid);
        }
        let Some(member) = member else {
            self.error(sel.span, codes::UNDEFINED, format!("undefined: {}.{}", pkg.name, sel.name));
            return Operand::invalid();
        };
        let obj = self.member_object(path, &sel.name, &member);
        self.info.uses.insert(sel.id, obj);
        match &member.kind {
            ObjKind::TypeName => Operand::type_expr(member.ty.clone()),
            ObjKind::Var => Operand::variable(member.ty.clone()),
            ObjKind::Const => Operand::constant(member.ty.clone(), None),
            ObjKind::Builtin(builtin) => Operand {
                mode: Mode::Builtin(*builtin),
                ty: Type::Invalid,
                value: None,
            },
            _ => Operand::value(member.ty.clone()),
        }
    }

    fn index(&mut self, base: &'a Expr, index: &'a Expr, span: Span) -> Operand {
        let operand = self.expr(base, None);
        let container = match &operand.ty {
            Type::Pointer(inner) => match self.underlying(inner) {
                array @ Type::Array(..) => array,
                _ => self.underlying(&operand.ty),
            },
            other => self.underlying(other),
        };
        match container {
            Type::Map(key, value) => {
                let key_operand = self.expr(index, Some(&key));
                self.check_assignable(&key_operand, &key, index.span(), "map index");
                self.convert_untyped(index, &key);
                Operand::variable(*value)
            }
            other => {
                self.expr(index, None);
                self.convert_untyped(index, &Type::Basic(BasicKind::Int));
                match other {
                    Type::Slice(elem) | Type::Array(_, elem) => Operand::variable(*elem),
                    Type::Basic(kind) if kind.is_string() => Operand::value(Type::Basic(BasicKind::Uint8)),
                    Type::Invalid | Type::Foreign(_) => Operand::invalid(),
                    other => self.invalid_op(span, format!("cannot index value of type {other}")),
                }
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, inner: &'a Expr, hint: Option<&Type>, span: Span) -> Operand {
        match op {
            UnaryOp::Addr => {
                let elided = hint.and_then(|hint| hint.pointer_elem().cloned());
                let operand = self.expr(inner, elided.as_ref());
                if operand.ty.is_invalid() {
                    return Operand::invalid();
                }
                if operand.mode == Mode::Constant {
                    return self.invalid_op(span, "cannot take address of constant");
                }
                Operand::value(Type::pointer(operand.ty))
            }
            UnaryOp::Recv => {
                let operand = self.expr(inner, None);
                match self.underlying(&operand.ty) {
                    Type::Chan(dir, elem) => {
                        if !dir.can_recv() {
                            return self.invalid_op(span, "cannot receive from send-only channel");
                        }
                        Operand::value(*elem)
                    }
                    Type::Invalid | Type::Foreign(_) => Operand::invalid(),
                    other => self.invalid_op(span, format!("cannot receive from non-channel {other}")),
                }
            }
            UnaryOp::Not => {
                let operand = self.expr(inner, None);
                match self.underlying(&operand.ty) {
                    Type::Basic(kind) if kind.is_boolean() => Operand {
                        mode: if operand.mode == Mode::Constant { Mode::Constant } else { Mode::Value },
                        ty: operand.ty,
                        value: None,
                    },
                    Type::Invalid | Type::Foreign(_) => Operand::invalid(),
                    other => self.invalid_op(span, format!("operator ! not defined on {other}")),
                }
            }
            UnaryOp::Pos | UnaryOp::Neg | UnaryOp::BitNot => {
                let operand = self.expr(inner, hint);
                match self.underlying(&operand.ty) {
                    Type::Basic(kind) if kind.is_numeric() => {
                        let value = operand.value.map(|value| match op {
                            UnaryOp::Neg => -value,
                            UnaryOp::BitNot => !value,
                            _ => value,
                        });
                        Operand {
                            mode: if operand.mode == Mode::Constant { Mode::Constant } else { Mode::Value },
                            ty: operand.ty,
                            value,
                        }
                    }
                    Type::Invalid | Type::Foreign(_) => Operand::invalid(),
                    other => self.invalid_op(span, format!("invalid unary operation on {other}")),
                }
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &'a Expr, right: &'a Expr, span: Span) -> Operand {
        let lhs = self.expr(left, None);
        let rhs = self.expr(right, None);
        if lhs.mode == Mode::Invalid || rhs.mode == Mode::Invalid || !lhs.ty.is_concrete() || !rhs.ty.is_concrete() {
            if op.is_comparison() || matches!(op, BinaryOp::LogAnd | BinaryOp::LogOr) {
                return Operand::value(Type::Basic(BasicKind::UntypedBool));
            }
            return Operand::invalid();
        }
        let constant = lhs.mode == Mode::Constant && rhs.mode == Mode::Constant;

        if op.is_shift() {
            self.convert_untyped(right, &Type::Basic(BasicKind::Uint));
            let value = match (lhs.value, rhs.value) {
                (Some(a), Some(b)) if (0..127).contains(&b) => match op {
                    BinaryOp::Shl => a.checked_shl(b as u32),
                    _ => a.checked_shr(b as u32),
                },
                _ => None,
            };
            return Operand {
                mode: if constant { Mode::Constant } else { Mode::Value },
                ty: lhs.ty,
                value,
            };
        }

        if matches!(op, BinaryOp::LogAnd | BinaryOp::LogOr) {
            for (operand, expr) in [(&lhs, left), (&rhs, right)] {
                if !self.underlying(&operand.ty).as_basic().is_some_and(|kind| kind.is_boolean()) {
                    self.error(expr.span(), codes::INVALID_OP, format!("operator {op:?} not defined on {}", operand.ty));
                }
            }
            let ty = if lhs.ty.is_untyped() && rhs.ty.is_untyped() {
                Type::Basic(BasicKind::UntypedBool)
            } else if lhs.ty.is_untyped() {
                rhs.ty.clone()
            } else {
                lhs.ty.clone()
            };
            return Operand {
                mode: if constant { Mode::Constant } else { Mode::Value },
                ty,
                value: None,
            };
        }

        // Untyped operands take the type of the typed side.
        let ty = match (lhs.ty.is_untyped(), rhs.ty.is_untyped()) {
            (true, true) => match (lhs.ty.as_basic(), rhs.ty.as_basic()) {
                (Some(a), Some(b)) if a == BasicKind::UntypedNil || b == BasicKind::UntypedNil => lhs.ty.clone(),
                (Some(a), Some(b)) => Type::Basic(Type::join_untyped(a, b)),
                _ => lhs.ty.clone(),
            },
            (true, false) => {
                self.convert_untyped(left, &rhs.ty);
                rhs.ty.clone()
            }
            (false, true) => {
                self.convert_untyped(right, &lhs.ty);
                lhs.ty.clone()
            }
            (false, false) => lhs.ty.clone(),
        };

        if op.is_comparison() {
            if !lhs.ty.is_untyped() && !rhs.ty.is_untyped() && !self.assignable(&lhs.ty, &rhs.ty) && !self.assignable(&rhs.ty, &lhs.ty) {
                self.error(
                    span,
                    codes::MISMATCH,
                    format!("invalid operation: mismatched types {} and {}", lhs.ty, rhs.ty),
                );
            }
            return Operand {
                mode: if constant { Mode::Constant } else { Mode::Value },
                ty: Type::Basic(BasicKind::UntypedBool),
                value: None,
            };
        }

        self.check_binary_operands(op, &lhs, &rhs, span);
        let value = match (lhs.value, rhs.value) {
            (Some(a), Some(b)) => fold(op, a, b),
            _ => None,
        };
        Operand {
            mode: if constant { Mode::Constant } else { Mode::Value },
            ty,
            value,
        }
    }

    // ---- calls ---------------------------------------------------------

    fn call(&mut self, id: NodeId, func: &'a Expr, args: &'a [Expr], ellipsis: bool, span: Span) -> Operand {
        let callee = self.expr(func, None);
        match callee.mode.clone() {
            Mode::TypeExpr => {
                if args.len() != 1 {
                    for arg in args {
                        self.expr(arg, None);
                    }
                    return self.arity(span, format!("conversion to {} needs exactly one argument", callee.ty));
                }
                let operand = self.expr(&args[0], Some(&callee.ty));
                self.convert_untyped(&args[0], &callee.ty);
                Operand {
                    mode: if operand.mode == Mode::Constant { Mode::Constant } else { Mode::Value },
                    ty: callee.ty,
                    value: operand.value,
                }
            }
            Mode::Builtin(builtin) => self.builtin_call(builtin, args, ellipsis, span),
            Mode::Package(path) => {
                for arg in args {
                    self.expr(arg, None);
                }
                self.invalid_op(span, format!("use of package {path} without selector"))
            }
            _ => match self.underlying(&callee.ty) {
                Type::Func(sig) => {
                    self.call_args(&sig, args, ellipsis, span);
                    if sig.results.is_empty() {
                        Operand {
                            mode: Mode::NoValue,
                            ty: Type::Tuple(Vec::new()),
                            value: None,
                        }
                    } else {
                        Operand::value(sig.result_type())
                    }
                }
                Type::Invalid | Type::Foreign(_) => {
                    for arg in args {
                        self.expr(arg, None);
                        let ty = self.info.types.get(&arg.id()).map(Type::default_type);
                        if let Some(ty) = ty {
                            self.convert_untyped(arg, &ty);
                        }
                    }
                    if self.info.opaque.contains(&func.id()) {
                        self.info.opaque.insert(id);
                    }
                    Operand::invalid()
                }
                other => {
                    for arg in args {
                        self.expr(arg, None);
                    }
                    self.invalid_op(span, format!("invalid operation: cannot call non-function of type {other}"))
                }
            },
        }
    }

    fn arity(&mut self, span: Span, message: impl Into<String>) -> Operand {
        self.error(span, codes::ARITY, message);
        Operand::invalid()
    }

    fn call_args(&mut self, sig: &Signature, args: &'a [Expr], ellipsis: bool, span: Span) {
        let param_count = sig.params.len();
        let mut checked: Option<Operand> = None;
        if args.len() == 1 && param_count > 1 {
            let operand = self.expr(&args[0], None);
            if let Type::Tuple(items) = &operand.ty {
                let fits = items.len() == param_count || (sig.variadic && items.len() + 1 >= param_count);
                if !fits {
                    self.error(
                        span,
                        codes::ARITY,
                        format!("not enough arguments in call (have {}, want {param_count})", items.len()),
                    );
                }
                return;
            }
            checked = Some(operand);
        }

        let enough = if sig.variadic && !ellipsis {
            args.len() + 1 >= param_count
        } else {
            args.len() == param_count
        };
        if !enough {
            let verb = if args.len() < param_count { "not enough" } else { "too many" };
            self.error(
                span,
                codes::ARITY,
                format!("{verb} arguments in call (have {}, want {param_count})", args.len()),
            );
        }

        for (idx, arg) in args.iter().enumerate() {
            let param = if sig.variadic && idx + 1 >= param_count && !ellipsis {
                match sig.params.last() {
                    Some(Type::Slice(elem)) => Some(elem.as_ref().clone()),
                    _ => None,
                }
            } else {
                sig.params.get(idx).cloned()
            };
            let operand = match checked.take() {
                Some(operand) => operand,
                None => self.expr(arg, param.as_ref()),
            };
            match param {
                Some(param) => {
                    self.check_assignable(&operand, &param, arg.span(), "argument");
                    self.convert_untyped(arg, &param);
                }
                None => {
                    let ty = operand.ty.default_type();
                    self.convert_untyped(arg, &ty);
                }
            }
        }
    }

    fn builtin_call(&mut self, builtin: Builtin, args: &'a [Expr], ellipsis: bool, span: Span) -> Operand {
        let int = Type::Basic(BasicKind::Int);
        match builtin {
            Builtin::Len | Builtin::Cap => {
                if args.len() != 1 {
                    return self.arity(span, "len/cap expects one argument");
                }
                let operand = self.expr(&args[0], None);
                let ty = operand.ty.default_type();
                self.convert_untyped(&args[0], &ty);
                Operand::value(int)
            }
            Builtin::Append => {
                let Some((first, rest)) = args.split_first() else {
                    return self.arity(span, "not enough arguments for append");
                };
                let slice = self.expr(first, None);
                let elem = match self.underlying(&slice.ty) {
                    Type::Slice(elem) => Some(*elem),
                    Type::Invalid | Type::Foreign(_) => None,
                    other => {
                        self.error(first.span(), codes::INVALID_OP, format!("invalid append: first argument must be a slice; have {other}"));
                        None
                    }
                };
                for arg in rest {
                    if ellipsis {
                        self.expr(arg, None);
                        continue;
                    }
                    let operand = self.expr(arg, elem.as_ref());
                    if let Some(elem) = &elem {
                        self.check_assignable(&operand, elem, arg.span(), "append");
                        self.convert_untyped(arg, elem);
                    }
                }
                if slice.ty.is_nil() {
                    return self.invalid_op(first.span(), "first argument to append must be a typed slice");
                }
                Operand::value(slice.ty)
            }
            Builtin::Make => {
                let Some((first, rest)) = args.split_first() else {
                    return self.arity(span, "not enough arguments for make");
                };
                let ty = self.type_operand(first);
                for arg in rest {
                    self.expr(arg, None);
                    self.convert_untyped(arg, &int);
                }
                if ty.is_invalid() {
                    return Operand::invalid();
                }
                Operand::value(ty)
            }
            Builtin::New => {
                if args.len() != 1 {
                    return self.arity(span, "new expects one argument");
                }
                let ty = self.type_operand(&args[0]);
                if ty.is_invalid() {
                    return Operand::invalid();
                }
                Operand::value(Type::pointer(ty))
            }
            Builtin::Copy => {
                for arg in args {
                    self.expr(arg, None);
                }
                if args.len() != 2 {
                    return self.arity(span, "copy expects two arguments");
                }
                Operand::value(int)
            }
            Builtin::Delete => {
                if args.len() != 2 {
                    for arg in args {
                        self.expr(arg, None);
                    }
                    return self.arity(span, "delete expects two arguments");
                }
                let map = self.expr(&args[0], None);
                let key = match self.underlying(&map.ty) {
                    Type::Map(key, _) => Some(*key),
                    _ => None,
                };
                self.expr(&args[1], key.as_ref());
                if let Some(key) = key {
                    self.convert_untyped(&args[1], &key);
                }
                no_value()
            }
            Builtin::Close | Builtin::Clear | Builtin::Panic | Builtin::Print | Builtin::Println => {
                for arg in args {
                    let operand = self.expr(arg, None);
                    let ty = operand.ty.default_type();
                    self.convert_untyped(arg, &ty);
                }
                if matches!(builtin, Builtin::Close | Builtin::Clear | Builtin::Panic) && args.len() != 1 {
                    return self.arity(span, "expected one argument");
                }
                no_value()
            }
            Builtin::Complex => {
                let mut untyped = true;
                for arg in args {
                    let operand = self.expr(arg, None);
                    untyped &= operand.ty.is_untyped();
                }
                if untyped {
                    Operand::value(Type::Basic(BasicKind::UntypedComplex))
                } else {
                    for arg in args {
                        self.convert_untyped(arg, &Type::Basic(BasicKind::Float64));
                    }
                    Operand::value(Type::Basic(BasicKind::Complex128))
                }
            }
            Builtin::Real | Builtin::Imag => {
                for arg in args {
                    let operand = self.expr(arg, None);
                    let ty = operand.ty.default_type();
                    self.convert_untyped(arg, &ty);
                }
                Operand::value(Type::Basic(BasicKind::Float64))
            }
            Builtin::Max | Builtin::Min => {
                if args.is_empty() {
                    return self.arity(span, "not enough arguments for min/max");
                }
                let operands: Vec<Operand> = args.iter().map(|arg| self.expr(arg, None)).collect();
                let typed = operands.iter().find(|op| !op.ty.is_untyped()).map(|op| op.ty.clone());
                let ty = match typed {
                    Some(ty) => ty,
                    None => operands
                        .iter()
                        .filter_map(|op| op.ty.as_basic())
                        .reduce(Type::join_untyped)
                        .map(Type::Basic)
                        .unwrap_or(Type::Invalid),
                };
                if !ty.is_untyped() {
                    for arg in args {
                        self.convert_untyped(arg, &ty);
                    }
                }
                Operand::value(ty)
            }
            Builtin::Recover => {
                if !args.is_empty() {
                    return self.arity(span, "recover takes no arguments");
                }
                Operand::value(Type::empty_interface())
            }
            Builtin::Sizeof | Builtin::Alignof | Builtin::Offsetof => {
                for arg in args {
                    let operand = self.expr(arg, None);
                    let ty = operand.ty.default_type();
                    self.convert_untyped(arg, &ty);
                }
                if args.len() != 1 {
                    return self.arity(span, "expected one argument");
                }
                Operand::value(Type::Basic(BasicKind::Uintptr))
            }
        }
    }

    fn type_operand(&mut self, expr: &'a Expr) -> Type {
        let operand = self.expr(expr, None);
        match operand.mode {
            Mode::TypeExpr => operand.ty,
            Mode::Invalid => Type::Invalid,
            _ if operand.ty.is_invalid() => Type::Invalid,
            _ => {
                self.error(expr.span(), codes::INVALID_OP, format!("{} is not a type", expr_label(expr)));
                Type::Invalid
            }
        }
    }

    // ---- composite literals -------------------------------------------

    fn composite_lit(&mut self, ty: Option<&'a TypeExpr>, elts: &'a [Expr], hint: Option<&Type>, span: Span) -> Operand {
        let elided_pointer = ty.is_none() && matches!(hint, Some(Type::Pointer(_)));
        let lit_ty = match ty {
            Some(TypeExpr::Array { len: None, elem, id, .. }) => {
                let elem = self.resolve_type(elem);
                let ty = Type::Array(Some(elts.len() as u64), Box::new(elem));
                self.record(*id, &ty);
                self.info.type_exprs.insert(*id);
                ty
            }
            Some(ty) => self.resolve_type(ty),
            None => match hint {
                Some(Type::Pointer(elem)) => elem.as_ref().clone(),
                Some(hint) => hint.clone(),
                None => {
                    self.error(span, codes::INVALID_OP, "invalid composite literal type: missing type");
                    Type::Invalid
                }
            },
        };

        match self.underlying(&lit_ty) {
            Type::Struct(fields) => {
                let keyed = elts.iter().any(|elt| matches!(elt, Expr::KeyValue { .. }));
                if keyed {
                    for elt in elts {
                        let Expr::KeyValue { key, value, .. } = elt else {
                            self.error(elt.span(), codes::INVALID_OP, "mixture of field:value and value elements in struct literal");
                            self.expr(elt, None);
                            continue;
                        };
                        let field = match key.as_ref() {
                            Expr::Ident(name) => {
                                self.info.opaque.insert(name.id);
                                fields.iter().find(|field| field.name == name.name).cloned()
                            }
                            _ => None,
                        };
                        let Some(field) = field else {
                            self.error(key.span(), codes::UNDEFINED, format!("unknown field {} in struct literal of type {lit_ty}", expr_label(key)));
                            self.expr(value, None);
                            continue;
                        };
                        self.element(value, &field.ty);
                    }
                } else {
                    if !elts.is_empty() && elts.len() != fields.len() {
                        self.error(span, codes::ARITY, format!("too few or too many values in struct literal of type {lit_ty}"));
                    }
                    for (elt, field) in elts.iter().zip(fields.iter()) {
                        self.element(elt, &field.ty);
                    }
                }
            }
            Type::Slice(elem) | Type::Array(_, elem) => {
                for elt in elts {
                    match elt {
                        Expr::KeyValue { key, value, .. } => {
                            self.expr(key, None);
                            self.convert_untyped(key, &Type::Basic(BasicKind::Int));
                            self.element(value, &elem);
                        }
                        other => self.element(other, &elem),
                    }
                }
            }
            Type::Map(key_ty, value_ty) => {
                for elt in elts {
                    let Expr::KeyValue { key, value, .. } = elt else {
                        self.error(elt.span(), codes::INVALID_OP, "missing key in map literal");
                        self.expr(elt, None);
                        continue;
                    };
                    self.element(key, &key_ty);
                    self.element(value, &value_ty);
                }
            }
            Type::Invalid | Type::Foreign(_) => {
                // Fields of foreign structs are unknown to the checker.
                for elt in elts {
                    match elt {
                        Expr::KeyValue { key, value, .. } => {
                            if let Expr::Ident(name) = key.as_ref() {
                                self.info.opaque.insert(name.id);
                            } else {
                                self.expr(key, None);
                            }
                            self.loose_element(value);
                        }
                        other => self.loose_element(other),
                    }
                }
                return Operand::invalid();
            }
            other => {
                for elt in elts {
                    self.expr(elt, None);
                }
                return self.invalid_op(span, format!("invalid composite literal type {other}"));
            }
        }
        if elided_pointer {
            return Operand::value(Type::pointer(lit_ty));
        }
        Operand::value(lit_ty)
    }

    fn element(&mut self, expr: &'a Expr, ty: &Type) {
        let operand = self.expr(expr, Some(ty));
        self.check_assignable(&operand, ty, expr.span(), "composite literal");
        self.convert_untyped(expr, ty);
    }

    fn loose_element(&mut self, expr: &'a Expr) {
        let operand = self.expr(expr, None);
        let ty = operand.ty.default_type();
        self.convert_untyped(expr, &ty);
    }
}

fn no_value() -> Operand {
    Operand {
        mode: Mode::NoValue,
        ty: Type::Tuple(Vec::new()),
        value: None,
    }
}

fn fold(op: BinaryOp, a: i128, b: i128) -> Option<i128> {
    match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        BinaryOp::AndNot => Some(a & !b),
        _ => None,
    }
}

/// Short rendering of an expression for messages.
fn expr_label(expr: &Expr) -> String {
    match expr.unparen() {
        Expr::Ident(ident) => ident.name.clone(),
        Expr::Selector { base, sel, .. } => format!("{}.{}", expr_label(base), sel.name),
        Expr::Call { func, .. } => format!("{}(...)", expr_label(func)),
        Expr::Type(ty) => ty.spelling(),
        _ => "expression".into(),
    }
}
