use super::*;
use crate::language::{
    ast::*,
    types::{BasicKind, InterfaceMethod},
};
use tracing::trace;

pub(super) fn check_files(files: &[File], importer: &mut dyn Importer) -> CheckResult {
    let mut checker = Checker::new(files, importer);
    checker.collect_imports();
    checker.collect_types();
    checker.resolve_type_decls();
    checker.collect_funcs();
    checker.collect_values();
    for (idx, file) in files.iter().enumerate() {
        checker.current_file = idx;
        for decl in &file.decls {
            if let Decl::Func(func) = decl {
                checker.check_func_decl(func);
            }
        }
    }
    checker.resolve_all_pending();
    trace!(
        types = checker.info.types.len(),
        objects = checker.info.objects.len(),
        "type check finished"
    );
    CheckResult {
        info: checker.info,
        errors: checker.errors,
        unused: checker.unused,
        import_errors: checker.import_errors,
    }
}

/// Package-level `var`/`const` spec whose types are computed on first use.
pub(super) struct PendingSpec<'a> {
    pub(super) file: usize,
    pub(super) spec: &'a ValueSpec,
    pub(super) kind: GenKind,
    pub(super) iota: i128,
    /// Spec supplying type and values for implicitly repeated constants.
    pub(super) source: &'a ValueSpec,
    pub(super) state: PendingState,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum PendingState {
    Waiting,
    Resolving,
    Done,
}

#[derive(Clone, Debug)]
pub(super) struct Operand {
    pub(super) mode: Mode,
    pub(super) ty: Type,
    pub(super) value: Option<i128>,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Mode {
    Invalid,
    NoValue,
    Value,
    Variable,
    Constant,
    TypeExpr,
    Builtin(Builtin),
    Package(String),
}

impl Operand {
    pub(super) fn invalid() -> Self {
        Self {
            mode: Mode::Invalid,
            ty: Type::Invalid,
            value: None,
        }
    }

    pub(super) fn value(ty: Type) -> Self {
        Self {
            mode: Mode::Value,
            ty,
            value: None,
        }
    }

    pub(super) fn variable(ty: Type) -> Self {
        Self {
            mode: Mode::Variable,
            ty,
            value: None,
        }
    }

    pub(super) fn constant(ty: Type, value: Option<i128>) -> Self {
        Self {
            mode: Mode::Constant,
            ty,
            value,
        }
    }

    pub(super) fn type_expr(ty: Type) -> Self {
        Self {
            mode: Mode::TypeExpr,
            ty,
            value: None,
        }
    }
}

pub(super) struct Checker<'a> {
    pub(super) files: &'a [File],
    pub(super) importer: &'a mut dyn Importer,
    pub(super) info: TypeInfo,
    pub(super) errors: Vec<TypeError>,
    pub(super) unused: Vec<TypeError>,
    pub(super) import_errors: Vec<(String, ImportError)>,
    pub(super) universe: HashMap<String, ObjId>,
    pub(super) package: HashMap<String, ObjId>,
    pub(super) file_scopes: Vec<HashMap<String, ObjId>>,
    pub(super) scopes: Vec<HashMap<String, ObjId>>,
    pub(super) packages: HashMap<String, Package>,
    pub(super) member_objects: HashMap<(String, String), ObjId>,
    pub(super) pending: Vec<PendingSpec<'a>>,
    pub(super) pending_of: HashMap<ObjId, usize>,
    pub(super) alias_specs: HashMap<ObjId, (usize, &'a TypeSpec)>,
    pub(super) current_file: usize,
    pub(super) results: Vec<Vec<Type>>,
    pub(super) used: HashSet<ObjId>,
    pub(super) locals: Vec<Vec<(ObjId, Span)>>,
    pub(super) iota: Option<i128>,
    /// Set while checking the direct left-hand side of `=`.
    pub(super) assign_lhs: bool,
}

impl<'a> Checker<'a> {
    fn new(files: &'a [File], importer: &'a mut dyn Importer) -> Self {
        let mut info = TypeInfo::default();
        let universe = universe::populate(&mut info);
        info.named.insert("error".into(), universe::error_info());
        Self {
            files,
            importer,
            info,
            errors: Vec::new(),
            unused: Vec::new(),
            import_errors: Vec::new(),
            universe,
            package: HashMap::new(),
            file_scopes: vec![HashMap::new(); files.len()],
            scopes: Vec::new(),
            packages: HashMap::new(),
            member_objects: HashMap::new(),
            pending: Vec::new(),
            pending_of: HashMap::new(),
            alias_specs: HashMap::new(),
            current_file: 0,
            results: Vec::new(),
            used: HashSet::new(),
            locals: Vec::new(),
            iota: None,
            assign_lhs: false,
        }
    }

    pub(super) fn path(&self) -> &'a Path {
        self.files
            .get(self.current_file)
            .map(|file| file.path.as_path())
            .unwrap_or(Path::new(""))
    }

    pub(super) fn error(&mut self, span: Span, code: &str, message: impl Into<String>) {
        let err = TypeError::new(self.path(), span, message).with_code(code);
        self.errors.push(err);
    }

    pub(super) fn new_object(
        &mut self,
        name: &str,
        kind: ObjKind,
        ty: Type,
        level: ScopeLevel,
        def: Option<NodeId>,
    ) -> ObjId {
        self.info.add_object(Object {
            name: name.to_string(),
            kind,
            ty,
            level,
            def,
            pkg: None,
            value: None,
        })
    }

    /// Records `ty` for `id`; invalid types stay absent.
    pub(super) fn record(&mut self, id: NodeId, ty: &Type) {
        if !ty.is_invalid() {
            self.info.record_type(id, ty.clone());
        }
    }

    // ---- scopes --------------------------------------------------------

    pub(super) fn lookup(&self, name: &str) -> Option<ObjId> {
        for scope in self.scopes.iter().rev() {
            if let Some(obj) = scope.get(name) {
                return Some(*obj);
            }
        }
        self.file_scopes
            .get(self.current_file)
            .and_then(|scope| scope.get(name))
            .or_else(|| self.package.get(name))
            .or_else(|| self.universe.get(name))
            .copied()
    }

    pub(super) fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub(super) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Declares a local object; blank identifiers get none.
    pub(super) fn declare_local(&mut self, ident: &Ident, kind: ObjKind, ty: Type) -> Option<ObjId> {
        self.record(ident.id, &ty);
        if ident.is_blank() {
            return None;
        }
        let is_var = kind == ObjKind::Var;
        let obj = self.new_object(&ident.name, kind, ty, ScopeLevel::Local, Some(ident.id));
        self.info.defs.insert(ident.id, obj);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(ident.name.clone(), obj);
        }
        if is_var {
            if let Some(frame) = self.locals.last_mut() {
                frame.push((obj, ident.span));
            }
        }
        Some(obj)
    }

    fn declare_package(&mut self, ident: &Ident, obj: ObjId) {
        if ident.is_blank() {
            return;
        }
        if self.package.contains_key(&ident.name) {
            self.error(
                ident.span,
                codes::UNDEFINED,
                format!("{} redeclared in this block", ident.name),
            );
            return;
        }
        self.package.insert(ident.name.clone(), obj);
    }

    // ---- package-level collection -------------------------------------

    fn collect_imports(&mut self) {
        let files = self.files;
        for (idx, file) in files.iter().enumerate() {
            self.current_file = idx;
            for import in &file.imports {
                let package = self.load_package(&import.path, import.span);
                let local = import.local_name();
                if local == "_" {
                    continue;
                }
                if local == "." {
                    if package.opaque {
                        continue;
                    }
                    for (name, member) in package.members.clone() {
                        let obj = self.member_object(&import.path, &name, &member);
                        self.file_scopes[idx].insert(name, obj);
                    }
                    continue;
                }
                let name = if import.name.is_none() && !package.name.is_empty() {
                    package.name.clone()
                } else {
                    local
                };
                let obj = self.new_object(
                    &name,
                    ObjKind::PkgName(import.path.clone()),
                    Type::Invalid,
                    ScopeLevel::Package,
                    import.name.as_ref().map(|ident| ident.id),
                );
                if let Some(ident) = &import.name {
                    self.info.defs.insert(ident.id, obj);
                }
                self.file_scopes[idx].insert(name, obj);
            }
        }
        self.current_file = 0;
    }

    fn load_package(&mut self, path: &str, span: Span) -> Package {
        if let Some(package) = self.packages.get(path) {
            return package.clone();
        }
        let package = match path {
            "C" => Package {
                path: "C".into(),
                name: "C".into(),
                ..Package::default()
            },
            "unsafe" => universe::unsafe_package(),
            _ => match self.importer.import(path) {
                Ok(package) => package,
                Err(err) => {
                    self.error(span, codes::IMPORT, err.to_string());
                    self.import_errors.push((path.to_string(), err));
                    Package::opaque(path)
                }
            },
        };
        self.packages.insert(path.to_string(), package.clone());
        package
    }

    pub(super) fn member_object(&mut self, path: &str, name: &str, member: &Member) -> ObjId {
        let key = (path.to_string(), name.to_string());
        if let Some(obj) = self.member_objects.get(&key) {
            return *obj;
        }
        let obj = self.info.add_object(Object {
            name: name.to_string(),
            kind: member.kind.clone(),
            ty: member.ty.clone(),
            level: ScopeLevel::Imported,
            def: None,
            pkg: Some(path.to_string()),
            value: None,
        });
        self.member_objects.insert(key, obj);
        obj
    }

    fn collect_types(&mut self) {
        let files = self.files;
        for (idx, file) in files.iter().enumerate() {
            self.current_file = idx;
            for decl in &file.decls {
                let Decl::Gen(gen) = decl else { continue };
                if gen.kind != GenKind::Type {
                    continue;
                }
                for spec in &gen.specs {
                    let Spec::Type(spec) = spec else { continue };
                    let ty = if spec.alias {
                        Type::Invalid
                    } else {
                        Type::named("", spec.name.name.clone())
                    };
                    let obj = self.new_object(
                        &spec.name.name,
                        ObjKind::TypeName,
                        ty.clone(),
                        ScopeLevel::Package,
                        Some(spec.name.id),
                    );
                    self.info.defs.insert(spec.name.id, obj);
                    self.record(spec.name.id, &ty);
                    self.declare_package(&spec.name, obj);
                    if spec.alias {
                        self.alias_specs.insert(obj, (idx, spec));
                    } else {
                        self.info.named.insert(
                            spec.name.name.clone(),
                            NamedInfo {
                                underlying: Type::Invalid,
                                methods: MethodSet::default(),
                            },
                        );
                    }
                }
            }
        }
    }

    fn resolve_type_decls(&mut self) {
        let mut aliases: Vec<(ObjId, usize, &'a TypeSpec)> = self
            .alias_specs
            .iter()
            .map(|(obj, (file, spec))| (*obj, *file, *spec))
            .collect();
        aliases.sort_by_key(|(obj, _, _)| *obj);
        for (obj, file, spec) in aliases {
            self.current_file = file;
            self.resolve_alias(obj, spec);
        }
        let files = self.files;
        for (idx, file) in files.iter().enumerate() {
            self.current_file = idx;
            for decl in &file.decls {
                let Decl::Gen(gen) = decl else { continue };
                for spec in &gen.specs {
                    if let Spec::Type(spec) = spec {
                        if !spec.alias {
                            self.define_named(spec);
                        }
                    }
                }
            }
        }
    }

    pub(super) fn resolve_alias(&mut self, obj: ObjId, spec: &'a TypeSpec) -> Type {
        if self.alias_specs.remove(&obj).is_none() {
            return self.info.object(obj).ty.clone();
        }
        let ty = self.resolve_type(&spec.ty);
        self.info.object_mut(obj).ty = ty.clone();
        self.record(spec.name.id, &ty);
        ty
    }

    /// Computes the underlying type of a type definition.
    pub(super) fn define_named(&mut self, spec: &'a TypeSpec) {
        let ty = self.resolve_type(&spec.ty);
        let underlying = match &ty {
            Type::Named { .. } => self.underlying(&ty),
            other => other.clone(),
        };
        let methods = match &underlying {
            Type::Interface(methods) => interface_method_set(methods),
            _ => MethodSet::default(),
        };
        let entry = self
            .info
            .named
            .entry(spec.name.name.clone())
            .or_insert_with(|| NamedInfo {
                underlying: Type::Invalid,
                methods: MethodSet::default(),
            });
        entry.underlying = underlying;
        for (name, method) in methods.methods {
            entry.methods.methods.entry(name).or_insert(method);
        }
    }

    fn collect_funcs(&mut self) {
        let mut init_count = 0usize;
        let files = self.files;
        for (idx, file) in files.iter().enumerate() {
            self.current_file = idx;
            for decl in &file.decls {
                let Decl::Func(func) = decl else { continue };
                let sig = self.signature(&func.ty);
                let ty = Type::Func(sig.clone());
                let obj = self.new_object(
                    &func.name.name,
                    ObjKind::Func,
                    ty.clone(),
                    ScopeLevel::Package,
                    Some(func.name.id),
                );
                self.info.defs.insert(func.name.id, obj);
                self.record(func.name.id, &ty);

                let Some(recv) = &func.recv else {
                    if func.name.name == "init" {
                        init_count += 1;
                        if !sig.params.is_empty() || !sig.results.is_empty() {
                            self.error(
                                func.name.span,
                                codes::MISMATCH,
                                "func init must have no arguments and no return values",
                            );
                        }
                    } else {
                        self.declare_package(&func.name, obj);
                    }
                    continue;
                };

                let recv_ty = self.resolve_type(&recv.ty);
                let Some(base) = func.receiver_type_name() else {
                    self.error(recv.span, codes::INVALID_OP, "invalid receiver type");
                    continue;
                };
                if !self.info.named.contains_key(base) {
                    if !recv_ty.is_invalid() || self.lookup(base).is_none() {
                        self.error(
                            recv.span,
                            codes::UNDEFINED,
                            format!("undefined receiver type {base}"),
                        );
                    }
                    continue;
                }
                let method = MethodInfo {
                    sig,
                    pointer_recv: func.has_pointer_receiver(),
                    obj: Some(obj),
                };
                let name = func.name.name.clone();
                let duplicate = self
                    .info
                    .named
                    .get(base)
                    .is_some_and(|info| info.methods.methods.contains_key(&name));
                if duplicate {
                    self.error(
                        func.name.span,
                        codes::UNDEFINED,
                        format!("method {base}.{name} already declared"),
                    );
                    continue;
                }
                if let Some(info) = self.info.named.get_mut(base) {
                    info.methods.methods.insert(name, method);
                }
            }
        }
        trace!(init_count, "collected functions");
    }

    fn collect_values(&mut self) {
        let files = self.files;
        for (idx, file) in files.iter().enumerate() {
            self.current_file = idx;
            for decl in &file.decls {
                let Decl::Gen(gen) = decl else { continue };
                if gen.kind == GenKind::Type {
                    continue;
                }
                let mut source: Option<&'a ValueSpec> = None;
                for (iota, spec) in gen.specs.iter().enumerate() {
                    let Spec::Value(spec) = spec else { continue };
                    if gen.kind == GenKind::Const && (spec.ty.is_some() || !spec.values.is_empty())
                    {
                        source = Some(spec);
                    }
                    let pending = self.pending.len();
                    self.pending.push(PendingSpec {
                        file: idx,
                        spec,
                        kind: gen.kind,
                        iota: iota as i128,
                        source: source.unwrap_or(spec),
                        state: PendingState::Waiting,
                    });
                    let kind = if gen.kind == GenKind::Const {
                        ObjKind::Const
                    } else {
                        ObjKind::Var
                    };
                    for name in &spec.names {
                        if name.is_blank() {
                            continue;
                        }
                        let obj = self.new_object(
                            &name.name,
                            kind.clone(),
                            Type::Invalid,
                            ScopeLevel::Package,
                            Some(name.id),
                        );
                        self.info.defs.insert(name.id, obj);
                        self.pending_of.insert(obj, pending);
                        self.declare_package(name, obj);
                    }
                }
            }
        }
    }

    /// Resolves a lazily typed package-level object, if it still waits.
    pub(super) fn ensure_resolved(&mut self, obj: ObjId, span: Span) {
        let Some(&idx) = self.pending_of.get(&obj) else {
            return;
        };
        match self.pending[idx].state {
            PendingState::Done => {}
            PendingState::Resolving => {
                let name = self.info.object(obj).name.clone();
                self.error(
                    span,
                    codes::CYCLE,
                    format!("initialization cycle or invalid recursive reference to {name}"),
                );
            }
            PendingState::Waiting => self.resolve_pending(idx),
        }
    }

    fn resolve_pending(&mut self, idx: usize) {
        self.pending[idx].state = PendingState::Resolving;
        let file = self.pending[idx].file;
        let spec = self.pending[idx].spec;
        let source = self.pending[idx].source;
        let kind = self.pending[idx].kind;
        let iota = self.pending[idx].iota;

        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_file = std::mem::replace(&mut self.current_file, file);
        let saved_iota = self.iota.take();
        let saved_results = std::mem::take(&mut self.results);
        let saved_lhs = std::mem::replace(&mut self.assign_lhs, false);

        if kind == GenKind::Const {
            self.iota = Some(iota);
        }
        let computed = self.value_spec_types(spec, source, kind);
        for (name, (ty, value)) in spec.names.iter().zip(computed) {
            self.record(name.id, &ty);
            if let Some(obj) = self.info.defs.get(&name.id).copied() {
                let object = self.info.object_mut(obj);
                object.ty = ty;
                object.value = value;
            }
        }

        self.scopes = saved_scopes;
        self.current_file = saved_file;
        self.iota = saved_iota;
        self.results = saved_results;
        self.assign_lhs = saved_lhs;
        self.pending[idx].state = PendingState::Done;
    }

    fn resolve_all_pending(&mut self) {
        for idx in 0..self.pending.len() {
            if self.pending[idx].state == PendingState::Waiting {
                self.resolve_pending(idx);
            }
        }
    }

    /// Types (and folded constant values) for each name of a value spec.
    pub(super) fn value_spec_types(
        &mut self,
        spec: &'a ValueSpec,
        source: &'a ValueSpec,
        kind: GenKind,
    ) -> Vec<(Type, Option<i128>)> {
        let (ty_expr, values) = if kind == GenKind::Const && spec.ty.is_none() && spec.values.is_empty() {
            (source.ty.as_ref(), source.values.as_slice())
        } else {
            (spec.ty.as_ref(), spec.values.as_slice())
        };
        let declared = ty_expr.map(|ty| self.resolve_type(ty));
        let count = spec.names.len();

        if values.is_empty() {
            if kind == GenKind::Const {
                self.error(spec.span, codes::MISMATCH, "missing init expr for const declaration");
            }
            let ty = declared.unwrap_or(Type::Invalid);
            return vec![(ty, None); count];
        }

        let operands = self.assign_operands(values, count, spec.span);
        let mut out = Vec::with_capacity(count);
        for (idx, operand) in operands.into_iter().enumerate() {
            let value_expr = (values.len() == count).then(|| &values[idx]);
            let ty = match &declared {
                Some(declared) => {
                    if let Some(expr) = value_expr {
                        self.check_assignable(&operand, declared, expr.span(), "variable declaration");
                        self.convert_untyped(expr, declared);
                    }
                    declared.clone()
                }
                None => {
                    let ty = if kind == GenKind::Const {
                        operand.ty.clone()
                    } else {
                        operand.ty.default_type()
                    };
                    if let Some(expr) = value_expr {
                        if kind != GenKind::Const {
                            self.convert_untyped(expr, &ty);
                        }
                    }
                    if ty.is_nil() {
                        if let Some(expr) = value_expr {
                            self.error(expr.span(), codes::MISMATCH, "use of untyped nil in variable declaration");
                        }
                    }
                    ty
                }
            };
            let value = if kind == GenKind::Const { operand.value } else { None };
            out.push((ty, value));
        }
        out
    }

    /// Operand types for `count` targets from a value list, unpacking a
    /// single multi-value or comma-ok expression.
    pub(super) fn assign_operands(&mut self, values: &'a [Expr], count: usize, span: Span) -> Vec<Operand> {
        if values.len() == count {
            return values.iter().map(|value| self.expr(value, None)).collect();
        }
        if values.len() == 1 && count > 1 {
            let operand = self.expr(&values[0], None);
            if let Type::Tuple(items) = &operand.ty {
                if items.len() == count {
                    return items.iter().cloned().map(Operand::value).collect();
                }
            } else if count == 2 && is_comma_ok(&values[0]) {
                return vec![operand, Operand::value(Type::Basic(BasicKind::UntypedBool))];
            }
            if operand.ty.is_invalid() {
                return vec![Operand::invalid(); count];
            }
            self.error(
                span,
                codes::ARITY,
                format!(
                    "assignment mismatch: {count} variables but {} value{}",
                    operand.ty.tuple_len(),
                    if operand.ty.tuple_len() == 1 { "" } else { "s" }
                ),
            );
            return vec![Operand::invalid(); count];
        }
        for value in values {
            self.expr(value, None);
        }
        self.error(
            span,
            codes::ARITY,
            format!("assignment mismatch: {count} variables but {} values", values.len()),
        );
        vec![Operand::invalid(); count]
    }

    // ---- functions -----------------------------------------------------

    fn check_func_decl(&mut self, func: &'a FuncDecl) {
        let Some(body) = &func.body else {
            return;
        };
        self.push_scope();
        self.locals.push(Vec::new());
        if let Some(recv) = &func.recv {
            self.declare_fields(std::slice::from_ref(recv));
        }
        self.declare_fields(&func.ty.params);
        self.declare_fields(&func.ty.results);
        let results = self.field_types(&func.ty.results);
        self.results.push(results);
        self.stmts(&body.stmts);
        self.results.pop();
        self.finish_locals();
        self.pop_scope();
    }

    /// Checks a function literal body in a fresh scope.
    pub(super) fn check_func_body(&mut self, ty: &'a FuncType, body: &'a Block) {
        self.push_scope();
        self.locals.push(Vec::new());
        self.declare_fields(&ty.params);
        self.declare_fields(&ty.results);
        let results = self.field_types(&ty.results);
        self.results.push(results);
        let saved_iota = self.iota.take();
        self.stmts(&body.stmts);
        self.iota = saved_iota;
        self.results.pop();
        self.finish_locals();
        self.pop_scope();
    }

    /// Parameter-style declarations; types were recorded when the signature
    /// was resolved.
    fn declare_fields(&mut self, fields: &'a [Field]) {
        for field in fields {
            let ty = self
                .info
                .types
                .get(&field.ty.id())
                .cloned()
                .unwrap_or(Type::Invalid);
            for name in &field.names {
                if let Some(obj) = self.declare_local(name, ObjKind::Var, ty.clone()) {
                    // Parameters never count as unused.
                    self.used.insert(obj);
                }
            }
        }
    }

    fn field_types(&self, fields: &[Field]) -> Vec<Type> {
        let mut out = Vec::new();
        for field in fields {
            let ty = self
                .info
                .types
                .get(&field.ty.id())
                .cloned()
                .unwrap_or(Type::Invalid);
            for _ in 0..field.names.len().max(1) {
                out.push(ty.clone());
            }
        }
        out
    }

    fn finish_locals(&mut self) {
        let Some(frame) = self.locals.pop() else {
            return;
        };
        for (obj, span) in frame {
            if self.used.contains(&obj) {
                continue;
            }
            let name = self.info.object(obj).name.clone();
            let err = TypeError::new(self.path(), span, format!("declared and not used: {name}"))
                .with_code(codes::UNUSED);
            self.unused.push(err);
        }
    }

    // ---- statements ----------------------------------------------------

    pub(super) fn stmts(&mut self, stmts: &'a [Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn block(&mut self, block: &'a Block) {
        self.push_scope();
        self.stmts(&block.stmts);
        self.pop_scope();
    }

    fn stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Decl(decl) => self.local_decl(decl),
            Stmt::Empty(_) => {}
            Stmt::Labeled(labeled) => self.stmt(&labeled.stmt),
            Stmt::Expr(stmt) => {
                let operand = self.expr(&stmt.expr, None);
                if operand.mode == Mode::TypeExpr {
                    self.error(stmt.expr.span(), codes::INVALID_OP, "type is not an expression");
                } else if !matches!(stmt.expr.unparen(), Expr::Call { .. } | Expr::Unary { op: UnaryOp::Recv, .. })
                    && operand.mode != Mode::Invalid
                {
                    self.error(stmt.expr.span(), codes::INVALID_OP, "expression evaluated but not used");
                }
            }
            Stmt::Send(send) => {
                let chan = self.expr(&send.chan, None);
                let elem = match self.underlying(&chan.ty) {
                    Type::Chan(_, elem) => Some(*elem),
                    Type::Invalid | Type::Foreign(_) => None,
                    other => {
                        self.error(send.chan.span(), codes::INVALID_OP, format!("cannot send to non-channel of type {other}"));
                        None
                    }
                };
                let value = self.expr(&send.value, elem.as_ref());
                if let Some(elem) = elem {
                    self.check_assignable(&value, &elem, send.value.span(), "send");
                    self.convert_untyped(&send.value, &elem);
                }
            }
            Stmt::IncDec(stmt) => {
                let operand = self.expr(&stmt.expr, None);
                if let Some(kind) = self.underlying(&operand.ty).as_basic() {
                    if !kind.is_numeric() {
                        self.error(stmt.span, codes::INVALID_OP, "invalid operation: non-numeric operand");
                    }
                }
            }
            Stmt::Assign(assign) => self.assign(assign),
            Stmt::Go(stmt) => {
                self.expr(&stmt.call, None);
            }
            Stmt::Defer(stmt) => {
                self.expr(&stmt.call, None);
            }
            Stmt::Return(ret) => self.return_stmt(ret),
            Stmt::Branch(_) => {}
            Stmt::Block(block) => self.block(block),
            Stmt::If(stmt) => {
                self.push_scope();
                if let Some(init) = &stmt.init {
                    self.stmt(init);
                }
                let cond = self.expr(&stmt.cond, None);
                self.expect_bool(&cond, &stmt.cond);
                self.block(&stmt.then);
                if let Some(els) = &stmt.els {
                    self.stmt(els);
                }
                self.pop_scope();
            }
            Stmt::Switch(stmt) => self.switch_stmt(stmt),
            Stmt::TypeSwitch(stmt) => self.type_switch(stmt),
            Stmt::Select(stmt) => {
                for clause in &stmt.clauses {
                    self.push_scope();
                    if let Some(comm) = &clause.comm {
                        self.stmt(comm);
                    }
                    self.stmts(&clause.body);
                    self.pop_scope();
                }
            }
            Stmt::For(stmt) => {
                self.push_scope();
                if let Some(init) = &stmt.init {
                    self.stmt(init);
                }
                if let Some(cond) = &stmt.cond {
                    let operand = self.expr(cond, None);
                    self.expect_bool(&operand, cond);
                }
                if let Some(post) = &stmt.post {
                    self.stmt(post);
                }
                self.block(&stmt.body);
                self.pop_scope();
            }
            Stmt::Range(stmt) => self.range_stmt(stmt),
        }
    }

    fn expect_bool(&mut self, operand: &Operand, expr: &Expr) {
        match self.underlying(&operand.ty) {
            Type::Basic(kind) if kind.is_boolean() => {
                self.convert_untyped(expr, &Type::Basic(BasicKind::Bool));
            }
            Type::Invalid | Type::Foreign(_) => {}
            other => self.error(
                expr.span(),
                codes::MISMATCH,
                format!("non-boolean condition (type {other})"),
            ),
        }
    }

    fn local_decl(&mut self, decl: &'a GenDecl) {
        let mut source: Option<&'a ValueSpec> = None;
        for (iota, spec) in decl.specs.iter().enumerate() {
            match spec {
                Spec::Type(spec) => {
                    let ty = if spec.alias {
                        self.resolve_type(&spec.ty)
                    } else {
                        self.info.named.entry(spec.name.name.clone()).or_insert_with(|| NamedInfo {
                            underlying: Type::Invalid,
                            methods: MethodSet::default(),
                        });
                        Type::named("", spec.name.name.clone())
                    };
                    self.declare_local(&spec.name, ObjKind::TypeName, ty);
                    if !spec.alias {
                        self.define_named(spec);
                    }
                }
                Spec::Value(spec) => {
                    if decl.kind == GenKind::Const && (spec.ty.is_some() || !spec.values.is_empty()) {
                        source = Some(spec);
                    }
                    let saved = self.iota;
                    if decl.kind == GenKind::Const {
                        self.iota = Some(iota as i128);
                    }
                    let types = self.value_spec_types(spec, source.unwrap_or(spec), decl.kind);
                    self.iota = saved;
                    let kind = if decl.kind == GenKind::Const {
                        ObjKind::Const
                    } else {
                        ObjKind::Var
                    };
                    for (name, (ty, value)) in spec.names.iter().zip(types) {
                        if let Some(obj) = self.declare_local(name, kind.clone(), ty) {
                            self.info.object_mut(obj).value = value;
                        }
                    }
                }
            }
        }
    }

    fn assign(&mut self, assign: &'a AssignStmt) {
        match assign.op {
            AssignOp::Define => {
                let operands = self.assign_operands(&assign.rhs, assign.lhs.len(), assign.span);
                let current = self.scopes.last().cloned().unwrap_or_default();
                let mut any_new = false;
                for (idx, (lhs, operand)) in assign.lhs.iter().zip(operands).enumerate() {
                    let Expr::Ident(ident) = lhs else {
                        self.error(lhs.span(), codes::INVALID_OP, "non-name on left side of :=");
                        continue;
                    };
                    let ty = operand.ty.default_type();
                    if ty.is_nil() {
                        self.error(lhs.span(), codes::MISMATCH, "use of untyped nil in assignment");
                    }
                    if assign.rhs.len() == assign.lhs.len() {
                        self.convert_untyped(&assign.rhs[idx], &ty);
                    }
                    if let Some(existing) = current.get(&ident.name).copied() {
                        self.info.uses.insert(ident.id, existing);
                        let target = self.info.object(existing).ty.clone();
                        self.record(ident.id, &target);
                        self.check_assignable(&operand, &target, lhs.span(), "assignment");
                        continue;
                    }
                    if !ident.is_blank() {
                        any_new = true;
                    }
                    self.declare_local(ident, ObjKind::Var, ty);
                }
                if !any_new && assign.lhs.iter().any(|lhs| !matches!(lhs, Expr::Ident(i) if i.is_blank())) {
                    self.error(assign.span, codes::INVALID_OP, "no new variables on left side of :=");
                }
            }
            AssignOp::Assign => {
                let mut targets = Vec::with_capacity(assign.lhs.len());
                for lhs in &assign.lhs {
                    if matches!(lhs, Expr::Ident(ident) if ident.is_blank()) {
                        targets.push(None);
                        continue;
                    }
                    self.assign_lhs = matches!(lhs, Expr::Ident(_));
                    let target = self.expr(lhs, None);
                    self.assign_lhs = false;
                    if matches!(target.mode, Mode::Constant | Mode::TypeExpr | Mode::NoValue) {
                        self.error(lhs.span(), codes::INVALID_OP, "cannot assign to non-variable");
                    }
                    targets.push(Some(target.ty));
                }
                if assign.rhs.len() == assign.lhs.len() {
                    for (idx, rhs) in assign.rhs.iter().enumerate() {
                        let hint = targets[idx].clone();
                        let operand = self.expr(rhs, hint.as_ref());
                        match &targets[idx] {
                            Some(target) => {
                                self.check_assignable(&operand, target, rhs.span(), "assignment");
                                self.convert_untyped(rhs, target);
                            }
                            None => {
                                let ty = operand.ty.default_type();
                                self.convert_untyped(rhs, &ty);
                            }
                        }
                    }
                } else {
                    let operands = self.assign_operands(&assign.rhs, assign.lhs.len(), assign.span);
                    for (operand, target) in operands.iter().zip(&targets) {
                        if let Some(target) = target {
                            self.check_assignable(operand, target, assign.span, "assignment");
                        }
                    }
                }
            }
            AssignOp::Op(op) => {
                let (Some(lhs), Some(rhs)) = (assign.lhs.first(), assign.rhs.first()) else {
                    return;
                };
                let target = self.expr(lhs, None);
                let value = self.expr(rhs, Some(&target.ty));
                if op.is_shift() {
                    self.convert_untyped(rhs, &Type::Basic(BasicKind::Uint));
                } else {
                    self.check_binary_operands(op, &target, &value, assign.span);
                    self.convert_untyped(rhs, &target.ty);
                }
            }
        }
    }

    fn return_stmt(&mut self, ret: &'a ReturnStmt) {
        let expected = self.results.last().cloned().unwrap_or_default();
        if ret.results.is_empty() {
            return;
        }
        if ret.results.len() == 1 && expected.len() > 1 {
            let operand = self.expr(&ret.results[0], None);
            if operand.ty.tuple_len() != expected.len() && !operand.ty.is_invalid() {
                self.error(ret.span, codes::ARITY, "wrong number of return values");
            }
            return;
        }
        if ret.results.len() != expected.len() {
            for result in &ret.results {
                self.expr(result, None);
            }
            self.error(
                ret.span,
                codes::ARITY,
                format!(
                    "wrong number of return values (have {}, want {})",
                    ret.results.len(),
                    expected.len()
                ),
            );
            return;
        }
        for (result, want) in ret.results.iter().zip(&expected) {
            let operand = self.expr(result, Some(want));
            self.check_assignable(&operand, want, result.span(), "return statement");
            self.convert_untyped(result, want);
        }
    }

    fn switch_stmt(&mut self, stmt: &'a SwitchStmt) {
        self.push_scope();
        if let Some(init) = &stmt.init {
            self.stmt(init);
        }
        let tag = stmt.tag.as_ref().map(|tag| {
            let operand = self.expr(tag, None);
            let ty = operand.ty.default_type();
            self.convert_untyped(tag, &ty);
            ty
        });
        for clause in &stmt.clauses {
            for case in &clause.list {
                let operand = self.expr(case, tag.as_ref());
                match &tag {
                    Some(tag) => self.convert_untyped(case, tag),
                    None => self.expect_bool(&operand, case),
                }
            }
            self.push_scope();
            self.stmts(&clause.body);
            self.pop_scope();
        }
        self.pop_scope();
    }

    fn type_switch(&mut self, stmt: &'a TypeSwitchStmt) {
        self.push_scope();
        if let Some(init) = &stmt.init {
            self.stmt(init);
        }
        let subject = self.expr(&stmt.subject, None);
        if !matches!(
            self.underlying(&subject.ty),
            Type::Interface(_) | Type::Invalid | Type::Foreign(_)
        ) {
            self.error(
                stmt.subject.span(),
                codes::INVALID_OP,
                format!("{} is not an interface", subject.ty),
            );
        }
        let mut first_binding: Option<ObjId> = None;
        for clause in &stmt.clauses {
            let mut case_types = Vec::new();
            for case in &clause.list {
                let operand = self.expr(case, None);
                match operand.mode {
                    Mode::TypeExpr => case_types.push(operand.ty),
                    _ if operand.ty.is_nil() => case_types.push(subject.ty.clone()),
                    Mode::Invalid => case_types.push(Type::Invalid),
                    _ => {
                        self.error(case.span(), codes::INVALID_OP, "case expression is not a type");
                        case_types.push(Type::Invalid);
                    }
                }
            }
            self.push_scope();
            if let Some(binding) = &stmt.binding {
                let ty = if case_types.len() == 1 {
                    case_types.remove(0)
                } else {
                    subject.ty.clone()
                };
                if !binding.is_blank() {
                    let obj = self.new_object(&binding.name, ObjKind::Var, ty, ScopeLevel::Local, Some(binding.id));
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert(binding.name.clone(), obj);
                    }
                    first_binding.get_or_insert(obj);
                }
            }
            self.stmts(&clause.body);
            self.pop_scope();
        }
        if let (Some(binding), Some(obj)) = (&stmt.binding, first_binding) {
            self.info.defs.insert(binding.id, obj);
            self.record(binding.id, &subject.ty);
        }
        self.pop_scope();
    }

    fn range_stmt(&mut self, stmt: &'a RangeStmt) {
        self.push_scope();
        let operand = self.expr(&stmt.expr, None);
        let (key, value) = match self.underlying(&operand.ty) {
            Type::Slice(elem) | Type::Array(_, elem) => (Type::Basic(BasicKind::Int), *elem),
            Type::Pointer(inner) => match self.underlying(&inner) {
                Type::Array(_, elem) => (Type::Basic(BasicKind::Int), *elem),
                _ => (Type::Invalid, Type::Invalid),
            },
            Type::Basic(kind) if kind.is_string() => {
                (Type::Basic(BasicKind::Int), Type::Basic(BasicKind::Int32))
            }
            Type::Basic(kind) if kind.is_integer() => {
                let ty = operand.ty.default_type();
                self.convert_untyped(&stmt.expr, &ty);
                (ty, Type::Invalid)
            }
            Type::Map(key, value) => (*key, *value),
            Type::Chan(dir, elem) => {
                if !dir.can_recv() {
                    self.error(stmt.expr.span(), codes::INVALID_OP, "cannot range over send-only channel");
                }
                (*elem, Type::Invalid)
            }
            Type::Invalid | Type::Foreign(_) => (Type::Invalid, Type::Invalid),
            other => {
                self.error(stmt.expr.span(), codes::INVALID_OP, format!("cannot range over {other}"));
                (Type::Invalid, Type::Invalid)
            }
        };
        let pairs = [(stmt.key.as_ref(), key), (stmt.value.as_ref(), value)];
        for (target, ty) in pairs {
            let Some(target) = target else { continue };
            if stmt.define {
                match target {
                    Expr::Ident(ident) => {
                        self.declare_local(ident, ObjKind::Var, ty);
                    }
                    other => self.error(other.span(), codes::INVALID_OP, "non-name on left side of :="),
                }
            } else if !matches!(target, Expr::Ident(ident) if ident.is_blank()) {
                self.assign_lhs = matches!(target, Expr::Ident(_));
                self.expr(target, None);
                self.assign_lhs = false;
            }
        }
        self.block(&stmt.body);
        self.pop_scope();
    }
}

fn interface_method_set(methods: &[InterfaceMethod]) -> MethodSet {
    let mut set = MethodSet::default();
    for method in methods {
        set.methods.insert(
            method.name.clone(),
            MethodInfo {
                sig: method.sig.clone(),
                pointer_recv: false,
                obj: None,
            },
        );
    }
    set
}

/// Expressions with a comma-ok form.
pub(super) fn is_comma_ok(expr: &Expr) -> bool {
    matches!(
        expr.unparen(),
        Expr::Index { .. }
            | Expr::TypeAssert { ty: Some(_), .. }
            | Expr::Unary {
                op: UnaryOp::Recv,
                ..
            }
    )
}
