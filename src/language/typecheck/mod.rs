use crate::language::{
    ast::{File, NodeId},
    span::Span,
    types::{Signature, Type},
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
};

#[derive(Clone, Debug)]
pub struct TypeError {
    pub path: PathBuf,
    pub span: Span,
    pub message: String,
    pub label: String,
    pub code: Option<String>,
    pub help: Option<String>,
}

impl TypeError {
    pub fn new(path: &Path, span: Span, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            path: path.to_path_buf(),
            span,
            label: message.clone(),
            message,
            code: None,
            help: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn display_message(&self) -> String {
        if let Some(code) = &self.code {
            format!("[{code}] {}", self.message)
        } else {
            self.message.clone()
        }
    }
}

/// Error codes attached to checker errors.
pub mod codes {
    pub const UNDEFINED: &str = "undefined";
    pub const MISMATCH: &str = "mismatch";
    pub const ARITY: &str = "arity";
    pub const CYCLE: &str = "cycle";
    pub const UNUSED: &str = "unused-var";
    pub const IMPORT: &str = "import";
    pub const INVALID_OP: &str = "invalid-op";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Append,
    Cap,
    Clear,
    Close,
    Complex,
    Copy,
    Delete,
    Imag,
    Len,
    Make,
    Max,
    Min,
    New,
    Panic,
    Print,
    Println,
    Real,
    Recover,
    Sizeof,
    Alignof,
    Offsetof,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObjKind {
    Var,
    Const,
    TypeName,
    Func,
    /// Import binding; holds the import path.
    PkgName(String),
    Builtin(Builtin),
    Nil,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeLevel {
    Universe,
    Package,
    /// Member of an imported package.
    Imported,
    Local,
}

#[derive(Clone, Debug)]
pub struct Object {
    pub name: String,
    pub kind: ObjKind,
    pub ty: Type,
    pub level: ScopeLevel,
    /// Defining identifier, when the object comes from this unit.
    pub def: Option<NodeId>,
    /// Import path for imported members.
    pub pkg: Option<String>,
    /// Integer value of constants that fold.
    pub value: Option<i128>,
}

impl Object {
    pub fn is_local_var(&self) -> bool {
        self.kind == ObjKind::Var && self.level == ScopeLevel::Local
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionKind {
    Field,
    Method,
    /// `T.Method` or `(*T).Method`.
    MethodExpr,
    /// `pkg.Member`, including `C.<sym>`.
    PackageMember,
}

#[derive(Clone, Debug)]
pub struct Selection {
    pub kind: SelectionKind,
    /// Type of the selector's base operand.
    pub recv: Type,
    /// Named type that declares the field or method, after walking
    /// embedded fields.
    pub declaring: Option<String>,
    /// Import path for package members.
    pub pkg: Option<String>,
}

/// Per-type method table.
#[derive(Clone, Debug, Default)]
pub struct MethodSet {
    pub methods: BTreeMap<String, MethodInfo>,
}

#[derive(Clone, Debug)]
pub struct MethodInfo {
    pub sig: Signature,
    pub pointer_recv: bool,
    pub obj: Option<ObjId>,
}

#[derive(Clone, Debug)]
pub struct NamedInfo {
    pub underlying: Type,
    pub methods: MethodSet,
}

/// Everything the resolver learned about the unit.
#[derive(Clone, Debug, Default)]
pub struct TypeInfo {
    pub types: HashMap<NodeId, Type>,
    pub defs: HashMap<NodeId, ObjId>,
    pub uses: HashMap<NodeId, ObjId>,
    pub selections: HashMap<NodeId, Selection>,
    pub objects: Vec<Object>,
    /// Local named types, keyed by name.
    pub named: HashMap<String, NamedInfo>,
    /// Expressions that denote a type rather than a value.
    pub type_exprs: HashSet<NodeId>,
    /// Expressions intentionally left without a type: members of opaque
    /// packages, struct literal keys, package names.
    pub opaque: HashSet<NodeId>,
}

impl TypeInfo {
    pub fn object(&self, id: ObjId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn object_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.0 as usize]
    }

    pub fn add_object(&mut self, object: Object) -> ObjId {
        let id = ObjId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    /// Object defined or used by the identifier.
    pub fn object_of(&self, ident: NodeId) -> Option<ObjId> {
        self.defs
            .get(&ident)
            .or_else(|| self.uses.get(&ident))
            .copied()
    }

    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id)
    }

    /// Missing and invalid entries both count as unresolved.
    pub fn is_resolved(&self, id: NodeId) -> bool {
        self.types.get(&id).is_some_and(|ty| !ty.is_invalid())
    }

    pub fn record_type(&mut self, id: NodeId, ty: Type) {
        self.types.insert(id, ty);
    }

    /// Moves every side-table entry of `old` to `new`, for rewritten nodes.
    pub fn rebind(&mut self, old: NodeId, new: NodeId) {
        if let Some(ty) = self.types.remove(&old) {
            self.types.insert(new, ty);
        }
        if let Some(obj) = self.uses.remove(&old) {
            self.uses.insert(new, obj);
        }
        if let Some(obj) = self.defs.remove(&old) {
            self.defs.insert(new, obj);
            for object in &mut self.objects {
                if object.def == Some(old) {
                    object.def = Some(new);
                }
            }
        }
        if let Some(sel) = self.selections.remove(&old) {
            self.selections.insert(new, sel);
        }
        if self.type_exprs.remove(&old) {
            self.type_exprs.insert(new);
        }
        if self.opaque.remove(&old) {
            self.opaque.insert(new);
        }
    }

    /// Identifiers referencing `obj`.
    pub fn uses_of(&self, obj: ObjId) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .uses
            .iter()
            .filter(|(_, used)| **used == obj)
            .map(|(ident, _)| *ident)
            .collect();
        ids.sort();
        ids
    }

    pub fn method_set(&self, name: &str) -> Option<&MethodSet> {
        self.named.get(name).map(|info| &info.methods)
    }
}

/// Member of an imported package.
#[derive(Clone, Debug)]
pub struct Member {
    pub kind: ObjKind,
    pub ty: Type,
}

#[derive(Clone, Debug, Default)]
pub struct Package {
    pub path: String,
    pub name: String,
    pub members: BTreeMap<String, Member>,
    pub types: HashMap<String, NamedInfo>,
    /// Members are referenced without types and without diagnostics.
    pub opaque: bool,
}

impl Package {
    pub fn opaque(path: &str) -> Self {
        Self {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            opaque: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum ImportError {
    #[error("could not import {path}: {reason}")]
    NotFound { path: String, reason: String },
    #[error("invalid declaration of {path}.{member}: {reason}")]
    BadMember {
        path: String,
        member: String,
        reason: String,
    },
}

/// Resolves import paths to package descriptions.
pub trait Importer {
    fn import(&mut self, path: &str) -> Result<Package, ImportError>;
}

/// Output of one checker run. Errors are never fatal.
#[derive(Debug, Default)]
pub struct CheckResult {
    pub info: TypeInfo,
    pub errors: Vec<TypeError>,
    /// Declared-but-unused locals, kept apart from `errors`.
    pub unused: Vec<TypeError>,
    /// Imports that failed, by path.
    pub import_errors: Vec<(String, ImportError)>,
}

pub fn check_package(files: &[File], importer: &mut dyn Importer) -> CheckResult {
    checker::check_files(files, importer)
}

mod checker;
mod expr;
mod lookup;
mod universe;

pub use universe::universe_type;

#[cfg(test)]
mod tests;
