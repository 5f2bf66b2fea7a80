use super::*;
use crate::language::types::{BasicKind, InterfaceMethod};

const BUILTINS: &[(&str, Builtin)] = &[
    ("append", Builtin::Append),
    ("cap", Builtin::Cap),
    ("clear", Builtin::Clear),
    ("close", Builtin::Close),
    ("complex", Builtin::Complex),
    ("copy", Builtin::Copy),
    ("delete", Builtin::Delete),
    ("imag", Builtin::Imag),
    ("len", Builtin::Len),
    ("make", Builtin::Make),
    ("max", Builtin::Max),
    ("min", Builtin::Min),
    ("new", Builtin::New),
    ("panic", Builtin::Panic),
    ("print", Builtin::Print),
    ("println", Builtin::Println),
    ("real", Builtin::Real),
    ("recover", Builtin::Recover),
];

const TYPE_NAMES: &[&str] = &[
    "bool",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
    "float32",
    "float64",
    "complex64",
    "complex128",
    "string",
    "byte",
    "rune",
    "error",
    "any",
];

/// Predeclared type by name.
pub fn universe_type(name: &str) -> Option<Type> {
    let kind = match name {
        "bool" => BasicKind::Bool,
        "int" => BasicKind::Int,
        "int8" => BasicKind::Int8,
        "int16" => BasicKind::Int16,
        "int32" | "rune" => BasicKind::Int32,
        "int64" => BasicKind::Int64,
        "uint" => BasicKind::Uint,
        "uint8" | "byte" => BasicKind::Uint8,
        "uint16" => BasicKind::Uint16,
        "uint32" => BasicKind::Uint32,
        "uint64" => BasicKind::Uint64,
        "uintptr" => BasicKind::Uintptr,
        "float32" => BasicKind::Float32,
        "float64" => BasicKind::Float64,
        "complex64" => BasicKind::Complex64,
        "complex128" => BasicKind::Complex128,
        "string" => BasicKind::String,
        "error" => return Some(Type::error()),
        "any" => return Some(Type::empty_interface()),
        _ => return None,
    };
    Some(Type::Basic(kind))
}

fn error_method() -> InterfaceMethod {
    InterfaceMethod {
        name: "Error".into(),
        sig: Signature {
            params: Vec::new(),
            results: vec![Type::Basic(BasicKind::String)],
            variadic: false,
        },
    }
}

/// Underlying type and method table of the predeclared `error`.
pub(super) fn error_info() -> NamedInfo {
    let method = error_method();
    let mut methods = MethodSet::default();
    methods.methods.insert(
        method.name.clone(),
        MethodInfo {
            sig: method.sig.clone(),
            pointer_recv: false,
            obj: None,
        },
    );
    NamedInfo {
        underlying: Type::Interface(vec![method]),
        methods,
    }
}

fn object(name: &str, kind: ObjKind, ty: Type) -> Object {
    Object {
        name: name.to_string(),
        kind,
        ty,
        level: ScopeLevel::Universe,
        def: None,
        pkg: None,
        value: None,
    }
}

pub(super) fn populate(info: &mut TypeInfo) -> HashMap<String, ObjId> {
    let mut scope = HashMap::new();
    for name in TYPE_NAMES {
        if let Some(ty) = universe_type(name) {
            let id = info.add_object(object(name, ObjKind::TypeName, ty));
            scope.insert(name.to_string(), id);
        }
    }
    for name in ["true", "false"] {
        let id = info.add_object(object(
            name,
            ObjKind::Const,
            Type::Basic(BasicKind::UntypedBool),
        ));
        scope.insert(name.to_string(), id);
    }
    let iota = info.add_object(object(
        "iota",
        ObjKind::Const,
        Type::Basic(BasicKind::UntypedInt),
    ));
    scope.insert("iota".into(), iota);
    let nil = info.add_object(object("nil", ObjKind::Nil, Type::Basic(BasicKind::UntypedNil)));
    scope.insert("nil".into(), nil);
    for (name, builtin) in BUILTINS {
        let id = info.add_object(object(name, ObjKind::Builtin(*builtin), Type::Invalid));
        scope.insert(name.to_string(), id);
    }
    scope
}

/// The `unsafe` package, resolved by the checker itself.
pub(super) fn unsafe_package() -> Package {
    let mut package = Package {
        path: "unsafe".into(),
        name: "unsafe".into(),
        ..Package::default()
    };
    package.members.insert(
        "Pointer".into(),
        Member {
            kind: ObjKind::TypeName,
            ty: Type::Basic(BasicKind::UnsafePointer),
        },
    );
    for (name, builtin) in [
        ("Sizeof", Builtin::Sizeof),
        ("Alignof", Builtin::Alignof),
        ("Offsetof", Builtin::Offsetof),
    ] {
        package.members.insert(
            name.into(),
            Member {
                kind: ObjKind::Builtin(builtin),
                ty: Type::Invalid,
            },
        );
    }
    package
}
