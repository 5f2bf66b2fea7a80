use crate::language::ast::ChanDir;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,

    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::String => "string",
            BasicKind::UnsafePointer => "unsafe.Pointer",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedComplex => "untyped complex",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
                | BasicKind::UntypedFloat
                | BasicKind::UntypedComplex
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
        )
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer()
            || matches!(
                self,
                BasicKind::Float32
                    | BasicKind::Float64
                    | BasicKind::Complex64
                    | BasicKind::Complex128
                    | BasicKind::UntypedFloat
                    | BasicKind::UntypedComplex
            )
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, BasicKind::Bool | BasicKind::UntypedBool)
    }

    pub fn is_string(self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    /// Rank of untyped numeric kinds; mixing two untyped constants yields
    /// the higher one.
    fn untyped_rank(self) -> u8 {
        match self {
            BasicKind::UntypedInt => 1,
            BasicKind::UntypedRune => 2,
            BasicKind::UntypedFloat => 3,
            BasicKind::UntypedComplex => 4,
            _ => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    /// Last parameter is `...T`, stored as `[]T`.
    pub variadic: bool,
}

impl Signature {
    pub fn result_type(&self) -> Type {
        match self.results.len() {
            0 => Type::Tuple(Vec::new()),
            1 => self.results[0].clone(),
            _ => Type::Tuple(self.results.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    pub embedded: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceMethod {
    pub name: String,
    pub sig: Signature,
}

/// Synthetic stand-in for a `C.<sym>` symbol the checker cannot see.
#[derive(Clone, Debug, PartialEq)]
pub struct ForeignType {
    pub name: String,
    pub underlying: Option<Box<Type>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Basic(BasicKind),
    /// Declared type; `pkg` is empty for the package under analysis.
    Named {
        pkg: String,
        name: String,
    },
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(Option<u64>, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(ChanDir, Box<Type>),
    Func(Signature),
    Struct(Vec<StructField>),
    Interface(Vec<InterfaceMethod>),
    /// Multi-value call result; empty for calls without results.
    Tuple(Vec<Type>),
    Foreign(ForeignType),
    Invalid,
}

impl Type {
    pub fn basic(kind: BasicKind) -> Type {
        Type::Basic(kind)
    }

    pub fn named(pkg: impl Into<String>, name: impl Into<String>) -> Type {
        Type::Named {
            pkg: pkg.into(),
            name: name.into(),
        }
    }

    pub fn pointer(elem: Type) -> Type {
        Type::Pointer(Box::new(elem))
    }

    pub fn slice(elem: Type) -> Type {
        Type::Slice(Box::new(elem))
    }

    pub fn error() -> Type {
        Type::named("", "error")
    }

    pub fn empty_interface() -> Type {
        Type::Interface(Vec::new())
    }

    /// Placeholder for the cgo symbol `sym`.
    pub fn foreign(sym: &str) -> Type {
        Type::Foreign(ForeignType {
            name: format!("{sym}__ctype"),
            underlying: None,
        })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Type::Foreign(_))
    }

    /// Fully known checker type, neither invalid nor a placeholder.
    pub fn is_concrete(&self) -> bool {
        !self.is_invalid() && !self.is_placeholder()
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Basic(kind) if kind.is_untyped())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::Basic(BasicKind::UntypedNil))
    }

    pub fn as_basic(&self) -> Option<BasicKind> {
        match self {
            Type::Basic(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Type an untyped constant takes when nothing else constrains it.
    pub fn default_type(&self) -> Type {
        match self {
            Type::Basic(kind) => Type::Basic(match kind {
                BasicKind::UntypedBool => BasicKind::Bool,
                BasicKind::UntypedInt => BasicKind::Int,
                BasicKind::UntypedRune => BasicKind::Int32,
                BasicKind::UntypedFloat => BasicKind::Float64,
                BasicKind::UntypedComplex => BasicKind::Complex128,
                BasicKind::UntypedString => BasicKind::String,
                other => *other,
            }),
            other => other.clone(),
        }
    }

    /// Wider of two untyped numeric kinds.
    pub fn join_untyped(a: BasicKind, b: BasicKind) -> BasicKind {
        if a.untyped_rank() >= b.untyped_rank() {
            a
        } else {
            b
        }
    }

    pub fn pointer_elem(&self) -> Option<&Type> {
        match self {
            Type::Pointer(elem) => Some(elem),
            _ => None,
        }
    }

    /// Base type name with pointer indirection trimmed.
    pub fn named_base(&self) -> Option<(&str, &str)> {
        match self {
            Type::Named { pkg, name } => Some((pkg, name)),
            Type::Pointer(elem) => match elem.as_ref() {
                Type::Named { pkg, name } => Some((pkg, name)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn tuple_len(&self) -> usize {
        match self {
            Type::Tuple(items) => items.len(),
            _ => 1,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(kind) => write!(f, "{}", kind.name()),
            Type::Named { pkg, name } if pkg.is_empty() => write!(f, "{name}"),
            Type::Named { pkg, name } => {
                let short = pkg.rsplit('/').next().unwrap_or(pkg);
                write!(f, "{short}.{name}")
            }
            Type::Pointer(elem) => write!(f, "*{elem}"),
            Type::Slice(elem) => write!(f, "[]{elem}"),
            Type::Array(Some(len), elem) => write!(f, "[{len}]{elem}"),
            Type::Array(None, elem) => write!(f, "[?]{elem}"),
            Type::Map(key, value) => write!(f, "map[{key}]{value}"),
            Type::Chan(ChanDir::Both, elem) => write!(f, "chan {elem}"),
            Type::Chan(ChanDir::Send, elem) => write!(f, "chan<- {elem}"),
            Type::Chan(ChanDir::Recv, elem) => write!(f, "<-chan {elem}"),
            Type::Func(sig) => {
                write!(f, "func")?;
                write_signature(f, sig)
            }
            Type::Struct(fields) => {
                write!(f, "struct{{")?;
                for (idx, field) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, "; ")?;
                    }
                    if field.embedded {
                        write!(f, "{}", field.ty)?;
                    } else {
                        write!(f, "{} {}", field.name, field.ty)?;
                    }
                }
                write!(f, "}}")
            }
            Type::Interface(methods) if methods.is_empty() => write!(f, "interface{{}}"),
            Type::Interface(methods) => {
                write!(f, "interface{{")?;
                for (idx, method) in methods.iter().enumerate() {
                    if idx > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", method.name)?;
                    write_signature(f, &method.sig)?;
                }
                write!(f, "}}")
            }
            Type::Tuple(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            Type::Foreign(foreign) => write!(f, "{}", foreign.name),
            Type::Invalid => write!(f, "invalid type"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Type]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_signature(f: &mut fmt::Formatter<'_>, sig: &Signature) -> fmt::Result {
    write!(f, "(")?;
    for (idx, param) in sig.params.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        match param {
            Type::Slice(elem) if sig.variadic && idx + 1 == sig.params.len() => {
                write!(f, "...{elem}")?
            }
            other => write!(f, "{other}")?,
        }
    }
    write!(f, ")")?;
    match sig.results.len() {
        0 => Ok(()),
        1 => write!(f, " {}", sig.results[0]),
        _ => {
            write!(f, " (")?;
            write_list(f, &sig.results)?;
            write!(f, ")")
        }
    }
}
