use crate::{
    language::{
        ast::{Expr, Field, LitKind, NodeIds, TypeExpr},
        parser::parse_type_source,
        typecheck::{
            universe_type, ImportError, Importer, Member, MethodInfo, MethodSet, NamedInfo,
            ObjKind, Package,
        },
        types::{InterfaceMethod, Signature, StructField, Type},
    },
    project::{config::PackageManifest, Config, PackageUnit},
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Resolves imports from the `[imports.packages]` tables of the
/// configuration. Unknown paths are import errors.
#[derive(Debug, Default)]
pub struct ManifestImporter {
    packages: BTreeMap<String, PackageManifest>,
}

impl ManifestImporter {
    pub fn new(packages: BTreeMap<String, PackageManifest>) -> Self {
        Self { packages }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.imports.packages.clone())
    }
}

impl Importer for ManifestImporter {
    fn import(&mut self, path: &str) -> Result<Package, ImportError> {
        let Some(manifest) = self.packages.get(path) else {
            return Err(ImportError::NotFound {
                path: path.to_string(),
                reason: "package is not declared in the configuration".into(),
            });
        };
        build_package(path, manifest)
    }
}

/// Answers intrinsic paths with opaque packages and defers the rest.
pub struct IntrinsicAware<I> {
    inner: I,
    intrinsics: Vec<String>,
}

impl<I: Importer> IntrinsicAware<I> {
    pub fn new(inner: I, intrinsics: Vec<String>) -> Self {
        Self { inner, intrinsics }
    }
}

impl<I: Importer> Importer for IntrinsicAware<I> {
    fn import(&mut self, path: &str) -> Result<Package, ImportError> {
        if self.intrinsics.iter().any(|intrinsic| intrinsic == path) {
            debug!(path, "intrinsic import left opaque");
            return Ok(Package::opaque(path));
        }
        self.inner.import(path)
    }
}

/// Import paths that still need expanding: everything but `C` and the
/// intrinsics, deduplicated, in first-seen order.
pub fn dependency_paths(unit: &PackageUnit, config: &Config) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for import in &unit.imports {
        if import.path == "C" || config.is_intrinsic(&import.path) {
            continue;
        }
        if seen.insert(import.path.clone()) {
            out.push(import.path.clone());
        }
    }
    out
}

fn build_package(path: &str, manifest: &PackageManifest) -> Result<Package, ImportError> {
    let name = manifest
        .name
        .clone()
        .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(path).to_string());
    let local_types: BTreeSet<String> = manifest
        .members
        .iter()
        .filter(|(_, decl)| decl.trim_start().starts_with("type "))
        .map(|(member, _)| member.clone())
        .collect();
    let converter = Converter {
        path,
        local_types: &local_types,
    };

    let mut package = Package {
        path: path.to_string(),
        name,
        ..Package::default()
    };
    let mut ids = NodeIds::default();
    for (member, decl) in &manifest.members {
        let bad = |reason: String| ImportError::BadMember {
            path: path.to_string(),
            member: member.clone(),
            reason,
        };
        let decl = decl.trim();
        let (kind, source) = if decl.starts_with("func") {
            (ObjKind::Func, decl)
        } else if let Some(rest) = decl.strip_prefix("type ") {
            (ObjKind::TypeName, rest)
        } else if let Some(rest) = decl.strip_prefix("var ") {
            (ObjKind::Var, rest)
        } else if let Some(rest) = decl.strip_prefix("const ") {
            (ObjKind::Const, rest)
        } else {
            return Err(bad(format!("expected func, type, var or const, found `{decl}`")));
        };

        let expr = parse_type_source(source, &mut ids).map_err(|errs| {
            let message = errs
                .errors
                .first()
                .map(|err| err.message.clone())
                .unwrap_or_else(|| "invalid type".into());
            bad(message)
        })?;
        let ty = converter.convert(&expr).map_err(bad)?;

        let member_ty = match kind {
            ObjKind::TypeName => {
                let methods = match &ty {
                    Type::Interface(methods) => method_set(methods),
                    _ => MethodSet::default(),
                };
                package.types.insert(
                    member.clone(),
                    NamedInfo {
                        underlying: ty,
                        methods,
                    },
                );
                Type::named(path, member.clone())
            }
            ObjKind::Func if !matches!(ty, Type::Func(_)) => {
                return Err(bad("not a function signature".into()));
            }
            _ => ty,
        };
        package.members.insert(member.clone(), Member { kind, ty: member_ty });
    }
    debug!(path, members = package.members.len(), "imported package from manifest");
    Ok(package)
}

fn method_set(methods: &[InterfaceMethod]) -> MethodSet {
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

/// Turns manifest type syntax into checker types without a checker.
struct Converter<'a> {
    path: &'a str,
    local_types: &'a BTreeSet<String>,
}

impl Converter<'_> {
    fn convert(&self, expr: &TypeExpr) -> Result<Type, String> {
        Ok(match expr {
            TypeExpr::Name { name } => {
                if self.local_types.contains(&name.name) {
                    Type::named(self.path, name.name.clone())
                } else {
                    universe_type(&name.name).ok_or_else(|| format!("unknown type {}", name.name))?
                }
            }
            TypeExpr::Qualified { .. } => {
                return Err(format!("qualified type {} is not supported", expr.spelling()));
            }
            TypeExpr::Pointer { elem, .. } => Type::pointer(self.convert(elem)?),
            TypeExpr::Slice { elem, .. } | TypeExpr::Ellipsis { elem, .. } => {
                Type::slice(self.convert(elem)?)
            }
            TypeExpr::Array { len, elem, .. } => {
                let len = match len.as_deref() {
                    Some(Expr::BasicLit {
                        kind: LitKind::Int,
                        value,
                        ..
                    }) => value
                        .parse::<u64>()
                        .map_err(|_| format!("invalid array length {value}"))?,
                    _ => return Err("array length must be a decimal literal".into()),
                };
                Type::Array(Some(len), Box::new(self.convert(elem)?))
            }
            TypeExpr::Map { key, value, .. } => {
                Type::Map(Box::new(self.convert(key)?), Box::new(self.convert(value)?))
            }
            TypeExpr::Chan { dir, elem, .. } => Type::Chan(*dir, Box::new(self.convert(elem)?)),
            TypeExpr::Func(func) => Type::Func(Signature {
                params: self.fields(&func.params)?,
                results: self.fields(&func.results)?,
                variadic: func.is_variadic(),
            }),
            TypeExpr::Struct { fields, .. } => {
                let mut out = Vec::new();
                for field in fields {
                    let ty = self.convert(&field.ty)?;
                    if field.names.is_empty() {
                        out.push(StructField {
                            name: field.ty.base_name().unwrap_or_default().to_string(),
                            ty,
                            embedded: true,
                        });
                        continue;
                    }
                    for name in &field.names {
                        out.push(StructField {
                            name: name.name.clone(),
                            ty: ty.clone(),
                            embedded: false,
                        });
                    }
                }
                Type::Struct(out)
            }
            TypeExpr::Interface { methods, .. } => {
                let mut out = Vec::new();
                for field in methods {
                    match (&field.ty, field.names.first()) {
                        (TypeExpr::Func(func), Some(name)) => out.push(InterfaceMethod {
                            name: name.name.clone(),
                            sig: Signature {
                                params: self.fields(&func.params)?,
                                results: self.fields(&func.results)?,
                                variadic: func.is_variadic(),
                            },
                        }),
                        (embedded, _) => match self.convert(embedded)? {
                            Type::Interface(inner) => out.extend(inner),
                            other => return Err(format!("cannot embed {other} in an interface")),
                        },
                    }
                }
                Type::Interface(out)
            }
        })
    }

    fn fields(&self, fields: &[Field]) -> Result<Vec<Type>, String> {
        let mut out = Vec::new();
        for field in fields {
            let ty = self.convert(&field.ty)?;
            for _ in 0..field.names.len().max(1) {
                out.push(ty.clone());
            }
        }
        Ok(out)
    }
}
