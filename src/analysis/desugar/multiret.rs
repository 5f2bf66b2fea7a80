use crate::language::{
    ast::{Decl, File, FuncDecl, NodeId, NodeIds},
    typecheck::{ObjKind, Object, ScopeLevel, TypeInfo},
    types::Type,
};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Names the results of every function declaration that returns two or
/// more values. Returns those declarations.
pub fn name_results(files: &mut [File], info: &mut TypeInfo, ids: &mut NodeIds) -> Vec<NodeId> {
    let mut funcs = Vec::new();
    let mut named = 0;
    for file in files.iter_mut() {
        for decl in &mut file.decls {
            let Decl::Func(func) = decl else {
                continue;
            };
            if func.ty.result_count() < 2 {
                continue;
            }
            named += name_func_results(func, info, ids);
            funcs.push(func.id);
        }
    }
    debug!(funcs = funcs.len(), named, "multi-value results named");
    funcs
}

fn name_func_results(func: &mut FuncDecl, info: &mut TypeInfo, ids: &mut NodeIds) -> usize {
    let mut taken: HashSet<String> = func
        .ty
        .params
        .iter()
        .chain(&func.ty.results)
        .chain(&func.recv)
        .flat_map(|field| field.names.iter().map(|name| name.name.clone()))
        .collect();

    let mut named = 0;
    for (idx, field) in func.ty.results.iter_mut().enumerate() {
        if !field.names.is_empty() {
            continue;
        }
        let mut name = format!("_r{idx}");
        while taken.contains(&name) {
            name.push('_');
        }
        taken.insert(name.clone());

        let ident = ids.ident(name.clone(), field.span);
        let ty = info
            .type_of(field.ty.id())
            .cloned()
            .unwrap_or(Type::Invalid);
        let obj = info.add_object(Object {
            name: name.clone(),
            kind: ObjKind::Var,
            ty: ty.clone(),
            level: ScopeLevel::Local,
            def: Some(ident.id),
            pkg: None,
            value: None,
        });
        info.defs.insert(ident.id, obj);
        if !ty.is_invalid() {
            info.record_type(ident.id, ty);
        }
        trace!(func = %func.name.name, result = %name, "named result");
        field.names.push(ident);
        named += 1;
    }
    named
}
