use super::*;

fn parse(source: &str) -> File {
    let mut ids = NodeIds::default();
    match parse_file(PathBuf::from("test.go"), source, &mut ids) {
        Ok(file) => file,
        Err(errors) => panic!("parse failed: {:?}", errors.errors),
    }
}

fn func_body<'a>(file: &'a File, name: &str) -> &'a [Stmt] {
    file.decls
        .iter()
        .find_map(|decl| match decl {
            Decl::Func(func) if func.name.name == name => func.body.as_ref(),
            _ => None,
        })
        .map(|body| body.stmts.as_slice())
        .unwrap_or_else(|| panic!("missing function {name}"))
}

#[test]
fn parses_package_and_grouped_imports() {
    let file = parse(
        r#"package main

import (
    "fmt"
    str "strings"
    _ "embed"
)
"#,
    );
    assert_eq!(file.package.name, "main");
    let names: Vec<_> = file.imports.iter().map(|i| i.local_name()).collect();
    assert_eq!(names, vec!["fmt", "str", "_"]);
}

#[test]
fn attaches_preamble_comment_to_import_c() {
    let file = parse(
        r#"package main

// #include <stdio.h>
// #cgo LDFLAGS: -lm
import "C"

import "fmt"
"#,
    );
    assert!(file.imports_c());
    let doc = file.imports[0].doc.as_deref().unwrap_or_default();
    assert!(doc.contains("#include <stdio.h>"));
    assert!(doc.contains("#cgo LDFLAGS"));
    assert!(file.imports[1].doc.is_none());
}

#[test]
fn detached_comment_is_not_a_preamble() {
    let file = parse("package main\n\n// unrelated\n\nimport \"C\"\n");
    assert!(file.imports[0].doc.is_none());
}

#[test]
fn groups_named_parameters() {
    let file = parse("package p\nfunc f(a, b int, s ...string) (n int, err error) { return }\n");
    let Decl::Func(func) = &file.decls[0] else {
        panic!("expected func");
    };
    assert_eq!(func.ty.params.len(), 2);
    assert_eq!(func.ty.params[0].names.len(), 2);
    assert_eq!(func.ty.param_count(), 3);
    assert!(func.ty.is_variadic());
    assert_eq!(func.ty.result_count(), 2);
}

#[test]
fn parses_method_receivers() {
    let file = parse("package p\ntype T struct{ x int }\nfunc (t *T) Get() int { return t.x }\n");
    let Decl::Func(func) = &file.decls[1] else {
        panic!("expected method");
    };
    assert_eq!(func.qualified_name(), "T_Get");
    assert!(func.has_pointer_receiver());
}

#[test]
fn composite_literal_not_taken_in_if_header() {
    let file = parse(
        "package p\ntype T struct{}\nfunc f(x T) {\n\tif x == (T{}) {\n\t}\n\tfor i := range xs {\n\t\t_ = i\n\t}\n}\n",
    );
    let body = func_body(&file, "f");
    assert!(matches!(body[0], Stmt::If(_)));
    assert!(matches!(body[1], Stmt::Range(_)));
}

#[test]
fn distinguishes_switch_forms() {
    let file = parse(
        r#"package p
func f(v any) {
    switch x := v.(type) {
    case int, string:
        _ = x
    default:
    }
    switch n := 3; n {
    case 1:
        fallthrough
    case 2:
    }
}
"#,
    );
    let body = func_body(&file, "f");
    let Stmt::TypeSwitch(ts) = &body[0] else {
        panic!("expected type switch");
    };
    assert_eq!(ts.binding.as_ref().map(|b| b.name.as_str()), Some("x"));
    assert_eq!(ts.clauses.len(), 2);
    let Stmt::Switch(sw) = &body[1] else {
        panic!("expected switch");
    };
    assert!(sw.init.is_some());
    assert!(sw.tag.is_some());
}

#[test]
fn parses_concurrency_statements() {
    let file = parse(
        r#"package p
func f(ch chan int) {
    go func() { ch <- 1 }()
    defer close(ch)
    select {
    case v := <-ch:
        _ = v
    case ch <- 2:
    default:
    }
}
"#,
    );
    let body = func_body(&file, "f");
    assert!(matches!(body[0], Stmt::Go(_)));
    assert!(matches!(body[1], Stmt::Defer(_)));
    let Stmt::Select(select) = &body[2] else {
        panic!("expected select");
    };
    assert_eq!(select.clauses.len(), 3);
    assert!(matches!(
        select.clauses[1].comm.as_deref(),
        Some(Stmt::Send(_))
    ));
}

#[test]
fn parses_nested_elided_composite_literals() {
    let file = parse("package p\nvar m = map[string][]int{\"a\": {1, 2}, \"b\": nil}\n");
    let Decl::Gen(decl) = &file.decls[0] else {
        panic!("expected var");
    };
    let Spec::Value(spec) = &decl.specs[0] else {
        panic!("expected value spec");
    };
    let Expr::CompositeLit { elts, .. } = &spec.values[0] else {
        panic!("expected composite literal");
    };
    let Expr::KeyValue { value, .. } = &elts[0] else {
        panic!("expected key/value");
    };
    assert!(matches!(**value, Expr::CompositeLit { ty: None, .. }));
}

#[test]
fn binary_precedence() {
    let file = parse("package p\nvar x = 1 + 2*3 == 7 && true\n");
    let Decl::Gen(decl) = &file.decls[0] else {
        panic!("expected var");
    };
    let Spec::Value(spec) = &decl.specs[0] else {
        panic!("expected value spec");
    };
    assert!(matches!(
        spec.values[0],
        Expr::Binary {
            op: BinaryOp::LogAnd,
            ..
        }
    ));
}

#[test]
fn node_ids_are_unique() {
    let mut ids = NodeIds::default();
    let a = parse_file(PathBuf::from("a.go"), "package p\nvar x = 1\n", &mut ids).unwrap();
    let b = parse_file(PathBuf::from("b.go"), "package p\nvar y = 2\n", &mut ids).unwrap();
    assert_ne!(a.id, b.id);
    assert_ne!(a.decls[0].id(), b.decls[0].id());
}

#[test]
fn collects_multiple_syntax_errors() {
    let mut ids = NodeIds::default();
    let err = parse_file(
        PathBuf::from("bad.go"),
        "package p\nfunc f() { x := }\nfunc g() { return ) }\n",
        &mut ids,
    )
    .unwrap_err();
    assert!(err.errors.len() >= 2);
}

#[test]
fn parses_standalone_types() {
    let mut ids = NodeIds::default();
    let ty = parse_type_source("func(a ...any) (int, error)", &mut ids).unwrap();
    let TypeExpr::Func(func) = ty else {
        panic!("expected func type");
    };
    assert!(func.is_variadic());
    assert_eq!(func.result_count(), 2);
    assert!(parse_type_source("map[string] )", &mut ids).is_err());
}
