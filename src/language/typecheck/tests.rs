use super::*;
use crate::language::{
    ast::{Expr, LitKind, NodeIds},
    parser::parse_file,
    types::BasicKind,
    visit::{walk_files, Node, Visitor},
};

struct NoImports;

impl Importer for NoImports {
    fn import(&mut self, path: &str) -> Result<Package, ImportError> {
        Err(ImportError::NotFound {
            path: path.to_string(),
            reason: "no packages configured".into(),
        })
    }
}

struct FmtOnly;

impl Importer for FmtOnly {
    fn import(&mut self, path: &str) -> Result<Package, ImportError> {
        if path != "fmt" {
            return NoImports.import(path);
        }
        let mut package = Package {
            path: "fmt".into(),
            name: "fmt".into(),
            ..Package::default()
        };
        package.members.insert(
            "Println".into(),
            Member {
                kind: ObjKind::Func,
                ty: Type::Func(Signature {
                    params: vec![Type::slice(Type::empty_interface())],
                    results: Vec::new(),
                    variadic: true,
                }),
            },
        );
        Ok(package)
    }
}

fn check_with(source: &str, importer: &mut dyn Importer) -> (Vec<File>, CheckResult) {
    let mut ids = NodeIds::default();
    let file = match parse_file(PathBuf::from("main.go"), source, &mut ids) {
        Ok(file) => file,
        Err(errors) => panic!("parse failed: {:?}", errors.errors),
    };
    let files = vec![file];
    let result = check_package(&files, importer);
    (files, result)
}

fn check(source: &str) -> (Vec<File>, CheckResult) {
    check_with(source, &mut NoImports)
}

struct Collect<F> {
    pred: F,
    ids: Vec<NodeId>,
}

impl<'a, F: FnMut(&Expr) -> bool> Visitor<'a> for Collect<F> {
    fn enter(&mut self, node: Node<'a>) -> bool {
        if let Node::Expr(expr) = node {
            if (self.pred)(expr) {
                self.ids.push(expr.id());
            }
        }
        true
    }
}

fn find_exprs(files: &[File], pred: impl FnMut(&Expr) -> bool) -> Vec<NodeId> {
    let mut collect = Collect {
        pred,
        ids: Vec::new(),
    };
    walk_files(&mut collect, files);
    collect.ids
}

fn int_lit(value: &'static str) -> impl FnMut(&Expr) -> bool {
    move |expr| matches!(expr, Expr::BasicLit { kind: LitKind::Int, value: v, .. } if v == value)
}

fn object_type(result: &CheckResult, name: &str) -> Type {
    result
        .info
        .objects
        .iter()
        .find(|object| object.name == name && object.def.is_some())
        .map(|object| object.ty.clone())
        .unwrap_or_else(|| panic!("no object {name}"))
}

fn codes_of(result: &CheckResult) -> Vec<String> {
    result
        .errors
        .iter()
        .filter_map(|err| err.code.clone())
        .collect()
}

#[test]
fn untyped_literals_take_context_type() {
    let (files, result) = check(
        r#"package main

func main() {
    x := 1
    z := x + 2
    var f float64 = 3
    _, _ = z, f
}
"#,
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(object_type(&result, "x"), Type::Basic(BasicKind::Int));
    assert_eq!(object_type(&result, "z"), Type::Basic(BasicKind::Int));

    let two = find_exprs(&files, int_lit("2"));
    assert_eq!(result.info.type_of(two[0]), Some(&Type::Basic(BasicKind::Int)));
    let three = find_exprs(&files, int_lit("3"));
    assert_eq!(
        result.info.type_of(three[0]),
        Some(&Type::Basic(BasicKind::Float64))
    );
}

#[test]
fn constants_fold_and_enumerate_with_iota() {
    let (_, result) = check(
        r#"package main

const big = 1 << 10

const (
    Red = iota
    Green
    Blue
)

func main() {}
"#,
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let value = |name: &str| {
        result
            .info
            .objects
            .iter()
            .find(|object| object.name == name)
            .and_then(|object| object.value)
    };
    assert_eq!(value("big"), Some(1024));
    assert_eq!(value("Red"), Some(0));
    assert_eq!(value("Green"), Some(1));
    assert_eq!(value("Blue"), Some(2));
    assert_eq!(object_type(&result, "Blue"), Type::Basic(BasicKind::UntypedInt));
}

#[test]
fn reports_undefined_names() {
    let (_, result) = check(
        r#"package main

func main() {
    y := undefinedThing
    _ = y
}
"#,
    );
    assert_eq!(codes_of(&result), vec![codes::UNDEFINED.to_string()]);
    assert!(result.errors[0].message.contains("undefinedThing"));
}

#[test]
fn unused_locals_are_kept_apart() {
    let (_, result) = check("package main\n\nfunc main() {\n    x := 1\n}\n");
    assert!(result.errors.is_empty());
    assert_eq!(result.unused.len(), 1);
    assert_eq!(result.unused[0].message, "declared and not used: x");
    assert_eq!(result.unused[0].code.as_deref(), Some(codes::UNUSED));
}

#[test]
fn selections_walk_embedded_fields() {
    let (files, result) = check(
        r#"package main

type Inner struct{ n int }

func (i *Inner) Get() int { return i.n }

type Outer struct {
    Inner
    name string
}

func main() {
    o := Outer{}
    v := o.Get()
    w := o.n
    _, _ = v, w
}
"#,
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let get = find_exprs(&files, |expr| {
        matches!(expr, Expr::Selector { base, sel, .. }
            if sel.name == "Get" && base.as_ident().is_some_and(|ident| ident.name == "o"))
    });
    let selection = &result.info.selections[&get[0]];
    assert_eq!(selection.kind, SelectionKind::Method);
    assert_eq!(selection.declaring.as_deref(), Some("Inner"));
    assert_eq!(selection.recv, Type::named("", "Outer"));

    let field = find_exprs(&files, |expr| {
        matches!(expr, Expr::Selector { base, sel, .. }
            if sel.name == "n" && base.as_ident().is_some_and(|ident| ident.name == "o"))
    });
    let selection = &result.info.selections[&field[0]];
    assert_eq!(selection.kind, SelectionKind::Field);
    assert_eq!(selection.declaring.as_deref(), Some("Inner"));
    assert_eq!(object_type(&result, "v"), Type::Basic(BasicKind::Int));
}

#[test]
fn unpacks_comma_ok_and_multi_value_calls() {
    let (_, result) = check(
        r#"package main

func pair() (int, string) { return 1, "a" }

func main() {
    m := map[string]int{"a": 1}
    v, ok := m["a"]
    n, s := pair()
    _, _, _, _ = v, ok, n, s
}
"#,
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(object_type(&result, "v"), Type::Basic(BasicKind::Int));
    assert_eq!(object_type(&result, "ok"), Type::Basic(BasicKind::Bool));
    assert_eq!(object_type(&result, "n"), Type::Basic(BasicKind::Int));
    assert_eq!(object_type(&result, "s"), Type::Basic(BasicKind::String));
}

#[test]
fn cgo_selectors_are_left_unresolved() {
    let (files, result) = check(
        r#"package main

import "C"

func main() {
    x := C.int(5)
    C.puts(nil)
    _ = x
}
"#,
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let selector = find_exprs(&files, |expr| {
        matches!(expr, Expr::Selector { sel, .. } if sel.name == "int")
    });
    let selection = &result.info.selections[&selector[0]];
    assert_eq!(selection.kind, SelectionKind::PackageMember);
    assert_eq!(selection.pkg.as_deref(), Some("C"));
    assert!(!result.info.is_resolved(selector[0]));

    let calls = find_exprs(&files, |expr| matches!(expr, Expr::Call { .. }));
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|id| !result.info.is_resolved(*id)));
    assert_eq!(object_type(&result, "x"), Type::Invalid);
}

#[test]
fn failed_imports_become_opaque() {
    let (files, result) = check(
        r#"package main

import "github.com/acme/lib"

func main() {
    v := lib.Make(1)
    _ = v
}
"#,
    );
    assert_eq!(codes_of(&result), vec![codes::IMPORT.to_string()]);
    assert_eq!(result.import_errors.len(), 1);
    assert_eq!(result.import_errors[0].0, "github.com/acme/lib");

    let call = find_exprs(&files, |expr| matches!(expr, Expr::Call { .. }));
    assert!(result.info.opaque.contains(&call[0]));
}

#[test]
fn imported_members_are_typed() {
    let (files, result) = check_with(
        r#"package main

import "fmt"

func main() {
    fmt.Println("hi", 1)
}
"#,
        &mut FmtOnly,
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let one = find_exprs(&files, int_lit("1"));
    assert_eq!(result.info.type_of(one[0]), Some(&Type::Basic(BasicKind::Int)));

    let selector = find_exprs(&files, |expr| matches!(expr, Expr::Selector { .. }));
    let selection = &result.info.selections[&selector[0]];
    assert_eq!(selection.pkg.as_deref(), Some("fmt"));

    let call = find_exprs(&files, |expr| matches!(expr, Expr::Call { .. }));
    assert_eq!(result.info.type_of(call[0]), Some(&Type::Tuple(Vec::new())));
}

#[test]
fn reports_initialization_cycles() {
    let (_, result) = check("package main\n\nvar a = b\nvar b = a\n\nfunc main() {}\n");
    assert!(codes_of(&result).contains(&codes::CYCLE.to_string()));
}

#[test]
fn reports_arity_and_mismatch() {
    let (_, result) = check(
        r#"package main

func add(a, b int) int { return a + b }

func main() {
    _ = add(1)
}
"#,
    );
    assert_eq!(codes_of(&result), vec![codes::ARITY.to_string()]);

    let (_, result) = check("package main\n\nfunc main() {\n    var s string = 5\n    _ = s\n}\n");
    assert_eq!(codes_of(&result), vec![codes::MISMATCH.to_string()]);
}

#[test]
fn type_switch_binding_takes_case_type() {
    let (files, result) = check(
        r#"package main

func describe(v any) int {
    switch x := v.(type) {
    case int:
        return x
    case string:
        return len(x)
    }
    return 0
}

func main() {}
"#,
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let uses = find_exprs(&files, |expr| matches!(expr, Expr::Ident(ident) if ident.name == "x"));
    assert_eq!(uses.len(), 2);
    assert_eq!(result.info.type_of(uses[0]), Some(&Type::Basic(BasicKind::Int)));
    assert_eq!(result.info.type_of(uses[1]), Some(&Type::Basic(BasicKind::String)));
}
