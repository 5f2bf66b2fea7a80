use super::*;
use crate::{
    error::Error,
    language::{
        ast::{Decl, Expr, FuncDecl, Stmt},
        typecheck::{Importer, Object},
        types::{BasicKind, Type},
    },
};
use cursor::{ExprKind, NodeKind};
use desugar::{ChanOpKind, GoTarget};
use std::fs;

fn analyze_with(sources: &[(&str, &str)], config: Config) -> Analysis {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, source) in sources {
        fs::write(dir.path().join(name), source).expect("write source");
    }
    let unit = PackageUnit::load(dir.path(), None).expect("load unit");
    Analysis::from_unit(unit, config)
}

fn analyze(source: &str) -> Analysis {
    analyze_with(&[("main.go", source)], Config::default())
}

fn func<'a>(analysis: &'a Analysis, name: &str) -> &'a FuncDecl {
    analysis
        .unit
        .files
        .iter()
        .flat_map(|file| &file.decls)
        .find_map(|decl| match decl {
            Decl::Func(func) if func.name.name == name => Some(func),
            _ => None,
        })
        .expect("function")
}

fn body<'a>(analysis: &'a Analysis, name: &str) -> &'a [Stmt] {
    &func(analysis, name).body.as_ref().expect("body").stmts
}

fn local<'a>(analysis: &'a Analysis, name: &str) -> &'a Object {
    analysis
        .info
        .objects
        .iter()
        .find(|object| object.name == name && object.def.is_some())
        .expect("object")
}

fn position(order: &[String], name: &str) -> usize {
    order
        .iter()
        .position(|entry| entry == name)
        .unwrap_or_else(|| panic!("{name} missing from {order:?}"))
}

#[test]
fn callee_is_emitted_before_caller() {
    let analysis = analyze("package main\n\nfunc A() { B() }\n\nfunc B() {}\n");
    assert_eq!(analysis.emission_order(), ["B", "A"]);
    assert_eq!(analysis.graph.callers_of("B"), vec!["A"]);
    assert_eq!(analysis.diagnostics.count(DiagnosticKind::CallCycle), 0);
}

#[test]
fn mutual_recursion_keeps_each_function_once() {
    let source = "package main\n\nfunc A(n int) { if n > 0 { B(n - 1) } }\n\nfunc B(n int) { if n > 0 { A(n - 1) } }\n";
    let first = analyze(source);
    let second = analyze(source);
    assert_eq!(first.emission_order(), ["B", "A"]);
    assert_eq!(first.emission_order(), second.emission_order());
    assert_eq!(first.diagnostics.count(DiagnosticKind::CallCycle), 1);
}

#[test]
fn order_covers_every_declaration_and_respects_edges() {
    let analysis = analyze(
        r#"package main

type Point struct{ X, Y int }

func (p *Point) Len() int { return norm(p.X, p.Y) }

func norm(x, y int) int { return x*x + y*y }

func helper() {}

func main() {
    p := &Point{X: 1}
    _ = p.Len()
}

func unused() { helper() }
"#,
    );
    let order = analysis.emission_order();
    let mut sorted = order.to_vec();
    sorted.sort();
    assert_eq!(sorted, ["Point_Len", "helper", "main", "norm", "unused"]);

    for (callee, caller) in analysis.graph.edges() {
        if analysis.decls.funcs.contains_key(callee) && analysis.decls.funcs.contains_key(caller) {
            assert!(
                position(order, callee) < position(order, caller),
                "{callee} should precede {caller} in {order:?}"
            );
        }
    }
    assert!(analysis.graph.callees_of("main").contains(&"Point_Len"));
}

#[test]
fn init_functions_get_unique_names_and_duplicates_are_reported() {
    let analysis = analyze(
        "package main\n\nfunc init() {}\n\nfunc init() {}\n\nfunc f() {}\n\nfunc f() {}\n",
    );
    assert_eq!(analysis.decls.inits, ["init", "init_1"]);
    assert_eq!(
        analysis
            .diagnostics
            .count(DiagnosticKind::DuplicateDeclaration),
        1
    );
    let mut order = analysis.emission_order().to_vec();
    order.sort();
    assert_eq!(order, ["f", "init", "init_1"]);
}

#[test]
fn hoists_address_of_composite_literal_before_the_call() {
    let analysis = analyze(
        r#"package main

type Point struct{ X, Y int }

func use(p *Point) {}

func main() {
    use(&Point{X: 1, Y: 2})
}
"#,
    );
    let stmt = &body(&analysis, "main")[0];
    let temps = &analysis.worklists.temps[&stmt.id()];
    assert_eq!(temps.len(), 1);
    assert_eq!(temps[0].name, "_tmp0");
    assert_eq!(temps[0].ty, Type::pointer(Type::named("", "Point")));
    assert!(matches!(temps[0].value, Expr::Unary { .. }));

    let Stmt::Expr(call) = stmt else {
        panic!("expected call statement");
    };
    let Expr::Call { args, .. } = &call.expr else {
        panic!("expected call");
    };
    let Expr::Ident(reference) = &args[0] else {
        panic!("argument was not replaced");
    };
    assert_eq!(reference.name, "_tmp0");
    assert_eq!(analysis.info.type_of(reference.id), Some(&temps[0].ty));
    assert_eq!(
        analysis.cursor.enclosing_stmt(reference.id),
        Some(stmt.id())
    );
}

#[test]
fn loop_header_sites_are_keyed_to_the_loop() {
    let analysis = analyze(
        r#"package main

type T struct{ N int }

func ok(t *T) bool { return t.N > 0 }

func main() {
    for ok(&T{N: 1}) {
        break
    }
}
"#,
    );
    let stmt = &body(&analysis, "main")[0];
    assert!(matches!(stmt, Stmt::For(_)));
    let temps = &analysis.worklists.temps[&stmt.id()];
    assert_eq!(temps.len(), 1);
    assert_eq!(temps[0].stmt, stmt.id());
}

#[test]
fn package_level_composite_addresses_stay_in_place() {
    let analysis = analyze(
        "package main\n\ntype T struct{ N int }\n\nvar global = &T{N: 1}\n\nfunc main() { _ = global }\n",
    );
    assert!(analysis.worklists.temps.is_empty());
}

#[test]
fn cgo_values_take_placeholder_types() {
    let analysis = analyze(
        r#"package main

// #include <stdio.h>
import "C"

func main() {
    v := C.some_value
    w := v
    C.puts(nil)
    _ = w
}
"#,
    );
    let expected = Type::foreign("some_value");
    assert_eq!(local(&analysis, "v").ty, expected);
    assert_eq!(local(&analysis, "w").ty, expected);
    let v_def = local(&analysis, "v").def.expect("def");
    assert_eq!(analysis.info.type_of(v_def), Some(&expected));
    assert!(analysis.reconcile.seeded >= 3);
    assert_eq!(analysis.diagnostics.count(DiagnosticKind::UnresolvedType), 0);
    assert_eq!(analysis.preamble, "#include <stdio.h>\n");
}

#[test]
fn cgo_type_spellings_are_seeded_and_declared_names_follow() {
    let analysis = analyze(
        r#"package main

import "C"

func take(p *C.char) {}

func main() {
    var n C.int
    s := C.struct_point{}
    _, _ = n, s
}
"#,
    );
    assert_eq!(local(&analysis, "n").ty, Type::foreign("int"));
    assert_eq!(local(&analysis, "s").ty, Type::foreign("struct_point"));
    assert_eq!(local(&analysis, "p").ty, Type::pointer(Type::foreign("char")));
    assert_eq!(analysis.diagnostics.count(DiagnosticKind::UntypedDeclaration), 0);
}

#[test]
fn propagation_and_seeding_reach_a_fixed_point() {
    let mut analysis = analyze(
        r#"package main

import "C"

func main() {
    a := C.value
    b := a
    c := b
    var n int = 3
    _, _ = c, n
}
"#,
    );
    assert!(analysis.reconcile.rounds >= 1);
    let again = cgo::reconcile::propagate(&analysis.unit.files, &mut analysis.info);
    assert_eq!(again.changed, 0);
    let seeded = cgo::reconcile::seed(&analysis.unit.files, &mut analysis.info, &analysis.cursor);
    assert_eq!(seeded, 0);
    assert_eq!(local(&analysis, "n").ty, Type::Basic(BasicKind::Int));
    assert_eq!(local(&analysis, "c").ty, Type::foreign("value"));
}

#[test]
fn untyped_declarations_are_reported() {
    let analysis = analyze(
        "package main\n\nfunc main() {\n    var x Missing\n    _ = x\n}\n",
    );
    assert_eq!(analysis.diagnostics.count(DiagnosticKind::UntypedDeclaration), 1);
    assert!(analysis.diagnostics.count(DiagnosticKind::Checker) >= 1);
}

#[test]
fn cleaner_strips_cgo_artifacts_once() {
    let mut analysis = analyze(
        r#"package main

import "syscall"

var _cgo_foo = 1

var __cgofn__cgo_bar = 2

const _Ciconst_SIZE = 4

var errno syscall.Errno

var _ = 0

var _Cfpvar_fp_handler int

func _Cgo_ptr(p int) int { return p }

func _cgoCheckPointer(p int) {}

func main() {
    n := _Ciconst_SIZE
    h := _Cgo_ptr(_Cfpvar_fp_handler)
    _, _ = n, h
}
"#,
    );
    let report = analysis.clean;
    assert_eq!(report.removed_funcs, 2);
    assert_eq!(report.removed_specs, 6);
    assert_eq!(report.removed_decls, 6);
    assert_eq!(report.unwrapped_ptrs, 1);
    assert_eq!(report.renamed_idents, 1);
    assert_eq!(analysis.unit.files[0].decls.len(), 1);

    let stmts = body(&analysis, "main");
    let Stmt::Assign(first) = &stmts[0] else {
        panic!("expected assignment");
    };
    assert!(matches!(&first.rhs[0], Expr::Ident(ident) if ident.name == "SIZE"));
    let Stmt::Assign(second) = &stmts[1] else {
        panic!("expected assignment");
    };
    assert!(matches!(&second.rhs[0], Expr::Ident(ident) if ident.name == "handler"));
    assert!(analysis.cursor.get(second.rhs[0].id()).is_some());

    let again = cgo::clean(
        &mut analysis.unit.files,
        &mut analysis.info,
        &mut analysis.unit.ids,
    );
    assert!(again.is_empty(), "{again:?}");
}

#[test]
fn goroutine_literal_gets_an_argument_structure() {
    let analysis = analyze(
        r#"package main

func use(x int) {}

func worker(n int) {}

func main() {
    x := 1
    go func() { use(x) }()
    go worker(x)
}
"#,
    );
    let goroutines = &analysis.worklists.goroutines;
    assert_eq!(goroutines.len(), 2);
    let literal = &goroutines[0];
    assert!(matches!(literal.target, GoTarget::Literal(_)));
    assert!(literal.needs_args);
    let args = &analysis.worklists.closure_args[&literal.stmt];
    let names: Vec<_> = args.captures.iter().map(|capture| capture.name.as_str()).collect();
    assert_eq!(names, ["x"]);
    assert_eq!(args.captures[0].ty, Type::Basic(BasicKind::Int));

    let named = &goroutines[1];
    assert_eq!(named.target, GoTarget::Named("worker".into()));
    assert!(named.needs_args);
    assert_eq!(analysis.worklists.closure_args[&named.stmt].args.len(), 1);

    assert_eq!(analysis.worklists.closures.len(), 1);
    let closure = &analysis.worklists.closures[0];
    assert_eq!(closure.enclosing.as_deref(), Some("main"));
    assert_eq!(closure.captures, args.captures);
}

#[test]
fn goroutine_literal_without_inputs_needs_no_argument_structure() {
    let analysis = analyze(
        r#"package main

func main() {
    go func() { println(1) }()
    go func(n int) { println(n) }(2)
}
"#,
    );
    let goroutines = &analysis.worklists.goroutines;
    assert_eq!(goroutines.len(), 2);
    assert!(matches!(goroutines[0].target, GoTarget::Literal(_)));
    assert!(!goroutines[0].needs_args);
    assert!(!analysis.worklists.closure_args.contains_key(&goroutines[0].stmt));

    assert!(goroutines[1].needs_args);
    let args = &analysis.worklists.closure_args[&goroutines[1].stmt];
    assert!(args.captures.is_empty());
    assert_eq!(args.args.len(), 1);
    assert_eq!(analysis.worklists.closure_args.len(), 1);
}

#[test]
fn interface_method_calls_add_no_graph_nodes() {
    let analysis = analyze(
        r#"package main

type Shape interface{ Area() int }

type Square struct{ N int }

func (s Square) Area() int { return s.N * s.N }

func measure(s Shape) int { return s.Area() }

func main() { _ = measure(Square{N: 2}) }
"#,
    );
    assert!(!analysis.graph.contains("Shape_Area"));
    assert!(analysis.graph.callees_of("measure").is_empty());
    assert!(analysis.graph.callees_of("main").contains(&"Square_Area"));
    assert!(analysis
        .graph
        .nodes()
        .iter()
        .all(|node| analysis.decls.funcs.contains_key(node)));
}

#[test]
fn closure_locals_are_not_captures() {
    let analysis = analyze(
        r#"package main

var counter int

func main() {
    base := 10
    add := func(n int) int {
        total := base + n + counter
        return total
    }
    _ = add(1)
}
"#,
    );
    let closure = &analysis.worklists.closures[0];
    let names: Vec<_> = closure.captures.iter().map(|capture| capture.name.as_str()).collect();
    assert_eq!(names, ["base"]);
}

#[test]
fn multi_value_results_get_positional_names() {
    let analysis = analyze(
        r#"package main

func split(_r0 int, _r1_ string) (int, string, error) {
    return _r0, _r1_, nil
}

func pair() (a, b int) { return 1, 2 }

func single() int { return 1 }
"#,
    );
    let split = func(&analysis, "split");
    let names: Vec<_> = split
        .ty
        .results
        .iter()
        .flat_map(|field| field.names.iter().map(|name| name.name.as_str()))
        .collect();
    assert_eq!(names, ["_r0_", "_r1", "_r2"]);
    let first = &split.ty.results[0].names[0];
    assert_eq!(analysis.info.type_of(first.id), Some(&Type::Basic(BasicKind::Int)));

    let multi = &analysis.worklists.multi_returns;
    assert_eq!(multi.len(), 2);
    assert!(multi.contains(&split.id));
    assert!(multi.contains(&func(&analysis, "pair").id));
    assert_eq!(func(&analysis, "pair").ty.results[0].names[0].name, "a");
}

#[test]
fn assignments_are_paired_both_ways() {
    let analysis = analyze(
        r#"package main

func two() (int, int) { return 1, 2 }

func main() {
    a, b := 1, 2
    c, d := two()
    _, _, _, _ = a, b, c, d
}
"#,
    );
    let stmts = body(&analysis, "main");
    let Stmt::Assign(first) = &stmts[0] else {
        panic!("expected assignment");
    };
    let pairs = &analysis.worklists.kv_pairs;
    assert_eq!(pairs.rhs_of(first.lhs[1].id()), Some(first.rhs[1].id()));

    let Stmt::Assign(second) = &stmts[1] else {
        panic!("expected assignment");
    };
    let call = second.rhs[0].id();
    assert_eq!(pairs.lhs_of(call), [second.lhs[0].id(), second.lhs[1].id()]);
    assert_eq!(pairs.rhs_of(second.lhs[1].id()), Some(call));
}

#[test]
fn channel_operations_are_harvested() {
    let analysis = analyze(
        r#"package main

func main() {
    ch := make(chan int, 1)
    ch <- 1
    v := <-ch
    _ = v
}
"#,
    );
    let ops = &analysis.worklists.chan_ops;
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].kind, ChanOpKind::Send);
    assert_eq!(ops[1].kind, ChanOpKind::Recv);
    assert!(ops
        .iter()
        .all(|op| op.elem == Some(Type::Basic(BasicKind::Int))));
}

#[test]
fn defer_hosts_without_results_need_a_wrapper() {
    let analysis = analyze(
        r#"package main

func cleanup() {}

func run() {
    defer cleanup()
    defer cleanup()
}

func compute() int {
    defer cleanup()
    return 1
}
"#,
    );
    assert_eq!(analysis.worklists.defers.len(), 3);
    let run = &analysis.worklists.defer_hosts[&func(&analysis, "run").id];
    assert_eq!(run.defers, 2);
    assert!(run.needs_exit_wrapper);
    assert_eq!(run.name.as_deref(), Some("run"));
    let compute = &analysis.worklists.defer_hosts[&func(&analysis, "compute").id];
    assert!(!compute.needs_exit_wrapper);
}

#[test]
fn only_package_level_values_are_globals() {
    let analysis = analyze(
        "package main\n\nvar a, b = 1, 2\n\nconst limit = 3\n\ntype T int\n\nfunc main() {\n    var local = 4\n    _ = local\n}\n",
    );
    let globals = &analysis.worklists.globals;
    assert_eq!(globals.len(), 2);
    assert_eq!(globals[0].names, ["a", "b"]);
    assert_eq!(globals[0].kind, desugar::GlobalKind::Var);
    assert_eq!(globals[1].names, ["limit"]);
    assert_eq!(globals[1].kind, desugar::GlobalKind::Const);
}

#[test]
fn unused_locals_are_not_diagnostics() {
    let analysis = analyze("package main\n\nfunc main() {\n    x := 1\n}\n");
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn imports_resolve_through_the_manifest() {
    let config = Config::parse(
        Path::new("gofront.toml"),
        r#"
[imports.packages."fmt".members]
Println = "func(a ...any) (int, error)"
Stringer = "type interface { String() string }"
"#,
    )
    .expect("config");
    let analysis = analyze_with(
        &[(
            "main.go",
            r#"package main

import (
    "fmt"
    "runtime"
    "example.com/missing"
)

func main() {
    n, err := fmt.Println("hi")
    runtime.Gosched()
    missing.Do()
    _, _ = n, err
}
"#,
        )],
        config,
    );
    assert_eq!(analysis.dependencies, ["fmt", "example.com/missing"]);
    assert_eq!(analysis.import_aliases["runtime"], "runtime");
    assert_eq!(local(&analysis, "n").ty, Type::Basic(BasicKind::Int));
    assert_eq!(local(&analysis, "err").ty, Type::error());
    assert_eq!(analysis.diagnostics.count(DiagnosticKind::Import), 1);
}

#[test]
fn manifest_members_are_typed() {
    let config = Config::parse(
        Path::new("gofront.toml"),
        r#"
[imports.packages."strings"]
name = "strings"
[imports.packages."strings".members]
Builder = "type struct { buf []byte }"
Repeat = "func(s string, n int) string"
Reader = "type interface { Read(p []byte) (int, error) }"
Pieces = "var []string"
Max = "const int"
"#,
    )
    .expect("config");
    let mut importer = importer::ManifestImporter::from_config(&config);
    let package = importer.import("strings").expect("package");
    assert_eq!(package.name, "strings");
    assert_eq!(package.members["Builder"].ty, Type::named("strings", "Builder"));
    assert_eq!(
        package.members["Pieces"].ty,
        Type::slice(Type::Basic(BasicKind::String))
    );
    assert!(package.types["Reader"].methods.methods.contains_key("Read"));
    assert!(matches!(package.members["Repeat"].ty, Type::Func(_)));

    assert!(importer.import("unknown").is_err());
    let mut intrinsic = importer::IntrinsicAware::new(importer, vec!["runtime".into()]);
    assert!(intrinsic.import("runtime").expect("opaque").opaque);
}

#[test]
fn manifest_structs_mix_embedded_and_named_fields() {
    let config = Config::parse(
        Path::new("gofront.toml"),
        r#"
[imports.packages."shapes".members]
Base = "type struct { ID int }"
Box = "type struct { Base; W, H float64 }"
"#,
    )
    .expect("config");
    let mut importer = importer::ManifestImporter::from_config(&config);
    let package = importer.import("shapes").expect("package");
    let Type::Struct(fields) = &package.types["Box"].underlying else {
        panic!("expected a struct");
    };
    let names: Vec<_> = fields.iter().map(|field| field.name.as_str()).collect();
    assert_eq!(names, ["Base", "W", "H"]);
    assert!(fields[0].embedded);
    assert_eq!(fields[0].ty, Type::named("shapes", "Base"));
    assert!(!fields[1].embedded);
    assert_eq!(fields[2].ty, Type::Basic(BasicKind::Float64));
}

#[test]
fn malformed_manifest_members_fail_the_import() {
    let config = Config::parse(
        Path::new("gofront.toml"),
        "[imports.packages.\"bad\".members]\nThing = \"struct of nothing\"\n",
    )
    .expect("config");
    let mut importer = importer::ManifestImporter::from_config(&config);
    assert!(matches!(
        importer.import("bad"),
        Err(crate::language::typecheck::ImportError::BadMember { .. })
    ));
}

#[test]
fn preamble_drops_cgo_directives() {
    let analysis = analyze(
        "package main\n\n// #cgo LDFLAGS: -lm\n// #include <math.h>\nimport \"C\"\n\nfunc main() {}\n",
    );
    assert_eq!(analysis.preamble, "#include <math.h>\n");
}

#[test]
fn failed_preprocessing_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("main.go"),
        "package main\n\nimport \"C\"\n\nfunc main() { C.puts(nil) }\n",
    )
    .expect("write source");
    fs::write(
        dir.path().join("gofront.toml"),
        "[cgo]\nmode = \"preprocess\"\ngo = \"/nonexistent/gofront-test-go\"\n",
    )
    .expect("write config");
    let result = Analysis::run(dir.path(), &AnalysisOptions::default());
    assert!(matches!(result, Err(Error::Preprocess { .. })));
}

#[test]
fn rename_option_wins_over_configuration() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("main.go"), "package main\n\nfunc main() {}\n").expect("write");
    fs::write(dir.path().join("gofront.toml"), "[package]\nrename = \"fromconfig\"\n")
        .expect("write config");
    let configured = Analysis::run(dir.path(), &AnalysisOptions::default()).expect("analysis");
    assert_eq!(configured.unit.emit_name(), "fromconfig");
    let options = AnalysisOptions {
        rename: Some("fromflag".into()),
        config: None,
    };
    let renamed = Analysis::run(dir.path(), &options).expect("analysis");
    assert_eq!(renamed.unit.emit_name(), "fromflag");
}

#[test]
fn cursor_links_parents_and_siblings() {
    let analysis = analyze("package main\n\nfunc f(a, b int) {}\n\nfunc main() {\n    f(1, 2)\n}\n");
    let stmt = &body(&analysis, "main")[0];
    let Stmt::Expr(expr_stmt) = stmt else {
        panic!("expected expression statement");
    };
    let Expr::Call { id, func, args, .. } = &expr_stmt.expr else {
        panic!("expected call");
    };
    let cursor = &analysis.cursor;
    assert_eq!(cursor.kind(*id), Some(NodeKind::Expr(ExprKind::Call)));
    assert_eq!(cursor.parent(func.id()), Some(*id));
    assert_eq!(cursor.get(func.id()).map(|entry| entry.index), Some(0));
    assert_eq!(cursor.next_sibling(args[0].id()), Some(args[1].id()));
    assert_eq!(cursor.prev_sibling(args[0].id()), Some(func.id()));
    assert_eq!(cursor.prev_sibling(func.id()), None);
    assert_eq!(cursor.enclosing_stmt(args[1].id()), Some(stmt.id()));
    let file = analysis.unit.files[0].id;
    assert_eq!(cursor.ancestors(args[1].id()).last(), Some(file));
    assert_eq!(cursor.children(*id).len(), 3);
}
