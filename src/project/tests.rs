use super::*;
use crate::error::Error;
use std::{fs, path::Path};

fn write(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(name), source).expect("write source");
}

#[test]
fn loads_unit_without_test_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "a.go",
        "package demo\n\n// #include <stdlib.h>\nimport \"C\"\n\nimport \"fmt\"\n\nfunc A() { fmt.Println(C.rand()) }\n",
    );
    write(dir.path(), "b.go", "package demo\n\nimport f \"fmt\"\n\nfunc B() { f.Println() }\n");
    write(dir.path(), "b_test.go", "package demo\n\nfunc TestB() {}\n");
    write(dir.path(), "x.go", "package demo_test\n\nfunc External() {}\n");
    write(dir.path(), "notes.txt", "not go");

    let unit = PackageUnit::load(dir.path(), None).expect("load");
    assert_eq!(unit.name, "demo");
    assert_eq!(unit.emit_name(), "demo");
    assert_eq!(unit.files.len(), 2);
    let paths: Vec<_> = unit.imports.iter().map(|import| import.path.as_str()).collect();
    assert_eq!(paths, vec!["C", "fmt", "fmt"]);
    assert_eq!(unit.imports[2].alias.as_deref(), Some("f"));
    assert_eq!(unit.cgo_files, vec![dir.path().join("a.go")]);
    assert!(unit.has_cgo());
}

#[test]
fn rename_hint_overrides_emit_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "main.go", "package main\n\nfunc main() {}\n");
    let unit = PackageUnit::load(dir.path(), Some("app".into())).expect("load");
    assert_eq!(unit.emit_name(), "app");
    assert!(!unit.has_cgo());
}

#[test]
fn syntax_errors_are_fatal_and_collected_per_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.go", "package demo\n\nfunc A( {\n");
    write(dir.path(), "b.go", "package demo\n\nvar = 3\n");
    write(dir.path(), "c.go", "package demo\n\nfunc C() {}\n");
    match PackageUnit::load(dir.path(), None) {
        Err(Error::Syntax(files)) => {
            assert_eq!(files.len(), 2);
            assert!(files.iter().all(|file| !file.errors.is_empty()));
        }
        other => panic!("expected syntax errors, got {other:?}"),
    }
}

#[test]
fn rejects_mixed_packages_and_empty_dirs() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(matches!(
        PackageUnit::load(dir.path(), None),
        Err(Error::NoSources(_))
    ));

    write(dir.path(), "a.go", "package one\n");
    write(dir.path(), "b.go", "package two\n");
    match PackageUnit::load(dir.path(), None) {
        Err(Error::MixedPackages { first, second, .. }) => {
            assert_eq!(first, "one");
            assert_eq!(second, "two");
        }
        other => panic!("expected mixed packages, got {other:?}"),
    }

    let file = dir.path().join("a.go");
    assert!(matches!(
        PackageUnit::load(&file, None),
        Err(Error::NotADirectory(_))
    ));
}

#[test]
fn parses_configuration() {
    let config = Config::parse(
        Path::new("gofront.toml"),
        r#"
[package]
rename = "mypkg"

[imports]
intrinsic = ["runtime"]

[imports.packages."fmt".members]
Println = "func(a ...any) (int, error)"

[cgo]
mode = "preprocess"
go = "/usr/local/go/bin/go"
"#,
    )
    .expect("config");
    assert_eq!(config.package.rename.as_deref(), Some("mypkg"));
    assert_eq!(config.intrinsic_paths(), vec!["runtime".to_string()]);
    assert!(config.is_intrinsic("runtime"));
    assert!(!config.is_intrinsic("sync/atomic"));
    assert_eq!(config.cgo.mode, CgoMode::Preprocess);
    assert_eq!(config.cgo.objdir, Path::new("_obj"));
    let fmt = &config.imports.packages["fmt"];
    assert_eq!(fmt.members["Println"], "func(a ...any) (int, error)");
}

#[test]
fn defaults_apply_without_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::find(dir.path()).expect("config");
    assert_eq!(config.cgo.mode, CgoMode::Fake);
    assert_eq!(config.cgo.go, "go");
    assert!(config.is_intrinsic("sync/atomic"));
    assert!(config.is_intrinsic("unsafe"));
    assert_eq!(config.objdir(dir.path()), dir.path().join("_obj"));
}

#[test]
fn unknown_keys_are_config_errors() {
    let result = Config::parse(Path::new("gofront.toml"), "[cgo]\nflavor = \"x\"\n");
    assert!(matches!(result, Err(Error::Config { .. })));
}
