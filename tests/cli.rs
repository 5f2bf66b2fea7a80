use std::{env, fs, path::PathBuf, process::Command};

fn bin_path() -> String {
    if let Ok(path) = env::var("CARGO_BIN_EXE_gofront") {
        return path;
    }
    let mut fallback =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("manifest dir not set by cargo"));
    fallback.push("target");
    fallback.push("debug");
    fallback.push("gofront");
    if cfg!(windows) {
        fallback.set_extension("exe");
    }
    if fallback.exists() {
        return fallback.to_string_lossy().into_owned();
    }
    panic!(
        "binary path not set by cargo test and fallback {:?} not found",
        fallback
    );
}

fn package(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, source) in files {
        fs::write(dir.path().join(name), source).expect("write source");
    }
    dir
}

#[test]
fn prints_callees_before_callers() {
    let dir = package(&[
        ("a.go", "package main\n\nfunc A() { B() }\n"),
        ("b.go", "package main\n\nfunc B() {}\n"),
    ]);
    let output = Command::new(bin_path())
        .arg(dir.path())
        .env_remove("GOFRONT_LOG")
        .output()
        .expect("run gofront");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("package main"), "{stdout}");
    assert!(stdout.contains("emission order:\n  B\n  A\n"), "{stdout}");
}

#[test]
fn rename_flag_changes_the_emitted_package() {
    let dir = package(&[("main.go", "package main\n\nfunc main() {}\n")]);
    let output = Command::new(bin_path())
        .arg("--rename")
        .arg("demo")
        .arg(dir.path())
        .output()
        .expect("run gofront");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("package demo\n"));
}

#[test]
fn syntax_errors_fail_the_run() {
    let dir = package(&[("main.go", "package main\n\nfunc main( {\n")]);
    let output = Command::new(bin_path())
        .arg(dir.path())
        .output()
        .expect("run gofront");
    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stderr.is_empty());
    assert!(output.stdout.is_empty());
}

#[test]
fn library_api_matches_the_binary() {
    let dir = package(&[(
        "main.go",
        "package main\n\nfunc helper() int { return 1 }\n\nfunc main() { _ = helper() }\n",
    )]);
    let analysis =
        gofront::Analysis::run(dir.path(), &gofront::AnalysisOptions::default()).expect("analysis");
    assert_eq!(analysis.emission_order(), ["helper", "main"]);
    assert!(analysis.diagnostics.is_empty());
}

#[test]
fn missing_directory_argument_prints_usage() {
    let output = Command::new(bin_path()).output().expect("run gofront");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage: gofront"));
}
