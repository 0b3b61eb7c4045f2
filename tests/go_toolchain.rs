//! Runs the greeter fixture through a real Go installation.
//!
//! Skipped when `go` is not on PATH.

mod common;

use std::process::Command;

use common::{fixture, read};
use goahead::{Config, GoToolchain, Runner, Toolchain};

fn go_available() -> bool {
    Command::new("go")
        .arg("version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
fn test_greeter_with_real_go() {
    if !go_available() {
        eprintln!("skipping: go toolchain not found");
        return;
    }

    let temp = fixture("greeter");
    let report = Runner::new(Config::default())
        .run(temp.path())
        .expect("run should succeed");
    assert!(!report.has_errors(), "{:?}", report.diagnostics);

    let main = read(temp.path(), "main.go");
    assert!(main.contains("greeting = \"Hello, GOPHER\""), "{}", main);
    assert!(main.contains("total := 42"), "{}", main);
    assert!(main.contains("status := \"DETECTED\""), "{}", main);
    assert!(main.contains("mime := \"text/plain; charset=utf-8\""), "{}", main);
    assert!(main.contains("joined := \"a+b+c\""), "{}", main);
    assert!(main.contains("version := \"v0\""), "{}", main);
    assert!(read(temp.path(), "internal/store/store.go").contains("return \"v1\""));
}

#[test]
fn test_std_package_lookup_with_real_go() {
    if !go_available() {
        eprintln!("skipping: go toolchain not found");
        return;
    }

    let temp = fixture("greeter");
    let go = GoToolchain::default();
    let found = go
        .resolve_package(temp.path(), "base64")
        .expect("go list should run");
    assert_eq!(found.as_deref(), Some("encoding/base64"));

    let missing = go
        .resolve_package(temp.path(), "definitelynotapackage")
        .expect("go list should run");
    assert_eq!(missing, None);
}
