//! End-to-end injection of helper code after interface declarations.

mod common;

use common::{fixture, helper, read, write, Scripted};
use goahead::{Config, RunReport, Runner, Severity};
use std::path::Path;

fn run(root: &Path) -> RunReport {
    Runner::new(Config::default())
        .with_toolchain(Box::new(Scripted::new()))
        .run(root)
        .expect("run should succeed")
}

#[test]
fn test_decoder_receives_closure_once() {
    let temp = fixture("decoder");

    let first = run(temp.path());
    let once = read(temp.path(), "codec.go");
    let second = run(temp.path());
    let twice = read(temp.path(), "codec.go");

    assert_eq!(once, twice);
    assert_eq!(twice.matches("func Decode(").count(), 1);
    assert_eq!(twice.matches("func xorByte(").count(), 1);
    assert_eq!(twice.matches("const key").count(), 1);
    assert!(!twice.contains("Unrelated"));

    assert_eq!(twice.matches("//:inject:Decode\ntype Decoder interface {").count(), 1);
    assert!(twice.contains("\tDecode(s string) string\n}\n\n// goahead:inject-begin Decode\n"));
    assert!(twice.contains("// End of goahead generated code.\n\nfunc main() {"));

    assert_eq!(first.regions_injected, 1);
    assert_eq!(first.files_rewritten, 1);
    assert_eq!(second.files_rewritten, 0);
    assert!(!second.has_errors());
}

#[test]
fn test_declarations_already_present_are_skipped() {
    let temp = fixture("decoder");
    let codec = read(temp.path(), "codec.go");
    let with_key = codec.replace("func main() {", "const key = 0x2a\n\nfunc main() {");
    write(temp.path(), "codec.go", &with_key);

    run(temp.path());
    let text = read(temp.path(), "codec.go");
    assert_eq!(text.matches("const key").count(), 1);
    assert_eq!(text.matches("func xorByte(").count(), 1);
}

#[test]
fn test_imports_follow_the_injected_code() {
    let temp = tempfile::TempDir::new().unwrap();
    write(
        temp.path(),
        "helpers.go",
        &helper(
            "main",
            "import \"strings\"\n\nfunc Shout(s string) string {\n\treturn strings.ToUpper(s)\n}\n",
        ),
    );
    write(
        temp.path(),
        "voice.go",
        "package main\n\n//:inject:Shout\ntype Voice interface {\n\tShout(s string) string\n}\n",
    );

    let report = run(temp.path());
    let text = read(temp.path(), "voice.go");
    assert!(text.starts_with("package main\n\nimport \"strings\"\n"), "{}", text);
    assert!(text.contains("func Shout(s string) string {"));
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    run(temp.path());
    assert_eq!(read(temp.path(), "voice.go"), text);
}

#[test]
fn test_marker_on_non_interface_is_an_error() {
    let temp = fixture("decoder");
    let original = "package main\n\n//:inject:Decode\ntype Decoder struct{}\n";
    write(temp.path(), "codec.go", original);

    let report = run(temp.path());
    assert!(report.has_errors());
    assert_eq!(read(temp.path(), "codec.go"), original);

    let error = report
        .diagnostics
        .iter()
        .find(|d| d.severity == Severity::Error)
        .unwrap();
    assert_eq!(error.line, 3);
    assert!(error.message.contains("interface"));
}

#[test]
fn test_method_missing_from_interface_is_an_error() {
    let temp = fixture("decoder");
    let original =
        "package main\n\n//:inject:Decode\ntype Decoder interface {\n\tDecodeAll(s []string) []string\n}\n";
    write(temp.path(), "codec.go", original);

    let report = run(temp.path());
    assert_eq!(read(temp.path(), "codec.go"), original);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error && d.message.contains("DecodeAll")));
}

#[test]
fn test_removed_marker_drops_region() {
    let temp = fixture("decoder");
    run(temp.path());
    let injected = read(temp.path(), "codec.go");
    assert!(injected.contains("func xorByte("));

    write(
        temp.path(),
        "codec.go",
        &injected.replace("//:inject:Decode\n", ""),
    );
    run(temp.path());
    let text = read(temp.path(), "codec.go");
    assert!(!text.contains("func xorByte("));
    assert!(!text.contains("goahead:inject-begin"));
}
