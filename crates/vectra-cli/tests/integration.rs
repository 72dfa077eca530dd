//! Integration tests for vectra-cli.
//!
//! Invokes the built binary against the bundled demo and temporary patch files.

use std::process::Command;

use tempfile::TempDir;

/// Helper to get the path to the `vectra` binary built by cargo.
fn vectra_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vectra"))
}

fn stdout_of(args: &[&str]) -> String {
    let output = vectra_bin()
        .args(args)
        .output()
        .expect("failed to run vectra");
    assert!(
        output.status.success(),
        "vectra {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

const SMALL_PATCH: &str = r#"
name = "small"

[engine]
max_voices = 2
output_channels = 1
make_event_input = false

[[graph.nodes]]
name = "dc"
class = "constant"
attrs = { value = 0.5 }

[[graph.outputs]]
proc = "dc"
output = "out"
channel = 0

[[graph.signals]]
proc = "dc"
output = "out"
alias = "level"
length = 64
"#;

// ---------------------------------------------------------------------------
// vectra classes
// ---------------------------------------------------------------------------

#[test]
fn cli_classes_lists_builtins() {
    let stdout = stdout_of(&["classes"]);
    assert!(stdout.contains("Processor Classes"));
    for class in ["pass", "constant", "gain", "add", "multiply", "divide", "sine", "patcher"] {
        assert!(stdout.contains(class), "missing class {class}");
    }
}

#[test]
fn cli_classes_filters_by_category() {
    let stdout = stdout_of(&["classes", "--category", "routing"]);
    assert!(stdout.contains("patcher"));
    assert!(!stdout.contains("multiply"));
}

#[test]
fn cli_classes_rejects_unknown_category() {
    let output = vectra_bin()
        .args(["classes", "--category", "reverb"])
        .output()
        .expect("failed to run vectra");
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// vectra info
// ---------------------------------------------------------------------------

#[test]
fn cli_info_on_demo() {
    let stdout = stdout_of(&["info", "--connections"]);
    assert!(stdout.contains("Patch:       demo"));
    assert!(stdout.contains("the_midi_inputs"));
    assert!(stdout.contains("voices#3/osc"));
    assert!(stdout.contains("voicePitch"));
    assert!(stdout.contains("->"));
}

#[test]
fn cli_info_reports_bad_patch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[[graph.nodes]]\nname = \"x\"\nclass = \"saw\"\n").unwrap();

    let output = vectra_bin().arg("info").arg(&path).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("saw"));
}

// ---------------------------------------------------------------------------
// vectra run
// ---------------------------------------------------------------------------

#[test]
fn cli_run_patch_with_uneven_host_sizes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("small.toml");
    std::fs::write(&path, SMALL_PATCH).unwrap();

    let stdout = stdout_of(&[
        "run",
        path.to_str().unwrap(),
        "--host-sizes",
        "17,100,64",
        "--seconds",
        "0.1",
    ]);
    assert!(stdout.contains("Rendered:    4800 samples"));
    assert!(stdout.contains("Peak out 0:  0.5000"));
    assert!(stdout.contains("Starvation:  0"));
    assert!(stdout.contains("level"));
}

#[test]
fn cli_run_demo_with_notes() {
    let stdout = stdout_of(&["run", "--notes", "60,64", "--seconds", "0.05", "--stats"]);
    assert!(stdout.contains("Faults:      0"));
    assert!(!stdout.contains("Peak out 0:  0.0000"));
}
