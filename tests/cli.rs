//! Drive the sigil binary through the filesystem: translate a source file,
//! then run the resulting program image.

use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn sigil() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sigil"))
}

#[test]
fn translate_then_run() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("prog.f");
    let program = dir.path().join("prog.json");
    let input = dir.path().join("input.txt");

    fs::write(&source, "1 2 + .").unwrap();
    fs::write(&input, "").unwrap();

    let status = sigil()
        .args(["translate"])
        .arg(&source)
        .arg(&program)
        .status()
        .unwrap();
    assert!(status.success());

    let output = sigil()
        .args(["run"])
        .arg(&program)
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout, "3\ninstructions: 4 ticks: 15\n");
}

#[test]
fn translation_errors_exit_nonzero_without_output() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("prog.f");
    let program = dir.path().join("prog.json");

    fs::write(&source, "1 bogus 2").unwrap();

    let output = sigil()
        .args(["translate"])
        .arg(&source)
        .arg(&program)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown word"));
    assert!(!program.exists());
}

#[test]
fn run_reports_warnings_but_exits_zero() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("prog.f");
    let program = dir.path().join("prog.json");
    let input = dir.path().join("input.txt");

    fs::write(&source, "input .").unwrap();
    fs::write(&input, "").unwrap();

    let status = sigil()
        .args(["translate"])
        .arg(&source)
        .arg(&program)
        .status()
        .unwrap();
    assert!(status.success());

    let output = sigil()
        .args(["run"])
        .arg(&program)
        .arg(&input)
        .output()
        .unwrap();

    // Exhausted input is an expected stop, not a process failure.
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("input buffer is empty"));
}
