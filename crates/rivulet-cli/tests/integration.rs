//! Integration tests for the `rivulet` binary.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use rivulet_io::read_wav_info;

/// Helper to get the path to the `rivulet` binary built by cargo.
fn rivulet_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rivulet"))
}

/// A tone rendered into a 16-bit WAV file.
fn write_setup(dir: &Path, out: &Path) -> std::path::PathBuf {
    let setup = format!(
        r#"
[engine]
sample_rate = 8000
buffersize = 400

[[input]]
kind = "tone"
frequency = 250
channels = 2
length = 1.0

[[output]]
kind = "wav"
path = '{}'
channels = 2

[[chain]]
name = "main"
input = 1
output = 1
operators = [{{ kind = "amplify", params = [50] }}, {{ kind = "pan", params = [0] }}]
"#,
        out.display()
    );
    let path = dir.join("setup.toml");
    std::fs::write(&path, setup).unwrap();
    path
}

// ---------------------------------------------------------------------------
// rivulet operators
// ---------------------------------------------------------------------------

#[test]
fn operators_lists_registry() {
    let output = rivulet_bin().arg("operators").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Available Operators"));
    for id in ["amplify", "channel_copy", "pan"] {
        assert!(stdout.contains(id), "listing should contain '{id}'");
    }
    assert!(stdout.contains("gain-%"));
}

#[test]
fn unknown_operator_fails() {
    let output = rivulet_bin().args(["operators", "fuzz"]).output().unwrap();
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// rivulet info
// ---------------------------------------------------------------------------

#[test]
fn info_describes_setup_without_creating_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.wav");
    let setup = write_setup(dir.path(), &out);

    let output = rivulet_bin().arg("info").arg(&setup).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("8000 Hz"));
    assert!(stdout.contains("-> simple"));
    assert!(stdout.contains("main: input 1 -> output 1"));
    assert!(stdout.contains("gain-%=50"));
    assert!(!out.exists());
}

#[test]
fn info_reports_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let setup = dir.path().join("bad.toml");
    std::fs::write(&setup, "[[chain]]\nname = \"x\"\ninput = 2\n").unwrap();
    let output = rivulet_bin().arg("info").arg(&setup).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("chain 'x'"), "stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// rivulet run
// ---------------------------------------------------------------------------

#[test]
fn run_renders_the_setup() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.wav");
    let setup = write_setup(dir.path(), &out);

    let output = rivulet_bin()
        .args(["run", "--no-progress"])
        .arg(&setup)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let info = read_wav_info(&out).unwrap();
    assert_eq!(info.channels, 2);
    assert_eq!(info.sample_rate, 8000);
    assert_eq!(info.frames, 8000);
}

#[test]
fn run_overrides_length_and_mixmode() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.wav");
    let setup = write_setup(dir.path(), &out);

    let output = rivulet_bin()
        .args(["run", "--no-progress", "--length", "0.25", "--mixmode", "normal"])
        .arg(&setup)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("normal mode"), "stdout: {stdout}");
    assert_eq!(read_wav_info(&out).unwrap().frames, 2000);
}

#[test]
fn run_rejects_unknown_mixmode() {
    let dir = tempfile::tempdir().unwrap();
    let setup = write_setup(dir.path(), &dir.path().join("out.wav"));
    let output = rivulet_bin()
        .args(["run", "--mixmode", "turbo"])
        .arg(&setup)
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn run_with_unwritable_output_fails() {
    let dir = tempfile::tempdir().unwrap();
    let setup = write_setup(dir.path(), &dir.path().join("missing").join("out.wav"));
    let output = rivulet_bin()
        .args(["run", "--no-progress"])
        .arg(&setup)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("output 1"), "stderr: {stderr}");
}

#[test]
fn interactive_run_follows_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.wav");
    let setup = write_setup(dir.path(), &out);

    let mut child = rivulet_bin()
        .args(["run", "--no-progress", "--interactive"])
        .arg(&setup)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, "# comments are skipped").unwrap();
        writeln!(stdin, "setpos 0.5").unwrap();
        writeln!(stdin, "start").unwrap();
        writeln!(stdin, "bogus").unwrap();
    }
    // Closing stdin sends `exit` once the batch has been read.
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bogus"), "stderr: {stderr}");
}
