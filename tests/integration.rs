#![allow(clippy::missing_assert_message, clippy::missing_docs_in_private_items, reason = "binary tests")]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// The binary, run in `dir` with no inherited settings.
fn linemode_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_linemode"));
    cmd.current_dir(dir).env_remove("WWW_CONFIG").env_remove("LINES");
    return cmd;
}

/// Run with `input` on standard input, closed afterwards.
fn run_with_input(mut cmd: Command, input: &str) -> Output {
    let mut child = cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped()).spawn().unwrap();
    child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
    return child.wait_with_output().unwrap();
}

/// Four linked documents in a fresh directory.
fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("home.txt"), "# Home\nSee [alpha](a.txt) or [beta](b.txt).\n").unwrap();
    std::fs::write(dir.path().join("a.txt"), "# Alpha\nBack [home](home.txt).\n").unwrap();
    std::fs::write(dir.path().join("b.txt"), "# Beta\nBack [home](home.txt).\n").unwrap();
    std::fs::write(dir.path().join("leaf.txt"), "# Leaf\nNothing here.\n").unwrap();
    return dir;
}

#[test]
fn follows_a_link_and_comes_back() {
    let dir = site();
    let mut cmd = linemode_cmd(dir.path());
    cmd.arg("home.txt");
    let output = run_with_input(cmd, "1\nback\nquit\n");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("See alpha[1] or beta[2]."));
    assert!(stdout.contains("Back home[1]."));
    assert!(stdout.contains("1-2, Quit, or Help: "));
    assert!(stdout.contains("1, Back, Next, Quit, or Help: "));
}

#[test]
fn recall_out_of_range_is_reported() {
    let dir = site();
    let mut cmd = linemode_cmd(dir.path());
    cmd.arg("home.txt");
    let output = run_with_input(cmd, "2\nrecall 3\nrecall\n");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("There is no document number 3 in the recall list."));
    assert!(stdout.contains("R  1)   Home"));
    assert!(stdout.contains("R  2)   Beta"));
}

#[test]
fn save_refuses_to_clobber_unless_forced() {
    let dir = site();
    std::fs::write(dir.path().join("saved.txt"), "old\n").unwrap();
    let mut cmd = linemode_cmd(dir.path());
    cmd.arg("a.txt");
    let output = run_with_input(cmd, "> saved.txt\n");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("saved.txt: File exists"));
    assert_eq!(std::fs::read_to_string(dir.path().join("saved.txt")).unwrap(), "old\n");

    let mut cmd = linemode_cmd(dir.path());
    cmd.arg("a.txt");
    let output = run_with_input(cmd, ">! saved.txt\n");
    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(dir.path().join("saved.txt")).unwrap(), "# Alpha\nBack home[1].\n");
}

#[test]
fn guests_cannot_save() {
    let dir = site();
    let mut cmd = linemode_cmd(dir.path());
    cmd.args(["--host", "far.example.org", "a.txt"]);
    let output = run_with_input(cmd, "> saved.txt\nq\n");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Bad command (> saved.txt)"));
    assert!(stdout.contains("Please type \"quit\" in full"));
    assert!(!dir.path().join("saved.txt").exists());
}

#[test]
fn dead_end_exits_cleanly_without_input() {
    let dir = site();
    let mut cmd = linemode_cmd(dir.path());
    cmd.arg("leaf.txt");
    let output = run_with_input(cmd, "");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Nothing here."));
}

#[test]
fn missing_first_document_exits_with_two() {
    let dir = site();
    let mut cmd = linemode_cmd(dir.path());
    cmd.arg("missing.txt");
    let output = run_with_input(cmd, "");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_config_exits_with_one() {
    let dir = site();
    let output = linemode_cmd(dir.path()).args(["--config", "nowhere.toml", "-n", "leaf.txt"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("config not found"));
}

#[test]
fn config_file_sets_the_reference_heading() {
    let dir = site();
    std::fs::write(dir.path().join(".linemode.toml"), "ref_heading = \"Links:\"\n").unwrap();
    let output = linemode_cmd(dir.path()).args(["--listrefs", "home.txt"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("\nLinks:\n[1] "));
}

#[test]
fn non_interactive_writes_the_whole_document() {
    let dir = site();
    let output = linemode_cmd(dir.path()).args(["-n", "home.txt"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "# Home\nSee alpha[1] or beta[2].\n");
}

#[test]
fn listrefs_appends_the_reference_list() {
    let dir = site();
    let output = linemode_cmd(dir.path()).args(["--listrefs", "--refhead", "Refs", "home.txt"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let alpha = dir.path().join("a.txt");
    assert!(stdout.contains(&format!("\nRefs\n[1] {}\n", alpha.display())));
}

#[test]
fn output_flag_writes_to_the_named_file() {
    let dir = site();
    let output = linemode_cmd(dir.path()).args(["-o", "copy.txt", "--source", "a.txt"]).output().unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert_eq!(std::fs::read_to_string(dir.path().join("copy.txt")).unwrap(), "# Alpha\nBack [home](home.txt).\n");
}

#[test]
fn unwritable_output_exits_with_three() {
    let dir = site();
    let output = linemode_cmd(dir.path()).args(["-o", "no/such/dir/out.txt", "a.txt"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn filter_renders_standard_input() {
    let dir = site();
    let mut cmd = linemode_cmd(dir.path());
    cmd.args(["--filter", "--no-anchors"]);
    let output = run_with_input(cmd, "# T\nsee [x](y.txt)\n");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "# T\nsee x\n");
}
