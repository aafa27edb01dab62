//! Exit codes of the `depotkit` binary.
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Sheet built and saved |
//! | 1 | Malformed date, bad configuration, conflict or failed save |

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static N_TEST_DIR: AtomicUsize = AtomicUsize::new(0);

struct TestDir {
    path: PathBuf,
}

impl TestDir {
    fn new() -> Self {
        let n = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let n_seq = N_TEST_DIR.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "depotkit_cli_test_{}_{n}_{n_seq}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("create test dir");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn run_depotkit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_depotkit"))
        .args(args)
        .env_remove("DEPOTKIT_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute depotkit")
}

/// Config with an empty input root and outputs under `root/out`.
fn write_config(root: &Path, extra: &str) -> PathBuf {
    let path_cfg = root.join("depotkit.toml");
    let c_text = format!(
        "input_root = '{}'\nworkshops = [\"A\"]\n\n[plan]\noutput_path = '{}'\n{extra}",
        root.join("in").display(),
        root.join("out").join("plan.xlsx").display(),
    );
    std::fs::write(&path_cfg, c_text).expect("write config");
    path_cfg
}

#[test]
fn exit_1_on_malformed_date() {
    let dir = TestDir::new();
    let path_cfg = write_config(dir.path(), "");
    let output = run_depotkit(&[
        "plan",
        "--date",
        "2024-03-05",
        "--config",
        path_cfg.to_str().expect("utf8 path"),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let c_stderr = String::from_utf8_lossy(&output.stderr);
    assert!(c_stderr.contains("дд.мм.гггг"), "stderr: {c_stderr}");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn exit_1_on_invalid_config() {
    let dir = TestDir::new();
    let path_cfg = dir.path().join("bad.toml");
    std::fs::write(&path_cfg, "workshops = []\nunknown_key = 1\n").expect("write config");
    let output = run_depotkit(&[
        "qc",
        "--date",
        "05.03.2024",
        "--config",
        path_cfg.to_str().expect("utf8 path"),
    ]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn exit_0_builds_sheet_from_empty_input() {
    let dir = TestDir::new();
    let path_cfg = write_config(dir.path(), "");
    let output = run_depotkit(&[
        "plan",
        "--date",
        "05.03.2024",
        "--config",
        path_cfg.to_str().expect("utf8 path"),
    ]);

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let c_stdout = String::from_utf8_lossy(&output.stdout);
    assert!(c_stdout.contains("plan.xlsx"), "stdout: {c_stdout}");
    assert!(c_stdout.contains("sheet=05.03"), "stdout: {c_stdout}");
    assert!(dir.path().join("out").join("plan.xlsx").is_file());
}

#[test]
fn exit_1_on_conflict_under_error_policy() {
    let dir = TestDir::new();
    let path_cfg = write_config(dir.path(), "conflict_policy = \"error\"\n");
    let c_cfg = path_cfg.to_str().expect("utf8 path");
    let args = ["plan", "--date", "05.03.2024", "--config", c_cfg];

    assert_eq!(run_depotkit(&args).status.code(), Some(0));
    assert_eq!(run_depotkit(&args).status.code(), Some(1));
}

#[test]
fn config_is_read_from_environment() {
    let dir = TestDir::new();
    let path_cfg = dir.path().join("bad.toml");
    std::fs::write(&path_cfg, "not = [valid").expect("write config");
    let output = Command::new(env!("CARGO_BIN_EXE_depotkit"))
        .args(["plan", "--date", "05.03.2024"])
        .env("DEPOTKIT_CONFIG", &path_cfg)
        .output()
        .expect("failed to execute depotkit");
    assert_eq!(output.status.code(), Some(1));
}
