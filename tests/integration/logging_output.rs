//! Integration tests for log destinations chosen on the command line.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn check_command(workspace: &Path, config_home: &Path) -> Command {
    let bin = env!("CARGO_BIN_EXE_artifact-forge");
    let mut command = Command::new(bin);
    command
        .env("XDG_CONFIG_HOME", config_home.as_os_str())
        .env_remove("ARTIFACT_FORGE_LOG")
        .env_remove("ARTIFACT_FORGE_LOG_OUTPUT")
        .env_remove("ARTIFACT_FORGE_LOG_FORMAT")
        .arg("--workspace")
        .arg(workspace);
    command
}

fn workspace_with_items(temp_dir: &TempDir) -> std::path::PathBuf {
    let workspace = temp_dir.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();
    fs::write(
        workspace.join("items.json"),
        r#"[{"id": "T-1", "title": "Login"}]"#,
    )
    .unwrap();
    workspace
}

#[test]
fn test_file_output_writes_workspace_log() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_with_items(&temp_dir);

    let output = check_command(&workspace, &temp_dir.path().join("config"))
        .arg("--log-output")
        .arg("file")
        .arg("check")
        .arg("--items")
        .arg(workspace.join("items.json"))
        .arg("--kind")
        .arg("test-plan")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "check should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );

    let log_path = workspace.join(".artifact-forge").join("artifact-forge.log");
    assert!(log_path.exists(), "log file should exist at {}", log_path.display());
    let content = fs::read_to_string(&log_path).unwrap();
    assert!(
        content.contains("artifact-forge starting"),
        "log file should contain a startup message; got: {}",
        content.lines().next().unwrap_or("")
    );
}

#[test]
fn test_verbose_logs_to_stderr_without_polluting_stdout() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_with_items(&temp_dir);

    let output = check_command(&workspace, &temp_dir.path().join("config"))
        .arg("--verbose")
        .arg("check")
        .arg("--items")
        .arg(workspace.join("items.json"))
        .arg("--kind")
        .arg("test-plan")
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.trim().is_empty(), "verbose mode should emit logs to stderr");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report[0]["item_id"], "T-1");
    assert_eq!(report[0]["valid"], false);
}
