//! CLI binary: the check command reports artifacts without calling the provider.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

#[test]
fn test_check_command_reports_valid_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("ws");
    let config_home = temp_dir.path().join("config");
    fs::create_dir_all(workspace.join(".artifact-forge/artifacts/schemas")).unwrap();
    fs::create_dir_all(&config_home).unwrap();
    fs::write(
        workspace.join("items.json"),
        r#"[{"id": "S-1", "title": "Users table"}, {"id": "S-2", "title": "Orders table"}]"#,
    )
    .unwrap();
    fs::write(
        workspace.join(".artifact-forge/artifacts/schemas/S-1.json"),
        "{\n  \"type\": \"object\",\n  \"properties\": {}\n}\n",
    )
    .unwrap();

    let bin = env!("CARGO_BIN_EXE_artifact-forge");
    let output = Command::new(bin)
        .env("XDG_CONFIG_HOME", config_home.as_os_str())
        .env("ARTIFACT_FORGE__PROVIDER__ENDPOINT", "http://127.0.0.1:9")
        .arg("--workspace")
        .arg(&workspace)
        .arg("--quiet")
        .arg("check")
        .arg("--items")
        .arg(workspace.join("items.json"))
        .arg("--kind")
        .arg("schema")
        .arg("--json")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "check should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report.as_array().unwrap().len(), 2);
    assert_eq!(report[0]["item_id"], "S-1");
    assert_eq!(report[0]["valid"], true);
    assert_eq!(report[1]["valid"], false);
}

#[test]
fn test_invalid_items_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("items.json"), "not json").unwrap();

    let bin = env!("CARGO_BIN_EXE_artifact-forge");
    let output = Command::new(bin)
        .env("XDG_CONFIG_HOME", temp_dir.path().join("config").as_os_str())
        .arg("--workspace")
        .arg(temp_dir.path())
        .arg("--quiet")
        .arg("check")
        .arg("--items")
        .arg(temp_dir.path().join("items.json"))
        .arg("--kind")
        .arg("test-plan")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to parse work items"));
}
