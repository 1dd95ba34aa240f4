use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to get the path to test fixtures
fn fixture_path(name: &str) -> String {
    format!("tests/fixtures/{}", name)
}

/// Helper to create a Command for the feedcheck binary with a clean environment
#[allow(deprecated)]
fn feedcheck() -> Command {
    let mut cmd = Command::cargo_bin("feedcheck").expect("Failed to find feedcheck binary");
    for key in [
        "METADATA_FILE",
        "FEED_BASE_PATH",
        "AUTOSYS_MOCK_MODE",
        "AUTOSYS_ENV",
        "WATERMARK_FILE",
        "LOG_BASE_PATH",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

// ============================================================================
// check command tests
// ============================================================================

#[test]
fn test_check_valid_workbook() {
    feedcheck()
        .arg("check")
        .arg(fixture_path("metadata.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Metadata workbook is valid"))
        .stdout(predicate::str::contains("CUSTOMER_FEED"))
        .stdout(predicate::str::contains("Rules:        4"))
        .stdout(predicate::str::contains("Skipped rows: 1"));
}

#[test]
fn test_check_reports_rejected_and_unresolved() {
    feedcheck()
        .arg("check")
        .arg(fixture_path("metadata.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Rejected rows"))
        .stdout(predicate::str::contains("DBName"))
        .stdout(predicate::str::contains("Unresolved enumerations"))
        .stdout(predicate::str::contains("REGIONS"))
        .stdout(predicate::str::contains("Patterns"));
}

#[test]
fn test_check_json_output() {
    let output = feedcheck()
        .arg("check")
        .arg(fixture_path("metadata.yml"))
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["rules"], 4);
    assert_eq!(value["feeds"]["CUSTOMER_FEED"], 4);
    assert_eq!(value["checks"]["range"], 1);
    assert_eq!(value["rejected"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["not_evaluated"]["Patterns"], 1);
}

#[test]
fn test_check_lists_feed_files() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("metadata.yml");
    fs::write(
        &path,
        r#"
Feed_to_staging:
  - Modules: CUSTOMER_MODULE
    Feed: "cust_a.csv | cust_b.csv"
    FieldName: CUSTOMER_ID
    DBName: server1
    DB Table: CUSTOMER_STG
    DataType: INTEGER
"#,
    )
    .unwrap();

    feedcheck()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Feed files:"))
        .stdout(predicate::str::contains("cust_a.csv, cust_b.csv"));

    let output = feedcheck()
        .arg("check")
        .arg(&path)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        value["feed_files"]["cust_a.csv | cust_b.csv"],
        serde_json::json!(["cust_a.csv", "cust_b.csv"])
    );
}

#[test]
fn test_check_toml_workbook() {
    feedcheck()
        .arg("check")
        .arg(fixture_path("metadata.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("TXN_FEED"))
        .stdout(predicate::str::contains("server2"));
}

#[test]
fn test_check_empty_workbook() {
    feedcheck()
        .arg("check")
        .arg(fixture_path("empty_metadata.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_check_invalid_workbook() {
    feedcheck()
        .arg("check")
        .arg(fixture_path("invalid_metadata.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse metadata workbook"));
}

#[test]
fn test_check_missing_file() {
    feedcheck()
        .arg("check")
        .arg("nonexistent.yml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_check_without_workbook() {
    feedcheck()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("METADATA_FILE"));
}

#[test]
fn test_check_workbook_from_environment() {
    feedcheck()
        .arg("check")
        .env("METADATA_FILE", fixture_path("metadata.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("CUSTOMER_FEED"));
}

// ============================================================================
// validate command tests
// ============================================================================

#[test]
fn test_validate_reports_findings() {
    feedcheck()
        .arg("validate")
        .arg(fixture_path("metadata.yml"))
        .arg("--config")
        .arg(fixture_path("feedcheck.toml"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Validation FAILED"))
        .stdout(predicate::str::contains("130"))
        .stdout(predicate::str::contains("1 null value(s)"))
        .stdout(predicate::str::contains("enumeration 'REGIONS' is not defined"));
}

#[test]
fn test_validate_json_output() {
    let output = feedcheck()
        .arg("validate")
        .arg(fixture_path("metadata.yml"))
        .arg("--config")
        .arg(fixture_path("feedcheck.toml"))
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "FAIL");
    assert_eq!(value["cancelled"], false);
    assert!(value["by_feed"]["CUSTOMER_FEED"]["fail"].as_u64().unwrap() >= 2);
}

#[test]
fn test_validate_selected_kind_passes() {
    feedcheck()
        .arg("validate")
        .arg(fixture_path("metadata.yml"))
        .arg("--config")
        .arg(fixture_path("feedcheck.toml"))
        .arg("--kind")
        .arg("data_type")
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation PASSED"))
        .stdout(predicate::str::contains("Total checks: 4"));
}

#[test]
fn test_validate_unknown_kind() {
    feedcheck()
        .arg("validate")
        .arg(fixture_path("metadata.yml"))
        .arg("--kind")
        .arg("sparkle")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --kind value"));
}

#[test]
fn test_validate_unknown_format() {
    feedcheck()
        .arg("validate")
        .arg(fixture_path("metadata.yml"))
        .arg("--format")
        .arg("xml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported output format"));
}

#[test]
fn test_validate_missing_config() {
    feedcheck()
        .arg("validate")
        .arg(fixture_path("metadata.yml"))
        .arg("--config")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_validate_records_append_watermarks() {
    let temp_dir = TempDir::new().unwrap();
    let data = temp_dir.path().join("txn_stg.csv");
    fs::write(&data, "TXN_ID\n1\n2\n3\n").unwrap();
    let watermarks = temp_dir.path().join("watermarks.json");
    let config = temp_dir.path().join("feedcheck.toml");
    fs::write(
        &config,
        format!(
            "[[tables]]\ndatabase = \"server2\"\ntable = \"TXN_STG\"\npath = {:?}\n\n[paths]\nwatermark_file = {:?}\n",
            data.display().to_string(),
            watermarks.display().to_string()
        ),
    )
    .unwrap();

    feedcheck()
        .arg("validate")
        .arg(fixture_path("metadata.toml"))
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation PASSED"));

    let recorded: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&watermarks).unwrap()).unwrap();
    assert_eq!(recorded["server2.txn_stg[txn_feed]"]["row_count"], 3);

    feedcheck()
        .arg("validate")
        .arg(fixture_path("metadata.toml"))
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("no rows appended since last run"));
}

// ============================================================================
// init command tests
// ============================================================================

#[test]
fn test_init_then_validate() {
    let temp_dir = TempDir::new().unwrap();

    feedcheck()
        .arg("init")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("metadata.yml"));

    assert!(temp_dir.path().join("feedcheck.toml").exists());
    assert!(temp_dir.path().join("data/customer_stg.csv").exists());
    assert!(temp_dir
        .path()
        .join("logs/FEED_LOAD_JOB/FEED_LOAD_JOB_sample_info.log")
        .exists());
    let metadata = fs::read_to_string(temp_dir.path().join("metadata.yml")).unwrap();
    assert!(metadata.contains("Feed_to_staging"));

    feedcheck()
        .arg("validate")
        .arg("--config")
        .arg(temp_dir.path().join("feedcheck.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation PASSED"));

    // The Insert table is unchanged, so the recorded watermark makes it fail.
    feedcheck()
        .arg("validate")
        .arg("--config")
        .arg(temp_dir.path().join("feedcheck.toml"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("no new rows inserted since last run"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("metadata.yml"), "keep me").unwrap();

    feedcheck()
        .arg("init")
        .arg(temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assert_eq!(
        fs::read_to_string(temp_dir.path().join("metadata.yml")).unwrap(),
        "keep me"
    );

    feedcheck()
        .arg("init")
        .arg(temp_dir.path())
        .arg("--force")
        .assert()
        .success();
}

#[test]
fn test_help_lists_commands() {
    feedcheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("init"));
}
