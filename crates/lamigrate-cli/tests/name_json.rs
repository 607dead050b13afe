//! Integration tests for `lamigrate name` and `lamigrate args`.

use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "lamigrate-cli", "--bin", "lamigrate", "--"]);
    cmd
}

#[test]
fn test_name_json_lists_successors() {
    let output = cargo_bin()
        .args([
            "--json",
            "name",
            "zendframework/zend-mvc",
            "zfcampus/zf-apigility",
            "zendframework/zend-debug",
        ])
        .output()
        .expect("Failed to run name command");
    assert!(output.status.success());

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["ok"], true);

    let packages = json["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 3);
    assert_eq!(packages[0]["replacement"], "laminas/laminas-mvc");
    assert_eq!(packages[1]["replacement"], "laminas-api-tools/api-tools");
    assert!(packages[2]["replacement"].is_null());
    assert_eq!(packages[2]["ignored"], true);
}

#[test]
fn test_name_human_output() {
    let output = cargo_bin()
        .args(["name", "zendframework/zend-expressive-zendrouter", "psr/log"])
        .output()
        .expect("Failed to run name command");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "zendframework/zend-expressive-zendrouter -> mezzio/mezzio-laminasrouter",
            "psr/log (unchanged)",
        ]
    );
}

#[test]
fn test_args_rewrites_require_only() {
    let output = cargo_bin()
        .args([
            "--json",
            "args",
            "require",
            "zendframework/zend-form:^2.0",
            "psr/log",
        ])
        .output()
        .expect("Failed to run args command");
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["changed"], true);
    assert_eq!(
        json["arguments"],
        serde_json::json!(["laminas/laminas-form:^2.0", "psr/log"])
    );

    let output = cargo_bin()
        .args(["--json", "args", "update", "zendframework/zend-form"])
        .output()
        .expect("Failed to run args command");
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["changed"], false);
    assert_eq!(json["arguments"], serde_json::json!(["zendframework/zend-form"]));
}
