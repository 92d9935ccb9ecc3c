use std::fs;
use std::process::Command;

const STREAM: &str = "\
kind: Service
metadata:
  name: a
  namespace: ns1
---
kind: Deployment
metadata:
  name: b
";

fn kubemap() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kubemap"));
    cmd.env_remove("KUBEMAP_SEPARATOR").env_remove("KUBEMAP_MAX_INPUT_BYTES").env("KUBEMAP_LOG", "off");
    cmd
}

#[test]
fn flat_conversion_succeeds_and_writes_paths() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.yaml");
    let dst = dir.path().join("out.yaml");
    fs::write(&src, STREAM).unwrap();

    let out = kubemap().arg(&src).arg(&dst).output().unwrap();
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("2 records, 2 entries"), "stdout={}", stdout);
    assert!(stdout.contains("verified"), "stdout={}", stdout);

    let doc: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(&dst).unwrap()).unwrap();
    assert_eq!(doc["ns1.a.Service"]["kind"].as_str(), Some("Service"));
    assert_eq!(doc["default.b.Deployment"]["metadata"]["name"].as_str(), Some("b"));
}

#[test]
fn nested_conversion_with_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.yaml");
    let dst = dir.path().join("out.yaml");
    fs::write(&src, STREAM).unwrap();

    let out = kubemap().args(["--nested", "-o", "json"]).arg(&src).arg(&dst).output().unwrap();
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["mode"], "nested");
    assert_eq!(report["records"], 2);
    assert_eq!(report["verified"], true);

    let doc: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(&dst).unwrap()).unwrap();
    assert_eq!(doc["default"]["b"]["Deployment"]["kind"].as_str(), Some("Deployment"));
}

#[test]
fn duplicate_objects_fail_verification_with_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.yaml");
    let dst = dir.path().join("out.yaml");
    fs::write(&src, "kind: Service\nmetadata:\n  name: a\n---\nkind: Service\nmetadata:\n  name: a\n").unwrap();

    let out = kubemap().arg(&src).arg(&dst).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("verification failed"), "stderr={}", stderr);
    assert!(stderr.contains("missing"), "stderr={}", stderr);
    // destination is left in place
    assert!(dst.exists());

    let out = kubemap().arg("--no-verify").arg(&src).arg(&dst).output().unwrap();
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn missing_name_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.yaml");
    let dst = dir.path().join("out.yaml");
    fs::write(&src, "kind: Service\nmetadata:\n  namespace: x\n").unwrap();

    let out = kubemap().arg(&src).arg(&dst).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("missing field `metadata.name`"), "stderr={}", stderr);
}

#[test]
fn input_cap_applies_to_the_source_only() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.yaml");
    let dst = dir.path().join("out.yaml");
    fs::write(&src, STREAM).unwrap();
    let cap = STREAM.len().to_string();

    let out = kubemap().args(["--nested", "--max-input-bytes", &cap]).arg(&src).arg(&dst).output().unwrap();
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let out = kubemap().env("KUBEMAP_MAX_INPUT_BYTES", "10").arg(&src).arg(&dst).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("over the 10 byte input limit"), "stderr={}", stderr);
}
