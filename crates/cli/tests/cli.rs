//! Runs the driver in-process over fixture files.

#![allow(unused_crate_dependencies)]

use gasol_cli::{parse_args, run};
use std::path::{Path, PathBuf};

const ADD_BLOCK: &str = r#"{
    "src_ws": ["s(0)", "s(1)"],
    "tgt_ws": ["s(2)"],
    "user_instrs": [{
        "id": "ADD_0",
        "opcode": "01",
        "disasm": "ADD",
        "inpt_sk": ["s(0)", "s(1)"],
        "outpt_sk": ["s(2)"],
        "gas": 3,
        "size": 1,
        "commutative": true,
        "storage": false
    }],
    "memory_dependences": [],
    "storage_dependences": [],
    "current_cost": 3,
    "init_progr_len": 1,
    "max_sk_sz": 2
}"#;

const PUSH_BLOCK: &str = r#"{
    "src_ws": [],
    "tgt_ws": ["0x00", "s(0)"],
    "user_instrs": [{
        "id": "ADDRESS_0",
        "opcode": "30",
        "disasm": "ADDRESS",
        "inpt_sk": [],
        "outpt_sk": ["s(0)"],
        "gas": 2,
        "size": 1,
        "commutative": false,
        "storage": false
    }]
}"#;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn run_args(args: &[&str]) -> (bool, String, String) {
    let opts = parse_args(std::iter::once("gasol").chain(args.iter().copied())).unwrap();
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let ok = run(&opts, &mut out, &mut err).unwrap();
    (ok, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
}

#[test]
fn test_text_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "add.json", ADD_BLOCK);
    let (ok, out, err) = run_args(&[path.to_str().unwrap()]);
    assert!(ok, "{err}");
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some(format!("{}: ADD", path.display()).as_str()));
    assert_eq!(lines.next(), Some("  ids: ADD_0"));
    assert_eq!(lines.next(), Some("  length: 1, correct: true"));
    assert_eq!(lines.next(), None);
}

#[test]
fn test_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "push.json", PUSH_BLOCK);
    let (ok, out, _) =
        run_args(&[path.to_str().unwrap(), "--format", "json", "--evm-version", "london"]);
    assert!(ok);
    let report: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(report["opcodes"], serde_json::json!(["ADDRESS", "PUSH1 0x0"]));
    assert_eq!(report["ids"], serde_json::json!(["ADDRESS_0", "PUSH"]));
    assert_eq!(report["accepted"], true);
    assert_eq!(report["length"], 2);
    assert!(report.get("stack").is_none());
}

#[test]
fn test_push0_and_print_stack() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "push.json", PUSH_BLOCK);
    let (ok, out, _) = run_args(&[path.to_str().unwrap(), "--format=json", "-Zprint-stack"]);
    assert!(ok);
    let report: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(report["opcodes"], serde_json::json!(["ADDRESS", "PUSH0"]));
    assert_eq!(report["stack"], serde_json::json!(["0", "s(0)"]));
}

#[test]
fn test_errors_are_reported_per_block() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "add.json", ADD_BLOCK);
    let bad = write(dir.path(), "bad.json", "{ \"src_ws\": [");
    let missing = dir.path().join("missing.json");

    let (ok, out, err) =
        run_args(&[bad.to_str().unwrap(), good.to_str().unwrap(), missing.to_str().unwrap()]);
    assert!(!ok);
    assert!(out.contains(": ADD"), "{out}");
    let errors: Vec<_> = err.lines().collect();
    assert_eq!(errors.len(), 2, "{err}");
    assert!(errors.iter().all(|line| line.starts_with("error: ")));

    let (ok, out, err) = run_args(&[bad.to_str().unwrap(), "--format", "json"]);
    assert!(!ok);
    assert!(err.is_empty());
    let report: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert!(report["error"].is_string());
}
