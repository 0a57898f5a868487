//! Runs the built binary against the documents in `tests/data`.

use std::path::PathBuf;
use std::process::{Command, Output};

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn shape_query(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shape-query"))
        .args(args)
        .env_remove("SHAPE_QUERY_INPUT")
        .env_remove("SHAPE_QUERY_FORMAT")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn prints_sorted_text_verdicts() {
    let input = data("services.json");
    let output = shape_query(&["--input", input.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "com.acme.Clock: NOT_PASSED\n\
         com.acme.Clock.zone: NOT_PASSED\n\
         com.acme.UserService: PASSED\n\
         com.acme.UserService.users: NOT_PASSED\n\
         com.acme.data.UserRepository: NOT_PASSED\n"
    );
}

#[test]
fn prints_json_with_named_matches() {
    let input = data("services.json");
    let output = shape_query(&["-i", input.to_str().unwrap(), "-f", "json", "-n", "repo"]);
    assert!(output.status.success());
    let verdicts: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(verdicts["com.acme.UserService"], "PASSED");
    assert_eq!(verdicts["com.acme.data.UserRepository"], "PASSED");
    assert_eq!(verdicts["com.acme.Clock"], "NOT_PASSED");
}

#[test]
fn reads_input_from_environment() {
    let output = Command::new(env!("CARGO_BIN_EXE_shape-query"))
        .env("SHAPE_QUERY_INPUT", data("services.json"))
        .env("SHAPE_QUERY_FORMAT", "json")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().starts_with('{'));
}

#[test]
fn renders_document_errors_with_a_pointer() {
    let input = data("broken.json");
    let output = shape_query(&["--input", input.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("error: invalid name pattern"), "{stderr}");
    assert!(stderr.contains("2 |   \"recipe\""), "{stderr}");
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr.matches("invalid name pattern").count(), 1, "{stderr}");
    assert!(!stderr.contains("Syntax("), "{stderr}");
}
