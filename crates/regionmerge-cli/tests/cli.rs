//! End-to-end tests for the `regionmerge` binary.
//!
//! Every test runs the built binary against the demo models in a temp
//! working directory, so no `regionmerge.toml` is picked up by accident.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

fn regionmerge_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_regionmerge"))
        .args(args)
        .current_dir(dir)
        .env_remove("REGIONMERGE_CONFIG")
        .env_remove("REGIONMERGE_LOG")
        .output()
        .expect("failed to run regionmerge")
}

fn regionmerge_ok(dir: &Path, args: &[&str]) -> String {
    let out = regionmerge_in(dir, args);
    assert!(
        out.status.success(),
        "regionmerge {} failed:\nstdout: {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn regionmerge_fails(dir: &Path, args: &[&str]) -> String {
    let out = regionmerge_in(dir, args);
    assert!(
        !out.status.success(),
        "regionmerge {} unexpectedly succeeded",
        args.join(" ")
    );
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn demo_arg(name: &str) -> String {
    demo(name).display().to_string()
}

#[test]
fn check_accepts_demo_models() {
    let dir = TempDir::new().unwrap();
    let out = regionmerge_ok(dir.path(), &["check", &demo_arg("car-eu.toml")]);
    assert!(out.contains("[OK] eu"), "{out}");
    assert!(out.contains("satisfiable"));
}

#[test]
fn count_demo_models() {
    let dir = TempDir::new().unwrap();
    let eu = regionmerge_ok(dir.path(), &["count", &demo_arg("car-eu.toml")]);
    assert_eq!(eu.trim(), "16");
    let us = regionmerge_ok(dir.path(), &["count", &demo_arg("car-us.toml")]);
    assert_eq!(us.trim(), "12");
    let petrol = regionmerge_ok(
        dir.path(),
        &["count", &demo_arg("car-us.toml"), "--where", "Petrol=1"],
    );
    assert_eq!(petrol.trim(), "8");
}

#[test]
fn merge_writes_model_and_json_report() {
    let dir = TempDir::new().unwrap();
    let merged = dir.path().join("merged.toml");
    let report = regionmerge_ok(
        dir.path(),
        &[
            "merge",
            &demo_arg("car-eu.toml"),
            &demo_arg("car-us.toml"),
            "-o",
            &merged.display().to_string(),
            "--report",
            "json",
        ],
    );

    let json: serde_json::Value = serde_json::from_str(&report).expect("report should be JSON");
    assert_eq!(json["strategy"], "integer");
    assert_eq!(json["regions"].as_array().unwrap().len(), 2);
    assert_eq!(json["cancelled"], false);
    assert_eq!(json["verification"]["total"]["actual"], 28);
    assert!(json["resolve"]["decontextualized"].as_u64().unwrap() >= 1);

    let merged = merged.display().to_string();
    let total = regionmerge_ok(dir.path(), &["count", &merged]);
    assert_eq!(total.trim(), "28");
    let eu = regionmerge_ok(dir.path(), &["count", &merged, "--where", "region=0"]);
    assert_eq!(eu.trim(), "16");
    let us = regionmerge_ok(dir.path(), &["count", &merged, "--where", "region=1"]);
    assert_eq!(us.trim(), "12");
}

#[test]
fn merge_prints_model_to_stdout() {
    let dir = TempDir::new().unwrap();
    let out = regionmerge_in(
        dir.path(),
        &["merge", &demo_arg("car-eu.toml"), &demo_arg("car-us.toml")],
    );
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stdout.contains("[[constraints]]"), "{stdout}");
    assert!(stdout.contains("Towbar => !Electric"), "{stdout}");
    assert!(stderr.contains("merged 2 region(s)"), "{stderr}");
    assert!(stderr.contains("verify: ok"), "{stderr}");
}

#[test]
fn merge_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let merged = dir.path().join("merged.toml");
    regionmerge_ok(
        dir.path(),
        &[
            "merge",
            &demo_arg("car-eu.toml"),
            &demo_arg("car-us.toml"),
            "--config",
            &demo_arg("regionmerge.toml"),
            "-o",
            &merged.display().to_string(),
        ],
    );
    let merged = merged.display().to_string();
    let us = regionmerge_ok(dir.path(), &["count", &merged, "--where", "market=1"]);
    assert_eq!(us.trim(), "12");
}

#[test]
fn merge_with_feature_tree_strategy() {
    let dir = TempDir::new().unwrap();
    let merged = dir.path().join("merged.toml");
    regionmerge_ok(
        dir.path(),
        &[
            "merge",
            &demo_arg("car-eu.toml"),
            &demo_arg("car-us.toml"),
            "--strategy",
            "feature-tree",
            "-o",
            &merged.display().to_string(),
        ],
    );
    let merged = merged.display().to_string();
    let eu = regionmerge_ok(dir.path(), &["count", &merged, "--where", "Region_eu=1"]);
    assert_eq!(eu.trim(), "16");
    let us = regionmerge_ok(dir.path(), &["count", &merged, "--where", "Region_us=1"]);
    assert_eq!(us.trim(), "12");
}

#[test]
fn merge_rejects_duplicate_regions() {
    let dir = TempDir::new().unwrap();
    let eu = demo_arg("car-eu.toml");
    let err = regionmerge_fails(dir.path(), &["merge", &eu, &eu]);
    assert!(err.contains("eu"), "{err}");
}

#[test]
fn missing_model_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = regionmerge_fails(dir.path(), &["check", "nope.toml"]);
    assert!(err.contains("nope.toml"), "{err}");
}

#[test]
fn count_rejects_unknown_where_feature() {
    let dir = TempDir::new().unwrap();
    let err = regionmerge_fails(
        dir.path(),
        &["count", &demo_arg("car-eu.toml"), "--where", "Sunroof=1"],
    );
    assert!(err.contains("Sunroof"), "{err}");
}

#[test]
fn unknown_config_key_is_reported_with_line() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("regionmerge.toml");
    std::fs::write(&config, "[merge]\nindicator = \"region\"\nturbo = true\n").unwrap();
    let err = regionmerge_fails(
        dir.path(),
        &["merge", &demo_arg("car-eu.toml"), &demo_arg("car-us.toml")],
    );
    assert!(err.contains("line 3"), "{err}");
}

#[test]
fn completions_are_generated() {
    let dir = TempDir::new().unwrap();
    let out = regionmerge_ok(dir.path(), &["completions", "bash"]);
    assert!(out.contains("regionmerge"));
}
