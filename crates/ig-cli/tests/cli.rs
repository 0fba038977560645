//! CLI command integration tests.
//! Each test uses a temp directory via IG_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ig_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("ig").unwrap();
    cmd.env("IG_DATA_DIR", data_dir.path());
    cmd.args(["--owner", "cli-test"]);
    cmd
}

fn add(dir: &TempDir, args: &[&str]) -> String {
    let output = ig_cmd(dir).arg("add").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "add failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn extract_value(output: &str, prefix: &str) -> String {
    output
        .lines()
        .find(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("line starting with '{prefix}' not found in output:\n{output}"))
        .split_whitespace()
        .last()
        .unwrap()
        .to_string()
}

#[test]
fn stats_fresh_db() {
    let dir = TempDir::new().unwrap();
    ig_cmd(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("owner:        cli-test"))
        .stdout(predicate::str::contains("nodes:        0"))
        .stdout(predicate::str::contains("relations:    0"));
}

#[test]
fn add_then_show() {
    let dir = TempDir::new().unwrap();
    let id = add(
        &dir,
        &[
            "graph merging",
            "--content",
            "merge without loss",
            "--tag",
            "Graphs",
            "--energy",
            "4",
            "--arc",
            "colour=red",
        ],
    );

    ig_cmd(&dir)
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("type:       complex"))
        .stdout(predicate::str::contains("colour = \"red\""))
        .stdout(predicate::str::contains("title:      graph merging"))
        .stdout(predicate::str::contains("tags:       graphs"))
        .stdout(predicate::str::contains("energy:     4"))
        .stdout(predicate::str::contains("forward:    -"));
}

#[test]
fn show_json_includes_chain() {
    let dir = TempDir::new().unwrap();
    let id = add(&dir, &["plain leaf"]);

    let output = ig_cmd(&dir).args(["show", &id, "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["node"]["node_type"], "leaf");
    assert_eq!(json["node"]["name"], "plain leaf");
    assert_eq!(json["chain"][0], id.as_str());
}

#[test]
fn unify_forwards_and_materializes() {
    let dir = TempDir::new().unwrap();
    let a = add(&dir, &["first", "--arc", "A=1"]);
    let b = add(&dir, &["second", "--arc", "B=2"]);

    let output = ig_cmd(&dir).args(["unify", &a, &b]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(extract_value(&stdout, "canonical:"), b);
    assert_eq!(extract_value(&stdout, "forwarded:"), "1");
    let result = extract_value(&stdout, "result:");

    // The materialized copy carries both arcs.
    ig_cmd(&dir)
        .args(["show", &result])
        .assert()
        .success()
        .stdout(predicate::str::contains("A = 1"))
        .stdout(predicate::str::contains("B = 2"));

    // The absorbed node now points at its partner.
    ig_cmd(&dir)
        .args(["show", &a])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("forward:    {b}")))
        .stdout(predicate::str::contains(format!("copy:       {result}")));

    // Unifying again changes nothing and returns the same copy.
    let again = ig_cmd(&dir).args(["unify", &a, &b]).output().unwrap();
    let stdout = String::from_utf8_lossy(&again.stdout);
    assert_eq!(extract_value(&stdout, "forwarded:"), "0");
    assert_eq!(extract_value(&stdout, "result:"), result);
}

#[test]
fn unify_incompatible_leaves_fails() {
    let dir = TempDir::new().unwrap();
    let x = add(&dir, &["X"]);
    let y = add(&dir, &["Y"]);

    ig_cmd(&dir)
        .args(["unify", &x, &y])
        .assert()
        .failure()
        .stderr(predicate::str::contains("incompatible leaves"));
}

#[test]
fn atomic_unify_leaves_no_trace_on_failure() {
    let dir = TempDir::new().unwrap();
    // Shared child arcs point at leaves that cannot unify.
    let x = add(&dir, &["X"]);
    let y = add(&dir, &["Y"]);
    let a = add(&dir, &["a", "--arc", &format!("child=@{x}")]);
    let b = add(&dir, &["b", "--arc", &format!("child=@{y}")]);

    ig_cmd(&dir)
        .args(["unify", "--atomic", &a, &b])
        .assert()
        .failure();

    ig_cmd(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("superseded:   0"))
        .stdout(predicate::str::contains("materialized: 0"));
}

#[test]
fn discover_lists_similar_and_saves() {
    let dir = TempDir::new().unwrap();
    let a = add(
        &dir,
        &["machine learning pipeline", "--tag", "ml", "--tag", "data", "--energy", "4"],
    );
    let b = add(&dir, &["machine learning system", "--tag", "ml", "--energy", "3"]);

    ig_cmd(&dir)
        .args(["discover", &a, "--save"])
        .assert()
        .success()
        .stdout(predicate::str::contains(b.as_str()))
        .stdout(predicate::str::contains("machine learning system"));

    let output = ig_cmd(&dir).arg("stats").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(extract_value(&stdout, "relations:"), "1");
}

#[test]
fn discover_skips_archived() {
    let dir = TempDir::new().unwrap();
    let a = add(&dir, &["same idea", "--tag", "t"]);
    let b = add(&dir, &["same idea", "--tag", "t"]);

    ig_cmd(&dir)
        .args(["archive", &b])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("archived {b}")));

    ig_cmd(&dir)
        .args(["discover", &a])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no related ideas)"));
}

#[test]
fn score_prints_breakdown() {
    let dir = TempDir::new().unwrap();
    let a = add(&dir, &["same title", "--energy", "2"]);
    let b = add(&dir, &["same title", "--energy", "2"]);

    ig_cmd(&dir)
        .args(["score", &a, &b])
        .assert()
        .success()
        .stdout(predicate::str::contains("title:   1.000"))
        .stdout(predicate::str::contains("content: 0.000"))
        .stdout(predicate::str::contains("energy:  1.000"))
        .stdout(predicate::str::contains("total:   0.500"));
}

#[test]
fn add_rejects_malformed_arc() {
    let dir = TempDir::new().unwrap();
    ig_cmd(&dir)
        .args(["add", "broken", "--arc", "no-equals"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("label=value"));
}

#[test]
fn owners_are_isolated() {
    let dir = TempDir::new().unwrap();
    let a = add(&dir, &["shared title", "--tag", "x"]);

    #[allow(deprecated)]
    let mut other = Command::cargo_bin("ig").unwrap();
    other
        .env("IG_DATA_DIR", dir.path())
        .args(["--owner", "someone-else", "add", "shared title", "--tag", "x"])
        .assert()
        .success();

    ig_cmd(&dir)
        .args(["discover", &a])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no related ideas)"));
}
