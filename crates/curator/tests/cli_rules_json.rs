use filetime::{set_file_mtime, FileTime};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn curator_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_curator"))
}

fn parse_json_output(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_start = stdout.find(|c| c == '{' || c == '[').unwrap_or_else(|| {
        panic!(
            "no JSON payload found in output\nstdout:\n{}\nstderr:\n{}",
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    });
    let mut deserializer = serde_json::Deserializer::from_str(&stdout[json_start..]);
    serde_json::Value::deserialize(&mut deserializer).expect("parse JSON output")
}

struct Fixture {
    home: TempDir,
    repo: TempDir,
    rules: PathBuf,
}

impl Fixture {
    fn new(rules: serde_json::Value) -> Self {
        let home = TempDir::new().expect("create curator home");
        let repo = TempDir::new().expect("create repository");
        let rules_path = home.path().join("rules.json");
        fs::write(&rules_path, serde_json::to_string_pretty(&rules).unwrap())
            .expect("write rules file");
        Self {
            home,
            repo,
            rules: rules_path,
        }
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.repo.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, content).expect("write fixture file");
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(curator_bin())
            .arg(self.repo.path())
            .args(args)
            .arg("--rules-file")
            .arg(&self.rules)
            .arg("--json")
            .env("CURATOR_HOME", self.home.path())
            .env("RUST_LOG", "error")
            .output()
            .expect("failed to execute curator CLI")
    }

    fn ok(&self, args: &[&str]) -> serde_json::Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "command failed: {:?}\nstdout:\n{}\nstderr:\n{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        parse_json_output(&output)
    }

    fn exists(&self, rel: &str) -> bool {
        self.repo.path().join(rel).exists()
    }
}

fn age(path: &Path, days: u64) {
    let then = SystemTime::now() - Duration::from_secs(days * 86_400);
    set_file_mtime(path, FileTime::from_system_time(then)).expect("set mtime");
}

fn old_logs_rules() -> serde_json::Value {
    serde_json::json!([
        {
            "name": "Old logs",
            "conditions": [
                {"field": "extension", "operator": "is", "value": "log"},
                {"field": "age_days", "operator": "gt", "value": 30}
            ],
            "action": {"type": "trash"}
        },
        {
            "name": "Logs",
            "conditions": [{"field": "extension", "operator": "is", "value": ".log"}],
            "action": "add_tag",
            "action_value": "log"
        }
    ])
}

#[test]
fn test_dry_run_reports_first_match_without_mutation() {
    let fx = Fixture::new(old_logs_rules());
    let old = fx.write("old.log", "old");
    age(&old, 60);
    fx.write("new.log", "new");
    fx.write("notes.txt", "n");

    let report = fx.ok(&["rules", "dry-run"]);
    assert_eq!(report["matched"], 2);
    assert_eq!(report["applied"], 0);

    let results = report["results"].as_array().unwrap();
    let by_file = |name: &str| {
        results
            .iter()
            .find(|r| r["filename"] == name)
            .unwrap_or_else(|| panic!("no result for {}", name))
    };
    assert_eq!(by_file("old.log")["rule"], "Old logs");
    assert_eq!(by_file("old.log")["action"], "trash");
    assert_eq!(by_file("old.log")["applied"], false);
    assert_eq!(by_file("new.log")["rule"], "Logs");
    assert_eq!(by_file("new.log")["action_value"], "log");
    assert!(results.iter().all(|r| r["filename"] != "notes.txt"));

    assert!(fx.exists("old.log"));
    assert!(!fx.repo.path().join(".curator_state.json").exists());
}

#[test]
fn test_apply_executes_actions_and_rerun_skips() {
    let fx = Fixture::new(old_logs_rules());
    let old = fx.write("old.log", "old");
    age(&old, 60);
    fx.write("new.log", "new");

    let report = fx.ok(&["rules", "apply"]);
    assert_eq!(report["applied"], 2);
    assert_eq!(report["failed"], 0);
    assert!(!fx.exists("old.log"));
    assert!(fx.exists(".curator_trash/old.log"));

    let state: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(fx.repo.path().join(".curator_state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["old.log"]["status"], "deleted");
    assert_eq!(state["new.log"]["tags"], serde_json::json!(["log"]));

    let again = fx.ok(&["rules", "apply"]);
    assert_eq!(again["matched"], 1);
    assert_eq!(again["applied"], 0);
    assert_eq!(again["skipped"], 1);
}

#[test]
fn test_invalid_rules_file_exits_invalid_input() {
    let fx = Fixture::new(serde_json::json!([
        {
            "conditions": [{"field": "colour", "operator": "is", "value": "red"}],
            "action": "trash"
        }
    ]));
    fx.write("a.txt", "a");

    let output = fx.run(&["rules", "dry-run"]);
    assert_eq!(output.status.code(), Some(3));
    let value = parse_json_output(&output);
    assert_eq!(value["code"], 3);
    assert!(fx.exists("a.txt"));
}

#[test]
fn test_failed_rename_is_counted_and_run_continues() {
    let fx = Fixture::new(serde_json::json!([
        {
            "name": "Rename drafts",
            "conditions": [{"field": "filename", "operator": "startswith", "value": "draft"}],
            "action": "rename",
            "action_value": "final.txt"
        }
    ]));
    fx.write("draft_a.txt", "a");
    fx.write("draft_b.txt", "b");

    let output = fx.run(&["rules", "apply"]);
    assert_eq!(output.status.code(), Some(2));
    let report = parse_json_output(&output);
    assert_eq!(report["applied"], 1);
    assert_eq!(report["failed"], 1);
    assert!(fx.exists("final.txt"));
}
