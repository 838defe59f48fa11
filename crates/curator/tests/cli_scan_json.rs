use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn curator_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_curator"))
}

fn run_cli(args: &[String], envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(curator_bin());
    cmd.args(args);
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to execute curator CLI")
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
    serde_json::Value::deserialize(&mut deserializer).unwrap_or_else(|err| {
        panic!(
            "failed to parse JSON output: {}\nstdout:\n{}\nstderr:\n{}",
            err,
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

fn run_cli_json<T: DeserializeOwned>(args: &[String], envs: &[(&str, &str)]) -> T {
    let output = run_cli(args, envs);
    assert!(
        output.status.success(),
        "command failed: {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_value(parse_json_output(&output)).unwrap_or_else(|err| {
        panic!(
            "failed to deserialize JSON output: {}\nstdout:\n{}",
            err,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn run_cli_json_error(args: &[String], envs: &[(&str, &str)]) -> (i32, serde_json::Value) {
    let output = run_cli(args, envs);
    assert!(
        !output.status.success(),
        "command unexpectedly succeeded: {}\nstdout:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout)
    );
    let code = output.status.code().unwrap_or(-1);
    (code, parse_json_output(&output))
}

#[derive(Debug, Deserialize)]
struct ScanOutput {
    files: Vec<String>,
    count: usize,
    total: usize,
    filtered_total: usize,
    raw_total: usize,
    limit: Option<usize>,
    offset: usize,
    sort_by: String,
    sort_order: String,
}

struct Fixture {
    _home: TempDir,
    repo: TempDir,
    home_str: String,
}

impl Fixture {
    fn new() -> Self {
        let home = TempDir::new().expect("create curator home");
        let repo = TempDir::new().expect("create repository");
        let home_str = home.path().to_string_lossy().to_string();
        Self {
            _home: home,
            repo,
            home_str,
        }
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.repo.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write fixture file");
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        let mut args = vec![repo_arg(self.repo.path())];
        args.extend(rest.iter().map(|s| s.to_string()));
        args.push("--json".to_string());
        args
    }

    fn envs(&self) -> Vec<(&str, &str)> {
        vec![("CURATOR_HOME", self.home_str.as_str()), ("RUST_LOG", "error")]
    }

    fn scan(&self, rest: &[&str]) -> ScanOutput {
        run_cli_json(&self.args(rest), &self.envs())
    }
}

fn repo_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn test_scan_include_glob_reports_raw_and_filtered_totals() {
    let fx = Fixture::new();
    fx.write("a.txt", "alpha");
    fx.write("b.log", "bravo");
    let output = run_cli(&fx.args(&["status", "a.txt", "keep_forever"]), &fx.envs());
    assert!(output.status.success());

    let result = fx.scan(&["scan", "--include", "*.log"]);
    assert_eq!(result.files, vec!["b.log".to_string()]);
    assert_eq!(result.raw_total, 2);
    assert_eq!(result.filtered_total, 1);
    assert_eq!(result.total, 1);
    assert_eq!(result.count, 1);
    assert_eq!(result.sort_by, "name");
    assert_eq!(result.sort_order, "asc");
}

#[test]
fn test_scan_pagination_and_negative_bounds() {
    let fx = Fixture::new();
    for name in ["a.txt", "b.txt", "c.txt", "d.txt", "e.txt"] {
        fx.write(name, name);
    }

    let page = fx.scan(&["scan", "--limit", "2", "--offset", "1"]);
    assert_eq!(page.files, vec!["b.txt".to_string(), "c.txt".to_string()]);
    assert_eq!(page.count, 2);
    assert_eq!(page.filtered_total, 5);
    assert_eq!(page.limit, Some(2));
    assert_eq!(page.offset, 1);

    let past_end = fx.scan(&["scan", "--offset", "10"]);
    assert!(past_end.files.is_empty());
    assert_eq!(past_end.filtered_total, 5);

    let unbounded = fx.scan(&["scan", "--limit", "-1", "--offset", "-3"]);
    assert_eq!(unbounded.files.len(), 5);
    assert_eq!(unbounded.limit, None);
    assert_eq!(unbounded.offset, 0);
}

#[test]
fn test_scan_hides_decided_files_and_internal_paths() {
    let fx = Fixture::new();
    fx.write("keep_me.txt", "k");
    fx.write("review.txt", "r");
    fx.write("nested/deep.txt", "d");

    let envs = fx.envs();
    let output = run_cli(&fx.args(&["status", "keep_me.txt", "keep_forever"]), &envs);
    assert!(output.status.success());

    let flat = fx.scan(&["scan"]);
    assert_eq!(flat.files, vec!["review.txt".to_string()]);

    let recursive = fx.scan(&["scan", "-r"]);
    assert_eq!(
        recursive.files,
        vec!["nested/deep.txt".to_string(), "review.txt".to_string()]
    );
    assert!(recursive.files.iter().all(|f| !f.starts_with(".curator")));
}

#[test]
fn test_sort_by_size_descending() {
    let fx = Fixture::new();
    fx.write("small.txt", "1");
    fx.write("large.txt", "1234567890");
    fx.write("medium.txt", "12345");

    let result = fx.scan(&["sort", "size", "--order", "desc"]);
    assert_eq!(
        result.files,
        vec![
            "large.txt".to_string(),
            "medium.txt".to_string(),
            "small.txt".to_string()
        ]
    );
    assert_eq!(result.sort_by, "size");
    assert_eq!(result.sort_order, "desc");
}

#[test]
fn test_scan_filter_matches_tags() {
    let fx = Fixture::new();
    fx.write("photo.jpg", "p");
    fx.write("notes.txt", "n");

    let envs = fx.envs();
    let output = run_cli(&fx.args(&["tag", "notes.txt", "--add", "Vacation"]), &envs);
    assert!(output.status.success());

    let result = fx.scan(&["scan", "--filter", "vacation"]);
    assert_eq!(result.files, vec!["notes.txt".to_string()]);
    assert_eq!(result.raw_total, 2);
}

#[test]
fn test_scan_invalid_sort_key_exits_invalid_input() {
    let fx = Fixture::new();
    fx.write("a.txt", "a");

    let (code, value) = run_cli_json_error(&fx.args(&["scan", "--sort-by", "color"]), &fx.envs());
    assert_eq!(code, 3);
    assert_eq!(value["code"], 3);
    assert!(value["error"].as_str().is_some());
}

#[test]
fn test_scan_missing_repository_exits_not_found() {
    let home = TempDir::new().unwrap();
    let home_str = home.path().to_string_lossy().to_string();
    let missing = home.path().join("does-not-exist");

    let args = vec![repo_arg(&missing), "scan".to_string(), "--json".to_string()];
    let (code, value) =
        run_cli_json_error(&args, &[("CURATOR_HOME", home_str.as_str()), ("RUST_LOG", "error")]);
    assert_eq!(code, 2);
    assert_eq!(value["code"], 2);
}
