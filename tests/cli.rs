use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kbsync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kbsync");
    path
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[aws]
region = "eu-west-1"

[naming]
suffix = "ci7"

[knowledge_base]
role_arn = "arn:aws:iam::123456789012:role/AmazonBedrockExecutionRoleForKnowledgeBase_ci7"

[data_source]
bucket = "kb-docs"
max_tokens = 300
overlap_percentage = 10

[metadata]
path = "{}/data/runs.jsonl"
{}"#,
        tmp.path().display(),
        extra
    );

    let config_path = config_dir.join("kbsync.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_kbsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kbsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .env_remove("AWS_SESSION_TOKEN")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kbsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_names_derive_from_suffix() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_kbsync(&config_path, &["names"]);
    assert!(success, "names failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("bedrock-vectordb-rag-ci7"));
    assert!(stdout.contains("bedrock-vectordb-rag-index-ci7"));
    assert!(stdout.contains("bedrock-sample-knowledge-base-ci7"));
    assert!(stdout.contains("AmazonBedrockExecutionRoleForKnowledgeBase_ci7"));
}

#[test]
fn test_sync_dry_run_needs_no_credentials() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_kbsync(&config_path, &["sync", "--dry-run"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("arn:aws:s3:::kb-docs"));
    assert!(stdout.contains("max_tokens=300 overlap=10%"));
    assert!(stdout.contains("arn:aws:bedrock:eu-west-1::foundation-model/amazon.titan-embed-text-v1"));
    assert!(stdout.contains("index: bedrock-vectordb-rag-index-ci7"));
}

#[test]
fn test_dry_run_writes_no_metadata() {
    let (tmp, config_path) = setup_test_env("");

    let (_, _, success) = run_kbsync(&config_path, &["sync", "--dry-run"]);
    assert!(success);
    assert!(!tmp.path().join("data").join("runs.jsonl").exists());
}

#[test]
fn test_sync_without_credentials_fails() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run_kbsync(&config_path, &["sync", "--progress", "off"]);
    assert!(!success);
    assert!(stderr.contains("AWS_ACCESS_KEY_ID"));
}

#[test]
fn test_invalid_overlap_is_rejected() {
    let (_tmp, config_path) = setup_test_env("");
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("overlap_percentage = 10", "overlap_percentage = 0");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_kbsync(&config_path, &["names"]);
    assert!(!success);
    assert!(stderr.contains("overlap_percentage"));
}

#[test]
fn test_wrong_value_type_is_rejected() {
    let (_tmp, config_path) = setup_test_env("\n[retry]\nmax_attempts = \"three\"\n");

    let (_, stderr, success) = run_kbsync(&config_path, &["names"]);
    assert!(!success);
    assert!(stderr.contains("Failed to parse config file"));
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_kbsync(&missing, &["names"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_query_rejects_zero_limit() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run_kbsync(&config_path, &["query", "pipelines", "--limit", "0"]);
    assert!(!success);
    assert!(stderr.contains("--limit"));
}

#[test]
fn test_role_arn_is_only_required_by_sync() {
    let (_tmp, config_path) = setup_test_env("");
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .lines()
        .filter(|line| !line.starts_with("role_arn"))
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_kbsync(&config_path, &["sync", "--dry-run"]);
    assert!(success, "dry run failed: {}", stderr);

    let (_, stderr, success) = run_kbsync(&config_path, &["provision"]);
    assert!(!success);
    assert!(stderr.contains("AWS_ACCESS_KEY_ID"));
    assert!(!stderr.contains("role_arn"));

    let (_, stderr, success) = run_kbsync(&config_path, &["sync", "--progress", "off"]);
    assert!(!success);
    assert!(stderr.contains("knowledge_base.role_arn"));
}
