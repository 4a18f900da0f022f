//! Integration tests for config-review
//!
//! These drive the binary end to end over config trees on disk.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a config-review Command
fn config_review() -> Command {
    let mut cmd = cargo_bin_cmd!("config-review");
    cmd.env_remove("RUST_LOG")
        .env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_REPOSITORY")
        .env_remove("GITHUB_API_URL");
    cmd
}

fn write_json(root: &Path, rel: &str, value: &Value) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn base_config() -> Value {
    json!({
        "version": 1700000000000u64,
        "features": {
            "elementHiding": {
                "state": "enabled",
                "hash": "8b1a9953c4611296a827abf8c47804d7",
                "exceptions": [],
                "settings": {"rules": [], "domains": []}
            },
            "trackerAllowlist": {
                "state": "enabled",
                "hash": "5d41402abc4b2a76b9719d911017c592",
                "exceptions": [],
                "settings": {"allowlistedTrackers": {}}
            }
        },
        "unprotectedTemporary": []
    })
}

/// A project dir plus old/new trees with identical `v4` and `v3` output.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for tree in ["old", "new"] {
            write_json(&dir.path().join(tree), "v4/config.json", &base_config());
            write_json(&dir.path().join(tree), "v3/config.json", &base_config());
        }
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write_new(&self, rel: &str, value: &Value) {
        write_json(&self.path().join("new"), rel, value);
    }

    fn compare(&self) -> Command {
        let mut cmd = config_review();
        cmd.current_dir(self.path()).args(["compare", "old", "new"]);
        cmd
    }
}

fn with_exception() -> Value {
    let mut config = base_config();
    config["features"]["elementHiding"]["exceptions"] = json!([{"domain": "x.com"}]);
    config
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        config_review().arg("--help").assert().success();
    }

    #[test]
    fn test_version() {
        config_review()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("config-review"));
    }

    #[test]
    fn test_compare_requires_two_trees() {
        config_review()
            .args(["compare", "only-one"])
            .assert()
            .failure()
            .code(2);
    }

    #[test]
    fn test_compare_rejects_extra_arguments() {
        config_review()
            .args(["compare", "a", "b", "c"])
            .assert()
            .failure()
            .code(2);
    }

    #[test]
    fn test_compare_missing_tree_fails() {
        let fixture = Fixture::new();
        config_review()
            .current_dir(fixture.path())
            .args(["compare", "old", "does-not-exist"])
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("does-not-exist"));
    }
}

// =============================================================================
// Compare Tests
// =============================================================================

mod compare {
    use super::*;

    #[test]
    fn test_exception_only_change_is_auto_approved() {
        let fixture = Fixture::new();
        let mut config = with_exception();
        config["version"] = json!(1700000999999u64);
        fixture.write_new("v4/config.json", &config);

        let output = fixture.compare().assert().success().get_output().stdout.clone();
        let text = String::from_utf8(output).unwrap();
        assert!(text.trim_end().ends_with("AUTO-APPROVED"), "{}", text);
        assert!(text.contains("- x.com"));
    }

    #[test]
    fn test_settings_change_requires_manual_review() {
        let fixture = Fixture::new();
        let mut config = with_exception();
        config["features"]["elementHiding"]["settings"]["rules"] =
            json!([{"selector": ".ad-banner", "type": "hide-empty"}]);
        fixture.write_new("v4/config.json", &config);

        let output = fixture
            .compare()
            .args(["--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let report: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(report["verdict"]["should_approve"], false);

        let doc = &report["sections"][0]["documents"][0];
        assert_eq!(doc["status"], "manual_review");
        let disallowed = doc["disallowed"].as_array().unwrap();
        assert_eq!(disallowed.len(), 1);
        assert_eq!(disallowed[0]["op"], "add");
        assert_eq!(disallowed[0]["path"], "/features/elementHiding/settings/rules/0");
    }

    #[test]
    fn test_manual_review_markdown_ends_with_sentinel() {
        let fixture = Fixture::new();
        let mut config = base_config();
        config["features"]["trackerAllowlist"]["state"] = json!("disabled");
        fixture.write_new("v4/config.json", &config);

        fixture
            .compare()
            .assert()
            .success()
            .stdout(predicate::str::ends_with("MANUAL REVIEW REQUIRED\n"))
            .stdout(predicate::str::contains("replace /features/trackerAllowlist/state"));
    }

    #[test]
    fn test_added_document_never_disallowed() {
        let fixture = Fixture::new();
        fixture.write_new("v4/config.json", &with_exception());
        fixture.write_new("v4/android-config.json", &base_config());

        let output = fixture
            .compare()
            .args(["--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let report: Value = serde_json::from_slice(&output).unwrap();

        let docs = report["sections"][0]["documents"].as_array().unwrap();
        let added = docs
            .iter()
            .find(|d| d["path"] == "v4/android-config.json")
            .unwrap();
        assert_eq!(added["status"], "added");
        assert!(added.get("disallowed").is_none());
        assert_eq!(report["verdict"]["should_approve"], false);
    }

    #[test]
    fn test_legacy_change_blocks_approval() {
        let fixture = Fixture::new();
        fixture.write_new("v4/config.json", &with_exception());
        let mut legacy = base_config();
        legacy["unprotectedTemporary"] = json!([{"domain": "y.com"}]);
        fixture.write_new("v3/config.json", &legacy);

        fixture
            .compare()
            .assert()
            .success()
            .stdout(predicate::str::contains("## legacy"))
            .stdout(predicate::str::contains("legacy: v3/config.json"))
            .stdout(predicate::str::ends_with("MANUAL REVIEW REQUIRED\n"));
    }

    #[test]
    fn test_new_epoch_short_circuits() {
        let fixture = Fixture::new();
        fixture.write_new("v5/config.json", &base_config());

        fixture
            .compare()
            .assert()
            .success()
            .stdout(predicate::str::contains("New epoch `v5`"))
            .stdout(predicate::str::ends_with("MANUAL REVIEW REQUIRED\n"));
    }

    #[test]
    fn test_malformed_document_is_reported() {
        let fixture = Fixture::new();
        fs::write(fixture.path().join("new/v4/config.json"), "{\"version\": ").unwrap();

        fixture
            .compare()
            .assert()
            .success()
            .stdout(predicate::str::contains("### Errors (1)"))
            .stdout(predicate::str::contains("v4/config.json"))
            .stdout(predicate::str::ends_with("MANUAL REVIEW REQUIRED\n"));
    }

    #[test]
    fn test_output_file() {
        let fixture = Fixture::new();
        fixture.write_new("v4/config.json", &with_exception());

        fixture
            .compare()
            .args(["--output", "report.md"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Report written to report.md"));

        let report = fs::read_to_string(fixture.path().join("report.md")).unwrap();
        assert!(report.trim_end().ends_with("AUTO-APPROVED"));
    }

    #[test]
    fn test_configured_permissions_replace_stock_table() {
        let fixture = Fixture::new();
        fs::create_dir_all(fixture.path().join(".config-review")).unwrap();
        fs::write(
            fixture.path().join(".config-review/review.toml"),
            r#"
[permissions]
"/features/trackerAllowlist" = ["/exceptions"]
"#,
        )
        .unwrap();
        fixture.write_new("v4/config.json", &with_exception());

        // elementHiding is no longer covered by any root.
        fixture
            .compare()
            .assert()
            .success()
            .stdout(predicate::str::ends_with("MANUAL REVIEW REQUIRED\n"));
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

mod lifecycle {
    use super::*;

    fn decide(state: &str, event: &str, verdict: &str) -> String {
        let output = config_review()
            .args(["decide", "--state", state, "--event", event, "--verdict", verdict])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(output).unwrap().trim().to_string()
    }

    #[test]
    fn test_decide_rows() {
        assert_eq!(decide("none", "opened", "approvable"), "submit");
        assert_eq!(decide("none", "opened", "not-approvable"), "none");
        assert_eq!(decide("active", "opened", "approvable"), "none");
        assert_eq!(decide("active", "amended", "approvable"), "dismiss");
        assert_eq!(decide("active", "synchronize", "not-approvable"), "dismiss");
        assert_eq!(decide("dismissed", "verification-completed", "approvable"), "submit");
        assert_eq!(decide("none", "amended", "approvable"), "none");
    }

    #[test]
    fn test_decide_rejects_unknown_event() {
        config_review()
            .args(["decide", "--state", "none", "--event", "closed", "--verdict", "approvable"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid event"));
    }

    #[test]
    fn test_review_requires_repository() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("report.md"), "AUTO-APPROVED\n").unwrap();

        config_review()
            .current_dir(dir.path())
            .args(["review", "--event", "opened", "--report", "report.md", "--pr", "12"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No repository configured"));
    }

    #[test]
    fn test_review_requires_token() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("report.md"), "AUTO-APPROVED\n").unwrap();

        config_review()
            .current_dir(dir.path())
            .args([
                "review", "--event", "opened", "--report", "report.md", "--pr", "12", "--repo",
                "owner/repo",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("GITHUB_TOKEN"));
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        config_review()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No review.toml found"))
            .stdout(predicate::str::contains("Project dir: "))
            .stdout(predicate::str::contains("\"/features/*\""))
            .stdout(predicate::str::contains("governed by the wildcard root"));
    }

    #[test]
    fn test_config_show_reports_project_dir() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("repo");
        std::fs::create_dir_all(project.join(".config-review")).unwrap();
        std::fs::write(
            project.join(".config-review/review.toml"),
            "[compare]\ncurrent_epoch = \"v7\"\n",
        )
        .unwrap();

        config_review()
            .current_dir(dir.path())
            .arg("--project-dir")
            .arg(&project)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!(
                "Project dir: {}",
                project.display()
            )))
            .stdout(predicate::str::contains("current_epoch = \"v7\""));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = TempDir::new().unwrap();
        config_review()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created review.toml"));

        let content = fs::read_to_string(dir.path().join(".config-review/review.toml")).unwrap();
        assert!(content.contains("[permissions]"));
        assert!(content.contains("/settings/domains"));

        config_review()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        config_review()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            r#"
[compare]
current_epoch = "latest"

[permissions]
"features/x" = ["exceptions"]
"#,
        )
        .unwrap();

        config_review()
            .current_dir(dir.path())
            .args(["--config", "custom.toml", "config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings:"))
            .stdout(predicate::str::contains("must start with '/'"))
            .stdout(predicate::str::contains("current_epoch 'latest'"));
    }
}
