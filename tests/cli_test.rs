//! CLI integration tests for the incident-spec binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("incident-spec"))
}

// Helper to create a temp layer or records file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const CUSTOM_LAYER: &str = r#"{
    "name": "custom",
    "fields": {
        "mac_address": {
            "type": "regex_text",
            "in_params": "optional",
            "in_result": "optional",
            "regex": "^(?:[0-9A-F]{2}(?:[:-]|$)){6}$"
        },
        "category": {"ext": {"enum_values": ["bots", "my-custom-category"]}}
    }
}"#;

const RECORDS: &str = r#"[
    {"id": "a1", "source": "hidden.source", "restriction": "public",
     "confidence": "low", "category": "bots", "time": "2024-05-01T12:00:00+02:00",
     "fqdn": "Example.ORG"},
    {"id": "a2", "source": "hidden.source", "restriction": "public",
     "confidence": "low", "category": "bots", "time": "2024-05-01T12:00:00Z",
     "count": -1}
]"#;

mod keys_command {
    use super::*;

    #[test]
    fn required_result_keys() {
        cmd()
            .args(["keys", "--side", "results", "--which", "required"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""category""#))
            .stdout(predicate::str::contains(r#""ip""#).not());
    }

    #[test]
    fn single_value_params() {
        cmd()
            .args(["keys", "--single-only"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""time.min""#))
            .stdout(predicate::str::contains(r#""cc""#).not());
    }

    #[test]
    fn single_and_multi_conflict() {
        cmd()
            .args(["keys", "--single-only", "--multi-only"])
            .assert()
            .failure();
    }

    #[test]
    fn layer_adds_keys() {
        let dir = TempDir::new().unwrap();
        let layer = write_temp_file(&dir, "custom.json", CUSTOM_LAYER);

        cmd()
            .args(["keys", "--layer", layer.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""mac_address""#));
    }
}

mod clean_params_command {
    use super::*;

    #[test]
    fn values_are_cleaned() {
        cmd()
            .args(["clean-params", "cc=pl,de"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"cc":["PL","DE"]}"#));
    }

    #[test]
    fn discarded_key_is_dropped() {
        cmd()
            .args(["clean-params", "cc=pl", "target=x", "--discard", "target"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"cc":["PL"]}"#));
    }

    #[test]
    fn illegal_key_fails() {
        cmd()
            .args(["clean-params", "time=2024-05-01"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Illegal query parameters"));
    }

    #[test]
    fn bad_value_reports_public_message() {
        cmd()
            .args(["clean-params", "ip=1.2.3"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("is not a valid IPv4 address"));
    }

    #[test]
    fn malformed_pair_fails() {
        cmd()
            .args(["clean-params", "nonsense"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("expected KEY=VALUE"));
    }

    #[test]
    fn custom_layer_is_applied() {
        let dir = TempDir::new().unwrap();
        let layer = write_temp_file(&dir, "custom.json", CUSTOM_LAYER);

        cmd()
            .args([
                "clean-params",
                "--layer",
                layer.to_str().unwrap(),
                "mac_address=00:1A:2B:3C:4D:5E",
                "category=my-custom-category",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("my-custom-category"));
    }

    #[test]
    fn missing_layer_file() {
        cmd()
            .args(["clean-params", "--layer", "/nonexistent/layer.json", "cc=pl"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn broken_layer_declaration() {
        let dir = TempDir::new().unwrap();
        let layer = write_temp_file(
            &dir,
            "broken.json",
            r#"{"fields": {"x": {"type": "no_such_type"}}}"#,
        );

        cmd()
            .args(["clean-params", "--layer", layer.to_str().unwrap(), "cc=pl"])
            .assert()
            .code(2);
    }

    #[test]
    fn debug_logging_goes_to_stderr() {
        cmd()
            .args(["clean-params", "cc=pl", "--log-level", "debug"])
            .assert()
            .success()
            .stderr(predicate::str::contains("data spec resolved"))
            .stdout(predicate::str::contains("data spec resolved").not());
    }
}

mod clean_results_command {
    use super::*;

    #[test]
    fn stops_at_first_invalid_record() {
        let dir = TempDir::new().unwrap();
        let records = write_temp_file(&dir, "records.json", RECORDS);

        cmd()
            .args(["clean-results", records.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Internal error."))
            .stdout(predicate::str::contains(r#""record":1"#));
    }

    #[test]
    fn skip_invalid_keeps_valid_records() {
        let dir = TempDir::new().unwrap();
        let records = write_temp_file(&dir, "records.json", RECORDS);

        cmd()
            .args(["clean-results", records.to_str().unwrap(), "--skip-invalid"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""fqdn":"example.org""#))
            .stdout(predicate::str::contains(r#""id":"a2""#).not());
    }

    #[test]
    fn missing_records_file() {
        cmd()
            .args(["clean-results", "/nonexistent/records.json"])
            .assert()
            .code(3);
    }
}

mod lint_command {
    use super::*;

    #[test]
    fn valid_layer_passes() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "custom.json", CUSTOM_LAYER);

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("all passed"));
    }

    #[test]
    fn invalid_layer_fails() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "bad.json", "{ not json }");

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("E001"));
    }

    #[test]
    fn warnings_fail_in_strict_mode() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "unnamed.json", r#"{"fields": {}}"#);

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .success();

        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--strict"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("W003"));
    }

    #[test]
    fn json_format() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "custom.json", CUSTOM_LAYER);

        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""files_checked": 1"#));
    }

    #[test]
    fn missing_path() {
        cmd()
            .args(["lint", "/nonexistent/dir"])
            .assert()
            .code(3);
    }
}
