//! CLI integration tests for doc-schema binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("doc-schema"))
}

// Helper to create a temp model file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const MODELS: &str = r#"{
    "Person": {
        "fields": {
            "name": { "type": "String", "required": true, "description": "Full name" },
            "password": { "type": "String", "select": false }
        }
    },
    "Book": {
        "fields": {
            "title": { "type": "String", "required": true },
            "year": "Number",
            "author": { "type": "ObjectId", "ref": "Person", "required": true }
        },
        "options": { "versionKey": "__v" }
    }
}"#;

fn models(dir: &TempDir) -> std::path::PathBuf {
    write_temp_file(dir, "models.json", MODELS)
}

fn stdout_json(command: &mut Command) -> Value {
    let output = command.output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

mod describe_command {
    use super::*;

    #[test]
    fn basic_describe() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        cmd()
            .args(["describe", models.to_str().unwrap(), "Book"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""title":"Book""#))
            .stdout(predicate::str::contains(r#""required":["title","author"]"#))
            .stdout(predicate::str::contains(r#""x-ref":"Person""#));
    }

    #[test]
    fn describe_with_pretty() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        cmd()
            .args(["describe", models.to_str().unwrap(), "Book", "--pretty"])
            .assert()
            .success()
            // Pretty output has newlines and indentation
            .stdout(predicate::str::contains("{\n"));
    }

    #[test]
    fn describe_with_output_file() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);
        let output = dir.path().join("book.schema.json");

        cmd()
            .args([
                "describe",
                models.to_str().unwrap(),
                "Book",
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let content = fs::read_to_string(&output).unwrap();
        let schema: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(schema["title"], json!("Book"));
    }

    #[test]
    fn describe_with_string_selection() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        let schema = stdout_json(cmd().args([
            "describe",
            models.to_str().unwrap(),
            "Book",
            "--select",
            "title -_id",
        ]));
        assert_eq!(
            schema,
            json!({
                "title": "Book",
                "type": "object",
                "properties": { "title": { "type": "string" } }
            })
        );
    }

    #[test]
    fn describe_with_json_selection() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        let schema = stdout_json(cmd().args([
            "describe",
            models.to_str().unwrap(),
            "Book",
            "--select",
            r#"{"year": 0, "__v": 0}"#,
        ]));
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("title"));
        assert!(properties.contains_key("author"));
        assert!(!properties.contains_key("year"));
        assert!(!properties.contains_key("__v"));
        assert!(schema.get("required").is_none());
    }

    #[test]
    fn describe_with_population() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        let schema = stdout_json(cmd().args([
            "describe",
            models.to_str().unwrap(),
            "Book",
            "--select",
            "title author",
            "--populate",
            r#"{"path": "author", "select": "name +password -_id"}"#,
        ]));
        assert_eq!(
            schema["properties"]["author"],
            json!({
                "title": "Person",
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Full name" },
                    "password": { "type": "string" }
                },
                "x-ref": "Person",
                "description": "Refers to Person"
            })
        );
    }

    #[test]
    fn describe_with_readonly_rules() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        let schema = stdout_json(cmd().args([
            "describe",
            models.to_str().unwrap(),
            "Book",
            "--readonly",
            "_id$",
            "--readonly",
            "^__v$",
        ]));
        let properties = schema["properties"].as_object().unwrap();
        assert!(!properties.contains_key("_id"));
        assert!(!properties.contains_key("__v"));
        assert_eq!(schema["required"], json!(["title", "author"]));
    }

    #[test]
    fn describe_list_with_limit() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        let schema = stdout_json(cmd().args([
            "describe",
            models.to_str().unwrap(),
            "Person",
            "--list",
            "--limit",
            "10",
        ]));
        assert_eq!(schema["title"], json!("List of People"));
        assert_eq!(schema["type"], json!("array"));
        assert_eq!(schema["maxItems"], json!(10));
        assert!(schema["items"].get("title").is_none());
        assert!(schema["items"].get("required").is_none());
    }

    #[test]
    fn describe_with_config_file() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);
        let config = write_temp_file(
            &dir,
            "config.json",
            r#"{"fieldOptionsMapping": {"description": "x-notes"}}"#,
        );

        cmd()
            .args([
                "describe",
                models.to_str().unwrap(),
                "Person",
                "--config",
                config.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""x-notes":"Full name""#));
    }
}

mod check_command {
    use super::*;

    #[test]
    fn check_passing_models() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        cmd()
            .args(["check", models.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 types checked, all passed"));
    }

    #[test]
    fn check_json_format() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        let result = stdout_json(cmd().args([
            "check",
            models.to_str().unwrap(),
            "--format",
            "json",
        ]));
        assert_eq!(result["types_checked"], json!(2));
        assert_eq!(result["failed"], json!(0));
        assert_eq!(result["results"][0]["status"], json!("ok"));
    }

    #[test]
    fn check_reports_dangling_reference() {
        let dir = TempDir::new().unwrap();
        let models = write_temp_file(
            &dir,
            "models.json",
            r#"{"Book": {"fields": {"author": {"type": "ObjectId", "ref": "Person"}}}}"#,
        );

        cmd()
            .args(["check", models.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("W001"))
            .stdout(predicate::str::contains("/properties/author"));

        cmd()
            .args(["check", models.to_str().unwrap(), "--strict"])
            .assert()
            .code(1);
    }

    #[test]
    fn check_reports_compile_error() {
        let dir = TempDir::new().unwrap();
        let models = write_temp_file(
            &dir,
            "models.json",
            r#"{"Book": {"fields": {"a": "String", "a.b": "String"}}}"#,
        );

        cmd()
            .args(["check", models.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("E001"))
            .stdout(predicate::str::contains("1 failed"));
    }

    #[test]
    fn check_quiet_hides_passing_types() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        cmd()
            .args(["check", models.to_str().unwrap(), "--quiet"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Person").not())
            .stdout(predicate::str::contains("Checking").not());
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn file_not_found() {
        cmd()
            .args(["describe", "/nonexistent/models.json", "Book"])
            .assert()
            .code(3)
            .stderr(
                predicate::str::contains("not found").or(predicate::str::contains("No such file")),
            );
    }

    #[test]
    fn invalid_json_models() {
        let dir = TempDir::new().unwrap();
        let models = write_temp_file(&dir, "bad.json", r#"{ not valid json"#);

        cmd()
            .args(["describe", models.to_str().unwrap(), "Book"])
            .assert()
            .code(2);
    }

    #[test]
    fn unknown_type() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        cmd()
            .args(["describe", models.to_str().unwrap(), "Magazine"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown document type 'Magazine'"));
    }

    #[test]
    fn unmappable_field_type() {
        let dir = TempDir::new().unwrap();
        let models = write_temp_file(
            &dir,
            "models.json",
            r#"{"Book": {"fields": {"price": "Decimal128"}}}"#,
        );

        cmd()
            .args(["describe", models.to_str().unwrap(), "Book"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Decimal128"));
    }

    #[test]
    fn invalid_selection_json() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        cmd()
            .args([
                "describe",
                models.to_str().unwrap(),
                "Book",
                "--select",
                "[\"title\", ",
            ])
            .assert()
            .code(2);
    }

    #[test]
    fn invalid_readonly_pattern() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        cmd()
            .args([
                "describe",
                models.to_str().unwrap(),
                "Book",
                "--readonly",
                "(unclosed",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid redaction pattern"));
    }

    #[test]
    fn invalid_config_option() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);
        let config = write_temp_file(&dir, "config.json", r#"{"fieldOptionsMapping": 5}"#);

        cmd()
            .args([
                "describe",
                models.to_str().unwrap(),
                "Book",
                "--config",
                config.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("fieldsMapping Error"));
    }
}

mod required_args {
    use super::*;

    #[test]
    fn missing_type_name() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        cmd()
            .args(["describe", models.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("TYPE"));
    }

    #[test]
    fn limit_requires_list() {
        let dir = TempDir::new().unwrap();
        let models = models(&dir);

        cmd()
            .args(["describe", models.to_str().unwrap(), "Book", "--limit", "3"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--list"));
    }

    #[test]
    fn missing_models_path() {
        cmd().args(["check"]).assert().failure();
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Compile document models into JSON Schemas"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("doc-schema"));
    }

    #[test]
    fn describe_help() {
        cmd()
            .args(["describe", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--select"))
            .stdout(predicate::str::contains("--populate"))
            .stdout(predicate::str::contains("--readonly"));
    }
}
