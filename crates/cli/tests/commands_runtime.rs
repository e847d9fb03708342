use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use chrono::NaiveDate;
use serde_json::Value;
use tallyline_cli::commands::{commit, config, migrate, parse, seed};
use tempfile::TempDir;

const DAILY_REPORT: &str = "Friday sales\n\
    ✅ Janet Johnson---#9,680(2 iced coffee)\n\
    ✅ Deborah #13,440 (1 granola 500g, 2 zobo)\n\
    Ada / 0803 123 4567 / #4,000 / (1 meat pie) / instagram\n\
    Total: #27,120\n";

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("TALLYLINE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("TALLYLINE_DATABASE_URL", "postgres://localhost/tallyline")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[("TALLYLINE_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["status"], "ok");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["message"], second_payload["message"]);

        let message = first_payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("default catalog loaded (20 products)"));
        assert!(message.contains("p09"));
    });
}

#[test]
fn parse_prints_drafts_and_skipped_lines() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    let report = write_report(&dir, DAILY_REPORT);

    with_env(&[("TALLYLINE_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "seed should prepare the catalog");

        let result = parse::run(&report, report_date());
        assert_eq!(result.exit_code, 0, "expected parse success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "parse");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["drafts"].as_array().map(Vec::len), Some(3));
        assert_eq!(payload["data"]["lines_scanned"], 5);

        let skipped = payload["data"]["skipped"].as_array().cloned().unwrap_or_default();
        assert!(skipped.iter().any(|line| line["reason"]["kind"] == "summary_keyword"));
        assert_eq!(payload["data"]["drafts"][0]["customer_name"], "Janet Johnson");
    });
}

#[test]
fn parse_reports_no_orders_for_prose() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    let report = write_report(&dir, "good morning all\nshop opens at 9\n");

    with_env(&[("TALLYLINE_DATABASE_URL", &url)], || {
        let result = parse::run(&report, report_date());
        assert_eq!(result.exit_code, 8, "expected no-orders exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "no_orders");
        assert_eq!(payload["data"]["lines_scanned"], 2);
    });
}

#[test]
fn parse_reports_missing_input_file() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("TALLYLINE_DATABASE_URL", &url)], || {
        let result = parse::run(&dir.path().join("absent.txt"), report_date());
        assert_eq!(result.exit_code, 7, "expected input failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "input");
        assert!(payload["message"].as_str().unwrap_or_default().contains("absent.txt"));
    });
}

#[test]
fn commit_stores_every_parsed_order() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    let report = write_report(&dir, DAILY_REPORT);

    with_env(&[("TALLYLINE_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "seed should prepare the catalog");

        let result = commit::run(&report, report_date());
        assert_eq!(result.exit_code, 0, "expected commit success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "commit");
        assert_eq!(payload["message"], "committed 3 orders");

        let committed = payload["data"]["committed"].as_array().cloned().unwrap_or_default();
        assert_eq!(committed.len(), 3);
        assert!(committed
            .iter()
            .all(|entry| entry["order_id"].as_str().is_some_and(|id| id.starts_with("ORD-"))));
        assert_eq!(payload["data"]["failures"].as_array().map(Vec::len), Some(0));
    });
}

#[test]
fn commit_accepts_drafts_edited_after_parse() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    let report = write_report(&dir, DAILY_REPORT);

    with_env(&[("TALLYLINE_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "seed should prepare the catalog");

        let parsed = parse::run(&report, report_date());
        let mut payload = parse_payload(&parsed.output);
        payload["data"]["drafts"][2]["items"][0]["product_id"] = Value::from("p08");
        payload["data"]["drafts"][2]["customer_name"] = Value::from("Ada Obi");
        let reviewed = dir.path().join("reviewed.json");
        fs::write(&reviewed, payload.to_string()).expect("write reviewed drafts");

        let result = commit::run_reviewed(&reviewed);
        assert_eq!(result.exit_code, 0, "expected commit success: {}", result.output);

        let committed = parse_payload(&result.output);
        assert_eq!(committed["message"], "committed 3 orders");
        assert_eq!(committed["data"]["committed"][2]["order_idx"], 2);
    });
}

#[test]
fn commit_rejects_drafts_naming_unknown_products() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    let report = write_report(&dir, DAILY_REPORT);

    with_env(&[("TALLYLINE_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0, "seed should prepare the catalog");

        let parsed = parse_payload(&parse::run(&report, report_date()).output);
        let mut drafts = parsed["data"]["drafts"].clone();
        drafts[0]["items"][0]["product_id"] = Value::from("p99");
        let reviewed = dir.path().join("reviewed.json");
        fs::write(&reviewed, drafts.to_string()).expect("write reviewed drafts");

        let result = commit::run_reviewed(&reviewed);
        assert_eq!(result.exit_code, 7, "expected input failure: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "input");
        assert!(payload["message"].as_str().unwrap_or_default().contains("p99"));
    });
}

#[test]
fn config_attributes_env_and_default_sources() {
    with_env(
        &[
            ("TALLYLINE_DATABASE_URL", "sqlite::memory:"),
            ("TALLYLINE_LOG_LEVEL", "debug"),
        ],
        || {
            let output = config::run();
            assert!(output.contains(
                "- database.url = sqlite::memory: (source: env (TALLYLINE_DATABASE_URL))"
            ));
            assert!(output.contains("- logging.level = debug (source: env (TALLYLINE_LOG_LEVEL))"));
            assert!(output.contains("- intake.default_category = Cafe (source: default)"));
        },
    );
}

fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date")
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("tallyline.db").display())
}

fn write_report(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("report.txt");
    fs::write(&path, text).expect("write report");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TALLYLINE_DATABASE_URL",
        "TALLYLINE_DATABASE_MAX_CONNECTIONS",
        "TALLYLINE_DATABASE_TIMEOUT_SECS",
        "TALLYLINE_INTAKE_DEFAULT_CATEGORY",
        "TALLYLINE_INTAKE_DEFAULT_COST_RATIO",
        "TALLYLINE_INTAKE_DEFAULT_PAYMENT_METHOD",
        "TALLYLINE_INTAKE_BALANCE_TOLERANCE",
        "TALLYLINE_LOGGING_LEVEL",
        "TALLYLINE_LOGGING_FORMAT",
        "TALLYLINE_LOG_LEVEL",
        "TALLYLINE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
