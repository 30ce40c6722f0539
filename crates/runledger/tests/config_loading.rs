//! Table-driven tests for configuration loading and validation.

use std::time::Duration;

use runledger::config::{load_config, load_config_from_str, LogFormat};
use runledger::{Database, ExtractionApiClient, RunLedger, SystemClock};

/// A single config loading test case.
struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    /// Substring of the error when loading should fail.
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "database_path": "/var/lib/runledger/ledger.db",
            "api": { "base_url": "https://extract.internal/api/v1", "timeout_secs": 10 },
            "retry": { "window_hours": 24 },
            "refresh": { "poll_interval_secs": 5, "tick_interval_secs": 1, "page_size": 50 },
            "cache": { "ttl_secs": 15, "max_entries": 128 },
            "logging": { "level": "runledger=debug", "format": "json" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_version",
        config_json: r#"{ "api": {} }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_section",
        config_json: r#"{ "version": "1.0", "metrics": { "enabled": true } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_log_format",
        config_json: r#"{ "version": "1.0", "logging": { "format": "xml" } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{ "version": "2.0" }"#,
        should_succeed: false,
        expected_error: Some("Unsupported config version"),
    },
    ConfigTestCase {
        name: "base_url_without_scheme",
        config_json: r#"{ "version": "1.0", "api": { "base_url": "localhost:8000" } }"#,
        should_succeed: false,
        expected_error: Some("api.base_url"),
    },
    ConfigTestCase {
        name: "zero_retry_window",
        config_json: r#"{ "version": "1.0", "retry": { "window_hours": 0 } }"#,
        should_succeed: false,
        expected_error: Some("retry.window_hours"),
    },
    ConfigTestCase {
        name: "zero_poll_interval",
        config_json: r#"{ "version": "1.0", "refresh": { "poll_interval_secs": 0 } }"#,
        should_succeed: false,
        expected_error: Some("refresh.poll_interval_secs"),
    },
    ConfigTestCase {
        name: "page_size_too_large",
        config_json: r#"{ "version": "1.0", "refresh": { "page_size": 500 } }"#,
        should_succeed: false,
        expected_error: Some("refresh.page_size"),
    },
    ConfigTestCase {
        name: "malformed_json",
        config_json: r#"{ "version": "1.0", "#,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
];

#[test]
fn test_config_loading() {
    for test_case in CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_defaults_applied() {
    let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
    assert_eq!(config.api.base_url, "http://localhost:8000/api/v1");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.retry.window_hours, 48);
    assert_eq!(config.refresh.poll_interval(), Duration::from_secs(10));
    assert_eq!(config.refresh.tick_interval(), Duration::from_secs(1));
    assert_eq!(config.refresh.page_size, 20);
    assert_eq!(config.cache.ttl_secs, 30);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert!(config.database_path.is_none());
}

#[test]
fn test_config_file_wires_components() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("ledger").join("runs.db");
    let config_path = dir.path().join("runledger.json");
    let content = serde_json::json!({
        "version": "1.0",
        "database_path": db_path,
        "api": { "base_url": "http://127.0.0.1:9/api/v1/" },
        "retry": { "window_hours": 12 }
    });
    std::fs::write(&config_path, content.to_string()).unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.resolved_database_path(), Some(db_path.clone()));
    assert_eq!(config.retry.policy().window_hours(), 12);

    let db = Database::open(&db_path).unwrap();
    let ledger = RunLedger::new(db, std::sync::Arc::new(SystemClock));
    assert_eq!(ledger.metrics().unwrap().total_documents, 0);
    assert!(db_path.exists());

    let client = ExtractionApiClient::new(&config.api).unwrap();
    assert_eq!(client.base_url(), "http://127.0.0.1:9/api/v1");
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/runledger.json").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
