use std::path::Path;

use crate::config::schema::LedgerConfig;
use crate::error::ConfigError;
use crate::query::MAX_PAGE_SIZE;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<LedgerConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: LedgerConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub(crate) fn validate_config(config: &LedgerConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    let base_url = &config.api.base_url;
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(invalid(format!(
            "api.base_url must start with http:// or https://, got '{}'",
            base_url
        )));
    }
    if config.api.timeout_secs == 0 {
        return Err(invalid("api.timeout_secs must be greater than 0"));
    }

    if config.retry.window_hours == 0 {
        return Err(invalid("retry.window_hours must be greater than 0"));
    }

    if config.refresh.poll_interval_secs == 0 {
        return Err(invalid("refresh.poll_interval_secs must be greater than 0"));
    }
    if config.refresh.tick_interval_secs == 0 {
        return Err(invalid("refresh.tick_interval_secs must be greater than 0"));
    }
    if config.refresh.page_size == 0 || config.refresh.page_size > MAX_PAGE_SIZE {
        return Err(invalid(format!(
            "refresh.page_size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, config.refresh.page_size
        )));
    }

    if config.cache.ttl_secs == 0 || config.cache.max_entries == 0 {
        return Err(invalid("cache.ttl_secs and cache.max_entries must be greater than 0"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
