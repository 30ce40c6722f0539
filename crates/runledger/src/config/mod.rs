pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApiConfig, CacheConfig, LedgerConfig, LogFormat, LoggingConfig, RefreshConfig, RetryConfig,
    DEFAULT_API_BASE_URL, ENV_API_BASE_URL, ENV_DATABASE_PATH,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;

    fn clear_env() {
        std::env::remove_var(ENV_API_BASE_URL);
        std::env::remove_var(ENV_DATABASE_PATH);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(ENV_API_BASE_URL, "https://staging.example.com/api/v1");
        std::env::set_var(ENV_DATABASE_PATH, "/tmp/runledger-test.db");

        let mut config = LedgerConfig::default();
        config.apply_env_overrides();
        clear_env();

        assert_eq!(config.api.base_url, "https://staging.example.com/api/v1");
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/tmp/runledger-test.db"))
        );
    }

    #[test]
    #[serial]
    fn test_blank_env_is_ignored() {
        clear_env();
        std::env::set_var(ENV_API_BASE_URL, "   ");

        let mut config = LedgerConfig::default();
        config.apply_env_overrides();
        clear_env();

        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
        assert!(config.database_path.is_none());
    }

    #[test]
    #[serial]
    fn test_override_is_revalidated() {
        clear_env();
        std::env::set_var(ENV_API_BASE_URL, "localhost:8000");

        let mut config = LedgerConfig::default();
        config.apply_env_overrides();
        clear_env();

        assert!(config.validate().is_err());
    }
}
