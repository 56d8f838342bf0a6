//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::MonitorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<MonitorConfig, ConfigError> {
    let config: MonitorConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Scheme;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [breaker]
        failure_threshold = 2
        reset_timeout_ms = 1000

        [[services]]
        name = "image-server"
        port = 8081

        [[services]]
        name = "gateway"
        host = "10.0.0.7"
        port = 8443
        scheme = "https"
        health_path = "/actuator/health"

        [services.breaker]
        failure_threshold = 5
    "#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.breaker.reset_timeout_ms, 1000);
        // Unset fields keep their defaults
        assert_eq!(config.breaker.monitoring_period_ms, 10_000);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[1].scheme, Scheme::Https);
        assert_eq!(
            config.services[1].breaker.as_ref().and_then(|b| b.failure_threshold),
            Some(5)
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_unknown_scheme_is_parse_error() {
        let err = parse_config(
            r#"
            [[services]]
            name = "x"
            port = 1
            scheme = "gopher"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_semantic_errors_are_reported() {
        let err = parse_config("[breaker]\nfailure_threshold = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }
}
