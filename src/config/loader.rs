//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::NetfsConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file into a config without validating it.
///
/// Validation runs after CLI overrides are applied, see [`crate::config::cli`].
pub fn read_config(path: &Path) -> Result<NetfsConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: NetfsConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
root = "/srv/share"

[ftp]
username = "ops"
"#
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(config.root, Path::new("/srv/share"));
        assert_eq!(config.ftp.username, "ops");
        assert_eq!(config.ftp.password, "password");
        assert_eq!(config.http.bind_address, ":8000");
        assert_eq!(config.shutdown.grace_period_ms, 2_000);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "root = [").unwrap();

        assert!(matches!(
            read_config(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn semantic_errors_are_reported_together() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[http]
bind_address = "not an address"

[shutdown]
grace_period_ms = 5000
service_ack_timeout_ms = 1000
"#
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();
        match crate::config::validation::validate_config(&config) {
            Err(errors) => assert_eq!(errors.len(), 2),
            Ok(()) => panic!("expected validation errors"),
        }
    }
}
