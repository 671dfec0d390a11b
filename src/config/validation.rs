//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate bind addresses and timing relationships
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NetfsConfig → Result<(), Vec<ValidationError>>

use crate::config::schema::NetfsConfig;
use crate::net::listener::parse_bind_address;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}'")]
    BindAddress { field: &'static str, value: String },
    #[error("ftp.username cannot be empty")]
    EmptyUsername,
    #[error("ftp.max_sessions must be greater than 0")]
    NoSessions,
    #[error("shutdown.grace_period_ms must be greater than 0")]
    ZeroGracePeriod,
    #[error("shutdown.service_ack_timeout_ms ({ack}) must exceed grace_period_ms ({grace})")]
    AckNotAfterGrace { grace: u64, ack: u64 },
}

/// Check a config for semantic errors.
pub fn validate_config(config: &NetfsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("http.bind_address", &config.http.bind_address),
        ("ftp.bind_address", &config.ftp.bind_address),
    ] {
        if parse_bind_address(value).is_err() {
            errors.push(ValidationError::BindAddress {
                field,
                value: value.clone(),
            });
        }
    }

    if config.ftp.username.is_empty() {
        errors.push(ValidationError::EmptyUsername);
    }
    if config.ftp.max_sessions == 0 {
        errors.push(ValidationError::NoSessions);
    }

    let shutdown = &config.shutdown;
    if shutdown.grace_period_ms == 0 {
        errors.push(ValidationError::ZeroGracePeriod);
    }
    if shutdown.service_ack_timeout_ms <= shutdown.grace_period_ms {
        errors.push(ValidationError::AckNotAfterGrace {
            grace: shutdown.grace_period_ms,
            ack: shutdown.service_ack_timeout_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
