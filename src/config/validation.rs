//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Smallest line limit that still fits a login request.
const MIN_LINE_LENGTH: usize = 64;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.workers must be at least 1")]
    ZeroWorkers,
    #[error("limits.outbound_queue must be at least 1")]
    ZeroOutboundQueue,
    #[error("listen.max_line_length must be at least 64, got {0}")]
    LineLengthTooSmall(usize),
    #[error("offline.path is required for persistent backends")]
    MissingOfflinePath,
    #[error("offline.path parent directory does not exist: {0}")]
    OfflinePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.workers == Some(0) {
        errors.push(ValidationError::ZeroWorkers);
    }
    if config.limits.outbound_queue == 0 {
        errors.push(ValidationError::ZeroOutboundQueue);
    }
    if config.listen.max_line_length < MIN_LINE_LENGTH {
        errors.push(ValidationError::LineLengthTooSmall(
            config.listen.max_line_length,
        ));
    }

    if config.offline.backend.is_persistent() {
        let path = config.offline.path.trim();
        if path.is_empty() {
            errors.push(ValidationError::MissingOfflinePath);
        } else if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::OfflinePathInvalid(path.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
