use crate::error::*;
use std::time::Duration;
use tracing::{error, info};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::Fetch(e) => {
                error!("Fetch error details: {:?}", e);
            }
            CoreError::Storage(e) => {
                error!("Storage error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Fetch(e) => e.is_retryable(),
            CoreError::Storage(e) => e.is_retryable(),
            CoreError::Network(_) => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Fetch(e) => e.retry_after(),
            CoreError::Storage(e) => e.retry_after(),
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::Fetch(e) => e.user_friendly_message(),
            CoreError::Storage(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::Fetch(_) => "FETCH".to_string(),
            CoreError::Storage(_) => "STORAGE".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for FetchError {
    fn log_error(&self) -> &Self {
        error!("FetchError: {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimitExceeded { .. } => true,
            FetchError::RequestTimeout => true,
            FetchError::ServerError { status_code } => *status_code >= 500,
            FetchError::EndpointUnavailable { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(30)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            FetchError::AuthenticationFailed { .. } => {
                "Authentication failed. Please check your bearer token.".to_string()
            }
            FetchError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            FetchError::Forbidden { resource } => format!(
                "Access denied to {}. The account may be protected or suspended.",
                resource
            ),
            FetchError::UserNotFound { username } => {
                format!("User '{}' not found.", username)
            }
            FetchError::RequestTimeout => {
                "Timeline request timed out. Please try again.".to_string()
            }
            _ => "Timeline source error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            FetchError::AuthenticationFailed { .. } => "FETCH_AUTH_FAILED".to_string(),
            FetchError::RateLimitExceeded { .. } => "FETCH_RATE_LIMIT".to_string(),
            FetchError::Forbidden { .. } => "FETCH_FORBIDDEN".to_string(),
            FetchError::UserNotFound { .. } => "FETCH_USER_NOT_FOUND".to_string(),
            FetchError::EndpointUnavailable { .. } => "FETCH_ENDPOINT_UNAVAILABLE".to_string(),
            FetchError::RequestTimeout => "FETCH_TIMEOUT".to_string(),
            FetchError::InvalidResponse { .. } => "FETCH_INVALID_RESPONSE".to_string(),
            FetchError::ServerError { .. } => "FETCH_SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for StorageError {
    fn log_error(&self) -> &Self {
        error!("StorageError: {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        // Disk-full and permission problems need an operator, not a restart.
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            StorageError::CreateDir { path, .. } => format!(
                "Could not create directory {}. Please check permissions.",
                path.display()
            ),
            StorageError::Write { path, .. } | StorageError::Publish { path, .. } => format!(
                "Could not write {}. Please check permissions and free disk space.",
                path.display()
            ),
            StorageError::InvalidPathComponent { field, .. } => {
                format!("The post's {} cannot be used as a file name.", field)
            }
            _ => "Storage error occurred. Please check the output directory.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            StorageError::CreateDir { .. } => "STORAGE_CREATE_DIR_FAILED".to_string(),
            StorageError::Write { .. } => "STORAGE_WRITE_FAILED".to_string(),
            StorageError::Publish { .. } => "STORAGE_PUBLISH_FAILED".to_string(),
            StorageError::Encode { .. } => "STORAGE_ENCODE_FAILED".to_string(),
            StorageError::InvalidPathComponent { .. } => "STORAGE_INVALID_PATH".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false // Config errors are typically not retryable
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file {} not found.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::PermissionDenied { .. } => {
                "Permission denied accessing configuration. Please check file permissions."
                    .to_string()
            }
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::PermissionDenied { .. } => "CONFIG_PERMISSION_DENIED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

/// Logs a run-ending error along with what a supervisor should do about it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("User message: {}", error.user_friendly_message());
        match error.retry_after() {
            Some(retry_after) if error.is_retryable() => {
                info!("Error is transient. Restart after: {:?}", retry_after);
            }
            _ => info!("Error is not transient. Fix the cause before restarting."),
        }
    }
}
