//! Run configuration.
//!
//! Values are resolved once at startup in three layers: built-in defaults, an
//! optional TOML settings file, then explicit command-line flags.

use crate::error::ConfigError;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_LIMIT: u32 = 30;
pub const DEFAULT_SLEEP_SECONDS: u64 = 30;
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const BEARER_TOKEN_ENV: &str = "TWITTER_BEARER_TOKEN";

/// Immutable configuration for one polling run.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub username: String,
    pub limit: u32,
    pub sleep_seconds: u64,
    pub output_dir: PathBuf,
}

impl PollConfig {
    pub fn new(
        username: impl Into<String>,
        limit: u32,
        sleep_seconds: u64,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(ConfigError::MissingField {
                field: "username".to_string(),
            });
        }
        if limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limit".to_string(),
                value: limit.to_string(),
            });
        }

        Ok(Self {
            username,
            limit,
            sleep_seconds,
            output_dir: output_dir.into(),
        })
    }

    pub fn sleep_interval(&self) -> Duration {
        Duration::from_secs(self.sleep_seconds)
    }
}

/// Contents of the optional settings file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub poll: PollSettings,
    pub twitter: TwitterSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub limit: Option<u32>,
    pub sleep_seconds: Option<u64>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TwitterSettings {
    pub api_base: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            ErrorKind::PermissionDenied => ConfigError::PermissionDenied {
                path: path.display().to_string(),
            },
            _ => ConfigError::InvalidValue {
                field: "config".to_string(),
                value: format!("{}: {}", path.display(), e),
            },
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Flags given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub limit: Option<u32>,
    pub sleep_seconds: Option<u64>,
    pub output: Option<PathBuf>,
    pub api_base: Option<String>,
}

/// Connection settings for the HTTP timeline source.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub api_base: Url,
    pub bearer_token: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(api_base: &str, bearer_token: impl Into<String>) -> Result<Self, ConfigError> {
        let bearer_token = bearer_token.into();
        if bearer_token.trim().is_empty() {
            return Err(ConfigError::MissingEnvironmentVariable {
                var_name: BEARER_TOKEN_ENV.to_string(),
            });
        }

        let api_base = Url::parse(api_base).map_err(|e| ConfigError::InvalidValue {
            field: "api_base".to_string(),
            value: format!("{api_base} ({e})"),
        })?;
        if api_base.cannot_be_a_base() || !matches!(api_base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "api_base".to_string(),
                value: api_base.to_string(),
            });
        }

        Ok(Self {
            api_base,
            bearer_token,
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        })
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub fn default_user_agent() -> String {
    format!("timeline-archiver/{}", env!("CARGO_PKG_VERSION"))
}

/// Merges defaults, file settings and command-line flags into run configuration.
pub fn resolve(
    username: &str,
    bearer_token: Option<String>,
    settings: &Settings,
    overrides: Overrides,
    cwd: &Path,
) -> Result<(PollConfig, ApiConfig), ConfigError> {
    let poll = PollConfig::new(
        username,
        overrides
            .limit
            .or(settings.poll.limit)
            .unwrap_or(DEFAULT_LIMIT),
        overrides
            .sleep_seconds
            .or(settings.poll.sleep_seconds)
            .unwrap_or(DEFAULT_SLEEP_SECONDS),
        overrides
            .output
            .or_else(|| settings.poll.output.clone())
            .unwrap_or_else(|| cwd.to_path_buf()),
    )?;

    let bearer_token = bearer_token.ok_or_else(|| ConfigError::MissingEnvironmentVariable {
        var_name: BEARER_TOKEN_ENV.to_string(),
    })?;
    let api_base = overrides
        .api_base
        .or_else(|| settings.twitter.api_base.clone())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    let mut api = ApiConfig::new(&api_base, bearer_token)?;
    if let Some(user_agent) = &settings.twitter.user_agent {
        api = api.with_user_agent(user_agent.clone());
    }
    if let Some(seconds) = settings.twitter.timeout_seconds {
        // reqwest fails every request immediately with a zero timeout.
        if seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_seconds".to_string(),
                value: seconds.to_string(),
            });
        }
        api = api.with_timeout(Duration::from_secs(seconds));
    }

    Ok((poll, api))
}
