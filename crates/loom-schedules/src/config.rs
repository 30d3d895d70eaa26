// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered client configuration.
//!
//! Precedence, lowest first:
//! - built-in defaults
//! - TOML file (`--config` or `$XDG_CONFIG_HOME/loom/schedules.toml`)
//! - `LOOM_SCHEDULES_*` environment variables
//! - command line flags

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::http::ApiClient;
use crate::retry::RetryConfig;

pub const CONFIG_FILE_NAME: &str = "schedules.toml";

pub const ENV_BASE_URL: &str = "LOOM_SCHEDULES_BASE_URL";
pub const ENV_TOKEN: &str = "LOOM_SCHEDULES_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "LOOM_SCHEDULES_TIMEOUT_SECS";
pub const ENV_LOG: &str = "LOOM_SCHEDULES_LOG";
pub const ENV_TIMEZONE: &str = "LOOM_SCHEDULES_TIMEZONE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulesConfig {
	pub base_url: String,
	pub auth_token: Option<String>,
	pub request_timeout_secs: u64,
	pub retry: RetrySettings,
	/// `tracing` filter directive used when `RUST_LOG` is unset.
	pub log_level: String,
	/// Timezone for new tasks and for `describe`.
	pub timezone: String,
}

impl Default for SchedulesConfig {
	fn default() -> Self {
		Self {
			base_url: "http://localhost:8080".to_string(),
			auth_token: None,
			request_timeout_secs: 30,
			retry: RetrySettings::default(),
			log_level: "info".to_string(),
			timezone: loom_schedules_core::DEFAULT_TIMEZONE.to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
}

impl Default for RetrySettings {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay_ms: 200,
			max_delay_ms: 5_000,
		}
	}
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
	pub config_path: Option<PathBuf>,
	pub base_url: Option<String>,
	pub auth_token: Option<String>,
	pub timezone: Option<String>,
}

impl SchedulesConfig {
	/// Load from every layer using the process environment.
	pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
		Self::load_with_env(overrides, |key| std::env::var(key).ok())
	}

	/// Load from every layer, reading variables through `env`.
	pub fn load_with_env<F>(overrides: &ConfigOverrides, env: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut config = match &overrides.config_path {
			Some(path) => Self::from_file(path)?,
			None => match default_config_path(&env) {
				Some(path) if path.is_file() => Self::from_file(&path)?,
				_ => Self::default(),
			},
		};

		config.apply_env(&env)?;
		config.apply_overrides(overrides);
		config.validate()?;
		Ok(config)
	}

	/// Parse a TOML file; missing keys keep their defaults.
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		let config = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})?;
		debug!(path = %path.display(), "Loaded config file");
		Ok(config)
	}

	fn apply_env<F>(&mut self, env: &F) -> Result<(), ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(base_url) = env(ENV_BASE_URL) {
			self.base_url = base_url;
		}
		if let Some(token) = env(ENV_TOKEN).filter(|t| !t.is_empty()) {
			self.auth_token = Some(token);
		}
		if let Some(timeout) = env(ENV_TIMEOUT_SECS) {
			self.request_timeout_secs = timeout
				.trim()
				.parse()
				.map_err(|e| ConfigError::invalid_value(ENV_TIMEOUT_SECS, format!("{e}")))?;
		}
		if let Some(level) = env(ENV_LOG) {
			self.log_level = level;
		}
		if let Some(timezone) = env(ENV_TIMEZONE) {
			self.timezone = timezone;
		}
		Ok(())
	}

	fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
		if let Some(base_url) = &overrides.base_url {
			self.base_url = base_url.clone();
		}
		if let Some(token) = &overrides.auth_token {
			self.auth_token = Some(token.clone());
		}
		if let Some(timezone) = &overrides.timezone {
			self.timezone = timezone.clone();
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		let base_url = self.base_url.trim();
		if base_url.is_empty() {
			return Err(ConfigError::invalid_value("base_url", "must not be empty"));
		}
		if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
			return Err(ConfigError::invalid_value(
				"base_url",
				format!("expected an http(s) URL, got {base_url}"),
			));
		}
		if self.request_timeout_secs == 0 {
			return Err(ConfigError::invalid_value(
				"request_timeout_secs",
				"must be greater than zero",
			));
		}
		if self.retry.max_attempts == 0 {
			return Err(ConfigError::invalid_value(
				"retry.max_attempts",
				"must be at least 1",
			));
		}
		if self.retry.max_delay_ms < self.retry.base_delay_ms {
			return Err(ConfigError::invalid_value(
				"retry.max_delay_ms",
				"must not be below retry.base_delay_ms",
			));
		}
		loom_schedules_core::validate_timezone(&self.timezone)
			.map_err(|e| ConfigError::invalid_value("timezone", e.to_string()))
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	pub fn retry_config(&self) -> RetryConfig {
		RetryConfig {
			max_attempts: self.retry.max_attempts,
			base_delay: Duration::from_millis(self.retry.base_delay_ms),
			max_delay: Duration::from_millis(self.retry.max_delay_ms),
			jitter: true,
		}
	}

	/// Build an HTTP client for this configuration.
	pub fn api_client(&self) -> crate::Result<ApiClient> {
		let mut builder = ApiClient::builder()
			.base_url(&self.base_url)
			.request_timeout(self.request_timeout())
			.retry_config(self.retry_config());
		if let Some(token) = &self.auth_token {
			builder = builder.auth_token(token);
		}
		builder.build()
	}
}

/// `$XDG_CONFIG_HOME/loom/schedules.toml`, falling back to the platform
/// config directory.
pub fn default_config_path<F>(env: &F) -> Option<PathBuf>
where
	F: Fn(&str) -> Option<String>,
{
	env("XDG_CONFIG_HOME")
		.filter(|dir| !dir.is_empty())
		.map(PathBuf::from)
		.or_else(dirs::config_dir)
		.map(|dir| dir.join("loom").join(CONFIG_FILE_NAME))
}
