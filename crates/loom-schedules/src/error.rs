// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the schedules SDK.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for SDK construction.
pub type Result<T> = std::result::Result<T, SchedulesSdkError>;

/// The single failure kind crossing the remote client boundary.
///
/// The store never inspects the variant; it only reports the message.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("request failed: {0}")]
	Request(#[from] reqwest::Error),

	#[error("server returned {status}: {message}")]
	Server { status: u16, message: String },

	/// HTTP succeeded but the envelope carried a non-zero code.
	#[error("request rejected (code {code}): {message}")]
	Rejected { code: i64, message: String },

	#[error("failed to decode response: {0}")]
	Decode(String),
}

impl TransportError {
	pub fn server(status: u16, message: impl Into<String>) -> Self {
		Self::Server {
			status,
			message: message.into(),
		}
	}

	/// HTTP status when the server answered at all.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Request(e) => e.status().map(|s| s.as_u16()),
			Self::Server { status, .. } => Some(*status),
			Self::Rejected { .. } | Self::Decode(_) => None,
		}
	}
}

/// Errors raised while building a client.
#[derive(Debug, Error)]
pub enum SchedulesSdkError {
	#[error("base URL is required")]
	InvalidBaseUrl,

	#[error("failed to build HTTP client: {0}")]
	HttpClient(#[from] reqwest::Error),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },
}

impl ConfigError {
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}
