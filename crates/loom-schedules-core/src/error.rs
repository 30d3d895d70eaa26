// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for scheduled task and slash command payloads.

use thiserror::Error;

/// Result type for schedule operations.
pub type Result<T> = std::result::Result<T, SchedulesError>;

/// Errors raised while validating payloads or evaluating schedules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulesError {
	#[error("{field} must not be empty")]
	EmptyField { field: &'static str },

	#[error("invalid cron expression: {0}")]
	InvalidCronExpression(String),

	#[error("invalid timezone: {0}")]
	InvalidTimezone(String),

	#[error("invalid command name: {0}")]
	InvalidCommandName(String),

	#[error("no upcoming run for cron expression: {0}")]
	NoUpcomingRun(String),
}

impl SchedulesError {
	pub fn empty_field(field: &'static str) -> Self {
		Self::EmptyField { field }
	}
}
