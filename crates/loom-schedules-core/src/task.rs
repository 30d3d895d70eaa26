// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduled task types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::analyzer::{analyze, Schedule};
use crate::entity::{EnabledPatch, Entity, Validate};
use crate::error::{Result, SchedulesError};
use crate::next_run::{validate_cron_expression, validate_timezone};
use crate::DEFAULT_TIMEZONE;

/// Server-assigned identifier of a scheduled task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for TaskId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for TaskId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

/// A recurring AI-agent prompt run on a cron schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
	pub task_id: TaskId,
	pub name: String,
	/// Five-field cron expression, e.g. "0 9 * * *".
	pub cron: String,
	/// IANA timezone the cron expression is evaluated in.
	#[serde(default = "default_timezone")]
	pub timezone: String,
	pub prompt: String,
	pub enabled: bool,
	/// Fixed at creation; no patch can change it.
	#[serde(default)]
	pub reuse_session: bool,

	// Server-owned
	#[serde(default)]
	pub next_run_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub last_run_status: Option<RunStatus>,
	#[serde(default)]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub updated_at: Option<DateTime<Utc>>,
}

impl ScheduledTask {
	/// Classify this task's cron expression.
	pub fn schedule(&self) -> Schedule {
		analyze(&self.cron)
	}
}

impl Entity for ScheduledTask {
	type Id = TaskId;

	const KIND: &'static str = "scheduled_task";
	const LABEL: &'static str = "scheduled task";

	fn id(&self) -> &TaskId {
		&self.task_id
	}

	fn enabled(&self) -> bool {
		self.enabled
	}

	fn set_enabled(&mut self, enabled: bool) {
		self.enabled = enabled;
	}
}

fn default_timezone() -> String {
	DEFAULT_TIMEZONE.to_string()
}

fn default_enabled() -> bool {
	true
}

/// Status of the most recent run of a task.
///
/// Values the client does not know deserialize as [`RunStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Queued,
	Claimed,
	Running,
	Completed,
	Failed,
	Canceled,
	#[serde(other)]
	Unknown,
}

impl RunStatus {
	/// Whether the run has finished, successfully or not.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Canceled)
	}
}

impl fmt::Display for RunStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Queued => write!(f, "queued"),
			Self::Claimed => write!(f, "claimed"),
			Self::Running => write!(f, "running"),
			Self::Completed => write!(f, "completed"),
			Self::Failed => write!(f, "failed"),
			Self::Canceled => write!(f, "canceled"),
			Self::Unknown => write!(f, "unknown"),
		}
	}
}

impl FromStr for RunStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"queued" => Ok(Self::Queued),
			"claimed" => Ok(Self::Claimed),
			"running" => Ok(Self::Running),
			"completed" => Ok(Self::Completed),
			"failed" => Ok(Self::Failed),
			"canceled" => Ok(Self::Canceled),
			"unknown" => Ok(Self::Unknown),
			_ => Err(format!("unknown run status: {}", s)),
		}
	}
}

/// Payload for creating a scheduled task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTaskCreate {
	pub name: String,
	pub cron: String,
	#[serde(default = "default_timezone")]
	pub timezone: String,
	pub prompt: String,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	#[serde(default)]
	pub reuse_session: bool,
}

impl ScheduledTaskCreate {
	/// An enabled task in UTC that starts a fresh session on every run.
	pub fn new(
		name: impl Into<String>,
		cron: impl Into<String>,
		prompt: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			cron: cron.into(),
			timezone: default_timezone(),
			prompt: prompt.into(),
			enabled: true,
			reuse_session: false,
		}
	}

	pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
		self.timezone = timezone.into();
		self
	}

	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn reuse_session(mut self, reuse_session: bool) -> Self {
		self.reuse_session = reuse_session;
		self
	}
}

impl Validate for ScheduledTaskCreate {
	fn validate(&self) -> Result<()> {
		require_text("name", &self.name)?;
		require_text("prompt", &self.prompt)?;
		validate_cron_expression(&self.cron)?;
		validate_timezone(&self.timezone)
	}
}

/// Partial update of a scheduled task.
///
/// `reuse_session` is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTaskPatch {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cron: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timezone: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prompt: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub enabled: Option<bool>,
}

impl ScheduledTaskPatch {
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}

	/// Overlay the fields present in this patch onto `task`.
	pub fn apply_to(&self, task: &mut ScheduledTask) {
		if let Some(name) = &self.name {
			task.name = name.clone();
		}
		if let Some(cron) = &self.cron {
			task.cron = cron.clone();
		}
		if let Some(timezone) = &self.timezone {
			task.timezone = timezone.clone();
		}
		if let Some(prompt) = &self.prompt {
			task.prompt = prompt.clone();
		}
		if let Some(enabled) = self.enabled {
			task.enabled = enabled;
		}
	}
}

impl EnabledPatch for ScheduledTaskPatch {
	fn enabled_only(enabled: bool) -> Self {
		Self {
			enabled: Some(enabled),
			..Self::default()
		}
	}
}

impl Validate for ScheduledTaskPatch {
	fn validate(&self) -> Result<()> {
		if let Some(name) = &self.name {
			require_text("name", name)?;
		}
		if let Some(prompt) = &self.prompt {
			require_text("prompt", prompt)?;
		}
		if let Some(cron) = &self.cron {
			validate_cron_expression(cron)?;
		}
		if let Some(timezone) = &self.timezone {
			validate_timezone(timezone)?;
		}
		Ok(())
	}
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(SchedulesError::empty_field(field));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn create_defaults() {
		let input = ScheduledTaskCreate::new("daily-report", "0 9 * * *", "summarize");
		assert_eq!(input.timezone, "UTC");
		assert!(input.enabled);
		assert!(!input.reuse_session);
		assert!(input.validate().is_ok());
	}

	#[test]
	fn create_deserializes_with_defaults() {
		let input: ScheduledTaskCreate = serde_json::from_value(json!({
			"name": "n",
			"cron": "* * * * *",
			"prompt": "p",
		}))
		.unwrap();
		assert_eq!(input.timezone, "UTC");
		assert!(input.enabled);
		assert!(!input.reuse_session);
	}

	#[test]
	fn create_rejects_blank_name_and_prompt() {
		let blank_name = ScheduledTaskCreate::new("  ", "0 9 * * *", "p");
		assert_eq!(
			blank_name.validate(),
			Err(SchedulesError::empty_field("name"))
		);

		let blank_prompt = ScheduledTaskCreate::new("n", "0 9 * * *", "");
		assert_eq!(
			blank_prompt.validate(),
			Err(SchedulesError::empty_field("prompt"))
		);
	}

	#[test]
	fn create_rejects_bad_cron_and_timezone() {
		let bad_cron = ScheduledTaskCreate::new("n", "every day", "p");
		assert!(matches!(
			bad_cron.validate(),
			Err(SchedulesError::InvalidCronExpression(_))
		));

		let bad_tz = ScheduledTaskCreate::new("n", "0 9 * * *", "p").timezone("Mars/Olympus");
		assert!(matches!(
			bad_tz.validate(),
			Err(SchedulesError::InvalidTimezone(_))
		));
	}

	#[test]
	fn create_accepts_stepped_range_ending_on_sunday() {
		let input = ScheduledTaskCreate::new("n", "0 9 * * 3-7/2", "p");
		assert_eq!(input.validate(), Ok(()));

		let patch = ScheduledTaskPatch {
			cron: Some("0 9 * * 3-7/2".to_string()),
			..ScheduledTaskPatch::default()
		};
		assert_eq!(patch.validate(), Ok(()));
	}

	#[test]
	fn patch_overlays_only_present_fields() {
		let mut task: ScheduledTask = serde_json::from_value(json!({
			"task_id": "t1",
			"name": "daily-report",
			"cron": "0 9 * * *",
			"prompt": "summarize",
			"enabled": true,
			"reuse_session": true
		}))
		.unwrap();

		let patch = ScheduledTaskPatch {
			cron: Some("0 10 * * *".to_string()),
			enabled: Some(false),
			..ScheduledTaskPatch::default()
		};
		patch.apply_to(&mut task);

		assert_eq!(task.cron, "0 10 * * *");
		assert!(!task.enabled);
		assert_eq!(task.name, "daily-report");
		assert_eq!(task.prompt, "summarize");
		assert!(task.reuse_session);
	}

	#[test]
	fn patch_serializes_only_present_fields() {
		let patch = ScheduledTaskPatch::enabled_only(false);
		assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "enabled": false }));
		assert!(!patch.is_empty());
		assert!(ScheduledTaskPatch::default().is_empty());
	}

	#[test]
	fn patch_ignores_reuse_session_on_the_wire() {
		let patch: ScheduledTaskPatch =
			serde_json::from_value(json!({ "reuse_session": true, "name": "x" })).unwrap();
		let value = serde_json::to_value(&patch).unwrap();
		assert!(value.get("reuse_session").is_none());
		assert_eq!(value["name"], "x");
	}

	#[test]
	fn task_deserializes_server_record() {
		let task: ScheduledTask = serde_json::from_value(json!({
			"task_id": "task_1",
			"name": "daily-report",
			"cron": "0 9 * * *",
			"prompt": "summarize",
			"enabled": true,
			"next_run_at": "2026-01-20T09:00:00Z",
			"last_run_status": "paused_by_admin",
		}))
		.unwrap();

		assert_eq!(task.task_id, TaskId::from("task_1"));
		assert_eq!(task.timezone, "UTC");
		assert!(!task.reuse_session);
		assert_eq!(task.last_run_status, Some(RunStatus::Unknown));
		assert_eq!(task.schedule(), Schedule::Daily { hour: 9, minute: 0 });
	}

	#[test]
	fn null_run_status_is_none() {
		let task: ScheduledTask = serde_json::from_value(json!({
			"task_id": "t",
			"name": "n",
			"cron": "* * * * *",
			"prompt": "p",
			"enabled": false,
			"last_run_status": null,
		}))
		.unwrap();
		assert_eq!(task.last_run_status, None);
	}

	#[test]
	fn terminal_statuses() {
		assert!(RunStatus::Completed.is_terminal());
		assert!(RunStatus::Failed.is_terminal());
		assert!(RunStatus::Canceled.is_terminal());
		assert!(!RunStatus::Queued.is_terminal());
		assert!(!RunStatus::Running.is_terminal());
	}

	proptest! {
		#[test]
		fn run_status_roundtrip(status in prop_oneof![
			Just(RunStatus::Queued),
			Just(RunStatus::Claimed),
			Just(RunStatus::Running),
			Just(RunStatus::Completed),
			Just(RunStatus::Failed),
			Just(RunStatus::Canceled),
			Just(RunStatus::Unknown),
		]) {
			let s = status.to_string();
			let parsed: RunStatus = s.parse().unwrap();
			prop_assert_eq!(status, parsed);
		}
	}
}
