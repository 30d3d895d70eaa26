// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Slash command types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entity::{EnabledPatch, Entity, Validate};
use crate::error::{Result, SchedulesError};
use crate::task::require_text;

/// Server-assigned identifier of a slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub i64);

impl fmt::Display for CommandId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for CommandId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(s.parse()?))
	}
}

/// How the command body is expanded when invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandMode {
	/// Body is sent as-is with arguments appended.
	#[default]
	Raw,
	/// Body is a template with named argument slots.
	Structured,
}

impl fmt::Display for CommandMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Raw => write!(f, "raw"),
			Self::Structured => write!(f, "structured"),
		}
	}
}

impl FromStr for CommandMode {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"raw" => Ok(Self::Raw),
			"structured" => Ok(Self::Structured),
			_ => Err(format!("unknown command mode: {}", s)),
		}
	}
}

/// A reusable named command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlashCommand {
	pub id: CommandId,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub argument_hint: Option<String>,
	#[serde(default)]
	pub mode: CommandMode,
	#[serde(default)]
	pub content: Option<String>,
	pub enabled: bool,
	#[serde(default)]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub updated_at: Option<DateTime<Utc>>,
}

impl SlashCommand {
	/// The name as typed by a user, with a leading slash.
	pub fn invocation(&self) -> String {
		format!("/{}", self.name.trim_start_matches('/'))
	}
}

impl Entity for SlashCommand {
	type Id = CommandId;

	const KIND: &'static str = "slash_command";
	const LABEL: &'static str = "slash command";

	fn id(&self) -> &CommandId {
		&self.id
	}

	fn enabled(&self) -> bool {
		self.enabled
	}

	fn set_enabled(&mut self, enabled: bool) {
		self.enabled = enabled;
	}
}

/// Payload for creating a slash command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlashCommandCreate {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub argument_hint: Option<String>,
	pub mode: CommandMode,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	pub enabled: bool,
}

impl SlashCommandCreate {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			description: None,
			argument_hint: None,
			mode: CommandMode::Raw,
			content: None,
			enabled: true,
		}
	}
}

impl Validate for SlashCommandCreate {
	fn validate(&self) -> Result<()> {
		validate_command_name(&self.name)
	}
}

/// Partial update of a slash command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlashCommandPatch {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub argument_hint: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mode: Option<CommandMode>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub enabled: Option<bool>,
}

impl EnabledPatch for SlashCommandPatch {
	fn enabled_only(enabled: bool) -> Self {
		Self {
			enabled: Some(enabled),
			..Self::default()
		}
	}
}

impl Validate for SlashCommandPatch {
	fn validate(&self) -> Result<()> {
		match &self.name {
			Some(name) => validate_command_name(name),
			None => Ok(()),
		}
	}
}

/// Names may carry one leading slash; the rest is `[A-Za-z0-9_:-]+`.
fn validate_command_name(name: &str) -> Result<()> {
	require_text("name", name)?;
	let bare = name.strip_prefix('/').unwrap_or(name);
	let valid = !bare.is_empty()
		&& bare
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':'));
	if !valid {
		return Err(SchedulesError::InvalidCommandName(name.to_string()));
	}
	Ok(())
}
