// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cron expression classification.
//!
//! The backend accepts arbitrary cron syntax. The console only recognizes the
//! patterns its own schedule pickers author and shows everything else
//! verbatim, so classification is a total function: anything it cannot
//! place becomes [`Schedule::Custom`] with the input preserved.

use serde::{Deserialize, Serialize};

/// Structured classification of a five-field cron expression.
///
/// Derived from the cron string on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
	/// `* * * * *`
	Minutely,
	/// `*/N * * * *`
	Interval { every_minutes: u32 },
	/// `M * * * *`
	Hourly { minute: u8 },
	/// `M H * * *`
	Daily { hour: u8, minute: u8 },
	/// `M H * * D`, 0 = Sunday
	Weekly { day_of_week: u8, hour: u8, minute: u8 },
	/// Anything else, kept exactly as written.
	Custom { raw: String },
}

impl Schedule {
	/// Get the schedule kind as a string.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Minutely => "minutely",
			Self::Interval { .. } => "interval",
			Self::Hourly { .. } => "hourly",
			Self::Daily { .. } => "daily",
			Self::Weekly { .. } => "weekly",
			Self::Custom { .. } => "custom",
		}
	}

	pub fn is_custom(&self) -> bool {
		matches!(self, Self::Custom { .. })
	}

	/// Render the cron expression a schedule picker would author for this
	/// descriptor. `Custom` returns its raw text.
	pub fn to_cron_expression(&self) -> String {
		match self {
			Self::Minutely => "* * * * *".to_string(),
			Self::Interval { every_minutes } => format!("*/{every_minutes} * * * *"),
			Self::Hourly { minute } => format!("{minute} * * * *"),
			Self::Daily { hour, minute } => format!("{minute} {hour} * * *"),
			Self::Weekly {
				day_of_week,
				hour,
				minute,
			} => format!("{minute} {hour} * * {day_of_week}"),
			Self::Custom { raw } => raw.clone(),
		}
	}
}

/// Classify a cron expression. Never fails.
///
/// Checks run in order and the first match wins:
///
/// 1. every field `*` → [`Schedule::Minutely`]
/// 2. minute `*/N` (1–59), the rest `*` → [`Schedule::Interval`]
/// 3. concrete minute, the rest `*` → [`Schedule::Hourly`]
/// 4. concrete minute and hour, the rest `*` → [`Schedule::Daily`]
/// 5. as above with a concrete day of week 0–6 → [`Schedule::Weekly`]
/// 6. anything else → [`Schedule::Custom`]
pub fn analyze(cron: &str) -> Schedule {
	classify(cron).unwrap_or_else(|| Schedule::Custom {
		raw: cron.to_string(),
	})
}

fn classify(cron: &str) -> Option<Schedule> {
	let fields: Vec<&str> = cron.split_ascii_whitespace().collect();
	let [minute, hour, dom, month, dow] = fields.as_slice() else {
		return None;
	};

	if !is_wildcard(dom) || !is_wildcard(month) {
		return None;
	}

	if is_wildcard(minute) && is_wildcard(hour) && is_wildcard(dow) {
		return Some(Schedule::Minutely);
	}

	if is_wildcard(hour) && is_wildcard(dow) {
		if let Some(every_minutes) = step(minute) {
			return Some(Schedule::Interval { every_minutes });
		}
		return number(minute, 59).map(|minute| Schedule::Hourly { minute });
	}

	let minute = number(minute, 59)?;
	let hour = number(hour, 23)?;
	if is_wildcard(dow) {
		return Some(Schedule::Daily { hour, minute });
	}

	let day_of_week = number(dow, 6)?;
	Some(Schedule::Weekly {
		day_of_week,
		hour,
		minute,
	})
}

fn is_wildcard(field: &str) -> bool {
	field == "*"
}

/// A concrete value: one or two ASCII digits no greater than `max`.
fn number(field: &str, max: u8) -> Option<u8> {
	if field.is_empty() || field.len() > 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	field.parse::<u8>().ok().filter(|value| *value <= max)
}

/// A `*/N` minute step with N in 1–59.
fn step(field: &str) -> Option<u32> {
	let every = number(field.strip_prefix("*/")?, 59)?;
	(every > 0).then_some(u32::from(every))
}
