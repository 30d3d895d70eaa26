// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Next run calculation and validation for task cron expressions.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

use crate::error::{Result, SchedulesError};

/// Convert a standard 5-field Unix cron expression to the 7-field format
/// expected by the `cron` crate.
///
/// 5-field format: minute hour day-of-month month day-of-week
/// 7-field format: second minute hour day-of-month month day-of-week year
///
/// Seconds are pinned to 0 and the year is `*`. The `cron` crate numbers days
/// of the week 1-7 starting on Sunday, so numeric day-of-week values are
/// shifted from the Unix 0-7 numbering.
fn to_cron_crate_format(expression: &str) -> Result<String> {
	let fields: Vec<&str> = expression.split_ascii_whitespace().collect();
	let [minute, hour, dom, month, dow] = fields.as_slice() else {
		return Err(SchedulesError::InvalidCronExpression(format!(
			"expected 5 fields, found {}",
			fields.len()
		)));
	};
	let dow = translate_day_of_week(dow)?;
	Ok(format!("0 {minute} {hour} {dom} {month} {dow} *"))
}

fn translate_day_of_week(field: &str) -> Result<String> {
	let mut items = Vec::new();
	for item in field.split(',') {
		let (range, step) = match item.split_once('/') {
			Some((range, step)) => (range, Some(step)),
			None => (item, None),
		};

		// A stepped range ending on the second Sunday can't be shifted as a
		// range, so it is expanded to the days it selects.
		if let (Some((start, "7")), Some(step)) = (range.split_once('-'), step) {
			if let (Ok(start), Ok(step)) = (start.parse::<u8>(), step.parse::<usize>()) {
				items.push(expand_stepped_range_to_sunday(start, step)?);
				continue;
			}
		}

		let translated = match range.split_once('-') {
			Some((start, end)) => {
				let start = shift_day(start)?;
				match end {
					// Unix allows 7 as a second Sunday at the end of a range.
					"7" if start == "1" => "1-7".to_string(),
					"7" if step.is_none() => format!("{start}-7,1"),
					_ => format!("{start}-{}", shift_day(end)?),
				}
			}
			None => shift_day(range)?,
		};

		match step {
			Some(step) => items.push(format!("{translated}/{step}")),
			None => items.push(translated),
		}
	}
	Ok(items.join(","))
}

fn expand_stepped_range_to_sunday(start: u8, step: usize) -> Result<String> {
	if start > 7 || step == 0 {
		return Err(SchedulesError::InvalidCronExpression(format!(
			"invalid day of week range: {start}-7/{step}"
		)));
	}
	let mut days: Vec<u8> = (start..=7)
		.step_by(step)
		.map(|day| if day == 7 { 1 } else { day + 1 })
		.collect();
	days.sort_unstable();
	days.dedup();
	Ok(days
		.iter()
		.map(u8::to_string)
		.collect::<Vec<_>>()
		.join(","))
}

fn shift_day(value: &str) -> Result<String> {
	if !value.bytes().all(|b| b.is_ascii_digit()) || value.is_empty() {
		// Wildcards and day names are understood by the `cron` crate as-is.
		return Ok(value.to_string());
	}
	match value.parse::<u8>() {
		Ok(day @ 0..=6) => Ok((day + 1).to_string()),
		Ok(7) => Ok("1".to_string()),
		_ => Err(SchedulesError::InvalidCronExpression(format!(
			"day of week out of range: {value}"
		))),
	}
}

fn parse(expression: &str) -> Result<CronSchedule> {
	let converted = to_cron_crate_format(expression)?;
	CronSchedule::from_str(&converted)
		.map_err(|e| SchedulesError::InvalidCronExpression(format!("{expression}: {e}")))
}

/// Calculate the next run of a task.
///
/// Parses the cron expression, finds the next occurrence strictly after
/// `after` in the given IANA timezone, and returns it in UTC.
///
/// # Errors
///
/// Returns an error if:
/// - The cron expression is invalid
/// - The timezone string is invalid
/// - The expression never fires again
pub fn next_run_after(
	expression: &str,
	timezone: &str,
	after: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
	let schedule = parse(expression)?;
	let tz = parse_timezone(timezone)?;

	let local_after = after.with_timezone(&tz);
	let next_local = schedule
		.after(&local_after)
		.next()
		.ok_or_else(|| SchedulesError::NoUpcomingRun(expression.to_string()))?;

	Ok(next_local.with_timezone(&Utc))
}

/// Validate a five-field cron expression without calculating a next run.
pub fn validate_cron_expression(expression: &str) -> Result<()> {
	parse(expression).map(|_| ())
}

/// Validate an IANA timezone name.
pub fn validate_timezone(timezone: &str) -> Result<()> {
	parse_timezone(timezone).map(|_| ())
}

fn parse_timezone(timezone: &str) -> Result<Tz> {
	timezone
		.parse()
		.map_err(|_| SchedulesError::InvalidTimezone(timezone.to_string()))
}
