// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Human-readable schedule summaries.
//!
//! Each [`Schedule`] kind maps to one localization key with its fields passed
//! as named parameters. Day names and the final wording come from the
//! injected [`Localize`] implementation.
//!
//! | Kind | Key | Params |
//! |------|-----|--------|
//! | minutely | `schedule.minutely` | |
//! | interval | `schedule.interval` | `every_minutes` |
//! | hourly | `schedule.hourly` | `minute` |
//! | daily | `schedule.daily` | `hour`, `minute`, `time` |
//! | weekly | `schedule.weekly` | `day`, `day_of_week`, `hour`, `minute`, `time` |
//! | custom | `schedule.custom` | `cron` |

use crate::analyzer::Schedule;

/// Text lookup capability: `(key, params) -> string`.
pub trait Localize {
	fn localize(&self, key: &str, params: &[(&str, &str)]) -> String;
}

impl<F> Localize for F
where
	F: Fn(&str, &[(&str, &str)]) -> String,
{
	fn localize(&self, key: &str, params: &[(&str, &str)]) -> String {
		self(key, params)
	}
}

/// Summarize a schedule descriptor.
///
/// Pure apart from the `localize` call: the same descriptor always yields the
/// same summary for a fixed `localize`.
pub fn summarize(schedule: &Schedule, localize: &dyn Localize) -> String {
	match schedule {
		Schedule::Minutely => localize.localize("schedule.minutely", &[]),
		Schedule::Interval { every_minutes } => {
			let every_minutes = every_minutes.to_string();
			localize.localize("schedule.interval", &[("every_minutes", every_minutes.as_str())])
		}
		Schedule::Hourly { minute } => {
			let minute = two_digits(*minute);
			localize.localize("schedule.hourly", &[("minute", minute.as_str())])
		}
		Schedule::Daily { hour, minute } => {
			let (hour, minute) = (two_digits(*hour), two_digits(*minute));
			let time = format!("{hour}:{minute}");
			localize.localize(
				"schedule.daily",
				&[
					("hour", hour.as_str()),
					("minute", minute.as_str()),
					("time", time.as_str()),
				],
			)
		}
		Schedule::Weekly {
			day_of_week,
			hour,
			minute,
		} => {
			let day = localize.localize(&format!("weekday.{day_of_week}"), &[]);
			let day_of_week = day_of_week.to_string();
			let (hour, minute) = (two_digits(*hour), two_digits(*minute));
			let time = format!("{hour}:{minute}");
			localize.localize(
				"schedule.weekly",
				&[
					("day", day.as_str()),
					("day_of_week", day_of_week.as_str()),
					("hour", hour.as_str()),
					("minute", minute.as_str()),
					("time", time.as_str()),
				],
			)
		}
		Schedule::Custom { raw } => localize.localize("schedule.custom", &[("cron", raw.as_str())]),
	}
}

/// Summarize a schedule and qualify it with the timezone it runs in.
pub fn summarize_in_timezone(
	schedule: &Schedule,
	timezone: &str,
	localize: &dyn Localize,
) -> String {
	let summary = summarize(schedule, localize);
	localize.localize(
		"schedule.with_timezone",
		&[("summary", summary.as_str()), ("timezone", timezone)],
	)
}

fn two_digits(value: u8) -> String {
	format!("{value:02}")
}

/// Built-in English wording for the schedule keys.
///
/// Unknown keys render as the key itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishLocale;

const ENGLISH: &[(&str, &str)] = &[
	("schedule.minutely", "Every minute"),
	("schedule.interval", "Every {every_minutes} minutes"),
	("schedule.hourly", "Every hour at minute {minute}"),
	("schedule.daily", "Every day at {time}"),
	("schedule.weekly", "Every {day} at {time}"),
	("schedule.custom", "Custom schedule: {cron}"),
	("schedule.with_timezone", "{summary} ({timezone})"),
	("weekday.0", "Sunday"),
	("weekday.1", "Monday"),
	("weekday.2", "Tuesday"),
	("weekday.3", "Wednesday"),
	("weekday.4", "Thursday"),
	("weekday.5", "Friday"),
	("weekday.6", "Saturday"),
];

impl Localize for EnglishLocale {
	fn localize(&self, key: &str, params: &[(&str, &str)]) -> String {
		let template = ENGLISH
			.iter()
			.find(|(candidate, _)| *candidate == key)
			.map(|(_, template)| *template)
			.unwrap_or(key);
		interpolate(template, params)
	}
}

fn interpolate(template: &str, params: &[(&str, &str)]) -> String {
	params
		.iter()
		.fold(template.to_string(), |text, (name, value)| {
			text.replace(&format!("{{{name}}}"), value)
		})
}
