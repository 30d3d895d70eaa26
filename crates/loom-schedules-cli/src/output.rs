// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Terminal rendering.

use anyhow::Result;
use chrono::Utc;
use loom_schedules_core::{
	analyze, next_run_after, summarize_in_timezone, EnglishLocale, ScheduledTask, SlashCommand,
};

fn on_off(enabled: bool) -> &'static str {
	if enabled {
		"on"
	} else {
		"off"
	}
}

fn task_summary(task: &ScheduledTask) -> String {
	summarize_in_timezone(&task.schedule(), &task.timezone, &EnglishLocale)
}

pub fn print_tasks(tasks: &[ScheduledTask], json: bool) -> Result<()> {
	if json {
		println!("{}", serde_json::to_string_pretty(tasks)?);
		return Ok(());
	}
	if tasks.is_empty() {
		println!("No scheduled tasks");
		return Ok(());
	}

	println!("{:<28} {:<4} {:<24} SCHEDULE", "ID", "ON", "NAME");
	for task in tasks {
		println!(
			"{:<28} {:<4} {:<24} {}",
			task.task_id.as_str(),
			on_off(task.enabled),
			task.name,
			task_summary(task)
		);
	}
	Ok(())
}

pub fn print_task(task: &ScheduledTask) {
	println!("ID:        {}", task.task_id);
	println!("Name:      {}", task.name);
	println!("Enabled:   {}", on_off(task.enabled));
	println!("Cron:      {}", task.cron);
	println!("Schedule:  {}", task_summary(task));
	println!("Prompt:    {}", task.prompt);
	println!("Session:   {}", if task.reuse_session { "reused" } else { "fresh per run" });
	if let Some(next) = task.next_run_at {
		println!("Next run:  {}", next.to_rfc3339());
	}
	if let Some(status) = task.last_run_status {
		println!("Last run:  {status}");
	}
}

pub fn print_slash_commands(commands: &[SlashCommand], json: bool) -> Result<()> {
	if json {
		println!("{}", serde_json::to_string_pretty(commands)?);
		return Ok(());
	}
	if commands.is_empty() {
		println!("No slash commands");
		return Ok(());
	}

	println!("{:<8} {:<4} {:<24} {:<10} DESCRIPTION", "ID", "ON", "COMMAND", "MODE");
	for command in commands {
		println!(
			"{:<8} {:<4} {:<24} {:<10} {}",
			command.id.to_string(),
			on_off(command.enabled),
			command.invocation(),
			command.mode.to_string(),
			command.description.as_deref().unwrap_or("")
		);
	}
	Ok(())
}

pub fn print_description(cron: &str, timezone: &str) {
	let schedule = analyze(cron);
	println!("Kind:      {}", schedule.kind());
	println!("Summary:   {}", summarize_in_timezone(&schedule, timezone, &EnglishLocale));
	if !schedule.is_custom() {
		println!("Canonical: {}", schedule.to_cron_expression());
	}
	match next_run_after(cron, timezone, Utc::now()) {
		Ok(next) => println!("Next run:  {}", next.to_rfc3339()),
		Err(e) => println!("Next run:  unavailable ({e})"),
	}
}
