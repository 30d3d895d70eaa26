// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `loom-schedules` - manage scheduled tasks and slash commands from the
//! terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use loom_schedules::{
	ConfigOverrides, EntityId, EntityStore, Notification, NotificationKind, Notifier,
	RemoteEntityClient, ScheduledTaskStore, SchedulesConfig, SlashCommandStore,
};
use loom_schedules_core::{CommandId, ScheduledTaskCreate, TaskId};

mod output;

/// Loom scheduled tasks and slash commands
#[derive(Parser, Debug)]
#[command(name = "loom-schedules", version, about, long_about = None)]
struct Args {
	/// Path to a configuration file
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	/// Loom server URL (overrides config)
	#[arg(long, global = true)]
	base_url: Option<String>,

	/// Bearer token (overrides config)
	#[arg(long, global = true)]
	token: Option<String>,

	/// Log level (overrides config; RUST_LOG takes precedence)
	#[arg(short, long, global = true)]
	log_level: Option<String>,

	/// IANA timezone for new tasks and `describe` (overrides config)
	#[arg(long, global = true)]
	timezone: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Manage scheduled tasks
	Tasks {
		#[command(subcommand)]
		command: TaskCommand,
	},
	/// Manage slash commands
	Commands {
		#[command(subcommand)]
		command: SlashCommandCommand,
	},
	/// Explain a cron expression without contacting the server
	Describe {
		/// Five-field cron expression, e.g. "0 9 * * 1"
		cron: String,
	},
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
	/// List scheduled tasks
	List {
		/// Output raw JSON
		#[arg(long)]
		json: bool,
	},
	/// Show one task with its latest run status
	Show { id: String },
	/// Create a scheduled task
	Create {
		#[arg(long)]
		name: String,
		/// Five-field cron expression
		#[arg(long)]
		cron: String,
		#[arg(long)]
		prompt: String,
		/// Create the task disabled
		#[arg(long)]
		disabled: bool,
		/// Run every execution in the same agent session
		#[arg(long)]
		reuse_session: bool,
	},
	/// Enable a task
	Enable { id: String },
	/// Disable a task
	Disable { id: String },
	/// Delete a task
	Delete { id: String },
	/// Run a task now
	Trigger { id: String },
}

#[derive(Subcommand, Debug)]
enum SlashCommandCommand {
	/// List slash commands
	List {
		/// Output raw JSON
		#[arg(long)]
		json: bool,
	},
	/// Enable a slash command
	Enable { id: i64 },
	/// Disable a slash command
	Disable { id: i64 },
	/// Delete a slash command
	Delete { id: i64 },
}

impl From<&Args> for ConfigOverrides {
	fn from(args: &Args) -> Self {
		Self {
			config_path: args.config.clone(),
			base_url: args.base_url.clone(),
			auth_token: args.token.clone(),
			timezone: args.timezone.clone(),
		}
	}
}

/// Prints store notifications to stderr so stdout stays machine readable.
struct StderrNotifier;

impl Notifier for StderrNotifier {
	fn notify(&self, notification: Notification) {
		match notification.kind {
			NotificationKind::Success => eprintln!("{}", notification.message),
			NotificationKind::Error => eprintln!("error: {}", notification.message),
		}
	}
}

fn init_tracing(level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(format!(
			"warn,loom_schedules={level},loom_schedules_core={level},loom_schedules_cli={level}"
		))
	});

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_writer(std::io::stderr))
		.init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
	let args = Args::parse();

	let config = SchedulesConfig::load(&ConfigOverrides::from(&args))
		.context("failed to load configuration")?;
	init_tracing(args.log_level.as_deref().unwrap_or(&config.log_level));
	debug!(base_url = %config.base_url, timezone = %config.timezone, "Configuration loaded");

	let succeeded = match args.command {
		Command::Describe { cron } => {
			output::print_description(&cron, &config.timezone);
			true
		}
		Command::Tasks { command } => run_tasks(&config, command).await?,
		Command::Commands { command } => run_slash_commands(&config, command).await?,
	};

	Ok(if succeeded {
		ExitCode::SUCCESS
	} else {
		ExitCode::FAILURE
	})
}

async fn run_tasks(config: &SchedulesConfig, command: TaskCommand) -> Result<bool> {
	let api = config.api_client().context("failed to build API client")?;
	let store = ScheduledTaskStore::with_notifier(api.scheduled_tasks(), Arc::new(StderrNotifier));

	let succeeded = match command {
		TaskCommand::List { json } => {
			if !store.refresh().await {
				return Ok(false);
			}
			output::print_tasks(&store.items(), json)?;
			true
		}
		TaskCommand::Show { id } => match store.reload(&TaskId::from(id)).await {
			Some(task) => {
				output::print_task(&task);
				true
			}
			None => false,
		},
		TaskCommand::Create {
			name,
			cron,
			prompt,
			disabled,
			reuse_session,
		} => {
			let input = ScheduledTaskCreate::new(name, cron, prompt)
				.timezone(config.timezone.clone())
				.enabled(!disabled)
				.reuse_session(reuse_session);
			match store.create(&input).await {
				Some(task) => {
					output::print_task(&task);
					true
				}
				None => false,
			}
		}
		TaskCommand::Enable { id } => set_enabled(&store, TaskId::from(id), true).await,
		TaskCommand::Disable { id } => set_enabled(&store, TaskId::from(id), false).await,
		TaskCommand::Delete { id } => store.remove(&TaskId::from(id)).await,
		TaskCommand::Trigger { id } => store.trigger(&TaskId::from(id)).await,
	};
	Ok(succeeded)
}

async fn run_slash_commands(
	config: &SchedulesConfig,
	command: SlashCommandCommand,
) -> Result<bool> {
	let api = config.api_client().context("failed to build API client")?;
	let store = SlashCommandStore::with_notifier(api.slash_commands(), Arc::new(StderrNotifier));

	let succeeded = match command {
		SlashCommandCommand::List { json } => {
			if !store.refresh().await {
				return Ok(false);
			}
			output::print_slash_commands(&store.items(), json)?;
			true
		}
		SlashCommandCommand::Enable { id } => set_enabled(&store, CommandId(id), true).await,
		SlashCommandCommand::Disable { id } => set_enabled(&store, CommandId(id), false).await,
		SlashCommandCommand::Delete { id } => store.remove(&CommandId(id)).await,
	};
	Ok(succeeded)
}

/// Load the row first so the toggle has a cached value to roll back to.
async fn set_enabled<C: RemoteEntityClient>(
	store: &EntityStore<C>,
	id: EntityId<C>,
	enabled: bool,
) -> bool {
	if store.reload(&id).await.is_none() {
		return false;
	}
	store.set_enabled_optimistic(&id, enabled).await.is_some()
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_valid() {
		Args::command().debug_assert();
	}

	#[test]
	fn global_flags_become_overrides() {
		let args = Args::try_parse_from([
			"loom-schedules",
			"tasks",
			"list",
			"--base-url",
			"https://loom.example.com",
			"--token",
			"secret",
		])
		.unwrap();

		let overrides = ConfigOverrides::from(&args);
		assert_eq!(overrides.base_url.as_deref(), Some("https://loom.example.com"));
		assert_eq!(overrides.auth_token.as_deref(), Some("secret"));
		assert!(overrides.timezone.is_none());
		assert!(matches!(
			args.command,
			Command::Tasks {
				command: TaskCommand::List { json: false }
			}
		));
	}

	#[test]
	fn create_parses_flags() {
		let args = Args::try_parse_from([
			"loom-schedules",
			"tasks",
			"create",
			"--name",
			"daily-report",
			"--cron",
			"0 9 * * *",
			"--prompt",
			"summarize",
			"--disabled",
		])
		.unwrap();

		match args.command {
			Command::Tasks {
				command: TaskCommand::Create {
					name,
					cron,
					disabled,
					reuse_session,
					..
				},
			} => {
				assert_eq!(name, "daily-report");
				assert_eq!(cron, "0 9 * * *");
				assert!(disabled);
				assert!(!reuse_session);
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn timezone_flag_feeds_overrides_from_any_position() {
		let args = Args::try_parse_from([
			"loom-schedules",
			"--timezone",
			"Europe/Berlin",
			"describe",
			"0 9 * * 1",
		])
		.unwrap();
		assert_eq!(
			ConfigOverrides::from(&args).timezone.as_deref(),
			Some("Europe/Berlin")
		);

		let args = Args::try_parse_from([
			"loom-schedules",
			"tasks",
			"create",
			"--name",
			"n",
			"--cron",
			"0 9 * * *",
			"--prompt",
			"p",
			"--timezone",
			"Asia/Tokyo",
		])
		.unwrap();
		assert_eq!(ConfigOverrides::from(&args).timezone.as_deref(), Some("Asia/Tokyo"));
	}

	#[test]
	fn slash_command_ids_are_numeric() {
		assert!(Args::try_parse_from(["loom-schedules", "commands", "enable", "abc"]).is_err());
		assert!(Args::try_parse_from(["loom-schedules", "commands", "enable", "7"]).is_ok());
	}
}
