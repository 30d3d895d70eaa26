// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Loom scheduled tasks and slash commands.
//!
//! This crate provides:
//! - The remote-owned entities ([`ScheduledTask`], [`SlashCommand`]) and their
//!   create/patch payloads
//! - [`analyze`]: classification of a five-field cron expression into a
//!   [`Schedule`] descriptor
//! - [`summarize`]: rendering a [`Schedule`] through an injected [`Localize`]
//! - [`next_run_after`]: next occurrence of a cron expression in a timezone
//!
//! Nothing here performs I/O; the `loom-schedules` crate layers the HTTP
//! clients and the synchronized entity store on top.
//!
//! # Example
//!
//! ```
//! use loom_schedules_core::{analyze, summarize, EnglishLocale, Schedule};
//!
//! let schedule = analyze("30 9 * * *");
//! assert_eq!(schedule, Schedule::Daily { hour: 9, minute: 30 });
//! assert_eq!(summarize(&schedule, &EnglishLocale), "Every day at 09:30");
//! ```

mod analyzer;
mod command;
mod entity;
mod error;
mod next_run;
mod summary;
mod task;

pub use analyzer::{analyze, Schedule};
pub use command::{CommandId, CommandMode, SlashCommand, SlashCommandCreate, SlashCommandPatch};
pub use entity::{EnabledPatch, Entity, Validate};
pub use error::{Result, SchedulesError};
pub use next_run::{next_run_after, validate_cron_expression, validate_timezone};
pub use summary::{summarize, summarize_in_timezone, EnglishLocale, Localize};
pub use task::{RunStatus, ScheduledTask, ScheduledTaskCreate, ScheduledTaskPatch, TaskId};

/// Timezone applied when a task is created without one.
pub const DEFAULT_TIMEZONE: &str = "UTC";
