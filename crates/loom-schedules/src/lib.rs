// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client SDK for Loom scheduled tasks and slash commands.
//!
//! - [`EntityStore`]: local cache with per-entity mutation locks and
//!   optimistic enable/disable toggles
//! - [`ApiClient`], [`ScheduledTaskApi`], [`SlashCommandApi`]: HTTP clients
//!   for the `/api/v1` endpoints
//! - [`SchedulesConfig`]: layered configuration
//!
//! # Example
//!
//! ```ignore
//! use loom_schedules::{ScheduledTaskStore, SchedulesConfig, ConfigOverrides};
//!
//! let config = SchedulesConfig::load(&ConfigOverrides::default())?;
//! let api = config.api_client()?;
//! let tasks = ScheduledTaskStore::new(api.scheduled_tasks());
//!
//! tasks.refresh().await;
//! for task in tasks.items() {
//!     println!("{} {}", task.task_id, task.name);
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod notify;
pub mod remote;
pub mod retry;
pub mod store;

pub use config::{ConfigOverrides, RetrySettings, SchedulesConfig};
pub use error::{ConfigError, Result, SchedulesSdkError, TransportError};
pub use http::{ApiClient, ApiClientBuilder, ClientConfig, ScheduledTaskApi, SlashCommandApi};
pub use notify::{Notification, NotificationKind, Notifier, SharedNotifier, TracingNotifier};
pub use remote::{RemoteEntityClient, TriggerClient, TriggerReceipt};
pub use retry::RetryConfig;
pub use store::{EntityId, EntityStore, MutationKey, StoreActivity};

/// Store of scheduled tasks backed by the HTTP API.
pub type ScheduledTaskStore = EntityStore<ScheduledTaskApi>;

/// Store of slash commands backed by the HTTP API.
pub type SlashCommandStore = EntityStore<SlashCommandApi>;
