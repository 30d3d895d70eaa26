// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Contract between the entity store and the backend.

use async_trait::async_trait;
use loom_schedules_core::{EnabledPatch, Entity, RunStatus, Validate};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Stateless request/response access to one entity kind.
///
/// Implemented over HTTP by [`crate::ScheduledTaskApi`] and
/// [`crate::SlashCommandApi`]; tests substitute in-memory doubles.
#[async_trait]
pub trait RemoteEntityClient: Send + Sync + 'static {
	type Entity: Entity;
	type CreateInput: Validate + Send + Sync;
	type Patch: Validate + EnabledPatch + Send + Sync;

	async fn list(&self) -> Result<Vec<Self::Entity>, TransportError>;

	async fn get(&self, id: &<Self::Entity as Entity>::Id) -> Result<Self::Entity, TransportError>;

	async fn create(&self, input: &Self::CreateInput) -> Result<Self::Entity, TransportError>;

	/// Returns the full record as stored after the update.
	async fn update(
		&self,
		id: &<Self::Entity as Entity>::Id,
		patch: &Self::Patch,
	) -> Result<Self::Entity, TransportError>;

	async fn remove(&self, id: &<Self::Entity as Entity>::Id) -> Result<(), TransportError>;
}

/// Entity kinds that can be run on demand.
#[async_trait]
pub trait TriggerClient: RemoteEntityClient {
	async fn trigger(
		&self,
		id: &<Self::Entity as Entity>::Id,
	) -> Result<TriggerReceipt, TransportError>;
}

/// Acknowledgement of a manual run request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerReceipt {
	#[serde(default)]
	pub run_id: Option<String>,
	#[serde(default)]
	pub status: Option<RunStatus>,
}
