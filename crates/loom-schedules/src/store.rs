// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local cache of remote entities with optimistic updates.
//!
//! [`EntityStore`] owns the cached collection for one entity kind and is the
//! only writer to it. Every operation calls the [`RemoteEntityClient`],
//! applies the server's answer, and reports the outcome through a
//! [`Notifier`](crate::Notifier). Failures never escape: the cache is left
//! unchanged (or rolled back) and the call resolves to "no value".
//!
//! # Locking
//!
//! Each mutation holds a [`MutationKey`] for its whole lifetime: `Create` for
//! creations, `Entity(id)` for update, remove, reload and trigger. Keys form a
//! set, so mutations on different entities run concurrently while two
//! mutations on the same key run one after the other. A key is released by a
//! drop guard on every exit path, including when the caller drops the future.
//!
//! Refresh and mutations exclude each other: a refresh waits for in-flight
//! mutations and new mutations wait for a running refresh. The observable
//! [`StoreActivity`] is therefore always exactly one of idle, loading, or
//! mutating.
//!
//! # Optimistic toggles
//!
//! [`EntityStore::set_enabled_optimistic`] flips `enabled` in the cache when
//! it is called, before any request is made. Per entity the store keeps the
//! last server-confirmed value (the baseline) and the optimistic writes still
//! pending. A server record moves the baseline; a failed write shows the
//! newest pending write if there is one and the baseline otherwise. Rollback
//! never inverts the attempted value.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use loom_schedules_core::{EnabledPatch, Entity, Validate};
use parking_lot::Mutex;
use tokio::sync::{Notify, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::notify::{Notification, Notifier, SharedNotifier, TracingNotifier};
use crate::remote::{RemoteEntityClient, TriggerClient};

/// Identifier type of the entities served by client `C`.
pub type EntityId<C> = <<C as RemoteEntityClient>::Entity as Entity>::Id;

/// What a pending mutation is guarding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MutationKey<Id> {
	/// A creation is in flight.
	Create,
	/// An update, remove, reload, or trigger of this entity is in flight.
	Entity(Id),
}

/// What the store is doing right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreActivity<Id> {
	Idle,
	Loading,
	/// Never empty.
	Mutating(BTreeSet<MutationKey<Id>>),
}

/// Synchronized cache for one entity kind.
pub struct EntityStore<C: RemoteEntityClient> {
	inner: Arc<StoreInner<C>>,
}

impl<C: RemoteEntityClient> Clone for EntityStore<C> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

struct StoreInner<C: RemoteEntityClient> {
	client: C,
	notifier: SharedNotifier,
	cache: Mutex<Cache<C::Entity>>,
	/// Read-held by mutations, write-held by refresh.
	gate: RwLock<()>,
	/// Signalled whenever a key is released or a refresh ends.
	released: Notify,
}

impl<C: RemoteEntityClient> EntityStore<C> {
	/// Creates a store that reports notifications through `tracing`.
	pub fn new(client: C) -> Self {
		Self::with_notifier(client, Arc::new(TracingNotifier))
	}

	pub fn with_notifier(client: C, notifier: SharedNotifier) -> Self {
		Self {
			inner: Arc::new(StoreInner {
				client,
				notifier,
				cache: Mutex::new(Cache::new()),
				gate: RwLock::new(()),
				released: Notify::new(),
			}),
		}
	}

	pub fn client(&self) -> &C {
		&self.inner.client
	}

	/// Snapshot of the cached entities in display order.
	pub fn items(&self) -> Vec<C::Entity> {
		self.inner.cache.lock().items.clone()
	}

	pub fn get(&self, id: &EntityId<C>) -> Option<C::Entity> {
		let cache = self.inner.cache.lock();
		cache.position(id).map(|index| cache.items[index].clone())
	}

	pub fn len(&self) -> usize {
		self.inner.cache.lock().items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn activity(&self) -> StoreActivity<EntityId<C>> {
		self.inner.cache.lock().activity.clone()
	}

	pub fn is_loading(&self) -> bool {
		matches!(self.inner.cache.lock().activity, StoreActivity::Loading)
	}

	pub fn is_mutating(&self, key: &MutationKey<EntityId<C>>) -> bool {
		match &self.inner.cache.lock().activity {
			StoreActivity::Mutating(keys) => keys.contains(key),
			_ => false,
		}
	}

	/// Whether the create affordance should be disabled.
	pub fn is_creating(&self) -> bool {
		self.is_mutating(&MutationKey::Create)
	}

	/// Whether a row's controls should be disabled.
	pub fn is_busy(&self, id: &EntityId<C>) -> bool {
		self.is_mutating(&MutationKey::Entity(id.clone()))
	}

	pub fn in_flight(&self) -> Vec<MutationKey<EntityId<C>>> {
		match &self.inner.cache.lock().activity {
			StoreActivity::Mutating(keys) => keys.iter().cloned().collect(),
			_ => Vec::new(),
		}
	}

	/// Replace the cache with the server's list.
	///
	/// On failure the cache keeps its previous contents. Returns whether the
	/// list was loaded.
	pub async fn refresh(&self) -> bool {
		let inner = &*self.inner;
		let kind = <C::Entity as Entity>::KIND;
		let _loading = inner.begin_loading().await;
		debug!(kind, "Refreshing");

		match inner.client.list().await {
			Ok(items) => {
				let count = items.len();
				inner.cache.lock().replace_all(items);
				info!(kind, count, "Refreshed");
				true
			}
			Err(e) => {
				warn!(kind, error = %e, "Failed to refresh");
				inner.notify(Notification::error(format!(
					"Failed to load {}s: {e}",
					<C::Entity as Entity>::LABEL
				)));
				false
			}
		}
	}

	/// Create an entity and prepend the server's record to the cache.
	pub async fn create(&self, input: &C::CreateInput) -> Option<C::Entity> {
		let inner = &*self.inner;
		let kind = <C::Entity as Entity>::KIND;
		let label = <C::Entity as Entity>::LABEL;

		if let Err(e) = input.validate() {
			debug!(kind, error = %e, "Rejected invalid create input");
			inner.notify(Notification::error(format!("Invalid {label}: {e}")));
			return None;
		}

		let _guard = inner.lock(MutationKey::Create).await;
		match inner.client.create(input).await {
			Ok(entity) => {
				inner.cache.lock().insert_created(entity.clone());
				info!(kind, id = %entity.id(), "Created");
				inner.notify(Notification::success(format!("Created {label} {}", entity.id())));
				Some(entity)
			}
			Err(e) => {
				warn!(kind, error = %e, "Failed to create");
				inner.notify(Notification::error(format!("Failed to create {label}: {e}")));
				None
			}
		}
	}

	/// Update an entity and replace the cached entry with the server's record.
	///
	/// The returned record is authoritative; the patch is not merged locally.
	pub async fn update(&self, id: &EntityId<C>, patch: &C::Patch) -> Option<C::Entity> {
		self.inner
			.update_entity(id, patch, |cache, outcome| {
				if let Some(entity) = outcome {
					cache.apply_server_record(entity.clone());
				}
			})
			.await
	}

	/// Flip `enabled` in the cache now and persist it with the returned future.
	///
	/// The cache changes before this method returns. If the update fails, or
	/// the future is dropped before it completes, the entity shows the last
	/// server-confirmed value again unless a newer toggle is still pending.
	pub fn set_enabled_optimistic(
		&self,
		id: &EntityId<C>,
		enabled: bool,
	) -> impl Future<Output = Option<C::Entity>> + Send + '_ {
		let inner = &*self.inner;
		let generation = inner.cache.lock().begin_optimistic(id, enabled);
		if generation.is_none() {
			debug!(kind = <C::Entity as Entity>::KIND, id = %id, "Toggling uncached entity");
		}
		let mut write = OptimisticWrite {
			inner,
			id: id.clone(),
			generation,
		};

		async move {
			let id = write.id.clone();
			let patch = C::Patch::enabled_only(enabled);
			inner
				.update_entity(&id, &patch, |cache, outcome| write.settle(cache, outcome))
				.await
		}
	}

	/// Delete an entity and drop it from the cache.
	pub async fn remove(&self, id: &EntityId<C>) -> bool {
		let inner = &*self.inner;
		let kind = <C::Entity as Entity>::KIND;
		let label = <C::Entity as Entity>::LABEL;

		let _guard = inner.lock(MutationKey::Entity(id.clone())).await;
		match inner.client.remove(id).await {
			Ok(()) => {
				inner.cache.lock().remove_item(id);
				info!(kind, id = %id, "Removed");
				inner.notify(Notification::success(format!("Deleted {label} {id}")));
				true
			}
			Err(e) => {
				warn!(kind, id = %id, error = %e, "Failed to remove");
				inner.notify(Notification::error(format!("Failed to delete {label} {id}: {e}")));
				false
			}
		}
	}

	/// Fetch one entity and replace (or append) it in the cache.
	pub async fn reload(&self, id: &EntityId<C>) -> Option<C::Entity> {
		let inner = &*self.inner;
		let kind = <C::Entity as Entity>::KIND;

		let _guard = inner.lock(MutationKey::Entity(id.clone())).await;
		match inner.client.get(id).await {
			Ok(entity) => {
				inner.cache.lock().upsert_server_record(entity.clone());
				debug!(kind, id = %id, "Reloaded");
				Some(entity)
			}
			Err(e) => {
				warn!(kind, id = %id, error = %e, "Failed to reload");
				inner.notify(Notification::error(format!(
					"Failed to load {} {id}: {e}",
					<C::Entity as Entity>::LABEL
				)));
				None
			}
		}
	}
}

impl<C: TriggerClient> EntityStore<C> {
	/// Ask the server to run an entity now.
	///
	/// The cache is not touched; run status arrives with the next refresh or
	/// reload.
	pub async fn trigger(&self, id: &EntityId<C>) -> bool {
		let inner = &*self.inner;
		let kind = <C::Entity as Entity>::KIND;
		let label = <C::Entity as Entity>::LABEL;

		let _guard = inner.lock(MutationKey::Entity(id.clone())).await;
		match inner.client.trigger(id).await {
			Ok(receipt) => {
				info!(kind, id = %id, run_id = ?receipt.run_id, "Triggered");
				inner.notify(Notification::success(format!("Triggered {label} {id}")));
				true
			}
			Err(e) => {
				warn!(kind, id = %id, error = %e, "Failed to trigger");
				inner.notify(Notification::error(format!("Failed to trigger {label} {id}: {e}")));
				false
			}
		}
	}
}

impl<C: RemoteEntityClient> StoreInner<C> {
	fn notify(&self, notification: Notification) {
		self.notifier.notify(notification);
	}

	/// Wait until `key` is free and no refresh is running, then hold it.
	async fn lock(&self, key: MutationKey<EntityId<C>>) -> MutationGuard<'_, C> {
		let gate = self.gate.read().await;
		loop {
			let released = self.released.notified();
			tokio::pin!(released);
			released.as_mut().enable();

			if self.cache.lock().try_acquire(&key) {
				break;
			}
			debug!(
				kind = <C::Entity as Entity>::KIND,
				key = ?key,
				"Waiting for in-flight mutation"
			);
			released.await;
		}
		MutationGuard {
			inner: self,
			key,
			_gate: gate,
		}
	}

	async fn begin_loading(&self) -> LoadingGuard<'_, C> {
		let gate = self.gate.write().await;
		self.cache.lock().activity = StoreActivity::Loading;
		LoadingGuard {
			inner: self,
			_gate: gate,
		}
	}

	/// Shared update path. `settle` runs under the cache lock before the key
	/// is released, with the server record on success and `None` otherwise.
	async fn update_entity<F>(
		&self,
		id: &EntityId<C>,
		patch: &C::Patch,
		settle: F,
	) -> Option<C::Entity>
	where
		F: FnOnce(&mut Cache<C::Entity>, Option<&C::Entity>) + Send,
	{
		let kind = <C::Entity as Entity>::KIND;
		let label = <C::Entity as Entity>::LABEL;

		if let Err(e) = patch.validate() {
			settle(&mut *self.cache.lock(), None);
			debug!(kind, id = %id, error = %e, "Rejected invalid patch");
			self.notify(Notification::error(format!("Invalid {label}: {e}")));
			return None;
		}

		let _guard = self.lock(MutationKey::Entity(id.clone())).await;
		match self.client.update(id, patch).await {
			Ok(entity) => {
				settle(&mut *self.cache.lock(), Some(&entity));
				info!(kind, id = %id, "Updated");
				self.notify(Notification::success(format!("Updated {label} {id}")));
				Some(entity)
			}
			Err(e) => {
				settle(&mut *self.cache.lock(), None);
				warn!(kind, id = %id, error = %e, "Failed to update");
				self.notify(Notification::error(format!("Failed to update {label} {id}: {e}")));
				None
			}
		}
	}
}

/// Holds a mutation key (and the shared side of the refresh gate).
struct MutationGuard<'a, C: RemoteEntityClient> {
	inner: &'a StoreInner<C>,
	key: MutationKey<EntityId<C>>,
	_gate: RwLockReadGuard<'a, ()>,
}

impl<C: RemoteEntityClient> Drop for MutationGuard<'_, C> {
	fn drop(&mut self) {
		self.inner.cache.lock().release(&self.key);
		self.inner.released.notify_waiters();
	}
}

struct LoadingGuard<'a, C: RemoteEntityClient> {
	inner: &'a StoreInner<C>,
	_gate: RwLockWriteGuard<'a, ()>,
}

impl<C: RemoteEntityClient> Drop for LoadingGuard<'_, C> {
	fn drop(&mut self) {
		{
			let mut cache = self.inner.cache.lock();
			if matches!(cache.activity, StoreActivity::Loading) {
				cache.activity = StoreActivity::Idle;
			}
		}
		self.inner.released.notify_waiters();
	}
}

/// An optimistic toggle that has not been settled yet. Dropping it unsettled
/// counts as a failure.
struct OptimisticWrite<'a, C: RemoteEntityClient> {
	inner: &'a StoreInner<C>,
	id: EntityId<C>,
	generation: Option<u64>,
}

impl<C: RemoteEntityClient> OptimisticWrite<'_, C> {
	fn settle(&mut self, cache: &mut Cache<C::Entity>, outcome: Option<&C::Entity>) {
		match self.generation.take() {
			Some(generation) => cache.settle_optimistic(&self.id, generation, outcome),
			None => {
				if let Some(entity) = outcome {
					cache.apply_server_record(entity.clone());
				}
			}
		}
	}
}

impl<C: RemoteEntityClient> Drop for OptimisticWrite<'_, C> {
	fn drop(&mut self) {
		if let Some(generation) = self.generation.take() {
			debug!(
				kind = <C::Entity as Entity>::KIND,
				id = %self.id,
				"Optimistic toggle abandoned"
			);
			self.inner
				.cache
				.lock()
				.settle_optimistic(&self.id, generation, None);
		}
	}
}

/// Last server-confirmed `enabled` plus the optimistic writes still pending.
#[derive(Debug)]
struct OptimisticSlot {
	baseline: bool,
	/// Keyed by generation; the last entry is the newest write.
	pending: BTreeMap<u64, bool>,
}

impl OptimisticSlot {
	fn displayed(&self) -> bool {
		self.pending
			.last_key_value()
			.map(|(_, enabled)| *enabled)
			.unwrap_or(self.baseline)
	}
}

struct Cache<E: Entity> {
	items: Vec<E>,
	activity: StoreActivity<E::Id>,
	optimistic: HashMap<E::Id, OptimisticSlot>,
	next_generation: u64,
}

impl<E: Entity> Cache<E> {
	fn new() -> Self {
		Self {
			items: Vec::new(),
			activity: StoreActivity::Idle,
			optimistic: HashMap::new(),
			next_generation: 0,
		}
	}

	fn position(&self, id: &E::Id) -> Option<usize> {
		self.items.iter().position(|item| item.id() == id)
	}

	fn try_acquire(&mut self, key: &MutationKey<E::Id>) -> bool {
		if let StoreActivity::Mutating(keys) = &mut self.activity {
			return keys.insert(key.clone());
		}
		if matches!(self.activity, StoreActivity::Loading) {
			return false;
		}
		self.activity = StoreActivity::Mutating(BTreeSet::from([key.clone()]));
		true
	}

	fn release(&mut self, key: &MutationKey<E::Id>) {
		if let StoreActivity::Mutating(keys) = &mut self.activity {
			keys.remove(key);
			if keys.is_empty() {
				self.activity = StoreActivity::Idle;
			}
		}
	}

	fn replace_all(&mut self, items: Vec<E>) {
		self.items = items;
		for item in &mut self.items {
			if let Some(slot) = self.optimistic.get_mut(item.id()) {
				slot.baseline = item.enabled();
				item.set_enabled(slot.displayed());
			}
		}
	}

	fn insert_created(&mut self, entity: E) {
		if let Some(index) = self.position(entity.id()) {
			self.items.remove(index);
		}
		self.items.insert(0, entity);
	}

	/// Replace the cached entry with a server record, keeping any newer
	/// optimistic value on display. Returns whether an entry was replaced.
	fn apply_server_record(&mut self, mut entity: E) -> bool {
		if let Some(slot) = self.optimistic.get_mut(entity.id()) {
			slot.baseline = entity.enabled();
			entity.set_enabled(slot.displayed());
		}
		match self.position(entity.id()) {
			Some(index) => {
				self.items[index] = entity;
				true
			}
			None => false,
		}
	}

	fn upsert_server_record(&mut self, entity: E) {
		if !self.apply_server_record(entity.clone()) {
			self.items.push(entity);
		}
	}

	fn remove_item(&mut self, id: &E::Id) {
		if let Some(index) = self.position(id) {
			self.items.remove(index);
		}
		self.optimistic.remove(id);
	}

	fn begin_optimistic(&mut self, id: &E::Id, enabled: bool) -> Option<u64> {
		let index = self.position(id)?;
		let generation = self.next_generation;
		self.next_generation += 1;

		let current = self.items[index].enabled();
		self.optimistic
			.entry(id.clone())
			.or_insert_with(|| OptimisticSlot {
				baseline: current,
				pending: BTreeMap::new(),
			})
			.pending
			.insert(generation, enabled);
		self.items[index].set_enabled(enabled);
		Some(generation)
	}

	fn settle_optimistic(&mut self, id: &E::Id, generation: u64, outcome: Option<&E>) {
		if !self.optimistic.contains_key(id) {
			// Removed or replaced while in flight.
			if let Some(entity) = outcome {
				self.apply_server_record(entity.clone());
			}
			return;
		}

		let (displayed, drained) = {
			let Some(slot) = self.optimistic.get_mut(id) else {
				return;
			};
			slot.pending.remove(&generation);
			(slot.displayed(), slot.pending.is_empty())
		};

		match outcome {
			Some(entity) => {
				self.apply_server_record(entity.clone());
			}
			None => {
				if let Some(index) = self.position(id) {
					self.items[index].set_enabled(displayed);
				}
			}
		}

		if drained {
			self.optimistic.remove(id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TransportError;
	use crate::notify::NotificationKind;
	use crate::remote::TriggerReceipt;
	use async_trait::async_trait;
	use loom_schedules_core::{ScheduledTask, ScheduledTaskCreate, ScheduledTaskPatch, TaskId};
	use std::time::Duration;
	use tokio::sync::Semaphore;

	fn task(id: &str, enabled: bool) -> ScheduledTask {
		ScheduledTask {
			task_id: TaskId::from(id),
			name: format!("task {id}"),
			cron: "0 9 * * *".to_string(),
			timezone: "UTC".to_string(),
			prompt: "summarize".to_string(),
			enabled,
			reuse_session: false,
			next_run_at: None,
			last_run_status: None,
			created_at: None,
			updated_at: None,
		}
	}

	/// In-memory backend. Every call is recorded, then waits on `gate`.
	struct FakeTasks {
		tasks: Mutex<Vec<ScheduledTask>>,
		calls: Mutex<Vec<&'static str>>,
		failures: Mutex<Vec<&'static str>>,
		gate: Semaphore,
		next_id: Mutex<u32>,
	}

	impl FakeTasks {
		fn new(tasks: Vec<ScheduledTask>) -> Self {
			Self {
				tasks: Mutex::new(tasks),
				calls: Mutex::new(Vec::new()),
				failures: Mutex::new(Vec::new()),
				gate: Semaphore::new(Semaphore::MAX_PERMITS),
				next_id: Mutex::new(1),
			}
		}

		/// Calls block until [`FakeTasks::release`] lets them through.
		fn gated(tasks: Vec<ScheduledTask>) -> Self {
			Self {
				gate: Semaphore::new(0),
				..Self::new(tasks)
			}
		}

		fn release(&self, calls: usize) {
			self.gate.add_permits(calls);
		}

		/// The next call of `op` fails.
		fn fail_next(&self, op: &'static str) {
			self.failures.lock().push(op);
		}

		fn calls(&self) -> Vec<&'static str> {
			self.calls.lock().clone()
		}

		fn call_count(&self) -> usize {
			self.calls.lock().len()
		}

		async fn enter(&self, op: &'static str) -> Result<(), TransportError> {
			self.calls.lock().push(op);
			self.gate.acquire().await.unwrap().forget();
			let mut failures = self.failures.lock();
			if let Some(index) = failures.iter().position(|f| *f == op) {
				failures.remove(index);
				return Err(TransportError::server(500, format!("{op} exploded")));
			}
			Ok(())
		}

		fn not_found(id: &TaskId) -> TransportError {
			TransportError::server(404, format!("task {id} not found"))
		}
	}

	#[async_trait]
	impl RemoteEntityClient for FakeTasks {
		type Entity = ScheduledTask;
		type CreateInput = ScheduledTaskCreate;
		type Patch = ScheduledTaskPatch;

		async fn list(&self) -> Result<Vec<ScheduledTask>, TransportError> {
			self.enter("list").await?;
			Ok(self.tasks.lock().clone())
		}

		async fn get(&self, id: &TaskId) -> Result<ScheduledTask, TransportError> {
			self.enter("get").await?;
			let tasks = self.tasks.lock();
			tasks
				.iter()
				.find(|t| &t.task_id == id)
				.cloned()
				.ok_or_else(|| Self::not_found(id))
		}

		async fn create(
			&self,
			input: &ScheduledTaskCreate,
		) -> Result<ScheduledTask, TransportError> {
			self.enter("create").await?;
			let id = {
				let mut next_id = self.next_id.lock();
				let id = format!("new_{}", *next_id);
				*next_id += 1;
				id
			};
			let created = ScheduledTask {
				task_id: TaskId(id),
				name: input.name.clone(),
				cron: input.cron.clone(),
				timezone: input.timezone.clone(),
				prompt: input.prompt.clone(),
				enabled: input.enabled,
				reuse_session: input.reuse_session,
				..task("unused", false)
			};
			self.tasks.lock().insert(0, created.clone());
			Ok(created)
		}

		async fn update(
			&self,
			id: &TaskId,
			patch: &ScheduledTaskPatch,
		) -> Result<ScheduledTask, TransportError> {
			self.enter("update").await?;
			let mut tasks = self.tasks.lock();
			let stored = tasks
				.iter_mut()
				.find(|t| &t.task_id == id)
				.ok_or_else(|| Self::not_found(id))?;
			patch.apply_to(stored);
			// The server normalizes names.
			stored.name = stored.name.trim().to_string();
			Ok(stored.clone())
		}

		async fn remove(&self, id: &TaskId) -> Result<(), TransportError> {
			self.enter("remove").await?;
			let mut tasks = self.tasks.lock();
			let before = tasks.len();
			tasks.retain(|t| &t.task_id != id);
			if tasks.len() == before {
				return Err(Self::not_found(id));
			}
			Ok(())
		}
	}

	#[async_trait]
	impl TriggerClient for FakeTasks {
		async fn trigger(&self, id: &TaskId) -> Result<TriggerReceipt, TransportError> {
			self.enter("trigger").await?;
			if !self.tasks.lock().iter().any(|t| &t.task_id == id) {
				return Err(Self::not_found(id));
			}
			Ok(TriggerReceipt {
				run_id: Some("run_1".to_string()),
				status: None,
			})
		}
	}

	#[derive(Default)]
	struct RecordingNotifier {
		seen: Mutex<Vec<Notification>>,
	}

	impl RecordingNotifier {
		fn kinds(&self) -> Vec<NotificationKind> {
			self.seen.lock().iter().map(|n| n.kind).collect()
		}
	}

	impl Notifier for RecordingNotifier {
		fn notify(&self, notification: Notification) {
			self.seen.lock().push(notification);
		}
	}

	fn store_with(client: FakeTasks) -> (EntityStore<FakeTasks>, Arc<RecordingNotifier>) {
		let notifier = Arc::new(RecordingNotifier::default());
		let store = EntityStore::with_notifier(client, notifier.clone());
		(store, notifier)
	}

	async fn loaded(tasks: Vec<ScheduledTask>) -> (EntityStore<FakeTasks>, Arc<RecordingNotifier>) {
		let (store, notifier) = store_with(FakeTasks::new(tasks));
		assert!(store.refresh().await);
		notifier.seen.lock().clear();
		(store, notifier)
	}

	async fn wait_for_calls(client: &FakeTasks, count: usize) {
		while client.call_count() < count {
			tokio::task::yield_now().await;
		}
	}

	fn id(value: &str) -> TaskId {
		TaskId::from(value)
	}

	fn enabled_of(store: &EntityStore<FakeTasks>, task_id: &str) -> bool {
		store.get(&id(task_id)).unwrap().enabled
	}

	#[tokio::test]
	async fn refresh_replaces_items_in_server_order() {
		let (store, notifier) = store_with(FakeTasks::new(vec![task("b", true), task("a", false)]));
		assert!(store.is_empty());

		assert!(store.refresh().await);

		let ids: Vec<_> = store.items().into_iter().map(|t| t.task_id.0).collect();
		assert_eq!(ids, vec!["b", "a"]);
		assert_eq!(store.activity(), StoreActivity::Idle);
		assert!(notifier.seen.lock().is_empty());
	}

	#[tokio::test]
	async fn refresh_failure_keeps_stale_items() {
		let (store, notifier) = loaded(vec![task("a", true)]).await;
		let before = store.items();

		store.client().tasks.lock().clear();
		store.client().fail_next("list");
		assert!(!store.refresh().await);

		assert_eq!(store.items(), before);
		assert!(!store.is_loading());
		assert_eq!(notifier.kinds(), vec![NotificationKind::Error]);
	}

	#[tokio::test]
	async fn refresh_reports_loading_while_in_flight() {
		let (store, _) = store_with(FakeTasks::gated(vec![task("a", true)]));

		let observe = async {
			wait_for_calls(store.client(), 1).await;
			assert!(store.is_loading());
			assert_eq!(store.activity(), StoreActivity::Loading);
			store.client().release(1);
		};
		let (loaded, ()) = tokio::join!(store.refresh(), observe);

		assert!(loaded);
		assert!(!store.is_loading());
	}

	#[tokio::test]
	async fn create_prepends_server_record() {
		let (store, notifier) = loaded(vec![task("a", true)]).await;

		let created = store
			.create(&ScheduledTaskCreate::new("daily-report", "0 9 * * *", "summarize"))
			.await
			.unwrap();

		assert_eq!(created.task_id, id("new_1"));
		let ids: Vec<_> = store.items().into_iter().map(|t| t.task_id.0).collect();
		assert_eq!(ids, vec!["new_1", "a"]);
		assert_eq!(notifier.kinds(), vec![NotificationKind::Success]);
		assert!(!store.is_creating());
	}

	#[tokio::test]
	async fn create_failure_leaves_cache_unchanged() {
		let (store, notifier) = loaded(vec![task("a", true)]).await;
		let before = store.items();
		store.client().fail_next("create");

		let created = store
			.create(&ScheduledTaskCreate::new("n", "* * * * *", "p"))
			.await;

		assert!(created.is_none());
		assert_eq!(store.items(), before);
		assert_eq!(notifier.kinds(), vec![NotificationKind::Error]);
		assert_eq!(store.activity(), StoreActivity::Idle);
	}

	#[tokio::test]
	async fn invalid_create_never_reaches_the_server() {
		let (store, notifier) = loaded(vec![]).await;
		let calls_before = store.client().call_count();

		let created = store
			.create(&ScheduledTaskCreate::new("n", "not a cron", "p"))
			.await;

		assert!(created.is_none());
		assert_eq!(store.client().call_count(), calls_before);
		assert_eq!(notifier.kinds(), vec![NotificationKind::Error]);
	}

	#[tokio::test]
	async fn create_holds_the_create_key() {
		let (store, _) = store_with(FakeTasks::gated(vec![]));

		let observe = async {
			wait_for_calls(store.client(), 1).await;
			assert!(store.is_creating());
			assert_eq!(store.in_flight(), vec![MutationKey::Create]);
			store.client().release(1);
		};
		let input = ScheduledTaskCreate::new("n", "* * * * *", "p");
		let (created, ()) = tokio::join!(
			store.create(&input),
			observe
		);

		assert!(created.is_some());
		assert!(!store.is_creating());
	}

	#[tokio::test]
	async fn update_takes_the_server_record() {
		let (store, notifier) = loaded(vec![task("a", true)]).await;

		let patch = ScheduledTaskPatch {
			name: Some("  renamed  ".to_string()),
			..Default::default()
		};
		let updated = store.update(&id("a"), &patch).await.unwrap();

		assert_eq!(updated.name, "renamed");
		assert_eq!(store.get(&id("a")).unwrap().name, "renamed");
		assert_eq!(notifier.kinds(), vec![NotificationKind::Success]);
	}

	#[tokio::test]
	async fn update_failure_leaves_cache_unchanged() {
		let (store, notifier) = loaded(vec![task("a", true)]).await;
		let before = store.items();
		store.client().fail_next("update");

		let patch = ScheduledTaskPatch {
			prompt: Some("new prompt".to_string()),
			..Default::default()
		};
		assert!(store.update(&id("a"), &patch).await.is_none());

		assert_eq!(store.items(), before);
		assert_eq!(notifier.kinds(), vec![NotificationKind::Error]);
		assert!(!store.is_busy(&id("a")));
	}

	#[tokio::test]
	async fn remove_drops_entry() {
		let (store, _) = loaded(vec![task("a", true), task("b", true)]).await;

		assert!(store.remove(&id("a")).await);

		assert!(store.get(&id("a")).is_none());
		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn remove_failure_keeps_entry() {
		let (store, notifier) = loaded(vec![task("a", true)]).await;
		store.client().fail_next("remove");

		assert!(!store.remove(&id("a")).await);

		assert!(store.get(&id("a")).is_some());
		assert_eq!(notifier.kinds(), vec![NotificationKind::Error]);
		assert_eq!(store.activity(), StoreActivity::Idle);
	}

	#[tokio::test]
	async fn optimistic_toggle_applies_before_the_request() {
		let (store, _) = loaded(vec![task("a", false)]).await;

		let pending = store.set_enabled_optimistic(&id("a"), true);
		assert!(enabled_of(&store, "a"));

		let updated = pending.await.unwrap();
		assert!(updated.enabled);
		assert!(enabled_of(&store, "a"));
		assert!(store.client().tasks.lock()[0].enabled);
	}

	#[tokio::test]
	async fn optimistic_toggle_rolls_back_on_failure() {
		let (store, notifier) = loaded(vec![task("a", false)]).await;
		store.client().fail_next("update");

		let pending = store.set_enabled_optimistic(&id("a"), true);
		assert!(enabled_of(&store, "a"));

		assert!(pending.await.is_none());
		assert!(!enabled_of(&store, "a"));
		assert_eq!(notifier.kinds(), vec![NotificationKind::Error]);
	}

	#[tokio::test]
	async fn dropped_toggle_rolls_back_and_releases_key() {
		let (store, _) = store_with(FakeTasks::gated(vec![task("a", false)]));
		store.client().release(1);
		assert!(store.refresh().await);

		let pending = store.set_enabled_optimistic(&id("a"), true);
		let outcome = tokio::time::timeout(Duration::from_millis(20), pending).await;

		assert!(outcome.is_err());
		assert!(!enabled_of(&store, "a"));
		assert_eq!(store.activity(), StoreActivity::Idle);
	}

	#[tokio::test]
	async fn dropped_toggle_before_polling_rolls_back() {
		let (store, _) = loaded(vec![task("a", false)]).await;

		let pending = store.set_enabled_optimistic(&id("a"), true);
		assert!(enabled_of(&store, "a"));
		drop(pending);

		assert!(!enabled_of(&store, "a"));
	}

	#[tokio::test]
	async fn earlier_failure_keeps_newer_pending_toggle() {
		let (store, _) = store_with(FakeTasks::gated(vec![task("a", false)]));
		store.client().release(1);
		assert!(store.refresh().await);
		store.client().fail_next("update");
		store.client().fail_next("update");

		let first = store.set_enabled_optimistic(&id("a"), true);
		let second = store.set_enabled_optimistic(&id("a"), true);
		assert!(enabled_of(&store, "a"));

		let drive = async {
			// First request fails while the second waits for the key.
			wait_for_calls(store.client(), 2).await;
			store.client().release(1);
			wait_for_calls(store.client(), 3).await;
			assert!(enabled_of(&store, "a"), "newer pending toggle stays visible");
			store.client().release(1);
		};
		let (first, second, ()) = tokio::join!(first, second, drive);

		assert!(first.is_none());
		assert!(second.is_none());
		// Nothing reached the server, so the last confirmed value returns.
		assert!(!enabled_of(&store, "a"));
		assert_eq!(store.activity(), StoreActivity::Idle);
	}

	#[tokio::test]
	async fn last_successful_write_wins() {
		let (store, _) = loaded(vec![task("a", true)]).await;

		assert!(store.set_enabled_optimistic(&id("a"), false).await.is_some());
		store.client().fail_next("update");
		assert!(store.set_enabled_optimistic(&id("a"), true).await.is_none());

		assert!(!enabled_of(&store, "a"));
	}

	#[tokio::test]
	async fn second_remove_on_same_row_waits_its_turn() {
		let (store, notifier) = store_with(FakeTasks::gated(vec![task("a", true)]));
		store.client().release(1);
		assert!(store.refresh().await);
		notifier.seen.lock().clear();

		let drive = async {
			wait_for_calls(store.client(), 2).await;
			assert!(store.is_busy(&id("a")));
			// The second remove has not reached the server yet.
			assert_eq!(store.client().calls(), vec!["list", "remove"]);
			store.client().release(2);
		};
		let (id_a1, id_a2) = (id("a"), id("a"));
		let (first, second, ()) =
			tokio::join!(store.remove(&id_a1), store.remove(&id_a2), drive);

		assert!(first);
		assert!(!second, "entity is already gone");
		assert_eq!(store.client().calls(), vec!["list", "remove", "remove"]);
		assert_eq!(store.activity(), StoreActivity::Idle);
		assert_eq!(
			notifier.kinds(),
			vec![NotificationKind::Success, NotificationKind::Error]
		);
	}

	#[tokio::test]
	async fn finishing_one_row_does_not_release_another() {
		let (store, _) = store_with(FakeTasks::gated(vec![task("a", true), task("b", true)]));
		store.client().release(1);
		assert!(store.refresh().await);

		let drive = async {
			wait_for_calls(store.client(), 3).await;
			assert!(store.is_busy(&id("a")));
			assert!(store.is_busy(&id("b")));

			store.client().release(1);
			while store.is_busy(&id("a")) && store.is_busy(&id("b")) {
				tokio::task::yield_now().await;
			}
			let still_busy = [id("a"), id("b")]
				.into_iter()
				.filter(|task_id| store.is_busy(task_id))
				.count();
			assert_eq!(still_busy, 1);

			store.client().release(1);
		};
		let patch = ScheduledTaskPatch {
			prompt: Some("p2".to_string()),
			..Default::default()
		};
		let (id_a, id_b) = (id("a"), id("b"));
		let (a, b, ()) =
			tokio::join!(store.remove(&id_a), store.update(&id_b, &patch), drive);

		assert!(a);
		assert!(b.is_some());
		assert_eq!(store.activity(), StoreActivity::Idle);
	}

	#[tokio::test]
	async fn refresh_waits_for_in_flight_mutations() {
		let (store, _) = store_with(FakeTasks::gated(vec![task("a", true)]));
		store.client().release(1);
		assert!(store.refresh().await);

		let drive = async {
			wait_for_calls(store.client(), 2).await;
			for _ in 0..10 {
				tokio::task::yield_now().await;
			}
			// The refresh is queued behind the remove.
			assert!(!store.is_loading());
			assert_eq!(store.client().calls(), vec!["list", "remove"]);
			store.client().release(2);
		};
		let id_a = id("a");
		let (removed, refreshed, ()) = tokio::join!(store.remove(&id_a), store.refresh(), drive);

		assert!(removed);
		assert!(refreshed);
		assert!(store.is_empty());
		assert_eq!(store.activity(), StoreActivity::Idle);
	}

	#[tokio::test]
	async fn refresh_keeps_pending_optimistic_value() {
		let (store, _) = store_with(FakeTasks::gated(vec![task("a", false)]));
		store.client().release(1);
		assert!(store.refresh().await);

		let toggle = store.set_enabled_optimistic(&id("a"), true);
		let drive = async {
			// The list request runs first; the toggle waits behind it.
			wait_for_calls(store.client(), 2).await;
			store.client().release(1);
			while !store.is_busy(&id("a")) {
				tokio::task::yield_now().await;
			}
			assert!(enabled_of(&store, "a"), "optimistic value survives the refresh");
			store.client().release(1);
		};
		let (refreshed, toggled, ()) = tokio::join!(store.refresh(), toggle, drive);

		assert!(refreshed);
		assert!(toggled.unwrap().enabled);
		assert!(enabled_of(&store, "a"));
	}

	#[tokio::test]
	async fn trigger_only_notifies() {
		let (store, notifier) = loaded(vec![task("a", true)]).await;
		let before = store.items();

		assert!(store.trigger(&id("a")).await);
		assert_eq!(store.items(), before);

		assert!(!store.trigger(&id("missing")).await);
		assert_eq!(
			notifier.kinds(),
			vec![NotificationKind::Success, NotificationKind::Error]
		);
		assert_eq!(store.activity(), StoreActivity::Idle);
	}

	#[tokio::test]
	async fn reload_replaces_single_record() {
		let (store, _) = loaded(vec![task("a", true)]).await;
		store.client().tasks.lock()[0].last_run_status =
			Some(loom_schedules_core::RunStatus::Running);

		let reloaded = store.reload(&id("a")).await.unwrap();

		assert_eq!(
			reloaded.last_run_status,
			Some(loom_schedules_core::RunStatus::Running)
		);
		assert_eq!(store.get(&id("a")).unwrap(), reloaded);
	}

	#[test]
	fn cache_key_set_transitions() {
		let mut cache: Cache<ScheduledTask> = Cache::new();
		let a = MutationKey::Entity(id("a"));

		assert!(cache.try_acquire(&a));
		assert!(!cache.try_acquire(&a));
		assert!(cache.try_acquire(&MutationKey::Create));

		cache.release(&a);
		assert_eq!(
			cache.activity,
			StoreActivity::Mutating(BTreeSet::from([MutationKey::Create]))
		);
		cache.release(&MutationKey::Create);
		assert_eq!(cache.activity, StoreActivity::Idle);

		cache.activity = StoreActivity::Loading;
		assert!(!cache.try_acquire(&a));
	}
}
