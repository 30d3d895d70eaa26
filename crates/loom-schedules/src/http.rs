// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP implementations of the remote entity clients.
//!
//! Every response body is an envelope `{ "code", "message", "data" }` where
//! `code == 0` means success. A non-zero code is an error even on HTTP 2xx.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_schedules_core::{
	CommandId, ScheduledTask, ScheduledTaskCreate, ScheduledTaskPatch, SlashCommand,
	SlashCommandCreate, SlashCommandPatch, TaskId,
};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{Result, SchedulesSdkError, TransportError};
use crate::remote::{RemoteEntityClient, TriggerClient, TriggerReceipt};
use crate::retry::{retry, RetryConfig};

/// SDK version for identification.
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
/// SDK name for identification.
const SDK_NAME: &str = "loom-schedules-rust";

const API_PREFIX: &[&str] = &["api", "v1"];
const TASKS_PATH: &str = "scheduled-tasks";
const COMMANDS_PATH: &str = "slash-commands";

/// Configuration for the API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Timeout for HTTP requests.
	pub request_timeout: Duration,
	/// Retry policy for idempotent requests. Create and trigger are sent once.
	pub retry_config: RetryConfig,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			request_timeout: Duration::from_secs(30),
			retry_config: RetryConfig::default(),
		}
	}
}

/// Builder for constructing an [`ApiClient`].
pub struct ApiClientBuilder {
	auth_token: Option<String>,
	base_url: Option<String>,
	config: ClientConfig,
}

impl ApiClientBuilder {
	pub fn new() -> Self {
		Self {
			auth_token: None,
			base_url: None,
			config: ClientConfig::default(),
		}
	}

	/// Sets the bearer token. Requests are unauthenticated without one.
	pub fn auth_token(mut self, token: impl Into<String>) -> Self {
		self.auth_token = Some(token.into());
		self
	}

	/// Sets the server origin, e.g. `https://loom.example.com`.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	pub fn retry_config(mut self, config: RetryConfig) -> Self {
		self.config.retry_config = config;
		self
	}

	pub fn build(self) -> Result<ApiClient> {
		let base_url = self
			.base_url
			.map(|url| url.trim().trim_end_matches('/').to_string())
			.filter(|url| !url.is_empty())
			.ok_or(SchedulesSdkError::InvalidBaseUrl)?;

		let mut api_root = Url::parse(&base_url).map_err(|_| SchedulesSdkError::InvalidBaseUrl)?;
		api_root
			.path_segments_mut()
			.map_err(|()| SchedulesSdkError::InvalidBaseUrl)?
			.pop_if_empty()
			.extend(API_PREFIX);

		let http_client = Client::builder()
			.user_agent(format!("{SDK_NAME}/{SDK_VERSION}"))
			.timeout(self.config.request_timeout)
			.build()?;

		info!(
			base_url = %base_url,
			sdk_name = SDK_NAME,
			sdk_version = SDK_VERSION,
			"Schedules client initialized"
		);

		Ok(ApiClient {
			inner: Arc::new(ApiClientInner {
				auth_token: self.auth_token,
				base_url,
				api_root,
				http_client,
				config: self.config,
			}),
		})
	}
}

impl Default for ApiClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ApiClientInner {
	auth_token: Option<String>,
	base_url: String,
	/// `{base_url}/api/v1`; entity ids are appended as encoded segments.
	api_root: Url,
	http_client: Client,
	config: ClientConfig,
}

/// Shared HTTP plumbing for the entity APIs.
///
/// ```ignore
/// let api = ApiClient::builder()
///     .base_url("https://loom.example.com")
///     .auth_token("token")
///     .build()?;
/// let store = EntityStore::new(api.scheduled_tasks());
/// store.refresh().await;
/// ```
#[derive(Clone)]
pub struct ApiClient {
	inner: Arc<ApiClientInner>,
}

impl ApiClient {
	pub fn builder() -> ApiClientBuilder {
		ApiClientBuilder::new()
	}

	pub fn base_url(&self) -> &str {
		&self.inner.base_url
	}

	pub fn scheduled_tasks(&self) -> ScheduledTaskApi {
		ScheduledTaskApi {
			client: self.clone(),
		}
	}

	pub fn slash_commands(&self) -> SlashCommandApi {
		SlashCommandApi {
			client: self.clone(),
		}
	}

	fn endpoint(&self, segments: &[&str]) -> Url {
		let mut url = self.inner.api_root.clone();
		// `build` rejects roots that cannot take path segments.
		if let Ok(mut path) = url.path_segments_mut() {
			path.extend(segments);
		}
		url
	}

	/// Send a request, returning the response and how many attempts it took.
	async fn execute<B>(
		&self,
		method: Method,
		segments: &[&str],
		body: Option<&B>,
		idempotent: bool,
	) -> std::result::Result<(Response, u32), TransportError>
	where
		B: Serialize + ?Sized + Sync,
	{
		let url = self.endpoint(segments);
		debug!(method = %method, url = %url, "Sending request");

		let single_attempt = RetryConfig::no_retry();
		let policy = if idempotent {
			&self.inner.config.retry_config
		} else {
			&single_attempt
		};

		let attempts = AtomicU32::new(0);
		let response = retry(policy, || {
			attempts.fetch_add(1, Ordering::Relaxed);
			let mut request = self.inner.http_client.request(method.clone(), url.clone());
			if let Some(token) = &self.inner.auth_token {
				request = request.bearer_auth(token);
			}
			if let Some(body) = body {
				request = request.json(body);
			}
			request.send()
		})
		.await?;

		Ok((response, attempts.into_inner()))
	}

	/// Send a request and return the envelope's `data`, which may be absent.
	async fn send<B>(
		&self,
		method: Method,
		segments: &[&str],
		body: Option<&B>,
		idempotent: bool,
	) -> std::result::Result<Option<serde_json::Value>, TransportError>
	where
		B: Serialize + ?Sized + Sync,
	{
		let (response, _) = self.execute(method, segments, body, idempotent).await?;
		read_envelope(response).await
	}

	/// Like [`ApiClient::send`] but `data` must decode as `T`.
	async fn fetch<T, B>(
		&self,
		method: Method,
		segments: &[&str],
		body: Option<&B>,
		idempotent: bool,
	) -> std::result::Result<T, TransportError>
	where
		T: DeserializeOwned,
		B: Serialize + ?Sized + Sync,
	{
		let data = self
			.send(method, segments, body, idempotent)
			.await?
			.ok_or_else(|| TransportError::Decode("response has no data".to_string()))?;
		serde_json::from_value(data).map_err(|e| TransportError::Decode(e.to_string()))
	}

	/// DELETE with retries. A 404 after a retry means an earlier attempt
	/// already removed the record.
	async fn delete(&self, segments: &[&str]) -> std::result::Result<(), TransportError> {
		let (response, attempts) = self
			.execute(Method::DELETE, segments, None::<&()>, true)
			.await?;
		if attempts > 1 && response.status() == StatusCode::NOT_FOUND {
			debug!(attempts, "Record already gone after retried delete");
			return Ok(());
		}
		read_envelope(response).await?;
		Ok(())
	}
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
	#[serde(default)]
	code: i64,
	#[serde(default)]
	message: String,
	#[serde(default)]
	data: Option<T>,
}

/// Entity lists arrive either bare or wrapped in `{ "items": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListData<T> {
	Bare(Vec<T>),
	Wrapped { items: Vec<T> },
}

impl<T> ListData<T> {
	fn into_items(self) -> Vec<T> {
		match self {
			Self::Bare(items) | Self::Wrapped { items } => items,
		}
	}
}

async fn read_envelope(
	response: Response,
) -> std::result::Result<Option<serde_json::Value>, TransportError> {
	let status = response.status();
	let body = response.text().await?;

	if !status.is_success() {
		let message = serde_json::from_str::<ApiEnvelope<IgnoredAny>>(&body)
			.ok()
			.map(|envelope| envelope.message)
			.filter(|message| !message.is_empty())
			.unwrap_or_else(|| {
				if body.trim().is_empty() {
					status.canonical_reason().unwrap_or("request failed").to_string()
				} else {
					body.clone()
				}
			});
		error!(status = status.as_u16(), message = %message, "Request failed");
		return Err(TransportError::server(status.as_u16(), message));
	}

	if body.trim().is_empty() {
		return Ok(None);
	}

	let envelope: ApiEnvelope<serde_json::Value> =
		serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))?;
	if envelope.code != 0 {
		error!(code = envelope.code, message = %envelope.message, "Request rejected");
		return Err(TransportError::Rejected {
			code: envelope.code,
			message: envelope.message,
		});
	}
	Ok(envelope.data.filter(|data| !data.is_null()))
}

/// Scheduled task endpoints under `/api/v1/scheduled-tasks`.
#[derive(Clone)]
pub struct ScheduledTaskApi {
	client: ApiClient,
}

#[async_trait]
impl RemoteEntityClient for ScheduledTaskApi {
	type Entity = ScheduledTask;
	type CreateInput = ScheduledTaskCreate;
	type Patch = ScheduledTaskPatch;

	async fn list(&self) -> std::result::Result<Vec<ScheduledTask>, TransportError> {
		let data: ListData<ScheduledTask> = self
			.client
			.fetch(Method::GET, &[TASKS_PATH], None::<&()>, true)
			.await?;
		Ok(data.into_items())
	}

	async fn get(&self, id: &TaskId) -> std::result::Result<ScheduledTask, TransportError> {
		self.client
			.fetch(Method::GET, &[TASKS_PATH, id.as_str()], None::<&()>, true)
			.await
	}

	async fn create(
		&self,
		input: &ScheduledTaskCreate,
	) -> std::result::Result<ScheduledTask, TransportError> {
		self.client
			.fetch(Method::POST, &[TASKS_PATH], Some(input), false)
			.await
	}

	async fn update(
		&self,
		id: &TaskId,
		patch: &ScheduledTaskPatch,
	) -> std::result::Result<ScheduledTask, TransportError> {
		self.client
			.fetch(Method::PATCH, &[TASKS_PATH, id.as_str()], Some(patch), true)
			.await
	}

	async fn remove(&self, id: &TaskId) -> std::result::Result<(), TransportError> {
		self.client.delete(&[TASKS_PATH, id.as_str()]).await
	}
}

#[async_trait]
impl TriggerClient for ScheduledTaskApi {
	async fn trigger(&self, id: &TaskId) -> std::result::Result<TriggerReceipt, TransportError> {
		let data = self
			.client
			.send(Method::POST, &[TASKS_PATH, id.as_str(), "trigger"], None::<&()>, false)
			.await?;
		match data {
			Some(data) => {
				serde_json::from_value(data).map_err(|e| TransportError::Decode(e.to_string()))
			}
			None => Ok(TriggerReceipt::default()),
		}
	}
}

/// Slash command endpoints under `/api/v1/slash-commands`.
#[derive(Clone)]
pub struct SlashCommandApi {
	client: ApiClient,
}

#[async_trait]
impl RemoteEntityClient for SlashCommandApi {
	type Entity = SlashCommand;
	type CreateInput = SlashCommandCreate;
	type Patch = SlashCommandPatch;

	async fn list(&self) -> std::result::Result<Vec<SlashCommand>, TransportError> {
		let data: ListData<SlashCommand> = self
			.client
			.fetch(Method::GET, &[COMMANDS_PATH], None::<&()>, true)
			.await?;
		Ok(data.into_items())
	}

	async fn get(&self, id: &CommandId) -> std::result::Result<SlashCommand, TransportError> {
		let id = id.to_string();
		self.client
			.fetch(Method::GET, &[COMMANDS_PATH, id.as_str()], None::<&()>, true)
			.await
	}

	async fn create(
		&self,
		input: &SlashCommandCreate,
	) -> std::result::Result<SlashCommand, TransportError> {
		self.client
			.fetch(Method::POST, &[COMMANDS_PATH], Some(input), false)
			.await
	}

	async fn update(
		&self,
		id: &CommandId,
		patch: &SlashCommandPatch,
	) -> std::result::Result<SlashCommand, TransportError> {
		let id = id.to_string();
		self.client
			.fetch(Method::PATCH, &[COMMANDS_PATH, id.as_str()], Some(patch), true)
			.await
	}

	async fn remove(&self, id: &CommandId) -> std::result::Result<(), TransportError> {
		let id = id.to_string();
		self.client.delete(&[COMMANDS_PATH, id.as_str()]).await
	}
}
