// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Traits shared by every remotely-owned entity kind.

use std::fmt;
use std::hash::Hash;

use crate::error::Result;

/// A record owned by the backend and mirrored in a local cache.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
	/// Immutable identity assigned by the server.
	type Id: Clone + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

	/// Stable machine name, used as a log field.
	const KIND: &'static str;

	/// Human-readable singular name, used in notifications.
	const LABEL: &'static str;

	fn id(&self) -> &Self::Id;

	fn enabled(&self) -> bool;

	fn set_enabled(&mut self, enabled: bool);
}

/// Patch payloads that can express "only change `enabled`".
pub trait EnabledPatch {
	fn enabled_only(enabled: bool) -> Self;
}

/// Client-side validation run before a payload is sent.
pub trait Validate {
	fn validate(&self) -> Result<()>;
}
