// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User-facing notifications emitted by the entity store.
//!
//! The store reports every outcome the user should hear about (a task was
//! created, a delete failed, ...) through a [`Notifier`] instead of returning
//! errors. Hosts decide how to surface them: a toast, a status line, stderr.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

/// Whether a notification reports success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
	Success,
	Error,
}

impl fmt::Display for NotificationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Success => write!(f, "success"),
			Self::Error => write!(f, "error"),
		}
	}
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub kind: NotificationKind,
	pub message: String,
}

impl Notification {
	pub fn success(message: impl Into<String>) -> Self {
		Self {
			kind: NotificationKind::Success,
			message: message.into(),
		}
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self {
			kind: NotificationKind::Error,
			message: message.into(),
		}
	}
}

/// Receives store notifications. Fire-and-forget: implementations must not
/// block.
pub trait Notifier: Send + Sync + 'static {
	fn notify(&self, notification: Notification);
}

/// Type alias for a shared notifier.
pub type SharedNotifier = Arc<dyn Notifier>;

/// Writes notifications to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
	fn notify(&self, notification: Notification) {
		match notification.kind {
			NotificationKind::Success => info!(message = %notification.message, "notification"),
			NotificationKind::Error => warn!(message = %notification.message, "notification"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn constructors_set_kind() {
		assert_eq!(Notification::success("ok").kind, NotificationKind::Success);
		assert_eq!(Notification::error("no").kind, NotificationKind::Error);
	}

	#[test]
	fn tracing_notifier_accepts_both_kinds() {
		let notifier: SharedNotifier = Arc::new(TracingNotifier);
		notifier.notify(Notification::success("created"));
		notifier.notify(Notification::error("failed"));
	}
}
