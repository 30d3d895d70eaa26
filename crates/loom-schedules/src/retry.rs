// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff for transient request failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry policy for idempotent requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts including the first one.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	/// Add up to 50% random jitter to each delay.
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// A policy that makes exactly one attempt.
	pub fn no_retry() -> Self {
		Self {
			max_attempts: 1,
			..Self::default()
		}
	}

	/// Delay before retry number `attempt` (1-based).
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
		let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
		if self.jitter {
			let extra = delay.mul_f64(fastrand::f64() * 0.5);
			(delay + extra).min(self.max_delay)
		} else {
			delay
		}
	}
}

/// Errors that can tell whether another attempt might succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		self.is_timeout() || self.is_connect()
	}
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempts run out.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
	E: RetryableError + std::fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let max_attempts = config.max_attempts.max(1);
	let mut attempt = 1;
	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(e) if attempt < max_attempts && e.is_retryable() => {
				let delay = config.delay_for(attempt);
				warn!(
					attempt,
					max_attempts,
					delay_ms = delay.as_millis() as u64,
					error = %e,
					"Retrying request"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(e) => return Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[derive(Debug)]
	struct FakeError {
		retryable: bool,
	}

	impl std::fmt::Display for FakeError {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			write!(f, "fake error (retryable: {})", self.retryable)
		}
	}

	impl RetryableError for FakeError {
		fn is_retryable(&self) -> bool {
			self.retryable
		}
	}

	fn fast_config(max_attempts: u32) -> RetryConfig {
		RetryConfig {
			max_attempts,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(2),
			jitter: false,
		}
	}

	#[tokio::test]
	async fn succeeds_after_transient_failures() {
		let calls = AtomicU32::new(0);
		let result: Result<u32, FakeError> = retry(&fast_config(3), || async {
			let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
			if n < 3 {
				Err(FakeError { retryable: true })
			} else {
				Ok(n)
			}
		})
		.await;

		assert_eq!(result.unwrap(), 3);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn stops_at_max_attempts() {
		let calls = AtomicU32::new(0);
		let result: Result<(), FakeError> = retry(&fast_config(2), || async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(FakeError { retryable: true })
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn does_not_retry_permanent_errors() {
		let calls = AtomicU32::new(0);
		let result: Result<(), FakeError> = retry(&fast_config(5), || async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(FakeError { retryable: false })
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn delay_grows_and_caps() {
		let config = RetryConfig {
			max_attempts: 10,
			base_delay: Duration::from_millis(100),
			max_delay: Duration::from_millis(500),
			jitter: false,
		};
		assert_eq!(config.delay_for(1), Duration::from_millis(100));
		assert_eq!(config.delay_for(2), Duration::from_millis(200));
		assert_eq!(config.delay_for(3), Duration::from_millis(400));
		assert_eq!(config.delay_for(4), Duration::from_millis(500));
		assert_eq!(config.delay_for(30), Duration::from_millis(500));
	}

	#[test]
	fn jitter_stays_under_cap() {
		let config = RetryConfig::default();
		for attempt in 1..8 {
			assert!(config.delay_for(attempt) <= config.max_delay);
		}
	}

	mod proptests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn delay_never_exceeds_cap(
				attempt in 0u32..100,
				base_ms in 0u64..10_000,
				extra_ms in 0u64..60_000,
				jitter: bool,
			) {
				let config = RetryConfig {
					max_attempts: 5,
					base_delay: Duration::from_millis(base_ms),
					max_delay: Duration::from_millis(base_ms + extra_ms),
					jitter,
				};
				prop_assert!(config.delay_for(attempt) <= config.max_delay);
			}
		}
	}
}
