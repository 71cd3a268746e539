//! Retry composition for authenticated storage operations.
//!
//! [`RetryGate`] wraps a caller-supplied unit of work in two layers: an
//! authorization layer that invalidates the credential cache and replays the
//! operation exactly once after a 401, around a transient layer that replays
//! network-class failures on a fixed backoff schedule. Because the
//! authorization layer sits outside, the post-invalidation replay starts with
//! a fresh transient budget.

// self
use crate::{
	_prelude::*,
	auth::Authenticator,
	error::RetryClass,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Retry behavior applied by a [`RetryGate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryMode {
	/// Authorization + transient retry composition.
	Standard,
	/// Pass-through: the operation runs exactly once.
	///
	/// Required for non-idempotent work such as uploads from a source that
	/// cannot be re-read from the start; a partial write must not be replayed.
	Disabled,
}

/// Composes authorization-failure and transient-failure retry policies.
#[derive(Clone, Debug)]
pub struct RetryGate {
	auth: Arc<Authenticator>,
	schedule: Vec<StdDuration>,
	mode: RetryMode,
}
impl RetryGate {
	/// Fixed transient backoff schedule: three extra attempts at 2s, 5s, 10s.
	pub const DEFAULT_SCHEDULE: [StdDuration; 3] =
		[StdDuration::from_secs(2), StdDuration::from_secs(5), StdDuration::from_secs(10)];

	/// Creates a gate with the default schedule in [`RetryMode::Standard`].
	pub fn new(auth: Arc<Authenticator>) -> Self {
		Self { auth, schedule: Self::DEFAULT_SCHEDULE.into(), mode: RetryMode::Standard }
	}

	/// Overrides the transient backoff schedule.
	pub fn with_schedule(mut self, schedule: impl Into<Vec<StdDuration>>) -> Self {
		self.schedule = schedule.into();

		self
	}

	/// Overrides the retry mode.
	pub fn with_mode(mut self, mode: RetryMode) -> Self {
		self.mode = mode;

		self
	}

	/// Runs `operation`, replaying it according to the configured policies.
	///
	/// The operation must be safe to invoke multiple times in
	/// [`RetryMode::Standard`]; seekable sources must rewind to their starting
	/// position at the top of each invocation. The terminal error is
	/// propagated unmodified.
	pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		if self.mode == RetryMode::Disabled {
			return operation().await;
		}

		const KIND: OpKind = OpKind::Request;

		let span = OpSpan::new(KIND, "execute");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				match self.execute_transient(&operation).await {
					Err(e) if e.retry_class() == RetryClass::Authorization => {
						self.auth.invalidate();
						// The replay gets a fresh transient budget; a second
						// authorization failure surfaces unchanged.
						self.execute_transient(&operation).await
					},
					other => other,
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn execute_transient<T, F, Fut>(&self, operation: &F) -> Result<T>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut delays = self.schedule.iter();

		loop {
			match operation().await {
				Err(e) if e.retry_class() == RetryClass::Transient => match delays.next() {
					Some(delay) => tokio::time::sleep(*delay).await,
					None => return Err(e),
				},
				other => return other,
			}
		}
	}
}
