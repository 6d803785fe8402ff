//! Optional observability helpers for RPC calls and token renewals.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `globular_client.call` with the `kind`
//!   (unary/stream/refresh) and `method` fields.
//! - Enable `metrics` to increment the `globular_client_call_total` counter for every
//!   attempt/retry/success/failure, labeled by `kind` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Call kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Single request, single response.
	Unary,
	/// Server-streaming call.
	Stream,
	/// Token renewal.
	Refresh,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Unary => "unary",
			CallKind::Stream => "stream",
			CallKind::Refresh => "refresh",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a wrapper.
	Attempt,
	/// Expiry-classified failure followed by a forced refresh and a second attempt.
	Retry,
	/// Proactive refresh failed and the call went ahead with the current token.
	RefreshSkipped,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Retry => "retry",
			CallOutcome::RefreshSkipped => "refresh_skipped",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
