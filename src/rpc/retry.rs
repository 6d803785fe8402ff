//! The retry-once state machine shared by unary and streaming calls.

// self
use crate::{
	_prelude::*,
	auth::Refresher,
	obs::{self, CallKind, CallOutcome, CallSpan},
	rpc::{Metadata, RpcError},
};

/// State of one logical call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallState {
	/// First attempt with the current token.
	InitialAttempt,
	/// Forced refresh after an expiry-classified failure.
	Refreshing,
	/// Second and last attempt with the refreshed token.
	RetryAttempt,
	/// Terminal: a response was obtained.
	Done,
	/// Terminal: the call failed.
	Failed,
}
impl CallState {
	/// Applies `event`; terminal states absorb every event.
	///
	/// The only path to [`CallState::RetryAttempt`] is an expiry failure of the initial attempt
	/// followed by a successful refresh, and no transition leads back to
	/// [`CallState::InitialAttempt`].
	pub const fn next(self, event: CallEvent) -> Self {
		match (self, event) {
			(Self::Done, _) => Self::Done,
			(Self::Failed, _) => Self::Failed,
			(Self::InitialAttempt | Self::RetryAttempt, CallEvent::Succeeded) => Self::Done,
			(Self::InitialAttempt, CallEvent::Failed { expiry: true }) => Self::Refreshing,
			(Self::Refreshing, CallEvent::Refreshed) => Self::RetryAttempt,
			_ => Self::Failed,
		}
	}

	/// Returns `true` for [`CallState::Done`] and [`CallState::Failed`].
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Done | Self::Failed)
	}
}

/// Input driving [`CallState::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallEvent {
	/// The attempt produced a response.
	Succeeded,
	/// The attempt failed; `expiry` tells whether a refresh may fix it.
	Failed {
		/// Outcome of [`RpcError::is_expiry`].
		expiry: bool,
	},
	/// The forced refresh installed a new token.
	Refreshed,
	/// The forced refresh failed.
	RefreshFailed,
}

/// Runs `attempt` under the state machine, returning the first error when the call fails.
///
/// `attempt` receives `headers` merged with the context's current metadata, recomputed for the
/// retry so it carries the refreshed token.
pub(crate) async fn drive<T, A, Fut>(
	refresher: &Refresher,
	span: &CallSpan,
	kind: CallKind,
	headers: &Metadata,
	mut attempt: A,
) -> Result<T, RpcError>
where
	A: FnMut(Metadata) -> Fut,
	Fut: Future<Output = Result<T, RpcError>>,
{
	let fresh_headers = || headers.clone().merged(refresher.context().metadata());
	let original = match attempt(fresh_headers()).await {
		Ok(value) => return Ok(value),
		Err(e) => e,
	};
	let state = CallState::InitialAttempt.next(CallEvent::Failed { expiry: original.is_expiry() });

	if state != CallState::Refreshing {
		return Err(original);
	}

	span.retrying(&original.message);
	obs::record_call_outcome(kind, CallOutcome::Retry);

	let event = match refresher.force_refresh().await {
		Ok(_) => CallEvent::Refreshed,
		Err(_) => CallEvent::RefreshFailed,
	};

	if state.next(event) != CallState::RetryAttempt {
		return Err(original);
	}

	attempt(fresh_headers()).await.map_err(|_| original)
}
