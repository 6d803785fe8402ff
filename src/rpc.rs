//! Authenticated RPC calls with proactive refresh and a single expiry-driven retry.
//!
//! [`Caller`] is the entry point. Before every call it asks the [`Refresher`] to renew a token
//! that is about to expire (failures there are ignored). If the first attempt then fails with an
//! expiry-classified [`RpcError`], the token is force-refreshed and the call is attempted exactly
//! once more; when that also fails the caller sees the first error. Streaming calls apply the
//! same rule to starting the stream only.

pub mod client;
pub mod expiry;
pub mod metadata;
pub mod retry;
pub mod stream;
pub mod unary;

pub use client::*;
pub use expiry::*;
pub use metadata::*;
pub use retry::{CallEvent, CallState};
pub use stream::*;

// self
use crate::{
	_prelude::*,
	auth::Refresher,
	config::{ClientConfig, DEFAULT_STALENESS_WINDOW_SECS},
	obs::{self, CallKind, CallOutcome},
	service::AddressResolver,
};

/// Issues authenticated calls on behalf of one [`AuthContext`](crate::auth::AuthContext).
pub struct Caller {
	refresher: Arc<Refresher>,
	resolver: AddressResolver,
	staleness_window: Duration,
}
impl Caller {
	/// Creates a caller with the default 60 second staleness window.
	pub fn new(refresher: Arc<Refresher>, resolver: AddressResolver) -> Self {
		Self {
			refresher,
			resolver,
			staleness_window: Duration::seconds(DEFAULT_STALENESS_WINDOW_SECS),
		}
	}

	/// Creates a caller using the resolver settings and staleness window of `config`.
	pub fn from_config(
		config: &ClientConfig,
		refresher: Arc<Refresher>,
		resolver: AddressResolver,
	) -> Self {
		Self::new(refresher, resolver).with_staleness_window(config.staleness_window())
	}

	/// Overrides the proactive refresh window; negative values are clamped to zero.
	pub fn with_staleness_window(mut self, window: Duration) -> Self {
		self.staleness_window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Returns the refresher maintaining the caller's token.
	pub fn refresher(&self) -> &Arc<Refresher> {
		&self.refresher
	}

	/// Returns the address resolver used by streaming calls.
	pub fn resolver(&self) -> &AddressResolver {
		&self.resolver
	}

	/// Returns the proactive refresh window.
	pub fn staleness_window(&self) -> Duration {
		self.staleness_window
	}

	async fn preflight(&self, kind: CallKind) {
		if self.refresher.ensure_fresh(self.staleness_window).await.is_err() {
			obs::record_call_outcome(kind, CallOutcome::RefreshSkipped);
		}
	}
}
impl Debug for Caller {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Caller")
			.field("refresher", &self.refresher)
			.field("resolver", &self.resolver)
			.field("staleness_window", &self.staleness_window)
			.finish()
	}
}
