//! Token renewal with a staleness window, forced refreshes, and a single-flight guard.
//!
//! [`Refresher`] sits between the RPC wrappers and a [`TokenRefresher`] implementation. Both
//! [`Refresher::ensure_fresh`] and [`Refresher::force_refresh`] serialize on one async guard and
//! re-read the context after acquiring it, so concurrent callers that all observed the same stale
//! token trigger a single renewal.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AuthContext, Token},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

/// Boxed future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + 'a + Send>>;

/// Renews a bearer token against whatever backend issued it.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Exchanges `current` for a new token.
	fn refresh<'a>(&'a self, current: &'a Token) -> RefreshFuture<'a>;
}

/// Coordinates proactive and forced renewals of the token held by an [`AuthContext`].
pub struct Refresher {
	context: AuthContext,
	renewer: Arc<dyn TokenRefresher>,
	guard: AsyncMutex<()>,
	/// Shared counters for renewal outcomes.
	pub metrics: Arc<RefreshMetrics>,
}
impl Refresher {
	/// Creates a refresher bound to `context`.
	pub fn new(context: AuthContext, renewer: Arc<dyn TokenRefresher>) -> Self {
		Self { context, renewer, guard: AsyncMutex::new(()), metrics: Default::default() }
	}

	/// Returns the context whose token this refresher maintains.
	pub fn context(&self) -> &AuthContext {
		&self.context
	}

	/// Renews the token if it expires within `window`.
	///
	/// Returns `Ok(None)` when no token is held, the token is still fresh, or a concurrent caller
	/// renewed it while this call waited on the guard.
	pub async fn ensure_fresh(&self, window: Duration) -> Result<Option<Token>> {
		let stale = |token: &Token| token.needs_refresh(window, OffsetDateTime::now_utc());

		if !self.context.token().is_some_and(|token| stale(&token)) {
			return Ok(None);
		}

		let _singleflight = self.guard.lock().await;
		let current = match self.context.token() {
			Some(token) if stale(&token) => token,
			Some(_) => {
				self.metrics.record_coalesced();

				return Ok(None);
			},
			None => return Ok(None),
		};

		self.renew(&current).await.map(Some)
	}

	/// Renews the token unconditionally.
	///
	/// If another caller replaced the token while this call waited on the guard, the replacement
	/// is returned without contacting the backend again.
	pub async fn force_refresh(&self) -> Result<Token> {
		let observed = self.context.token().ok_or(Error::MissingToken)?;
		let _singleflight = self.guard.lock().await;
		let current = self.context.token().ok_or(Error::MissingToken)?;

		if current.secret != observed.secret {
			self.metrics.record_coalesced();

			return Ok(current);
		}

		self.renew(&current).await
	}

	async fn renew(&self, current: &Token) -> Result<Token> {
		const KIND: CallKind = CallKind::Refresh;

		let span = CallSpan::new(KIND, "refresh_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.renewer.refresh(current)).await;

		match result {
			Ok(token) => {
				self.context.replace(token.clone());
				self.metrics.record_success();
				obs::record_call_outcome(KIND, CallOutcome::Success);

				Ok(token)
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::record_call_outcome(KIND, CallOutcome::Failure);

				Err(e)
			},
		}
	}
}
impl Debug for Refresher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Refresher")
			.field("context", &self.context)
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	struct CountingRenewer {
		calls: AtomicUsize,
		fail: bool,
	}
	impl CountingRenewer {
		fn new(fail: bool) -> Arc<Self> {
			Arc::new(Self { calls: AtomicUsize::new(0), fail })
		}
	}
	impl TokenRefresher for CountingRenewer {
		fn refresh<'a>(&'a self, _current: &'a Token) -> RefreshFuture<'a> {
			Box::pin(async move {
				tokio::task::yield_now().await;

				let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

				if self.fail {
					return Err(Error::MissingToken);
				}

				let expires_at = OffsetDateTime::now_utc() + Duration::hours(1);

				Ok(Token::with_expiry(format!("renewed-{n}"), expires_at))
			})
		}
	}

	fn expiring_in(delta: Duration) -> Token {
		Token::with_expiry("current", OffsetDateTime::now_utc() + delta)
	}

	#[tokio::test]
	async fn ensure_fresh_skips_fresh_and_missing_tokens() {
		let renewer = CountingRenewer::new(false);
		let refresher = Refresher::new(AuthContext::new(), renewer.clone());

		let outcome = refresher.ensure_fresh(Duration::seconds(60)).await;

		assert!(outcome.expect("No-op refresh should succeed.").is_none());

		refresher.context().set(expiring_in(Duration::hours(1)));

		let outcome = refresher.ensure_fresh(Duration::seconds(60)).await;

		assert!(outcome.expect("No-op refresh should succeed.").is_none());
		assert_eq!(renewer.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn ensure_fresh_renews_inside_window() {
		let renewer = CountingRenewer::new(false);
		let context = AuthContext::with_token(expiring_in(Duration::seconds(30)));
		let refresher = Refresher::new(context, renewer.clone());
		let renewed = refresher
			.ensure_fresh(Duration::seconds(60))
			.await
			.expect("Refresh should succeed.")
			.expect("Token inside the window should be renewed.");

		assert_eq!(renewed.secret.expose(), "renewed-1");
		assert_eq!(refresher.context().token(), Some(renewed));
		assert_eq!(refresher.metrics.successes(), 1);
	}

	#[tokio::test]
	async fn force_refresh_requires_a_token() {
		let refresher = Refresher::new(AuthContext::new(), CountingRenewer::new(false));
		let err = refresher.force_refresh().await.expect_err("Forced refresh needs a token.");

		assert!(matches!(err, Error::MissingToken));
	}

	#[tokio::test]
	async fn concurrent_forced_refreshes_collapse() {
		let renewer = CountingRenewer::new(false);
		let refresher =
			Refresher::new(AuthContext::with_token(Token::new("opaque")), renewer.clone());
		let (a, b) = tokio::join!(refresher.force_refresh(), refresher.force_refresh());

		assert_eq!(a.expect("First refresh.").secret, b.expect("Second refresh.").secret);
		assert_eq!(renewer.calls.load(Ordering::SeqCst), 1);
		assert_eq!(refresher.metrics.coalesced(), 1);
	}

	#[tokio::test]
	async fn failed_renewal_keeps_current_token() {
		let refresher =
			Refresher::new(AuthContext::with_token(Token::new("keep")), CountingRenewer::new(true));

		refresher.force_refresh().await.expect_err("Renewal should fail.");

		assert_eq!(refresher.context().token(), Some(Token::new("keep")));
		assert_eq!(refresher.metrics.failures(), 1);
	}
}
