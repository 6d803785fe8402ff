//! Shared auth context holding the current bearer token and its change listeners.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, auth::Token, rpc::Metadata};

/// Header key carrying the bearer token.
pub const AUTHORIZATION: &str = "authorization";

/// Callback invoked after every token mutation.
pub type TokenListener = Arc<dyn Fn(&TokenChange) + Send + Sync>;

/// Mutation observed by [`AuthContext`] listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenChange {
	/// A token was installed after sign-in or restore.
	Set(Token),
	/// The refresher replaced the token.
	Refreshed(Token),
	/// The token was removed (logout).
	Cleared,
}
impl TokenChange {
	/// Returns the token carried by the change, if any.
	pub fn token(&self) -> Option<&Token> {
		match self {
			Self::Set(token) | Self::Refreshed(token) => Some(token),
			Self::Cleared => None,
		}
	}
}

/// Handle returned by [`AuthContext::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Cloneable handle to the single token cell shared by every caller.
#[derive(Clone, Default)]
pub struct AuthContext(Arc<AuthContextInner>);
impl AuthContext {
	/// Creates an empty context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a context already holding `token`.
	pub fn with_token(token: Token) -> Self {
		let context = Self::default();

		*context.0.token.write() = Some(token);

		context
	}

	/// Returns a snapshot of the current token.
	pub fn token(&self) -> Option<Token> {
		self.0.token.read().clone()
	}

	/// Installs a token and notifies listeners with [`TokenChange::Set`].
	pub fn set(&self, token: Token) {
		*self.0.token.write() = Some(token.clone());

		self.notify(TokenChange::Set(token));
	}

	/// Replaces the token after a refresh and notifies with [`TokenChange::Refreshed`].
	pub fn replace(&self, token: Token) {
		*self.0.token.write() = Some(token.clone());

		self.notify(TokenChange::Refreshed(token));
	}

	/// Removes the token and notifies with [`TokenChange::Cleared`].
	pub fn clear(&self) {
		*self.0.token.write() = None;

		self.notify(TokenChange::Cleared);
	}

	/// Builds the metadata map for outgoing calls; empty when no token is held.
	pub fn metadata(&self) -> Metadata {
		let mut metadata = Metadata::new();

		if let Some(token) = self.0.token.read().as_ref() {
			metadata.insert(AUTHORIZATION, token.bearer());
		}

		metadata
	}

	/// Registers a listener for token changes.
	pub fn subscribe(
		&self,
		listener: impl 'static + Fn(&TokenChange) + Send + Sync,
	) -> SubscriptionId {
		let id = SubscriptionId(self.0.next_id.fetch_add(1, Ordering::Relaxed));

		self.0.listeners.lock().push((id, Arc::new(listener)));

		id
	}

	/// Removes a listener; returns `false` if it was not registered.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut listeners = self.0.listeners.lock();
		let before = listeners.len();

		listeners.retain(|(candidate, _)| *candidate != id);

		listeners.len() != before
	}

	fn notify(&self, change: TokenChange) {
		// Snapshot first so listeners may (un)subscribe without deadlocking.
		let listeners: Vec<TokenListener> =
			self.0.listeners.lock().iter().map(|(_, listener)| listener.clone()).collect();

		for listener in listeners {
			listener(&change);
		}
	}
}
impl Debug for AuthContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthContext")
			.field("token", &*self.0.token.read())
			.field("listeners", &self.0.listeners.lock().len())
			.finish()
	}
}

#[derive(Default)]
struct AuthContextInner {
	token: RwLock<Option<Token>>,
	listeners: Mutex<Vec<(SubscriptionId, TokenListener)>>,
	next_id: AtomicU64,
}
