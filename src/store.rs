//! Persistent client settings (base URL and bearer token) and their built-in backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AuthContext, SubscriptionId, Token, TokenSecret},
};

/// Values that survive process restarts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// Persisted base URL, consulted after per-call overrides.
	pub base_url: Option<Url>,
	/// Last known bearer token.
	pub token: Option<TokenSecret>,
}

/// Storage backend contract for [`Settings`].
pub trait SettingsStore
where
	Self: Send + Sync,
{
	/// Reads the current settings; an empty backend yields [`Settings::default`].
	fn load(&self) -> Result<Settings, StoreError>;

	/// Replaces the stored settings.
	fn save(&self, settings: &Settings) -> Result<(), StoreError>;

	/// Applies `edit` to the stored settings and saves the result.
	fn update(&self, edit: &mut dyn FnMut(&mut Settings)) -> Result<(), StoreError> {
		let mut settings = self.load()?;

		edit(&mut settings);

		self.save(&settings)
	}
}

/// Error type produced by [`SettingsStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Mirrors every token change of `context` into `store`.
///
/// Write failures have no caller to report to; they are emitted as `tracing` warnings when the
/// feature is enabled.
pub fn persist_tokens(context: &AuthContext, store: Arc<dyn SettingsStore>) -> SubscriptionId {
	context.subscribe(move |change| {
		let token = change.token().map(|token| token.secret.clone());

		if let Err(e) = store.update(&mut |settings| settings.token = token.clone()) {
			report_persist_failure(&e);
		}
	})
}

fn report_persist_failure(e: &StoreError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(error = %e, "failed to persist token change");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = e;
	}
}

/// Loads the persisted token, if any, into `context`.
pub fn restore_token(context: &AuthContext, store: &dyn SettingsStore) -> Result<Option<Token>> {
	let Some(secret) = store.load()?.token else {
		return Ok(None);
	};
	let token = Token::new(secret.expose());

	context.set(token.clone());

	Ok(Some(token))
}
