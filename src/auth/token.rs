//! Bearer token model with expiry decoded from the JWT payload.

pub mod secret;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Lifecycle status of a [`Token`] at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
	/// Token is before its expiry instant.
	Active,
	/// Token reached its expiry instant.
	Expired,
	/// Token carries no decodable expiry.
	Unknown,
}

/// Current bearer credential held by an [`AuthContext`](crate::auth::AuthContext).
///
/// Globular issues JWTs; the `exp` claim is decoded eagerly so freshness checks never touch the
/// raw string again. Tokens that are not JWTs still work as bearers but are never refreshed
/// proactively.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
	/// Bearer secret sent in the `authorization` header.
	pub secret: TokenSecret,
	/// Expiry instant taken from the `exp` claim, if present.
	pub expires_at: Option<OffsetDateTime>,
}
impl Token {
	/// Wraps a raw bearer string, decoding its expiry when it is a JWT.
	pub fn new(value: impl Into<String>) -> Self {
		let secret = TokenSecret::new(value);
		let expires_at = decode_expiry(secret.expose());

		Self { secret, expires_at }
	}

	/// Wraps a raw bearer string with an explicit expiry instant.
	pub fn with_expiry(value: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { secret: TokenSecret::new(value), expires_at: Some(expires_at) }
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		match self.expires_at {
			None => TokenStatus::Unknown,
			Some(expires_at) if instant >= expires_at => TokenStatus::Expired,
			Some(_) => TokenStatus::Active,
		}
	}

	/// Returns `true` if the token expires within `window` of `now` (or already has).
	pub fn needs_refresh(&self, window: Duration, now: OffsetDateTime) -> bool {
		match self.expires_at {
			Some(expires_at) => expires_at - now <= window,
			None => false,
		}
	}

	/// Formats the `authorization` header value.
	pub fn bearer(&self) -> String {
		self.secret.bearer()
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("secret", &self.secret)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[derive(Deserialize)]
struct Claims {
	exp: Option<i64>,
}

fn decode_expiry(raw: &str) -> Option<OffsetDateTime> {
	let mut segments = raw.split('.');
	let payload = match (segments.next(), segments.next(), segments.next()) {
		(Some(_), Some(payload), Some(_)) => payload,
		_ => return None,
	};
	let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
	let claims: Claims = serde_json::from_slice(&bytes).ok()?;

	OffsetDateTime::from_unix_timestamp(claims.exp?).ok()
}
