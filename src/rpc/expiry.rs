//! Classification of failures that a token refresh can fix.

/// Lower-cased phrases Globular services use when a bearer token is missing or stale.
pub const EXPIRY_PHRASES: [&str; 5] = [
	"token is expired",
	"expired token",
	"unauthenticated",
	"jwt expired",
	"no token found in context metadata",
];

/// Returns `true` if `message` contains, case-insensitively, any of [`EXPIRY_PHRASES`].
pub fn is_expiry_message(message: &str) -> bool {
	let lowered = message.to_lowercase();

	EXPIRY_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}
