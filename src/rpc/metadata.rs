//! Ordered header map attached to every call.

// self
use crate::_prelude::*;

/// Header map merged into RPC calls; keys are stored lower-cased.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);
impl Metadata {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces a header.
	pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
		self.0.insert(key.as_ref().to_ascii_lowercase(), value.into())
	}

	/// Returns a header value.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
	}

	/// Removes a header.
	pub fn remove(&mut self, key: &str) -> Option<String> {
		self.0.remove(&key.to_ascii_lowercase())
	}

	/// Returns `true` if no headers are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Number of headers.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Iterates over `(key, value)` pairs in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Returns `self` with every entry of `overlay` applied on top.
	pub fn merged(mut self, overlay: Metadata) -> Self {
		self.0.extend(overlay.0);

		self
	}
}
impl<K, V> FromIterator<(K, V)> for Metadata
where
	K: AsRef<str>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut metadata = Self::new();

		for (k, v) in iter {
			metadata.insert(k, v);
		}

		metadata
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn keys_are_case_insensitive() {
		let mut metadata = Metadata::new();

		metadata.insert("Authorization", "Bearer a");

		assert_eq!(metadata.get("authorization"), Some("Bearer a"));
		assert_eq!(metadata.remove("AUTHORIZATION").as_deref(), Some("Bearer a"));
		assert!(metadata.is_empty());
	}

	#[test]
	fn overlay_wins_on_conflicts() {
		let base = Metadata::from_iter([("domain", "globular.io"), ("authorization", "stale")]);
		let merged = base.merged(Metadata::from_iter([("authorization", "Bearer fresh")]));

		assert_eq!(merged.get("authorization"), Some("Bearer fresh"));
		assert_eq!(merged.get("domain"), Some("globular.io"));
		assert_eq!(merged.len(), 2);
	}
}
