//! Client configuration loaded from TOML with sensible defaults.

// std
use std::{
	fs,
	path::{Path, PathBuf},
};
// self
use crate::{_prelude::*, error::ConfigError};

/// Default staleness window, in seconds, for proactive refreshes.
pub const DEFAULT_STALENESS_WINDOW_SECS: i64 = 60;

/// Runtime configuration shared by the resolver, the caller, and the settings store.
///
/// ```toml
/// origin = "https://globular.io"
/// staleness_window_secs = 60
/// settings_path = "/var/lib/globular/client.json"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Origin used when neither a per-call override nor a persisted base URL applies.
	pub origin: Option<Url>,
	/// Seconds before expiry at which tokens are refreshed proactively.
	pub staleness_window_secs: i64,
	/// File backing the persisted settings (base URL + token); in-memory when absent.
	pub settings_path: Option<PathBuf>,
}
impl ClientConfig {
	/// Loads a configuration file; a missing file yields [`ClientConfig::default`].
	pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();

		if !path.exists() {
			return Ok(Self::default());
		}

		let contents = fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;

		Self::from_toml(&contents).map_err(|e| match e {
			Error::Config(ConfigError::Parse { source, .. }) =>
				ConfigError::Parse { path: path.display().to_string(), source }.into(),
			other => other,
		})
	}

	/// Parses a TOML document.
	pub fn from_toml(contents: &str) -> Result<Self> {
		let config: Self = toml::from_str(contents)
			.map_err(|source| ConfigError::Parse { path: "<inline>".into(), source })?;

		config.validate()?;

		Ok(config)
	}

	/// Returns the proactive refresh window.
	pub fn staleness_window(&self) -> Duration {
		Duration::seconds(self.staleness_window_secs)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.staleness_window_secs < 0 {
			return Err(ConfigError::NegativeStalenessWindow);
		}

		Ok(())
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			origin: None,
			staleness_window_secs: DEFAULT_STALENESS_WINDOW_SECS,
			settings_path: None,
		}
	}
}
