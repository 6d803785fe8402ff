//! JSON file-backed [`SettingsStore`] for CLIs and long-running services.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{Settings, SettingsStore, StoreError},
};

/// Persists settings to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Settings>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Returns the backing file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist(&self, settings: &Settings) -> Result<(), StoreError> {
		ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(settings).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize settings: {e}"),
			})?;
		let tmp_path = self.path.with_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl SettingsStore for FileStore {
	fn load(&self) -> Result<Settings, StoreError> {
		Ok(self.inner.read().clone())
	}

	fn save(&self, settings: &Settings) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		self.persist(settings)?;
		*guard = settings.clone();

		Ok(())
	}

	fn update(&self, edit: &mut dyn FnMut(&mut Settings)) -> Result<(), StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();

		edit(&mut next);
		self.persist(&next)?;
		*guard = next;

		Ok(())
	}
}

fn load_snapshot(path: &Path) -> Result<Settings, StoreError> {
	if !path.exists() {
		return Ok(Settings::default());
	}

	let bytes = fs::read(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to read {}: {e}", path.display()),
	})?;

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Settings::default());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create settings directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}
