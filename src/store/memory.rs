//! Thread-safe in-memory [`SettingsStore`] for tests and short-lived processes.

// self
use crate::{
	_prelude::*,
	store::{Settings, SettingsStore, StoreError},
};

/// Keeps settings in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Settings>>);
impl SettingsStore for MemoryStore {
	fn load(&self) -> Result<Settings, StoreError> {
		Ok(self.0.read().clone())
	}

	fn save(&self, settings: &Settings) -> Result<(), StoreError> {
		*self.0.write() = settings.clone();

		Ok(())
	}

	fn update(&self, edit: &mut dyn FnMut(&mut Settings)) -> Result<(), StoreError> {
		edit(&mut self.0.write());

		Ok(())
	}
}
