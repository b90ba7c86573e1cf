mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::models::profile::BirthProfile;
use log::{ info, warn };
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub const PROFILE_KEY: &str = "birth_details";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat string key-value storage, the same contract browser local storage
/// offers.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ProfileError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ProfileError>;
}

/// Reads and writes the birth profile record under a namespaced key.
#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_namespace(store, "")
    }

    pub fn with_namespace(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self { store, namespace: namespace.into() }
    }

    pub fn key(&self) -> String {
        format!("{}{}", self.namespace, PROFILE_KEY)
    }

    /// Overwrites the stored profile.
    pub fn save(&self, profile: &BirthProfile) -> Result<(), ProfileError> {
        let json = serde_json::to_string(profile)?;
        self.store.set(&self.key(), &json)
    }

    /// Returns the stored profile, or `None` when nothing usable is stored.
    /// Malformed records are treated as absent.
    pub fn load(&self) -> Result<Option<BirthProfile>, ProfileError> {
        let key = self.key();
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<BirthProfile>(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!("Ignoring malformed profile record under '{}': {}", key, e);
                Ok(None)
            }
        }
    }
}

pub fn open_file_repository(
    path: impl AsRef<Path>,
    namespace: &str
) -> ProfileRepository {
    let path = path.as_ref();
    info!("Birth profile will be stored in: {}", path.display());
    ProfileRepository::with_namespace(Arc::new(JsonFileStore::new(path)), namespace)
}
