use super::{ KeyValueStore, ProfileError };
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ProfileError> {
        let guard = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ProfileError> {
        let mut guard = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
