#[cfg(test)]
use std::collections::HashMap;

use crate::config::Config;
use crate::error::Result;

/// Persistent user-id to display-name cache.
pub trait UserNameStore {
    fn get(&self, user_id: &str) -> Option<String>;

    /// Record a name. Persisting implementations write through before returning.
    fn put(&mut self, user_id: &str, name: &str) -> Result<()>;
}

impl UserNameStore for Config {
    fn get(&self, user_id: &str) -> Option<String> {
        self.user_cache.get(user_id).cloned()
    }

    fn put(&mut self, user_id: &str, name: &str) -> Result<()> {
        self.user_cache
            .insert(user_id.to_string(), name.to_string());
        self.save()
    }
}

/// In-memory store, used where no config file should be touched.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    pub map: HashMap<String, String>,
    pub writes: usize,
}

#[cfg(test)]
impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, user_id: &str, name: &str) -> Self {
        self.map.insert(user_id.to_string(), name.to_string());
        self
    }
}

#[cfg(test)]
impl UserNameStore for MemoryUserStore {
    fn get(&self, user_id: &str) -> Option<String> {
        self.map.get(user_id).cloned()
    }

    fn put(&mut self, user_id: &str, name: &str) -> Result<()> {
        self.map.insert(user_id.to_string(), name.to_string());
        self.writes += 1;
        Ok(())
    }
}
