use std::collections::HashMap;

use tracing::{info, warn};

use crate::persistence::UserNameStore;
use crate::slack::ChatApi;

pub const UNKNOWN_USER: &str = "Unknown";

/// Resolves user ids to display names for one command invocation.
///
/// Lookup order is session cache, persisted store, then `users.info`. Only successful
/// lookups are cached; a failure is retried the next time the id shows up.
pub struct NameResolver<'a, S: UserNameStore> {
    session: HashMap<String, String>,
    store: &'a mut S,
}

impl<'a, S: UserNameStore> NameResolver<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self {
            session: HashMap::new(),
            store,
        }
    }

    pub async fn resolve<A: ChatApi>(&mut self, api: &A, user_id: &str) -> String {
        if user_id.is_empty() {
            return UNKNOWN_USER.to_string();
        }
        if let Some(name) = self.session.get(user_id) {
            return name.clone();
        }
        if let Some(name) = self.store.get(user_id) {
            self.session.insert(user_id.to_string(), name.clone());
            return name;
        }

        match api.user_name(user_id).await {
            Ok(Some(name)) => {
                self.session.insert(user_id.to_string(), name.clone());
                if let Err(e) = self.store.put(user_id, &name) {
                    warn!(user_id, error = %e, "failed to persist user cache");
                } else {
                    info!(user_id, name = %name, "cached user name");
                }
                name
            }
            Ok(None) => {
                warn!(user_id, "users.info returned no name");
                UNKNOWN_USER.to_string()
            }
            Err(e) => {
                warn!(user_id, error = %e, "error fetching user profile");
                UNKNOWN_USER.to_string()
            }
        }
    }

    #[cfg(test)]
    pub fn session_len(&self) -> usize {
        self.session.len()
    }
}
