//! Per-user access scopes, cached for the run.
//!
//! A query failure degrades that user to an empty scope with a warning; the
//! run never aborts here. Repeated lookups for the same user return the cached
//! sets without re-querying.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::models::{AccessScope, UserRecord};
use crate::stores::RelationalSampler;

/// Run-lifetime cache of access scopes, keyed by user id
#[derive(Debug, Default)]
pub struct ScopeCache {
    scopes: HashMap<i64, AccessScope>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and cache the scope for one user; a repeat call is a cache hit
    pub async fn load(
        &mut self,
        store: &dyn RelationalSampler,
        user_id: i64,
    ) -> &AccessScope {
        if !self.scopes.contains_key(&user_id) {
            let correspondence_ids = match store.fetch_correspondence_scope(user_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(
                        "Correspondence scope query failed for user {}: {}; using empty scope",
                        user_id, e
                    );
                    Vec::new()
                }
            };
            let task_ids = match store.fetch_task_scope(user_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(
                        "Task scope query failed for user {}: {}; using empty scope",
                        user_id, e
                    );
                    Vec::new()
                }
            };

            debug!(
                "Scope for user {}: {} correspondences, {} tasks",
                user_id,
                correspondence_ids.len(),
                task_ids.len()
            );
            self.scopes.insert(
                user_id,
                AccessScope {
                    user_id,
                    correspondence_ids,
                    task_ids,
                },
            );
        }

        &self.scopes[&user_id]
    }

    /// Populate the cache for every roster entry, one user at a time
    pub async fn load_all(&mut self, store: &dyn RelationalSampler, roster: &[UserRecord]) {
        for user in roster {
            self.load(store, user.user_id).await;
        }
        info!("Loaded access scopes for {} users", roster.len());
    }

    /// Cached scope, or an empty one for a user that was never loaded
    pub fn get(&self, user_id: i64) -> AccessScope {
        self.scopes
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| AccessScope::empty(user_id))
    }
}
