// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role resolution with an LRU cache.
//!
//! Cached role lists have no time-based expiry. A role mutation must be
//! followed by [`RoleResolver::clear_cache`]; until then readers may see the
//! previous role list.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Role;
use crate::storage::{CredentialDatabase, RoleRepository, StoreResult};

/// Default number of principals kept in the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Cache counters reported by the RBAC status endpoint.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

struct RoleCache {
    entries: LruCache<String, Vec<Role>>,
    /// Bumped on every clear; a lookup that started before a clear must not
    /// repopulate the cache with what it read.
    generation: u64,
}

/// Resolves a principal's role names, caching the result.
pub struct RoleResolver {
    db: Arc<CredentialDatabase>,
    cache: Mutex<RoleCache>,
    capacity: NonZeroUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RoleResolver {
    /// Create a resolver. A capacity of zero falls back to the default.
    pub fn new(db: Arc<CredentialDatabase>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            db,
            cache: Mutex::new(RoleCache {
                entries: LruCache::new(capacity),
                generation: 0,
            }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Role names for a principal, ordered by role id.
    ///
    /// Store reads happen with the cache lock released.
    pub fn resolve_roles(&self, principal_id: &Uuid) -> StoreResult<Vec<Role>> {
        let key = principal_id.to_string();

        let generation = match self.cache.lock() {
            Ok(mut cache) => {
                if let Some(roles) = cache.entries.get(&key) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(roles.clone());
                }
                Some(cache.generation)
            }
            // Poisoned lock: serve from the store without caching.
            Err(_) => None,
        };
        self.misses.fetch_add(1, Ordering::Relaxed);

        let roles = RoleRepository::new(&self.db).roles_for(principal_id)?;

        if let (Some(generation), Ok(mut cache)) = (generation, self.cache.lock()) {
            if cache.generation == generation {
                cache.entries.put(key, roles.clone());
            }
        }

        tracing::debug!(principal_id = %principal_id, roles = ?roles, "Roles resolved from store");
        Ok(roles)
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        match self.cache.lock() {
            Ok(mut cache) => {
                cache.entries.clear();
                cache.generation = cache.generation.wrapping_add(1);
            }
            Err(poisoned) => {
                let mut cache = poisoned.into_inner();
                cache.entries.clear();
                cache.generation = cache.generation.wrapping_add(1);
                self.cache.clear_poison();
            }
        }
        tracing::info!("Role cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.cache.lock().map(|c| c.entries.len()).unwrap_or(0);
        CacheStats {
            size,
            capacity: self.capacity.get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::test_support::temp_database;
    use crate::storage::PrincipalRepository;

    fn setup() -> (RoleResolver, Arc<CredentialDatabase>, tempfile::TempDir) {
        let (db, dir) = temp_database();
        let db = Arc::new(db);
        (RoleResolver::new(db.clone(), 16), db, dir)
    }

    #[test]
    fn resolves_assigned_roles() {
        let (resolver, db, _dir) = setup();
        let principal = PrincipalRepository::new(&db)
            .find_or_create_by_phone("+919000000010")
            .unwrap();
        RoleRepository::new(&db).assign(&principal.id, Role::Reviewer).unwrap();

        assert_eq!(resolver.resolve_roles(&principal.id).unwrap(), vec![Role::Reviewer]);
    }

    #[test]
    fn principal_without_roles_resolves_empty() {
        let (resolver, _db, _dir) = setup();
        assert!(resolver.resolve_roles(&Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn second_lookup_is_a_cache_hit() {
        let (resolver, db, _dir) = setup();
        let principal = PrincipalRepository::new(&db)
            .find_or_create_by_phone("+919000000011")
            .unwrap();

        resolver.resolve_roles(&principal.id).unwrap();
        resolver.resolve_roles(&principal.id).unwrap();

        let stats = resolver.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 16);
    }

    #[test]
    fn cached_roles_stay_stale_until_cleared() {
        let (resolver, db, _dir) = setup();
        let principal = PrincipalRepository::new(&db)
            .find_or_create_by_phone("+919000000012")
            .unwrap();
        let roles = RoleRepository::new(&db);
        roles.assign(&principal.id, Role::User).unwrap();

        assert_eq!(resolver.resolve_roles(&principal.id).unwrap(), vec![Role::User]);

        roles.assign(&principal.id, Role::Admin).unwrap();
        assert_eq!(resolver.resolve_roles(&principal.id).unwrap(), vec![Role::User]);

        resolver.clear_cache();
        assert_eq!(resolver.stats().size, 0);
        assert_eq!(
            resolver.resolve_roles(&principal.id).unwrap(),
            vec![Role::Admin, Role::User]
        );
    }

    #[test]
    fn capacity_bounds_cache_size() {
        let (db, _dir) = temp_database();
        let resolver = RoleResolver::new(Arc::new(db), 2);
        for _ in 0..5 {
            resolver.resolve_roles(&Uuid::new_v4()).unwrap();
        }
        assert_eq!(resolver.stats().size, 2);
    }

    #[test]
    fn zero_capacity_uses_default() {
        let (db, _dir) = temp_database();
        let resolver = RoleResolver::new(Arc::new(db), 0);
        assert_eq!(resolver.stats().capacity, DEFAULT_CACHE_CAPACITY);
    }
}
