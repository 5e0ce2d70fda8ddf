//! Component registration with checksum-aware caching.
//!
//! The registry maps (entity, component-id) to a data provider plus an
//! optional cadence, and caches the last serialized form of every
//! component. Because equal logical values encode to equal bytes (sorted
//! map keys), a byte comparison against the cached JSON decides whether the
//! SHA-256 needs recomputing at all — unchanged data is answered from the
//! cache without hashing.

use crate::error::{IntrospectionError, IntrospectionResult};
use parking_lot::RwLock;
use periscope_types::{checksum_of_bytes, Component, EntityId, Interval};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A data-producing callable registered for a component.
///
/// Providers return plain data; the registry owns serialization and
/// checksum bookkeeping. Providers may do brief I/O (the certificate
/// monitor scans a directory) but must not call back into the client
/// engine.
pub type DataProvider = Arc<dyn Fn() -> Value + Send + Sync>;

struct Registration {
    provider: DataProvider,
    cadence: Option<Interval>,
}

struct CacheEntry {
    raw_json: Vec<u8>,
    checksum: String,
    component: Component,
    /// When the provider was last invoked.
    last_update: Instant,
    /// When the component was last transmitted to the registrar.
    last_sync: Option<Instant>,
}

#[derive(Default)]
struct Tables {
    configs: HashMap<EntityId, HashMap<String, Registration>>,
    cache: HashMap<EntityId, HashMap<String, CacheEntry>>,
}

/// Thread-safe registry of component providers with multi-entity support.
pub struct Registry {
    own_entity: EntityId,
    tables: RwLock<Tables>,
    /// Number of SHA-256 computations performed, observable so the
    /// skip-recompute optimisation can be verified.
    hash_computations: AtomicU64,
}

impl Registry {
    /// Creates a registry owned by the given entity.
    #[must_use]
    pub fn new(own_entity: EntityId) -> Self {
        Self {
            own_entity,
            tables: RwLock::new(Tables::default()),
            hash_computations: AtomicU64::new(0),
        }
    }

    /// The entity id of the service itself.
    #[must_use]
    pub fn own_entity(&self) -> &EntityId {
        &self.own_entity
    }

    /// Registers a component for the own entity.
    ///
    /// `cadence: None` means trigger-only: the component is published only
    /// on an explicit update.
    pub fn register(
        &self,
        component_id: &str,
        provider: DataProvider,
        cadence: Option<Interval>,
    ) -> IntrospectionResult<()> {
        let own = self.own_entity.clone();
        self.register_for_entity(&own, component_id, provider, cadence)
    }

    /// Registers a component for any entity (multi-entity support).
    pub fn register_for_entity(
        &self,
        entity_id: &EntityId,
        component_id: &str,
        provider: DataProvider,
        cadence: Option<Interval>,
    ) -> IntrospectionResult<()> {
        if entity_id.is_empty() {
            return Err(IntrospectionError::InvalidArgument("entity id required".into()));
        }
        if component_id.is_empty() {
            return Err(IntrospectionError::InvalidArgument("component id required".into()));
        }

        let mut tables = self.tables.write();
        let entity_configs = tables.configs.entry(entity_id.clone()).or_default();
        if entity_configs.contains_key(component_id) {
            return Err(IntrospectionError::DuplicateRegistration {
                entity: entity_id.to_string(),
                component: component_id.to_string(),
            });
        }
        entity_configs.insert(
            component_id.to_string(),
            Registration { provider, cadence },
        );
        Ok(())
    }

    /// Invokes the provider and returns the component, consulting the cache.
    ///
    /// If the freshly serialized bytes equal the cached ones the cached
    /// component is returned unchanged — no hash is computed — and only
    /// `last_update` advances. Otherwise a new checksum and component
    /// replace the cache entry, preserving `last_sync`.
    pub fn collect(
        &self,
        entity_id: &EntityId,
        component_id: &str,
    ) -> IntrospectionResult<Component> {
        let mut tables = self.tables.write();

        let provider = tables
            .configs
            .get(entity_id)
            .and_then(|configs| configs.get(component_id))
            .map(|registration| Arc::clone(&registration.provider))
            .ok_or_else(|| IntrospectionError::NotRegistered {
                entity: entity_id.to_string(),
                component: component_id.to_string(),
            })?;

        // The provider only returns data; everything else happens here.
        let data = provider();
        let raw_json = serde_json::to_vec(&data)?;
        let now = Instant::now();

        let entity_cache = tables.cache.entry(entity_id.clone()).or_default();
        if let Some(entry) = entity_cache.get_mut(component_id) {
            if entry.raw_json == raw_json {
                // Data unchanged: skip the hash, refresh the update stamp.
                entry.last_update = now;
                return Ok(entry.component.clone());
            }
        }

        self.hash_computations.fetch_add(1, Ordering::Relaxed);
        let checksum = checksum_of_bytes(&raw_json);
        let component = Component {
            id: component_id.to_string(),
            component_type: component_id.to_string(),
            checksum: checksum.clone(),
            data,
        };

        let last_sync = entity_cache
            .get(component_id)
            .and_then(|entry| entry.last_sync);
        entity_cache.insert(
            component_id.to_string(),
            CacheEntry {
                raw_json,
                checksum,
                component: component.clone(),
                last_update: now,
                last_sync,
            },
        );

        Ok(component)
    }

    /// Component ids whose cadence has elapsed since the last collect
    /// (or that have never been collected). Trigger-only registrations are
    /// never due.
    #[must_use]
    pub fn due_components(&self) -> HashMap<EntityId, Vec<String>> {
        let tables = self.tables.read();
        let now = Instant::now();
        let mut due: HashMap<EntityId, Vec<String>> = HashMap::new();

        for (entity_id, configs) in &tables.configs {
            for (component_id, registration) in configs {
                let Some(cadence) = registration.cadence else {
                    continue;
                };
                let entry = tables
                    .cache
                    .get(entity_id)
                    .and_then(|cache| cache.get(component_id));
                let is_due = match entry {
                    Some(entry) => now.duration_since(entry.last_update) >= cadence.duration(),
                    None => true,
                };
                if is_due {
                    due.entry(entity_id.clone())
                        .or_default()
                        .push(component_id.clone());
                }
            }
        }

        due
    }

    /// Earliest `last_update + cadence` across cadence-bearing
    /// registrations; a never-collected component yields "now". `None`
    /// when no registration carries a cadence.
    #[must_use]
    pub fn next_update_time(&self) -> Option<Instant> {
        let tables = self.tables.read();
        let now = Instant::now();
        let mut next: Option<Instant> = None;

        for (entity_id, configs) in &tables.configs {
            for (component_id, registration) in configs {
                let Some(cadence) = registration.cadence else {
                    continue;
                };
                let entry = tables
                    .cache
                    .get(entity_id)
                    .and_then(|cache| cache.get(component_id));
                let component_next = match entry {
                    Some(entry) => entry.last_update + cadence.duration(),
                    None => now,
                };
                next = Some(match next {
                    Some(current) => current.min(component_next),
                    None => component_next,
                });
            }
        }

        next
    }

    /// Every registered (entity, component) pair, for the checksum table.
    #[must_use]
    pub fn all_registered(&self) -> HashMap<EntityId, Vec<String>> {
        let tables = self.tables.read();
        tables
            .configs
            .iter()
            .map(|(entity_id, configs)| {
                (entity_id.clone(), configs.keys().cloned().collect())
            })
            .collect()
    }

    /// Records that a component was transmitted to the registrar.
    pub fn mark_synced(&self, entity_id: &EntityId, component_id: &str, at: Instant) {
        let mut tables = self.tables.write();
        if let Some(entry) = tables
            .cache
            .get_mut(entity_id)
            .and_then(|cache| cache.get_mut(component_id))
        {
            entry.last_sync = Some(at);
        }
    }

    /// When the component was last transmitted, if ever.
    #[must_use]
    pub fn last_sync(&self, entity_id: &EntityId, component_id: &str) -> Option<Instant> {
        let tables = self.tables.read();
        tables
            .cache
            .get(entity_id)
            .and_then(|cache| cache.get(component_id))
            .and_then(|entry| entry.last_sync)
    }
}
