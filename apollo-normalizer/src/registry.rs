//! Identity and handle bookkeeping for one normalization run.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::chunk::Handle;

/// Index of an entity in the registry, in first-encounter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EntityId(usize);

/// The outcome of [`Registry::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Sighting {
    pub(crate) entity: EntityId,
    pub(crate) first: bool,
}

#[derive(Debug, Default)]
struct Entity {
    handle: Option<Handle>,
    emitted: HashSet<String>,
}

/// Maps stable identities to handles and remembers which storage keys were
/// already written for each of them.
///
/// Every stable identity is registered when it is first encountered. Its
/// handle is only minted when its `Record` chunk is queued, so handles follow
/// the order in which records reach the output.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    ids: HashMap<String, EntityId>,
    entities: Vec<Entity>,
    handles: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Look up a stable identity, registering it if this is its first sighting.
    pub(crate) fn resolve(&mut self, stable_id: &str) -> Sighting {
        if let Some(entity) = self.ids.get(stable_id) {
            return Sighting {
                entity: *entity,
                first: false,
            };
        }
        let entity = EntityId(self.entities.len());
        self.entities.push(Entity::default());
        self.ids.insert(stable_id.to_string(), entity);
        Sighting {
            entity,
            first: true,
        }
    }

    /// The handle of an entity, if its record was already queued.
    pub(crate) fn handle(&self, entity: EntityId) -> Option<Handle> {
        self.entities[entity.0].handle
    }

    /// Mint the handle of an entity. Must be called once, when its record is queued.
    pub(crate) fn allocate_handle(&mut self, entity: EntityId) -> Handle {
        let slot = &mut self.entities[entity.0].handle;
        debug_assert!(slot.is_none(), "handle allocated twice for {entity:?}");
        let handle = Handle::new(self.handles);
        self.handles += 1;
        *slot = Some(handle);
        handle
    }

    pub(crate) fn mark_emitted(&mut self, entity: EntityId, storage_key: &str) {
        let inserted = self.entities[entity.0]
            .emitted
            .insert(storage_key.to_string());
        debug_assert!(inserted, "storage key '{storage_key}' emitted twice");
    }

    pub(crate) fn was_emitted(&self, entity: EntityId, storage_key: &str) -> bool {
        self.entities[entity.0].emitted.contains(storage_key)
    }

    /// Number of distinct stable identities seen so far.
    pub(crate) fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of handles minted so far.
    pub(crate) fn handle_count(&self) -> usize {
        self.handles
    }
}
