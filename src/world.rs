//! The database core: archetype store, archetype index, and entity
//! registry.

use crate::{
    archetype::{ArchetypeTable, ComponentMask},
    component::{Component, component_name},
    index::ArchetypeIndex,
    shape::Shape,
    view::{ComponentSet, View},
};
use anyhow::{Result, anyhow, bail};
use log::{debug, trace};
use std::{
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use stratum_utils::KeyIndexMapper;

/// Unique id identifying an entity.
///
/// Ids are allocated from a process-wide atomic counter and never
/// reused within the lifetime of the process, so two live entities
/// can never share an id even when they are created concurrently or
/// live in different worlds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u64);

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(0);

impl EntityId {
    pub(crate) fn allocate() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn for_test(id: u64) -> Self {
        Self(id)
    }

    /// The numeric value of the id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An in-memory entity–component database.
///
/// The world groups entities by archetype: all entities with the
/// exact same component set share one [`ArchetypeTable`], keyed by
/// the set's [`ComponentMask`]. The masks of all tables are
/// additionally kept in an [`ArchetypeIndex`] so that
/// [`view`](Self::view) can enumerate the archetypes matching a
/// query without inspecting non-matching ones, and every live entity
/// id maps to the mask of its owning archetype.
///
/// All mutating operations take `&mut self`; the world itself does
/// no internal locking apart from the atomic entity-id counter. Wrap
/// the world in a [`SharedWorld`](crate::entity::SharedWorld) to
/// share it across threads.
#[derive(Debug, Default)]
pub struct World {
    /// Maps each archetype mask to the index of its table in
    /// `tables`.
    table_masks: KeyIndexMapper<ComponentMask>,
    tables: Vec<ArchetypeTable>,
    index: ArchetypeIndex,
    entities: HashMap<EntityId, ComponentMask>,
}

impl World {
    /// Creates a world with no entities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new entity with the component set of the shape `S`,
    /// seeded with the values of the given shape instance.
    ///
    /// The archetype table for the shape's mask is created and
    /// indexed if this is the first entity of its archetype.
    ///
    /// # Returns
    /// The id of the new entity.
    ///
    /// # Examples
    /// ```
    /// # use stratum_ecs_macros::ComponentDoctest as Component;
    /// # use stratum_ecs::world::World;
    /// # use bytemuck::{Zeroable, Pod};
    /// #
    /// # #[repr(C)]
    /// # #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    /// # struct Distance(f32);
    /// # #[repr(C)]
    /// # #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    /// # struct Speed(f32);
    /// #
    /// let mut world = World::new();
    ///
    /// let entity = world.spawn_seeded((Distance(1.0), Speed(10.0)));
    ///
    /// assert_eq!(world.entity_count(), 1);
    /// assert_eq!(world.component::<Distance>(entity), Some(&Distance(1.0)));
    /// ```
    pub fn spawn_seeded<S: Shape>(&mut self, seed: S) -> EntityId {
        let layout = S::layout();
        let mask = layout.mask();
        let entity_id = EntityId::allocate();

        let table_idx = match self.table_masks.get(mask) {
            Some(idx) => idx,
            None => {
                debug!("Creating archetype table for {:?}", mask);
                let idx = self.tables.len();
                self.table_masks.push_key(mask);
                self.tables.push(ArchetypeTable::new(&layout));
                self.index.insert(mask);
                idx
            }
        };

        self.tables[table_idx].add_row(entity_id, seed);
        self.entities.insert(entity_id, mask);
        trace!("Spawned entity {} with {:?}", entity_id, mask);
        entity_id
    }

    /// Creates a new entity with the component set of the shape `S`,
    /// seeded with the shape's default values.
    pub fn spawn<S: Shape + Default>(&mut self) -> EntityId {
        self.spawn_seeded(S::default())
    }

    /// Removes the given entity and all of its component values. The
    /// archetype table keeps existing even if the entity was its
    /// last row.
    ///
    /// # Errors
    /// Returns an error if the entity is not registered.
    pub fn despawn(&mut self, entity_id: EntityId) -> Result<()> {
        let mask = self
            .entities
            .remove(&entity_id)
            .ok_or_else(|| anyhow!("Entity {} is not registered", entity_id))?;
        let table_idx = self.table_masks.idx(mask);
        self.tables[table_idx].drop_row(entity_id)?;
        trace!("Despawned entity {}", entity_id);
        Ok(())
    }

    /// Whether the given entity is registered.
    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.entities.contains_key(&entity_id)
    }

    /// The number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// The number of archetype tables ever created.
    pub fn archetype_count(&self) -> usize {
        self.tables.len()
    }

    /// The archetype mask the given entity is registered under, or
    /// [`None`] if the entity is not registered.
    pub fn entity_mask(&self, entity_id: EntityId) -> Option<ComponentMask> {
        self.entities.get(&entity_id).copied()
    }

    /// Whether the given entity is registered with an archetype
    /// whose component set includes `C`.
    pub fn has_component<C: Component>(&self, entity_id: EntityId) -> bool {
        self.entity_mask(entity_id)
            .is_some_and(|mask| mask.contains(C::component_id()))
    }

    /// Returns a reference to the `C` value of the given entity, or
    /// [`None`] if the entity is not registered or its archetype
    /// lacks `C`.
    pub fn component<C: Component>(&self, entity_id: EntityId) -> Option<&C> {
        let mask = self.entity_mask(entity_id)?;
        self.tables[self.table_masks.idx(mask)].component(entity_id)
    }

    /// Returns a mutable reference to the `C` value of the given
    /// entity, or [`None`] if the entity is not registered or its
    /// archetype lacks `C`.
    pub fn component_mut<C: Component>(&mut self, entity_id: EntityId) -> Option<&mut C> {
        let mask = self.entity_mask(entity_id)?;
        let table_idx = self.table_masks.idx(mask);
        self.tables[table_idx].component_mut(entity_id)
    }

    /// Overwrites the `C` value of the given entity.
    ///
    /// # Errors
    /// Returns an error if the entity is not registered or its
    /// archetype lacks `C`.
    pub fn set_component<C: Component>(&mut self, entity_id: EntityId, value: C) -> Result<()> {
        match self.component_mut(entity_id) {
            Some(component) => {
                *component = value;
                Ok(())
            }
            None => bail!(
                "Entity {} has no component `{}`",
                entity_id,
                component_name(C::component_id())
            ),
        }
    }

    /// Returns a lazy [`View`] over all entities whose archetype
    /// contains at least the component set `Q`, yielding each
    /// entity's id together with references to its `Q` values.
    ///
    /// # Examples
    /// ```
    /// # use stratum_ecs_macros::ComponentDoctest as Component;
    /// # use stratum_ecs::world::World;
    /// # use bytemuck::{Zeroable, Pod};
    /// #
    /// # #[repr(C)]
    /// # #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    /// # struct Distance(f32);
    /// # #[repr(C)]
    /// # #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    /// # struct Speed(f32);
    /// #
    /// let mut world = World::new();
    /// world.spawn_seeded((Distance(0.0), Speed(10.0)));
    /// world.spawn_seeded(Distance(3.0));
    ///
    /// let total: f32 = world
    ///     .view::<(Distance,)>()
    ///     .map(|(_entity, (distance,))| distance.0)
    ///     .sum();
    /// assert_eq!(total, 3.0);
    ///
    /// assert_eq!(world.view::<(Distance, Speed)>().count(), 1);
    /// ```
    pub fn view<'w, Q: ComponentSet<'w>>(&'w self) -> View<'w, Q> {
        View::new(self)
    }

    /// The index over the masks of all archetype tables.
    pub fn archetype_index(&self) -> &ArchetypeIndex {
        &self.index
    }

    /// The masks of all archetype tables, in creation order.
    pub fn archetype_masks(&self) -> &[ComponentMask] {
        self.table_masks.keys()
    }

    /// The archetype table stored under the given mask, or [`None`]
    /// if no entity with that exact component set was ever created.
    pub fn table(&self, mask: ComponentMask) -> Option<&ArchetypeTable> {
        self.table_masks.get(mask).map(|idx| &self.tables[idx])
    }
}
