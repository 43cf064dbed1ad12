//! Shared world access and owning entity handles.

use crate::{
    component::Component,
    shape::{Shape, ShapeContains},
    world::{EntityId, World},
};
use lazy_static::lazy_static;
use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// A [`World`] behind shared ownership and a read–write lock.
///
/// This is the synchronization layer required for using the database
/// from multiple threads: all structural mutation and component
/// access goes through the lock, while entity-id allocation stays
/// atomic and lock-free. [`Entity`] handles keep their world alive
/// by holding a clone of the `SharedWorld` they were created in.
#[derive(Clone, Debug, Default)]
pub struct SharedWorld {
    inner: Arc<RwLock<World>>,
}

lazy_static! {
    static ref TAGGED_WORLDS: Mutex<HashMap<TypeId, SharedWorld>> = Mutex::new(HashMap::new());
}

impl SharedWorld {
    /// Creates a new shared world with no entities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide world singleton associated with the
    /// tag type `Tag`, creating it on first use. Distinct tag types
    /// yield fully independent worlds.
    ///
    /// # Examples
    /// ```
    /// # use stratum_ecs::entity::SharedWorld;
    /// struct Simulation;
    /// struct Editor;
    ///
    /// let simulation = SharedWorld::tagged::<Simulation>();
    /// let editor = SharedWorld::tagged::<Editor>();
    /// ```
    pub fn tagged<Tag: 'static>() -> Self {
        TAGGED_WORLDS
            .lock()
            .unwrap()
            .entry(TypeId::of::<Tag>())
            .or_default()
            .clone()
    }

    /// Acquires shared access to the world, e.g. for iterating
    /// views.
    pub fn read(&self) -> RwLockReadGuard<'_, World> {
        self.inner.read().unwrap()
    }

    /// Acquires exclusive access to the world.
    pub fn write(&self) -> RwLockWriteGuard<'_, World> {
        self.inner.write().unwrap()
    }

    /// Creates an entity of shape `S` seeded with the shape's
    /// default values, and returns the owning handle.
    pub fn create<S: Shape + Default>(&self) -> Entity<S> {
        self.create_from(S::default())
    }

    /// Creates an entity of shape `S` seeded with the given values,
    /// and returns the owning handle.
    pub fn create_from<S: Shape>(&self, seed: S) -> Entity<S> {
        let id = self.write().spawn_seeded(seed);
        Entity {
            id,
            world: self.clone(),
            _shape: PhantomData,
        }
    }
}

/// Owning handle to an entity of shape `S`.
///
/// Constructing the handle (through [`SharedWorld::create`] or
/// [`SharedWorld::create_from`]) registers the entity into the
/// archetype table matching the shape's component set; dropping it
/// removes the entity's row from every column and unregisters the
/// id. The handle cannot be cloned and its id never changes.
///
/// Component access is restricted to the shape's component set at
/// compile time through the [`ShapeContains`] bound; the `Route`
/// type parameter on [`get`](Self::get) and [`set`](Self::set) is
/// inferred.
pub struct Entity<S: Shape> {
    id: EntityId,
    world: SharedWorld,
    _shape: PhantomData<S>,
}

impl<S: Shape> Entity<S> {
    /// The id of the entity.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The world the entity lives in.
    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    /// Returns a copy of the entity's `C` value.
    ///
    /// Fails to type-check if `C` is not part of the shape `S`.
    ///
    /// # Panics
    /// If the entity is no longer registered in its world.
    pub fn get<C, Route>(&self) -> C
    where
        C: Component,
        S: ShapeContains<C, Route>,
    {
        self.world
            .read()
            .component::<C>(self.id)
            .copied()
            .expect("Entity is not registered in its world")
    }

    /// Overwrites the entity's `C` value.
    ///
    /// Fails to type-check if `C` is not part of the shape `S`.
    ///
    /// # Panics
    /// If the entity is no longer registered in its world.
    pub fn set<C, Route>(&self, value: C)
    where
        C: Component,
        S: ShapeContains<C, Route>,
    {
        self.world
            .write()
            .set_component(self.id, value)
            .expect("Entity is not registered in its world");
    }

    /// Whether the archetype the entity is registered under includes
    /// the component type `C`, determined from the registered mask
    /// at runtime.
    pub fn has<C: Component>(&self) -> bool {
        self.world.read().has_component::<C>(self.id)
    }
}

impl<S: Shape> Drop for Entity<S> {
    fn drop(&mut self) {
        if let Err(error) = self.world.write().despawn(self.id) {
            log::error!("Failed to unregister entity {}: {}", self.id, error);
        }
    }
}

impl<S: Shape> fmt::Debug for Entity<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Component;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Zeroable, Pod, Component)]
    struct Charge(f32);

    #[repr(C)]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Zeroable, Pod, Component)]
    struct Spin(i8);

    #[test]
    fn created_entity_is_registered_until_dropped() {
        let world = SharedWorld::new();
        let particle = world.create_from((Charge(1.0), Spin(-1)));
        let id = particle.id();

        assert!(world.read().contains(id));
        assert_eq!(world.read().entity_count(), 1);

        drop(particle);
        assert!(!world.read().contains(id));
        assert_eq!(world.read().entity_count(), 0);
    }

    #[test]
    fn get_and_set_access_component_values() {
        let world = SharedWorld::new();
        let particle = world.create_from((Charge(1.0), Spin(-1)));

        assert_eq!(particle.get::<Charge, _>(), Charge(1.0));
        particle.set(Charge(-1.0));
        assert_eq!(particle.get::<Charge, _>(), Charge(-1.0));
        assert_eq!(particle.get::<Spin, _>(), Spin(-1));
    }

    #[test]
    fn has_checks_the_registered_mask() {
        let world = SharedWorld::new();
        let bare = world.create_from(Charge(0.5));
        assert!(bare.has::<Charge>());
        assert!(!bare.has::<Spin>());
    }

    #[test]
    fn default_seeded_entity_is_value_initialized() {
        let world = SharedWorld::new();
        let particle = world.create::<(Charge, Spin)>();
        assert_eq!(particle.get::<Charge, _>(), Charge(0.0));
        assert_eq!(particle.get::<Spin, _>(), Spin(0));
    }

    #[test]
    fn tagged_worlds_are_singletons_per_tag() {
        struct TagA;
        struct TagB;

        let a1 = SharedWorld::tagged::<TagA>();
        let a2 = SharedWorld::tagged::<TagA>();
        let b = SharedWorld::tagged::<TagB>();

        let particle = a1.create_from(Charge(1.0));
        assert!(a2.read().contains(particle.id()));
        assert!(!b.read().contains(particle.id()));
    }
}
