//! An in-memory entity–component database with archetypal columnar
//! storage.
//!
//! Entities are 64-bit ids associated with a fixed set of typed
//! [`Component`](component::Component) values. All entities sharing
//! the exact same component set form an archetype, identified by a
//! 128-bit [`ComponentMask`](archetype::ComponentMask), and their
//! component data is stored grouped by archetype and by component
//! type. Iterating any subset of components is therefore contiguous
//! per type: a [`View`](view::View) fuses a bitwise-trie lookup of
//! all archetypes containing the queried set with lockstep iteration
//! over each matched archetype's columns.
//!
//! # Example
//! ```
//! use bytemuck::{Pod, Zeroable};
//! use stratum_ecs::world::World;
//! use stratum_ecs_macros::ComponentDoctest as Component;
//!
//! #[repr(C)]
//! #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
//! struct Position(f32, f32);
//!
//! #[repr(C)]
//! #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
//! struct Velocity(f32, f32);
//!
//! let mut world = World::new();
//! world.spawn_seeded(Position(0.0, 0.0));
//! world.spawn_seeded((Position(1.0, 1.0), Velocity(0.5, 0.0)));
//!
//! // Every entity with a `Position`, whatever else it carries
//! assert_eq!(world.view::<(Position,)>().count(), 2);
//!
//! // Only entities with both a `Position` and a `Velocity`
//! for (_entity, (position, velocity)) in world.view::<(Position, Velocity)>() {
//!     assert_eq!(position, &Position(1.0, 1.0));
//!     assert_eq!(velocity, &Velocity(0.5, 0.0));
//! }
//! ```
//!
//! Entities can also be managed through owning
//! [`Entity`](entity::Entity) handles created from a
//! [`SharedWorld`](entity::SharedWorld), which remove their entity
//! again when dropped and restrict component access to the entity's
//! declared [`Shape`](shape::Shape) at compile time.

pub mod archetype;
pub mod component;
pub mod entity;
pub mod index;
pub mod shape;
pub mod view;
pub mod world;

/// Derive macro generating an impl of the trait
/// [`Component`](component::Component), registering the type with
/// the global component registry, and making the type usable as the
/// single-component [`Shape`](shape::Shape) of itself.
pub use stratum_ecs_macros::Component;

/// Derive macro generating an impl of the trait
/// [`Shape`](shape::Shape) for a struct whose fields are components
/// or nested shapes, along with the
/// [`ShapeContains`](shape::ShapeContains) routes that let
/// [`Entity::get`](entity::Entity::get) and
/// [`Entity::set`](entity::Entity::set) reach every component of the
/// shape.
pub use stratum_ecs_macros::Shape;

// Re-exported for the code generated by the derive macros.
pub use const_fnv1a_hash;
pub use inventory;

/// Computes the [`ComponentMask`](archetype::ComponentMask) of the
/// component set given as a list of types.
///
/// Providing no types gives the empty mask. The order of the types
/// does not affect the result.
///
/// ```ignore
/// mask_of!(Comp1, Comp2, ...)
/// ```
#[macro_export]
macro_rules! mask_of {
    ($($component:ty),* $(,)?) => {
        <($($component,)*) as $crate::shape::Shape>::mask()
    };
}
