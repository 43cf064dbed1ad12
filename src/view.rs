//! Lazy iteration over entities matching a component-set query.

use crate::{
    archetype::{ArchetypeTable, ComponentMask},
    component::Component,
    index::SupersetsOf,
    world::{EntityId, World},
};
use std::{fmt, ptr};

/// A set of component types that can be queried with a
/// [`View`], implemented for tuples of up to eight [`Component`]
/// types as well as for the empty tuple (which matches every
/// archetype).
pub trait ComponentSet<'w> {
    /// One column slice per component type in the set, taken from a
    /// single archetype table.
    type Slices: Copy;

    /// One reference per component type in the set, all referring to
    /// the same entity.
    type Refs;

    /// The mask over the component ids in the set.
    fn mask() -> ComponentMask;

    /// Extracts the column slices for the set from the given table.
    ///
    /// # Panics
    /// If the table's archetype does not contain every component of
    /// the set.
    fn slices(table: &'w ArchetypeTable) -> Self::Slices;

    /// The references into the given slices at the given row.
    fn refs(slices: Self::Slices, row: usize) -> Self::Refs;
}

impl<'w> ComponentSet<'w> for () {
    type Slices = ();
    type Refs = ();

    fn mask() -> ComponentMask {
        ComponentMask::EMPTY
    }

    fn slices(_table: &'w ArchetypeTable) -> Self::Slices {}

    fn refs(_slices: Self::Slices, _row: usize) -> Self::Refs {}
}

/// Implements [`ComponentSet`] for a tuple of component types.
macro_rules! impl_component_set_for_tuple {
    (($($c:ident),*)) => {
        impl<'w, $($c: Component),*> ComponentSet<'w> for ($($c,)*) {
            type Slices = ($(&'w [$c],)*);
            type Refs = ($(&'w $c,)*);

            fn mask() -> ComponentMask {
                ComponentMask::EMPTY$(.with($c::component_id()))*
            }

            fn slices(table: &'w ArchetypeTable) -> Self::Slices {
                ($(table
                    .column_slice::<$c>()
                    .expect("Queried component missing from matched archetype table"),)*)
            }

            #[allow(non_snake_case)]
            fn refs(slices: Self::Slices, row: usize) -> Self::Refs {
                let ($($c,)*) = slices;
                ($(&$c[row],)*)
            }
        }
    };
}

impl_component_set_for_tuple!((C1));
impl_component_set_for_tuple!((C1, C2));
impl_component_set_for_tuple!((C1, C2, C3));
impl_component_set_for_tuple!((C1, C2, C3, C4));
impl_component_set_for_tuple!((C1, C2, C3, C4, C5));
impl_component_set_for_tuple!((C1, C2, C3, C4, C5, C6));
impl_component_set_for_tuple!((C1, C2, C3, C4, C5, C6, C7));
impl_component_set_for_tuple!((C1, C2, C3, C4, C5, C6, C7, C8));

/// A lazy, forward-only iterator over all entities whose archetype
/// contains at least the component set `Q`, yielding
/// `(EntityId, (&C1, …, &Ck))` items.
///
/// The iteration runs on two levels: the world's
/// [`ArchetypeIndex`](crate::index::ArchetypeIndex) enumerates the
/// masks that are supersets of `Q::mask()`, and within each matched
/// archetype table the entity-id column and the queried component
/// columns are walked in lockstep by their shared row order. The row
/// order within a table is deterministic for a fixed world state,
/// and every matching entity is visited exactly once.
///
/// Querying the empty set (`Q = ()`) matches every archetype, so the
/// view visits every live entity.
///
/// The view borrows the [`World`] shared for its whole lifetime;
/// operations that would mutate the world while a view is alive are
/// rejected at compile time.
pub struct View<'w, Q: ComponentSet<'w>> {
    world: &'w World,
    archetypes: SupersetsOf<'w>,
    current: Option<CurrentTable<'w, Q>>,
    finished: bool,
}

struct CurrentTable<'w, Q: ComponentSet<'w>> {
    mask: ComponentMask,
    entity_ids: &'w [EntityId],
    slices: Q::Slices,
    next_row: usize,
}

impl<'w, Q: ComponentSet<'w>> View<'w, Q> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            archetypes: world.archetype_index().supersets_of(Q::mask()),
            current: None,
            finished: false,
        }
    }
}

impl<'w, Q: ComponentSet<'w>> Iterator for View<'w, Q> {
    type Item = (EntityId, Q::Refs);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(current) = &mut self.current {
                if current.next_row < current.entity_ids.len() {
                    let row = current.next_row;
                    current.next_row += 1;
                    return Some((current.entity_ids[row], Q::refs(current.slices, row)));
                }
                self.current = None;
            }

            match self.archetypes.next() {
                Some(mask) => {
                    let table = self
                        .world
                        .table(mask)
                        .expect("Indexed archetype mask has no table");
                    if table.is_empty() {
                        continue;
                    }
                    self.current = Some(CurrentTable {
                        mask,
                        entity_ids: table.entity_ids(),
                        slices: Q::slices(table),
                        next_row: 0,
                    });
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

/// Two views are equal if both are finished, or if they are over the
/// same world and stand at the same archetype and row.
impl<'w, Q: ComponentSet<'w>> PartialEq for View<'w, Q> {
    fn eq(&self, other: &Self) -> bool {
        if self.finished && other.finished {
            return true;
        }
        if self.finished != other.finished {
            return false;
        }
        ptr::eq(self.world, other.world) && self.position() == other.position()
    }
}

impl<'w, Q: ComponentSet<'w>> View<'w, Q> {
    fn position(&self) -> Option<(ComponentMask, usize)> {
        self.current
            .as_ref()
            .map(|current| (current.mask, current.next_row))
    }
}

impl<'w, Q: ComponentSet<'w>> fmt::Debug for View<'w, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("query_mask", &Q::mask())
            .field("position", &self.position())
            .field("finished", &self.finished)
            .finish()
    }
}
