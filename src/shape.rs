//! Entity shapes: statically declared component sets.
//!
//! A shape describes the full set of component types a family of
//! entities is born with, along with the values seeding a new
//! entity's row. Every [`Component`] is the one-component shape of
//! itself, tuples of shapes form composite shapes, and structs can
//! derive [`Shape`](crate::Shape) to name a reusable shape whose
//! fields are components or nested shape fragments. The effective
//! component set is always the union of the members, so the same
//! component reachable through several fragments still occupies a
//! single column.

use crate::{
    archetype::{ComponentMask, RowWriter},
    component::{Component, ComponentId, ComponentStorage},
};
use std::{marker::PhantomData, mem};
use stratum_utils::Alignment;

/// A statically declared set of component types, with values for
/// seeding the row of a newly created entity.
pub trait Shape: Sized + 'static {
    /// Accumulates the columns of the shape's component set into the
    /// given layout.
    fn collect_columns(layout: &mut ShapeLayout);

    /// Consumes the instance, writing one value per component of the
    /// shape into the given row writer.
    fn write_components(self, writer: &mut RowWriter<'_>);

    /// The mask of the shape's component set: the bitwise OR over
    /// the ids of all components reachable through the shape.
    fn mask() -> ComponentMask {
        Self::layout().mask()
    }

    /// The deduplicated column layout of the shape's component set.
    fn layout() -> ShapeLayout {
        let mut layout = ShapeLayout::new();
        Self::collect_columns(&mut layout);
        layout
    }
}

/// Description of one column of an archetype table: the component id
/// plus the size and alignment needed to allocate its storage.
#[derive(Copy, Clone, Debug)]
pub struct ColumnSpec {
    component_id: ComponentId,
    component_size: usize,
    alignment: Alignment,
}

impl ColumnSpec {
    /// The id of the component type stored in the column.
    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    /// Creates an empty storage matching this column.
    pub fn make_storage(&self) -> ComponentStorage {
        ComponentStorage::new(self.component_id, self.component_size, self.alignment)
    }
}

/// The deduplicated set of columns making up a shape's component
/// set, ordered by component id.
#[derive(Clone, Debug, Default)]
pub struct ShapeLayout {
    columns: Vec<ColumnSpec>,
}

impl ShapeLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column for the component type `C`. Adding the same
    /// component type again has no effect: overlapping shape
    /// fragments collapse to a single column.
    pub fn add<C: Component>(&mut self) {
        let component_id = C::component_id();
        if let Err(pos) = self
            .columns
            .binary_search_by_key(&component_id, ColumnSpec::component_id)
        {
            self.columns.insert(
                pos,
                ColumnSpec {
                    component_id,
                    component_size: mem::size_of::<C>(),
                    alignment: Alignment::of::<C>(),
                },
            );
        }
    }

    /// The mask over all collected component ids.
    pub fn mask(&self) -> ComponentMask {
        self.columns
            .iter()
            .fold(ComponentMask::EMPTY, |mask, spec| {
                mask.with(spec.component_id())
            })
    }

    /// The collected columns, ordered by component id.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }
}

/// Marker trait asserting that the component type `C` is part of the
/// shape implementing the trait.
///
/// The `Route` parameter records where in the shape the component is
/// found ([`Direct`] for a component itself, [`Elem`] for a position
/// within a tuple or derived shape) and is inferred at the call
/// site. Requesting a component that is not reachable through the
/// shape fails to type-check, since no route exists.
pub trait ShapeContains<C: Component, Route> {}

/// Route for a component found directly: every component contains
/// itself.
#[derive(Clone, Copy, Debug)]
pub struct Direct;

/// Route for a component found inside member `I` of a composite
/// shape, continuing along route `R` within that member.
#[derive(Clone, Copy, Debug)]
pub struct Elem<const I: usize, R>(PhantomData<R>);

impl<C: Component> ShapeContains<C, Direct> for C {}

/// The empty shape: no components.
impl Shape for () {
    fn collect_columns(_layout: &mut ShapeLayout) {}

    fn write_components(self, _writer: &mut RowWriter<'_>) {}
}

/// Implements `Shape` for a tuple of shapes.
macro_rules! impl_shape_for_tuple {
    (($($member:ident),*)) => {
        impl<$($member: Shape),*> Shape for ($($member,)*) {
            fn collect_columns(layout: &mut ShapeLayout) {
                $($member::collect_columns(layout);)*
            }

            #[allow(non_snake_case)]
            fn write_components(self, writer: &mut RowWriter<'_>) {
                let ($($member,)*) = self;
                $($member.write_components(writer);)*
            }
        }
    };
}

/// Implements `ShapeContains` for one member position of a tuple of
/// shapes.
macro_rules! impl_shape_contains_for_tuple_member {
    (($($member:ident),*), $target:ident, $idx:literal) => {
        impl<QueriedComponent, Route, $($member),*>
            ShapeContains<QueriedComponent, Elem<$idx, Route>> for ($($member,)*)
        where
            QueriedComponent: Component,
            $($member: Shape,)*
            $target: ShapeContains<QueriedComponent, Route>,
        {
        }
    };
}

impl_shape_for_tuple!((S1));
impl_shape_contains_for_tuple_member!((S1), S1, 0);

impl_shape_for_tuple!((S1, S2));
impl_shape_contains_for_tuple_member!((S1, S2), S1, 0);
impl_shape_contains_for_tuple_member!((S1, S2), S2, 1);

impl_shape_for_tuple!((S1, S2, S3));
impl_shape_contains_for_tuple_member!((S1, S2, S3), S1, 0);
impl_shape_contains_for_tuple_member!((S1, S2, S3), S2, 1);
impl_shape_contains_for_tuple_member!((S1, S2, S3), S3, 2);

impl_shape_for_tuple!((S1, S2, S3, S4));
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4), S1, 0);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4), S2, 1);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4), S3, 2);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4), S4, 3);

impl_shape_for_tuple!((S1, S2, S3, S4, S5));
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5), S1, 0);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5), S2, 1);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5), S3, 2);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5), S4, 3);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5), S5, 4);

impl_shape_for_tuple!((S1, S2, S3, S4, S5, S6));
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6), S1, 0);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6), S2, 1);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6), S3, 2);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6), S4, 3);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6), S5, 4);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6), S6, 5);

impl_shape_for_tuple!((S1, S2, S3, S4, S5, S6, S7));
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7), S1, 0);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7), S2, 1);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7), S3, 2);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7), S4, 3);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7), S5, 4);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7), S6, 5);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7), S7, 6);

impl_shape_for_tuple!((S1, S2, S3, S4, S5, S6, S7, S8));
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7, S8), S1, 0);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7, S8), S2, 1);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7, S8), S3, 2);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7, S8), S4, 3);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7, S8), S5, 4);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7, S8), S6, 5);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7, S8), S7, 6);
impl_shape_contains_for_tuple_member!((S1, S2, S3, S4, S5, S6, S7, S8), S8, 7);

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Component, Shape};
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    struct Position(f32, f32, f32);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    struct Velocity(f32, f32, f32);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    struct Mass(f32);

    #[derive(Clone, Copy, Debug, Zeroable, Shape)]
    struct Kinematic {
        position: Position,
        velocity: Velocity,
    }

    #[derive(Clone, Copy, Debug, Zeroable, Shape)]
    struct Body {
        kinematic: Kinematic,
        mass: Mass,
    }

    fn assert_contains<S, C, R>()
    where
        C: Component,
        S: ShapeContains<C, R>,
    {
    }

    #[test]
    fn single_component_shape_has_single_bit_mask() {
        assert_eq!(
            Position::mask(),
            ComponentMask::single(Position::component_id())
        );
        assert_eq!(Position::mask().component_count(), 1);
    }

    #[test]
    fn empty_shape_has_empty_mask() {
        assert_eq!(<() as Shape>::mask(), ComponentMask::EMPTY);
        assert!(<() as Shape>::layout().columns().is_empty());
    }

    #[test]
    fn tuple_shape_mask_is_or_of_member_masks() {
        assert_eq!(
            <(Position, Velocity)>::mask(),
            Position::mask() | Velocity::mask()
        );
        assert_eq!(<(Position, Velocity)>::mask().component_count(), 2);
    }

    #[test]
    fn derived_shape_mask_unions_nested_fragments() {
        assert_eq!(Kinematic::mask(), Position::mask() | Velocity::mask());
        assert_eq!(
            Body::mask(),
            Position::mask() | Velocity::mask() | Mass::mask()
        );
        assert_eq!(Body::mask().component_count(), 3);
    }

    #[test]
    fn shape_order_does_not_change_mask_or_layout() {
        assert_eq!(
            <(Position, Velocity)>::mask(),
            <(Velocity, Position)>::mask()
        );

        let a = <(Position, Velocity)>::layout();
        let b = <(Velocity, Position)>::layout();
        let ids_a: Vec<_> = a.columns().iter().map(ColumnSpec::component_id).collect();
        let ids_b: Vec<_> = b.columns().iter().map(ColumnSpec::component_id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn overlapping_fragments_collapse_to_one_column() {
        // `Position` is reachable both directly and through `Kinematic`
        let layout = <(Position, Kinematic)>::layout();
        assert_eq!(layout.columns().len(), 2);
        assert_eq!(
            <(Position, Kinematic)>::mask(),
            Position::mask() | Velocity::mask()
        );
    }

    #[test]
    fn membership_routes_reach_components_at_any_depth() {
        assert_contains::<Position, Position, _>();
        assert_contains::<(Position, Velocity), Velocity, _>();
        assert_contains::<Kinematic, Position, _>();
        assert_contains::<Body, Velocity, _>();
        assert_contains::<(Body, Mass), Position, _>();
    }
}
