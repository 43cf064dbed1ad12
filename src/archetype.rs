//! Archetype identity and per-archetype columnar tables.
//!
//! An archetype refers to a specific set of [`Component`] types that
//! an entity can have. All entities with the exact same set of
//! components belong to the same archetype, and their component data
//! lives together in one [`ArchetypeTable`]. The canonical identity
//! of an archetype is its [`ComponentMask`].

use crate::{
    component::{Component, ComponentId, ComponentStorage, MAX_COMPONENT_TYPES},
    shape::{Shape, ShapeLayout},
    world::EntityId,
};
use anyhow::{Result, bail};
use std::{collections::HashMap, fmt};
use stratum_utils::KeyIndexMapper;

/// A set of component types, represented with one bit per dense
/// [`ComponentId`].
///
/// Bit `i` is set iff the component type with id `i` is in the set.
/// Masks are the canonical identity of an archetype: two entity
/// shapes with the same component set produce the same mask and
/// therefore share an archetype table.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentMask(u128);

impl ComponentMask {
    /// The mask of the empty component set.
    pub const EMPTY: Self = Self(0);

    /// The mask containing only the given component id.
    pub fn single(id: ComponentId) -> Self {
        Self(1 << id.as_usize())
    }

    /// Returns this mask with the given component id added.
    #[must_use]
    pub fn with(self, id: ComponentId) -> Self {
        Self(self.0 | (1 << id.as_usize()))
    }

    /// Whether the given component id is in the set.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.0 & (1 << id.as_usize()) != 0
    }

    /// Whether this mask has at least all the bits of `other` set.
    pub fn contains_all(&self, other: &Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The number of component types in the set.
    pub fn component_count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The component ids in the set, in ascending order.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        (0..MAX_COMPONENT_TYPES as u32)
            .filter(|i| self.0 & (1 << i) != 0)
            .map(|i| ComponentId::new(i as u8))
    }

    /// The raw bit pattern of the mask.
    pub fn bits(&self) -> u128 {
        self.0
    }

    pub(crate) fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    /// The value (0 or 1) of bit `i`.
    pub(crate) fn bit(&self, i: u32) -> usize {
        ((self.0 >> i) & 1) as usize
    }
}

impl std::ops::BitOr for ComponentMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ComponentMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMask({:#x})", self.0)
    }
}

/// A table holding the component data belonging to all entities
/// with a specific archetype.
///
/// The component data is conceptually stored as a table in the
/// following manner:
/// ```txt
/// Entity ID |       Components         |
///           | Position  |   Velocity   |
/// -------------------------------------|
///      ID 0 | {x, y, z} | {vx, vy, vz} |
///      ID 1 | {x, y, z} | {vx, vy, vz} |
///      ID 2 | {x, y, z} | {vx, vy, vz} |
/// ```
/// Each column of component data lives in its own
/// [`ComponentStorage`], with values stored in the same row order as
/// the entities in the first column. Since every row insertion and
/// removal touches all columns at once, sibling columns always agree
/// on which entity a given row index refers to, and any subset of
/// columns can be iterated in lockstep by walking the shared row
/// range.
#[derive(Debug)]
pub struct ArchetypeTable {
    mask: ComponentMask,
    /// Maps each entity id to the index of its row in the columns.
    entity_row_mapper: KeyIndexMapper<EntityId>,
    /// Maps each component id to the index of its column in the
    /// `columns` vector.
    column_indices: HashMap<ComponentId, usize>,
    columns: Vec<ComponentStorage>,
}

impl ArchetypeTable {
    /// Initializes an empty table with one column per component in
    /// the given layout.
    pub fn new(layout: &ShapeLayout) -> Self {
        Self {
            mask: layout.mask(),
            entity_row_mapper: KeyIndexMapper::new(),
            column_indices: layout
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, spec)| (spec.component_id(), idx))
                .collect(),
            columns: layout.columns().iter().map(|spec| spec.make_storage()).collect(),
        }
    }

    /// Returns the mask identifying the archetype of the table.
    pub fn mask(&self) -> ComponentMask {
        self.mask
    }

    /// Whether no entities remain in the table.
    pub fn is_empty(&self) -> bool {
        self.entity_row_mapper.is_empty()
    }

    /// The number of entities in the table.
    pub fn entity_count(&self) -> usize {
        self.entity_row_mapper.len()
    }

    /// Whether the entity with the given id has a row in the table.
    pub fn has_entity(&self, entity_id: EntityId) -> bool {
        self.entity_row_mapper.contains_key(entity_id)
    }

    /// All entity ids in the table, in row order. Walking this slice
    /// together with any [`column_slice`](Self::column_slice) of the
    /// table visits each entity's component values at the shared row
    /// index.
    pub fn entity_ids(&self) -> &[EntityId] {
        self.entity_row_mapper.keys()
    }

    /// Appends a row for the given entity, with the component values
    /// provided by the given shape instance.
    ///
    /// # Panics
    /// - If the entity already has a row in the table.
    /// - If the shape does not provide exactly one value for every
    ///   column of the table.
    pub fn add_row<S: Shape>(&mut self, entity_id: EntityId, seed: S) {
        self.entity_row_mapper.push_key(entity_id);
        let row = self.entity_row_mapper.len() - 1;

        let mut writer = RowWriter {
            column_indices: &self.column_indices,
            columns: &mut self.columns,
            row,
        };
        seed.write_components(&mut writer);

        assert!(
            self.columns.iter().all(|column| column.len() == row + 1),
            "Shape did not provide a value for every column of its archetype table"
        );
    }

    /// Removes the row of the entity with the given id from every
    /// column.
    ///
    /// # Errors
    /// Returns an error if the entity has no row in the table.
    pub fn drop_row(&mut self, entity_id: EntityId) -> Result<()> {
        if !self.has_entity(entity_id) {
            bail!("Entity {} has no row in this archetype table", entity_id);
        }
        // The mapper swap removes the key, and each column performs
        // the equivalent swap remove of the data, keeping all columns
        // and the mapper consistent
        let row = self.entity_row_mapper.swap_remove_key(entity_id);
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        Ok(())
    }

    /// Returns a reference to the component of type `C` belonging to
    /// the given entity, or [`None`] if the entity has no row in the
    /// table or the archetype lacks `C`.
    pub fn component<C: Component>(&self, entity_id: EntityId) -> Option<&C> {
        let row = self.entity_row_mapper.get(entity_id)?;
        let column = &self.columns[*self.column_indices.get(&C::component_id())?];
        Some(column.get(row))
    }

    /// Returns a mutable reference to the component of type `C`
    /// belonging to the given entity, or [`None`] if the entity has
    /// no row in the table or the archetype lacks `C`.
    pub fn component_mut<C: Component>(&mut self, entity_id: EntityId) -> Option<&mut C> {
        let row = self.entity_row_mapper.get(entity_id)?;
        let column = &mut self.columns[*self.column_indices.get(&C::component_id())?];
        Some(column.get_mut(row))
    }

    /// Returns the full column of `C` values in row order, or
    /// [`None`] if the archetype lacks `C`.
    pub fn column_slice<C: Component>(&self) -> Option<&[C]> {
        let column = &self.columns[*self.column_indices.get(&C::component_id())?];
        Some(column.slice())
    }
}

/// Writer handed to [`Shape::write_components`] for filling in the
/// component values of one new row.
#[derive(Debug)]
pub struct RowWriter<'a> {
    column_indices: &'a HashMap<ComponentId, usize>,
    columns: &'a mut [ComponentStorage],
    row: usize,
}

impl RowWriter<'_> {
    /// Writes the given value into the `C` column of the row.
    ///
    /// If the row already holds a value for `C` (because the shape
    /// contains the component through more than one fragment), the
    /// existing value is overwritten, so later fragments take
    /// precedence.
    ///
    /// # Panics
    /// If `C` is not one of the component types of the archetype.
    pub fn write<C: Component>(&mut self, value: C) {
        let column_idx = *self
            .column_indices
            .get(&C::component_id())
            .expect("Shape wrote a component that is not part of its archetype");
        let column = &mut self.columns[column_idx];

        if column.len() == self.row + 1 {
            *column.get_mut(self.row) = value;
        } else {
            assert!(
                column.len() == self.row,
                "Archetype table column out of step with its sibling columns"
            );
            column.push(value);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Component;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    struct Position(f32, f32, f32);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    struct Velocity(f32, f32, f32);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
    struct Tagged;

    const POS: Position = Position(1.5, -7.7, 0.1);
    const POS_2: Position = Position(0.0, 1e-5, 0.001);
    const VEL: Velocity = Velocity(0.1, 0.2, 0.3);

    fn entity(id: u64) -> EntityId {
        EntityId::for_test(id)
    }

    fn layout_of<S: Shape>() -> ShapeLayout {
        let mut layout = ShapeLayout::new();
        S::collect_columns(&mut layout);
        layout
    }

    #[test]
    fn empty_mask_contains_nothing() {
        let mask = ComponentMask::EMPTY;
        assert!(mask.is_empty());
        assert_eq!(mask.component_count(), 0);
        assert!(!mask.contains(Position::component_id()));
        assert_eq!(mask.component_ids().count(), 0);
    }

    #[test]
    fn mask_records_inserted_component_ids() {
        let mask = ComponentMask::EMPTY
            .with(Position::component_id())
            .with(Velocity::component_id());

        assert_eq!(mask.component_count(), 2);
        assert!(mask.contains(Position::component_id()));
        assert!(mask.contains(Velocity::component_id()));
        assert!(!mask.contains(Tagged::component_id()));

        let mut ids: Vec<_> = mask.component_ids().collect();
        ids.sort();
        let mut expected = vec![Position::component_id(), Velocity::component_id()];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn mask_superset_relation_is_reflexive_and_ordered() {
        let both = ComponentMask::EMPTY
            .with(Position::component_id())
            .with(Velocity::component_id());
        let only_pos = ComponentMask::single(Position::component_id());

        assert!(both.contains_all(&both));
        assert!(both.contains_all(&only_pos));
        assert!(both.contains_all(&ComponentMask::EMPTY));
        assert!(!only_pos.contains_all(&both));
    }

    #[test]
    fn mask_union_via_bitor_matches_with() {
        let a = ComponentMask::single(Position::component_id());
        let b = ComponentMask::single(Velocity::component_id());
        assert_eq!(
            a | b,
            ComponentMask::EMPTY
                .with(Position::component_id())
                .with(Velocity::component_id())
        );
    }

    #[test]
    fn new_table_is_empty_with_shape_mask() {
        let table = ArchetypeTable::new(&layout_of::<(Position, Velocity)>());
        assert!(table.is_empty());
        assert_eq!(table.entity_count(), 0);
        assert_eq!(table.mask(), <(Position, Velocity)>::mask());
        assert!(table.entity_ids().is_empty());
    }

    #[test]
    fn added_rows_are_retrievable_per_component() {
        let mut table = ArchetypeTable::new(&layout_of::<(Position, Velocity)>());
        table.add_row(entity(0), (POS, VEL));
        table.add_row(entity(1), (POS_2, VEL));

        assert_eq!(table.entity_count(), 2);
        assert!(table.has_entity(entity(0)));
        assert!(table.has_entity(entity(1)));
        assert!(!table.has_entity(entity(2)));

        assert_eq!(table.component::<Position>(entity(0)), Some(&POS));
        assert_eq!(table.component::<Position>(entity(1)), Some(&POS_2));
        assert_eq!(table.component::<Velocity>(entity(1)), Some(&VEL));
    }

    #[test]
    fn component_lookup_outside_archetype_gives_none() {
        let mut table = ArchetypeTable::new(&layout_of::<(Position,)>());
        table.add_row(entity(0), (POS,));
        assert_eq!(table.component::<Velocity>(entity(0)), None);
        assert_eq!(table.component::<Position>(entity(7)), None);
    }

    #[test]
    #[should_panic]
    fn adding_row_for_existing_entity_fails() {
        let mut table = ArchetypeTable::new(&layout_of::<(Position,)>());
        table.add_row(entity(0), (POS,));
        table.add_row(entity(0), (POS,));
    }

    #[test]
    fn dropping_row_removes_entity_from_every_column() {
        let mut table = ArchetypeTable::new(&layout_of::<(Position, Velocity)>());
        table.add_row(entity(0), (POS, VEL));
        table.add_row(entity(1), (POS_2, VEL));

        table.drop_row(entity(0)).unwrap();
        assert!(!table.has_entity(entity(0)));
        assert!(table.has_entity(entity(1)));
        assert_eq!(table.entity_count(), 1);
        assert_eq!(table.column_slice::<Position>().unwrap(), &[POS_2]);
        assert_eq!(table.column_slice::<Velocity>().unwrap(), &[VEL]);

        table.drop_row(entity(1)).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn dropping_missing_row_fails() {
        let mut table = ArchetypeTable::new(&layout_of::<(Position,)>());
        table.add_row(entity(0), (POS,));
        assert!(table.drop_row(entity(1)).is_err());
        table.drop_row(entity(0)).unwrap();
        assert!(table.drop_row(entity(0)).is_err());
    }

    #[test]
    fn modifying_component_value_works() {
        let mut table = ArchetypeTable::new(&layout_of::<(Position, Velocity)>());
        table.add_row(entity(3), (POS, VEL));
        *table.component_mut::<Position>(entity(3)).unwrap() = POS_2;
        assert_eq!(table.component::<Position>(entity(3)), Some(&POS_2));
        assert_eq!(table.component::<Velocity>(entity(3)), Some(&VEL));
    }

    #[test]
    fn columns_stay_in_lockstep_after_removals() {
        let mut table = ArchetypeTable::new(&layout_of::<(Position, Velocity)>());
        table.add_row(entity(0), (Position(0.0, 0.0, 0.0), Velocity(0.0, 0.0, 0.0)));
        table.add_row(entity(1), (Position(1.0, 0.0, 0.0), Velocity(0.0, 1.0, 0.0)));
        table.add_row(entity(2), (Position(2.0, 0.0, 0.0), Velocity(0.0, 2.0, 0.0)));

        table.drop_row(entity(0)).unwrap();

        let entity_ids = table.entity_ids();
        let positions = table.column_slice::<Position>().unwrap();
        let velocities = table.column_slice::<Velocity>().unwrap();
        assert_eq!(entity_ids.len(), 2);
        assert_eq!(positions.len(), 2);
        assert_eq!(velocities.len(), 2);

        for (idx, id) in entity_ids.iter().enumerate() {
            assert_eq!(table.component::<Position>(*id), Some(&positions[idx]));
            assert_eq!(table.component::<Velocity>(*id), Some(&velocities[idx]));
        }
    }

    #[test]
    fn marker_components_occupy_rows_without_bytes() {
        let mut table = ArchetypeTable::new(&layout_of::<(Position, Tagged)>());
        table.add_row(entity(0), (POS, Tagged));
        table.add_row(entity(1), (POS_2, Tagged));

        assert_eq!(table.column_slice::<Tagged>().unwrap().len(), 2);
        assert_eq!(table.component::<Tagged>(entity(1)), Some(&Tagged));

        table.drop_row(entity(0)).unwrap();
        assert_eq!(table.column_slice::<Tagged>().unwrap().len(), 1);
    }
}
