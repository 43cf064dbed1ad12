//! Component identity and type-erased column storage.

use bytemuck::Pod;
use lazy_static::lazy_static;
use std::{collections::HashMap, mem, ptr::NonNull, slice};
use stratum_utils::{AlignedByteVec, Alignment};

/// The maximum number of distinct component types a program may
/// register. Bounded so that a component set always fits in a
/// 128-bit mask and per-component lookup structures can be fixed
/// size.
pub const MAX_COMPONENT_TYPES: usize = 128;

/// Represents a component.
///
/// Components are plain data structures representing a potential
/// attribute an entity can have. Examples could be position,
/// velocity or temperature.
///
/// Components can only contain "Plain Old Data", meaning primitive
/// types excluding references. The `Component` trait can be derived
/// for any non-generic type that implements [`Pod`].
///
/// # Example
/// ```
/// # use stratum_ecs_macros::ComponentDoctest as Component;
/// # use bytemuck::{Zeroable, Pod};
/// #
/// #[repr(C)] // Required for `Pod`
/// #[derive(Clone, Copy, Zeroable, Pod, Component)]
/// struct Transform {
///     matrix: [[f32; 4]; 4],
/// }
/// ```
pub trait Component: Pod {
    /// A tag identifying the component type, stable across program
    /// runs (a hash of the full type path).
    const COMPONENT_TAG: ComponentTag;

    /// Returns the dense id assigned to this component type by the
    /// global component registry.
    fn component_id() -> ComponentId {
        registry().dense_id(Self::COMPONENT_TAG)
    }
}

/// Stable identifier for a component type, computed at compile time
/// as the FNV-1a hash of the full type path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTag(u64);

impl ComponentTag {
    /// Wraps the given hash value in a [`ComponentTag`].
    pub const fn from_u64(hash: u64) -> Self {
        Self(hash)
    }

    /// The underlying hash value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Dense runtime id of a component type, in
/// `[0, MAX_COMPONENT_TYPES)`.
///
/// Ids are assigned contiguously from zero, ordered by
/// [`ComponentTag`], so the assignment does not depend on the order
/// in which component types are first used.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u8);

impl ComponentId {
    pub(crate) fn new(id: u8) -> Self {
        Self(id)
    }

    /// The id as an index into per-component lookup structures.
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Registration record for a component type, collected from every
/// `#[derive(Component)]` in the program.
#[derive(Debug)]
pub struct ComponentDescriptor {
    tag: ComponentTag,
    name: &'static str,
}

impl ComponentDescriptor {
    /// Creates the descriptor for the component type `C`.
    pub const fn new<C: Component>(name: &'static str) -> Self {
        Self {
            tag: C::COMPONENT_TAG,
            name,
        }
    }
}

inventory::collect!(ComponentDescriptor);

/// The global registry mapping component tags to dense ids.
#[derive(Debug)]
struct ComponentRegistry {
    ids_by_tag: HashMap<ComponentTag, ComponentId>,
    names: Vec<&'static str>,
}

lazy_static! {
    static ref COMPONENT_REGISTRY: ComponentRegistry = ComponentRegistry::build();
}

fn registry() -> &'static ComponentRegistry {
    &COMPONENT_REGISTRY
}

impl ComponentRegistry {
    fn build() -> Self {
        let mut descriptors: Vec<&ComponentDescriptor> =
            inventory::iter::<ComponentDescriptor>.into_iter().collect();
        descriptors.sort_by_key(|descriptor| descriptor.tag);

        assert!(
            descriptors.len() <= MAX_COMPONENT_TYPES,
            "Program registered {} component types, the maximum is {}",
            descriptors.len(),
            MAX_COMPONENT_TYPES
        );

        for pair in descriptors.windows(2) {
            assert!(
                pair[0].tag != pair[1].tag,
                "Component tag collision between `{}` and `{}`",
                pair[0].name,
                pair[1].name
            );
        }

        let ids_by_tag = descriptors
            .iter()
            .enumerate()
            .map(|(idx, descriptor)| (descriptor.tag, ComponentId::new(idx as u8)))
            .collect();
        let names = descriptors
            .iter()
            .map(|descriptor| descriptor.name)
            .collect();

        Self { ids_by_tag, names }
    }

    fn dense_id(&self, tag: ComponentTag) -> ComponentId {
        *self
            .ids_by_tag
            .get(&tag)
            .expect("Component type not present in the global registry")
    }
}

/// Returns the number of component types registered in the program.
pub fn registered_component_count() -> usize {
    registry().names.len()
}

/// Returns the full path of the component type with the given id.
///
/// # Panics
/// If no component type has the given id.
pub fn component_name(id: ComponentId) -> &'static str {
    registry().names[id.as_usize()]
}

/// Container storing the values of one component type for all
/// entities of one archetype, densely packed in memory and indexed
/// by row, without exposing the component type in its signature.
#[derive(Debug)]
pub struct ComponentStorage {
    component_id: ComponentId,
    component_size: usize,
    len: usize,
    bytes: AlignedByteVec,
}

impl ComponentStorage {
    /// Initializes an empty storage for components with the given
    /// id, size and alignment.
    pub fn new(component_id: ComponentId, component_size: usize, alignment: Alignment) -> Self {
        Self {
            component_id,
            component_size,
            len: 0,
            bytes: AlignedByteVec::new(alignment),
        }
    }

    /// Initializes an empty storage for instances of the component
    /// type `C`.
    pub fn for_component<C: Component>() -> Self {
        Self::new(C::component_id(), mem::size_of::<C>(), Alignment::of::<C>())
    }

    /// Returns the id of the component type held by the storage.
    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    /// Returns the number of stored component values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the storage holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a slice of all stored components.
    ///
    /// # Panics
    /// If `C` is not the component type the storage was initialized
    /// with.
    pub fn slice<C: Component>(&self) -> &[C] {
        self.validate_component::<C>();
        if mem::size_of::<C>() == 0 {
            // SAFETY:
            // A dangling but aligned pointer is valid for slices of
            // zero-sized values, and `self.len` counts exactly the
            // values pushed into this storage.
            unsafe { slice::from_raw_parts(NonNull::<C>::dangling().as_ptr(), self.len) }
        } else {
            bytemuck::cast_slice(&self.bytes)
        }
    }

    /// Returns a mutable slice of all stored components.
    ///
    /// # Panics
    /// If `C` is not the component type the storage was initialized
    /// with.
    pub fn slice_mut<C: Component>(&mut self) -> &mut [C] {
        self.validate_component::<C>();
        if mem::size_of::<C>() == 0 {
            // SAFETY: see `slice`
            unsafe { slice::from_raw_parts_mut(NonNull::<C>::dangling().as_ptr(), self.len) }
        } else {
            bytemuck::cast_slice_mut(&mut self.bytes)
        }
    }

    /// Returns a reference to the component value at the given row.
    ///
    /// # Panics
    /// - If `C` is not the component type the storage was initialized
    ///   with.
    /// - If `row` is out of bounds.
    pub fn get<C: Component>(&self, row: usize) -> &C {
        &self.slice::<C>()[row]
    }

    /// Returns a mutable reference to the component value at the
    /// given row.
    ///
    /// # Panics
    /// - If `C` is not the component type the storage was initialized
    ///   with.
    /// - If `row` is out of bounds.
    pub fn get_mut<C: Component>(&mut self, row: usize) -> &mut C {
        &mut self.slice_mut::<C>()[row]
    }

    /// Appends the given component value to the end of the storage.
    ///
    /// # Panics
    /// If `C` is not the component type the storage was initialized
    /// with.
    pub fn push<C: Component>(&mut self, component: C) {
        self.validate_component::<C>();
        self.bytes.extend_from_slice(bytemuck::bytes_of(&component));
        self.len += 1;
    }

    /// Removes the value at the given row and makes the last value
    /// take its place (unless the one to remove is the last one).
    ///
    /// # Panics
    /// If `row` is out of bounds.
    pub fn swap_remove(&mut self, row: usize) {
        assert!(row < self.len, "Row for component storage out of bounds");

        let last_row = self.len - 1;
        if self.component_size > 0 && row < last_row {
            let row_start = row * self.component_size;
            let last_start = last_row * self.component_size;
            let base = self.bytes.as_mut_slice().as_mut_ptr();
            unsafe {
                // SAFETY:
                // Both ranges lie within the buffer and cannot overlap
                // since `row < last_row`
                std::ptr::copy_nonoverlapping::<u8>(
                    base.add(last_start),
                    base.add(row_start),
                    self.component_size,
                );
            }
        }
        self.bytes.truncate(last_row * self.component_size);
        self.len = last_row;
    }

    fn validate_component<C: Component>(&self) {
        assert!(
            C::component_id() == self.component_id && mem::size_of::<C>() == self.component_size,
            "Tried to use component storage with invalid component"
        );
    }
}
