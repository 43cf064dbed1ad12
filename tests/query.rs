//! End-to-end tests for view iteration over archetypes.

use bytemuck::{Pod, Zeroable};
use std::collections::HashSet;
use stratum_ecs::{Component, mask_of, world::World};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
struct Position(f32, f32, f32);

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
struct Velocity(f32, f32, f32);

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
struct Health(u32);

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Zeroable, Pod, Component)]
struct Frozen;

const POS: Position = Position(1.0, 2.0, 3.0);
const VEL: Velocity = Velocity(0.1, 0.2, 0.3);

#[test]
fn view_counts_follow_archetype_membership() {
    let mut world = World::new();

    // Two entities with only a position, three with position and
    // velocity
    world.spawn_seeded(POS);
    world.spawn_seeded(POS);
    let moving: Vec<_> = (0..3).map(|_| world.spawn_seeded((POS, VEL))).collect();

    assert_eq!(world.view::<(Position,)>().count(), 5);
    assert_eq!(world.view::<(Position, Velocity)>().count(), 3);
    assert_eq!(world.view::<(Velocity,)>().count(), 3);

    world.despawn(moving[1]).unwrap();

    assert_eq!(world.view::<(Position,)>().count(), 4);
    assert_eq!(world.view::<(Position, Velocity)>().count(), 2);
}

#[test]
fn view_yields_each_matching_entity_exactly_once() {
    let mut world = World::new();
    let mut expected = HashSet::new();
    expected.insert(world.spawn_seeded(POS));
    expected.insert(world.spawn_seeded((POS, VEL)));
    expected.insert(world.spawn_seeded((POS, Health(3))));
    expected.insert(world.spawn_seeded((POS, VEL, Health(5))));
    world.spawn_seeded(Health(1));

    let visited: Vec<_> = world
        .view::<(Position,)>()
        .map(|(entity, _)| entity)
        .collect();
    assert_eq!(visited.len(), expected.len());
    assert_eq!(visited.into_iter().collect::<HashSet<_>>(), expected);
}

#[test]
fn view_references_point_at_current_values() {
    let mut world = World::new();
    let entity = world.spawn_seeded((POS, VEL));
    world
        .set_component(entity, Velocity(9.0, 9.0, 9.0))
        .unwrap();

    let rows: Vec<_> = world.view::<(Position, Velocity)>().collect();
    assert_eq!(rows, vec![(entity, (&POS, &Velocity(9.0, 9.0, 9.0)))]);
}

#[test]
fn empty_query_visits_every_live_entity_once() {
    let mut world = World::new();
    let mut expected = HashSet::new();
    expected.insert(world.spawn_seeded(POS));
    expected.insert(world.spawn_seeded((POS, VEL)));
    expected.insert(world.spawn_seeded(Health(7)));
    let doomed = world.spawn_seeded((Health(0), Frozen));
    world.despawn(doomed).unwrap();

    let visited: Vec<_> = world.view::<()>().map(|(entity, ())| entity).collect();
    assert_eq!(visited.len(), expected.len());
    assert_eq!(visited.into_iter().collect::<HashSet<_>>(), expected);
}

#[test]
fn marker_components_participate_in_queries() {
    let mut world = World::new();
    let frozen = world.spawn_seeded((POS, Frozen));
    world.spawn_seeded(POS);

    let rows: Vec<_> = world.view::<(Position, Frozen)>().collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, frozen);
    assert_eq!(rows[0].1.1, &Frozen);
}

#[test]
fn matched_archetypes_are_exactly_the_indexed_supersets() {
    let mut world = World::new();
    world.spawn_seeded(POS);
    world.spawn_seeded((POS, VEL));
    world.spawn_seeded((POS, Health(1)));
    world.spawn_seeded((POS, VEL, Health(1)));
    world.spawn_seeded(Health(1));

    for query in [
        mask_of!(),
        mask_of!(Position),
        mask_of!(Position, Velocity),
        mask_of!(Health),
        mask_of!(Frozen),
    ] {
        let matched: HashSet<_> = world.archetype_index().supersets_of(query).collect();
        let expected: HashSet<_> = world
            .archetype_masks()
            .iter()
            .copied()
            .filter(|mask| mask.contains_all(&query))
            .collect();
        assert_eq!(matched, expected);

        // Exactly once each
        assert_eq!(
            world.archetype_index().supersets_of(query).count(),
            expected.len()
        );
    }
}

#[test]
fn overlapping_views_agree_on_entity_order_within_an_archetype() {
    let mut world = World::new();
    for i in 0..4 {
        world.spawn_seeded((POS, Velocity(i as f32, 0.0, 0.0)));
    }
    world.spawn_seeded(POS);

    let wide: Vec<_> = world
        .view::<(Position, Velocity)>()
        .map(|(entity, _)| entity)
        .collect();

    // The narrow view visits more entities, but within the shared
    // archetype it must produce the same id sequence
    let narrow: Vec<_> = world
        .view::<(Position,)>()
        .map(|(entity, _)| entity)
        .filter(|entity| wide.contains(entity))
        .collect();

    assert_eq!(narrow, wide);
}

#[test]
fn mask_macro_matches_shape_masks() {
    use stratum_ecs::shape::Shape;

    assert_eq!(mask_of!(), stratum_ecs::archetype::ComponentMask::EMPTY);
    assert_eq!(mask_of!(Position), Position::mask());
    assert_eq!(
        mask_of!(Position, Velocity),
        <(Position, Velocity)>::mask()
    );
    assert_eq!(
        mask_of!(Position, Velocity),
        mask_of!(Velocity, Position)
    );
}
