//! Proptest strategies over core game types.

use glam::Vec2;
use proptest::prelude::*;

use siege_core::prelude::*;
use siege_core::stats::{MAP_MARGIN, MAP_SIZE};

/// Any unit kind.
pub fn unit_kind() -> impl Strategy<Value = UnitKind> {
    prop_oneof![
        Just(UnitKind::Peasant),
        Just(UnitKind::Knight),
        Just(UnitKind::Cavalry),
        Just(UnitKind::Cannon),
    ]
}

/// Any placeable (non-castle) building kind.
pub fn placeable_building_kind() -> impl Strategy<Value = BuildingKind> {
    prop_oneof![
        Just(BuildingKind::House),
        Just(BuildingKind::Farm),
        Just(BuildingKind::Tower),
    ]
}

/// Either faction.
pub fn faction() -> impl Strategy<Value = Faction> {
    prop_oneof![Just(Faction::Red), Just(Faction::Blue)]
}

/// A point inside the playable map area.
pub fn map_point() -> impl Strategy<Value = Vec2> {
    let range = MAP_MARGIN..=(MAP_SIZE - MAP_MARGIN);
    (range.clone(), range).prop_map(|(x, y)| Vec2::new(x, y))
}

/// Plausible attack and defense values, including extremes where defense
/// dwarfs attack.
pub fn attack_defense() -> impl Strategy<Value = (i32, i32)> {
    (0..500i32, 0..500i32)
}
