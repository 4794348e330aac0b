//! Property tests over the arithmetic invariants of the simulation.

use glam::Vec2;

use siege_core::combat::damage_after_defense;
use siege_core::command::{apply_command, Command};
use siege_core::events::GameEvent;
use siege_core::prelude::*;
use siege_core::stats::DECONSTRUCT_REFUND;
use siege_core::world::ConstructionState;
use siege_test_utils::proptest::prelude::*;
use siege_test_utils::strategies;

proptest! {
    #[test]
    fn damage_is_always_at_least_one((attack, defense) in strategies::attack_defense()) {
        let damage = damage_after_defense(attack, defense);
        prop_assert!(damage >= 1);
        if attack > defense {
            prop_assert_eq!(damage, attack - defense);
        }
    }

    #[test]
    fn refund_is_exactly_prorated(
        kind in strategies::placeable_building_kind(),
        health_fraction in 0.01f32..=1.0,
    ) {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        let id = world.place_building(
            &stats,
            Faction::Red,
            kind,
            Vec2::new(1000.0, 1000.0),
            ConstructionState::Complete,
        );
        let max_health = world.buildings[&id].stats.max_health;
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let health = ((max_health as f32) * health_fraction).max(1.0) as i32;
        world.buildings.get_mut(&id).unwrap().health = health;

        let before = world.faction(Faction::Red).pool;
        let events =
            apply_command(&mut world, &stats, Faction::Red, &Command::Deconstruct(id)).unwrap();
        let after = world.faction(Faction::Red).pool;

        #[allow(clippy::cast_precision_loss)]
        let fraction = health as f32 / max_health as f32;
        let expected = stats.building_cost(kind).scaled(DECONSTRUCT_REFUND * fraction);
        prop_assert!((after.gold - before.gold - expected.gold).abs() < 1e-3);
        prop_assert!((after.food - before.food - expected.food).abs() < 1e-3);
        prop_assert!((after.wood - before.wood - expected.wood).abs() < 1e-3);
        prop_assert!(!world.buildings.contains_key(&id));
        let deconstructed = matches!(events[0], GameEvent::BuildingDeconstructed { .. });
        prop_assert!(deconstructed);
    }

    #[test]
    fn placement_never_goes_negative(
        kind in strategies::placeable_building_kind(),
        pos in strategies::map_point(),
        faction in strategies::faction(),
    ) {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        // Whether it is accepted or rejected, the pool stays non-negative.
        let _ = apply_command(&mut world, &stats, faction, &Command::PlaceBuilding(kind, pos));
        let pool = world.faction(faction).pool;
        prop_assert!(pool.gold >= 0.0 && pool.food >= 0.0 && pool.wood >= 0.0);
    }

    #[test]
    fn train_then_stop_is_idempotent(kind in strategies::unit_kind()) {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::Castle,
            Vec2::new(300.0, 300.0),
            ConstructionState::Complete,
        );
        // Cannon needs wood the default pool covers; everything trainable.
        apply_command(&mut world, &stats, Faction::Red, &Command::TrainUnit(kind)).unwrap();
        let id = *world.units.keys().next().unwrap();
        for _ in 0..3 {
            apply_command(
                &mut world,
                &stats,
                Faction::Red,
                &Command::Stop { units: vec![id] },
            )
            .unwrap();
            prop_assert_eq!(world.units[&id].order, Order::Idle);
        }
    }
}
