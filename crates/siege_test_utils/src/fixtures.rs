//! Fixture builders for common world setups.

use glam::Vec2;

use siege_core::prelude::*;
use siege_core::world::ConstructionState;

/// A standard two-castle match with the default table and a fixed seed.
#[must_use]
pub fn standard_match() -> Simulation {
    Simulation::standard_match(StatTable::standard(), 0xC0FFEE)
}

/// An empty world wrapped in a simulation, for targeted system tests.
#[must_use]
pub fn empty_sim() -> Simulation {
    Simulation::new(StatTable::standard(), 0xC0FFEE)
}

/// Drive `sim` forward by whole seconds of simulated time with no input.
pub fn run_seconds(sim: &mut Simulation, seconds: f32) -> Vec<GameEvent> {
    let mut all = Vec::new();
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let ticks = (seconds * TICK_RATE as f32).round() as u64;
    for _ in 0..ticks {
        all.append(&mut sim.tick(&[]).events);
    }
    all
}

/// Place a completed building directly into a world, skipping the
/// foundation phase. Test setup only.
pub fn completed_building(
    world: &mut WorldState,
    stats: &StatTable,
    faction: Faction,
    kind: BuildingKind,
    pos: Vec2,
) -> EntityId {
    world.place_building(stats, faction, kind, pos, ConstructionState::Complete)
}

/// A fully crewed tower: the tower plus the minimum workers it needs to
/// fire, already assigned.
pub fn crewed_tower(
    world: &mut WorldState,
    stats: &StatTable,
    faction: Faction,
    pos: Vec2,
) -> EntityId {
    let tower = completed_building(world, stats, faction, BuildingKind::Tower, pos);
    for i in 0..stats.tower().min_crew {
        #[allow(clippy::cast_precision_loss)]
        let offset = Vec2::new(0.0, 30.0 + i as f32);
        let crew = world.spawn_unit(stats, faction, UnitKind::Peasant, pos + offset);
        if let Some(unit) = world.units.get_mut(&crew) {
            unit.order = Order::Work(tower);
        }
        if let Some(building) = world.buildings.get_mut(&tower) {
            building.workers.push(crew);
        }
    }
    tower
}
