//! Resource generation, construction progress, food upkeep.
//!
//! All three run on simulated time, never wall clock. Interval timers
//! reset relative to themselves when they fire, so a payout is never
//! double-counted and a partial interval never pays.

use glam::Vec2;

use crate::events::GameEvent;
use crate::stats::{
    builder_speedup, Cost, FOOD_CONSUMPTION_INTERVAL, FOOD_PER_UNIT, RESOURCE_TICK_INTERVAL,
    STARVATION_DAMAGE, WORKER_RANGE,
};
use crate::world::{ConstructionState, EntityId, Faction, Order, WorldState};

/// Advance the economy by `dt` seconds of simulated time.
pub fn tick(world: &mut WorldState, dt: f32) -> Vec<GameEvent> {
    let mut events = Vec::new();
    advance_construction(world, dt, &mut events);
    advance_generation(world, dt, &mut events);
    consume_food(world, dt, &mut events);
    events
}

/// An assigned unit only counts while it stands within [`WORKER_RANGE`]
/// of the building; one still walking in contributes nothing yet.
fn on_site(world: &WorldState, unit: EntityId, building_pos: Vec2) -> bool {
    world
        .units
        .get(&unit)
        .is_some_and(|u| u.pos.distance(building_pos) <= WORKER_RANGE)
}

/// Foundations accrue progress from their assigned, on-site builders.
///
/// The first builder contributes at full rate, each further one at the
/// falloff rate, so more hands always help but never linearly.
fn advance_construction(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    let building_ids = world.sorted_building_ids();
    for id in building_ids {
        let present = {
            let Some(building) = world.buildings.get(&id) else {
                continue;
            };
            let ConstructionState::Foundation { builders, .. } = &building.state else {
                continue;
            };
            let pos = building.pos;
            builders.iter().filter(|&&b| on_site(world, b, pos)).count()
        };
        let speedup = builder_speedup(present);
        if speedup <= 0.0 {
            continue;
        }
        let Some(building) = world.buildings.get_mut(&id) else {
            continue;
        };
        let build_time = building.stats.build_time;
        let ConstructionState::Foundation { progress, builders } = &mut building.state else {
            continue;
        };
        *progress += speedup * dt / build_time;
        if *progress < 1.0 {
            continue;
        }

        let released = builders.clone();
        building.state = ConstructionState::Complete;
        building.health = building.stats.max_health;
        building.generation_clock = 0.0;
        events.push(GameEvent::ConstructionComplete { id });

        for builder_id in released {
            if let Some(unit) = world.units.get_mut(&builder_id) {
                if unit.order == Order::Construct(id) {
                    unit.order = Order::Idle;
                }
            }
        }
    }
}

/// Completed buildings pay out once per generation interval, scaled by
/// the workers actually standing at them.
fn advance_generation(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    let building_ids = world.sorted_building_ids();
    for id in building_ids {
        let Some(building) = world.buildings.get_mut(&id) else {
            continue;
        };
        if !building.is_complete() {
            continue;
        }
        building.generation_clock += dt;
        if building.generation_clock < RESOURCE_TICK_INTERVAL {
            continue;
        }
        // Reset relative to the timer itself. An unstaffed interval is
        // simply forfeited, not banked.
        building.generation_clock %= RESOURCE_TICK_INTERVAL;

        let pos = building.pos;
        let faction = building.faction;
        let generation = building.stats.generation;
        let assigned = building.workers.clone();
        let workers = assigned
            .iter()
            .filter(|&&w| on_site(world, w, pos))
            .count()
            .min(generation.max_workers);
        if workers == 0 {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let amount = generation.per_worker.scaled(workers as f32);
        if amount == Cost::ZERO {
            continue;
        }
        world.faction_mut(faction).pool.credit(amount);
        events.push(GameEvent::ResourcesGenerated {
            building: id,
            faction,
            amount,
        });
    }
}

/// Each faction feeds its units on a fixed cadence; an empty larder means
/// uniform starvation damage instead.
fn consume_food(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    for faction in Faction::BOTH {
        let state = world.faction_mut(faction);
        state.food_clock += dt;
        if state.food_clock < FOOD_CONSUMPTION_INTERVAL {
            continue;
        }
        state.food_clock %= FOOD_CONSUMPTION_INTERVAL;

        let count = world
            .units
            .values()
            .filter(|u| u.faction == faction)
            .count();
        if count == 0 {
            continue;
        }

        let food = world.faction(faction).pool.food;
        if food <= 0.0 {
            for unit in world.units.values_mut() {
                if unit.faction == faction {
                    unit.health -= STARVATION_DAMAGE;
                }
            }
            events.push(GameEvent::Starvation {
                faction,
                affected: count,
            });
        } else {
            #[allow(clippy::cast_precision_loss)]
            let needed = FOOD_PER_UNIT * count as f32;
            let pool = &mut world.faction_mut(faction).pool;
            pool.food = (pool.food - needed).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    use crate::stats::{BuildingKind, StatTable, UnitKind};
    use crate::world::ConstructionState;

    const DT: f32 = 1.0 / 60.0;

    fn run_seconds(world: &mut WorldState, seconds: f32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let ticks = (seconds / DT).round() as u32;
        for _ in 0..ticks {
            events.append(&mut tick(world, DT));
        }
        events
    }

    fn staffed_house(world: &mut WorldState, stats: &StatTable, workers: usize) -> u64 {
        let house = world.place_building(
            stats,
            Faction::Red,
            BuildingKind::House,
            Vec2::new(600.0, 600.0),
            ConstructionState::Complete,
        );
        for _ in 0..workers {
            let w = world.spawn_unit(stats, Faction::Red, UnitKind::Peasant, Vec2::new(590.0, 590.0));
            world.units.get_mut(&w).unwrap().order = Order::Work(house);
            world.buildings.get_mut(&house).unwrap().workers.push(w);
        }
        house
    }

    #[test]
    fn house_with_two_workers_pays_forty_gold_per_interval() {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        staffed_house(&mut world, &stats, 2);
        let start_gold = world.faction(Faction::Red).pool.gold;

        // Partial interval pays nothing.
        run_seconds(&mut world, 4.5);
        assert_eq!(world.faction(Faction::Red).pool.gold, start_gold);

        run_seconds(&mut world, 1.0);
        let gold = world.faction(Faction::Red).pool.gold;
        assert!((gold - start_gold - 40.0).abs() < 1e-3, "gold delta {}", gold - start_gold);
    }

    #[test]
    fn unstaffed_building_generates_nothing() {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        staffed_house(&mut world, &stats, 0);
        let start_gold = world.faction(Faction::Red).pool.gold;
        run_seconds(&mut world, 12.0);
        assert_eq!(world.faction(Faction::Red).pool.gold, start_gold);
    }

    #[test]
    fn a_worker_still_walking_in_does_not_count() {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        let house = world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::House,
            Vec2::new(600.0, 600.0),
            ConstructionState::Complete,
        );
        // Assigned, but far across the map.
        let w = world.spawn_unit(&stats, Faction::Red, UnitKind::Peasant, Vec2::new(1800.0, 1800.0));
        world.units.get_mut(&w).unwrap().order = Order::Work(house);
        world.buildings.get_mut(&house).unwrap().workers.push(w);

        let start_gold = world.faction(Faction::Red).pool.gold;
        run_seconds(&mut world, 12.0);
        assert_eq!(world.faction(Faction::Red).pool.gold, start_gold);

        // Once standing at the house, the next interval pays.
        world.units.get_mut(&w).unwrap().pos = Vec2::new(610.0, 600.0);
        run_seconds(&mut world, 5.1);
        assert!(world.faction(Faction::Red).pool.gold > start_gold);
    }

    #[test]
    fn a_distant_builder_adds_no_progress() {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        let builder =
            world.spawn_unit(&stats, Faction::Red, UnitKind::Peasant, Vec2::new(1800.0, 1800.0));
        let site = world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::Farm,
            Vec2::new(600.0, 600.0),
            ConstructionState::Foundation {
                progress: 0.0,
                builders: vec![builder],
            },
        );
        world.units.get_mut(&builder).unwrap().order = Order::Construct(site);
        run_seconds(&mut world, 5.0);
        let ConstructionState::Foundation { progress, .. } = &world.buildings[&site].state else {
            panic!("site should still be a foundation");
        };
        assert_eq!(*progress, 0.0);
    }

    #[test]
    fn foundation_generates_nothing() {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::House,
            Vec2::new(600.0, 600.0),
            ConstructionState::Foundation {
                progress: 0.5,
                builders: Vec::new(),
            },
        );
        let start = world.faction(Faction::Red).pool;
        run_seconds(&mut world, 11.0);
        assert_eq!(world.faction(Faction::Red).pool.gold, start.gold);
    }

    fn completion_ticks(builders: usize) -> u32 {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        let mut crew = Vec::new();
        for _ in 0..builders {
            crew.push(world.spawn_unit(
                &stats,
                Faction::Red,
                UnitKind::Peasant,
                Vec2::new(590.0, 590.0),
            ));
        }
        let site = world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::Farm,
            Vec2::new(600.0, 600.0),
            ConstructionState::Foundation {
                progress: 0.0,
                builders: crew.clone(),
            },
        );
        for id in crew {
            world.units.get_mut(&id).unwrap().order = Order::Construct(site);
        }
        let mut ticks = 0;
        loop {
            ticks += 1;
            let events = tick(&mut world, DT);
            if events
                .iter()
                .any(|e| matches!(e, GameEvent::ConstructionComplete { .. }))
            {
                return ticks;
            }
            assert!(ticks < 100_000, "construction never finished");
        }
    }

    #[test]
    fn extra_builders_speed_construction_with_diminishing_returns() {
        let one = completion_ticks(1);
        let two = completion_ticks(2);
        let three = completion_ticks(3);
        assert!(two < one);
        assert!(three < two);
        // Marginal saving of the third builder is smaller than the second's.
        assert!(one - two > two - three);
    }

    #[test]
    fn builders_are_released_on_completion() {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        let builder =
            world.spawn_unit(&stats, Faction::Red, UnitKind::Peasant, Vec2::new(590.0, 590.0));
        let site = world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::Farm,
            Vec2::new(600.0, 600.0),
            ConstructionState::Foundation {
                progress: 0.99,
                builders: vec![builder],
            },
        );
        world.units.get_mut(&builder).unwrap().order = Order::Construct(site);
        run_seconds(&mut world, 1.0);
        let building = &world.buildings[&site];
        assert!(building.is_complete());
        assert_eq!(building.health, building.stats.max_health);
        assert_eq!(world.units[&builder].order, Order::Idle);
    }

    #[test]
    fn units_eat_two_food_each_per_interval() {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        for _ in 0..3 {
            world.spawn_unit(&stats, Faction::Red, UnitKind::Peasant, Vec2::new(500.0, 500.0));
        }
        let start_food = world.faction(Faction::Red).pool.food;
        run_seconds(&mut world, 10.1);
        let food = world.faction(Faction::Red).pool.food;
        assert!((start_food - food - 6.0).abs() < 1e-3);
    }

    #[test]
    fn empty_larder_starves_instead_of_going_negative() {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        let a = world.spawn_unit(&stats, Faction::Red, UnitKind::Knight, Vec2::new(500.0, 500.0));
        let b = world.spawn_unit(&stats, Faction::Red, UnitKind::Peasant, Vec2::new(510.0, 500.0));
        world.faction_mut(Faction::Red).pool.food = 0.0;

        let events = run_seconds(&mut world, 10.1);
        assert!(events.contains(&GameEvent::Starvation {
            faction: Faction::Red,
            affected: 2
        }));
        assert_eq!(world.units[&a].health, 150 - STARVATION_DAMAGE);
        assert_eq!(world.units[&b].health, 50 - STARVATION_DAMAGE);
        assert_eq!(world.faction(Faction::Red).pool.food, 0.0);
    }
}
