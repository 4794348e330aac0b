//! The command protocol and its validation.
//!
//! Commands are the only mutation surface of the world. The local player,
//! the AI opponent and the remote peer all funnel through [`apply_command`],
//! so every actor has exactly the same capabilities and every mutation is
//! validated the same way.
//!
//! Rejections are not errors: nothing was mutated, the issuer is told why,
//! and the tick carries on. Commands that reference an entity which no
//! longer exists are a silent no-op — under command/death races inside a
//! tick that is expected, not exceptional.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::events::GameEvent;
use crate::stats::{BuildingKind, StatTable, UnitKind, DECONSTRUCT_REFUND, MAP_MARGIN, MAP_SIZE};
use crate::world::{ConstructionState, EntityId, Faction, Order, WorldState};

/// A player or AI intent, applied against the world after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Train a unit at the faction's castle. Cost is debited on
    /// acceptance; training is instantaneous.
    TrainUnit(UnitKind),
    /// Pay for and place a foundation at a point.
    PlaceBuilding(BuildingKind, Vec2),
    /// Send a peasant to build a foundation.
    AssignBuilder {
        /// The peasant.
        unit: EntityId,
        /// The foundation to build.
        building: EntityId,
    },
    /// Put a peasant into a completed building's worker slot.
    AssignWorker {
        /// The peasant.
        unit: EntityId,
        /// The building to staff.
        building: EntityId,
    },
    /// Walk units to a point, ignoring enemies en route.
    Move {
        /// Units to move.
        units: Vec<EntityId>,
        /// Destination.
        dest: Vec2,
    },
    /// Walk units to a point, engaging opportunistically en route.
    AttackMove {
        /// Units to move.
        units: Vec<EntityId>,
        /// Destination.
        dest: Vec2,
    },
    /// Order units onto a specific enemy target.
    Attack {
        /// Attacking units.
        units: Vec<EntityId>,
        /// Enemy unit or building.
        target: EntityId,
    },
    /// Clear orders back to idle. Idempotent.
    Stop {
        /// Units to halt.
        units: Vec<EntityId>,
    },
    /// Tear down an owned, completed, non-castle building for a partial
    /// refund.
    Deconstruct(EntityId),
}

/// Why a command was dropped without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RejectReason {
    /// The faction's pool does not cover the cost.
    #[error("insufficient resources")]
    InsufficientResources,
    /// The faction has no standing castle to train at.
    #[error("no castle")]
    NoCastle,
    /// Placement overlaps an existing building or leaves the map.
    #[error("invalid placement")]
    OccupiedGround,
    /// Only peasants build and work.
    #[error("unit is not a peasant")]
    NotAPeasant,
    /// Builder assignment needs a foundation.
    #[error("building is not under construction")]
    NotAFoundation,
    /// Worker assignment and deconstruction need a completed building.
    #[error("building is not complete")]
    NotComplete,
    /// All worker slots are taken.
    #[error("worker slots full")]
    WorkerSlotsFull,
    /// Castles can be neither placed nor deconstructed.
    #[error("castles cannot be placed or torn down")]
    CastleProtected,
    /// The referenced entity belongs to someone else.
    #[error("entity not owned by issuer")]
    NotOwned,
    /// The match has already been decided.
    #[error("match is over")]
    MatchOver,
}

/// Validate and apply one command for `faction`.
///
/// On acceptance the world is mutated and the resulting events returned.
/// On rejection nothing was mutated.
///
/// # Errors
///
/// Returns the [`RejectReason`] when validation fails.
pub fn apply_command(
    world: &mut WorldState,
    stats: &StatTable,
    faction: Faction,
    command: &Command,
) -> Result<Vec<GameEvent>, RejectReason> {
    if world.winner.is_some() {
        return Err(RejectReason::MatchOver);
    }

    match command {
        Command::TrainUnit(kind) => train_unit(world, stats, faction, *kind),
        Command::PlaceBuilding(kind, pos) => place_building(world, stats, faction, *kind, *pos),
        Command::AssignBuilder { unit, building } => {
            assign_builder(world, faction, *unit, *building)
        }
        Command::AssignWorker { unit, building } => {
            assign_worker(world, faction, *unit, *building)
        }
        Command::Move { units, dest } => {
            order_units(world, faction, units, Order::MoveTo(*dest));
            Ok(Vec::new())
        }
        Command::AttackMove { units, dest } => {
            order_units(world, faction, units, Order::AttackMove(*dest));
            Ok(Vec::new())
        }
        Command::Attack { units, target } => {
            attack_target(world, faction, units, *target);
            Ok(Vec::new())
        }
        Command::Stop { units } => {
            order_units(world, faction, units, Order::Idle);
            Ok(Vec::new())
        }
        Command::Deconstruct(building) => deconstruct(world, stats, faction, *building),
    }
}

fn train_unit(
    world: &mut WorldState,
    stats: &StatTable,
    faction: Faction,
    kind: UnitKind,
) -> Result<Vec<GameEvent>, RejectReason> {
    if world.castle_of(faction).is_none() {
        return Err(RejectReason::NoCastle);
    }
    let cost = stats.unit_cost(kind);
    if !world.faction(faction).pool.can_afford(cost) {
        return Err(RejectReason::InsufficientResources);
    }
    world.faction_mut(faction).pool.spend(cost);
    let id = world
        .spawn_unit_at_castle(stats, faction, kind)
        .ok_or(RejectReason::NoCastle)?;
    Ok(vec![GameEvent::UnitTrained { id, faction, kind }])
}

fn place_building(
    world: &mut WorldState,
    stats: &StatTable,
    faction: Faction,
    kind: BuildingKind,
    pos: Vec2,
) -> Result<Vec<GameEvent>, RejectReason> {
    if kind == BuildingKind::Castle {
        return Err(RejectReason::CastleProtected);
    }
    let building_stats = stats.building(kind);
    let inside = pos.x >= MAP_MARGIN
        && pos.y >= MAP_MARGIN
        && pos.x <= MAP_SIZE - MAP_MARGIN
        && pos.y <= MAP_SIZE - MAP_MARGIN;
    if !inside {
        return Err(RejectReason::OccupiedGround);
    }
    // Axis-aligned square footprints: two buildings intersect when their
    // centres are closer than the sum of half-extents on both axes.
    let overlaps = world.buildings.values().any(|b| {
        let gap = b.stats.half_extent() + building_stats.half_extent();
        let delta = (b.pos - pos).abs();
        delta.x < gap && delta.y < gap
    });
    if overlaps {
        return Err(RejectReason::OccupiedGround);
    }
    let cost = stats.building_cost(kind);
    if !world.faction(faction).pool.can_afford(cost) {
        return Err(RejectReason::InsufficientResources);
    }
    world.faction_mut(faction).pool.spend(cost);
    let id = world.place_building(
        stats,
        faction,
        kind,
        pos,
        ConstructionState::Foundation {
            progress: 0.0,
            builders: Vec::new(),
        },
    );
    Ok(vec![GameEvent::BuildingPlaced { id, faction, kind }])
}

fn assign_builder(
    world: &mut WorldState,
    faction: Faction,
    unit_id: EntityId,
    building_id: EntityId,
) -> Result<Vec<GameEvent>, RejectReason> {
    // Missing entities are a race, not a rejection.
    let Some(unit) = world.units.get(&unit_id) else {
        return Ok(Vec::new());
    };
    if !world.buildings.contains_key(&building_id) {
        return Ok(Vec::new());
    }
    if unit.faction != faction {
        return Err(RejectReason::NotOwned);
    }
    if unit.kind != UnitKind::Peasant {
        return Err(RejectReason::NotAPeasant);
    }
    let building = &world.buildings[&building_id];
    if building.faction != faction {
        return Err(RejectReason::NotOwned);
    }
    match &building.state {
        ConstructionState::Complete => Err(RejectReason::NotAFoundation),
        ConstructionState::Foundation { builders, .. } => {
            if builders.contains(&unit_id) {
                // Re-issuing is a no-op.
                return Ok(Vec::new());
            }
            detach_from_buildings(world, unit_id);
            if let Some(b) = world.buildings.get_mut(&building_id) {
                if let ConstructionState::Foundation { builders, .. } = &mut b.state {
                    builders.push(unit_id);
                }
            }
            if let Some(u) = world.units.get_mut(&unit_id) {
                u.order = Order::Construct(building_id);
            }
            Ok(Vec::new())
        }
    }
}

fn assign_worker(
    world: &mut WorldState,
    faction: Faction,
    unit_id: EntityId,
    building_id: EntityId,
) -> Result<Vec<GameEvent>, RejectReason> {
    let Some(unit) = world.units.get(&unit_id) else {
        return Ok(Vec::new());
    };
    let Some(building) = world.buildings.get(&building_id) else {
        return Ok(Vec::new());
    };
    if unit.faction != faction || building.faction != faction {
        return Err(RejectReason::NotOwned);
    }
    if unit.kind != UnitKind::Peasant {
        return Err(RejectReason::NotAPeasant);
    }
    if !building.is_complete() {
        return Err(RejectReason::NotComplete);
    }
    if building.workers.contains(&unit_id) {
        return Ok(Vec::new());
    }
    if building.workers.len() >= building.stats.generation.max_workers {
        return Err(RejectReason::WorkerSlotsFull);
    }
    detach_from_buildings(world, unit_id);
    if let Some(b) = world.buildings.get_mut(&building_id) {
        b.workers.push(unit_id);
    }
    if let Some(u) = world.units.get_mut(&unit_id) {
        u.order = Order::Work(building_id);
    }
    Ok(Vec::new())
}

fn deconstruct(
    world: &mut WorldState,
    stats: &StatTable,
    faction: Faction,
    building_id: EntityId,
) -> Result<Vec<GameEvent>, RejectReason> {
    let Some(building) = world.buildings.get(&building_id) else {
        return Ok(Vec::new());
    };
    if building.faction != faction {
        return Err(RejectReason::NotOwned);
    }
    if building.kind == BuildingKind::Castle {
        return Err(RejectReason::CastleProtected);
    }
    if !building.is_complete() {
        return Err(RejectReason::NotComplete);
    }

    #[allow(clippy::cast_precision_loss)]
    let health_fraction = building.health as f32 / building.stats.max_health as f32;
    let refund = stats
        .building_cost(building.kind)
        .scaled(DECONSTRUCT_REFUND * health_fraction);
    world.faction_mut(faction).pool.credit(refund);
    world.buildings.remove(&building_id);

    // Anyone working or building here goes back to idle right away.
    for unit in world.units.values_mut() {
        match unit.order {
            Order::Work(b) | Order::Construct(b) if b == building_id => {
                unit.order = Order::Idle;
            }
            _ => {}
        }
    }

    Ok(vec![GameEvent::BuildingDeconstructed {
        id: building_id,
        refund,
    }])
}

fn order_units(world: &mut WorldState, faction: Faction, units: &[EntityId], order: Order) {
    for &id in units {
        let owned = world
            .units
            .get(&id)
            .is_some_and(|u| u.faction == faction);
        if !owned {
            continue;
        }
        detach_from_buildings(world, id);
        if let Some(unit) = world.units.get_mut(&id) {
            unit.order = order;
        }
    }
}

fn attack_target(world: &mut WorldState, faction: Faction, units: &[EntityId], target: EntityId) {
    let target_is_enemy = world
        .units
        .get(&target)
        .map(|u| u.faction)
        .or_else(|| world.buildings.get(&target).map(|b| b.faction))
        .is_some_and(|f| f != faction);
    if !target_is_enemy {
        return;
    }
    order_units(
        world,
        faction,
        units,
        Order::Attack {
            target,
            resume: None,
        },
    );
}

/// Remove a unit from any builder or worker list it currently occupies.
fn detach_from_buildings(world: &mut WorldState, unit_id: EntityId) {
    for building in world.buildings.values_mut() {
        building.workers.retain(|&id| id != unit_id);
        if let ConstructionState::Foundation { builders, .. } = &mut building.state {
            builders.retain(|&id| id != unit_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::STARTING_POOL;

    fn world_with_castle(faction: Faction) -> (StatTable, WorldState) {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        world.place_building(
            &stats,
            faction,
            BuildingKind::Castle,
            Vec2::new(300.0, 300.0),
            ConstructionState::Complete,
        );
        (stats, world)
    }

    #[test]
    fn train_debits_pool_and_spawns() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        let events =
            apply_command(&mut world, &stats, Faction::Red, &Command::TrainUnit(UnitKind::Peasant))
                .unwrap();
        assert!(matches!(events[0], GameEvent::UnitTrained { .. }));
        assert_eq!(world.units.len(), 1);
        let pool = world.faction(Faction::Red).pool;
        assert_eq!(pool.gold, STARTING_POOL.gold - 50.0);
        assert_eq!(pool.food, STARTING_POOL.food - 25.0);
    }

    #[test]
    fn train_without_castle_is_rejected() {
        let stats = StatTable::standard();
        let mut world = WorldState::new(1);
        let err =
            apply_command(&mut world, &stats, Faction::Red, &Command::TrainUnit(UnitKind::Knight))
                .unwrap_err();
        assert_eq!(err, RejectReason::NoCastle);
    }

    #[test]
    fn place_building_debits_exact_cost() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::PlaceBuilding(BuildingKind::House, Vec2::new(800.0, 800.0)),
        )
        .unwrap();
        let pool = world.faction(Faction::Red).pool;
        assert_eq!(pool.gold, 400.0);
        assert_eq!(pool.food, 200.0);
        assert_eq!(pool.wood, 250.0);
    }

    #[test]
    fn second_house_allowed_while_first_is_a_foundation() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::PlaceBuilding(BuildingKind::House, Vec2::new(800.0, 800.0)),
        )
        .unwrap();
        // Affordability is the only gate; construction state of the first
        // house is irrelevant.
        apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::PlaceBuilding(BuildingKind::House, Vec2::new(1200.0, 800.0)),
        )
        .unwrap();
        let pool = world.faction(Faction::Red).pool;
        assert_eq!(pool.gold, 300.0);
        assert_eq!(pool.wood, 200.0);
    }

    #[test]
    fn overlapping_placement_is_rejected() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::PlaceBuilding(BuildingKind::House, Vec2::new(800.0, 800.0)),
        )
        .unwrap();
        let err = apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::PlaceBuilding(BuildingKind::House, Vec2::new(810.0, 800.0)),
        )
        .unwrap_err();
        assert_eq!(err, RejectReason::OccupiedGround);
    }

    #[test]
    fn placement_uses_square_footprints() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::PlaceBuilding(BuildingKind::House, Vec2::new(800.0, 800.0)),
        )
        .unwrap();
        // Diagonal neighbour whose centre is over 100 units away, yet the
        // two 80-unit squares still overlap at the corner.
        let err = apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::PlaceBuilding(BuildingKind::House, Vec2::new(875.0, 875.0)),
        )
        .unwrap_err();
        assert_eq!(err, RejectReason::OccupiedGround);
        // Shift to exactly one full side length on both axes: the squares
        // meet edge to edge and the placement fits.
        apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::PlaceBuilding(BuildingKind::House, Vec2::new(880.0, 880.0)),
        )
        .unwrap();
    }

    #[test]
    fn deconstruct_castle_is_always_rejected() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        let castle_id = world.castle_of(Faction::Red).unwrap().id;
        let err = apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::Deconstruct(castle_id),
        )
        .unwrap_err();
        assert_eq!(err, RejectReason::CastleProtected);
    }

    #[test]
    fn deconstruct_refund_is_health_prorated() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        let id = world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::House,
            Vec2::new(800.0, 800.0),
            ConstructionState::Complete,
        );
        // Half health: 0.7 * cost * 0.5.
        world.buildings.get_mut(&id).unwrap().health = 150;
        let before = world.faction(Faction::Red).pool;
        apply_command(&mut world, &stats, Faction::Red, &Command::Deconstruct(id)).unwrap();
        let after = world.faction(Faction::Red).pool;
        assert!((after.gold - before.gold - 0.7 * 100.0 * 0.5).abs() < 1e-4);
        assert!((after.wood - before.wood - 0.7 * 50.0 * 0.5).abs() < 1e-4);
        assert!(!world.buildings.contains_key(&id));
    }

    #[test]
    fn assign_worker_respects_slot_cap() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        let house = world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::House,
            Vec2::new(800.0, 800.0),
            ConstructionState::Complete,
        );
        let mut peasants = Vec::new();
        for _ in 0..3 {
            peasants.push(world.spawn_unit(
                &stats,
                Faction::Red,
                UnitKind::Peasant,
                Vec2::new(790.0, 790.0),
            ));
        }
        for &p in &peasants[..2] {
            apply_command(
                &mut world,
                &stats,
                Faction::Red,
                &Command::AssignWorker {
                    unit: p,
                    building: house,
                },
            )
            .unwrap();
        }
        let err = apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::AssignWorker {
                unit: peasants[2],
                building: house,
            },
        )
        .unwrap_err();
        assert_eq!(err, RejectReason::WorkerSlotsFull);
        assert_eq!(world.buildings[&house].workers.len(), 2);
    }

    #[test]
    fn assign_builder_is_idempotent() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        let site = world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::Farm,
            Vec2::new(800.0, 800.0),
            ConstructionState::Foundation {
                progress: 0.0,
                builders: Vec::new(),
            },
        );
        let peasant =
            world.spawn_unit(&stats, Faction::Red, UnitKind::Peasant, Vec2::new(790.0, 790.0));
        for _ in 0..2 {
            apply_command(
                &mut world,
                &stats,
                Faction::Red,
                &Command::AssignBuilder {
                    unit: peasant,
                    building: site,
                },
            )
            .unwrap();
        }
        let ConstructionState::Foundation { builders, .. } = &world.buildings[&site].state else {
            panic!("site should still be a foundation");
        };
        assert_eq!(builders.len(), 1);
    }

    #[test]
    fn commands_on_missing_entities_are_silent() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        let events = apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::Deconstruct(9999),
        )
        .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn stop_detaches_workers() {
        let (stats, mut world) = world_with_castle(Faction::Red);
        let house = world.place_building(
            &stats,
            Faction::Red,
            BuildingKind::House,
            Vec2::new(800.0, 800.0),
            ConstructionState::Complete,
        );
        let peasant =
            world.spawn_unit(&stats, Faction::Red, UnitKind::Peasant, Vec2::new(790.0, 790.0));
        apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::AssignWorker {
                unit: peasant,
                building: house,
            },
        )
        .unwrap();
        apply_command(
            &mut world,
            &stats,
            Faction::Red,
            &Command::Stop {
                units: vec![peasant],
            },
        )
        .unwrap();
        assert!(world.buildings[&house].workers.is_empty());
        assert_eq!(world.units[&peasant].order, Order::Idle);
    }
}
