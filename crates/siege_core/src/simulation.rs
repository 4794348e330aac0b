//! The fixed-tick simulation.
//!
//! One `Simulation` owns the stat table and the world and advances them
//! deterministically: same seed, same command stream, same state. Each
//! tick runs the phases in a fixed order — commands, movement, combat,
//! economy, death sweep — and the dead are only removed at the end, so
//! every phase within a tick sees a stable entity set.
//!
//! Network and AI actors live outside this type; they feed commands in
//! and read events and world state out.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::command::{apply_command, Command};
use crate::error::Result;
use crate::events::{GameEvent, TickEvents};
use crate::stats::{BuildingKind, StatTable, UnitKind};
use crate::world::{ConstructionState, Faction, Order, WorldState};
use crate::{combat, economy, movement};

/// Simulation ticks per second.
pub const TICK_RATE: u32 = 60;

/// Fixed seconds of simulated time per tick.
#[allow(clippy::cast_precision_loss)]
pub const TICK_DT: f32 = 1.0 / TICK_RATE as f32;

/// Castle positions for a standard two-faction match.
const RED_CASTLE: Vec2 = Vec2::new(300.0, 300.0);
const BLUE_CASTLE: Vec2 = Vec2::new(1700.0, 1700.0);

/// A complete deterministic match simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    stats: StatTable,
    world: WorldState,
}

impl Simulation {
    /// Create a simulation with an empty world.
    ///
    /// Useful for tests and tools; real matches start from
    /// [`standard_match`](Self::standard_match).
    #[must_use]
    pub fn new(stats: StatTable, seed: u64) -> Self {
        Self {
            stats,
            world: WorldState::new(seed),
        }
    }

    /// Set up the standard opening: one castle per faction in opposite
    /// corners, each with three peasants and a knight.
    #[must_use]
    pub fn standard_match(stats: StatTable, seed: u64) -> Self {
        let mut sim = Self::new(stats, seed);
        for (faction, castle_pos) in [(Faction::Red, RED_CASTLE), (Faction::Blue, BLUE_CASTLE)] {
            sim.world.place_building(
                &sim.stats,
                faction,
                BuildingKind::Castle,
                castle_pos,
                ConstructionState::Complete,
            );
            for _ in 0..3 {
                sim.world
                    .spawn_unit_at_castle(&sim.stats, faction, UnitKind::Peasant);
            }
            sim.world
                .spawn_unit_at_castle(&sim.stats, faction, UnitKind::Knight);
        }
        sim
    }

    /// Current tick number.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.world.tick
    }

    /// Read-only world access for presentation, AI and replication.
    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Mutable world access for scenario setup in tests and tools.
    ///
    /// Gameplay mutation goes through [`tick`](Self::tick) and the
    /// command protocol; mutating mid-match from outside will desync any
    /// replica.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// The match's stat table.
    #[must_use]
    pub fn stats(&self) -> &StatTable {
        &self.stats
    }

    /// The winner, once a castle has fallen.
    #[must_use]
    pub fn winner(&self) -> Option<Faction> {
        self.world.winner
    }

    /// Advance one tick, applying `commands` in the order given.
    ///
    /// Locally-issued and network-received commands are expected to
    /// already be interleaved by arrival order; no prioritisation happens
    /// here. Rejected commands surface as
    /// [`GameEvent::CommandRejected`] and mutate nothing.
    pub fn tick(&mut self, commands: &[(Faction, Command)]) -> TickEvents {
        let mut out = TickEvents::default();
        if self.world.winner.is_some() {
            return out;
        }

        // 1. Commands
        for (faction, command) in commands {
            match apply_command(&mut self.world, &self.stats, *faction, command) {
                Ok(mut events) => out.events.append(&mut events),
                Err(reason) => out.events.push(GameEvent::CommandRejected {
                    faction: *faction,
                    reason,
                }),
            }
        }

        // 2. Movement
        movement::step(&mut self.world, TICK_DT);

        // 3. Combat
        out.events
            .append(&mut combat::resolve(&mut self.world, &self.stats, TICK_DT));

        // 4. Economy
        out.events
            .append(&mut economy::tick(&mut self.world, TICK_DT));

        // 5. Death sweep, end of tick only.
        self.sweep_dead(&mut out);
        self.world.prune_dangling_references();

        self.world.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.world.tick, state_hash = hash, "tick complete");
        }

        out
    }

    fn sweep_dead(&mut self, out: &mut TickEvents) {
        let dead_units: Vec<_> = self
            .world
            .sorted_unit_ids()
            .into_iter()
            .filter(|id| self.world.units[id].health <= 0)
            .collect();
        for id in dead_units {
            if let Some(unit) = self.world.units.remove(&id) {
                out.deaths.push(id);
                out.events.push(GameEvent::UnitDied {
                    id,
                    faction: unit.faction,
                });
            }
        }

        let dead_buildings: Vec<_> = self
            .world
            .sorted_building_ids()
            .into_iter()
            .filter(|id| self.world.buildings[id].health <= 0)
            .collect();
        for id in dead_buildings {
            if let Some(building) = self.world.buildings.remove(&id) {
                out.deaths.push(id);
                out.events.push(GameEvent::BuildingDestroyed {
                    id,
                    faction: building.faction,
                });
                if building.kind == BuildingKind::Castle && self.world.winner.is_none() {
                    let winner = building.faction.opponent();
                    self.world.winner = Some(winner);
                    out.events.push(GameEvent::GameOver { winner });
                }
            }
        }
    }

    /// Checksum of the world for desync detection.
    ///
    /// Hashes every gameplay-relevant field in sorted-id order; floats go
    /// in as raw bits. Two replicas in lockstep produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.world.tick.hash(&mut hasher);
        self.world.winner.hash(&mut hasher);

        for faction in Faction::BOTH {
            let state = self.world.faction(faction);
            state.pool.gold.to_bits().hash(&mut hasher);
            state.pool.food.to_bits().hash(&mut hasher);
            state.pool.wood.to_bits().hash(&mut hasher);
            state.food_clock.to_bits().hash(&mut hasher);
        }

        for id in self.world.sorted_unit_ids() {
            let unit = &self.world.units[&id];
            id.hash(&mut hasher);
            unit.faction.hash(&mut hasher);
            unit.kind.hash(&mut hasher);
            unit.pos.x.to_bits().hash(&mut hasher);
            unit.pos.y.to_bits().hash(&mut hasher);
            unit.health.hash(&mut hasher);
            unit.cooldown_remaining.to_bits().hash(&mut hasher);
            hash_order(&unit.order, &mut hasher);
        }

        for id in self.world.sorted_building_ids() {
            let building = &self.world.buildings[&id];
            id.hash(&mut hasher);
            building.faction.hash(&mut hasher);
            building.kind.hash(&mut hasher);
            building.pos.x.to_bits().hash(&mut hasher);
            building.pos.y.to_bits().hash(&mut hasher);
            building.health.hash(&mut hasher);
            building.workers.hash(&mut hasher);
            building.generation_clock.to_bits().hash(&mut hasher);
            building.weapon_cooldown.to_bits().hash(&mut hasher);
            match &building.state {
                ConstructionState::Complete => 0u8.hash(&mut hasher),
                ConstructionState::Foundation { progress, builders } => {
                    1u8.hash(&mut hasher);
                    progress.to_bits().hash(&mut hasher);
                    builders.hash(&mut hasher);
                }
            }
        }

        hasher.finish()
    }

    /// Serialize the whole simulation (table included) for join/resync.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SimError::Snapshot`] if encoding fails.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Rebuild a simulation from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SimError::Snapshot`] if decoding fails.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

fn hash_order(order: &Order, hasher: &mut impl Hasher) {
    match order {
        Order::Idle => 0u8.hash(hasher),
        Order::MoveTo(dest) => {
            1u8.hash(hasher);
            dest.x.to_bits().hash(hasher);
            dest.y.to_bits().hash(hasher);
        }
        Order::AttackMove(dest) => {
            2u8.hash(hasher);
            dest.x.to_bits().hash(hasher);
            dest.y.to_bits().hash(hasher);
        }
        Order::Attack { target, resume } => {
            3u8.hash(hasher);
            target.hash(hasher);
            if let Some(dest) = resume {
                1u8.hash(hasher);
                dest.x.to_bits().hash(hasher);
                dest.y.to_bits().hash(hasher);
            } else {
                0u8.hash(hasher);
            }
        }
        Order::Construct(id) => {
            4u8.hash(hasher);
            id.hash(hasher);
        }
        Order::Work(id) => {
            5u8.hash(hasher);
            id.hash(hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::STARTING_POOL;

    #[test]
    fn standard_match_layout() {
        let sim = Simulation::standard_match(StatTable::standard(), 1);
        assert_eq!(sim.world().units.len(), 8);
        assert_eq!(sim.world().buildings.len(), 2);
        assert!(sim.world().castle_of(Faction::Red).is_some());
        assert!(sim.world().castle_of(Faction::Blue).is_some());
        let pool = sim.world().faction(Faction::Red).pool;
        assert_eq!(pool.gold, STARTING_POOL.gold);
    }

    #[test]
    fn deaths_are_swept_at_end_of_tick() {
        let stats = StatTable::standard();
        let mut sim = Simulation::new(stats, 1);
        let doomed = sim.world.spawn_unit(
            &sim.stats,
            Faction::Blue,
            UnitKind::Peasant,
            Vec2::new(500.0, 500.0),
        );
        sim.world.units.get_mut(&doomed).unwrap().health = 0;

        let events = sim.tick(&[]);
        assert!(events.deaths.contains(&doomed));
        assert!(events.events.contains(&GameEvent::UnitDied {
            id: doomed,
            faction: Faction::Blue
        }));
        assert!(!sim.world().units.contains_key(&doomed));
    }

    #[test]
    fn castle_fall_decides_the_match() {
        let mut sim = Simulation::standard_match(StatTable::standard(), 1);
        let castle = sim.world().castle_of(Faction::Blue).unwrap().id;
        sim.world.buildings.get_mut(&castle).unwrap().health = 0;

        let events = sim.tick(&[]);
        assert_eq!(sim.winner(), Some(Faction::Red));
        assert!(events.events.contains(&GameEvent::GameOver {
            winner: Faction::Red
        }));

        // Further commands are rejected, further ticks are inert.
        let events = sim.tick(&[(Faction::Red, Command::TrainUnit(UnitKind::Peasant))]);
        assert!(events.events.is_empty());
    }

    #[test]
    fn rejected_commands_surface_as_events() {
        let mut sim = Simulation::standard_match(StatTable::standard(), 1);
        // Drain the gold first.
        sim.world.faction_mut(Faction::Red).pool.gold = 0.0;
        let events = sim.tick(&[(Faction::Red, Command::TrainUnit(UnitKind::Knight))]);
        assert!(events.events.iter().any(|e| matches!(
            e,
            GameEvent::CommandRejected {
                faction: Faction::Red,
                ..
            }
        )));
    }

    #[test]
    fn lockstep_replicas_hash_identically() {
        let commands = vec![
            (Faction::Red, Command::TrainUnit(UnitKind::Cavalry)),
            (
                Faction::Blue,
                Command::PlaceBuilding(BuildingKind::Farm, Vec2::new(1400.0, 1400.0)),
            ),
        ];
        let mut host = Simulation::standard_match(StatTable::standard(), 99);
        let mut replica = Simulation::standard_match(StatTable::standard(), 99);

        host.tick(&commands);
        replica.tick(&commands);
        for _ in 0..120 {
            host.tick(&[]);
            replica.tick(&[]);
        }
        assert_eq!(host.state_hash(), replica.state_hash());
    }

    #[test]
    fn snapshot_restore_preserves_hash() {
        let mut sim = Simulation::standard_match(StatTable::standard(), 7);
        sim.tick(&[(Faction::Red, Command::TrainUnit(UnitKind::Peasant))]);
        for _ in 0..30 {
            sim.tick(&[]);
        }

        let bytes = sim.snapshot().unwrap();
        let mut restored = Simulation::restore(&bytes).unwrap();
        assert_eq!(sim.state_hash(), restored.state_hash());

        // And they stay in lockstep afterwards, RNG included.
        for _ in 0..60 {
            sim.tick(&[]);
            restored.tick(&[]);
        }
        assert_eq!(sim.state_hash(), restored.state_hash());
    }

    #[test]
    fn cannon_outranges_knight_on_approach() {
        let stats = StatTable::standard();
        let mut sim = Simulation::new(stats, 1);
        let knight = sim.world.spawn_unit(
            &sim.stats,
            Faction::Red,
            UnitKind::Knight,
            Vec2::new(500.0, 500.0),
        );
        let cannon = sim.world.spawn_unit(
            &sim.stats,
            Faction::Blue,
            UnitKind::Cannon,
            Vec2::new(1100.0, 500.0),
        );
        sim.world.units.get_mut(&knight).unwrap().order =
            Order::AttackMove(Vec2::new(1100.0, 500.0));

        let mut first_cannon_hit: Option<u64> = None;
        let mut first_knight_hit: Option<u64> = None;
        for _ in 0..(TICK_RATE as u64 * 20) {
            let events = sim.tick(&[]);
            for event in &events.events {
                if let GameEvent::CombatHit { attacker, .. } = event {
                    if *attacker == cannon && first_cannon_hit.is_none() {
                        first_cannon_hit = Some(sim.current_tick());
                    }
                    if *attacker == knight && first_knight_hit.is_none() {
                        first_knight_hit = Some(sim.current_tick());
                    }
                }
            }
            if sim.world().units.get(&knight).is_none() || first_knight_hit.is_some() {
                break;
            }
        }

        let cannon_hit = first_cannon_hit.expect("cannon never landed a hit");
        if let Some(knight_hit) = first_knight_hit {
            assert!(cannon_hit < knight_hit, "cannon must strike first");
        }
        // Either way the asymmetric opening happened before the knight
        // could possibly close from outside the cannon's range.
        assert!(cannon_hit > 0);
    }
}
