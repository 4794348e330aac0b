//! World state: factions, units, buildings, resource pools.
//!
//! `WorldState` is a plain value owned by whatever drives the simulation.
//! All per-match mutable state lives here — there are no globals — so
//! snapshotting, hashing and replication are just serialization of this
//! one struct.

use std::collections::HashMap;

use glam::Vec2;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::stats::{
    BuildingKind, BuildingStats, Cost, StatTable, UnitKind, UnitStats, MAP_MARGIN, MAP_SIZE,
    SPAWN_RING_RADIUS, STARTING_POOL,
};

/// Unique identifier shared by units and buildings.
pub type EntityId = u64;

// ====== Factions ======

/// The two sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    /// Conventionally the host / human player.
    Red,
    /// Conventionally the AI or remote peer.
    Blue,
}

impl Faction {
    /// Both factions in a fixed order.
    pub const BOTH: [Self; 2] = [Self::Red, Self::Blue];

    /// The opposing faction.
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Blue => 1,
        }
    }
}

/// Per-faction resource pool.
///
/// Spending clamps at zero and never goes negative; there is no upper cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    /// Gold on hand.
    pub gold: f32,
    /// Food on hand.
    pub food: f32,
    /// Wood on hand.
    pub wood: f32,
}

impl ResourcePool {
    /// Whether the pool covers `cost` on every axis.
    #[must_use]
    pub fn can_afford(&self, cost: Cost) -> bool {
        self.gold >= cost.gold && self.food >= cost.food && self.wood >= cost.wood
    }

    /// Subtract `cost`, clamping each axis at zero.
    pub fn spend(&mut self, cost: Cost) {
        self.gold = (self.gold - cost.gold).max(0.0);
        self.food = (self.food - cost.food).max(0.0);
        self.wood = (self.wood - cost.wood).max(0.0);
    }

    /// Add `amount` to the pool.
    pub fn credit(&mut self, amount: Cost) {
        self.gold += amount.gold;
        self.food += amount.food;
        self.wood += amount.wood;
    }
}

/// Mutable per-faction bookkeeping beyond the entity lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionState {
    /// Resource pool.
    pub pool: ResourcePool,
    /// Seconds since the last food consumption event.
    pub food_clock: f32,
}

impl FactionState {
    fn new() -> Self {
        Self {
            pool: ResourcePool {
                gold: STARTING_POOL.gold,
                food: STARTING_POOL.food,
                wood: STARTING_POOL.wood,
            },
            food_clock: 0.0,
        }
    }
}

// ====== Orders ======

/// What a unit is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Order {
    /// Standing still, available for auto-aggro.
    Idle,
    /// Walking to a point; combat never interrupts this.
    MoveTo(Vec2),
    /// Walking to a point, open to opportunistic engagement en route.
    AttackMove(Vec2),
    /// Fighting a specific target.
    Attack {
        /// Current target, unit or building.
        target: EntityId,
        /// Destination to resume once the target is gone, when this
        /// engagement came out of an attack-move.
        resume: Option<Vec2>,
    },
    /// Building a foundation.
    Construct(EntityId),
    /// Staffing a completed building's worker slot.
    Work(EntityId),
}

// ====== Entities ======

/// A mobile unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique id.
    pub id: EntityId,
    /// Owning faction.
    pub faction: Faction,
    /// Unit type.
    pub kind: UnitKind,
    /// World position.
    pub pos: Vec2,
    /// Current health, positive while alive.
    pub health: i32,
    /// Stats copied from the table at spawn. Per-instance overrides are
    /// edits to this copy, never to the table.
    pub stats: UnitStats,
    /// Current order.
    pub order: Order,
    /// Seconds until this unit may attack again.
    pub cooldown_remaining: f32,
}

impl Unit {
    /// Whether this unit auto-acquires targets.
    #[must_use]
    pub fn is_military(&self) -> bool {
        self.kind.is_military()
    }
}

/// Construction phase of a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstructionState {
    /// Still being built. Generates nothing, accepts no workers.
    Foundation {
        /// Completion fraction in `0.0..1.0`.
        progress: f32,
        /// Peasants currently assigned to build this.
        builders: Vec<EntityId>,
    },
    /// Finished. Never reverts to `Foundation`.
    Complete,
}

/// A placed building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    /// Unique id.
    pub id: EntityId,
    /// Owning faction.
    pub faction: Faction,
    /// Building type.
    pub kind: BuildingKind,
    /// World position (centre).
    pub pos: Vec2,
    /// Current health.
    pub health: i32,
    /// Stats copied from the table at placement.
    pub stats: BuildingStats,
    /// Construction phase.
    pub state: ConstructionState,
    /// Assigned worker unit ids, bounded by `stats.generation.max_workers`.
    pub workers: Vec<EntityId>,
    /// Seconds since this building last paid out resources.
    pub generation_clock: f32,
    /// Seconds until a tower may fire again. Unused by other kinds.
    pub weapon_cooldown: f32,
}

impl Building {
    /// Whether construction has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.state, ConstructionState::Complete)
    }
}

// ====== World ======

/// The complete mutable state of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// Current simulation tick.
    pub tick: u64,
    /// All living units by id.
    pub units: HashMap<EntityId, Unit>,
    /// All standing buildings by id.
    pub buildings: HashMap<EntityId, Building>,
    factions: [FactionState; 2],
    next_id: EntityId,
    spawn_counter: u32,
    /// Seeded RNG for the few chance rolls (tower hits). Carried in the
    /// snapshot so host and replica stay in lockstep.
    pub rng: ChaCha8Rng,
    /// Set once a castle falls; the match is over.
    pub winner: Option<Faction>,
}

impl WorldState {
    /// Create an empty world seeded for deterministic chance rolls.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            tick: 0,
            units: HashMap::new(),
            buildings: HashMap::new(),
            factions: [FactionState::new(), FactionState::new()],
            next_id: 1,
            spawn_counter: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            winner: None,
        }
    }

    /// A faction's bookkeeping.
    #[must_use]
    pub fn faction(&self, faction: Faction) -> &FactionState {
        &self.factions[faction.index()]
    }

    /// Mutable access to a faction's bookkeeping.
    pub fn faction_mut(&mut self, faction: Faction) -> &mut FactionState {
        &mut self.factions[faction.index()]
    }

    /// Allocate a fresh entity id.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Unit ids in ascending order, for deterministic iteration.
    #[must_use]
    pub fn sorted_unit_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Building ids in ascending order, for deterministic iteration.
    #[must_use]
    pub fn sorted_building_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.buildings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// A faction's castle, if it still stands.
    #[must_use]
    pub fn castle_of(&self, faction: Faction) -> Option<&Building> {
        self.buildings
            .values()
            .find(|b| b.faction == faction && b.kind == BuildingKind::Castle)
    }

    /// Clamp a point into the playable area.
    #[must_use]
    pub fn clamp_to_map(pos: Vec2) -> Vec2 {
        pos.clamp(
            Vec2::splat(MAP_MARGIN),
            Vec2::splat(MAP_SIZE - MAP_MARGIN),
        )
    }

    /// Spawn a unit of `kind` for `faction` at `pos`.
    pub fn spawn_unit(&mut self, stats: &StatTable, faction: Faction, kind: UnitKind, pos: Vec2) -> EntityId {
        let id = self.allocate_id();
        let unit_stats = stats.unit(kind);
        self.units.insert(
            id,
            Unit {
                id,
                faction,
                kind,
                pos: Self::clamp_to_map(pos),
                health: unit_stats.max_health,
                stats: unit_stats,
                order: Order::Idle,
                cooldown_remaining: 0.0,
            },
        );
        id
    }

    /// Spawn a unit on the ring around its faction's castle.
    ///
    /// Spawn points walk around the ring deterministically so repeated
    /// training does not stack units on a single point.
    pub fn spawn_unit_at_castle(
        &mut self,
        stats: &StatTable,
        faction: Faction,
        kind: UnitKind,
    ) -> Option<EntityId> {
        let castle_pos = self.castle_of(faction)?.pos;
        // Golden-angle step spreads successive spawns around the ring.
        #[allow(clippy::cast_precision_loss)]
        let angle = self.spawn_counter as f32 * 2.399_963;
        self.spawn_counter = self.spawn_counter.wrapping_add(1);
        let offset = Vec2::new(angle.cos(), angle.sin()) * SPAWN_RING_RADIUS;
        Some(self.spawn_unit(stats, faction, kind, castle_pos + offset))
    }

    /// Place a building for `faction` at `pos` in the given state.
    pub fn place_building(
        &mut self,
        stats: &StatTable,
        faction: Faction,
        kind: BuildingKind,
        pos: Vec2,
        state: ConstructionState,
    ) -> EntityId {
        let id = self.allocate_id();
        let building_stats = stats.building(kind);
        let health = match state {
            // Foundations start at a sliver of health and scale up as
            // construction progresses.
            ConstructionState::Foundation { .. } => 1.max(building_stats.max_health / 10),
            ConstructionState::Complete => building_stats.max_health,
        };
        self.buildings.insert(
            id,
            Building {
                id,
                faction,
                kind,
                pos: Self::clamp_to_map(pos),
                health,
                stats: building_stats,
                state,
                workers: Vec::new(),
                generation_clock: 0.0,
                weapon_cooldown: 0.0,
            },
        );
        id
    }

    /// Count living military units owned by `faction`.
    #[must_use]
    pub fn military_count(&self, faction: Faction) -> usize {
        self.units
            .values()
            .filter(|u| u.faction == faction && u.is_military())
            .count()
    }

    /// Drop any order whose referenced entity is gone, and scrub dead ids
    /// from builder and worker lists.
    ///
    /// Run after the end-of-tick death sweep so the next tick never sees a
    /// dangling reference.
    pub fn prune_dangling_references(&mut self) {
        let unit_ids: std::collections::HashSet<EntityId> = self.units.keys().copied().collect();
        let building_ids: std::collections::HashSet<EntityId> =
            self.buildings.keys().copied().collect();

        for unit in self.units.values_mut() {
            let stale = match unit.order {
                Order::Attack { target, .. } => {
                    !unit_ids.contains(&target) && !building_ids.contains(&target)
                }
                Order::Construct(b) | Order::Work(b) => !building_ids.contains(&b),
                _ => false,
            };
            if stale {
                unit.order = match unit.order {
                    Order::Attack {
                        resume: Some(dest), ..
                    } => Order::AttackMove(dest),
                    _ => Order::Idle,
                };
            }
        }

        for building in self.buildings.values_mut() {
            building.workers.retain(|id| unit_ids.contains(id));
            if let ConstructionState::Foundation { builders, .. } = &mut building.state {
                builders.retain(|id| unit_ids.contains(id));
            }
        }
    }
}
