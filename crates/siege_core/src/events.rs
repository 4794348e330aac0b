//! Transient per-tick event records.
//!
//! Events are the read-only feedback channel to presentation, networking
//! and the AI. They describe what happened during a tick; they never carry
//! authority over state.

use serde::{Deserialize, Serialize};

use crate::command::RejectReason;
use crate::stats::{BuildingKind, Cost, UnitKind};
use crate::world::{EntityId, Faction};

/// Something observable that happened during one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A unit finished training and spawned at its castle.
    UnitTrained {
        /// New unit id.
        id: EntityId,
        /// Owner.
        faction: Faction,
        /// Unit type.
        kind: UnitKind,
    },
    /// A foundation was placed and paid for.
    BuildingPlaced {
        /// New building id.
        id: EntityId,
        /// Owner.
        faction: Faction,
        /// Building type.
        kind: BuildingKind,
    },
    /// A foundation finished construction.
    ConstructionComplete {
        /// The building that completed.
        id: EntityId,
    },
    /// An attack connected.
    CombatHit {
        /// Attacking unit or tower.
        attacker: EntityId,
        /// Damaged unit or building.
        target: EntityId,
        /// Damage applied after the defense floor.
        damage: i32,
    },
    /// A tower shot failed its hit roll.
    TowerMissed {
        /// The tower that fired.
        tower: EntityId,
    },
    /// A unit's health reached zero and it was removed.
    UnitDied {
        /// The dead unit.
        id: EntityId,
        /// Its owner.
        faction: Faction,
    },
    /// A building's health reached zero and it was removed.
    BuildingDestroyed {
        /// The destroyed building.
        id: EntityId,
        /// Its owner.
        faction: Faction,
    },
    /// A building was voluntarily torn down for a partial refund.
    BuildingDeconstructed {
        /// The removed building.
        id: EntityId,
        /// Resources credited back to the owner.
        refund: Cost,
    },
    /// A staffed building paid out its generation interval.
    ResourcesGenerated {
        /// Producing building.
        building: EntityId,
        /// Credited faction.
        faction: Faction,
        /// Amount credited.
        amount: Cost,
    },
    /// A faction had no food at consumption time; its units took damage.
    Starvation {
        /// Starving faction.
        faction: Faction,
        /// Units damaged this event.
        affected: usize,
    },
    /// A command failed validation and had no effect.
    CommandRejected {
        /// Issuing faction.
        faction: Faction,
        /// Why it was dropped.
        reason: RejectReason,
    },
    /// A castle fell; the match is decided.
    GameOver {
        /// The surviving faction.
        winner: Faction,
    },
}

/// Everything that happened during one call to
/// [`Simulation::tick`](crate::simulation::Simulation::tick).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Ordered event stream for this tick.
    pub events: Vec<GameEvent>,
    /// Ids removed at the end-of-tick death sweep (units and buildings).
    pub deaths: Vec<EntityId>,
}

impl TickEvents {
    /// Append another tick's events onto this one.
    pub fn extend(&mut self, mut other: TickEvents) {
        self.events.append(&mut other.events);
        self.deaths.append(&mut other.deaths);
    }
}
