//! # Siege Core
//!
//! Deterministic two-faction RTS simulation core.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (chance rolls use a seeded RNG carried in state)
//!
//! This separation enables:
//! - Host-authoritative multiplayer (a replica replays the host's commands)
//! - Headless matches for AI and balance testing
//! - Checksum-based desync detection
//!
//! ## Crate Structure
//!
//! - [`stats`] - Static stat/cost tables and tuning constants
//! - [`world`] - Units, buildings, factions, resource pools
//! - [`command`] - The command protocol and its validation
//! - [`movement`] - Straight-line movement toward order goals
//! - [`combat`] - Target acquisition and damage resolution
//! - [`economy`] - Generation, construction, food upkeep
//! - [`simulation`] - The fixed-tick driver tying it together

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod command;
pub mod economy;
pub mod error;
pub mod events;
pub mod movement;
pub mod simulation;
pub mod stats;
pub mod world;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::command::{Command, RejectReason};
    pub use crate::error::{Result, SimError};
    pub use crate::events::{GameEvent, TickEvents};
    pub use crate::simulation::{Simulation, TICK_DT, TICK_RATE};
    pub use crate::stats::{BuildingKind, Cost, StatTable, UnitKind};
    pub use crate::world::{
        Building, ConstructionState, EntityId, Faction, Order, ResourcePool, Unit, WorldState,
    };
}
