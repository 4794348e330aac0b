//! Static unit/building stat tables.
//!
//! All balance numbers live here: costs, health, weapon stats, generation
//! rates, and the handful of global tuning constants. The table is built
//! once at match start (defaults plus optional RON override layers) and is
//! read-only for the rest of the match — nothing in the simulation mutates
//! it at runtime.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ====== Global tuning constants ======

/// Playable map width and height, in world units.
pub const MAP_SIZE: f32 = 2000.0;

/// Units are clamped this far inside the map edge.
pub const MAP_MARGIN: f32 = 20.0;

/// A moving unit stops once within this distance of its goal.
pub const ARRIVAL_EPSILON: f32 = 5.0;

/// Auto-aggro scan radius as a multiple of weapon range.
pub const AUTO_AGGRO_FACTOR: f32 = 3.0;

/// Seconds between resource generation payouts per building.
pub const RESOURCE_TICK_INTERVAL: f32 = 5.0;

/// Maximum distance from a building at which an assigned worker or
/// builder actually counts. Anyone still walking in contributes nothing
/// until they close to this range.
pub const WORKER_RANGE: f32 = 80.0;

/// Seconds between per-faction food consumption events.
pub const FOOD_CONSUMPTION_INTERVAL: f32 = 10.0;

/// Food eaten per living unit at each consumption event.
pub const FOOD_PER_UNIT: f32 = 2.0;

/// Damage per living unit when the food pool is empty at consumption time.
pub const STARVATION_DAMAGE: i32 = 5;

/// Fraction of (health-prorated) cost returned on deconstruction.
pub const DECONSTRUCT_REFUND: f32 = 0.7;

/// Marginal contribution of each builder past the first.
pub const BUILDER_FALLOFF: f32 = 0.6;

/// Fresh units spawn on a ring of this radius around their castle.
pub const SPAWN_RING_RADIUS: f32 = 80.0;

/// Starting resource pool for each faction.
pub const STARTING_POOL: Cost = Cost {
    gold: 500.0,
    food: 200.0,
    wood: 300.0,
};

/// Combined speedup factor for `n` assigned builders.
///
/// The first builder contributes 1.0, each further builder
/// [`BUILDER_FALLOFF`]. Zero builders means no progress.
#[must_use]
pub fn builder_speedup(builders: usize) -> f32 {
    if builders == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let extra = (builders - 1) as f32;
        1.0 + BUILDER_FALLOFF * extra
    }
}

// ====== Kinds ======

/// The four trainable unit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Worker unit. Builds and staffs buildings; barely fights.
    Peasant,
    /// Armoured melee line unit.
    Knight,
    /// Fast flanker with light armour.
    Cavalry,
    /// Slow long-range siege piece.
    Cannon,
}

impl UnitKind {
    /// All unit kinds in a fixed order.
    pub const ALL: [Self; 4] = [Self::Peasant, Self::Knight, Self::Cavalry, Self::Cannon];

    /// Whether this kind auto-acquires targets on its own.
    #[must_use]
    pub fn is_military(self) -> bool {
        !matches!(self, Self::Peasant)
    }
}

/// The four placeable building types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Faction heart. Pre-placed, trains units, loss ends the match.
    Castle,
    /// Gold producer.
    House,
    /// Food and wood producer.
    Farm,
    /// Crewed defensive weapon.
    Tower,
}

impl BuildingKind {
    /// All building kinds in a fixed order.
    pub const ALL: [Self; 4] = [Self::Castle, Self::House, Self::Farm, Self::Tower];
}

// ====== Stat records ======

/// A three-resource price or quantity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cost {
    /// Gold component.
    pub gold: f32,
    /// Food component.
    pub food: f32,
    /// Wood component.
    pub wood: f32,
}

impl Cost {
    /// Zero on every axis.
    pub const ZERO: Self = Self {
        gold: 0.0,
        food: 0.0,
        wood: 0.0,
    };

    /// Scale every component by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            gold: self.gold * factor,
            food: self.food * factor,
            wood: self.wood * factor,
        }
    }
}

/// Combat and movement stats for one unit kind.
///
/// Copied into each unit at spawn time; per-instance tweaks after that
/// never touch the table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Maximum (and starting) health.
    pub max_health: i32,
    /// Raw attack value before the defender's defense is subtracted.
    pub attack: i32,
    /// Flat damage reduction when attacked.
    pub defense: i32,
    /// Movement speed in world units per second.
    pub speed: f32,
    /// Weapon reach in world units.
    pub range: f32,
    /// Seconds between attacks.
    pub cooldown: f32,
}

/// Per-worker resource payout for a building, once per generation interval.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Generation {
    /// Resources produced per assigned worker per interval.
    pub per_worker: Cost,
    /// Worker slot capacity.
    pub max_workers: usize,
}

/// Static stats for one building kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingStats {
    /// Maximum (and completed) health.
    pub max_health: i32,
    /// Seconds of single-builder work to complete a foundation.
    pub build_time: f32,
    /// Side length of the building's square footprint, centred on its
    /// position. Placement keeps squares from intersecting; melee and
    /// stand-off distances measure from the square's edge via
    /// [`BuildingStats::half_extent`].
    pub footprint: f32,
    /// Worker payout, if this building produces anything.
    pub generation: Generation,
}

impl BuildingStats {
    /// Distance from the building's centre to the middle of a side.
    #[must_use]
    pub fn half_extent(&self) -> f32 {
        self.footprint / 2.0
    }
}

/// Tower weapon parameters, shared by every tower.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TowerWeapon {
    /// Raw attack value.
    pub attack: i32,
    /// Firing range in world units.
    pub range: f32,
    /// Seconds between shots. A miss still spends the cooldown.
    pub cooldown: f32,
    /// Probability that a shot connects.
    pub hit_chance: f32,
    /// Minimum assigned workers before the tower fires at all.
    pub min_crew: usize,
}

// ====== The table ======

/// The complete stat table for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatTable {
    units: HashMap<UnitKind, UnitStats>,
    unit_costs: HashMap<UnitKind, Cost>,
    buildings: HashMap<BuildingKind, BuildingStats>,
    building_costs: HashMap<BuildingKind, Cost>,
    tower: TowerWeapon,
}

impl Default for StatTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl StatTable {
    /// Build the standard balance table.
    #[must_use]
    pub fn standard() -> Self {
        let units = HashMap::from([
            (
                UnitKind::Peasant,
                UnitStats {
                    max_health: 50,
                    attack: 5,
                    defense: 2,
                    speed: 150.0,
                    range: 20.0,
                    cooldown: 1.0,
                },
            ),
            (
                UnitKind::Knight,
                UnitStats {
                    max_health: 150,
                    attack: 20,
                    defense: 15,
                    speed: 108.0,
                    range: 35.0,
                    cooldown: 1.2,
                },
            ),
            (
                UnitKind::Cavalry,
                UnitStats {
                    max_health: 120,
                    attack: 25,
                    defense: 10,
                    speed: 240.0,
                    range: 40.0,
                    cooldown: 0.8,
                },
            ),
            (
                UnitKind::Cannon,
                UnitStats {
                    max_health: 80,
                    attack: 50,
                    defense: 5,
                    speed: 60.0,
                    range: 250.0,
                    cooldown: 3.0,
                },
            ),
        ]);

        let unit_costs = HashMap::from([
            (
                UnitKind::Peasant,
                Cost {
                    gold: 50.0,
                    food: 25.0,
                    wood: 0.0,
                },
            ),
            (
                UnitKind::Knight,
                Cost {
                    gold: 150.0,
                    food: 50.0,
                    wood: 0.0,
                },
            ),
            (
                UnitKind::Cavalry,
                Cost {
                    gold: 200.0,
                    food: 75.0,
                    wood: 0.0,
                },
            ),
            (
                UnitKind::Cannon,
                Cost {
                    gold: 300.0,
                    food: 0.0,
                    wood: 100.0,
                },
            ),
        ]);

        let buildings = HashMap::from([
            (
                BuildingKind::Castle,
                BuildingStats {
                    max_health: 2000,
                    build_time: 30.0,
                    footprint: 128.0,
                    generation: Generation {
                        per_worker: Cost {
                            gold: 10.0,
                            food: 5.0,
                            wood: 5.0,
                        },
                        max_workers: 1,
                    },
                },
            ),
            (
                BuildingKind::House,
                BuildingStats {
                    max_health: 300,
                    build_time: 10.0,
                    footprint: 80.0,
                    generation: Generation {
                        per_worker: Cost {
                            gold: 20.0,
                            food: 0.0,
                            wood: 0.0,
                        },
                        max_workers: 2,
                    },
                },
            ),
            (
                BuildingKind::Farm,
                BuildingStats {
                    max_health: 200,
                    build_time: 8.0,
                    footprint: 96.0,
                    generation: Generation {
                        per_worker: Cost {
                            gold: 0.0,
                            food: 25.0,
                            wood: 5.0,
                        },
                        max_workers: 3,
                    },
                },
            ),
            (
                BuildingKind::Tower,
                BuildingStats {
                    max_health: 500,
                    build_time: 15.0,
                    footprint: 64.0,
                    // Tower workers crew the weapon rather than produce.
                    generation: Generation {
                        per_worker: Cost::ZERO,
                        max_workers: 2,
                    },
                },
            ),
        ]);

        let building_costs = HashMap::from([
            (
                BuildingKind::Castle,
                Cost {
                    gold: 500.0,
                    food: 0.0,
                    wood: 200.0,
                },
            ),
            (
                BuildingKind::House,
                Cost {
                    gold: 100.0,
                    food: 0.0,
                    wood: 50.0,
                },
            ),
            (
                BuildingKind::Farm,
                Cost {
                    gold: 75.0,
                    food: 0.0,
                    wood: 25.0,
                },
            ),
            (
                BuildingKind::Tower,
                Cost {
                    gold: 200.0,
                    food: 0.0,
                    wood: 100.0,
                },
            ),
        ]);

        let tower = TowerWeapon {
            attack: 60,
            range: 250.0,
            cooldown: 2.0,
            hit_chance: 0.7,
            min_crew: 2,
        };

        Self {
            units,
            unit_costs,
            buildings,
            building_costs,
            tower,
        }
    }

    /// Build the standard table, then apply a RON override layer on top.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SimError::StatParse`] if the RON is malformed.
    pub fn with_overrides(ron_text: &str) -> Result<Self> {
        let overrides: StatOverrides = ron::from_str(ron_text)?;
        let mut table = Self::standard();
        table.apply(&overrides);
        Ok(table)
    }

    /// Merge an override layer into this table. Later layers win.
    pub fn apply(&mut self, overrides: &StatOverrides) {
        for (kind, stats) in &overrides.units {
            self.units.insert(*kind, *stats);
        }
        for (kind, cost) in &overrides.unit_costs {
            self.unit_costs.insert(*kind, *cost);
        }
        for (kind, stats) in &overrides.buildings {
            self.buildings.insert(*kind, *stats);
        }
        for (kind, cost) in &overrides.building_costs {
            self.building_costs.insert(*kind, *cost);
        }
        if let Some(tower) = overrides.tower {
            self.tower = tower;
        }
    }

    /// Stats for a unit kind.
    #[must_use]
    pub fn unit(&self, kind: UnitKind) -> UnitStats {
        self.units[&kind]
    }

    /// Training cost for a unit kind.
    #[must_use]
    pub fn unit_cost(&self, kind: UnitKind) -> Cost {
        self.unit_costs[&kind]
    }

    /// Stats for a building kind.
    #[must_use]
    pub fn building(&self, kind: BuildingKind) -> BuildingStats {
        self.buildings[&kind]
    }

    /// Placement cost for a building kind.
    #[must_use]
    pub fn building_cost(&self, kind: BuildingKind) -> Cost {
        self.building_costs[&kind]
    }

    /// The shared tower weapon profile.
    #[must_use]
    pub fn tower(&self) -> TowerWeapon {
        self.tower
    }
}

/// A sparse override layer, usually deserialized from RON.
///
/// Only the entries present are replaced; everything else keeps the
/// standard values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatOverrides {
    /// Unit stat replacements.
    #[serde(default)]
    pub units: HashMap<UnitKind, UnitStats>,
    /// Unit cost replacements.
    #[serde(default)]
    pub unit_costs: HashMap<UnitKind, Cost>,
    /// Building stat replacements.
    #[serde(default)]
    pub buildings: HashMap<BuildingKind, BuildingStats>,
    /// Building cost replacements.
    #[serde(default)]
    pub building_costs: HashMap<BuildingKind, Cost>,
    /// Tower weapon replacement.
    #[serde(default)]
    pub tower: Option<TowerWeapon>,
}
