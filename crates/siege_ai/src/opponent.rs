//! The per-tick decision agent.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use siege_core::command::Command;
use siege_core::stats::{BuildingKind, Cost, StatTable, UnitKind, MAP_MARGIN, MAP_SIZE};
use siege_core::world::{ConstructionState, EntityId, Faction, Order, Unit, WorldState};

use crate::difficulty::{Difficulty, DifficultyProfile};

/// Enemies inside this radius of the castle trigger the defend response.
const THREAT_RADIUS: f32 = 300.0;

/// How many enemies near the castle count as an actual raid.
const THREAT_COUNT: usize = 2;

/// New buildings go up this close to the castle.
const BUILD_RING: std::ops::Range<f32> = 150.0..300.0;

/// Per-interval income the baseline agent tries to sustain.
const GOLD_RATE_TARGET: f32 = 40.0;
const FOOD_RATE_TARGET: f32 = 50.0;

/// A difficulty-parameterized opponent for one faction.
///
/// Holds no plan beyond a think timer and its own RNG; every pass
/// re-reads the world and decides fresh. Runs host-side only, so its
/// randomness never needs to match a replica — the commands it emits are
/// what gets replicated.
#[derive(Debug, Clone)]
pub struct AiOpponent {
    faction: Faction,
    profile: DifficultyProfile,
    rng: ChaCha8Rng,
    think_clock: f32,
}

impl AiOpponent {
    /// Create an opponent for `faction` at the given difficulty.
    #[must_use]
    pub fn new(faction: Faction, difficulty: Difficulty, seed: u64) -> Self {
        Self {
            faction,
            profile: difficulty.profile(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            think_clock: 0.0,
        }
    }

    /// The faction this agent plays.
    #[must_use]
    pub fn faction(&self) -> Faction {
        self.faction
    }

    /// Advance the think timer by `dt` and, when a pass is due, return the
    /// commands for this tick. Off-cadence calls return nothing.
    pub fn update(&mut self, world: &WorldState, stats: &StatTable, dt: f32) -> Vec<Command> {
        if world.winner.is_some() {
            return Vec::new();
        }
        self.think_clock += dt;
        let interval = self.profile.think_interval();
        if self.think_clock < interval {
            return Vec::new();
        }
        self.think_clock %= interval;
        self.think(world, stats)
    }

    /// One full decision pass over the current world.
    fn think(&mut self, world: &WorldState, stats: &StatTable) -> Vec<Command> {
        let mut commands = Vec::new();

        let defending = self.defend(world, &mut commands);
        self.economy(world, stats, &mut commands);
        self.military(world, stats, &mut commands);
        if !defending {
            self.attack_wave(world, &mut commands);
        }

        tracing::debug!(
            faction = ?self.faction,
            commands = commands.len(),
            defending,
            "ai think pass"
        );
        commands
    }

    // ====== Defend ======

    /// Redirect the army at raiders near the castle. Returns true when a
    /// raid is in progress, which suppresses offensive waves this pass.
    fn defend(&mut self, world: &WorldState, commands: &mut Vec<Command>) -> bool {
        let Some(castle) = world.castle_of(self.faction) else {
            return false;
        };
        let threats: Vec<&Unit> = world
            .units
            .values()
            .filter(|u| u.faction != self.faction && u.pos.distance(castle.pos) < THREAT_RADIUS)
            .collect();
        if threats.len() < THREAT_COUNT {
            return false;
        }

        let nearest = threats
            .iter()
            .min_by(|a, b| {
                a.pos
                    .distance(castle.pos)
                    .total_cmp(&b.pos.distance(castle.pos))
                    .then(a.id.cmp(&b.id))
            })
            .map(|u| u.id);
        let defenders: Vec<EntityId> = self
            .my_military(world)
            .filter(|u| !matches!(u.order, Order::Attack { .. }))
            .map(|u| u.id)
            .collect();
        if let (Some(target), false) = (nearest, defenders.is_empty()) {
            commands.push(Command::Attack {
                units: defenders,
                target,
            });
        }
        true
    }

    // ====== Economy ======

    fn economy(&mut self, world: &WorldState, stats: &StatTable, commands: &mut Vec<Command>) {
        let mut idle_peasants: Vec<EntityId> = world
            .units
            .values()
            .filter(|u| {
                u.faction == self.faction && u.kind == UnitKind::Peasant && u.order == Order::Idle
            })
            .map(|u| u.id)
            .collect();
        idle_peasants.sort_unstable();

        // Crew foundations first so investments finish.
        for id in world.sorted_building_ids() {
            let building = &world.buildings[&id];
            if building.faction != self.faction {
                continue;
            }
            if let ConstructionState::Foundation { builders, .. } = &building.state {
                let wanted = 2usize.saturating_sub(builders.len());
                for _ in 0..wanted {
                    let Some(peasant) = idle_peasants.pop() else {
                        break;
                    };
                    commands.push(Command::AssignBuilder {
                        unit: peasant,
                        building: id,
                    });
                }
            }
        }

        // Then fill worker slots, farms before everything else: food
        // shortages kill armies, gold shortages merely stall them.
        let mut staffable: Vec<EntityId> = world
            .sorted_building_ids()
            .into_iter()
            .filter(|id| {
                let b = &world.buildings[id];
                b.faction == self.faction
                    && b.is_complete()
                    && b.workers.len() < b.stats.generation.max_workers
            })
            .collect();
        staffable.sort_by_key(|id| {
            let b = &world.buildings[id];
            (b.kind != BuildingKind::Farm, *id)
        });
        for id in staffable {
            let free = world.buildings[&id].stats.generation.max_workers
                - world.buildings[&id].workers.len();
            for _ in 0..free {
                let Some(peasant) = idle_peasants.pop() else {
                    break;
                };
                commands.push(Command::AssignWorker {
                    unit: peasant,
                    building: id,
                });
            }
        }

        // Expand when projected income misses the difficulty-scaled target.
        let income = self.income_per_interval(world);
        let pool = world.faction(self.faction).pool;
        let foundations = world
            .buildings
            .values()
            .filter(|b| b.faction == self.faction && !b.is_complete())
            .count();
        if foundations < 2 {
            if income.food < FOOD_RATE_TARGET * self.profile.income_target
                && pool.can_afford(stats.building_cost(BuildingKind::Farm))
            {
                commands.push(Command::PlaceBuilding(
                    BuildingKind::Farm,
                    self.build_spot(world),
                ));
            } else if income.gold < GOLD_RATE_TARGET * self.profile.income_target
                && pool.can_afford(stats.building_cost(BuildingKind::House))
            {
                commands.push(Command::PlaceBuilding(
                    BuildingKind::House,
                    self.build_spot(world),
                ));
            }
        }

        // Keep enough peasants to fill every slot, plus one spare builder.
        let peasants = world
            .units
            .values()
            .filter(|u| u.faction == self.faction && u.kind == UnitKind::Peasant)
            .count();
        let total_slots: usize = world
            .buildings
            .values()
            .filter(|b| b.faction == self.faction)
            .map(|b| b.stats.generation.max_workers)
            .sum();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let peasant_cap = 6 + (self.profile.aggression * 4.0) as usize;
        if (peasants < total_slots + 1 && peasants < peasant_cap) || peasants < 3 {
            commands.push(Command::TrainUnit(UnitKind::Peasant));
        }
    }

    /// Projected payout per generation interval from currently staffed,
    /// completed buildings.
    fn income_per_interval(&self, world: &WorldState) -> Cost {
        let mut total = Cost::ZERO;
        for building in world.buildings.values() {
            if building.faction != self.faction || !building.is_complete() {
                continue;
            }
            let workers = building
                .workers
                .len()
                .min(building.stats.generation.max_workers);
            #[allow(clippy::cast_precision_loss)]
            let amount = building.stats.generation.per_worker.scaled(workers as f32);
            total.gold += amount.gold;
            total.food += amount.food;
            total.wood += amount.wood;
        }
        total
    }

    /// A random spot on the ring around the castle. Placement that lands
    /// on another building gets rejected and re-tried next pass.
    fn build_spot(&mut self, world: &WorldState) -> Vec2 {
        let anchor = world
            .castle_of(self.faction)
            .map_or(Vec2::splat(MAP_SIZE / 2.0), |c| c.pos);
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let dist = self.rng.gen_range(BUILD_RING);
        let spot = anchor + Vec2::new(angle.cos(), angle.sin()) * dist;
        spot.clamp(
            Vec2::splat(MAP_MARGIN + 80.0),
            Vec2::splat(MAP_SIZE - MAP_MARGIN - 80.0),
        )
    }

    // ====== Military ======

    fn military(&mut self, world: &WorldState, stats: &StatTable, commands: &mut Vec<Command>) {
        let military_count = world.military_count(self.faction);
        if military_count >= self.profile.military_cap {
            return;
        }
        let pool = world.faction(self.faction).pool;

        // Cannons are an occasional luxury once a core army exists.
        let cannons = world
            .units
            .values()
            .filter(|u| u.faction == self.faction && u.kind == UnitKind::Cannon)
            .count();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cannon_cap = 1 + (self.profile.aggression * 3.0) as usize;
        if military_count >= 4
            && cannons < cannon_cap
            && self.rng.gen::<f32>() < self.profile.aggression * 0.3
            && pool.can_afford(stats.unit_cost(UnitKind::Cannon))
        {
            commands.push(Command::TrainUnit(UnitKind::Cannon));
            return;
        }

        // Aggressive tiers favour cavalry, everyone falls back to knights.
        if self.rng.gen::<f32>() < self.profile.aggression
            && pool.can_afford(stats.unit_cost(UnitKind::Cavalry))
        {
            commands.push(Command::TrainUnit(UnitKind::Cavalry));
        } else if pool.can_afford(stats.unit_cost(UnitKind::Knight)) {
            commands.push(Command::TrainUnit(UnitKind::Knight));
        }
    }

    // ====== Attack ======

    fn attack_wave(&mut self, world: &WorldState, commands: &mut Vec<Command>) {
        let military_count = world.military_count(self.faction);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let threshold = (5.0 - self.profile.aggression * 3.0).max(3.0) as usize;
        if military_count < threshold {
            return;
        }
        if self.rng.gen::<f32>() >= self.profile.aggression {
            return;
        }

        let Some(target_pos) = world
            .castle_of(self.faction.opponent())
            .map(|c| c.pos)
            .or_else(|| {
                // Castle already gone is a won match in practice, but any
                // remaining enemy presence still gets swept.
                world
                    .units
                    .values()
                    .find(|u| u.faction != self.faction)
                    .map(|u| u.pos)
            })
        else {
            return;
        };

        let wave: Vec<EntityId> = self
            .my_military(world)
            .filter(|u| matches!(u.order, Order::Idle | Order::MoveTo(_)))
            .map(|u| u.id)
            .collect();
        if !wave.is_empty() {
            commands.push(Command::AttackMove {
                units: wave,
                dest: target_pos,
            });
        }
    }

    fn my_military<'w>(&self, world: &'w WorldState) -> impl Iterator<Item = &'w Unit> + 'w {
        let faction = self.faction;
        world
            .units
            .values()
            .filter(move |u| u.faction == faction && u.is_military())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siege_core::prelude::*;
    use siege_core::simulation::TICK_DT;

    fn drive(difficulty: Difficulty, minutes: f32) -> (Simulation, usize) {
        let mut sim = Simulation::standard_match(StatTable::standard(), 3);
        let mut ai = AiOpponent::new(Faction::Blue, difficulty, 3);
        let mut peak_military = 0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = (minutes * 60.0 * TICK_RATE as f32) as u64;
        for _ in 0..ticks {
            // Bottomless treasury: the cap must come from the profile,
            // never from affordability.
            {
                let pool = &mut sim.world_mut().faction_mut(Faction::Blue).pool;
                pool.gold = 1_000_000.0;
                pool.food = 1_000_000.0;
                pool.wood = 1_000_000.0;
            }
            let commands: Vec<(Faction, Command)> = ai
                .update(sim.world(), sim.stats(), TICK_DT)
                .into_iter()
                .map(|c| (Faction::Blue, c))
                .collect();
            sim.tick(&commands);
            peak_military = peak_military.max(sim.world().military_count(Faction::Blue));
            if sim.winner().is_some() {
                break;
            }
        }
        (sim, peak_military)
    }

    #[test]
    fn brutal_never_exceeds_its_military_cap() {
        let (_, peak) = drive(Difficulty::Brutal, 3.0);
        assert!(peak <= 20, "brutal trained past its cap: {peak}");
        assert!(peak > 0, "brutal never trained at all");
    }

    #[test]
    fn easy_keeps_a_small_army() {
        let (_, peak) = drive(Difficulty::Easy, 3.0);
        assert!(peak <= 5, "easy trained past its cap: {peak}");
    }

    #[test]
    fn ai_builds_an_economy_from_the_standard_opening() {
        let (sim, _) = drive(Difficulty::Normal, 3.0);
        let own_buildings = sim
            .world()
            .buildings
            .values()
            .filter(|b| b.faction == Faction::Blue)
            .count();
        assert!(
            own_buildings > 1,
            "ai never expanded beyond its castle: {own_buildings}"
        );
    }

    #[test]
    fn off_cadence_updates_emit_nothing() {
        let sim = Simulation::standard_match(StatTable::standard(), 3);
        let mut ai = AiOpponent::new(Faction::Blue, Difficulty::Normal, 3);
        // Normal thinks every 2 seconds; a single tick is far short.
        let commands = ai.update(sim.world(), sim.stats(), TICK_DT);
        assert!(commands.is_empty());
    }

    #[test]
    fn ai_defends_a_raided_castle() {
        let mut sim = Simulation::standard_match(StatTable::standard(), 3);
        let stats = sim.stats().clone();
        let castle_pos = sim.world().castle_of(Faction::Blue).unwrap().pos;
        {
            let world = sim.world_mut();
            // A raid inside the threat radius, and a defender to respond.
            for offset in [Vec2::new(-200.0, 0.0), Vec2::new(-220.0, 40.0)] {
                world.spawn_unit(&stats, Faction::Red, UnitKind::Knight, castle_pos + offset);
            }
            world.spawn_unit(&stats, Faction::Blue, UnitKind::Knight, castle_pos);
        }

        let mut ai = AiOpponent::new(Faction::Blue, Difficulty::Normal, 3);
        let commands = ai.update(sim.world(), sim.stats(), 2.5);
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, Command::Attack { .. })),
            "no defensive attack issued: {commands:?}"
        );
    }
}
