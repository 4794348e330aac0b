//! Target acquisition and damage resolution.
//!
//! Runs once per tick, after movement. Damage is `max(1, attack - defense)`
//! so even the heaviest armour bleeds. Health is only decremented here —
//! removal of the dead happens in the end-of-tick sweep so every attacker
//! within one tick sees the same target set.

use glam::Vec2;
use rand::Rng;

use crate::events::GameEvent;
use crate::stats::{StatTable, AUTO_AGGRO_FACTOR};
use crate::world::{EntityId, Faction, Order, WorldState};

/// Damage applied after flat defense reduction, floored at 1.
#[must_use]
pub fn damage_after_defense(attack: i32, defense: i32) -> i32 {
    (attack - defense).max(1)
}

/// Resolve one tick of combat. Returns the hits, misses and retarget
/// fallout as events.
pub fn resolve(world: &mut WorldState, stats: &StatTable, dt: f32) -> Vec<GameEvent> {
    let mut events = Vec::new();

    tick_cooldowns(world, dt);
    acquire_targets(world);
    resolve_unit_attacks(world, &mut events);
    resolve_tower_fire(world, stats, &mut events);

    events
}

fn tick_cooldowns(world: &mut WorldState, dt: f32) {
    for unit in world.units.values_mut() {
        unit.cooldown_remaining = (unit.cooldown_remaining - dt).max(0.0);
    }
    for building in world.buildings.values_mut() {
        building.weapon_cooldown = (building.weapon_cooldown - dt).max(0.0);
    }
}

/// Autonomous engagement: idle and attack-moving military units lock onto
/// the nearest enemy within three weapon ranges.
///
/// Plain `MoveTo` and explicit `Attack` orders are never overridden, and
/// peasants never self-engage.
fn acquire_targets(world: &mut WorldState) {
    let unit_ids = world.sorted_unit_ids();
    for id in unit_ids {
        let Some(unit) = world.units.get(&id) else {
            continue;
        };
        if !unit.is_military() {
            continue;
        }
        let resume = match unit.order {
            Order::Idle => None,
            Order::AttackMove(dest) => Some(dest),
            _ => continue,
        };
        let radius = unit.stats.range * AUTO_AGGRO_FACTOR;
        if let Some(target) = nearest_enemy(world, unit.faction, unit.pos, radius) {
            if let Some(u) = world.units.get_mut(&id) {
                u.order = Order::Attack { target, resume };
            }
        }
    }
}

/// Nearest living enemy unit or completed enemy building within `radius`.
///
/// Foundations are invisible to acquisition. Ties break toward the lower
/// id so replicas agree.
fn nearest_enemy(
    world: &WorldState,
    faction: Faction,
    from: Vec2,
    radius: f32,
) -> Option<EntityId> {
    let mut best: Option<(f32, EntityId)> = None;
    let mut consider = |id: EntityId, pos: Vec2| {
        let dist = from.distance(pos);
        if dist > radius {
            return;
        }
        let better = match best {
            None => true,
            Some((best_dist, best_id)) => {
                dist < best_dist || (dist == best_dist && id < best_id)
            }
        };
        if better {
            best = Some((dist, id));
        }
    };

    for id in world.sorted_unit_ids() {
        let unit = &world.units[&id];
        if unit.faction != faction && unit.health > 0 {
            consider(id, unit.pos);
        }
    }
    for id in world.sorted_building_ids() {
        let building = &world.buildings[&id];
        if building.faction != faction && building.health > 0 && building.is_complete() {
            consider(id, building.pos);
        }
    }

    best.map(|(_, id)| id)
}

fn resolve_unit_attacks(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let unit_ids = world.sorted_unit_ids();
    for id in unit_ids {
        let Some(unit) = world.units.get(&id) else {
            continue;
        };
        let Order::Attack { target, resume } = unit.order else {
            continue;
        };
        let attacker_pos = unit.pos;
        let attack = unit.stats.attack;
        let range = unit.stats.range;
        let ready = unit.cooldown_remaining <= 0.0;

        // (position, effective reach, defense) of whatever we're hitting.
        let target_info = world
            .units
            .get(&target)
            .filter(|t| t.health > 0)
            .map(|t| (t.pos, range, t.stats.defense))
            .or_else(|| {
                world
                    .buildings
                    .get(&target)
                    .filter(|b| b.health > 0)
                    .map(|b| (b.pos, range + b.stats.half_extent(), 0))
            });

        let Some((target_pos, reach, defense)) = target_info else {
            // Target gone: attack-movers resume their march, everyone
            // else stands down.
            if let Some(u) = world.units.get_mut(&id) {
                u.order = match resume {
                    Some(dest) => Order::AttackMove(dest),
                    None => Order::Idle,
                };
            }
            continue;
        };

        let dist = attacker_pos.distance(target_pos);

        // Opportunistic targets are dropped once they leave the aggro
        // leash; the unit goes back to its real destination.
        if resume.is_some() && dist > range * AUTO_AGGRO_FACTOR {
            if let Some(u) = world.units.get_mut(&id) {
                if let Some(dest) = resume {
                    u.order = Order::AttackMove(dest);
                }
            }
            continue;
        }

        if dist > reach || !ready {
            continue;
        }

        let damage = damage_after_defense(attack, defense);
        if let Some(t) = world.units.get_mut(&target) {
            t.health -= damage;
        } else if let Some(b) = world.buildings.get_mut(&target) {
            b.health -= damage;
        }
        if let Some(u) = world.units.get_mut(&id) {
            u.cooldown_remaining = u.stats.cooldown;
        }
        events.push(GameEvent::CombatHit {
            attacker: id,
            target,
            damage,
        });
    }
}

/// Crewed towers fire at the nearest enemy in range, with a hit-chance
/// gate. A miss still spends the cooldown.
fn resolve_tower_fire(world: &mut WorldState, stats: &StatTable, events: &mut Vec<GameEvent>) {
    let weapon = stats.tower();
    let tower_ids: Vec<EntityId> = world
        .sorted_building_ids()
        .into_iter()
        .filter(|id| {
            let b = &world.buildings[id];
            b.kind == crate::stats::BuildingKind::Tower
                && b.is_complete()
                && b.health > 0
                && b.workers.len() >= weapon.min_crew
                && b.weapon_cooldown <= 0.0
        })
        .collect();

    for tower_id in tower_ids {
        let tower_pos = world.buildings[&tower_id].pos;
        let tower_faction = world.buildings[&tower_id].faction;
        let Some(target) = nearest_enemy(world, tower_faction, tower_pos, weapon.range) else {
            continue;
        };

        if let Some(b) = world.buildings.get_mut(&tower_id) {
            b.weapon_cooldown = weapon.cooldown;
        }

        let hit = world.rng.gen::<f32>() < weapon.hit_chance;
        if !hit {
            events.push(GameEvent::TowerMissed { tower: tower_id });
            continue;
        }

        let defense = world.units.get(&target).map_or(0, |t| t.stats.defense);
        let damage = damage_after_defense(weapon.attack, defense);
        if let Some(t) = world.units.get_mut(&target) {
            t.health -= damage;
        } else if let Some(b) = world.buildings.get_mut(&target) {
            b.health -= damage;
        }
        events.push(GameEvent::CombatHit {
            attacker: tower_id,
            target,
            damage,
        });
    }
}
