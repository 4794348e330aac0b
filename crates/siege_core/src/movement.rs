//! Straight-line movement toward order goals.
//!
//! No pathfinding, no collision — units walk the direct line and clamp to
//! the map edge. Attack orders only close distance here; the actual
//! swing happens in [`crate::combat`].

use glam::Vec2;

use crate::stats::ARRIVAL_EPSILON;
use crate::world::{EntityId, Order, WorldState};

/// Advance every ordered unit by one step of `dt` seconds.
///
/// Speed and range were copied into each unit at spawn, so this layer
/// needs no table lookup.
pub fn step(world: &mut WorldState, dt: f32) {
    let unit_ids = world.sorted_unit_ids();
    for id in unit_ids {
        step_unit(world, id, dt);
    }
}

fn step_unit(world: &mut WorldState, id: EntityId, dt: f32) {
    let Some(unit) = world.units.get(&id) else {
        return;
    };
    let speed = unit.stats.speed;
    let pos = unit.pos;

    match unit.order {
        Order::Idle => {}
        Order::MoveTo(dest) | Order::AttackMove(dest) => {
            let (next, arrived) = advance(pos, dest, speed, dt, ARRIVAL_EPSILON);
            if let Some(u) = world.units.get_mut(&id) {
                u.pos = next;
                if arrived {
                    u.order = Order::Idle;
                }
            }
        }
        Order::Attack { target, .. } => {
            // Close until the weapon reaches. Building targets get their
            // half-extent added so melee can reach a castle wall.
            let goal = world
                .units
                .get(&target)
                .map(|t| (t.pos, unit.stats.range))
                .or_else(|| {
                    world
                        .buildings
                        .get(&target)
                        .map(|b| (b.pos, unit.stats.range + b.stats.half_extent()))
                });
            let Some((target_pos, reach)) = goal else {
                // Dead target; combat retargets and the end-of-tick prune
                // cleans up, nothing to do here.
                return;
            };
            if pos.distance(target_pos) > reach {
                let (next, _) = advance(pos, target_pos, speed, dt, reach);
                if let Some(u) = world.units.get_mut(&id) {
                    u.pos = next;
                }
            }
        }
        Order::Construct(site) | Order::Work(site) => {
            let Some(building) = world.buildings.get(&site) else {
                return;
            };
            let stand_off = building.stats.half_extent() + ARRIVAL_EPSILON;
            let target_pos = building.pos;
            if pos.distance(target_pos) > stand_off {
                let (next, _) = advance(pos, target_pos, speed, dt, stand_off);
                if let Some(u) = world.units.get_mut(&id) {
                    u.pos = next;
                }
            }
        }
    }
}

/// One straight-line step toward `goal`, stopping at `stop_within`.
///
/// Returns the new position and whether the stop distance was reached.
fn advance(pos: Vec2, goal: Vec2, speed: f32, dt: f32, stop_within: f32) -> (Vec2, bool) {
    let remaining = pos.distance(goal);
    if remaining <= stop_within {
        return (pos, true);
    }
    let step_len = speed * dt;
    if step_len >= remaining - stop_within {
        // Land exactly on the stop ring rather than overshooting.
        let dir = (goal - pos) / remaining;
        let next = WorldState::clamp_to_map(pos + dir * (remaining - stop_within));
        return (next, true);
    }
    let dir = (goal - pos) / remaining;
    (WorldState::clamp_to_map(pos + dir * step_len), false)
}
