//! Fixed-timestep match drivers.
//!
//! Three ways to run a match without a renderer:
//!
//! - [`run_skirmish`]: two AI opponents in one process, ticked flat-out. The
//!   workhorse for balance passes and soak tests.
//! - [`run_host`]: host a networked match at real-time 60 Hz; the local seat
//!   is AI-driven, the remote player commands Blue through the sync layer.
//! - [`run_join`]: the replica side of the same arrangement.
//!
//! Networked loops pace themselves with a wall-clock accumulator so a slow
//! tick is caught up rather than stretched; skirmishes skip pacing entirely.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use siege_ai::AiOpponent;
use siege_core::events::{GameEvent, TickEvents};
use siege_core::simulation::{Simulation, TICK_DT};
use siege_core::world::Faction;
use siege_net::{HostSession, NetLink, ReplicaSession};
use thiserror::Error;

use crate::config::{ConfigError, MatchConfig};

/// Error type for match drivers.
#[derive(Error, Debug)]
pub enum GameLoopError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Network failure or peer disconnect.
    #[error(transparent)]
    Net(#[from] siege_net::NetError),
    /// Two runs of the same seed disagreed.
    #[error(transparent)]
    Desync(#[from] siege_core::error::SimError),
}

/// How a driven match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Winning faction, or `None` when the duration cap expired first.
    pub winner: Option<Faction>,
    /// Ticks simulated.
    pub ticks: u64,
    /// Units still standing per faction, Red then Blue.
    pub units_standing: [usize; 2],
}

fn outcome_of(sim: &Simulation) -> MatchOutcome {
    MatchOutcome {
        winner: sim.winner(),
        ticks: sim.current_tick(),
        units_standing: [Faction::Red, Faction::Blue].map(|faction| {
            sim.world()
                .units
                .values()
                .filter(|unit| unit.faction == faction)
                .count()
        }),
    }
}

// ====== AI vs AI skirmish ======

/// Run an unpaced AI-vs-AI match to completion or the duration cap.
pub fn run_skirmish(config: &MatchConfig) -> Result<MatchOutcome, GameLoopError> {
    let stats = config.stat_table()?;
    let mut sim = Simulation::standard_match(stats, config.seed);

    // Distinct AI streams per seat; the world carries its own RNG, so AI
    // seeds only shape decisions, never simulation state directly.
    let mut red = AiOpponent::new(Faction::Red, config.red_difficulty, config.seed);
    let mut blue = AiOpponent::new(
        Faction::Blue,
        config.blue_difficulty,
        config.seed.wrapping_add(0x9E37_79B9),
    );

    let max_ticks = config.max_ticks();
    while sim.winner().is_none() && sim.current_tick() < max_ticks {
        let commands = gather_ai_commands(&mut [&mut red, &mut blue], &sim);
        let events = sim.tick(&commands);
        log_notable_events(&events);
    }

    let outcome = outcome_of(&sim);
    match outcome.winner {
        Some(winner) => tracing::info!(?winner, ticks = outcome.ticks, "skirmish decided"),
        None => tracing::info!(ticks = outcome.ticks, "skirmish hit the duration cap, calling it a draw"),
    }
    Ok(outcome)
}

/// Run the same skirmish `runs` times and check every run lands on the same
/// final checksum. Returns the agreed hash.
pub fn verify_determinism(config: &MatchConfig, runs: u32) -> Result<u64, GameLoopError> {
    let mut agreed: Option<u64> = None;
    for run in 0..runs.max(1) {
        let stats = config.stat_table()?;
        let mut sim = Simulation::standard_match(stats, config.seed);
        let mut red = AiOpponent::new(Faction::Red, config.red_difficulty, config.seed);
        let mut blue = AiOpponent::new(
            Faction::Blue,
            config.blue_difficulty,
            config.seed.wrapping_add(0x9E37_79B9),
        );
        let max_ticks = config.max_ticks();
        while sim.winner().is_none() && sim.current_tick() < max_ticks {
            let commands = gather_ai_commands(&mut [&mut red, &mut blue], &sim);
            sim.tick(&commands);
        }
        let hash = sim.state_hash();
        tracing::info!(run, hash = format_args!("{hash:016x}"), "verification run finished");
        match agreed {
            None => agreed = Some(hash),
            Some(expected) if expected == hash => {}
            Some(expected) => {
                tracing::error!(
                    run,
                    expected = format_args!("{expected:016x}"),
                    got = format_args!("{hash:016x}"),
                    "determinism violation"
                );
                return Err(GameLoopError::Desync(
                    siege_core::error::SimError::DesyncDetected {
                        tick: sim.current_tick(),
                        local_hash: hash,
                        remote_hash: expected,
                    },
                ));
            }
        }
    }
    Ok(agreed.unwrap_or_default())
}

// ====== Networked host ======

/// Host a match: bind the configured port, wait for an opponent, then drive
/// the authoritative simulation at real-time rate with the local seat on AI.
pub fn run_host(config: &MatchConfig) -> Result<MatchOutcome, GameLoopError> {
    let (mut link, bound) = NetLink::host(config.port)?;
    tracing::info!(port = bound, "waiting for an opponent");
    while !link.is_connected() {
        std::thread::sleep(Duration::from_millis(50));
    }

    let stats = config.stat_table()?;
    let mut sim = Simulation::standard_match(stats, config.seed);
    let mut session = HostSession::new(Faction::Blue);
    let mut local_ai = AiOpponent::new(Faction::Red, config.red_difficulty, config.seed);

    let mut pacer = Pacer::new();
    let max_ticks = config.max_ticks();
    while sim.winner().is_none() && sim.current_tick() < max_ticks {
        pacer.wait_for_tick();

        let mut commands = session.drain_commands(&mut link);
        commands.extend(
            local_ai
                .update(sim.world(), sim.stats(), TICK_DT)
                .into_iter()
                .map(|command| (Faction::Red, command)),
        );
        let events = sim.tick(&commands);
        log_notable_events(&events);
        session.publish_tick(&link, &sim, commands)?;
    }

    Ok(outcome_of(&sim))
}

// ====== Networked replica ======

/// Join a hosted match as Blue, with the local seat on AI.
///
/// The replica has no clock authority: it pumps the host's echo stream and
/// ticks exactly as instructed, so its pacing loop only bounds polling rate.
pub fn run_join(config: &MatchConfig, addr: SocketAddr) -> Result<MatchOutcome, GameLoopError> {
    let mut link = NetLink::connect(addr)?;
    let stats = config.stat_table()?;
    // Placeholder world; the host's opening snapshot replaces it.
    let mut sim = Simulation::new(stats, 0);
    let mut session = ReplicaSession::new(Faction::Blue);
    let mut local_ai = AiOpponent::new(Faction::Blue, config.blue_difficulty, config.seed);

    let mut pacer = Pacer::new();
    loop {
        pacer.wait_for_tick();

        for command in local_ai.update(sim.world(), sim.stats(), TICK_DT) {
            session.send_command(&link, command)?;
        }
        let update = session.pump(&mut link, &mut sim)?;
        for tick in &update.ticks {
            log_notable_events(tick);
        }
        if sim.winner().is_some() {
            return Ok(outcome_of(&sim));
        }
    }
}

// ====== Shared plumbing ======

/// Wall-clock accumulator holding the loop at 60 ticks per second. Falling
/// behind burns the backlog instead of slowing game time.
struct Pacer {
    next_tick: Instant,
}

impl Pacer {
    fn new() -> Self {
        Self {
            next_tick: Instant::now(),
        }
    }

    fn wait_for_tick(&mut self) {
        let period = Duration::from_secs_f32(TICK_DT);
        let now = Instant::now();
        if self.next_tick > now {
            std::thread::sleep(self.next_tick - now);
        }
        self.next_tick += period;
        // A long stall would otherwise trigger a burst of thousands of
        // catch-up ticks; cap the backlog at one second.
        if now > self.next_tick + Duration::from_secs(1) {
            self.next_tick = now;
        }
    }
}

fn gather_ai_commands(
    seats: &mut [&mut AiOpponent],
    sim: &Simulation,
) -> Vec<(Faction, siege_core::command::Command)> {
    let mut commands = Vec::new();
    for ai in seats.iter_mut() {
        let faction = ai.faction();
        commands.extend(
            ai.update(sim.world(), sim.stats(), TICK_DT)
                .into_iter()
                .map(|command| (faction, command)),
        );
    }
    commands
}

/// Surface match-shaping events in the log stream; per-hit spam stays at
/// trace level inside the simulation itself.
fn log_notable_events(events: &TickEvents) {
    for event in &events.events {
        match event {
            GameEvent::BuildingDestroyed { .. }
            | GameEvent::GameOver { .. }
            | GameEvent::Starvation { .. } => {
                tracing::info!(?event, "match event");
            }
            GameEvent::ConstructionComplete { .. } | GameEvent::UnitTrained { .. } => {
                tracing::debug!(?event, "match event");
            }
            _ => {}
        }
    }
}

// ====== Tests ======

#[cfg(test)]
mod tests {
    use super::*;
    use siege_ai::Difficulty;

    fn quick_config() -> MatchConfig {
        MatchConfig {
            seed: 1234,
            red_difficulty: Difficulty::Brutal,
            blue_difficulty: Difficulty::Easy,
            max_minutes: 5,
            ..MatchConfig::default()
        }
    }

    #[test]
    fn a_skirmish_always_terminates() {
        let outcome = run_skirmish(&quick_config()).unwrap();
        assert!(outcome.ticks <= quick_config().max_ticks());
        assert!(outcome.winner.is_some() || outcome.ticks == quick_config().max_ticks());
    }

    #[test]
    fn verification_accepts_its_own_reruns() {
        let config = MatchConfig {
            max_minutes: 1,
            ..quick_config()
        };
        let hash = verify_determinism(&config, 3).unwrap();
        assert_ne!(hash, 0);
    }

    #[test]
    fn hosted_match_feeds_a_joined_replica() {
        let config = MatchConfig {
            max_minutes: 1,
            ..quick_config()
        };
        let (mut host_link, port) = NetLink::host(0).unwrap();
        let host_config = config.clone();
        let host_thread = std::thread::spawn(move || {
            while !host_link.is_connected() {
                std::thread::sleep(Duration::from_millis(10));
            }
            let stats = host_config.stat_table().unwrap();
            let mut sim = Simulation::standard_match(stats, host_config.seed);
            let mut session = HostSession::new(Faction::Blue);
            // A short burst of ticks is enough to exercise snapshot + echo.
            for _ in 0..120 {
                let commands = session.drain_commands(&mut host_link);
                sim.tick(&commands);
                session.publish_tick(&host_link, &sim, commands).unwrap();
            }
            sim.state_hash()
        });

        let mut replica_link = NetLink::connect(([127, 0, 0, 1], port).into()).unwrap();
        let mut replica_sim = Simulation::new(config.stat_table().unwrap(), 0);
        let mut replica_session = ReplicaSession::new(Faction::Blue);
        let host_hash = host_thread.join().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match replica_session.pump(&mut replica_link, &mut replica_sim) {
                Ok(_) if replica_sim.current_tick() == 120 => break,
                Ok(_) => {}
                // Host hung up after its last publish; buffered ticks are
                // drained by then.
                Err(siege_net::NetError::Disconnected) => break,
                Err(e) => panic!("pump failed: {e}"),
            }
            assert!(Instant::now() < deadline, "replica never caught up");
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(replica_sim.current_tick(), 120);
        assert_eq!(replica_sim.state_hash(), host_hash);
    }
}
