//! Determinism testing harness.
//!
//! Host-authoritative multiplayer replays the host's command stream on a
//! replica, so the simulation must be bit-for-bit reproducible. Sources
//! of non-determinism to watch:
//!
//! - **HashMap iteration order**: always iterate in sorted entity id order.
//! - **System randomness**: chance rolls only through the seeded RNG
//!   carried in `WorldState`.
//! - **Wall-clock time**: the simulation only ever sees the fixed tick dt.

use siege_core::prelude::*;

/// Result of replaying one scenario several times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Final state hash from each run.
    pub hashes: Vec<u64>,
    /// Ticks simulated per run.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Whether every run agreed.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// Assert that all runs produced the same hash.
    ///
    /// # Panics
    ///
    /// Panics with the full hash list when any run diverged.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "simulation diverged over {} ticks: hashes {:?}",
            self.ticks,
            self.hashes
        );
    }
}

/// Run the same seeded scenario `runs` times for `ticks` ticks each and
/// collect the final hashes.
///
/// `commands(tick)` supplies the scripted input for each tick, identical
/// across runs.
pub fn replay<F>(seed: u64, runs: usize, ticks: u64, commands: F) -> DeterminismResult
where
    F: Fn(u64) -> Vec<(Faction, Command)>,
{
    let hashes = (0..runs)
        .map(|_| {
            let mut sim = Simulation::standard_match(StatTable::standard(), seed);
            for tick in 0..ticks {
                sim.tick(&commands(tick));
            }
            sim.state_hash()
        })
        .collect();
    DeterminismResult { hashes, ticks }
}
