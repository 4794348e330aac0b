//! Host-authoritative lockstep sync.
//!
//! The host runs the real match. Each tick it gathers local commands plus
//! whatever the replica sent upstream, ticks its simulation, and publishes a
//! [`SyncPayload::CommandEcho`] carrying the accepted command list and its
//! post-tick checksum. The replica never advances on its own clock: it ticks
//! once per echo, with exactly the echoed commands, then compares checksums.
//! On mismatch it asks for a [`SyncPayload::FullSnapshot`] and replaces its
//! world wholesale.

use siege_core::command::Command;
use siege_core::events::TickEvents;
use siege_core::simulation::Simulation;
use siege_core::world::Faction;

use crate::protocol::{SyncPayload, WireMessage};
use crate::{NetError, NetLink, Result};

/// Ticks between unsolicited snapshots. A snapshot every ten seconds bounds
/// how long a silently-diverged replica can drift before correction.
pub const SNAPSHOT_INTERVAL: u64 = 600;

// ====== Host side ======

/// Host-side session state layered over a [`NetLink`].
pub struct HostSession {
    peer_faction: Faction,
    snapshot_due: bool,
}

impl HostSession {
    /// A new session whose remote player controls `peer_faction`.
    #[must_use]
    pub fn new(peer_faction: Faction) -> Self {
        Self {
            peer_faction,
            snapshot_due: true, // opening snapshot seeds the replica
        }
    }

    /// Pull the replica's pending commands off the link.
    ///
    /// The claimed faction in incoming messages is ignored: the remote player
    /// commands its assigned faction and nothing else. A resync request just
    /// flags the next publish to carry a snapshot.
    pub fn drain_commands(&mut self, link: &mut NetLink) -> Vec<(Faction, Command)> {
        let mut commands = Vec::new();
        for message in link.drain_inbound() {
            match message {
                WireMessage::Command { faction, command } => {
                    if faction != self.peer_faction {
                        tracing::warn!(
                            claimed = ?faction,
                            assigned = ?self.peer_faction,
                            "peer claimed the wrong faction, reassigning"
                        );
                    }
                    commands.push((self.peer_faction, command));
                }
                WireMessage::ResyncRequest => {
                    tracing::warn!("replica requested a resync");
                    self.snapshot_due = true;
                }
                WireMessage::KeepAlive => {}
                WireMessage::Sync { .. } => {
                    tracing::warn!("ignoring sync message from non-host peer");
                }
            }
        }
        commands
    }

    /// Publish the tick that just ran: `applied` is the full command list fed
    /// to [`Simulation::tick`], local and remote alike, in order.
    pub fn publish_tick(
        &mut self,
        link: &NetLink,
        sim: &Simulation,
        applied: Vec<(Faction, Command)>,
    ) -> Result<()> {
        if !link.is_connected() {
            return Err(NetError::Disconnected);
        }
        let tick = sim.current_tick();
        let payload = if self.snapshot_due || tick % SNAPSHOT_INTERVAL == 0 {
            self.snapshot_due = false;
            tracing::debug!(tick, "shipping full snapshot");
            SyncPayload::FullSnapshot(sim.snapshot()?)
        } else {
            SyncPayload::CommandEcho(applied)
        };
        link.send(WireMessage::Sync {
            tick,
            state_hash: sim.state_hash(),
            payload,
        })
    }
}

// ====== Replica side ======

/// What a pump pass produced for the caller's event consumers.
#[derive(Debug, Default)]
pub struct ReplicaUpdate {
    /// Events from every tick replayed this pass, oldest first.
    pub ticks: Vec<TickEvents>,
    /// Set when a snapshot replaced the local world this pass.
    pub resynced: bool,
}

/// Pump passes between replica keepalives. At a 60 Hz pump cadence this is
/// one keepalive every two seconds, well inside the ten-second idle window.
const KEEPALIVE_PUMPS: u32 = 120;

/// Replica-side session state layered over a [`NetLink`].
pub struct ReplicaSession {
    faction: Faction,
    awaiting_resync: bool,
    pumps_since_keepalive: u32,
}

impl ReplicaSession {
    /// A new session playing `faction`.
    #[must_use]
    pub fn new(faction: Faction) -> Self {
        Self {
            faction,
            awaiting_resync: false,
            pumps_since_keepalive: 0,
        }
    }

    /// The faction this player controls.
    #[must_use]
    pub fn faction(&self) -> Faction {
        self.faction
    }

    /// Ship a local command upstream for host validation.
    pub fn send_command(&self, link: &NetLink, command: Command) -> Result<()> {
        link.send(WireMessage::Command {
            faction: self.faction,
            command,
        })
    }

    /// Apply everything the host has published since the last pass.
    ///
    /// Echo ticks while a resync is pending are dropped rather than replayed:
    /// the local world is known-bad until the snapshot lands.
    ///
    /// A dead link only errors once its buffered messages have been consumed,
    /// so a host that finishes the match and hangs up still gets its final
    /// ticks applied.
    pub fn pump(&mut self, link: &mut NetLink, sim: &mut Simulation) -> Result<ReplicaUpdate> {
        self.pumps_since_keepalive += 1;
        if self.pumps_since_keepalive >= KEEPALIVE_PUMPS {
            self.pumps_since_keepalive = 0;
            link.send(WireMessage::KeepAlive)?;
        }

        let mut update = ReplicaUpdate::default();
        for message in link.drain_inbound() {
            match message {
                WireMessage::Sync {
                    tick,
                    state_hash,
                    payload: SyncPayload::CommandEcho(commands),
                } => {
                    if self.awaiting_resync {
                        continue;
                    }
                    update.ticks.push(sim.tick(&commands));
                    if sim.state_hash() != state_hash {
                        tracing::error!(
                            tick,
                            local = sim.state_hash(),
                            remote = state_hash,
                            "checksum mismatch, requesting resync"
                        );
                        self.awaiting_resync = true;
                        link.send(WireMessage::ResyncRequest)?;
                    }
                }
                WireMessage::Sync {
                    tick,
                    payload: SyncPayload::FullSnapshot(bytes),
                    ..
                } => {
                    tracing::debug!(tick, "applying full snapshot");
                    *sim = Simulation::restore(&bytes)?;
                    self.awaiting_resync = false;
                    update.resynced = true;
                }
                WireMessage::KeepAlive => {}
                WireMessage::Command { .. } | WireMessage::ResyncRequest => {
                    tracing::warn!("ignoring host-bound message on replica side");
                }
            }
        }
        if !link.is_connected() && update.ticks.is_empty() && !update.resynced {
            return Err(NetError::Disconnected);
        }
        Ok(update)
    }
}

// ====== Tests ======
