//! Networking for two-player siegeline matches.
//!
//! The simulation is host-authoritative: the replica sends raw
//! [`Command`](siege_core::command::Command)s upstream, the host validates them
//! against its own simulation and echoes the accepted per-tick command list
//! back down. Both sides feed the same command stream into identical
//! [`Simulation`](siege_core::simulation::Simulation)s, so the only bytes on the
//! wire are commands, per-tick echoes with a state checksum, and the occasional
//! full snapshot when a checksum disagrees.
//!
//! All socket I/O runs on a dedicated tokio runtime owned by [`NetLink`]; the
//! simulation thread talks to it exclusively through non-blocking queues.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod link;
pub mod protocol;
pub mod sync;

pub use link::NetLink;
pub use protocol::{SyncPayload, WireMessage, DEFAULT_PORT};
pub use sync::{HostSession, ReplicaSession, SNAPSHOT_INTERVAL};

// ====== Errors ======

/// Errors surfaced by the networking layer.
///
/// A [`NetError::Disconnected`] is terminal for the match: a dropped peer is
/// an immediate end state, not something to paper over with reconnect
/// attempts.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Socket-level failure.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame failed to encode or decode.
    #[error("frame codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// A peer announced a frame larger than [`protocol::MAX_FRAME_LEN`].
    #[error("frame of {0} bytes exceeds the wire limit")]
    FrameTooLarge(u64),

    /// The peer went away (clean close, reset, or idle timeout).
    #[error("peer disconnected")]
    Disconnected,

    /// Simulation-side failure while applying a snapshot.
    #[error(transparent)]
    Sim(#[from] siege_core::error::SimError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
