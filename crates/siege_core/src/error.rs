//! Error types for the simulation core.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for simulation failures.
///
/// Note that rejected player commands are *not* errors — they are normal
/// gameplay outcomes reported through [`crate::command::RejectReason`].
/// `SimError` covers genuine faults: broken snapshots, impossible state.
#[derive(Debug, Error)]
pub enum SimError {
    /// An entity id referenced state that no longer exists.
    #[error("entity not found: {0}")]
    EntityNotFound(u64),

    /// Snapshot encode/decode failure.
    #[error("snapshot codec error: {0}")]
    Snapshot(#[from] bincode::Error),

    /// Stat table override file failed to parse.
    #[error("failed to parse stat overrides: {0}")]
    StatParse(#[from] ron::error::SpannedError),

    /// The simulation reached a state it should never be in.
    #[error("invalid simulation state: {0}")]
    InvalidState(String),

    /// Host and replica disagree on the world checksum.
    #[error("desync detected at tick {tick}: local hash {local_hash:#x}, remote hash {remote_hash:#x}")]
    DesyncDetected {
        /// Tick where the mismatch was observed.
        tick: u64,
        /// Checksum computed locally.
        local_hash: u64,
        /// Checksum reported by the remote side.
        remote_hash: u64,
    },
}
