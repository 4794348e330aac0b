//! Wire protocol: message shapes and framing.
//!
//! Every message is a bincode-encoded [`WireMessage`] preceded by a 4-byte
//! big-endian length. Length-prefix framing keeps the reader trivial and makes
//! a truncated stream detectable as a short read rather than a garbled decode.

use siege_core::command::Command;
use siege_core::world::Faction;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{NetError, Result};

/// Default TCP port for hosted matches.
pub const DEFAULT_PORT: u16 = 5555;

/// Hard ceiling on a single frame. Snapshots of a full late-game world sit
/// well under a megabyte; anything near this limit is a corrupt length prefix.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// How long a connection may stay silent before it is declared dead.
pub const IDLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// ====== Messages ======

/// Everything that crosses the wire during a match.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum WireMessage {
    /// A replica asking the host to run a command for its faction.
    Command {
        /// Faction the sender claims to control.
        faction: Faction,
        /// The requested command, validated host-side before it takes effect.
        command: Command,
    },
    /// Host-to-replica state for one completed tick.
    Sync {
        /// Tick the payload describes.
        tick: u64,
        /// Host's state checksum *after* this tick, for desync detection.
        state_hash: u64,
        /// Echoed commands or a full snapshot.
        payload: SyncPayload,
    },
    /// Replica telling the host its checksum diverged; answer with a snapshot.
    ResyncRequest,
    /// Traffic for the idle timer. The host's sync stream keeps its direction
    /// warm for free; a quiet replica sends these so it isn't declared dead.
    KeepAlive,
}

/// Body of a [`WireMessage::Sync`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SyncPayload {
    /// All commands the host accepted this tick, in application order.
    CommandEcho(Vec<(Faction, Command)>),
    /// A bincode snapshot of the whole simulation. Replaces replica state.
    FullSnapshot(Vec<u8>),
}

// ====== Framing ======

/// Encode a message into a length-prefixed frame.
pub fn encode_frame(message: &WireMessage) -> Result<Vec<u8>> {
    let body = bincode::serialize(message)?;
    let len = u32::try_from(body.len())
        .map_err(|_| NetError::FrameTooLarge(u64::try_from(body.len()).unwrap_or(u64::MAX)))?;
    if len > MAX_FRAME_LEN {
        return Err(NetError::FrameTooLarge(u64::from(len)));
    }
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Write one framed message to an async stream.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, message: &WireMessage) -> Result<()> {
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message from an async stream.
///
/// A clean EOF mid-frame (or before the length prefix) surfaces as
/// [`NetError::Disconnected`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<WireMessage> {
    let mut len_bytes = [0_u8; 4];
    read_exact_or_disconnect(reader, &mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(NetError::FrameTooLarge(u64::from(len)));
    }
    let mut body = vec![0_u8; len as usize];
    read_exact_or_disconnect(reader, &mut body).await?;
    Ok(bincode::deserialize(&body)?)
}

async fn read_exact_or_disconnect<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<()> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(NetError::Disconnected),
        Err(e) => Err(e.into()),
    }
}

// ====== Tests ======
