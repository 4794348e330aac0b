//! A live connection to the other player.
//!
//! [`NetLink`] owns a private tokio runtime so the simulation thread never
//! blocks on the socket: sending pushes onto an unbounded queue, receiving
//! drains whatever the reader task has parked since the last tick. Match flow
//! code polls [`NetLink::drain_inbound`] once at the top of each tick.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{read_frame, write_frame, WireMessage, IDLE_TIMEOUT};
use crate::{NetError, Result};

/// How long a closing link waits for the writer task to drain the queue.
const SHUTDOWN_FLUSH: Duration = Duration::from_secs(5);

/// One end of a match connection. Host and replica sides are symmetric at
/// this layer; the asymmetry lives in [`crate::sync`].
///
/// Dropping the link closes the outbound queue and waits for the writer
/// task to drain it, so everything queued before the drop still reaches
/// the peer.
pub struct NetLink {
    runtime: tokio::runtime::Runtime,
    outbound: Option<mpsc::UnboundedSender<WireMessage>>,
    inbound: mpsc::UnboundedReceiver<WireMessage>,
    connected: Arc<AtomicBool>,
    writer_done: Option<oneshot::Receiver<()>>,
}

impl NetLink {
    /// Bind a listener and accept exactly one peer in the background.
    ///
    /// Returns immediately with the bound port (useful with port 0); messages
    /// sent before the peer arrives queue up and flush on accept.
    pub fn host(port: u16) -> Result<(Self, u16)> {
        let runtime = new_runtime()?;
        let listener = runtime.block_on(TcpListener::bind(("0.0.0.0", port)))?;
        let bound = listener.local_addr()?.port();
        tracing::info!(port = bound, "hosting match, waiting for opponent");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let connected = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&connected);
        runtime.spawn(async move {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "opponent connected");
                    flag.store(true, Ordering::SeqCst);
                    drive_connection(stream, out_rx, in_tx, flag, done_tx).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    flag.store(false, Ordering::SeqCst);
                }
            }
        });

        Ok((
            Self {
                runtime,
                outbound: Some(out_tx),
                inbound: in_rx,
                connected,
                writer_done: Some(done_rx),
            },
            bound,
        ))
    }

    /// Connect to a hosted match.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let runtime = new_runtime()?;
        let stream = runtime.block_on(async {
            tokio::time::timeout(IDLE_TIMEOUT, TcpStream::connect(addr))
                .await
                .map_err(|_| {
                    NetError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    ))
                })?
                .map_err(NetError::Io)
        })?;
        tracing::info!(%addr, "joined match");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let connected = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&connected);
        runtime.spawn(drive_connection(stream, out_rx, in_tx, flag, done_tx));

        Ok(Self {
            runtime,
            outbound: Some(out_tx),
            inbound: in_rx,
            connected,
            writer_done: Some(done_rx),
        })
    }

    /// Whether the peer is (still) on the line.
    ///
    /// For a hosting link this stays `false` until the opponent accepts.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queue a message for the writer task. Never blocks.
    pub fn send(&self, message: WireMessage) -> Result<()> {
        self.outbound
            .as_ref()
            .ok_or(NetError::Disconnected)?
            .send(message)
            .map_err(|_| NetError::Disconnected)
    }

    /// Take everything the reader has parked since the last call. Never
    /// blocks; an empty vec on a live link just means a quiet tick.
    pub fn drain_inbound(&mut self) -> Vec<WireMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.inbound.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Keep the runtime handle alive for session helpers that need to block
    /// briefly (e.g. tests waiting for a peer).
    #[must_use]
    pub fn runtime(&self) -> &tokio::runtime::Runtime {
        &self.runtime
    }

    /// Close the outbound queue and wait until the writer task has drained
    /// it. Further [`NetLink::send`] calls fail with
    /// [`NetError::Disconnected`]. Called automatically on drop.
    pub fn shutdown(&mut self) {
        // Closing the sender lets the writer finish its queue and exit.
        drop(self.outbound.take());
        if let Some(done) = self.writer_done.take() {
            if self.is_connected() {
                // The timeout future must be constructed inside the runtime
                // context, not as a `block_on` argument, or it panics.
                let _ = self
                    .runtime
                    .block_on(async { tokio::time::timeout(SHUTDOWN_FLUSH, done).await });
            }
        }
    }
}

impl Drop for NetLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn new_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("siege-net")
        .enable_all()
        .build()?)
}

/// Pump one TCP stream in both directions until either side gives up.
///
/// `writer_done` fires once the writer task has drained its queue, which
/// is what [`NetLink::shutdown`] waits on.
async fn drive_connection(
    stream: TcpStream,
    mut outbound: mpsc::UnboundedReceiver<WireMessage>,
    inbound: mpsc::UnboundedSender<WireMessage>,
    connected: Arc<AtomicBool>,
    writer_done: oneshot::Sender<()>,
) {
    let (mut reader, mut writer) = stream.into_split();

    let read_flag = Arc::clone(&connected);
    let read_task = tokio::spawn(async move {
        loop {
            let frame = tokio::time::timeout(IDLE_TIMEOUT, read_frame(&mut reader)).await;
            match frame {
                Ok(Ok(message)) => {
                    if inbound.send(message).is_err() {
                        break; // local side dropped the link
                    }
                }
                Ok(Err(NetError::Disconnected)) => {
                    tracing::info!("peer closed the connection");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "read failed, dropping connection");
                    break;
                }
                Err(_) => {
                    tracing::warn!(timeout = ?IDLE_TIMEOUT, "peer idle too long, dropping");
                    break;
                }
            }
        }
        read_flag.store(false, Ordering::SeqCst);
    });

    let write_flag = Arc::clone(&connected);
    let write_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = write_frame(&mut writer, &message).await {
                tracing::warn!(error = %e, "write failed, dropping connection");
                break;
            }
        }
        write_flag.store(false, Ordering::SeqCst);
        let _ = writer_done.send(());
    });

    let _ = tokio::join!(read_task, write_task);
}

// ====== Tests ======

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SyncPayload;
    use siege_core::stats::UnitKind;
    use siege_core::world::Faction;
    use std::time::{Duration, Instant};

    fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(value) = poll() {
                return value;
            }
            assert!(Instant::now() < deadline, "timed out waiting for network");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn loopback_pair_exchanges_messages_both_ways() {
        let (mut host, port) = NetLink::host(0).unwrap();
        let mut client = NetLink::connect(([127, 0, 0, 1], port).into()).unwrap();

        client
            .send(WireMessage::Command {
                faction: Faction::Blue,
                command: siege_core::command::Command::TrainUnit(UnitKind::Cavalry),
            })
            .unwrap();
        let upstream = wait_for(|| host.drain_inbound().pop());
        assert!(matches!(upstream, WireMessage::Command { faction: Faction::Blue, .. }));
        assert!(host.is_connected());

        host.send(WireMessage::Sync {
            tick: 7,
            state_hash: 0xABCD,
            payload: SyncPayload::CommandEcho(Vec::new()),
        })
        .unwrap();
        let downstream = wait_for(|| client.drain_inbound().pop());
        assert!(matches!(downstream, WireMessage::Sync { tick: 7, .. }));
    }

    #[test]
    fn messages_sent_before_accept_arrive_after_connect() {
        let (host, port) = NetLink::host(0).unwrap();
        host.send(WireMessage::ResyncRequest).unwrap();

        let mut client = NetLink::connect(([127, 0, 0, 1], port).into()).unwrap();
        let queued = wait_for(|| client.drain_inbound().pop());
        assert_eq!(queued, WireMessage::ResyncRequest);
    }

    #[test]
    fn queued_messages_flush_before_the_link_closes() {
        let (host, port) = NetLink::host(0).unwrap();
        let mut client = NetLink::connect(([127, 0, 0, 1], port).into()).unwrap();
        wait_for(|| host.is_connected().then_some(()));

        for tick in 0..200 {
            host.send(WireMessage::Sync {
                tick,
                state_hash: tick,
                payload: SyncPayload::CommandEcho(Vec::new()),
            })
            .unwrap();
        }
        // Dropping right after queueing must not lose the backlog.
        drop(host);

        let mut seen = Vec::new();
        wait_for(|| {
            seen.extend(client.drain_inbound());
            (seen.len() >= 200).then_some(())
        });
        assert!(matches!(seen.last(), Some(WireMessage::Sync { tick: 199, .. })));
    }

    #[test]
    fn peer_hangup_marks_the_link_disconnected() {
        let (host, port) = NetLink::host(0).unwrap();
        let client = NetLink::connect(([127, 0, 0, 1], port).into()).unwrap();
        wait_for(|| host.is_connected().then_some(()));

        drop(client);
        wait_for(|| (!host.is_connected()).then_some(()));
    }
}
