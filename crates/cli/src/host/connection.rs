//! ClientConnection - a TCP client as a dispatcher recipient
//!
//! Frames are handed to a bounded channel and written by a dedicated worker
//! task, so a slow client never blocks the batch pump.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{ContractError, Recipient};
use parking_lot::RwLock;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::error::{CliError, Result};

/// Longest accepted display name, in characters
pub const MAX_NAME_LEN: usize = 64;

/// Parsed first line of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub name: String,
    pub placement: Option<String>,
}

/// Parse `name` or `name@placement`
pub fn parse_handshake(line: &str) -> Result<Handshake> {
    let line = line.trim();
    let (name, placement) = match line.split_once('@') {
        Some((name, placement)) => (name.trim(), normalize_placement(placement)),
        None => (line, None),
    };

    if name.is_empty() {
        return Err(CliError::handshake("empty name"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CliError::handshake(format!(
            "name longer than {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(CliError::handshake("name contains whitespace"));
    }

    Ok(Handshake {
        name: name.to_string(),
        placement,
    })
}

/// Parse a follow-up `@placement` line
///
/// Returns `None` for lines that are not placement updates, `Some(None)` for
/// a bare `@` which clears the placement.
pub fn parse_placement_update(line: &str) -> Option<Option<String>> {
    line.trim()
        .strip_prefix('@')
        .map(normalize_placement)
}

fn normalize_placement(raw: &str) -> Option<String> {
    let placement = raw.trim();
    (!placement.is_empty()).then(|| placement.to_string())
}

/// Per-connection counters
#[derive(Debug, Default)]
pub struct ConnectionStats {
    frames_written: AtomicU64,
    bytes_written: AtomicU64,
    frames_rejected: AtomicU64,
}

impl ConnectionStats {
    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected.load(Ordering::Relaxed)
    }
}

/// A connected client
pub struct ClientConnection {
    id: u64,
    name: String,
    placement: RwLock<Option<String>>,
    active: Arc<AtomicBool>,
    tx: mpsc::Sender<Bytes>,
    stats: Arc<ConnectionStats>,
}

impl ClientConnection {
    /// Create the connection and spawn its writer task
    pub fn spawn<W>(
        id: u64,
        handshake: Handshake,
        writer: W,
        queue_capacity: usize,
    ) -> (Arc<Self>, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let stats = Arc::new(ConnectionStats::default());
        let active = Arc::new(AtomicBool::new(true));

        let worker = WriterState {
            name: handshake.name.clone(),
            id,
            stats: Arc::clone(&stats),
            active: Arc::clone(&active),
        };
        let worker_handle = tokio::spawn(async move {
            writer_worker(writer, rx, worker).await;
        });

        let connection = Arc::new(Self {
            id,
            name: handshake.name,
            placement: RwLock::new(handshake.placement),
            active,
            tx,
            stats,
        });

        (connection, worker_handle)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn set_placement(&self, placement: Option<String>) {
        *self.placement.write() = placement;
    }

    /// Mark the client gone; queued frames are still flushed by the worker
    pub fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Recipient for ClientConnection {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn current_placement(&self) -> Option<String> {
        self.placement.read().clone()
    }

    fn send(&self, payload: Bytes) -> std::result::Result<(), ContractError> {
        match self.tx.try_send(payload) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.frames_rejected.fetch_add(1, Ordering::Relaxed);
                Err(ContractError::recipient_send(
                    &self.name,
                    "outbound queue full",
                ))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.frames_rejected.fetch_add(1, Ordering::Relaxed);
                Err(ContractError::recipient_closed(&self.name))
            }
        }
    }
}

/// What the writer shares with its connection
///
/// The worker must not own the connection itself, or the sender it holds
/// would keep the channel open forever.
struct WriterState {
    name: String,
    id: u64,
    stats: Arc<ConnectionStats>,
    active: Arc<AtomicBool>,
}

/// Worker task that drains the outbound channel into the socket
#[instrument(
    name = "connection_writer_loop",
    skip(writer, rx, state),
    fields(client = %state.name, id = state.id)
)]
async fn writer_worker<W>(mut writer: W, mut rx: mpsc::Receiver<Bytes>, state: WriterState)
where
    W: AsyncWrite + Unpin,
{
    debug!("Writer started");

    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            warn!(error = %e, "Write failed, closing connection");
            state.active.store(false, Ordering::SeqCst);
            break;
        }
        state.stats.frames_written.fetch_add(1, Ordering::Relaxed);
        state
            .stats
            .bytes_written
            .fetch_add(frame.len() as u64, Ordering::Relaxed);
    }

    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "Shutdown failed");
    }
    debug!("Writer stopped");
}
