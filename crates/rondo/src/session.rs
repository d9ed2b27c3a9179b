//! One distribution session: split, stage, fan out, aggregate.
//!
//! A session is the unit of "send the chosen song to everyone connected".
//! It exists only for the duration of one [`run`] call. The registry
//! snapshot and the generated parts are zipped by index and that mapping
//! never changes mid-session, no matter what the registry does meanwhile.

use std::path::{Path, PathBuf};
use std::time::Duration;

use midisplit::{Part, SplitError};
use rondoproto::PartFrame;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::{ClientId, ConnectedClient};

/// Result of one client's transfer, recorded exactly once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Delivered { bytes: u64 },
    Failed { reason: String },
}

impl TransferOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Aggregated per-client outcomes of one session, in snapshot order.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub song: String,
    pub outcomes: Vec<(ClientId, TransferOutcome)>,
}

impl SessionResult {
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_delivered())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

/// Failures that prevent a session from starting at all. Per-client
/// transfer failures never surface here - they land in the outcome list.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No clients connected")]
    NoClients,
    #[error("Song not found: {0}")]
    SongNotFound(PathBuf),
    #[error("Not a MIDI file: {0}")]
    NotAMidiFile(PathBuf),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error("Scratch directory error: {0}")]
    Scratch(#[source] std::io::Error),
}

/// Transfer tuning for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Staging directory for generated parts. Cleared and recreated at
    /// session start - nothing of value may live here.
    pub scratch_dir: PathBuf,
    /// Payload chunk size for socket writes.
    pub chunk_size: usize,
    /// Per-client inactivity timeout.
    pub timeout: Duration,
}

/// Run one complete send: split the song N ways, stage the parts, deliver
/// part `i` to snapshot client `i`, and aggregate per-client outcomes.
///
/// Returns `Err` only for failures before the first client is contacted
/// (empty snapshot, unreadable song, scratch I/O). Once fan-out starts the
/// call always completes with a [`SessionResult`].
pub async fn run(
    song_path: &Path,
    snapshot: Vec<ConnectedClient>,
    config: &SessionConfig,
    cancel: CancellationToken,
) -> Result<SessionResult, SessionError> {
    if snapshot.is_empty() {
        return Err(SessionError::NoClients);
    }

    let song = song_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "song".to_string());

    let bytes = tokio::fs::read(song_path).await.map_err(SplitError::Io)?;
    let parts = midisplit::split(&song, &bytes, snapshot.len())?;
    debug_assert_eq!(parts.len(), snapshot.len());

    stage_parts(&config.scratch_dir, &parts)
        .await
        .map_err(SessionError::Scratch)?;

    info!(song = %song, clients = snapshot.len(), "session fan-out starting");

    let mut workers = Vec::with_capacity(snapshot.len());
    for (client, part) in snapshot.into_iter().zip(parts.into_iter()) {
        let id = client.id;
        let chunk_size = config.chunk_size;
        let timeout = config.timeout;
        let cancel = cancel.clone();
        let handle = tokio::spawn(transfer_worker(client, part, chunk_size, timeout, cancel));
        workers.push((id, handle));
    }

    let mut outcomes = Vec::with_capacity(workers.len());
    for (id, handle) in workers {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => TransferOutcome::Failed {
                reason: format!("transfer worker died: {}", e),
            },
        };
        if let TransferOutcome::Failed { reason } = &outcome {
            warn!(client = %id, %reason, "transfer failed");
        }
        outcomes.push((id, outcome));
    }

    let result = SessionResult { song, outcomes };
    info!(
        delivered = result.delivered(),
        failed = result.failed(),
        "session complete"
    );
    Ok(result)
}

/// Clear and recreate the scratch directory, then stage every part in it.
async fn stage_parts(scratch: &Path, parts: &[Part]) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(scratch).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(scratch).await?;
    for part in parts {
        tokio::fs::write(scratch.join(&part.name), &part.bytes).await?;
    }
    Ok(())
}

/// Deliver one part to one client. Every failure mode ends here as an
/// outcome; nothing propagates to sibling workers.
async fn transfer_worker(
    client: ConnectedClient,
    part: Part,
    chunk_size: usize,
    timeout: Duration,
    cancel: CancellationToken,
) -> TransferOutcome {
    let frame = match PartFrame::new(part.name, part.bytes) {
        Ok(frame) => frame,
        Err(e) => {
            return TransferOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };
    let bytes = frame.payload.len() as u64;

    let send = async {
        let mut writer = client.writer.lock().await;
        frame.write_chunked(&mut *writer, chunk_size).await
    };

    tokio::select! {
        _ = cancel.cancelled() => TransferOutcome::Failed {
            reason: "session cancelled".to_string(),
        },
        result = tokio::time::timeout(timeout, send) => match result {
            Ok(Ok(())) => {
                info!(client = %client.id, part = %frame.name, bytes, "part delivered");
                TransferOutcome::Delivered { bytes }
            }
            Ok(Err(e)) => TransferOutcome::Failed {
                reason: e.to_string(),
            },
            Err(_) => TransferOutcome::Failed {
                reason: format!("timed out after {:?}", timeout),
            },
        },
    }
}
