//! musicstand - the performer's side of a Rondo session
//!
//! Reads framed parts from a connection to the Rondo server and stores each
//! one on disk. A part is staged under a hidden name inside the destination
//! directory and renamed into place only once the full payload has arrived,
//! so a crash or disconnect mid-transfer never leaves a partially written
//! part visible to whatever plays it afterwards.
//!
//! Playback of the received part is out of scope; completion is signalled
//! to the host through the `on_part` callback of [`receive_all`].

use std::path::{Path, PathBuf};

use rondoproto::{PartFrame, ProtocolError};
use tokio::io::AsyncRead;
use tracing::{debug, warn};

/// Errors on the receiving side of a transfer.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Refusing unsafe part name {0:?}")]
    BadPartName(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A part that has been fully received and renamed into place.
#[derive(Debug, Clone)]
pub struct ReceivedPart {
    /// Name from the wire frame.
    pub name: String,
    /// Final on-disk location.
    pub path: PathBuf,
    /// Payload size in bytes.
    pub bytes: u64,
}

/// Receive one part and store it in `dest_dir`.
///
/// Returns `Ok(None)` when the server has closed the connection cleanly
/// (no more parts). A malformed or truncated frame is an error and ends
/// this connection's receive operation; it does not touch already-stored
/// parts.
pub async fn receive_part<R>(
    reader: &mut R,
    dest_dir: &Path,
) -> Result<Option<ReceivedPart>, ReceiveError>
where
    R: AsyncRead + Unpin,
{
    let frame = match PartFrame::read_next(reader).await? {
        Some(frame) => frame,
        None => return Ok(None),
    };

    debug!(name = %frame.name, bytes = frame.payload.len(), "frame received");
    let part = store_part(dest_dir, &frame).await?;
    Ok(Some(part))
}

/// Receive parts until the server closes the connection.
///
/// `on_part` is called once per completed part, after its atomic rename.
pub async fn receive_all<R, F>(
    reader: &mut R,
    dest_dir: &Path,
    mut on_part: F,
) -> Result<Vec<ReceivedPart>, ReceiveError>
where
    R: AsyncRead + Unpin,
    F: FnMut(&ReceivedPart),
{
    let mut received = Vec::new();
    while let Some(part) = receive_part(reader, dest_dir).await? {
        on_part(&part);
        received.push(part);
    }
    Ok(received)
}

/// Stage the payload next to its destination and rename it into place.
async fn store_part(dest_dir: &Path, frame: &PartFrame) -> Result<ReceivedPart, ReceiveError> {
    let file_name = safe_file_name(&frame.name)?;

    tokio::fs::create_dir_all(dest_dir).await?;

    let staging = dest_dir.join(format!(".incoming-{}", file_name));
    let dest = dest_dir.join(&file_name);

    tokio::fs::write(&staging, &frame.payload).await?;

    // Rename is atomic on the same filesystem; fall back to copy+delete
    // across mount points
    match tokio::fs::rename(&staging, &dest).await {
        Ok(()) => {}
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            tokio::fs::copy(&staging, &dest).await?;
            tokio::fs::remove_file(&staging).await?;
        }
        Err(e) => {
            warn!(name = %frame.name, "failed to move staged part into place");
            tokio::fs::remove_file(&staging).await.ok();
            return Err(e.into());
        }
    }

    Ok(ReceivedPart {
        name: frame.name.clone(),
        path: dest,
        bytes: frame.payload.len() as u64,
    })
}

/// Reduce a wire name to a plain file name, rejecting anything that would
/// escape the destination directory.
fn safe_file_name(name: &str) -> Result<String, ReceiveError> {
    let candidate = Path::new(name);
    match candidate.file_name() {
        Some(base) if base == candidate.as_os_str() && base != "." && base != ".." => {
            Ok(base.to_string_lossy().into_owned())
        }
        _ => Err(ReceiveError::BadPartName(name.to_string())),
    }
}
