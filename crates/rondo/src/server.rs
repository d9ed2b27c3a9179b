//! Host-facing server: accept loop, disconnect watchers, and the
//! request/response API the GUI layer consumes.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rondoconf::RondoConfig;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{ClientId, ConnectionRegistry};
use crate::session::{self, SessionConfig, SessionError, SessionResult};

/// The Rondo server: owns the registry and runs distribution sessions.
///
/// The registry is owned here and injected into sessions as a snapshot -
/// it is never ambient global state.
pub struct Rondo {
    config: RondoConfig,
    registry: Arc<ConnectionRegistry>,
    cancel: CancellationToken,
    /// Sessions share one scratch directory, so at most one runs at a time.
    session_gate: tokio::sync::Mutex<()>,
}

impl Rondo {
    pub fn new(config: RondoConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            cancel: CancellationToken::new(),
            session_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Register an accepted connection and start its disconnect watcher.
    ///
    /// The watcher owns the read half: clients never speak, so a read of
    /// zero bytes or an error means the connection is gone and the client
    /// is removed from the registry.
    pub fn register_client(&self, stream: TcpStream, addr: SocketAddr) -> ClientId {
        let (mut read_half, write_half) = stream.into_split();
        let id = self.registry.add(addr, write_half);

        let registry = Arc::clone(&self.registry);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    read = read_half.read(&mut buf) => match read {
                        Ok(0) | Err(_) => break,
                        Ok(n) => debug!(%id, "ignoring {} unexpected bytes from client", n),
                    },
                }
            }
            registry.remove(id);
        });

        id
    }

    /// Drop a client from the registry without waiting for its socket.
    pub fn unregister_client(&self, id: ClientId) -> bool {
        self.registry.remove(id)
    }

    /// The registry this server owns.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.registry.count()
    }

    /// Validate a song path: it must exist and carry a `.mid` extension.
    ///
    /// Relative paths resolve against the configured songs directory.
    /// Parsing happens inside the splitter at session time.
    pub fn choose_song(&self, path: &Path) -> Result<PathBuf, SessionError> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.paths.songs_dir.join(path)
        };

        if !path.is_file() {
            return Err(SessionError::SongNotFound(path));
        }
        let is_midi = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("mid"))
            .unwrap_or(false);
        if !is_midi {
            return Err(SessionError::NotAMidiFile(path));
        }
        Ok(path)
    }

    /// Readable `.mid` files in the songs directory, sorted by name.
    pub fn list_songs(&self) -> Vec<PathBuf> {
        let mut songs: Vec<PathBuf> = std::fs::read_dir(&self.config.paths.songs_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.extension()
                            .map(|e| e.eq_ignore_ascii_case("mid"))
                            .unwrap_or(false)
                    })
                    .collect()
            })
            .unwrap_or_default();
        songs.sort();
        songs
    }

    /// Run one distribution session against the current registry.
    ///
    /// The snapshot is taken here; clients joining or leaving afterwards
    /// do not affect this session's part mapping. Per-client failures are
    /// reported in the result, never as an `Err`.
    pub async fn distribute(&self, song: &Path) -> Result<SessionResult, SessionError> {
        let song = self.choose_song(song)?;

        let _gate = self.session_gate.lock().await;

        let snapshot = self.registry.snapshot();
        let session_config = SessionConfig {
            scratch_dir: self.config.paths.scratch_dir.clone(),
            chunk_size: self.config.transfer.chunk_size,
            timeout: Duration::from_secs(self.config.transfer.timeout_secs),
        };
        session::run(&song, snapshot, &session_config, self.cancel.child_token()).await
    }

    /// Accept performer connections until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        info!("accepting performers on {}", listener.local_addr()?);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("accept loop stopping");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        self.register_client(stream, addr);
                    }
                    Err(e) => warn!("accept failed: {}", e),
                },
            }
        }
    }

    /// Signal shutdown: stops the accept loop, the disconnect watchers,
    /// and cancels in-flight transfers.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
