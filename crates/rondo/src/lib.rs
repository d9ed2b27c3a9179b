//! Rondo: Ensemble MIDI Distribution Server
//!
//! Distributes one MIDI song to N simultaneously connected performer
//! clients, each receiving a distinct, independently playable part, so a
//! group can play the same piece together on separate devices.
//!
//! The pipeline for one "send" operation:
//!
//! - **ConnectionRegistry** - the live set of connected performers; the
//!   accept path adds, per-connection reader tasks remove on disconnect.
//! - **DistributionSession** - snapshots the registry, splits the song N
//!   ways (`midisplit`), stages the parts in the scratch directory, and
//!   fans them out with one worker per client.
//! - **TransferProtocol** (`rondoproto`) - length-prefixed framing over
//!   each client's socket; a failure on one socket becomes that client's
//!   outcome and nothing else.
//!
//! The GUI layer is an external consumer of [`Rondo`]'s request/response
//! API (`register_client`, `distribute`, `choose_song`, ...) and is never
//! inlined into this crate.

pub mod registry;
pub mod server;
pub mod session;

pub use registry::{ClientId, ConnectedClient, ConnectionRegistry};
pub use server::Rondo;
pub use session::{SessionConfig, SessionError, SessionResult, TransferOutcome};
