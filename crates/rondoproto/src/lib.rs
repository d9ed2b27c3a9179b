//! rondoproto - Wire protocol for streaming performer parts
//!
//! This crate defines the framing used to move one generated MIDI part from
//! the Rondo server to the performer client that owns it. The framing is
//! deliberately tiny: one transfer is one self-delimiting frame, and a
//! connection may carry any number of frames back-to-back.
//!
//! ## Wire Format
//!
//! All integers are big-endian (network byte order):
//!
//! ```text
//! u32                 name length
//! byte[name length]   part name, UTF-8
//! u32                 payload length
//! byte[payload len]   payload (a complete Standard MIDI File)
//! ```
//!
//! The explicit payload length makes every transfer self-delimiting
//! regardless of how the bytes land across socket reads, so a receiver can
//! always tell where one part ends and the next begins.
//!
//! ## Failure Model
//!
//! The protocol itself only returns `Err`; isolating a failed transfer from
//! its siblings is the caller's job (one worker per client on the server
//! side). Length limits bound both directions so a malformed or hostile
//! frame surfaces as a [`ProtocolError`] instead of an unbounded allocation.

pub mod frame;

pub use frame::{PartFrame, ProtocolError, DEFAULT_CHUNK_SIZE, MAX_NAME_LEN, MAX_PAYLOAD_LEN};
