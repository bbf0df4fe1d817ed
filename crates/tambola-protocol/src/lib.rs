//! Tambola Protocol - Wire protocol for the session daemon
//!
//! This crate provides the framed message types spoken between game
//! clients and the daemon: a versioned connect handshake, the inbound
//! game actions and the outbound session notifications. Frames are
//! line-delimited JSON.

pub mod message;
pub mod version;

pub use message::{ClientEvent, ClientMessage, ServerMessage};
pub use version::ProtocolVersion;
