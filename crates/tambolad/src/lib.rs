//! Tambola Daemon - game session coordinator and broadcast server
//!
//! This crate provides the core infrastructure for the Tambola daemon:
//! - `game` - Session coordinator actor owning players, draws, and wins
//! - `broadcast` - Fan-out of server messages to connected clients
//! - `server` - TCP server speaking line-delimited JSON to players
//! - `http` - HTTP trigger endpoints for hosts (start round, draw, snapshot)
//! - `monitor` - Process monitoring for CPU/memory tracking
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tambolad daemon                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   GameServer    │────▶│         GameActor           │   │
//! │  │  (TCP socket)   │     │   (session state owner)     │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ server messages   │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│◀────│      FanoutBroadcaster      │   │
//! │  │  (per client)   │     │   (per-connection queues)   │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                         ▲                   │
//! │  ┌─────────────────┐                    │                   │
//! │  │   HttpServer    │────────────────────┘                   │
//! │  │ (start / draw)  │   via GameActor                        │
//! │  └─────────────────┘                                        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod broadcast;
pub mod game;
pub mod http;
pub mod monitor;
pub mod server;
