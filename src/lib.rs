//! Gunline Server Library
//!
//! Server-authoritative tick simulation for turret arenas: characters,
//! switch-gated turrets and their plasma, plus per-viewer binary snapshots
//! that stay readable by older clients.

pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod util;
