//! Soundring - media player state and audio spectrum backend for a desktop
//! control surface.
//!
//! Soundring tracks every media player reporting over the adapter websocket
//! protocol, arbitrates which one is active, executes fire-and-forget remote
//! commands, and renders the machine's audio output as a 64-band frequency
//! spectrum. The main pieces are:
//!
//! - Adapter protocol engine with a player registry and command dispatch
//! - Audio loopback capture with FFT-based band analysis
//! - Broadcast/stream surfaces for a presentation layer to consume
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use soundring::services::media::{Config, MediaService};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let media = MediaService::start(Config::default()).await?;
//! let mut updates = media.subscribe();
//! while let Ok(player) = updates.recv().await {
//!     println!("{} - {}", player.artist, player.title);
//! }
//! # Ok(())
//! # }
//! ```

/// Reactive services for media state and spectrum analysis.
pub mod services;

pub use services::media::{MediaService, Player};
pub use services::spectrum::CaptureEngine;
