/// Shared reactive primitives used across services
pub mod common;
/// Media adapter protocol service
pub mod media;
/// Audio loopback spectrum service
pub mod spectrum;

pub use media::{MediaError, MediaService, Player, PlayerCommand};
pub use spectrum::{CaptureEngine, FrequencyBandConfig, SpectrumError};
