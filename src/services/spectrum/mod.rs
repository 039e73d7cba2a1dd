/// Frequency analysis: windowing, FFT, band grouping
pub mod analyzer;
/// Capture engine: worker thread, tick loop, rolling buffer
pub mod capture;
/// Spectrum error types
pub mod error;
/// Loopback packet sources
pub mod source;
/// Band configuration and constants
pub mod types;

pub use capture::*;
pub use error::*;
pub use source::*;
pub use types::*;
