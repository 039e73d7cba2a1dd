/// Errors that can occur during spectrum capture operations
#[derive(thiserror::Error, Debug)]
pub enum SpectrumError {
    /// Capture was started while already running
    #[error("audio capture already running")]
    AlreadyRunning,

    /// The loopback audio session could not be created or initialized
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Invalid frequency band configuration
    #[error("invalid band configuration: {0}")]
    InvalidConfiguration(String),
}
