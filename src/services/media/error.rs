/// Errors that can occur during media protocol operations
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    /// No adapter transport is currently attached
    #[error("no adapter connection")]
    NotConnected,

    /// The facade issued a command the protocol revision does not define
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// An inbound frame failed structural decoding
    #[error("malformed adapter frame: {0}")]
    ProtocolDecode(String),

    /// Writing a cover art blob to local storage failed
    #[error("failed to store cover art for player {player_id}: {source}")]
    CoverStore {
        /// Player the blob belongs to
        player_id: u32,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to initialize the protocol server
    #[error("failed to initialize media service: {0}")]
    InitializationFailed(String),
}
