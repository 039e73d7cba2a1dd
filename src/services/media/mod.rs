/// Cover art blob storage
pub mod covers;
/// Protocol engine: transport, framing, receive loop
pub mod engine;
/// Media service error types
pub mod error;
/// Player registry and active-player arbitration
pub mod registry;
/// Media service facade and command dispatch
pub mod service;
/// Player types, patches and commands
pub mod types;
/// Wire codec for the adapter protocol
pub mod wire;

pub use covers::*;
pub use error::*;
pub use registry::*;
pub use service::*;
pub use types::*;
