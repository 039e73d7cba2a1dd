/// Reactive property primitives
pub mod property;

pub use property::*;
