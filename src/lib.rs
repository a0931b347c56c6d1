// Public modules
pub mod accumulating_stream;
pub mod chat;
pub mod client;
pub mod error;
pub mod markdown;
pub mod render;
pub mod sse;
pub mod tokens;
pub mod transcript;
pub mod types;

mod observability;

// Re-exports
pub use client::{DeltaStream, OpenAi, Transport};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use types::*;
