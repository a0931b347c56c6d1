// Public modules
pub mod chat_completion;
pub mod chat_completion_chunk;
pub mod chat_request;
pub mod context_level;
pub mod delta;
pub mod exchange;
pub mod turn;
pub mod usage;

// Re-exports
pub use chat_completion::{ChatCompletion, Choice, ChoiceMessage};
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkError};
pub use chat_request::ChatRequest;
pub use context_level::ContextLevel;
pub use delta::Delta;
pub use exchange::{ExchangeResult, Outcome};
pub use turn::{Role, RoleParseError, Turn};
pub use usage::Usage;
