use serde::{Deserialize, Serialize};

use crate::types::{Delta, Role, Usage};

/// One server-sent frame of a streamed chat completion.
///
/// The first frame usually carries only the role, middle frames carry content,
/// and the last frame carries an empty delta with a finish reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    /// Candidate deltas; only the first is used.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Token usage, sent by providers that report it on streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// An error reported in-band after the stream started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ChunkError>,
}

/// One candidate inside a [`ChatCompletionChunk`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    /// Position of the choice.
    #[serde(default)]
    pub index: u32,

    /// The incremental change.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Set on the terminal frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// The incremental message fragment of a [`ChunkChoice`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    /// Present on the first frame only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Content fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// An error object delivered inside the stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkError {
    /// Human-readable error message.
    #[serde(default)]
    pub message: Option<String>,

    /// Provider error type.
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}

impl ChatCompletionChunk {
    /// Converts the frame into a [`Delta`].
    ///
    /// Returns `None` for frames that carry nothing the assembler needs, such as
    /// the leading role-only frame.
    pub fn into_delta(self) -> Option<Delta> {
        let usage = self.usage;
        let (content, finish_reason) = match self.choices.into_iter().next() {
            Some(choice) => (choice.delta.content, choice.finish_reason),
            None => (None, None),
        };
        if content.is_none() && finish_reason.is_none() && usage.is_none() {
            return None;
        }
        Some(Delta {
            content,
            finish_reason,
            usage,
        })
    }
}
