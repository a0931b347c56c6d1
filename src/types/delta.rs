use serde::{Deserialize, Serialize};

use crate::types::Usage;

/// One incremental fragment of a streamed response.
///
/// A delta carries a content fragment, a terminal finish signal, or both.  No
/// deltas follow the one carrying `finish_reason`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delta {
    /// Content fragment to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Why generation stopped; present on the terminal delta only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Usage reported by the transport at the end of the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Delta {
    /// A content-only delta.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    /// A terminal delta.
    pub fn finish(reason: impl Into<String>) -> Self {
        Self {
            finish_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Attach transport-reported usage.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Returns true if this delta ends the stream.
    pub fn is_finish(&self) -> bool {
        self.finish_reason.is_some()
    }
}
