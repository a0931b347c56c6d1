use serde::{Deserialize, Serialize};

use crate::types::{Role, Usage};

/// Non-streaming response from the chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    /// Provider-assigned response identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The model that produced the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Candidate answers; only the first is used.
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// Token usage, when the provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// One candidate answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    /// Position of the choice in the response.
    #[serde(default)]
    pub index: u32,

    /// The answer message.
    pub message: ChoiceMessage,

    /// Why generation stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// The message inside a [`Choice`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceMessage {
    /// Role of the message; always assistant in practice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Text of the message.  `null` for refusals and tool calls.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Create a completion with a single assistant answer.
    pub fn new(content: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            id: None,
            model: None,
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: Some(Role::Assistant),
                    content: Some(content.into()),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage,
        }
    }

    /// Text of the first choice, or the empty string when there is none.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .unwrap_or("")
    }
}
