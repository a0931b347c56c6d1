use serde::{Deserialize, Serialize};

use crate::types::Turn;

/// Request body for the chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// The model identifier.
    pub model: String,

    /// The ordered context submitted to the model.
    pub messages: Vec<Turn>,

    /// Whether the response is delivered as a stream of deltas.
    pub stream: bool,
}

impl ChatRequest {
    /// Create a new non-streaming request.
    pub fn new(model: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
        }
    }

    /// Set whether the response should be streamed.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn request_serialization() {
        let request = ChatRequest::new(
            "gpt-3.5-turbo",
            vec![Turn::system("be brief"), Turn::user("hi")],
        )
        .with_stream(true);

        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": true
            })
        );
    }
}
