use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Token usage for one exchange.
///
/// Providers bill and rate-limit by token counts, so these are tracked per
/// exchange and summed over the session.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    /// Tokens in the submitted context.
    #[serde(default)]
    pub prompt_tokens: u64,

    /// Tokens in the produced answer.
    #[serde(default)]
    pub completion_tokens: u64,

    /// Sum of prompt and completion tokens.
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    /// Create a new `Usage`; the total is derived from the two parts.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_deserialization() {
        let usage: Usage = serde_json::from_value(json!({
            "prompt_tokens": 12,
            "completion_tokens": 30,
            "total_tokens": 42
        }))
        .unwrap();
        assert_eq!(usage, Usage::new(12, 30));
    }

    #[test]
    fn usage_addition() {
        let mut total = Usage::new(1, 2);
        total += Usage::new(10, 20);
        assert_eq!(total, Usage::new(11, 22));
        assert_eq!(total.total_tokens, 33);
    }
}
