use crate::Error;
use crate::types::Usage;

/// How a single request ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The provider produced an answer.
    Ok,

    /// The provider finished without producing any text.
    Empty,

    /// The transport or provider failed.
    Failed(Error),

    /// The user interrupted the request.
    Canceled,
}

impl Outcome {
    /// Returns true for [`Outcome::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }

    /// Returns the failure, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// The result of one request/response exchange.
///
/// Produced per request and used only to update the log and the token counters.
#[derive(Debug, Clone)]
pub struct ExchangeResult {
    /// The answer text.  Empty unless the outcome is `Ok`.
    pub content: String,

    /// Reported or estimated usage.
    pub usage: Option<Usage>,

    /// How the exchange ended.
    pub outcome: Outcome,
}

impl ExchangeResult {
    /// A successful exchange; empty text is reported as [`Outcome::Empty`].
    pub fn answered(content: String, usage: Option<Usage>) -> Self {
        if content.trim().is_empty() {
            return Self::empty(usage);
        }
        Self {
            content,
            usage,
            outcome: Outcome::Ok,
        }
    }

    /// An exchange that finished with no text.
    pub fn empty(usage: Option<Usage>) -> Self {
        Self {
            content: String::new(),
            usage,
            outcome: Outcome::Empty,
        }
    }

    /// A failed exchange.
    pub fn failed(err: Error) -> Self {
        Self {
            content: String::new(),
            usage: None,
            outcome: Outcome::Failed(err),
        }
    }

    /// An interrupted exchange.  Partial text is discarded.
    pub fn canceled() -> Self {
        Self {
            content: String::new(),
            usage: None,
            outcome: Outcome::Canceled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_answer_is_empty() {
        let result = ExchangeResult::answered("  \n".to_string(), None);
        assert!(matches!(result.outcome, Outcome::Empty));
        assert!(result.content.is_empty());
    }

    #[test]
    fn failure_carries_error() {
        let result = ExchangeResult::failed(Error::rate_limit("slow", None));
        assert!(result.outcome.error().is_some_and(Error::is_rate_limit));
        assert!(!result.outcome.is_ok());
    }
}
