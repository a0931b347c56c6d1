//! Token estimation and per-session usage accounting.

use crate::observability::SESSION_TOKENS;
use crate::types::{ExchangeResult, Outcome, Turn, Usage};

/// Counts tokens the way a particular model family would.
///
/// Providers tokenize differently, so the accountant only depends on this trait.
pub trait TokenEstimator: Send + Sync {
    /// Tokens in a piece of text.
    fn count_text(&self, text: &str) -> u64;

    /// Tokens in a submitted context, including per-message framing.
    fn count_turns(&self, turns: &[Turn]) -> u64;
}

/// Character-count heuristic that is close enough for English text on GPT-family models.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeuristicEstimator {
    /// Characters per token.
    pub chars_per_token: u64,
    /// Framing tokens added for every message.
    pub tokens_per_message: u64,
    /// Tokens that prime the assistant reply.
    pub reply_priming: u64,
}

impl Default for HeuristicEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            tokens_per_message: 4,
            reply_priming: 3,
        }
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn count_text(&self, text: &str) -> u64 {
        let chars = text.chars().count() as u64;
        chars.div_ceil(self.chars_per_token.max(1))
    }

    fn count_turns(&self, turns: &[Turn]) -> u64 {
        let framing: u64 = turns
            .iter()
            .map(|turn| self.tokens_per_message + self.count_text(&turn.content))
            .sum();
        framing + self.reply_priming
    }
}

/// Tracks usage for the last exchange and the whole session.
pub struct TokenAccountant {
    estimator: Box<dyn TokenEstimator>,
    last_exchange: Option<Usage>,
    session_total: Usage,
    exchanges: u64,
}

impl TokenAccountant {
    /// An accountant that estimates with `estimator` when the transport reports nothing.
    pub fn new(estimator: Box<dyn TokenEstimator>) -> Self {
        Self {
            estimator,
            last_exchange: None,
            session_total: Usage::default(),
            exchanges: 0,
        }
    }

    /// Usage of the most recent counted exchange.
    pub fn last_exchange(&self) -> Option<Usage> {
        self.last_exchange
    }

    /// Usage summed over every counted exchange.
    pub fn session_total(&self) -> Usage {
        self.session_total
    }

    /// Number of counted exchanges.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Estimate usage for a context and the answer it produced.
    pub fn estimate(&self, prompt: &[Turn], answer: &str) -> Usage {
        Usage::new(
            self.estimator.count_turns(prompt),
            self.estimator.count_text(answer),
        )
    }

    /// Fold one exchange into the counters.
    ///
    /// Ok exchanges and failures that carry usage are counted; empty and canceled exchanges
    /// leave the counters untouched.
    pub fn record(&mut self, result: &ExchangeResult) {
        let counted = match result.outcome {
            Outcome::Ok => true,
            Outcome::Failed(_) => result.usage.is_some(),
            Outcome::Empty | Outcome::Canceled => false,
        };
        if !counted {
            return;
        }
        self.exchanges += 1;
        if let Some(usage) = result.usage {
            SESSION_TOKENS.count(usage.total_tokens);
            self.last_exchange = Some(usage);
            self.session_total += usage;
        }
    }

    /// Forget all counted usage.
    pub fn reset(&mut self) {
        self.last_exchange = None;
        self.session_total = Usage::default();
        self.exchanges = 0;
    }
}

impl Default for TokenAccountant {
    fn default() -> Self {
        Self::new(Box::new(HeuristicEstimator::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn heuristic_rounds_up() {
        let estimator = HeuristicEstimator::default();
        assert_eq!(estimator.count_text(""), 0);
        assert_eq!(estimator.count_text("abc"), 1);
        assert_eq!(estimator.count_text("abcd"), 1);
        assert_eq!(estimator.count_text("abcde"), 2);
    }

    #[test]
    fn context_includes_framing() {
        let estimator = HeuristicEstimator::default();
        let turns = vec![Turn::system("abcd"), Turn::user("abcdefgh")];
        // 2 * 4 framing + 1 + 2 content + 3 priming
        assert_eq!(estimator.count_turns(&turns), 14);
    }

    #[test]
    fn estimate_splits_prompt_and_answer() {
        let accountant = TokenAccountant::default();
        let usage = accountant.estimate(&[Turn::user("hello")], "abcdefgh");
        assert_eq!(usage, Usage::new(9, 2));
    }

    #[test]
    fn record_counts_ok_and_failed_with_usage() {
        let mut accountant = TokenAccountant::default();
        accountant.record(&ExchangeResult::answered(
            "hi".to_string(),
            Some(Usage::new(10, 2)),
        ));
        let mut failed = ExchangeResult::failed(Error::streaming("cut", None));
        failed.usage = Some(Usage::new(5, 1));
        accountant.record(&failed);
        assert_eq!(accountant.exchanges(), 2);
        assert_eq!(accountant.last_exchange(), Some(Usage::new(5, 1)));
        assert_eq!(accountant.session_total(), Usage::new(15, 3));
    }

    #[test]
    fn record_ignores_empty_canceled_and_bare_failures() {
        let mut accountant = TokenAccountant::default();
        accountant.record(&ExchangeResult::empty(Some(Usage::new(10, 0))));
        accountant.record(&ExchangeResult::canceled());
        accountant.record(&ExchangeResult::failed(Error::streaming("cut", None)));
        assert_eq!(accountant.exchanges(), 0);
        assert_eq!(accountant.session_total(), Usage::default());
        assert!(accountant.last_exchange().is_none());
    }

    #[test]
    fn session_total_is_monotonic() {
        let mut accountant = TokenAccountant::default();
        let exchanges = vec![
            ExchangeResult::answered("a".to_string(), Some(Usage::new(3, 1))),
            ExchangeResult::canceled(),
            ExchangeResult::answered("b".to_string(), Some(Usage::new(7, 2))),
            ExchangeResult::empty(None),
            ExchangeResult::answered("c".to_string(), Some(Usage::default())),
        ];
        let mut previous = 0;
        for exchange in &exchanges {
            accountant.record(exchange);
            let total = accountant.session_total().total_tokens;
            assert!(total >= previous);
            previous = total;
        }
        assert_eq!(previous, 13);
    }
}
