//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the message log, applies the
//! context policy, and keeps the log consistent when a request fails or is canceled.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chat::config::ChatConfig;
use crate::chat::context::assemble;
use crate::chat::dispatcher::Dispatcher;
use crate::chat::message_log::MessageLog;
use crate::client::Transport;
use crate::observability::{SESSION_CANCELLATIONS, SESSION_EXCHANGES, SESSION_ROLLBACKS};
use crate::render::Renderer;
use crate::tokens::TokenAccountant;
use crate::transcript::{self, TranscriptFormat};
use crate::types::{ContextLevel, ExchangeResult, Outcome, Role, Turn, Usage};
use crate::{Error, Result};

/// Where the session is in its request cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// Ready for a submission.
    Idle,
    /// A request is in flight.
    AwaitingResponse,
    /// Terminated; no further submissions are accepted.
    Closed,
}

/// A chat session that manages conversation state and API interactions.
///
/// Exactly one request is in flight at a time: `submit` takes `&mut self` and resolves only once
/// the exchange has ended.
pub struct ChatSession<T: Transport> {
    dispatcher: Dispatcher<T>,
    config: ChatConfig,
    log: MessageLog,
    accountant: TokenAccountant,
    state: SessionState,
}

/// What a transcript load added to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loaded {
    /// Turns now in the log from the transcript.
    pub turns: usize,
    /// Assistant turns skipped because retention is off.
    pub dropped_answers: usize,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: String,
    /// The context policy in effect.
    pub context_level: ContextLevel,
    /// The number of turns in the log.
    pub message_count: usize,
    /// The number of counted exchanges.
    pub exchanges: u64,
    /// Usage of the last counted exchange, if any.
    pub last_exchange: Option<Usage>,
    /// Usage across the session.
    pub session_total: Usage,
}

impl<T: Transport> ChatSession<T> {
    /// Creates a new chat session over `transport` with the given configuration.
    pub fn new(transport: T, config: ChatConfig) -> Self {
        Self::with_dispatcher(Dispatcher::new(transport), config)
    }

    /// Creates a new chat session with a preconfigured dispatcher.
    pub fn with_dispatcher(dispatcher: Dispatcher<T>, config: ChatConfig) -> Self {
        Self {
            dispatcher,
            config,
            log: MessageLog::new(),
            accountant: TokenAccountant::default(),
            state: SessionState::Idle,
        }
    }

    /// Replaces the token accountant, e.g. to plug in a model-specific estimator.
    pub fn with_accountant(mut self, accountant: TokenAccountant) -> Self {
        self.accountant = accountant;
        self
    }

    /// Sends a user message and waits for the answer.
    ///
    /// This method:
    /// 1. Appends the user turn to the log
    /// 2. Builds the context under the configured policy
    /// 3. Dispatches the request, rendering progress as it arrives
    /// 4. Appends the answer if retention is on, or rolls the user turn back if the exchange
    ///    was not answered
    ///
    /// Failures of the exchange itself are reported through `renderer` and the returned
    /// [`ExchangeResult`]; the session stays usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close), and [`Error::EmptyLog`] if the
    /// context could not be assembled.
    pub async fn submit(
        &mut self,
        text: &str,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Result<ExchangeResult> {
        if self.state == SessionState::Closed {
            return Err(Error::Closed);
        }

        let previous_len = self.log.size();
        self.log.append(Turn::user(text));
        let turns = match assemble(&self.config.prompt, &self.log, self.config.context_level) {
            Ok(turns) => turns,
            Err(err) => {
                self.log.remove_last()?;
                return Err(err);
            }
        };

        self.state = SessionState::AwaitingResponse;
        debug!(
            turns = turns.len(),
            context = %self.config.context_level,
            stream = self.config.stream,
            "submitting"
        );
        let result = self
            .dispatcher
            .send(&turns, &self.config, &self.accountant, renderer, cancel)
            .await;
        SESSION_EXCHANGES.click();

        match &result.outcome {
            Outcome::Ok => {
                if self.config.retain_responses {
                    self.log.append(Turn::assistant(result.content.clone()));
                }
            }
            Outcome::Empty => {
                self.rollback(previous_len)?;
                renderer.print_info("(the model returned an empty answer)");
            }
            Outcome::Failed(err) => {
                warn!(error = %err, "request failed");
                self.rollback(previous_len)?;
                renderer.print_error(&err.to_string());
            }
            Outcome::Canceled => {
                SESSION_CANCELLATIONS.click();
                self.rollback(previous_len)?;
            }
        }
        self.accountant.record(&result);
        self.state = SessionState::Idle;
        Ok(result)
    }

    /// Remove the unanswered user turn.
    fn rollback(&mut self, previous_len: usize) -> Result<()> {
        SESSION_ROLLBACKS.click();
        debug!(size = self.log.size(), "rolling back unanswered turn");
        while self.log.size() > previous_len {
            self.log.remove_last()?;
        }
        Ok(())
    }

    /// Terminate the session.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true once the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Clears the conversation history.
    pub fn reset(&mut self) {
        self.log.clear();
    }

    /// The message log.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Returns the number of turns in the conversation.
    pub fn message_count(&self) -> usize {
        self.log.size()
    }

    /// The active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Change one setting; invalid values leave the configuration untouched.
    ///
    /// Switching retention off also drops the answers already in the log.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.config.set(key, value)?;
        debug!(key, value, "setting changed");
        if !self.config.retain_responses {
            let dropped = self.log.drop_answers();
            if dropped > 0 {
                debug!(dropped, "retention off; answers removed from the log");
            }
        }
        Ok(())
    }

    /// The dispatcher requests go through.
    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// The token accountant.
    pub fn accountant(&self) -> &TokenAccountant {
        &self.accountant
    }

    /// Saves the conversation to `path`.
    ///
    /// Without an explicit format, the format is inferred from the file extension.
    pub fn save(&self, path: impl AsRef<Path>, format: Option<TranscriptFormat>) -> Result<()> {
        let path = path.as_ref();
        let format = format.unwrap_or_else(|| TranscriptFormat::from_path(path));
        transcript::save(path, self.log.all(), format)
    }

    /// Loads a conversation from `path`, replacing the log or appending to it.
    ///
    /// With retention off, assistant turns in the transcript are skipped.  On error the log is
    /// unchanged.
    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        format: Option<TranscriptFormat>,
        append: bool,
    ) -> Result<Loaded> {
        let path = path.as_ref();
        let format = format.unwrap_or_else(|| TranscriptFormat::from_path(path));
        let mut turns = transcript::load(path, format)?;
        let total = turns.len();
        if !self.config.retain_responses {
            turns.retain(|turn| turn.role != Role::Assistant);
        }
        let loaded = Loaded {
            turns: turns.len(),
            dropped_answers: total - turns.len(),
        };
        if append {
            self.log.extend(turns);
        } else {
            self.log.replace(turns);
        }
        Ok(loaded)
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.config.model.clone(),
            context_level: self.config.context_level,
            message_count: self.log.size(),
            exchanges: self.accountant.exchanges(),
            last_exchange: self.accountant.last_exchange(),
            session_total: self.accountant.session_total(),
        }
    }
}
