//! The ordered record of turns in a conversation.

use crate::types::{Role, Turn};
use crate::{Error, Result};

/// An ordered, append-only record of turns.
///
/// Outside of appends, the only mutations are removing the last turn (rollback), clearing,
/// dropping answers when retention is switched off, and wholesale replacement when a transcript
/// is loaded.  The log is owned by the session and
/// never shared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageLog {
    turns: Vec<Turn>,
}

impl MessageLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Remove and return the last turn.
    pub fn remove_last(&mut self) -> Result<Turn> {
        self.turns.pop().ok_or(Error::EmptyLog)
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// All turns in order.
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    pub fn size(&self) -> usize {
        self.turns.len()
    }

    /// True if the log holds no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Append loaded turns after the existing ones.
    pub fn extend(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.turns.extend(turns);
    }

    /// Replace the whole log with loaded turns.
    pub fn replace(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
    }

    /// Remove every assistant turn, keeping the order of the rest.  Returns how many were removed.
    pub fn drop_answers(&mut self) -> usize {
        let before = self.turns.len();
        self.turns.retain(|turn| turn.role != Role::Assistant);
        before - self.turns.len()
    }
}
