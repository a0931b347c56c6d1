//! Context assembly: which turns are sent with a request.

use crate::chat::MessageLog;
use crate::types::{ContextLevel, Role, Turn};
use crate::{Error, Result};

/// Build the request payload from the prompt prefix and the log.
///
/// - `Full`: prefix followed by the entire log.
/// - `Request`: prefix followed by every turn that is not an assistant answer.
/// - `None`: prefix followed by the most recent turn only; fails on an empty log.
pub fn assemble(prefix: &[Turn], log: &MessageLog, level: ContextLevel) -> Result<Vec<Turn>> {
    let mut turns = prefix.to_vec();
    match level {
        ContextLevel::Full => turns.extend_from_slice(log.all()),
        ContextLevel::Request => turns.extend(
            log.all()
                .iter()
                .filter(|turn| turn.role != Role::Assistant)
                .cloned(),
        ),
        ContextLevel::None => turns.push(log.last().cloned().ok_or(Error::EmptyLog)?),
    }
    Ok(turns)
}
