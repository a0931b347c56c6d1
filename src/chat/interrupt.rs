//! Bridges the process-wide Ctrl-C handler to per-request cancellation.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// Hands out a fresh cancellation token per request and cancels the current one on interrupt.
///
/// A token that has been canceled stays canceled, so every request must `arm` a new one.
#[derive(Clone, Debug, Default)]
pub struct Interrupter {
    current: Arc<Mutex<CancellationToken>>,
}

impl Interrupter {
    /// An interrupter with no request armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request and return its token.
    pub fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self.current.lock().unwrap_or_else(|err| err.into_inner());
        *current = token.clone();
        token
    }

    /// Cancel the request in flight, if any.
    pub fn interrupt(&self) {
        let current = self.current.lock().unwrap_or_else(|err| err.into_inner());
        current.cancel();
    }
}
