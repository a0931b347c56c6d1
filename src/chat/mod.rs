//! Interactive chat sessions against an OpenAI-compatible provider.
//!
//! This module provides the REPL-facing half of the crate.  It supports:
//!
//! - Blocking and streaming requests with live markdown repaint
//! - Three context policies controlling how much history is sent
//! - Dot commands for session control, transcripts, and settings
//! - Cancellation of the request in flight without losing the session
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: the session state machine and its message log
//! - [`dispatcher`]: request dispatch and stream assembly
//! - [`commands`]: dot command parsing

pub mod commands;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod interrupt;
pub mod message_log;
pub mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{
    COMMANDS, ChatCommand, CommandSpec, help_text, parse_command, validate_command_table,
};
pub use config::{
    ChatArgs, ChatConfig, DEFAULT_CONFIG_PATH, DEFAULT_KEY_FILE, DEFAULT_MODEL,
    DEFAULT_SYSTEM_PROMPT, SETTABLE_KEYS,
};
pub use context::assemble;
pub use dispatcher::{DEFAULT_REFRESH_INTERVAL, Dispatcher};
pub use interrupt::Interrupter;
pub use message_log::MessageLog;
pub use session::{ChatSession, Loaded, SessionState, SessionStats};
