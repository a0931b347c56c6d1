//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg`, the YAML config file, and the single
//! validated setter the `.set` command goes through.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};

use crate::types::{ContextLevel, Turn};
use crate::{Error, Result};

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Config file read when `--config` is not given.  A missing default file is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "gptcli.yaml";

/// File the API key is read from when none is configured.
pub const DEFAULT_KEY_FILE: &str = ".key";

/// System turn sent ahead of every request unless the config file supplies a prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "If there is any code in your response, show it in markdown with syntax highlighting";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Keys accepted by [`ChatConfig::set`].
pub const SETTABLE_KEYS: &[&str] = &["model", "stream", "markdown", "retain", "context", "color"];

/// Command-line arguments for the gptcli tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Path to the YAML config file.
    #[arrrg(optional, "YAML config file (default: gptcli.yaml)", "FILE")]
    pub config: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gpt-3.5-turbo)", "MODEL")]
    pub model: Option<String>,

    /// Path to the API key file.
    #[arrrg(optional, "Path to the API key file (default: .key)", "FILE")]
    pub key: Option<String>,

    /// Proxy for provider requests.
    #[arrrg(optional, "HTTP, HTTPS or SOCKS5 proxy URL", "URL")]
    pub proxy: Option<String>,

    /// Base URL of the provider.
    #[arrrg(optional, "Base URL of the chat completions API", "URL")]
    pub api_base: Option<String>,

    /// Stream responses.
    #[arrrg(flag, "Stream responses as they are generated")]
    pub stream: bool,

    /// Live markdown rendering.
    #[arrrg(flag, "Render markdown live while streaming")]
    pub markdown: bool,

    /// Keep answers in the conversation context.
    #[arrrg(flag, "Keep assistant answers in the context of later requests")]
    pub retain: bool,

    /// Context level.
    #[arrrg(optional, "How much history to send: none, request or full", "LEVEL")]
    pub context: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// Loaded once at startup from the YAML file and the command line.  At runtime it changes only
/// through [`ChatConfig::set`]; the session reads it afresh for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: String,

    /// Whether responses are streamed.
    pub stream: bool,

    /// Whether streamed responses are rendered as markdown while they arrive.
    pub markdown: bool,

    /// Whether assistant answers are kept in the message log.
    pub retain_responses: bool,

    /// How much of the log is sent with each request.
    pub context_level: ContextLevel,

    /// Turns prepended to every request and never stored in the log.
    pub prompt: Vec<Turn>,

    /// Base URL of the provider.
    pub api_base: Option<String>,

    /// Proxy for provider requests.
    pub proxy: Option<String>,

    /// The API key itself.  Takes precedence over `api_key_file`.
    pub api_key: Option<String>,

    /// File holding the API key.
    pub api_key_file: Option<PathBuf>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gpt-3.5-turbo
    /// - Streaming, live markdown, and retention: off
    /// - Context level: full
    /// - Key file: .key
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            stream: false,
            markdown: false,
            retain_responses: false,
            context_level: ContextLevel::Full,
            prompt: vec![Turn::system(DEFAULT_SYSTEM_PROMPT)],
            api_base: None,
            proxy: None,
            api_key: None,
            api_key_file: Some(PathBuf::from(DEFAULT_KEY_FILE)),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            use_color: true,
        }
    }

    /// Load a config file.
    ///
    /// With `None` the default path is tried and silently skipped if absent.  An explicitly
    /// named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };
        match fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(&content).map_err(|err| {
                Error::config(format!("{}: {err}", path.display()))
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound && !required => Ok(Self::new()),
            Err(err) => Err(Error::io(
                format!("could not read config {}", path.display()),
                err,
            )),
        }
    }

    /// Parse config from YAML; absent fields keep their defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Resolve config from the command line: load the file it names, then apply overrides.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        let mut config = Self::load(args.config.as_deref().map(Path::new))?;
        config.apply_args(args)?;
        Ok(config)
    }

    /// Apply command-line overrides.  Flags can only switch features on.
    pub fn apply_args(&mut self, args: ChatArgs) -> Result<()> {
        if let Some(model) = args.model {
            self.set("model", &model)?;
        }
        if let Some(key) = args.key {
            self.api_key = None;
            self.api_key_file = Some(PathBuf::from(key));
        }
        if args.proxy.is_some() {
            self.proxy = args.proxy;
        }
        if args.api_base.is_some() {
            self.api_base = args.api_base;
        }
        if let Some(context) = args.context {
            self.set("context", &context)?;
        }
        self.stream |= args.stream;
        self.markdown |= args.markdown;
        self.retain_responses |= args.retain;
        if args.no_color {
            self.use_color = false;
        }
        Ok(())
    }

    /// Change one setting by name.
    ///
    /// The value is validated first; on error the config is unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "model" => {
                if value.is_empty() || value.contains(char::is_whitespace) {
                    return Err(Error::validation(
                        format!("invalid model name {value:?}"),
                        Some("model".to_string()),
                    ));
                }
                self.model = value.to_string();
            }
            "stream" => self.stream = parse_bool("stream", value)?,
            "markdown" => self.markdown = parse_bool("markdown", value)?,
            "retain" | "retain_responses" => {
                self.retain_responses = parse_bool("retain", value)?;
            }
            "context" | "context_level" => {
                self.context_level = value.parse::<ContextLevel>().map_err(|err| {
                    Error::validation(err.to_string(), Some("context".to_string()))
                })?;
            }
            "color" | "use_color" => self.use_color = parse_bool("color", value)?,
            other => {
                return Err(Error::validation(
                    format!(
                        "unknown setting {other:?}; expected one of {}",
                        SETTABLE_KEYS.join(", ")
                    ),
                    Some(other.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Find the API key: inline key first, then the key file.
    ///
    /// `None` means the caller should fall back to the environment.  A missing key file is not an
    /// error; an unreadable one is.
    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(Some(key.to_string()));
        }
        let Some(path) = self.api_key_file.as_deref() else {
            return Ok(None);
        };
        match fs::read_to_string(path) {
            Ok(key) => {
                let key = key.trim();
                Ok((!key.is_empty()).then(|| key.to_string()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::io(
                format!("could not read key file {}", path.display()),
                err,
            )),
        }
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Enables or disables streaming.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Enables or disables live markdown rendering.
    pub fn with_markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    /// Enables or disables answer retention.
    pub fn with_retain_responses(mut self, retain: bool) -> Self {
        self.retain_responses = retain;
        self
    }

    /// Sets the context level.
    pub fn with_context_level(mut self, level: ContextLevel) -> Self {
        self.context_level = level;
        self
    }

    /// Sets the prompt prefix.
    pub fn with_prompt(mut self, prompt: Vec<Turn>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// A human-readable summary for the `.config` command.
    pub fn describe(&self) -> String {
        let on_off = |flag: bool| if flag { "on" } else { "off" };
        let mut lines = vec![
            format!("model: {}", self.model),
            format!("stream: {}", on_off(self.stream)),
            format!("markdown: {}", on_off(self.markdown)),
            format!("retain: {}", on_off(self.retain_responses)),
            format!("context: {}", self.context_level),
            format!("color: {}", on_off(self.use_color)),
            format!("prompt: {} turn(s)", self.prompt.len()),
            format!("timeout: {}s", self.timeout_secs),
        ];
        if let Some(api_base) = &self.api_base {
            lines.push(format!("api base: {api_base}"));
        }
        if let Some(proxy) = &self.proxy {
            lines.push(format!("proxy: {proxy}"));
        }
        lines.join("\n")
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(Error::validation(
            format!("{key} expects on or off, got {value:?}"),
            Some(key.to_string()),
        )),
    }
}
