//! Dot command parsing for the chat application.
//!
//! Commands start with `.` and control the session without sending anything to the provider.
//! Every command is described by one entry of [`COMMANDS`]: its names, its argument arity, and
//! the handler that turns its arguments into a [`ChatCommand`].  Input that is not a command is
//! a submission.

use crate::transcript::TranscriptFormat;
use crate::{Error, Result};

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Clear the conversation history.
    Reset,

    /// Save the conversation to a file.
    Save {
        /// Destination file.
        path: String,
        /// Explicit format; inferred from the extension when absent.
        format: Option<TranscriptFormat>,
    },

    /// Load a conversation from a file.
    Load {
        /// Source file.
        path: String,
        /// Explicit format; inferred from the extension when absent.
        format: Option<TranscriptFormat>,
        /// Append to the current conversation instead of replacing it.
        append: bool,
    },

    /// Collect several lines and submit them as one message.
    Multiline,

    /// Change a setting.
    Set {
        /// Setting name.
        key: String,
        /// New value.
        value: String,
    },

    /// Show the current configuration.
    ShowConfig,

    /// Display token usage and session statistics.
    Stats,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

type Handler = fn(&[&str]) -> std::result::Result<ChatCommand, String>;

/// One entry of the command table.
pub struct CommandSpec {
    /// Primary name, without the leading dot.
    pub name: &'static str,
    /// Alternative names.
    pub aliases: &'static [&'static str],
    /// Argument synopsis shown in help.
    pub usage: &'static str,
    /// One-line description shown in help.
    pub summary: &'static str,
    /// Fewest arguments accepted.
    pub min_args: usize,
    /// Most arguments accepted.
    pub max_args: usize,
    handler: Handler,
}

impl CommandSpec {
    fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }

    fn parse(&self, args: &[&str]) -> ChatCommand {
        if args.len() < self.min_args || args.len() > self.max_args {
            let usage = format!("usage: .{} {}", self.name, self.usage);
            return ChatCommand::Invalid(usage.trim_end().to_string());
        }
        (self.handler)(args).unwrap_or_else(ChatCommand::Invalid)
    }
}

/// Every command the REPL understands.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        aliases: &["?"],
        usage: "",
        summary: "Show this help message",
        min_args: 0,
        max_args: 0,
        handler: |_| Ok(ChatCommand::Help),
    },
    CommandSpec {
        name: "reset",
        aliases: &["clear"],
        usage: "",
        summary: "Clear conversation history",
        min_args: 0,
        max_args: 0,
        handler: |_| Ok(ChatCommand::Reset),
    },
    CommandSpec {
        name: "save",
        aliases: &[],
        usage: "<file> [json|text]",
        summary: "Save the conversation to a file",
        min_args: 1,
        max_args: 2,
        handler: parse_save,
    },
    CommandSpec {
        name: "load",
        aliases: &[],
        usage: "<file> [json|text] [append]",
        summary: "Load a conversation, replacing or appending to the current one",
        min_args: 1,
        max_args: 3,
        handler: parse_load,
    },
    CommandSpec {
        name: "multiline",
        aliases: &["ml"],
        usage: "",
        summary: "Enter several lines; finish with Ctrl-D",
        min_args: 0,
        max_args: 0,
        handler: |_| Ok(ChatCommand::Multiline),
    },
    CommandSpec {
        name: "set",
        aliases: &[],
        usage: "<key> <value>",
        summary: "Change model, stream, markdown, retain, context, or color",
        min_args: 2,
        max_args: 2,
        handler: |args| {
            Ok(ChatCommand::Set {
                key: args[0].to_string(),
                value: args[1].to_string(),
            })
        },
    },
    CommandSpec {
        name: "config",
        aliases: &[],
        usage: "",
        summary: "Show current configuration",
        min_args: 0,
        max_args: 0,
        handler: |_| Ok(ChatCommand::ShowConfig),
    },
    CommandSpec {
        name: "usage",
        aliases: &["stats"],
        usage: "",
        summary: "Show token usage and session statistics",
        min_args: 0,
        max_args: 0,
        handler: |_| Ok(ChatCommand::Stats),
    },
    CommandSpec {
        name: "exit",
        aliases: &["quit", "q"],
        usage: "",
        summary: "Exit the chat",
        min_args: 0,
        max_args: 0,
        handler: |_| Ok(ChatCommand::Quit),
    },
];

fn parse_format(value: &str) -> std::result::Result<TranscriptFormat, String> {
    value.parse::<TranscriptFormat>().map_err(|err| match err {
        Error::Validation { message, .. } => message,
        other => other.to_string(),
    })
}

fn parse_save(args: &[&str]) -> std::result::Result<ChatCommand, String> {
    let format = args.get(1).map(|f| parse_format(f)).transpose()?;
    Ok(ChatCommand::Save {
        path: args[0].to_string(),
        format,
    })
}

fn parse_load(args: &[&str]) -> std::result::Result<ChatCommand, String> {
    let mut format = None;
    let mut append = false;
    for arg in &args[1..] {
        if arg.eq_ignore_ascii_case("append") {
            if append {
                return Err("append given twice".to_string());
            }
            append = true;
        } else if format.is_none() {
            format = Some(parse_format(arg)?);
        } else {
            return Err(format!("unexpected argument {arg:?}"));
        }
    }
    Ok(ChatCommand::Load {
        path: args[0].to_string(),
        format,
        append,
    })
}

/// Check a command table for duplicate names and impossible arities.
pub fn validate_command_table(table: &[CommandSpec]) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for spec in table {
        if spec.min_args > spec.max_args {
            return Err(Error::config(format!(
                "command .{} accepts at least {} but at most {} arguments",
                spec.name, spec.min_args, spec.max_args
            )));
        }
        for name in std::iter::once(&spec.name).chain(spec.aliases) {
            if name.is_empty() || name.starts_with('.') {
                return Err(Error::config(format!("invalid command name {name:?}")));
            }
            if seen.contains(name) {
                return Err(Error::config(format!("command name .{name} is defined twice")));
            }
            seen.push(*name);
        }
    }
    Ok(())
}

/// Parses user input for dot commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be treated as
/// a regular message.  The bare words `q`, `exit` and `quit` also exit.
///
/// # Examples
///
/// ```
/// # use gptcli::chat::parse_command;
/// assert!(parse_command(".quit").is_some());
/// assert!(parse_command(".set model gpt-4").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    if matches!(input, "q" | "exit" | "quit") {
        return Some(ChatCommand::Quit);
    }
    let rest = input.strip_prefix('.')?;

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let args = parts.collect::<Vec<_>>();
    let command = match COMMANDS.iter().find(|spec| spec.matches(&name)) {
        Some(spec) => spec.parse(&args),
        None => ChatCommand::Invalid(format!("Unknown command: .{name} (try .help)")),
    };
    Some(command)
}

/// Returns help text describing available commands.
pub fn help_text() -> String {
    let entries = COMMANDS
        .iter()
        .map(|spec| {
            let mut synopsis = format!(".{}", spec.name);
            if !spec.usage.is_empty() {
                synopsis.push(' ');
                synopsis.push_str(spec.usage);
            }
            let mut summary = spec.summary.to_string();
            if !spec.aliases.is_empty() {
                let aliases = spec
                    .aliases
                    .iter()
                    .map(|alias| format!(".{alias}"))
                    .collect::<Vec<_>>();
                summary.push_str(&format!(" (also {})", aliases.join(", ")));
            }
            (synopsis, summary)
        })
        .collect::<Vec<_>>();
    let width = entries.iter().map(|(s, _)| s.len()).max().unwrap_or(0);
    let mut help = String::from("Available commands:");
    for (synopsis, summary) in entries {
        help.push_str(&format!("\n  {synopsis:width$}  {summary}"));
    }
    help.push_str("\nAnything else is sent to the model. Ctrl-C cancels a response.");
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_valid() {
        validate_command_table(COMMANDS).unwrap();
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let table = [
            CommandSpec {
                name: "reset",
                aliases: &[],
                usage: "",
                summary: "",
                min_args: 0,
                max_args: 0,
                handler: |_| Ok(ChatCommand::Reset),
            },
            CommandSpec {
                name: "clear",
                aliases: &["reset"],
                usage: "",
                summary: "",
                min_args: 0,
                max_args: 0,
                handler: |_| Ok(ChatCommand::Reset),
            },
        ];
        assert!(validate_command_table(&table).is_err());
    }

    #[test]
    fn bad_arity_is_rejected() {
        let table = [CommandSpec {
            name: "save",
            aliases: &[],
            usage: "",
            summary: "",
            min_args: 2,
            max_args: 1,
            handler: parse_save,
        }];
        assert!(validate_command_table(&table).is_err());
    }

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command(".quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command(".exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command(".q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  .QUIT  "), Some(ChatCommand::Quit));
        assert_eq!(parse_command("quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("q"), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_reset() {
        assert_eq!(parse_command(".reset"), Some(ChatCommand::Reset));
        assert_eq!(parse_command(".clear"), Some(ChatCommand::Reset));
        assert!(matches!(
            parse_command(".reset now"),
            Some(ChatCommand::Invalid(msg)) if msg == "usage: .reset"
        ));
    }

    #[test]
    fn parse_save_command() {
        assert_eq!(
            parse_command(".save chat.json"),
            Some(ChatCommand::Save {
                path: "chat.json".to_string(),
                format: None,
            })
        );
        assert_eq!(
            parse_command(".save chat.log text"),
            Some(ChatCommand::Save {
                path: "chat.log".to_string(),
                format: Some(TranscriptFormat::Text),
            })
        );
        assert!(matches!(
            parse_command(".save"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("usage")
        ));
        assert!(matches!(
            parse_command(".save chat.log yaml"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("yaml")
        ));
    }

    #[test]
    fn parse_load_command() {
        assert_eq!(
            parse_command(".load chat.txt"),
            Some(ChatCommand::Load {
                path: "chat.txt".to_string(),
                format: None,
                append: false,
            })
        );
        assert_eq!(
            parse_command(".load chat.txt append"),
            Some(ChatCommand::Load {
                path: "chat.txt".to_string(),
                format: None,
                append: true,
            })
        );
        assert_eq!(
            parse_command(".load chat.log json append"),
            Some(ChatCommand::Load {
                path: "chat.log".to_string(),
                format: Some(TranscriptFormat::Json),
                append: true,
            })
        );
        assert!(matches!(
            parse_command(".load chat.log json text"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_set_command() {
        assert_eq!(
            parse_command(".set context 1"),
            Some(ChatCommand::Set {
                key: "context".to_string(),
                value: "1".to_string(),
            })
        );
        assert!(matches!(
            parse_command(".set stream"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_misc() {
        assert_eq!(parse_command(".help"), Some(ChatCommand::Help));
        assert_eq!(parse_command(".multiline"), Some(ChatCommand::Multiline));
        assert_eq!(parse_command(".config"), Some(ChatCommand::ShowConfig));
        assert_eq!(parse_command(".usage"), Some(ChatCommand::Stats));
        assert_eq!(parse_command(".stats"), Some(ChatCommand::Stats));
    }

    #[test]
    fn unknown_commands_are_invalid() {
        assert!(matches!(
            parse_command(".frobnicate"),
            Some(ChatCommand::Invalid(msg)) if msg.contains(".frobnicate")
        ));
        assert!(matches!(parse_command("."), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello, world!"), None);
        assert_eq!(parse_command("quit smoking?"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for spec in COMMANDS {
            assert!(help.contains(&format!(".{}", spec.name)));
        }
        assert!(help.contains(".clear"));
    }
}
