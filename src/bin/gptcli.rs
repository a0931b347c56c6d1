//! Interactive chat client for OpenAI-compatible chat completion APIs.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! gptcli
//!
//! # Stream answers and render them as markdown
//! gptcli --stream --markdown
//!
//! # Keep answers in the context and read the key from a file
//! gptcli --retain --key ~/.openai.key
//!
//! # Disable colors (useful for piping output)
//! gptcli --no-color
//! ```
//!
//! Logging goes to stderr and is controlled by `GPTCLI_LOG` (default `warn`).
//!
//! # Commands
//!
//! While chatting, you can use dot commands:
//! - `.help` - Show available commands
//! - `.reset` - Clear conversation history
//! - `.save <file> [format]` / `.load <file> [format] [append]` - Transcripts
//! - `.multiline` - Enter a multi-line message, finished with Ctrl-D
//! - `.set <key> <value>` - Change a setting
//! - `.usage` - Show token usage
//! - `.exit` - Exit the application

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use gptcli::chat::{
    COMMANDS, ChatArgs, ChatCommand, ChatConfig, ChatSession, Interrupter, PlainTextRenderer,
    Renderer, help_text, parse_command, validate_command_table,
};
use gptcli::{OpenAi, Usage};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "GPTCLI_LOG";

/// Main entry point for the gptcli application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("gptcli [OPTIONS]");
    let config = ChatConfig::from_args(args)?;
    validate_command_table(COMMANDS)?;
    let use_color = config.use_color;

    let client = OpenAi::with_options(
        config.resolve_api_key()?,
        config.api_base.clone(),
        config.proxy.clone(),
        Some(config.timeout()),
    )?;
    let mut session = ChatSession::new(client, config);
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while a request is in flight cancels it; at the prompt rustyline sees it first.
    // Only SIGINT is handled; SIGTERM keeps its default action.
    let interrupter = Interrupter::new();
    let handler = interrupter.clone();
    ctrlc::set_handler(move || handler.interrupt())?;

    println!("gptcli (model: {})", session.config().model);
    println!("Type .help for commands, .exit to exit\n");

    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Bye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let text = match parse_command(line) {
            None => line.to_string(),
            Some(ChatCommand::Quit) => {
                println!("Bye!");
                break;
            }
            Some(ChatCommand::Multiline) => match read_multiline(&mut rl) {
                Some(text) if !text.trim().is_empty() => text,
                _ => continue,
            },
            Some(cmd) => {
                run_command(&mut session, &mut renderer, cmd);
                continue;
            }
        };

        let cancel = interrupter.arm();
        if let Err(e) = session.submit(&text, &mut renderer, &cancel).await {
            renderer.print_error(&e.to_string());
        }
    }

    session.close();
    Ok(())
}

/// Collect lines until Ctrl-D.  Ctrl-C abandons the message.
fn read_multiline(rl: &mut DefaultEditor) -> Option<String> {
    println!("(multi-line mode: Ctrl-D to send, Ctrl-C to cancel)");
    let mut lines = Vec::new();
    loop {
        match rl.readline("... ") {
            Ok(line) => lines.push(line),
            Err(ReadlineError::Eof) => return Some(lines.join("\n")),
            Err(_) => {
                println!();
                return None;
            }
        }
    }
}

fn run_command(session: &mut ChatSession<OpenAi>, renderer: &mut dyn Renderer, cmd: ChatCommand) {
    match cmd {
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
        }
        ChatCommand::Reset => {
            session.reset();
            renderer.print_info("Conversation cleared.");
        }
        ChatCommand::Save { path, format } => match session.save(&path, format) {
            Ok(()) => renderer.print_info(&format!("Transcript saved to {}", path)),
            Err(err) => renderer.print_error(&format!("Failed to save transcript: {}", err)),
        },
        ChatCommand::Load {
            path,
            format,
            append,
        } => match session.load(&path, format, append) {
            Ok(loaded) => {
                renderer.print_info(&format!("Loaded {} message(s) from {}", loaded.turns, path));
                if loaded.dropped_answers > 0 {
                    renderer.print_info(&format!(
                        "Skipped {} answer(s); retention is off",
                        loaded.dropped_answers
                    ));
                }
            }
            Err(err) => renderer.print_error(&format!("Failed to load transcript: {}", err)),
        },
        ChatCommand::Set { key, value } => match session.set(&key, &value) {
            Ok(()) => renderer.print_info(&format!("{} set to {}", key, value)),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::ShowConfig => {
            println!("    Current Configuration:");
            for line in session.config().describe().lines() {
                println!("      {}", line);
            }
        }
        ChatCommand::Stats => print_stats(session),
        ChatCommand::Invalid(message) => renderer.print_error(&message),
        // Handled by the read loop.
        ChatCommand::Multiline | ChatCommand::Quit => {}
    }
}

fn print_stats(session: &ChatSession<OpenAi>) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!("      Context: {}", stats.context_level);
    println!("      Messages: {}", stats.message_count);
    match stats.last_exchange {
        Some(usage) => println!("      Last exchange: {}", describe_usage(usage)),
        None => println!("      Last exchange: (none)"),
    }
    println!(
        "      Total tokens: {} ({} exchanges)",
        describe_usage(stats.session_total),
        stats.exchanges
    );
}

fn describe_usage(usage: Usage) -> String {
    format!(
        "{} prompt + {} completion = {}",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    )
}
