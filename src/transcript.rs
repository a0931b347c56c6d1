//! Flat-file transcripts of a conversation.
//!
//! Two interchangeable formats are supported: a pretty-printed JSON array of turns, and a flat
//! text form where each turn is written as `<role>: <content>` and turns are separated by a
//! line holding [`TEXT_SEPARATOR`].  The text form cannot represent content that itself contains
//! the separator line; such transcripts load with the turn split at the separator.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::types::{Role, Turn};
use crate::{Error, Result};

/// The line that separates turns in the text format.
pub const TEXT_SEPARATOR: &str = "----------";

/// On-disk representation of a transcript.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TranscriptFormat {
    /// Pretty-printed JSON array of `{role, content}` objects.
    #[default]
    Json,
    /// `<role>: <content>` blocks joined by separator lines.
    Text,
}

impl TranscriptFormat {
    /// Pick a format from a file's extension.
    ///
    /// `.txt`, `.text` and `.md` are text; everything else is JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("txt" | "text" | "md") => TranscriptFormat::Text,
            _ => TranscriptFormat::Json,
        }
    }
}

impl fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptFormat::Json => write!(f, "json"),
            TranscriptFormat::Text => write!(f, "text"),
        }
    }
}

impl FromStr for TranscriptFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(TranscriptFormat::Json),
            "text" | "txt" => Ok(TranscriptFormat::Text),
            _ => Err(Error::validation(
                format!("unknown transcript format {s:?}; expected json or text"),
                Some("format".to_string()),
            )),
        }
    }
}

/// Serialize turns into the chosen format.
pub fn encode(turns: &[Turn], format: TranscriptFormat) -> Result<String> {
    match format {
        TranscriptFormat::Json => Ok(serde_json::to_string_pretty(turns)?),
        TranscriptFormat::Text => {
            let blocks = turns
                .iter()
                .map(|turn| format!("{}: {}", turn.role, turn.content))
                .collect::<Vec<_>>();
            let mut text = blocks.join(&format!("\n{TEXT_SEPARATOR}\n"));
            if !text.is_empty() {
                text.push('\n');
            }
            Ok(text)
        }
    }
}

/// Parse turns from the chosen format.
pub fn decode(text: &str, format: TranscriptFormat) -> Result<Vec<Turn>> {
    match format {
        TranscriptFormat::Json => Ok(serde_json::from_str(text)?),
        TranscriptFormat::Text => {
            let text = text.strip_suffix('\n').unwrap_or(text);
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            text.split(&format!("\n{TEXT_SEPARATOR}\n"))
                .enumerate()
                .map(|(index, block)| decode_block(index, block))
                .collect()
        }
    }
}

fn decode_block(index: usize, block: &str) -> Result<Turn> {
    let Some((role, content)) = block.split_once(": ") else {
        return Err(Error::malformed_transcript(
            "missing \"<role>: \" prefix",
            Some(index),
        ));
    };
    let role = role.trim().parse::<Role>().map_err(|err| {
        Error::malformed_transcript(err.to_string(), Some(index))
    })?;
    Ok(Turn::new(role, content))
}

/// Write turns to `path`.
pub fn save(path: impl AsRef<Path>, turns: &[Turn], format: TranscriptFormat) -> Result<()> {
    let path = path.as_ref();
    let text = encode(turns, format)?;
    fs::write(path, text)
        .map_err(|err| Error::io(format!("could not write {}", path.display()), err))
}

/// Read turns from `path`.
pub fn load(path: impl AsRef<Path>, format: TranscriptFormat) -> Result<Vec<Turn>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|err| Error::io(format!("could not read {}", path.display()), err))?;
    decode(&text, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<Turn> {
        vec![
            Turn::system("be brief"),
            Turn::user("what is 2+2?"),
            Turn::assistant("4\n\n```\nprint(2 + 2)\n```"),
            Turn::user("thanks: really"),
        ]
    }

    #[test]
    fn format_from_path() {
        assert_eq!(TranscriptFormat::from_path("a.txt"), TranscriptFormat::Text);
        assert_eq!(TranscriptFormat::from_path("a.MD"), TranscriptFormat::Text);
        assert_eq!(TranscriptFormat::from_path("a.json"), TranscriptFormat::Json);
        assert_eq!(TranscriptFormat::from_path("chat"), TranscriptFormat::Json);
    }

    #[test]
    fn format_from_str() {
        assert_eq!("JSON".parse::<TranscriptFormat>().unwrap(), TranscriptFormat::Json);
        assert_eq!("txt".parse::<TranscriptFormat>().unwrap(), TranscriptFormat::Text);
        assert!("yaml".parse::<TranscriptFormat>().unwrap_err().is_validation());
    }

    #[test]
    fn text_layout() {
        let turns = vec![Turn::user("hi"), Turn::assistant("hello")];
        let text = encode(&turns, TranscriptFormat::Text).unwrap();
        assert_eq!(text, "user: hi\n----------\nassistant: hello\n");
    }

    #[test]
    fn json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.json");
        save(&path, &conversation(), TranscriptFormat::Json).unwrap();
        assert_eq!(load(&path, TranscriptFormat::Json).unwrap(), conversation());
    }

    #[test]
    fn text_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.txt");
        save(&path, &conversation(), TranscriptFormat::Text).unwrap();
        assert_eq!(load(&path, TranscriptFormat::Text).unwrap(), conversation());
    }

    #[test]
    fn empty_text_is_no_turns() {
        assert!(decode("", TranscriptFormat::Text).unwrap().is_empty());
        assert!(decode("\n", TranscriptFormat::Text).unwrap().is_empty());
    }

    #[test]
    fn missing_role_delimiter_is_malformed() {
        let err = decode("user: hi\n----------\njust text\n", TranscriptFormat::Text).unwrap_err();
        assert!(err.is_malformed_transcript());
        assert!(matches!(err, Error::MalformedTranscript { block: Some(1), .. }));
    }

    #[test]
    fn unknown_role_is_malformed() {
        let err = decode("robot: beep\n", TranscriptFormat::Text).unwrap_err();
        assert!(err.is_malformed_transcript());
    }

    #[test]
    fn separator_in_content_splits_the_turn() {
        let turns = vec![Turn::user("a\n----------\nb")];
        let text = encode(&turns, TranscriptFormat::Text).unwrap();
        assert!(decode(&text, TranscriptFormat::Text).unwrap_err().is_malformed_transcript());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("absent.json"), TranscriptFormat::Json).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
