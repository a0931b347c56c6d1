use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policy controlling how much history is resent with each request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ContextLevel {
    /// Only the turn just submitted.
    None,

    /// Every non-assistant turn in the log.
    Request,

    /// The entire log.
    #[default]
    Full,
}

impl ContextLevel {
    /// The numeric level used by configuration files.
    pub fn level(&self) -> u8 {
        match self {
            ContextLevel::None => 0,
            ContextLevel::Request => 1,
            ContextLevel::Full => 2,
        }
    }
}

impl fmt::Display for ContextLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextLevel::None => write!(f, "none"),
            ContextLevel::Request => write!(f, "request"),
            ContextLevel::Full => write!(f, "full"),
        }
    }
}

impl TryFrom<u8> for ContextLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ContextLevel::None),
            1 => Ok(ContextLevel::Request),
            2 => Ok(ContextLevel::Full),
            _ => Err(format!("context level must be 0, 1 or 2, got {value}")),
        }
    }
}

impl From<ContextLevel> for u8 {
    fn from(level: ContextLevel) -> Self {
        level.level()
    }
}

impl FromStr for ContextLevel {
    type Err = String;

    /// Accepts `0`/`1`/`2` or `none`/`request`/`full` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "none" => Ok(ContextLevel::None),
            "1" | "request" => Ok(ContextLevel::Request),
            "2" | "full" => Ok(ContextLevel::Full),
            other => Err(format!(
                "invalid context level: {other} (use 0/none, 1/request, 2/full)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_and_names() {
        assert_eq!("0".parse::<ContextLevel>(), Ok(ContextLevel::None));
        assert_eq!("Request".parse::<ContextLevel>(), Ok(ContextLevel::Request));
        assert_eq!("2".parse::<ContextLevel>(), Ok(ContextLevel::Full));
        assert!("3".parse::<ContextLevel>().is_err());
    }

    #[test]
    fn serializes_as_integer() {
        assert_eq!(serde_json::to_string(&ContextLevel::Request).unwrap(), "1");
        let level: ContextLevel = serde_json::from_str("0").unwrap();
        assert_eq!(level, ContextLevel::None);
        assert!(serde_json::from_str::<ContextLevel>("7").is_err());
    }
}
