use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role type for a conversation turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,

    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl Role {
    /// The wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an invalid role string.
#[derive(Debug)]
pub struct RoleParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown role: {}", self.invalid_value)
    }
}

impl std::error::Error for RoleParseError {}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(RoleParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    /// The role of the turn.
    pub role: Role,

    /// The text of the turn.
    pub content: String,
}

impl Turn {
    /// Create a new `Turn` with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new system `Turn`.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user `Turn`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant `Turn`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn turn_serialization() {
        let turn = Turn::user("Hello");
        assert_eq!(
            to_value(&turn).unwrap(),
            json!({"role": "user", "content": "Hello"})
        );
    }

    #[test]
    fn turn_deserialization() {
        let turn: Turn =
            serde_json::from_value(json!({"role": "assistant", "content": "Hi"})).unwrap();
        assert_eq!(turn, Turn::assistant("Hi"));
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        let err = "narrator".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown role: narrator");
    }
}
