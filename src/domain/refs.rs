use std::fmt;

use super::models::PlayerId;

/// How a caller names a player.
///
/// `Token` is free-form input (a command argument, say). It is resolved by
/// trying id, then exact name, then external account, and the first kind that
/// matches any player wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerRef {
    Id(PlayerId),
    Name(String),
    Account(String),
    Token(String),
}

impl PlayerRef {
    pub fn token(value: impl Into<String>) -> Self {
        PlayerRef::Token(value.into())
    }

    /// Expands the reference into the exact lookups to try, in precedence order.
    pub fn candidates(&self) -> Vec<PlayerRef> {
        match self {
            PlayerRef::Token(token) => {
                let mut candidates = Vec::with_capacity(3);
                // Only the canonical spelling of an id counts as one
                let id = token.parse::<PlayerId>().ok();
                if let Some(id) = id.filter(|id| id.to_string() == *token) {
                    candidates.push(PlayerRef::Id(id));
                }
                candidates.push(PlayerRef::Name(token.clone()));
                candidates.push(PlayerRef::Account(token.clone()));
                candidates
            }
            exact => vec![exact.clone()],
        }
    }
}

impl fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerRef::Id(id) => write!(f, "#{}", id),
            PlayerRef::Name(name) => write!(f, "{}", name),
            PlayerRef::Account(account) => write!(f, "account {}", account),
            PlayerRef::Token(token) => write!(f, "{}", token),
        }
    }
}

impl From<&str> for PlayerRef {
    fn from(value: &str) -> Self {
        PlayerRef::token(value)
    }
}
