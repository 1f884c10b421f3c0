//! AccountId - Identity of a caller (depositor, admin, collaborator)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing an account id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("Empty account id")]
    Empty,

    #[error("Account id too long (max 128 chars): {0}")]
    TooLong(String),

    #[error("Account id contains whitespace: {0}")]
    Whitespace(String),
}

/// Opaque caller identity (wallet address or service name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            return Err(AccountIdError::Empty);
        }

        if s.len() > 128 {
            return Err(AccountIdError::TooLong(s.to_string()));
        }

        if s.chars().any(char::is_whitespace) {
            return Err(AccountIdError::Whitespace(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| AccountId(s.to_string()))
    }
}
