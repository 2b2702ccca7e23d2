//! Issuance run identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identity an issuance run is scoped to: the applicant's email address.
///
/// A run id names a directory in the artifact store, so it must be usable as
/// a single path component. Email syntax itself is left to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

/// Rejected run identity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidRunId {
    #[error("email address must not be empty")]
    Empty,

    #[error("email address `{0}` cannot be used as a directory name")]
    NotAPathComponent(String),
}

impl RunId {
    /// Validate and wrap an email address.
    pub fn new(email: impl Into<String>) -> Result<Self, InvalidRunId> {
        let email = email.into().trim().to_string();

        if email.is_empty() {
            return Err(InvalidRunId::Empty);
        }
        if email == "."
            || email == ".."
            || email.contains(['/', '\\', '\0'])
        {
            return Err(InvalidRunId::NotAPathComponent(email));
        }

        Ok(Self(email))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = InvalidRunId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}
