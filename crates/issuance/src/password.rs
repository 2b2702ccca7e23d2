//! Out-of-band collection password and revocation password helpers.

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{IssuanceError, IssuanceResult};
use crate::ids::RunId;

/// Length of generated revocation passwords
pub const REVOCATION_PASSWORD_LEN: usize = 16;

/// Supplies the collection password the authority mails to the applicant.
///
/// May block indefinitely on a human; there is no timeout.
#[async_trait]
pub trait CollectionPasswordSource: Send + Sync {
    async fn collection_password(&self, run: &RunId) -> IssuanceResult<String>;
}

/// A password known up front, e.g. passed on the command line.
#[derive(Debug, Clone)]
pub struct FixedCollectionPassword(String);

impl FixedCollectionPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }
}

#[async_trait]
impl CollectionPasswordSource for FixedCollectionPassword {
    async fn collection_password(&self, _run: &RunId) -> IssuanceResult<String> {
        Ok(self.0.clone())
    }
}

/// Random ASCII-alphanumeric revocation password.
pub fn generate_revocation_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REVOCATION_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Trim a supplied collection password and refuse an empty one.
pub(crate) fn normalize_collection_password(raw: &str) -> IssuanceResult<String> {
    let password = raw.trim();
    if password.is_empty() {
        return Err(IssuanceError::CollectionPassword(
            "collection password is empty".to_string(),
        ));
    }
    Ok(password.to_string())
}
