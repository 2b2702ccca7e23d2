//! Issuance error types.

use std::path::PathBuf;

use letssmime_spkac::SpkacError;
use thiserror::Error;

use crate::artifact::ArtifactKey;
use crate::ids::RunId;

/// Result type for issuance operations.
pub type IssuanceResult<T> = Result<T, IssuanceError>;

/// Errors raised by pipeline producers and their collaborators.
///
/// None of these are retried. The run stops at the failing step and keeps
/// whatever artifacts were already persisted.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// The stored key could not be turned into a signed SPKAC.
    #[error("failed to build signed public key and challenge: {0}")]
    StructureSigning(#[from] SpkacError),

    /// The authority answered with a page we could not make sense of.
    #[error("unexpected response from certificate authority: {0}")]
    ProtocolToken(String),

    /// The authority explicitly turned the application down.
    #[error("application rejected: {0}")]
    ApplicationRejected(String),

    /// Reading or writing run state failed.
    #[error(transparent)]
    ArtifactStore(#[from] StoreError),

    /// The authority could not be reached or answered with an HTTP error.
    #[error("request to certificate authority failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The external bundler failed.
    #[error("external tool failed: {0}")]
    ExternalTool(String),

    /// Key generation, encoding or decoding failed.
    #[error("key material error: {0}")]
    KeyMaterial(String),

    /// No usable collection password was supplied.
    #[error("collection password unavailable: {0}")]
    CollectionPassword(String),
}

/// A pipeline failure, tagged with the step that raised it.
#[derive(Debug, Error)]
#[error("issuance step `{step}` failed")]
pub struct RunError {
    /// Artifact the failing step was producing
    pub step: ArtifactKey,
    /// Underlying cause
    #[source]
    pub source: IssuanceError,
}

impl RunError {
    pub(crate) fn new(step: ArtifactKey, source: impl Into<IssuanceError>) -> Self {
        Self {
            step,
            source: source.into(),
        }
    }
}

/// Artifact store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact `{key}` not found for {run}")]
    NotFound { run: RunId, key: ArtifactKey },

    /// Artifacts are write-once.
    #[error("artifact `{key}` already exists for {run}")]
    AlreadyExists { run: RunId, key: ArtifactKey },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
