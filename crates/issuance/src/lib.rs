//! letssmime issuance pipeline
//!
//! Obtains a free S/MIME email certificate from an authority that still
//! requires SPKAC enrollment, as a resumable sequence of steps whose state
//! lives entirely in an artifact store.
//!
//! # Architecture
//!
//! - [`Issuer`] - walks the fixed [`STEPS`] table, skipping steps whose
//!   artifact already exists
//! - [`ArtifactStore`] - write-once key-value state per run; [`FsArtifactStore`]
//!   keeps one directory per email address
//! - [`CertificateAuthority`] - application and collection; [`ComodoClient`]
//!   drives the authority's web forms
//! - [`CollectionPasswordSource`] - the password mailed to the applicant
//! - [`Bundler`] - PKCS#12 export; [`OpensslBundler`] shells out to `openssl`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use letssmime_issuance::*;
//!
//! let config = IssuanceConfig::default();
//! let issuer = Issuer::new(
//!     FsArtifactStore::new(&config.storage_root)?,
//!     Arc::new(ComodoClient::new(config.authority.clone(), config.http_timeout())),
//!     Arc::new(FixedCollectionPassword::new("from-email")),
//!     Arc::new(OpensslBundler::new(&config.openssl)),
//! );
//!
//! let report = issuer.run(&IssuanceRequest::new(applicant, None)?).await?;
//! println!("Done! Your files are in {}", report.location.display());
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod artifact;
pub mod authority;
pub mod bundler;
pub mod config;
pub mod error;
pub mod ids;
pub mod issuer;
pub mod keys;
pub mod password;
pub mod store;

// ============================================================================
// Public API Re-exports
// ============================================================================

pub use artifact::ArtifactKey;
pub use authority::{
    Applicant, AuthorityEndpoints, CertificateAuthority, ComodoClient, DEFAULT_COUNTRY,
};
pub use bundler::{Bundler, OpensslBundler};
pub use config::IssuanceConfig;
pub use error::{ConfigError, IssuanceError, IssuanceResult, RunError, StoreError};
pub use ids::{InvalidRunId, RunId};
pub use issuer::{
    run_status, ArtifactState, IssuanceReport, IssuanceRequest, Issuer, RunStatus, Step, STEPS,
};
pub use password::{CollectionPasswordSource, FixedCollectionPassword};
pub use store::{ArtifactStore, FsArtifactStore};
