//! Certificate authority collaborator
//!
//! The issuer talks to the authority through [`CertificateAuthority`]. The
//! production implementation, [`ComodoClient`], drives the authority's
//! secure-email signup and collection web forms.

mod comodo;

pub use comodo::{AuthorityEndpoints, ComodoClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IssuanceResult;

/// Default `countryName` form value (United States).
pub const DEFAULT_COUNTRY: &str = "1224";

/// Applicant identity fields submitted with the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Authority-specific numeric country code
    pub country: String,
}

/// Network operations against the issuing authority.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Submit an application.
    ///
    /// `spkac` must be exactly the base64 output of
    /// [`letssmime_spkac::build_signed_structure`]; the authority validates
    /// the embedded key and signature.
    ///
    /// # Errors
    ///
    /// [`IssuanceError::ApplicationRejected`](crate::IssuanceError::ApplicationRejected)
    /// carries the authority's reason verbatim.
    async fn submit_application(
        &self,
        applicant: &Applicant,
        spkac: &str,
        revocation_password: &str,
    ) -> IssuanceResult<()>;

    /// Exchange the collection password for the PEM certificate chain.
    async fn collect_certificate_chain(&self, collection_password: &str) -> IssuanceResult<Vec<u8>>;
}
