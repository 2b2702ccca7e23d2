//! HTTP client for the Comodo secure-email certificate forms.
//!
//! # Application flow
//!
//! 1. GET the signup page in a fresh cookie session and scrape the `SID` token
//! 2. POST the signup form with the token, applicant fields and SPKAC
//! 3. A page containing `Application is successful!` means accepted; a
//!    rejection page carries the reason in an `alert("...")` inside its
//!    `loadPage()` function
//!
//! # Collection flow
//!
//! POST the collection password to the collection endpoint. The response
//! body is a status line followed by the PEM certificate chain.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use super::{Applicant, CertificateAuthority};
use crate::error::{IssuanceError, IssuanceResult};

const SIGNUP_PAGE_PATH: &str = "/products/frontpage?area=SecureEmailCertificate";
const SIGNUP_SUBMIT_PATH: &str = "/products/!SecureEmailCertificate_Signup";
const COLLECT_PATH: &str = "/products/download/CollectCCC";
const DEFAULT_BASE_URL: &str = "https://secure.comodo.com";

/// Marker the authority puts on an accepted application.
const APPLICATION_ACCEPTED: &str = "Application is successful!";

static SID_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"name=SID value=(\w+)").expect("SID pattern is valid"));

static REJECTION_REASON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)loadPage\(\) \{.+?alert\("(.+?)"\).+?\}"#)
        .expect("rejection pattern is valid")
});

/// Authority form endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorityEndpoints {
    /// Page carrying the `SID` session token
    #[validate(url)]
    pub signup_page: String,
    /// Signup form target
    #[validate(url)]
    pub signup_submit: String,
    /// Certificate collection form target
    #[validate(url)]
    pub collect: String,
}

impl AuthorityEndpoints {
    /// Endpoints rooted at another host, e.g. a test server.
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            signup_page: format!("{base}{SIGNUP_PAGE_PATH}"),
            signup_submit: format!("{base}{SIGNUP_SUBMIT_PATH}"),
            collect: format!("{base}{COLLECT_PATH}"),
        }
    }
}

impl Default for AuthorityEndpoints {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

/// Scraping client for the authority's web forms.
#[derive(Debug, Clone)]
pub struct ComodoClient {
    endpoints: AuthorityEndpoints,
    timeout: Duration,
}

impl ComodoClient {
    pub fn new(endpoints: AuthorityEndpoints, timeout: Duration) -> Self {
        Self { endpoints, timeout }
    }

    pub fn endpoints(&self) -> &AuthorityEndpoints {
        &self.endpoints
    }

    /// A fresh cookie session; each operation gets its own.
    fn session(&self) -> IssuanceResult<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .user_agent(concat!("letssmime/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}

#[async_trait]
impl CertificateAuthority for ComodoClient {
    async fn submit_application(
        &self,
        applicant: &Applicant,
        spkac: &str,
        revocation_password: &str,
    ) -> IssuanceResult<()> {
        let session = self.session()?;

        debug!(url = %self.endpoints.signup_page, "Fetching signup form");
        let page = session
            .get(&self.endpoints.signup_page)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let sid = extract_sid_token(&page)?;

        info!(email = %applicant.email, "Submitting certificate application");
        let form = [
            ("SID", sid.as_str()),
            ("foreName", applicant.first_name.as_str()),
            ("surname", applicant.last_name.as_str()),
            ("emailAddress", applicant.email.as_str()),
            ("countryName", applicant.country.as_str()),
            ("spkac", spkac),
            ("challengePassword", revocation_password),
            ("iAccept", "on"),
            ("submitButton", "Next >"),
        ];

        // Rejections come back as ordinary pages, so the status is not checked.
        let response = session
            .post(&self.endpoints.signup_submit)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(status = %status, bytes = body.len(), "Signup form answered");
        interpret_application_response(&body)
    }

    async fn collect_certificate_chain(&self, collection_password: &str) -> IssuanceResult<Vec<u8>> {
        let session = self.session()?;

        let form = [
            ("collectionCode", collection_password),
            ("queryType", "1"),
            ("responseType", "3"),
            ("responseEncoding", "0"),
            ("responseMimeType", "application/x-x509-user-cert"),
            ("product", "9"),
        ];

        debug!(url = %self.endpoints.collect, "Collecting certificate chain");
        let body = session
            .post(&self.endpoints.collect)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let chain = strip_status_line(&body);
        if !chain
            .windows(PEM_CERTIFICATE.len())
            .any(|window| window == PEM_CERTIFICATE)
        {
            return Err(IssuanceError::ProtocolToken(
                "collection response contains no certificate".to_string(),
            ));
        }

        info!(bytes = chain.len(), "Received certificate chain");
        Ok(chain)
    }
}

const PEM_CERTIFICATE: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Pull the `SID` session token out of the signup page.
fn extract_sid_token(page: &str) -> IssuanceResult<String> {
    SID_TOKEN
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| IssuanceError::ProtocolToken("couldn't extract SID token".to_string()))
}

/// Classify the signup response page.
fn interpret_application_response(page: &str) -> IssuanceResult<()> {
    if page.contains(APPLICATION_ACCEPTED) {
        info!("Application accepted");
        return Ok(());
    }

    match REJECTION_REASON.captures(page).and_then(|caps| caps.get(1)) {
        Some(reason) => {
            warn!(reason = %reason.as_str(), "Application rejected");
            Err(IssuanceError::ApplicationRejected(reason.as_str().to_string()))
        }
        None => Err(IssuanceError::ProtocolToken(
            "application failed for unknown reason".to_string(),
        )),
    }
}

/// Drop the leading status line and rejoin the rest with `\n`.
fn strip_status_line(body: &[u8]) -> Vec<u8> {
    String::from_utf8_lossy(body)
        .lines()
        .skip(1)
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}
