//! Resumable issuance pipeline
//!
//! The pipeline is a fixed table of [`Step`]s walked by one loop. Each step
//! produces exactly one artifact. A step whose artifact already exists is
//! skipped without side effects, so re-running a run resumes at the first
//! missing artifact.
//!
//! # Steps
//!
//! | # | Artifact | Producer |
//! |---|---|---|
//! | 1 | `private-key` | generate an RSA key |
//! | 2 | `revocation-password` | sign an SPKAC and submit the application |
//! | 3 | `collection-password` | wait for the password mailed to the applicant |
//! | 4 | `certificate-chain` | exchange the collection password for the chain |
//! | 5 | `bundle` | bundle key and chain into PKCS#12 |
//!
//! A failing producer aborts the run. Artifacts written by earlier steps are
//! kept and nothing is retried.

use std::path::PathBuf;
use std::sync::Arc;

use letssmime_spkac::{build_signed_structure, DEFAULT_CHALLENGE};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::artifact::ArtifactKey;
use crate::authority::{Applicant, CertificateAuthority};
use crate::bundler::Bundler;
use crate::error::{IssuanceError, IssuanceResult, RunError, StoreError};
use crate::ids::{InvalidRunId, RunId};
use crate::keys::{self, DEFAULT_KEY_BITS};
use crate::password::{
    generate_revocation_password, normalize_collection_password, CollectionPasswordSource,
};
use crate::store::ArtifactStore;

/// What a step does to produce its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Producer {
    GenerateKey,
    SubmitApplication,
    ObtainCollectionPassword,
    CollectCertificateChain,
    BuildBundle,
}

/// One pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Artifact this step produces
    pub artifact: ArtifactKey,
    producer: Producer,
    /// Human-readable status line
    pub description: &'static str,
}

/// The pipeline, in execution order.
pub const STEPS: [Step; 5] = [
    Step {
        artifact: ArtifactKey::PrivateKey,
        producer: Producer::GenerateKey,
        description: "Generating private key",
    },
    Step {
        artifact: ArtifactKey::RevocationPassword,
        producer: Producer::SubmitApplication,
        description: "Sending application to the certificate authority",
    },
    Step {
        artifact: ArtifactKey::CollectionPassword,
        producer: Producer::ObtainCollectionPassword,
        description: "Waiting for the collection password sent to the applicant",
    },
    Step {
        artifact: ArtifactKey::CertificateChain,
        producer: Producer::CollectCertificateChain,
        description: "Retrieving certificate chain",
    },
    Step {
        artifact: ArtifactKey::Bundle,
        producer: Producer::BuildBundle,
        description: "Creating PKCS#12 bundle",
    },
];

/// Everything one run needs from the caller.
#[derive(Debug, Clone)]
pub struct IssuanceRequest {
    run: RunId,
    applicant: Applicant,
    revocation_password: Option<String>,
}

impl IssuanceRequest {
    /// The run is identified by the applicant's email address. A blank
    /// revocation password counts as none and one is generated.
    pub fn new(applicant: Applicant, revocation_password: Option<String>) -> Result<Self, InvalidRunId> {
        let run = RunId::new(applicant.email.as_str())?;
        let revocation_password = revocation_password
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Ok(Self {
            run,
            applicant,
            revocation_password,
        })
    }

    pub fn run(&self) -> &RunId {
        &self.run
    }

    pub fn applicant(&self) -> &Applicant {
        &self.applicant
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceReport {
    pub run: RunId,
    /// Where the artifacts live
    pub location: PathBuf,
    /// Artifacts produced by this invocation, in order
    pub produced: Vec<ArtifactKey>,
    /// Artifacts that already existed
    pub skipped: Vec<ArtifactKey>,
}

/// Drives the pipeline for one run at a time.
///
/// Two concurrent runs for the same identity are not guarded against; the
/// caller must ensure one process per identity.
pub struct Issuer<S> {
    store: S,
    authority: Arc<dyn CertificateAuthority>,
    passwords: Arc<dyn CollectionPasswordSource>,
    bundler: Arc<dyn Bundler>,
    key_bits: usize,
}

impl<S: ArtifactStore> Issuer<S> {
    pub fn new(
        store: S,
        authority: Arc<dyn CertificateAuthority>,
        passwords: Arc<dyn CollectionPasswordSource>,
        bundler: Arc<dyn Bundler>,
    ) -> Self {
        Self {
            store,
            authority,
            passwords,
            bundler,
            key_bits: DEFAULT_KEY_BITS,
        }
    }

    /// Set the RSA modulus size for newly generated keys.
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run every step whose artifact is missing, in order.
    ///
    /// # Errors
    ///
    /// The first failing step aborts the run. Its artifact is not written;
    /// earlier artifacts stay, so calling `run` again resumes at that step.
    pub async fn run(&self, request: &IssuanceRequest) -> Result<IssuanceReport, RunError> {
        let run = &request.run;
        let start = Instant::now();

        let mut report = IssuanceReport {
            run: run.clone(),
            location: self.store.location(run),
            produced: Vec::new(),
            skipped: Vec::new(),
        };

        info!(
            run = %run,
            location = %report.location.display(),
            "Starting issuance run"
        );

        for step in &STEPS {
            let artifact = step.artifact;

            if self
                .store
                .exists(run, artifact)
                .map_err(|e| RunError::new(artifact, e))?
            {
                debug!(run = %run, step = %artifact, "Artifact present, skipping step");
                report.skipped.push(artifact);
                continue;
            }

            info!(run = %run, step = %artifact, "{}", step.description);

            let data = match self.produce(step.producer, request).await {
                Ok(data) => data,
                Err(e) => {
                    error!(run = %run, step = %artifact, error = %e, "Issuance step failed");
                    return Err(RunError::new(artifact, e));
                }
            };

            self.store
                .write(run, artifact, &data)
                .map_err(|e| RunError::new(artifact, e))?;
            report.produced.push(artifact);
        }

        info!(
            run = %run,
            produced = report.produced.len(),
            skipped = report.skipped.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Issuance complete"
        );

        Ok(report)
    }

    async fn produce(&self, producer: Producer, request: &IssuanceRequest) -> IssuanceResult<Vec<u8>> {
        match producer {
            Producer::GenerateKey => self.generate_key().await,
            Producer::SubmitApplication => self.submit_application(request).await,
            Producer::ObtainCollectionPassword => self.obtain_collection_password(&request.run).await,
            Producer::CollectCertificateChain => self.collect_certificate_chain(&request.run).await,
            Producer::BuildBundle => self.build_bundle(&request.run).await,
        }
    }

    async fn generate_key(&self) -> IssuanceResult<Vec<u8>> {
        let bits = self.key_bits;

        tokio::task::spawn_blocking(move || {
            let key = keys::generate_private_key(bits)?;
            keys::encode_private_key(&key)
        })
        .await
        .map_err(|e| IssuanceError::KeyMaterial(format!("key generation task failed: {e}")))?
    }

    async fn submit_application(&self, request: &IssuanceRequest) -> IssuanceResult<Vec<u8>> {
        let key = keys::decode_private_key(&self.store.read(&request.run, ArtifactKey::PrivateKey)?)?;
        let spkac = build_signed_structure(&key, DEFAULT_CHALLENGE)?;

        let revocation_password = request
            .revocation_password
            .clone()
            .unwrap_or_else(generate_revocation_password);

        self.authority
            .submit_application(&request.applicant, &spkac, &revocation_password)
            .await?;

        Ok(revocation_password.into_bytes())
    }

    async fn obtain_collection_password(&self, run: &RunId) -> IssuanceResult<Vec<u8>> {
        let raw = self.passwords.collection_password(run).await?;
        Ok(normalize_collection_password(&raw)?.into_bytes())
    }

    async fn collect_certificate_chain(&self, run: &RunId) -> IssuanceResult<Vec<u8>> {
        let collection_password = self.store.read_text(run, ArtifactKey::CollectionPassword)?;
        self.authority
            .collect_certificate_chain(collection_password.trim())
            .await
    }

    async fn build_bundle(&self, run: &RunId) -> IssuanceResult<Vec<u8>> {
        self.bundler
            .bundle(
                &self.store.path(run, ArtifactKey::PrivateKey),
                &self.store.path(run, ArtifactKey::CertificateChain),
            )
            .await
    }
}

/// Presence of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArtifactState {
    pub artifact: ArtifactKey,
    pub present: bool,
}

/// Persisted progress of a run, read without invoking any producer.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub run: RunId,
    pub location: PathBuf,
    /// One entry per step, in pipeline order
    pub artifacts: Vec<ArtifactState>,
}

impl RunStatus {
    /// The step the next invocation would start at.
    pub fn next_step(&self) -> Option<Step> {
        self.artifacts
            .iter()
            .zip(STEPS.iter())
            .find(|(state, _)| !state.present)
            .map(|(_, step)| *step)
    }

    pub fn is_complete(&self) -> bool {
        self.artifacts.iter().all(|state| state.present)
    }
}

/// Inspect which artifacts of `run` exist.
pub fn run_status<S: ArtifactStore + ?Sized>(store: &S, run: &RunId) -> Result<RunStatus, StoreError> {
    let artifacts = STEPS
        .iter()
        .map(|step| {
            Ok(ArtifactState {
                artifact: step.artifact,
                present: store.exists(run, step.artifact)?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(RunStatus {
        run: run.clone(),
        location: store.location(run),
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsArtifactStore;
    use tempfile::TempDir;

    fn applicant(email: &str) -> Applicant {
        Applicant {
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            email: email.to_string(),
            country: "1224".to_string(),
        }
    }

    #[test]
    fn test_steps_cover_every_artifact_in_order() {
        let artifacts: Vec<_> = STEPS.iter().map(|s| s.artifact).collect();
        assert_eq!(artifacts, ArtifactKey::ALL.to_vec());
    }

    #[test]
    fn test_request_validates_email() {
        assert!(IssuanceRequest::new(applicant(""), None).is_err());
        assert!(IssuanceRequest::new(applicant("../x"), None).is_err());

        let request = IssuanceRequest::new(applicant("alice@example.com"), None).unwrap();
        assert_eq!(request.run().as_str(), "alice@example.com");
    }

    #[test]
    fn test_blank_revocation_password_is_generated() {
        let request =
            IssuanceRequest::new(applicant("alice@example.com"), Some("   ".to_string())).unwrap();
        assert!(request.revocation_password.is_none());

        let request =
            IssuanceRequest::new(applicant("alice@example.com"), Some(" s3cret ".to_string()))
                .unwrap();
        assert_eq!(request.revocation_password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_status_of_partial_run() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp_dir.path()).unwrap();
        let run = RunId::new("alice@example.com").unwrap();

        let status = run_status(&store, &run).unwrap();
        assert!(!status.is_complete());
        assert_eq!(status.next_step().unwrap().artifact, ArtifactKey::PrivateKey);

        store.write(&run, ArtifactKey::PrivateKey, b"k").unwrap();
        store.write(&run, ArtifactKey::RevocationPassword, b"r").unwrap();

        let status = run_status(&store, &run).unwrap();
        assert_eq!(
            status.next_step().unwrap().artifact,
            ArtifactKey::CollectionPassword
        );
        assert_eq!(status.artifacts.iter().filter(|a| a.present).count(), 2);
    }

    #[test]
    fn test_status_of_complete_run() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp_dir.path()).unwrap();
        let run = RunId::new("alice@example.com").unwrap();

        for key in ArtifactKey::ALL {
            store.write(&run, key, b"x").unwrap();
        }

        let status = run_status(&store, &run).unwrap();
        assert!(status.is_complete());
        assert!(status.next_step().is_none());
    }
}
