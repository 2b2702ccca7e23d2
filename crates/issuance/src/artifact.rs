//! Named pipeline artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One named, write-once output of a pipeline step.
///
/// The presence of an artifact in the store is the only record that its
/// step has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKey {
    /// RSA private key, PKCS#1 PEM
    PrivateKey,
    /// Password that allows revoking the issued certificate
    RevocationPassword,
    /// Password the authority mails to the applicant
    CollectionPassword,
    /// PEM certificate chain returned by the authority
    CertificateChain,
    /// PKCS#12 bundle of key and chain, no passphrase
    Bundle,
}

impl ArtifactKey {
    /// All artifacts in pipeline order.
    pub const ALL: [ArtifactKey; 5] = [
        ArtifactKey::PrivateKey,
        ArtifactKey::RevocationPassword,
        ArtifactKey::CollectionPassword,
        ArtifactKey::CertificateChain,
        ArtifactKey::Bundle,
    ];

    /// Stable identifier used in logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            ArtifactKey::PrivateKey => "private-key",
            ArtifactKey::RevocationPassword => "revocation-password",
            ArtifactKey::CollectionPassword => "collection-password",
            ArtifactKey::CertificateChain => "certificate-chain",
            ArtifactKey::Bundle => "bundle",
        }
    }

    /// File name the artifact is stored under.
    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKey::PrivateKey => "private_key.pem",
            ArtifactKey::RevocationPassword => "revocation_password.txt",
            ArtifactKey::CollectionPassword => "collection_password.txt",
            ArtifactKey::CertificateChain => "certificate_chain.pem",
            ArtifactKey::Bundle => "certificate_key_bundle.p12",
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_and_files_are_unique() {
        let names: HashSet<_> = ArtifactKey::ALL.iter().map(|k| k.name()).collect();
        let files: HashSet<_> = ArtifactKey::ALL.iter().map(|k| k.file_name()).collect();
        assert_eq!(names.len(), 5);
        assert_eq!(files.len(), 5);
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(ArtifactKey::CertificateChain.to_string(), "certificate-chain");
        assert_eq!(ArtifactKey::PrivateKey.file_name(), "private_key.pem");
    }
}
