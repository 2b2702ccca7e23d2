//! SPKAC error types.

use der::asn1::ObjectIdentifier;
use thiserror::Error;

/// Result type for SPKAC operations.
pub type SpkacResult<T> = Result<T, SpkacError>;

/// Errors raised while building, encoding or verifying an SPKAC.
///
/// Every variant is fatal for the caller: malformed key material or a
/// structure that does not verify cannot be repaired by retrying.
#[derive(Debug, Error)]
pub enum SpkacError {
    /// The RSA public key could not be encoded as SubjectPublicKeyInfo.
    #[error("failed to encode public key: {0}")]
    PublicKey(#[from] spki::Error),

    /// The challenge contains characters outside IA5 (7-bit ASCII).
    #[error("challenge is not a valid IA5String: {0}")]
    Challenge(#[source] der::Error),

    /// DER encoding or decoding failed.
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    /// The private key refused to produce a signature.
    #[error("RSA signing failed: {0}")]
    Signing(#[from] rsa::Error),

    /// Input was not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The structure names a signature algorithm other than md5WithRSAEncryption.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(ObjectIdentifier),

    /// The signature does not verify against the embedded public key.
    #[error("signature does not match the embedded public key")]
    SignatureMismatch,
}
