//! Signed Public Key and Challenge (SPKAC)
//!
//! Builds the legacy browser-era key enrollment structure some certificate
//! authorities still require for email certificates.
//!
//! The format is old and weak on purpose: the signature is MD5 with
//! RSASSA-PKCS1-v1_5, because that is what the authority validates.
//! Correctness here means byte-exact compatibility.
//!
//! # Encoding
//!
//! 1. Encode the RSA public key as SubjectPublicKeyInfo
//! 2. Pair it with the challenge in a [`PublicKeyAndChallenge`]
//! 3. DER-encode that inner structure and sign the bytes (MD5, PKCS#1 v1.5)
//! 4. Wrap inner structure, `md5WithRSAEncryption` + NULL, and the signature
//!    in a [`SignedPublicKeyAndChallenge`]
//! 5. DER-encode the outer structure and base64 it
//!
//! # Example
//!
//! ```ignore
//! use letssmime_spkac::{build_signed_structure, DEFAULT_CHALLENGE};
//!
//! let spkac = build_signed_structure(&private_key, DEFAULT_CHALLENGE)?;
//! ```

mod error;
mod structure;

pub use error::{SpkacError, SpkacResult};
pub use structure::{
    md5_with_rsa_encryption, PublicKeyAndChallenge, SignedPublicKeyAndChallenge,
    MD5_WITH_RSA_ENCRYPTION,
};

use rsa::RsaPrivateKey;

/// Challenge used for enrollment.
///
/// The authority does not use the challenge for replay protection and the
/// established client always sends it empty. Keep it that way unless the
/// authority's expectations are known to differ.
pub const DEFAULT_CHALLENGE: &str = "";

/// Build, sign and encode an SPKAC for `key`.
///
/// Returns the base64 text of the DER-encoded `SignedPublicKeyAndChallenge`,
/// ready to be submitted as a form field.
pub fn build_signed_structure(key: &RsaPrivateKey, challenge: &str) -> SpkacResult<String> {
    SignedPublicKeyAndChallenge::sign(key, challenge)?.to_base64()
}
