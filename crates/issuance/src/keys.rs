//! RSA key generation and PEM serialization.

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::{BigUint, RsaPrivateKey};
use tracing::debug;

use crate::error::{IssuanceError, IssuanceResult};

/// Default modulus size for new keys
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Public exponent for new keys
pub const PUBLIC_EXPONENT: u64 = 65_537;

/// Generate a fresh RSA key pair.
///
/// CPU-bound and slow at 4096 bits; run it off the async executor.
pub fn generate_private_key(bits: usize) -> IssuanceResult<RsaPrivateKey> {
    let exponent = BigUint::from(PUBLIC_EXPONENT);
    let key = RsaPrivateKey::new_with_exp(&mut rand::rngs::OsRng, bits, &exponent)
        .map_err(|e| IssuanceError::KeyMaterial(format!("RSA key generation failed: {e}")))?;

    debug!(bits, "Generated RSA private key");
    Ok(key)
}

/// Serialize as unencrypted PKCS#1 PEM (`BEGIN RSA PRIVATE KEY`), the form
/// `openssl pkcs12` accepts as `-inkey`.
pub fn encode_private_key(key: &RsaPrivateKey) -> IssuanceResult<Vec<u8>> {
    let pem = key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| IssuanceError::KeyMaterial(format!("failed to encode private key: {e}")))?;
    Ok(pem.as_bytes().to_vec())
}

/// Parse a key written by [`encode_private_key`].
pub fn decode_private_key(pem: &[u8]) -> IssuanceResult<RsaPrivateKey> {
    let pem = std::str::from_utf8(pem)
        .map_err(|e| IssuanceError::KeyMaterial(format!("private key is not UTF-8: {e}")))?;

    RsaPrivateKey::from_pkcs1_pem(pem)
        .map_err(|e| IssuanceError::KeyMaterial(format!("failed to decode private key: {e}")))
}
