//! ASN.1 definitions for PublicKeyAndChallenge and SignedPublicKeyAndChallenge.
//!
//! ```text
//! PublicKeyAndChallenge ::= SEQUENCE {
//!     spki                SubjectPublicKeyInfo,
//!     challenge           IA5String
//! }
//!
//! SignedPublicKeyAndChallenge ::= SEQUENCE {
//!     publicKeyAndChallenge PublicKeyAndChallenge,
//!     signatureAlgorithm    AlgorithmIdentifier,
//!     signature             BIT STRING
//! }
//! ```
//!
//! The `Sequence` derive encodes members in field declaration order, so the
//! field order of each struct below *is* the wire order. Do not reorder.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use der::asn1::{AnyRef, BitString, Ia5String, ObjectIdentifier};
use der::{Any, Decode, Encode, Sequence};
use md5::{Digest, Md5};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::{SpkacError, SpkacResult};

/// `md5WithRSAEncryption` (PKCS #1)
pub const MD5_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");

/// The public key and challenge covered by the signature.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PublicKeyAndChallenge {
    /// Subject public key in standard SubjectPublicKeyInfo form
    pub spki: SubjectPublicKeyInfoOwned,
    /// Challenge string (may be empty)
    pub challenge: Ia5String,
}

impl PublicKeyAndChallenge {
    /// Pair an RSA public key with a challenge string.
    pub fn new(public_key: &RsaPublicKey, challenge: &str) -> SpkacResult<Self> {
        let spki_der = public_key.to_public_key_der()?;
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes())?;
        let challenge = Ia5String::new(challenge).map_err(SpkacError::Challenge)?;

        Ok(Self { spki, challenge })
    }

    /// Decode the embedded RSA public key.
    pub fn public_key(&self) -> SpkacResult<RsaPublicKey> {
        Ok(RsaPublicKey::from_public_key_der(&self.spki.to_der()?)?)
    }

    /// The challenge string.
    pub fn challenge(&self) -> &str {
        self.challenge.as_str()
    }
}

/// A signed public key and challenge, as submitted to the authority.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SignedPublicKeyAndChallenge {
    pub public_key_and_challenge: PublicKeyAndChallenge,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    pub signature: BitString,
}

impl SignedPublicKeyAndChallenge {
    /// Build the structure for `key` and sign it.
    ///
    /// The signature is RSASSA-PKCS1-v1_5 with MD5 over the DER encoding of
    /// the inner `PublicKeyAndChallenge` only, never the outer sequence.
    pub fn sign(key: &RsaPrivateKey, challenge: &str) -> SpkacResult<Self> {
        let public_key_and_challenge = PublicKeyAndChallenge::new(&key.to_public_key(), challenge)?;

        let message = public_key_and_challenge.to_der()?;
        let signature = key.sign(Pkcs1v15Sign::new::<Md5>(), &Md5::digest(&message))?;

        let spkac = Self {
            public_key_and_challenge,
            signature_algorithm: md5_with_rsa_encryption(),
            signature: BitString::from_bytes(&signature)?,
        };

        debug_assert!(
            spkac.verify().is_ok(),
            "freshly signed SPKAC must verify against its own key"
        );

        Ok(spkac)
    }

    /// Check the algorithm identifier and the signature over the inner structure.
    ///
    /// Returns the embedded public key on success.
    pub fn verify(&self) -> SpkacResult<RsaPublicKey> {
        if self.signature_algorithm.oid != MD5_WITH_RSA_ENCRYPTION {
            return Err(SpkacError::UnsupportedAlgorithm(self.signature_algorithm.oid));
        }

        let public_key = self.public_key_and_challenge.public_key()?;
        let message = self.public_key_and_challenge.to_der()?;
        let signature = self
            .signature
            .as_bytes()
            .ok_or(SpkacError::SignatureMismatch)?;

        public_key
            .verify(Pkcs1v15Sign::new::<Md5>(), &Md5::digest(&message), signature)
            .map_err(|_| SpkacError::SignatureMismatch)?;

        Ok(public_key)
    }

    /// Standard base64 (padded, single line) of the DER encoding.
    pub fn to_base64(&self) -> SpkacResult<String> {
        Ok(STANDARD.encode(self.to_der()?))
    }

    /// Parse the base64 wire form.
    pub fn from_base64(encoded: &str) -> SpkacResult<Self> {
        let der = STANDARD.decode(encoded.trim())?;
        Ok(Self::from_der(&der)?)
    }
}

/// `md5WithRSAEncryption` with the explicit NULL parameter the authority expects.
pub fn md5_with_rsa_encryption() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: MD5_WITH_RSA_ENCRYPTION,
        parameters: Some(Any::from(AnyRef::NULL)),
    }
}
