use std::fmt;
use std::str::FromStr;

use der::Decode;
use ecdsa::signature::{Signer, Verifier};
use ed25519_dalek::pkcs8::KeypairBytes as Ed25519KeypairBytes;
use ed25519_dalek::{
    Signature as Ed25519Signature, SigningKey as Ed25519SigningKey,
    VerifyingKey as Ed25519VerifyingKey,
};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::spki::SubjectPublicKeyInfoRef;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, SecretDocument};
use rand_core::{CryptoRngCore, OsRng};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs1v15::{
    Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey,
};
use rsa::signature::SignatureEncoding;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::cert::SignatureAlgorithm;
use crate::error::{DevCertError, Result};
use crate::pem_codec::{self, PRIVATE_KEY_LABEL, RSA_PRIVATE_KEY_LABEL};

/// RSA modulus sizes accepted by [`KeyPair::generate`].
pub const SUPPORTED_RSA_BITS: [usize; 3] = [2048, 3072, 4096];

/// Key algorithms a development certificate can be issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// RSA with the given modulus size, see [`SUPPORTED_RSA_BITS`].
    Rsa { bits: usize },
    /// ECDSA over NIST P-256.
    EcdsaP256,
    /// ECDSA over NIST P-384.
    EcdsaP384,
    /// Ed25519.
    Ed25519,
}

impl KeyAlgorithm {
    pub const RSA_2048: Self = KeyAlgorithm::Rsa { bits: 2048 };

    /// Checks that the algorithm/parameter combination can be generated.
    pub fn validate(&self) -> Result<()> {
        match self {
            KeyAlgorithm::Rsa { bits } if !SUPPORTED_RSA_BITS.contains(bits) => {
                Err(DevCertError::UnsupportedAlgorithm(format!(
                    "RSA keys must be one of {SUPPORTED_RSA_BITS:?} bits, got {bits}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// The signature algorithm used when this kind of key signs a certificate.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyAlgorithm::Rsa { .. } => SignatureAlgorithm::Sha256WithRsa,
            KeyAlgorithm::EcdsaP256 => SignatureAlgorithm::EcdsaWithSha256,
            KeyAlgorithm::EcdsaP384 => SignatureAlgorithm::EcdsaWithSha384,
            KeyAlgorithm::Ed25519 => SignatureAlgorithm::Ed25519,
        }
    }
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        Self::RSA_2048
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa { bits } => write!(f, "rsa-{bits}"),
            KeyAlgorithm::EcdsaP256 => f.write_str("ecdsa-p256"),
            KeyAlgorithm::EcdsaP384 => f.write_str("ecdsa-p384"),
            KeyAlgorithm::Ed25519 => f.write_str("ed25519"),
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = DevCertError;

    /// Parses names such as `rsa-2048`, `ecdsa-p256`, `ecdsa-p384` or `ed25519`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let algorithm = match normalized.as_str() {
            "ecdsa-p256" | "p256" => KeyAlgorithm::EcdsaP256,
            "ecdsa-p384" | "p384" => KeyAlgorithm::EcdsaP384,
            "ed25519" => KeyAlgorithm::Ed25519,
            other => {
                let bits = other
                    .strip_prefix("rsa-")
                    .and_then(|bits| bits.parse::<usize>().ok())
                    .ok_or_else(|| {
                        DevCertError::UnsupportedAlgorithm(format!("unknown key algorithm {s:?}"))
                    })?;
                KeyAlgorithm::Rsa { bits }
            }
        };
        algorithm.validate()?;
        Ok(algorithm)
    }
}

/// A freshly generated or imported key pair.
///
/// The private half only leaves this value through [`KeyPair::private_key_der`]
/// and [`KeyPair::to_pem`].
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl KeyPair {
    /// Generates a key pair from the operating system's random source.
    pub fn generate(algorithm: KeyAlgorithm) -> Result<Self> {
        Self::generate_with_rng(algorithm, &mut OsRng)
    }

    /// Generates a key pair from the given random source.
    ///
    /// Fails with [`DevCertError::UnsupportedAlgorithm`] before touching the
    /// random source, and with [`DevCertError::EntropyError`] when the source
    /// cannot produce bytes.
    pub fn generate_with_rng<R: CryptoRngCore>(algorithm: KeyAlgorithm, rng: &mut R) -> Result<Self> {
        algorithm.validate()?;
        probe_entropy(rng)?;
        tracing::debug!(%algorithm, "generating key pair");

        let key_pair = match algorithm {
            KeyAlgorithm::Rsa { bits } => {
                let private = RsaPrivateKey::new(rng, bits)?;
                Self::from_rsa(private)
            }
            KeyAlgorithm::EcdsaP256 => {
                let signing_key = P256SigningKey::random(rng);
                let verifying_key = *signing_key.verifying_key();
                KeyPair::EcdsaP256 {
                    signing_key,
                    verifying_key,
                }
            }
            KeyAlgorithm::EcdsaP384 => {
                let signing_key = P384SigningKey::random(rng);
                let verifying_key = *signing_key.verifying_key();
                KeyPair::EcdsaP384 {
                    signing_key,
                    verifying_key,
                }
            }
            KeyAlgorithm::Ed25519 => KeyPair::Ed25519 {
                signing_key: Ed25519SigningKey::generate(rng),
            },
        };
        Ok(key_pair)
    }

    fn from_rsa(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyPair::Rsa { public, .. } => KeyAlgorithm::Rsa {
                bits: public.size() * 8,
            },
            KeyPair::EcdsaP256 { .. } => KeyAlgorithm::EcdsaP256,
            KeyPair::EcdsaP384 { .. } => KeyAlgorithm::EcdsaP384,
            KeyPair::Ed25519 { .. } => KeyAlgorithm::Ed25519,
        }
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.algorithm().signature_algorithm()
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    /// Signs `message` with this key's [`SignatureAlgorithm`].
    ///
    /// ECDSA signatures are returned as a DER `Ecdsa-Sig-Value`, the form
    /// X.509 carries in its signature BIT STRING.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key = RsaSigningKey::<Sha256>::new(private.as_ref().clone());
                let signature: RsaSignature = signing_key.try_sign(message)?;
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: p256::ecdsa::Signature = signing_key.try_sign(message)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                let signature: p384::ecdsa::Signature = signing_key.try_sign(message)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::Ed25519 { signing_key } => {
                let signature: Ed25519Signature = signing_key.try_sign(message)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    /// DER encoding of the private key together with its PEM label.
    ///
    /// RSA keys use PKCS#1 (`RSA PRIVATE KEY`), every other key PKCS#8 (`PRIVATE KEY`).
    /// PKCS#8 output is always the version 1 `PrivateKeyInfo` form.
    pub fn private_key_der(&self) -> Result<(&'static str, SecretDocument)> {
        match self {
            KeyPair::Rsa { private, .. } => Ok((RSA_PRIVATE_KEY_LABEL, private.to_pkcs1_der()?)),
            KeyPair::EcdsaP256 { signing_key, .. } => {
                Ok((PRIVATE_KEY_LABEL, signing_key.to_pkcs8_der()?))
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                Ok((PRIVATE_KEY_LABEL, signing_key.to_pkcs8_der()?))
            }
            // PKCS#8 v1, without the optional public key that OpenSSL refuses.
            KeyPair::Ed25519 { signing_key } => {
                let keypair = Ed25519KeypairBytes {
                    secret_key: signing_key.to_bytes(),
                    public_key: None,
                };
                Ok((PRIVATE_KEY_LABEL, keypair.to_pkcs8_der()?))
            }
        }
    }

    /// PEM encoding of the private key, see [`KeyPair::private_key_der`].
    pub fn to_pem(&self) -> Result<String> {
        let (label, document) = self.private_key_der()?;
        pem_codec::encode(document.as_bytes(), label)
    }

    /// Imports a key previously exported with [`KeyPair::to_pem`].
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let (label, der) = pem_codec::decode(pem_text)?;
        match label.as_str() {
            RSA_PRIVATE_KEY_LABEL => {
                let private = RsaPrivateKey::from_pkcs1_der(&der).map_err(decoding)?;
                Ok(Self::from_rsa(private))
            }
            PRIVATE_KEY_LABEL => Self::from_pkcs8_der(&der),
            other => Err(DevCertError::MalformedPem(format!(
                "expected a private key, found label {other:?}"
            ))),
        }
    }

    /// Imports a PKCS#8 `PrivateKeyInfo` holding an RSA, P-256, P-384 or Ed25519 key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(der).map_err(decoding)?;
        match info.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => {
                let private = RsaPrivateKey::from_pkcs8_der(der).map_err(decoding)?;
                Ok(Self::from_rsa(private))
            }
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                match info.algorithm.parameters_oid().map_err(decoding)? {
                    const_oid::db::rfc5912::SECP_256_R_1 => {
                        let signing_key = P256SigningKey::from_pkcs8_der(der).map_err(decoding)?;
                        let verifying_key = *signing_key.verifying_key();
                        Ok(KeyPair::EcdsaP256 {
                            signing_key,
                            verifying_key,
                        })
                    }
                    const_oid::db::rfc5912::SECP_384_R_1 => {
                        let signing_key = P384SigningKey::from_pkcs8_der(der).map_err(decoding)?;
                        let verifying_key = *signing_key.verifying_key();
                        Ok(KeyPair::EcdsaP384 {
                            signing_key,
                            verifying_key,
                        })
                    }
                    curve => Err(DevCertError::UnsupportedAlgorithm(format!(
                        "unsupported elliptic curve {curve}"
                    ))),
                }
            }
            const_oid::db::rfc8410::ID_ED_25519 => Ok(KeyPair::Ed25519 {
                signing_key: Ed25519SigningKey::from_pkcs8_der(der).map_err(decoding)?,
            }),
            oid => Err(DevCertError::UnsupportedAlgorithm(format!(
                "unsupported private key algorithm {oid}"
            ))),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// The public half of a [`KeyPair`], as embedded in a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        key_pair.public_key()
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            PublicKey::Rsa(_) => SignatureAlgorithm::Sha256WithRsa,
            PublicKey::EcdsaP256(_) => SignatureAlgorithm::EcdsaWithSha256,
            PublicKey::EcdsaP384(_) => SignatureAlgorithm::EcdsaWithSha384,
            PublicKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
        }
    }

    /// DER-encoded `SubjectPublicKeyInfo`.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            PublicKey::Rsa(public) => public.to_public_key_der()?,
            PublicKey::EcdsaP256(verifying_key) => verifying_key.to_public_key_der()?,
            PublicKey::EcdsaP384(verifying_key) => verifying_key.to_public_key_der()?,
            PublicKey::Ed25519(verifying_key) => verifying_key.to_public_key_der()?,
        };
        Ok(document.into_vec())
    }

    /// Parses a DER-encoded `SubjectPublicKeyInfo`.
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoRef::from_der(der).map_err(decoding)?;
        match spki.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => Ok(PublicKey::Rsa(
                RsaPublicKey::from_public_key_der(der).map_err(decoding)?,
            )),
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                match spki.algorithm.parameters_oid().map_err(decoding)? {
                    const_oid::db::rfc5912::SECP_256_R_1 => Ok(PublicKey::EcdsaP256(
                        P256VerifyingKey::from_public_key_der(der).map_err(decoding)?,
                    )),
                    const_oid::db::rfc5912::SECP_384_R_1 => Ok(PublicKey::EcdsaP384(
                        P384VerifyingKey::from_public_key_der(der).map_err(decoding)?,
                    )),
                    curve => Err(DevCertError::UnsupportedAlgorithm(format!(
                        "unsupported elliptic curve {curve}"
                    ))),
                }
            }
            const_oid::db::rfc8410::ID_ED_25519 => Ok(PublicKey::Ed25519(
                Ed25519VerifyingKey::from_public_key_der(der).map_err(decoding)?,
            )),
            oid => Err(DevCertError::UnsupportedAlgorithm(format!(
                "unsupported public key algorithm {oid}"
            ))),
        }
    }

    /// Verifies `signature` over `message`.
    ///
    /// `algorithm` must be the one this key signs with; a mismatch is a
    /// verification failure rather than a silent re-interpretation.
    pub fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        if algorithm != self.signature_algorithm() {
            return Err(DevCertError::VerificationError(format!(
                "{algorithm:?} does not match a {:?} key",
                self.signature_algorithm()
            )));
        }
        let outcome = match self {
            PublicKey::Rsa(public) => {
                let verifying_key = RsaVerifyingKey::<Sha256>::new(public.clone());
                let signature = RsaSignature::try_from(signature).map_err(verification)?;
                verifying_key.verify(message, &signature)
            }
            PublicKey::EcdsaP256(verifying_key) => {
                let signature = p256::ecdsa::Signature::from_der(signature).map_err(verification)?;
                verifying_key.verify(message, &signature)
            }
            PublicKey::EcdsaP384(verifying_key) => {
                let signature = p384::ecdsa::Signature::from_der(signature).map_err(verification)?;
                verifying_key.verify(message, &signature)
            }
            PublicKey::Ed25519(verifying_key) => {
                let signature = Ed25519Signature::from_slice(signature).map_err(verification)?;
                verifying_key.verify(message, &signature)
            }
        };
        outcome.map_err(verification)
    }
}

fn probe_entropy<R: CryptoRngCore>(rng: &mut R) -> Result<()> {
    let mut probe = [0u8; 32];
    rng.try_fill_bytes(&mut probe)
        .map_err(|err| DevCertError::EntropyError(err.to_string()))
}

fn decoding(err: impl fmt::Display) -> DevCertError {
    DevCertError::DecodingError(err.to_string())
}

fn verification(err: impl fmt::Display) -> DevCertError {
    DevCertError::VerificationError(err.to_string())
}
