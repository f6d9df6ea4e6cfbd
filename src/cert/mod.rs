pub mod extensions;
pub mod params;

use const_oid::ObjectIdentifier;
use der::{Decode, Encode};
use extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, FlagSet,
    KeyUsage, KeyUsages, SubjectAltName, SubjectKeyIdentifier,
};
use params::{CertificateParams, DistinguishedName, ExtensionParam, SerialNumber, Validity};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::asn1;
use crate::error::{DevCertError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::pem_codec::{self, CERTIFICATE_LABEL};
use crate::tbs_certificate::TbsCertificate;

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRsa,
    /// ECDSA over P-256 with SHA-256.
    EcdsaWithSha256,
    /// ECDSA over P-384 with SHA-384.
    EcdsaWithSha384,
    /// Ed25519 (the hash is part of the algorithm).
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRsa => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::EcdsaWithSha256 => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::EcdsaWithSha384 => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc8410::ID_ED_25519,
        }
    }

    /// Encodes the `AlgorithmIdentifier`.
    ///
    /// RSA carries explicit NULL parameters (RFC 4055); ECDSA and Ed25519
    /// omit them (RFC 5758, RFC 8410).
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let oid = asn1::object_identifier(&self.oid())?;
        match self {
            SignatureAlgorithm::Sha256WithRsa => asn1::sequence(&[oid, asn1::null()?]),
            _ => asn1::sequence(&[oid]),
        }
    }

    /// Maps a decoded `AlgorithmIdentifier` back to a supported algorithm.
    pub fn from_algorithm_identifier(algorithm: &AlgorithmIdentifierOwned) -> Result<Self> {
        match algorithm.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => Ok(SignatureAlgorithm::Sha256WithRsa),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(SignatureAlgorithm::EcdsaWithSha256),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Ok(SignatureAlgorithm::EcdsaWithSha384),
            const_oid::db::rfc8410::ID_ED_25519 => Ok(SignatureAlgorithm::Ed25519),
            oid => Err(DevCertError::UnsupportedAlgorithm(format!(
                "unsupported signature algorithm {oid}"
            ))),
        }
    }
}

/// Represents a signed X.509 certificate.
///
/// A `Certificate` is immutable: it is created by
/// [`Certificate::new_self_signed`] or decoded with [`Certificate::from_der`]
/// and only exposes read accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    tbs_certificate: TbsCertificate,
    tbs_der: Vec<u8>,
    signature_algorithm: SignatureAlgorithm,
    signature: Vec<u8>,
    der: Vec<u8>,
}

impl Certificate {
    /// Creates a new self-signed certificate.
    ///
    /// The subject, validity, serial number and DNS names are validated before
    /// the key is used. The TBS structure is encoded, signed with `key`, and assembled into
    /// `SEQUENCE { tbsCertificate, signatureAlgorithm, signatureValue }`.
    ///
    /// # Arguments
    /// * `params` - Subject, validity, serial number and extra extensions.
    /// * `key` - The key pair whose public half is certified and whose private half signs.
    pub fn new_self_signed(params: &CertificateParams, key: &KeyPair) -> Result<Self> {
        params.subject.validate()?;
        params.validity.validate()?;
        let serial_number = SerialNumber::new(params.serial_number.as_bytes())?;
        let dns_names = params.dns_names()?;

        let public_key = key.public_key();
        let extensions = leaf_extensions(params, dns_names, key, &public_key)?;
        let tbs_certificate = TbsCertificate::self_signed(
            params.subject.clone(),
            params.validity,
            serial_number,
            public_key,
            extensions,
        );

        let tbs_der = tbs_certificate.to_der()?;
        let signature_algorithm = key.signature_algorithm();
        let signature = key.sign(&tbs_der)?;
        let der = asn1::sequence(&[
            tbs_der.clone(),
            signature_algorithm.to_der()?,
            asn1::bit_string(&signature)?,
        ])?;

        tracing::debug!(
            common_name = %params.subject.common_name,
            serial = %tbs_certificate.serial_number(),
            algorithm = ?signature_algorithm,
            "issued self-signed certificate"
        );

        Ok(Self {
            tbs_certificate,
            tbs_der,
            signature_algorithm,
            signature,
            der,
        })
    }

    /// Decodes a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = x509_cert::Certificate::from_der(der)
            .map_err(|e| DevCertError::DecodingError(e.to_string()))?;

        let tbs_certificate = TbsCertificate::from_tbs_certificate_inner(&inner.tbs_certificate)?;
        let signature_algorithm =
            SignatureAlgorithm::from_algorithm_identifier(&inner.signature_algorithm)?;
        if signature_algorithm != tbs_certificate.signature_algorithm() {
            return Err(DevCertError::DecodingError(
                "outer and TBS signature algorithms differ".to_string(),
            ));
        }
        let signature = inner
            .signature
            .as_bytes()
            .ok_or_else(|| {
                DevCertError::DecodingError("signature has unused bits".to_string())
            })?
            .to_vec();
        let tbs_der = inner.tbs_certificate.to_der()?;

        Ok(Self {
            tbs_certificate,
            tbs_der,
            signature_algorithm,
            signature,
            der: der.to_vec(),
        })
    }

    /// Decodes a PEM certificate (label `CERTIFICATE`).
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let der = pem_codec::decode_expecting(pem_text, CERTIFICATE_LABEL)?;
        Self::from_der(&der)
    }

    /// DER encoding of the certificate.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// PEM encoding of the certificate.
    pub fn to_pem(&self) -> Result<String> {
        pem_codec::encode(&self.der, CERTIFICATE_LABEL)
    }

    /// Verifies that the certificate is self-issued and that its signature
    /// checks out against its own embedded public key.
    pub fn verify_self_signed(&self) -> Result<()> {
        if self.issuer() != self.subject() {
            return Err(DevCertError::VerificationError(
                "issuer and subject differ".to_string(),
            ));
        }
        self.public_key()
            .verify(self.signature_algorithm, &self.tbs_der, &self.signature)
    }

    pub fn tbs_certificate(&self) -> &TbsCertificate {
        &self.tbs_certificate
    }

    pub fn subject(&self) -> &DistinguishedName {
        self.tbs_certificate.subject()
    }

    pub fn issuer(&self) -> &DistinguishedName {
        self.tbs_certificate.issuer()
    }

    pub fn validity(&self) -> &Validity {
        self.tbs_certificate.validity()
    }

    pub fn serial_number(&self) -> &SerialNumber {
        self.tbs_certificate.serial_number()
    }

    pub fn public_key(&self) -> &PublicKey {
        self.tbs_certificate.subject_public_key()
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn extensions(&self) -> &[ExtensionParam] {
        self.tbs_certificate.extensions()
    }

    /// Finds and decodes an extension of type `E`, if present.
    pub fn extension<E: extensions::ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(ExtensionParam::to_extension)
            .transpose()
    }
}

// Extensions every development leaf certificate carries, followed by the caller's.
fn leaf_extensions(
    params: &CertificateParams,
    dns_names: Vec<String>,
    key: &KeyPair,
    public_key: &PublicKey,
) -> Result<Vec<ExtensionParam>> {
    let key_id = extensions::key_identifier(&public_key.to_spki_der()?)?;

    let mut key_usage: FlagSet<KeyUsages> = KeyUsages::DigitalSignature.into();
    if matches!(key, KeyPair::Rsa { .. }) {
        key_usage |= KeyUsages::KeyEncipherment;
    }

    let mut extensions = vec![
        ExtensionParam::from_extension(BasicConstraints::default(), true)?,
        ExtensionParam::from_extension(KeyUsage(key_usage), true)?,
        ExtensionParam::from_extension(
            ExtendedKeyUsage {
                usage: vec![
                    ExtendedKeyUsageOption::ServerAuth,
                    ExtendedKeyUsageOption::ClientAuth,
                ],
            },
            false,
        )?,
    ];
    if !dns_names.is_empty() {
        extensions.push(ExtensionParam::from_extension(
            SubjectAltName { names: dns_names },
            false,
        )?);
    }
    extensions.push(ExtensionParam::from_extension(
        SubjectKeyIdentifier {
            key_identifier: key_id.clone(),
        },
        false,
    )?);
    extensions.push(ExtensionParam::from_extension(
        AuthorityKeyIdentifier {
            key_identifier: key_id,
        },
        false,
    )?);

    for extra in &params.extensions {
        if extensions.iter().any(|ext| ext.oid == extra.oid) {
            return Err(DevCertError::InvalidInput(format!(
                "extension {} appears more than once",
                extra.oid
            )));
        }
        extensions.push(extra.clone());
    }

    Ok(extensions)
}
