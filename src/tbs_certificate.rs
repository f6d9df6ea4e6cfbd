use der::TagNumber;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;

use crate::asn1;
use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam, SerialNumber, Validity};
use crate::error::{DevCertError, Result};
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// Certificates built by this crate are always version 3 and self-signed.
/// [`TbsCertificate::self_signed`] is the only constructor for new
/// certificates and sets the issuer to the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TbsCertificate {
    serial_number: SerialNumber,
    signature_algorithm: SignatureAlgorithm,
    issuer: DistinguishedName,
    validity: Validity,
    subject: DistinguishedName,
    subject_public_key: PublicKey,
    extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Creates the TBS structure of a self-signed certificate.
    ///
    /// The signature algorithm follows from the subject's public key, since
    /// the matching private key signs the certificate.
    pub fn self_signed(
        subject: DistinguishedName,
        validity: Validity,
        serial_number: SerialNumber,
        subject_public_key: PublicKey,
        extensions: Vec<ExtensionParam>,
    ) -> Self {
        Self {
            serial_number,
            signature_algorithm: subject_public_key.signature_algorithm(),
            issuer: subject.clone(),
            validity,
            subject,
            subject_public_key,
            extensions,
        }
    }

    /// Encodes the structure as DER.
    ///
    /// ```text
    /// TBSCertificate ::= SEQUENCE {
    ///     version         [0] EXPLICIT Version DEFAULT v1,
    ///     serialNumber        CertificateSerialNumber,
    ///     signature           AlgorithmIdentifier,
    ///     issuer              Name,
    ///     validity            Validity,
    ///     subject             Name,
    ///     subjectPublicKeyInfo SubjectPublicKeyInfo,
    ///     extensions      [3] EXPLICIT Extensions OPTIONAL }
    /// ```
    pub fn to_der(&self) -> Result<Vec<u8>> {
        // v3 is encoded as INTEGER 2
        let version = asn1::explicit(TagNumber::N0, &asn1::small_integer(2)?)?;

        let mut fields = vec![
            version,
            self.serial_number.to_der()?,
            self.signature_algorithm.to_der()?,
            self.issuer.to_der()?,
            self.validity.to_der()?,
            self.subject.to_der()?,
            self.subject_public_key.to_spki_der()?,
        ];

        if !self.extensions.is_empty() {
            let extensions = self
                .extensions
                .iter()
                .map(ExtensionParam::to_der)
                .collect::<Result<Vec<_>>>()?;
            fields.push(asn1::explicit(TagNumber::N3, &asn1::sequence(&extensions)?)?);
        }

        asn1::sequence(&fields)
    }

    /// Creates a `TbsCertificate` from a decoded `TbsCertificateInner`.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        use der::Encode;

        if inner.version != Version::V3 {
            return Err(DevCertError::DecodingError(format!(
                "expected a version 3 certificate, found {:?}",
                inner.version
            )));
        }

        let issuer = DistinguishedName::from_x509_name(&inner.issuer)?;
        let subject = DistinguishedName::from_x509_name(&inner.subject)?;
        let spki_der = inner.subject_public_key_info.to_der()?;
        let subject_public_key = PublicKey::from_spki_der(&spki_der)?;
        let signature_algorithm = SignatureAlgorithm::from_algorithm_identifier(&inner.signature)?;

        let extensions = inner
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect::<Vec<_>>();

        // Decoded windows are kept as found; they were validated by whoever issued them.
        let validity = Validity {
            not_before: inner.validity.not_before.to_system_time().into(),
            not_after: inner.validity.not_after.to_system_time().into(),
        };

        Ok(Self {
            serial_number: SerialNumber::from_magnitude(inner.serial_number.as_bytes()),
            signature_algorithm,
            issuer,
            validity,
            subject,
            subject_public_key,
            extensions,
        })
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn subject_public_key(&self) -> &PublicKey {
        &self.subject_public_key
    }

    pub fn extensions(&self) -> &[ExtensionParam] {
        &self.extensions
    }
}

#[cfg(test)]
mod tests {
    use der::Decode;
    use time::OffsetDateTime;

    use super::*;
    use crate::key::{KeyAlgorithm, KeyPair};

    fn tbs(extensions: Vec<ExtensionParam>) -> TbsCertificate {
        let key_pair = KeyPair::generate(KeyAlgorithm::EcdsaP256).unwrap();
        let subject = DistinguishedName::builder()
            .common_name("tbs.test".to_string())
            .country("DE".to_string())
            .build();
        let start = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        TbsCertificate::self_signed(
            subject,
            Validity::starting_at(start, 10).unwrap(),
            SerialNumber::new(&[0x0a, 0x0b]).unwrap(),
            key_pair.public_key(),
            extensions,
        )
    }

    #[test]
    fn test_issuer_is_subject() {
        let tbs = tbs(vec![]);
        assert_eq!(tbs.issuer(), tbs.subject());
        assert_eq!(tbs.signature_algorithm(), SignatureAlgorithm::EcdsaWithSha256);
    }

    #[test]
    fn test_encoding_is_readable_by_x509_cert() {
        let extension = ExtensionParam {
            oid: const_oid::ObjectIdentifier::new_unwrap("2.5.29.19"),
            critical: true,
            value: vec![0x30, 0x00],
        };
        let tbs = tbs(vec![extension]);
        let der = tbs.to_der().unwrap();

        let inner = x509_cert::TbsCertificate::from_der(&der).unwrap();
        assert_eq!(inner.version, Version::V3);
        assert_eq!(inner.serial_number.as_bytes(), [0x0a, 0x0b]);
        assert_eq!(TbsCertificate::from_tbs_certificate_inner(&inner).unwrap(), tbs);
    }

    #[test]
    fn test_extensions_field_omitted_when_empty() {
        let der = tbs(vec![]).to_der().unwrap();
        let inner = x509_cert::TbsCertificate::from_der(&der).unwrap();
        assert!(inner.extensions.is_none());
    }
}
