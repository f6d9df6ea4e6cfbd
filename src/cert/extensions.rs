use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use sha1::{Digest, Sha1};
use x509_cert::ext::pkix::name::GeneralName;

use crate::error::{DevCertError, Result};

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use devcert::cert::extensions::SubjectAltName;
/// use devcert::cert::extensions::ToAndFromX509Extension;
/// let san = SubjectAltName { names: vec!["example.test".to_string()] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

fn decoding(err: der::Error) -> DevCertError {
    DevCertError::DecodingError(err.to_string())
}

/// Key identifier of a `SubjectPublicKeyInfo`: SHA-1 over the subjectPublicKey
/// bits (RFC 5280 4.2.1.2, method 1).
pub fn key_identifier(spki_der: &[u8]) -> Result<Vec<u8>> {
    let spki = x509_cert::spki::SubjectPublicKeyInfoRef::from_der(spki_der).map_err(decoding)?;
    Ok(Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec())
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// # Fields
/// * `names` - A list of DNS names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<String>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(|name| {
                    Ia5String::try_from(name.clone())
                        .map(GeneralName::DnsName)
                        .map_err(|e| {
                            DevCertError::InvalidInput(format!("DNS name {name:?}: {e}"))
                        })
                })
                .collect::<Result<Vec<_>>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension).map_err(decoding)?;
        let names = san
            .0
            .iter()
            .map(|name| match name {
                GeneralName::DnsName(dns) => Ok(dns.to_string()),
                _ => Err(DevCertError::DecodingError(
                    "Unsupported general name type".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names })
    }
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes).map_err(decoding)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(X509KeyUsage(self.0).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension).map_err(decoding)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension).map_err(decoding)?;
        let usage = eku
            .0
            .iter()
            .map(|v| match *v {
                const_oid::db::rfc5912::ID_KP_SERVER_AUTH => Ok(ExtendedKeyUsageOption::ServerAuth),
                const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => Ok(ExtendedKeyUsageOption::ClientAuth),
                _ => Err(DevCertError::DecodingError(format!(
                    "Unsupported extended key usage option {v}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { usage })
    }
}

/// Represents an option for the Extended Key Usage extension.
///
/// Only the TLS purposes a development certificate can serve are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
        }
    }
}

/// Represents the Subject Key Identifier (SKI) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski =
            x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.key_identifier.as_slice())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski =
            x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension).map_err(decoding)?;
        Ok(Self {
            key_identifier: ski.0.as_bytes().to_vec(),
        })
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// Only the key identifier form is produced; for a self-signed certificate it
/// equals the subject key identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki =
            x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension).map_err(decoding)?;
        let key_identifier = aki.key_identifier.ok_or_else(|| {
            DevCertError::DecodingError("authority key identifier has no key id".to_string())
        })?;
        Ok(Self {
            key_identifier: key_identifier.as_bytes().to_vec(),
        })
    }
}
