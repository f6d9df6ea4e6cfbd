use std::fmt;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::{Tag, Tagged};
use rand_core::{CryptoRngCore, OsRng};
use time::{Duration, OffsetDateTime};

use super::extensions::ToAndFromX509Extension;
use crate::asn1;
use crate::error::{DevCertError, Result};

/// Upper bound on the length of a name attribute (X.520 `ub-name` family).
pub const MAX_ATTRIBUTE_LEN: usize = 64;

/// Upper bound on the textual length of a DNS name.
pub const MAX_DNS_NAME_LEN: usize = 253;

pub const COUNTRY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
pub const STATE_OR_PROVINCE_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
pub const LOCALITY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
pub const ORGANIZATION_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
pub const ORGANIZATIONAL_UNIT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
pub const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Parameters for building a self-signed certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject (and issuer).
/// * `validity` - The validity window.
/// * `serial_number` - The certificate serial number.
/// * `subject_alt_names` - DNS names; the common name is used when empty.
/// * `extensions` - Additional X.509 extensions appended after the standard ones.
#[derive(Clone, Debug, Builder)]
pub struct CertificateParams {
    pub subject: DistinguishedName,
    pub validity: Validity,
    pub serial_number: SerialNumber,
    #[builder(default)]
    pub subject_alt_names: Vec<String>,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

impl CertificateParams {
    /// The DNS names certified by the SubjectAltName extension.
    ///
    /// Explicit `subject_alt_names` must all be valid DNS names. When the list
    /// is empty the common name is used, but only if it is itself a DNS name;
    /// otherwise the result is empty and no SubjectAltName is emitted.
    pub fn dns_names(&self) -> Result<Vec<String>> {
        dns_names(&self.subject_alt_names, &self.subject.common_name)
    }
}

pub(crate) fn dns_names(subject_alt_names: &[String], common_name: &str) -> Result<Vec<String>> {
    if subject_alt_names.is_empty() {
        return Ok(if is_dns_name(common_name) {
            vec![common_name.to_string()]
        } else {
            vec![]
        });
    }
    for name in subject_alt_names {
        if !is_dns_name(name) {
            return Err(DevCertError::InvalidSubject(format!(
                "subject alternative name {name:?} is not a valid DNS name"
            )));
        }
    }
    Ok(subject_alt_names.to_vec())
}

/// Whether `name` is an ASCII host name (RFC 1123 labels), optionally with a
/// leading `*.` wildcard label.
pub fn is_dns_name(name: &str) -> bool {
    let host = name.strip_prefix("*.").unwrap_or(name);
    !host.is_empty()
        && name.len() <= MAX_DNS_NAME_LEN
        && host.split('.').all(|label| {
            (1..=63).contains(&label.len())
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// Attributes are encoded in the order C, ST, L, O, OU, CN with one attribute
/// per RDN; absent attributes are omitted.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C), exactly two ASCII letters.
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// Checks every attribute without encoding anything.
    pub fn validate(&self) -> Result<()> {
        validate_attribute("common name", &self.common_name)?;
        if let Some(country) = &self.country {
            if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_alphabetic()) {
                return Err(DevCertError::InvalidSubject(format!(
                    "Country code must be exactly 2 characters (ASCII letters), got {country:?}"
                )));
            }
        }
        for (field, value) in [
            ("state", &self.state),
            ("locality", &self.locality),
            ("organization", &self.organization),
            ("organizational unit", &self.organization_unit),
        ] {
            if let Some(value) = value {
                validate_attribute(field, value)?;
            }
        }
        Ok(())
    }

    /// The attributes present, in encoding order.
    pub fn attributes(&self) -> Vec<(ObjectIdentifier, &str)> {
        [
            (COUNTRY_NAME, self.country.as_deref()),
            (STATE_OR_PROVINCE_NAME, self.state.as_deref()),
            (LOCALITY_NAME, self.locality.as_deref()),
            (ORGANIZATION_NAME, self.organization.as_deref()),
            (ORGANIZATIONAL_UNIT_NAME, self.organization_unit.as_deref()),
            (COMMON_NAME, Some(self.common_name.as_str())),
        ]
        .into_iter()
        .filter_map(|(oid, value)| value.map(|value| (oid, value)))
        .collect()
    }

    /// Encodes the name as an RDNSequence.
    ///
    /// The country is a PrintableString, every other attribute a UTF8String.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let rdns = self
            .attributes()
            .into_iter()
            .map(|(oid, value)| {
                let encoded_value = if oid == COUNTRY_NAME {
                    asn1::printable_string(value)?
                } else {
                    asn1::utf8_string(value)?
                };
                let attribute = asn1::sequence(&[asn1::object_identifier(&oid)?, encoded_value])?;
                asn1::set(&[attribute])
            })
            .collect::<Result<Vec<_>>>()?;
        asn1::sequence(&rdns)
    }

    /// Creates a `DistinguishedName` from a decoded X.509 name.
    ///
    /// Attributes other than the six supported ones are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::Name) -> Result<Self> {
        let mut name = DistinguishedName::default();
        let mut common_name = None;

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = attribute_text(&attr.value)?;
                match attr.oid {
                    COMMON_NAME => common_name = Some(value),
                    COUNTRY_NAME => name.country = Some(value),
                    STATE_OR_PROVINCE_NAME => name.state = Some(value),
                    LOCALITY_NAME => name.locality = Some(value),
                    ORGANIZATION_NAME => name.organization = Some(value),
                    ORGANIZATIONAL_UNIT_NAME => name.organization_unit = Some(value),
                    _ => {}
                }
            }
        }

        name.common_name = common_name.ok_or_else(|| {
            DevCertError::DecodingError("name has no common name attribute".to_string())
        })?;
        Ok(name)
    }
}

fn validate_attribute(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DevCertError::InvalidSubject(format!("{field} must not be empty")));
    }
    let len = value.chars().count();
    if len > MAX_ATTRIBUTE_LEN {
        return Err(DevCertError::InvalidSubject(format!(
            "{field} is {len} characters long, at most {MAX_ATTRIBUTE_LEN} are allowed"
        )));
    }
    Ok(())
}

fn attribute_text(value: &der::Any) -> Result<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {
            std::str::from_utf8(value.value())
                .map(str::to_owned)
                .map_err(|e| DevCertError::DecodingError(e.to_string()))
        }
        other => Err(DevCertError::DecodingError(format!(
            "unsupported name attribute type {other}"
        ))),
    }
}

/// Certificate validity period.
///
/// Both instants are whole seconds; `not_before` is strictly before `not_after`.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity window, truncating both instants to whole seconds.
    pub fn new(not_before: OffsetDateTime, not_after: OffsetDateTime) -> Result<Self> {
        let validity = Self {
            not_before: truncate_to_second(not_before)?,
            not_after: truncate_to_second(not_after)?,
        };
        validity.validate()?;
        Ok(validity)
    }

    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Result<Self> {
        Self::starting_at(OffsetDateTime::now_utc(), days)
    }

    /// Creates a validity period of exactly `days * 86400` seconds from `start`.
    pub fn starting_at(start: OffsetDateTime, days: i64) -> Result<Self> {
        if days <= 0 {
            return Err(DevCertError::InvalidValidity(format!(
                "valid_days must be a positive number of days, got {days}"
            )));
        }
        let span = days
            .checked_mul(86_400)
            .map(Duration::seconds)
            .ok_or_else(|| DevCertError::InvalidValidity(format!("{days} days is too long")))?;
        let start = truncate_to_second(start)?;
        let end = start
            .checked_add(span)
            .ok_or_else(|| DevCertError::InvalidValidity(format!("{days} days is too long")))?;
        Self::new(start, end)
    }

    /// Checks ordering and that both instants fit the certificate time encoding.
    pub fn validate(&self) -> Result<()> {
        if self.not_after <= self.not_before {
            return Err(DevCertError::InvalidValidity(format!(
                "not_after ({}) must be after not_before ({})",
                self.not_after, self.not_before
            )));
        }
        for instant in [self.not_before, self.not_after] {
            asn1::date_time(instant)
                .map_err(|err| DevCertError::InvalidValidity(err.to_string()))?;
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        self.not_after - self.not_before
    }

    /// Encodes the window as `SEQUENCE { notBefore Time, notAfter Time }`.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        asn1::sequence(&[asn1::time(self.not_before)?, asn1::time(self.not_after)?])
    }
}

fn truncate_to_second(instant: OffsetDateTime) -> Result<OffsetDateTime> {
    instant
        .replace_nanosecond(0)
        .map_err(|err| DevCertError::InvalidValidity(err.to_string()))
}

/// A positive certificate serial number of at most 20 octets (RFC 5280 4.1.2.2).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SerialNumber(Vec<u8>);

impl SerialNumber {
    pub const MAX_LEN: usize = 20;

    /// Creates a serial number from an unsigned big-endian magnitude.
    pub fn new(magnitude: &[u8]) -> Result<Self> {
        let serial = Self::from_magnitude(magnitude);
        match serial.0.as_slice() {
            [] => Err(DevCertError::InvalidInput(
                "serial number must be a positive integer".to_string(),
            )),
            bytes if bytes.len() > Self::MAX_LEN
                || (bytes.len() == Self::MAX_LEN && bytes[0] & 0x80 != 0) =>
            {
                Err(DevCertError::InvalidInput(format!(
                    "serial number must encode in at most {} octets",
                    Self::MAX_LEN
                )))
            }
            _ => Ok(serial),
        }
    }

    /// A random 20-octet serial number from the operating system's random source.
    pub fn random() -> Result<Self> {
        Self::random_with_rng(&mut OsRng)
    }

    /// A random 20-octet serial number.
    ///
    /// The top bit is cleared so no sign octet is needed and the next bit is
    /// set so the value never shrinks below 20 octets.
    pub fn random_with_rng<R: CryptoRngCore>(rng: &mut R) -> Result<Self> {
        let mut bytes = [0u8; Self::MAX_LEN];
        rng.try_fill_bytes(&mut bytes)
            .map_err(|err| DevCertError::EntropyError(err.to_string()))?;
        bytes[0] = (bytes[0] & 0x7f) | 0x40;
        Ok(Self(bytes.to_vec()))
    }

    /// Serial number taken from a decoded certificate, without range checks.
    pub(crate) fn from_magnitude(magnitude: &[u8]) -> Self {
        let start = magnitude
            .iter()
            .position(|&b| b != 0)
            .unwrap_or(magnitude.len());
        Self(magnitude[start..].to_vec())
    }

    /// The unsigned big-endian magnitude, without leading zero octets.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        asn1::integer(&self.0)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        if self.oid != E::OID {
            return Err(DevCertError::InvalidInput(format!(
                "extension {} is not {}",
                self.oid,
                E::OID
            )));
        }
        E::from_x509_extension_value(&self.value)
    }

    /// Encodes `Extension ::= SEQUENCE { extnID, critical BOOLEAN DEFAULT FALSE, extnValue }`.
    ///
    /// `critical` is omitted when false, as DER forbids encoding a default value.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let mut fields = vec![asn1::object_identifier(&self.oid)?];
        if self.critical {
            fields.push(asn1::boolean(true)?);
        }
        fields.push(asn1::octet_string(&self.value)?);
        asn1::sequence(&fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> DistinguishedName {
        DistinguishedName::builder()
            .common_name("test.local".to_string())
            .organization("Test Org".to_string())
            .country("CA".to_string())
            .build()
    }

    #[test]
    fn test_dns_name_syntax() {
        for name in [
            "localhost",
            "test.local",
            "api-1.example.test",
            "*.dev.test",
            "xn--bcher-kva.test",
        ] {
            assert!(is_dns_name(name), "{name:?} was rejected");
        }
        let too_long = format!("{}.test", "a".repeat(MAX_DNS_NAME_LEN));
        for name in [
            "",
            "*.",
            "Zürich Dev",
            "bücher.test",
            "has space.test",
            "-lead.test",
            "a..b",
            too_long.as_str(),
        ] {
            assert!(!is_dns_name(name), "{name:?} was accepted");
        }
    }

    #[test]
    fn test_dns_names_fall_back_to_dns_like_common_name() {
        assert_eq!(dns_names(&[], "localhost").unwrap(), vec!["localhost".to_string()]);
        assert!(dns_names(&[], "Zürich Dev").unwrap().is_empty());

        let explicit = vec!["app.test".to_string()];
        assert_eq!(dns_names(&explicit, "Zürich Dev").unwrap(), explicit);

        let unicode = vec!["bücher.test".to_string()];
        assert!(matches!(
            dns_names(&unicode, "localhost"),
            Err(DevCertError::InvalidSubject(_))
        ));
    }

    #[test]
    fn test_country_must_be_two_letters() {
        for country in ["USA", "U", "", "1A", "É"] {
            let mut name = subject();
            name.country = Some(country.to_string());
            assert!(
                matches!(name.validate(), Err(DevCertError::InvalidSubject(_))),
                "{country:?} should be rejected"
            );
        }
        assert!(subject().validate().is_ok());
    }

    #[test]
    fn test_empty_and_oversized_attributes_are_rejected() {
        let mut name = subject();
        name.common_name = "  ".to_string();
        assert!(matches!(name.validate(), Err(DevCertError::InvalidSubject(_))));

        let mut name = subject();
        name.organization = Some("x".repeat(MAX_ATTRIBUTE_LEN + 1));
        assert!(matches!(name.validate(), Err(DevCertError::InvalidSubject(_))));
    }

    #[test]
    fn test_name_encoding_order_and_string_types() {
        let der = subject().to_der().unwrap();
        let mut expected = vec![0x30, 0x35];
        // SET { SEQUENCE { 2.5.4.6, PrintableString "CA" } }
        expected.extend_from_slice(&[
            0x31, 0x0b, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x06, 0x13, 0x02, b'C', b'A',
        ]);
        // SET { SEQUENCE { 2.5.4.10, UTF8String "Test Org" } }
        expected.extend_from_slice(&[0x31, 0x11, 0x30, 0x0f, 0x06, 0x03, 0x55, 0x04, 0x0a, 0x0c, 0x08]);
        expected.extend_from_slice(b"Test Org");
        // SET { SEQUENCE { 2.5.4.3, UTF8String "test.local" } }
        expected.extend_from_slice(&[0x31, 0x13, 0x30, 0x11, 0x06, 0x03, 0x55, 0x04, 0x03, 0x0c, 0x0a]);
        expected.extend_from_slice(b"test.local");
        assert_eq!(der, expected);
    }

    #[test]
    fn test_name_decodes_through_x509_cert() {
        use der::Decode;
        let der = subject().to_der().unwrap();
        let name = x509_cert::name::Name::from_der(&der).unwrap();
        assert_eq!(DistinguishedName::from_x509_name(&name).unwrap(), subject());
    }

    #[test]
    fn test_validity_for_days() {
        let start = OffsetDateTime::from_unix_timestamp(1_700_000_000)
            .unwrap()
            .replace_millisecond(250)
            .unwrap();
        let validity = Validity::starting_at(start, 30).unwrap();
        assert_eq!(validity.not_before.unix_timestamp(), 1_700_000_000);
        assert_eq!(validity.not_before.nanosecond(), 0);
        assert_eq!(validity.duration(), Duration::days(30));
    }

    #[test]
    fn test_validity_rejects_non_positive_days() {
        for days in [0, -1, -365] {
            assert!(matches!(
                Validity::for_days(days),
                Err(DevCertError::InvalidValidity(_))
            ));
        }
        assert!(matches!(
            Validity::for_days(i64::MAX),
            Err(DevCertError::InvalidValidity(_))
        ));
    }

    #[test]
    fn test_validity_rejects_inverted_and_unrepresentable_windows() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert!(matches!(
            Validity::new(now, now),
            Err(DevCertError::InvalidValidity(_))
        ));
        assert!(matches!(
            Validity::new(now, now - Duration::days(1)),
            Err(DevCertError::InvalidValidity(_))
        ));
        let before_epoch = OffsetDateTime::from_unix_timestamp(-86_400).unwrap();
        assert!(matches!(
            Validity::new(before_epoch, now),
            Err(DevCertError::InvalidValidity(_))
        ));
    }

    #[test]
    fn test_serial_number_bounds() {
        assert!(matches!(
            SerialNumber::new(&[0, 0]),
            Err(DevCertError::InvalidInput(_))
        ));
        assert!(matches!(
            SerialNumber::new(&[0x80; 20]),
            Err(DevCertError::InvalidInput(_))
        ));
        assert!(matches!(
            SerialNumber::new(&[0x01; 21]),
            Err(DevCertError::InvalidInput(_))
        ));
        let serial = SerialNumber::new(&[0x00, 0x01, 0x02]).unwrap();
        assert_eq!(serial.as_bytes(), [0x01, 0x02]);
        assert_eq!(serial.to_string(), "0102");
        assert_eq!(serial.to_der().unwrap(), [0x02, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn test_random_serial_numbers_are_positive_and_distinct() {
        let first = SerialNumber::random().unwrap();
        let second = SerialNumber::random().unwrap();
        assert_ne!(first, second);
        for serial in [&first, &second] {
            assert_eq!(serial.as_bytes().len(), SerialNumber::MAX_LEN);
            assert_eq!(serial.as_bytes()[0] & 0xc0, 0x40);
            // no sign octet: 2 header bytes + 20 value bytes
            assert_eq!(serial.to_der().unwrap().len(), 22);
        }
    }

    #[test]
    fn test_random_serial_reports_entropy_failure() {
        let result = SerialNumber::random_with_rng(&mut crate::key::tests::ExhaustedRng);
        assert!(matches!(result, Err(DevCertError::EntropyError(_))));
    }

    #[test]
    fn test_extension_omits_default_criticality() {
        let extension = ExtensionParam {
            oid: ObjectIdentifier::new_unwrap("2.5.29.19"),
            critical: false,
            value: vec![0x30, 0x00],
        };
        assert_eq!(
            extension.to_der().unwrap(),
            [0x30, 0x09, 0x06, 0x03, 0x55, 0x1d, 0x13, 0x04, 0x02, 0x30, 0x00]
        );

        let critical = ExtensionParam {
            critical: true,
            ..extension
        };
        assert_eq!(
            critical.to_der().unwrap(),
            [0x30, 0x0c, 0x06, 0x03, 0x55, 0x1d, 0x13, 0x01, 0x01, 0xff, 0x04, 0x02, 0x30, 0x00]
        );
    }
}
