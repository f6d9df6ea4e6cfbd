//! DER building blocks for certificate structures.
//!
//! Every function returns one complete TLV (tag, length, value) in canonical
//! DER form: the universal tag of the type and a definite length in its
//! shortest encoding. Constructed values are assembled from children that are
//! already encoded, so a certificate is built bottom-up by nesting calls:
//!
//! ```
//! use devcert::asn1;
//!
//! # fn main() -> Result<(), devcert::error::DevCertError> {
//! let version = asn1::explicit(der::TagNumber::N0, &asn1::small_integer(2)?)?;
//! assert_eq!(version, [0xa0, 0x03, 0x02, 0x01, 0x02]);
//!
//! let pair = asn1::sequence(&[asn1::boolean(true)?, asn1::null()?])?;
//! assert_eq!(pair, [0x30, 0x05, 0x01, 0x01, 0xff, 0x05, 0x00]);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use const_oid::ObjectIdentifier;
use der::asn1::{
    BitStringRef, GeneralizedTime, Null, OctetStringRef, PrintableStringRef, UintRef, UtcTime,
    Utf8StringRef,
};
use der::{DateTime, Encode, Header, Tag, TagNumber};
use time::OffsetDateTime;

use crate::error::{DevCertError, Result};

/// First year that RFC 5280 requires to be encoded as GeneralizedTime.
pub const GENERALIZED_TIME_FROM_YEAR: u16 = 2050;

/// Encodes an unsigned big-endian magnitude as an INTEGER.
///
/// Leading zero bytes are stripped and a single `0x00` is prepended when the
/// high bit of the first remaining byte is set, so the value stays positive.
pub fn integer(magnitude: &[u8]) -> Result<Vec<u8>> {
    Ok(UintRef::new(magnitude)?.to_der()?)
}

/// Encodes a small non-negative INTEGER such as a version number.
pub fn small_integer(value: u64) -> Result<Vec<u8>> {
    Ok(value.to_der()?)
}

pub fn boolean(value: bool) -> Result<Vec<u8>> {
    Ok(value.to_der()?)
}

pub fn null() -> Result<Vec<u8>> {
    Ok(Null.to_der()?)
}

/// Encodes a BIT STRING with no unused bits.
pub fn bit_string(bytes: &[u8]) -> Result<Vec<u8>> {
    Ok(BitStringRef::from_bytes(bytes)?.to_der()?)
}

pub fn octet_string(bytes: &[u8]) -> Result<Vec<u8>> {
    Ok(OctetStringRef::new(bytes)?.to_der()?)
}

pub fn utf8_string(value: &str) -> Result<Vec<u8>> {
    Ok(Utf8StringRef::new(value)?.to_der()?)
}

/// Encodes a PrintableString.
///
/// Fails with [`DevCertError::EncodingError`] when `value` holds a character
/// outside the PrintableString set (`A-Z a-z 0-9 ' ( ) + , - . / : = ?` and space).
pub fn printable_string(value: &str) -> Result<Vec<u8>> {
    let printable = PrintableStringRef::new(value).map_err(|_| {
        DevCertError::EncodingError(format!(
            "{value:?} contains characters outside the PrintableString set"
        ))
    })?;
    Ok(printable.to_der()?)
}

pub fn object_identifier(oid: &ObjectIdentifier) -> Result<Vec<u8>> {
    Ok(oid.to_der()?)
}

/// Encodes an OBJECT IDENTIFIER given in dotted-decimal notation.
pub fn object_identifier_str(dotted: &str) -> Result<Vec<u8>> {
    let oid = ObjectIdentifier::new(dotted)
        .map_err(|err| DevCertError::EncodingError(format!("invalid OID {dotted:?}: {err}")))?;
    object_identifier(&oid)
}

/// Wraps already-encoded elements in a SEQUENCE, keeping their order.
pub fn sequence<T: AsRef<[u8]>>(elements: &[T]) -> Result<Vec<u8>> {
    constructed(Tag::Sequence, &elements.iter().map(AsRef::as_ref).collect::<Vec<_>>())
}

/// Wraps already-encoded elements in a SET.
///
/// DER requires the elements of a SET OF to appear in ascending order of
/// their encodings, so they are sorted before concatenation.
pub fn set<T: AsRef<[u8]>>(elements: &[T]) -> Result<Vec<u8>> {
    let mut sorted: Vec<&[u8]> = elements.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    constructed(Tag::Set, &sorted)
}

/// Applies an EXPLICIT context-specific tag (`[number]`) around an encoded value.
pub fn explicit(number: TagNumber, inner: &[u8]) -> Result<Vec<u8>> {
    let tag = Tag::ContextSpecific {
        constructed: true,
        number,
    };
    constructed(tag, &[inner])
}

/// Encodes a certificate time: UTCTime before 2050, GeneralizedTime from 2050 on.
///
/// Sub-second precision is dropped.
pub fn time(value: OffsetDateTime) -> Result<Vec<u8>> {
    let date_time = date_time(value)?;
    if date_time.year() < GENERALIZED_TIME_FROM_YEAR {
        Ok(UtcTime::from_date_time(date_time)?.to_der()?)
    } else {
        Ok(GeneralizedTime::from_date_time(date_time).to_der()?)
    }
}

/// Converts a timestamp into the calendar representation used by the encoder.
///
/// Only instants from 1970-01-01 through 9999-12-31 are representable.
pub fn date_time(value: OffsetDateTime) -> Result<DateTime> {
    let seconds = u64::try_from(value.unix_timestamp()).map_err(|_| {
        DevCertError::EncodingError(format!("{value} is before 1970 and cannot be encoded"))
    })?;
    DateTime::from_unix_duration(Duration::from_secs(seconds))
        .map_err(|err| DevCertError::EncodingError(format!("{value} cannot be encoded: {err}")))
}

fn constructed(tag: Tag, children: &[&[u8]]) -> Result<Vec<u8>> {
    let content_len: usize = children.iter().map(|child| child.len()).sum();
    let header = Header::new(tag, content_len)?;
    let mut encoded = header.to_der()?;
    encoded.reserve(content_len);
    for child in children {
        encoded.extend_from_slice(child);
    }
    tracing::trace!(%tag, length = content_len, "encoded constructed value");
    Ok(encoded)
}
