//! PEM wrapping of DER bytes for certificates and keys.

use crate::error::{DevCertError, Result};

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Convert DER-encoded data into a PEM-encoded string with the provided label.
///
/// The body is base64 wrapped at 64 columns with `\n` line endings,
/// between `-----BEGIN <label>-----` and `-----END <label>-----`.
pub fn encode(der: &[u8], label: &str) -> Result<String> {
    validate_label(label)?;
    let pem = pem::Pem::new(label, der);
    let config = pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF);
    Ok(pem::encode_config(&pem, config))
}

/// Convert a PEM-encoded string into its label and DER-encoded bytes.
///
/// Fails with [`DevCertError::MalformedPem`] when the delimiters are missing
/// or mismatched, or the body is not valid base64.
pub fn decode(pem_text: &str) -> Result<(String, Vec<u8>)> {
    let pem = pem::parse(pem_text).map_err(|err| DevCertError::MalformedPem(err.to_string()))?;
    Ok((pem.tag().to_string(), pem.into_contents()))
}

/// Like [`decode`], but also requires the block to carry `label`.
pub fn decode_expecting(pem_text: &str, label: &str) -> Result<Vec<u8>> {
    let (found, der) = decode(pem_text)?;
    if found != label {
        return Err(DevCertError::MalformedPem(format!(
            "expected label {label:?}, found {found:?}"
        )));
    }
    Ok(der)
}

// RFC 7468 labels: printable ASCII, no hyphen at either end.
fn validate_label(label: &str) -> Result<()> {
    let printable = label.bytes().all(|b| b.is_ascii_graphic() || b == b' ');
    if label.is_empty() || !printable || label.starts_with(['-', ' ']) || label.ends_with(['-', ' ']) {
        return Err(DevCertError::InvalidInput(format!(
            "{label:?} is not a valid PEM label"
        )));
    }
    Ok(())
}
