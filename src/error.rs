//! use devcert::error::DevCertError;

use thiserror::Error;

/// Represents errors that can occur while generating development certificates.
///
/// Every failure path maps to exactly one variant so callers can tell
/// validation problems apart from cryptographic or encoding failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DevCertError {
    /// The subject distinguished name is malformed (country code, empty or oversized fields).
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// The validity window is empty, inverted or not representable.
    #[error("Invalid validity: {0}")]
    InvalidValidity(String),

    /// The requested key algorithm or parameter combination is not supported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The random source could not supply randomness.
    #[error("Entropy error: {0}")]
    EntropyError(String),

    /// A value is outside the legal range of its ASN.1 type.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// PEM text is missing its delimiters, has the wrong label or invalid base64.
    #[error("Malformed PEM: {0}")]
    MalformedPem(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Error while computing a signature.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// A signature did not verify against the given public key.
    #[error("Verification error: {0}")]
    VerificationError(String),
}

pub type Result<T> = std::result::Result<T, DevCertError>;

impl From<der::Error> for DevCertError {
    /// Converts a `der::Error` into a `DevCertError`.
    fn from(err: der::Error) -> Self {
        DevCertError::EncodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for DevCertError {
    fn from(err: pkcs8::spki::Error) -> Self {
        DevCertError::EncodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for DevCertError {
    fn from(err: pkcs8::Error) -> Self {
        DevCertError::EncodingError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for DevCertError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        DevCertError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for DevCertError {
    fn from(err: rsa::Error) -> Self {
        DevCertError::KeyGenerationError(err.to_string())
    }
}

impl From<ecdsa::signature::Error> for DevCertError {
    fn from(err: ecdsa::signature::Error) -> Self {
        DevCertError::SigningError(err.to_string())
    }
}
