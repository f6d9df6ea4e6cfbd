//! One-call generation of development TLS credentials.

use std::fmt;

use bon::Builder;
use rand_core::{CryptoRngCore, OsRng};

use crate::cert::Certificate;
use crate::cert::params::{
    CertificateParams, DistinguishedName, SerialNumber, Validity, dns_names,
};
use crate::error::Result;
use crate::key::{KeyAlgorithm, KeyPair};

/// Options for [`generate_self_signed`].
///
/// # Fields
/// * `common_name` - Subject CN, any UTF-8 text. When `subject_alt_names` is empty and the CN is a DNS name, it is also certified as that name. Defaults to `localhost`.
/// * `organization` - Subject O. Defaults to `MyOrg`.
/// * `country` - Subject C, exactly two letters. Defaults to `US`.
/// * `valid_days` - Length of the validity window from now; must be positive. Defaults to 365.
/// * `algorithm` - Key algorithm. Defaults to RSA 2048.
/// * `subject_alt_names` - DNS names to certify instead of the common name; each must be an ASCII host name.
#[derive(Clone, Debug, Builder, PartialEq, Eq)]
pub struct CertificateConfig {
    #[builder(into, default = "localhost".to_string())]
    pub common_name: String,
    #[builder(into, default = "MyOrg".to_string())]
    pub organization: String,
    #[builder(into, default = "US".to_string())]
    pub country: String,
    #[builder(default = 365)]
    pub valid_days: i64,
    #[builder(default)]
    pub algorithm: KeyAlgorithm,
    #[builder(default)]
    pub subject_alt_names: Vec<String>,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CertificateConfig {
    /// Checks the subject and the DNS names without generating anything.
    pub fn validate(&self) -> Result<()> {
        self.subject().validate()?;
        dns_names(&self.subject_alt_names, &self.common_name)?;
        Ok(())
    }

    /// The subject distinguished name described by this configuration.
    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::builder()
            .common_name(self.common_name.clone())
            .organization(self.organization.clone())
            .country(self.country.clone())
            .build()
    }
}

/// A private key and its self-signed certificate, both PEM-encoded.
#[derive(Clone)]
pub struct Credentials {
    /// `RSA PRIVATE KEY` for RSA keys, `PRIVATE KEY` otherwise.
    pub key_pem: String,
    /// `CERTIFICATE`.
    pub cert_pem: String,
    pub certificate: Certificate,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_pem", &"<redacted>")
            .field("cert_pem", &self.cert_pem)
            .finish_non_exhaustive()
    }
}

/// Generates a fresh key pair and a self-signed certificate for it.
///
/// The subject, DNS names and validity window are validated before any key
/// material is generated. Nothing is written to disk.
pub fn generate_self_signed(config: &CertificateConfig) -> Result<Credentials> {
    generate_self_signed_with_rng(config, &mut OsRng)
}

/// Like [`generate_self_signed`], drawing the key and serial number from `rng`.
pub fn generate_self_signed_with_rng<R: CryptoRngCore>(
    config: &CertificateConfig,
    rng: &mut R,
) -> Result<Credentials> {
    config.validate()?;
    let subject = config.subject();
    let validity = Validity::for_days(config.valid_days)?;
    config.algorithm.validate()?;

    tracing::debug!(
        common_name = %config.common_name,
        algorithm = %config.algorithm,
        valid_days = config.valid_days,
        "generating development certificate"
    );

    let key_pair = KeyPair::generate_with_rng(config.algorithm, rng)?;
    let params = CertificateParams::builder()
        .subject(subject)
        .validity(validity)
        .serial_number(SerialNumber::random_with_rng(rng)?)
        .subject_alt_names(config.subject_alt_names.clone())
        .build();
    let certificate = Certificate::new_self_signed(&params, &key_pair)?;

    Ok(Credentials {
        key_pem: key_pair.to_pem()?,
        cert_pem: certificate.to_pem()?,
        certificate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DevCertError;

    #[test]
    fn test_defaults() {
        let config = CertificateConfig::default();
        assert_eq!(config.common_name, "localhost");
        assert_eq!(config.organization, "MyOrg");
        assert_eq!(config.country, "US");
        assert_eq!(config.valid_days, 365);
        assert_eq!(config.algorithm, KeyAlgorithm::RSA_2048);
        assert!(config.subject_alt_names.is_empty());
    }

    #[test]
    fn test_validation_happens_before_key_generation() {
        let rng = &mut crate::key::tests::ExhaustedRng;

        let bad_country = CertificateConfig::builder().country("USA").build();
        assert!(matches!(
            generate_self_signed_with_rng(&bad_country, rng),
            Err(DevCertError::InvalidSubject(_))
        ));

        let bad_days = CertificateConfig::builder().valid_days(0).build();
        assert!(matches!(
            generate_self_signed_with_rng(&bad_days, rng),
            Err(DevCertError::InvalidValidity(_))
        ));

        let bad_algorithm = CertificateConfig::builder()
            .algorithm(KeyAlgorithm::Rsa { bits: 1024 })
            .build();
        assert!(matches!(
            generate_self_signed_with_rng(&bad_algorithm, rng),
            Err(DevCertError::UnsupportedAlgorithm(_))
        ));

        let valid = CertificateConfig::builder()
            .algorithm(KeyAlgorithm::Ed25519)
            .build();
        assert!(matches!(
            generate_self_signed_with_rng(&valid, rng),
            Err(DevCertError::EntropyError(_))
        ));
    }

    #[test]
    fn test_invalid_dns_names_consume_no_randomness() {
        let mut rng = crate::key::tests::CountingRng::default();

        let unicode_san = CertificateConfig::builder()
            .algorithm(KeyAlgorithm::Ed25519)
            .subject_alt_names(vec!["bücher.test".to_string()])
            .build();
        assert!(matches!(
            generate_self_signed_with_rng(&unicode_san, &mut rng),
            Err(DevCertError::InvalidSubject(_))
        ));
        assert_eq!(rng.bytes_read, 0);

        let spaced_san = CertificateConfig::builder()
            .algorithm(KeyAlgorithm::Ed25519)
            .subject_alt_names(vec!["ok.test".to_string(), "not ok.test".to_string()])
            .build();
        assert!(matches!(
            generate_self_signed_with_rng(&spaced_san, &mut rng),
            Err(DevCertError::InvalidSubject(_))
        ));
        assert_eq!(rng.bytes_read, 0);
    }

    #[test]
    fn test_utf8_subject_without_dns_name() {
        let mut rng = crate::key::tests::CountingRng::default();
        let config = CertificateConfig::builder()
            .common_name("Zürich Dev")
            .organization("Bücher GmbH")
            .algorithm(KeyAlgorithm::Ed25519)
            .build();
        config.validate().unwrap();

        let credentials = generate_self_signed_with_rng(&config, &mut rng).unwrap();
        assert!(rng.bytes_read > 0);

        let decoded = Certificate::from_pem(&credentials.cert_pem).unwrap();
        assert_eq!(decoded.subject().common_name, "Zürich Dev");
        assert_eq!(decoded.subject().organization.as_deref(), Some("Bücher GmbH"));
        assert_eq!(
            decoded
                .extension::<crate::cert::extensions::SubjectAltName>()
                .unwrap(),
            None
        );
        decoded.verify_self_signed().unwrap();
    }

    #[test]
    fn test_values_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CertificateConfig>();
        assert_send_sync::<Credentials>();
        assert_send_sync::<KeyPair>();
        assert_send_sync::<Certificate>();
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = CertificateConfig::builder()
            .algorithm(KeyAlgorithm::Ed25519)
            .build();
        let credentials = generate_self_signed(&config).unwrap();
        let debug = format!("{credentials:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("PRIVATE KEY"));
        assert!(debug.ends_with(", .. }"));
    }
}
