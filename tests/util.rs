use std::path::PathBuf;

use devcert::CertificateConfig;
use devcert::key::KeyAlgorithm;

/// A configuration that generates quickly; RSA key generation is slow in debug builds.
pub fn fast_config(common_name: &str) -> CertificateConfig {
    CertificateConfig::builder()
        .common_name(common_name)
        .algorithm(KeyAlgorithm::EcdsaP256)
        .build()
}

/// A per-process path under the system temp directory.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("devcert-{}-{name}", std::process::id()))
}
