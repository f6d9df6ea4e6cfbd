//! Prints a development key and certificate.
//!
//! ```text
//! cargo run --example generate -- [algorithm] [common-name]
//! RUST_LOG=devcert=debug cargo run --example generate -- ecdsa-p256 test.local
//! ```

use devcert::error::DevCertError;
use devcert::key::KeyAlgorithm;
use devcert::{CertificateConfig, generate_self_signed};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), DevCertError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let mut args = std::env::args().skip(1);
    let algorithm = match args.next() {
        Some(name) => name.parse::<KeyAlgorithm>()?,
        None => KeyAlgorithm::default(),
    };
    let common_name = args.next().unwrap_or_else(|| "localhost".to_string());

    let config = CertificateConfig::builder()
        .common_name(common_name)
        .algorithm(algorithm)
        .build();
    let credentials = generate_self_signed(&config)?;

    eprintln!(
        "Generated {} certificate for {} (serial {})",
        algorithm,
        config.common_name,
        credentials.certificate.serial_number()
    );
    print!("{}", credentials.key_pem);
    print!("{}", credentials.cert_pem);

    Ok(())
}
