//! TLS material loading
//!
//! Turns PEM files on disk into the `TlsAcceptor` shared by every
//! session, for both the pre-wrapped listener and `STLS`.

use crate::error::{Error, Result};
use rustls::pki_types::CertificateDer;
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tracing::info;

/// Build a server-side acceptor from a PEM certificate chain and key.
///
/// `cert` and `key` may point to the same file.
///
/// # Errors
///
/// Returns [`Error::Tls`] if either file cannot be read, holds no
/// usable PEM item, or rustls rejects the pair.
pub fn load_acceptor(cert: &Path, key: &Path) -> Result<TlsAcceptor> {
    let cert_file = File::open(cert)
        .map_err(|e| Error::Tls(format!("Failed to open {}: {e}", cert.display())))?;
    let chain: Vec<CertificateDer<'static>> = certs(&mut BufReader::new(cert_file))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::Tls(format!("Failed to parse certificates: {e}")))?;

    if chain.is_empty() {
        return Err(Error::Tls(format!(
            "No certificates found in {}",
            cert.display()
        )));
    }

    let key_file = File::open(key)
        .map_err(|e| Error::Tls(format!("Failed to open {}: {e}", key.display())))?;
    let key_der = private_key(&mut BufReader::new(key_file))
        .map_err(|e| Error::Tls(format!("Failed to read private key: {e}")))?
        .ok_or_else(|| Error::Tls(format!("No private key found in {}", key.display())))?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key_der)
        .map_err(|e| Error::Tls(e.to_string()))?;

    info!("Loaded TLS certificate from {}", cert.display());
    Ok(TlsAcceptor::from(Arc::new(config)))
}
