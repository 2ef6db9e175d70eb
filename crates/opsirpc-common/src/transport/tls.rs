//! TLS client configuration
//!
//! With a CA certificate file configured, server certificates are verified
//! against it. Without one, the certificate is accepted unverified: opsi
//! servers ship with self-signed certificates and the classic clients never
//! checked them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;

use crate::protocol::error::{BackendError, Result};

/// TLS settings of one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM file with the CA certificate(s) to verify the server against
    pub ca_cert_file: Option<PathBuf>,
}

impl TlsConfig {
    pub fn with_ca_cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_file = Some(path.into());
        self
    }

    pub fn verifies_server(&self) -> bool {
        self.ca_cert_file.is_some()
    }

    /// Builds the rustls client configuration.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Configuration` if the CA file cannot be read or
    /// holds no usable certificate.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;

        let config = match &self.ca_cert_file {
            Some(path) => builder
                .with_root_certificates(load_root_store(path)?)
                .with_no_client_auth(),
            None => builder
                .dangerous()
                .with_custom_certificate_verifier(SkipServerVerification::new(provider))
                .with_no_client_auth(),
        };

        Ok(Arc::new(config))
    }
}

fn load_root_store(path: &Path) -> Result<RootCertStore> {
    let config_err = |reason: String| {
        BackendError::Configuration(format!(
            "Failed to load CA certificates from '{}': {}",
            path.display(),
            reason
        ))
    };

    let mut roots = RootCertStore::empty();
    let certs = CertificateDer::pem_file_iter(path).map_err(|e| config_err(e.to_string()))?;
    for cert in certs {
        let cert = cert.map_err(|e| config_err(e.to_string()))?;
        roots.add(cert).map_err(|e| config_err(e.to_string()))?;
    }

    if roots.is_empty() {
        return Err(config_err("no certificates found".to_string()));
    }
    Ok(roots)
}

/// Accepts any server certificate.
#[derive(Debug)]
struct SkipServerVerification {
    provider: Arc<CryptoProvider>,
}

impl SkipServerVerification {
    fn new(provider: Arc<CryptoProvider>) -> Arc<Self> {
        Arc::new(Self { provider })
    }
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
