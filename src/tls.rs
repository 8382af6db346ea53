//! Transport credentials and QUIC endpoint configuration
//!
//! The assigner presents a self-signed (or externally provisioned)
//! certificate. Requesters do not validate it: the posture is
//! trust-on-first-use over loopback, not CA validation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use quinn::{IdleTimeout, TransportConfig, VarInt};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::error::TransportError;

/// Certificate chain and private key presented by the assigner
#[derive(Debug)]
pub struct TransportCredential {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TransportCredential {
    /// Generate a self-signed certificate for the given host names
    pub fn self_signed(names: &[&str]) -> Result<Self, TransportError> {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let certified = rcgen::generate_simple_self_signed(names)
            .map_err(|e| TransportError::Tls(format!("certificate generation failed: {e}")))?;

        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            certified.key_pair.serialize_der(),
        ));

        Ok(Self {
            cert_chain: vec![certified.cert.der().clone()],
            key,
        })
    }

    /// Load a PEM certificate chain and private key
    pub fn from_pem_files(cert: &Path, key: &Path) -> Result<Self, TransportError> {
        let cert_chain = CertificateDer::pem_file_iter(cert)
            .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
            .map_err(|e| TransportError::Tls(format!("{}: {e:?}", cert.display())))?;
        if cert_chain.is_empty() {
            return Err(TransportError::Tls(format!(
                "{}: no certificates found",
                cert.display()
            )));
        }

        let key = PrivateKeyDer::from_pem_file(key)
            .map_err(|e| TransportError::Tls(format!("{}: {e:?}", key.display())))?;

        Ok(Self { cert_chain, key })
    }

    /// QUIC server configuration negotiating `alpn`
    pub fn server_config(
        &self,
        alpn: &[u8],
        transport: TransportConfig,
    ) -> Result<quinn::ServerConfig, TransportError> {
        let mut crypto = rustls::ServerConfig::builder_with_provider(provider())
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(tls_error)?
            .with_no_client_auth()
            .with_single_cert(self.cert_chain.clone(), self.key.clone_key())
            .map_err(tls_error)?;
        crypto.alpn_protocols = vec![alpn.to_vec()];

        let crypto = QuicServerConfig::try_from(crypto).map_err(tls_error)?;
        let mut config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
        config.transport_config(Arc::new(transport));

        Ok(config)
    }
}

/// QUIC client configuration that accepts any server certificate
pub fn insecure_client_config(
    alpn: &[u8],
    transport: TransportConfig,
) -> Result<quinn::ClientConfig, TransportError> {
    let provider = provider();
    let mut crypto = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(tls_error)?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
        .with_no_client_auth();
    crypto.alpn_protocols = vec![alpn.to_vec()];

    let crypto = QuicClientConfig::try_from(crypto).map_err(tls_error)?;
    let mut config = quinn::ClientConfig::new(Arc::new(crypto));
    config.transport_config(Arc::new(transport));

    Ok(config)
}

/// Transport parameters shared by both sides
pub fn transport_config(
    keep_alive: Option<Duration>,
    idle_timeout: Duration,
    max_bidi_streams: u32,
) -> Result<TransportConfig, TransportError> {
    let idle = IdleTimeout::try_from(idle_timeout)
        .map_err(|_| TransportError::Tls(format!("idle timeout {idle_timeout:?} out of range")))?;

    let mut config = TransportConfig::default();
    config
        .keep_alive_interval(keep_alive)
        .max_idle_timeout(Some(idle))
        .max_concurrent_bidi_streams(VarInt::from_u32(max_bidi_streams))
        .max_concurrent_uni_streams(VarInt::from_u32(0));

    Ok(config)
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn tls_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Tls(e.to_string())
}

/// Accepts any server certificate while still checking handshake signatures
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
