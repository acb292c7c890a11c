//! Print file transfer to the printer SD card.
//!
//! LAN-mode printers expose their SD card over implicit FTPS with a
//! self-signed certificate. The login is the same `bblp` / access code pair
//! the MQTT broker uses.

use std::sync::Arc;

use async_trait::async_trait;
use futures_rustls::TlsConnector;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{aws_lc_rs, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use suppaftp::types::FileType;
use suppaftp::{AsyncRustlsConnector, AsyncRustlsFtpStream, FtpError};
use tracing::{debug, info};

use crate::config::BambuConfig;
use crate::error::{BambuError, Result};
use crate::mqtt::MQTT_USER;

/// Implicit FTPS port on the printer.
pub const FTPS_PORT: u16 = 990;

/// Moves print files onto a printer.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Store `bytes` under `file_name` on the printer described by `config`.
    async fn upload(&self, config: &BambuConfig, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Upload over implicit FTPS.
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpsTransfer;

#[async_trait]
impl FileTransfer for FtpsTransfer {
    async fn upload(&self, config: &BambuConfig, file_name: &str, bytes: &[u8]) -> Result<()> {
        let connector = tls_connector()?;
        let domain = config.ip.to_string();

        let connect =
            AsyncRustlsFtpStream::connect_secure_implicit((config.ip, FTPS_PORT), connector, &domain);
        let mut ftp = tokio::time::timeout(config.timeout, connect)
            .await
            .map_err(|_| BambuError::Timeout("FTPS connection timeout".into()))?
            .map_err(|e| BambuError::ConnectionFailed(e.to_string()))?;

        ftp.login(MQTT_USER, &config.access_code)
            .await
            .map_err(upload_failed)?;
        ftp.transfer_type(FileType::Binary)
            .await
            .map_err(upload_failed)?;

        let mut reader = bytes;
        let written = ftp
            .put_file(file_name, &mut reader)
            .await
            .map_err(upload_failed)?;

        if let Err(e) = ftp.quit().await {
            debug!(printer = %config.name, error = %e, "FTPS quit failed");
        }

        info!(printer = %config.name, file = %file_name, bytes = written, "uploaded file");
        Ok(())
    }
}

fn upload_failed(err: FtpError) -> BambuError {
    BambuError::UploadFailed(err.to_string())
}

fn tls_connector() -> Result<AsyncRustlsConnector> {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| BambuError::ConnectionFailed(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
        .with_no_client_auth();

    Ok(AsyncRustlsConnector::from(TlsConnector::from(Arc::new(
        config,
    ))))
}

/// Printers present a self-signed certificate; only handshake signatures
/// are checked.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
