use std::{fs, fs::File, io::BufReader, path::{Path, PathBuf}, sync::Arc};
use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use rustls_pemfile::{certs, private_key};
use tokio_rustls::TlsConnector;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use tracing::{debug, info};

use crate::config::TlsSettings;

/// A PEM file that could not be read.
#[derive(Debug, thiserror::Error)]
#[error("cannot read {}: {source}", .path.display())]
pub struct MaterialError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Client certificate chain and private key presented during the handshake.
pub struct Identity {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

pub fn load_or_generate_identity(settings: &TlsSettings) -> anyhow::Result<Identity> {
    let cert_path = settings.cert_path.as_path();
    let key_path = settings.key_path.as_path();

    if settings.generate_missing && !(cert_path.exists() && key_path.exists()) {
        info!(cert = %cert_path.display(), "generating self-signed client certificate");
        return generate_identity(cert_path, key_path);
    }

    debug!(cert = %cert_path.display(), key = %key_path.display(), "loading client identity");
    load_identity(cert_path, key_path)
}

fn open_pem(path: &Path) -> Result<BufReader<File>, MaterialError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| MaterialError { path: path.to_path_buf(), source })
}

fn read_certs(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let mut reader = open_pem(path)?;
    let chain = certs(&mut reader).collect::<std::io::Result<Vec<_>>>()?;
    if chain.is_empty() {
        anyhow::bail!("No certificate found in {}", path.display());
    }
    Ok(chain)
}

pub fn load_identity(cert_path: &Path, key_path: &Path) -> anyhow::Result<Identity> {
    // read certificate
    let cert_chain = read_certs(cert_path)?;

    // read key
    let mut key_reader = open_pem(key_path)?;
    let Some(key) = private_key(&mut key_reader)? else {
        anyhow::bail!("No private key found in {}", key_path.display());
    };

    Ok(Identity { cert_chain, key })
}

/// Creates a self-signed identity, stores it as PEM at the given paths and
/// returns it.
pub fn generate_identity(cert_path: &Path, key_path: &Path) -> anyhow::Result<Identity> {
    let mut params = CertificateParams::new(vec!["localhost".to_string()])?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "tailsend client");
    params.distinguished_name = dn;

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    for path in [cert_path, key_path] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
    }

    // save PEM files
    fs::write(cert_path, cert.pem())?;
    fs::write(key_path, key_pair.serialize_pem())?;
    info!(cert = %cert_path.display(), "self-signed certificate generated");

    // convert for rustls
    let cert_der = cert.der().clone();
    let key_der = PrivateKeyDer::from(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    Ok(Identity { cert_chain: vec![cert_der], key: key_der })
}

/// Builds the connector used for every upload. The client identity is always
/// presented; the server is checked against `trusted_ca` when one is set.
pub fn build_connector(settings: &TlsSettings) -> anyhow::Result<TlsConnector> {
    let identity = load_or_generate_identity(settings)?;
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let builder = match &settings.trusted_ca {
        Some(ca_path) => {
            let mut roots = RootCertStore::empty();
            for cert in read_certs(ca_path)? {
                roots.add(cert)?;
            }
            debug!(
                ca = %ca_path.display(),
                roots = roots.len(),
                "verifying server against trusted roots"
            );
            builder.with_root_certificates(roots)
        }
        None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider })),
    };

    let config = builder.with_client_auth_cert(identity.cert_chain, identity.key)?;
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Accepts whatever certificate the server presents while still checking
/// that the server holds its private key.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
