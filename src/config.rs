use std::path::PathBuf;

pub const NAME: &str = "tailsend";
pub const AUTHOR: &str = "tailsend contributors";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ABOUT: &str = "Resumable file upload over TLS";
pub const LONG_ABOUT: &str = "Uploads a single file to a receiving server over a length-framed \
TLS channel. If the server already holds part of the file, only the missing tail is sent.";

pub const CERT_FILE: &str = "cert.pem";
pub const KEY_FILE: &str = "key.pem";
pub const CERT_DIR: &str = ".tailsend/certs";

pub const CHUNK_SIZE: usize = 64 * 1024; // 64 KB
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// Directory holding the default client identity (`~/.tailsend/certs`).
pub fn default_cert_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CERT_DIR)
}

pub fn default_cert_path() -> PathBuf {
    default_cert_dir().join(CERT_FILE)
}

pub fn default_key_path() -> PathBuf {
    default_cert_dir().join(KEY_FILE)
}

/// Transport security material used for the handshake.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    /// PEM certificate chain presented to the server.
    pub cert_path: PathBuf,
    /// PEM private key matching `cert_path`.
    pub key_path: PathBuf,
    /// PEM roots the server certificate must chain to. `None` accepts any
    /// server certificate.
    pub trusted_ca: Option<PathBuf>,
    /// Generate a self-signed identity when either file is missing.
    pub generate_missing: bool,
}

impl Default for TlsSettings {
    fn default() -> Self {
        TlsSettings {
            cert_path: default_cert_path(),
            key_path: default_key_path(),
            trusted_ca: None,
            generate_missing: false,
        }
    }
}

impl TlsSettings {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        TlsSettings {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            ..Default::default()
        }
    }

    pub fn trusted_ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.trusted_ca = Some(path.into());
        self
    }

    pub fn generate_missing(mut self, generate: bool) -> Self {
        self.generate_missing = generate;
        self
    }
}

/// Everything an [`Uploader`](crate::network::Uploader) needs besides the
/// per-call arguments.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub tls: TlsSettings,
    /// Size of each tail frame. 0 means [`CHUNK_SIZE`]; capped at
    /// [`MAX_FRAME_SIZE`].
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            tls: TlsSettings::default(),
            chunk_size: CHUNK_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new(tls: TlsSettings) -> Self {
        ClientConfig {
            tls,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub(crate) fn effective_chunk_size(&self) -> usize {
        match self.chunk_size {
            0 => CHUNK_SIZE,
            n => n.min(MAX_FRAME_SIZE),
        }
    }
}
