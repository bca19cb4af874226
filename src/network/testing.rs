//! Scripted TLS server for engine tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rcgen::{CertificateParams, KeyPair};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use crate::config::{ClientConfig, TlsSettings};
use crate::network::{read_frame, recv_message, write_frame, ServerResponse, UploadRequest};

/// What the server saw on one connection.
#[derive(Debug)]
pub(crate) struct Session {
    pub request: UploadRequest,
    pub received: Vec<u8>,
    pub frames: usize,
}

pub(crate) struct MockServer {
    pub port: u16,
    pub cert_path: PathBuf,
    sessions: Arc<Mutex<Vec<Session>>>,
    handle: JoinHandle<()>,
    _dir: TempDir,
}

impl MockServer {
    /// Serves one connection per response, in order.
    pub async fn start(responses: Vec<ServerResponse>) -> MockServer {
        let frames = responses
            .iter()
            .map(|resp| Some(bincode::serialize(resp).unwrap()))
            .collect();
        Self::start_raw(frames).await
    }

    /// Like [`start`](Self::start) with pre-encoded response payloads. `None`
    /// reads the request and never answers.
    pub async fn start_raw(replies: Vec<Option<Vec<u8>>>) -> MockServer {
        let dir = tempfile::tempdir().unwrap();
        let key_pair = KeyPair::generate().unwrap();
        let params = CertificateParams::new(vec![
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ])
        .unwrap();
        let cert = params.self_signed(&key_pair).unwrap();
        let cert_path = dir.path().join("server.pem");
        std::fs::write(&cert_path, cert.pem()).unwrap();

        let key = PrivateKeyDer::from(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
        let config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let sessions = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&sessions);
        let handle = tokio::spawn(async move {
            for reply in replies {
                let (socket, _) = listener.accept().await.unwrap();
                let Ok(mut tls) = acceptor.accept(socket).await else {
                    continue;
                };

                let request: UploadRequest = recv_message(&mut tls).await.unwrap();
                if let Some(payload) = reply {
                    write_frame(&mut tls, &payload).await.unwrap();
                    tokio::io::AsyncWriteExt::flush(&mut tls).await.unwrap();
                }

                let mut received = Vec::new();
                let mut frames = 0;
                while let Ok(Some(frame)) = read_frame(&mut tls).await {
                    received.extend_from_slice(&frame);
                    frames += 1;
                }

                recorded.lock().unwrap().push(Session { request, received, frames });
            }
        });

        MockServer { port, cert_path, sessions, handle, _dir: dir }
    }

    /// Waits until every scripted connection was served.
    pub async fn finish(self) -> Vec<Session> {
        self.handle.await.unwrap();
        std::mem::take(&mut *self.sessions.lock().unwrap())
    }

    /// Stops serving and returns what was recorded so far.
    pub async fn abort(self) -> Vec<Session> {
        self.handle.abort();
        let _ = self.handle.await;
        std::mem::take(&mut *self.sessions.lock().unwrap())
    }
}

/// Client configuration with a freshly generated identity under `dir`.
pub(crate) fn client_config(dir: &Path) -> ClientConfig {
    let tls = TlsSettings::new(dir.join("client/cert.pem"), dir.join("client/key.pem"))
        .generate_missing(true);
    ClientConfig::new(tls)
}
