//! Upload engine.
//!
//! One call is one sequential exchange on a fresh TLS connection:
//!
//! ```text
//! client -> server   [u32 BE len][UploadRequest]
//! server -> client   [u32 BE len][ServerResponse]
//! client -> server   [u32 BE len][raw file bytes]   (ResumeAt only, repeated)
//! client             close_notify + FIN
//! ```
//!
//! Nothing here applies a timeout. Wrap the future in
//! `tokio::time::timeout` for a deadline; dropping it closes the connection
//! and the file.

use std::io::SeekFrom;
use std::net::SocketAddr;
use std::path::Path;

use rustls::pki_types::ServerName;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio_rustls::{client::TlsStream, TlsConnector};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Fault, TransferError};
use crate::network::{
    build_connector, decode_response, read_frame, send_message, write_frame, CodecError,
    Destination, ServerResponse, UploadRequest,
};
use crate::utils::read_attributes;

/// Outcome of a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    /// Bytes streamed by this call, not counting what the server already had.
    pub bytes_sent: u64,
    pub file_size: u64,
}

/// Uploads files with a fixed TLS identity. Cheap to reuse across calls;
/// calls share no state.
pub struct Uploader {
    connector: TlsConnector,
    chunk_size: usize,
}

impl Uploader {
    pub fn new(config: &ClientConfig) -> Result<Self, TransferError> {
        let connector = build_connector(&config.tls).map_err(Fault::Identity)?;
        Ok(Uploader {
            connector,
            chunk_size: config.effective_chunk_size(),
        })
    }

    /// Sends `filepath` to `host:port`, skipping whatever prefix the server
    /// reports it already holds.
    pub async fn send_file(
        &self,
        host: &str,
        port: u16,
        filepath: impl AsRef<Path>,
        destination: Destination,
    ) -> Result<TransferResult, TransferError> {
        let path = filepath.as_ref();
        match self.transfer(host, port, path, destination).await {
            Ok(result) => {
                info!(
                    file = %path.display(),
                    bytes_sent = result.bytes_sent,
                    file_size = result.file_size,
                    "upload finished"
                );
                Ok(result)
            }
            Err(fault) => Err(fault.into()),
        }
    }

    async fn transfer(
        &self,
        host: &str,
        port: u16,
        path: &Path,
        destination: Destination,
    ) -> Result<TransferResult, Fault> {
        let attrs = read_attributes(path).await?;
        debug!(
            file = %attrs.basename,
            size = attrs.size,
            checksum = %attrs.checksum,
            "file attributes read"
        );

        let request = UploadRequest {
            filename: attrs.basename,
            destination,
            size: attrs.size,
            checksum: attrs.checksum.as_bytes().to_vec(),
        };

        let mut stream = self.connect(host, port).await?;
        let outcome = self.exchange(&mut stream, path, &request).await;
        close_channel(&mut stream, outcome).await
    }

    async fn connect(&self, host: &str, port: u16) -> Result<TlsStream<TcpStream>, Fault> {
        let addrs: Vec<SocketAddr> = lookup_host((host, port))
            .await
            .map_err(|source| Fault::Resolve { host: host.to_string(), source })?
            .collect();
        if addrs.is_empty() {
            return Err(Fault::NoAddresses(host.to_string()));
        }

        let addr = format!("{host}:{port}");
        let socket = TcpStream::connect(&addrs[..])
            .await
            .map_err(|source| Fault::Connect { addr: addr.clone(), source })?;
        info!(%addr, "connected");

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Fault::ServerName(host.to_string()))?;
        let stream = self
            .connector
            .connect(server_name, socket)
            .await
            .map_err(|source| Fault::Handshake { addr: addr.clone(), source })?;
        debug!(%addr, "TLS handshake complete");

        Ok(stream)
    }

    async fn exchange<S>(
        &self,
        stream: &mut S,
        path: &Path,
        request: &UploadRequest,
    ) -> Result<TransferResult, Fault>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        send_message(stream, request).await?;
        debug!(file = %request.filename, destination = ?request.destination, "request sent");

        let frame = read_frame(stream).await?.ok_or(CodecError::Closed)?;
        let response = decode_response(&frame)?;
        debug!(?response, "response received");

        let size = request.size;
        match response {
            ServerResponse::AlreadyDownloaded => {
                Ok(TransferResult { bytes_sent: 0, file_size: size })
            }
            ServerResponse::ResumeAt(existing) => {
                if existing > size {
                    return Err(Fault::ResumeOffset { offset: existing, size });
                }
                let remaining = size - existing;
                let bytes_sent =
                    stream_tail(stream, path, existing, remaining, self.chunk_size).await?;
                Ok(TransferResult { bytes_sent, file_size: size })
            }
            ServerResponse::Error(kind) => Err(Fault::Rejected(kind)),
        }
    }
}

/// Sends `close_notify` and shuts the socket down. The close ends the tail
/// data, so a failed close turns a successful exchange into an error. When
/// the exchange already failed, that error is kept.
async fn close_channel<S>(
    stream: &mut S,
    outcome: Result<TransferResult, Fault>,
) -> Result<TransferResult, Fault>
where
    S: AsyncWrite + Unpin,
{
    match stream.shutdown().await {
        Ok(()) => outcome,
        Err(err) if outcome.is_ok() => Err(Fault::Channel(err)),
        Err(err) => {
            debug!(error = %err, "closing channel failed");
            outcome
        }
    }
}

/// Streams up to `remaining` bytes of `path` starting at `offset`, one frame
/// per chunk. Stops early if the file ends first.
async fn stream_tail<S>(
    stream: &mut S,
    path: &Path,
    offset: u64,
    remaining: u64,
    chunk_size: usize,
) -> Result<u64, Fault>
where
    S: AsyncWrite + Unpin,
{
    let local = |source| Fault::LocalFile { path: path.to_path_buf(), source };

    let mut file = File::open(path).await.map_err(local)?;
    file.seek(SeekFrom::Start(offset)).await.map_err(local)?;
    debug!(offset, remaining, "streaming tail");

    let mut buf = vec![0u8; chunk_size];
    let mut sent = 0u64;
    while sent < remaining {
        let want = (remaining - sent).min(chunk_size as u64) as usize;
        let n = file.read(&mut buf[..want]).await.map_err(local)?;
        if n == 0 {
            warn!(
                file = %path.display(),
                expected = remaining,
                sent,
                "file ended before its recorded size"
            );
            break;
        }
        write_frame(stream, &buf[..n]).await?;
        sent += n as u64;
    }
    stream.flush().await.map_err(Fault::Channel)?;

    Ok(sent)
}

/// Builds an [`Uploader`] from `config` and performs a single upload.
pub async fn send_file(
    config: &ClientConfig,
    host: &str,
    port: u16,
    filepath: impl AsRef<Path>,
    destination: Destination,
) -> Result<TransferResult, TransferError> {
    Uploader::new(config)?.send_file(host, port, filepath, destination).await
}
