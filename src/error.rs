//! Caller-facing error taxonomy and the mapping from internal faults.

use std::fmt;
use std::io;
use std::path::PathBuf;

use tracing::error;

use crate::network::{CodecError, MaterialError, ServerErrorKind};

/// Coarse classification of a failed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionRefused,
    UnknownHost,
    HandshakeFailure,
    FileNotFound,
    PermissionDenied,
    Protocol,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionRefused => "connection-refused",
            ErrorKind::UnknownHost => "unknown-host",
            ErrorKind::HandshakeFailure => "handshake-failure",
            ErrorKind::FileNotFound => "file-not-found",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::Protocol => "protocol-error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`send_file`](crate::send_file).
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("connection refused by {0}")]
    ConnectionRefused(String),

    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("server rejected transfer: {0}")]
    Rejected(ServerErrorKind),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Unknown(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            TransferError::UnknownHost(_) => ErrorKind::UnknownHost,
            TransferError::Handshake(_) => ErrorKind::HandshakeFailure,
            TransferError::FileNotFound(_) => ErrorKind::FileNotFound,
            TransferError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            TransferError::Rejected(ServerErrorKind::PermissionDenied) => {
                ErrorKind::PermissionDenied
            }
            TransferError::Rejected(_) | TransferError::Protocol(_) => ErrorKind::Protocol,
            TransferError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

/// Failure of a single step inside the transfer engine.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Fault {
    #[error("{}: {source}", .path.display())]
    LocalFile { path: PathBuf, source: io::Error },

    #[error("path has no file name: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("client identity: {0:#}")]
    Identity(anyhow::Error),

    #[error("failed to resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },

    #[error("{0} resolved to no addresses")]
    NoAddresses(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("invalid server name {0}")]
    ServerName(String),

    #[error("handshake with {addr}: {source}")]
    Handshake { addr: String, source: io::Error },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("server rejected transfer: {0}")]
    Rejected(ServerErrorKind),

    #[error("resume offset {offset} is beyond file size {size}")]
    ResumeOffset { offset: u64, size: u64 },

    #[error("channel I/O: {0}")]
    Channel(io::Error),
}

fn unknown(fault: &dyn fmt::Display) -> TransferError {
    error!(error = %fault, "unrecognized transfer failure");
    TransferError::Unknown(fault.to_string())
}

fn from_local_io(path: PathBuf, source: &io::Error, fault: &Fault) -> TransferError {
    match source.kind() {
        io::ErrorKind::NotFound => TransferError::FileNotFound(path),
        io::ErrorKind::PermissionDenied => TransferError::PermissionDenied(path),
        _ => unknown(fault),
    }
}

fn from_channel_io(source: &io::Error, fault: &Fault) -> TransferError {
    match source.kind() {
        io::ErrorKind::ConnectionRefused => TransferError::ConnectionRefused(source.to_string()),
        _ => unknown(fault),
    }
}

impl From<Fault> for TransferError {
    fn from(fault: Fault) -> Self {
        match &fault {
            Fault::LocalFile { path, source } => from_local_io(path.clone(), source, &fault),
            Fault::InvalidPath(path) => TransferError::FileNotFound(path.clone()),
            Fault::Identity(err) => match err.downcast_ref::<MaterialError>() {
                Some(MaterialError { path, source }) => match source.kind() {
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                        from_local_io(path.clone(), source, &fault)
                    }
                    _ => TransferError::Handshake(fault.to_string()),
                },
                None => TransferError::Handshake(fault.to_string()),
            },
            Fault::Resolve { host, .. } | Fault::NoAddresses(host) | Fault::ServerName(host) => {
                TransferError::UnknownHost(host.clone())
            }
            Fault::Connect { addr, source } => match source.kind() {
                io::ErrorKind::ConnectionRefused => TransferError::ConnectionRefused(addr.clone()),
                _ => unknown(&fault),
            },
            Fault::Handshake { .. } => TransferError::Handshake(fault.to_string()),
            Fault::Codec(CodecError::Io(source)) => from_channel_io(source, &fault),
            Fault::Codec(_) | Fault::ResumeOffset { .. } => {
                TransferError::Protocol(fault.to_string())
            }
            Fault::Rejected(kind) => TransferError::Rejected(kind.clone()),
            Fault::Channel(source) => from_channel_io(source, &fault),
        }
    }
}
